/*!
 * Common test utilities for the stsync test suite
 */

use anyhow::Result;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use stsync::content_at::TokenStream;
use stsync::file_utils::FileManager;
use stsync::subtitle::{subtitle_spans, Subtitle, SubtitleSidecar};
use stsync::Config;

/// Routes library logs to the test output; safe to call from every test
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Configuration with inventory and operations directory inside `dir`
pub fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.operations_dir = dir.join("subtitle_operations");
    config.inventory.path = dir.join("stid_inventory.txt");
    config.concurrent_files = 2;
    config
}

/// Subtitles for a content AT text, with the given persistent ids in order
pub fn subtitles_for(content: &str, ids: &[&str]) -> Vec<Subtitle> {
    let stream = TokenStream::parse(content).expect("test document should lex");
    let spans = subtitle_spans(&stream);
    assert_eq!(spans.len(), ids.len(), "one id per subtitle mark");
    spans
        .into_iter()
        .zip(ids)
        .map(|(span, id)| Subtitle::new(*id, span.record_id, span.content))
        .collect()
}

/// Writes a document and its sidecar
pub fn write_document(
    dir: &Path,
    file: &str,
    content: &str,
    ids: &[&str],
    commit: Option<&str>,
) -> Result<PathBuf> {
    let path = dir.join(file);
    FileManager::write_to_file(&path, content)?;
    let sidecar = SubtitleSidecar::new(commit.map(str::to_string), subtitles_for(content, ids));
    FileManager::write_sidecar(&path, &sidecar)?;
    Ok(path)
}

/// Writes a document without touching its sidecar
pub fn write_content(dir: &Path, file: &str, content: &str) -> Result<PathBuf> {
    let path = dir.join(file);
    FileManager::write_to_file(&path, content)?;
    Ok(path)
}
