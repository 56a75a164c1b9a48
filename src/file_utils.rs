use anyhow::{Result, Context, anyhow};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::subtitle::SubtitleSidecar;

// @module: File and directory utilities

/// Extension of content AT documents
pub const CONTENT_AT_EXTENSION: &str = "at";

/// Suffix replacing `.at` in subtitle sidecar file names
pub const SIDECAR_SUFFIX: &str = ".subtitles.json";

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_file()
    }

    // @checks: Directory existence
    pub fn dir_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_dir()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path)?;
        }
        Ok(())
    }

    /// Find files with a specific extension in a directory, sorted by path
    pub fn find_files<P: AsRef<Path>>(dir: P, extension: &str) -> Result<Vec<PathBuf>> {
        let mut result = Vec::new();
        let normalized_ext = extension.trim_start_matches('.');

        for entry in WalkDir::new(dir.as_ref()).follow_links(true) {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();

            if path.is_file() {
                if let Some(ext) = path.extension() {
                    if ext.to_string_lossy().eq_ignore_ascii_case(normalized_ext) {
                        result.push(path.to_path_buf());
                    }
                }
            }
        }

        result.sort();
        Ok(result)
    }

    /// Content AT documents below `dir`, as `/`-separated paths relative to it
    pub fn find_content_at_files<P: AsRef<Path>>(dir: P) -> Result<Vec<String>> {
        let dir = dir.as_ref();
        Self::find_files(dir, CONTENT_AT_EXTENSION)?
            .iter()
            .map(|path| Self::relative_path(dir, path))
            .collect()
    }

    // @returns: `path` relative to `base` with `/` separators
    pub fn relative_path(base: &Path, path: &Path) -> Result<String> {
        let relative = path
            .strip_prefix(base)
            .map_err(|_| anyhow!("{:?} is not below {:?}", path, base))?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect();
        Ok(parts.join("/"))
    }

    /// Read a file to a string
    pub fn read_to_string<P: AsRef<Path>>(path: P) -> Result<String> {
        fs::read_to_string(&path)
            .with_context(|| format!("Failed to read file: {:?}", path.as_ref()))
    }

    /// Write a string to a file
    pub fn write_to_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
        // Ensure the parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            Self::ensure_dir(parent)?;
        }

        fs::write(&path, content)
            .with_context(|| format!("Failed to write to file: {:?}", path.as_ref()))?;

        Ok(())
    }

    // @returns: Sidecar path for a content AT document (`a/b.at` -> `a/b.subtitles.json`)
    pub fn sidecar_path<P: AsRef<Path>>(document: P) -> PathBuf {
        let document = document.as_ref();
        let stem = document.file_stem().unwrap_or_default().to_string_lossy();
        document.with_file_name(format!("{}{}", stem, SIDECAR_SUFFIX))
    }

    /// Read the sidecar of a document; a missing sidecar is an empty one
    pub fn read_sidecar<P: AsRef<Path>>(document: P) -> Result<SubtitleSidecar> {
        let path = Self::sidecar_path(document);
        if !Self::file_exists(&path) {
            return Ok(SubtitleSidecar::default());
        }
        let content = Self::read_to_string(&path)?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse subtitle sidecar: {:?}", path))
    }

    /// Write the sidecar of a document
    pub fn write_sidecar<P: AsRef<Path>>(document: P, sidecar: &SubtitleSidecar) -> Result<()> {
        let path = Self::sidecar_path(document);
        let json = serde_json::to_string_pretty(sidecar)?;
        Self::write_to_file(path, &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subtitle::Subtitle;
    use tempfile::TempDir;

    #[test]
    fn test_sidecarPath_withNestedDocument_shouldReplaceExtension() {
        let path = FileManager::sidecar_path("content/part1/chapter.at");
        assert_eq!(path, PathBuf::from("content/part1/chapter.subtitles.json"));
    }

    #[test]
    fn test_findContentAtFiles_shouldReturnSortedRelativePaths() {
        let dir = TempDir::new().unwrap();
        FileManager::write_to_file(dir.path().join("b/two.at"), "x").unwrap();
        FileManager::write_to_file(dir.path().join("a.at"), "x").unwrap();
        FileManager::write_to_file(dir.path().join("a.subtitles.json"), "{}").unwrap();

        let files = FileManager::find_content_at_files(dir.path()).unwrap();
        assert_eq!(files, vec!["a.at".to_string(), "b/two.at".to_string()]);
    }

    #[test]
    fn test_sidecar_withWriteThenRead_shouldKeepSubtitles() {
        let dir = TempDir::new().unwrap();
        let document = dir.path().join("doc.at");
        let sidecar = SubtitleSidecar::new(
            Some("abc123".to_string()),
            vec![Subtitle::new("abcdefg", Some("1".to_string()), "Hello")],
        );

        FileManager::write_sidecar(&document, &sidecar).unwrap();
        assert_eq!(FileManager::read_sidecar(&document).unwrap(), sidecar);
    }

    #[test]
    fn test_readSidecar_withMissingFile_shouldReturnEmpty() {
        let dir = TempDir::new().unwrap();
        let sidecar = FileManager::read_sidecar(dir.path().join("none.at")).unwrap();
        assert!(sidecar.subtitles.is_empty());
        assert!(sidecar.st_sync_commit.is_none());
    }
}
