/*!
 * Integration tests for extraction followed by foreign transfer
 */

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use stsync::file_utils::FileManager;
use stsync::operations::CommitRange;
use stsync::report::{FileOutcome, MemorySink, Severity};
use stsync::{Controller, DirectorySnapshots, ExtractionRun};

use crate::common;

async fn extract_insert(controller: &Controller, root: &Path) -> Result<ExtractionRun> {
    let from_dir = root.join("primary_v1");
    let to_dir = root.join("primary_v2");
    common::write_document(&from_dir, "doc.at", "^^^ {: .rid #f-1}\n@word one. word two.\n", &["s1"], None)?;
    common::write_content(&to_dir, "doc.at", "^^^ {: .rid #f-1}\n@word one.@ word two.\n")?;
    let source = Arc::new(DirectorySnapshots::new("primary", &from_dir, &to_dir, CommitRange::new("c1", "c2")));
    controller.extract_operations(source).await
}

#[tokio::test]
async fn test_transfer_withMatchingForeignDocument_shouldInsertBoundary() -> Result<()> {
    common::init_logging();
    let temp_dir = common::create_temp_dir()?;
    let root = temp_dir.path();
    let controller = Controller::with_config(common::test_config(root))?;
    let run = extract_insert(&controller, root).await?;
    let new_id = run.operations.files[0].operations[0].affected_stids[1].persistent_id.clone();

    let foreign_dir = root.join("foreign");
    let foreign = common::write_document(
        &foreign_dir,
        "doc.at",
        "^^^ {: .rid #f-1}\n@mot un. mot deux.\n",
        &["s1"],
        Some("c1"),
    )?;

    let primary = Arc::new(DirectorySnapshots::new("primary", root.join("primary_v1"), root.join("primary_v1"), run.operations.commits()));
    let report = controller.transfer_operations(&run.operations, primary, &foreign_dir).await?;

    assert_eq!(report.outcomes(), &[("doc.at".to_string(), FileOutcome::Succeeded { operations: 1 })]);
    assert_eq!(
        FileManager::read_to_string(&foreign)?,
        "^^^ {: .rid #f-1}\n@mot un.@ mot deux.\n"
    );
    let sidecar = FileManager::read_sidecar(&foreign)?;
    assert_eq!(sidecar.st_sync_commit.as_deref(), Some("c2"));
    assert_eq!(sidecar.persistent_ids(), vec!["s1", new_id.as_str()]);
    Ok(())
}

#[tokio::test]
async fn test_transfer_withStaleForeignCommit_shouldQueueForReview() -> Result<()> {
    common::init_logging();
    let temp_dir = common::create_temp_dir()?;
    let root = temp_dir.path();
    let sink = Arc::new(MemorySink::new());
    let controller = Controller::with_config(common::test_config(root))?.with_report_sink(sink.clone());
    let run = extract_insert(&controller, root).await?;

    let foreign_dir = root.join("foreign");
    let content = "^^^ {: .rid #f-1}\n@mot un. mot deux.\n";
    let foreign = common::write_document(&foreign_dir, "doc.at", content, &["s1"], Some("c0"))?;

    let primary = Arc::new(DirectorySnapshots::new("primary", root.join("primary_v1"), root.join("primary_v1"), run.operations.commits()));
    let report = controller.transfer_operations(&run.operations, primary, &foreign_dir).await?;

    assert_eq!(report.review_queue().len(), 1);
    assert!(!report.has_failures());
    assert!(sink.count(Severity::Warning) >= 1);
    // Nothing is written for review items
    assert_eq!(FileManager::read_to_string(&foreign)?, content);
    assert_eq!(FileManager::read_sidecar(&foreign)?.st_sync_commit.as_deref(), Some("c0"));
    Ok(())
}

#[tokio::test]
async fn test_transfer_withMissingForeignDocument_shouldSkipIt() -> Result<()> {
    common::init_logging();
    let temp_dir = common::create_temp_dir()?;
    let root = temp_dir.path();
    let controller = Controller::with_config(common::test_config(root))?;
    let run = extract_insert(&controller, root).await?;

    let foreign_dir = root.join("foreign");
    FileManager::ensure_dir(&foreign_dir)?;
    let primary = Arc::new(DirectorySnapshots::new("primary", root.join("primary_v1"), root.join("primary_v1"), run.operations.commits()));
    let report = controller.transfer_operations(&run.operations, primary, &foreign_dir).await?;

    assert!(report.outcomes().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_transfer_withContentChange_shouldWriteFileAndQueueReview() -> Result<()> {
    common::init_logging();
    let temp_dir = common::create_temp_dir()?;
    let root = temp_dir.path();
    let sink = Arc::new(MemorySink::new());
    let controller = Controller::with_config(common::test_config(root))?.with_report_sink(sink.clone());

    let from_dir = root.join("primary_v1");
    let to_dir = root.join("primary_v2");
    common::write_document(&from_dir, "doc.at", "@teh cat sat.", &["s1"], None)?;
    common::write_content(&to_dir, "doc.at", "@the cat sat.")?;
    let source = Arc::new(DirectorySnapshots::new("primary", &from_dir, &to_dir, CommitRange::new("c1", "c2")));
    let run = controller.extract_operations(source).await?;
    let operation_id = run.operations.files[0].operations[0].operation_id;

    let foreign_dir = root.join("foreign");
    let foreign = common::write_document(&foreign_dir, "doc.at", "@le chat assis.", &["s1"], Some("c1"))?;
    let primary = Arc::new(DirectorySnapshots::new("primary", &from_dir, &from_dir, run.operations.commits()));
    let report = controller.transfer_operations(&run.operations, primary, &foreign_dir).await?;

    assert_eq!(report.review_queue().len(), 1);
    assert_eq!(report.review_queue()[0].0, "doc.at");
    assert!(matches!(
        report.outcomes()[0].1,
        FileOutcome::SucceededWithReview { operations: 1, .. }
    ));
    // The foreign words stay, the sidecar moves on to the to commit
    assert_eq!(FileManager::read_to_string(&foreign)?, "@le chat assis.");
    assert_eq!(FileManager::read_sidecar(&foreign)?.st_sync_commit.as_deref(), Some("c2"));

    let warnings: Vec<_> = sink
        .records()
        .into_iter()
        .filter(|r| r.severity == Severity::Warning)
        .collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].location.operation_id, Some(operation_id));
    assert_eq!(warnings[0].location.persistent_id.as_deref(), Some("s1"));
    Ok(())
}
