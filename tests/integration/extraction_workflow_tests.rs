/*!
 * Integration tests for operation extraction through the controller
 */

use anyhow::Result;
use std::sync::Arc;

use stsync::file_utils::FileManager;
use stsync::operations::{CommitRange, OperationType, OperationsStore};
use stsync::report::{FileOutcome, MemorySink, Severity};
use stsync::subtitle::StidInventory;
use stsync::{Controller, DirectorySnapshots};

use crate::common;

#[tokio::test]
async fn test_extract_withInsertedMark_shouldAssignFreshIdAndSave() -> Result<()> {
    common::init_logging();
    let temp_dir = common::create_temp_dir()?;
    let from_dir = temp_dir.path().join("from");
    let to_dir = temp_dir.path().join("to");
    common::write_document(&from_dir, "book/ch1.at", "@word one. word two.", &["s1"], Some("c1"))?;
    common::write_content(&to_dir, "book/ch1.at", "@word one.@ word two.")?;
    // Unchanged documents produce nothing
    common::write_document(&from_dir, "book/ch2.at", "@same", &["s9"], Some("c1"))?;
    common::write_content(&to_dir, "book/ch2.at", "@same")?;

    let controller = Controller::with_config(common::test_config(temp_dir.path()))?;
    let source = Arc::new(DirectorySnapshots::new("primary", &from_dir, &to_dir, CommitRange::new("c1", "c2")));
    let run = controller.extract_operations(source).await?;

    assert_eq!(run.report.outcomes(), &[("book/ch1.at".to_string(), FileOutcome::Succeeded { operations: 1 })]);
    let file = run.operations.file("book/ch1.at").expect("operations for ch1");
    let op = &file.operations[0];
    assert_eq!(op.operation_type, OperationType::Insert);
    assert_eq!(op.operation_id, 1);
    assert_eq!(op.after_stid.as_deref(), Some("s1"));

    // The new subtitle carries an id from the inventory, not a placeholder
    let new_id = op.affected_stids[1].persistent_id.clone();
    assert!(!new_id.starts_with("tmp-"));
    let inventory = StidInventory::open(temp_dir.path().join("stid_inventory.txt"))?;
    assert!(inventory.ids()?.contains(&new_id));

    // The to-side sidecar is written with the to commit
    let sidecar = FileManager::read_sidecar(to_dir.join("book/ch1.at"))?;
    assert_eq!(sidecar.st_sync_commit.as_deref(), Some("c2"));
    assert_eq!(sidecar.persistent_ids(), vec!["s1", new_id.as_str()]);

    // The operations file round-trips
    let saved_to = run.saved_to.expect("operations file");
    let stored = OperationsStore::new(temp_dir.path().join("subtitle_operations")).load(&saved_to)?;
    assert_eq!(stored, run.operations);
    Ok(())
}

#[tokio::test]
async fn test_extract_withSecondRun_shouldContinueOperationIds() -> Result<()> {
    common::init_logging();
    let temp_dir = common::create_temp_dir()?;
    let v1 = temp_dir.path().join("v1");
    let v2 = temp_dir.path().join("v2");
    let v3 = temp_dir.path().join("v3");
    common::write_document(&v1, "doc.at", "@A.@B.@C.", &["a", "b", "c"], None)?;
    common::write_content(&v2, "doc.at", "@AB.@C.")?;
    common::write_content(&v3, "doc.at", "@AB.")?;

    let controller = Controller::with_config(common::test_config(temp_dir.path()))?;
    let first = controller
        .extract_operations(Arc::new(DirectorySnapshots::new("primary", &v1, &v2, CommitRange::new("c1", "c2"))))
        .await?;
    assert_eq!(first.operations.first_operation_id, 1);
    assert_eq!(first.operations.last_operation_id, Some(1));
    assert_eq!(first.operations.files[0].operations[0].operation_type, OperationType::Merge);

    let second = controller
        .extract_operations(Arc::new(DirectorySnapshots::new("primary", &v2, &v3, CommitRange::new("c2", "c3"))))
        .await?;
    assert_eq!(second.operations.first_operation_id, 2);
    assert_eq!(second.operations.last_operation_id, Some(2));
    assert_eq!(second.operations.files[0].operations[0].operation_type, OperationType::Merge);

    let store = controller.operations_store();
    assert_eq!(store.list()?.len(), 2);
    assert_eq!(store.next_operation_id()?, 3);
    Ok(())
}

#[tokio::test]
async fn test_extract_withBadDocument_shouldContinueWithOthers() -> Result<()> {
    common::init_logging();
    let temp_dir = common::create_temp_dir()?;
    let from_dir = temp_dir.path().join("from");
    let to_dir = temp_dir.path().join("to");
    common::write_document(&from_dir, "a.at", "@A.@B.", &["a", "b"], None)?;
    common::write_content(&to_dir, "a.at", "@AB.")?;
    // Sidecar out of step with the document
    common::write_document(&from_dir, "b.at", "@X.", &["x"], None)?;
    common::write_content(&from_dir, "b.at", "@X.@Y.")?;
    common::write_content(&to_dir, "b.at", "@X.Y.")?;

    let sink = Arc::new(MemorySink::new());
    let controller = Controller::with_config(common::test_config(temp_dir.path()))?.with_report_sink(sink.clone());
    let run = controller
        .extract_operations(Arc::new(DirectorySnapshots::new("primary", &from_dir, &to_dir, CommitRange::new("c1", "c2"))))
        .await?;

    assert_eq!(run.report.succeeded(), 1);
    assert_eq!(run.report.failures().len(), 1);
    assert_eq!(run.report.failures()[0].0, "b.at");
    assert_eq!(run.operations.files.len(), 1);
    assert_eq!(sink.count(Severity::Error), 1);
    Ok(())
}
