/*!
 * Tests for operation application, inversion and the operations file format
 */

use stsync::operations::{
    apply_operations, CommitRange, OperationType, OperationsForRepository, SnapshotPair,
    SubtitleOperation, SubtitleOperationExtractor,
};
use stsync::subtitle::Subtitle;

use crate::common;

/// (from, ids, to) snapshot pairs covering every operation type
const CASES: &[(&str, &[&str], &str)] = &[
    ("@word one. word two.", &["a"], "@word one.@ word two."),
    ("@word one.@ word two.", &["a", "b"], "@word one. word two."),
    ("@A.@B.", &["a", "b"], "@AB."),
    ("@One long line.", &["a"], "@One line.@ Now two."),
    ("@aa bb@ cc dd", &["a", "b"], "@aa bb cc@ dd"),
    ("@aa bb cc@ dd", &["a", "b"], "@aa bb@ cc dd"),
    ("@one two three", &["a"], "@one@ two@ three"),
    ("@aa bb@ cc dd", &["a", "b"], "@aa@ bb cc@ dd"),
    ("@a b@ c d@ e f", &["a", "b", "c"], "@a b c@ d e@ f"),
    ("@teh cat", &["a"], "@the cat"),
    ("^^^ {: .rid #f-1}\n@one", &["a"], "^^^ {: .rid #f-2}\n@one"),
];

fn extract(from: &str, ids: &[&str], to: &str) -> (Vec<Subtitle>, Vec<Subtitle>, Vec<SubtitleOperation>) {
    let pair = SnapshotPair {
        file_path: "doc.at".to_string(),
        from_content: from.to_string(),
        to_content: to.to_string(),
        from_subtitles: common::subtitles_for(from, ids),
    };
    let file = SubtitleOperationExtractor::default()
        .extract(&pair, &CommitRange::new("c1", "c2"), 1)
        .unwrap();
    (file.from_subtitles, file.to_subtitles, file.operations.operations)
}

#[test]
fn test_operations_appliedThenInverted_shouldRestoreSubtitles() {
    for (from, ids, to) in CASES {
        let (from_subtitles, to_subtitles, operations) = extract(from, ids, to);
        assert!(!operations.is_empty(), "no operations for {:?}", to);

        let mut subtitles = from_subtitles.clone();
        apply_operations(&mut subtitles, &operations).unwrap();
        assert_eq!(subtitles, to_subtitles);

        let inverse: Vec<SubtitleOperation> = operations.iter().rev().map(|op| op.inverse()).collect();
        apply_operations(&mut subtitles, &inverse).unwrap();
        assert_eq!(subtitles, from_subtitles, "inverse of {:?} -> {:?}", from, to);
    }
}

#[test]
fn test_inverse_twice_shouldBeIdentity() {
    for (from, ids, to) in CASES {
        let (_, _, operations) = extract(from, ids, to);
        for op in &operations {
            assert_eq!(&op.inverse().inverse(), op);
        }
    }
}

#[test]
fn test_applyOperation_withStaleState_shouldFailWithoutChanges() {
    let (from_subtitles, _, operations) = extract("@A.@B.", &["a", "b"], "@AB.");
    let mut subtitles = from_subtitles.clone();
    subtitles[1].content = "Changed.".to_string();
    let before = subtitles.clone();

    assert!(apply_operations(&mut subtitles, &operations).is_err());
    assert_eq!(subtitles, before);
}

#[test]
fn test_operationsFile_shouldSerializeWithExpectedKeys() {
    let (_, _, operations) = extract("@one two three", &["a"], "@one@ two@ three");
    let file = stsync::OperationsForFile::new("doc.at", &CommitRange::new("c1", "c2"), operations);
    let repository = OperationsForRepository::new("primary", &CommitRange::new("c1", "c2"), 11, vec![file]);

    let json: serde_json::Value = serde_json::to_value(&repository).unwrap();
    for key in ["repository", "from_git_commit", "to_git_commit", "first_operation_id", "last_operation_id", "files"] {
        assert!(json.get(key).is_some(), "missing key {}", key);
    }
    assert_eq!(json["first_operation_id"], 11);
    assert_eq!(json["last_operation_id"], 12);

    let op = &json["files"][0]["operations"][0];
    assert_eq!(op["operation_type"], "insert");
    assert_eq!(op["operation_id"], 11);
    assert_eq!(op["after_stid"], "a");

    let back: OperationsForRepository = serde_json::from_value(json).unwrap();
    assert_eq!(back, repository);
    assert_eq!(back.files[0].operations[0].operation_type, OperationType::Insert);
}
