/*!
 * Operation lists and their persistence.
 *
 * One JSON file per commit pair, named with a sortable local timestamp and
 * the truncated commit ids, so a plain name sort lists them oldest first.
 */

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::operation::SubtitleOperation;
use crate::file_utils::FileManager;

/// Characters of a commit id kept in operations file names
const COMMIT_PREFIX_LEN: usize = 8;

/// A pair of commits in the primary repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRange {
    pub from_git_commit: String,
    pub to_git_commit: String,
}

impl CommitRange {
    pub fn new(from_git_commit: impl Into<String>, to_git_commit: impl Into<String>) -> Self {
        Self {
            from_git_commit: from_git_commit.into(),
            to_git_commit: to_git_commit.into(),
        }
    }
}

/// Ordered operations of one document between two commits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationsForFile {
    pub file_path: String,
    pub from_git_commit: String,
    pub to_git_commit: String,
    pub operations: Vec<SubtitleOperation>,
}

impl OperationsForFile {
    pub fn new(file_path: impl Into<String>, commits: &CommitRange, operations: Vec<SubtitleOperation>) -> Self {
        Self {
            file_path: file_path.into(),
            from_git_commit: commits.from_git_commit.clone(),
            to_git_commit: commits.to_git_commit.clone(),
            operations,
        }
    }

    pub fn commits(&self) -> CommitRange {
        CommitRange::new(&self.from_git_commit, &self.to_git_commit)
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn first_operation_id(&self) -> Option<usize> {
        self.operations.first().map(|op| op.operation_id)
    }

    pub fn last_operation_id(&self) -> Option<usize> {
        self.operations.last().map(|op| op.operation_id)
    }

    /// Number the operations from `start`; returns the next free id
    pub fn renumber(&mut self, start: usize) -> usize {
        let mut next = start;
        for operation in &mut self.operations {
            operation.operation_id = next;
            next += 1;
        }
        next
    }

    /// Whether ids increase by exactly one
    pub fn is_contiguous(&self) -> bool {
        self.operations
            .windows(2)
            .all(|w| w[1].operation_id == w[0].operation_id + 1)
    }
}

/// Operations of every changed file of a repository between two commits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationsForRepository {
    pub repository: String,
    pub from_git_commit: String,
    pub to_git_commit: String,
    pub first_operation_id: usize,
    /// Null when no file has operations
    pub last_operation_id: Option<usize>,
    pub files: Vec<OperationsForFile>,
}

impl OperationsForRepository {
    /// Collect file operations, numbering them contiguously from `first_operation_id`
    pub fn new(
        repository: impl Into<String>,
        commits: &CommitRange,
        first_operation_id: usize,
        mut files: Vec<OperationsForFile>,
    ) -> Self {
        let mut next = first_operation_id;
        for file in &mut files {
            next = file.renumber(next);
        }
        let last_operation_id = (next > first_operation_id).then(|| next - 1);
        Self {
            repository: repository.into(),
            from_git_commit: commits.from_git_commit.clone(),
            to_git_commit: commits.to_git_commit.clone(),
            first_operation_id,
            last_operation_id,
            files,
        }
    }

    pub fn commits(&self) -> CommitRange {
        CommitRange::new(&self.from_git_commit, &self.to_git_commit)
    }

    pub fn operations_count(&self) -> usize {
        self.files.iter().map(|f| f.operations.len()).sum()
    }

    /// Operations of one file
    pub fn file(&self, file_path: &str) -> Option<&OperationsForFile> {
        self.files.iter().find(|f| f.file_path == file_path)
    }

    /// First id free for the next run
    pub fn next_operation_id(&self) -> usize {
        self.last_operation_id.map_or(self.first_operation_id, |last| last + 1)
    }

    // @returns: `<YYYYMMDD-HHMMSS>-<from[..8]>-<to[..8]>.json`
    pub fn file_name(&self, timestamp: DateTime<Local>) -> String {
        format!(
            "{}-{}-{}.json",
            timestamp.format("%Y%m%d-%H%M%S"),
            commit_prefix(&self.from_git_commit),
            commit_prefix(&self.to_git_commit)
        )
    }
}

fn commit_prefix(commit: &str) -> &str {
    commit
        .char_indices()
        .nth(COMMIT_PREFIX_LEN)
        .map_or(commit, |(idx, _)| &commit[..idx])
}

/// Directory of operations files
#[derive(Debug, Clone)]
pub struct OperationsStore {
    dir: PathBuf,
}

impl OperationsStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Operations files, oldest first
    pub fn list(&self) -> Result<Vec<PathBuf>> {
        if !FileManager::dir_exists(&self.dir) {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1) {
            let entry = entry.context("Failed to read operations directory entry")?;
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                files.push(path.to_path_buf());
            }
        }
        files.sort();
        Ok(files)
    }

    pub fn load(&self, path: &Path) -> Result<OperationsForRepository> {
        let content = FileManager::read_to_string(path)?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse operations file: {:?}", path))
    }

    /// Most recent operations file, if any
    pub fn latest(&self) -> Result<Option<OperationsForRepository>> {
        match self.list()?.last() {
            Some(path) => Ok(Some(self.load(path)?)),
            None => Ok(None),
        }
    }

    /// Operations for a commit pair
    pub fn find(&self, commits: &CommitRange) -> Result<Option<OperationsForRepository>> {
        for path in self.list()?.iter().rev() {
            let operations = self.load(path)?;
            if operations.commits() == *commits {
                return Ok(Some(operations));
            }
        }
        Ok(None)
    }

    /// First operation id for a new run, continuing the newest file
    pub fn next_operation_id(&self) -> Result<usize> {
        Ok(self.latest()?.map_or(1, |latest| latest.next_operation_id()))
    }

    pub fn save(&self, operations: &OperationsForRepository) -> Result<PathBuf> {
        self.save_at(operations, Local::now())
    }

    pub fn save_at(&self, operations: &OperationsForRepository, timestamp: DateTime<Local>) -> Result<PathBuf> {
        if let Some(file) = operations.files.iter().find(|f| !f.is_contiguous()) {
            return Err(anyhow!("Operation ids of {} are not contiguous", file.file_path));
        }
        let path = self.dir.join(operations.file_name(timestamp));
        let json = serde_json::to_string_pretty(operations)?;
        FileManager::write_to_file(&path, &json)?;
        info!(
            "Saved {} operations for {} files to {:?}",
            operations.operations_count(),
            operations.files.len(),
            path
        );
        debug!(
            "Operation range {}..={:?}",
            operations.first_operation_id, operations.last_operation_id
        );
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::{AffectedStid, OperationType, SubtitleState};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn op() -> SubtitleOperation {
        SubtitleOperation::new(
            OperationType::ContentChange,
            0,
            vec![AffectedStid::new(
                "abc",
                Some(SubtitleState::new("old", None)),
                Some(SubtitleState::new("new", None)),
            )],
            None,
        )
    }

    fn commits() -> CommitRange {
        CommitRange::new("0123456789abcdef", "fedcba9876543210")
    }

    #[test]
    fn test_new_shouldNumberFilesContiguously() {
        let files = vec![
            OperationsForFile::new("a.at", &commits(), vec![op(), op()]),
            OperationsForFile::new("b.at", &commits(), vec![]),
            OperationsForFile::new("c.at", &commits(), vec![op()]),
        ];
        let repo = OperationsForRepository::new("primary", &commits(), 10, files);
        assert_eq!(repo.files[0].first_operation_id(), Some(10));
        assert_eq!(repo.files[2].first_operation_id(), Some(12));
        assert_eq!(repo.last_operation_id, Some(12));
        assert_eq!(repo.next_operation_id(), 13);
    }

    #[test]
    fn test_new_withoutOperations_shouldHaveNullLastId() {
        let repo = OperationsForRepository::new("primary", &commits(), 5, vec![]);
        assert_eq!(repo.last_operation_id, None);
        let json = serde_json::to_value(&repo).unwrap();
        assert!(json["last_operation_id"].is_null());
        assert_eq!(repo.next_operation_id(), 5);
    }

    #[test]
    fn test_fileName_shouldUseTimestampAndCommitPrefixes() {
        let repo = OperationsForRepository::new("primary", &commits(), 1, vec![]);
        let timestamp = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(repo.file_name(timestamp), "20240309-140507-01234567-fedcba98.json");
    }

    #[test]
    fn test_store_shouldSaveListAndContinueNumbering() {
        let dir = TempDir::new().unwrap();
        let store = OperationsStore::new(dir.path().join("ops"));
        assert_eq!(store.next_operation_id().unwrap(), 1);

        let first = OperationsForRepository::new(
            "primary",
            &commits(),
            1,
            vec![OperationsForFile::new("a.at", &commits(), vec![op(), op()])],
        );
        store
            .save_at(&first, Local.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
            .unwrap();

        let later = CommitRange::new("fedcba9876543210", "aaaaaaaabbbbbbbb");
        let second = OperationsForRepository::new(
            "primary",
            &later,
            store.next_operation_id().unwrap(),
            vec![OperationsForFile::new("a.at", &later, vec![op()])],
        );
        store
            .save_at(&second, Local.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap())
            .unwrap();

        assert_eq!(store.list().unwrap().len(), 2);
        assert_eq!(store.next_operation_id().unwrap(), 4);
        assert_eq!(store.find(&commits()).unwrap(), Some(first));
        assert_eq!(store.latest().unwrap(), Some(second));
    }
}
