/*!
 * Subtitle operations.
 *
 * One operation is an atomic edit of a document's ordered subtitle list.
 * The type is a closed enum; every place that applies or inverts operations
 * matches it exhaustively.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of subtitle edit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    /// A new boundary appears; the new subtitle gets a fresh id
    Insert,
    /// A boundary disappears; the right subtitle is absorbed into its left neighbor
    Delete,
    /// Two or more adjacent subtitles collapse into the first one
    Merge,
    /// One subtitle becomes several; the first keeps its id
    Split,
    /// A boundary shifts left, across text or a record boundary
    MoveLeft,
    /// A boundary shifts right
    MoveRight,
    /// Wording changed, boundaries did not
    ContentChange,
    /// Containing record changed, boundaries did not
    RecordIdChange,
}

impl OperationType {
    /// Type of the inverse operation
    pub fn inverse(&self) -> Self {
        match self {
            Self::Insert => Self::Delete,
            Self::Delete => Self::Insert,
            Self::Merge => Self::Split,
            Self::Split => Self::Merge,
            Self::MoveLeft => Self::MoveRight,
            Self::MoveRight => Self::MoveLeft,
            Self::ContentChange => Self::ContentChange,
            Self::RecordIdChange => Self::RecordIdChange,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Delete => "delete",
            Self::Merge => "merge",
            Self::Split => "split",
            Self::MoveLeft => "move_left",
            Self::MoveRight => "move_right",
            Self::ContentChange => "content_change",
            Self::RecordIdChange => "record_id_change",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Content and record id of a subtitle at one point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleState {
    pub content: String,
    #[serde(default)]
    pub record_id: Option<String>,
}

impl SubtitleState {
    pub fn new(content: impl Into<String>, record_id: Option<String>) -> Self {
        Self {
            content: content.into(),
            record_id,
        }
    }
}

/// One subtitle touched by an operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffectedStid {
    pub persistent_id: String,
    /// State before the operation, absent for subtitles it creates
    #[serde(default)]
    pub before: Option<SubtitleState>,
    /// State after the operation, absent for subtitles it removes
    #[serde(default)]
    pub after: Option<SubtitleState>,
}

impl AffectedStid {
    pub fn new(
        persistent_id: impl Into<String>,
        before: Option<SubtitleState>,
        after: Option<SubtitleState>,
    ) -> Self {
        Self {
            persistent_id: persistent_id.into(),
            before,
            after,
        }
    }

    /// Same subtitle with before and after swapped
    pub fn inverse(&self) -> Self {
        Self {
            persistent_id: self.persistent_id.clone(),
            before: self.after.clone(),
            after: self.before.clone(),
        }
    }
}

/// A single typed edit of a subtitle list.
///
/// `affected_stids` layout by type:
/// - insert: `[left, new]`, or `[new]` at document start
/// - delete: `[left, removed]`, or `[removed]` at document start
/// - merge: `[survivor, absorbed...]`
/// - split: `[original, created...]`
/// - move_left / move_right: `[left, right]`, or `[right]` at document start
/// - content_change / record_id_change: `[subtitle]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleOperation {
    pub operation_type: OperationType,
    pub operation_id: usize,
    pub affected_stids: Vec<AffectedStid>,
    /// Subtitle the inserted (or deleted) one follows; none at document start
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_stid: Option<String>,
}

impl SubtitleOperation {
    pub fn new(
        operation_type: OperationType,
        operation_id: usize,
        affected_stids: Vec<AffectedStid>,
        after_stid: Option<String>,
    ) -> Self {
        Self {
            operation_type,
            operation_id,
            affected_stids,
            after_stid,
        }
    }

    /// Operation that undoes this one
    pub fn inverse(&self) -> Self {
        Self {
            operation_type: self.operation_type.inverse(),
            operation_id: self.operation_id,
            affected_stids: self.affected_stids.iter().map(AffectedStid::inverse).collect(),
            after_stid: self.after_stid.clone(),
        }
    }

    /// The subtitle a reviewer should look at: the merge survivor, else the
    /// last affected subtitle
    pub fn salient_subtitle(&self) -> Option<&AffectedStid> {
        match self.operation_type {
            OperationType::Merge => self.affected_stids.first(),
            _ => self.affected_stids.last(),
        }
    }

    /// Persistent ids in `affected_stids` order
    pub fn persistent_ids(&self) -> impl Iterator<Item = &str> {
        self.affected_stids.iter().map(|a| a.persistent_id.as_str())
    }

    /// Ids of subtitles created by this operation
    pub fn created_ids(&self) -> Vec<&str> {
        self.affected_stids
            .iter()
            .filter(|a| a.before.is_none() && a.after.is_some())
            .map(|a| a.persistent_id.as_str())
            .collect()
    }

    /// Change in subtitle count when applied
    pub fn count_delta(&self) -> isize {
        let created = self
            .affected_stids
            .iter()
            .filter(|a| a.before.is_none() && a.after.is_some())
            .count() as isize;
        let removed = self
            .affected_stids
            .iter()
            .filter(|a| a.before.is_some() && a.after.is_none())
            .count() as isize;
        created - removed
    }

    /// Replace a persistent id everywhere in the operation
    pub fn rename_stid(&mut self, from: &str, to: &str) {
        for affected in &mut self.affected_stids {
            if affected.persistent_id == from {
                affected.persistent_id = to.to_string();
            }
        }
        if self.after_stid.as_deref() == Some(from) {
            self.after_stid = Some(to.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(content: &str) -> Option<SubtitleState> {
        Some(SubtitleState::new(content, None))
    }

    fn merge() -> SubtitleOperation {
        SubtitleOperation::new(
            OperationType::Merge,
            3,
            vec![
                AffectedStid::new("a", state("A."), state("AB.")),
                AffectedStid::new("b", state("B."), None),
            ],
            None,
        )
    }

    #[test]
    fn test_inverse_ofMerge_shouldBeSplit() {
        let split = merge().inverse();
        assert_eq!(split.operation_type, OperationType::Split);
        assert_eq!(split.affected_stids[0].before, state("AB."));
        assert_eq!(split.affected_stids[1].after, state("B."));
        assert_eq!(split.created_ids(), vec!["b"]);
        assert_eq!(split.inverse(), merge());
    }

    #[test]
    fn test_salientSubtitle_shouldBeSurvivorForMerge() {
        assert_eq!(merge().salient_subtitle().map(|a| a.persistent_id.as_str()), Some("a"));
        assert_eq!(
            merge().inverse().salient_subtitle().map(|a| a.persistent_id.as_str()),
            Some("b")
        );
    }

    #[test]
    fn test_countDelta_shouldCountCreatedAndRemoved() {
        assert_eq!(merge().count_delta(), -1);
        assert_eq!(merge().inverse().count_delta(), 1);
    }

    #[test]
    fn test_serialize_shouldUseSnakeCaseTypes() {
        let mut op = merge();
        op.operation_type = OperationType::MoveLeft;
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["operation_type"], "move_left");
        assert!(json.get("after_stid").is_none());
        let back: SubtitleOperation = serde_json::from_value(json).unwrap();
        assert_eq!(back, op);
    }

    #[test]
    fn test_renameStid_shouldUpdateAnchor() {
        let mut op = SubtitleOperation::new(
            OperationType::Insert,
            1,
            vec![AffectedStid::new("tmp-1", None, state("x"))],
            Some("tmp-0".to_string()),
        );
        op.rename_stid("tmp-0", "abc");
        op.rename_stid("tmp-1", "def");
        assert_eq!(op.after_stid.as_deref(), Some("abc"));
        assert_eq!(op.affected_stids[0].persistent_id, "def");
    }
}
