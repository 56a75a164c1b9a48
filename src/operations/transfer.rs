/*!
 * Replaying primary operations onto a foreign document.
 *
 * Foreign subtitles are matched to primary subtitles by position only: the
 * foreign boundaries were copied 1:1 from the primary document when the
 * file was first synced. New boundaries are placed by proportional word
 * interpolation inside the matching foreign span. Foreign words are never
 * touched; only `@` marks are added, moved or dropped.
 */

use log::{debug, warn};
use std::collections::BTreeMap;
use std::fmt;

use super::apply::apply_operation;
use super::operation::{OperationType, SubtitleOperation};
use super::store::OperationsForFile;
use crate::app_config::TransferConfig;
use crate::content_at::{ensure_text_equivalent, AnchoredToken, Token, TokenKind, TokenStream};
use crate::errors::{OperationError, TransferError};
use crate::subtitle::{bind_subtitles, subtitle_spans, Subtitle, SubtitleSidecar};

/// How a foreign file will be handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferStrategy {
    /// Counts and commit lineage line up
    ApplyAsIs,
    /// An operation needs a position the foreign text cannot provide
    ReviewManually(String),
    /// Foreign and primary subtitle counts disagree
    ResolveMismatchCounts {
        primary: usize,
        foreign_marks: usize,
        foreign_subtitles: usize,
    },
    /// The foreign file was not synced to the operations' from commit
    ResolveMismatchCommits {
        expected: String,
        found: Option<String>,
    },
}

impl TransferStrategy {
    pub fn needs_review(&self) -> bool {
        !matches!(self, Self::ApplyAsIs)
    }
}

impl fmt::Display for TransferStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApplyAsIs => write!(f, "apply operations as is"),
            Self::ReviewManually(reason) => write!(f, "review manually: {}", reason),
            Self::ResolveMismatchCounts {
                primary,
                foreign_marks,
                foreign_subtitles,
            } => write!(
                f,
                "subtitle counts differ: primary {}, foreign marks {}, foreign subtitles {}",
                primary, foreign_marks, foreign_subtitles
            ),
            Self::ResolveMismatchCommits { expected, found } => write!(
                f,
                "foreign file synced to {}, operations start at {}",
                found.as_deref().unwrap_or("no commit"),
                expected
            ),
        }
    }
}

/// A foreign content AT file with its subtitle sidecar
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignDocument {
    pub file_path: String,
    pub content: String,
    pub sidecar: SubtitleSidecar,
}

/// Outcome of a transfer
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignTransferResult {
    /// Updated foreign content AT
    pub content: String,
    /// Updated sidecar, synced to the operations' to commit
    pub sidecar: SubtitleSidecar,
    /// Things a reviewer should look at even though the transfer succeeded
    pub review_notes: Vec<ReviewNote>,
}

/// A subtitle a reviewer should look at after a successful transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewNote {
    pub operation_id: usize,
    pub persistent_id: String,
    pub message: String,
}

impl fmt::Display for ReviewNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (operation {}, subtitle {})", self.message, self.operation_id, self.persistent_id)
    }
}

// @struct: A foreign subtitle start
#[derive(Debug, Clone)]
struct ForeignBoundary {
    persistent_id: String,
    plain_offset: usize,
    attrs: BTreeMap<String, serde_json::Value>,
}

/// Replays operations onto foreign documents
#[derive(Debug, Clone)]
pub struct ForeignTransfer {
    require_commit_match: bool,
}

impl Default for ForeignTransfer {
    fn default() -> Self {
        Self::from_config(&TransferConfig::default())
    }
}

impl ForeignTransfer {
    pub fn new(require_commit_match: bool) -> Self {
        Self {
            require_commit_match,
        }
    }

    pub fn from_config(config: &TransferConfig) -> Self {
        Self::new(config.require_commit_match)
    }

    /// Decide whether a foreign file can take the operations unattended
    pub fn select_strategy(
        &self,
        operations: &OperationsForFile,
        from_subtitles: &[Subtitle],
        foreign: &TokenStream,
        sidecar: &SubtitleSidecar,
    ) -> TransferStrategy {
        let foreign_marks = foreign.count(TokenKind::SubtitleMark);
        if foreign_marks != from_subtitles.len() || sidecar.subtitles.len() != foreign_marks {
            return TransferStrategy::ResolveMismatchCounts {
                primary: from_subtitles.len(),
                foreign_marks,
                foreign_subtitles: sidecar.subtitles.len(),
            };
        }

        if self.require_commit_match
            && sidecar.st_sync_commit.as_deref() != Some(operations.from_git_commit.as_str())
        {
            return TransferStrategy::ResolveMismatchCommits {
                expected: operations.from_git_commit.clone(),
                found: sidecar.st_sync_commit.clone(),
            };
        }

        if let Some(op) = operations.operations.iter().find(|op| starts_document(op)) {
            return TransferStrategy::ReviewManually(format!(
                "operation {} ({}) places a boundary at the start of the document",
                op.operation_id, op.operation_type
            ));
        }

        TransferStrategy::ApplyAsIs
    }

    /// Select a strategy and apply the operations when it allows
    pub fn transfer(
        &self,
        document: &ForeignDocument,
        from_subtitles: &[Subtitle],
        to_subtitles: &[Subtitle],
        operations: &OperationsForFile,
    ) -> Result<ForeignTransferResult, TransferError> {
        let foreign = TokenStream::parse(&document.content)?;
        let strategy = self.select_strategy(operations, from_subtitles, &foreign, &document.sidecar);
        if strategy.needs_review() {
            warn!("{}: {}", document.file_path, strategy);
            return Err(TransferError::NeedsReview(strategy.to_string()));
        }

        let (stream, subtitles, review_notes) = apply_to_foreign_content_at(
            from_subtitles,
            to_subtitles,
            &foreign,
            &document.sidecar.subtitles,
            &operations.operations,
        )?;
        debug!(
            "{}: transferred {} operations, {} subtitles",
            document.file_path,
            operations.operations.len(),
            subtitles.len()
        );
        Ok(ForeignTransferResult {
            content: stream.to_content_at(),
            sidecar: SubtitleSidecar::new(Some(operations.to_git_commit.clone()), subtitles),
            review_notes,
        })
    }
}

// Inserts and moves without a left neighbor have no foreign span to work in
fn starts_document(op: &SubtitleOperation) -> bool {
    match op.operation_type {
        OperationType::Insert | OperationType::MoveLeft | OperationType::MoveRight => {
            op.affected_stids.len() == 1
        }
        _ => false,
    }
}

/// Apply primary operations to a foreign token stream.
///
/// `foreign_subtitles` carries the foreign attributes, matched to the
/// foreign subtitle marks by index. Returns the new stream, the new foreign
/// subtitles and review notes.
pub fn apply_to_foreign_content_at(
    from_subtitles: &[Subtitle],
    to_subtitles: &[Subtitle],
    foreign: &TokenStream,
    foreign_subtitles: &[Subtitle],
    operations: &[SubtitleOperation],
) -> Result<(TokenStream, Vec<Subtitle>, Vec<ReviewNote>), TransferError> {
    let plain: Vec<char> = foreign.plain_text().chars().collect();
    let spans = subtitle_spans(foreign);
    if spans.len() != from_subtitles.len() {
        return Err(TransferError::NeedsReview(format!(
            "foreign document has {} subtitles, primary has {}",
            spans.len(),
            from_subtitles.len()
        )));
    }

    let mut primary = from_subtitles.to_vec();
    let mut boundaries: Vec<ForeignBoundary> = spans
        .iter()
        .zip(&primary)
        .enumerate()
        .map(|(k, (span, subtitle))| ForeignBoundary {
            persistent_id: subtitle.persistent_id.clone(),
            plain_offset: span.plain_offset,
            attrs: foreign_subtitles.get(k).map(|s| s.attrs.clone()).unwrap_or_default(),
        })
        .collect();
    let mut review_notes = Vec::new();

    for op in operations {
        let (start, count) = affected_run(&primary, op)?;
        apply_operation(&mut primary, op)?;

        let old_run: Vec<ForeignBoundary> = boundaries[start..start + count].to_vec();
        let replacement = match op.operation_type {
            OperationType::Insert | OperationType::Split | OperationType::MoveLeft | OperationType::MoveRight => {
                if starts_document(op) || old_run.is_empty() {
                    return Err(TransferError::NeedsReview(format!(
                        "operation {} ({}) has no foreign span to place a boundary in",
                        op.operation_id, op.operation_type
                    )));
                }
                let span_end = boundaries
                    .get(start + count)
                    .map_or(plain.len(), |b| b.plain_offset);
                interpolate(op, &old_run, &plain[..span_end])?
            }
            OperationType::ContentChange => {
                if let Some(salient) = op.salient_subtitle() {
                    review_notes.push(ReviewNote {
                        operation_id: op.operation_id,
                        persistent_id: salient.persistent_id.clone(),
                        message: format!("subtitle #{} changed wording in the primary text", start + 1),
                    });
                }
                old_run
            }
            OperationType::Delete | OperationType::Merge | OperationType::RecordIdChange => old_run
                .into_iter()
                .filter(|b| {
                    op.affected_stids
                        .iter()
                        .any(|a| a.persistent_id == b.persistent_id && a.after.is_some())
                })
                .collect(),
        };
        boundaries.splice(start..start + count, replacement);
    }

    if boundaries.len() != to_subtitles.len() {
        return Err(TransferError::CountMismatch {
            expected: to_subtitles.len(),
            found: boundaries.len(),
        });
    }

    let stream = rebuild_stream(foreign, &boundaries);
    ensure_text_equivalent(&foreign.plain_text(), &stream.plain_text())?;

    let stored: Vec<Subtitle> = boundaries
        .into_iter()
        .map(|b| {
            let mut subtitle = Subtitle::new(b.persistent_id, None, "");
            subtitle.attrs = b.attrs;
            subtitle
        })
        .collect();
    let subtitles = bind_subtitles(&stream, &stored).map_err(|_| TransferError::CountMismatch {
        expected: stored.len(),
        found: stream.count(TokenKind::SubtitleMark),
    })?;
    Ok((stream, subtitles, review_notes))
}

// @returns: (first index, length) of the primary run an operation replaces
fn affected_run(primary: &[Subtitle], op: &SubtitleOperation) -> Result<(usize, usize), TransferError> {
    let existing: Vec<&str> = op
        .affected_stids
        .iter()
        .filter(|a| a.before.is_some())
        .map(|a| a.persistent_id.as_str())
        .collect();
    let position = |id: &str| primary.iter().position(|s| s.persistent_id == id);

    match existing.first() {
        Some(first) => {
            let start = position(first).ok_or_else(|| OperationError::UnknownStid {
                operation_id: op.operation_id,
                stid: first.to_string(),
            })?;
            Ok((start, existing.len()))
        }
        None => {
            let start = match &op.after_stid {
                Some(anchor) => position(anchor).map_or(0, |idx| idx + 1),
                None => 0,
            };
            Ok((start, 0))
        }
    }
}

// Place the boundaries of every kept or created subtitle inside the old run's
// foreign span, proportionally to the primary word counts
fn interpolate(
    op: &SubtitleOperation,
    old_run: &[ForeignBoundary],
    plain_until_span_end: &[char],
) -> Result<Vec<ForeignBoundary>, TransferError> {
    let span_start = old_run[0].plain_offset;
    let word_ends = word_ends(plain_until_span_end, span_start);
    let entries: Vec<_> = op.affected_stids.iter().filter(|a| a.after.is_some()).collect();

    let weights: Vec<usize> = entries
        .iter()
        .map(|a| {
            a.after
                .as_ref()
                .map_or(0, |state| state.content.split_whitespace().count())
        })
        .collect();
    let total: usize = weights.iter().sum();
    let (weights, total) = if total == 0 {
        (vec![1; entries.len()], entries.len())
    } else {
        (weights, total)
    };

    let n = word_ends.len();
    let cuts_needed = entries.len() - 1;
    if n < cuts_needed + 1 {
        return Err(TransferError::NeedsReview(format!(
            "operation {} needs {} boundaries in a foreign span of {} words",
            op.operation_id, cuts_needed, n
        )));
    }

    let mut replacement = Vec::with_capacity(entries.len());
    let mut cumulative = 0;
    let mut previous_cut = 0;
    for (t, entry) in entries.iter().enumerate() {
        let attrs = old_run
            .iter()
            .find(|b| b.persistent_id == entry.persistent_id)
            .map(|b| b.attrs.clone())
            .unwrap_or_default();
        let plain_offset = if t == 0 {
            span_start
        } else {
            // Words before the cut, floor rounded, at least one word per side
            let scaled = cumulative * n / total;
            let highest = n - (cuts_needed - t) - 1;
            let words_before = scaled.clamp(previous_cut + 1, highest);
            previous_cut = words_before;
            word_ends[words_before - 1]
        };
        replacement.push(ForeignBoundary {
            persistent_id: entry.persistent_id.clone(),
            plain_offset,
            attrs,
        });
        cumulative += weights[t];
    }
    Ok(replacement)
}

// @returns: Offsets just past the last character of each word from `start`
fn word_ends(plain: &[char], start: usize) -> Vec<usize> {
    let mut ends = Vec::new();
    for idx in start..plain.len() {
        let in_word = !plain[idx].is_whitespace();
        let next_in_word = plain.get(idx + 1).is_some_and(|c| !c.is_whitespace());
        if in_word && !next_in_word {
            ends.push(idx + 1);
        }
    }
    ends
}

// Keep unchanged marks where they were, drop the others, then add new marks
// after any record or paragraph tokens at the same offset and before gap marks
fn rebuild_stream(foreign: &TokenStream, boundaries: &[ForeignBoundary]) -> TokenStream {
    let mut wanted: BTreeMap<usize, usize> = BTreeMap::new();
    for boundary in boundaries {
        *wanted.entry(boundary.plain_offset).or_default() += 1;
    }

    let mut tokens: Vec<AnchoredToken> = Vec::new();
    for anchored in foreign.anchored_tokens(&TokenKind::ALL) {
        if anchored.token.kind() == TokenKind::SubtitleMark {
            match wanted.get_mut(&anchored.plain_offset) {
                Some(count) if *count > 0 => *count -= 1,
                _ => continue,
            }
        }
        tokens.push(anchored);
    }

    for (offset, count) in wanted {
        for _ in 0..count {
            let idx = tokens
                .iter()
                .position(|t| {
                    t.plain_offset > offset
                        || (t.plain_offset == offset
                            && matches!(t.token.kind(), TokenKind::GapMark | TokenKind::SubtitleMark))
                })
                .unwrap_or(tokens.len());
            tokens.insert(
                idx,
                AnchoredToken {
                    plain_offset: offset,
                    token: Token::subtitle_mark(),
                },
            );
        }
    }

    TokenStream::from_plain_with_tokens(&foreign.plain_text(), tokens)
}
