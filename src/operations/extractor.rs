/*!
 * Operation extraction.
 *
 * Compares two snapshots of one content AT document and describes the
 * subtitle boundary changes as an ordered list of typed operations:
 *
 * 1. Subtitle start offsets (plain text characters) of both snapshots.
 * 2. A character diff of the plain texts; every old boundary is mapped to
 *    the new text.
 * 3. Old boundaries that land exactly on a new boundary are kept anchors.
 *    Between two anchors, old boundaries are removed and new ones added.
 * 4. Each region between anchors is classified on its own.
 *
 * The operations are then applied to the old subtitle list and must
 * reproduce the new one, otherwise the input is rejected.
 */

use log::{debug, trace};

use super::apply::apply_operations;
use super::operation::{AffectedStid, OperationType, SubtitleOperation, SubtitleState};
use super::store::{CommitRange, OperationsForFile};
use crate::app_config::ExtractionConfig;
use crate::content_at::{Hunk, TextDiff, TokenStream};
use crate::errors::ExtractionError;
use crate::subtitle::{bind_subtitles, subtitle_spans, Subtitle, SubtitleSpan};

/// Both snapshots of one document, as supplied by the repository layer
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotPair {
    /// Path of the document, relative to the repository
    pub file_path: String,
    /// Content AT at the from commit
    pub from_content: String,
    /// Content AT at the to commit
    pub to_content: String,
    /// Subtitles at the from commit, in document order
    pub from_subtitles: Vec<Subtitle>,
}

/// Result of extracting one document
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedFile {
    pub operations: OperationsForFile,
    /// Subtitles at the from commit, bound to the from snapshot
    pub from_subtitles: Vec<Subtitle>,
    /// Subtitles at the to commit; new ones carry placeholder ids until resolved
    pub to_subtitles: Vec<Subtitle>,
    placeholders: Vec<String>,
}

impl ExtractedFile {
    /// Placeholder ids still waiting for persistent ids
    pub fn placeholder_ids(&self) -> &[String] {
        &self.placeholders
    }

    /// Replace placeholders with fresh ids, in placeholder order
    pub fn resolve_placeholders(&mut self, fresh_ids: &[String]) -> Result<(), ExtractionError> {
        if fresh_ids.len() != self.placeholders.len() {
            return Err(ExtractionError::InvalidInputData {
                file: self.operations.file_path.clone(),
                reason: format!(
                    "{} placeholder ids but {} fresh ids",
                    self.placeholders.len(),
                    fresh_ids.len()
                ),
            });
        }
        for (placeholder, fresh) in self.placeholders.iter().zip(fresh_ids) {
            for operation in &mut self.operations.operations {
                operation.rename_stid(placeholder, fresh);
            }
            for subtitle in &mut self.to_subtitles {
                if subtitle.persistent_id == *placeholder {
                    subtitle.persistent_id = fresh.clone();
                }
            }
        }
        self.placeholders.clear();
        Ok(())
    }
}

/// Extracts subtitle operations from two snapshots of a document
#[derive(Debug, Clone)]
pub struct SubtitleOperationExtractor {
    hunk_proximity: usize,
    placeholder_prefix: String,
}

impl Default for SubtitleOperationExtractor {
    fn default() -> Self {
        Self::from_config(&ExtractionConfig::default())
    }
}

impl SubtitleOperationExtractor {
    pub fn new(hunk_proximity: usize, placeholder_prefix: impl Into<String>) -> Self {
        Self {
            hunk_proximity,
            placeholder_prefix: placeholder_prefix.into(),
        }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(config.hunk_proximity, config.placeholder_prefix.clone())
    }

    /// Extract the operations of one document, numbered from `first_operation_id`
    pub fn extract(
        &self,
        pair: &SnapshotPair,
        commits: &CommitRange,
        first_operation_id: usize,
    ) -> Result<ExtractedFile, ExtractionError> {
        let file = pair.file_path.as_str();
        let token_err = |source| ExtractionError::Token {
            file: file.to_string(),
            source,
        };
        let from_stream = TokenStream::parse(&pair.from_content).map_err(token_err)?;
        let to_stream = TokenStream::parse(&pair.to_content).map_err(token_err)?;

        let from_subtitles = bind_subtitles(&from_stream, &pair.from_subtitles)
            .map_err(|e| invalid(file, e.to_string()))?;
        let from_spans = subtitle_spans(&from_stream);
        let to_spans = subtitle_spans(&to_stream);

        let diff = TextDiff::new(&from_stream.plain_text(), &to_stream.plain_text());
        let mapped: Vec<usize> = from_spans
            .iter()
            .map(|span| diff.map_offset(span.plain_offset))
            .collect();
        let anchors = match_boundaries(&mapped, &to_spans);
        trace!(
            "{}: {} old boundaries, {} new, {} kept",
            file,
            from_spans.len(),
            to_spans.len(),
            anchors.len()
        );

        let mut extraction = Extraction {
            proximity: self.hunk_proximity,
            prefix: &self.placeholder_prefix,
            from: &from_subtitles,
            from_spans: &from_spans,
            to_spans: &to_spans,
            mapped: &mapped,
            hunks: diff.hunks(),
            to_ids: vec![None; to_spans.len()],
            placeholders: Vec::new(),
            operations: Vec::new(),
            next_id: first_operation_id,
        };
        for &(i, j) in &anchors {
            extraction.to_ids[j] = Some(from_subtitles[i].persistent_id.clone());
        }

        for region in regions(&anchors, from_spans.len(), to_spans.len()) {
            extraction.classify(&region);
        }

        let Extraction {
            to_ids,
            placeholders,
            operations,
            ..
        } = extraction;

        let mut to_subtitles = Vec::with_capacity(to_spans.len());
        for (span, id) in to_spans.iter().zip(to_ids) {
            let id = id.ok_or_else(|| invalid(file, "new subtitle left without id".to_string()))?;
            let mut subtitle = Subtitle::new(id, span.record_id.clone(), span.content.clone());
            if let Some(old) = from_subtitles.iter().find(|s| s.persistent_id == subtitle.persistent_id) {
                subtitle.attrs = old.attrs.clone();
            }
            to_subtitles.push(subtitle);
        }

        verify(file, &from_subtitles, &to_subtitles, &operations)?;
        debug!(
            "{}: {} operations ({} new subtitles)",
            file,
            operations.len(),
            placeholders.len()
        );

        Ok(ExtractedFile {
            operations: OperationsForFile::new(file, commits, operations),
            from_subtitles,
            to_subtitles,
            placeholders,
        })
    }
}

fn invalid(file: &str, reason: String) -> ExtractionError {
    ExtractionError::InvalidInputData {
        file: file.to_string(),
        reason,
    }
}

// @returns: (old index, new index) of boundaries kept in place
fn match_boundaries(mapped: &[usize], to_spans: &[SubtitleSpan]) -> Vec<(usize, usize)> {
    let mut anchors = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < mapped.len() && j < to_spans.len() {
        match mapped[i].cmp(&to_spans[j].plain_offset) {
            std::cmp::Ordering::Equal => {
                anchors.push((i, j));
                i += 1;
                j += 1;
            }
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
        }
    }
    anchors
}

// @struct: Removed and added boundaries after one kept anchor (or before the first)
struct Region {
    left: Option<(usize, usize)>,
    removed: Vec<usize>,
    added: Vec<usize>,
}

fn regions(anchors: &[(usize, usize)], from_len: usize, to_len: usize) -> Vec<Region> {
    let (first_from, first_to) = anchors.first().copied().unwrap_or((from_len, to_len));
    let mut regions = vec![Region {
        left: None,
        removed: (0..first_from).collect(),
        added: (0..first_to).collect(),
    }];
    for (k, &(i, j)) in anchors.iter().enumerate() {
        let (next_from, next_to) = anchors.get(k + 1).copied().unwrap_or((from_len, to_len));
        regions.push(Region {
            left: Some((i, j)),
            removed: (i + 1..next_from).collect(),
            added: (j + 1..next_to).collect(),
        });
    }
    regions
}

// @struct: Working state of one extraction
struct Extraction<'a> {
    proximity: usize,
    prefix: &'a str,
    from: &'a [Subtitle],
    from_spans: &'a [SubtitleSpan],
    to_spans: &'a [SubtitleSpan],
    mapped: &'a [usize],
    hunks: Vec<Hunk>,
    to_ids: Vec<Option<String>>,
    placeholders: Vec<String>,
    operations: Vec<SubtitleOperation>,
    next_id: usize,
}

impl Extraction<'_> {
    fn classify(&mut self, region: &Region) {
        let Some((left, left_to)) = region.left else {
            self.classify_preamble(region);
            return;
        };
        match (region.removed.len(), region.added.len()) {
            (0, 0) => self.unchanged_boundaries(left, left_to),
            (0, _) => {
                self.assign_placeholders(&region.added);
                if self.text_changed_near_added(&region.added) {
                    self.split(left, left_to, &region.added);
                } else {
                    self.inserts(left, left_to, &region.added);
                }
            }
            (_, 0) => {
                if self.text_changed_near_removed(&region.removed) {
                    self.merge(left, &region.removed, self.to_state(left_to));
                } else {
                    self.deletes(left, left_to, &region.removed);
                }
            }
            (1, 1) => self.moved(Some((left, left_to)), region.removed[0], region.added[0]),
            _ if !self.text_changed_near_removed(&region.removed)
                && !self.text_changed_near_added(&region.added) =>
            {
                self.shifted(left, left_to, &region.removed, &region.added);
            }
            _ => {
                // Merge everything into the left subtitle, then split it again
                let mut merged = self.to_state(left_to);
                for &j in &region.added {
                    merged.content.push_str(&self.to_spans[j].content);
                }
                self.merge(left, &region.removed, merged.clone());
                self.assign_placeholders(&region.added);
                let mut affected = vec![AffectedStid::new(
                    self.from[left].persistent_id.clone(),
                    Some(merged),
                    Some(self.to_state(left_to)),
                )];
                affected.extend(self.created(&region.added));
                self.push(OperationType::Split, affected, None);
            }
        }
    }

    // Text before the first kept boundary belongs to no subtitle
    fn classify_preamble(&mut self, region: &Region) {
        if region.removed.len() == 1 && region.added.len() == 1 {
            self.moved(None, region.removed[0], region.added[0]);
            return;
        }
        for &i in &region.removed {
            let affected = vec![AffectedStid::new(
                self.from[i].persistent_id.clone(),
                Some(self.from[i].state()),
                None,
            )];
            self.push(OperationType::Delete, affected, None);
        }
        self.assign_placeholders(&region.added);
        let mut previous: Option<String> = None;
        for &j in &region.added {
            let id = self.to_id(j);
            let affected = vec![AffectedStid::new(id.clone(), None, Some(self.to_state(j)))];
            self.push(OperationType::Insert, affected, previous.replace(id));
        }
    }

    fn unchanged_boundaries(&mut self, left: usize, left_to: usize) {
        let before = self.from[left].state();
        let after = self.to_state(left_to);
        let operation_type = if before.content != after.content {
            OperationType::ContentChange
        } else if before.record_id != after.record_id {
            OperationType::RecordIdChange
        } else {
            return;
        };
        let affected = vec![AffectedStid::new(
            self.from[left].persistent_id.clone(),
            Some(before),
            Some(after),
        )];
        self.push(operation_type, affected, None);
    }

    // One insert per new boundary, left to right
    fn inserts(&mut self, left: usize, left_to: usize, added: &[usize]) {
        let mut left_id = self.from[left].persistent_id.clone();
        let mut left_before = self.from[left].state();
        for (m, &j) in added.iter().enumerate() {
            let left_after = if m == 0 {
                self.to_state(left_to)
            } else {
                self.to_state(added[m - 1])
            };
            let mut rest = self.to_state(j);
            for &k in &added[m + 1..] {
                rest.content.push_str(&self.to_spans[k].content);
            }
            let new_id = self.to_id(j);
            let affected = vec![
                AffectedStid::new(left_id.clone(), Some(left_before), Some(left_after)),
                AffectedStid::new(new_id.clone(), None, Some(rest.clone())),
            ];
            self.push(OperationType::Insert, affected, Some(left_id));
            left_id = new_id;
            left_before = rest;
        }
    }

    // One delete per removed boundary, left to right
    fn deletes(&mut self, left: usize, left_to: usize, removed: &[usize]) {
        let left_id = self.from[left].persistent_id.clone();
        let mut left_before = self.from[left].state();
        for (m, &i) in removed.iter().enumerate() {
            let left_after = if m + 1 == removed.len() {
                self.to_state(left_to)
            } else {
                let mut joined = left_before.clone();
                joined.content.push_str(&self.from[i].content);
                joined
            };
            let affected = vec![
                AffectedStid::new(left_id.clone(), Some(left_before), Some(left_after.clone())),
                AffectedStid::new(self.from[i].persistent_id.clone(), Some(self.from[i].state()), None),
            ];
            self.push(OperationType::Delete, affected, Some(left_id.clone()));
            left_before = left_after;
        }
    }

    fn merge(&mut self, left: usize, removed: &[usize], after: SubtitleState) {
        let mut affected = vec![AffectedStid::new(
            self.from[left].persistent_id.clone(),
            Some(self.from[left].state()),
            Some(after),
        )];
        for &i in removed {
            affected.push(AffectedStid::new(
                self.from[i].persistent_id.clone(),
                Some(self.from[i].state()),
                None,
            ));
        }
        self.push(OperationType::Merge, affected, None);
    }

    fn split(&mut self, left: usize, left_to: usize, added: &[usize]) {
        let mut affected = vec![AffectedStid::new(
            self.from[left].persistent_id.clone(),
            Some(self.from[left].state()),
            Some(self.to_state(left_to)),
        )];
        affected.extend(self.created(added));
        self.push(OperationType::Split, affected, None);
    }

    // A single boundary changed place; the subtitle keeps its id
    fn moved(&mut self, left: Option<(usize, usize)>, removed: usize, added: usize) {
        let id = self.from[removed].persistent_id.clone();
        self.to_ids[added] = Some(id.clone());

        let operation_type = if self.to_spans[added].plain_offset < self.mapped[removed] {
            OperationType::MoveLeft
        } else {
            OperationType::MoveRight
        };
        let mut affected = Vec::with_capacity(2);
        if let Some((left, left_to)) = left {
            affected.push(AffectedStid::new(
                self.from[left].persistent_id.clone(),
                Some(self.from[left].state()),
                Some(self.to_state(left_to)),
            ));
        }
        affected.push(AffectedStid::new(
            id,
            Some(self.from[removed].state()),
            Some(self.to_state(added)),
        ));
        self.push(operation_type, affected, None);
    }

    // Boundaries shifted without nearby text changes. Removed and added
    // boundaries are paired in order and keep their ids; extra removed ones
    // are deleted and extra added ones inserted.
    fn shifted(&mut self, left: usize, left_to: usize, removed: &[usize], added: &[usize]) {
        let mut walk = RegionWalk::new(self, left, left_to, removed, added);
        let paired = removed.len().min(added.len());

        for _ in paired..removed.len() {
            walk.delete(self, paired + 1);
        }
        for t in 0..paired {
            self.to_ids[added[t]] = Some(self.from[removed[t]].persistent_id.clone());
            walk.slots[t + 1].target = Some(added[t]);
        }
        // Right shifts from the right end, then left shifts from the left end,
        // so boundaries never cross
        for t in (0..paired).rev() {
            if self.to_spans[added[t]].plain_offset > walk.slots[t + 1].offset {
                walk.shift(self, t + 1, added[t]);
            }
        }
        for t in 0..paired {
            if self.to_spans[added[t]].plain_offset < walk.slots[t + 1].offset {
                walk.shift(self, t + 1, added[t]);
            }
        }
        self.assign_placeholders(&added[paired..]);
        for t in paired..added.len() {
            walk.insert(self, t + 1, added[t]);
        }
        walk.settle(self);
    }

    fn created(&self, added: &[usize]) -> Vec<AffectedStid> {
        added
            .iter()
            .map(|&j| AffectedStid::new(self.to_id(j), None, Some(self.to_state(j))))
            .collect()
    }

    fn text_changed_near_removed(&self, removed: &[usize]) -> bool {
        removed.iter().any(|&i| {
            let offset = self.from_spans[i].plain_offset;
            self.hunks.iter().any(|h| h.distance_to(offset) <= self.proximity)
        })
    }

    fn text_changed_near_added(&self, added: &[usize]) -> bool {
        added.iter().any(|&j| {
            let offset = self.to_spans[j].plain_offset;
            self.hunks.iter().any(|h| {
                let distance = if offset < h.new_start {
                    h.new_start - offset
                } else {
                    offset.saturating_sub(h.new_end)
                };
                distance <= self.proximity
            })
        })
    }

    fn assign_placeholders(&mut self, added: &[usize]) {
        for &j in added {
            if self.to_ids[j].is_none() {
                let placeholder = format!("{}{}", self.prefix, self.placeholders.len() + 1);
                self.to_ids[j] = Some(placeholder.clone());
                self.placeholders.push(placeholder);
            }
        }
    }

    fn to_id(&self, j: usize) -> String {
        self.to_ids[j].clone().unwrap_or_default()
    }

    fn to_state(&self, j: usize) -> SubtitleState {
        SubtitleState::new(self.to_spans[j].content.clone(), self.to_spans[j].record_id.clone())
    }

    fn push(&mut self, operation_type: OperationType, affected: Vec<AffectedStid>, after_stid: Option<String>) {
        trace!("operation {} {}", self.next_id, operation_type);
        self.operations.push(SubtitleOperation::new(
            operation_type,
            self.next_id,
            affected,
            after_stid,
        ));
        self.next_id += 1;
    }
}

// @struct: One subtitle of a region while its boundaries are being shifted
struct Slot {
    id: String,
    // @field: Start offset in new plain text coordinates
    offset: usize,
    record_id: Option<String>,
    state: SubtitleState,
    // @field: Index of the new subtitle this slot ends up as
    target: Option<usize>,
}

// Subtitles of one region, with contents cut from the new text
struct RegionWalk {
    start: usize,
    text: Vec<char>,
    slots: Vec<Slot>,
}

impl RegionWalk {
    fn new(
        extraction: &Extraction<'_>,
        left: usize,
        left_to: usize,
        removed: &[usize],
        added: &[usize],
    ) -> Self {
        let last_to = added.last().copied().unwrap_or(left_to);
        let start = extraction.to_spans[left_to].plain_offset;
        let text: Vec<char> = extraction.to_spans[left_to..=last_to]
            .iter()
            .flat_map(|span| span.content.chars())
            .collect();
        let end = start + text.len();

        let mut slots = vec![Slot {
            id: extraction.from[left].persistent_id.clone(),
            offset: start,
            record_id: extraction.to_spans[left_to].record_id.clone(),
            state: extraction.from[left].state(),
            target: Some(left_to),
        }];
        let mut floor = start;
        for &i in removed {
            floor = extraction.mapped[i].clamp(floor, end);
            slots.push(Slot {
                id: extraction.from[i].persistent_id.clone(),
                offset: floor,
                record_id: extraction.from[i].record_id.clone(),
                state: extraction.from[i].state(),
                target: None,
            });
        }
        Self { start, text, slots }
    }

    fn cut(&self, k: usize) -> SubtitleState {
        let from = self.slots[k].offset - self.start;
        let to = self
            .slots
            .get(k + 1)
            .map_or(self.text.len(), |next| next.offset - self.start);
        SubtitleState::new(
            self.text[from..to].iter().collect::<String>(),
            self.slots[k].record_id.clone(),
        )
    }

    fn recut(&mut self, k: usize) -> (SubtitleState, SubtitleState) {
        let after = self.cut(k);
        let before = std::mem::replace(&mut self.slots[k].state, after.clone());
        (before, after)
    }

    fn shift(&mut self, extraction: &mut Extraction<'_>, k: usize, j: usize) {
        let target = &extraction.to_spans[j];
        let operation_type = if target.plain_offset < self.slots[k].offset {
            OperationType::MoveLeft
        } else {
            OperationType::MoveRight
        };
        self.slots[k].offset = target.plain_offset;
        self.slots[k].record_id = target.record_id.clone();

        let (left_before, left_after) = self.recut(k - 1);
        let (before, after) = self.recut(k);
        let affected = vec![
            AffectedStid::new(self.slots[k - 1].id.clone(), Some(left_before), Some(left_after)),
            AffectedStid::new(self.slots[k].id.clone(), Some(before), Some(after)),
        ];
        extraction.push(operation_type, affected, None);
    }

    fn delete(&mut self, extraction: &mut Extraction<'_>, k: usize) {
        let gone = self.slots.remove(k);
        let (left_before, left_after) = self.recut(k - 1);
        let left_id = self.slots[k - 1].id.clone();
        let affected = vec![
            AffectedStid::new(left_id.clone(), Some(left_before), Some(left_after)),
            AffectedStid::new(gone.id, Some(gone.state), None),
        ];
        extraction.push(OperationType::Delete, affected, Some(left_id));
    }

    fn insert(&mut self, extraction: &mut Extraction<'_>, k: usize, j: usize) {
        let target = &extraction.to_spans[j];
        self.slots.insert(
            k,
            Slot {
                id: extraction.to_id(j),
                offset: target.plain_offset,
                record_id: target.record_id.clone(),
                state: SubtitleState::new("", None),
                target: Some(j),
            },
        );
        let (left_before, left_after) = self.recut(k - 1);
        let (_, after) = self.recut(k);
        let left_id = self.slots[k - 1].id.clone();
        let affected = vec![
            AffectedStid::new(left_id.clone(), Some(left_before), Some(left_after)),
            AffectedStid::new(self.slots[k].id.clone(), None, Some(after)),
        ];
        extraction.push(OperationType::Insert, affected, Some(left_id));
    }

    // Subtitles whose boundaries stayed put may still differ from the new text
    fn settle(&mut self, extraction: &mut Extraction<'_>) {
        for slot in &mut self.slots {
            let Some(j) = slot.target else { continue };
            let after = extraction.to_state(j);
            let operation_type = if slot.state.content != after.content {
                OperationType::ContentChange
            } else if slot.state.record_id != after.record_id {
                OperationType::RecordIdChange
            } else {
                continue;
            };
            let before = std::mem::replace(&mut slot.state, after.clone());
            let affected = vec![AffectedStid::new(slot.id.clone(), Some(before), Some(after))];
            extraction.push(operation_type, affected, None);
        }
    }
}

// Replaying the operations on the old list must give the new list
fn verify(
    file: &str,
    from: &[Subtitle],
    to: &[Subtitle],
    operations: &[SubtitleOperation],
) -> Result<(), ExtractionError> {
    let delta: isize = operations.iter().map(SubtitleOperation::count_delta).sum();
    if from.len() as isize + delta != to.len() as isize {
        return Err(invalid(
            file,
            format!(
                "{} subtitles before and {} after, but operations change the count by {}",
                from.len(),
                to.len(),
                delta
            ),
        ));
    }

    let mut replayed = from.to_vec();
    apply_operations(&mut replayed, operations).map_err(|source| ExtractionError::Operation {
        file: file.to_string(),
        source,
    })?;
    let same = replayed.len() == to.len()
        && replayed
            .iter()
            .zip(to)
            .all(|(a, b)| a.persistent_id == b.persistent_id && a.state() == b.state());
    if !same {
        return Err(invalid(
            file,
            "operations do not reproduce the new subtitles".to_string(),
        ));
    }
    Ok(())
}
