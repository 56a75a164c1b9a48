/*!
 * Applying operations to a subtitle list.
 *
 * Every `before` state is checked against the list before anything is
 * changed, then the affected run is replaced in one splice. Applying an
 * operation and then its inverse gives back the original list.
 */

use std::collections::BTreeMap;

use super::operation::{AffectedStid, OperationType, SubtitleOperation};
use crate::errors::OperationError;
use crate::subtitle::Subtitle;

/// Apply one operation in place
pub fn apply_operation(
    subtitles: &mut Vec<Subtitle>,
    operation: &SubtitleOperation,
) -> Result<(), OperationError> {
    check_shape(operation)?;
    let id = operation.operation_id;

    // Collect positions and verify states before mutating anything
    let mut existing = Vec::new();
    for affected in &operation.affected_stids {
        let position = position_of(subtitles, &affected.persistent_id);
        match (&affected.before, position) {
            (Some(before), Some(idx)) => {
                let current = subtitles[idx].state();
                if &current != before {
                    return Err(OperationError::PreconditionFailed {
                        operation_id: id,
                        stid: affected.persistent_id.clone(),
                        reason: format!(
                            "expected {:?} (record {:?}), found {:?} (record {:?})",
                            before.content, before.record_id, current.content, current.record_id
                        ),
                    });
                }
                existing.push(idx);
            }
            (Some(_), None) => {
                return Err(OperationError::UnknownStid {
                    operation_id: id,
                    stid: affected.persistent_id.clone(),
                });
            }
            (None, Some(_)) => {
                return Err(OperationError::PreconditionFailed {
                    operation_id: id,
                    stid: affected.persistent_id.clone(),
                    reason: "subtitle to create already exists".to_string(),
                });
            }
            (None, None) => {}
        }
    }

    if existing.windows(2).any(|w| w[1] != w[0] + 1) {
        return Err(OperationError::PreconditionFailed {
            operation_id: id,
            stid: operation.affected_stids[0].persistent_id.clone(),
            reason: "affected subtitles are not adjacent".to_string(),
        });
    }

    let start = match existing.first() {
        Some(&first) => {
            check_anchor(subtitles, operation, first)?;
            first
        }
        // Only a lone insert touches no existing subtitle
        None => match &operation.after_stid {
            Some(anchor) => {
                position_of(subtitles, anchor).ok_or_else(|| OperationError::UnknownStid {
                    operation_id: id,
                    stid: anchor.clone(),
                })? + 1
            }
            None => 0,
        },
    };
    let end = start + existing.len();

    let mut attrs: BTreeMap<&str, _> = BTreeMap::new();
    for subtitle in &subtitles[start..end] {
        attrs.insert(subtitle.persistent_id.as_str(), subtitle.attrs.clone());
    }
    let replacement: Vec<Subtitle> = operation
        .affected_stids
        .iter()
        .filter_map(|affected| {
            affected.after.as_ref().map(|after| {
                let mut subtitle = Subtitle::new(
                    affected.persistent_id.clone(),
                    after.record_id.clone(),
                    after.content.clone(),
                );
                if let Some(kept) = attrs.get(affected.persistent_id.as_str()) {
                    subtitle.attrs = kept.clone();
                }
                subtitle
            })
        })
        .collect();

    subtitles.splice(start..end, replacement);
    Ok(())
}

/// Apply operations in order
pub fn apply_operations<'a>(
    subtitles: &mut Vec<Subtitle>,
    operations: impl IntoIterator<Item = &'a SubtitleOperation>,
) -> Result<(), OperationError> {
    for operation in operations {
        apply_operation(subtitles, operation)?;
    }
    Ok(())
}

fn position_of(subtitles: &[Subtitle], stid: &str) -> Option<usize> {
    subtitles.iter().position(|s| s.persistent_id == stid)
}

// A subtitle that only exists before (or only after) must not sit at the head
fn check_anchor(
    subtitles: &[Subtitle],
    operation: &SubtitleOperation,
    first: usize,
) -> Result<(), OperationError> {
    let lone = operation.affected_stids.len() == 1;
    let anchored = match operation.operation_type {
        OperationType::Delete | OperationType::MoveLeft | OperationType::MoveRight if lone => true,
        _ => false,
    };
    if !anchored {
        return Ok(());
    }
    let previous = first.checked_sub(1).map(|idx| subtitles[idx].persistent_id.as_str());
    if previous == operation.after_stid.as_deref() {
        return Ok(());
    }
    Err(OperationError::PreconditionFailed {
        operation_id: operation.operation_id,
        stid: operation.affected_stids[0].persistent_id.clone(),
        reason: format!(
            "expected to follow {:?}, follows {:?}",
            operation.after_stid, previous
        ),
    })
}

fn check_shape(operation: &SubtitleOperation) -> Result<(), OperationError> {
    let affected = &operation.affected_stids;
    let malformed = |reason: &str| OperationError::Malformed {
        operation_id: operation.operation_id,
        reason: format!("{}: {}", operation.operation_type, reason),
    };
    let kept = |a: &AffectedStid| a.before.is_some() && a.after.is_some();
    let created = |a: &AffectedStid| a.before.is_none() && a.after.is_some();
    let removed = |a: &AffectedStid| a.before.is_some() && a.after.is_none();

    let Some(last) = affected.last() else {
        return Err(malformed("no affected subtitles"));
    };
    let first = &affected[0];

    match operation.operation_type {
        OperationType::Insert | OperationType::Delete => {
            let edge_ok = if operation.operation_type == OperationType::Insert {
                created(last)
            } else {
                removed(last)
            };
            if !edge_ok || affected.len() > 2 {
                return Err(malformed("expected [left, subtitle] or [subtitle]"));
            }
            if affected.len() == 2 {
                if !kept(first) {
                    return Err(malformed("left neighbor must keep its id"));
                }
                if operation.after_stid.as_deref() != Some(first.persistent_id.as_str()) {
                    return Err(malformed("after_stid must name the left neighbor"));
                }
            }
        }
        OperationType::Merge => {
            if affected.len() < 2 || !kept(first) || !affected[1..].iter().all(removed) {
                return Err(malformed("expected [survivor, absorbed...]"));
            }
        }
        OperationType::Split => {
            if affected.len() < 2 || !kept(first) || !affected[1..].iter().all(created) {
                return Err(malformed("expected [original, created...]"));
            }
        }
        OperationType::MoveLeft | OperationType::MoveRight => {
            if affected.len() > 2 || !affected.iter().all(kept) {
                return Err(malformed("expected [left, right] or [right]"));
            }
        }
        OperationType::ContentChange | OperationType::RecordIdChange => {
            if affected.len() != 1 || !kept(first) {
                return Err(malformed("expected exactly one subtitle"));
            }
        }
    }
    Ok(())
}
