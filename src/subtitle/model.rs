/*!
 * Subtitle model.
 *
 * A subtitle is the span from one `@` to the next `@` or the end of the
 * document. Text before the first `@` is the preamble and belongs to no
 * subtitle. Persistent ids and pass-through attributes live in a JSON sidecar
 * next to the content AT file; everything else is derived from the tokens.
 */

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::content_at::{Segment, TokenKind, TokenStream};
use crate::errors::SubtitleError;
use crate::operations::SubtitleState;

/// One subtitle with its identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtitle {
    /// Stable, globally unique id
    pub persistent_id: String,

    /// Id of the record containing the subtitle's mark
    #[serde(default)]
    pub record_id: Option<String>,

    /// Plain text of the span, whitespace kept
    #[serde(default)]
    pub content: String,

    /// Opaque attributes (timing etc.) carried along untouched
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, serde_json::Value>,
}

impl Subtitle {
    pub fn new(
        persistent_id: impl Into<String>,
        record_id: Option<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            persistent_id: persistent_id.into(),
            record_id,
            content: content.into(),
            attrs: BTreeMap::new(),
        }
    }

    /// Content and record id, as recorded in operations
    pub fn state(&self) -> SubtitleState {
        SubtitleState {
            content: self.content.clone(),
            record_id: self.record_id.clone(),
        }
    }

    /// Overwrite content and record id from an operation state
    pub fn set_state(&mut self, state: &SubtitleState) {
        self.content = state.content.clone();
        self.record_id = state.record_id.clone();
    }

    pub fn char_length(&self) -> usize {
        self.content.chars().count()
    }
}

/// Position and derived attributes of one subtitle in a token stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleSpan {
    /// Character offset of the subtitle start in the plain text
    pub plain_offset: usize,
    pub record_id: Option<String>,
    pub content: String,
}

/// Subtitle spans of a stream, in document order
pub fn subtitle_spans(stream: &TokenStream) -> Vec<SubtitleSpan> {
    let mut spans: Vec<SubtitleSpan> = Vec::new();
    let mut record_id: Option<String> = None;
    let mut plain_offset = 0;

    for segment in stream.segments() {
        match segment {
            Segment::Text(text) => {
                if let Some(span) = spans.last_mut() {
                    span.content.push_str(text);
                }
                plain_offset += text.chars().count();
            }
            Segment::Token(token) => match token.kind() {
                TokenKind::SubtitleMark => spans.push(SubtitleSpan {
                    plain_offset,
                    record_id: record_id.clone(),
                    content: String::new(),
                }),
                TokenKind::RecordMark => record_id = token.record_id().map(str::to_string),
                _ => {}
            },
        }
    }
    spans
}

/// Bind stored subtitles to the spans of a stream, by index.
///
/// Ids and attributes come from `stored`, content and record ids are
/// recomputed from the stream.
pub fn bind_subtitles(
    stream: &TokenStream,
    stored: &[Subtitle],
) -> Result<Vec<Subtitle>, SubtitleError> {
    let spans = subtitle_spans(stream);
    if spans.len() != stored.len() {
        return Err(SubtitleError::CountMismatch {
            expected: stored.len(),
            found: spans.len(),
        });
    }
    Ok(spans
        .into_iter()
        .zip(stored)
        .map(|(span, subtitle)| Subtitle {
            persistent_id: subtitle.persistent_id.clone(),
            record_id: span.record_id,
            content: span.content,
            attrs: subtitle.attrs.clone(),
        })
        .collect())
}

/// Subtitle attributes stored next to a content AT file
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SubtitleSidecar {
    /// Primary commit the subtitles were last synced to
    #[serde(default)]
    pub st_sync_commit: Option<String>,

    #[serde(default)]
    pub subtitles: Vec<Subtitle>,
}

impl SubtitleSidecar {
    pub fn new(st_sync_commit: Option<String>, subtitles: Vec<Subtitle>) -> Self {
        Self {
            st_sync_commit,
            subtitles,
        }
    }

    /// Persistent ids in document order
    pub fn persistent_ids(&self) -> Vec<&str> {
        self.subtitles
            .iter()
            .map(|s| s.persistent_id.as_str())
            .collect()
    }
}
