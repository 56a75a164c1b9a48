/*!
 * Token kinds and token occurrences embedded in content AT.
 *
 * A token is a structural marker interleaved with literal text. Every
 * occurrence keeps its exact literal form so a stream can be written back
 * byte for byte.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of structural marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// `@`, starts a subtitle
    SubtitleMark,
    /// `%`, marks a gap in the audio alignment
    GapMark,
    /// `^^^` with attached `{: .rid #f-<id>}`, starts a record
    RecordMark,
    /// `*<n>*{: .pn}`, a paragraph number span
    ParagraphNumber,
    /// A free-standing `{: ...}` inline attribute list
    IalSpan,
}

/// Where a token may appear relative to surrounding text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Anywhere inside text
    Inline,
    /// Only at the start of a line
    LineStart,
}

impl TokenKind {
    /// All token kinds
    pub const ALL: [TokenKind; 5] = [
        TokenKind::SubtitleMark,
        TokenKind::GapMark,
        TokenKind::RecordMark,
        TokenKind::ParagraphNumber,
        TokenKind::IalSpan,
    ];

    /// Snake case name used in reports and JSON
    pub fn name(&self) -> &'static str {
        match self {
            Self::SubtitleMark => "subtitle_mark",
            Self::GapMark => "gap_mark",
            Self::RecordMark => "record_mark",
            Self::ParagraphNumber => "paragraph_number",
            Self::IalSpan => "ial_span",
        }
    }

    /// Fixed marker that introduces the token
    pub fn marker(&self) -> &'static str {
        match self {
            Self::SubtitleMark => "@",
            Self::GapMark => "%",
            Self::RecordMark => "^^^",
            Self::ParagraphNumber => "*",
            Self::IalSpan => "{:",
        }
    }

    /// Whether the token carries an inline attribute list
    pub fn has_ial(&self) -> bool {
        matches!(self, Self::RecordMark | Self::ParagraphNumber | Self::IalSpan)
    }

    pub fn placement(&self) -> Placement {
        match self {
            Self::RecordMark => Placement::LineStart,
            _ => Placement::Inline,
        }
    }

    /// All kinds except the given ones
    pub fn all_except(kinds: &[TokenKind]) -> Vec<TokenKind> {
        Self::ALL
            .iter()
            .copied()
            .filter(|k| !kinds.contains(k))
            .collect()
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Inline attribute list such as `{: .rid #f-123}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ial {
    raw: String,
}

impl Ial {
    /// Wrap the raw `{: ...}` text
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    /// Raw text including braces
    pub fn raw(&self) -> &str {
        &self.raw
    }

    fn body(&self) -> &str {
        self.raw
            .strip_prefix("{:")
            .and_then(|s| s.strip_suffix('}'))
            .unwrap_or("")
    }

    /// Class names (`.rid` -> `rid`)
    pub fn classes(&self) -> Vec<&str> {
        self.body()
            .split_whitespace()
            .filter_map(|part| part.strip_prefix('.'))
            .collect()
    }

    /// The `#id` value, if any
    pub fn id(&self) -> Option<&str> {
        self.body()
            .split_whitespace()
            .find_map(|part| part.strip_prefix('#'))
    }
}

/// One token occurrence
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    kind: TokenKind,
    literal: String,
    ial: Option<Ial>,
}

impl Token {
    /// Build a token from its exact literal text
    pub fn new(kind: TokenKind, literal: impl Into<String>, ial: Option<Ial>) -> Self {
        Self {
            kind,
            literal: literal.into(),
            ial,
        }
    }

    /// A bare `@`
    pub fn subtitle_mark() -> Self {
        Self::new(TokenKind::SubtitleMark, "@", None)
    }

    /// A bare `%`
    pub fn gap_mark() -> Self {
        Self::new(TokenKind::GapMark, "%", None)
    }

    /// `^^^ {: .rid #<record_id>}`
    pub fn record_mark(record_id: &str) -> Self {
        let ial = Ial::new(format!("{{: .rid #{}}}", record_id));
        Self::new(TokenKind::RecordMark, format!("^^^ {}", ial.raw()), Some(ial))
    }

    /// `*<number>*{: .pn}`
    pub fn paragraph_number(number: &str) -> Self {
        let ial = Ial::new("{: .pn}");
        Self::new(
            TokenKind::ParagraphNumber,
            format!("*{}*{}", number, ial.raw()),
            Some(ial),
        )
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    /// Exact text of the occurrence, including any attached IAL
    pub fn literal(&self) -> &str {
        &self.literal
    }

    pub fn ial(&self) -> Option<&Ial> {
        self.ial.as_ref()
    }

    /// Record id carried by a record mark
    pub fn record_id(&self) -> Option<&str> {
        match self.kind {
            TokenKind::RecordMark => self.ial.as_ref().and_then(|ial| ial.id()),
            _ => None,
        }
    }
}

/// A token occurrence located in its stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    pub kind: TokenKind,
    /// Byte offset in the content AT string
    pub offset: usize,
    /// Character offset in the plain text (all tokens removed)
    pub plain_offset: usize,
    pub attached_ial: Option<Ial>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recordMark_shouldCarryRecordId() {
        let token = Token::record_mark("f-123");
        assert_eq!(token.literal(), "^^^ {: .rid #f-123}");
        assert_eq!(token.record_id(), Some("f-123"));
        assert_eq!(token.ial().map(|ial| ial.classes()), Some(vec!["rid"]));
    }

    #[test]
    fn test_paragraphNumber_shouldRenderWithPnIal() {
        let token = Token::paragraph_number("12");
        assert_eq!(token.literal(), "*12*{: .pn}");
        assert!(token.kind().has_ial());
        assert_eq!(token.record_id(), None);
    }

    #[test]
    fn test_allExcept_shouldOmitGivenKinds() {
        let kinds = TokenKind::all_except(&[TokenKind::SubtitleMark]);
        assert_eq!(kinds.len(), 4);
        assert!(!kinds.contains(&TokenKind::SubtitleMark));
    }

    #[test]
    fn test_placement_recordMarkShouldStartLine() {
        assert_eq!(TokenKind::RecordMark.placement(), Placement::LineStart);
        assert_eq!(TokenKind::GapMark.placement(), Placement::Inline);
    }
}
