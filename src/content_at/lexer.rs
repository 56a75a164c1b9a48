/*!
 * Lexer and token stream for content AT.
 *
 * Lexing and structure are kept apart: the lexer only turns a string into an
 * ordered list of text runs and token occurrences. Everything that reasons
 * about subtitles or records works on the resulting `TokenStream`.
 */

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::str::FromStr;

use super::token::{Ial, Placement, Token, TokenKind, TokenRecord};
use crate::errors::TokenError;

// @const: Paragraph number span, anchored at the lexer position
static PARAGRAPH_NUMBER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\*(\d+[a-z]?)\*(\{: \.pn\})").expect("Invalid paragraph number regex")
});

/// One piece of a token stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Literal text, escapes included verbatim
    Text(String),
    /// A token occurrence
    Token(Token),
}

/// A token positioned by its plain text offset.
///
/// A token is anchored to the character that follows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchoredToken {
    /// Character offset into the plain text
    pub plain_offset: usize,
    pub token: Token,
}

/// Ordered text runs and token occurrences of one document
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TokenStream {
    segments: Vec<Segment>,
}

impl TokenStream {
    /// Lex a content AT string
    pub fn parse(input: &str) -> Result<Self, TokenError> {
        Lexer::new(input).run()
    }

    /// Build a stream from segments, merging adjacent text runs
    pub fn from_segments(segments: impl IntoIterator<Item = Segment>) -> Self {
        let mut stream = Self::default();
        for segment in segments {
            match segment {
                Segment::Text(text) => stream.push_text(&text),
                Segment::Token(token) => stream.segments.push(Segment::Token(token)),
            }
        }
        stream
    }

    /// Build a stream from plain text and tokens anchored into it.
    ///
    /// Tokens sharing an offset keep their relative order.
    pub fn from_plain_with_tokens(plain: &str, mut tokens: Vec<AnchoredToken>) -> Self {
        tokens.sort_by_key(|t| t.plain_offset);
        let mut stream = Self::default();
        let mut pending = tokens.into_iter().peekable();
        let mut run = String::new();

        for (idx, ch) in plain.chars().enumerate() {
            while let Some(anchored) = pending.next_if(|t| t.plain_offset <= idx) {
                stream.push_text(&run);
                run.clear();
                stream.segments.push(Segment::Token(anchored.token));
            }
            run.push(ch);
        }
        stream.push_text(&run);
        for anchored in pending {
            stream.segments.push(Segment::Token(anchored.token));
        }
        stream
    }

    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(Segment::Text(last)) = self.segments.last_mut() {
            last.push_str(text);
        } else {
            self.segments.push(Segment::Text(text.to_string()));
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Write the stream back to content AT
    pub fn to_content_at(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Token(token) => out.push_str(token.literal()),
            }
        }
        out
    }

    /// Text with every token removed
    pub fn plain_text(&self) -> String {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Text(text) => Some(text.as_str()),
                Segment::Token(_) => None,
            })
            .collect()
    }

    /// Tokens of the given kinds with their plain text offsets
    pub fn anchored_tokens(&self, kinds: &[TokenKind]) -> Vec<AnchoredToken> {
        let mut plain_offset = 0;
        let mut anchored = Vec::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => plain_offset += text.chars().count(),
                Segment::Token(token) if kinds.contains(&token.kind()) => {
                    anchored.push(AnchoredToken {
                        plain_offset,
                        token: token.clone(),
                    });
                }
                Segment::Token(_) => {}
            }
        }
        anchored
    }

    /// Every token with its byte offset and plain text offset
    pub fn token_records(&self) -> Vec<TokenRecord> {
        let mut offset = 0;
        let mut plain_offset = 0;
        let mut records = Vec::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => {
                    offset += text.len();
                    plain_offset += text.chars().count();
                }
                Segment::Token(token) => {
                    records.push(TokenRecord {
                        kind: token.kind(),
                        offset,
                        plain_offset,
                        attached_ial: token.ial().cloned(),
                    });
                    offset += token.literal().len();
                }
            }
        }
        records
    }

    /// Number of occurrences of a token kind
    pub fn count(&self, kind: TokenKind) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Token(t) if t.kind() == kind))
            .count()
    }

    /// A copy of the stream without tokens of the given kinds
    pub fn without_kinds(&self, kinds: &[TokenKind]) -> Self {
        Self::from_segments(
            self.segments
                .iter()
                .filter(|s| !matches!(s, Segment::Token(t) if kinds.contains(&t.kind())))
                .cloned(),
        )
    }

    /// Whether two streams have byte-identical plain text
    pub fn is_text_equivalent(&self, other: &TokenStream) -> bool {
        self.plain_text() == other.plain_text()
    }
}

impl FromStr for TokenStream {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TokenStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_content_at())
    }
}

// @struct: Single pass lexer over a content AT string
struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    run_start: usize,
    segments: Vec<Segment>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            run_start: 0,
            segments: Vec::new(),
        }
    }

    fn run(mut self) -> Result<TokenStream, TokenError> {
        let input = self.input;
        while self.pos < input.len() {
            let rest = &input[self.pos..];
            let Some(ch) = rest.chars().next() else { break };
            match ch {
                '\\' => {
                    // Escaped character stays literal, backslash included
                    let escaped = rest[1..].chars().next().map_or(0, char::len_utf8);
                    self.pos += 1 + escaped;
                }
                '@' => self.emit(Token::subtitle_mark(), 1),
                '%' => self.emit(Token::gap_mark(), 1),
                '^' => self.lex_record_mark()?,
                '*' => {
                    if let Some(caps) = PARAGRAPH_NUMBER_REGEX.captures(rest) {
                        let literal = &caps[0];
                        let token = Token::new(
                            TokenKind::ParagraphNumber,
                            literal,
                            Some(Ial::new(&caps[2])),
                        );
                        self.emit(token, literal.len());
                    } else {
                        self.pos += 1;
                    }
                }
                '{' if rest.starts_with("{:") => {
                    let end = self.scan_ial(self.pos)?;
                    let raw = &input[self.pos..end];
                    let token = Token::new(TokenKind::IalSpan, raw, Some(Ial::new(raw)));
                    self.emit(token, end - self.pos);
                }
                other => self.pos += other.len_utf8(),
            }
        }
        self.flush_text(input.len());
        Ok(TokenStream {
            segments: self.segments,
        })
    }

    fn lex_record_mark(&mut self) -> Result<(), TokenError> {
        let start = self.pos;
        let carets = self.input[start..].bytes().take_while(|b| *b == b'^').count();
        if carets < 3 {
            return Err(self.malformed(start, "incomplete record mark"));
        }
        if carets > 3 {
            return Err(self.malformed(start, "too many carets in record mark"));
        }
        if TokenKind::RecordMark.placement() == Placement::LineStart
            && start > 0
            && !self.input[..start].ends_with('\n')
        {
            return Err(self.malformed(start, "record mark must start a line"));
        }

        let after = start + 3;
        let rest = &self.input[after..];
        let ial_start = if rest.starts_with(" {:") {
            Some(after + 1)
        } else if rest.starts_with("{:") {
            Some(after)
        } else {
            None
        };

        let (end, ial) = match ial_start {
            Some(ial_start) => {
                let end = self.scan_ial(ial_start)?;
                (end, Some(Ial::new(&self.input[ial_start..end])))
            }
            None => (after, None),
        };
        let token = Token::new(TokenKind::RecordMark, &self.input[start..end], ial);
        self.emit(token, end - start);
        Ok(())
    }

    // @returns: Byte offset just past the closing brace
    fn scan_ial(&self, start: usize) -> Result<usize, TokenError> {
        for (idx, ch) in self.input[start + 2..].char_indices() {
            match ch {
                '}' => return Ok(start + 2 + idx + 1),
                '{' => return Err(self.malformed(start, "nested brace in inline attribute list")),
                '\n' => return Err(self.malformed(start, "unterminated inline attribute list")),
                _ => {}
            }
        }
        Err(self.malformed(start, "unterminated inline attribute list"))
    }

    fn emit(&mut self, token: Token, len: usize) {
        self.flush_text(self.pos);
        self.segments.push(Segment::Token(token));
        self.pos += len;
        self.run_start = self.pos;
    }

    fn flush_text(&mut self, end: usize) {
        if end > self.run_start {
            self.segments
                .push(Segment::Text(self.input[self.run_start..end].to_string()));
        }
        self.run_start = end;
    }

    fn malformed(&self, offset: usize, reason: &'static str) -> TokenError {
        let before = &self.input[..offset];
        let line = before.matches('\n').count() + 1;
        let column = before
            .rsplit('\n')
            .next()
            .map_or(0, |line_text| line_text.chars().count())
            + 1;
        TokenError::Malformed {
            offset,
            line,
            column,
            reason,
            excerpt: self.input[offset..].chars().take(20).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "^^^ {: .rid #f-1}\n\n*1*{: .pn} @word one.@ word% two.\n{: .normal}\n";

    #[test]
    fn test_parse_withAllTokenKinds_shouldRoundTrip() {
        let stream = TokenStream::parse(SAMPLE).unwrap();
        assert_eq!(stream.to_content_at(), SAMPLE);

        let reparsed = TokenStream::parse(&stream.to_content_at()).unwrap();
        assert_eq!(reparsed, stream);
    }

    #[test]
    fn test_parse_shouldRecognizeEachKind() {
        let stream = TokenStream::parse(SAMPLE).unwrap();
        let kinds: Vec<TokenKind> = stream.token_records().iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::RecordMark,
                TokenKind::ParagraphNumber,
                TokenKind::SubtitleMark,
                TokenKind::SubtitleMark,
                TokenKind::GapMark,
                TokenKind::IalSpan,
            ]
        );
    }

    #[test]
    fn test_tokenRecords_shouldReportOffsets() {
        let stream = TokenStream::parse("ab@cd%").unwrap();
        let records = stream.token_records();
        assert_eq!(records[0].offset, 2);
        assert_eq!(records[0].plain_offset, 2);
        assert_eq!(records[1].offset, 5);
        assert_eq!(records[1].plain_offset, 4);
    }

    #[test]
    fn test_plainText_shouldDropAllTokens() {
        let stream = TokenStream::parse(SAMPLE).unwrap();
        assert_eq!(stream.plain_text(), "\n\n word one. word two.\n\n");
    }

    #[test]
    fn test_parse_withEscapes_shouldKeepLiteral() {
        let stream = TokenStream::parse(r"mail\@example.com 50\% \{: x").unwrap();
        assert_eq!(stream.count(TokenKind::SubtitleMark), 0);
        assert_eq!(stream.count(TokenKind::GapMark), 0);
        assert_eq!(stream.plain_text(), r"mail\@example.com 50\% \{: x");
    }

    #[test]
    fn test_parse_withEmphasis_shouldNotBeParagraphNumber() {
        let stream = TokenStream::parse("*word* and *12*").unwrap();
        assert_eq!(stream.count(TokenKind::ParagraphNumber), 0);
        assert_eq!(stream.plain_text(), "*word* and *12*");
    }

    #[test]
    fn test_parse_withTwoCarets_shouldReportOffset() {
        let err = TokenStream::parse("one\n^^ two").unwrap_err();
        assert_eq!(err.offset(), 4);
        match err {
            TokenError::Malformed { line, column, .. } => {
                assert_eq!(line, 2);
                assert_eq!(column, 1);
            }
        }
    }

    #[test]
    fn test_parse_withRecordMarkMidLine_shouldFail() {
        let err = TokenStream::parse("text ^^^").unwrap_err();
        assert_eq!(err.offset(), 5);
    }

    #[test]
    fn test_parse_withUnterminatedIal_shouldFail() {
        assert!(TokenStream::parse("word {: .normal\nmore").is_err());
        assert!(TokenStream::parse("word {: .a {: .b}").is_err());
    }

    #[test]
    fn test_fromPlainWithTokens_shouldRebuildStream() {
        let stream = TokenStream::parse("@one @two%").unwrap();
        let rebuilt = TokenStream::from_plain_with_tokens(
            &stream.plain_text(),
            stream.anchored_tokens(&TokenKind::ALL),
        );
        assert_eq!(rebuilt, stream);
    }

    #[test]
    fn test_withoutKinds_shouldKeepOtherTokens() {
        let stream = TokenStream::parse(SAMPLE).unwrap();
        let stripped = stream.without_kinds(&[TokenKind::SubtitleMark]);
        assert_eq!(stripped.count(TokenKind::SubtitleMark), 0);
        assert_eq!(stripped.count(TokenKind::GapMark), 1);
        assert!(stripped.is_text_equivalent(&stream));
    }
}
