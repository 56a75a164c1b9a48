/*!
 * Tests for the token model and the token operations
 */

use stsync::content_at::{
    plain_text, remove_tokens, replace_tokens_in_text, TextReplayer, TokenKind, TokenStream,
};
use stsync::errors::{AppError, ReplayError};

const DOCUMENTS: &[&str] = &[
    "",
    "plain text only",
    "@word one.@ word two.",
    "^^^ {: .rid #f-12}\n\n*1*{: .pn} @First% line.\n@Second line.\n",
    "{: .class}\n@Escaped \\@ and \\% stay text.\n",
    "^^^ {: .rid #f-3}\n@Größe und Maß.@ Ünïcödé.\n",
];

#[test]
fn test_tokenStream_roundTrip_shouldReproduceInput() {
    for doc in DOCUMENTS {
        let stream = TokenStream::parse(doc).unwrap();
        assert_eq!(&stream.to_content_at(), doc);
    }
}

#[test]
fn test_removeTokens_shouldPreserveTextEquivalence() {
    for doc in DOCUMENTS {
        for kind in TokenKind::ALL {
            let removed = remove_tokens(doc, &[kind]).unwrap();
            assert_eq!(plain_text(&removed).unwrap(), plain_text(doc).unwrap());
        }
    }
}

#[test]
fn test_removeTokens_withAllKinds_shouldEqualPlainText() {
    let doc = DOCUMENTS[3];
    let removed = remove_tokens(doc, &TokenKind::ALL).unwrap();
    assert_eq!(removed, plain_text(doc).unwrap());
    assert_eq!(TokenStream::parse(&removed).unwrap().count(TokenKind::SubtitleMark), 0);
}

#[test]
fn test_replaceTokens_withDifferentText_shouldReportFirstMismatch() {
    let result = replace_tokens_in_text("@abc def", "abX def", &[TokenKind::SubtitleMark]);
    match result {
        Err(AppError::TextMismatch(e)) => {
            assert_eq!(e.offset, 2);
            assert!(e.source_excerpt.starts_with("c def"));
            assert!(e.target_excerpt.starts_with("X def"));
        }
        other => panic!("expected a text mismatch, got {:?}", other),
    }
}

#[test]
fn test_replaceTokens_withEquivalentText_shouldMoveSubtitleMarks() {
    let result = replace_tokens_in_text(
        "\n@one two@ three",
        "^^^ {: .rid #f-1}\none% two three",
        &[TokenKind::SubtitleMark],
    )
    .unwrap();
    assert_eq!(result, "^^^ {: .rid #f-1}\n@one% two@ three");
}

#[test]
fn test_replayer_withTypoFix_shouldKeepSubtitleMarks() {
    let replayed = TextReplayer::default()
        .replay_text("@teh cat sat.@ The dog.", "the cat sat. The dog.")
        .unwrap();
    assert_eq!(replayed, "@the cat sat.@ The dog.");
}

#[test]
fn test_replayer_withUnrelatedText_shouldRefuseToGuess() {
    let err = TextReplayer::default()
        .with_kinds(&[TokenKind::SubtitleMark])
        .replay_text("abc@def", "xyz uvw")
        .unwrap_err();
    match err {
        ReplayError::UnplaceableToken { kind, offset, .. } => {
            assert_eq!(kind, TokenKind::SubtitleMark);
            assert_eq!(offset, 3);
        }
        other => panic!("expected an unplaceable token, got {:?}", other),
    }
}

#[test]
fn test_lexer_withMisplacedRecordMark_shouldFail() {
    assert!(TokenStream::parse("text ^^^ {: .rid #f-1}\n").is_err());
}
