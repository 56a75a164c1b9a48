/*!
 * Token replacer: transplants tokens between two text-equivalent streams.
 *
 * The source carries the tokens of interest, the target carries everything
 * else. Because both plain texts must match exactly, the transplant is a
 * positional copy; there is no alignment heuristic to go wrong.
 */

use super::lexer::TokenStream;
use super::token::TokenKind;
use crate::errors::{AppError, TextMismatchError};

/// Replace the `kinds` tokens of `target` with those of `source`.
///
/// Fails with `TextMismatchError` when the plain texts differ.
pub fn replace_tokens(
    source: &TokenStream,
    target: &TokenStream,
    kinds: &[TokenKind],
) -> Result<TokenStream, TextMismatchError> {
    let source_plain = source.plain_text();
    let target_plain = target.plain_text();
    ensure_text_equivalent(&source_plain, &target_plain)?;

    // Target tokens go first so they stay in front at shared offsets
    let mut tokens = target.anchored_tokens(&TokenKind::all_except(kinds));
    tokens.extend(source.anchored_tokens(kinds));
    Ok(TokenStream::from_plain_with_tokens(&target_plain, tokens))
}

/// String level convenience wrapper around `replace_tokens`
pub fn replace_tokens_in_text(
    source: &str,
    target: &str,
    kinds: &[TokenKind],
) -> Result<String, AppError> {
    let source = TokenStream::parse(source)?;
    let target = TokenStream::parse(target)?;
    Ok(replace_tokens(&source, &target, kinds)?.to_content_at())
}

/// Compare two plain texts, reporting the first mismatching character
pub fn ensure_text_equivalent(source: &str, target: &str) -> Result<(), TextMismatchError> {
    if source == target {
        return Ok(());
    }
    let offset = source
        .chars()
        .zip(target.chars())
        .take_while(|(a, b)| a == b)
        .count();
    Err(TextMismatchError {
        offset,
        source_excerpt: source.chars().skip(offset).take(30).collect(),
        target_excerpt: target.chars().skip(offset).take(30).collect(),
    })
}
