/*!
 * Token remover: strips exactly the requested token kinds from content AT.
 */

use super::lexer::TokenStream;
use super::token::TokenKind;
use crate::errors::TokenError;

/// Remove every occurrence of `kinds` (marker and attached IAL) from `text`.
///
/// Other tokens and all literal text stay untouched and in order.
pub fn remove_tokens(text: &str, kinds: &[TokenKind]) -> Result<String, TokenError> {
    Ok(TokenStream::parse(text)?.without_kinds(kinds).to_content_at())
}

/// Plain text view: every token removed
pub fn plain_text(text: &str) -> Result<String, TokenError> {
    Ok(TokenStream::parse(text)?.plain_text())
}

/// View that keeps only the given kinds
pub fn keep_only(text: &str, kinds: &[TokenKind]) -> Result<String, TokenError> {
    remove_tokens(text, &TokenKind::all_except(kinds))
}
