/*!
 * Content AT primitives.
 *
 * - `token`: token kinds and occurrences
 * - `lexer`: lexer and `TokenStream`
 * - `diff`: character diff shared by the replayer and extraction
 * - `remover`, `replacer`, `replayer`: token-only text transforms
 */

pub mod diff;
pub mod lexer;
pub mod remover;
pub mod replacer;
pub mod replayer;
pub mod token;

pub use diff::{lcs_len, DiffOp, Hunk, TextDiff};
pub use lexer::{AnchoredToken, Segment, TokenStream};
pub use remover::{keep_only, plain_text, remove_tokens};
pub use replacer::{ensure_text_equivalent, replace_tokens, replace_tokens_in_text};
pub use replayer::TextReplayer;
pub use token::{Ial, Placement, Token, TokenKind, TokenRecord};
