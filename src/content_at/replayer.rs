/*!
 * Text replayer: carries tokens from an old text over to an edited new text.
 *
 * Unlike the replacer, the two plain texts may differ (typo fixes,
 * punctuation). Each token is mapped through a character diff and the
 * placement is then checked against the context around the token. A token
 * whose context cannot be found with enough similarity is an error for a
 * human to resolve; the replayer never guesses.
 */

use log::{debug, trace};

use super::diff::{lcs_len, TextDiff};
use super::lexer::{AnchoredToken, TokenStream};
use super::token::TokenKind;
use crate::app_config::ReplayConfig;
use crate::errors::ReplayError;

/// Replays tokens onto edited text
#[derive(Debug, Clone)]
pub struct TextReplayer {
    /// Characters of context compared on each side of a token
    context_window: usize,
    /// Minimum similarity (0.0-1.0) of the context after mapping
    min_similarity: f64,
    /// Token kinds carried over from the old text
    kinds: Vec<TokenKind>,
}

impl Default for TextReplayer {
    fn default() -> Self {
        Self::from_config(&ReplayConfig::default())
    }
}

impl TextReplayer {
    pub fn new(context_window: usize, min_similarity: f64) -> Self {
        Self {
            context_window: context_window.max(1),
            min_similarity: min_similarity.clamp(0.0, 1.0),
            kinds: TokenKind::ALL.to_vec(),
        }
    }

    pub fn from_config(config: &ReplayConfig) -> Self {
        Self::new(config.context_window, config.min_similarity)
    }

    /// Restrict the replay to some token kinds
    pub fn with_kinds(mut self, kinds: &[TokenKind]) -> Self {
        self.kinds = kinds.to_vec();
        self
    }

    /// Replay the tokens of `old` onto `new`.
    ///
    /// Tokens of other kinds already present in `new` are kept and stay in
    /// front of replayed tokens at the same offset.
    pub fn replay(&self, old: &TokenStream, new: &TokenStream) -> Result<TokenStream, ReplayError> {
        let old_plain: Vec<char> = old.plain_text().chars().collect();
        let new_plain_text = new.plain_text();
        let new_plain: Vec<char> = new_plain_text.chars().collect();
        let old_plain_text: String = old_plain.iter().collect();
        let diff = TextDiff::new(&old_plain_text, &new_plain_text);

        let mut tokens = new.anchored_tokens(&TokenKind::all_except(&self.kinds));
        for anchored in old.anchored_tokens(&self.kinds) {
            let old_offset = anchored.plain_offset;
            let new_offset = diff.map_offset(old_offset);
            if !diff.is_identity() {
                let similarity = self.context_similarity(&old_plain, old_offset, &new_plain, new_offset);
                trace!(
                    "{} token {} -> {} (similarity {:.2})",
                    anchored.token.kind(),
                    old_offset,
                    new_offset,
                    similarity
                );
                if similarity < self.min_similarity {
                    return Err(ReplayError::UnplaceableToken {
                        kind: anchored.token.kind(),
                        offset: old_offset,
                        context: self.context_excerpt(&old_plain, old_offset),
                        similarity,
                    });
                }
            }
            tokens.push(AnchoredToken {
                plain_offset: new_offset,
                token: anchored.token,
            });
        }

        debug!("Replayed {} tokens onto edited text", tokens.len());
        Ok(TokenStream::from_plain_with_tokens(&new_plain_text, tokens))
    }

    /// String level convenience wrapper around `replay`
    pub fn replay_text(&self, old: &str, new: &str) -> Result<String, ReplayError> {
        let old = TokenStream::parse(old)?;
        let new = TokenStream::parse(new)?;
        Ok(self.replay(&old, &new)?.to_content_at())
    }

    // @returns: LCS ratio of the context windows on both sides
    fn context_similarity(&self, old: &[char], old_offset: usize, new: &[char], new_offset: usize) -> f64 {
        let (old_left, old_right) = window(old, old_offset, self.context_window);
        let (new_left, new_right) = window(new, new_offset, self.context_window);
        let total = old_left.chars().count() + old_right.chars().count();
        if total == 0 {
            return 1.0;
        }
        let common = lcs_len(&old_left, &new_left) + lcs_len(&old_right, &new_right);
        common as f64 / total as f64
    }

    fn context_excerpt(&self, old: &[char], offset: usize) -> String {
        let (left, right) = window(old, offset, self.context_window);
        format!("{}|{}", left, right)
    }
}

fn window(text: &[char], offset: usize, size: usize) -> (String, String) {
    let offset = offset.min(text.len());
    let start = offset.saturating_sub(size);
    let end = (offset + size).min(text.len());
    (
        text[start..offset].iter().collect(),
        text[offset..end].iter().collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_withTypoFix_shouldPlaceTokensAtSameWords() {
        let replayer = TextReplayer::default();
        let out = replayer
            .replay_text("@word one.@ wrod two.", "word one. word two.")
            .unwrap();
        assert_eq!(out, "@word one.@ word two.");
    }

    #[test]
    fn test_replay_withInsertedWords_shouldFollowContext() {
        let replayer = TextReplayer::default();
        let out = replayer
            .replay_text(
                "^^^ {: .rid #f-1}\n\n@Hello world.@ See you later.\n",
                "\n\nHello big world. See you much later.\n",
            )
            .unwrap();
        assert_eq!(
            out,
            "^^^ {: .rid #f-1}\n\n@Hello big world.@ See you much later.\n"
        );
    }

    #[test]
    fn test_replay_withIdenticalText_shouldEqualOld() {
        let replayer = TextReplayer::default();
        let old = "@one %two @three";
        assert_eq!(replayer.replay_text(old, "one two three").unwrap(), old);
    }

    #[test]
    fn test_replay_withRewrittenText_shouldRefuseToGuess() {
        let replayer = TextReplayer::default();
        let err = replayer.replay_text("@cat sat.", "dog ran.").unwrap_err();
        match err {
            ReplayError::UnplaceableToken { kind, offset, context, similarity } => {
                assert_eq!(kind, TokenKind::SubtitleMark);
                assert_eq!(offset, 0);
                assert_eq!(context, "|cat sat.");
                assert!(similarity < 0.5);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_replay_withKindFilter_shouldKeepNewTokens() {
        let replayer = TextReplayer::default().with_kinds(&[TokenKind::SubtitleMark]);
        let out = replayer.replay_text("@one. @two.", "%one. two!").unwrap();
        assert_eq!(out, "%@one. @two!");
    }
}
