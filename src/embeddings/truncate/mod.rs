
use std::path::Path;
use std::sync::Arc;
use tokenizers::Tokenizer;
use tracing::{debug, warn};

/// Character budget used when no tokenizer is available
pub const FALLBACK_MAX_CHARS: usize = 2000;

/// Cuts embedding inputs down to what the model accepts.
///
/// Truncation only ever keeps a prefix of the input, and running it on its
/// own output returns that output unchanged.
#[derive(Clone)]
pub enum Truncator {
    Tokens {
        tokenizer: Arc<Tokenizer>,
        max_tokens: usize,
    },
    Chars {
        max_chars: usize,
    },
}

impl std::fmt::Debug for Truncator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tokens { max_tokens, .. } => f
                .debug_struct("Tokens")
                .field("max_tokens", max_tokens)
                .finish_non_exhaustive(),
            Self::Chars { max_chars } => f
                .debug_struct("Chars")
                .field("max_chars", max_chars)
                .finish(),
        }
    }
}

impl Default for Truncator {
    #[inline]
    fn default() -> Self {
        Self::Chars {
            max_chars: FALLBACK_MAX_CHARS,
        }
    }
}

impl Truncator {
    /// Token-exact truncation when `tokenizer_path` loads, character fallback otherwise
    #[inline]
    pub fn from_tokenizer_file(tokenizer_path: Option<&Path>, max_tokens: usize) -> Self {
        let Some(path) = tokenizer_path else {
            debug!(
                "No tokenizer configured, truncating inputs to {} characters",
                FALLBACK_MAX_CHARS
            );
            return Self::default();
        };

        match Tokenizer::from_file(path) {
            Ok(tokenizer) => {
                debug!(
                    "Loaded tokenizer from {}, truncating inputs to {} tokens",
                    path.display(),
                    max_tokens
                );
                Self::with_tokenizer(tokenizer, max_tokens)
            }
            Err(e) => {
                warn!(
                    "Failed to load tokenizer from {}: {}; falling back to {} characters",
                    path.display(),
                    e,
                    FALLBACK_MAX_CHARS
                );
                Self::default()
            }
        }
    }

    #[inline]
    pub fn with_tokenizer(tokenizer: Tokenizer, max_tokens: usize) -> Self {
        Self::Tokens {
            tokenizer: Arc::new(tokenizer),
            max_tokens,
        }
    }

    #[inline]
    pub fn truncate(&self, text: &str) -> String {
        match self {
            Self::Tokens {
                tokenizer,
                max_tokens,
            } => truncate_tokens(tokenizer, text, *max_tokens)
                .unwrap_or_else(|| truncate_chars(text, FALLBACK_MAX_CHARS)),
            Self::Chars { max_chars } => truncate_chars(text, *max_chars),
        }
    }
}

/// Keeps the first `max_chars` characters
fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => text.get(..end).unwrap_or(text).to_string(),
        None => text.to_string(),
    }
}

/// Returns `None` when the tokenizer cannot encode the text
fn truncate_tokens(tokenizer: &Tokenizer, text: &str, max_tokens: usize) -> Option<String> {
    let mut current = text;

    // Cutting at a token boundary can occasionally re-encode to more tokens
    // than were kept, so repeat until the prefix fits. Every pass shrinks
    // `current`, and the empty string always fits.
    loop {
        let encoding = match tokenizer.encode(current, false) {
            Ok(encoding) => encoding,
            Err(e) => {
                warn!("Tokenizer failed to encode input: {}", e);
                return None;
            }
        };

        if encoding.len() <= max_tokens {
            return Some(current.to_string());
        }

        let end = floor_char_boundary(current, cut_offset(encoding.get_offsets(), max_tokens));
        let end = if end < current.len() {
            end
        } else {
            floor_char_boundary(current, current.len().saturating_sub(1))
        };
        current = current.get(..end)?;
    }
}

/// Byte offset that keeps the first `max_tokens` tokens.
///
/// Byte-level tokenizers emit several tokens for one multibyte character, all
/// with that character's span. When the last kept token shares its span with
/// the first dropped one, the cut moves back to the start of that character.
fn cut_offset(offsets: &[(usize, usize)], max_tokens: usize) -> usize {
    let first_dropped_start = offsets.get(max_tokens).map_or(0, |offset| offset.0);
    let last_kept_end = max_tokens
        .checked_sub(1)
        .and_then(|last| offsets.get(last))
        .map(|offset| offset.1);

    match last_kept_end {
        Some(end) if end <= first_dropped_start => end,
        _ => first_dropped_start,
    }
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}
