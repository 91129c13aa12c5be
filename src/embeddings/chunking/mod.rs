
use tracing::debug;

/// A bounded, overlapping piece of a document ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub text: String,
    /// Position of this chunk within its document
    pub chunk_index: usize,
    /// Estimated token count
    pub token_count: usize,
}

/// Configuration for document chunking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    /// Target chunk size in estimated tokens
    pub chunk_size: usize,
    /// Tokens carried over from the end of the previous chunk
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 300,
            chunk_overlap: 60,
        }
    }
}

/// A sentence, or a word run cut from an oversized sentence
#[derive(Debug)]
struct Unit {
    text: String,
    starts_paragraph: bool,
}

/// Split a document into chunks of at most `chunk_size` estimated tokens.
///
/// Sentences are packed greedily; a sentence that alone exceeds the budget is
/// split at word boundaries. Each chunk after the first begins with the
/// trailing words of its predecessor, up to `chunk_overlap` tokens. A single
/// word larger than the budget is emitted on its own.
#[inline]
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Vec<TextChunk> {
    let chunk_size = config.chunk_size.max(1);
    let overlap = config.chunk_overlap.min(chunk_size - 1);

    let mut chunks: Vec<TextChunk> = Vec::new();
    let mut current = String::new();
    let mut has_new_content = false;

    for unit in split_units(text, chunk_size) {
        let separator = if unit.starts_paragraph { "\n\n" } else { " " };

        if has_new_content {
            let candidate = join(&current, separator, &unit.text);
            if estimate_token_count(&candidate) <= chunk_size {
                current = candidate;
                continue;
            }

            push_chunk(&mut chunks, &current);
            current = overlap_tail(&current, overlap, &unit.text, chunk_size);
        }

        current = join(&current, separator, &unit.text);
        has_new_content = true;
    }

    if has_new_content {
        push_chunk(&mut chunks, &current);
    }

    debug!(
        "Chunked {} characters into {} chunks (avg {} tokens)",
        text.len(),
        chunks.len(),
        chunks.iter().map(|c| c.token_count).sum::<usize>() / chunks.len().max(1)
    );

    chunks
}

fn push_chunk(chunks: &mut Vec<TextChunk>, text: &str) {
    let text = text.trim();
    if text.is_empty() {
        return;
    }

    chunks.push(TextChunk {
        text: text.to_string(),
        chunk_index: chunks.len(),
        token_count: estimate_token_count(text),
    });
}

fn join(left: &str, separator: &str, right: &str) -> String {
    if left.is_empty() {
        right.to_string()
    } else {
        format!("{}{}{}", left, separator, right)
    }
}

/// Trailing words of `previous` worth at most `overlap_tokens`, shortened
/// further until `next` still fits in the same chunk
fn overlap_tail(previous: &str, overlap_tokens: usize, next: &str, chunk_size: usize) -> String {
    if overlap_tokens == 0 {
        return String::new();
    }

    let words: Vec<&str> = previous.split_whitespace().collect();
    let mut start = words.len();
    while start > 0 && estimate_token_count(&words[start - 1..].join(" ")) <= overlap_tokens {
        start -= 1;
    }

    while start < words.len() {
        let tail = words[start..].join(" ");
        if estimate_token_count(&join(&tail, " ", next)) <= chunk_size {
            return tail;
        }
        start += 1;
    }

    String::new()
}

/// Break text into packable units: sentences within paragraphs, with
/// oversized sentences cut into word runs that fit `chunk_size`
fn split_units(text: &str, chunk_size: usize) -> Vec<Unit> {
    let mut units = Vec::new();

    for paragraph in text.split("\n\n") {
        let mut starts_paragraph = true;

        for sentence in split_sentences(paragraph) {
            if estimate_token_count(sentence) <= chunk_size {
                units.push(Unit {
                    text: sentence.to_string(),
                    starts_paragraph,
                });
            } else {
                for (i, piece) in split_by_words(sentence, chunk_size).into_iter().enumerate() {
                    units.push(Unit {
                        text: piece,
                        starts_paragraph: starts_paragraph && i == 0,
                    });
                }
            }
            starts_paragraph = false;
        }
    }

    units
}

/// Simple sentence boundary detection on terminal punctuation
fn split_sentences(paragraph: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = paragraph.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let boundary = match c {
            '。' | '！' | '？' => true,
            '.' | '!' | '?' => chars.peek().is_none_or(|(_, next)| next.is_whitespace()),
            _ => false,
        };

        if boundary {
            let end = i + c.len_utf8();
            push_sentence(&mut sentences, paragraph.get(start..end));
            start = end;
        }
    }

    push_sentence(&mut sentences, paragraph.get(start..));

    sentences
}

fn push_sentence<'a>(sentences: &mut Vec<&'a str>, sentence: Option<&'a str>) {
    if let Some(sentence) = sentence.map(str::trim).filter(|s| !s.is_empty()) {
        sentences.push(sentence);
    }
}

/// Split text by words as a last resort
fn split_by_words(text: &str, chunk_size: usize) -> Vec<String> {
    let mut splits = Vec::new();
    let mut current_split = String::new();

    for word in text.split_whitespace() {
        let candidate = join(&current_split, " ", word);
        if estimate_token_count(&candidate) > chunk_size && !current_split.is_empty() {
            splits.push(std::mem::take(&mut current_split));
            current_split = word.to_string();
        } else {
            current_split = candidate;
        }
    }

    if !current_split.is_empty() {
        splits.push(current_split);
    }

    splits
}

/// Estimate token count using a simple heuristic
/// This is a rough approximation - actual tokenization would be more accurate
#[inline]
pub fn estimate_token_count(text: &str) -> usize {
    // Rough heuristic: 1 token ≈ 0.75 words for English text
    // Add extra tokens for punctuation and special characters
    let word_count = text.split_whitespace().count();
    let punct_count = text.chars().filter(|c| c.is_ascii_punctuation()).count();

    (punct_count as f64).mul_add(0.1, word_count as f64 / 0.75) as usize
}
