
use tracing::debug;

const PARAGRAPH_SEPARATOR: &str = "\n\n";
const WORD_SEPARATOR: &str = " ";

/// Configuration for splitting document text into chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters
    pub chunk_size: usize,
    /// Characters of the previous chunk repeated at the start of the next one
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// A piece of text that is never split further, with the separator that
/// joins it to the preceding piece
struct Segment {
    text: String,
    separator: &'static str,
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Split text into chunks of at most `chunk_size` characters.
///
/// Paragraph breaks are preferred, then sentence ends, then word boundaries.
/// A word longer than a whole chunk is cut at the character limit. Each chunk
/// after the first starts with up to `chunk_overlap` characters of whole words
/// from the end of the previous chunk.
#[inline]
pub fn split_text(text: &str, config: &ChunkingConfig) -> Vec<String> {
    let chunk_size = config.chunk_size.max(1);
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    if char_len(text) <= chunk_size {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for segment in split_segments(text, chunk_size) {
        let segment_len = char_len(&segment.text);

        if current.is_empty() {
            current = segment.text;
            current_len = segment_len;
            continue;
        }

        let separator_len = segment.separator.len();
        if current_len + separator_len + segment_len <= chunk_size {
            current.push_str(segment.separator);
            current.push_str(&segment.text);
            current_len += separator_len + segment_len;
            continue;
        }

        let budget = chunk_size.saturating_sub(segment_len + WORD_SEPARATOR.len());
        let overlap = overlap_tail(&current, config.chunk_overlap.min(budget));
        chunks.push(std::mem::take(&mut current));

        if overlap.is_empty() {
            current = segment.text;
            current_len = segment_len;
        } else {
            current_len = char_len(&overlap) + WORD_SEPARATOR.len() + segment_len;
            current = format!("{}{}{}", overlap, WORD_SEPARATOR, segment.text);
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    debug!(
        "Split {} characters into {} chunks",
        char_len(text),
        chunks.len()
    );
    chunks
}

/// Break text into segments no longer than `chunk_size`
fn split_segments(text: &str, chunk_size: usize) -> Vec<Segment> {
    let mut segments = Vec::new();

    for paragraph in text
        .split(PARAGRAPH_SEPARATOR)
        .map(str::trim)
        .filter(|p| !p.is_empty())
    {
        if char_len(paragraph) <= chunk_size {
            segments.push(Segment {
                text: paragraph.to_string(),
                separator: PARAGRAPH_SEPARATOR,
            });
            continue;
        }

        let mut separator = PARAGRAPH_SEPARATOR;
        for sentence in split_sentences(paragraph) {
            if char_len(sentence) <= chunk_size {
                segments.push(Segment {
                    text: sentence.to_string(),
                    separator,
                });
            } else {
                for (i, piece) in split_words(sentence, chunk_size).into_iter().enumerate() {
                    segments.push(Segment {
                        text: piece,
                        separator: if i == 0 { separator } else { WORD_SEPARATOR },
                    });
                }
            }
            separator = WORD_SEPARATOR;
        }
    }

    segments
}

/// Sentences ending in `.`, `!` or `?` followed by whitespace
fn split_sentences(paragraph: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut previous_was_terminal = false;

    for (index, c) in paragraph.char_indices() {
        if previous_was_terminal && c.is_whitespace() {
            let sentence = paragraph.get(start..index).unwrap_or_default().trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = index;
        }
        previous_was_terminal = matches!(c, '.' | '!' | '?');
    }

    let rest = paragraph.get(start..).unwrap_or_default().trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }
    sentences
}

/// Pack words into pieces of at most `chunk_size` characters
fn split_words(text: &str, chunk_size: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = char_len(word);

        if word_len > chunk_size {
            if !current.is_empty() {
                pieces.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            pieces.extend(chars.chunks(chunk_size).map(|piece| piece.iter().collect::<String>()));
            continue;
        }

        if !current.is_empty() && current_len + WORD_SEPARATOR.len() + word_len > chunk_size {
            pieces.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push_str(WORD_SEPARATOR);
            current_len += WORD_SEPARATOR.len();
        }
        current.push_str(word);
        current_len += word_len;
    }

    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Trailing whole words of `text` totalling at most `max_chars` characters
fn overlap_tail(text: &str, max_chars: usize) -> String {
    if max_chars == 0 {
        return String::new();
    }

    let mut words = Vec::new();
    let mut length = 0;
    for word in text.split_whitespace().rev() {
        let added = char_len(word) + usize::from(!words.is_empty());
        if length + added > max_chars {
            break;
        }
        length += added;
        words.push(word);
    }

    words.reverse();
    words.join(WORD_SEPARATOR)
}
