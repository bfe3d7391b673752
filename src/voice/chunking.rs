//! Text chunking for the remote speech endpoint
//!
//! The hosted TTS endpoint rejects long inputs, so narration text is split
//! into runs of at most [`MAX_CHUNK_CHARS`] characters that end on a word
//! boundary. Limits count `char`s, not bytes, so Devanagari and Tamil text
//! splits at the same visual length as Latin text.

/// Default chunk size limit accepted by the remote endpoint
pub const MAX_CHUNK_CHARS: usize = 180;

/// Split sanitized `text` into whitespace-bounded chunks of at most `limit` chars
///
/// Words are packed greedily. A single word longer than `limit` is hard-split
/// at the limit. When `limit` is 0, [`MAX_CHUNK_CHARS`] is used.
/// Every returned chunk is non-empty and trimmed.
#[must_use]
pub fn chunk_text(text: &str, limit: usize) -> Vec<String> {
    let limit = if limit == 0 { MAX_CHUNK_CHARS } else { limit };

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > limit {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let pieces = hard_split(word, limit);
            let last = pieces.len() - 1;
            for (i, piece) in pieces.into_iter().enumerate() {
                if i == last {
                    current_len = piece.chars().count();
                    current = piece;
                } else {
                    chunks.push(piece);
                }
            }
            continue;
        }

        let needed = if current.is_empty() {
            word_len
        } else {
            current_len + 1 + word_len
        };

        if needed > limit {
            chunks.push(std::mem::take(&mut current));
            current.push_str(word);
            current_len = word_len;
        } else {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
            current_len = needed;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Split a single oversized word into `limit`-char pieces
fn hard_split(word: &str, limit: usize) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    chars
        .chunks(limit)
        .map(|piece| piece.iter().collect())
        .collect()
}
