//! Replays a finished answer as a paced stream of small chunks.

use std::time::Duration;

use crate::chat::TextStream;

/// Chunk size used for replayed answers.
pub const TYPEWRITER_CHUNK_CHARS: usize = 2;

/// Pause between replayed chunks.
pub const TYPEWRITER_DELAY: Duration = Duration::from_millis(10);

/// Stream `text` in chunks of `chunk_chars` characters, pausing `delay` after each.
#[must_use]
pub fn typewriter(text: String, chunk_chars: usize, delay: Duration) -> TextStream {
    let chunk_chars = chunk_chars.max(1);
    Box::pin(async_stream::stream! {
        let chars: Vec<char> = text.chars().collect();
        for piece in chars.chunks(chunk_chars) {
            yield Ok(piece.iter().collect::<String>());
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use futures::TryStreamExt;

    use super::*;

    #[tokio::test]
    async fn test_chunks_by_character() {
        let chunks: Vec<String> = typewriter("你好世界!".to_string(), 2, Duration::ZERO)
            .try_collect()
            .await
            .unwrap_or_default();
        assert_eq!(chunks, vec!["你好", "世界", "!"]);
    }

    #[tokio::test]
    async fn test_empty_text() {
        let chunks: Vec<String> = typewriter(String::new(), 2, Duration::ZERO)
            .try_collect()
            .await
            .unwrap_or_default();
        assert!(chunks.is_empty());
    }
}
