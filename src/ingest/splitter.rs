//! Recursive character splitting of markdown documents into overlapping chunks.

use tracing::warn;

use crate::ingest::error::{IngestError, IngestResult};

/// Default chunk length in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// Default overlap carried between consecutive chunks.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Splits text on the coarsest separator that occurs, recursing into pieces
/// that are still too long, then merges small pieces back up to the chunk size.
#[derive(Debug, Clone)]
pub struct RecursiveCharacterTextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl Default for RecursiveCharacterTextSplitter {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            separators: DEFAULT_SEPARATORS.iter().map(ToString::to_string).collect(),
        }
    }
}

impl RecursiveCharacterTextSplitter {
    /// Splitter with the default separators.
    ///
    /// # Errors
    /// Returns an error unless `chunk_overlap < chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> IngestResult<Self> {
        if chunk_size == 0 || chunk_overlap >= chunk_size {
            return Err(IngestError::InvalidSplitter {
                chunk_size,
                chunk_overlap,
            });
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            ..Self::default()
        })
    }

    /// Chunk length limit.
    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Split `text` into trimmed, non-empty chunks.
    #[must_use]
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let separators: Vec<&str> = self.separators.iter().map(String::as_str).collect();
        self.split_with(text, &separators)
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut separator = separators.last().copied().unwrap_or("");
        let mut finer: &[&str] = &[];
        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = *candidate;
                break;
            }
            if text.contains(*candidate) {
                separator = *candidate;
                finer = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut small: Vec<&str> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                small.push(piece);
                continue;
            }
            if !small.is_empty() {
                chunks.extend(self.merge(&small));
                small.clear();
            }
            if finer.is_empty() {
                chunks.push(piece.to_string());
            } else {
                chunks.extend(self.split_with(piece, finer));
            }
        }
        if !small.is_empty() {
            chunks.extend(self.merge(&small));
        }
        chunks
    }

    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: Vec<&str> = Vec::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size {
                if total > self.chunk_size {
                    warn!(
                        length = total,
                        chunk_size = self.chunk_size,
                        "Created a chunk longer than the limit"
                    );
                }
                if !window.is_empty() {
                    push_joined(&mut chunks, &window);
                    while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                        let first = window.remove(0);
                        total -= char_len(first);
                    }
                }
            }
            window.push(piece);
            total += len;
        }
        push_joined(&mut chunks, &window);
        chunks
    }
}

fn push_joined(chunks: &mut Vec<String>, window: &[&str]) {
    let joined = window.concat();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

/// Split before every occurrence of `separator`, so each piece after the
/// first starts with it. An empty separator splits into characters.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (i, _) in text.char_indices() {
        if i > start && text[i..].starts_with(separator) {
            pieces.push(&text[start..i]);
            start = i;
        }
    }
    pieces.push(&text[start..]);
    pieces.retain(|piece| !piece.is_empty());
    pieces
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn splitter(size: usize, overlap: usize) -> RecursiveCharacterTextSplitter {
        RecursiveCharacterTextSplitter::new(size, overlap).unwrap_or_default()
    }

    #[test]
    fn test_rejects_overlap_not_below_size() {
        assert!(RecursiveCharacterTextSplitter::new(10, 10).is_err());
        assert!(RecursiveCharacterTextSplitter::new(0, 0).is_err());
        assert!(RecursiveCharacterTextSplitter::new(10, 2).is_ok());
    }

    #[test]
    fn test_separator_starts_next_piece() {
        assert_eq!(split_keeping_separator("a\n\nb\n\nc", "\n\n"), vec!["a", "\n\nb", "\n\nc"]);
        assert_eq!(split_keeping_separator("a\n\n\nb", "\n\n"), vec!["a", "\n", "\n\nb"]);
        assert_eq!(split_keeping_separator("番茄", ""), vec!["番", "茄"]);
    }

    #[test]
    fn test_short_text_is_one_trimmed_chunk() {
        let chunks = splitter(1000, 200).split_text("  # 番茄炒蛋\n\n鸡蛋两个\n  ");
        assert_eq!(chunks, vec!["# 番茄炒蛋\n\n鸡蛋两个"]);
    }

    #[test]
    fn test_words_merge_with_overlap() {
        let chunks = splitter(10, 5).split_text("aaa bbb ccc ddd");
        assert_eq!(chunks, vec!["aaa bbb", "bbb ccc", "ccc ddd"]);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
    }

    #[test]
    fn test_paragraphs_recurse_into_lines() {
        let text = "line one here\nline two here\n\nshort";
        let chunks = splitter(20, 0).split_text(text);
        assert_eq!(chunks, vec!["line one here", "line two here", "short"]);
    }

    #[test]
    fn test_long_word_falls_back_to_characters() {
        let chunks = splitter(4, 0).split_text("abcdefghij");
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        let text = "一二三四五六七八九十";
        let chunks = splitter(5, 0).split_text(text);
        assert_eq!(chunks, vec!["一二三四五", "六七八九十"]);
    }

    #[test]
    fn test_whitespace_only_yields_nothing() {
        assert!(splitter(10, 2).split_text(" \n\n \n ").is_empty());
    }
}
