//! Splits plain text into overlapping windows for embedding.
//!
//! Sizes and overlaps are counted in Unicode scalar values, so a Japanese
//! sentence and an English one of the same visible length produce the same
//! number of chunks.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStrategy {
    /// Fixed-size windows with exact overlap.
    #[default]
    Fixed,
    /// Greedy sentence packing up to `chunk_size`, falling back to fixed
    /// windows for sentences that do not fit.
    Sentence,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChunkingConfig {
    pub strategy: ChunkStrategy,
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { strategy: ChunkStrategy::Fixed, chunk_size: 800, overlap: 100 }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::validation("chunk_size must be positive"));
        }
        if self.overlap >= self.chunk_size {
            return Err(Error::validation(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Fixed-size windows over `text`.
///
/// Window `i` starts at `i * (chunk_size - overlap)`; iteration ends with the
/// first window that reaches the end of the text. Once exhausted the iterator
/// keeps returning `None`.
#[derive(Debug)]
pub struct Windows<'a> {
    text: &'a str,
    offsets: Vec<usize>,
    size: usize,
    step: usize,
    start: usize,
    done: bool,
}

impl<'a> Iterator for Windows<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let n = self.offsets.len() - 1;
        let end = (self.start + self.size).min(n);
        let piece = &self.text[self.offsets[self.start]..self.offsets[end]];
        if end == n {
            self.done = true;
        } else {
            self.start += self.step;
        }
        Some(piece)
    }
}

/// Validate the parameters and build a window iterator.
pub fn windows(text: &str, chunk_size: usize, overlap: usize) -> Result<Windows<'_>> {
    ChunkingConfig { strategy: ChunkStrategy::Fixed, chunk_size, overlap }.validate()?;
    let mut offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    offsets.push(text.len());
    Ok(Windows { text, done: text.is_empty(), offsets, size: chunk_size, step: chunk_size - overlap, start: 0 })
}

/// Number of windows `windows` yields for a text of `len` characters.
pub fn expected_chunk_count(len: usize, chunk_size: usize, overlap: usize) -> usize {
    if len == 0 {
        return 0;
    }
    if len <= overlap {
        return 1;
    }
    let step = chunk_size - overlap;
    (len - overlap).div_ceil(step)
}

#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn chunk(&self, text: &str) -> Vec<String> {
        let ChunkingConfig { strategy, chunk_size, overlap } = self.config;
        match strategy {
            ChunkStrategy::Fixed => fixed(text, chunk_size, overlap),
            ChunkStrategy::Sentence => pack_sentences(&split_sentences(text), chunk_size, overlap),
        }
    }
}

fn fixed(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    match windows(text, chunk_size, overlap) {
        Ok(w) => w.map(str::to_string).collect(),
        Err(_) => Vec::new(), // config was validated in Chunker::new
    }
}

fn is_terminator(c: char) -> bool {
    matches!(c, '。' | '！' | '？' | '!' | '?' | '.')
}

/// Split on line breaks, then after sentence terminators.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut start = 0;
        let mut iter = line.char_indices().peekable();
        while let Some((i, c)) = iter.next() {
            if !is_terminator(c) {
                continue;
            }
            // ASCII '.' only ends a sentence before whitespace or end of line
            if c == '.' && iter.peek().is_some_and(|(_, next)| !next.is_whitespace()) {
                continue;
            }
            let end = i + c.len_utf8();
            let sentence = line[start..end].trim();
            if !sentence.is_empty() {
                out.push(sentence);
            }
            start = end;
        }
        let rest = line[start..].trim();
        if !rest.is_empty() {
            out.push(rest);
        }
    }
    out
}

fn pack_sentences(sentences: &[&str], max_chars: usize, overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut buf = String::new();
    let mut buf_len = 0usize;
    for sentence in sentences {
        let len = sentence.chars().count();
        if len > max_chars {
            if !buf.is_empty() {
                chunks.push(std::mem::take(&mut buf));
                buf_len = 0;
            }
            chunks.extend(fixed(sentence, max_chars, overlap));
            continue;
        }
        let needs_space = buf.chars().last().is_some_and(|c| c.is_ascii());
        let joined_len = buf_len + len + usize::from(needs_space);
        if buf.is_empty() {
            buf.push_str(sentence);
            buf_len = len;
        } else if joined_len <= max_chars {
            if needs_space {
                buf.push(' ');
            }
            buf.push_str(sentence);
            buf_len = joined_len;
        } else {
            chunks.push(std::mem::replace(&mut buf, (*sentence).to_string()));
            buf_len = len;
        }
    }
    if !buf.is_empty() {
        chunks.push(buf);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconstruct(chunks: &[&str], overlap: usize) -> String {
        let mut out = String::new();
        for (i, c) in chunks.iter().enumerate() {
            if i == 0 {
                out.push_str(c);
            } else {
                out.extend(c.chars().skip(overlap));
            }
        }
        out
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert_eq!(windows("", 10, 2).expect("valid").count(), 0);
        assert!(Chunker::new(ChunkingConfig::default()).expect("valid").chunk("").is_empty());
    }

    #[test]
    fn overlap_must_be_smaller_than_size() {
        assert!(matches!(windows("abc", 4, 4), Err(Error::Validation(_))));
        assert!(matches!(windows("abc", 0, 0), Err(Error::Validation(_))));
        assert!(Chunker::new(ChunkingConfig { strategy: ChunkStrategy::Fixed, chunk_size: 5, overlap: 9 }).is_err());
    }

    #[test]
    fn reconstructs_input_and_matches_count() {
        let text = "RAGとは検索拡張生成です。外部の知識を取り出して回答に使います。abcdefghijklmnopqrstuvwxyz 0123456789";
        let len = text.chars().count();
        for size in 1..=40 {
            for overlap in 0..size {
                let chunks: Vec<&str> = windows(text, size, overlap).expect("valid").collect();
                assert_eq!(reconstruct(&chunks, overlap), text, "size={size} overlap={overlap}");
                assert_eq!(chunks.len(), expected_chunk_count(len, size, overlap), "size={size} overlap={overlap}");
            }
        }
    }

    #[test]
    fn consecutive_windows_share_exactly_overlap() {
        let text: String = ('a'..='z').cycle().take(103).collect();
        let chunks: Vec<&str> = windows(&text, 10, 3).expect("valid").collect();
        for pair in chunks.windows(2) {
            let tail: String = pair[0].chars().skip(pair[0].chars().count() - 3).collect();
            let head: String = pair[1].chars().take(3).collect();
            assert_eq!(tail, head);
        }
        assert!(chunks[..chunks.len() - 1].iter().all(|c| c.chars().count() == 10));
    }

    #[test]
    fn short_text_within_overlap_is_one_chunk() {
        let chunks: Vec<&str> = windows("abc", 10, 5).expect("valid").collect();
        assert_eq!(chunks, vec!["abc"]);
        assert_eq!(expected_chunk_count(3, 10, 5), 1);
    }

    #[test]
    fn iterator_is_not_restartable() {
        let mut it = windows("abcdef", 4, 1).expect("valid");
        assert_eq!(it.next(), Some("abcd"));
        assert_eq!(it.next(), Some("def"));
        assert_eq!(it.next(), None);
        assert_eq!(it.next(), None);
    }

    #[test]
    fn sentence_strategy_packs_japanese_sentences() {
        let chunker =
            Chunker::new(ChunkingConfig { strategy: ChunkStrategy::Sentence, chunk_size: 12, overlap: 0 }).expect("valid");
        let chunks = chunker.chunk("RAGとは何か。検索拡張生成です！\n便利？");
        assert_eq!(chunks, vec!["RAGとは何か。", "検索拡張生成です！便利？"]);
    }

    #[test]
    fn sentence_strategy_splits_oversized_sentences() {
        let chunker =
            Chunker::new(ChunkingConfig { strategy: ChunkStrategy::Sentence, chunk_size: 5, overlap: 1 }).expect("valid");
        let chunks = chunker.chunk("Hi. abcdefghij");
        assert_eq!(chunks, vec!["Hi.", "abcde", "efghi", "ij"]);
    }

    #[test]
    fn sentence_strategy_keeps_decimal_points() {
        assert_eq!(split_sentences("Version 2.5 is out. Try it"), vec!["Version 2.5 is out.", "Try it"]);
    }
}
