//! Document chunker
//!
//! Splits a document into overlapping fragments, either along sentence
//! boundaries (the default) or as fixed-width character windows. All sizes
//! and offsets are counted in characters of the newline-normalized text.

use crate::error::{Error, Result};
use crate::vector_entry::Fragment;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingOptions {
    /// Buffer length above which a sentence triggers a split.
    pub chunk_size: usize,
    /// Characters carried from the tail of one fragment into the next.
    pub chunk_overlap: usize,
    pub preserve_sentences: bool,
}

impl Default for ChunkingOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            preserve_sentences: true,
        }
    }
}

impl ChunkingOptions {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Configuration(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::Configuration(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Chunker bound to a validated set of options.
#[derive(Debug, Clone, Default)]
pub struct Chunker {
    options: ChunkingOptions,
}

impl Chunker {
    pub fn new(options: ChunkingOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &ChunkingOptions {
        &self.options
    }

    /// Chunk one document. Empty or whitespace-only input yields no fragments.
    pub fn chunk(&self, content: &str, file_name: &str) -> Vec<Fragment> {
        if content.trim().is_empty() {
            return Vec::new();
        }

        let normalized = normalize_newlines(content);
        let chars: Vec<char> = normalized.chars().collect();

        if self.options.preserve_sentences {
            self.chunk_by_sentences(&chars, file_name)
        } else {
            self.chunk_by_size(&chars, file_name)
        }
    }

    fn chunk_by_sentences(&self, chars: &[char], file_name: &str) -> Vec<Fragment> {
        let mut fragments = Vec::new();
        let mut buffer = Buffer::default();

        for sentence in split_sentences(chars) {
            if !buffer.is_empty() && buffer.len_with(&sentence) > self.options.chunk_size {
                push_fragment(&mut fragments, &buffer, file_name);
                buffer = buffer.overlap(self.options.chunk_overlap);
            }
            buffer.push_sentence(chars, sentence);
        }

        push_fragment(&mut fragments, &buffer, file_name);
        fragments
    }

    fn chunk_by_size(&self, chars: &[char], file_name: &str) -> Vec<Fragment> {
        let step = self.options.chunk_size - self.options.chunk_overlap;
        let mut fragments = Vec::new();
        let mut start = 0;

        while start < chars.len() {
            let end = (start + self.options.chunk_size).min(chars.len());
            let chunk_index = fragments.len();
            fragments.push(Fragment {
                id: Fragment::fragment_id(file_name, chunk_index),
                content: chars[start..end].iter().collect(),
                file_name: file_name.to_string(),
                chunk_index,
                start_char: start,
                end_char: end,
            });
            start += step;
        }

        fragments
    }
}

/// Chunk `content` with `options`, rejecting invalid options up front.
pub fn chunk_document(
    content: &str,
    file_name: &str,
    options: &ChunkingOptions,
) -> Result<Vec<Fragment>> {
    Ok(Chunker::new(*options)?.chunk(content, file_name))
}

/// Rough token count for a fragment, assuming ~4 characters per token.
pub fn estimate_tokens(fragment: &Fragment) -> usize {
    fragment.content.chars().count() / 4
}

pub fn normalize_newlines(content: &str) -> String {
    content.replace("\r\n", "\n").replace('\r', "\n")
}

/// Half-open character range into the normalized source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    start: usize,
    end: usize,
}

impl Span {
    fn len(&self) -> usize {
        self.end - self.start
    }
}

/// Split on every whitespace run that directly follows `.`, `!` or `?`.
fn split_sentences(chars: &[char]) -> Vec<Span> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut i = 1;

    while i < chars.len() {
        if chars[i].is_whitespace() && matches!(chars[i - 1], '.' | '!' | '?') {
            let end = i;
            while i < chars.len() && chars[i].is_whitespace() {
                i += 1;
            }
            if end > start {
                sentences.push(Span { start, end });
            }
            start = i;
        } else {
            i += 1;
        }
    }

    if start < chars.len() {
        sentences.push(Span {
            start,
            end: chars.len(),
        });
    }
    sentences
}

/// Maps a stretch of buffer characters back onto the source text.
#[derive(Debug, Clone, Copy)]
struct Run {
    buf_start: usize,
    src_start: usize,
    len: usize,
}

/// Sentences joined by single spaces, with enough bookkeeping to recover
/// the source position of every non-separator character.
#[derive(Debug, Default)]
struct Buffer {
    text: Vec<char>,
    runs: Vec<Run>,
}

impl Buffer {
    fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    fn len_with(&self, sentence: &Span) -> usize {
        let separator = if self.text.is_empty() { 0 } else { 1 };
        self.text.len() + separator + sentence.len()
    }

    fn push_sentence(&mut self, chars: &[char], sentence: Span) {
        if !self.text.is_empty() {
            self.text.push(' ');
        }
        self.push_run(&chars[sentence.start..sentence.end], sentence.start);
    }

    fn push_run(&mut self, text: &[char], src_start: usize) {
        if text.is_empty() {
            return;
        }
        self.runs.push(Run {
            buf_start: self.text.len(),
            src_start,
            len: text.len(),
        });
        self.text.extend_from_slice(text);
    }

    /// Seed for the next fragment: the trailing `overlap` characters,
    /// advanced past the first whitespace so they start on a whole word.
    fn overlap(&self, overlap: usize) -> Buffer {
        let cut = if self.text.len() <= overlap {
            0
        } else {
            let tail_start = self.text.len() - overlap;
            match self.text[tail_start..].iter().position(|c| c.is_whitespace()) {
                Some(pos) => tail_start + pos + 1,
                None => tail_start,
            }
        };

        let runs = self
            .runs
            .iter()
            .filter(|run| run.buf_start + run.len > cut)
            .map(|run| {
                let from = run.buf_start.max(cut);
                Run {
                    buf_start: from - cut,
                    src_start: run.src_start + (from - run.buf_start),
                    len: run.buf_start + run.len - from,
                }
            })
            .collect();

        Buffer {
            text: self.text[cut..].to_vec(),
            runs,
        }
    }

    fn source_position(&self, buf_pos: usize) -> Option<usize> {
        self.runs
            .iter()
            .find(|run| buf_pos >= run.buf_start && buf_pos < run.buf_start + run.len)
            .map(|run| run.src_start + (buf_pos - run.buf_start))
    }
}

fn push_fragment(fragments: &mut Vec<Fragment>, buffer: &Buffer, file_name: &str) {
    let first = buffer.text.iter().position(|c| !c.is_whitespace());
    let last = buffer.text.iter().rposition(|c| !c.is_whitespace());
    let (Some(first), Some(last)) = (first, last) else {
        return;
    };

    let start_char = buffer.source_position(first).unwrap_or(0);
    let end_char = buffer
        .source_position(last)
        .map(|pos| pos + 1)
        .unwrap_or(start_char);

    let chunk_index = fragments.len();
    fragments.push(Fragment {
        id: Fragment::fragment_id(file_name, chunk_index),
        content: buffer.text[first..=last].iter().collect(),
        file_name: file_name.to_string(),
        chunk_index,
        start_char,
        end_char,
    });
}
