//! Boundary-aware text chunker.
//!
//! Windows are at most `target_chars` long. Each cut is made at the last
//! paragraph break inside the window, else the last sentence end, else the
//! last whitespace, and only then at the raw window edge. The next window
//! starts `overlap_chars` before the cut so an entry that straddles the cut
//! appears whole in at least one chunk.
//!
//! Sizes are counted in chars; offsets are byte offsets on char boundaries.

use crate::models::TextChunk;

/// Splits `text` into overlapping chunks. The iterator is single-pass.
pub fn chunk(text: &str, target_chars: usize, overlap_chars: usize) -> Chunker<'_> {
    Chunker::new(text, target_chars, overlap_chars)
}

#[derive(Debug)]
pub struct Chunker<'a> {
    text: &'a str,
    target_chars: usize,
    overlap_chars: usize,
    pos: usize,
    prev_end: usize,
    index: usize,
    done: bool,
}

impl<'a> Chunker<'a> {
    pub fn new(text: &'a str, target_chars: usize, overlap_chars: usize) -> Self {
        let target_chars = target_chars.max(2);
        // Overlap must stay under half a window or a cut could fail to advance.
        let overlap_chars = overlap_chars.min(target_chars / 2 - 1);
        Self {
            text,
            target_chars,
            overlap_chars,
            pos: 0,
            prev_end: 0,
            index: 0,
            done: text.is_empty(),
        }
    }

    fn find_cut(&self) -> usize {
        let end = advance_chars(self.text, self.pos, self.target_chars);
        let floor = advance_chars(self.text, self.pos, self.target_chars / 2);
        let window = &self.text[floor..end];

        if let Some(i) = window.rfind("\n\n") {
            return floor + i + 2;
        }
        if let Some(i) = last_sentence_end(window) {
            return floor + i;
        }
        if let Some((i, c)) = window.char_indices().rev().find(|(_, c)| c.is_whitespace()) {
            return floor + i + c.len_utf8();
        }
        end
    }

    /// Steps back `overlap_chars` from the cut, then forward to the next word
    /// start so a chunk never opens mid-word.
    fn next_start(&self, cut: usize) -> usize {
        let back = retreat_chars(self.text, cut, self.overlap_chars).max(self.pos + 1);
        let back = ceil_char_boundary(self.text, back);
        let region = &self.text[back..cut];
        let starts_mid_word = self.text[..back]
            .chars()
            .next_back()
            .is_some_and(|c| !c.is_whitespace());
        if !starts_mid_word {
            return back;
        }
        match region.char_indices().find(|(_, c)| c.is_whitespace()) {
            Some((i, c)) if back + i + c.len_utf8() < cut => back + i + c.len_utf8(),
            _ => back,
        }
    }
}

impl Iterator for Chunker<'_> {
    type Item = TextChunk;

    fn next(&mut self) -> Option<TextChunk> {
        if self.done {
            return None;
        }

        let remaining = self.text[self.pos..].chars().count();
        let cut = if remaining <= self.target_chars {
            self.done = true;
            self.text.len()
        } else {
            self.find_cut()
        };

        let chunk = TextChunk {
            index: self.index,
            start_offset: self.pos,
            overlap_with_previous: if self.index == 0 {
                0
            } else {
                self.prev_end.saturating_sub(self.pos)
            },
            text: self.text[self.pos..cut].to_string(),
        };

        self.index += 1;
        self.prev_end = cut;
        if !self.done {
            self.pos = self.next_start(cut);
        }
        Some(chunk)
    }
}

/// Byte index just past the whitespace that follows the last `.`, `!` or `?`.
fn last_sentence_end(window: &str) -> Option<usize> {
    let bytes = window.as_bytes();
    (0..bytes.len().saturating_sub(1))
        .rev()
        .find(|&i| matches!(bytes[i], b'.' | b'!' | b'?') && bytes[i + 1].is_ascii_whitespace())
        .map(|i| i + 2)
}

fn advance_chars(text: &str, from: usize, n: usize) -> usize {
    text[from..]
        .char_indices()
        .nth(n)
        .map(|(i, _)| from + i)
        .unwrap_or(text.len())
}

fn retreat_chars(text: &str, from: usize, n: usize) -> usize {
    if n == 0 {
        return from;
    }
    text[..from]
        .char_indices()
        .rev()
        .nth(n - 1)
        .map(|(i, _)| i)
        .unwrap_or(0)
}

fn ceil_char_boundary(text: &str, mut i: usize) -> usize {
    while i < text.len() && !text.is_char_boundary(i) {
        i += 1;
    }
    i
}
