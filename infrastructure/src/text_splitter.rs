use domain::models::Chunk;
use thiserror::Error;
use tracing::warn;

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Paragraph break, line break, space, then raw characters.
pub const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SplitterError {
    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,

    #[error("chunk overlap ({overlap}) is larger than chunk size ({size})")]
    OverlapTooLarge { size: usize, overlap: usize },
}

/// Recursive character splitter.
///
/// Splits on the first separator present in the text, keeping each separator
/// attached to the start of the piece that follows it, then greedily merges
/// pieces into windows of at most `chunk_size` characters. Pieces that are
/// still too long are split again with the remaining separators. Consecutive
/// windows share trailing pieces totalling at most `chunk_overlap` characters.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, SplitterError> {
        if chunk_size == 0 {
            return Err(SplitterError::ZeroChunkSize);
        }
        if chunk_overlap > chunk_size {
            return Err(SplitterError::OverlapTooLarge {
                size: chunk_size,
                overlap: chunk_overlap,
            });
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Split every unit, copying its metadata onto each resulting chunk.
    pub fn split_documents(&self, documents: &[Chunk]) -> Vec<Chunk> {
        documents
            .iter()
            .flat_map(|doc| {
                self.split_text(&doc.text)
                    .into_iter()
                    .map(move |text| Chunk::new(text, doc.metadata.clone()))
            })
            .collect()
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        let separators: Vec<&str> = self.separators.iter().map(String::as_str).collect();
        self.split_recursive(text, &separators)
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut separator = separators.last().copied().unwrap_or("");
        let mut remaining: &[&str] = &[];
        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = candidate;
                break;
            }
            if text.contains(candidate) {
                separator = candidate;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                chunks.extend(self.merge_pieces(&pending));
                pending.clear();
            }
            if remaining.is_empty() {
                chunks.push(piece.to_string());
            } else {
                chunks.extend(self.split_recursive(piece, remaining));
            }
        }
        if !pending.is_empty() {
            chunks.extend(self.merge_pieces(&pending));
        }
        chunks
    }

    /// Greedily join pieces into windows, carrying an overlap tail forward.
    /// Separators are already part of the pieces, so they join with "".
    fn merge_pieces(&self, pieces: &[&str]) -> Vec<String> {
        let mut windows = Vec::new();
        let mut current: Vec<(&str, usize)> = Vec::new();
        let mut total = 0usize;
        let mut start = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size {
                if total > self.chunk_size {
                    warn!(
                        size = total,
                        limit = self.chunk_size,
                        "created a chunk longer than the configured size"
                    );
                }
                if start < current.len() {
                    if let Some(window) = join_window(&current[start..]) {
                        windows.push(window);
                    }
                    while start < current.len()
                        && (total > self.chunk_overlap || total + len > self.chunk_size)
                    {
                        total -= current[start].1;
                        start += 1;
                    }
                }
            }
            current.push((piece, len));
            total += len;
        }
        if let Some(window) = join_window(&current[start..]) {
            windows.push(window);
        }
        windows
    }
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn join_window(pieces: &[(&str, usize)]) -> Option<String> {
    let joined: String = pieces.iter().map(|(piece, _)| *piece).collect();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Split `text` on `separator`, attaching each separator to the start of the
/// following piece. An empty separator splits into single characters. Empty
/// pieces are dropped.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut last = 0;
    for (index, _) in text.match_indices(separator) {
        if index > last {
            pieces.push(&text[last..index]);
        }
        last = index;
    }
    pieces.push(&text[last..]);
    pieces.retain(|p| !p.is_empty());
    pieces
}
