//! Splits source text into token-bounded chunks on content-aware boundaries.
//!
//! The token budget is a soft bound. A span with no separator inside the
//! budget window is extended to the next separator (or the end of the text)
//! and emitted oversized, never truncated. Chunks are exact slices of the
//! input, so joining them reproduces the source byte for byte.

use serde::{Deserialize, Serialize};
use tiktoken_rs::CoreBPE;
use tracing::{debug, warn};

use crate::config::ChunkingConfig;
use crate::error::{PodcastError, Result};

/// Counts model tokens in a piece of text.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// Exact token counts with the `cl100k_base` BPE vocabulary.
pub struct BpeTokenCounter {
    bpe: CoreBPE,
}

impl BpeTokenCounter {
    pub fn cl100k() -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base().map_err(|e| {
            PodcastError::ConfigError(format!("Failed to load cl100k_base tokenizer: {}", e))
        })?;
        Ok(Self { bpe })
    }
}

impl TokenCounter for BpeTokenCounter {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }
}

/// A source document fetched for a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub topic: String,
    pub text: String,
}

impl SourceDocument {
    pub fn new(topic: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            text: text.into(),
        }
    }
}

/// One ordered segment of a source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    /// Position of this chunk in the document.
    pub index: usize,
    pub content: String,
    pub tokens: usize,
}

impl TextChunk {
    /// True when the chunk had to exceed the budget to keep a unit intact.
    pub fn is_oversized(&self, max_tokens: usize) -> bool {
        self.tokens > max_tokens
    }
}

pub struct TextChunker {
    max_tokens: usize,
    separators: Vec<String>,
    counter: Box<dyn TokenCounter>,
}

impl TextChunker {
    pub fn new(max_tokens: usize, separators: Vec<String>, counter: Box<dyn TokenCounter>) -> Self {
        Self {
            max_tokens: max_tokens.max(1),
            separators: separators.into_iter().filter(|s| !s.is_empty()).collect(),
            counter,
        }
    }

    /// Chunker counting with the cl100k vocabulary.
    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Ok(Self::new(
            config.max_tokens,
            config.separators.clone(),
            Box::new(BpeTokenCounter::cl100k()?),
        ))
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    /// Split `text` into chunks. Empty input yields no chunks.
    pub fn split(&self, text: &str) -> Vec<TextChunk> {
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < text.len() {
            let rest = &text[start..];
            let end = start + self.next_boundary(rest);
            let content = &text[start..end];
            let tokens = self.counter.count(content);

            if tokens > self.max_tokens {
                warn!(
                    index = chunks.len(),
                    tokens,
                    max_tokens = self.max_tokens,
                    "no separator within budget, emitting oversized chunk"
                );
            }

            chunks.push(TextChunk {
                index: chunks.len(),
                content: content.to_string(),
                tokens,
            });
            start = end;
        }

        debug!(chunks = chunks.len(), bytes = text.len(), "split source text");
        chunks
    }

    /// Byte length of the next chunk taken from the front of `rest`.
    fn next_boundary(&self, rest: &str) -> usize {
        if self.counter.count(rest) <= self.max_tokens {
            return rest.len();
        }

        let limit = self.budget_limit(rest);
        let window = &rest[..limit];

        // First separator in priority order with an occurrence inside the
        // window wins; cut right before its last occurrence so it opens the
        // next chunk.
        for sep in &self.separators {
            if let Some(pos) = window.rfind(sep.as_str()) {
                if pos > 0 {
                    return pos;
                }
            }
        }

        // Nothing usable in the window: keep the unit whole up to the next
        // separator of any kind.
        let skip = rest.chars().next().map_or(0, char::len_utf8);
        self.separators
            .iter()
            .filter_map(|sep| rest[skip..].find(sep.as_str()).map(|p| p + skip))
            .min()
            .unwrap_or(rest.len())
    }

    /// Longest prefix of `rest`, ending on a char boundary, that fits the budget.
    fn budget_limit(&self, rest: &str) -> usize {
        let boundaries: Vec<usize> = rest
            .char_indices()
            .map(|(i, _)| i)
            .skip(1)
            .chain(std::iter::once(rest.len()))
            .collect();

        // Counts grow with prefix length, so binary search on the boundaries.
        let (mut lo, mut hi) = (0usize, boundaries.len());
        while lo < hi {
            let mid = (lo + hi) / 2;
            if self.counter.count(&rest[..boundaries[mid]]) <= self.max_tokens {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }

        if lo == 0 { boundaries[0] } else { boundaries[lo - 1] }
    }
}
