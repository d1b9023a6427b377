//! Output types returned by [`crate::convert`].

use crate::engine::EngineKind;
use serde::Serialize;
use std::path::PathBuf;

/// Everything a finished conversion produced.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionOutput {
    /// Final Markdown as written to disk, frontmatter included.
    pub markdown: String,
    /// Path of the written `.md` file.
    pub output_path: PathBuf,
    /// Directory that holds the document's `assets/`.
    pub target_dir: PathBuf,
    /// Engine selected for the document. For chunked jobs individual chunks
    /// may have been converted by the alternate engine; see `chunk_engines`.
    pub engine: EngineKind,
    /// Engine per chunk, in page order. Empty for unchunked conversions.
    pub chunk_engines: Vec<EngineKind>,
    /// Combined engine and relocation log.
    pub log: String,
    pub stats: ConversionStats,
}

impl ConversionOutput {
    pub fn is_chunked(&self) -> bool {
        !self.chunk_engines.is_empty()
    }
}

/// Aggregate statistics for one conversion.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversionStats {
    /// Page count of a PDF input; `None` for other formats or unreadable PDFs.
    pub total_pages: Option<usize>,
    /// Number of chunks; 1 for unchunked conversions.
    pub chunks: usize,
    /// Chunks converted by the alternate engine.
    pub fallback_chunks: usize,
    pub images_found: usize,
    pub images_copied: usize,
    pub markdown_chars: usize,
    pub total_duration_ms: u64,
}
