//! Chunk merging: one section per chunk, preceded by a table of contents.
//!
//! ```text
//! ## Contents (chunks)
//!
//! - [Chunk 01 (pages 1–20)](#chunk-01-pages-1-20)
//! - [Chunk 02 (pages 21–40)](#chunk-02-pages-21-40)
//!
//! <a name="chunk-01-pages-1-20"></a>
//! ## Chunk 01 (pages 1–20)
//!
//! …chunk body…
//! ```
//!
//! Chunk boundaries stay visible; nothing is deduplicated or renumbered.

use crate::engine::EngineKind;
use crate::pipeline::chunker::PageRange;
use std::path::PathBuf;

/// The converted output of one chunk, in page order.
#[derive(Debug, Clone)]
pub struct ChunkOutput {
    /// 1-based chunk position.
    pub index: usize,
    pub range: PageRange,
    pub markdown: String,
    /// Where the chunk's images were written.
    pub asset_dir: PathBuf,
    /// Engine that produced `markdown`.
    pub engine: EngineKind,
}

/// Anchor of chunk `index`: `chunk-<NN>-pages-<start>-<end>`.
pub fn chunk_anchor(index: usize, range: PageRange) -> String {
    format!("chunk-{:02}-pages-{}-{}", index, range.start(), range.end())
}

/// Heading text of chunk `index`: `Chunk <NN> (pages <start>–<end>)`.
pub fn chunk_heading(index: usize, range: PageRange) -> String {
    format!("Chunk {:02} (pages {}–{})", index, range.start(), range.end())
}

/// Merged chunk sections plus the table of contents pointing at them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergedDocument {
    /// `(anchor, heading)` pairs in page order.
    pub toc: Vec<(String, String)>,
    /// One rendered section per chunk, in page order.
    pub sections: Vec<String>,
    pub asset_dir: PathBuf,
}

impl MergedDocument {
    /// Render the table of contents followed by every section.
    pub fn render(&self) -> String {
        let mut parts = Vec::with_capacity(self.sections.len() + 1);
        if !self.toc.is_empty() {
            let mut toc = String::from("## Contents (chunks)\n\n");
            let bullets: Vec<String> = self
                .toc
                .iter()
                .map(|(anchor, heading)| format!("- [{}](#{})", heading, anchor))
                .collect();
            toc.push_str(&bullets.join("\n"));
            parts.push(toc);
        }
        parts.extend(self.sections.iter().cloned());
        let mut out = parts.join("\n\n");
        out.push('\n');
        out
    }
}

/// Merge chunk outputs into one document.
///
/// `outputs` are sorted by page range first, so callers cannot break page
/// order by accident.
pub fn merge_chunks(outputs: &[ChunkOutput], asset_dir: impl Into<PathBuf>) -> MergedDocument {
    let mut ordered: Vec<&ChunkOutput> = outputs.iter().collect();
    ordered.sort_by_key(|c| (c.range, c.index));

    let mut doc = MergedDocument {
        asset_dir: asset_dir.into(),
        ..MergedDocument::default()
    };
    for chunk in ordered {
        let anchor = chunk_anchor(chunk.index, chunk.range);
        let heading = chunk_heading(chunk.index, chunk.range);
        doc.sections.push(format!(
            "<a name=\"{}\"></a>\n## {}\n\n{}",
            anchor,
            heading,
            chunk.markdown.trim()
        ));
        doc.toc.push((anchor, heading));
    }
    doc
}
