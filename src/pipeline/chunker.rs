//! Page-range planning and PDF splitting.
//!
//! [`plan_page_ranges`] is pure arithmetic and is what the chunk orchestrator,
//! the merger and the tests reason about. [`split`] materialises each range as
//! an independent PDF in a fresh temporary file via pdfium.
//!
//! pdfium is not async-safe, so every pdfium call runs inside
//! `tokio::task::spawn_blocking`.

use crate::error::Doc2MdError;
use pdfium_render::prelude::*;
use std::fmt;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tracing::{debug, info};

/// An inclusive, 1-indexed page range with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageRange {
    start: usize,
    end: usize,
}

impl PageRange {
    /// `None` unless `1 <= start <= end`.
    pub fn new(start: usize, end: usize) -> Option<Self> {
        if start >= 1 && start <= end {
            Some(Self { start, end })
        } else {
            None
        }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    /// Number of pages in the range (always ≥ 1).
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Split `1..=total_pages` into contiguous ranges of at most `chunk_size` pages.
///
/// Produces `ceil(total_pages / chunk_size)` ranges; every range but the last
/// has exactly `chunk_size` pages. A chunk size of 0 is treated as 1.
pub fn plan_page_ranges(total_pages: usize, chunk_size: usize) -> Vec<PageRange> {
    let size = chunk_size.max(1);
    let mut ranges = Vec::with_capacity(total_pages.div_ceil(size));
    let mut start = 1;
    while start <= total_pages {
        let end = (start + size - 1).min(total_pages);
        ranges.push(PageRange { start, end });
        start = end + 1;
    }
    ranges
}

/// One page-range sub-document ready for conversion.
///
/// The temporary PDF is deleted when the chunk is dropped.
#[derive(Debug)]
pub struct Chunk {
    /// 1-based position in the chunk sequence.
    pub index: usize,
    pub source: PathBuf,
    pub range: PageRange,
    pub document: TempPath,
}

impl Chunk {
    pub fn path(&self) -> &Path {
        &self.document
    }
}

/// Count the pages of a PDF.
///
/// Any failure (binding, unreadable file, not a PDF) is reported as
/// [`Doc2MdError::SourceUnreadable`] so callers can fall back to a
/// whole-document conversion.
pub async fn page_count(pdf_path: &Path) -> Result<usize, Doc2MdError> {
    let path = pdf_path.to_path_buf();
    tokio::task::spawn_blocking(move || page_count_blocking(&path))
        .await
        .map_err(|e| Doc2MdError::Internal(format!("Page-count task panicked: {}", e)))?
}

fn page_count_blocking(pdf_path: &Path) -> Result<usize, Doc2MdError> {
    let unreadable = |detail: String| Doc2MdError::SourceUnreadable {
        path: pdf_path.to_path_buf(),
        detail,
    };
    let pdfium = pdfium_auto::bind_pdfium_silent().map_err(|e| unreadable(e.to_string()))?;
    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| unreadable(format!("{:?}", e)))?;
    let pages = document.pages().len() as usize;
    if pages == 0 {
        return Err(unreadable("document has no pages".into()));
    }
    Ok(pages)
}

/// Split a PDF into chunks of at most `chunk_size` pages.
///
/// Each chunk is written to its own temporary file. Fails with
/// [`Doc2MdError::SourceUnreadable`] when the page count cannot be determined.
pub async fn split(source: &Path, chunk_size: usize) -> Result<Vec<Chunk>, Doc2MdError> {
    let path = source.to_path_buf();
    tokio::task::spawn_blocking(move || split_blocking(&path, chunk_size))
        .await
        .map_err(|e| Doc2MdError::Internal(format!("Split task panicked: {}", e)))?
}

fn split_blocking(source: &Path, chunk_size: usize) -> Result<Vec<Chunk>, Doc2MdError> {
    let unreadable = |detail: String| Doc2MdError::SourceUnreadable {
        path: source.to_path_buf(),
        detail,
    };
    let pdfium = pdfium_auto::bind_pdfium_silent().map_err(|e| unreadable(e.to_string()))?;
    let document = pdfium
        .load_pdf_from_file(source, None)
        .map_err(|e| unreadable(format!("{:?}", e)))?;
    let total = document.pages().len() as usize;
    if total == 0 {
        return Err(unreadable("document has no pages".into()));
    }

    let ranges = plan_page_ranges(total, chunk_size);
    info!(
        "Splitting {} pages into {} chunk(s) of ≤{} pages",
        total,
        ranges.len(),
        chunk_size.max(1)
    );

    let mut chunks = Vec::with_capacity(ranges.len());
    for (i, range) in ranges.into_iter().enumerate() {
        let internal = |detail: String| {
            Doc2MdError::Internal(format!("Cannot write chunk pages {}: {}", range, detail))
        };

        let mut part = pdfium
            .create_new_pdf()
            .map_err(|e| internal(format!("{:?}", e)))?;
        let first = (range.start() - 1) as PdfPageIndex;
        let last = (range.end() - 1) as PdfPageIndex;
        part.pages_mut()
            .copy_page_range_from_document(&document, first..=last, 0)
            .map_err(|e| internal(format!("{:?}", e)))?;

        let tmp = tempfile::Builder::new()
            .prefix("doc2md-chunk-")
            .suffix(".pdf")
            .tempfile()
            .map_err(|e| internal(e.to_string()))?
            .into_temp_path();
        part.save_to_file(&tmp)
            .map_err(|e| internal(format!("{:?}", e)))?;
        debug!("Chunk {:02} pages {} → {}", i + 1, range, tmp.display());

        chunks.push(Chunk {
            index: i + 1,
            source: source.to_path_buf(),
            range,
            document: tmp,
        });
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn page_range_rejects_invalid() {
        assert!(PageRange::new(0, 3).is_none());
        assert!(PageRange::new(5, 4).is_none());
        let r = PageRange::new(21, 40).unwrap();
        assert_eq!(r.len(), 20);
        assert_eq!(r.to_string(), "21-40");
    }

    #[test]
    fn plan_fifty_pages_by_twenty() {
        let ranges = plan_page_ranges(50, 20);
        let pairs: Vec<_> = ranges.iter().map(|r| (r.start(), r.end())).collect();
        assert_eq!(pairs, vec![(1, 20), (21, 40), (41, 50)]);
    }

    #[test]
    fn plan_edge_cases() {
        assert!(plan_page_ranges(0, 20).is_empty());
        assert_eq!(plan_page_ranges(1, 20).len(), 1);
        assert_eq!(plan_page_ranges(20, 20).len(), 1);
        assert_eq!(plan_page_ranges(21, 20).len(), 2);
        assert_eq!(plan_page_ranges(3, 0).len(), 3);
    }

    #[tokio::test]
    async fn page_count_of_non_pdf_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not.pdf");
        std::fs::write(&path, "plain text").unwrap();
        let err = page_count(&path).await.unwrap_err();
        assert!(matches!(err, Doc2MdError::SourceUnreadable { .. }), "got {err:?}");
    }

    proptest! {
        #[test]
        fn ranges_cover_all_pages(n in 1usize..2000, s in 1usize..150) {
            let ranges = plan_page_ranges(n, s);
            prop_assert_eq!(ranges.len(), n.div_ceil(s));
            prop_assert_eq!(ranges[0].start(), 1);
            prop_assert_eq!(ranges[ranges.len() - 1].end(), n);
            for pair in ranges.windows(2) {
                prop_assert_eq!(pair[0].end() + 1, pair[1].start());
            }
            for (i, r) in ranges.iter().enumerate() {
                prop_assert!(r.len() <= s);
                if i + 1 < ranges.len() {
                    prop_assert_eq!(r.len(), s);
                }
            }
        }
    }
}
