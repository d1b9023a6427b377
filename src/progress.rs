//! Progress callbacks for chunked conversions and the live engine-log sink.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! chunk-level events, and a [`LogSink`] via
//! [`crate::config::ConversionConfigBuilder::log_sink`] to receive every line
//! an external engine prints, as it prints it.
//!
//! Chunks are converted strictly one after another, so events arrive in
//! ascending chunk order and never concurrently. The traits are still
//! `Send + Sync` because the conversion future may move between runtime
//! worker threads.
//!
//! # Example
//!
//! ```rust
//! use edgequake_doc2md::{ConversionProgressCallback, ConversionConfig, PageRange};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_chunk_complete(&self, chunk: usize, total: usize, range: PageRange, engine: &str) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("chunk {chunk}/{total} ({range}) via {engine}");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::pipeline::chunker::PageRange;
use std::sync::Arc;

/// Called by the chunk orchestrator as it processes each chunk.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once after the document was split, before any chunk is converted.
    fn on_conversion_start(&self, total_chunks: usize, total_pages: usize) {
        let _ = (total_chunks, total_pages);
    }

    /// Called before the primary engine runs on a chunk (1-indexed).
    fn on_chunk_start(&self, chunk: usize, total_chunks: usize, range: PageRange) {
        let _ = (chunk, total_chunks, range);
    }

    /// Called when the primary engine failed and the alternate takes over.
    fn on_chunk_fallback(&self, chunk: usize, total_chunks: usize, range: PageRange, error: &str) {
        let _ = (chunk, total_chunks, range, error);
    }

    /// Called when a chunk converted successfully; `engine` is the log label
    /// of the engine that produced the text.
    fn on_chunk_complete(&self, chunk: usize, total_chunks: usize, range: PageRange, engine: &str) {
        let _ = (chunk, total_chunks, range, engine);
    }

    /// Called when both engines failed for a chunk. The job aborts afterwards.
    fn on_chunk_error(&self, chunk: usize, total_chunks: usize, range: PageRange, error: &str) {
        let _ = (chunk, total_chunks, range, error);
    }

    /// Called once after every chunk converted and the merge finished.
    fn on_conversion_complete(&self, total_chunks: usize) {
        let _ = total_chunks;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

/// Receives each line of external-engine output, synchronously, as produced.
pub type LogSink = Arc<dyn Fn(&str) + Send + Sync>;
