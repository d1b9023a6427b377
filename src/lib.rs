//! # edgequake-doc2md
//!
//! Convert PDF, PPTX, DOCX, HTML and plain-text documents into Obsidian-ready
//! Markdown using external conversion engines (Marker, Docling, MarkItDown,
//! pptx2md).
//!
//! ## Why this crate?
//!
//! The engines do the hard part, reading documents. What they do not do is
//! cope with 400-page lecture scripts: Marker runs out of memory, one bad page
//! fails the whole run, and images from separate runs overwrite each other.
//! This crate splits large PDFs into page-range chunks, converts each chunk
//! with a per-chunk fallback engine, gathers all images into one `assets/`
//! directory without collisions and merges the chunks back into one document
//! with anchors and a contents list.
//!
//! ## Pipeline Overview
//!
//! ```text
//! document
//!  │
//!  ├─ 1. Input     validate path, sniff PDF magic
//!  ├─ 2. Engine    pick Marker / Docling / MarkItDown / pptx2md / plain by extension
//!  ├─ 3. Chunk     split large PDFs via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 4. Convert   engine per chunk, OCR-toggle retry, alternate engine on failure
//!  ├─ 5. Assets    copy images into assets/ with c<NN>_ prefixes, rewrite links
//!  ├─ 6. Merge     anchors, headings and contents list per chunk
//!  ├─ 7. Polish    post-processing rules (line endings, footers, image links)
//!  └─ 8. Output    frontmatter + atomic write + job-log record
//! ```
//!
//! Two more pipelines work on finished Markdown and never run an engine:
//! [`repair`] (structural normalisation of one document) and [`merge_docs`]
//! (combining several documents).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_doc2md::{convert, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder()
//!         .chunk_size_pages(15)
//!         .tags(["import", "studium"])
//!         .build()?;
//!     let output = convert("lecture.pdf", &config).await?;
//!     println!("{}", output.output_path.display());
//!     eprintln!("{} chunks, {} images", output.stats.chunks, output.stats.images_copied);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `doc2md` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-doc2md = { version = "0.1", default-features = false }
//! ```
//!
//! ## External Engines
//!
//! | Engine | Program | Used for |
//! |--------|---------|----------|
//! | Marker | `marker_single` | PDF (chunked) |
//! | Docling | `docling` | fallback, unknown formats |
//! | MarkItDown | `markitdown` | DOC(X), XLS(X), HTML, EPUB |
//! | pptx2md | `pptx2md` | PPT(X) |
//!
//! Program names can be overridden with `DOC2MD_<ENGINE>_BIN`.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod engine;
pub mod engines;
pub mod error;
pub mod joblog;
pub mod merge_docs;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod repair;
pub mod watch;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, EnginePrograms, OcrBackend};
pub use convert::{convert, convert_sync, slugify};
pub use engine::{select_engine, EngineKind};
pub use engines::{ConversionResult, ConvertRequest, Converter};
pub use error::Doc2MdError;
pub use joblog::{JobRecord, JobStatus};
pub use merge_docs::{merge_documents, merge_files, MergeInput, MergeOptions};
pub use output::{ConversionOutput, ConversionStats};
pub use pipeline::chunker::PageRange;
pub use pipeline::merge::MergedDocument;
pub use progress::{ConversionProgressCallback, LogSink, NoopProgressCallback, ProgressCallback};
pub use repair::{repair, repair_file, RepairOptions};
pub use watch::WatchState;
