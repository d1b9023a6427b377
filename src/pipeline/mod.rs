//! Pipeline stages for document-to-Markdown conversion.
//!
//! Each submodule implements one step. Engines themselves live in
//! [`crate::engines`]; this module only decides what to feed them and what
//! to do with their output.
//!
//! ## Data Flow
//!
//! ```text
//!                 ┌──────────────── chunked (Marker, large PDF) ────────────────┐
//! input ──▶ chunker ──▶ orchestrator ──▶ relocate ──▶ merge ──┐                  │
//!   │                    (engine per chunk,  (cNN_ prefixes)   │                  │
//!   │                     alternate on failure)                ├──▶ postprocess ──▶ file
//!   └──────────▶ single engine run ──▶ relocate ──────────────┘
//! ```
//!
//! 1. [`input`]: validate the path and sniff the PDF magic
//! 2. [`chunker`]: count pages and split a PDF into page-range temp files;
//!    pdfium runs in `spawn_blocking` because it is not async-safe
//! 3. [`orchestrator`]: convert chunks in order, falling back per chunk
//! 4. [`relocate`]: move images into the shared `assets/` directory and
//!    rewrite links
//! 5. [`merge`]: stitch chunk outputs into one document with anchors and
//!    a contents list
//! 6. [`postprocess`]: deterministic cleanup of engine artefacts

pub mod chunker;
pub mod input;
pub mod merge;
pub mod orchestrator;
pub mod postprocess;
pub mod relocate;
