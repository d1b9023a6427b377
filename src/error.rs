//! Error types for the edgequake-doc2md library.
//!
//! Conversion failures are layered the same way the pipeline is:
//!
//! * [`Doc2MdError::ConversionFailed`] / [`Doc2MdError::SanityCheckFailed`]:
//!   one engine exhausted both of its attempts. The chunk orchestrator can
//!   still recover by trying the alternate engine for that chunk.
//!
//! * [`Doc2MdError::ChunkConversionFailed`]: primary and alternate engine both
//!   failed for one chunk. Fatal for the whole chunked job.
//!
//! * [`Doc2MdError::SourceUnreadable`]: the page count could not be
//!   determined. Callers fall back to a whole-document conversion.
//!
//! Every wrapping layer carries the full engine log forward untouched, so the
//! final message contains the complete diagnostic trail plus a short list of
//! remediation hints.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-doc2md library.
#[derive(Debug, Error)]
pub enum Doc2MdError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Source file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input exists but cannot be converted (directory, no file name …).
    #[error("Unsupported input '{path}': {reason}")]
    UnsupportedInput { path: PathBuf, reason: String },

    /// Page count or document structure could not be determined.
    ///
    /// Recoverable: convert the whole document without chunking.
    #[error("Cannot determine page count of '{path}': {detail}")]
    SourceUnreadable { path: PathBuf, detail: String },

    // ── Engine errors ─────────────────────────────────────────────────────
    /// The engine's executable could not be started.
    #[error("{engine} is not available: could not run '{program}' ({detail})\nInstall it or point DOC2MD_{engine}_BIN at the executable.")]
    EngineUnavailable {
        engine: String,
        program: String,
        detail: String,
    },

    /// A single engine invocation (including its own retry) failed.
    #[error("{engine} failed.\n\n{log}\n\nSuggestions:\n{hints}")]
    ConversionFailed {
        engine: String,
        log: String,
        hints: String,
    },

    /// The engine produced output too short to be plausible.
    #[error("Sanity check failed: {engine} produced only {chars} characters of Markdown.\n\n{log}\n\nSuggestions:\n{hints}")]
    SanityCheckFailed {
        engine: String,
        chars: usize,
        log: String,
        hints: String,
    },

    /// Primary and alternate engine both failed for one chunk.
    #[error("Chunk {chunk:02} (pages {start}-{end}) could not be converted by any engine.\n\n{log}\n\nSuggestions:\n{hints}")]
    ChunkConversionFailed {
        chunk: usize,
        start: usize,
        end: usize,
        log: String,
        hints: String,
    },

    /// The shared destination asset directory is unusable.
    #[error("Asset relocation failed at '{path}': {source}")]
    RelocationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not append to the job log.
    #[error("Failed to append to job log '{path}': {source}")]
    JobLogFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDFium is normally downloaded automatically on first run.\n\
If the auto-download failed, you can:\n\
  • Check your internet connection and try again.\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Doc2MdError {
    /// The engine log carried by conversion errors, if any.
    pub fn log(&self) -> Option<&str> {
        match self {
            Doc2MdError::ConversionFailed { log, .. }
            | Doc2MdError::SanityCheckFailed { log, .. }
            | Doc2MdError::ChunkConversionFailed { log, .. } => Some(log),
            _ => None,
        }
    }

    /// True for failures the chunk orchestrator may retry with another engine.
    pub fn is_engine_failure(&self) -> bool {
        matches!(
            self,
            Doc2MdError::ConversionFailed { .. }
                | Doc2MdError::SanityCheckFailed { .. }
                | Doc2MdError::EngineUnavailable { .. }
        )
    }
}

/// Remediation hints bundled with every user-visible conversion failure.
pub fn remediation_hints(force_ocr: bool, keep_images: bool) -> String {
    let mut tips = vec![
        "Check whether the document is password protected or damaged.".to_string(),
        format!(
            "Turn OCR {} (--force-ocr) and try again.",
            if force_ocr { "off" } else { "on" }
        ),
        "Use a smaller chunk size (e.g. 10-15 pages).".to_string(),
        "Keep image extraction enabled if layout analysis depends on figures.".to_string(),
        "Try the same file once with Docling (--engine docling) to rule out a parser problem."
            .to_string(),
    ];
    if !keep_images {
        tips.push(
            "Note: image extraction is disabled. That is fine, but it can affect layout detection."
                .to_string(),
        );
    }
    format!("- {}", tips.join("\n- "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_failed_keeps_log_verbatim() {
        let e = Doc2MdError::ConversionFailed {
            engine: "MARKER".into(),
            log: "line one\nline two".into(),
            hints: remediation_hints(false, true),
        };
        let msg = e.to_string();
        assert!(msg.contains("line one\nline two"), "got: {msg}");
        assert!(msg.contains("Suggestions:"));
        assert!(msg.contains("Turn OCR on"));
    }

    #[test]
    fn chunk_failure_display() {
        let e = Doc2MdError::ChunkConversionFailed {
            chunk: 2,
            start: 21,
            end: 40,
            log: "[chunk 02 21-40] MARKER failed".into(),
            hints: String::new(),
        };
        let msg = e.to_string();
        assert!(msg.contains("Chunk 02 (pages 21-40)"), "got: {msg}");
        assert_eq!(e.log(), Some("[chunk 02 21-40] MARKER failed"));
    }

    #[test]
    fn hints_mention_disabled_images() {
        let hints = remediation_hints(true, false);
        assert!(hints.contains("Turn OCR off"));
        assert!(hints.contains("image extraction is disabled"));
        assert!(hints.starts_with("- "));
    }

    #[test]
    fn engine_failures_are_recoverable() {
        let e = Doc2MdError::SanityCheckFailed {
            engine: "MARKER".into(),
            chars: 10,
            log: String::new(),
            hints: String::new(),
        };
        assert!(e.is_engine_failure());
        let fatal = Doc2MdError::InvalidConfig("x".into());
        assert!(!fatal.is_engine_failure());
        assert!(fatal.log().is_none());
    }
}
