//! Concrete conversion engines behind one [`Converter`] contract.
//!
//! ```text
//!  path ──▶ Converter::convert ──▶ ConversionResult { markdown, asset_dir, engine, log }
//!                              └──▶ Doc2MdError::{ConversionFailed, SanityCheckFailed, EngineUnavailable}
//! ```
//!
//! * [`cli::CliEngine`]: Marker and Docling. Write into an output directory,
//!   two attempts with the OCR flag toggled, sanity threshold on the result.
//! * [`stdout::StdoutEngine`]: MarkItDown and pptx2md. Markdown on stdout,
//!   same sanity threshold, single attempt.
//! * [`plain::PlainTextEngine`]: reads the file; no process.
//!
//! Use [`build`] to obtain the converter for an [`EngineKind`].

pub mod cli;
pub mod plain;
pub mod process;
pub mod stdout;

use crate::config::ConversionConfig;
use crate::engine::EngineKind;
use crate::error::Doc2MdError;
use crate::progress::LogSink;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub use cli::CliEngine;
pub use plain::PlainTextEngine;
pub use stdout::StdoutEngine;

/// Output shorter than this (after trimming) is treated as a failed attempt.
pub const MIN_MARKDOWN_CHARS: usize = 50;

/// True when `markdown` is long enough to be a plausible conversion.
pub fn passes_sanity_check(markdown: &str) -> bool {
    markdown.trim().chars().count() >= MIN_MARKDOWN_CHARS
}

/// Per-call options handed to a converter.
#[derive(Clone, Default)]
pub struct ConvertRequest {
    /// Working directory the engine may write into (created on demand).
    pub out_dir: PathBuf,
    /// OCR flag for the first attempt.
    pub force_ocr: bool,
    pub keep_images: bool,
    pub log_sink: Option<LogSink>,
}

impl ConvertRequest {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            keep_images: true,
            ..Self::default()
        }
    }

    pub(crate) fn emit(&self, line: &str) {
        if let Some(ref sink) = self.log_sink {
            sink(line);
        }
    }
}

impl std::fmt::Debug for ConvertRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConvertRequest")
            .field("out_dir", &self.out_dir)
            .field("force_ocr", &self.force_ocr)
            .field("keep_images", &self.keep_images)
            .field("log_sink", &self.log_sink.as_ref().map(|_| "<dyn Fn(&str)>"))
            .finish()
    }
}

/// What a successful engine call produced.
#[derive(Debug, Clone)]
pub struct ConversionResult {
    pub markdown: String,
    /// Directory holding extracted images, if the engine wrote any files.
    pub asset_dir: Option<PathBuf>,
    pub engine: EngineKind,
    pub log: String,
}

/// A document-to-Markdown engine.
#[async_trait]
pub trait Converter: Send + Sync {
    fn kind(&self) -> EngineKind;

    async fn convert(
        &self,
        path: &Path,
        request: &ConvertRequest,
    ) -> Result<ConversionResult, Doc2MdError>;
}

/// Build the converter for `kind` using the programs and OCR backend from `config`.
pub fn build(kind: EngineKind, config: &ConversionConfig) -> Box<dyn Converter> {
    let programs = &config.programs;
    match kind {
        EngineKind::Marker => Box::new(CliEngine::marker(&programs.marker)),
        EngineKind::Docling => Box::new(CliEngine::docling(&programs.docling, config.docling_ocr)),
        EngineKind::MarkItDown => Box::new(StdoutEngine::markitdown(&programs.markitdown)),
        EngineKind::Pptx2md => Box::new(StdoutEngine::pptx2md(&programs.pptx2md)),
        EngineKind::PlainText => Box::new(PlainTextEngine),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanity_threshold() {
        assert!(!passes_sanity_check(""));
        assert!(!passes_sanity_check("0123456789"));
        assert!(!passes_sanity_check(&format!("   {}   \n", "x".repeat(49))));
        assert!(passes_sanity_check(&"a".repeat(50)));
        assert!(passes_sanity_check(
            "# Title\n\nThis paragraph has exactly enough text in it."
        ));
    }

    #[test]
    fn build_matches_kind() {
        let config = ConversionConfig::default();
        for kind in EngineKind::ALL {
            assert_eq!(build(kind, &config).kind(), kind);
        }
    }
}
