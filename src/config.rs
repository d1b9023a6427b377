//! Configuration types for document-to-Markdown conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. The repair and merge pipelines take
//! their own small option structs ([`crate::repair::RepairOptions`],
//! [`crate::merge_docs::MergeOptions`]) because they never run an engine.

use crate::engine::EngineKind;
use crate::error::Doc2MdError;
use crate::progress::{LogSink, ProgressCallback};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Configuration for a conversion job.
///
/// # Example
/// ```rust
/// use edgequake_doc2md::{ConversionConfig, EngineKind};
///
/// let config = ConversionConfig::builder()
///     .engine(EngineKind::Marker)
///     .chunk_size_pages(15)
///     .force_ocr(true)
///     .build()
///     .unwrap();
/// assert_eq!(config.chunk_size_pages, 15);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Explicit engine. `None` selects by file extension. Default: None.
    pub engine: Option<EngineKind>,

    /// Engine tried for a chunk after the primary engine failed. Default: Docling.
    pub alternate_engine: EngineKind,

    /// Pass the OCR-forcing flag on the first attempt. Default: false.
    ///
    /// The second attempt always inverts this flag.
    pub force_ocr: bool,

    /// Let engines extract images. Default: true.
    pub keep_images: bool,

    /// OCR backend handed to Docling. Default: [`OcrBackend::Auto`].
    pub docling_ocr: OcrBackend,

    /// Pages per chunk when a PDF is split. Default: 20.
    pub chunk_size_pages: usize,

    /// PDFs with more pages than this are chunked. Default: 0 (always chunk).
    pub auto_chunk_threshold: usize,

    /// Remove the `_chunk_NN` working directories after the merge. Default: true.
    pub cleanup_chunks: bool,

    /// Prepend a frontmatter block to converted documents. Default: true.
    pub add_frontmatter: bool,

    /// Tags written into new frontmatter. Default: `["import"]`.
    pub tags: Vec<String>,

    /// Output file stem. `None` uses the input slug. Default: None.
    pub output_name: Option<String>,

    /// Root under which `<slug>/` output directories are created. Default: `data/out`.
    pub output_root: PathBuf,

    /// Append one JSONL record per job here. Default: None.
    pub job_log: Option<PathBuf>,

    /// Delete the source file after a successful conversion. Default: false.
    pub delete_source_after_success: bool,

    /// Executable names of the process-based engines.
    pub programs: EnginePrograms,

    /// Receives each line of engine output as it is produced.
    pub log_sink: Option<LogSink>,

    /// Optional chunk-level progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            engine: None,
            alternate_engine: EngineKind::Docling,
            force_ocr: false,
            keep_images: true,
            docling_ocr: OcrBackend::default(),
            chunk_size_pages: 20,
            auto_chunk_threshold: 0,
            cleanup_chunks: true,
            add_frontmatter: true,
            tags: vec!["import".to_string()],
            output_name: None,
            output_root: PathBuf::from("data/out"),
            job_log: None,
            delete_source_after_success: false,
            programs: EnginePrograms::default(),
            log_sink: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("engine", &self.engine)
            .field("alternate_engine", &self.alternate_engine)
            .field("force_ocr", &self.force_ocr)
            .field("keep_images", &self.keep_images)
            .field("docling_ocr", &self.docling_ocr)
            .field("chunk_size_pages", &self.chunk_size_pages)
            .field("auto_chunk_threshold", &self.auto_chunk_threshold)
            .field("cleanup_chunks", &self.cleanup_chunks)
            .field("add_frontmatter", &self.add_frontmatter)
            .field("tags", &self.tags)
            .field("output_name", &self.output_name)
            .field("output_root", &self.output_root)
            .field("job_log", &self.job_log)
            .field("programs", &self.programs)
            .field("log_sink", &self.log_sink.as_ref().map(|_| "<dyn Fn(&str)>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn engine(mut self, engine: EngineKind) -> Self {
        self.config.engine = Some(engine);
        self
    }

    pub fn alternate_engine(mut self, engine: EngineKind) -> Self {
        self.config.alternate_engine = engine;
        self
    }

    pub fn force_ocr(mut self, v: bool) -> Self {
        self.config.force_ocr = v;
        self
    }

    pub fn keep_images(mut self, v: bool) -> Self {
        self.config.keep_images = v;
        self
    }

    pub fn docling_ocr(mut self, backend: OcrBackend) -> Self {
        self.config.docling_ocr = backend;
        self
    }

    pub fn chunk_size_pages(mut self, n: usize) -> Self {
        self.config.chunk_size_pages = n;
        self
    }

    pub fn auto_chunk_threshold(mut self, pages: usize) -> Self {
        self.config.auto_chunk_threshold = pages;
        self
    }

    pub fn cleanup_chunks(mut self, v: bool) -> Self {
        self.config.cleanup_chunks = v;
        self
    }

    pub fn add_frontmatter(mut self, v: bool) -> Self {
        self.config.add_frontmatter = v;
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.tags = tags
            .into_iter()
            .map(Into::into)
            .map(|t: String| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        self
    }

    pub fn output_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.config.output_name = if name.trim().is_empty() {
            None
        } else {
            Some(name.trim().to_string())
        };
        self
    }

    pub fn output_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_root = dir.into();
        self
    }

    pub fn job_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.job_log = Some(path.into());
        self
    }

    pub fn delete_source_after_success(mut self, v: bool) -> Self {
        self.config.delete_source_after_success = v;
        self
    }

    pub fn programs(mut self, programs: EnginePrograms) -> Self {
        self.config.programs = programs;
        self
    }

    pub fn log_sink(mut self, sink: LogSink) -> Self {
        self.config.log_sink = Some(sink);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Doc2MdError> {
        let c = &self.config;
        if c.chunk_size_pages == 0 {
            return Err(Doc2MdError::InvalidConfig(
                "Chunk size must be ≥ 1 page".into(),
            ));
        }
        if let Some(ref name) = c.output_name {
            if !is_valid_output_name(name) {
                return Err(Doc2MdError::InvalidConfig(format!(
                    "Output name '{name}' may only contain letters, digits, '_', '-' and spaces"
                )));
            }
        }
        Ok(self.config)
    }
}

static RE_OUTPUT_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\w\- ]+$").unwrap());

/// Output names are restricted to word characters, hyphens and spaces.
pub fn is_valid_output_name(name: &str) -> bool {
    RE_OUTPUT_NAME.is_match(name)
}

// ── Engine programs ──────────────────────────────────────────────────────

/// Executable names (or paths) of the process-based engines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnginePrograms {
    pub marker: String,
    pub markitdown: String,
    pub docling: String,
    pub pptx2md: String,
}

impl Default for EnginePrograms {
    fn default() -> Self {
        Self {
            marker: "marker_single".to_string(),
            markitdown: "markitdown".to_string(),
            docling: "docling".to_string(),
            pptx2md: "pptx2md".to_string(),
        }
    }
}

impl EnginePrograms {
    /// Defaults, overridden by `DOC2MD_MARKER_BIN`, `DOC2MD_MARKITDOWN_BIN`,
    /// `DOC2MD_DOCLING_BIN` and `DOC2MD_PPTX2MD_BIN` when set and non-empty.
    pub fn from_env() -> Self {
        let pick = |var: &str, default: String| match std::env::var(var) {
            Ok(v) if !v.trim().is_empty() => v,
            _ => default,
        };
        let d = Self::default();
        Self {
            marker: pick("DOC2MD_MARKER_BIN", d.marker),
            markitdown: pick("DOC2MD_MARKITDOWN_BIN", d.markitdown),
            docling: pick("DOC2MD_DOCLING_BIN", d.docling),
            pptx2md: pick("DOC2MD_PPTX2MD_BIN", d.pptx2md),
        }
    }

    /// Program used for an engine; `None` for the in-process plain-text engine.
    pub fn program_for(&self, engine: EngineKind) -> Option<&str> {
        match engine {
            EngineKind::Marker => Some(&self.marker),
            EngineKind::MarkItDown => Some(&self.markitdown),
            EngineKind::Docling => Some(&self.docling),
            EngineKind::Pptx2md => Some(&self.pptx2md),
            EngineKind::PlainText => None,
        }
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// OCR backend requested from Docling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OcrBackend {
    /// Let Docling decide. (default)
    #[default]
    Auto,
    EasyOcr,
    Tesseract,
    RapidOcr,
}

impl OcrBackend {
    /// Value for Docling's `--ocr-engine`; `None` leaves Docling's default.
    pub fn docling_arg(self) -> Option<&'static str> {
        match self {
            OcrBackend::Auto => None,
            OcrBackend::EasyOcr => Some("easyocr"),
            OcrBackend::Tesseract => Some("tesseract"),
            OcrBackend::RapidOcr => Some("rapidocr"),
        }
    }

    /// Name recorded in the job log.
    pub fn as_str(self) -> &'static str {
        match self {
            OcrBackend::Auto => "auto",
            OcrBackend::EasyOcr => "easyocr",
            OcrBackend::Tesseract => "tesseract",
            OcrBackend::RapidOcr => "rapidocr",
        }
    }
}
