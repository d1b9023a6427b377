//! Whole-job conversion entry points.
//!
//! One call converts one input file into `<output_root>/<slug>/<name>.md`
//! with its images in `<output_root>/<slug>/assets/`:
//!
//! ```text
//! resolve input ─▶ select engine ─▶ page count? ─┬─ > threshold ─▶ chunked (orchestrator)
//!                                                └─ otherwise ───▶ single engine run
//!   ─▶ postprocess ─▶ frontmatter ─▶ atomic write ─▶ job log ─▶ optional source deletion
//! ```
//!
//! Only Marker jobs on real PDFs are chunked. An unknown page count is not an
//! error: the document is converted in one piece instead.

use crate::config::ConversionConfig;
use crate::engine::{select_engine, EngineKind};
use crate::engines::{self, ConvertRequest, Converter};
use crate::error::Doc2MdError;
use crate::joblog::{self, JobRecord};
use crate::output::{ConversionOutput, ConversionStats};
use crate::pipeline::chunker;
use crate::pipeline::input::{self, ResolvedInput};
use crate::pipeline::orchestrator::{self, remove_work_dirs, ChunkOptions};
use crate::pipeline::postprocess;
use crate::pipeline::relocate::{relocate_assets, RelocationReport, ASSETS_DIR};
use crate::repair::frontmatter::FrontmatterRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

static RE_SLUG: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\-]+").unwrap());

/// Working directory for unchunked conversions, below the target directory.
const WORK_DIR: &str = "_work";

/// Output directory name for a file: its stem, lower-cased, runs of
/// characters other than word characters and `-` replaced by `-`.
///
/// An empty result becomes `doc-<unix seconds>`.
pub fn slugify(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let slug = RE_SLUG
        .replace_all(&stem.to_lowercase(), "-")
        .trim_matches('-')
        .to_string();
    if slug.is_empty() {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        format!("doc-{}", secs)
    } else {
        slug
    }
}

/// Convert one document and write it below `config.output_root`.
///
/// A job-log record is appended for successes and failures alike when
/// `config.job_log` is set. Failing to write that record only logs a warning.
pub async fn convert(
    input: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Doc2MdError> {
    let started = Instant::now();
    let source = input.as_ref();
    let extension = source
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    let engine = select_engine(&extension, config.engine);
    info!("Starting conversion: {} (engine: {})", source.display(), engine);

    let result = run_job(source, engine, config).await;
    let duration_ms = started.elapsed().as_millis() as u64;

    if let Some(ref log_path) = config.job_log {
        let record = match &result {
            Ok(out) => JobRecord::conversion(
                source,
                engine,
                config.force_ocr,
                duration_ms,
                Some(&out.output_path),
                None,
            ),
            Err(e) => JobRecord::conversion(source, engine, config.force_ocr, duration_ms, None, Some(e)),
        };
        if let Err(e) = joblog::append(log_path, &record).await {
            warn!("{}", e);
        }
    }

    let mut output = result?;
    output.stats.total_duration_ms = duration_ms;
    info!(
        "Conversion complete: {} ({} chars, {}ms)",
        output.output_path.display(),
        output.stats.markdown_chars,
        duration_ms
    );

    if config.delete_source_after_success {
        match tokio::fs::remove_file(source).await {
            Ok(()) => info!("Deleted source {}", source.display()),
            Err(e) => warn!("Could not delete source {}: {}", source.display(), e),
        }
    }
    Ok(output)
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Doc2MdError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Doc2MdError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Body of one conversion job, without job logging or source deletion.
async fn run_job(
    source: &Path,
    engine: EngineKind,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Doc2MdError> {
    // ── Step 1: Resolve input and target ─────────────────────────────────
    let resolved = input::resolve_input(source)?;
    let slug = slugify(&resolved.file_name());
    let target_dir = config.output_root.join(&slug);
    let assets_dir = target_dir.join(ASSETS_DIR);
    tokio::fs::create_dir_all(&assets_dir)
        .await
        .map_err(|e| Doc2MdError::OutputWriteFailed {
            path: assets_dir.clone(),
            source: e,
        })?;
    debug!("Target directory: {}", target_dir.display());

    let primary = engines::build(engine, config);
    let mut stats = ConversionStats::default();

    // ── Step 2: Decide on chunking ───────────────────────────────────────
    if engine == EngineKind::Marker && resolved.is_pdf() {
        match chunker::page_count(resolved.path()).await {
            Ok(pages) => {
                info!("PDF has {} pages", pages);
                stats.total_pages = Some(pages);
            }
            Err(e) => warn!("{}; converting without chunking", e),
        }
    }
    let chunk = stats
        .total_pages
        .map(|pages| pages > config.auto_chunk_threshold)
        .unwrap_or(false);

    // ── Step 3: Convert ──────────────────────────────────────────────────
    let mut chunk_engines = Vec::new();
    let chunked = if chunk {
        let alternate = engines::build(config.alternate_engine, config);
        let options = ChunkOptions {
            force_ocr: config.force_ocr,
            keep_images: config.keep_images,
            cleanup: config.cleanup_chunks,
            log_sink: config.log_sink.clone(),
            progress: config.progress_callback.clone(),
        };
        match orchestrator::convert_chunked(
            resolved.path(),
            config.chunk_size_pages,
            primary.as_ref(),
            Some(alternate.as_ref()),
            &target_dir,
            &options,
        )
        .await
        {
            Ok(done) => Some(done),
            Err(e @ Doc2MdError::SourceUnreadable { .. }) => {
                warn!("{}; converting without chunking", e);
                None
            }
            Err(e) => return Err(e),
        }
    } else {
        None
    };

    let (body, log) = match chunked {
        Some(done) => {
            stats.chunks = done.engines.len();
            stats.fallback_chunks = done.engines.iter().filter(|k| **k != engine).count();
            stats.images_found = done.reports.iter().map(|r| r.found).sum();
            stats.images_copied = done.reports.iter().map(|r| r.copied).sum();
            chunk_engines = done.engines;
            (done.document.render(), done.log)
        }
        None => {
            let (text, log, report) =
                convert_single(&resolved, primary.as_ref(), &target_dir, config).await?;
            stats.chunks = 1;
            stats.images_found = report.found;
            stats.images_copied = report.copied;
            (text, log)
        }
    };

    // ── Step 4: Post-process and frontmatter ─────────────────────────────
    let mut markdown = postprocess::clean_markdown(&body);
    if config.add_frontmatter {
        let record = FrontmatterRecord::new(slug.as_str(), resolved.file_name(), &config.tags);
        markdown = format!("{}\n{}", record.compose(), markdown);
    }
    stats.markdown_chars = markdown.chars().count();

    // ── Step 5: Write ────────────────────────────────────────────────────
    let base_name = config.output_name.clone().unwrap_or_else(|| slug.clone());
    let output_path = target_dir.join(format!("{}.md", base_name));
    write_atomic(&output_path, &markdown).await?;

    Ok(ConversionOutput {
        markdown,
        output_path,
        target_dir,
        engine,
        chunk_engines,
        log,
        stats,
    })
}

/// Convert the whole document with one engine, then move its images into
/// the shared asset directory without a chunk prefix.
async fn convert_single(
    resolved: &ResolvedInput,
    converter: &dyn Converter,
    target_dir: &Path,
    config: &ConversionConfig,
) -> Result<(String, String, RelocationReport), Doc2MdError> {
    let work_dir = target_dir.join(WORK_DIR);
    let request = ConvertRequest {
        out_dir: work_dir.clone(),
        force_ocr: config.force_ocr,
        keep_images: config.keep_images,
        log_sink: config.log_sink.clone(),
    };
    let result = converter.convert(resolved.path(), &request).await?;

    let source_dir = result.asset_dir.clone().unwrap_or_else(|| work_dir.clone());
    let (text, found, copied) =
        relocate_assets(&result.markdown, &source_dir, &target_dir.join(ASSETS_DIR), "")?;
    let report = RelocationReport {
        chunk: 0,
        range: None,
        found,
        copied,
        source: source_dir,
    };

    let mut log = result.log.trim_end().to_string();
    if !log.is_empty() {
        log.push('\n');
    }
    log.push_str(&report.to_string());

    if config.cleanup_chunks {
        remove_work_dirs(&[work_dir]).await;
    }
    Ok((text, log, report))
}

/// Write via a sibling temp file and rename, so readers never see a partial file.
async fn write_atomic(path: &Path, contents: &str) -> Result<(), Doc2MdError> {
    let fail = |e: std::io::Error| Doc2MdError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(fail)?;
    }
    let tmp_path: PathBuf = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, contents).await.map_err(fail)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(fail)?;
    Ok(())
}
