//! Chunked conversion: split, convert each chunk, relocate assets, merge.
//!
//! Two retry layers are composed here and kept separate:
//!
//! 1. inside one engine call, the engine's own two-attempt OCR toggle
//!    (see [`crate::engines::cli`]);
//! 2. across engines, one alternate engine per failed chunk.
//!
//! Chunks run strictly one after another in page order. When both engines
//! fail for a chunk the whole job fails with
//! [`Doc2MdError::ChunkConversionFailed`]; no partial document is returned.
//!
//! Working directories live under the target directory as `_chunk_NN/`
//! (the alternate engine writes into `_chunk_NN/fallback/`). They are removed
//! after a successful merge when cleanup is enabled. Removal is advisory:
//! failures are logged and ignored.

use crate::engine::EngineKind;
use crate::engines::{ConversionResult, ConvertRequest, Converter};
use crate::error::{remediation_hints, Doc2MdError};
use crate::pipeline::chunker::{self, Chunk};
use crate::pipeline::merge::{merge_chunks, ChunkOutput, MergedDocument};
use crate::pipeline::relocate::{relocate_chunk, RelocationReport, ASSETS_DIR};
use crate::progress::{LogSink, ProgressCallback};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Options that apply to every chunk of one job.
#[derive(Clone, Default)]
pub struct ChunkOptions {
    pub force_ocr: bool,
    pub keep_images: bool,
    pub cleanup: bool,
    pub log_sink: Option<LogSink>,
    pub progress: Option<ProgressCallback>,
}

/// Result of a successful chunked conversion.
#[derive(Debug, Clone)]
pub struct ChunkedConversion {
    pub document: MergedDocument,
    /// Per-chunk status lines, engine logs and asset reports, in order.
    pub log: String,
    /// Engine that produced each chunk, in page order.
    pub engines: Vec<EngineKind>,
    pub reports: Vec<RelocationReport>,
}

impl ChunkOptions {
    fn request(&self, out_dir: PathBuf) -> ConvertRequest {
        ConvertRequest {
            out_dir,
            force_ocr: self.force_ocr,
            keep_images: self.keep_images,
            log_sink: self.log_sink.clone(),
        }
    }

    fn emit(&self, line: &str) {
        if let Some(ref sink) = self.log_sink {
            sink(line);
        }
    }
}

/// Split `source` into chunks of `chunk_size` pages and convert them.
///
/// Fails with [`Doc2MdError::SourceUnreadable`] before any conversion when the
/// page count is unknown.
pub async fn convert_chunked(
    source: &Path,
    chunk_size: usize,
    primary: &dyn Converter,
    alternate: Option<&dyn Converter>,
    target_dir: &Path,
    options: &ChunkOptions,
) -> Result<ChunkedConversion, Doc2MdError> {
    let chunks = chunker::split(source, chunk_size).await?;
    convert_chunks(&chunks, primary, alternate, target_dir, options).await
}

/// Image source of a chunk: what the engine reported, else the working
/// directory's `assets/` if present, else the working directory itself.
fn asset_source(result: &ConversionResult, work_dir: &Path) -> PathBuf {
    if let Some(ref dir) = result.asset_dir {
        return dir.clone();
    }
    let assets = work_dir.join(ASSETS_DIR);
    if assets.is_dir() {
        assets
    } else {
        work_dir.to_path_buf()
    }
}

fn push_engine_log(log: &mut Vec<String>, engine_log: &str) {
    let trimmed = engine_log.trim_end();
    if !trimmed.is_empty() {
        log.push(trimmed.to_string());
    }
}

/// Convert already-split chunks with per-chunk engine fallback.
pub async fn convert_chunks(
    chunks: &[Chunk],
    primary: &dyn Converter,
    alternate: Option<&dyn Converter>,
    target_dir: &Path,
    options: &ChunkOptions,
) -> Result<ChunkedConversion, Doc2MdError> {
    // An alternate identical to the primary would only repeat the failure.
    let alternate = alternate.filter(|alt| alt.kind() != primary.kind());
    let total = chunks.len();
    let total_pages = chunks.iter().map(|c| c.range.end()).max().unwrap_or(0);
    if let Some(ref cb) = options.progress {
        cb.on_conversion_start(total, total_pages);
    }

    let mut log: Vec<String> = Vec::new();
    let mut outputs: Vec<ChunkOutput> = Vec::with_capacity(total);
    let mut work_dirs: Vec<PathBuf> = Vec::with_capacity(total);

    for chunk in chunks {
        let (idx, range) = (chunk.index, chunk.range);
        let tag = format!("[chunk {:02} {}]", idx, range);
        let work_dir = target_dir.join(format!("_chunk_{:02}", idx));
        tokio::fs::create_dir_all(&work_dir)
            .await
            .map_err(|e| Doc2MdError::OutputWriteFailed {
                path: work_dir.clone(),
                source: e,
            })?;
        work_dirs.push(work_dir.clone());

        if let Some(ref cb) = options.progress {
            cb.on_chunk_start(idx, total, range);
        }
        info!("Converting chunk {}/{} (pages {})", idx, total, range);

        let (result, engine_dir) = match primary
            .convert(chunk.path(), &options.request(work_dir.clone()))
            .await
        {
            Ok(result) => (result, work_dir.clone()),
            Err(primary_err) => {
                let line = format!("{} {} failed: {}", tag, primary.kind().label(), primary_err);
                options.emit(&line);
                log.push(line);

                let Some(alt) = alternate else {
                    if let Some(ref cb) = options.progress {
                        cb.on_chunk_error(idx, total, range, &primary_err.to_string());
                    }
                    return Err(Doc2MdError::ChunkConversionFailed {
                        chunk: idx,
                        start: range.start(),
                        end: range.end(),
                        log: log.join("\n"),
                        hints: remediation_hints(options.force_ocr, options.keep_images),
                    });
                };

                warn!(
                    "Chunk {:02} failed with {}; trying {}",
                    idx,
                    primary.kind(),
                    alt.kind()
                );
                if let Some(ref cb) = options.progress {
                    cb.on_chunk_fallback(idx, total, range, &primary_err.to_string());
                }
                let alt_dir = work_dir.join("fallback");
                match alt.convert(chunk.path(), &options.request(alt_dir.clone())).await {
                    Ok(result) => (result, alt_dir),
                    Err(alt_err) => {
                        let line = format!("{} {} failed: {}", tag, alt.kind().label(), alt_err);
                        options.emit(&line);
                        log.push(line);
                        if let Some(ref cb) = options.progress {
                            cb.on_chunk_error(idx, total, range, &alt_err.to_string());
                        }
                        return Err(Doc2MdError::ChunkConversionFailed {
                            chunk: idx,
                            start: range.start(),
                            end: range.end(),
                            log: log.join("\n"),
                            hints: remediation_hints(options.force_ocr, options.keep_images),
                        });
                    }
                }
            }
        };

        let line = format!("{} {} ok", tag, result.engine.label());
        options.emit(&line);
        log.push(line);
        push_engine_log(&mut log, &result.log);
        if let Some(ref cb) = options.progress {
            cb.on_chunk_complete(idx, total, range, result.engine.label());
        }

        outputs.push(ChunkOutput {
            index: idx,
            range,
            asset_dir: asset_source(&result, &engine_dir),
            engine: result.engine,
            markdown: result.markdown,
        });
    }

    let dest = target_dir.join(ASSETS_DIR);
    let mut reports = Vec::with_capacity(outputs.len());
    for output in outputs.iter_mut() {
        let (text, report) =
            relocate_chunk(&output.markdown, output.index, output.range, &output.asset_dir, &dest)?;
        output.markdown = text;
        log.push(report.to_string());
        reports.push(report);
    }

    let document = merge_chunks(&outputs, &dest);
    if options.cleanup {
        remove_work_dirs(&work_dirs).await;
    }
    if let Some(ref cb) = options.progress {
        cb.on_conversion_complete(total);
    }

    Ok(ChunkedConversion {
        document,
        log: log.join("\n"),
        engines: outputs.iter().map(|o| o.engine).collect(),
        reports,
    })
}

/// Best-effort removal of chunk working directories.
pub async fn remove_work_dirs(dirs: &[PathBuf]) {
    for dir in dirs {
        if let Err(e) = tokio::fs::remove_dir_all(dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Could not remove {}: {}", dir.display(), e);
            }
        }
    }
}
