//! CLI binary for edgequake-doc2md.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConversionConfig`, `RepairOptions` and `MergeOptions` and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_doc2md::joblog::{self, JobRecord};
use edgequake_doc2md::repair::frontmatter::FrontmatterOverrides;
use edgequake_doc2md::repair::repair_file;
use edgequake_doc2md::{
    convert, merge_files, ConversionConfig, ConversionOutput, ConversionProgressCallback,
    EngineKind, EnginePrograms, LogSink, MergeOptions, OcrBackend, PageRange, ProgressCallback,
    RepairOptions, WatchState,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a chunk-level progress bar plus one log line
/// per finished, rescued or failed chunk.
struct CliProgressCallback {
    bar: ProgressBar,
    fallbacks: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_conversion_start` tells us how many chunks there are.
    /// Unchunked conversions never leave the spinner state.
    fn new_dynamic(file: &str) -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Converting");
        bar.set_message(file.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            fallbacks: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} chunks  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.reset_eta();
    }

    /// Live engine output, printed above the bar.
    fn log_sink(self: &Arc<Self>) -> LogSink {
        let bar = self.bar.clone();
        Arc::new(move |line: &str| bar.println(dim(line)))
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_chunks: usize, total_pages: usize) {
        self.activate_bar(total_chunks);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!(
                "Converting {total_pages} pages in {total_chunks} chunks…"
            ))
        ));
    }

    fn on_chunk_start(&self, chunk: usize, _total: usize, range: PageRange) {
        self.bar.set_message(format!("chunk {chunk:02} (pages {range})"));
    }

    fn on_chunk_fallback(&self, chunk: usize, total: usize, range: PageRange, error: &str) {
        self.fallbacks.fetch_add(1, Ordering::SeqCst);
        let first_line = error.lines().next().unwrap_or(error);
        self.bar.println(format!(
            "  {} Chunk {:>2}/{:<2}  pages {:<9}  {}",
            yellow("↻"),
            chunk,
            total,
            range.to_string(),
            dim(&format!("primary failed: {first_line}")),
        ));
    }

    fn on_chunk_complete(&self, chunk: usize, total: usize, range: PageRange, engine: &str) {
        self.bar.println(format!(
            "  {} Chunk {:>2}/{:<2}  pages {:<9}  {}",
            green("✓"),
            chunk,
            total,
            range.to_string(),
            dim(engine),
        ));
        self.bar.inc(1);
    }

    fn on_chunk_error(&self, chunk: usize, total: usize, range: PageRange, _error: &str) {
        self.bar.println(format!(
            "  {} Chunk {:>2}/{:<2}  pages {:<9}  {}",
            red("✗"),
            chunk,
            total,
            range.to_string(),
            red("all engines failed"),
        ));
    }

    fn on_conversion_complete(&self, total_chunks: usize) {
        let rescued = self.fallbacks.load(Ordering::SeqCst);
        self.bar.println(format!(
            "{} {} chunks converted{}",
            green("✔"),
            bold(&total_chunks.to_string()),
            if rescued > 0 {
                format!("  ({rescued} via alternate engine)")
            } else {
                String::new()
            }
        ));
    }
}

impl Drop for CliProgressCallback {
    fn drop(&mut self) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert a lecture script (chunked Marker run, Docling as per-chunk fallback)
  doc2md convert Lecture-01.pdf

  # Several files, forced OCR, 10-page chunks, custom tags
  doc2md convert --force-ocr --chunk-size 10 --tags import,studium *.pdf

  # Slides and office documents pick their engine by extension
  doc2md convert deck.pptx notes.docx

  # Repair a converted note in place
  doc2md repair data/out/lecture-01/lecture-01.md --in-place --tags studium

  # Merge notes into one file
  doc2md merge week*.md -o all-weeks.md

  # Watch an inbox folder
  doc2md watch data/in --interval 10

  # Last ten jobs
  doc2md joblog -n 10

ENGINES:
  Engine       Program          Used for
  ──────────   ──────────────   ─────────────────────────────
  marker       marker_single    pdf (chunked)
  pptx2md      pptx2md          ppt, pptx
  markitdown   markitdown       doc(x), xls(x), html, epub
  docling      docling          everything else, chunk fallback
  plain        (none)           txt

ENVIRONMENT VARIABLES:
  DOC2MD_MARKER_BIN       Program for Marker (default marker_single)
  DOC2MD_DOCLING_BIN      Program for Docling (default docling)
  DOC2MD_MARKITDOWN_BIN   Program for MarkItDown (default markitdown)
  DOC2MD_PPTX2MD_BIN      Program for pptx2md (default pptx2md)
  PDFIUM_LIB_PATH         Path to an existing libpdfium; skips auto-download
  RUST_LOG                Overrides the log filter

  PDFium (~30 MB, used for page counting and splitting) is downloaded
  automatically on first run and cached.
"#;

/// Convert documents to Obsidian-ready Markdown.
#[derive(Parser, Debug)]
#[command(
    name = "doc2md",
    version,
    about = "Convert PDF, PPTX, DOCX, HTML and text into Obsidian-ready Markdown",
    long_about = "Convert documents to Markdown with external engines (Marker, Docling, \
MarkItDown, pptx2md). Large PDFs are split into page-range chunks, converted with a per-chunk \
fallback engine and merged back with all images gathered into one assets/ directory.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOC2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "DOC2MD_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert documents into `<output-root>/<slug>/<name>.md`.
    Convert {
        /// Input files.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        opts: ConvertArgs,

        /// Print the ConversionOutput of each file as JSON on stdout.
        #[arg(long, env = "DOC2MD_JSON")]
        json: bool,
    },

    /// Repair the structure of a Markdown file.
    Repair {
        /// Markdown file to repair.
        file: PathBuf,

        /// Write here instead of stdout.
        #[arg(short, long, conflicts_with = "in_place")]
        output: Option<PathBuf>,

        /// Overwrite the input file.
        #[arg(long)]
        in_place: bool,

        /// Extra frontmatter tags (comma-separated).
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,

        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        course: Option<String>,
        #[arg(long)]
        semester: Option<String>,
        #[arg(long)]
        topic: Option<String>,

        /// Asset directory recorded in the frontmatter and used for link checks.
        #[arg(long)]
        assets_dir: Option<PathBuf>,

        /// Keep straight double quotes.
        #[arg(long)]
        no_quotes: bool,

        /// Leave an existing <!-- TOC --> region alone.
        #[arg(long)]
        no_toc: bool,

        /// Point local image links at ./assets/.
        #[arg(long)]
        fix_images: bool,

        /// Collapse runs of blank lines.
        #[arg(long)]
        trim_blank: bool,

        /// Insert missing table separator rows.
        #[arg(long)]
        fix_tables: bool,
    },

    /// Merge Markdown files (sorted by name) into one.
    Merge {
        /// Markdown files to merge.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Write here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Do not add a heading per file.
        #[arg(long)]
        no_headings: bool,

        /// Do not add a contents list.
        #[arg(long)]
        no_toc: bool,

        /// Keep each file's frontmatter block.
        #[arg(long)]
        keep_frontmatter: bool,

        /// Text inserted between files.
        #[arg(long, default_value = "\n\n---\n\n")]
        separator: String,

        /// Append a job-log record for the merge.
        #[arg(long, env = "DOC2MD_JOB_LOG")]
        job_log: Option<PathBuf>,
    },

    /// Poll a folder and convert every new file.
    Watch {
        /// Folder to watch.
        dir: PathBuf,

        /// Seconds between polls (clamped to 2–120).
        #[arg(long, default_value_t = 5, env = "DOC2MD_WATCH_INTERVAL")]
        interval: u64,

        #[command(flatten)]
        opts: ConvertArgs,
    },

    /// Show recent job-log records, newest first.
    Joblog {
        /// Job log file.
        #[arg(long, env = "DOC2MD_JOB_LOG", default_value = "data/logs/jobs.jsonl")]
        path: PathBuf,

        /// Number of records.
        #[arg(short = 'n', long, default_value_t = 20)]
        last: usize,

        /// Print records as JSON.
        #[arg(long)]
        json: bool,
    },
}

/// Flags shared by `convert` and `watch`.
#[derive(Args, Debug, Clone)]
struct ConvertArgs {
    /// Engine for every file: marker, docling, markitdown, pptx2md, plain.
    /// Default: chosen by file extension.
    #[arg(long, env = "DOC2MD_ENGINE")]
    engine: Option<EngineKind>,

    /// Engine tried for a chunk after the primary engine failed.
    #[arg(long, env = "DOC2MD_ALTERNATE_ENGINE", default_value = "docling")]
    alternate_engine: EngineKind,

    /// Pass the OCR-forcing flag on the first attempt.
    #[arg(long, env = "DOC2MD_FORCE_OCR")]
    force_ocr: bool,

    /// Disable image extraction.
    #[arg(long, env = "DOC2MD_NO_IMAGES")]
    no_images: bool,

    /// OCR backend for Docling.
    #[arg(long, env = "DOC2MD_DOCLING_OCR", value_enum, default_value = "auto")]
    docling_ocr: OcrArg,

    /// Pages per chunk.
    #[arg(long, env = "DOC2MD_CHUNK_SIZE", default_value_t = 20,
          value_parser = clap::value_parser!(u64).range(1..))]
    chunk_size: u64,

    /// Chunk PDFs with more pages than this.
    #[arg(long, env = "DOC2MD_AUTO_CHUNK_THRESHOLD", default_value_t = 0)]
    auto_chunk_threshold: usize,

    /// Keep the `_chunk_NN` working directories.
    #[arg(long, env = "DOC2MD_KEEP_CHUNKS")]
    keep_chunks: bool,

    /// Do not prepend a frontmatter block.
    #[arg(long, env = "DOC2MD_NO_FRONTMATTER")]
    no_frontmatter: bool,

    /// Frontmatter tags (comma-separated).
    #[arg(long, env = "DOC2MD_TAGS", value_delimiter = ',', default_value = "import")]
    tags: Vec<String>,

    /// Output file stem (letters, digits, '_', '-', spaces). Default: the slug.
    #[arg(long, env = "DOC2MD_OUTPUT_NAME")]
    output_name: Option<String>,

    /// Root directory for `<slug>/` output folders.
    #[arg(long, env = "DOC2MD_OUTPUT_ROOT", default_value = "data/out")]
    output_root: PathBuf,

    /// Append one JSONL record per job to this file.
    #[arg(long, env = "DOC2MD_JOB_LOG", default_value = "data/logs/jobs.jsonl")]
    job_log: PathBuf,

    /// Do not write job-log records.
    #[arg(long)]
    no_job_log: bool,

    /// Delete each source file after a successful conversion.
    #[arg(long, env = "DOC2MD_DELETE_SOURCE")]
    delete_source: bool,

    /// Stream engine output to stderr while it runs.
    #[arg(long, env = "DOC2MD_LIVE_LOGS")]
    live_logs: bool,

    /// Disable progress bar.
    #[arg(long, env = "DOC2MD_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum OcrArg {
    Auto,
    Easyocr,
    Tesseract,
    Rapidocr,
}

impl From<OcrArg> for OcrBackend {
    fn from(v: OcrArg) -> Self {
        match v {
            OcrArg::Auto => OcrBackend::Auto,
            OcrArg::Easyocr => OcrBackend::EasyOcr,
            OcrArg::Tesseract => OcrBackend::Tesseract,
            OcrArg::Rapidocr => OcrBackend::RapidOcr,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs; verbose wins.
    let show_progress = match &cli.command {
        Command::Convert { opts, json, .. } => !cli.quiet && !opts.no_progress && !json,
        Command::Watch { opts, .. } => !cli.quiet && !opts.no_progress,
        _ => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Convert { files, opts, json } => {
            ensure_pdfium(cli.quiet)?;
            run_convert(&files, &opts, json, show_progress, cli.quiet).await
        }
        Command::Repair {
            file,
            output,
            in_place,
            tags,
            title,
            author,
            course,
            semester,
            topic,
            assets_dir,
            no_quotes,
            no_toc,
            fix_images,
            trim_blank,
            fix_tables,
        } => {
            let options = RepairOptions {
                extra_tags: tags,
                overrides: FrontmatterOverrides {
                    title,
                    author,
                    course,
                    semester,
                    topic,
                },
                assets_dir,
                apply_quotes: !no_quotes,
                regen_toc: !no_toc,
                relativize_images: fix_images,
                collapse_blank_lines: trim_blank,
                fix_tables,
            };
            let outcome = repair_file(&file, &options)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let target = if in_place { Some(file.clone()) } else { output };
            write_or_print(target.as_deref(), &outcome.text)?;
            if !cli.quiet {
                let v = outcome.validation;
                eprintln!(
                    "{} repaired  {}",
                    green("✔"),
                    dim(&format!(
                        "assets: ok={} missing={} unknown={}",
                        v.ok, v.missing, v.unknown
                    ))
                );
                if outcome.replaced_malformed_frontmatter {
                    eprintln!("{} frontmatter was not valid JSON and was replaced", yellow("⚠"));
                }
            }
            Ok(())
        }
        Command::Merge {
            files,
            output,
            no_headings,
            no_toc,
            keep_frontmatter,
            separator,
            job_log,
        } => {
            let options = MergeOptions {
                use_headings: !no_headings,
                add_toc: !no_toc,
                drop_frontmatter: !keep_frontmatter,
                separator,
            };
            let merged = merge_files(&files, &options).context("Failed to read input files")?;
            write_or_print(output.as_deref(), &merged)?;
            if let (Some(log), Some(out)) = (job_log, output.as_ref()) {
                joblog::append(&log, &JobRecord::merge(&files, out))
                    .await
                    .context("Failed to write job log")?;
            }
            if !cli.quiet {
                eprintln!("{} merged {} files", green("✔"), files.len());
            }
            Ok(())
        }
        Command::Watch { dir, interval, opts } => {
            ensure_pdfium(cli.quiet)?;
            run_watch(&dir, interval, &opts, show_progress, cli.quiet).await
        }
        Command::Joblog { path, last, json } => {
            let records = joblog::read_last(&path, last)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&records).context("Failed to serialise records")?
                );
            } else if records.is_empty() {
                eprintln!("{}", dim("(no jobs recorded)"));
            } else {
                for r in &records {
                    let mark = match r.status {
                        joblog::JobStatus::Ok => green("ok   "),
                        joblog::JobStatus::Error => red("error"),
                    };
                    println!(
                        "{}  {}  {:<10}  {:>8}  {}  {}",
                        dim(&r.timestamp),
                        mark,
                        r.engine,
                        r.duration_ms.map(|d| format!("{d}ms")).unwrap_or_default(),
                        r.source,
                        dim(&r.output_path),
                    );
                }
            }
            Ok(())
        }
    }
}

/// Make sure a pdfium library is available for page counting and splitting.
///
/// On the very first run the library (~30 MB) is downloaded and cached;
/// later startups only check the cache path.
fn ensure_pdfium(quiet: bool) -> Result<()> {
    if pdfium_auto::is_pdfium_cached() {
        return Ok(());
    }
    if quiet {
        return tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_library(None))
            .map(|_| ())
            .context("Failed to download PDFium engine");
    }

    let dl_bar = ProgressBar::new(0);
    dl_bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS),
    );
    dl_bar.set_prefix("PDF engine");
    dl_bar.set_message("Connecting…");
    dl_bar.enable_steady_tick(Duration::from_millis(80));

    let bar = dl_bar.clone();
    // block_in_place keeps the callback borrow valid without a 'static bound.
    tokio::task::block_in_place(|| {
        pdfium_auto::ensure_pdfium_library(Some(&|downloaded, total| {
            if let Some(t) = total {
                if bar.length().unwrap_or(0) != t {
                    bar.set_length(t);
                }
            }
            bar.set_position(downloaded);
        }))
    })
    .context("Failed to download PDFium engine")?;

    dl_bar.finish_with_message("ready ✓");
    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(
    opts: &ConvertArgs,
    progress: Option<ProgressCallback>,
    log_sink: Option<LogSink>,
) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .alternate_engine(opts.alternate_engine)
        .force_ocr(opts.force_ocr)
        .keep_images(!opts.no_images)
        .docling_ocr(opts.docling_ocr.into())
        .chunk_size_pages(opts.chunk_size as usize)
        .auto_chunk_threshold(opts.auto_chunk_threshold)
        .cleanup_chunks(!opts.keep_chunks)
        .add_frontmatter(!opts.no_frontmatter)
        .tags(opts.tags.iter().cloned())
        .output_root(opts.output_root.clone())
        .delete_source_after_success(opts.delete_source)
        .programs(EnginePrograms::from_env());

    if let Some(engine) = opts.engine {
        builder = builder.engine(engine);
    }
    if let Some(ref name) = opts.output_name {
        builder = builder.output_name(name.clone());
    }
    if !opts.no_job_log {
        builder = builder.job_log(opts.job_log.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    if let Some(sink) = log_sink {
        builder = builder.log_sink(sink);
    }
    builder.build().context("Invalid configuration")
}

/// Convert one file with its own progress bar.
async fn convert_one(
    file: &Path,
    opts: &ConvertArgs,
    show_progress: bool,
) -> Result<ConversionOutput> {
    let name = file.display().to_string();
    let callback = show_progress.then(|| CliProgressCallback::new_dynamic(&name));

    let log_sink: Option<LogSink> = match (&callback, opts.live_logs) {
        (Some(cb), true) => Some(cb.log_sink()),
        (None, true) => Some(Arc::new(|line: &str| eprintln!("{}", dim(line)))),
        _ => None,
    };
    let progress = callback
        .clone()
        .map(|cb| cb as Arc<dyn ConversionProgressCallback>);

    let config = build_config(opts, progress, log_sink)?;
    convert(file, &config)
        .await
        .with_context(|| format!("Conversion of {} failed", name))
}

fn print_summary(output: &ConversionOutput) {
    let s = &output.stats;
    let pages = s.total_pages.map(|p| format!("{p} pages  ")).unwrap_or_default();
    eprintln!(
        "{}  {}{}  {}  {}ms  →  {}",
        if s.fallback_chunks == 0 { green("✔") } else { cyan("⚠") },
        pages,
        if output.is_chunked() {
            format!("{} chunks", s.chunks)
        } else {
            output.engine.to_string()
        },
        dim(&format!("{}/{} images", s.images_copied, s.images_found)),
        s.total_duration_ms,
        bold(&output.output_path.display().to_string()),
    );
}

async fn run_convert(
    files: &[PathBuf],
    opts: &ConvertArgs,
    json: bool,
    show_progress: bool,
    quiet: bool,
) -> Result<()> {
    let mut failed = 0usize;
    for file in files {
        match convert_one(file, opts, show_progress).await {
            Ok(output) => {
                if json {
                    let json = serde_json::to_string_pretty(&output)
                        .context("Failed to serialise output")?;
                    println!("{json}");
                } else if !quiet {
                    print_summary(&output);
                }
            }
            Err(e) => {
                failed += 1;
                eprintln!("{} {:#}", red("✘"), e);
            }
        }
    }
    if failed > 0 {
        anyhow::bail!("{} of {} conversions failed", failed, files.len());
    }
    Ok(())
}

async fn run_watch(
    dir: &Path,
    interval: u64,
    opts: &ConvertArgs,
    show_progress: bool,
    quiet: bool,
) -> Result<()> {
    let interval = Duration::from_secs(interval.clamp(2, 120));
    let mut state = WatchState::new();
    info!("Watching {} every {}s", dir.display(), interval.as_secs());
    if !quiet {
        eprintln!(
            "{} watching {} every {}s (Ctrl-C to stop)",
            cyan("◆"),
            bold(&dir.display().to_string()),
            interval.as_secs()
        );
    }

    loop {
        let fresh = state
            .poll(dir)
            .with_context(|| format!("Failed to read {}", dir.display()))?;
        for file in fresh {
            match convert_one(&file, opts, show_progress).await {
                Ok(output) if !quiet => print_summary(&output),
                Ok(_) => {}
                Err(e) => {
                    warn!("{:#}", e);
                    eprintln!("{} {:#}", red("✘"), e);
                }
            }
            state.mark_seen(file);
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => {
                if !quiet {
                    eprintln!("{} stopped after {} files", dim("◆"), state.len());
                }
                return Ok(());
            }
        }
    }
}

fn write_or_print(target: Option<&Path>, text: &str) -> Result<()> {
    match target {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            std::fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(text.as_bytes())
                .context("Failed to write to stdout")
        }
    }
}
