//! Integration tests for the chunk pipeline, repair and merge.
//!
//! These never spawn an external engine: converters are in-process fakes, so
//! the suite runs anywhere `cargo test` does.

use async_trait::async_trait;
use edgequake_doc2md::engines::passes_sanity_check;
use edgequake_doc2md::pipeline::chunker::{plan_page_ranges, Chunk};
use edgequake_doc2md::pipeline::merge::{merge_chunks, ChunkOutput};
use edgequake_doc2md::pipeline::orchestrator::{convert_chunks, ChunkOptions};
use edgequake_doc2md::repair::frontmatter::split_frontmatter;
use edgequake_doc2md::{
    merge_documents, repair, ConversionProgressCallback, ConversionResult, ConvertRequest,
    Converter, Doc2MdError, EngineKind, MergeInput, MergeOptions, PageRange, RepairOptions,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

// ── Fakes ────────────────────────────────────────────────────────────────────

const FILLER: &str = "Lorem ipsum dolor sit amet, consectetur adipiscing elit, sed do eiusmod.";

/// Writes `assets/x.png` into its working directory and links it, together
/// with one external image. Fails for the chunk directories in `fail_on`.
struct FakeEngine {
    kind: EngineKind,
    fail_on: Vec<&'static str>,
}

impl FakeEngine {
    fn new(kind: EngineKind) -> Self {
        Self {
            kind,
            fail_on: Vec::new(),
        }
    }

    fn failing_on(kind: EngineKind, dirs: &[&'static str]) -> Self {
        Self {
            kind,
            fail_on: dirs.to_vec(),
        }
    }
}

#[async_trait]
impl Converter for FakeEngine {
    fn kind(&self) -> EngineKind {
        self.kind
    }

    async fn convert(
        &self,
        _path: &Path,
        req: &ConvertRequest,
    ) -> Result<ConversionResult, Doc2MdError> {
        let dir = req.out_dir.to_string_lossy().into_owned();
        if self.fail_on.iter().any(|d| dir.contains(d)) {
            return Err(Doc2MdError::ConversionFailed {
                engine: self.kind.label().into(),
                log: "segfault in layout model".into(),
                hints: String::new(),
            });
        }
        let assets = req.out_dir.join("assets");
        std::fs::create_dir_all(&assets).unwrap();
        std::fs::write(assets.join("x.png"), dir.as_bytes()).unwrap();
        Ok(ConversionResult {
            markdown: format!(
                "{} from {}\n\n![fig](assets/x.png)\n\n![web](https://example.com/w.png)\n",
                FILLER, self.kind
            ),
            asset_dir: None,
            engine: self.kind,
            log: String::new(),
        })
    }
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl ConversionProgressCallback for Recorder {
    fn on_conversion_start(&self, total_chunks: usize, total_pages: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("start {total_chunks} {total_pages}"));
    }

    fn on_chunk_fallback(&self, chunk: usize, _total: usize, _range: PageRange, _error: &str) {
        self.events.lock().unwrap().push(format!("fallback {chunk}"));
    }

    fn on_chunk_complete(&self, chunk: usize, _total: usize, range: PageRange, engine: &str) {
        self.events
            .lock()
            .unwrap()
            .push(format!("done {chunk} {range} {engine}"));
    }

    fn on_conversion_complete(&self, total_chunks: usize) {
        self.events.lock().unwrap().push(format!("complete {total_chunks}"));
    }
}

fn chunks(pages: usize, size: usize) -> Vec<Chunk> {
    plan_page_ranges(pages, size)
        .into_iter()
        .enumerate()
        .map(|(i, range)| Chunk {
            index: i + 1,
            source: PathBuf::from("lecture.pdf"),
            range,
            document: tempfile::NamedTempFile::new().unwrap().into_temp_path(),
        })
        .collect()
}

// ── Chunk orchestration ──────────────────────────────────────────────────────

#[tokio::test]
async fn failed_chunk_is_rescued_by_alternate() {
    let dir = tempfile::tempdir().unwrap();
    let primary = FakeEngine::failing_on(EngineKind::Marker, &["_chunk_02"]);
    let alternate = FakeEngine::new(EngineKind::Docling);
    let recorder = Arc::new(Recorder::default());
    let options = ChunkOptions {
        keep_images: true,
        cleanup: true,
        progress: Some(recorder.clone() as Arc<dyn ConversionProgressCallback>),
        ..ChunkOptions::default()
    };

    let out = convert_chunks(&chunks(50, 20), &primary, Some(&alternate), dir.path(), &options)
        .await
        .unwrap();

    assert_eq!(
        out.engines,
        vec![EngineKind::Marker, EngineKind::Docling, EngineKind::Marker]
    );
    assert!(out.log.contains("[chunk 02 21-40] MARKER failed"));
    assert!(out.log.contains("[chunk 02 21-40] DOCLING ok"));
    assert!(out.log.contains("[chunk 03 41-50] MARKER ok"));

    let md = out.document.render();
    let first = md.find("Chunk 01 (pages 1–20)").unwrap();
    let second = md.find("from Docling").unwrap();
    let third = md.rfind("Chunk 03 (pages 41–50)").unwrap();
    assert!(first < second && second < third);
    assert!(md.starts_with("## Contents (chunks)\n\n- [Chunk 01 (pages 1–20)](#chunk-01-pages-1-20)"));

    let events = recorder.events.lock().unwrap().clone();
    assert_eq!(events.first().map(String::as_str), Some("start 3 50"));
    assert!(events.contains(&"fallback 2".to_string()));
    assert!(events.contains(&"done 2 21-40 DOCLING".to_string()));
    assert_eq!(events.last().map(String::as_str), Some("complete 3"));

    assert!(!dir.path().join("_chunk_02").exists());
}

#[tokio::test]
async fn images_are_prefixed_per_chunk() {
    let dir = tempfile::tempdir().unwrap();
    let engine = FakeEngine::new(EngineKind::Marker);
    let options = ChunkOptions {
        keep_images: true,
        ..ChunkOptions::default()
    };

    let out = convert_chunks(&chunks(45, 15), &engine, None, dir.path(), &options)
        .await
        .unwrap();
    let md = out.document.render();

    assert!(md.contains("![fig](./assets/c03_x.png)"));
    assert!(md.contains("![web](https://example.com/w.png)"));
    assert!(!md.contains("](assets/x.png)"));
    for n in 1..=3 {
        assert!(dir.path().join(format!("assets/c0{n}_x.png")).is_file());
    }
    assert_eq!(out.reports.len(), 3);
    assert!(out.reports.iter().all(|r| r.found == 1 && r.copied == 1));

    // Without cleanup the working directories stay behind.
    assert!(dir.path().join("_chunk_01").is_dir());
}

#[tokio::test]
async fn both_engines_failing_aborts_the_job() {
    let dir = tempfile::tempdir().unwrap();
    let primary = FakeEngine::failing_on(EngineKind::Marker, &["_chunk_01"]);
    let alternate = FakeEngine::failing_on(EngineKind::Docling, &["_chunk_01"]);

    let err = convert_chunks(
        &chunks(30, 20),
        &primary,
        Some(&alternate),
        dir.path(),
        &ChunkOptions::default(),
    )
    .await
    .unwrap_err();

    match err {
        Doc2MdError::ChunkConversionFailed { chunk, ref log, .. } => {
            assert_eq!(chunk, 1);
            assert!(log.contains("MARKER failed"));
            assert!(log.contains("DOCLING failed"));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(!dir.path().join("_chunk_02").exists());
}

// ── Sanity check ─────────────────────────────────────────────────────────────

#[test]
fn sanity_threshold_is_fifty_chars() {
    assert!(passes_sanity_check(&"a".repeat(51)));
    assert!(passes_sanity_check(&"b".repeat(50)));
    assert!(!passes_sanity_check(""));
    assert!(!passes_sanity_check("   \n\n  "));
    assert!(!passes_sanity_check("0123456789"));
}

// ── Repair + merge ───────────────────────────────────────────────────────────

#[test]
fn repaired_notes_merge_without_frontmatter() {
    let opts = RepairOptions {
        extra_tags: vec!["studium".into()],
        ..RepairOptions::default()
    };
    let week1 = repair("# Week 1\n#### Graphs\n* BFS\n", &opts);
    let week2 = repair("# Week 2\n\n\n\n\nTrees\n", &opts);
    assert!(week1.starts_with("---\n{"));

    let merged = merge_documents(
        &[MergeInput::new("week1", week1), MergeInput::new("week2", week2)],
        &MergeOptions::default(),
    );

    assert!(merged.starts_with("## Contents"));
    assert!(!merged.contains("\"tags\""));
    assert!(merged.contains("## Graphs\n- BFS"));
    assert!(merged.contains("<a name=\"week1\"></a>"));
    assert!(merged.find("# Week 1").unwrap() < merged.find("# Week 2").unwrap());
    assert!(!merged.contains("\n\n\n"));
    assert!(merged.ends_with('\n'));
}

#[test]
fn toc_with_only_start_marker_is_untouched() {
    let doc = "<!-- TOC -->\n# A\n## B\n";
    let out = repair(doc, &RepairOptions::default());
    let (_, body) = split_frontmatter(&out);
    assert!(body.contains("<!-- TOC -->\n# A\n## B\n"));
    assert!(!body.contains("- [A]"));
}

#[test]
fn repair_keeps_merge_anchors() {
    let range = PageRange::new(1, 20).unwrap();
    let chunked = merge_chunks(
        &[ChunkOutput {
            index: 1,
            range,
            markdown: format!("He called it \"fast\". {}", FILLER),
            asset_dir: PathBuf::from("assets"),
            engine: EngineKind::Marker,
        }],
        "assets",
    )
    .render();
    let repaired = repair(&chunked, &RepairOptions::default());
    assert!(repaired.contains("<a name=\"chunk-01-pages-1-20\"></a>"));
    assert!(repaired.contains("(#chunk-01-pages-1-20)"));
    assert!(repaired.contains("He called it „fast“."));

    let merged = merge_documents(
        &[MergeInput::new("Week 1", "Graphs"), MergeInput::new("Week 2", "Trees")],
        &MergeOptions::default(),
    );
    let repaired = repair(&merged, &RepairOptions::default());
    assert!(repaired.contains("<a name=\"week-1\"></a>"));
    assert!(repaired.contains("<a name=\"week-2\"></a>"));
}
