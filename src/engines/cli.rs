//! Output-directory engines: Marker (`marker_single`) and Docling (`docling`).
//!
//! Both write Markdown plus images into a directory instead of stdout. Each
//! call makes at most two attempts:
//!
//! 1. with the caller's OCR flag, into `<out_dir>/attempt-1`;
//! 2. only if attempt 1 failed or produced fewer than
//!    [`MIN_MARKDOWN_CHARS`](super::MIN_MARKDOWN_CHARS) characters, with the
//!    OCR flag inverted, into `<out_dir>/attempt-2`.
//!
//! The result of an attempt is the most recently modified `.md` file found
//! (recursively) in its attempt directory.

use super::process::{display_command, run_logged};
use super::{passes_sanity_check, ConversionResult, ConvertRequest, Converter};
use crate::config::OcrBackend;
use crate::engine::EngineKind;
use crate::error::{remediation_hints, Doc2MdError};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Marker or Docling, invoked as an external program.
#[derive(Debug, Clone)]
pub struct CliEngine {
    kind: EngineKind,
    program: String,
    ocr_backend: OcrBackend,
}

/// Why one attempt did not yield usable Markdown.
#[derive(Debug)]
enum AttemptFailure {
    Process(String),
    TooShort(usize),
}

struct Attempt {
    log: String,
    outcome: Result<(String, PathBuf), AttemptFailure>,
}

impl CliEngine {
    pub fn marker(program: impl Into<String>) -> Self {
        Self {
            kind: EngineKind::Marker,
            program: program.into(),
            ocr_backend: OcrBackend::Auto,
        }
    }

    pub fn docling(program: impl Into<String>, ocr_backend: OcrBackend) -> Self {
        Self {
            kind: EngineKind::Docling,
            program: program.into(),
            ocr_backend,
        }
    }

    /// Command-line arguments for one attempt.
    pub fn args(&self, input: &Path, out_dir: &Path, force_ocr: bool, keep_images: bool) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![input.as_os_str().to_owned()];
        match self.kind {
            EngineKind::Docling => {
                for flag in ["--to", "md", "--output"] {
                    args.push(flag.into());
                }
                args.push(out_dir.as_os_str().to_owned());
                if force_ocr {
                    args.push("--force-ocr".into());
                }
                if let Some(backend) = self.ocr_backend.docling_arg() {
                    args.push("--ocr-engine".into());
                    args.push(backend.into());
                }
                let mode = if keep_images { "referenced" } else { "placeholder" };
                args.push("--image-export-mode".into());
                args.push(mode.into());
            }
            _ => {
                for flag in ["--output_format", "markdown", "--output_dir"] {
                    args.push(flag.into());
                }
                args.push(out_dir.as_os_str().to_owned());
                if force_ocr {
                    args.push("--force_ocr".into());
                }
                if !keep_images {
                    args.push("--disable_image_extraction".into());
                }
            }
        }
        args
    }

    async fn attempt(
        &self,
        input: &Path,
        request: &ConvertRequest,
        dir: &Path,
        force_ocr: bool,
    ) -> Result<Attempt, Doc2MdError> {
        // A stale attempt directory would let an old .md pass for new output.
        if dir.exists() {
            if let Err(e) = tokio::fs::remove_dir_all(dir).await {
                warn!("Could not clear {}: {}", dir.display(), e);
            }
        }
        tokio::fs::create_dir_all(dir).await.map_err(|e| Doc2MdError::OutputWriteFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;

        let args = self.args(input, dir, force_ocr, request.keep_images);
        let mut log = format!("$ {}\n", display_command(&self.program, &args));
        request.emit(log.trim_end());

        let started = SystemTime::now();
        let out = run_logged(self.kind, &self.program, &args, request.log_sink.as_ref()).await?;
        log.push_str(&out.log);

        if !out.status.success() {
            return Ok(Attempt {
                log,
                outcome: Err(AttemptFailure::Process(format!("exited with {}", out.status))),
            });
        }

        let Some(md_path) = newest_markdown(dir, started) else {
            return Ok(Attempt {
                log,
                outcome: Err(AttemptFailure::Process("no Markdown file was written".into())),
            });
        };
        let markdown = match tokio::fs::read(&md_path).await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                return Ok(Attempt {
                    log,
                    outcome: Err(AttemptFailure::Process(format!(
                        "cannot read {}: {}",
                        md_path.display(),
                        e
                    ))),
                })
            }
        };

        if !passes_sanity_check(&markdown) {
            let chars = markdown.trim().chars().count();
            return Ok(Attempt {
                log,
                outcome: Err(AttemptFailure::TooShort(chars)),
            });
        }
        debug!("{} wrote {}", self.kind.label(), md_path.display());
        Ok(Attempt {
            log,
            outcome: Ok((markdown, md_path)),
        })
    }
}

fn describe(failure: &AttemptFailure) -> String {
    match failure {
        AttemptFailure::Process(reason) => reason.clone(),
        AttemptFailure::TooShort(chars) => {
            format!("output too short ({} characters after trimming)", chars)
        }
    }
}

fn labelled(heading: &str, force_ocr: bool, log: &str, failure: Option<&AttemptFailure>) -> String {
    let mut body = if log.trim().is_empty() {
        "(no logs)".to_string()
    } else {
        log.trim_end().to_string()
    };
    if let Some(failure) = failure {
        body.push_str(&format!("\n=> {}", describe(failure)));
    }
    format!("{} (force_ocr={}):\n{}", heading, force_ocr, body)
}

/// Directory holding the images of an attempt: its `assets/` if present.
fn asset_dir_for(attempt_dir: &Path) -> PathBuf {
    let assets = attempt_dir.join("assets");
    if assets.is_dir() {
        assets
    } else {
        attempt_dir.to_path_buf()
    }
}

/// Most recently modified `.md` / `.markdown` file under `dir`, written no
/// earlier than `since`.
pub(crate) fn newest_markdown(dir: &Path, since: SystemTime) -> Option<PathBuf> {
    let slack = std::time::Duration::from_secs(2);
    let floor = since.checked_sub(slack).unwrap_or(since);
    WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .map(|x| {
                    let x = x.to_string_lossy().to_ascii_lowercase();
                    x == "md" || x == "markdown"
                })
                .unwrap_or(false)
        })
        .filter_map(|e| {
            let modified = e.metadata().ok()?.modified().ok()?;
            (modified >= floor).then(|| (modified, e.into_path()))
        })
        .max_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)))
        .map(|(_, p)| p)
}

#[async_trait]
impl Converter for CliEngine {
    fn kind(&self) -> EngineKind {
        self.kind
    }

    async fn convert(
        &self,
        path: &Path,
        request: &ConvertRequest,
    ) -> Result<ConversionResult, Doc2MdError> {
        let first_dir = request.out_dir.join("attempt-1");
        let first = self.attempt(path, request, &first_dir, request.force_ocr).await?;
        let first_failure = match first.outcome {
            Ok((markdown, _)) => {
                return Ok(ConversionResult {
                    markdown,
                    asset_dir: Some(asset_dir_for(&first_dir)),
                    engine: self.kind,
                    log: labelled("First attempt", request.force_ocr, &first.log, None),
                });
            }
            Err(failure) => failure,
        };

        let retry_ocr = !request.force_ocr;
        info!(
            "{} attempt 1 failed ({}); retrying with force_ocr={}",
            self.kind.label(),
            describe(&first_failure),
            retry_ocr
        );
        let first_log = labelled("First attempt", request.force_ocr, &first.log, Some(&first_failure));

        let second_dir = request.out_dir.join("attempt-2");
        let second = self.attempt(path, request, &second_dir, retry_ocr).await?;
        match second.outcome {
            Ok((markdown, _)) => Ok(ConversionResult {
                markdown,
                asset_dir: Some(asset_dir_for(&second_dir)),
                engine: self.kind,
                log: format!(
                    "{}\n\n{}",
                    first_log,
                    labelled("Fallback", retry_ocr, &second.log, None)
                ),
            }),
            Err(failure) => {
                let log = format!(
                    "{}\n\n{}",
                    first_log,
                    labelled("Fallback", retry_ocr, &second.log, Some(&failure))
                );
                let engine = self.kind.label().to_string();
                let hints = remediation_hints(request.force_ocr, request.keep_images);
                Err(match failure {
                    AttemptFailure::TooShort(chars) => Doc2MdError::SanityCheckFailed {
                        engine,
                        chars,
                        log,
                        hints,
                    },
                    AttemptFailure::Process(_) => Doc2MdError::ConversionFailed { engine, log, hints },
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn marker_arguments() {
        let m = CliEngine::marker("marker_single");
        let args = strings(&m.args(Path::new("in.pdf"), Path::new("/out"), true, false));
        assert_eq!(
            args,
            vec![
                "in.pdf",
                "--output_format",
                "markdown",
                "--output_dir",
                "/out",
                "--force_ocr",
                "--disable_image_extraction"
            ]
        );
        let plain = strings(&m.args(Path::new("in.pdf"), Path::new("/out"), false, true));
        assert!(!plain.contains(&"--force_ocr".to_string()));
        assert!(!plain.contains(&"--disable_image_extraction".to_string()));
    }

    #[test]
    fn docling_arguments() {
        let d = CliEngine::docling("docling", OcrBackend::Tesseract);
        let args = strings(&d.args(Path::new("in.pdf"), Path::new("/out"), true, true));
        assert_eq!(
            args,
            vec![
                "in.pdf",
                "--to",
                "md",
                "--output",
                "/out",
                "--force-ocr",
                "--ocr-engine",
                "tesseract",
                "--image-export-mode",
                "referenced"
            ]
        );
    }

    #[test]
    fn newest_markdown_ignores_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("doc");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("doc.md"), "# hi").unwrap();
        std::fs::write(nested.join("doc_meta.json"), "{}").unwrap();
        let since = SystemTime::now();
        let found = newest_markdown(dir.path(), since).unwrap();
        assert_eq!(found.file_name().unwrap(), "doc.md");
        assert!(newest_markdown(&dir.path().join("missing"), since).is_none());
    }

    #[test]
    fn labelled_log_mentions_flag() {
        let s = labelled("Fallback", true, "", Some(&AttemptFailure::TooShort(3)));
        assert!(s.starts_with("Fallback (force_ocr=true):\n(no logs)"));
        assert!(s.contains("output too short (3 characters"));
    }

    #[cfg(unix)]
    mod scripted {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        /// Fake marker: writes `$DOC` when `--force_ocr` is passed, else exits 1.
        fn fake_marker(dir: &Path, body_when_ocr: &str, body_without: Option<&str>) -> PathBuf {
            let script = dir.join("fake_marker.sh");
            let without = match body_without {
                Some(b) => format!("printf '%s' '{}' > \"$out/doc.md\"; exit 0", b),
                None => "echo 'layout model crashed' 1>&2; exit 1".to_string(),
            };
            let text = format!(
                "#!/bin/sh\nout=\"\"\nocr=0\nwhile [ $# -gt 0 ]; do\n  case \"$1\" in\n    --output_dir) out=\"$2\"; shift;;\n    --force_ocr) ocr=1;;\n  esac\n  shift\ndone\nif [ $ocr -eq 1 ]; then\n  printf '%s' '{}' > \"$out/doc.md\"; exit 0\nfi\n{}\n",
                body_when_ocr, without
            );
            std::fs::write(&script, text).unwrap();
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
            script
        }

        #[tokio::test]
        async fn second_attempt_inverts_ocr() {
            let dir = tempfile::tempdir().unwrap();
            let long = "A reasonably long paragraph produced by the OCR pass of the engine.";
            let script = fake_marker(dir.path(), long, None);
            let engine = CliEngine::marker(script.to_string_lossy());
            let input = dir.path().join("in.pdf");
            std::fs::write(&input, b"%PDF").unwrap();

            let req = ConvertRequest::new(dir.path().join("work"));
            let result = engine.convert(&input, &req).await.unwrap();
            assert_eq!(result.markdown, long);
            assert!(result.log.contains("First attempt (force_ocr=false)"));
            assert!(result.log.contains("layout model crashed"));
            assert!(result.log.contains("Fallback (force_ocr=true)"));
        }

        #[tokio::test]
        async fn short_output_on_both_attempts_is_sanity_failure() {
            let dir = tempfile::tempdir().unwrap();
            let script = fake_marker(dir.path(), "tiny", Some("0123456789"));
            let engine = CliEngine::marker(script.to_string_lossy());
            let input = dir.path().join("in.pdf");
            std::fs::write(&input, b"%PDF").unwrap();

            let req = ConvertRequest::new(dir.path().join("work"));
            let err = engine.convert(&input, &req).await.unwrap_err();
            match err {
                Doc2MdError::SanityCheckFailed { chars, ref log, .. } => {
                    assert_eq!(chars, 4);
                    let first = log.find("First attempt").unwrap();
                    let second = log.find("Fallback").unwrap();
                    assert!(first < second);
                }
                other => panic!("expected sanity failure, got {other:?}"),
            }
        }
    }
}
