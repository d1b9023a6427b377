//! Engines that print Markdown on stdout: MarkItDown and pptx2md.

use super::process::{display_command, run_capturing_stdout};
use super::{passes_sanity_check, ConversionResult, ConvertRequest, Converter};
use crate::engine::EngineKind;
use crate::error::{remediation_hints, Doc2MdError};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// A single-invocation engine whose stdout is the document.
#[derive(Debug, Clone)]
pub struct StdoutEngine {
    kind: EngineKind,
    program: String,
}

impl StdoutEngine {
    pub fn markitdown(program: impl Into<String>) -> Self {
        Self {
            kind: EngineKind::MarkItDown,
            program: program.into(),
        }
    }

    pub fn pptx2md(program: impl Into<String>) -> Self {
        Self {
            kind: EngineKind::Pptx2md,
            program: program.into(),
        }
    }

    /// Image directory handed to pptx2md.
    fn image_dir(&self, out_dir: &Path) -> Option<PathBuf> {
        (self.kind == EngineKind::Pptx2md).then(|| out_dir.join("assets"))
    }

    pub fn args(&self, input: &Path, out_dir: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![input.as_os_str().to_owned()];
        if let Some(images) = self.image_dir(out_dir) {
            args.push("--img-dir".into());
            args.push(images.into_os_string());
        }
        args
    }
}

#[async_trait]
impl Converter for StdoutEngine {
    fn kind(&self) -> EngineKind {
        self.kind
    }

    async fn convert(
        &self,
        path: &Path,
        request: &ConvertRequest,
    ) -> Result<ConversionResult, Doc2MdError> {
        let image_dir = self.image_dir(&request.out_dir);
        if let Some(ref dir) = image_dir {
            tokio::fs::create_dir_all(dir).await.map_err(|e| Doc2MdError::OutputWriteFailed {
                path: dir.clone(),
                source: e,
            })?;
        }

        let args = self.args(path, &request.out_dir);
        let command = format!("$ {}", display_command(&self.program, &args));
        request.emit(&command);
        let out =
            run_capturing_stdout(self.kind, &self.program, &args, request.log_sink.as_ref()).await?;
        let log = format!("{}\n{}", command, out.log.trim_end());

        let failure = if !out.status.success() {
            Some(format!("exited with {}", out.status))
        } else if out.stdout.trim().is_empty() {
            Some("produced no output".to_string())
        } else {
            None
        };
        if let Some(reason) = failure {
            return Err(Doc2MdError::ConversionFailed {
                engine: self.kind.label().to_string(),
                log: format!("{}\n=> {}", log, reason),
                hints: remediation_hints(request.force_ocr, request.keep_images),
            });
        }
        if !passes_sanity_check(&out.stdout) {
            let chars = out.stdout.trim().chars().count();
            return Err(Doc2MdError::SanityCheckFailed {
                engine: self.kind.label().to_string(),
                chars,
                log: format!(
                    "{}\n=> output too short ({} characters after trimming)",
                    log, chars
                ),
                hints: remediation_hints(request.force_ocr, request.keep_images),
            });
        }

        Ok(ConversionResult {
            markdown: out.stdout,
            asset_dir: image_dir,
            engine: self.kind,
            log,
        })
    }
}
