//! Plain-text "engine": the file already is the document.

use super::{ConversionResult, ConvertRequest, Converter};
use crate::engine::EngineKind;
use crate::error::Doc2MdError;
use async_trait::async_trait;
use std::path::Path;

#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextEngine;

#[async_trait]
impl Converter for PlainTextEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::PlainText
    }

    async fn convert(
        &self,
        path: &Path,
        _request: &ConvertRequest,
    ) -> Result<ConversionResult, Doc2MdError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Doc2MdError::FileNotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => Doc2MdError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => Doc2MdError::Internal(format!("Cannot read {}: {}", path.display(), e)),
        })?;
        Ok(ConversionResult {
            markdown: String::from_utf8_lossy(&bytes).into_owned(),
            asset_dir: None,
            engine: EngineKind::PlainText,
            log: format!("read {} bytes from {}", bytes.len(), path.display()),
        })
    }
}
