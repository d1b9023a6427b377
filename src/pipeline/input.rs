//! Input resolution: validate a user-supplied path before any engine runs.
//!
//! Engines report a missing or unreadable file as an opaque process failure,
//! so existence and read permission are checked up front. For `.pdf` inputs
//! the `%PDF` magic bytes are checked too; a mismatch does not fail the job,
//! it only disables chunking (the page count is then unknown).

use crate::error::Doc2MdError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A validated local source document.
#[derive(Debug, Clone)]
pub struct ResolvedInput {
    path: PathBuf,
    extension: String,
    has_pdf_magic: bool,
}

impl ResolvedInput {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lower-case extension without the dot; empty when there is none.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// File name component, lossily converted.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// File stem component, lossily converted.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// True for `.pdf` files that start with `%PDF`.
    pub fn is_pdf(&self) -> bool {
        self.extension == "pdf" && self.has_pdf_magic
    }
}

/// Resolve a local path, validating existence, type and read permission.
pub fn resolve_input(path: impl AsRef<Path>) -> Result<ResolvedInput, Doc2MdError> {
    let path = path.as_ref().to_path_buf();

    if !path.exists() {
        return Err(Doc2MdError::FileNotFound { path });
    }
    if path.is_dir() {
        return Err(Doc2MdError::UnsupportedInput {
            path,
            reason: "is a directory".into(),
        });
    }
    if path.file_name().is_none() {
        return Err(Doc2MdError::UnsupportedInput {
            path,
            reason: "has no file name".into(),
        });
    }

    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    let has_pdf_magic = match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            f.read_exact(&mut magic).is_ok() && &magic == b"%PDF"
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Doc2MdError::PermissionDenied { path });
        }
        Err(_) => return Err(Doc2MdError::FileNotFound { path }),
    };

    if extension == "pdf" && !has_pdf_magic {
        warn!(
            "'{}' has a .pdf extension but no %PDF header; it will not be chunked",
            path.display()
        );
    }

    debug!("Resolved input: {} (.{})", path.display(), extension);
    Ok(ResolvedInput {
        path,
        extension,
        has_pdf_magic,
    })
}
