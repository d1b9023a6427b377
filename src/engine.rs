//! Engine variants and the extension-based engine selection.
//!
//! Selection is a total function of `(extension, user override)` so it can be
//! tested without any converter being installed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of conversion engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineKind {
    /// `markitdown`: Office documents, HTML, EPUB.
    MarkItDown,
    /// `docling`: general fallback and per-chunk alternate.
    Docling,
    /// `marker_single`: best PDF quality; the only engine used for chunking.
    Marker,
    /// `pptx2md`: slide decks.
    Pptx2md,
    /// Read the file as UTF-8 text; no external process.
    PlainText,
}

impl EngineKind {
    /// All engines, in the order they are listed in help texts.
    pub const ALL: [EngineKind; 5] = [
        EngineKind::Marker,
        EngineKind::Pptx2md,
        EngineKind::MarkItDown,
        EngineKind::Docling,
        EngineKind::PlainText,
    ];

    /// Upper-case label used in structured log lines (`[chunk 01 1-20] MARKER ok`).
    pub fn label(self) -> &'static str {
        match self {
            EngineKind::MarkItDown => "MARKITDOWN",
            EngineKind::Docling => "DOCLING",
            EngineKind::Marker => "MARKER",
            EngineKind::Pptx2md => "PPTX2MD",
            EngineKind::PlainText => "PLAIN",
        }
    }

    /// True for engines that accept an OCR-forcing flag and therefore get the
    /// two-attempt OCR toggle.
    pub fn supports_ocr_toggle(self) -> bool {
        matches!(self, EngineKind::Marker | EngineKind::Docling)
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineKind::MarkItDown => "MarkItDown",
            EngineKind::Docling => "Docling",
            EngineKind::Marker => "Marker",
            EngineKind::Pptx2md => "pptx2md",
            EngineKind::PlainText => "plain",
        };
        f.write_str(name)
    }
}

impl FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "markitdown" => Ok(EngineKind::MarkItDown),
            "docling" => Ok(EngineKind::Docling),
            "marker" | "marker_single" => Ok(EngineKind::Marker),
            "pptx2md" => Ok(EngineKind::Pptx2md),
            "plain" | "plaintext" | "text" => Ok(EngineKind::PlainText),
            other => Err(format!(
                "unknown engine '{other}' (expected marker, pptx2md, markitdown, docling or plain)"
            )),
        }
    }
}

/// Pick the engine for a file extension (without the dot, any case).
///
/// An explicit `user_override` always wins.
pub fn select_engine(extension: &str, user_override: Option<EngineKind>) -> EngineKind {
    if let Some(kind) = user_override {
        return kind;
    }
    match extension.trim_start_matches('.').to_ascii_lowercase().as_str() {
        "pdf" => EngineKind::Marker,
        "ppt" | "pptx" => EngineKind::Pptx2md,
        "txt" => EngineKind::PlainText,
        "doc" | "docx" | "xls" | "xlsx" | "html" | "htm" | "epub" => EngineKind::MarkItDown,
        _ => EngineKind::Docling,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_by_extension() {
        assert_eq!(select_engine("pdf", None), EngineKind::Marker);
        assert_eq!(select_engine("PDF", None), EngineKind::Marker);
        assert_eq!(select_engine("pptx", None), EngineKind::Pptx2md);
        assert_eq!(select_engine("ppt", None), EngineKind::Pptx2md);
        assert_eq!(select_engine("txt", None), EngineKind::PlainText);
        assert_eq!(select_engine("docx", None), EngineKind::MarkItDown);
        assert_eq!(select_engine(".html", None), EngineKind::MarkItDown);
        assert_eq!(select_engine("epub", None), EngineKind::MarkItDown);
        assert_eq!(select_engine("png", None), EngineKind::Docling);
        assert_eq!(select_engine("", None), EngineKind::Docling);
    }

    #[test]
    fn override_wins() {
        assert_eq!(
            select_engine("pdf", Some(EngineKind::Docling)),
            EngineKind::Docling
        );
        assert_eq!(
            select_engine("txt", Some(EngineKind::Marker)),
            EngineKind::Marker
        );
    }

    #[test]
    fn parse_names() {
        assert_eq!("Marker".parse::<EngineKind>(), Ok(EngineKind::Marker));
        assert_eq!("MARKITDOWN".parse::<EngineKind>(), Ok(EngineKind::MarkItDown));
        assert_eq!("plain".parse::<EngineKind>(), Ok(EngineKind::PlainText));
        assert!("word".parse::<EngineKind>().is_err());
    }

    #[test]
    fn labels_are_upper_case() {
        for kind in EngineKind::ALL {
            let label = kind.label();
            assert_eq!(label, label.to_ascii_uppercase());
        }
    }
}
