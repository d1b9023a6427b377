//! Multi-document merge: combine finished Markdown files into one.
//!
//! Independent of the chunk pipeline. Inputs are whole documents written by
//! people or earlier conversions, so there is no page bookkeeping, only an
//! optional heading and contents entry per file.

use crate::pipeline::postprocess::collapse_blank_lines;
use crate::repair::frontmatter::strip_frontmatter;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::debug;

static RE_ANCHOR_STRIP: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9\-]+").unwrap());

/// Options for [`merge_documents`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOptions {
    /// Prefix every file with an anchor and a `##` heading named after it.
    pub use_headings: bool,
    /// Emit a `## Contents` list linking to each file's anchor.
    pub add_toc: bool,
    /// Remove a leading `---` frontmatter block from every file.
    pub drop_frontmatter: bool,
    /// Inserted between consecutive files, never after the last one.
    pub separator: String,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            use_headings: true,
            add_toc: true,
            drop_frontmatter: true,
            separator: "\n\n---\n\n".to_string(),
        }
    }
}

/// One document to merge: display name (file stem) and contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeInput {
    pub name: String,
    pub text: String,
}

impl MergeInput {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }
}

/// Anchor for a merged file: lower-case, runs outside `[a-z0-9-]` become `-`.
pub fn file_anchor(name: &str) -> String {
    RE_ANCHOR_STRIP
        .replace_all(&name.to_lowercase(), "-")
        .trim_matches('-')
        .to_string()
}

/// Merge `inputs` in the given order.
pub fn merge_documents(inputs: &[MergeInput], options: &MergeOptions) -> String {
    let mut toc = Vec::new();
    let mut parts: Vec<String> = Vec::with_capacity(inputs.len() * 3);

    for (i, input) in inputs.iter().enumerate() {
        let text = if options.drop_frontmatter {
            strip_frontmatter(&input.text)
        } else {
            input.text.as_str()
        };
        let anchor = file_anchor(&input.name);
        if options.use_headings {
            parts.push(format!("\n\n<a name=\"{}\"></a>\n## {}\n\n", anchor, input.name));
        }
        if options.add_toc {
            toc.push(format!("- [{}](#{})", input.name, anchor));
        }
        parts.push(text.trim().to_string());
        if i + 1 != inputs.len() && !options.separator.is_empty() {
            parts.push(options.separator.clone());
        }
    }

    let mut merged = String::new();
    if options.add_toc {
        merged.push_str("## Contents\n\n");
        merged.push_str(&toc.join("\n"));
        merged.push_str("\n\n");
    }
    merged.push_str(&parts.join("\n"));
    let mut merged = collapse_blank_lines(&merged);
    if !merged.ends_with('\n') {
        merged.push('\n');
    }
    merged
}

/// Read `paths`, sort them by file name (case-insensitive) and merge them.
pub fn merge_files(paths: &[PathBuf], options: &MergeOptions) -> std::io::Result<String> {
    let mut sorted: Vec<&PathBuf> = paths.iter().collect();
    sorted.sort_by_key(|p| file_name_lower(p));

    let mut inputs = Vec::with_capacity(sorted.len());
    for path in sorted {
        let bytes = std::fs::read(path)?;
        debug!("Merging {} ({} bytes)", path.display(), bytes.len());
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        inputs.push(MergeInput::new(name, String::from_utf8_lossy(&bytes)));
    }
    Ok(merge_documents(&inputs, options))
}

fn file_name_lower(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}
