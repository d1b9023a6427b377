//! Markdown repair: structural normalisation of one document.
//!
//! ```text
//! split frontmatter ─▶ partition code/prose ─▶ headings, lists, quotes (prose only)
//!   ─▶ balance fences ─▶ regenerate TOC ─▶ optional cleanups
//!   ─▶ reconcile frontmatter ─▶ asset-link validation comment
//! ```
//!
//! [`repair`] never fails. Steps that find nothing to do leave the text as
//! it was, and frontmatter that cannot be parsed is replaced by a fresh
//! record instead of aborting.

pub mod frontmatter;
pub mod rules;
pub mod spans;

use crate::pipeline::postprocess::{collapse_blank_lines, fix_table_separators, relativize_image_links};
use frontmatter::{parse_frontmatter, split_frontmatter, FrontmatterOverrides, FrontmatterRecord};
use std::path::{Path, PathBuf};
use tracing::debug;

pub use frontmatter::now_timestamp;
pub use rules::AssetValidation;

/// Options for [`repair`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairOptions {
    /// Tags merged into the frontmatter tag set.
    pub extra_tags: Vec<String>,
    pub overrides: FrontmatterOverrides,
    /// Written to `assets_dir` in the frontmatter and used for link validation.
    pub assets_dir: Option<PathBuf>,
    /// Straight double quotes → „…“. Default: true.
    pub apply_quotes: bool,
    /// Rebuild a `<!-- TOC -->` … `<!-- /TOC -->` region. Default: true.
    pub regen_toc: bool,
    /// Point local image links at `./assets/`. Default: false.
    pub relativize_images: bool,
    /// Collapse runs of blank lines. Default: false.
    pub collapse_blank_lines: bool,
    /// Insert missing table separator rows. Default: false.
    pub fix_tables: bool,
}

impl Default for RepairOptions {
    fn default() -> Self {
        Self {
            extra_tags: Vec::new(),
            overrides: FrontmatterOverrides::default(),
            assets_dir: None,
            apply_quotes: true,
            regen_toc: true,
            relativize_images: false,
            collapse_blank_lines: false,
            fix_tables: false,
        }
    }
}

/// Repaired text plus what the validation pass found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairOutcome {
    pub text: String,
    pub frontmatter: FrontmatterRecord,
    pub validation: AssetValidation,
    /// True when an existing block could not be parsed and was replaced.
    pub replaced_malformed_frontmatter: bool,
}

/// Repair `text` and return the reassembled document.
pub fn repair(text: &str, options: &RepairOptions) -> String {
    repair_with_report(text, options).text
}

/// Like [`repair`], but also reports the frontmatter and validation counts.
pub fn repair_with_report(text: &str, options: &RepairOptions) -> RepairOutcome {
    // 1. Frontmatter
    let (block, body) = split_frontmatter(text);
    let parsed = parse_frontmatter(block);
    let replaced_malformed_frontmatter = !block.is_empty() && parsed.is_none();
    if replaced_malformed_frontmatter {
        debug!("Frontmatter is not a JSON object; starting from an empty record");
    }
    let mut record = parsed.unwrap_or_default();

    // 2-3. Prose-only transforms
    let mut body = spans::map_prose(body, |prose| {
        let p = rules::normalize_headings(prose);
        let p = rules::normalize_lists(&p);
        if options.apply_quotes {
            rules::typographic_quotes(&p)
        } else {
            p
        }
    });

    // 4. Fences
    body = rules::close_unbalanced_fences(&body);

    // 5. TOC
    if options.regen_toc {
        body = rules::regenerate_toc(&body);
    }

    if options.relativize_images || options.fix_tables {
        body = spans::map_prose(&body, |prose| {
            let mut p = prose.to_string();
            if options.relativize_images {
                p = relativize_image_links(&p);
            }
            if options.fix_tables {
                p = fix_table_separators(&p);
            }
            p
        });
    }
    if options.collapse_blank_lines {
        body = collapse_blank_lines(&body);
    }

    // 6. Frontmatter reconciliation
    if record.imported_at.is_empty() {
        record.imported_at = now_timestamp();
    }
    record.add_tags(&options.extra_tags);
    record.apply_overrides(&options.overrides);
    if let Some(ref dir) = options.assets_dir {
        record.assets_dir = dir.to_string_lossy().into_owned();
    }

    // 7. Asset validation
    let assets_dir = (!record.assets_dir.is_empty()).then(|| PathBuf::from(&record.assets_dir));
    let (body, validation) = rules::validate_asset_links(&body, assets_dir.as_deref());

    let text = format!("{}\n{}", record.compose(), body.trim_start_matches('\n'));
    RepairOutcome {
        text,
        frontmatter: record,
        validation,
        replaced_malformed_frontmatter,
    }
}

/// Read, repair and return a file's contents.
pub fn repair_file(path: &Path, options: &RepairOptions) -> std::io::Result<RepairOutcome> {
    let bytes = std::fs::read(path)?;
    Ok(repair_with_report(&String::from_utf8_lossy(&bytes), options))
}
