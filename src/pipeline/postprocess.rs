//! Post-processing: deterministic cleanup of engine-generated Markdown.
//!
//! Engines leave artefacts that are harmless to them but noisy in a vault:
//! Windows line endings, zero-width characters, page numbers extracted as
//! paragraphs, image links pointing into the engine's private output tree.
//! Each rule here is a pure `&str → String` function and independently
//! testable. Rules that look at content skip fenced code.
//!
//! ## Rule Order
//!
//! Line endings are normalised first so every later rule sees `\n` only.
//! Image links are relativised before lines are trimmed, and blank-line
//! collapsing runs after footer removal so removed lines leave no gaps.

use crate::pipeline::relocate::{is_external_target, ASSETS_DIR};
use crate::repair::spans;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Apply all post-processing rules to converted Markdown.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF → LF)
/// 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens, …)
/// 3. Point local image links at `./assets/`
/// 4. Drop page-number footer lines (`12`, `Page 3`, `Seite 3 von 9`)
/// 5. Collapse runs of spaces on table lines
/// 6. Trim trailing whitespace per line
/// 7. Collapse 3+ consecutive newlines to one blank line
/// 8. Ensure the file ends with exactly one newline
pub fn clean_markdown(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = spans::map_prose(&s, |prose| {
        let p = relativize_image_links(prose);
        let p = remove_page_footers(&p);
        collapse_table_spaces(&p)
    });
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    ensure_final_newline(&s)
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 3: Relativise image links ───────────────────────────────────────────

static RE_LOCAL_IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[(.*?)\]\((?:\./)?(?:assets/)?([^)\s]+)\)").unwrap());

/// Rewrite `![alt](x.png)`, `![alt](assets/x.png)` and `![alt](./assets/x.png)`
/// to `![alt](./assets/x.png)`. Absolute URLs, data URIs and anchors are kept;
/// absolute file paths keep only their file name.
pub fn relativize_image_links(input: &str) -> String {
    RE_LOCAL_IMAGE
        .replace_all(input, |caps: &Captures| {
            let target = &caps[2];
            if is_external_target(target) {
                return caps[0].to_string();
            }
            let target = if target.starts_with('/') || target.contains(":\\") {
                target.rsplit(['/', '\\']).next().unwrap_or(target)
            } else {
                target
            };
            format!("![{}](./{}/{})", &caps[1], ASSETS_DIR, target)
        })
        .into_owned()
}

// ── Rule 4: Remove page-number footers ───────────────────────────────────────

static RE_PAGE_FOOTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:\d{1,4}|(?:seite|page)\s+\d+(?:\s+(?:von|of)\s+\d+)?)$").unwrap()
});

/// True for a line that is nothing but a page number.
pub fn looks_like_footer(line: &str) -> bool {
    RE_PAGE_FOOTER.is_match(line.trim())
}

fn remove_page_footers(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for line in input.split_inclusive('\n') {
        if !looks_like_footer(line) {
            out.push_str(line);
        }
    }
    out
}

// ── Rule 5: Collapse spaces on table lines ───────────────────────────────────

static RE_MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}").unwrap());

fn collapse_table_spaces(input: &str) -> String {
    spans::map_lines(input, |line| {
        let indent = line.len() - line.trim_start().len();
        (line.contains('|') && RE_MULTI_SPACE.is_match(&line[indent..])).then(|| {
            format!("{}{}", &line[..indent], RE_MULTI_SPACE.replace_all(&line[indent..], " "))
        })
    })
}

// ── Rule 6: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 7: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n(?:[ \t]*\n){2,}").unwrap());

/// Any run of two or more blank lines becomes exactly one blank line.
pub fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_RUN.replace_all(input, "\n\n").into_owned()
}

// ── Rule 8: Ensure file ends with single newline ─────────────────────────────

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end();
    if trimmed.is_empty() {
        String::from("\n")
    } else {
        format!("{}\n", trimmed)
    }
}

// ── Table separator repair (used by the repair pipeline) ─────────────────────

fn is_table_row(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with('|') && trimmed.ends_with('|') && trimmed.len() > 2
}

fn is_separator_row(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with('|')
        && trimmed.contains('-')
        && trimmed
            .chars()
            .all(|c| c == '|' || c == '-' || c == ':' || c == ' ')
}

/// Insert a GFM separator row after a table's header row when it is missing.
pub fn fix_table_separators(input: &str) -> String {
    let lines: Vec<&str> = input.split_inclusive('\n').collect();
    let mut out = String::with_capacity(input.len() + 32);
    let mut prev_is_row = false;

    for (i, line) in lines.iter().enumerate() {
        out.push_str(line);
        let starts_table = is_table_row(line) && !prev_is_row && !is_separator_row(line);
        prev_is_row = is_table_row(line);
        if !starts_table {
            continue;
        }
        let next = lines.get(i + 1).copied().unwrap_or("");
        if is_table_row(next) && !is_separator_row(next) {
            let cols = line.trim().matches('|').count().saturating_sub(1).max(1);
            if !line.ends_with('\n') {
                out.push('\n');
            }
            out.push('|');
            out.push_str(&" --- |".repeat(cols));
            out.push('\n');
        }
    }
    out
}

// ── Tests ────────────────────────────────────────────────────────────────────
