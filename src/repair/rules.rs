//! Individual repair rules.
//!
//! The prose rules (headings, lists, quotes) expect a prose span and work
//! line by line; lines they do not recognise are left byte-identical.

use super::spans::{self, count_fences, is_fence};
use crate::pipeline::relocate::is_external_target;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

static RE_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(#{1,6})\s+(.*)$").unwrap());
static RE_LIST_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([ \t]*)([-*+]|[0-9]+\.)[ \t]+(.*)$").unwrap());
static RE_STRAIGHT_QUOTES: Lazy<Regex> = Lazy::new(|| Regex::new(r#""([^"]{1,80})""#).unwrap());
static RE_HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"</?[A-Za-z!][^<>]*>").unwrap());
static RE_SLUG_STRIP: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s-]").unwrap());
static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static RE_IMAGE_TARGET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[[^\]]*\]\(\s*<?([^)\s>]+)>?(?:\s+[^)]*)?\)").unwrap());
static RE_VALIDATION_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*<!-- validation: assets[^>]*-->\s*$").unwrap());

pub const TOC_START: &str = "<!-- TOC -->";
pub const TOC_END: &str = "<!-- /TOC -->";

// ── Headings ─────────────────────────────────────────────────────────────

/// Clamp each heading to at most one level deeper than the previous heading.
///
/// The first heading keeps its level. Levels stay within `1..=6`.
pub fn normalize_headings(text: &str) -> String {
    let mut last: Option<usize> = None;
    spans::map_lines(text, |line| {
        let caps = RE_HEADING.captures(line)?;
        let mut level = caps[1].len();
        if let Some(prev) = last {
            level = level.min(prev + 1);
        }
        let level = level.clamp(1, 6);
        last = Some(level);
        Some(format!("{} {}", "#".repeat(level), caps[2].trim()))
    })
}

// ── Lists ────────────────────────────────────────────────────────────────

/// `*`/`+` bullets become `-`, numbers are kept, indentation is floored to
/// an even number of spaces (a tab counts as two).
pub fn normalize_lists(text: &str) -> String {
    spans::map_lines(text, |line| {
        let caps = RE_LIST_ITEM.captures(line)?;
        let width: usize = caps[1].chars().map(|c| if c == '\t' { 2 } else { 1 }).sum();
        let marker = match &caps[2] {
            m if m.ends_with('.') => m,
            _ => "-",
        };
        Some(format!(
            "{}{} {}",
            " ".repeat(width / 2 * 2),
            marker,
            caps[3].trim()
        ))
    })
}

// ── Quotes ───────────────────────────────────────────────────────────────

/// `"phrase"` → `„phrase“` on lines without a backtick.
///
/// Text inside HTML tags is left alone so attribute values such as
/// `<a name="…">` keep their straight quotes.
pub fn typographic_quotes(text: &str) -> String {
    spans::map_lines(text, |line| {
        if line.contains('`') || !line.contains('"') {
            return None;
        }
        let mut out = String::with_capacity(line.len());
        let mut last = 0;
        for tag in RE_HTML_TAG.find_iter(line) {
            out.push_str(&RE_STRAIGHT_QUOTES.replace_all(&line[last..tag.start()], "„$1“"));
            out.push_str(tag.as_str());
            last = tag.end();
        }
        out.push_str(&RE_STRAIGHT_QUOTES.replace_all(&line[last..], "„$1“"));
        Some(out)
    })
}

// ── Code fences ──────────────────────────────────────────────────────────

/// Append a closing fence when the number of fence lines is odd.
pub fn close_unbalanced_fences(text: &str) -> String {
    if count_fences(text) % 2 == 1 {
        format!("{}\n```\n", text.trim_end())
    } else {
        text.to_string()
    }
}

// ── TOC ──────────────────────────────────────────────────────────────────

/// Anchor slug: lower-case, drop everything but word characters, whitespace
/// and hyphens, then turn whitespace runs into single hyphens.
pub fn slug(title: &str) -> String {
    let lower = title.trim().to_lowercase();
    let stripped = RE_SLUG_STRIP.replace_all(&lower, "");
    RE_WHITESPACE.replace_all(&stripped, "-").into_owned()
}

/// Replace the region between `<!-- TOC -->` and `<!-- /TOC -->` with a list
/// of every heading after the end marker. Without both markers, in that
/// order, the text is returned unchanged.
pub fn regenerate_toc(text: &str) -> String {
    let Some(start) = text.find(TOC_START) else {
        return text.to_string();
    };
    let Some(end) = text[start..].find(TOC_END).map(|i| start + i) else {
        return text.to_string();
    };
    let after = &text[end + TOC_END.len()..];

    let mut items = Vec::new();
    for span in spans::partition(after).iter().filter(|s| !s.is_code) {
        for line in span.text.lines() {
            if is_fence(line) {
                continue;
            }
            if let Some(caps) = RE_HEADING.captures(line) {
                let title = caps[2].trim();
                let indent = "  ".repeat(caps[1].len() - 1);
                items.push(format!("{}- [{}](#{})", indent, title, slug(title)));
            }
        }
    }

    let mut out = String::with_capacity(text.len() + 64);
    out.push_str(&text[..start]);
    out.push_str(TOC_START);
    out.push('\n');
    for item in &items {
        out.push_str(item);
        out.push('\n');
    }
    out.push_str(TOC_END);
    out.push_str(after);
    out
}

// ── Asset validation ─────────────────────────────────────────────────────

/// Counts from one validation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssetValidation {
    pub ok: usize,
    pub missing: usize,
    pub unknown: usize,
}

/// Check local image links against `assets_dir` by basename and append one
/// `<!-- validation: assets | … -->` comment, replacing an earlier one.
///
/// Links are `UNKNOWN` when no existing assets directory is given.
pub fn validate_asset_links(text: &str, assets_dir: Option<&Path>) -> (String, AssetValidation) {
    let body = RE_VALIDATION_COMMENT.replace(text, "");
    let dir = assets_dir.filter(|d| d.is_dir());

    let mut counts = AssetValidation::default();
    let mut entries = vec!["validation: assets".to_string()];
    for caps in RE_IMAGE_TARGET.captures_iter(&body) {
        let href = caps[1].trim();
        if is_external_target(href) {
            continue;
        }
        let basename = href.rsplit(['/', '\\']).next().unwrap_or(href);
        match dir {
            Some(dir) if dir.join(basename).exists() => {
                counts.ok += 1;
                entries.push(format!("OK {}", href));
            }
            Some(_) => {
                counts.missing += 1;
                entries.push(format!("MISSING {}", href));
            }
            None => {
                counts.unknown += 1;
                entries.push(format!("UNKNOWN {} (assets_dir not provided)", href));
            }
        }
    }
    entries.push(format!(
        "SUMMARY ok={} missing={} unknown={}",
        counts.ok, counts.missing, counts.unknown
    ));

    let out = format!("{}\n\n<!-- {} -->\n", body.trim_end(), entries.join(" | "));
    (out, counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn levels(text: &str) -> Vec<usize> {
        text.lines()
            .filter(|l| l.starts_with('#'))
            .map(|l| l.chars().take_while(|c| *c == '#').count())
            .collect()
    }

    #[test]
    fn heading_jumps_are_clamped() {
        let out = normalize_headings("# A\n#### B\n## C\n");
        assert_eq!(levels(&out), vec![1, 2, 2]);
        assert_eq!(out, "# A\n## B\n## C\n");
    }

    #[test]
    fn headings_may_go_back_up_freely() {
        let out = normalize_headings("## A\n### B\n#### C\n# D\n### E");
        assert_eq!(levels(&out), vec![2, 3, 4, 1, 2]);
    }

    #[test]
    fn seven_hashes_are_not_a_heading() {
        let text = "####### too deep\n#hashtag\n";
        assert_eq!(normalize_headings(text), text);
    }

    #[test]
    fn lists_are_normalised() {
        let out = normalize_lists("* a\n   + b\n\t- c\n3.   d\n**bold** text\n");
        assert_eq!(out, "- a\n  - b\n  - c\n3. d\n**bold** text\n");
    }

    #[test]
    fn quotes_skip_code_lines() {
        let out = typographic_quotes("He said \"hello\".\n`\"raw\"` stays\n");
        assert_eq!(out, "He said „hello“.\n`\"raw\"` stays\n");
    }

    #[test]
    fn quotes_inside_html_tags_are_kept() {
        let line = "<a name=\"chunk-01-pages-1-20\"></a> see \"Intro\"\n";
        assert_eq!(
            typographic_quotes(line),
            "<a name=\"chunk-01-pages-1-20\"></a> see „Intro“\n"
        );
    }

    #[test]
    fn long_quotes_are_left_alone() {
        let long = format!("\"{}\"", "x".repeat(81));
        assert_eq!(typographic_quotes(&long), long);
    }

    #[test]
    fn odd_fences_get_closed_at_end() {
        assert_eq!(close_unbalanced_fences("```\ncode\n\n"), "```\ncode\n```\n");
        assert_eq!(close_unbalanced_fences("```\nx\n```\n"), "```\nx\n```\n");
    }

    #[test]
    fn slugs() {
        assert_eq!(slug("Graph Theory: Basics!"), "graph-theory-basics");
        assert_eq!(slug("  Über   Bäume "), "über-bäume");
    }

    #[test]
    fn toc_requires_both_markers() {
        let only_start = "<!-- TOC -->\nold\n# A\n";
        assert_eq!(regenerate_toc(only_start), only_start);
        let reversed = "<!-- /TOC -->\n<!-- TOC -->\n# A\n";
        assert_eq!(regenerate_toc(reversed), reversed);
    }

    #[test]
    fn toc_is_rebuilt_from_following_headings() {
        let text = "# Doc\n<!-- TOC -->\n- stale\n<!-- /TOC -->\n# One\n```\n# not me\n```\n## Two Words\n";
        let out = regenerate_toc(text);
        assert!(out.starts_with("# Doc\n<!-- TOC -->\n- [One](#one)\n  - [Two Words](#two-words)\n<!-- /TOC -->\n# One"));
        assert!(!out.contains("stale"));
        assert!(!out.contains("[not me]"));
    }

    #[test]
    fn validation_without_dir_is_unknown() {
        let (out, counts) =
            validate_asset_links("![a](./assets/a.png) ![b](https://x.org/b.png)", None);
        assert_eq!(counts, AssetValidation { ok: 0, missing: 0, unknown: 1 });
        assert!(out.ends_with(
            "<!-- validation: assets | UNKNOWN ./assets/a.png (assets_dir not provided) | SUMMARY ok=0 missing=0 unknown=1 -->\n"
        ));
    }

    #[test]
    fn validation_checks_files_and_replaces_old_comment() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.png"), b"x").unwrap();
        let text = "![a](./assets/a.png)\n![b](./assets/b.png)\n";
        let (once, counts) = validate_asset_links(text, Some(dir.path()));
        assert_eq!(counts, AssetValidation { ok: 1, missing: 1, unknown: 0 });
        let (twice, _) = validate_asset_links(&once, Some(dir.path()));
        assert_eq!(once, twice);
        assert_eq!(twice.matches("<!-- validation").count(), 1);
    }

    #[test]
    fn validation_ignores_link_titles() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("x.png"), b"x").unwrap();
        let (out, counts) =
            validate_asset_links("![a](./assets/x.png \"Figure 1\")\n", Some(dir.path()));
        assert_eq!(counts, AssetValidation { ok: 1, missing: 0, unknown: 0 });
        assert!(out.contains("OK ./assets/x.png | SUMMARY"));
    }
}
