//! Frontmatter: a JSON object fenced by `---` lines at the start of a document.
//!
//! ```text
//! ---
//! {
//!   "title": "lecture-01",
//!   "tags": ["import", "studium"]
//! }
//! ---
//! ```
//!
//! Splitting never fails. A block that does not parse as a JSON object is
//! still split off, but reads as an empty record, so the document never ends
//! up with two blocks.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Structured frontmatter of one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontmatterRecord {
    pub title: String,
    pub source_file: String,
    pub imported_at: String,
    pub tags: BTreeSet<String>,
    pub author: String,
    pub course: String,
    pub semester: String,
    pub topic: String,
    pub assets_dir: String,
    /// Keys this crate does not know about, kept as they were.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Field overrides applied during repair; `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontmatterOverrides {
    pub title: Option<String>,
    pub author: Option<String>,
    pub course: Option<String>,
    pub semester: Option<String>,
    pub topic: Option<String>,
}

/// Local time, ISO-8601 to the second.
pub fn now_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}

impl FrontmatterRecord {
    /// A fresh record for a newly converted document.
    pub fn new(title: impl Into<String>, source_file: impl Into<String>, tags: &[String]) -> Self {
        Self {
            title: title.into(),
            source_file: source_file.into(),
            imported_at: now_timestamp(),
            tags: tags.iter().filter(|t| !t.is_empty()).cloned().collect(),
            ..Self::default()
        }
    }

    /// Read a record from a parsed JSON object. Missing fields stay empty;
    /// `tags` may be a list or a comma-separated string.
    pub fn from_json(map: Map<String, Value>) -> Self {
        let mut record = Self::default();
        for (key, value) in map {
            let text = || match &value {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            match key.as_str() {
                "title" => record.title = text(),
                "source_file" => record.source_file = text(),
                "imported_at" => record.imported_at = text(),
                "author" => record.author = text(),
                "course" => record.course = text(),
                "semester" => record.semester = text(),
                "topic" => record.topic = text(),
                "assets_dir" => record.assets_dir = text(),
                "tags" => record.tags = parse_tags(&value),
                _ => {
                    record.extra.insert(key, value);
                }
            }
        }
        record
    }

    /// Union `tags` into the tag set; empty and whitespace-only tags are dropped.
    pub fn add_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for tag in tags {
            let tag = tag.as_ref().trim();
            if !tag.is_empty() {
                self.tags.insert(tag.to_string());
            }
        }
    }

    pub fn apply_overrides(&mut self, overrides: &FrontmatterOverrides) {
        let fields = [
            (&overrides.title, &mut self.title),
            (&overrides.author, &mut self.author),
            (&overrides.course, &mut self.course),
            (&overrides.semester, &mut self.semester),
            (&overrides.topic, &mut self.topic),
        ];
        for (value, field) in fields {
            if let Some(v) = value {
                *field = v.clone();
            }
        }
    }

    /// Serialise as a `---` fenced, pretty-printed JSON block ending in `\n`.
    pub fn compose(&self) -> String {
        let json = serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string());
        format!("---\n{}\n---\n", json)
    }
}

fn parse_tags(value: &Value) -> BTreeSet<String> {
    let raw: Vec<String> = match value {
        Value::Array(items) => items
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        Value::String(s) => s.split(',').map(str::to_string).collect(),
        _ => Vec::new(),
    };
    raw.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Split a leading `---` block off `text`.
///
/// Returns `(block, body)`. `block` includes both delimiter lines and a
/// trailing newline; it is empty when the document has no closed block.
/// Leading blank lines before the opening delimiter are tolerated.
pub fn split_frontmatter(text: &str) -> (&str, &str) {
    if !text.trim_start().starts_with("---") {
        return ("", text);
    }

    let mut offset = 0;
    let mut opened = false;
    for line in text.split_inclusive('\n') {
        let end = offset + line.len();
        let is_delim = line.trim() == "---";
        if !opened {
            if is_delim {
                opened = true;
            } else if !line.trim().is_empty() {
                return ("", text);
            }
        } else if is_delim {
            let block = &text[..end];
            let start = block.len() - block.trim_start().len();
            return (&text[start..end], &text[end..]);
        }
        offset = end;
    }
    ("", text)
}

/// Parse a split-off block. `None` when it is absent or not a JSON object.
pub fn parse_frontmatter(block: &str) -> Option<FrontmatterRecord> {
    let inner = block.trim().strip_prefix("---")?.strip_suffix("---")?.trim();
    match serde_json::from_str::<Value>(inner) {
        Ok(Value::Object(map)) => Some(FrontmatterRecord::from_json(map)),
        _ => None,
    }
}

/// Remove a leading frontmatter block, returning the body without leading newlines.
pub fn strip_frontmatter(text: &str) -> &str {
    let (block, body) = split_frontmatter(text);
    if block.is_empty() {
        text
    } else {
        body.trim_start_matches(['\n', '\r'])
    }
}
