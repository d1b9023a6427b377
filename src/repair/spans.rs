//! Code/prose partitioning of a Markdown body.
//!
//! A fence line is any line whose trimmed start is three backticks. The
//! opening fence, the fenced lines and the closing fence form one code span;
//! everything else is prose. An unclosed fence runs to the end of the text.
//! Spans borrow from the input and concatenate back to it byte for byte.

use std::borrow::Cow;

/// A contiguous run of lines that is either fenced code or prose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span<'a> {
    pub is_code: bool,
    pub text: Cow<'a, str>,
}

/// True for a line that opens or closes a fenced code block.
pub fn is_fence(line: &str) -> bool {
    line.trim_start().starts_with("```")
}

/// Number of fence lines in `text`.
pub fn count_fences(text: &str) -> usize {
    text.lines().filter(|l| is_fence(l)).count()
}

/// Partition `text` into alternating prose and code spans.
pub fn partition(text: &str) -> Vec<Span<'_>> {
    let mut spans = Vec::new();
    let mut start = 0;
    let mut pos = 0;
    let mut in_code = false;

    for line in text.split_inclusive('\n') {
        if is_fence(line) {
            if in_code {
                // Closing fence belongs to the code span.
                let end = pos + line.len();
                spans.push(Span {
                    is_code: true,
                    text: Cow::Borrowed(&text[start..end]),
                });
                start = end;
                in_code = false;
            } else {
                if pos > start {
                    spans.push(Span {
                        is_code: false,
                        text: Cow::Borrowed(&text[start..pos]),
                    });
                }
                start = pos;
                in_code = true;
            }
        }
        pos += line.len();
    }
    if start < text.len() {
        spans.push(Span {
            is_code: in_code,
            text: Cow::Borrowed(&text[start..]),
        });
    }
    spans
}

/// Concatenate spans back into one string.
pub fn join(spans: &[Span<'_>]) -> String {
    spans.iter().map(|s| s.text.as_ref()).collect()
}

/// Apply `f` to every prose span, leaving code spans untouched.
pub fn map_prose<F>(text: &str, mut f: F) -> String
where
    F: FnMut(&str) -> String,
{
    partition(text)
        .into_iter()
        .map(|span| {
            if span.is_code {
                span.text.into_owned()
            } else {
                f(&span.text)
            }
        })
        .collect()
}

/// Apply `f` to each line of `text` (without its line ending), keeping the
/// original `\n` / `\r\n` endings.
pub fn map_lines<F>(text: &str, mut f: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    let mut out = String::with_capacity(text.len());
    for raw in text.split_inclusive('\n') {
        let (line, ending) = if let Some(l) = raw.strip_suffix("\r\n") {
            (l, "\r\n")
        } else if let Some(l) = raw.strip_suffix('\n') {
            (l, "\n")
        } else {
            (raw, "")
        };
        match f(line) {
            Some(replaced) => out.push_str(&replaced),
            None => out.push_str(line),
        }
        out.push_str(ending);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn fenced_block_is_one_span() {
        let text = "intro\n```rust\n# not a heading\n```\noutro\n";
        let spans = partition(text);
        assert_eq!(spans.len(), 3);
        assert!(!spans[0].is_code);
        assert!(spans[1].is_code);
        assert_eq!(spans[1].text, "```rust\n# not a heading\n```\n");
        assert_eq!(spans[2].text, "outro\n");
    }

    #[test]
    fn unclosed_fence_runs_to_end() {
        let spans = partition("a\n```\ncode");
        assert_eq!(spans.len(), 2);
        assert!(spans[1].is_code);
        assert_eq!(count_fences("a\n```\ncode"), 1);
    }

    #[test]
    fn map_prose_skips_code() {
        let out = map_prose("x\n```\nx\n```\nx", |s| s.replace('x', "y"));
        assert_eq!(out, "y\n```\nx\n```\ny");
    }

    #[test]
    fn map_lines_keeps_endings() {
        let out = map_lines("a\r\nb\nc", |l| (l == "b").then(|| "B".to_string()));
        assert_eq!(out, "a\r\nB\nc");
    }

    proptest! {
        #[test]
        fn partition_round_trips(
            lines in proptest::collection::vec(
                prop_oneof![
                    Just("```".to_string()),
                    Just("  ```python".to_string()),
                    Just(String::new()),
                    "[a-z #*-]{0,12}",
                ],
                0..40,
            ),
            trailing in any::<bool>(),
        ) {
            let mut text = lines.join("\n");
            if trailing {
                text.push('\n');
            }
            let spans = partition(&text);
            prop_assert_eq!(join(&spans), text);
        }
    }
}
