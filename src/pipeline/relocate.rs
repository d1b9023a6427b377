//! Asset relocation: gather every chunk's images into one `assets/` directory.
//!
//! Each chunk gets the prefix `c<NN>_`, so `figure.png` from chunk 3 becomes
//! `assets/c03_figure.png` and the chunk's Markdown is rewritten to
//! `![..](./assets/c03_figure.png)`. Name collisions are detected before
//! copying: an identical file already in place is reused, anything else gets
//! a `_<k>` suffix before the extension. A name that already carries the
//! chunk prefix is not prefixed again, so relocating twice is harmless.

use crate::error::Doc2MdError;
use crate::pipeline::chunker::PageRange;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Name of the shared asset directory next to the output document.
pub const ASSETS_DIR: &str = "assets";

const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "webp", "gif", "svg", "tif", "tiff", "bmp", "heic", "avif",
];

static RE_IMAGE_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[(.*?)\]\(([^)\s]+)\)").unwrap());

/// Disambiguation prefix for chunk `index` (1-based).
pub fn chunk_prefix(index: usize) -> String {
    format!("c{:02}_", index)
}

/// True for image links that must never be rewritten.
pub fn is_external_target(href: &str) -> bool {
    let lower = href.to_ascii_lowercase();
    lower.starts_with("http://")
        || lower.starts_with("https://")
        || lower.starts_with("data:")
        || href.starts_with('#')
}

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .map(|e| {
            let e = e.to_string_lossy().to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}

/// Diagnostic line for one relocated chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocationReport {
    pub chunk: usize,
    pub range: Option<PageRange>,
    pub found: usize,
    pub copied: usize,
    pub source: PathBuf,
}

impl fmt::Display for RelocationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.range {
            Some(range) => write!(f, "[assets] chunk {:02} {}", self.chunk, range)?,
            None => write!(f, "[assets] document")?,
        }
        write!(
            f,
            ": found={}, copied={}, source='{}'",
            self.found,
            self.copied,
            self.source.display()
        )
    }
}

fn prefixed(prefix: &str, name: &str) -> String {
    if prefix.is_empty() || name.starts_with(prefix) {
        name.to_string()
    } else {
        format!("{}{}", prefix, name)
    }
}

fn with_suffix(name: &str, k: usize) -> String {
    match name.rfind('.') {
        Some(dot) if dot > 0 => format!("{}_{}{}", &name[..dot], k, &name[dot..]),
        _ => format!("{}_{}", name, k),
    }
}

fn same_contents(a: &Path, b: &Path) -> bool {
    match (std::fs::metadata(a), std::fs::metadata(b)) {
        (Ok(ma), Ok(mb)) if ma.len() == mb.len() => {
            matches!((std::fs::read(a), std::fs::read(b)), (Ok(x), Ok(y)) if x == y)
        }
        _ => false,
    }
}

/// Copy one image into `dest_dir`, returning the file name it ended up under.
fn place_image(src: &Path, dest_dir: &Path, wanted: &str) -> Option<String> {
    let mut k = 0;
    loop {
        let name = if k == 0 { wanted.to_string() } else { with_suffix(wanted, k) };
        let target = dest_dir.join(&name);
        if target.exists() {
            if same_contents(src, &target) {
                return Some(name);
            }
        } else {
            match std::fs::copy(src, &target) {
                Ok(_) => return Some(name),
                Err(e) if k < 100 => {
                    debug!("Copy {} → {} failed: {}", src.display(), target.display(), e);
                }
                Err(e) => {
                    warn!("Giving up on {}: {}", src.display(), e);
                    return None;
                }
            }
        }
        k += 1;
        if k > 100 {
            warn!("No free name for {} in {}", wanted, dest_dir.display());
            return None;
        }
    }
}

/// Copy the images below `source_dir` into `dest_dir` and rewrite `markdown`.
///
/// Returns the rewritten text plus `(found, copied)`. A missing `source_dir`
/// yields zero images. Fails only when `dest_dir` cannot be created.
pub fn relocate_assets(
    markdown: &str,
    source_dir: &Path,
    dest_dir: &Path,
    prefix: &str,
) -> Result<(String, usize, usize), Doc2MdError> {
    std::fs::create_dir_all(dest_dir).map_err(|e| Doc2MdError::RelocationFailed {
        path: dest_dir.to_path_buf(),
        source: e,
    })?;

    let mut found = 0;
    let mut copied = 0;
    let mut renamed: HashMap<String, String> = HashMap::new();
    let same_dir = source_dir
        .canonicalize()
        .ok()
        .zip(dest_dir.canonicalize().ok())
        .map(|(a, b)| a == b)
        .unwrap_or(false);

    if source_dir.is_dir() && !same_dir {
        for entry in WalkDir::new(source_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file() && is_image_file(e.path()))
        {
            found += 1;
            let original = entry.file_name().to_string_lossy().into_owned();
            if let Some(name) = place_image(entry.path(), dest_dir, &prefixed(prefix, &original)) {
                copied += 1;
                renamed.entry(original).or_insert(name);
            }
        }
    }

    let text = rewrite_image_links(markdown, |basename| {
        renamed
            .get(basename)
            .cloned()
            .unwrap_or_else(|| prefixed(prefix, basename))
    });
    Ok((text, found, copied))
}

/// Rewrite local image targets to `./assets/<name(basename)>`.
pub fn rewrite_image_links<F>(markdown: &str, name: F) -> String
where
    F: Fn(&str) -> String,
{
    RE_IMAGE_LINK
        .replace_all(markdown, |caps: &Captures| {
            let alt = &caps[1];
            let href = &caps[2];
            if is_external_target(href) {
                return caps[0].to_string();
            }
            let basename = href.rsplit(['/', '\\']).next().unwrap_or(href);
            format!("![{}](./{}/{})", alt, ASSETS_DIR, name(basename))
        })
        .into_owned()
}

/// Relocate the images of chunk `index` and return the report for it.
pub fn relocate_chunk(
    markdown: &str,
    index: usize,
    range: PageRange,
    source_dir: &Path,
    dest_dir: &Path,
) -> Result<(String, RelocationReport), Doc2MdError> {
    let (text, found, copied) = relocate_assets(markdown, source_dir, dest_dir, &chunk_prefix(index))?;
    Ok((
        text,
        RelocationReport {
            chunk: index,
            range: Some(range),
            found,
            copied,
            source: source_dir.to_path_buf(),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path, bytes: &[u8]) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, bytes).unwrap();
    }

    #[test]
    fn prefix_is_two_digits() {
        assert_eq!(chunk_prefix(3), "c03_");
        assert_eq!(chunk_prefix(12), "c12_");
    }

    #[test]
    fn rewrite_skips_external_targets() {
        let md = "![fig](assets/x.png) ![ext](https://example.com/a.png) \
                  ![d](data:image/png;base64,AAA) ![a](#top)";
        let out = rewrite_image_links(md, |b| prefixed("c03_", b));
        assert!(out.contains("![fig](./assets/c03_x.png)"));
        assert!(out.contains("![ext](https://example.com/a.png)"));
        assert!(out.contains("![d](data:image/png;base64,AAA)"));
        assert!(out.contains("![a](#top)"));
    }

    #[test]
    fn copies_recursively_with_prefix() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("chunk");
        touch(&src.join("assets/x.png"), b"png");
        touch(&src.join("deep/nested/y.JPG"), b"jpg");
        touch(&src.join("doc.md"), b"# not an image");
        let dest = tmp.path().join("out/assets");
        let range = PageRange::new(41, 50).unwrap();

        let (text, report) =
            relocate_chunk("![fig](assets/x.png)", 3, range, &src, &dest).unwrap();
        assert_eq!(text, "![fig](./assets/c03_x.png)");
        assert_eq!((report.found, report.copied), (2, 2));
        assert!(dest.join("c03_x.png").exists());
        assert!(dest.join("c03_y.JPG").exists());
        assert!(report.to_string().starts_with("[assets] chunk 03 41-50: found=2, copied=2"));
    }

    #[test]
    fn collision_gets_suffix() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("chunk");
        touch(&src.join("a/fig.png"), b"first");
        touch(&src.join("b/fig.png"), b"second");
        let dest = tmp.path().join("assets");

        let (_, found, copied) = relocate_assets("", &src, &dest, "c01_").unwrap();
        assert_eq!((found, copied), (2, 2));
        assert_eq!(std::fs::read(dest.join("c01_fig.png")).unwrap(), b"first");
        assert_eq!(std::fs::read(dest.join("c01_fig_1.png")).unwrap(), b"second");
    }

    #[test]
    fn second_pass_does_not_double_prefix() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("chunk");
        touch(&src.join("x.png"), b"img");
        let dest = tmp.path().join("assets");
        let range = PageRange::new(1, 20).unwrap();

        let (once, _) = relocate_chunk("![f](x.png)", 1, range, &src, &dest).unwrap();
        let (twice, report) = relocate_chunk(&once, 1, range, &dest, &dest).unwrap();
        assert_eq!(once, "![f](./assets/c01_x.png)");
        assert_eq!(twice, once);
        assert!(!twice.contains("c01_c01_"));
        assert_eq!(report.copied, 0);

        // Re-running against the original source reuses the identical file.
        let (again, report) = relocate_chunk("![f](x.png)", 1, range, &src, &dest).unwrap();
        assert_eq!(again, once);
        assert_eq!(report.copied, 1);
        assert!(!dest.join("c01_x_1.png").exists());
    }

    #[test]
    fn missing_source_dir_reports_zero() {
        let tmp = tempfile::tempdir().unwrap();
        let (text, found, copied) =
            relocate_assets("![a](b.png)", &tmp.path().join("nope"), &tmp.path().join("assets"), "c02_")
                .unwrap();
        assert_eq!((found, copied), (0, 0));
        assert_eq!(text, "![a](./assets/c02_b.png)");
    }

    #[test]
    fn unusable_destination_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("assets");
        std::fs::write(&blocker, "file, not dir").unwrap();
        let err = relocate_assets("", tmp.path(), &blocker.join("sub"), "c01_").unwrap_err();
        assert!(matches!(err, Doc2MdError::RelocationFailed { .. }));
    }
}
