//! Path helpers shared by the engine and extensions.
//!
//! Docnames and URIs are always `/`-separated regardless of platform.

use std::path::{Component, Path, PathBuf};

/// Compute the relative URI from document `from` to target `to`.
///
/// The last segment of `from` is the document itself and is dropped to get
/// its directory, so `subdir/index.html` → `_images` gives `../_images`.
#[must_use]
pub fn relative_uri(from: &str, to: &str) -> String {
    let from_segs: Vec<&str> = from.split('/').filter(|s| !s.is_empty()).collect();
    let to_segs: Vec<&str> = to.split('/').filter(|s| !s.is_empty()).collect();

    let from_dir = if from.ends_with('/') || from_segs.is_empty() {
        &from_segs[..]
    } else {
        &from_segs[..from_segs.len() - 1]
    };

    let common = from_dir
        .iter()
        .zip(&to_segs)
        .take_while(|(a, b)| a == b)
        .count();

    let ups = "../".repeat(from_dir.len() - common);
    format!("{ups}{}", to_segs[common..].join("/"))
}

/// Join two `/`-separated paths; an empty `base` yields `name` unchanged.
#[must_use]
pub fn posix_join(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_owned()
    } else if base.ends_with('/') {
        format!("{base}{name}")
    } else {
        format!("{base}/{name}")
    }
}

/// Whether `uri` points at a remote resource rather than a source file.
#[must_use]
pub fn is_url(uri: &str) -> bool {
    uri.contains("://")
}

/// Resolve `.` and `..` segments of a `/`-separated relative path.
///
/// `..` above the root is kept, so the result still names the same file;
/// see [`escapes_root`].
#[must_use]
pub fn normalize_posix(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Whether a path from [`normalize_posix`] leaves the directory it is
/// relative to.
#[must_use]
pub fn escapes_root(path: &str) -> bool {
    path == ".." || path.starts_with("../")
}

/// Directory part of a `/`-separated path, empty for top-level names.
#[must_use]
pub fn posix_dirname(path: &str) -> &str {
    path.rfind('/').map_or("", |idx| &path[..idx])
}

/// Lexically normalize a filesystem path without touching the disk.
#[must_use]
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Escape text for HTML content and attribute values.
#[must_use]
pub fn escape_html(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#x27;"),
            _ => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_uri_to_image_dir() {
        assert_eq!(relative_uri("index.html", "_images"), "_images");
        assert_eq!(relative_uri("subdir/index.html", "_images"), "../_images");
        assert_eq!(relative_uri("a/b/c.html", "_images"), "../../_images");
        assert_eq!(relative_uri("a/b.html", "a/c.html"), "c.html");
    }

    #[test]
    fn test_posix_join() {
        assert_eq!(posix_join("", "a.png"), "a.png");
        assert_eq!(posix_join("_images", "a.png"), "_images/a.png");
        assert_eq!(posix_join("../_images/", "a.png"), "../_images/a.png");
    }

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/a.dot"));
        assert!(!is_url("diagrams/a.dot"));
        assert!(!is_url("mailto:x"));
    }

    #[test]
    fn test_normalize_posix() {
        assert_eq!(normalize_posix("guide/./img/../a.dot"), "guide/a.dot");
        assert_eq!(normalize_posix("../a.dot"), "../a.dot");
        assert_eq!(normalize_posix("a/../../b/../../c.dot"), "../../c.dot");
        assert_eq!(normalize_posix("/abs/a.dot"), "abs/a.dot");
    }

    #[test]
    fn test_escapes_root() {
        assert!(escapes_root("../a.dot"));
        assert!(escapes_root(".."));
        assert!(!escapes_root("..a.dot"));
        assert!(!escapes_root("img/a.dot"));
    }

    #[test]
    fn test_posix_dirname() {
        assert_eq!(posix_dirname("guide/index"), "guide");
        assert_eq!(posix_dirname("index"), "");
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path(Path::new("/src/guide/../img/./a.dot")),
            PathBuf::from("/src/img/a.dot")
        );
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&#x27;&amp;&#x27;&lt;/a&gt;"
        );
    }
}
