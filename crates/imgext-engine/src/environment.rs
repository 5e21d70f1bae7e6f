//! Build environment: source layout and per-document dependencies.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::util::{normalize_posix, posix_dirname, posix_join};

/// Default suffix of source documents.
pub const DEFAULT_SOURCE_SUFFIX: &str = ".txt";

/// Source tree and the files each document depends on.
#[derive(Debug, Clone)]
pub struct BuildEnvironment {
    srcdir: PathBuf,
    source_suffix: String,
    dependencies: BTreeMap<String, BTreeSet<String>>,
}

impl BuildEnvironment {
    #[must_use]
    pub fn new(srcdir: PathBuf) -> Self {
        Self {
            srcdir,
            source_suffix: DEFAULT_SOURCE_SUFFIX.to_owned(),
            dependencies: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_source_suffix(mut self, suffix: &str) -> Self {
        self.source_suffix = suffix.to_owned();
        self
    }

    #[must_use]
    pub fn srcdir(&self) -> &Path {
        &self.srcdir
    }

    #[must_use]
    pub fn source_suffix(&self) -> &str {
        &self.source_suffix
    }

    /// Absolute source path of `docname`.
    #[must_use]
    pub fn doc2path(&self, docname: &str) -> PathBuf {
        self.srcdir.join(format!("{docname}{}", self.source_suffix))
    }

    /// Resolve `filename` as referenced from `docname`.
    ///
    /// Returns the path relative to the source root (`/`-separated) and the
    /// absolute path. A leading `/` makes `filename` relative to the source
    /// root instead of the document's directory. A path that climbs above the
    /// root keeps its leading `..` segments.
    #[must_use]
    pub fn relfn2path(&self, filename: &str, docname: &str) -> (String, PathBuf) {
        let joined = match filename.strip_prefix('/') {
            Some(rooted) => rooted.to_owned(),
            None => posix_join(posix_dirname(docname), filename),
        };
        let rel = normalize_posix(&joined);
        let abs = self.srcdir.join(&rel);
        (rel, abs)
    }

    /// Record that `docname` must be rebuilt when `relpath` changes.
    pub fn note_dependency(&mut self, docname: &str, relpath: &str) {
        self.dependencies
            .entry(docname.to_owned())
            .or_default()
            .insert(relpath.to_owned());
    }

    /// Source-relative paths `docname` depends on, sorted.
    #[must_use]
    pub fn dependencies(&self, docname: &str) -> Vec<String> {
        self.dependencies
            .get(docname)
            .map(|deps| deps.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Forget everything recorded for `docname` before it is read again.
    pub fn clear_doc(&mut self, docname: &str) {
        self.dependencies.remove(docname);
    }

    /// All docnames under the source root, sorted.
    ///
    /// Directories starting with `.` or `_` are skipped. A missing source
    /// root yields no documents.
    #[must_use]
    pub fn found_docs(&self) -> Vec<String> {
        let mut docs = Vec::new();
        if self.srcdir.is_dir() {
            self.scan_directory(&self.srcdir, "", &mut docs);
        }
        docs.sort();
        docs
    }

    fn scan_directory(&self, dir: &Path, prefix: &str, docs: &mut Vec<String>) {
        let Ok(entries) = fs::read_dir(dir) else {
            return;
        };

        for entry in entries.filter_map(Result::ok) {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            let is_dir = entry.file_type().is_ok_and(|t| t.is_dir());
            if is_dir {
                if name.starts_with('_') {
                    continue;
                }
                self.scan_directory(&entry.path(), &posix_join(prefix, &name), docs);
            } else if let Some(stem) = name.strip_suffix(self.source_suffix.as_str())
                && !stem.is_empty()
            {
                docs.push(posix_join(prefix, stem));
            }
        }
    }

    /// Fingerprint of `docname` and `deps` modification times.
    ///
    /// Any change to the source or a dependency (including its removal)
    /// changes the stamp.
    #[must_use]
    pub fn stamp(&self, docname: &str, deps: &[String]) -> String {
        let mut parts = vec![mtime_token(&self.doc2path(docname))];
        for dep in deps {
            parts.push(format!("{dep}={}", mtime_token(&self.srcdir.join(dep))));
        }
        parts.join(";")
    }
}

fn mtime_token(path: &Path) -> String {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|mtime| mtime.duration_since(UNIX_EPOCH).ok())
        .map_or_else(|| "-".to_owned(), |d| d.as_nanos().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs::File;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_doc2path() {
        let env = BuildEnvironment::new(PathBuf::from("/src"));
        assert_eq!(env.doc2path("guide/index"), PathBuf::from("/src/guide/index.txt"));
        let env = env.with_source_suffix(".rst");
        assert_eq!(env.doc2path("index"), PathBuf::from("/src/index.rst"));
    }

    #[test]
    fn test_relfn2path_relative_to_document() {
        let env = BuildEnvironment::new(PathBuf::from("/src"));
        assert_eq!(
            env.relfn2path("flow.dot", "guide/index"),
            ("guide/flow.dot".to_owned(), PathBuf::from("/src/guide/flow.dot"))
        );
        assert_eq!(env.relfn2path("flow.dot", "index").0, "flow.dot");
        assert_eq!(env.relfn2path("../img/a.dot", "guide/index").0, "img/a.dot");
    }

    #[test]
    fn test_relfn2path_above_root() {
        let env = BuildEnvironment::new(PathBuf::from("/src"));
        assert_eq!(
            env.relfn2path("../outside.dot", "index"),
            ("../outside.dot".to_owned(), PathBuf::from("/src/../outside.dot"))
        );
    }

    #[test]
    fn test_relfn2path_rooted() {
        let env = BuildEnvironment::new(PathBuf::from("/src"));
        assert_eq!(env.relfn2path("/img/a.dot", "guide/deep/index").0, "img/a.dot");
    }

    #[test]
    fn test_dependencies() {
        let mut env = BuildEnvironment::new(PathBuf::from("/src"));
        env.note_dependency("index", "b.dot");
        env.note_dependency("index", "a.dot");
        env.note_dependency("index", "a.dot");

        assert_eq!(env.dependencies("index"), vec!["a.dot", "b.dot"]);
        assert!(env.dependencies("other").is_empty());

        env.clear_doc("index");
        assert!(env.dependencies("index").is_empty());
    }

    #[test]
    fn test_found_docs() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("index.txt"));
        touch(&tmp.path().join("guide/setup.txt"));
        touch(&tmp.path().join("guide/flow.dot"));
        touch(&tmp.path().join("_build/index.txt"));
        touch(&tmp.path().join(".hidden/index.txt"));

        let env = BuildEnvironment::new(tmp.path().to_path_buf());
        assert_eq!(env.found_docs(), vec!["guide/setup", "index"]);
    }

    #[test]
    fn test_found_docs_missing_root() {
        let env = BuildEnvironment::new(PathBuf::from("/nonexistent/imgext/src"));
        assert!(env.found_docs().is_empty());
    }

    #[test]
    fn test_stamp_tracks_dependencies() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("index.txt"));
        touch(&tmp.path().join("a.dot"));
        let env = BuildEnvironment::new(tmp.path().to_path_buf());
        let deps = vec!["a.dot".to_owned()];

        let before = env.stamp("index", &deps);
        assert_eq!(before, env.stamp("index", &deps));

        let later = SystemTime::now() + Duration::from_secs(10);
        File::options()
            .write(true)
            .open(tmp.path().join("a.dot"))
            .unwrap()
            .set_modified(later)
            .unwrap();
        assert_ne!(before, env.stamp("index", &deps));

        fs::remove_file(tmp.path().join("a.dot")).unwrap();
        assert!(env.stamp("index", &deps).ends_with("a.dot=-"));
    }
}
