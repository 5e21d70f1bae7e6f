//! Build driver.
//!
//! ```text
//! found_docs ──► outdated? ──► read ──► doctree_read ──► dump JSON
//!                                                           │
//!            write ◄── doctree_resolved ◄───────────────────┘
//! ```
//!
//! A document is outdated when its output file is missing or when the stamp
//! stored in the `environment` cache bucket no longer matches the current
//! modification times of its source and recorded dependencies.

use std::any::Any;
use std::fs;
use std::path::{Path, PathBuf};

use imgext_cache::{Cache, CacheBucket, CacheBucketExt, FileCache, NullCache};
use serde::{Deserialize, Serialize};

use crate::builder::{BuilderInfo, OutputFormat};
use crate::directive::{Directive, DirectiveRegistry};
use crate::doctree::Document;
use crate::environment::BuildEnvironment;
use crate::extension::{BuildContext, Extension};
use crate::reader::Reader;
use crate::warnings::Warnings;
use crate::writer;

/// Directory under the output root holding build state.
pub const DOCTREE_DIR: &str = ".doctrees";

const ENVIRONMENT_BUCKET: &str = "environment";

/// Error that aborts a whole build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to serialize doctree: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result of [`Application::build`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BuildReport {
    /// Documents read and written by this build, sorted.
    pub updated_docs: Vec<String>,
    /// Every warning emitted during the build, in order.
    pub warnings: Vec<String>,
}

/// Per-document state kept between builds.
#[derive(Debug, Serialize, Deserialize)]
struct DocRecord {
    dependencies: Vec<String>,
}

/// A configured build: sources, output, directives and extensions.
pub struct Application {
    env: BuildEnvironment,
    builder: BuilderInfo,
    directives: DirectiveRegistry,
    extensions: Vec<Box<dyn Extension>>,
    initialized: usize,
    cache: Box<dyn Cache>,
}

impl Application {
    /// Create an application with the built-in directives.
    ///
    /// Build state is cached under `<outdir>/.doctrees/cache`.
    #[must_use]
    pub fn new(srcdir: PathBuf, outdir: PathBuf, format: OutputFormat) -> Self {
        let cache = FileCache::new(
            outdir.join(DOCTREE_DIR).join("cache"),
            env!("CARGO_PKG_VERSION"),
        );
        Self {
            env: BuildEnvironment::new(srcdir),
            builder: BuilderInfo::new(format, outdir),
            directives: DirectiveRegistry::with_builtins(),
            extensions: Vec::new(),
            initialized: 0,
            cache: Box::new(cache),
        }
    }

    /// Use `cache` for build state.
    #[must_use]
    pub fn with_cache(mut self, cache: impl Cache + 'static) -> Self {
        self.cache = Box::new(cache);
        self
    }

    /// Keep no build state; every document is rebuilt on every build.
    #[must_use]
    pub fn without_cache(self) -> Self {
        self.with_cache(NullCache)
    }

    #[must_use]
    pub fn with_source_suffix(mut self, suffix: &str) -> Self {
        self.env = self.env.with_source_suffix(suffix);
        self
    }

    pub fn env(&self) -> &BuildEnvironment {
        &self.env
    }

    pub fn builder(&self) -> &BuilderInfo {
        &self.builder
    }

    pub fn directives(&self) -> &DirectiveRegistry {
        &self.directives
    }

    pub fn directives_mut(&mut self) -> &mut DirectiveRegistry {
        &mut self.directives
    }

    /// Register `directive` under `name`.
    pub fn add_directive(&mut self, name: &str, directive: impl Directive + 'static) {
        self.directives.add(name, directive);
    }

    pub fn add_extension(&mut self, extension: impl Extension) {
        tracing::debug!("extension {} added", extension.name());
        self.extensions.push(Box::new(extension));
    }

    /// First extension of type `T`.
    pub fn extension<T: Extension>(&self) -> Option<&T> {
        self.extensions
            .iter()
            .find_map(|ext| (ext.as_ref() as &dyn Any).downcast_ref::<T>())
    }

    pub fn extension_mut<T: Extension>(&mut self) -> Option<&mut T> {
        self.extensions
            .iter_mut()
            .find_map(|ext| (ext.as_mut() as &mut dyn Any).downcast_mut::<T>())
    }

    /// Read, resolve and write every outdated document.
    ///
    /// Problems confined to one document or one node are reported as
    /// warnings in the returned [`BuildReport`].
    ///
    /// # Errors
    ///
    /// Returns [`BuildError`] when output or build state cannot be written.
    pub fn build(&mut self) -> Result<BuildReport, BuildError> {
        self.init_extensions();

        let mut warnings = Warnings::new();
        let bucket = self.cache.bucket(ENVIRONMENT_BUCKET);

        let outdated: Vec<String> = self
            .env
            .found_docs()
            .into_iter()
            .filter(|docname| self.is_outdated(bucket.as_ref(), docname))
            .collect();
        tracing::info!(
            "{} outdated document(s), format {}",
            outdated.len(),
            self.builder.format()
        );

        let mut doctrees = Vec::with_capacity(outdated.len());
        for docname in &outdated {
            match self.read_doc(docname, &mut warnings) {
                Some(doc) => {
                    self.dump_doctree(&doc)?;
                    doctrees.push(doc);
                }
                None => bucket.remove(docname),
            }
        }

        let mut updated_docs = Vec::with_capacity(doctrees.len());
        for mut doc in doctrees {
            self.resolve_and_write(&mut doc, &mut warnings)?;

            let dependencies = self.env.dependencies(&doc.docname);
            let stamp = self.env.stamp(&doc.docname, &dependencies);
            bucket.set_json(&doc.docname, &stamp, &DocRecord { dependencies });
            updated_docs.push(doc.docname);
        }

        tracing::info!("build finished, {} document(s) written", updated_docs.len());
        Ok(BuildReport {
            updated_docs,
            warnings: warnings.into_vec(),
        })
    }

    fn init_extensions(&mut self) {
        for ext in &mut self.extensions[self.initialized..] {
            ext.builder_inited(&mut self.directives);
        }
        self.initialized = self.extensions.len();
    }

    fn is_outdated(&self, bucket: &dyn CacheBucket, docname: &str) -> bool {
        if !self.builder.output_path(docname).exists() {
            return true;
        }
        let Some(record) = bucket.get_json::<DocRecord>(docname, "") else {
            return true;
        };
        let stamp = self.env.stamp(docname, &record.dependencies);
        let fresh = bucket.get(docname, &stamp).is_some();
        if fresh {
            tracing::debug!("{docname} is up to date");
        }
        !fresh
    }

    fn read_doc(&mut self, docname: &str, warnings: &mut Warnings) -> Option<Document> {
        self.env.clear_doc(docname);
        let path = self.env.doc2path(docname);
        let source = match fs::read_to_string(&path) {
            Ok(source) => source,
            Err(e) => {
                warnings.warn(format!("{}: cannot read source: {e}", path.display()));
                return None;
            }
        };

        tracing::debug!("reading {docname}");
        let mut doc = Reader::new(&self.directives).read(docname, &source, &mut self.env, warnings);

        let mut ctx = BuildContext {
            env: &mut self.env,
            builder: &self.builder,
            docname,
            warnings: &mut *warnings,
        };
        for ext in &mut self.extensions {
            ext.doctree_read(&mut ctx, &mut doc);
        }
        Some(doc)
    }

    fn dump_doctree(&self, doc: &Document) -> Result<(), BuildError> {
        let path = self
            .builder
            .outdir()
            .join(DOCTREE_DIR)
            .join(format!("{}.json", doc.docname));
        let json = serde_json::to_vec_pretty(doc)?;
        write_file(&path, &json)
    }

    fn resolve_and_write(
        &mut self,
        doc: &mut Document,
        warnings: &mut Warnings,
    ) -> Result<(), BuildError> {
        let docname = doc.docname.clone();
        let mut ctx = BuildContext {
            env: &mut self.env,
            builder: &self.builder,
            docname: &docname,
            warnings: &mut *warnings,
        };
        for ext in &mut self.extensions {
            ext.doctree_resolved(&mut ctx, doc);
        }

        let output = writer::render(self.builder.format(), doc, warnings);
        write_file(&self.builder.output_path(&docname), output.as_bytes())
    }
}

fn write_file(path: &Path, contents: &[u8]) -> Result<(), BuildError> {
    let io_err = |source| BuildError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    fs::write(path, contents).map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doctree::NodeKind;
    use pretty_assertions::assert_eq;
    use std::fs::File;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    struct Project {
        _tmp: TempDir,
        src: PathBuf,
        out: PathBuf,
    }

    fn project(files: &[(&str, &str)]) -> Project {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("docs");
        let out = tmp.path().join("_build");
        for (name, contents) in files {
            let path = src.join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, contents).unwrap();
        }
        Project { _tmp: tmp, src, out }
    }

    fn touch_forward(path: &Path) {
        let later = SystemTime::now() + Duration::from_secs(10);
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(later)
            .unwrap();
    }

    /// Records every hook call and tags images on read.
    #[derive(Default)]
    struct Recorder {
        inited: usize,
        read: Vec<String>,
        resolved: Vec<String>,
    }

    impl Extension for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn builder_inited(&mut self, directives: &mut DirectiveRegistry) {
            self.inited += 1;
            directives.add_option("image", "tag", crate::options::unchanged);
        }

        fn doctree_read(&mut self, ctx: &mut BuildContext<'_>, _doc: &mut Document) {
            self.read.push(ctx.docname.to_owned());
        }

        fn doctree_resolved(&mut self, ctx: &mut BuildContext<'_>, doc: &mut Document) {
            self.resolved.push(ctx.docname.to_owned());
            doc.for_each_element_mut(|el| {
                if el.kind == NodeKind::Image {
                    el.set("alt", "resolved");
                }
            });
        }
    }

    #[test]
    fn test_build_writes_html_and_doctree() {
        let p = project(&[
            ("index.txt", "Hello.\n::image[a.png]\n"),
            ("guide/setup.txt", "Setup.\n"),
        ]);
        let mut app = Application::new(p.src.clone(), p.out.clone(), OutputFormat::Html);

        let report = app.build().unwrap();

        assert_eq!(report.updated_docs, vec!["guide/setup", "index"]);
        assert!(report.warnings.is_empty());
        let html = fs::read_to_string(p.out.join("index.html")).unwrap();
        assert!(html.contains("<p>Hello.</p>"));
        assert!(html.contains("<img alt=\"a.png\" src=\"a.png\" />"));
        assert!(p.out.join("guide/setup.html").exists());

        let dump = fs::read_to_string(p.out.join(".doctrees/index.json")).unwrap();
        let doc: Document = serde_json::from_str(&dump).unwrap();
        assert_eq!(doc.find_all(NodeKind::Image).len(), 1);
    }

    #[test]
    fn test_rebuild_skips_unchanged_docs() {
        let p = project(&[("index.txt", "Hello.\n"), ("other.txt", "Other.\n")]);
        let mut app = Application::new(p.src.clone(), p.out.clone(), OutputFormat::Html);
        app.build().unwrap();

        assert!(app.build().unwrap().updated_docs.is_empty());

        touch_forward(&p.src.join("other.txt"));
        assert_eq!(app.build().unwrap().updated_docs, vec!["other"]);
    }

    #[test]
    fn test_state_survives_new_application() {
        let p = project(&[("index.txt", "Hello.\n")]);
        Application::new(p.src.clone(), p.out.clone(), OutputFormat::Html)
            .build()
            .unwrap();

        let mut app = Application::new(p.src.clone(), p.out.clone(), OutputFormat::Html);
        assert!(app.build().unwrap().updated_docs.is_empty());
    }

    #[test]
    fn test_dependency_change_rebuilds_document() {
        let p = project(&[("index.txt", "Hello.\n"), ("data.csv", "a,b\n")]);
        let mut app = Application::new(p.src.clone(), p.out.clone(), OutputFormat::Html);
        app.build().unwrap();
        app.env.note_dependency("index", "data.csv");
        let deps = app.env.dependencies("index");
        let stamp = app.env.stamp("index", &deps);
        app.cache
            .bucket(ENVIRONMENT_BUCKET)
            .set_json("index", &stamp, &DocRecord { dependencies: deps });

        assert!(app.build().unwrap().updated_docs.is_empty());
        touch_forward(&p.src.join("data.csv"));
        assert_eq!(app.build().unwrap().updated_docs, vec!["index"]);
    }

    #[test]
    fn test_missing_output_forces_rebuild() {
        let p = project(&[("index.txt", "Hello.\n")]);
        let mut app = Application::new(p.src.clone(), p.out.clone(), OutputFormat::Html);
        app.build().unwrap();

        fs::remove_file(p.out.join("index.html")).unwrap();
        assert_eq!(app.build().unwrap().updated_docs, vec!["index"]);
    }

    #[test]
    fn test_without_cache_rebuilds_everything() {
        let p = project(&[("index.txt", "Hello.\n")]);
        let mut app =
            Application::new(p.src.clone(), p.out.clone(), OutputFormat::Html).without_cache();
        app.build().unwrap();
        assert_eq!(app.build().unwrap().updated_docs, vec!["index"]);
    }

    #[test]
    fn test_extension_hooks_order_and_lookup() {
        let p = project(&[("index.txt", "::image[a.png]{tag=x}\n")]);
        let mut app = Application::new(p.src.clone(), p.out.clone(), OutputFormat::Html);
        app.add_extension(Recorder::default());

        let report = app.build().unwrap();
        assert!(report.warnings.is_empty(), "{:?}", report.warnings);
        app.build().unwrap();

        let recorder = app.extension::<Recorder>().unwrap();
        assert_eq!(recorder.inited, 1);
        assert_eq!(recorder.read, vec!["index"]);
        assert_eq!(recorder.resolved, vec!["index"]);

        let html = fs::read_to_string(p.out.join("index.html")).unwrap();
        assert!(html.contains("alt=\"resolved\""));

        app.extension_mut::<Recorder>().unwrap().read.clear();
        assert!(app.extension::<Recorder>().unwrap().read.is_empty());
    }

    #[test]
    fn test_unreadable_source_drops_record() {
        let p = project(&[("index.txt", "Hello.\n")]);
        let mut app = Application::new(p.src.clone(), p.out.clone(), OutputFormat::Html);
        app.build().unwrap();
        let bucket = app.cache.bucket(ENVIRONMENT_BUCKET);
        assert!(bucket.get("index", "").is_some());

        fs::write(p.src.join("index.txt"), [0xff, 0xfe]).unwrap();
        touch_forward(&p.src.join("index.txt"));
        let report = app.build().unwrap();

        assert!(report.updated_docs.is_empty());
        assert_eq!(report.warnings.len(), 1);
        assert!(bucket.get("index", "").is_none());
    }

    #[test]
    fn test_latex_output() {
        let p = project(&[("index.txt", "::image[a.png]\n")]);
        let mut app = Application::new(p.src.clone(), p.out.clone(), OutputFormat::Latex);
        app.build().unwrap();

        let tex = fs::read_to_string(p.out.join("index.tex")).unwrap();
        assert!(tex.contains("\\includegraphics{a.png}"));
    }

    #[test]
    fn test_directive_warning_does_not_abort() {
        let p = project(&[("index.txt", "::image[]\nText.\n")]);
        let mut app = Application::new(p.src.clone(), p.out.clone(), OutputFormat::Html);

        let report = app.build().unwrap();
        assert_eq!(report.updated_docs, vec!["index"]);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("1 argument(s) required"));
    }
}
