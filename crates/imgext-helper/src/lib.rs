//! Image conversion helpers for imgext builds.
//!
//! Lets a build embed non-image sources (diagram descriptions, office
//! documents, ...) through image-like directives. Each source is converted
//! to a raster artifact in the image directory of the active output format,
//! once, and reused until the source changes.
//!
//! # Example
//!
//! ```no_run
//! use std::path::{Path, PathBuf};
//! use imgext_engine::options::{OptionSpec, positive_int};
//! use imgext_engine::{Application, Element, OutputFormat};
//! use imgext_helper::{ConverterClass, Diagnostics, ImageConverter, add_image_directive, add_image_type};
//!
//! #[derive(Default)]
//! struct Graphviz;
//!
//! impl ImageConverter for Graphviz {
//!     fn convert(&mut self, _node: &Element, source: &Path, dest: &Path, diag: &mut Diagnostics<'_>) -> bool {
//!         let status = std::process::Command::new("dot")
//!             .arg("-Tpng")
//!             .arg(source)
//!             .arg("-o")
//!             .arg(dest)
//!             .status();
//!         match status {
//!             Ok(status) if status.success() => true,
//!             _ => {
//!                 diag.warn(format!("dot failed on {}", source.display()));
//!                 false
//!             }
//!         }
//!     }
//! }
//!
//! let mut app = Application::new(PathBuf::from("docs"), PathBuf::from("_build"), OutputFormat::Html);
//! let class = ConverterClass::of::<Graphviz>().with_option_spec(OptionSpec::new().with("dpi", positive_int));
//! add_image_type(&mut app, "graphviz", ["dot", "gv"], class);
//! add_image_directive(&mut app, "graphviz", OptionSpec::new());
//! app.build()?;
//! # Ok::<(), imgext_engine::BuildError>(())
//! ```

mod converter;
mod directives;
mod extension;
mod imagedir;
mod options;
mod pipeline;
mod registry;
mod staleness;

use imgext_engine::Application;

pub use converter::{
    ConverterClass, ConverterContext, DEFAULT_OUTPUT_EXTENSION, Diagnostics, ImageConverter,
    default_output_filename,
};
pub use directives::{
    DirectiveHooks, ImageExtDirective, NoHooks, add_figure_directive, add_image_directive,
    generate_figure_directive, generate_image_directive,
};
pub use extension::ImageExtension;
pub use imagedir::{ImageDir, image_dir};
pub use options::{OPTION_ATTR, OptionWarning, apply_options, parse_query, validate_doctree};
pub use pipeline::{ConversionStats, Outcome, convert_image, resolve_doctree};
pub use registry::{ImageType, ImageTypeRegistry, IntoExtensions, TYPE_ATTR, normalize_extension};
pub use staleness::{ceil_to_second, if_outdated, is_outdated, sync_mtime};

/// Register `converter` for the image type `name` and its file extensions.
///
/// The first call installs [`ImageExtension`] on `app`; later calls add to
/// its registry. Directives are registered separately with
/// [`add_image_directive`] and [`add_figure_directive`].
pub fn add_image_type(
    app: &mut Application,
    name: &str,
    extensions: impl IntoExtensions,
    converter: ConverterClass,
) {
    if app.extension::<ImageExtension>().is_none() {
        app.add_extension(ImageExtension::default());
    }
    if let Some(ext) = app.extension_mut::<ImageExtension>() {
        ext.registry_mut().register(name, extensions, &converter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imgext_engine::options::{OptionSpec, positive_int, unchanged};
    use imgext_engine::{Document, Element, NodeKind, OutputFormat};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::fs::{self, File};
    use std::path::{Path, PathBuf};
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

    fn read(path: PathBuf) -> String {
        fs::read_to_string(path).unwrap()
    }

    /// Writes every artifact to `converted.png`.
    #[derive(Default)]
    struct Fixed;

    impl ImageConverter for Fixed {
        fn output_filename(&self, _node: &Element) -> String {
            "converted.png".to_owned()
        }

        fn convert(&mut self, _: &Element, _: &Path, dest: &Path, _: &mut Diagnostics<'_>) -> bool {
            fs::write(dest, "png").is_ok()
        }
    }

    #[derive(Default)]
    struct Duplicate;

    impl ImageConverter for Duplicate {
        fn convert(&mut self, _: &Element, source: &Path, dest: &Path, _: &mut Diagnostics<'_>) -> bool {
            fs::copy(source, dest).is_ok()
        }
    }

    #[derive(Default)]
    struct Broken;

    impl ImageConverter for Broken {
        fn convert(&mut self, node: &Element, _: &Path, _: &Path, diag: &mut Diagnostics<'_>) -> bool {
            diag.warn(format!("renderer crashed on {}", node.uri().unwrap_or_default()));
            false
        }
    }

    fn fixed_class() -> ConverterClass {
        ConverterClass::of::<Fixed>().with_option_spec(
            OptionSpec::new()
                .with("foo", unchanged)
                .with("bar", unchanged),
        )
    }

    fn app(p: &Project) -> Application {
        Application::new(p.src.clone(), p.out.clone(), OutputFormat::Html)
    }

    #[test]
    fn test_plain_image_of_registered_type() {
        let p = project(&[("index.txt", "::image[index.txt]{option=\"foo=1&bar=abc\"}\n")]);
        let mut app = app(&p);
        add_image_type(&mut app, "name", ".txt", fixed_class());

        let report = app.build().unwrap();

        assert!(report.warnings.is_empty(), "{:?}", report.warnings);
        let doc: Document = serde_json::from_str(&read(p.out.join(".doctrees/index.json"))).unwrap();
        let image = doc.find_all(NodeKind::Image)[0];
        assert_eq!(image.uri(), Some("index.txt"));
        assert_eq!(image.get("foo"), Some(&json!("1")));
        assert_eq!(image.get("bar"), Some(&json!("abc")));

        let html = read(p.out.join("index.html"));
        assert!(
            html.contains("<img alt=\"_images/converted.png\" src=\"_images/converted.png\" />"),
            "{html}"
        );
    }

    #[test]
    fn test_figure_of_registered_type() {
        let p = project(&[(
            "index.txt",
            ":::figure[index.txt]{option=\"foo=1\"}\nhere is caption\n:::\n",
        )]);
        let mut app = app(&p);
        add_image_type(&mut app, "name", ".txt", fixed_class());

        app.build().unwrap();

        let doc: Document = serde_json::from_str(&read(p.out.join(".doctrees/index.json"))).unwrap();
        let figure = doc.find_all(NodeKind::Figure)[0];
        assert_eq!(figure.children_of_kind(NodeKind::Image).next().unwrap().get("foo"), Some(&json!("1")));
        assert_eq!(figure.children_of_kind(NodeKind::Caption).next().unwrap().text(), "here is caption");

        let html = read(p.out.join("index.html"));
        assert!(html.contains("src=\"_images/converted.png\""));
        assert!(html.contains("here is caption"));
    }

    #[test]
    fn test_option_warnings() {
        let p = project(&[("index.txt", "::image[index.txt]{option=\"foo=1&baz=2\"}\n")]);
        let mut app = app(&p);
        add_image_type(
            &mut app,
            "name",
            ".txt",
            ConverterClass::of::<Fixed>().with_option_spec(OptionSpec::new().with("foo", positive_int)),
        );

        let report = app.build().unwrap();

        assert_eq!(report.warnings, vec!["index: Unsupported option `baz` found at index.txt"]);
    }

    #[test]
    fn test_directive_converts_once() {
        let p = project(&[
            ("index.txt", "Intro.\n::img-image[example.img]{alt=\"Example\"}\n"),
            ("example.img", "pixels"),
        ]);
        let mut app = app(&p);
        add_image_type(&mut app, "img", ".img", ConverterClass::of::<Duplicate>());
        add_image_directive(&mut app, "img", OptionSpec::new());

        let report = app.build().unwrap();
        assert!(report.warnings.is_empty(), "{:?}", report.warnings);
        assert_eq!(read(p.out.join("_images/example.png")), "pixels");
        let html = read(p.out.join("index.html"));
        assert!(html.contains("<img alt=\"Example\" src=\"_images/example.png\" />"), "{html}");
        assert_eq!(app.extension::<ImageExtension>().unwrap().totals().converted, 1);

        assert!(app.build().unwrap().updated_docs.is_empty());

        touch_forward(&p.src.join("example.img"));
        let report = app.build().unwrap();
        assert_eq!(report.updated_docs, vec!["index"]);
        let totals = app.extension::<ImageExtension>().unwrap().totals();
        assert_eq!(totals.converted, 2);
        assert_eq!(totals.cached, 0);

        assert!(app.build().unwrap().updated_docs.is_empty());
        assert_eq!(app.extension::<ImageExtension>().unwrap().totals().converted, 2);
    }

    #[test]
    fn test_nested_document_paths() {
        let p = project(&[
            ("guide/index.txt", ":::img-figure[flow.img]\nFlow.\n:::\n"),
            ("guide/flow.img", "flow"),
        ]);
        let mut app = app(&p);
        add_image_type(&mut app, "img", ".img", ConverterClass::of::<Duplicate>());
        add_figure_directive(&mut app, "img", OptionSpec::new());

        app.build().unwrap();

        assert!(p.out.join("_images/guide/flow.png").exists());
        let html = read(p.out.join("guide/index.html"));
        assert!(html.contains("src=\"../_images/guide/flow.png\""), "{html}");
    }

    #[test]
    fn test_failed_conversion_drops_image() {
        let p = project(&[("index.txt", "::img-image[a.img]\nAfter.\n"), ("a.img", "x")]);
        let mut app = app(&p);
        add_image_type(&mut app, "img", ".img", ConverterClass::of::<Broken>());
        add_image_directive(&mut app, "img", OptionSpec::new());

        let report = app.build().unwrap();

        assert_eq!(report.warnings, vec!["index: renderer crashed on a.img"]);
        let html = read(p.out.join("index.html"));
        assert!(!html.contains("<img"));
        assert!(html.contains("<p>After.</p>"));
    }

    #[test]
    fn test_one_type_many_extensions() {
        let p = project(&[
            ("index.txt", "::image[a.img]\n::image[b.imgx]\n"),
            ("a.img", "a"),
            ("b.imgx", "b"),
        ]);
        let mut app = app(&p);
        add_image_type(&mut app, "img", [".img", ".imgx"], ConverterClass::of::<Duplicate>());

        app.build().unwrap();

        assert_eq!(read(p.out.join("_images/a.png")), "a");
        assert_eq!(read(p.out.join("_images/b.png")), "b");
    }

    #[test]
    fn test_unreadable_source_warns() {
        let p = project(&[("index.txt", "::img-image[missing.img]\n")]);
        let mut app = app(&p);
        add_image_type(&mut app, "img", ".img", ConverterClass::of::<Duplicate>());
        add_image_directive(&mut app, "img", OptionSpec::new());

        let report = app.build().unwrap();

        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].ends_with("img file not readable: missing.img"));
    }

    #[test]
    fn test_image_above_source_dir_is_rejected() {
        let p = project(&[
            ("index.txt", "::image[../outside.img]\n::img-image[../outside.img]\n"),
            ("outside.img", "inside"),
        ]);
        fs::write(p.src.parent().unwrap().join("outside.img"), "outside").unwrap();
        let mut app = app(&p);
        add_image_type(&mut app, "img", ".img", ConverterClass::of::<Duplicate>());
        add_image_directive(&mut app, "img", OptionSpec::new());

        let report = app.build().unwrap();

        assert_eq!(report.warnings.len(), 2, "{:?}", report.warnings);
        for warning in &report.warnings {
            assert!(warning.ends_with("img file not readable: ../outside.img"), "{warning}");
        }
        assert!(!p.out.join("_images/outside.png").exists());
        assert!(!p.out.join("outside.png").exists());
        assert!(!read(p.out.join("index.html")).contains("<img"));
    }

    #[test]
    fn test_extension_installed_once() {
        let p = project(&[]);
        let mut app = app(&p);
        add_image_type(&mut app, "a", "a", ConverterClass::of::<Duplicate>());
        add_image_type(&mut app, "b", "b", ConverterClass::of::<Duplicate>());

        let ext = app.extension::<ImageExtension>().unwrap();
        assert_eq!(ext.registry().extensions().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
