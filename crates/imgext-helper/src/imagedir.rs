//! Where generated images go for the active output format.

use std::path::PathBuf;

use imgext_engine::BuilderInfo;
use imgext_engine::util::relative_uri;

/// Image directory as seen from one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDir {
    /// Prefix for references written into `docname`'s output; empty when the
    /// format has no separate image directory.
    pub relative: String,
    /// Directory artifacts are written to.
    pub absolute: PathBuf,
}

/// Resolve the image directory for `docname`.
///
/// HTML output uses `_images` under the output root, referenced relative to
/// the document's own output location. LaTeX output keeps images next to the
/// generated files.
#[must_use]
pub fn image_dir(builder: &BuilderInfo, docname: &str) -> ImageDir {
    match builder.imagedir() {
        Some(dirname) => ImageDir {
            relative: relative_uri(&builder.target_uri(docname), dirname),
            absolute: builder.outdir().join(dirname),
        },
        None => ImageDir {
            relative: String::new(),
            absolute: builder.outdir().to_path_buf(),
        },
    }
}
