//! Output format and output layout of a build.

use std::fmt;
use std::path::{Path, PathBuf};

/// Directory under the HTML output root that holds generated images.
pub const HTML_IMAGE_DIR: &str = "_images";

/// Output format of a build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    #[default]
    Html,
    Latex,
}

impl OutputFormat {
    /// Name used in logs and configuration.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Latex => "latex",
        }
    }

    /// Dedicated image directory below the output root, if the format has one.
    #[must_use]
    pub fn image_dir(self) -> Option<&'static str> {
        match self {
            Self::Html => Some(HTML_IMAGE_DIR),
            Self::Latex => None,
        }
    }

    /// Suffix of written documents.
    #[must_use]
    pub fn out_suffix(self) -> &'static str {
        match self {
            Self::Html => ".html",
            Self::Latex => ".tex",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Output side of a build: format and output root.
#[derive(Debug, Clone)]
pub struct BuilderInfo {
    format: OutputFormat,
    outdir: PathBuf,
}

impl BuilderInfo {
    #[must_use]
    pub fn new(format: OutputFormat, outdir: PathBuf) -> Self {
        Self { format, outdir }
    }

    #[must_use]
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    #[must_use]
    pub fn outdir(&self) -> &Path {
        &self.outdir
    }

    /// Output URI of `docname`, relative to the output root.
    #[must_use]
    pub fn target_uri(&self, docname: &str) -> String {
        format!("{docname}{}", self.format.out_suffix())
    }

    /// Absolute path the writer produces for `docname`.
    #[must_use]
    pub fn output_path(&self, docname: &str) -> PathBuf {
        self.outdir.join(self.target_uri(docname))
    }

    /// Format's image directory name, if any.
    #[must_use]
    pub fn imagedir(&self) -> Option<&'static str> {
        self.format.image_dir()
    }
}
