//! Converter capability.
//!
//! A converter turns one non-image source file into a raster artifact. It is
//! registered as a [`ConverterClass`]: the options it accepts plus a factory,
//! because a fresh converter is created for every document.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use imgext_engine::options::OptionSpec;
use imgext_engine::{BuildEnvironment, BuilderInfo, Element, Warnings};

/// Extension of generated artifacts unless a converter says otherwise.
pub const DEFAULT_OUTPUT_EXTENSION: &str = ".png";

/// Converts placeholder sources into images.
pub trait ImageConverter {
    /// File name of the artifact for `node`, relative to the image directory.
    fn output_filename(&self, node: &Element) -> String {
        default_output_filename(node.uri().unwrap_or_default())
    }

    /// Produce `dest` from `source`; `true` on success.
    ///
    /// Both paths are absolute and normalized. A converter that wants the
    /// failure to be visible reports it through `diagnostics` before
    /// returning `false`; the pipeline itself stays silent.
    fn convert(
        &mut self,
        node: &Element,
        source: &Path,
        dest: &Path,
        diagnostics: &mut Diagnostics<'_>,
    ) -> bool;
}

/// `uri` with its extension replaced by `.png`.
///
/// ```
/// use imgext_helper::default_output_filename;
///
/// assert_eq!(default_output_filename("diagrams/flow.dot"), "diagrams/flow.png");
/// assert_eq!(default_output_filename("Makefile"), "Makefile.png");
/// ```
#[must_use]
pub fn default_output_filename(uri: &str) -> String {
    let name_start = uri.rfind('/').map_or(0, |i| i + 1);
    let stem = match uri[name_start..].rfind('.') {
        Some(dot) if dot > 0 => &uri[..name_start + dot],
        _ => uri,
    };
    format!("{stem}{DEFAULT_OUTPUT_EXTENSION}")
}

/// What a converter factory may look at.
pub struct ConverterContext<'a> {
    pub env: &'a BuildEnvironment,
    pub builder: &'a BuilderInfo,
    pub docname: &'a str,
}

type Factory = dyn Fn(&ConverterContext<'_>) -> Box<dyn ImageConverter> + Send + Sync;

/// Registered converter: accepted options and a per-document factory.
#[derive(Clone)]
pub struct ConverterClass {
    option_spec: OptionSpec,
    factory: Arc<Factory>,
}

impl ConverterClass {
    /// Class built from an arbitrary factory.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&ConverterContext<'_>) -> Box<dyn ImageConverter> + Send + Sync + 'static,
    {
        Self {
            option_spec: OptionSpec::new(),
            factory: Arc::new(factory),
        }
    }

    /// Class whose instances are `C::default()`.
    #[must_use]
    pub fn of<C>() -> Self
    where
        C: ImageConverter + Default + 'static,
    {
        Self::new(|_| Box::new(C::default()))
    }

    /// Options accepted in `option=` strings of nodes this class converts.
    #[must_use]
    pub fn with_option_spec(mut self, spec: OptionSpec) -> Self {
        self.option_spec = spec;
        self
    }

    #[must_use]
    pub fn option_spec(&self) -> &OptionSpec {
        &self.option_spec
    }

    /// Fresh converter for one document.
    #[must_use]
    pub fn instantiate(&self, ctx: &ConverterContext<'_>) -> Box<dyn ImageConverter> {
        (self.factory)(ctx)
    }
}

impl fmt::Debug for ConverterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterClass")
            .field("option_spec", &self.option_spec)
            .finish_non_exhaustive()
    }
}

/// Warning sink handed to [`ImageConverter::convert`].
pub struct Diagnostics<'a> {
    docname: &'a str,
    warnings: &'a mut Warnings,
}

impl<'a> Diagnostics<'a> {
    #[must_use]
    pub fn new(docname: &'a str, warnings: &'a mut Warnings) -> Self {
        Self { docname, warnings }
    }

    #[must_use]
    pub fn docname(&self) -> &str {
        self.docname
    }

    /// Report a warning attributed to the current document.
    pub fn warn(&mut self, message: impl fmt::Display) {
        self.warnings.warn(format!("{}: {message}", self.docname));
    }
}
