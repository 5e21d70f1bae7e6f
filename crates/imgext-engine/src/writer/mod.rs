//! Output writers.
//!
//! Writers run after every `doctree_resolved` hook. Image placeholders still
//! present at that point have no converter and are skipped with a warning.

mod html;
mod latex;

use crate::builder::OutputFormat;
use crate::doctree::{Document, Element};
use crate::warnings::Warnings;

pub use html::render_html;
pub use latex::render_latex;

/// Render `doc` in `format`.
pub fn render(format: OutputFormat, doc: &Document, warnings: &mut Warnings) -> String {
    match format {
        OutputFormat::Html => render_html(doc, warnings),
        OutputFormat::Latex => render_latex(doc, warnings),
    }
}

/// Image reference a writer should emit: the `*` candidate, else `uri`.
pub(crate) fn image_source(image: &Element) -> Option<&str> {
    image
        .get("candidates")
        .and_then(|c| c.get("*"))
        .and_then(serde_json::Value::as_str)
        .or_else(|| image.uri())
}

pub(crate) fn warn_placeholder(doc: &Document, placeholder: &Element, warnings: &mut Warnings) {
    warnings.warn(format!(
        "{}: no converter for image {}, skipped",
        doc.docname,
        placeholder.uri().unwrap_or("<unknown>")
    ));
}
