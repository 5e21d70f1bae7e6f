//! Conversion-and-cache engine.
//!
//! Per node:
//!
//! ```text
//! UNCHECKED ──outdated──► STALE ──convert ok──► SYNCED ──► REPLACED
//!     │                     └──convert failed──► removed
//!     └──up to date──► FRESH ───────────────────────────► REPLACED
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use imgext_engine::util::{normalize_path, posix_join};
use imgext_engine::{BuildContext, Document, Element, NodeKind, Transform};
use serde_json::json;

use crate::converter::{ConverterContext, Diagnostics, ImageConverter};
use crate::imagedir::{ImageDir, image_dir};
use crate::registry::{ImageTypeRegistry, TYPE_ATTR};
use crate::staleness::{is_outdated, sync_mtime};

/// Result of converting one node.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The converter ran; the node becomes this image.
    Converted(Element),
    /// The artifact was already up to date; the node becomes this image.
    Cached(Element),
    /// The converter reported failure; the node is dropped.
    Failed,
}

/// Counters for one resolution pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversionStats {
    pub converted: usize,
    pub cached: usize,
    pub failed: usize,
}

impl ConversionStats {
    pub fn merge(&mut self, other: ConversionStats) {
        self.converted += other.converted;
        self.cached += other.cached;
        self.failed += other.failed;
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.converted + self.cached + self.failed
    }
}

/// Convert the source of `node` into the image directory if it is stale and
/// build the image element that replaces it.
///
/// `node.uri` is relative to `srcdir`. The artifact name comes from
/// [`ImageConverter::output_filename`]. After a successful or skipped
/// conversion the artifact's mtime is synced to the source's, rounded up to
/// a whole second.
pub fn convert_image(
    srcdir: &Path,
    imagedir: &ImageDir,
    node: &Element,
    converter: &mut dyn ImageConverter,
    diagnostics: &mut Diagnostics<'_>,
) -> Outcome {
    let uri = node.uri().unwrap_or_default();
    let basename = converter.output_filename(node);
    let srcpath = srcdir.join(uri);
    let abs_imgpath = imagedir.absolute.join(&basename);

    let converted = if is_outdated(&srcpath, &abs_imgpath) {
        if let Some(parent) = abs_imgpath.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            tracing::warn!("cannot create image directory {}: {e}", parent.display());
            return Outcome::Failed;
        }

        tracing::info!("converting {uri} -> {basename}");
        let ok = converter.convert(
            node,
            &normalize_path(&srcpath),
            &normalize_path(&abs_imgpath),
            diagnostics,
        );
        if !ok {
            tracing::debug!("conversion of {uri} failed, dropping image");
            return Outcome::Failed;
        }
        true
    } else {
        tracing::debug!("{basename} is up to date");
        false
    };

    if let Err(e) = sync_mtime(&srcpath, &abs_imgpath) {
        tracing::warn!("cannot update mtime of {}: {e}", abs_imgpath.display());
    }

    let rel_imgpath = posix_join(&imagedir.relative, &basename);
    let mut image = Element::new(NodeKind::Image);
    image.attributes.clone_from(&node.attributes);
    image.remove(TYPE_ATTR);
    image.set("candidates", json!({ "*": rel_imgpath }));
    image.set("uri", rel_imgpath);

    if converted {
        Outcome::Converted(image)
    } else {
        Outcome::Cached(image)
    }
}

/// Replace every convertible node of `doc` with its generated image.
///
/// Images whose extension is registered and placeholders whose type is
/// registered are converted; one converter per type is created for the
/// document. Placeholders of unknown types are left for the writer.
pub fn resolve_doctree(
    doc: &mut Document,
    registry: &ImageTypeRegistry,
    ctx: &mut BuildContext<'_>,
) -> ConversionStats {
    let docname = ctx.docname;
    let builder = ctx.builder;
    let env = &*ctx.env;
    let warnings = &mut *ctx.warnings;

    let imagedir = image_dir(builder, docname);
    let converter_ctx = ConverterContext {
        env,
        builder,
        docname,
    };
    let mut converters: BTreeMap<String, Box<dyn ImageConverter>> = BTreeMap::new();
    let mut stats = ConversionStats::default();

    doc.transform(|node| {
        let Some(image_type) = registry.for_node(node) else {
            return Transform::Keep;
        };
        let converter = converters
            .entry(image_type.name.clone())
            .or_insert_with(|| image_type.converter.instantiate(&converter_ctx));

        let mut diagnostics = Diagnostics::new(docname, &mut *warnings);
        match convert_image(
            env.srcdir(),
            &imagedir,
            node,
            converter.as_mut(),
            &mut diagnostics,
        ) {
            Outcome::Converted(image) => {
                stats.converted += 1;
                Transform::Replace(image.into())
            }
            Outcome::Cached(image) => {
                stats.cached += 1;
                Transform::Replace(image.into())
            }
            Outcome::Failed => {
                stats.failed += 1;
                Transform::Remove
            }
        }
    });
    stats
}
