//! Build hooks wiring option validation and conversion into a build.

use imgext_engine::directive::DirectiveRegistry;
use imgext_engine::options;
use imgext_engine::util::{escapes_root, is_url};
use imgext_engine::{BuildContext, Document, Extension, NodeKind, Transform};

use crate::options::{OPTION_ATTR, validate_doctree};
use crate::pipeline::{ConversionStats, resolve_doctree};
use crate::registry::ImageTypeRegistry;

/// Extension owning the image type registry.
#[derive(Debug, Default)]
pub struct ImageExtension {
    registry: ImageTypeRegistry,
    totals: ConversionStats,
}

impl ImageExtension {
    #[must_use]
    pub fn new(registry: ImageTypeRegistry) -> Self {
        Self {
            registry,
            totals: ConversionStats::default(),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &ImageTypeRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ImageTypeRegistry {
        &mut self.registry
    }

    /// Conversions performed since the extension was created.
    #[must_use]
    pub fn totals(&self) -> ConversionStats {
        self.totals
    }
}

impl Extension for ImageExtension {
    fn name(&self) -> &str {
        "imgext-helper"
    }

    fn builder_inited(&mut self, directives: &mut DirectiveRegistry) {
        directives.add_option("image", OPTION_ATTR, options::unchanged);
        directives.add_option("figure", OPTION_ATTR, options::unchanged);
    }

    fn doctree_read(&mut self, ctx: &mut BuildContext<'_>, doc: &mut Document) {
        // Plain images of a registered type: make the uri source-relative
        // and track the file like a placeholder source.
        let docname = ctx.docname;
        let env = &mut *ctx.env;
        let warnings = &mut *ctx.warnings;
        let registry = &self.registry;
        doc.transform(|node| {
            if node.kind != NodeKind::Image {
                return Transform::Keep;
            }
            let Some(image_type) = registry.for_node(node) else {
                return Transform::Keep;
            };
            let Some(uri) = node.uri().filter(|uri| !is_url(uri)) else {
                return Transform::Keep;
            };
            let (relpath, _) = env.relfn2path(uri, docname);
            if escapes_root(&relpath) {
                warnings.warn(format!("{docname}: {} file not readable: {uri}", image_type.name));
                return Transform::Remove;
            }
            env.note_dependency(docname, &relpath);
            node.set("uri", relpath);
            Transform::Keep
        });

        validate_doctree(doc, &self.registry, ctx.docname, ctx.warnings);
    }

    fn doctree_resolved(&mut self, ctx: &mut BuildContext<'_>, doc: &mut Document) {
        if self.registry.is_empty() {
            return;
        }
        let stats = resolve_doctree(doc, &self.registry, ctx);
        if stats.total() > 0 {
            tracing::debug!(
                "{}: {} converted, {} cached, {} failed",
                ctx.docname,
                stats.converted,
                stats.cached,
                stats.failed
            );
        }
        self.totals.merge(stats);
    }
}
