//! `<type>-image` and `<type>-figure` directives.
//!
//! Both wrap the stock `image`/`figure` directive and swap every image it
//! produces for an image placeholder tagged with the image type, so the
//! conversion step can find it regardless of the file extension.
//!
//! ```text
//! ::graphviz-image[flow.txt]{alt="Flow" option="layout=neato"}
//! ```

use std::fs::File;
use std::sync::Arc;

use imgext_engine::directive::{
    Directive, DirectiveCall, DirectiveContext, DirectiveError, FigureDirective, ImageDirective,
};
use imgext_engine::options::{self, OptionSpec};
use imgext_engine::util::{escapes_root, is_url};
use imgext_engine::{Application, Element, Node, NodeKind};

use crate::options::OPTION_ATTR;
use crate::registry::TYPE_ATTR;

/// Customization points of [`ImageExtDirective`].
pub trait DirectiveHooks: Send + Sync {
    /// Called before the wrapped directive runs.
    fn before_run(&self, _call: &DirectiveCall) {}

    /// Called on every placeholder once its attributes are set.
    fn after_placeholder_built(&self, _placeholder: &mut Element) {}
}

/// Hooks that do nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl DirectiveHooks for NoHooks {}

/// Image-ish directive producing placeholders of one image type.
pub struct ImageExtDirective {
    image_type: String,
    base: Arc<dyn Directive>,
    extra_options: OptionSpec,
    hooks: Arc<dyn DirectiveHooks>,
}

impl ImageExtDirective {
    /// Wrap `base` for `image_type`, accepting `extra_options` on top of the
    /// base options and `option`.
    pub fn new(image_type: &str, base: impl Directive + 'static, extra_options: OptionSpec) -> Self {
        Self {
            image_type: image_type.to_owned(),
            base: Arc::new(base),
            extra_options,
            hooks: Arc::new(NoHooks),
        }
    }

    #[must_use]
    pub fn with_hooks(mut self, hooks: impl DirectiveHooks + 'static) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    #[must_use]
    pub fn image_type(&self) -> &str {
        &self.image_type
    }

    /// Source path recorded on placeholders.
    ///
    /// URLs are kept as written. Local files are resolved against the
    /// document, must be readable inside the source directory and become a
    /// dependency of the document.
    fn resolve_source(
        &self,
        argument: &str,
        ctx: &mut DirectiveContext<'_>,
    ) -> Result<String, DirectiveError> {
        if is_url(argument) {
            return Ok(argument.to_owned());
        }
        let (relpath, abspath) = ctx.env.relfn2path(argument, ctx.docname);
        let not_readable = || {
            DirectiveError::Warning(format!("{} file not readable: {argument}", self.image_type))
        };
        if escapes_root(&relpath) {
            tracing::debug!("{relpath} is outside the source directory");
            return Err(not_readable());
        }
        if let Err(e) = File::open(&abspath) {
            tracing::debug!("cannot open {}: {e}", abspath.display());
            return Err(not_readable());
        }
        ctx.env.note_dependency(ctx.docname, &relpath);
        Ok(relpath)
    }

    fn intercept(&self, element: &mut Element, relpath: &str) {
        if element.kind == NodeKind::Image {
            *element = self.placeholder(element, relpath);
            return;
        }
        for child in &mut element.children {
            if let Node::Element(child) = child {
                self.intercept(child, relpath);
            }
        }
    }

    fn placeholder(&self, image: &Element, relpath: &str) -> Element {
        let mut placeholder = Element::new(NodeKind::ImagePlaceholder);
        placeholder.attributes.clone_from(&image.attributes);
        placeholder.set(TYPE_ATTR, self.image_type.as_str());
        placeholder.set("uri", relpath);
        self.hooks.after_placeholder_built(&mut placeholder);
        placeholder
    }
}

impl Directive for ImageExtDirective {
    fn option_spec(&self) -> OptionSpec {
        let mut spec = self.base.option_spec();
        spec.insert(OPTION_ATTR, options::unchanged);
        spec.extend(&self.extra_options);
        spec
    }

    fn has_content(&self) -> bool {
        self.base.has_content()
    }

    fn run(
        &self,
        call: &DirectiveCall,
        ctx: &mut DirectiveContext<'_>,
    ) -> Result<Vec<Node>, DirectiveError> {
        self.hooks.before_run(call);
        let mut nodes = self.base.run(call, ctx)?;

        let relpath = self.resolve_source(&call.argument, ctx)?;
        for node in &mut nodes {
            if let Node::Element(element) = node {
                self.intercept(element, &relpath);
            }
        }
        Ok(nodes)
    }
}

#[must_use]
pub fn generate_image_directive(image_type: &str, extra_options: OptionSpec) -> ImageExtDirective {
    ImageExtDirective::new(image_type, ImageDirective, extra_options)
}

#[must_use]
pub fn generate_figure_directive(image_type: &str, extra_options: OptionSpec) -> ImageExtDirective {
    ImageExtDirective::new(image_type, FigureDirective, extra_options)
}

/// Register `<image_type>-image`.
pub fn add_image_directive(app: &mut Application, image_type: &str, extra_options: OptionSpec) {
    app.add_directive(
        &format!("{image_type}-image"),
        generate_image_directive(image_type, extra_options),
    );
}

/// Register `<image_type>-figure`.
pub fn add_figure_directive(app: &mut Application, image_type: &str, extra_options: OptionSpec) {
    app.add_directive(
        &format!("{image_type}-figure"),
        generate_figure_directive(image_type, extra_options),
    );
}
