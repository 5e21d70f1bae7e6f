//! Built-in `image` and `figure` directives.

use serde_json::Value;

use super::{Directive, DirectiveCall, DirectiveContext, DirectiveError, ParsedOptions};
use crate::doctree::{Element, Node, NodeKind};
use crate::options::{self, OptionSpec};

const IMAGE_ALIGN: &[&str] = &["top", "middle", "bottom", "left", "center", "right"];
const FIGURE_ALIGN: &[&str] = &["left", "center", "right"];

/// Options accepted by `::image`.
#[must_use]
pub fn image_option_spec() -> OptionSpec {
    OptionSpec::new()
        .with("alt", options::unchanged)
        .with("height", options::length_or_unitless)
        .with("width", options::length_or_percentage_or_unitless)
        .with("scale", options::percentage)
        .with("align", options::choice(IMAGE_ALIGN))
        .with("name", options::unchanged)
        .with("class", options::class_option)
        .with("target", options::unchanged_required)
}

/// Build an `Image` element for `argument` with `options` as attributes.
///
/// Whitespace inside the argument is removed, `name` becomes the `names`
/// list and `class` the `classes` list.
///
/// # Errors
///
/// Returns [`DirectiveError::MissingArgument`] when `argument` is blank.
pub fn image_element(argument: &str, options: &ParsedOptions) -> Result<Element, DirectiveError> {
    let uri: String = argument.split_whitespace().collect();
    if uri.is_empty() {
        return Err(DirectiveError::MissingArgument);
    }

    let mut image = Element::new(NodeKind::Image);
    for (key, value) in options {
        match key.as_str() {
            "name" => set_names(&mut image, value),
            "class" => image.set("classes", value.clone()),
            _ => image.set(key, value.clone()),
        }
    }
    image.set("uri", uri);
    Ok(image)
}

fn set_names(element: &mut Element, value: &Value) {
    if let Some(name) = value.as_str() {
        let normalized = name.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
        if !normalized.is_empty() {
            element.set("names", Value::Array(vec![Value::String(normalized)]));
        }
    }
}

/// `::image[path]{options}`
pub struct ImageDirective;

impl Directive for ImageDirective {
    fn option_spec(&self) -> OptionSpec {
        image_option_spec()
    }

    fn run(
        &self,
        call: &DirectiveCall,
        _ctx: &mut DirectiveContext<'_>,
    ) -> Result<Vec<Node>, DirectiveError> {
        if !call.content.is_empty() {
            return Err(DirectiveError::UnexpectedContent);
        }
        Ok(vec![image_element(&call.argument, &call.options)?.into()])
    }
}

/// `:::figure[path]{options}` with an optional caption and legend body.
///
/// The first paragraph of the body is the caption, the rest is the legend.
pub struct FigureDirective;

impl Directive for FigureDirective {
    fn option_spec(&self) -> OptionSpec {
        let mut spec = image_option_spec();
        spec.insert("figwidth", options::length_or_percentage_or_unitless);
        spec.insert("figclass", options::class_option);
        spec.insert("align", options::choice(FIGURE_ALIGN));
        spec
    }

    fn has_content(&self) -> bool {
        true
    }

    fn run(
        &self,
        call: &DirectiveCall,
        _ctx: &mut DirectiveContext<'_>,
    ) -> Result<Vec<Node>, DirectiveError> {
        let mut image_options = call.options.clone();
        let figwidth = image_options.remove("figwidth");
        let figclass = image_options.remove("figclass");
        let align = image_options.remove("align");
        let name = image_options.remove("name");

        let image = image_element(&call.argument, &image_options)?;

        let mut figure = Element::new(NodeKind::Figure);
        if let Some(width) = figwidth {
            figure.set("width", width);
        }
        if let Some(classes) = figclass {
            figure.set("classes", classes);
        }
        if let Some(align) = align {
            figure.set("align", align);
        }
        if let Some(name) = name {
            set_names(&mut figure, &name);
        }
        figure.children.push(image.into());

        let mut paragraphs = paragraphs(&call.content).into_iter();
        if let Some(caption) = paragraphs.next() {
            figure
                .children
                .push(Element::new(NodeKind::Caption).with_child(Node::Text(caption)).into());
        }
        let legend: Vec<Node> = paragraphs
            .map(|text| Element::new(NodeKind::Paragraph).with_child(Node::Text(text)).into())
            .collect();
        if !legend.is_empty() {
            let mut element = Element::new(NodeKind::Legend);
            element.children = legend;
            figure.children.push(element.into());
        }

        Ok(vec![figure.into()])
    }
}

/// Split body lines into paragraphs at blank lines, joining wrapped lines.
pub(crate) fn paragraphs(lines: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if !current.is_empty() {
                out.push(current.join(" "));
                current.clear();
            }
        } else {
            current.push(trimmed);
        }
    }
    if !current.is_empty() {
        out.push(current.join(" "));
    }
    out
}
