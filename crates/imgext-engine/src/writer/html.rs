//! HTML writer.

use std::fmt::Write;

use serde_json::Value;

use super::{image_source, warn_placeholder};
use crate::doctree::{Document, Element, Node, NodeKind};
use crate::util::escape_html;
use crate::warnings::Warnings;

/// Render a complete HTML page for `doc`.
pub fn render_html(doc: &Document, warnings: &mut Warnings) -> String {
    let mut html = String::with_capacity(1024);
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    let _ = writeln!(html, "<title>{}</title>", escape_html(&doc.docname));
    html.push_str("</head>\n<body>\n<main>\n");
    render_nodes(&mut html, doc, &doc.children, warnings);
    html.push_str("</main>\n</body>\n</html>\n");
    html
}

fn render_nodes(html: &mut String, doc: &Document, nodes: &[Node], warnings: &mut Warnings) {
    for node in nodes {
        match node {
            Node::Text(text) => html.push_str(&escape_html(text)),
            Node::Element(el) => render_element(html, doc, el, warnings),
        }
    }
}

fn render_element(html: &mut String, doc: &Document, el: &Element, warnings: &mut Warnings) {
    match el.kind {
        NodeKind::Paragraph => {
            html.push_str("<p>");
            render_nodes(html, doc, &el.children, warnings);
            html.push_str("</p>\n");
        }
        NodeKind::Image => render_image(html, el),
        NodeKind::Figure => {
            html.push_str("<figure");
            push_common_attrs(html, el, None);
            if let Some(width) = el.get_str("width") {
                let _ = write!(html, " style=\"width: {}\"", escape_html(width));
            }
            html.push_str(">\n");
            render_nodes(html, doc, &el.children, warnings);
            html.push_str("</figure>\n");
        }
        NodeKind::Caption => {
            html.push_str("<figcaption><p>");
            render_nodes(html, doc, &el.children, warnings);
            html.push_str("</p></figcaption>\n");
        }
        NodeKind::Legend => {
            html.push_str("<div class=\"legend\">\n");
            render_nodes(html, doc, &el.children, warnings);
            html.push_str("</div>\n");
        }
        NodeKind::ImagePlaceholder => warn_placeholder(doc, el, warnings),
        NodeKind::SystemMessage => {}
    }
}

fn render_image(html: &mut String, image: &Element) {
    let Some(src) = image_source(image) else {
        return;
    };
    let target = image.get_str("target");
    if let Some(target) = target {
        let _ = write!(html, "<a href=\"{}\">", escape_html(target));
    }

    let alt = image.get_str("alt").unwrap_or(src);
    let _ = write!(
        html,
        "<img alt=\"{}\" src=\"{}\"",
        escape_html(alt),
        escape_html(src)
    );
    for key in ["width", "height"] {
        if let Some(value) = image.get(key).and_then(scalar) {
            let _ = write!(html, " {key}=\"{}\"", escape_html(&value));
        }
    }
    let align = image.get_str("align").map(|a| format!("align-{a}"));
    push_common_attrs(html, image, align.as_deref());
    html.push_str(" />");

    if target.is_some() {
        html.push_str("</a>");
    }
    html.push('\n');
}

/// Writes `id` from the first name and `class` from `classes` plus `extra`.
fn push_common_attrs(html: &mut String, el: &Element, extra: Option<&str>) {
    if let Some(id) = first_string(el.get("names")) {
        let _ = write!(html, " id=\"{}\"", escape_html(id));
    }
    let mut classes: Vec<&str> = strings(el.get("classes"));
    classes.extend(extra);
    if !classes.is_empty() {
        let _ = write!(html, " class=\"{}\"", escape_html(&classes.join(" ")));
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn strings(value: Option<&Value>) -> Vec<&str> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

fn first_string(value: Option<&Value>) -> Option<&str> {
    strings(value).into_iter().next()
}
