//! LaTeX writer.

use std::fmt::Write;

use super::{image_source, warn_placeholder};
use crate::doctree::{Document, Element, Node, NodeKind};
use crate::warnings::Warnings;

/// Render a standalone LaTeX document for `doc`.
pub fn render_latex(doc: &Document, warnings: &mut Warnings) -> String {
    let mut tex = String::with_capacity(1024);
    tex.push_str("\\documentclass{article}\n\\usepackage{graphicx}\n\\begin{document}\n\n");
    render_nodes(&mut tex, doc, &doc.children, warnings);
    tex.push_str("\\end{document}\n");
    tex
}

fn render_nodes(tex: &mut String, doc: &Document, nodes: &[Node], warnings: &mut Warnings) {
    for node in nodes {
        match node {
            Node::Text(text) => tex.push_str(&escape_latex(text)),
            Node::Element(el) => render_element(tex, doc, el, warnings),
        }
    }
}

fn render_element(tex: &mut String, doc: &Document, el: &Element, warnings: &mut Warnings) {
    match el.kind {
        NodeKind::Paragraph => {
            render_nodes(tex, doc, &el.children, warnings);
            tex.push_str("\n\n");
        }
        NodeKind::Image => render_image(tex, el),
        NodeKind::Figure => {
            tex.push_str("\\begin{figure}[htbp]\n\\centering\n");
            render_nodes(tex, doc, &el.children, warnings);
            if let Some(label) = el
                .get("names")
                .and_then(|n| n.get(0))
                .and_then(serde_json::Value::as_str)
            {
                let _ = writeln!(tex, "\\label{{{}}}", escape_latex(label));
            }
            tex.push_str("\\end{figure}\n\n");
        }
        NodeKind::Caption => {
            tex.push_str("\\caption{");
            render_nodes(tex, doc, &el.children, warnings);
            tex.push_str("}\n");
        }
        NodeKind::Legend => render_nodes(tex, doc, &el.children, warnings),
        NodeKind::ImagePlaceholder => warn_placeholder(doc, el, warnings),
        NodeKind::SystemMessage => {}
    }
}

#[allow(clippy::cast_precision_loss)]
fn render_image(tex: &mut String, image: &Element) {
    let Some(src) = image_source(image) else {
        return;
    };
    let mut opts = Vec::new();
    if let Some(width) = image.get_str("width") {
        opts.push(format!("width={}", latex_length(width)));
    }
    if let Some(height) = image.get_str("height") {
        opts.push(format!("height={}", latex_length(height)));
    }
    if let Some(scale) = image.get("scale").and_then(serde_json::Value::as_u64) {
        opts.push(format!("scale={:.2}", scale as f64 / 100.0));
    }

    if opts.is_empty() {
        let _ = writeln!(tex, "\\includegraphics{{{src}}}");
    } else {
        let _ = writeln!(tex, "\\includegraphics[{}]{{{src}}}", opts.join(","));
    }
}

/// `50%` becomes a fraction of `\linewidth`, unitless values are pixels.
fn latex_length(value: &str) -> String {
    if let Some(percent) = value.strip_suffix('%')
        && let Ok(number) = percent.parse::<f64>()
    {
        return format!("{:.3}\\linewidth", number / 100.0);
    }
    if value.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return format!("{value}px");
    }
    value.to_owned()
}

fn escape_latex(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\textbackslash{}"),
            '{' | '}' | '$' | '&' | '#' | '_' | '%' => {
                out.push('\\');
                out.push(c);
            }
            '^' => out.push_str("\\textasciicircum{}"),
            '~' => out.push_str("\\textasciitilde{}"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(children: Vec<Node>) -> (String, Vec<String>) {
        let mut doc = Document::new("index");
        doc.children = children;
        let mut warnings = Warnings::new();
        let tex = render_latex(&doc, &mut warnings);
        (tex, warnings.into_vec())
    }

    #[test]
    fn test_image_uses_candidate() {
        let image = Element::new(NodeKind::Image)
            .with_attr("uri", "a.png")
            .with_attr("candidates", json!({"*": "a.png"}))
            .with_attr("width", "50%");
        let (tex, _) = render(vec![image.into()]);
        assert!(tex.contains("\\includegraphics[width=0.500\\linewidth]{a.png}\n"));
    }

    #[test]
    fn test_figure_with_caption_and_label() {
        let figure = Element::new(NodeKind::Figure)
            .with_attr("names", json!(["arch"]))
            .with_child(Element::new(NodeKind::Image).with_attr("uri", "a.png"))
            .with_child(Element::new(NodeKind::Caption).with_child(Node::Text("50% done".to_owned())));
        let (tex, _) = render(vec![figure.into()]);
        assert!(tex.contains(
            "\\begin{figure}[htbp]\n\\centering\n\\includegraphics{a.png}\n\\caption{50\\% done}\n\\label{arch}\n\\end{figure}\n"
        ));
    }

    #[test]
    fn test_placeholder_skipped() {
        let placeholder = Element::new(NodeKind::ImagePlaceholder).with_attr("uri", "a.dot");
        let (tex, warnings) = render(vec![placeholder.into()]);
        assert!(!tex.contains("includegraphics"));
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_latex_length() {
        assert_eq!(latex_length("200"), "200px");
        assert_eq!(latex_length("3cm"), "3cm");
    }

    #[test]
    fn test_escape_latex() {
        assert_eq!(escape_latex("a_b & c"), "a\\_b \\& c");
        assert_eq!(escape_latex("\\x"), "\\textbackslash{}x");
    }
}
