//! Source reader: turns a source document into a [`Document`].
//!
//! Lines that hold a block directive are dispatched to the
//! [`DirectiveRegistry`]; other non-blank line runs become paragraphs.

use crate::directive::parser::{ParsedDirective, parse_line};
use crate::directive::{
    Directive, DirectiveArgs, DirectiveCall, DirectiveContext, DirectiveError, DirectiveRegistry,
    parse_options,
};
use crate::doctree::{Document, Element, Node, NodeKind};
use crate::environment::BuildEnvironment;
use crate::options::OptionSpec;
use crate::warnings::Warnings;

/// Reads documents with a fixed set of directives.
pub struct Reader<'a> {
    directives: &'a DirectiveRegistry,
}

impl<'a> Reader<'a> {
    #[must_use]
    pub fn new(directives: &'a DirectiveRegistry) -> Self {
        Self { directives }
    }

    /// Parse `source` as document `docname`.
    ///
    /// Directive failures are reported to `warnings` and leave a system
    /// message in the tree; they never abort the document.
    pub fn read(
        &self,
        docname: &str,
        source: &str,
        env: &mut BuildEnvironment,
        warnings: &mut Warnings,
    ) -> Document {
        let mut doc = Document::new(docname);
        let lines: Vec<&str> = source.lines().collect();
        let mut paragraph: Vec<&str> = Vec::new();
        let mut idx = 0;

        while idx < lines.len() {
            let line = lines[idx];
            let lineno = idx + 1;
            idx += 1;

            match parse_line(line) {
                Some(ParsedDirective::Leaf { name, args }) => {
                    flush_paragraph(&mut paragraph, &mut doc.children);
                    let nodes = self.run_directive(
                        docname,
                        &name,
                        args,
                        Vec::new(),
                        lineno,
                        env,
                        warnings,
                    );
                    doc.children.extend(nodes);
                }
                Some(ParsedDirective::ContainerStart {
                    name,
                    args,
                    colon_count,
                }) => {
                    flush_paragraph(&mut paragraph, &mut doc.children);
                    let mut content = Vec::new();
                    let mut closed = false;
                    while idx < lines.len() {
                        let body_line = lines[idx];
                        idx += 1;
                        if matches!(
                            parse_line(body_line),
                            Some(ParsedDirective::ContainerEnd { colon_count: n }) if n == colon_count
                        ) {
                            closed = true;
                            break;
                        }
                        content.push(body_line.to_owned());
                    }
                    if !closed {
                        warnings.warn(format!(
                            "{}: unclosed \"{name}\" directive",
                            location(env, docname, lineno)
                        ));
                    }
                    let nodes =
                        self.run_directive(docname, &name, args, content, lineno, env, warnings);
                    doc.children.extend(nodes);
                }
                Some(ParsedDirective::ContainerEnd { .. }) | None => {
                    if line.trim().is_empty() {
                        flush_paragraph(&mut paragraph, &mut doc.children);
                    } else {
                        paragraph.push(line.trim());
                    }
                }
            }
        }
        flush_paragraph(&mut paragraph, &mut doc.children);
        doc
    }

    #[allow(clippy::too_many_arguments)]
    fn run_directive(
        &self,
        docname: &str,
        name: &str,
        args: DirectiveArgs,
        content: Vec<String>,
        line: usize,
        env: &mut BuildEnvironment,
        warnings: &mut Warnings,
    ) -> Vec<Node> {
        let here = location(env, docname, line);

        let (Some(directive), Some(spec)) =
            (self.directives.get(name), self.directives.option_spec(name))
        else {
            let message = format!("Unknown directive type \"{name}\".");
            warnings.warn(format!("{here}: {message}"));
            return vec![system_message(&message, line)];
        };

        let result = invoke(directive.as_ref(), &spec, name, args, content, line, docname, env);

        match result {
            Ok(nodes) => nodes,
            Err(DirectiveError::Warning(message)) => {
                warnings.warn(format!("{here}: {message}"));
                vec![system_message(&message, line)]
            }
            Err(e) => {
                let message = format!("Error in \"{name}\" directive:\n{e}");
                warnings.warn(format!("{here}: {message}"));
                vec![system_message(&message, line)]
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn invoke(
    directive: &dyn Directive,
    spec: &OptionSpec,
    name: &str,
    args: DirectiveArgs,
    content: Vec<String>,
    line: usize,
    docname: &str,
    env: &mut BuildEnvironment,
) -> Result<Vec<Node>, DirectiveError> {
    if !content.is_empty() && !directive.has_content() {
        return Err(DirectiveError::UnexpectedContent);
    }
    let options = parse_options(spec, &args.options)?;
    let call = DirectiveCall {
        name: name.to_owned(),
        argument: args.argument,
        options,
        content,
        line,
    };
    let mut ctx = DirectiveContext { docname, env };
    directive.run(&call, &mut ctx)
}

fn location(env: &BuildEnvironment, docname: &str, line: usize) -> String {
    format!("{docname}{}:{line}", env.source_suffix())
}

fn system_message(message: &str, line: usize) -> Node {
    Element::new(NodeKind::SystemMessage)
        .with_attr("level", "warning")
        .with_attr("line", line)
        .with_child(Node::Text(message.to_owned()))
        .into()
}

fn flush_paragraph(lines: &mut Vec<&str>, out: &mut Vec<Node>) {
    if lines.is_empty() {
        return;
    }
    let text = lines.join(" ");
    lines.clear();
    out.push(
        Element::new(NodeKind::Paragraph)
            .with_child(Node::Text(text))
            .into(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::path::PathBuf;

    fn read(source: &str) -> (Document, Vec<String>) {
        let registry = DirectiveRegistry::with_builtins();
        let mut env = BuildEnvironment::new(PathBuf::from("/src"));
        let mut warnings = Warnings::new();
        let doc = Reader::new(&registry).read("index", source, &mut env, &mut warnings);
        (doc, warnings.into_vec())
    }

    #[test]
    fn test_paragraphs() {
        let (doc, warnings) = read("Hello\nworld.\n\nSecond paragraph.\n");
        assert!(warnings.is_empty());
        let paragraphs = doc.find_all(NodeKind::Paragraph);
        assert_eq!(paragraphs.len(), 2);
        assert_eq!(paragraphs[0].text(), "Hello world.");
    }

    #[test]
    fn test_leaf_image() {
        let (doc, warnings) = read("Intro\n::image[a.png]{alt=\"An image\" width=200px}\nOutro\n");
        assert!(warnings.is_empty());
        assert_eq!(doc.children.len(), 3);

        let image = doc.find_all(NodeKind::Image)[0];
        assert_eq!(image.uri(), Some("a.png"));
        assert_eq!(image.get("alt"), Some(&json!("An image")));
        assert_eq!(image.get("width"), Some(&json!("200px")));
    }

    #[test]
    fn test_container_figure() {
        let source = ":::figure[a.png]{#arch}\nArchitecture overview.\n:::\nAfter.\n";
        let (doc, warnings) = read(source);
        assert!(warnings.is_empty());

        let figure = doc.find_all(NodeKind::Figure)[0];
        assert_eq!(figure.get("names"), Some(&json!(["arch"])));
        assert_eq!(doc.find_all(NodeKind::Caption)[0].text(), "Architecture overview.");
        assert_eq!(doc.find_all(NodeKind::Paragraph).len(), 1);
    }

    #[test]
    fn test_unknown_directive() {
        let (doc, warnings) = read("::youtube[xyz]\n");
        assert_eq!(warnings, vec!["index.txt:1: Unknown directive type \"youtube\"."]);
        assert_eq!(doc.find_all(NodeKind::SystemMessage).len(), 1);
    }

    #[test]
    fn test_invalid_option_reports_and_continues() {
        let (doc, warnings) = read("::image[a.png]{scale=big}\n::image[b.png]\n");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("index.txt:1: Error in \"image\" directive:"));
        assert_eq!(doc.find_all(NodeKind::Image).len(), 1);
    }

    #[test]
    fn test_unknown_option() {
        let (_, warnings) = read("::image[a.png]{dpi=96}\n");
        assert!(warnings[0].contains("unknown option: \"dpi\""));
    }

    #[test]
    fn test_body_on_leaf_only_directive() {
        let (_, warnings) = read(":::image[a.png]\ntext\n:::\n");
        assert!(warnings[0].contains("no content permitted"));
    }

    #[test]
    fn test_unclosed_container() {
        let (doc, warnings) = read(":::figure[a.png]\nCaption\n");
        assert_eq!(warnings, vec!["index.txt:1: unclosed \"figure\" directive"]);
        assert_eq!(doc.find_all(NodeKind::Caption)[0].text(), "Caption");
    }

    #[test]
    fn test_nested_container_with_more_colons() {
        let source = "::::figure[a.png]\nCaption\n\nLegend text\n:::\n::::\n";
        let (doc, warnings) = read(source);
        assert!(warnings.is_empty());
        assert_eq!(doc.find_all(NodeKind::Legend).len(), 1);
    }
}
