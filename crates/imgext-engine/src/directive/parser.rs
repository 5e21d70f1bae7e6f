//! Directive line syntax.
//!
//! Block directives occupy a whole line: `::name[argument]{options}` for leaf
//! directives and `:::name[argument]{options}` ... `:::` for directives with
//! a body.

use super::DirectiveArgs;

/// A directive recognized on a source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ParsedDirective {
    /// `::name[argument]{options}`
    Leaf { name: String, args: DirectiveArgs },
    /// `:::name[argument]{options}`
    ContainerStart {
        name: String,
        args: DirectiveArgs,
        colon_count: usize,
    },
    /// `:::`
    ContainerEnd { colon_count: usize },
}

/// Parse a line as a block directive.
///
/// Returns `None` for ordinary text, including lines with trailing text after
/// the closing brace.
pub(crate) fn parse_line(line: &str) -> Option<ParsedDirective> {
    let trimmed = line.trim();
    if !trimmed.starts_with("::") {
        return None;
    }

    let colon_count = trimmed.chars().take_while(|&c| c == ':').count();
    let after_colons = &trimmed[colon_count..];

    if colon_count >= 3 && after_colons.trim().is_empty() {
        return Some(ParsedDirective::ContainerEnd { colon_count });
    }

    let after_colons = after_colons.trim_start();
    let name_end = after_colons
        .find(|c: char| c == '[' || c == '{' || c.is_whitespace())
        .unwrap_or(after_colons.len());

    let name = &after_colons[..name_end];
    if !is_valid_directive_name(name) {
        return None;
    }

    let mut rest = after_colons[name_end..].trim_start();
    let (argument, consumed) = parse_brackets(rest);
    rest = rest[consumed..].trim_start();
    let (attrs, consumed) = parse_braces(rest);
    if !rest[consumed..].trim().is_empty() {
        return None;
    }

    let args = DirectiveArgs::parse(&argument, &attrs);
    let name = name.to_owned();
    Some(if colon_count == 2 {
        ParsedDirective::Leaf { name, args }
    } else {
        ParsedDirective::ContainerStart {
            name,
            args,
            colon_count,
        }
    })
}

/// Names contain only alphanumeric characters, hyphens and underscores.
fn is_valid_directive_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
}

/// Returns (content, `bytes_consumed`) for `[content]`.
fn parse_brackets(s: &str) -> (String, usize) {
    parse_delimited(s, '[', ']')
}

/// Returns (content, `bytes_consumed`) for `{content}`.
fn parse_braces(s: &str) -> (String, usize) {
    parse_delimited(s, '{', '}')
}

fn parse_delimited(s: &str, open: char, close: char) -> (String, usize) {
    if !s.starts_with(open) {
        return (String::new(), 0);
    }

    let mut depth = 0usize;
    for (i, c) in s.char_indices() {
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return (s[1..i].to_owned(), i + 1);
            }
        }
    }
    (String::new(), 0)
}
