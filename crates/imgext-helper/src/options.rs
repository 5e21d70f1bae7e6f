//! `option=` query strings on image nodes.
//!
//! ```text
//! ::dot-image[flow.dot]{option="dpi=96&layout=neato"}
//! ```
//!
//! The string is parsed as `application/x-www-form-urlencoded` data and every
//! name is validated against the option spec of the node's converter.

use std::fmt;

use imgext_engine::options::OptionSpec;
use imgext_engine::{Document, Element, NodeKind, Warnings};
use percent_encoding::percent_decode_str;

use crate::registry::ImageTypeRegistry;

/// Attribute holding the raw query string.
pub const OPTION_ATTR: &str = "option";

/// Non-fatal problem found while applying options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionWarning {
    Unsupported { name: String, uri: String },
    Failed { name: String, uri: String, message: String },
}

impl fmt::Display for OptionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsupported { name, uri } => {
                write!(f, "Unsupported option `{name}` found at {uri}")
            }
            Self::Failed { name, uri, message } => {
                write!(f, "Fail to apply `{name}` option to {uri}:\n{message}")
            }
        }
    }
}

/// Parse a query string into names with all their values.
///
/// Names keep first-seen order and repeated names accumulate values. `+`
/// decodes to a space; pairs with a blank value are dropped.
///
/// ```
/// use imgext_helper::parse_query;
///
/// let parsed = parse_query("dpi=96&label=a+b&dpi=120&empty=");
/// assert_eq!(parsed, vec![
///     ("dpi".to_owned(), vec!["96".to_owned(), "120".to_owned()]),
///     ("label".to_owned(), vec!["a b".to_owned()]),
/// ]);
/// ```
#[must_use]
pub fn parse_query(query: &str) -> Vec<(String, Vec<String>)> {
    let mut parsed: Vec<(String, Vec<String>)> = Vec::new();
    for pair in query.split(['&', ';']) {
        if pair.is_empty() {
            continue;
        }
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        let value = decode(value);
        if value.is_empty() {
            continue;
        }
        let name = decode(name);
        match parsed.iter_mut().find(|(n, _)| *n == name) {
            Some((_, values)) => values.push(value),
            None => parsed.push((name, vec![value])),
        }
    }
    parsed
}

fn decode(component: &str) -> String {
    let spaced = component.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

/// Apply the node's `option` string to its attributes.
///
/// Unknown names are dropped with [`OptionWarning::Unsupported`]. For a known
/// name every value is parsed in order and the last one is kept; the first
/// failure stops that name, leaves its attribute unset and yields
/// [`OptionWarning::Failed`].
pub fn apply_options(node: &mut Element, spec: &OptionSpec) -> Vec<OptionWarning> {
    let Some(query) = node.get_str(OPTION_ATTR).map(str::to_owned) else {
        return Vec::new();
    };
    let uri = node.uri().unwrap_or_default().to_owned();
    let mut warnings = Vec::new();

    for (name, values) in parse_query(&query) {
        let Some(parser) = spec.get(&name) else {
            warnings.push(OptionWarning::Unsupported {
                name,
                uri: uri.clone(),
            });
            continue;
        };

        let mut applied = None;
        let mut failure = None;
        for value in &values {
            match parser(value) {
                Ok(parsed) => applied = Some(parsed),
                Err(e) => {
                    failure = Some(e.to_string());
                    break;
                }
            }
        }

        match (failure, applied) {
            (Some(message), _) => warnings.push(OptionWarning::Failed {
                name,
                uri: uri.clone(),
                message,
            }),
            (None, Some(value)) => node.set(&name, value),
            (None, None) => {}
        }
    }
    warnings
}

/// Validate options on every image and placeholder that carries one.
///
/// The option spec comes from the converter registered for the node; nodes without
/// one get an empty spec, so all their options are unsupported.
pub fn validate_doctree(
    doc: &mut Document,
    registry: &ImageTypeRegistry,
    docname: &str,
    warnings: &mut Warnings,
) {
    let empty = OptionSpec::new();
    doc.for_each_element_mut(|node| {
        if !matches!(node.kind, NodeKind::Image | NodeKind::ImagePlaceholder)
            || node.get(OPTION_ATTR).is_none()
        {
            return;
        }
        let spec = registry
            .for_node(node)
            .map_or(&empty, |t| t.converter.option_spec());
        for warning in apply_options(node, spec) {
            warnings.warn(format!("{docname}: {warning}"));
        }
    });
}
