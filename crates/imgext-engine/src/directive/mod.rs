//! Block directives.
//!
//! A directive turns one `::name[argument]{options}` occurrence (or a
//! `:::name` ... `:::` block with body lines) into document nodes. Options are
//! validated against the directive's [`OptionSpec`] before
//! [`Directive::run`] is called, so handlers only see typed values.
//!
//! # Example
//!
//! ```
//! use imgext_engine::directive::{
//!     Directive, DirectiveCall, DirectiveContext, DirectiveError, DirectiveRegistry,
//! };
//! use imgext_engine::doctree::{Element, Node, NodeKind};
//! use imgext_engine::options::{self, OptionSpec};
//!
//! struct Note;
//!
//! impl Directive for Note {
//!     fn option_spec(&self) -> OptionSpec {
//!         OptionSpec::new().with("class", options::class_option)
//!     }
//!
//!     fn run(
//!         &self,
//!         call: &DirectiveCall,
//!         _ctx: &mut DirectiveContext<'_>,
//!     ) -> Result<Vec<Node>, DirectiveError> {
//!         let para = Element::new(NodeKind::Paragraph).with_child(Node::Text(call.argument.clone()));
//!         Ok(vec![para.into()])
//!     }
//! }
//!
//! let mut registry = DirectiveRegistry::new();
//! registry.add("note", Note);
//! assert!(registry.option_spec("note").unwrap().contains("class"));
//! ```

mod args;
mod images;
pub(crate) mod parser;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

pub use args::DirectiveArgs;
pub use images::{FigureDirective, ImageDirective, image_element, image_option_spec};

use crate::doctree::Node;
use crate::environment::BuildEnvironment;
use crate::options::{OptionError, OptionParser, OptionSpec};

/// Typed option values of one directive occurrence.
pub type ParsedOptions = BTreeMap<String, Value>;

/// Error raised for a single directive occurrence.
///
/// The reader turns it into a system message and a build warning; the rest
/// of the document is still processed.
#[derive(Debug, thiserror::Error)]
pub enum DirectiveError {
    #[error("unknown option: \"{0}\"")]
    UnknownOption(String),
    #[error("invalid option value: (option: \"{name}\"; value: \"{value}\")\n{source}")]
    InvalidOption {
        name: String,
        value: String,
        source: OptionError,
    },
    #[error("1 argument(s) required, 0 supplied")]
    MissingArgument,
    #[error("no content permitted")]
    UnexpectedContent,
    #[error("{0}")]
    Warning(String),
}

/// One directive occurrence after option validation.
#[derive(Debug, Clone, Default)]
pub struct DirectiveCall {
    pub name: String,
    /// Bracket argument, trimmed.
    pub argument: String,
    pub options: ParsedOptions,
    /// Body lines of a container directive.
    pub content: Vec<String>,
    /// 1-based source line.
    pub line: usize,
}

/// What a directive may see and record while it runs.
pub struct DirectiveContext<'a> {
    pub docname: &'a str,
    pub env: &'a mut BuildEnvironment,
}

/// Handler for one directive name.
pub trait Directive: Send + Sync {
    /// Options accepted by this directive.
    fn option_spec(&self) -> OptionSpec;

    /// Whether a `:::` body is allowed.
    fn has_content(&self) -> bool {
        false
    }

    /// Build the nodes for one occurrence.
    ///
    /// # Errors
    ///
    /// Returns a [`DirectiveError`] to reject this occurrence only.
    fn run(
        &self,
        call: &DirectiveCall,
        ctx: &mut DirectiveContext<'_>,
    ) -> Result<Vec<Node>, DirectiveError>;
}

/// Registered directives by name.
#[derive(Default, Clone)]
pub struct DirectiveRegistry {
    directives: BTreeMap<String, Arc<dyn Directive>>,
    extra_options: BTreeMap<String, OptionSpec>,
}

impl DirectiveRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `image` and `figure` directives.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.add("image", ImageDirective);
        registry.add("figure", FigureDirective);
        registry
    }

    /// Register `directive` under `name`, replacing any previous handler.
    pub fn add(&mut self, name: &str, directive: impl Directive + 'static) {
        self.add_shared(name, Arc::new(directive));
    }

    pub fn add_shared(&mut self, name: &str, directive: Arc<dyn Directive>) {
        if self.directives.insert(name.to_owned(), directive).is_some() {
            tracing::debug!("directive {name} overridden");
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Directive>> {
        self.directives.get(name).cloned()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.directives.contains_key(name)
    }

    /// Accept one more option on an already registered directive name.
    pub fn add_option<F>(&mut self, directive: &str, option: &str, parser: F)
    where
        F: Fn(&str) -> Result<Value, OptionError> + Send + Sync + 'static,
    {
        let parser: OptionParser = Arc::new(parser);
        self.extra_options
            .entry(directive.to_owned())
            .or_default()
            .insert_parser(option, parser);
    }

    /// Full option spec of `name`: its own options plus any added ones.
    #[must_use]
    pub fn option_spec(&self, name: &str) -> Option<OptionSpec> {
        let directive = self.directives.get(name)?;
        let mut spec = directive.option_spec();
        if let Some(extra) = self.extra_options.get(name) {
            spec.extend(extra);
        }
        Some(spec)
    }
}

/// Validate raw option strings against `spec`.
///
/// # Errors
///
/// Returns [`DirectiveError::UnknownOption`] or
/// [`DirectiveError::InvalidOption`] for the first offending option.
pub fn parse_options(
    spec: &OptionSpec,
    raw: &[(String, String)],
) -> Result<ParsedOptions, DirectiveError> {
    let mut parsed = ParsedOptions::new();
    for (name, value) in raw {
        let result = spec
            .parse(name, value)
            .ok_or_else(|| DirectiveError::UnknownOption(name.clone()))?;
        let typed = result.map_err(|source| DirectiveError::InvalidOption {
            name: name.clone(),
            value: value.clone(),
            source,
        })?;
        parsed.insert(name.clone(), typed);
    }
    Ok(parsed)
}
