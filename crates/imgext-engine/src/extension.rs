//! Extension hooks.
//!
//! An [`Extension`] is called at three points of a build:
//!
//! 1. `builder_inited`: once, before the first document is read
//! 2. `doctree_read`: per document, right after parsing
//! 3. `doctree_resolved`: per document, right before writing

use std::any::Any;

use crate::builder::BuilderInfo;
use crate::directive::DirectiveRegistry;
use crate::doctree::Document;
use crate::environment::BuildEnvironment;
use crate::warnings::Warnings;

/// What an extension sees while processing one document.
pub struct BuildContext<'a> {
    pub env: &'a mut BuildEnvironment,
    pub builder: &'a BuilderInfo,
    pub docname: &'a str,
    pub warnings: &'a mut Warnings,
}

/// Build hooks. Every method defaults to a no-op.
pub trait Extension: Any + Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    fn builder_inited(&mut self, _directives: &mut DirectiveRegistry) {}

    fn doctree_read(&mut self, _ctx: &mut BuildContext<'_>, _doc: &mut Document) {}

    fn doctree_resolved(&mut self, _ctx: &mut BuildContext<'_>, _doc: &mut Document) {}
}
