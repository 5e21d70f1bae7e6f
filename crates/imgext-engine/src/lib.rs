//! Minimal document engine for imgext.
//!
//! The engine reads line-oriented source documents, turns block directives
//! into a typed document tree, lets [`Extension`]s inspect and rewrite that
//! tree, and writes HTML or LaTeX.
//!
//! # Example
//!
//! ```no_run
//! use std::path::PathBuf;
//! use imgext_engine::{Application, OutputFormat};
//!
//! let mut app = Application::new(
//!     PathBuf::from("docs"),
//!     PathBuf::from("_build"),
//!     OutputFormat::Html,
//! );
//! let report = app.build()?;
//! for warning in &report.warnings {
//!     eprintln!("WARNING: {warning}");
//! }
//! # Ok::<(), imgext_engine::BuildError>(())
//! ```

mod application;
pub mod builder;
pub mod directive;
pub mod doctree;
pub mod environment;
pub mod extension;
pub mod options;
mod reader;
pub mod util;
mod warnings;
pub mod writer;

pub use application::{Application, BuildError, BuildReport, DOCTREE_DIR};
pub use builder::{BuilderInfo, OutputFormat};
pub use doctree::{Document, Element, Node, NodeKind, Transform};
pub use environment::BuildEnvironment;
pub use extension::{BuildContext, Extension};
pub use reader::Reader;
pub use warnings::Warnings;
