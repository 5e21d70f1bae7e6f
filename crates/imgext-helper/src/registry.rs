//! Type registry: file extension → image type and converter.

use std::collections::BTreeMap;

use imgext_engine::{Element, NodeKind};

use crate::converter::ConverterClass;

/// Attribute naming the image type of a placeholder.
pub const TYPE_ATTR: &str = "imageext_type";

/// A logical image type and its converter.
#[derive(Debug, Clone)]
pub struct ImageType {
    pub name: String,
    pub converter: ConverterClass,
}

/// Registered image types, keyed by normalized extension.
#[derive(Debug, Clone, Default)]
pub struct ImageTypeRegistry {
    by_extension: BTreeMap<String, ImageType>,
}

impl ImageTypeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Map every extension in `extensions` to (`name`, `converter`).
    ///
    /// A later registration for the same extension replaces the earlier one.
    pub fn register(&mut self, name: &str, extensions: impl IntoExtensions, converter: &ConverterClass) {
        for ext in extensions.into_extensions() {
            let ext = normalize_extension(&ext);
            if ext.is_empty() {
                continue;
            }
            tracing::debug!("image type {name} handles .{ext}");
            let previous = self.by_extension.insert(
                ext.clone(),
                ImageType {
                    name: name.to_owned(),
                    converter: converter.clone(),
                },
            );
            if let Some(previous) = previous
                && previous.name != name
            {
                tracing::warn!(".{ext} moved from image type {} to {name}", previous.name);
            }
        }
    }

    #[must_use]
    pub fn get_by_extension(&self, ext: &str) -> Option<&ImageType> {
        self.by_extension.get(&normalize_extension(ext))
    }

    /// Entry for the type called `name`.
    ///
    /// A name registered under several extensions resolves to the entry of
    /// its lexicographically smallest extension.
    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<&ImageType> {
        self.by_extension.values().find(|t| t.name == name)
    }

    /// Type handling the file `uri` points at.
    #[must_use]
    pub fn for_uri(&self, uri: &str) -> Option<&ImageType> {
        uri_extension(uri).and_then(|ext| self.get_by_extension(ext))
    }

    /// Type responsible for `node`.
    ///
    /// Placeholders are looked up by their type name; plain images by the
    /// extension of their `uri`.
    #[must_use]
    pub fn for_node(&self, node: &Element) -> Option<&ImageType> {
        match node.kind {
            NodeKind::ImagePlaceholder => node.get_str(TYPE_ATTR).and_then(|n| self.get_by_name(n)),
            NodeKind::Image => node.uri().and_then(|uri| self.for_uri(uri)),
            _ => None,
        }
    }

    /// Registered extensions, sorted.
    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.by_extension.keys().map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_extension.is_empty()
    }
}

/// Lower-case `ext` without one leading `.`.
#[must_use]
pub fn normalize_extension(ext: &str) -> String {
    let trimmed = ext.trim();
    trimmed.strip_prefix('.').unwrap_or(trimmed).to_lowercase()
}

/// Extension of the last path segment of `uri`, without the dot.
#[must_use]
pub fn uri_extension(uri: &str) -> Option<&str> {
    let name = uri.rsplit('/').next().unwrap_or(uri);
    match name.rfind('.') {
        Some(dot) if dot > 0 => Some(&name[dot + 1..]),
        _ => None,
    }
}

/// One extension or several.
pub trait IntoExtensions {
    fn into_extensions(self) -> Vec<String>;
}

impl IntoExtensions for &str {
    fn into_extensions(self) -> Vec<String> {
        vec![self.to_owned()]
    }
}

impl IntoExtensions for String {
    fn into_extensions(self) -> Vec<String> {
        vec![self]
    }
}

impl<const N: usize> IntoExtensions for [&str; N] {
    fn into_extensions(self) -> Vec<String> {
        self.iter().map(|s| (*s).to_owned()).collect()
    }
}

impl IntoExtensions for &[&str] {
    fn into_extensions(self) -> Vec<String> {
        self.iter().map(|s| (*s).to_owned()).collect()
    }
}

impl IntoExtensions for Vec<&str> {
    fn into_extensions(self) -> Vec<String> {
        self.into_iter().map(str::to_owned).collect()
    }
}

impl IntoExtensions for Vec<String> {
    fn into_extensions(self) -> Vec<String> {
        self
    }
}

impl IntoExtensions for &[String] {
    fn into_extensions(self) -> Vec<String> {
        self.to_vec()
    }
}
