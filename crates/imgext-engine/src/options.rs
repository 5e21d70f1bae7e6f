//! Directive option parsers.
//!
//! An [`OptionSpec`] maps each option name a directive accepts to a parser
//! that turns the raw string into a typed [`Value`]. The same specs validate
//! `option=` query strings on image nodes.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// Error produced by an option parser.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OptionError {
    #[error("argument required but none supplied")]
    Missing,
    #[error("{0}")]
    Invalid(String),
}

/// Parses one raw option value.
pub type OptionParser = Arc<dyn Fn(&str) -> Result<Value, OptionError> + Send + Sync>;

/// Accepted option names and their parsers.
#[derive(Clone, Default)]
pub struct OptionSpec {
    parsers: BTreeMap<String, OptionParser>,
}

impl OptionSpec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with<F>(mut self, name: &str, parser: F) -> Self
    where
        F: Fn(&str) -> Result<Value, OptionError> + Send + Sync + 'static,
    {
        self.insert(name, parser);
        self
    }

    pub fn insert<F>(&mut self, name: &str, parser: F)
    where
        F: Fn(&str) -> Result<Value, OptionError> + Send + Sync + 'static,
    {
        self.parsers.insert(name.to_owned(), Arc::new(parser));
    }

    pub fn insert_parser(&mut self, name: &str, parser: OptionParser) {
        self.parsers.insert(name.to_owned(), parser);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&OptionParser> {
        self.parsers.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.parsers.contains_key(name)
    }

    /// Merge `other` into `self`; entries of `other` win.
    pub fn extend(&mut self, other: &OptionSpec) {
        for (name, parser) in &other.parsers {
            self.parsers.insert(name.clone(), Arc::clone(parser));
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.parsers.keys().map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }

    /// Run the parser registered for `name`, `None` when unknown.
    pub fn parse(&self, name: &str, raw: &str) -> Option<Result<Value, OptionError>> {
        self.parsers.get(name).map(|parser| parser(raw))
    }
}

impl fmt::Debug for OptionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.parsers.keys()).finish()
    }
}

/// Units accepted by [`length_or_unitless`].
const LENGTH_UNITS: &[&str] = &["em", "ex", "px", "in", "cm", "mm", "pt", "pc", ""];

/// Any string, including empty.
pub fn unchanged(raw: &str) -> Result<Value, OptionError> {
    Ok(Value::String(raw.to_owned()))
}

/// Any non-empty string.
pub fn unchanged_required(raw: &str) -> Result<Value, OptionError> {
    if raw.is_empty() {
        return Err(OptionError::Missing);
    }
    Ok(Value::String(raw.to_owned()))
}

/// Option without argument; present means `true`.
pub fn flag(raw: &str) -> Result<Value, OptionError> {
    if raw.trim().is_empty() {
        Ok(Value::Bool(true))
    } else {
        Err(OptionError::Invalid(format!(
            "no argument is allowed; \"{raw}\" supplied"
        )))
    }
}

fn parse_int(raw: &str) -> Result<i64, OptionError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(OptionError::Missing);
    }
    trimmed
        .parse::<i64>()
        .map_err(|_| OptionError::Invalid(format!("invalid literal for int(): '{trimmed}'")))
}

/// Integer greater than zero.
pub fn positive_int(raw: &str) -> Result<Value, OptionError> {
    let value = parse_int(raw)?;
    if value < 1 {
        return Err(OptionError::Invalid(
            "negative or zero value; must be positive".to_owned(),
        ));
    }
    Ok(Value::from(value))
}

/// Integer greater than or equal to zero.
pub fn nonnegative_int(raw: &str) -> Result<Value, OptionError> {
    let value = parse_int(raw)?;
    if value < 0 {
        return Err(OptionError::Invalid(
            "negative value; must be positive or zero".to_owned(),
        ));
    }
    Ok(Value::from(value))
}

/// Non-negative integer with an optional trailing `%`.
pub fn percentage(raw: &str) -> Result<Value, OptionError> {
    let trimmed = raw.trim();
    nonnegative_int(trimmed.strip_suffix('%').unwrap_or(trimmed))
}

fn split_measure(raw: &str) -> Option<(&str, &str)> {
    let trimmed = raw.trim();
    let unit_start = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(unit_start);
    let valid_number = !number.is_empty()
        && number.chars().filter(|&c| c == '.').count() <= 1
        && number.chars().any(|c| c.is_ascii_digit());
    valid_number.then(|| (number, unit.trim()))
}

fn measure(raw: &str, units: &[&str]) -> Result<Value, OptionError> {
    if raw.trim().is_empty() {
        return Err(OptionError::Missing);
    }
    match split_measure(raw) {
        Some((number, unit)) if units.contains(&unit) => Ok(Value::String(format!("{number}{unit}"))),
        _ => {
            let listed: Vec<String> = units.iter().map(|u| format!("\"{u}\"")).collect();
            Err(OptionError::Invalid(format!(
                "not a positive measure of one of the following units:\n{}",
                listed.join(" ")
            )))
        }
    }
}

/// Positive measure with an optional CSS length unit.
pub fn length_or_unitless(raw: &str) -> Result<Value, OptionError> {
    measure(raw, LENGTH_UNITS)
}

/// Like [`length_or_unitless`], also accepting `%`.
pub fn length_or_percentage_or_unitless(raw: &str) -> Result<Value, OptionError> {
    let mut units = LENGTH_UNITS.to_vec();
    units.push("%");
    measure(raw, &units)
}

/// Whitespace-separated class names, normalized to identifiers.
pub fn class_option(raw: &str) -> Result<Value, OptionError> {
    if raw.trim().is_empty() {
        return Err(OptionError::Missing);
    }
    let mut classes = Vec::new();
    for word in raw.split_whitespace() {
        let id = make_id(word);
        if id.is_empty() {
            return Err(OptionError::Invalid(format!(
                "cannot make \"{word}\" into a class name"
            )));
        }
        classes.push(Value::String(id));
    }
    Ok(Value::Array(classes))
}

/// Option restricted to one of `choices`, matched case-insensitively.
pub fn choice(
    choices: &'static [&'static str],
) -> impl Fn(&str) -> Result<Value, OptionError> + Send + Sync + 'static {
    move |raw| {
        let value = raw.trim().to_lowercase();
        if let Some(found) = choices.iter().find(|c| **c == value) {
            return Ok(Value::String((*found).to_owned()));
        }
        let listed: Vec<String> = choices.iter().map(|c| format!("\"{c}\"")).collect();
        Err(OptionError::Invalid(format!(
            "\"{}\" unknown; choose from {}",
            raw.trim(),
            listed.join(", ")
        )))
    }
}

/// Lower-case identifier made of alphanumerics and single hyphens.
#[must_use]
pub fn make_id(text: &str) -> String {
    let mut id = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            if pending_dash && !id.is_empty() {
                id.push('-');
            }
            pending_dash = false;
            id.push(c);
        } else {
            pending_dash = true;
        }
    }
    let start = id.find(|c: char| c.is_alphabetic()).unwrap_or(id.len());
    id[start..].to_owned()
}
