//! Directive argument parsing.
//!
//! Parses the `[argument]{#name .class key="value"}` part of a directive line
//! into raw option strings.

/// Raw arguments of a directive occurrence.
///
/// `#id` becomes the `name` option and `.class` entries are collected into a
/// space-separated `class` option, so `{#fig .wide alt="A"}` is equivalent to
/// `{name=fig class=wide alt="A"}`.
///
/// ```
/// use imgext_engine::directive::DirectiveArgs;
///
/// let args = DirectiveArgs::parse("flow.dot", r#"#flow .wide .dark alt="Flow""#);
/// assert_eq!(args.argument, "flow.dot");
/// assert_eq!(args.get("name"), Some("flow"));
/// assert_eq!(args.get("class"), Some("wide dark"));
/// assert_eq!(args.get("alt"), Some("Flow"));
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DirectiveArgs {
    /// Text in brackets, empty when absent.
    pub argument: String,
    /// Options in source order; a repeated key keeps its first position and
    /// its last value.
    pub options: Vec<(String, String)>,
}

impl DirectiveArgs {
    /// Parse the bracket content and the brace content (without delimiters).
    #[must_use]
    pub fn parse(argument: &str, attrs_str: &str) -> Self {
        let mut args = Self {
            argument: argument.trim().to_owned(),
            options: Vec::new(),
        };

        let mut classes: Vec<String> = Vec::new();
        let mut remaining = attrs_str.trim();

        while !remaining.is_empty() {
            remaining = remaining.trim_start();
            if remaining.is_empty() {
                break;
            }

            if let Some(rest) = remaining.strip_prefix('#') {
                let end = token_end(rest);
                args.set("name", &rest[..end]);
                remaining = &rest[end..];
            } else if let Some(rest) = remaining.strip_prefix('.') {
                let end = token_end(rest);
                classes.push(rest[..end].to_owned());
                remaining = &rest[end..];
            } else if let Some((key, value, rest)) = parse_key_value(remaining) {
                args.set(key, value);
                remaining = rest;
            } else if let Some((flag, rest)) = parse_bare_word(remaining) {
                args.set(flag, "");
                remaining = rest;
            } else {
                let skip = remaining.chars().next().map_or(1, char::len_utf8);
                remaining = &remaining[skip..];
            }
        }

        if !classes.is_empty() {
            args.set("class", &classes.join(" "));
        }
        args
    }

    /// Raw value of option `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn set(&mut self, key: &str, value: &str) {
        if let Some(slot) = self.options.iter_mut().find(|(k, _)| k == key) {
            value.clone_into(&mut slot.1);
        } else {
            self.options.push((key.to_owned(), value.to_owned()));
        }
    }
}

fn token_end(s: &str) -> usize {
    s.find(|c: char| c.is_whitespace() || c == '.' || c == '#')
        .unwrap_or(s.len())
}

/// Parse `key="value"`, `key='value'` or `key=value`.
fn parse_key_value(s: &str) -> Option<(&str, &str, &str)> {
    let word_end = s.find(char::is_whitespace).unwrap_or(s.len());
    let eq_pos = s[..word_end].find('=')?;
    let key = s[..eq_pos].trim();

    if key.is_empty() {
        return None;
    }

    let after_eq = &s[eq_pos + 1..];

    if let Some(stripped) = after_eq.strip_prefix('"') {
        let end_quote = stripped.find('"')?;
        Some((key, &stripped[..end_quote], &stripped[end_quote + 1..]))
    } else if let Some(stripped) = after_eq.strip_prefix('\'') {
        let end_quote = stripped.find('\'')?;
        Some((key, &stripped[..end_quote], &stripped[end_quote + 1..]))
    } else {
        let end = after_eq.find(char::is_whitespace).unwrap_or(after_eq.len());
        Some((key, &after_eq[..end], &after_eq[end..]))
    }
}

/// A bare word such as `nowrap` is a flag option with an empty value.
fn parse_bare_word(s: &str) -> Option<(&str, &str)> {
    let end = s.find(char::is_whitespace).unwrap_or(s.len());
    let word = &s[..end];
    word.chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
        .then_some((word, &s[end..]))
        .filter(|(w, _)| !w.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pairs(args: &DirectiveArgs) -> Vec<(&str, &str)> {
        args.options
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }

    #[test]
    fn test_empty_args() {
        let args = DirectiveArgs::parse("", "");
        assert_eq!(args.argument, "");
        assert!(args.options.is_empty());
    }

    #[test]
    fn test_argument_is_trimmed() {
        let args = DirectiveArgs::parse("  flow.dot ", "");
        assert_eq!(args.argument, "flow.dot");
    }

    #[test]
    fn test_options_keep_source_order() {
        let args = DirectiveArgs::parse("a.dot", "width=200px alt='A b' scale=50");
        assert_eq!(
            pairs(&args),
            vec![("width", "200px"), ("alt", "A b"), ("scale", "50")]
        );
    }

    #[test]
    fn test_query_string_value_with_ampersand() {
        let args = DirectiveArgs::parse("a.dot", r#"option="dpi=96&layout=dot""#);
        assert_eq!(args.get("option"), Some("dpi=96&layout=dot"));
    }

    #[test]
    fn test_unquoted_query_string() {
        let args = DirectiveArgs::parse("a.dot", "option=dpi=96&layout=dot alt=x");
        assert_eq!(args.get("option"), Some("dpi=96&layout=dot"));
        assert_eq!(args.get("alt"), Some("x"));
    }

    #[test]
    fn test_id_and_classes() {
        let args = DirectiveArgs::parse("", "#intro .wide .dark");
        assert_eq!(pairs(&args), vec![("name", "intro"), ("class", "wide dark")]);
    }

    #[test]
    fn test_repeated_key_keeps_last_value() {
        let args = DirectiveArgs::parse("", "alt=a width=1 alt=b");
        assert_eq!(pairs(&args), vec![("alt", "b"), ("width", "1")]);
    }

    #[test]
    fn test_bare_flag() {
        let args = DirectiveArgs::parse("", "nowrap alt=x");
        assert_eq!(pairs(&args), vec![("nowrap", ""), ("alt", "x")]);
    }

    #[test]
    fn test_unclosed_quote_is_skipped() {
        let args = DirectiveArgs::parse("", r#"alt="broken"#);
        assert_eq!(args.get("alt"), None);
    }
}
