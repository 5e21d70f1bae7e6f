//! Converter backed by a configured shell command.
//!
//! `{source}` and `{output}` in the command are replaced by references to the
//! `IMGEXT_SOURCE` and `IMGEXT_OUTPUT` environment variables, so paths never
//! need quoting. Every configured option present on the node is exported as
//! `IMGEXT_OPT_<NAME>`.

use std::path::Path;
use std::process::Command;

use imgext_config::ImageTypeConfig;
use imgext_engine::Element;
use imgext_engine::options::{self, OptionSpec};
use imgext_helper::{
    ConverterClass, DEFAULT_OUTPUT_EXTENSION, Diagnostics, ImageConverter, default_output_filename,
};

const SOURCE_VAR: &str = "IMGEXT_SOURCE";
const OUTPUT_VAR: &str = "IMGEXT_OUTPUT";
const OPTION_VAR_PREFIX: &str = "IMGEXT_OPT_";

#[derive(Debug, Clone)]
pub(crate) struct CommandConverter {
    name: String,
    command: String,
    output_suffix: String,
    options: Vec<String>,
}

impl CommandConverter {
    pub(crate) fn from_config(config: &ImageTypeConfig) -> Self {
        Self {
            name: config.name.clone(),
            command: config.command.clone(),
            output_suffix: config.output_suffix.clone(),
            options: config.options.clone(),
        }
    }

    /// Converter class for `config`, accepting its options.
    pub(crate) fn class(config: &ImageTypeConfig) -> ConverterClass {
        let converter = Self::from_config(config);
        ConverterClass::new(move |_| Box::new(converter.clone()))
            .with_option_spec(option_spec(&config.options))
    }

    fn shell_command(&self) -> String {
        self.command
            .replace("{source}", &format!("\"${SOURCE_VAR}\""))
            .replace("{output}", &format!("\"${OUTPUT_VAR}\""))
    }
}

/// Spec accepting every name in `names` as a plain string.
pub(crate) fn option_spec(names: &[String]) -> OptionSpec {
    let mut spec = OptionSpec::new();
    for name in names {
        spec.insert(name, options::unchanged);
    }
    spec
}

/// `IMGEXT_OPT_` followed by `name` upper-cased, with other characters as `_`.
fn option_var(name: &str) -> String {
    let suffix: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{OPTION_VAR_PREFIX}{suffix}")
}

impl ImageConverter for CommandConverter {
    fn output_filename(&self, node: &Element) -> String {
        let png = default_output_filename(node.uri().unwrap_or_default());
        let stem = png.strip_suffix(DEFAULT_OUTPUT_EXTENSION).unwrap_or(&png);
        format!("{stem}{}", self.output_suffix)
    }

    fn convert(
        &mut self,
        node: &Element,
        source: &Path,
        dest: &Path,
        diagnostics: &mut Diagnostics<'_>,
    ) -> bool {
        let uri = node.uri().unwrap_or_default();
        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(self.shell_command())
            .env(SOURCE_VAR, source)
            .env(OUTPUT_VAR, dest);
        for name in &self.options {
            if let Some(value) = node.get(name) {
                let value = value.as_str().map_or_else(|| value.to_string(), str::to_owned);
                command.env(option_var(name), value);
            }
        }

        tracing::debug!("{}: running `{}` for {uri}", self.name, self.command);
        let output = match command.output() {
            Ok(output) => output,
            Err(e) => {
                diagnostics.warn(format!("cannot run {} converter: {e}", self.name));
                return false;
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            diagnostics.warn(format!(
                "{} converter failed for {uri} ({}): {}",
                self.name,
                output.status,
                stderr.trim()
            ));
            return false;
        }
        if !dest.exists() {
            diagnostics.warn(format!(
                "{} converter produced no output for {uri}",
                self.name
            ));
            return false;
        }
        true
    }
}
