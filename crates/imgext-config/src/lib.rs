//! Configuration management for imgext.
//!
//! Parses `imgext.toml` with serde and discovers it in the current directory
//! or any of its parents. Command-line flags are layered on top through
//! [`CliSettings`].
//!
//! ```toml
//! [build]
//! source_dir = "docs"
//! output_dir = "_build"
//! format = "html"
//!
//! [[image_types]]
//! name = "dot"
//! extensions = [".dot", "gv"]
//! command = "dot -T${DOT_FORMAT:-png} {source} -o {output}"
//! options = ["dpi"]
//! ```
//!
//! `image_types.command` supports `${VAR}` and `${VAR:-default}` expansion.

mod expand;

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "imgext.toml";

/// Placeholders every converter command must reference.
const REQUIRED_PLACEHOLDERS: [&str; 2] = ["{source}", "{output}"];

/// Command-line overrides. Only `Some` values replace configured ones.
#[derive(Debug, Default)]
pub struct CliSettings {
    pub source_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub format: Option<OutputFormat>,
    pub cache_enabled: Option<bool>,
}

/// Writer selected for a build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One HTML page per document, images under `_images/`.
    #[default]
    Html,
    /// One LaTeX file per document, images next to the output.
    Latex,
}

impl std::str::FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "html" => Ok(Self::Html),
            "latex" => Ok(Self::Latex),
            other => Err(ConfigError::Validation(format!(
                "unknown output format '{other}' (valid: html, latex)"
            ))),
        }
    }
}

/// Application configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    build: BuildConfigRaw,
    /// Converters backed by external commands.
    pub image_types: Vec<ImageTypeConfig>,

    /// Resolved build configuration (set after loading).
    #[serde(skip)]
    pub build_resolved: BuildConfig,
    /// Path to the loaded config file, if any.
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BuildConfigRaw {
    source_dir: Option<String>,
    output_dir: Option<String>,
    format: Option<OutputFormat>,
    source_suffix: Option<String>,
    cache_enabled: Option<bool>,
}

/// Build settings with absolute paths.
#[derive(Debug, Default)]
pub struct BuildConfig {
    /// Directory holding the source documents.
    pub source_dir: PathBuf,
    /// Directory receiving rendered documents and generated images.
    pub output_dir: PathBuf,
    pub format: OutputFormat,
    /// Extension of source documents, including the dot.
    pub source_suffix: String,
    /// Whether unchanged documents are skipped on rebuilds.
    pub cache_enabled: bool,
}

/// One `[[image_types]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageTypeConfig {
    /// Logical type name; also prefixes the `-image`/`-figure` directives.
    pub name: String,
    /// Source extensions routed to this converter.
    pub extensions: Vec<String>,
    /// Shell command with `{source}` and `{output}` placeholders.
    pub command: String,
    /// Suffix of generated files.
    #[serde(default = "default_output_suffix")]
    pub output_suffix: String,
    /// Names accepted in `option=` query strings and as directive options.
    #[serde(default)]
    pub options: Vec<String>,
}

fn default_output_suffix() -> String {
    ".png".to_owned()
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Configuration error: {0}")]
    Validation(String),
    #[error("Environment variable error in {field}: {message}")]
    EnvVar { field: String, message: String },
}

impl Config {
    /// Load configuration and apply CLI overrides.
    ///
    /// With an explicit `config_path` the file must exist. Otherwise
    /// `imgext.toml` is searched upwards from the current directory, falling
    /// back to defaults relative to it.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        Ok(config)
    }

    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(source_dir) = &settings.source_dir {
            self.build_resolved.source_dir.clone_from(source_dir);
        }
        if let Some(output_dir) = &settings.output_dir {
            self.build_resolved.output_dir.clone_from(output_dir);
        }
        if let Some(format) = settings.format {
            self.build_resolved.format = format;
        }
        if let Some(cache_enabled) = settings.cache_enabled {
            self.build_resolved.cache_enabled = cache_enabled;
        }
    }

    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    fn default_with_base(base: &Path) -> Self {
        let mut config = Self::default();
        config.resolve_paths(base);
        config
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;
        Ok(config)
    }

    /// Validate `[[image_types]]` entries.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (idx, image_type) in self.image_types.iter().enumerate() {
            let field = format!("image_types[{idx}]");
            if image_type.name.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "{field}.name cannot be empty"
                )));
            }
            if !image_type
                .name
                .chars()
                .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
            {
                return Err(ConfigError::Validation(format!(
                    "{field}.name '{}' may only contain letters, digits, '-' and '_'",
                    image_type.name
                )));
            }
            if image_type
                .extensions
                .iter()
                .all(|ext| ext.trim_start_matches('.').is_empty())
            {
                return Err(ConfigError::Validation(format!(
                    "{field}.extensions must list at least one extension"
                )));
            }
            for placeholder in REQUIRED_PLACEHOLDERS {
                if !image_type.command.contains(placeholder) {
                    return Err(ConfigError::Validation(format!(
                        "{field}.command must contain {placeholder}"
                    )));
                }
            }
        }
        Ok(())
    }

    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        for (idx, image_type) in self.image_types.iter_mut().enumerate() {
            image_type.command =
                expand::expand_env(&image_type.command, &format!("image_types[{idx}].command"))?;
        }
        Ok(())
    }

    fn resolve_paths(&mut self, config_dir: &Path) {
        let resolve = |path: Option<&str>, default: &str| config_dir.join(path.unwrap_or(default));

        self.build_resolved = BuildConfig {
            source_dir: resolve(self.build.source_dir.as_deref(), "docs"),
            output_dir: resolve(self.build.output_dir.as_deref(), "_build"),
            format: self.build.format.unwrap_or_default(),
            source_suffix: self
                .build
                .source_suffix
                .clone()
                .unwrap_or_else(|| ".txt".to_owned()),
            cache_enabled: self.build.cache_enabled.unwrap_or(true),
        };
    }
}
