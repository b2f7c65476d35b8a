//! Configuration management for md2docx.
//!
//! Parses `md2docx.toml` with serde and discovers it in the working directory
//! or its parents. CLI settings are applied on load via [`CliSettings`].
//!
//! ```toml
//! [diagrams]
//! kroki_url = "${KROKI_URL:-https://kroki.io}"
//! dpi = 192
//! timeout_secs = 30
//!
//! [images]
//! max_width = 600
//! max_height = 800
//!
//! [document]
//! page_size = "a4"
//! body_font = "Calibri"
//! font_size = 11
//! code_font = "Consolas"
//!
//! [export]
//! temp_dir = ".md2docx/tmp"
//! ```
//!
//! ## Environment Variable Expansion
//!
//! `${VAR}` expands to the value of VAR and errors if unset;
//! `${VAR:-default}` falls back to the default. Expanded fields:
//! `diagrams.kroki_url` and `export.temp_dir`.

mod expand;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "md2docx.toml";

const DEFAULT_KROKI_URL: &str = "https://kroki.io";
const DEFAULT_DPI: u32 = 192;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// CLI settings that override configuration file values.
///
/// Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override Kroki URL for diagram rendering.
    pub kroki_url: Option<String>,
    /// Override diagram rasterization DPI.
    pub dpi: Option<u32>,
    /// Override the directory for intermediate files.
    pub temp_dir: Option<PathBuf>,
}

/// Application configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Diagram rendering configuration.
    diagrams: DiagramsConfigRaw,
    /// Image size limits.
    pub images: ImagesConfig,
    /// Page and font settings of generated documents.
    pub document: DocumentConfig,
    /// Export configuration (paths are relative strings from TOML).
    export: ExportConfigRaw,

    /// Resolved diagrams configuration (set after loading).
    #[serde(skip)]
    pub diagrams_resolved: DiagramsConfig,
    /// Resolved export configuration (set after loading).
    #[serde(skip)]
    pub export_resolved: ExportConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

/// Raw diagrams configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct DiagramsConfigRaw {
    kroki_url: Option<String>,
    dpi: Option<u32>,
    timeout_secs: Option<u64>,
}

/// Resolved diagram rendering configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramsConfig {
    /// Kroki server URL.
    pub kroki_url: String,
    /// DPI for diagram rasterization.
    pub dpi: u32,
    /// Completion window for one rendering request.
    pub timeout: Duration,
}

impl Default for DiagramsConfig {
    fn default() -> Self {
        Self {
            kroki_url: DEFAULT_KROKI_URL.to_owned(),
            dpi: DEFAULT_DPI,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Image size limits in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            max_width: 600,
            max_height: 800,
        }
    }
}

/// Page and font settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DocumentConfig {
    /// `a4` or `letter`, case-insensitive.
    pub page_size: String,
    pub body_font: String,
    /// Body font size in points.
    pub font_size: f32,
    pub code_font: String,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            page_size: "a4".to_owned(),
            body_font: "Calibri".to_owned(),
            font_size: 11.0,
            code_font: "Consolas".to_owned(),
        }
    }
}

/// Raw export configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct ExportConfigRaw {
    temp_dir: Option<String>,
}

/// Resolved export configuration with absolute paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportConfig {
    /// Directory for intermediate files; the system temp dir when `None`.
    pub temp_dir: Option<PathBuf>,
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`diagrams.kroki_url`").
        field: String,
        /// Error message (e.g., "${`KROKI_URL`} not set").
        message: String,
    },
}

fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

fn require_http_url(url: &str, field: &str) -> Result<(), ConfigError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{field} must start with http:// or https://"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file. Otherwise searches
    /// for `md2docx.toml` in the current directory and its parents, falling
    /// back to defaults. CLI settings take precedence over file values and
    /// the result is validated again after they are applied.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails,
    /// or a value is invalid.
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
            Self::default()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
            config.validate()?;
        }

        Ok(config)
    }

    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(kroki_url) = &settings.kroki_url {
            self.diagrams_resolved.kroki_url.clone_from(kroki_url);
        }
        if let Some(dpi) = settings.dpi {
            self.diagrams_resolved.dpi = dpi;
        }
        if let Some(temp_dir) = &settings.temp_dir {
            self.export_resolved.temp_dir = Some(temp_dir.clone());
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.is_file() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve(config_dir);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` naming the first invalid field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_diagrams()?;
        self.validate_images()?;
        self.validate_document()?;
        Ok(())
    }

    fn validate_diagrams(&self) -> Result<(), ConfigError> {
        const MAX_DPI: u32 = 1000;

        let diagrams = &self.diagrams_resolved;
        require_non_empty(&diagrams.kroki_url, "diagrams.kroki_url")?;
        require_http_url(&diagrams.kroki_url, "diagrams.kroki_url")?;

        if diagrams.dpi == 0 {
            return Err(ConfigError::Validation(
                "diagrams.dpi must be greater than 0".to_owned(),
            ));
        }
        if diagrams.dpi > MAX_DPI {
            return Err(ConfigError::Validation(format!(
                "diagrams.dpi cannot exceed {MAX_DPI}"
            )));
        }
        if diagrams.timeout.is_zero() {
            return Err(ConfigError::Validation(
                "diagrams.timeout_secs must be greater than 0".to_owned(),
            ));
        }
        Ok(())
    }

    fn validate_images(&self) -> Result<(), ConfigError> {
        if self.images.max_width == 0 || self.images.max_height == 0 {
            return Err(ConfigError::Validation(
                "images.max_width and images.max_height must be greater than 0".to_owned(),
            ));
        }
        Ok(())
    }

    fn validate_document(&self) -> Result<(), ConfigError> {
        let document = &self.document;
        if !["a4", "letter"]
            .iter()
            .any(|size| document.page_size.eq_ignore_ascii_case(size))
        {
            return Err(ConfigError::Validation(format!(
                "document.page_size must be \"a4\" or \"letter\", got \"{}\"",
                document.page_size
            )));
        }
        require_non_empty(&document.body_font, "document.body_font")?;
        require_non_empty(&document.code_font, "document.code_font")?;
        if !(document.font_size > 0.0 && document.font_size <= 400.0) {
            return Err(ConfigError::Validation(
                "document.font_size must be between 0 and 400".to_owned(),
            ));
        }
        Ok(())
    }

    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        if let Some(url) = &self.diagrams.kroki_url {
            self.diagrams.kroki_url = Some(expand::expand_env(url, "diagrams.kroki_url")?);
        }
        if let Some(dir) = &self.export.temp_dir {
            self.export.temp_dir = Some(expand::expand_env(dir, "export.temp_dir")?);
        }
        Ok(())
    }

    /// Fill the resolved sections, joining relative paths to `config_dir`.
    fn resolve(&mut self, config_dir: &Path) {
        let defaults = DiagramsConfig::default();
        self.diagrams_resolved = DiagramsConfig {
            kroki_url: self
                .diagrams
                .kroki_url
                .as_deref()
                .map_or(defaults.kroki_url, |url| url.trim_end_matches('/').to_owned()),
            dpi: self.diagrams.dpi.unwrap_or(defaults.dpi),
            timeout: self
                .diagrams
                .timeout_secs
                .map_or(defaults.timeout, Duration::from_secs),
        };
        self.export_resolved = ExportConfig {
            temp_dir: self.export.temp_dir.as_deref().map(|dir| config_dir.join(dir)),
        };
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.diagrams_resolved.kroki_url, "https://kroki.io");
        assert_eq!(config.diagrams_resolved.dpi, 192);
        assert_eq!(config.diagrams_resolved.timeout, Duration::from_secs(30));
        assert_eq!(config.images, ImagesConfig { max_width: 600, max_height: 800 });
        assert_eq!(config.document.page_size, "a4");
        assert_eq!(config.document.body_font, "Calibri");
        assert!(config.export_resolved.temp_dir.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_minimal_config() {
        let mut config: Config = toml::from_str("").unwrap();
        config.resolve(Path::new("/project"));
        assert_eq!(config.diagrams_resolved, DiagramsConfig::default());
        assert_eq!(config.export_resolved, ExportConfig::default());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[diagrams]
kroki_url = "http://localhost:8000/"
dpi = 300
timeout_secs = 5

[images]
max_width = 400
max_height = 300

[document]
page_size = "Letter"
body_font = "Arial"
font_size = 12.5
code_font = "Courier New"

[export]
temp_dir = "build/tmp"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve(Path::new("/project"));

        assert_eq!(
            config.diagrams_resolved,
            DiagramsConfig {
                kroki_url: "http://localhost:8000".to_owned(),
                dpi: 300,
                timeout: Duration::from_secs(5),
            }
        );
        assert_eq!(config.images, ImagesConfig { max_width: 400, max_height: 300 });
        assert_eq!(config.document.page_size, "Letter");
        assert_eq!(config.document.font_size, 12.5);
        assert_eq!(config.document.code_font, "Courier New");
        assert_eq!(
            config.export_resolved.temp_dir,
            Some(PathBuf::from("/project/build/tmp"))
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<Config, _> = toml::from_str("[diagrams]\nkroki = \"x\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[diagrams]\ndpi = 96\n[export]\ntemp_dir = \"tmp\"\n").unwrap();

        let config = Config::load(Some(&path), None).unwrap();

        assert_eq!(config.diagrams_resolved.dpi, 96);
        assert_eq!(config.export_resolved.temp_dir, Some(dir.path().join("tmp")));
        assert_eq!(config.config_path, Some(path));
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let err = Config::load(Some(Path::new("/nonexistent/md2docx.toml")), None).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_load_invalid_file_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("md2docx.toml");
        std::fs::write(&path, "[diagrams]\nkroki_url = \"ftp://kroki\"\n").unwrap();

        let err = Config::load(Some(&path), None).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("diagrams.kroki_url"));
    }

    #[test]
    fn test_cli_settings_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("md2docx.toml");
        std::fs::write(&path, "[diagrams]\nkroki_url = \"https://kroki.io\"\ndpi = 96\n").unwrap();
        let settings = CliSettings {
            kroki_url: Some("http://localhost:8000".to_owned()),
            ..Default::default()
        };

        let config = Config::load(Some(&path), Some(&settings)).unwrap();

        assert_eq!(config.diagrams_resolved.kroki_url, "http://localhost:8000");
        assert_eq!(config.diagrams_resolved.dpi, 96); // Unchanged
    }

    #[test]
    fn test_cli_settings_are_validated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("md2docx.toml");
        std::fs::write(&path, "").unwrap();
        let settings = CliSettings {
            dpi: Some(0),
            ..Default::default()
        };

        let err = Config::load(Some(&path), Some(&settings)).unwrap_err();
        assert!(err.to_string().contains("dpi"));
    }

    #[test]
    fn test_apply_cli_settings_empty() {
        let mut config = Config::default();
        config.apply_cli_settings(&CliSettings::default());
        assert_eq!(config.diagrams_resolved, DiagramsConfig::default());
        assert_eq!(config.export_resolved, ExportConfig::default());
    }

    #[test]
    fn test_expand_env_vars_kroki_url() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::set_var("MD2DOCX_TEST_KROKI", "https://kroki.example.com");
        }

        let toml = r#"
[diagrams]
kroki_url = "${MD2DOCX_TEST_KROKI}"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.expand_env_vars().unwrap();
        config.resolve(Path::new("/project"));

        assert_eq!(config.diagrams_resolved.kroki_url, "https://kroki.example.com");

        unsafe {
            std::env::remove_var("MD2DOCX_TEST_KROKI");
        }
    }

    #[test]
    fn test_expand_env_vars_missing_required_var() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("MD2DOCX_TEST_MISSING_DIR");
        }

        let toml = r#"
[export]
temp_dir = "${MD2DOCX_TEST_MISSING_DIR}"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        let err = config.expand_env_vars().unwrap_err();

        assert!(matches!(err, ConfigError::EnvVar { .. }));
        assert!(err.to_string().contains("export.temp_dir"));
    }

    /// Assert that validation fails with expected substrings in the error message.
    fn assert_validation_error(config: &Config, expected_substrings: &[&str]) {
        let err = config.validate().unwrap_err();
        assert!(
            matches!(err, ConfigError::Validation(_)),
            "Expected ConfigError::Validation, got {err:?}"
        );
        let msg = err.to_string();
        for s in expected_substrings {
            assert!(msg.contains(s), "Expected error to contain '{s}', got: {msg}");
        }
    }

    #[test]
    fn test_validate_kroki_url() {
        let mut config = Config::default();
        config.diagrams_resolved.kroki_url = String::new();
        assert_validation_error(&config, &["kroki_url", "empty"]);

        config.diagrams_resolved.kroki_url = "kroki.io".to_owned();
        assert_validation_error(&config, &["kroki_url", "http"]);
    }

    #[test]
    fn test_validate_dpi_bounds() {
        let mut config = Config::default();
        config.diagrams_resolved.dpi = 0;
        assert_validation_error(&config, &["dpi", "greater than 0"]);

        config.diagrams_resolved.dpi = 2000;
        assert_validation_error(&config, &["dpi", "1000"]);
    }

    #[test]
    fn test_validate_timeout() {
        let mut config = Config::default();
        config.diagrams_resolved.timeout = Duration::ZERO;
        assert_validation_error(&config, &["timeout_secs"]);
    }

    #[test]
    fn test_validate_image_bounds() {
        let mut config = Config::default();
        config.images.max_height = 0;
        assert_validation_error(&config, &["images.max_width"]);
    }

    #[test]
    fn test_validate_document() {
        let mut config = Config::default();
        config.document.page_size = "A5".to_owned();
        assert_validation_error(&config, &["page_size", "A5"]);

        let mut config = Config::default();
        config.document.body_font = "  ".to_owned();
        assert_validation_error(&config, &["body_font"]);

        let mut config = Config::default();
        config.document.font_size = 0.0;
        assert_validation_error(&config, &["font_size"]);
    }
}
