//! Configuration management for schema-typegen
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (typegen.toml)
//! - Environment variables (TYPEGEN_*)
//!
//! ## Example config file (typegen.toml):
//! ```toml
//! [codegen]
//! package = "models"
//!
//! [codegen.naming]
//! acronyms = ["ID", "URL", "API"]
//! fallback_name = "Object"
//!
//! [codegen.diagnostics]
//! multiple_types = "error"
//! recursive_reference = "warn"
//!
//! [output]
//! format = "pretty"
//! directory = "generated"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::codegen::CodegenConfig;

/// Main configuration for the CLI and library entry points
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypegenConfig {
    /// Compiler settings
    #[serde(default)]
    pub codegen: CodegenConfig,

    /// Where and how results are written
    #[serde(default)]
    pub output: OutputConfig,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output format (pretty or compact)
    #[serde(default)]
    pub format: OutputFormat,

    /// Directory for batch output; `None` writes next to each schema
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// File extension for written declaration files
    #[serde(default = "default_extension")]
    pub extension: String,
}

/// Output format for JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Compact,
}

fn default_extension() -> String {
    "types.json".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Pretty,
            directory: None,
            extension: default_extension(),
        }
    }
}

impl TypegenConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, with an explicit file layered on top of the defaults
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["typegen.toml", ".typegen.toml", "config/typegen.toml"];
        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(config_dir) =
            directories::ProjectDirs::from("dev", "schema-typegen", "typegen")
        {
            let xdg_config = config_dir.config_dir().join("typegen.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        // TYPEGEN_CODEGEN__PACKAGE=models
        builder = builder.add_source(
            Environment::with_prefix("TYPEGEN")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Output path for the compiled form of `schema_path`
    pub fn output_path(&self, schema_path: &Path) -> PathBuf {
        let stem = schema_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "schema".to_string());
        let file_name = format!("{}.{}", stem, self.output.extension);

        match &self.output.directory {
            Some(dir) => dir.join(file_name),
            None => schema_path.with_file_name(file_name),
        }
    }

    /// Render an output value in the configured format
    pub fn render<T: Serialize>(&self, value: &T) -> serde_json::Result<String> {
        match self.output.format {
            OutputFormat::Pretty => serde_json::to_string_pretty(value),
            OutputFormat::Compact => serde_json::to_string(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::DiagnosticLevel;

    #[test]
    fn test_default_config() {
        let config = TypegenConfig::default();
        assert_eq!(config.codegen.package, "schema");
        assert_eq!(config.output.format, OutputFormat::Pretty);
        assert_eq!(config.output.extension, "types.json");
    }

    #[test]
    fn test_serialize_config() {
        let config = TypegenConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[codegen]"));
        assert!(toml_str.contains("[output]"));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            r#"
[codegen]
package = "models"

[codegen.diagnostics]
multiple_types = "error"

[output]
format = "compact"
"#,
        )
        .unwrap();

        let config = TypegenConfig::load_from(Some(&path)).unwrap();
        assert_eq!(config.codegen.package, "models");
        assert_eq!(config.codegen.diagnostics.multiple_types, DiagnosticLevel::Error);
        assert_eq!(config.output.format, OutputFormat::Compact);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved.toml");

        let mut config = TypegenConfig::default();
        config.codegen.package = "api".to_string();
        config.save(&path).unwrap();

        let loaded = TypegenConfig::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.codegen.package, "api");
    }

    #[test]
    fn test_output_path() {
        let mut config = TypegenConfig::default();
        assert_eq!(
            config.output_path(Path::new("schemas/user.json")),
            PathBuf::from("schemas/user.types.json")
        );

        config.output.directory = Some(PathBuf::from("out"));
        assert_eq!(
            config.output_path(Path::new("schemas/user.json")),
            PathBuf::from("out/user.types.json")
        );
    }
}
