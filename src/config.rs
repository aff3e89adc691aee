//! Configuration loading for schema-codegen
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (schema-codegen.toml, .schema-codegen.toml, config/schema-codegen.toml)
//! - The user config directory
//! - An explicit file passed on the command line
//! - Environment variables (SCHEMA_CODEGEN__*)
//!
//! ## Example config file (schema-codegen.toml):
//! ```toml
//! [generator]
//! target_language = "kotlin"
//! base_package = "com.example.model"
//! strict_additional_properties = true
//! nested_class_name = "ref_schema"
//!
//! [naming]
//! acronyms = ["ID", "URL"]
//!
//! [class_names]
//! "file:///schemas/person.json" = "Customer"
//!
//! [custom_classes.format.money]
//! class_name = "com.example.Money"
//! capabilities = ["comparable"]
//! ```

use config_crate::{Config, Environment, File};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::codegen::config::CodegenConfig;
use crate::error::Result;

/// File name looked up in the working directory and the user config directory
pub const CONFIG_FILE: &str = "schema-codegen.toml";

/// Prefix of environment overrides (`SCHEMA_CODEGEN__GENERATOR__BASE_PACKAGE=...`)
pub const ENV_PREFIX: &str = "SCHEMA_CODEGEN";

/// Config file in the platform's user config directory, if one is known
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "schema-codegen", "schema-codegen")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

impl CodegenConfig {
    /// Load configuration, layering an optional explicit file over the default locations
    pub fn load_from(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_locations = ["schema-codegen", ".schema-codegen", "config/schema-codegen"];
        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(xdg_config) = user_config_path() {
            if xdg_config.exists() {
                debug!(path = %xdg_config.display(), "loading user config");
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: CodegenConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::config::{NestedClassName, TargetLanguage};
    use crate::error::CodegenError;

    #[test]
    fn test_default_config() {
        let config = CodegenConfig::default();
        assert!(config.generator.derive_package_from_structure);
        assert!(!config.generator.strict_additional_properties);
        assert_eq!(config.generator.target_language, TargetLanguage::Kotlin);
    }

    #[test]
    fn test_serialize_config() {
        let config = CodegenConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[generator]"));
        assert!(toml_str.contains("[naming]"));
    }

    #[test]
    fn test_file_then_environment_layers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codegen.toml");
        std::fs::write(
            &path,
            r#"
[generator]
target_language = "java"
base_package = "com.example"
nested_class_name = "ref_schema"
"#,
        )
        .unwrap();

        let config = CodegenConfig::load_from(Some(path.as_path())).unwrap();
        assert_eq!(config.generator.target_language, TargetLanguage::Java);
        assert_eq!(config.generator.base_package.as_deref(), Some("com.example"));
        assert_eq!(config.generator.nested_class_name, NestedClassName::RefSchema);
        assert!(!config.generator.strict_additional_properties);

        std::env::set_var("SCHEMA_CODEGEN__GENERATOR__STRICT_ADDITIONAL_PROPERTIES", "true");
        let layered = CodegenConfig::load_from(Some(path.as_path()));
        std::env::remove_var("SCHEMA_CODEGEN__GENERATOR__STRICT_ADDITIONAL_PROPERTIES");
        assert!(layered.unwrap().generator.strict_additional_properties);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = CodegenConfig::load_from(Some(dir.path().join("absent.toml").as_path())).unwrap_err();
        assert!(matches!(err, CodegenError::Config(_)));
    }

    #[test]
    fn test_invalid_custom_class_rejected_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codegen.toml");
        std::fs::write(
            &path,
            r#"
[custom_classes.format.money]
class_name = "com.example.9Money"
"#,
        )
        .unwrap();
        let err = CodegenConfig::load_from(Some(path.as_path())).unwrap_err();
        assert!(matches!(err, CodegenError::InvalidCustomClass { .. }));
    }

    #[test]
    fn test_save_round_trips_through_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved.toml");
        let mut config = CodegenConfig::default();
        config.generator.target_language = TargetLanguage::TypeScript;
        config.generator.examples_blocking = true;
        config.save(&path).unwrap();

        let loaded = CodegenConfig::load_from(Some(path.as_path())).unwrap();
        assert_eq!(loaded.generator.target_language, TargetLanguage::TypeScript);
        assert!(loaded.generator.examples_blocking);
    }
}
