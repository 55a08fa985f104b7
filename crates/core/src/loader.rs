//! Configuration loading from a YAML file and environment variables.

use crate::config::ConverterConfig;
use crate::error::{ConversionError, Result};
use config::{Config, Environment, File, FileFormat};
use std::path::Path;
use tracing::debug;

/// Environment variable prefix, e.g. `DOC_CONVERTER__OUTPUT__IMAGE_DPI=300`.
pub const ENV_PREFIX: &str = "DOC_CONVERTER";

/// Load configuration from an optional YAML file, then environment overrides.
///
/// Missing sections and keys fall back to their defaults. The result is
/// validated before it is returned.
pub fn load_config(path: Option<&Path>) -> Result<ConverterConfig> {
    load_with_env(path, None)
}

pub(crate) fn load_with_env(
    path: Option<&Path>,
    env: Option<config::Map<String, String>>,
) -> Result<ConverterConfig> {
    let mut builder = Config::builder();

    if let Some(path) = path {
        if !path.exists() {
            return Err(ConversionError::InputNotFound(path.to_path_buf()));
        }
        debug!("Loading configuration from {:?}", path);
        builder = builder.add_source(File::from(path).format(FileFormat::Yaml).required(true));
    }

    let config: ConverterConfig = builder
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true)
                .source(env),
        )
        .build()
        .map_err(|e| ConversionError::InvalidConfig(format!("Failed to build config: {}", e)))?
        .try_deserialize()
        .map_err(|e| {
            ConversionError::InvalidConfig(format!("Failed to deserialize config: {}", e))
        })?;

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ImageFormat;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn yaml_file(contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn no_env() -> Option<config::Map<String, String>> {
        Some(config::Map::new())
    }

    #[test]
    fn test_defaults_without_file() {
        let config = load_with_env(None, no_env()).unwrap();
        assert_eq!(config.output.image_dpi, 200);
        assert_eq!(config.output.image_format, ImageFormat::Jpeg);
        assert!(config.conversion.max_workers > 0);
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let file = yaml_file(
            "output:\n  image_format: png\n  image_dpi: 300\nconversion:\n  max_workers: 2\n",
        );
        let config = load_with_env(Some(file.path()), no_env()).unwrap();
        assert_eq!(config.output.image_format, ImageFormat::Png);
        assert_eq!(config.output.image_dpi, 300);
        assert_eq!(config.output.image_quality, 95);
        assert_eq!(config.conversion.max_workers, 2);
        assert_eq!(config.wkhtmltopdf.page_size, "A4");
    }

    #[test]
    fn test_environment_overrides_file() {
        let file = yaml_file("conversion:\n  max_workers: 2\n");
        let mut env = config::Map::new();
        env.insert(
            "DOC_CONVERTER__CONVERSION__MAX_WORKERS".to_string(),
            "8".to_string(),
        );
        env.insert(
            "DOC_CONVERTER__LOGGING__LEVEL".to_string(),
            "debug".to_string(),
        );
        let config = load_with_env(Some(file.path()), Some(env)).unwrap();
        assert_eq!(config.conversion.max_workers, 8);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let err = load_with_env(Some(Path::new("/nonexistent/doc-converter.yaml")), no_env())
            .unwrap_err();
        assert!(matches!(err, ConversionError::InputNotFound(_)));
    }

    #[test]
    fn test_malformed_yaml_is_invalid_config() {
        let file = yaml_file("output: [this is: not valid\n");
        let err = load_with_env(Some(file.path()), no_env()).unwrap_err();
        assert!(matches!(err, ConversionError::InvalidConfig(_)));
    }

    #[test]
    fn test_out_of_range_values_fail_validation() {
        let file = yaml_file("output:\n  image_quality: 150\n");
        let err = load_with_env(Some(file.path()), no_env()).unwrap_err();
        assert!(matches!(err, ConversionError::InvalidConfig(_)));
    }
}
