use std::path::Path;

use anyhow::{Context, Result};
use asl_core::CodecConfig;
use log::LevelFilter;
use serde::{Deserialize, Serialize};

/// Logger configuration; `RUST_LOG` still wins when set.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoggerConfig {
    pub level_filter: LevelFilter,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level_filter: LevelFilter::Info,
        }
    }
}

/// Contents of the `--config` TOML file.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct ToolConfig {
    pub codec: CodecConfig,
    pub logger: LoggerConfig,
}

/// `ToolConfigBuilder` is a convenience builder to create a `ToolConfig` from code.
#[derive(Default)]
pub struct ToolConfigBuilder {
    config: ToolConfig,
}

impl ToolConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_codec_config(mut self, codec: CodecConfig) -> Self {
        self.config.codec = codec;
        self
    }

    pub fn with_logger_config(mut self, logger: LoggerConfig) -> Self {
        self.config.logger = logger;
        self
    }

    pub fn get(self) -> ToolConfig {
        self.config
    }
}

impl ToolConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Reads the configuration file. `None` means the file does not exist;
    /// the caller falls back to defaults once logging is up.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = Self::from_toml(&text).with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(Some(config))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = ToolConfig::from_toml("[codec]\nstrict = true\n").unwrap();
        assert!(config.codec.strict);
        assert_eq!(config.codec.max_section_size, CodecConfig::default().max_section_size);
        assert_eq!(config.logger.level_filter, LevelFilter::Info);
    }

    #[test]
    fn reads_logger_level() {
        let config = ToolConfig::from_toml("[logger]\nlevel_filter = \"DEBUG\"\n").unwrap();
        assert_eq!(config.logger.level_filter, LevelFilter::Debug);
        assert!(!config.codec.strict);
    }

    #[test]
    fn builder_overrides_defaults() {
        let config = ToolConfigBuilder::new()
            .with_codec_config(CodecConfig::strict())
            .with_logger_config(LoggerConfig {
                level_filter: LevelFilter::Trace,
            })
            .get();
        assert!(config.codec.strict);
        assert_eq!(config.logger.level_filter, LevelFilter::Trace);
    }

    #[test]
    fn missing_file_is_reported_as_none() {
        let config = ToolConfig::load(Path::new("/nonexistent/asltool.toml")).unwrap();
        assert!(config.is_none());
    }

    #[test]
    fn loads_an_existing_file() {
        let path = std::env::temp_dir().join(format!("asltool-{}.toml", std::process::id()));
        std::fs::write(&path, "[codec]\nmax_section_size = 4096\n").unwrap();
        let config = ToolConfig::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.map(|c| c.codec.max_section_size), Some(4096));
    }
}
