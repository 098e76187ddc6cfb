use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_SECTION_SIZE: u32 = 256 * 1024 * 1024;

/// Codec configuration shared by the reader, the writer and the style serializer.
/// Please use [`CodecConfigBuilder`] if you want to build it from code.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct CodecConfig {
    /// Turn offset mismatches and failed style/pattern records into errors
    /// instead of skipping to the declared end of the section.
    pub strict: bool,
    /// Upper bound for any size-prefixed section or string.
    pub max_section_size: u32,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            strict: false,
            max_section_size: DEFAULT_MAX_SECTION_SIZE,
        }
    }
}

impl CodecConfig {
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Default::default()
        }
    }
}

/// `CodecConfigBuilder` is a convenience builder to create a `CodecConfig` from code.
#[derive(Default)]
pub struct CodecConfigBuilder {
    config: CodecConfig,
}

impl CodecConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.config.strict = strict;
        self
    }

    pub fn with_max_section_size(mut self, max_section_size: u32) -> Self {
        self.config.max_section_size = max_section_size;
        self
    }

    /// Retrieves the configuration built
    pub fn get(self) -> CodecConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = CodecConfigBuilder::new()
            .with_strict(true)
            .with_max_section_size(1024)
            .get();
        assert!(config.strict);
        assert_eq!(config.max_section_size, 1024);
        assert!(!CodecConfig::default().strict);
    }
}
