//! TOML configuration file for the CLI.
//!
//! Every key is optional; anything left out keeps the library default.
//! Command-line flags are applied on top of the file.
//!
//! ```toml
//! [engine]
//! profile = "secure"
//! fuel = true
//! epochs = true
//! max_wasm_stack = 1048576
//!
//! [limits]
//! profile = "standard"
//! max_memory_bytes = 67108864
//! initial_fuel = 1000000000
//! timeout_ms = 30000
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use boundary::prelude::*;

/// Parsed configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Engine settings.
    pub engine: EngineSection,
    /// Default guest limits.
    pub limits: LimitsSection,
}

/// Named engine presets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineProfile {
    #[default]
    Default,
    Secure,
    Performance,
}

/// Named guest limit presets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitsProfile {
    Minimal,
    #[default]
    Standard,
    Generous,
}

/// The `[engine]` table. Explicit keys override the profile.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSection {
    pub profile: EngineProfile,
    pub fuel: Option<bool>,
    pub epochs: Option<bool>,
    pub max_wasm_stack: Option<usize>,
    pub debug_info: Option<bool>,
}

/// The `[limits]` table. Explicit keys override the profile.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsSection {
    pub profile: LimitsProfile,
    pub max_memory_bytes: Option<usize>,
    pub max_table_elements: Option<u32>,
    pub initial_fuel: Option<u64>,
    pub timeout_ms: Option<u64>,
}

impl FileConfig {
    /// Read and parse a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Parse configuration from TOML text.
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Load `path` if given, otherwise use defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Engine configuration with file overrides applied.
    pub fn engine_config(&self) -> EngineConfig {
        let section = &self.engine;
        let mut config = match section.profile {
            EngineProfile::Default => EngineConfig::default(),
            EngineProfile::Secure => EngineConfig::secure(),
            EngineProfile::Performance => EngineConfig::performance(),
        };

        if let Some(fuel) = section.fuel {
            config.fuel_enabled = fuel;
        }
        if let Some(epochs) = section.epochs {
            config.epoch_enabled = epochs;
        }
        if let Some(stack) = section.max_wasm_stack {
            config.max_wasm_stack = stack;
        }
        if let Some(debug_info) = section.debug_info {
            config.debug_info = debug_info;
        }
        config
    }

    /// Guest limits with file overrides applied.
    pub fn guest_limits(&self) -> GuestLimits {
        let section = &self.limits;
        let mut limits = match section.profile {
            LimitsProfile::Minimal => GuestLimits::minimal(),
            LimitsProfile::Standard => GuestLimits::standard(),
            LimitsProfile::Generous => GuestLimits::generous(),
        };

        if let Some(bytes) = section.max_memory_bytes {
            limits.max_memory_bytes = bytes;
        }
        if let Some(elements) = section.max_table_elements {
            limits.max_table_elements = elements;
        }
        if let Some(fuel) = section.initial_fuel {
            limits.initial_fuel = fuel;
        }
        if let Some(ms) = section.timeout_ms {
            limits.timeout = Duration::from_millis(ms);
        }
        limits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_defaults() {
        let config = FileConfig::parse("").unwrap();
        let defaults = GuestLimits::default();

        assert!(config.engine_config().fuel_enabled);
        assert_eq!(config.guest_limits().initial_fuel, defaults.initial_fuel);
        assert_eq!(config.guest_limits().timeout, defaults.timeout);
    }

    #[test]
    fn test_overrides() {
        let config = FileConfig::parse(
            r#"
            [engine]
            fuel = false
            max_wasm_stack = 524288

            [limits]
            initial_fuel = 5000
            timeout_ms = 250
        "#,
        )
        .unwrap();

        let engine = config.engine_config();
        assert!(!engine.fuel_enabled);
        assert!(engine.epoch_enabled);
        assert_eq!(engine.max_wasm_stack, 524_288);

        let limits = config.guest_limits();
        assert_eq!(limits.initial_fuel, 5000);
        assert_eq!(limits.timeout, Duration::from_millis(250));
        assert_eq!(limits.max_memory_bytes, GuestLimits::default().max_memory_bytes);
    }

    #[test]
    fn test_profiles() {
        let config = FileConfig::parse(
            r#"
            [engine]
            profile = "performance"
            max_wasm_stack = 65536

            [limits]
            profile = "minimal"
            timeout_ms = 5000
        "#,
        )
        .unwrap();

        let engine = config.engine_config();
        assert!(!engine.fuel_enabled);
        assert_eq!(engine.max_wasm_stack, 65_536);

        let limits = config.guest_limits();
        assert_eq!(limits.initial_fuel, GuestLimits::minimal().initial_fuel);
        assert_eq!(limits.timeout, Duration::from_secs(5));

        assert!(FileConfig::parse("[limits]\nprofile = \"huge\"\n").is_err());
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(FileConfig::parse("[engine]\nturbo = true\n").is_err());
        assert!(FileConfig::parse("[network]\n").is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = FileConfig::load(Path::new("/nonexistent/boundary.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
