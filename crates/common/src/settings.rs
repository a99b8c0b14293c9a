//! Settings loading and per-integration configuration lookup.
//!
//! Settings come from a TOML document merged with environment variables
//! prefixed with `AMX_ADAPTER__`. For example
//! `AMX_ADAPTER__INTEGRATIONS__AMX__ENDPOINT` overrides
//! `integrations.amx.endpoint`.

use std::collections::HashMap;
use std::str;
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use error_stack::{Report, ResultExt};
use log::LevelFilter;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use validator::Validate;

use crate::constants::{ENV_PREFIX, ENV_SEPARATOR};
use crate::error::AdapterError;

/// Implemented by every `[integrations.<id>]` configuration type.
pub trait IntegrationConfig {
    fn is_enabled(&self) -> bool;
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    #[must_use]
    pub fn to_level_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Logging {
    #[serde(default)]
    pub level: LogLevel,
}

/// Transport settings for fire-and-forget tracking pixels.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct PixelSettings {
    #[serde(default = "default_pixel_timeout_ms")]
    #[validate(range(min = 50, max = 30000))]
    pub timeout_ms: u64,
}

impl Default for PixelSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_pixel_timeout_ms(),
        }
    }
}

fn default_pixel_timeout_ms() -> u64 {
    2000
}

impl PixelSettings {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Raw `[integrations.*]` tables, deserialized lazily by the owning integration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(transparent)]
pub struct IntegrationSettings {
    entries: HashMap<String, JsonValue>,
}

impl IntegrationSettings {
    fn get(&self, integration_id: &str) -> Option<&JsonValue> {
        self.entries.get(integration_id)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub pixels: PixelSettings,
    #[serde(default)]
    pub integrations: IntegrationSettings,
}

impl Settings {
    /// Load the settings embedded at build time, merged with the environment.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] when the embedded TOML or an
    /// environment override cannot be parsed.
    pub fn new() -> Result<Self, Report<AdapterError>> {
        let toml_bytes = include_bytes!("../../../amx-adapter.toml");
        let toml_str = str::from_utf8(toml_bytes).change_context(AdapterError::Configuration {
            message: "embedded amx-adapter.toml is not valid UTF-8".to_string(),
        })?;

        Self::from_toml(toml_str)
    }

    /// Parse settings from a TOML string, applying environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] when the TOML is malformed or
    /// does not match the settings shape.
    pub fn from_toml(toml_str: &str) -> Result<Self, Report<AdapterError>> {
        let environment = Environment::default()
            .prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true);

        let toml = File::from_str(toml_str, FileFormat::Toml);
        let config = Config::builder()
            .add_source(toml)
            .add_source(environment)
            .build()
            .change_context(AdapterError::Configuration {
                message: "failed to build configuration".to_string(),
            })?;

        let settings: Self =
            config
                .try_deserialize()
                .change_context(AdapterError::Configuration {
                    message: "failed to deserialize settings".to_string(),
                })?;

        settings
            .pixels
            .validate()
            .change_context(AdapterError::Configuration {
                message: "invalid [pixels] settings".to_string(),
            })?;

        Ok(settings)
    }

    /// Deserialize and validate the `[integrations.<integration_id>]` table.
    ///
    /// Returns `Ok(None)` when the table is missing or the integration is
    /// disabled.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] when the table does not match
    /// `T` or fails validation.
    pub fn integration_config<T>(
        &self,
        integration_id: &str,
    ) -> Result<Option<T>, Report<AdapterError>>
    where
        T: DeserializeOwned + Validate + IntegrationConfig,
    {
        let Some(raw) = self.integrations.get(integration_id) else {
            return Ok(None);
        };

        let config: T = serde_json::from_value(raw.clone()).change_context(
            AdapterError::Configuration {
                message: format!("invalid configuration for integration '{integration_id}'"),
            },
        )?;

        config
            .validate()
            .change_context(AdapterError::Configuration {
                message: format!("integration '{integration_id}' failed validation"),
            })?;

        if !config.is_enabled() {
            return Ok(None);
        }

        Ok(Some(config))
    }

    /// Names of every configured integration table, sorted.
    #[must_use]
    pub fn integration_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .integrations
            .entries
            .keys()
            .map(String::as_str)
            .collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::amx::AmxConfig;
    use crate::integrations::custom_data::CustomDataConfig;
    use crate::test_support::tests::crate_test_settings_str;

    #[test]
    fn test_settings_new() {
        let settings = Settings::new();
        assert!(settings.is_ok(), "Settings should load from embedded TOML");

        let settings = settings.unwrap();
        assert!(settings.integration_ids().contains(&"amx"));
    }

    #[test]
    fn test_settings_from_valid_toml() {
        let settings = Settings::from_toml(&crate_test_settings_str()).unwrap();

        assert_eq!(settings.logging.level, LogLevel::Debug);
        assert_eq!(settings.pixels.timeout(), Duration::from_millis(500));
        assert_eq!(settings.integration_ids(), vec!["amx", "custom_data"]);

        let amx = settings
            .integration_config::<AmxConfig>("amx")
            .unwrap()
            .expect("amx should be enabled");
        assert_eq!(amx.endpoint, "https://test-amx.example/a/c");
    }

    #[test]
    fn test_settings_empty_toml_uses_defaults() {
        let settings = Settings::from_toml("").unwrap();

        assert_eq!(settings.logging.level, LogLevel::Info);
        assert_eq!(settings.pixels.timeout_ms, 2000);
        assert!(settings.integration_ids().is_empty());
    }

    #[test]
    fn test_settings_invalid_toml_syntax() {
        let toml_str = r#"
            [logging
            level = "info"
            "#;

        let settings = Settings::from_toml(toml_str);
        assert!(settings.is_err(), "Should fail with invalid TOML syntax");
    }

    #[test]
    fn test_settings_unknown_log_level() {
        let toml_str = r#"
            [logging]
            level = "chatty"
            "#;

        assert!(Settings::from_toml(toml_str).is_err());
    }

    #[test]
    fn test_settings_rejects_out_of_range_pixel_timeout() {
        let toml_str = r#"
            [pixels]
            timeout_ms = 0
            "#;

        assert!(Settings::from_toml(toml_str).is_err());
    }

    #[test]
    fn test_integration_config_missing_table() {
        let settings = Settings::from_toml("").unwrap();
        let config = settings.integration_config::<AmxConfig>("amx").unwrap();
        assert!(config.is_none());
    }

    #[test]
    fn test_integration_config_disabled() {
        let toml_str = r#"
            [integrations.custom_data]
            enabled = false
            cookie_name = "pub_data"
            "#;

        let settings = Settings::from_toml(toml_str).unwrap();
        let config = settings
            .integration_config::<CustomDataConfig>("custom_data")
            .unwrap();
        assert!(config.is_none());
    }

    #[test]
    fn test_integration_config_fails_validation() {
        let toml_str = r#"
            [integrations.amx]
            endpoint = "not a url"
            "#;

        let settings = Settings::from_toml(toml_str).unwrap();
        let result = settings.integration_config::<AmxConfig>("amx");
        assert!(result.is_err(), "invalid endpoint should be rejected");
    }

    #[test]
    fn test_set_env() {
        temp_env::with_var(
            "AMX_ADAPTER__INTEGRATIONS__AMX__ENDPOINT",
            Some("https://override.example/a/c"),
            || {
                let settings = Settings::from_toml(&crate_test_settings_str()).unwrap();
                let amx = settings
                    .integration_config::<AmxConfig>("amx")
                    .unwrap()
                    .expect("amx should be enabled");
                assert_eq!(amx.endpoint, "https://override.example/a/c");
            },
        );
    }

    #[test]
    fn test_env_disables_integration() {
        temp_env::with_var(
            "AMX_ADAPTER__INTEGRATIONS__CUSTOM_DATA__ENABLED",
            Some("false"),
            || {
                let settings = Settings::from_toml(&crate_test_settings_str()).unwrap();
                let config = settings
                    .integration_config::<CustomDataConfig>("custom_data")
                    .unwrap();
                assert!(config.is_none());
            },
        );
    }
}
