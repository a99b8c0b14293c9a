//! Configuration commands.
//!
//! Configuration is loaded from TOML files and merged with environment variables
//! prefixed with `AMX_ADAPTER__`. For example, `AMX_ADAPTER__INTEGRATIONS__AMX__ENDPOINT`
//! will override `integrations.amx.endpoint` in the TOML file.

use std::fs;
use std::path::Path;

use amx_adapter_common::integrations::amx::AmxConfig;
use amx_adapter_common::integrations::custom_data::CustomDataConfig;
use amx_adapter_common::settings::Settings;

use crate::error::CliError;

/// Load settings from `file`, or the embedded defaults when no file is given.
///
/// Environment variables prefixed with `AMX_ADAPTER__` override TOML values
/// either way.
pub(crate) fn load_settings(file: Option<&Path>, verbose: bool) -> Result<Settings, CliError> {
    match file {
        Some(path) => {
            if verbose {
                println!("Loading config from: {}", path.display());
                println!("Environment variables with AMX_ADAPTER__ prefix will be merged");
            }
            let content = fs::read_to_string(path)?;
            Ok(Settings::from_toml(&content)?)
        }
        None => Ok(Settings::new()?),
    }
}

/// Enabled state of each configured integration, in id order.
///
/// Fails when a known integration's table does not validate.
pub(crate) fn integration_states(
    settings: &Settings,
) -> Result<Vec<(String, &'static str)>, CliError> {
    let amx_enabled = settings.integration_config::<AmxConfig>("amx")?.is_some();
    let custom_data_enabled = settings
        .integration_config::<CustomDataConfig>("custom_data")?
        .is_some();

    Ok(settings
        .integration_ids()
        .into_iter()
        .map(|id| {
            let state = match id {
                "amx" if amx_enabled => "enabled",
                "custom_data" if custom_data_enabled => "enabled",
                "amx" | "custom_data" => "disabled",
                _ => "unknown",
            };
            (id.to_string(), state)
        })
        .collect())
}

/// Validate configuration file.
///
/// Validates TOML syntax, every known integration table, and merges with
/// environment variables.
pub fn validate(file: &Path, verbose: bool) -> Result<(), CliError> {
    let settings = load_settings(Some(file), verbose)?;
    let states = integration_states(&settings)?;

    println!("Configuration is valid");
    println!("  File: {}", file.display());
    println!("  Log level: {:?}", settings.logging.level);
    println!("  Pixel timeout: {} ms", settings.pixels.timeout_ms);

    println!("\nIntegrations:");
    for (id, state) in &states {
        println!("  - {}: {}", id, state);
    }

    if verbose {
        println!("\nMerged configuration:");
        println!("---");
        println!("{}", toml::to_string_pretty(&settings)?);
        println!("---");
    }

    Ok(())
}
