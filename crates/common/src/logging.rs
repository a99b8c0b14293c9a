use error_stack::{Report, ResultExt};
use log::LevelFilter;

use crate::error::AdapterError;

/// Initialize logging for the application.
/// Should be called once at the start of `main()`.
///
/// # Errors
///
/// Returns [`AdapterError::Logging`] when a global logger is already installed.
pub fn init_logging(level: LevelFilter) -> Result<(), Report<AdapterError>> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}  {} {}",
                chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
                record.level(),
                message
            ));
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()
        .change_context(AdapterError::Logging {
            message: "failed to install logger".to_string(),
        })
}

/// Log level helper to determine if debug logging is enabled
#[must_use]
pub fn is_debug_enabled() -> bool {
    log::log_enabled!(log::Level::Debug)
}
