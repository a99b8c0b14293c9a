//! Error types shared by the adapter, the ID submodule and the CLI.
//!
//! Fallible operations return `error_stack::Report<AdapterError>` so that
//! callers can attach context while the root cause stays inspectable.

use derive_more::{Display, Error};

#[derive(Debug, Display, Error)]
pub enum AdapterError {
    /// Settings could not be loaded, merged or validated.
    #[display("Configuration error: {message}")]
    Configuration { message: String },

    /// An auction request handed to an adapter could not be translated.
    #[display("Invalid bid request: {message}")]
    InvalidRequest { message: String },

    /// A bid adapter failed while building or interpreting a request.
    #[display("Bid adapter error ({adapter}): {message}")]
    Adapter { adapter: String, message: String },

    /// A tracking pixel could not be built or sent.
    #[display("Pixel error: {message}")]
    Pixel { message: String },

    /// Logger installation failed.
    #[display("Logging error: {message}")]
    Logging { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use error_stack::Report;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            AdapterError::Configuration {
                message: "missing endpoint".to_string()
            }
            .to_string(),
            "Configuration error: missing endpoint"
        );
        assert_eq!(
            AdapterError::Adapter {
                adapter: "amx".to_string(),
                message: "bad payload".to_string()
            }
            .to_string(),
            "Bid adapter error (amx): bad payload"
        );
        assert_eq!(
            AdapterError::InvalidRequest {
                message: "missing bids".to_string()
            }
            .to_string(),
            "Invalid bid request: missing bids"
        );
    }

    #[test]
    fn test_report_keeps_current_context() {
        let report = Report::new(AdapterError::Pixel {
            message: "unreachable".to_string(),
        });
        assert!(matches!(
            report.current_context(),
            AdapterError::Pixel { .. }
        ));
    }
}
