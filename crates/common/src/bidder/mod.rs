//! Bid adapter contract and registry.
//!
//! Adapters themselves live in the `integrations` module
//! (e.g. `crate::integrations::amx`); this module only defines the contract
//! the host speaks and discovers enabled adapters from settings.

use std::collections::BTreeMap;
use std::sync::Arc;

use error_stack::Report;

use crate::error::AdapterError;
use crate::pixel::PixelSink;
use crate::settings::Settings;

pub mod adapter;
pub mod types;

pub use adapter::BidAdapter;
pub use types::{
    AuctionInput, BidRequest, BidResponse, BidderRequest, MediaType, ServerRequest,
    ServerResponse, SyncOptions, SyncType, TimeoutData, UserSync, WonBid,
};

/// Type alias for adapter builder functions.
type AdapterBuilder = fn(&Settings, &Arc<dyn PixelSink>) -> Vec<Arc<dyn BidAdapter>>;

/// Returns the list of all available adapter builder functions.
///
/// Each builder checks the settings for its own integration table and
/// returns the adapters that are enabled.
fn adapter_builders() -> &'static [AdapterBuilder] {
    &[crate::integrations::amx::register_adapters]
}

/// Enabled bid adapters, keyed by bidder code.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: BTreeMap<&'static str, Arc<dyn BidAdapter>>,
}

impl AdapterRegistry {
    pub fn register(&mut self, adapter: Arc<dyn BidAdapter>) {
        let code = adapter.code();
        if self.adapters.insert(code, adapter).is_some() {
            log::warn!("Bid adapter '{code}' registered twice, keeping the latest");
        }
    }

    #[must_use]
    pub fn get(&self, code: &str) -> Option<&Arc<dyn BidAdapter>> {
        self.adapters.get(code)
    }

    #[must_use]
    pub fn codes(&self) -> Vec<&'static str> {
        self.adapters.keys().copied().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

/// Build the adapter registry for the current settings.
///
/// # Arguments
/// * `settings` - Application settings holding the `[integrations.*]` tables
/// * `pixels` - Transport shared by every adapter for tracking pixels
#[must_use]
pub fn build_adapter_registry(
    settings: &Settings,
    pixels: &Arc<dyn PixelSink>,
) -> AdapterRegistry {
    log::info!("Building bid adapter registry");

    let mut registry = AdapterRegistry::default();
    for builder in adapter_builders() {
        for adapter in builder(settings, pixels) {
            registry.register(adapter);
        }
    }

    log::info!("Bid adapter registry built with {} adapters", registry.len());

    registry
}

/// Drop the bids `adapter` rejects, then build its server request.
///
/// # Errors
///
/// Returns [`AdapterError::InvalidRequest`] when no bid survives validation,
/// or the adapter's own error when building fails.
pub fn build_valid_request(
    adapter: &dyn BidAdapter,
    input: &AuctionInput,
) -> Result<ServerRequest, Report<AdapterError>> {
    let valid: Vec<BidRequest> = input
        .bids
        .iter()
        .filter(|bid| adapter.is_bid_request_valid(bid))
        .cloned()
        .collect();

    let dropped = input.bids.len() - valid.len();
    if dropped > 0 {
        log::warn!("Dropped {dropped} invalid '{}' bid requests", adapter.code());
    }

    if valid.is_empty() {
        return Err(Report::new(AdapterError::InvalidRequest {
            message: format!("no valid bid requests for '{}'", adapter.code()),
        }));
    }

    adapter.build_requests(&valid, &input.bidder_request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::RecordingPixelSink;
    use crate::test_support::tests::{
        create_test_settings, sample_bid_request_base, sample_bidder_request, SAMPLE_REQUEST_ID,
    };
    use serde_json::json;

    #[test]
    fn registry_discovers_enabled_adapters() {
        let pixels: Arc<dyn PixelSink> = Arc::new(RecordingPixelSink::new());
        let registry = build_adapter_registry(&create_test_settings(), &pixels);

        assert_eq!(registry.codes(), vec!["amx"]);
        assert!(registry.get("amx").is_some());
        assert!(registry.get("other").is_none());
    }

    #[test]
    fn build_valid_request_filters_invalid_bids() {
        let pixels: Arc<dyn PixelSink> = Arc::new(RecordingPixelSink::new());
        let registry = build_adapter_registry(&create_test_settings(), &pixels);
        let adapter = registry.get("amx").unwrap();

        let mut invalid = sample_bid_request_base();
        invalid.bid_id = "bad".to_string();
        invalid.params = json!({ "tagId": 12 });

        let input = AuctionInput {
            bids: vec![invalid, sample_bid_request_base()],
            bidder_request: sample_bidder_request(),
        };

        let request = build_valid_request(adapter.as_ref(), &input).unwrap();
        let slots = request.data["m"].as_object().unwrap();
        assert_eq!(slots.len(), 1);
        assert!(slots.contains_key(SAMPLE_REQUEST_ID));
    }

    #[test]
    fn build_valid_request_without_valid_bids() {
        let pixels: Arc<dyn PixelSink> = Arc::new(RecordingPixelSink::new());
        let registry = build_adapter_registry(&create_test_settings(), &pixels);
        let adapter = registry.get("amx").unwrap();

        let err = build_valid_request(adapter.as_ref(), &AuctionInput::default())
            .expect_err("empty input should fail");
        assert!(matches!(
            err.current_context(),
            AdapterError::InvalidRequest { .. }
        ));
    }

    #[test]
    fn registry_is_empty_without_integrations() {
        let pixels: Arc<dyn PixelSink> = Arc::new(RecordingPixelSink::new());
        let settings = Settings::from_toml("").unwrap();
        let registry = build_adapter_registry(&settings, &pixels);

        assert!(registry.is_empty());
    }
}
