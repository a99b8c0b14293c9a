//! Trait definition for bid adapters.

use error_stack::Report;

use crate::error::AdapterError;

use super::types::{
    BidRequest, BidResponse, BidderRequest, MediaType, ServerRequest, ServerResponse, SyncOptions,
    TimeoutData, UserSync, WonBid,
};

/// Trait implemented by every demand-source adapter.
///
/// The host owns the auction: it filters bid requests through
/// [`BidAdapter::is_bid_request_valid`], sends whatever
/// [`BidAdapter::build_requests`] returns, and feeds the responses back
/// through [`BidAdapter::interpret_response`]. Lifecycle callbacks are
/// notifications only; adapters must not fail the auction from them.
pub trait BidAdapter: Send + Sync {
    /// Bidder code used to match ad unit bids to this adapter (e.g. "amx").
    fn code(&self) -> &'static str;

    /// Media types this adapter can bid on.
    fn supported_media_types(&self) -> &'static [MediaType] {
        &[MediaType::Banner]
    }

    /// Check the adapter-specific params of a single bid request.
    fn is_bid_request_valid(&self, bid: &BidRequest) -> bool;

    /// Translate the valid bid requests into one outbound request.
    ///
    /// # Errors
    ///
    /// Returns an error when the payload cannot be assembled.
    fn build_requests(
        &self,
        bids: &[BidRequest],
        bidder_request: &BidderRequest,
    ) -> Result<ServerRequest, Report<AdapterError>>;

    /// Parse a demand response into normalized bids.
    ///
    /// Malformed or empty responses yield no bids rather than an error.
    fn interpret_response(
        &self,
        response: &ServerResponse,
        request: &ServerRequest,
    ) -> Vec<BidResponse>;

    /// User-sync pixels advertised by the demand responses.
    fn get_user_syncs(
        &self,
        _options: &SyncOptions,
        _responses: &[ServerResponse],
    ) -> Vec<UserSync> {
        Vec::new()
    }

    /// Called with the bids that timed out.
    fn on_timeout(&self, _timed_out: &[TimeoutData]) {}

    /// Called when one of this adapter's bids wins the auction.
    fn on_bid_won(&self, _bid: &WonBid) {}

    /// Called when ad server targeting is set for one of this adapter's bids.
    fn on_set_targeting(&self, _bid: &WonBid) {}
}
