//! Host-facing types exchanged with bid adapters.
//!
//! Field names follow the host's camelCase JSON so that auction payloads can
//! be deserialized without translation.

use std::collections::BTreeMap;

use error_stack::{Report, ResultExt};
use http::Method;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

use crate::error::AdapterError;

/// `[width, height]` in pixels.
pub type Size = [u32; 2];

/// Media type enumeration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Banner,
    Video,
    Native,
}

impl MediaType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MediaType::Banner => "banner",
            MediaType::Video => "video",
            MediaType::Native => "native",
        }
    }
}

/// Accepts both a single `[w, h]` pair and a list of pairs.
fn deserialize_sizes<'de, D>(deserializer: D) -> Result<Vec<Size>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SizesRepr {
        One(Size),
        Many(Vec<Size>),
    }

    Ok(match Option::<SizesRepr>::deserialize(deserializer)? {
        Some(SizesRepr::One(size)) => vec![size],
        Some(SizesRepr::Many(sizes)) => sizes,
        None => Vec::new(),
    })
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SizedMediaType {
    #[serde(default, alias = "playerSize", deserialize_with = "deserialize_sizes")]
    pub sizes: Vec<Size>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaTypes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner: Option<SizedMediaType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<SizedMediaType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native: Option<JsonValue>,
}

/// One ad unit's bid request as handed to an adapter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidRequest {
    #[serde(default)]
    pub bidder: String,
    /// Adapter-specific parameters, validated by the adapter itself.
    #[serde(default)]
    pub params: JsonValue,
    #[serde(default, deserialize_with = "deserialize_sizes")]
    pub sizes: Vec<Size>,
    #[serde(default)]
    pub media_types: MediaTypes,
    #[serde(default)]
    pub ad_unit_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub bid_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auction_id: Option<String>,
    /// Decoded user IDs contributed by ID submodules.
    #[serde(default)]
    pub user_id: BTreeMap<String, JsonValue>,
}

impl BidRequest {
    /// A non-null adapter parameter.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&JsonValue> {
        self.params.get(key).filter(|value| !value.is_null())
    }

    #[must_use]
    pub fn has_media_type(&self, media_type: MediaType) -> bool {
        match media_type {
            MediaType::Banner => self.media_types.banner.is_some(),
            MediaType::Video => self.media_types.video.is_some(),
            MediaType::Native => self.media_types.native.is_some(),
        }
    }

    /// Every size declared on the request, top-level sizes first.
    pub fn all_sizes(&self) -> impl Iterator<Item = &Size> {
        let banner = self
            .media_types
            .banner
            .iter()
            .flat_map(|banner| banner.sizes.iter());
        let video = self
            .media_types
            .video
            .iter()
            .flat_map(|video| video.sizes.iter());
        self.sizes.iter().chain(banner).chain(video)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GdprConsent {
    #[serde(default)]
    pub gdpr_applies: Option<bool>,
    #[serde(default)]
    pub consent_string: Option<String>,
    #[serde(default)]
    pub vendor_data: JsonValue,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefererInfo {
    #[serde(default)]
    pub referer: Option<String>,
    #[serde(default)]
    pub canonical_url: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

/// Auction-wide context shared by every bid request of one bidder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidderRequest {
    #[serde(default)]
    pub auction_id: String,
    #[serde(default)]
    pub gdpr_consent: Option<GdprConsent>,
    #[serde(default)]
    pub usp_consent: Option<String>,
    #[serde(default)]
    pub referer_info: Option<RefererInfo>,
    /// Screen dimensions of the page's device, when the host knows them.
    #[serde(default)]
    pub screen: Option<ScreenSize>,
    #[serde(default)]
    pub timeout: Option<u32>,
}

/// One bidder's share of an auction: its ad unit bids plus the shared context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionInput {
    #[serde(default)]
    pub bids: Vec<BidRequest>,
    #[serde(default)]
    pub bidder_request: BidderRequest,
}

impl AuctionInput {
    /// Parse `{"bids": [...], "bidderRequest": {...}}`.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::InvalidRequest`] when the JSON does not match.
    pub fn from_json(raw: &str) -> Result<Self, Report<AdapterError>> {
        serde_json::from_str(raw).change_context(AdapterError::InvalidRequest {
            message: "expected {\"bids\": [...], \"bidderRequest\": {...}}".to_string(),
        })
    }
}

mod method_serde {
    use http::Method;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(method: &Method, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(method.as_str())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Method, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Method::from_bytes(raw.to_ascii_uppercase().as_bytes()).map_err(de::Error::custom)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RequestOptions {
    #[serde(default)]
    pub with_credentials: bool,
}

/// Outbound request an adapter asks the host to send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerRequest {
    #[serde(with = "method_serde")]
    pub method: Method,
    pub url: String,
    pub data: JsonValue,
    #[serde(default)]
    pub options: RequestOptions,
}

/// Raw response body for a [`ServerRequest`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerResponse {
    #[serde(default)]
    pub body: JsonValue,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BidMeta {
    pub advertiser_domains: Vec<String>,
    pub media_type: MediaType,
}

/// Normalized bid handed back to the host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BidResponse {
    pub request_id: String,
    pub cpm: f64,
    pub width: u32,
    pub height: u32,
    pub creative_id: Option<String>,
    pub currency: String,
    pub net_revenue: bool,
    /// Seconds the bid stays usable.
    pub ttl: u32,
    /// Display markup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ad: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vast_xml: Option<String>,
    pub meta: BidMeta,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOptions {
    #[serde(default)]
    pub iframe_enabled: bool,
    #[serde(default)]
    pub pixel_enabled: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SyncType {
    Image,
    Iframe,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserSync {
    #[serde(rename = "type")]
    pub sync_type: SyncType,
    pub url: String,
}

/// A bid that did not answer within the auction timeout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeoutData {
    #[serde(default)]
    pub bidder: String,
    #[serde(default)]
    pub bid_id: String,
    #[serde(default)]
    pub ad_unit_code: String,
    #[serde(default)]
    pub timeout: u32,
    #[serde(default)]
    pub auction_id: Option<String>,
}

/// Winning (or targeted) bid as reported by the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WonBid {
    #[serde(default)]
    pub bidder: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub ad_id: String,
    #[serde(default)]
    pub media_type: Option<MediaType>,
    #[serde(default)]
    pub cpm: f64,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub ad_unit_code: String,
    #[serde(default)]
    pub adserver_targeting: BTreeMap<String, JsonValue>,
}
