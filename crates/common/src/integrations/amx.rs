//! AMX RTB bid adapter.
//!
//! Builds one POST per auction against the AMX endpoint, turns the keyed
//! response back into host bids with tracking pixels folded into the
//! creative, and reports lifecycle events through GET pixels on the AMX
//! tracking host.

use std::collections::BTreeMap;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine as _;
use error_stack::{Report, ResultExt};
use http::Method;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value as JsonValue;
use url::Url;
use uuid::Uuid;
use validator::Validate;

use crate::bidder::types::{BidMeta, RequestOptions};
use crate::bidder::{
    BidAdapter, BidRequest, BidResponse, BidderRequest, MediaType, ServerRequest, ServerResponse,
    SyncOptions, SyncType, TimeoutData, UserSync, WonBid,
};
use crate::constants::DEFAULT_CURRENCY;
use crate::creative::{append_image_pixels, insert_vast_impressions, is_vast_markup};
use crate::error::AdapterError;
use crate::logging::is_debug_enabled;
use crate::pixel::PixelSink;
use crate::query::{append_query, format_qs};
use crate::settings::{IntegrationConfig, Settings};

const AMX_INTEGRATION_ID: &str = "amx";
const BIDDER_CODE: &str = "amx";

const DEFAULT_ENDPOINT: &str = "https://prebid.a-mo.net/a/c";
const DEFAULT_TRACKING_ENDPOINT: &str = "https://1x1.a-mo.net/hbx/";
const ADAPTER_VERSION: &str = "pba1.0";
const SOURCE_TYPE: &str = "prebid";

const DISPLAY_TTL: u32 = 70;
const VIDEO_TTL: u32 = 90;

const DEFAULT_US_PRIVACY: &str = "1---";
const FLOOR: f64 = 0.01;
const SMT: u32 = 9;

/// Sync URLs carrying this marker must be loaded in an iframe.
const IFRAME_SYNC_MARKER: &str = "__st=iframe";

static CO_TLD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.co\.\w{2,4}$").expect("co TLD regex is valid"));

const SUPPORTED_MEDIA_TYPES: &[MediaType] = &[MediaType::Banner, MediaType::Video];

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the AMX bid adapter.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct AmxConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Bid endpoint used when the first bid carries no `params.endpoint`.
    #[serde(default = "default_endpoint")]
    #[validate(url)]
    pub endpoint: String,

    /// Base URL lifecycle pixels are appended to.
    #[serde(default = "default_tracking_endpoint")]
    #[validate(url)]
    pub tracking_endpoint: String,

    /// Host framework version reported as `V`.
    #[serde(default = "default_host_version")]
    pub host_version: String,
}

fn default_enabled() -> bool {
    true
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_tracking_endpoint() -> String {
    DEFAULT_TRACKING_ENDPOINT.to_string()
}

fn default_host_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

impl Default for AmxConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            endpoint: default_endpoint(),
            tracking_endpoint: default_tracking_endpoint(),
            host_version: default_host_version(),
        }
    }
}

impl IntegrationConfig for AmxConfig {
    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

// ============================================================================
// AMX wire types
// ============================================================================

/// Request body posted to the AMX endpoint.
#[derive(Debug, Clone, Serialize)]
struct AmxRequest {
    #[serde(rename = "a")]
    auction_id: String,

    /// Always 0.
    #[serde(rename = "B")]
    bid_flags: u32,

    /// Page host, port included.
    #[serde(rename = "b")]
    host: String,

    #[serde(rename = "tm", serialize_with = "serialize_flag_or_zero")]
    test_mode: Option<bool>,

    #[serde(rename = "V")]
    host_version: String,

    /// Test tag ID, or the base64 of the registrable domain.
    #[serde(rename = "i")]
    site_id: String,

    #[serde(rename = "l")]
    user_ids: BTreeMap<String, JsonValue>,

    #[serde(rename = "f")]
    floor: f64,

    #[serde(rename = "cv")]
    client_version: &'static str,

    #[serde(rename = "st")]
    source_type: &'static str,

    #[serde(rename = "h")]
    screen_height: u32,

    #[serde(rename = "w")]
    screen_width: u32,

    #[serde(rename = "gs", serialize_with = "serialize_flag_or_empty")]
    gdpr_applies: Option<bool>,

    #[serde(rename = "gc")]
    gdpr_consent: String,

    #[serde(rename = "u")]
    page_url: String,

    #[serde(rename = "do")]
    domain: String,

    #[serde(rename = "re", skip_serializing_if = "Option::is_none")]
    referer: Option<String>,

    #[serde(rename = "usp")]
    us_privacy: String,

    smt: u32,

    /// Always empty.
    d: String,

    /// Slot descriptions keyed by bid ID.
    #[serde(rename = "m")]
    slots: BTreeMap<String, AmxSlot>,
}

/// `gs` is the boolean when known and an empty string otherwise.
fn serialize_flag_or_empty<S>(value: &Option<bool>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(flag) => serializer.serialize_bool(*flag),
        None => serializer.serialize_str(""),
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
struct AmxSlot {
    #[serde(rename = "av", default)]
    video: bool,

    #[serde(rename = "aw", default)]
    width: u32,

    #[serde(rename = "ah", default)]
    height: u32,

    #[serde(default)]
    tf: u32,

    #[serde(rename = "i", default, skip_serializing_if = "Option::is_none")]
    tag_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct AmxResponse {
    /// Site bids keyed by bid ID. Entries stay untyped so one malformed bid
    /// cannot reject its siblings.
    #[serde(default)]
    r: BTreeMap<String, JsonValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct AmxBid {
    #[serde(default)]
    adm: Option<String>,

    #[serde(default)]
    price: Option<f64>,

    #[serde(default, deserialize_with = "deserialize_lenient_id")]
    crid: Option<String>,

    #[serde(default)]
    adomain: Option<Vec<String>>,

    #[serde(default)]
    nurl: Option<String>,

    #[serde(default)]
    w: Option<f64>,

    #[serde(default)]
    h: Option<f64>,

    #[serde(default)]
    ext: Option<AmxBidExt>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct AmxBidExt {
    /// Extra impression pixels.
    #[serde(default)]
    himp: Vec<String>,
}

/// Creative IDs come back either as strings or as bare integers.
fn deserialize_lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Visitor};
    use std::fmt;

    struct LenientIdVisitor;

    impl<'de> Visitor<'de> for LenientIdVisitor {
        type Value = Option<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or integer creative id")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_string<E>(self, value: String) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(value))
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(LenientIdVisitor)
}

/// `tm` is the boolean when given and `0` otherwise.
fn serialize_flag_or_zero<S>(value: &Option<bool>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(flag) => serializer.serialize_bool(*flag),
        None => serializer.serialize_u8(0),
    }
}

impl AmxBid {
    /// Parse one response bid. Off-type fields reject only this bid.
    fn from_value(bid_id: &str, value: &JsonValue) -> Option<Self> {
        match serde_json::from_value(value.clone()) {
            Ok(bid) => Some(bid),
            Err(e) => {
                log::debug!("AMX: skipping malformed bid for '{bid_id}': {e}");
                None
            }
        }
    }
}

/// Bid dimensions above one pixel, truncated to whole pixels.
fn bid_dimension(value: Option<f64>) -> Option<u32> {
    value
        .filter(|v| v.is_finite() && *v > 1.0 && *v <= f64::from(u32::MAX))
        .map(|v| v as u32)
}

// ============================================================================
// Page location
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct PageLocation {
    href: String,
    /// Hostname plus non-default port.
    host: String,
    hostname: String,
}

impl PageLocation {
    /// Canonical URL first, then the referer. Unparseable URLs yield an
    /// empty location.
    fn from_bidder_request(bidder_request: &BidderRequest) -> Self {
        let Some(info) = bidder_request.referer_info.as_ref() else {
            return Self::default();
        };

        let candidate = info
            .canonical_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .or(info.referer.as_deref());

        let Some(raw) = candidate else {
            return Self::default();
        };

        match Url::parse(raw) {
            Ok(url) => {
                let hostname = url.host_str().unwrap_or_default().to_string();
                let host = match url.port() {
                    Some(port) => format!("{hostname}:{port}"),
                    None => hostname.clone(),
                };
                Self {
                    href: url.to_string(),
                    host,
                    hostname,
                }
            }
            Err(e) => {
                log::debug!("AMX: could not parse page location '{raw}': {e}");
                Self::default()
            }
        }
    }

    /// Base64 (unpadded) of the last two hostname labels, or three under a
    /// `.co.xx` suffix.
    fn site_id(&self) -> String {
        let labels: Vec<&str> = self.hostname.split('.').collect();
        let keep = if CO_TLD.is_match(&self.hostname) { 3 } else { 2 };
        let domain = labels[labels.len().saturating_sub(keep)..].join(".");
        STANDARD_NO_PAD.encode(domain)
    }
}

// ============================================================================
// Adapter
// ============================================================================

pub struct AmxAdapter {
    config: AmxConfig,
    pixels: Arc<dyn PixelSink>,
}

impl AmxAdapter {
    #[must_use]
    pub fn new(config: AmxConfig, pixels: Arc<dyn PixelSink>) -> Self {
        Self { config, pixels }
    }

    fn slot_for(bid: &BidRequest) -> AmxSlot {
        let [width, height] = largest_size(bid).unwrap_or([0, 0]);
        let tag_id = bid
            .param("tagId")
            .and_then(JsonValue::as_str)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string);

        AmxSlot {
            video: bid.has_media_type(MediaType::Video),
            width,
            height,
            tf: 0,
            tag_id,
        }
    }

    fn to_bid_response(bid_id: &str, bid: &AmxBid, slot: Option<&AmxSlot>) -> Option<BidResponse> {
        let Some(adm) = bid.adm.as_deref() else {
            log::debug!("AMX: skipping bid for '{bid_id}' without markup");
            return None;
        };
        let Some(price) = bid.price else {
            log::debug!("AMX: skipping bid for '{bid_id}' without price");
            return None;
        };

        let nurl = bid.nurl.iter().filter(|url| !url.is_empty());
        let himp = bid
            .ext
            .iter()
            .flat_map(|ext| ext.himp.iter())
            .filter(|url| !url.is_empty());

        let (media_type, ad, vast_xml, ttl) = if is_vast_markup(adm) {
            let pixels: Vec<&String> = nurl.chain(himp).collect();
            (
                MediaType::Video,
                None,
                Some(insert_vast_impressions(adm, &pixels)),
                VIDEO_TTL,
            )
        } else {
            let pixels: Vec<&String> = himp.chain(nurl).collect();
            (
                MediaType::Banner,
                Some(append_image_pixels(adm, &pixels)),
                None,
                DISPLAY_TTL,
            )
        };

        let (width, height) = match (bid_dimension(bid.w), bid_dimension(bid.h)) {
            (Some(w), Some(h)) => (w, h),
            _ => slot.map_or((0, 0), |slot| (slot.width, slot.height)),
        };

        Some(BidResponse {
            request_id: bid_id.to_string(),
            cpm: price,
            width,
            height,
            creative_id: bid.crid.clone(),
            currency: DEFAULT_CURRENCY.to_string(),
            net_revenue: true,
            ttl,
            ad,
            vast_xml,
            meta: BidMeta {
                advertiser_domains: bid.adomain.clone().unwrap_or_default(),
                media_type,
            },
        })
    }

    /// Fire `g_{event}` on the tracking host with `params` plus `ts` and `eid`.
    fn track_event(&self, event: &str, mut params: Vec<(&'static str, String)>) {
        params.push(("ts", chrono::Utc::now().timestamp_millis().to_string()));
        params.push(("eid", Uuid::new_v4().to_string()));

        let mut base = self.config.tracking_endpoint.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        base.push_str("g_");
        base.push_str(event);

        let url = append_query(&base, &format_qs(params));
        log::debug!("AMX: {event} pixel {url}");
        self.pixels.fire(&url);
    }
}

/// Largest-area size across top-level, banner, and video sizes. Ties keep the
/// first size seen.
fn largest_size(bid: &BidRequest) -> Option<[u32; 2]> {
    let area = |size: &[u32; 2]| u64::from(size[0]) * u64::from(size[1]);
    bid.all_sizes().fold(None, |best, size| match best {
        Some(current) if area(&current) >= area(size) => Some(current),
        _ => Some(*size),
    })
}

/// True when a `params` entry is absent or passes `check`.
fn param_has_type(bid: &BidRequest, key: &str, check: fn(&JsonValue) -> bool) -> bool {
    match bid.param(key) {
        Some(value) => check(value),
        None => true,
    }
}

/// Targeting values are sent as text; strings stay bare, other values as JSON.
fn targeting_value(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl BidAdapter for AmxAdapter {
    fn code(&self) -> &'static str {
        BIDDER_CODE
    }

    fn supported_media_types(&self) -> &'static [MediaType] {
        SUPPORTED_MEDIA_TYPES
    }

    fn is_bid_request_valid(&self, bid: &BidRequest) -> bool {
        let valid = param_has_type(bid, "endpoint", JsonValue::is_string)
            && param_has_type(bid, "tagId", JsonValue::is_string)
            && param_has_type(bid, "testMode", JsonValue::is_boolean);

        if !valid {
            log::warn!("AMX: invalid params for bid '{}': {}", bid.bid_id, bid.params);
        }
        valid
    }

    fn build_requests(
        &self,
        bids: &[BidRequest],
        bidder_request: &BidderRequest,
    ) -> Result<ServerRequest, Report<AdapterError>> {
        let first = bids.first();
        let location = PageLocation::from_bidder_request(bidder_request);

        let tag_id = first
            .and_then(|bid| bid.param("tagId"))
            .and_then(JsonValue::as_str);
        let test_mode = first
            .and_then(|bid| bid.param("testMode"))
            .and_then(JsonValue::as_bool);

        let site_id = match tag_id {
            Some(tag_id) if test_mode == Some(true) => tag_id.to_string(),
            _ => location.site_id(),
        };

        let referer_info = bidder_request.referer_info.clone().unwrap_or_default();
        let gdpr = bidder_request.gdpr_consent.clone().unwrap_or_default();
        let screen = bidder_request.screen.unwrap_or_default();

        let slots: BTreeMap<String, AmxSlot> = bids
            .iter()
            .map(|bid| (bid.bid_id.clone(), Self::slot_for(bid)))
            .collect();

        let payload = AmxRequest {
            auction_id: bidder_request.auction_id.clone(),
            bid_flags: 0,
            host: location.host.clone(),
            test_mode,
            host_version: self.config.host_version.clone(),
            site_id,
            user_ids: first.map(|bid| bid.user_id.clone()).unwrap_or_default(),
            floor: FLOOR,
            client_version: ADAPTER_VERSION,
            source_type: SOURCE_TYPE,
            screen_height: screen.height,
            screen_width: screen.width,
            gdpr_applies: gdpr.gdpr_applies,
            gdpr_consent: gdpr.consent_string.unwrap_or_default(),
            page_url: referer_info
                .canonical_url
                .clone()
                .filter(|url| !url.is_empty())
                .unwrap_or_else(|| location.href.clone()),
            domain: location.host,
            referer: referer_info.referer,
            us_privacy: bidder_request
                .usp_consent
                .clone()
                .unwrap_or_else(|| DEFAULT_US_PRIVACY.to_string()),
            smt: SMT,
            d: String::new(),
            slots,
        };

        let data = serde_json::to_value(&payload).change_context(AdapterError::Adapter {
            adapter: BIDDER_CODE.to_string(),
            message: "failed to serialize bid request".to_string(),
        })?;

        if is_debug_enabled() {
            log::debug!("AMX: bid request payload: {data}");
        }

        let url = first
            .and_then(|bid| bid.param("endpoint"))
            .and_then(JsonValue::as_str)
            .unwrap_or(&self.config.endpoint)
            .to_string();

        log::info!("AMX: built request for {} bids to {url}", bids.len());

        Ok(ServerRequest {
            method: Method::POST,
            url,
            data,
            options: RequestOptions {
                with_credentials: true,
            },
        })
    }

    fn interpret_response(
        &self,
        response: &ServerResponse,
        request: &ServerRequest,
    ) -> Vec<BidResponse> {
        let body = &response.body;
        if body.is_null() || body.is_string() {
            log::debug!("AMX: empty response body");
            return Vec::new();
        }

        let parsed: AmxResponse = match serde_json::from_value(body.clone()) {
            Ok(parsed) => parsed,
            Err(e) => {
                log::warn!("AMX: unexpected response shape: {e}");
                return Vec::new();
            }
        };

        let slots: BTreeMap<String, AmxSlot> = request
            .data
            .get("m")
            .cloned()
            .and_then(|m| serde_json::from_value(m).ok())
            .unwrap_or_default();

        let bids: Vec<BidResponse> = parsed
            .r
            .iter()
            .flat_map(|(bid_id, site_bids)| {
                let slot = slots.get(bid_id);
                site_bids
                    .as_array()
                    .into_iter()
                    .flatten()
                    .filter_map(|site_bid| site_bid.get("b")?.as_array())
                    .flatten()
                    .filter_map(move |value| {
                        let bid = AmxBid::from_value(bid_id, value)?;
                        Self::to_bid_response(bid_id, &bid, slot)
                    })
            })
            .collect();

        log::info!("AMX: interpreted {} bids", bids.len());
        bids
    }

    fn get_user_syncs(&self, options: &SyncOptions, responses: &[ServerResponse]) -> Vec<UserSync> {
        responses
            .iter()
            .filter_map(|response| response.body.get("p")?.get("hreq")?.as_array())
            .flatten()
            .filter_map(JsonValue::as_str)
            .filter_map(|url| {
                let sync_type = if url.contains(IFRAME_SYNC_MARKER) {
                    SyncType::Iframe
                } else {
                    SyncType::Image
                };
                (sync_type == SyncType::Image || options.iframe_enabled).then(|| UserSync {
                    sync_type,
                    url: url.to_string(),
                })
            })
            .collect()
    }

    fn on_timeout(&self, timed_out: &[TimeoutData]) {
        for entry in timed_out {
            self.track_event(
                "pbto",
                vec![
                    ("A", entry.bidder.clone()),
                    ("bid", entry.bid_id.clone()),
                    ("a", entry.ad_unit_code.clone()),
                    ("cn", entry.timeout.to_string()),
                    ("aud", entry.auction_id.clone().unwrap_or_default()),
                ],
            );
        }
    }

    fn on_bid_won(&self, bid: &WonBid) {
        let creative_type = if bid.media_type == Some(MediaType::Banner) {
            "0"
        } else {
            "1"
        };

        self.track_event(
            "pbwin",
            vec![
                ("A", bid.bidder.clone()),
                ("w", bid.width.to_string()),
                ("h", bid.height.to_string()),
                ("bid", bid.ad_id.clone()),
                ("C", creative_type.to_string()),
                ("np", bid.cpm.to_string()),
                ("a", bid.ad_unit_code.clone()),
            ],
        );
    }

    fn on_set_targeting(&self, bid: &WonBid) {
        let targeting = format_qs(
            bid.adserver_targeting
                .iter()
                .map(|(key, value)| (key.as_str(), targeting_value(value))),
        );

        self.track_event(
            "pbst",
            vec![
                ("A", bid.bidder.clone()),
                ("w", bid.width.to_string()),
                ("h", bid.height.to_string()),
                ("bid", bid.ad_id.clone()),
                (
                    "c1",
                    bid.media_type
                        .map(MediaType::as_str)
                        .unwrap_or_default()
                        .to_string(),
                ),
                ("np", bid.cpm.to_string()),
                ("aud", bid.request_id.clone().unwrap_or_default()),
                ("a", bid.ad_unit_code.clone()),
                ("c2", targeting),
            ],
        );
    }
}

/// Register the AMX adapter when `[integrations.amx]` is enabled.
#[must_use]
pub fn register_adapters(
    settings: &Settings,
    pixels: &Arc<dyn PixelSink>,
) -> Vec<Arc<dyn BidAdapter>> {
    match settings.integration_config::<AmxConfig>(AMX_INTEGRATION_ID) {
        Ok(Some(config)) => {
            log::info!("Registering AMX bid adapter (endpoint: {})", config.endpoint);
            vec![Arc::new(AmxAdapter::new(config, Arc::clone(pixels)))]
        }
        Ok(None) => {
            log::debug!("AMX integration not configured or disabled");
            Vec::new()
        }
        Err(e) => {
            log::error!("Failed to load AMX configuration: {:?}", e);
            Vec::new()
        }
    }
}
