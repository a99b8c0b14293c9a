//! Bid commands: build a server request, interpret a response, list syncs.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use amx_adapter_common::bidder::{
    build_adapter_registry, build_valid_request, AuctionInput, BidAdapter, BidResponse,
    ServerRequest, ServerResponse, SyncOptions, UserSync,
};
use amx_adapter_common::pixel::PixelSink;
use amx_adapter_common::settings::Settings;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::error::CliError;
use crate::id;

/// Look up an enabled adapter by bidder code.
pub(crate) fn find_adapter(
    settings: &Settings,
    pixels: &Arc<dyn PixelSink>,
    bidder: &str,
) -> Result<Arc<dyn BidAdapter>, CliError> {
    let registry = build_adapter_registry(settings, pixels);
    registry.get(bidder).cloned().ok_or_else(|| {
        CliError::Config(format!(
            "bidder '{}' is not enabled (available: {:?})",
            bidder,
            registry.codes()
        ))
    })
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// A response body file: JSON when it parses, otherwise the raw text.
fn read_body(path: &Path) -> Result<JsonValue, CliError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content).unwrap_or(JsonValue::String(content)))
}

/// Build the server request for an `{bids, bidderRequest}` file.
///
/// With a cookie header, resolved user IDs are attached to bids that carry none.
pub(crate) fn build_request(
    settings: &Settings,
    pixels: &Arc<dyn PixelSink>,
    bidder: &str,
    file: &Path,
    cookie: Option<&str>,
) -> Result<ServerRequest, CliError> {
    let adapter = find_adapter(settings, pixels, bidder)?;
    let mut input = AuctionInput::from_json(&fs::read_to_string(file)?)?;

    if let Some(cookie) = cookie {
        let user_ids = id::resolve(settings, Some(cookie));
        for bid in input.bids.iter_mut().filter(|bid| bid.user_id.is_empty()) {
            bid.user_id = user_ids.clone();
        }
    }

    Ok(build_valid_request(adapter.as_ref(), &input)?)
}

pub(crate) fn interpret_response(
    settings: &Settings,
    pixels: &Arc<dyn PixelSink>,
    bidder: &str,
    request: &Path,
    response: &Path,
) -> Result<Vec<BidResponse>, CliError> {
    let adapter = find_adapter(settings, pixels, bidder)?;
    let request: ServerRequest = serde_json::from_str(&fs::read_to_string(request)?)?;
    let response = ServerResponse {
        body: read_body(response)?,
    };

    Ok(adapter.interpret_response(&response, &request))
}

pub(crate) fn user_syncs(
    settings: &Settings,
    pixels: &Arc<dyn PixelSink>,
    bidder: &str,
    responses: &[PathBuf],
    iframe: bool,
) -> Result<Vec<UserSync>, CliError> {
    let adapter = find_adapter(settings, pixels, bidder)?;
    let responses = responses
        .iter()
        .map(|path| read_body(path).map(|body| ServerResponse { body }))
        .collect::<Result<Vec<_>, _>>()?;

    let options = SyncOptions {
        iframe_enabled: iframe,
        pixel_enabled: true,
    };
    Ok(adapter.get_user_syncs(&options, &responses))
}

pub fn build(
    settings: &Settings,
    pixels: &Arc<dyn PixelSink>,
    bidder: &str,
    file: &Path,
    cookie: Option<&str>,
) -> Result<(), CliError> {
    print_json(&build_request(settings, pixels, bidder, file, cookie)?)
}

pub fn interpret(
    settings: &Settings,
    pixels: &Arc<dyn PixelSink>,
    bidder: &str,
    request: &Path,
    response: &Path,
) -> Result<(), CliError> {
    let bids = interpret_response(settings, pixels, bidder, request, response)?;
    log::info!("{} bids interpreted", bids.len());
    print_json(&bids)
}

pub fn syncs(
    settings: &Settings,
    pixels: &Arc<dyn PixelSink>,
    bidder: &str,
    responses: &[PathBuf],
    iframe: bool,
) -> Result<(), CliError> {
    print_json(&user_syncs(settings, pixels, bidder, responses, iframe)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use amx_adapter_common::bidder::{MediaType, SyncType};
    use amx_adapter_common::pixel::RecordingPixelSink;
    use serde_json::json;
    use tempfile::TempDir;

    fn settings() -> Settings {
        Settings::from_toml(
            r#"
[integrations.amx]
endpoint = "https://bids.example/a/c"

[integrations.custom_data]
cookie_name = "pub_data"
"#,
        )
        .unwrap()
    }

    fn pixels() -> Arc<dyn PixelSink> {
        Arc::new(RecordingPixelSink::new())
    }

    fn write_json(dir: &TempDir, name: &str, value: &JsonValue) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, serde_json::to_string(value).unwrap()).unwrap();
        path
    }

    fn auction_input() -> JsonValue {
        json!({
            "bids": [
                { "bidId": "b1", "bidder": "amx", "params": { "tagId": 7 } },
                {
                    "bidId": "b2",
                    "bidder": "amx",
                    "params": { "tagId": "slot-2" },
                    "mediaTypes": { "banner": { "sizes": [[728, 90]] } }
                }
            ],
            "bidderRequest": {
                "auctionId": "auc-9",
                "refererInfo": { "referer": "https://news.example.com/a" }
            }
        })
    }

    #[test]
    fn test_build_request_drops_invalid_bids_and_attaches_ids() {
        let dir = TempDir::new().unwrap();
        let file = write_json(&dir, "bids.json", &auction_input());

        let request = build_request(
            &settings(),
            &pixels(),
            "amx",
            &file,
            Some("pub_data=vip"),
        )
        .unwrap();

        assert_eq!(request.url, "https://bids.example/a/c");
        assert_eq!(request.data["a"], "auc-9");
        assert_eq!(request.data["l"], json!({ "customData": "vip" }));
        assert_eq!(
            request.data["m"],
            json!({ "b2": { "av": false, "aw": 728, "ah": 90, "tf": 0, "i": "slot-2" } })
        );
    }

    #[test]
    fn test_unknown_bidder() {
        let dir = TempDir::new().unwrap();
        let file = write_json(&dir, "bids.json", &auction_input());

        let result = build_request(&settings(), &pixels(), "nope", &file, None);
        assert!(matches!(result, Err(CliError::Config(_))));
    }

    #[test]
    fn test_interpret_response_files() {
        let dir = TempDir::new().unwrap();
        let request = write_json(
            &dir,
            "request.json",
            &json!({
                "method": "POST",
                "url": "https://bids.example/a/c",
                "data": { "m": { "b2": { "aw": 728, "ah": 90 } } }
            }),
        );
        let response = write_json(
            &dir,
            "response.json",
            &json!({
                "r": { "b2": [{ "b": [{ "adm": "<div>ad</div>", "price": 1.2, "crid": "c9" }] }] }
            }),
        );

        let bids =
            interpret_response(&settings(), &pixels(), "amx", &request, &response).unwrap();
        assert_eq!(bids.len(), 1);
        assert_eq!(bids[0].request_id, "b2");
        assert_eq!((bids[0].width, bids[0].height), (728, 90));
        assert_eq!(bids[0].meta.media_type, MediaType::Banner);
    }

    #[test]
    fn test_interpret_non_json_body_is_nobid() {
        let dir = TempDir::new().unwrap();
        let request = write_json(
            &dir,
            "request.json",
            &json!({ "method": "POST", "url": "https://bids.example/a/c", "data": {} }),
        );
        let response = dir.path().join("empty.txt");
        fs::write(&response, "").unwrap();

        let bids =
            interpret_response(&settings(), &pixels(), "amx", &request, &response).unwrap();
        assert!(bids.is_empty());
    }

    #[test]
    fn test_user_syncs_from_files() {
        let dir = TempDir::new().unwrap();
        let body = json!({ "p": { "hreq": ["https://s.example/img", "https://s.example/f?__st=iframe"] } });
        let first = write_json(&dir, "r1.json", &body);
        let second = write_json(&dir, "r2.json", &body);

        let syncs = user_syncs(
            &settings(),
            &pixels(),
            "amx",
            &[first.clone(), second],
            false,
        )
        .unwrap();
        assert_eq!(syncs.len(), 2);
        assert!(syncs.iter().all(|s| s.sync_type == SyncType::Image));

        let syncs = user_syncs(&settings(), &pixels(), "amx", &[first], true).unwrap();
        assert_eq!(syncs.len(), 2);
        assert_eq!(syncs[1].sync_type, SyncType::Iframe);
    }
}
