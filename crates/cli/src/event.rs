//! Lifecycle event commands: report a win, a timeout or ad server targeting.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use amx_adapter_common::bidder::{TimeoutData, WonBid};
use amx_adapter_common::pixel::{HttpPixelSink, PixelSink, RecordingPixelSink};
use amx_adapter_common::settings::Settings;
use clap::ValueEnum;

use crate::bid::find_adapter;
use crate::error::CliError;

#[derive(Clone, Copy, ValueEnum, Debug, PartialEq, Eq)]
pub enum EventKind {
    /// Bid won the auction (input: a won bid object)
    Won,
    /// Bids timed out (input: a list of timeout entries)
    Timeout,
    /// Targeting was set for a bid (input: a won bid object)
    Targeting,
}

/// Hand the event in `content` to the adapter, which fires through `pixels`.
pub(crate) fn dispatch(
    settings: &Settings,
    pixels: &Arc<dyn PixelSink>,
    bidder: &str,
    kind: EventKind,
    content: &str,
) -> Result<(), CliError> {
    let adapter = find_adapter(settings, pixels, bidder)?;

    match kind {
        EventKind::Won => adapter.on_bid_won(&serde_json::from_str::<WonBid>(content)?),
        EventKind::Targeting => {
            adapter.on_set_targeting(&serde_json::from_str::<WonBid>(content)?);
        }
        EventKind::Timeout => {
            adapter.on_timeout(&serde_json::from_str::<Vec<TimeoutData>>(content)?);
        }
    }

    Ok(())
}

/// Fire the pixels for one event file, or print them with `dry_run`.
pub fn fire(
    settings: &Settings,
    bidder: &str,
    kind: EventKind,
    file: &Path,
    dry_run: bool,
) -> Result<(), CliError> {
    let content = fs::read_to_string(file)?;

    if dry_run {
        let recorder = Arc::new(RecordingPixelSink::new());
        let pixels: Arc<dyn PixelSink> = recorder.clone();
        dispatch(settings, &pixels, bidder, kind, &content)?;

        println!("[Dry Run] Would fire:");
        for url in recorder.fired() {
            println!("  {}", url);
        }
        return Ok(());
    }

    let sender = Arc::new(HttpPixelSink::new(settings.pixels.timeout()));
    let pixels: Arc<dyn PixelSink> = sender.clone();
    dispatch(settings, &pixels, bidder, kind, &content)?;
    sender.flush();

    println!("Reported {:?} event for '{}'", kind, bidder);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn settings() -> Settings {
        Settings::from_toml(
            r#"
[integrations.amx]
tracking_endpoint = "https://t.example/hbx/"
"#,
        )
        .unwrap()
    }

    const WON_BID: &str = r#"{
        "bidder": "amx",
        "width": 300,
        "height": 250,
        "adId": "ad-1",
        "mediaType": "video",
        "cpm": 2.5,
        "adUnitCode": "slot-1",
        "adserverTargeting": { "hb_pb": "2.50" }
    }"#;

    #[test]
    fn test_dispatch_won_and_targeting() {
        let recorder = Arc::new(RecordingPixelSink::new());
        let pixels: Arc<dyn PixelSink> = recorder.clone();

        dispatch(&settings(), &pixels, "amx", EventKind::Won, WON_BID).unwrap();
        dispatch(&settings(), &pixels, "amx", EventKind::Targeting, WON_BID).unwrap();

        let fired = recorder.fired();
        assert_eq!(fired.len(), 2);
        assert!(fired[0].starts_with("https://t.example/hbx/g_pbwin?"));
        assert!(fired[0].contains("C=1"));
        assert!(fired[1].starts_with("https://t.example/hbx/g_pbst?"));
        assert!(fired[1].contains("c2=hb_pb%3D2.50"));
    }

    #[test]
    fn test_dispatch_timeout_list() {
        let recorder = Arc::new(RecordingPixelSink::new());
        let pixels: Arc<dyn PixelSink> = recorder.clone();
        let content = r#"[
            { "bidder": "amx", "bidId": "b1", "adUnitCode": "s1", "timeout": 1000 },
            { "bidder": "amx", "bidId": "b2", "adUnitCode": "s2", "timeout": 1000 }
        ]"#;

        dispatch(&settings(), &pixels, "amx", EventKind::Timeout, content).unwrap();
        assert_eq!(recorder.fired().len(), 2);
    }

    #[test]
    fn test_dispatch_rejects_bad_payload() {
        let pixels: Arc<dyn PixelSink> = Arc::new(RecordingPixelSink::new());
        let result = dispatch(&settings(), &pixels, "amx", EventKind::Timeout, WON_BID);
        assert!(matches!(result, Err(CliError::Json(_))));
    }

    #[test]
    fn test_fire_dry_run() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("won.json");
        fs::write(&path, WON_BID).unwrap();

        assert!(fire(&settings(), "amx", EventKind::Won, &path, true).is_ok());
    }
}
