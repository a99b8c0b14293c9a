//! One-shot tracking pixel transport.
//!
//! Pixels are fire-and-forget GET requests: no retry, no backoff, and a
//! failure never reaches the caller beyond a log line.

use std::sync::{Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use error_stack::{Report, ResultExt};
use url::Url;

use crate::constants::PIXEL_USER_AGENT;
use crate::error::AdapterError;

/// Destination for tracking pixel URLs.
pub trait PixelSink: Send + Sync {
    /// Trigger a single request for `url`. Must not block on the network.
    fn fire(&self, url: &str);
}

/// Fires pixels over HTTP on detached worker threads.
pub struct HttpPixelSink {
    agent: ureq::Agent,
    in_flight: Mutex<Vec<JoinHandle<()>>>,
}

impl HttpPixelSink {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();

        Self {
            agent: ureq::Agent::new_with_config(config),
            in_flight: Mutex::new(Vec::new()),
        }
    }

    /// Send one pixel request on the current thread.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Pixel`] when the URL is invalid or the request fails.
    pub fn send(agent: &ureq::Agent, url: &str) -> Result<u16, Report<AdapterError>> {
        Url::parse(url).change_context(AdapterError::Pixel {
            message: format!("invalid pixel URL: {url}"),
        })?;

        let response = agent
            .get(url)
            .header("User-Agent", PIXEL_USER_AGENT)
            .call()
            .change_context(AdapterError::Pixel {
                message: format!("pixel request failed: {url}"),
            })?;

        Ok(response.status().as_u16())
    }

    /// Wait for every pixel fired so far to finish.
    pub fn flush(&self) {
        let handles: Vec<JoinHandle<()>> = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();

        for handle in handles {
            if handle.join().is_err() {
                log::warn!("Pixel worker thread panicked");
            }
        }
    }
}

impl PixelSink for HttpPixelSink {
    fn fire(&self, url: &str) {
        let agent = self.agent.clone();
        let target = url.to_string();

        let spawned = std::thread::Builder::new()
            .name("amx-pixel".to_string())
            .spawn(move || match Self::send(&agent, &target) {
                Ok(status) => log::debug!("Pixel fired ({status}): {target}"),
                Err(e) => log::warn!("Pixel not delivered: {e:?}"),
            });

        match spawned {
            Ok(handle) => {
                let mut in_flight = self
                    .in_flight
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                // Finished workers need no join; keep only live handles.
                in_flight.retain(|h| !h.is_finished());
                in_flight.push(handle);
            }
            Err(e) => log::warn!("Failed to spawn pixel worker for {url}: {e}"),
        }
    }
}

/// Keeps fired URLs in memory instead of sending them.
#[derive(Debug, Default)]
pub struct RecordingPixelSink {
    fired: Mutex<Vec<String>>,
}

impl RecordingPixelSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every URL fired so far, oldest first.
    #[must_use]
    pub fn fired(&self) -> Vec<String> {
        self.fired
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl PixelSink for RecordingPixelSink {
    fn fire(&self, url: &str) {
        log::debug!("Pixel recorded: {url}");
        self.fired
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());
    }
}
