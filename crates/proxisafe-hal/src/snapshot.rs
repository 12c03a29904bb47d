//! Pull-based still-image endpoint (e.g. an IP-camera `shot.jpg` URL).
//!
//! Every [`SnapshotClient::fetch`] performs one bounded-timeout HTTP GET and
//! decodes the body.  There is no retry loop here; the caller backs off and
//! asks again on its next tick.

use std::time::Duration;

use proxisafe_types::SafetyError;
use reqwest::blocking::Client;

use crate::camera::{CameraFrame, decode_image};

/// Default upper bound on one snapshot round-trip.
pub const DEFAULT_SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(3);

const SOURCE_NAME: &str = "snapshot";

/// Blocking HTTP client bound to one snapshot URL.
pub struct SnapshotClient {
    url: String,
    client: Client,
}

impl SnapshotClient {
    /// Build a client for `url` whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`SafetyError::Config`] if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, SafetyError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| SafetyError::Config(format!("snapshot client: {e}")))?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch and decode one still image.
    ///
    /// # Errors
    ///
    /// Returns [`SafetyError::Capture`] on connection failure, timeout,
    /// non-success status, or an undecodable body.
    pub fn fetch(&self) -> Result<CameraFrame, SafetyError> {
        let capture_err = |details: String| SafetyError::Capture {
            source_name: SOURCE_NAME.to_string(),
            details,
        };
        let response = self
            .client
            .get(&self.url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| capture_err(format!("GET {}: {e}", self.url)))?;
        let body = response
            .bytes()
            .map_err(|e| capture_err(format!("reading body: {e}")))?;
        decode_image(SOURCE_NAME, &body)
    }
}
