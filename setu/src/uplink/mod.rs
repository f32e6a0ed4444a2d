//! Uplink dispatch
//!
//! Each routed message becomes one authenticated HTTPS PATCH against the
//! cloud store:
//!
//! ```text
//! PATCH https://<host>/<category>.json?auth=<token>
//! Content-Type: application/json
//!
//! <payload as compact JSON>
//! ```
//!
//! A dispatch is vetoed outright unless the link is connected. There is no
//! retry: a message gets at most one attempt.

mod https;

pub use https::HttpsClient;

use crate::error::{Error, Result};
use crate::link::ConnectivityState;
use crate::routing::Message;
use crate::status::{StatusEvent, StatusSink};
use reqwest::Url;
use std::fmt;
use std::sync::Arc;

/// Appended to the category to form the document path
pub const DOCUMENT_SUFFIX: &str = ".json";

/// Strip scheme and trailing slashes from a configured host
pub fn normalize_host(host: &str) -> &str {
    let host = host.trim();
    let host = host
        .strip_prefix("https://")
        .or_else(|| host.strip_prefix("http://"))
        .unwrap_or(host);
    host.trim_end_matches('/')
}

/// Build the PATCH target for `category`.
///
/// A category containing `/` addresses a nested document; every segment is
/// percent-encoded on its own.
pub fn target_url(host: &str, category: &str, auth_token: &str) -> Result<Url> {
    let host = normalize_host(host);
    let mut url = Url::parse(&format!("https://{}/", host))
        .map_err(|e| Error::Config(format!("Invalid uplink host '{}': {}", host, e)))?;

    let document = format!("{}{}", category, DOCUMENT_SUFFIX);
    url.path_segments_mut()
        .map_err(|_| Error::Config(format!("Uplink host '{}' cannot carry a path", host)))?
        .pop_if_empty()
        .extend(document.split('/'));
    url.query_pairs_mut().append_pair("auth", auth_token);

    Ok(url)
}

/// Copy of `url` safe to log
fn redacted(url: &Url) -> Url {
    let mut url = url.clone();
    if url.query().is_some() {
        url.query_pairs_mut().clear().append_pair("auth", "REDACTED");
    }
    url
}

/// What happened to one dispatched message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UplinkOutcome {
    /// 2xx response
    Delivered(u16),
    /// Any other HTTP status
    Rejected(u16),
    /// No HTTP response (connect, TLS or timeout failure)
    TransportFailed(String),
}

impl fmt::Display for UplinkOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UplinkOutcome::Delivered(status) => write!(f, "delivered (HTTP {})", status),
            UplinkOutcome::Rejected(status) => write!(f, "rejected (HTTP {})", status),
            UplinkOutcome::TransportFailed(reason) => write!(f, "transport failed: {}", reason),
        }
    }
}

/// Raw HTTP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UplinkResponse {
    pub status: u16,
    pub body: String,
}

/// HTTP access used by the dispatcher
///
/// `Err` carries a human-readable reason for a request that produced no
/// response at all.
pub trait UplinkClient: Send {
    fn patch(&self, url: &Url, body: String) -> std::result::Result<UplinkResponse, String>;
}

/// Turns messages into PATCH requests
pub struct Dispatcher<C: UplinkClient> {
    client: C,
    host: String,
    auth_token: String,
    sink: Arc<dyn StatusSink>,
}

impl<C: UplinkClient> Dispatcher<C> {
    pub fn new(client: C, host: &str, auth_token: &str, sink: Arc<dyn StatusSink>) -> Self {
        Self {
            client,
            host: normalize_host(host).to_string(),
            auth_token: auth_token.to_string(),
            sink,
        }
    }

    /// Dispatch one message given the current link state.
    ///
    /// Returns [`Error::LinkNotReady`] without touching the network unless
    /// `readiness` is [`ConnectivityState::Connected`].
    pub fn dispatch(&self, message: &Message, readiness: ConnectivityState) -> Result<UplinkOutcome> {
        if readiness != ConnectivityState::Connected {
            return Err(Error::LinkNotReady(readiness));
        }

        let url = target_url(&self.host, &message.category, &self.auth_token)?;
        let body = message.body();
        log::debug!("PATCH {} <- {}", redacted(&url), body);

        let outcome = match self.client.patch(&url, body) {
            Ok(response) => {
                if !response.body.is_empty() {
                    log::debug!("Response body: {}", response.body);
                }
                if (200..300).contains(&response.status) {
                    UplinkOutcome::Delivered(response.status)
                } else {
                    UplinkOutcome::Rejected(response.status)
                }
            }
            Err(reason) => UplinkOutcome::TransportFailed(reason),
        };

        match &outcome {
            UplinkOutcome::Delivered(status) => {
                log::info!("Delivered '{}' (HTTP {})", message.category, status);
                self.sink.notify(StatusEvent::Delivered {
                    category: message.category.clone(),
                    status: *status,
                });
            }
            UplinkOutcome::Rejected(status) => {
                log::warn!("Uplink rejected '{}' (HTTP {})", message.category, status);
            }
            UplinkOutcome::TransportFailed(reason) => {
                log::error!("Uplink failed for '{}': {}", message.category, reason);
            }
        }

        Ok(outcome)
    }

    pub fn client(&self) -> &C {
        &self.client
    }
}
