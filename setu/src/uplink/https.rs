//! reqwest-backed uplink client

use super::{UplinkClient, UplinkResponse};
use crate::config::UplinkConfig;
use crate::error::{Error, Result};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Certificate, Url};
use std::fs;

/// Blocking HTTPS client (rustls)
pub struct HttpsClient {
    client: Client,
}

impl HttpsClient {
    /// Build a client from the uplink config.
    ///
    /// With `root_ca_path` set, only that CA is trusted. Without it the
    /// bundled web PKI roots are used.
    pub fn new(config: &UplinkConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .use_rustls_tls()
            .https_only(true)
            .timeout(config.timeout())
            .user_agent(concat!("setu/", env!("CARGO_PKG_VERSION")));

        match &config.root_ca_path {
            Some(path) => {
                let pem = fs::read(path).map_err(|e| {
                    Error::Config(format!("Cannot read root CA {}: {}", path.display(), e))
                })?;
                let cert = Certificate::from_pem(&pem)?;
                builder = builder.tls_built_in_root_certs(false).add_root_certificate(cert);
                log::info!("Uplink TLS pinned to {}", path.display());
            }
            None => {
                log::warn!("No uplink root CA configured, trusting built-in roots");
            }
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

impl UplinkClient for HttpsClient {
    fn patch(&self, url: &Url, body: String) -> std::result::Result<UplinkResponse, String> {
        let response = self
            .client
            .patch(url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .map_err(describe)?;

        let status = response.status().as_u16();
        // Body is informational only
        let body = response.text().unwrap_or_default();
        Ok(UplinkResponse { status, body })
    }
}

fn describe(e: reqwest::Error) -> String {
    // The URL carries the auth token
    let e = e.without_url();
    if e.is_timeout() {
        format!("timeout: {}", e)
    } else if e.is_connect() {
        format!("connect: {}", e)
    } else {
        e.to_string()
    }
}
