use reqwest::blocking::Client as HttpClient;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use std::fmt::Debug;
use std::time::Duration;

use crate::error::{DkanErrorResponse, Error, Result, format_dkan_error};

/// Issues one GET and decodes the body as JSON.
///
/// Implementations must map connection failures, non-success statuses and
/// non-JSON bodies to [`Error::Fetch`].
pub trait Transport: Debug + Send + Sync {
    fn get_json(&self, url: &str) -> Result<Value>;
}

/// Blocking `reqwest` transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: HttpClient,
}

impl HttpTransport {
    pub fn new(timeout: Duration, verify: bool) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("dkanapi-rs/{}", env!("CARGO_PKG_VERSION")))
                .unwrap_or(HeaderValue::from_static("dkanapi-rs")),
        );
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let mut builder = HttpClient::builder()
            .default_headers(default_headers)
            .timeout(timeout);

        if !verify {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let http = builder
            .build()
            .map_err(|e| Error::configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http })
    }
}

impl Transport for HttpTransport {
    fn get_json(&self, url: &str) -> Result<Value> {
        let resp = self
            .http
            .get(url)
            .send()
            .map_err(|e| Error::fetch(url, format!("could not connect: {}", e)))?;

        let status = resp.status();
        let text = resp
            .text()
            .map_err(|e| Error::fetch(url, format!("failed to read response body: {}", e)))?;

        if !status.is_success() {
            // Only DKAN-shaped payloads with a message replace the raw body.
            if let Ok(err_json) = serde_json::from_str::<DkanErrorResponse>(&text) {
                if err_json.message().is_some() {
                    return Err(format_dkan_error(status, url, &err_json));
                }
            }
            return Err(Error::fetch(
                url,
                format!("HTTP {}\n{}", status, text.trim()),
            ));
        }

        serde_json::from_str::<Value>(&text).map_err(|e| {
            Error::fetch(
                url,
                format!("failed to parse API JSON (status={}): {}", status, e),
            )
        })
    }
}
