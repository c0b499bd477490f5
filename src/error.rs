use reqwest::StatusCode;

/// Errors returned by [`Client::search`](crate::Client::search).
///
/// Every variant is terminal for the call that produced it: nothing is retried
/// and no partial table is returned.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The caller supplied inconsistent arguments, or the client could not be
    /// configured. Raised before any request is sent.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// The HTTP exchange failed: connection error, non-success status, or a
    /// body that is not JSON.
    #[error("fetch failed for url ({url}): {message}")]
    Fetch { url: String, message: String },

    /// The portal answered with JSON that lacks `result.total`,
    /// `result.limit` or `result.records`.
    #[error("unexpected response from url ({url}): {message}")]
    Schema { url: String, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    pub(crate) fn fetch(url: &str, message: impl Into<String>) -> Self {
        Error::Fetch {
            url: url.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn schema(url: &str, message: impl Into<String>) -> Self {
        Error::Schema {
            url: url.to_string(),
            message: message.into(),
        }
    }
}

// DKAN reports failures as {"success": false, "error": {"message": ..., "__type": ...}}.
// Some front proxies answer with a flat {"message": ...} instead.
#[derive(Debug, serde::Deserialize)]
pub(crate) struct DkanErrorResponse {
    #[serde(default)]
    pub(crate) error: Option<DkanErrorBody>,
    #[serde(default)]
    pub(crate) message: Option<String>,
}

impl DkanErrorResponse {
    /// The portal's message, if the body carried one.
    pub(crate) fn message(&self) -> Option<&str> {
        self.error
            .as_ref()
            .and_then(|b| b.message.as_deref())
            .or(self.message.as_deref())
            .filter(|m| !m.trim().is_empty())
    }
}

#[derive(Debug, serde::Deserialize)]
pub(crate) struct DkanErrorBody {
    #[serde(default)]
    pub(crate) message: Option<String>,
    #[serde(default, rename = "__type")]
    pub(crate) kind: Option<String>,
}

pub(crate) fn format_dkan_error(status: StatusCode, url: &str, e: &DkanErrorResponse) -> Error {
    let message = e.message().unwrap_or("");
    let kind = e.error.as_ref().and_then(|b| b.kind.as_deref()).unwrap_or("");

    if status == StatusCode::NOT_FOUND {
        let hint = if kind.to_lowercase().contains("not found") || message.contains("resource") {
            "the resource id may be wrong, or the resource has no datastore table"
        } else {
            "the base URL may not point at a DKAN portal (expected <base>/api/action/datastore/search.json)"
        };
        return Error::fetch(
            url,
            format!("HTTP 404 ({hint})\nServer message: {message}"),
        );
    }

    if status == StatusCode::CONFLICT || kind.eq_ignore_ascii_case("validation error") {
        return Error::fetch(
            url,
            format!(
                "HTTP {}: the portal rejected the query parameters; check filter and sort field names\nServer message: {}",
                status.as_u16(),
                message
            ),
        );
    }

    let kind = if kind.is_empty() {
        String::new()
    } else {
        format!(" [{kind}]")
    };
    Error::fetch(url, format!("HTTP {}{}\n{}", status.as_u16(), kind, message))
}
