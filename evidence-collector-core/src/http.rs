//! Shared GET-and-decode helper for the source system clients.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::{Client, Request, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info};

use crate::error::SourceQueryError;

/// Browser-like agent string; some Jira Server installs reject unknown clients.
pub const USER_AGENT: &str = "Mozilla/5.0 (X11; U; Linux i686) Gecko/20071127 Firefox/2.0.0.11";

/// `Authorization` value for HTTP Basic auth.
pub fn basic_auth_header(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}

pub(crate) fn parse_url(raw: &str) -> Result<Url, SourceQueryError> {
    Url::parse(raw).map_err(|e| SourceQueryError::InvalidEndpoint {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}

pub(crate) fn parse_url_with_params(
    raw: &str,
    params: &[(&str, &str)],
) -> Result<Url, SourceQueryError> {
    Url::parse_with_params(raw, params).map_err(|e| SourceQueryError::InvalidEndpoint {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}

/// Execute a prepared GET request and decode its JSON body into `T`.
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    client: &Client,
    request: Request,
) -> Result<T, SourceQueryError> {
    let url = request.url().to_string();
    info!(url = %url, "GET");

    let response = client.execute(request).await.map_err(|e| {
        error!(error = ?e, url = %url, "Request failed");
        SourceQueryError::Http(e)
    })?;
    let status = response.status();
    let body = response.text().await?;
    decode_response(url, status, &body)
}

/// Map a finished response onto the typed body or a [`SourceQueryError`].
pub(crate) fn decode_response<T: DeserializeOwned>(
    url: String,
    status: StatusCode,
    body: &str,
) -> Result<T, SourceQueryError> {
    if !status.is_success() {
        error!(status = %status, url = %url, "Source API returned error");
        return Err(SourceQueryError::Status {
            url,
            status: status.as_u16(),
            body: body.to_string(),
        });
    }

    debug!(url = %url, bytes = body.len(), "Decoding response body");
    serde_json::from_str(body).map_err(|source| {
        error!(error = %source, url = %url, "Response did not match expected shape");
        SourceQueryError::Decode { url, source }
    })
}
