use futures::StreamExt;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::redirect::Policy;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://cloud.feedly.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

const MAX_RESPONSE_SIZE: usize = 5 * 1024 * 1024; // 5MB
/// Error bodies are only kept for diagnostics.
const MAX_ERROR_BODY_LEN: usize = 512;

/// Errors from talking to the Feedly cloud API.
#[derive(Debug, Error)]
pub enum FeedlyError {
    /// No token, or Feedly rejected it (HTTP 401)
    #[error("Unauthorized: Feedly rejected the access token")]
    Unauthorized,
    /// Non-2xx response other than 401
    #[error("Feedly request failed ({status}): {body}")]
    HttpStatus { status: u16, body: String },
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Request timed out after {0}s")]
    Timeout(u64),
    /// Response body was not the JSON shape we expected
    #[error("Malformed Feedly response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    #[error("Invalid UTF-8 in response")]
    InvalidUtf8,
    #[error("Invalid Feedly base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("Insecure base URL: HTTPS required (except localhost for testing)")]
    InsecureBaseUrl,
    #[error("Unable to resolve Feedly profile id.")]
    MissingProfileId,
    #[error("At least one entry id is required")]
    EmptyBatch,
}

impl FeedlyError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, FeedlyError::Unauthorized)
    }
}

/// Create a redirect policy with loop detection and limited hops.
fn create_redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= 3 {
            return attempt.error("Too many redirects (max 3)");
        }

        let url = attempt.url();
        for prev in attempt.previous() {
            if prev.as_str() == url.as_str() {
                return attempt.error("Redirect loop detected");
            }
        }

        tracing::debug!(
            from = %attempt.previous().last().map(|u| u.as_str()).unwrap_or("initial"),
            to = %url,
            hop = attempt.previous().len() + 1,
            "Following redirect"
        );

        attempt.follow()
    })
}

/// Build the shared HTTP client used for Feedly and embed probes.
pub fn build_http_client() -> Result<reqwest::Client, FeedlyError> {
    let client = reqwest::Client::builder()
        .redirect(create_redirect_policy())
        .user_agent(concat!("skimly/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Thin authenticated client for the Feedly cloud REST API.
///
/// The access token is sent only to the configured base URL.
pub struct FeedlyClient {
    http: reqwest::Client,
    base_url: Url,
    token: SecretString,
    timeout: Duration,
}

impl std::fmt::Debug for FeedlyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedlyClient")
            .field("base_url", &self.base_url.as_str())
            .field("token", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl FeedlyClient {
    /// Create a client for `base_url`.
    ///
    /// HTTPS is required so the bearer token never crosses the wire in clear
    /// text; plain HTTP is accepted for localhost only.
    ///
    /// # Errors
    ///
    /// * [`FeedlyError::InvalidBaseUrl`] - `base_url` does not parse or is not http(s)
    /// * [`FeedlyError::InsecureBaseUrl`] - plain HTTP to a non-local host
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        token: SecretString,
        timeout: Duration,
    ) -> Result<Self, FeedlyError> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| FeedlyError::InvalidBaseUrl(e.to_string()))?;

        match base_url.scheme() {
            "https" => {}
            "http" => {
                let is_localhost = matches!(base_url.host_str(), Some("localhost" | "127.0.0.1"));
                if !is_localhost {
                    tracing::error!(base_url = %base_url, "Rejecting non-HTTPS Feedly base URL");
                    return Err(FeedlyError::InsecureBaseUrl);
                }
                tracing::warn!(base_url = %base_url, "Using non-HTTPS Feedly base URL (localhost only)");
            }
            other => return Err(FeedlyError::InvalidBaseUrl(format!("unsupported scheme {other}"))),
        }

        Ok(Self {
            http,
            base_url,
            token,
            timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build an API URL from a path and query pairs.
    pub(crate) fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Url {
        let mut url = self.base_url.clone();
        let base_path = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{base_path}{path}"));
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        url
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, FeedlyError> {
        let text = self.send(self.http.get(url)).await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// POST a JSON body, discarding the response body.
    pub(crate) async fn post_json<B: serde::Serialize>(&self, url: Url, body: &B) -> Result<(), FeedlyError> {
        let payload = serde_json::to_string(body)?;
        self.send(self.http.post(url).body(payload)).await?;
        Ok(())
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<String, FeedlyError> {
        let request = request
            .header(AUTHORIZATION, format!("Bearer {}", self.token.expose_secret()))
            .header(CONTENT_TYPE, "application/json");

        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| FeedlyError::Timeout(self.timeout.as_secs()))??;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            tracing::debug!(url = %response.url().path(), "Feedly rejected access token");
            return Err(FeedlyError::Unauthorized);
        }

        if !status.is_success() {
            let body = read_limited_text(response, MAX_ERROR_BODY_LEN)
                .await
                .unwrap_or_default();
            return Err(FeedlyError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        read_limited_text(response, MAX_RESPONSE_SIZE).await
    }
}

/// Read a response body as text, failing once it exceeds `limit` bytes.
async fn read_limited_text(
    response: reqwest::Response,
    limit: usize,
) -> Result<String, FeedlyError> {
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FeedlyError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FeedlyError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    String::from_utf8(bytes).map_err(|_| FeedlyError::InvalidUtf8)
}
