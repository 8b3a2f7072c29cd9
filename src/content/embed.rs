use reqwest::header::{HeaderMap, HeaderName, CONTENT_SECURITY_POLICY, X_FRAME_OPTIONS};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::util::{validate_url, UrlValidationError};

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

pub const REASON_X_FRAME_OPTIONS: &str = "This site disallows embedding (X-Frame-Options).";
pub const REASON_CSP: &str = "This site disallows embedding via Content Security Policy.";
pub const REASON_UNVERIFIED: &str = "Unable to verify embed permissions for this site.";

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("url is required")]
    MissingUrl,
    #[error(transparent)]
    InvalidUrl(#[from] UrlValidationError),
}

/// Whether an article page can be shown inline, and why not if it can't.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedCheck {
    pub embeddable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

impl EmbedCheck {
    fn allowed() -> Self {
        Self {
            embeddable: true,
            reason: None,
        }
    }

    fn blocked(reason: &'static str) -> Self {
        Self {
            embeddable: false,
            reason: Some(reason),
        }
    }
}

fn blocked_by_x_frame_options(value: Option<&str>) -> bool {
    value.is_some_and(|v| {
        let v = v.to_ascii_lowercase();
        v.contains("deny") || v.contains("sameorigin")
    })
}

fn blocked_by_csp(value: Option<&str>) -> bool {
    let Some(policy) = value else {
        return false;
    };
    let policy = policy.to_ascii_lowercase();
    policy
        .split(';')
        .map(str::trim)
        .find(|directive| directive.starts_with("frame-ancestors"))
        .is_some_and(|directive| directive.contains("'none'") || directive.contains("'self'"))
}

/// Decide embeddability from response headers alone.
pub fn evaluate_headers(headers: &HeaderMap) -> EmbedCheck {
    let header = |name: HeaderName| headers.get(name).and_then(|v| v.to_str().ok());

    if blocked_by_x_frame_options(header(X_FRAME_OPTIONS)) {
        return EmbedCheck::blocked(REASON_X_FRAME_OPTIONS);
    }
    if blocked_by_csp(header(CONTENT_SECURITY_POLICY)) {
        return EmbedCheck::blocked(REASON_CSP);
    }
    EmbedCheck::allowed()
}

/// Probe `url` with HEAD, falling back to GET when HEAD fails in transport.
///
/// The status code is ignored; only the framing headers matter.
pub async fn probe_url(client: &reqwest::Client, url: Url) -> EmbedCheck {
    let head = tokio::time::timeout(PROBE_TIMEOUT, client.head(url.clone()).send()).await;
    match head {
        Ok(Ok(response)) => return evaluate_headers(response.headers()),
        Ok(Err(e)) => tracing::debug!(error = %e, url = %url, "HEAD probe failed, retrying with GET"),
        Err(_) => tracing::debug!(url = %url, "HEAD probe timed out, retrying with GET"),
    }

    match tokio::time::timeout(PROBE_TIMEOUT, client.get(url.clone()).send()).await {
        Ok(Ok(response)) => evaluate_headers(response.headers()),
        Ok(Err(e)) => {
            tracing::debug!(error = %e, url = %url, "GET probe failed");
            EmbedCheck::blocked(REASON_UNVERIFIED)
        }
        Err(_) => {
            tracing::debug!(url = %url, "GET probe timed out");
            EmbedCheck::blocked(REASON_UNVERIFIED)
        }
    }
}

/// Validate a user-supplied URL and probe it.
///
/// # Errors
///
/// * [`EmbedError::MissingUrl`] - the input is blank
/// * [`EmbedError::InvalidUrl`] - not http(s), localhost, or a private address
///
/// An unreachable page is not an error; it yields a non-embeddable result.
pub async fn check_embeddable(client: &reqwest::Client, raw_url: &str) -> Result<EmbedCheck, EmbedError> {
    let raw_url = raw_url.trim();
    if raw_url.is_empty() {
        return Err(EmbedError::MissingUrl);
    }
    let url = validate_url(raw_url)?;
    Ok(probe_url(client, url).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(*value));
        }
        map
    }

    #[test]
    fn test_no_headers_embeddable() {
        assert_eq!(evaluate_headers(&HeaderMap::new()), EmbedCheck::allowed());
    }

    #[test]
    fn test_x_frame_options_blocks() {
        for value in ["DENY", "sameorigin", "SAMEORIGIN; extra"] {
            let check = evaluate_headers(&headers(&[("x-frame-options", value)]));
            assert_eq!(check, EmbedCheck::blocked(REASON_X_FRAME_OPTIONS), "value {value}");
        }
        let check = evaluate_headers(&headers(&[("x-frame-options", "ALLOW-FROM https://a.example")]));
        assert!(check.embeddable);
    }

    #[test]
    fn test_csp_frame_ancestors() {
        let none = headers(&[("content-security-policy", "default-src *; frame-ancestors 'none'")]);
        assert_eq!(evaluate_headers(&none), EmbedCheck::blocked(REASON_CSP));

        let own = headers(&[("content-security-policy", "frame-ancestors 'self' https://a.example")]);
        assert_eq!(evaluate_headers(&own), EmbedCheck::blocked(REASON_CSP));

        let open = headers(&[("content-security-policy", "frame-ancestors https://*")]);
        assert!(evaluate_headers(&open).embeddable);

        let unrelated = headers(&[("content-security-policy", "default-src 'self'")]);
        assert!(evaluate_headers(&unrelated).embeddable);
    }

    #[test]
    fn test_x_frame_options_checked_first() {
        let both = headers(&[
            ("x-frame-options", "deny"),
            ("content-security-policy", "frame-ancestors 'none'"),
        ]);
        assert_eq!(evaluate_headers(&both).reason, Some(REASON_X_FRAME_OPTIONS));
    }

    #[tokio::test]
    async fn test_probe_reads_head_headers() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200).insert_header("x-frame-options", "DENY"))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/article", server.uri())).unwrap();
        let check = probe_url(&reqwest::Client::new(), url).await;
        assert_eq!(check, EmbedCheck::blocked(REASON_X_FRAME_OPTIONS));
    }

    #[tokio::test]
    async fn test_probe_ignores_status_code() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(405))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/article", server.uri())).unwrap();
        assert!(probe_url(&reqwest::Client::new(), url).await.embeddable);
    }

    #[tokio::test]
    async fn test_probe_unreachable_host() {
        // Port 9 on localhost is almost never listening; both probes fail.
        let url = Url::parse("http://127.0.0.1:9/article").unwrap();
        let check = probe_url(&reqwest::Client::new(), url).await;
        assert_eq!(check, EmbedCheck::blocked(REASON_UNVERIFIED));
    }

    #[tokio::test]
    async fn test_check_rejects_bad_input() {
        let client = reqwest::Client::new();
        assert!(matches!(check_embeddable(&client, "  ").await, Err(EmbedError::MissingUrl)));
        assert!(matches!(
            check_embeddable(&client, "ftp://example.com").await,
            Err(EmbedError::InvalidUrl(UrlValidationError::UnsupportedScheme(_)))
        ));
        assert!(matches!(
            check_embeddable(&client, "http://localhost/x").await,
            Err(EmbedError::InvalidUrl(UrlValidationError::Localhost))
        ));
    }
}
