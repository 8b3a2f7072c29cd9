use serde::Serialize;
use std::collections::HashSet;

use super::client::{FeedlyClient, FeedlyError};
use crate::reader::MarkReadService;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MarkersRequest<'a> {
    action: &'static str,
    #[serde(rename = "type")]
    kind: &'static str,
    entry_ids: Vec<&'a str>,
}

impl FeedlyClient {
    /// Mark entries read upstream in one `/v3/markers` call.
    ///
    /// Duplicate ids are sent once. The call is all-or-nothing: any error
    /// means none of the batch may be treated as read.
    ///
    /// # Errors
    ///
    /// * [`FeedlyError::EmptyBatch`] - no ids given; no request is made
    /// * [`FeedlyError::Unauthorized`] - the token was rejected
    /// * Any other transport or status error from the request
    pub async fn mark_entries_read(&self, entry_ids: &[String]) -> Result<(), FeedlyError> {
        let mut seen = HashSet::new();
        let entry_ids: Vec<&str> = entry_ids
            .iter()
            .map(String::as_str)
            .filter(|id| seen.insert(*id))
            .collect();

        if entry_ids.is_empty() {
            return Err(FeedlyError::EmptyBatch);
        }

        let count = entry_ids.len();
        let body = MarkersRequest {
            action: "markAsRead",
            kind: "entries",
            entry_ids,
        };
        self.post_json(self.endpoint("/v3/markers", &[]), &body).await?;

        tracing::debug!(entries = count, "Marked entries as read on Feedly");
        Ok(())
    }
}

impl MarkReadService for FeedlyClient {
    async fn mark_read(&self, entry_ids: &[String]) -> Result<(), FeedlyError> {
        self.mark_entries_read(entry_ids).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedly::DEFAULT_TIMEOUT;
    use secrecy::SecretString;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(base: &str) -> FeedlyClient {
        FeedlyClient::new(
            reqwest::Client::new(),
            base,
            SecretString::from("test-token".to_string()),
            DEFAULT_TIMEOUT,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_mark_read_posts_deduplicated_batch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/markers"))
            .and(body_json(serde_json::json!({
                "action": "markAsRead",
                "type": "entries",
                "entryIds": ["a", "b"]
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let ids = vec!["a".to_string(), "b".to_string(), "a".to_string()];
        client.mark_entries_read(&ids).await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_batch_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let result = client.mark_entries_read(&[]).await;
        assert!(matches!(result, Err(FeedlyError::EmptyBatch)));
    }

    #[tokio::test]
    async fn test_mark_read_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let result = client.mark_read(&["a".to_string()]).await;
        assert!(matches!(result, Err(FeedlyError::HttpStatus { status: 503, .. })));
    }
}
