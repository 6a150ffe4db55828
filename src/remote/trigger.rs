use std::time::Duration;

use url::Url;

use crate::util::{validate_endpoint, UrlValidationError};

/// Asks the upstream crawl job to refresh the article store.
///
/// Strictly advisory: the call is bounded by `timeout`, its outcome is only
/// logged, and no caller may treat a failure as a fetch failure. A successful
/// response only means the job was queued; nothing guarantees fresher rows by
/// the time the next page is fetched.
#[derive(Debug, Clone)]
pub struct RefreshTrigger {
    http: reqwest::Client,
    url: Url,
    timeout: Duration,
}

impl RefreshTrigger {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, UrlValidationError> {
        Ok(Self {
            http: reqwest::Client::new(),
            url: validate_endpoint(url)?,
            timeout,
        })
    }

    /// POST to the relay with no body. Returns `true` on any 2xx response.
    pub async fn fire(&self) -> bool {
        let request = self.http.post(self.url.clone()).send();
        match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(response)) if response.status().is_success() => {
                tracing::info!(status = %response.status(), "Remote refresh requested");
                true
            }
            Ok(Ok(response)) => {
                tracing::warn!(status = %response.status(), "Remote refresh rejected");
                false
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Remote refresh request failed");
                false
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Remote refresh timed out, continuing without it"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fire_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/trigger-sync"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "message": "Intelligence Sync Started"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let trigger = RefreshTrigger::new(
            &format!("{}/api/trigger-sync", server.uri()),
            Duration::from_secs(2),
        )
        .unwrap();
        assert!(trigger.fire().await);
    }

    #[tokio::test]
    async fn test_fire_error_status_is_swallowed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let trigger = RefreshTrigger::new(&server.uri(), Duration::from_secs(2)).unwrap();
        assert!(!trigger.fire().await);
    }

    #[tokio::test]
    async fn test_fire_is_bounded_by_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
            .mount(&server)
            .await;

        let trigger = RefreshTrigger::new(&server.uri(), Duration::from_millis(200)).unwrap();
        let started = Instant::now();
        assert!(!trigger.fire().await);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_rejects_insecure_relay() {
        assert!(RefreshTrigger::new("http://relay.example.com", Duration::from_secs(1)).is_err());
    }
}
