use futures::StreamExt;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

use super::{ArticleStore, StoreError, StoreQuery};
use crate::model::{ArticleRecord, BriefingRow, DailyReel, WatchlistEntry};
use crate::util::validate_endpoint;

const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024; // 10MB
const DEFAULT_MAX_RETRIES: u32 = 2;

const ARTICLES_TABLE: &str = "articles";
const BRIEFINGS_TABLE: &str = "daily_briefings";
const WATCHLIST_TABLE: &str = "user_watchlists";

/// PostgREST client for the article store.
///
/// Every request carries the static read-only key both as `apikey` and as a
/// bearer token. Transient failures (timeouts, connection errors, 429, 5xx)
/// are retried with exponential backoff: 1s, 2s, ...
pub struct StoreClient {
    http: reqwest::Client,
    rest_base: String,
    api_key: Option<SecretString>,
    timeout: Duration,
    max_retries: u32,
}

impl StoreClient {
    /// Create a client for the store rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidEndpoint`] if `base_url` is not HTTPS (loopback
    /// HTTP is allowed), [`StoreError::Network`] if the HTTP client cannot be
    /// built.
    pub fn new(
        base_url: &str,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let base = validate_endpoint(base_url)?;
        let rest_base = format!("{}/rest/v1", base.as_str().trim_end_matches('/'));
        let http = reqwest::Client::builder()
            .user_agent(concat!("brief-sync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        if api_key.is_none() {
            tracing::warn!(store = %rest_base, "No store key configured; requests will be anonymous");
        }

        Ok(Self {
            http,
            rest_base,
            api_key,
            timeout,
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    /// Override the number of retries for transient failures on reads (0 disables retrying).
    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let mut request = self.http.request(method, url);
        if let Some(key) = &self.api_key {
            request = request
                .header("apikey", key.expose_secret())
                .header(AUTHORIZATION, format!("Bearer {}", key.expose_secret()));
        }
        request
    }

    /// `{rest_base}/{table}?{params}` with params form-encoded.
    fn table_url(&self, table: &str, params: &[(&str, String)]) -> Result<Url, StoreError> {
        let mut url = Url::parse(&format!("{}/{}", self.rest_base, table))
            .map_err(|e| StoreError::InvalidEndpoint(e.into()))?;
        if !params.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }

    /// Send a request built by `build`, retrying transient failures.
    ///
    /// `build` is called once per attempt because a `RequestBuilder` is
    /// consumed on send.
    async fn send_with_retry<F>(&self, build: F) -> Result<Response, StoreError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut retry_count = 0;
        loop {
            match self.send_once(build()).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && retry_count < self.max_retries => {
                    let delay = 1u64 << retry_count; // 1s, 2s, 4s
                    tracing::debug!(
                        error = %e,
                        retry = retry_count + 1,
                        delay_secs = delay,
                        "Retrying store request after transient error"
                    );
                    tokio::time::sleep(Duration::from_secs(delay)).await;
                    retry_count += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| StoreError::Timeout)?
            .map_err(StoreError::Network)?;

        if !response.status().is_success() {
            return Err(StoreError::HttpStatus(response.status().as_u16()));
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        table: &str,
        params: &[(&str, String)],
    ) -> Result<T, StoreError> {
        let url = self.table_url(table, params)?;
        let response = self
            .send_with_retry(|| self.request(Method::GET, url.clone()))
            .await?;
        let body = read_limited_bytes(response, MAX_RESPONSE_SIZE);
        let bytes = tokio::time::timeout(self.timeout, body)
            .await
            .map_err(|_| StoreError::Timeout)??;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl ArticleStore for StoreClient {
    async fn select_articles(&self, query: &StoreQuery) -> Result<Vec<ArticleRecord>, StoreError> {
        if query.range().is_none() {
            return Ok(Vec::new());
        }
        let params = query.to_params();
        let rows: Vec<ArticleRecord> = self.get_json(ARTICLES_TABLE, &params).await?;
        tracing::debug!(
            offset = query.offset,
            limit = query.limit,
            filtered = query.is_filtered(),
            rows = rows.len(),
            "Fetched article rows"
        );
        Ok(rows)
    }

    async fn latest_reel(&self) -> Result<Option<DailyReel>, StoreError> {
        let params = [
            ("select", "*".to_string()),
            ("order", "created_at.desc".to_string()),
            ("limit", "1".to_string()),
        ];
        let rows: Vec<BriefingRow> = self.get_json(BRIEFINGS_TABLE, &params).await?;
        Ok(rows.into_iter().next().and_then(|row| row.content))
    }

    async fn insert_watchlist(&self, entry: &WatchlistEntry) -> Result<(), StoreError> {
        let body = serde_json::to_vec(entry)?;
        let url = self.table_url(WATCHLIST_TABLE, &[])?;
        // Inserts are not idempotent: a retry after a lost response would
        // register the keyword twice.
        let request = self
            .request(Method::POST, url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .header("Prefer", "return=minimal")
            .body(body);
        self.send_once(request).await?;
        Ok(())
    }

    async fn count_articles(&self) -> Result<u64, StoreError> {
        let url = self.table_url(ARTICLES_TABLE, &[("select", "id".to_string())])?;
        let response = self
            .send_with_retry(|| {
                self.request(Method::HEAD, url.clone())
                    .header("Prefer", "count=exact")
            })
            .await?;

        response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total)
            .ok_or(StoreError::MissingCount)
    }
}

/// Total from a PostgREST `Content-Range` header: `0-24/3573` or `*/0`.
fn parse_content_range_total(header: &str) -> Option<u64> {
    header.rsplit_once('/')?.1.trim().parse().ok()
}

async fn read_limited_bytes(response: Response, limit: usize) -> Result<Vec<u8>, StoreError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(StoreError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(StoreError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(StoreError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::CategoryFilter;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> StoreClient {
        StoreClient::new(
            &server.uri(),
            Some(SecretString::from("anon-key".to_string())),
            Duration::from_secs(5),
        )
        .unwrap()
        .with_retries(0)
    }

    fn rows(n: usize) -> serde_json::Value {
        serde_json::Value::Array(
            (0..n)
                .map(|i| {
                    serde_json::json!({
                        "id": i.to_string(),
                        "title": format!("Story {i}"),
                        "link": format!("https://news.example.com/{i}"),
                        "category": "Technology",
                        "published": "2024-01-05T10:00:00Z"
                    })
                })
                .collect(),
        )
    }

    #[test]
    fn test_rejects_plain_http_remote() {
        let result = StoreClient::new("http://store.example.com", None, Duration::from_secs(1));
        assert!(matches!(result, Err(StoreError::InvalidEndpoint(_))));
    }

    #[test]
    fn test_parse_content_range_total() {
        assert_eq!(parse_content_range_total("0-24/3573"), Some(3573));
        assert_eq!(parse_content_range_total("*/0"), Some(0));
        assert_eq!(parse_content_range_total("0-24/*"), None);
        assert_eq!(parse_content_range_total("garbage"), None);
    }

    #[tokio::test]
    async fn test_select_sends_filters_and_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/articles"))
            .and(query_param("region", "eq.India"))
            .and(query_param("category", "in.(\"Technology\",\"AI & Frontiers\")"))
            .and(query_param("order", "published.desc"))
            .and(query_param("offset", "20"))
            .and(query_param("limit", "20"))
            .and(header("apikey", "anon-key"))
            .and(header("authorization", "Bearer anon-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(rows(3)))
            .expect(1)
            .mount(&server)
            .await;

        let query = StoreQuery::page(1, 20)
            .with_region("India")
            .with_category(CategoryFilter::AnyOf(vec![
                "Technology".into(),
                "AI & Frontiers".into(),
            ]));
        let result = client(&server).select_articles(&query).await.unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(result[0].link, "https://news.example.com/0");
    }

    #[tokio::test]
    async fn test_select_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = client(&server)
            .select_articles(&StoreQuery::page(0, 20))
            .await;
        assert!(matches!(result, Err(StoreError::HttpStatus(503))));
    }

    #[tokio::test]
    async fn test_select_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let result = client(&server)
            .select_articles(&StoreQuery::page(0, 20))
            .await;
        assert!(matches!(result, Err(StoreError::Decode(_))));
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(rows(2)))
            .mount(&server)
            .await;

        let store = client(&server).with_retries(1);
        let result = store.select_articles(&StoreQuery::page(0, 20)).await.unwrap();
        assert_eq!(result.len(), 2);
    }

    #[tokio::test]
    async fn test_client_error_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400))
            .expect(1)
            .mount(&server)
            .await;

        let store = client(&server).with_retries(3);
        let result = store.select_articles(&StoreQuery::page(0, 20)).await;
        assert!(matches!(result, Err(StoreError::HttpStatus(400))));
    }

    #[tokio::test]
    async fn test_zero_limit_skips_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(rows(1)))
            .expect(0)
            .mount(&server)
            .await;

        let result = client(&server)
            .select_articles(&StoreQuery::page(0, 0))
            .await
            .unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_overflowing_page_skips_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(rows(1)))
            .expect(0)
            .mount(&server)
            .await;

        let result = client(&server)
            .select_articles(&StoreQuery::page(usize::MAX / 2, 20))
            .await
            .unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_latest_reel() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/daily_briefings"))
            .and(query_param("order", "created_at.desc"))
            .and(query_param("limit", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{
                "date_str": "2024-01-05 07:00",
                "content": {
                    "title": "Daily Intelligence Reel",
                    "summary": "Your daily high-signal update.",
                    "stories": [{"title": "A", "link": "https://a.example"}]
                }
            }])))
            .mount(&server)
            .await;

        let reel = client(&server).latest_reel().await.unwrap().unwrap();
        assert_eq!(reel.title, "Daily Intelligence Reel");
        assert_eq!(reel.stories.len(), 1);
    }

    #[tokio::test]
    async fn test_latest_reel_empty_table() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/daily_briefings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        assert!(client(&server).latest_reel().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_watchlist_posts_entry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/user_watchlists"))
            .and(header("prefer", "return=minimal"))
            .and(body_json(serde_json::json!({
                "user_fcm_token": "device-token",
                "keyword": "semiconductors"
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let entry = WatchlistEntry {
            push_token: "device-token".into(),
            keyword: "semiconductors".into(),
        };
        client(&server).insert_watchlist(&entry).await.unwrap();
    }

    #[tokio::test]
    async fn test_insert_watchlist_is_sent_once_on_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/user_watchlists"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let entry = WatchlistEntry {
            push_token: "device-token".into(),
            keyword: "semiconductors".into(),
        };
        let result = client(&server).with_retries(3).insert_watchlist(&entry).await;
        assert!(matches!(result, Err(StoreError::HttpStatus(503))));
    }

    #[tokio::test]
    async fn test_count_articles_reads_content_range() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/rest/v1/articles"))
            .and(header("prefer", "count=exact"))
            .respond_with(ResponseTemplate::new(200).insert_header("Content-Range", "0-24/137"))
            .mount(&server)
            .await;

        assert_eq!(client(&server).count_articles().await.unwrap(), 137);
    }

    #[tokio::test]
    async fn test_count_articles_without_header() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        assert!(matches!(
            client(&server).count_articles().await,
            Err(StoreError::MissingCount)
        ));
    }
}
