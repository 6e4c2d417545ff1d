//! HTTP client for the sunnah.com style REST API

use super::{BookListing, CorpusSource, FetchOutcome, RequestLimiter};
use crate::config::ApiConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Books requested per listing page
const BOOK_PAGE_SIZE: u32 = 100;

/// Upper bound on listing pages, guards against a `next` that never ends
const MAX_BOOK_PAGES: u32 = 50;

/// Language preferred for book names
const BOOK_NAME_LANG: &str = "en";

/// Source backed by the upstream REST API
pub struct SunnahApiSource {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
    limiter: RequestLimiter,
    max_retries: u32,
    retry_delay: Duration,
}

#[derive(Debug, Deserialize)]
struct BookPage {
    #[serde(default)]
    data: Vec<RawBook>,
    #[serde(default)]
    next: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBook {
    #[serde(default)]
    book_number: Value,
    #[serde(default)]
    book: Vec<RawBookName>,
    #[serde(default)]
    hadith_start_number: Value,
    #[serde(default)]
    hadith_end_number: Value,
}

#[derive(Debug, Deserialize)]
struct RawBookName {
    #[serde(default)]
    lang: String,
    #[serde(default)]
    name: String,
}

impl SunnahApiSource {
    /// Create a source from API configuration, reading the key from the environment
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout())
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        let base_url = Url::parse(&config.base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "API base URL cannot be a base: {}",
                config.base_url
            )));
        }

        let api_key = config.api_key();
        if api_key.is_none() {
            warn!(
                env = %config.api_key_env,
                "No API key found in environment, requests may be refused"
            );
        }

        Ok(Self {
            client,
            base_url,
            api_key,
            limiter: RequestLimiter::new(config.requests_per_second),
            max_retries: config.max_retries,
            retry_delay: config.retry_delay(),
        })
    }

    /// Override the API key
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// GET a JSON document, retrying transient failures with linear backoff
    async fn get_json(&self, url: &Url) -> Result<FetchOutcome> {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            self.limiter.wait().await;
            debug!(%url, attempt, "GET");

            let mut request = self.client.get(url.clone()).header(ACCEPT, "application/json");
            if let Some(key) = &self.api_key {
                request = request.header("X-API-Key", key);
            }

            let reason = match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status == StatusCode::NOT_FOUND {
                        return Ok(FetchOutcome::NotFound);
                    }
                    if status.is_success() {
                        match response.json::<Value>().await {
                            Ok(value) => return Ok(FetchOutcome::Found(value)),
                            Err(e) if e.is_timeout() => format!("body read timed out: {}", e),
                            Err(e) => {
                                return Err(Error::Rejected(format!(
                                    "{} returned an undecodable body: {}",
                                    url, e
                                )))
                            }
                        }
                    } else if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                        format!("HTTP {}", status)
                    } else {
                        return Err(Error::Upstream(format!("HTTP {} for {}", status, url)));
                    }
                }
                Err(e) if e.is_builder() => return Err(Error::Http(e)),
                Err(e) => e.to_string(),
            };

            if attempt > self.max_retries {
                return Err(Error::Transient {
                    attempts: attempt,
                    reason,
                });
            }

            let delay = self.retry_delay * attempt;
            warn!(%url, attempt, ?delay, %reason, "Transient upstream failure, retrying");
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl CorpusSource for SunnahApiSource {
    fn name(&self) -> &str {
        "sunnah-api"
    }

    async fn fetch_entry(&self, api_name: &str, number: u32) -> Result<FetchOutcome> {
        let number = number.to_string();
        let url = self.endpoint(&["collections", api_name, "hadiths", &number]);
        self.get_json(&url).await
    }

    async fn list_books(&self, api_name: &str) -> Result<Vec<BookListing>> {
        let mut books = Vec::new();
        let mut page = 1;

        while page <= MAX_BOOK_PAGES {
            let mut url = self.endpoint(&["collections", api_name, "books"]);
            url.query_pairs_mut()
                .append_pair("limit", &BOOK_PAGE_SIZE.to_string())
                .append_pair("page", &page.to_string());

            let body = match self.get_json(&url).await? {
                FetchOutcome::Found(body) => body,
                FetchOutcome::NotFound => break,
            };
            let parsed: BookPage = serde_json::from_value(body)?;
            if parsed.data.is_empty() {
                break;
            }

            books.extend(parsed.data.into_iter().filter_map(|raw| {
                let listing = parse_book(raw);
                if listing.is_none() {
                    debug!(collection = api_name, "Skipping book with non-numeric number");
                }
                listing
            }));

            match parsed.next.as_ref().and_then(value_as_u32) {
                Some(next) if next > page => page = next,
                _ => break,
            }
        }

        books.sort_by_key(|b| b.book_number);
        books.dedup_by_key(|b| b.book_number);
        debug!(collection = api_name, count = books.len(), "Listed books");
        Ok(books)
    }
}

fn parse_book(raw: RawBook) -> Option<BookListing> {
    let book_number = value_as_u32(&raw.book_number)?;
    let name = raw
        .book
        .iter()
        .find(|n| n.lang.eq_ignore_ascii_case(BOOK_NAME_LANG) && !n.name.trim().is_empty())
        .or_else(|| raw.book.iter().find(|n| !n.name.trim().is_empty()))
        .map(|n| n.name.trim().to_string())
        .unwrap_or_else(|| format!("Book {}", book_number));

    Some(BookListing {
        book_number,
        name,
        first_entry: value_as_u32(&raw.hadith_start_number),
        last_entry: value_as_u32(&raw.hadith_end_number),
    })
}

/// Read a JSON number or numeric string as `u32`
fn value_as_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(server: &MockServer) -> ApiConfig {
        ApiConfig {
            base_url: format!("{}/v1", server.uri()),
            api_key_env: String::new(),
            requests_per_second: 1000.0,
            max_retries: 2,
            retry_delay_ms: 10,
            timeout_secs: 5,
            ..ApiConfig::default()
        }
    }

    fn source(server: &MockServer) -> SunnahApiSource {
        SunnahApiSource::new(&test_config(server)).expect("source should build")
    }

    #[tokio::test]
    async fn test_fetch_entry_found_sends_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/collections/bukhari/hadiths/1"))
            .and(header("X-API-Key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"hadithNumber": "1"})))
            .expect(1)
            .mount(&server)
            .await;

        let source = source(&server).with_api_key(Some("secret".to_string()));
        let outcome = source.fetch_entry("bukhari", 1).await.unwrap();

        assert_eq!(outcome, FetchOutcome::Found(json!({"hadithNumber": "1"})));
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = source(&server).fetch_entry("bukhari", 99).await.unwrap();
        assert_eq!(outcome, FetchOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_server_error_is_retried_until_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        let outcome = source(&server).fetch_entry("muslim", 5).await.unwrap();

        assert_eq!(outcome, FetchOutcome::Found(json!({"ok": true})));
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_persistent_failure_becomes_transient_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let err = source(&server).fetch_entry("muslim", 5).await.unwrap_err();
        assert!(matches!(err, Error::Transient { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn test_rate_limited_response_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let outcome = source(&server).fetch_entry("nasai", 1).await.unwrap();
        assert!(matches!(outcome, FetchOutcome::Found(_)));
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let err = source(&server).fetch_entry("bukhari", 1).await.unwrap_err();
        assert!(matches!(err, Error::Upstream(_)));
    }

    #[tokio::test]
    async fn test_timeout_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({}))
                    .set_delay(Duration::from_millis(1500)),
            )
            .mount(&server)
            .await;

        let config = ApiConfig {
            timeout_secs: 1,
            max_retries: 1,
            ..test_config(&server)
        };
        let err = SunnahApiSource::new(&config)
            .unwrap()
            .fetch_entry("bukhari", 1)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Transient { attempts: 2, .. }));
    }

    #[tokio::test]
    async fn test_undecodable_body_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = source(&server).fetch_entry("bukhari", 1).await.unwrap_err();
        assert!(matches!(err, Error::Rejected(_)));
    }

    #[tokio::test]
    async fn test_list_books_follows_pages_and_skips_non_numeric() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/collections/bukhari/books"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {
                        "bookNumber": "1",
                        "book": [
                            {"lang": "en", "name": "Revelation"},
                            {"lang": "ar", "name": "كتاب بدء الوحى"}
                        ],
                        "hadithStartNumber": 1,
                        "hadithEndNumber": 7
                    },
                    {"bookNumber": "intro", "book": [{"lang": "en", "name": "Introduction"}]}
                ],
                "next": 2
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/collections/bukhari/books"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {
                        "bookNumber": 2,
                        "book": [{"lang": "ar", "name": "كتاب الإيمان"}],
                        "hadithStartNumber": "8",
                        "hadithEndNumber": "58"
                    }
                ],
                "next": null
            })))
            .mount(&server)
            .await;

        let books = source(&server).list_books("bukhari").await.unwrap();

        assert_eq!(books.len(), 2);
        assert_eq!(books[0].name, "Revelation");
        assert_eq!(books[0].last_entry, Some(7));
        assert_eq!(books[1].book_number, 2);
        assert_eq!(books[1].name, "كتاب الإيمان");
        assert_eq!(books[1].first_entry, Some(8));
    }

    #[test]
    fn test_value_as_u32() {
        assert_eq!(value_as_u32(&json!(12)), Some(12));
        assert_eq!(value_as_u32(&json!(" 7 ")), Some(7));
        assert_eq!(value_as_u32(&json!("7a")), None);
        assert_eq!(value_as_u32(&json!(-1)), None);
        assert_eq!(value_as_u32(&Value::Null), None);
    }
}
