//! JSON-over-HTTP transport.
//!
//! Each request races three things: the HTTP exchange, its timeout, and the
//! caller's cancellation token. Whichever finishes first decides the outcome;
//! the losers are dropped, which releases the timer and aborts the in-flight
//! request.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{field, instrument, Span};
use uuid::Uuid;

use quizflow_core::error::ApiError;

use crate::error::{http_error, network_error};

/// A single API request.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Overrides the transport's default timeout.
    pub timeout: Option<Duration>,
}

impl Request {
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Stateless HTTP transport bound to one API base URL.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
    default_timeout: Duration,
}

impl HttpTransport {
    pub fn new(base_url: &str, default_timeout: Duration) -> Result<Self> {
        let base_url =
            Url::parse(base_url).with_context(|| format!("invalid API base URL: {base_url}"))?;
        let client = reqwest::Client::builder()
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url,
            default_timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Resolve `path` (and query) against the base URL, keeping the base path
    /// prefix (e.g. `/api`).
    pub fn url_for(&self, request: &Request) -> Url {
        let mut url = self.base_url.clone();
        let prefix = self.base_url.path().trim_end_matches('/');
        url.set_path(&format!("{prefix}{}", request.path));
        url.set_query(None);
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(
                request
                    .query
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str())),
            );
        }
        url
    }

    /// Send `request` and decode the JSON response body as `T`.
    ///
    /// An empty 2xx body decodes as JSON `null`.
    #[instrument(
        skip(self, request, cancel),
        fields(method = %request.method, path = %request.path, request_id = field::Empty)
    )]
    pub async fn request<T: DeserializeOwned>(
        &self,
        request: Request,
        cancel: &CancellationToken,
    ) -> Result<T, ApiError> {
        if cancel.is_cancelled() {
            return Err(ApiError::Canceled);
        }

        let request_id = Uuid::new_v4();
        Span::current().record("request_id", field::display(request_id));

        let timeout = request.timeout.unwrap_or(self.default_timeout);
        let mut builder = self
            .client
            .request(request.method.clone(), self.url_for(&request))
            .timeout(timeout)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .header("x-request-id", request_id.to_string());
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let exchange = async {
            let response = builder.send().await.map_err(|e| network_error(&e))?;
            let status = response.status();
            let bytes = response.bytes().await.map_err(|e| network_error(&e))?;
            Ok::<_, ApiError>((status, bytes))
        };

        let (status, bytes) = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("request canceled by caller");
                return Err(ApiError::Canceled);
            }
            outcome = exchange => outcome?,
        };

        if !status.is_success() {
            let err = http_error(status.as_u16(), &bytes);
            tracing::debug!(status = status.as_u16(), code = err.code(), "request failed");
            return Err(err);
        }

        let body: &[u8] = if bytes.is_empty() { b"null" } else { &bytes };
        serde_json::from_slice(body)
            .map_err(|e| ApiError::InvalidResponse(format!("failed to parse response: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use wiremock::matchers::{body_json, header, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn transport(server: &MockServer) -> HttpTransport {
        HttpTransport::new(&format!("{}/api", server.uri()), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn url_keeps_base_prefix() {
        let t = HttpTransport::new("http://localhost:8000/api/", Duration::from_secs(1)).unwrap();
        let url = t.url_for(&Request::get("/quiz/status/q-1").query("known_questions_count", 3));
        assert_eq!(
            url.as_str(),
            "http://localhost:8000/api/quiz/status/q-1?known_questions_count=3"
        );

        let bare = HttpTransport::new("http://localhost:8000", Duration::from_secs(1)).unwrap();
        assert_eq!(
            bare.url_for(&Request::post("/quiz/start")).as_str(),
            "http://localhost:8000/quiz/start"
        );
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(HttpTransport::new("not a url", Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn sends_json_with_request_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/echo"))
            .and(header("content-type", "application/json"))
            .and(header_exists("x-request-id"))
            .and(query_param("flag", "1"))
            .and(body_json(serde_json::json!({"hello": "world"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let t = transport(&server).await;
        let value: Value = t
            .request(
                Request::post("/echo")
                    .query("flag", 1)
                    .json(serde_json::json!({"hello": "world"})),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(value["ok"], true);
    }

    #[tokio::test]
    async fn server_errors_are_retriable_client_errors_are_not() {
        let server = MockServer::start().await;
        Mock::given(path("/api/boom"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;
        Mock::given(path("/api/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "detail": {"code": "category_not_found", "message": "Unknown category"}
            })))
            .mount(&server)
            .await;

        let t = transport(&server).await;
        let cancel = CancellationToken::new();

        let err = t
            .request::<Value>(Request::get("/boom"), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(503));
        assert!(err.is_retriable());

        let err = t
            .request::<Value>(Request::get("/missing"), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "category_not_found");
        assert!(!err.is_retriable());
    }

    #[tokio::test]
    async fn timeout_is_a_retriable_network_error() {
        let server = MockServer::start().await;
        Mock::given(path("/api/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({}))
                    .set_delay(Duration::from_millis(800)),
            )
            .mount(&server)
            .await;

        let t = transport(&server).await;
        let err = t
            .request::<Value>(
                Request::get("/slow").timeout(Duration::from_millis(100)),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(
            matches!(err, ApiError::Network { timed_out: true, .. }),
            "{err:?}"
        );
        assert!(err.is_retriable());
    }

    #[tokio::test]
    async fn cancellation_aborts_in_flight_request() {
        let server = MockServer::start().await;
        Mock::given(path("/api/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let t = transport(&server).await;
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let begin = Instant::now();
        let err = t
            .request::<Value>(Request::get("/slow"), &cancel)
            .await
            .unwrap_err();
        assert!(err.is_canceled());
        assert!(!err.is_retriable());
        assert!(begin.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn already_canceled_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(path("/api/never"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let t = transport(&server).await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = t
            .request::<Value>(Request::get("/never"), &cancel)
            .await
            .unwrap_err();
        assert!(err.is_canceled());
    }

    #[tokio::test]
    async fn connection_refused_is_retriable() {
        // Nothing listens on the discard port.
        let t = HttpTransport::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = t
            .request::<Value>(Request::get("/x"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "network_error");
        assert!(err.is_retriable());
    }

    #[tokio::test]
    async fn undecodable_success_body() {
        let server = MockServer::start().await;
        Mock::given(path("/api/garbage"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let t = transport(&server).await;
        let err = t
            .request::<Value>(Request::get("/garbage"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid_response");
        assert!(!err.is_retriable());
    }

    #[tokio::test]
    async fn empty_success_body_is_null() {
        let server = MockServer::start().await;
        Mock::given(path("/api/empty"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let t = transport(&server).await;
        let value: Value = t
            .request(Request::post("/empty"), &CancellationToken::new())
            .await
            .unwrap();
        assert!(value.is_null());
    }
}
