//! Minimal HTTP client with safe logging and OAuth 1.0a signing.
//!
//! - Request options: `Auth`, query params, timeout
//! - Redacts sensitive query params and never logs secret values
//! - JSON helpers for one-shot calls and a raw response for long-lived streams
//! - Optional *raw* request/response logging via `EMOJILOVE_HTTP_RAW=1`
//!
//! Example (no_run):
//! ```rust
//! # async fn demo() -> Result<(), emojilove_http::HttpError> {
//! let client = emojilove_http::HttpClient::new("https://api.example.com")?;
//! let got: serde_json::Value = client
//!     .get_json("v1/items", emojilove_http::RequestOpts::default())
//!     .await?;
//! # Ok(()) }
//! ```
//!
//! There is no retry layer: every call is attempted exactly once and failures
//! are returned to the caller.
//!
//! Observability: structured `tracing` events are emitted for request start,
//! response headers (including Twitter rate-limit headers), body snippets
//! (truncated), final errors, and (optionally) raw request/response lines
//! (target `http.raw`) when `EMOJILOVE_HTTP_RAW=1`.

pub mod oauth;

use reqwest::header::{AUTHORIZATION, HeaderMap};
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::env;
use std::time::Duration;
use thiserror::Error;

pub use oauth::OAuth1Signer;
pub use reqwest::{Method, StatusCode};

// ==============================
// Raw logging toggles
// ==============================

const RAW_ENV: &str = "EMOJILOVE_HTTP_RAW";
const RAW_MAX_BODY: usize = 64 * 1024; // cap raw body logs (64 KiB)

fn raw_enabled() -> bool {
    matches!(
        env::var(RAW_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

/// Render a best-effort curl command for repro/debug, with secrets redacted.
fn make_curl(method: &Method, url: &Url, signed: bool) -> String {
    let mut parts = vec!["curl".to_string(), format!("-X{}", method)];
    if signed {
        parts.push("-H 'Authorization: OAuth <redacted>'".to_string());
    }
    parts.push(format!("'{}'", url.as_str().replace('\'', r"'\''")));
    parts.join(" ")
}

/// Redact sensitive headers for logging
fn redact_headers(h: &HeaderMap) -> Vec<(String, String)> {
    h.iter()
        .map(|(k, v)| {
            let key = k.as_str().to_string();
            let mut val = v.to_str().unwrap_or("").to_string();
            if key.eq_ignore_ascii_case("authorization") || key.eq_ignore_ascii_case("set-cookie")
            {
                val = "<redacted>".into();
            }
            (key, val)
        })
        .collect()
}

fn is_secret_param(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "access_token"
            | "authorization"
            | "auth"
            | "key"
            | "api_key"
            | "token"
            | "secret"
            | "client_secret"
            | "oauth_token"
            | "oauth_signature"
    )
}

// ==============================
// Errors
// ==============================

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("request build failed: {0}")]
    Build(String),
    #[error("request signing failed: {0}")]
    Signing(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("decode error: {0}, body_snippet: {1}")]
    Decode(String, String),
    #[error("server returned error {status}: {message}, request_id={request_id}")]
    Api {
        status: StatusCode,
        message: String,
        request_id: String,
    },
}

impl HttpError {
    /// HTTP status for API errors, `None` for transport-level failures.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

// ==============================
// Auth & Request Options
// ==============================

/// Authentication strategies supported by the HTTP client helpers.
#[derive(Clone, Debug)]
pub enum Auth<'a> {
    /// `Authorization: OAuth ...` signed over method, URL and query params.
    OAuth1(&'a OAuth1Signer),
    None,
}

/// Per-request tuning knobs for the HTTP client.
///
/// ```
/// use emojilove_http::{Auth, RequestOpts};
/// use std::time::Duration;
///
/// let opts = RequestOpts {
///     timeout: Some(Duration::from_secs(30)),
///     auth: Some(Auth::None),
///     query: Some(vec![("screen_name", "alice".into())]),
/// };
///
/// assert_eq!(opts.timeout.unwrap().as_secs(), 30);
/// assert_eq!(opts.query.unwrap().len(), 1);
/// ```
#[derive(Clone, Debug, Default)]
pub struct RequestOpts<'a> {
    pub timeout: Option<Duration>,
    pub auth: Option<Auth<'a>>,
    pub query: Option<Vec<(&'a str, Cow<'a, str>)>>, // e.g. [("q", "term".into())]
}

// ==============================
// Client
// ==============================

#[derive(Clone)]
pub struct HttpClient {
    base: Url,
    inner: Client,
    pub default_timeout: Duration,
}

impl HttpClient {
    /// Construct a client anchored to a base URL.
    ///
    /// ```no_run
    /// use emojilove_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new("https://api.example.com")?;
    /// assert_eq!(client.default_timeout, Duration::from_secs(15));
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn new(base: &str) -> Result<Self, HttpError> {
        let base = Url::parse(base).map_err(|e| HttpError::Url(e.to_string()))?;
        let inner = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .user_agent(concat!("emojilove/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            base,
            inner,
            default_timeout: Duration::from_secs(15),
        })
    }

    /// Override the default timeout returned by [`HttpClient::new`].
    ///
    /// ```no_run
    /// use emojilove_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new("https://api.example.com")?
    ///     .with_timeout(Duration::from_secs(2));
    /// assert_eq!(client.default_timeout, Duration::from_secs(2));
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.default_timeout = dur;
        self
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// GET JSON with per-request options.
    pub async fn get_json<T>(&self, path: &str, opts: RequestOpts<'_>) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        self.request_json(Method::GET, path, opts).await
    }

    /// POST with parameters in the query string and decode the JSON reply.
    pub async fn post_json<T>(&self, path: &str, opts: RequestOpts<'_>) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        self.request_json(Method::POST, path, opts).await
    }

    /// Send a request whose body is consumed incrementally by the caller.
    ///
    /// Only the connect timeout applies; the returned response stays open
    /// until either side closes it. Non-2xx statuses are turned into
    /// [`HttpError::Api`] before the body is handed out.
    pub async fn open_stream(
        &self,
        method: Method,
        path: &str,
        opts: RequestOpts<'_>,
    ) -> Result<Response, HttpError> {
        let (rb, url) = self.prepare(&method, path, &opts, None)?;
        let req_id = next_request_id();
        tracing::info!(
            req_id=%req_id,
            method=%method,
            host_path=%format!("{}{}", url.host_str().unwrap_or("-"), url.path()),
            "http.stream.open"
        );

        let resp = rb.send().await.map_err(|err| {
            tracing::warn!(req_id=%req_id, message=%err, "http.stream.network_error");
            HttpError::Network(err.to_string())
        })?;

        let status = resp.status();
        if status.is_success() {
            tracing::info!(req_id=%req_id, %status, "http.stream.connected");
            return Ok(resp);
        }

        let headers = resp.headers().clone();
        let bytes = resp.bytes().await.unwrap_or_default();
        Err(api_error(&req_id, status, &headers, &bytes))
    }

    // ==============================
    // Core request implementation
    // ==============================

    fn resolve(&self, path: &str) -> Result<Url, HttpError> {
        self.base
            .join(path)
            .map_err(|e| HttpError::Url(e.to_string()))
    }

    /// Build the request: resolve the URL, attach the query, sign it.
    fn prepare(
        &self,
        method: &Method,
        path: &str,
        opts: &RequestOpts<'_>,
        timeout: Option<Duration>,
    ) -> Result<(RequestBuilder, Url), HttpError> {
        let mut url = self.resolve(path)?;
        url.set_query(None);
        url.set_fragment(None);
        let signing_url = url.to_string();

        let pairs: Vec<(String, String)> = opts
            .query
            .as_ref()
            .map(|q| {
                q.iter()
                    .map(|(k, v)| ((*k).to_string(), v.as_ref().to_string()))
                    .collect()
            })
            .unwrap_or_default();
        if !pairs.is_empty() {
            url.set_query(Some(&oauth::encode_query(&pairs)));
        }

        let mut rb = self.inner.request(method.clone(), url.clone());
        if let Some(timeout) = timeout {
            rb = rb.timeout(timeout);
        }

        let signed = match &opts.auth {
            Some(Auth::OAuth1(signer)) => {
                let header = signer.authorization(method.as_str(), &signing_url, &pairs)?;
                rb = rb.header(AUTHORIZATION, header);
                true
            }
            Some(Auth::None) | None => false,
        };

        if raw_enabled() {
            let curl = make_curl(method, &url, signed);
            tracing::debug!(target: "http.raw", %curl, "request");
        }

        Ok((rb, url))
    }

    async fn request_json<T>(
        &self,
        method: Method,
        path: &str,
        opts: RequestOpts<'_>,
    ) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        let timeout = opts.timeout.unwrap_or(self.default_timeout);
        let (rb, url) = self.prepare(&method, path, &opts, Some(timeout))?;

        // ----- Safe request logging (pre-send) -----
        let auth_kind = match &opts.auth {
            Some(Auth::OAuth1(_)) => "oauth1",
            Some(Auth::None) | None => "none",
        };

        let redacted_q: Vec<(String, String)> = opts
            .query
            .as_ref()
            .map(|q| {
                q.iter()
                    .map(|(k, v)| {
                        (
                            (*k).to_string(),
                            if is_secret_param(k) {
                                "<redacted>".to_string()
                            } else {
                                v.as_ref().to_string()
                            },
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();

        let req_id = next_request_id();
        tracing::debug!(
            req_id=%req_id,
            method=%method,
            host_path=%format!("{}{}", url.host_str().unwrap_or("-"), url.path()),
            query=?redacted_q,
            timeout_ms=timeout.as_millis() as u64,
            auth_kind,
            "http.request.start"
        );

        // ----- Send -----
        let t0 = std::time::Instant::now();
        let resp = rb.send().await.map_err(|err| {
            tracing::warn!(req_id=%req_id, message=%err, "http.network_error.send");
            HttpError::Network(err.to_string())
        })?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = resp.bytes().await.map_err(|err| {
            tracing::warn!(req_id=%req_id, message=%err, "http.network_error.body");
            HttpError::Network(err.to_string())
        })?;
        let dur_ms = t0.elapsed().as_millis() as u64;

        let limit = headers
            .get("x-rate-limit-limit")
            .and_then(|v| v.to_str().ok());
        let remain = headers
            .get("x-rate-limit-remaining")
            .and_then(|v| v.to_str().ok());
        let reset = headers
            .get("x-rate-limit-reset")
            .and_then(|v| v.to_str().ok());

        tracing::debug!(
            req_id=%req_id,
            %status,
            duration_ms=dur_ms,
            body_len=bytes.len(),
            rate_limit.limit=?limit,
            rate_limit.remaining=?remain,
            rate_limit.reset=?reset,
            "http.response.headers"
        );

        if raw_enabled() {
            let hdrs = redact_headers(&headers);
            let mut body_snip = bytes.to_vec();
            let truncated = body_snip.len() > RAW_MAX_BODY;
            if truncated {
                body_snip.truncate(RAW_MAX_BODY);
            }
            let text = String::from_utf8_lossy(&body_snip);
            tracing::info!(
                target:"http.raw",
                %req_id,
                status=%status,
                duration_ms=dur_ms,
                headers=?hdrs,
                body=%text,
                truncated
            );
        }

        let snippet = snip_body(&bytes);
        tracing::trace!(
            req_id=%req_id,
            body_snippet=%snippet,
            "http.response.body_snippet"
        );

        if !status.is_success() {
            return Err(api_error(&req_id, status, &headers, &bytes));
        }

        serde_json::from_slice::<T>(&bytes).map_err(|e| {
            tracing::warn!(
                req_id=%req_id,
                serde_line=%e.line(),
                serde_col=%e.column(),
                serde_err=%e.to_string(),
                body_snippet=%snippet,
                "http.response.decode_error"
            );
            HttpError::Decode(e.to_string(), snippet)
        })
    }
}

// ==============================
// Helpers
// ==============================

fn next_request_id() -> String {
    format!("r{}", uuid::Uuid::new_v4().simple())
}

fn api_error(req_id: &str, status: StatusCode, headers: &HeaderMap, body: &[u8]) -> HttpError {
    let message = extract_error_message(body);
    let request_id = headers
        .get("x-request-id")
        .or_else(|| headers.get("x-transaction-id"))
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    tracing::warn!(
        req_id=%req_id,
        %status,
        message=%message,
        x_request_id=%request_id,
        body_snippet=%snip_body(body),
        "http.error"
    );
    HttpError::Api {
        status,
        message,
        request_id,
    }
}

fn extract_error_message(body: &[u8]) -> String {
    // Twitter: {"errors":[{"code":17,"message":"..."}]}
    #[derive(Deserialize)]
    struct TwErrors {
        errors: Vec<TwErr>,
    }
    #[derive(Deserialize)]
    struct TwErr {
        #[serde(default)]
        code: Option<i64>,
        #[serde(default)]
        message: String,
        #[serde(default)]
        detail: String,
    }

    // Generic: {"message":"..."} or {"error":"..."}
    #[derive(Deserialize)]
    struct Msg {
        #[serde(default)]
        message: String,
        #[serde(default)]
        error: String,
    }

    if let Ok(tw) = serde_json::from_slice::<TwErrors>(body) {
        if let Some(first) = tw.errors.into_iter().next() {
            let text = if !first.message.is_empty() {
                first.message
            } else {
                first.detail
            };
            if !text.is_empty() {
                return match first.code {
                    Some(code) => format!("{text} (code {code})"),
                    None => text,
                };
            }
        }
    }
    if let Ok(m) = serde_json::from_slice::<Msg>(body) {
        if !m.message.is_empty() {
            return m.message;
        }
        if !m.error.is_empty() {
            return m.error;
        }
    }
    snip_body(body)
}

fn snip_body(body: &[u8]) -> String {
    let mut snip = String::from_utf8_lossy(body).to_string();
    if snip.len() > 500 {
        let mut cut = 500;
        while !snip.is_char_boundary(cut) {
            cut -= 1;
        }
        snip.truncate(cut);
        snip.push_str("...");
    }
    snip
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn signer() -> OAuth1Signer {
        OAuth1Signer::new("ck", "cs", "tok", "ts")
    }

    #[test]
    fn twitter_error_bodies_are_summarised() {
        let body = br#"{"errors":[{"code":17,"message":"No user matches for specified terms."}]}"#;
        assert_eq!(
            extract_error_message(body),
            "No user matches for specified terms. (code 17)"
        );
        assert_eq!(extract_error_message(br#"{"error":"nope"}"#), "nope");
        assert_eq!(extract_error_message(b"plain text"), "plain text");
    }

    #[test]
    fn long_bodies_are_truncated_on_char_boundaries() {
        let body = "🚀".repeat(300);
        let snip = snip_body(body.as_bytes());
        assert!(snip.ends_with("..."));
        assert!(snip.len() <= 503);
    }

    #[test]
    fn secret_params_are_detected() {
        assert!(is_secret_param("oauth_signature"));
        assert!(is_secret_param("Token"));
        assert!(!is_secret_param("screen_name"));
    }

    #[test]
    fn curl_never_shows_credentials() {
        let url = Url::parse("https://api.twitter.com/1.1/users/lookup.json?screen_name=a").unwrap();
        let curl = make_curl(&Method::GET, &url, true);
        assert!(curl.contains("OAuth <redacted>"));
        assert!(curl.contains("screen_name=a"));
    }

    #[tokio::test]
    async fn signed_get_sends_query_and_authorization() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/1.1/users/lookup.json"))
            .and(query_param("screen_name", "alice"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{"id_str": "1"}])))
            .expect(1)
            .mount(&server)
            .await;

        let signer = signer();
        let client = HttpClient::new(&server.uri()).unwrap();
        let got: serde_json::Value = client
            .get_json(
                "1.1/users/lookup.json",
                RequestOpts {
                    auth: Some(Auth::OAuth1(&signer)),
                    query: Some(vec![("screen_name", "alice".into())]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(got[0]["id_str"], "1");
    }

    #[tokio::test]
    async fn api_errors_carry_status_and_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1.1/favorites/create.json"))
            .respond_with(ResponseTemplate::new(403).set_body_json(
                serde_json::json!({"errors":[{"code":139,"message":"You have already favorited this status."}]}),
            ))
            .mount(&server)
            .await;

        let client = HttpClient::new(&server.uri()).unwrap();
        let err = client
            .post_json::<serde_json::Value>(
                "1.1/favorites/create.json",
                RequestOpts {
                    query: Some(vec![("id", "42".into())]),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::FORBIDDEN));
        assert!(err.to_string().contains("already favorited"));
    }

    #[tokio::test]
    async fn undecodable_success_body_is_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = HttpClient::new(&server.uri()).unwrap();
        let err = client
            .get_json::<serde_json::Value>("anything", RequestOpts::default())
            .await
            .unwrap_err();
        assert!(matches!(err, HttpError::Decode(_, ref snip) if snip == "not json"));
        assert_eq!(err.status(), None);
    }

    #[tokio::test]
    async fn open_stream_rejects_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1.1/statuses/filter.json"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
            .mount(&server)
            .await;

        let client = HttpClient::new(&server.uri()).unwrap();
        let err = client
            .open_stream(Method::POST, "1.1/statuses/filter.json", RequestOpts::default())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
    }

    #[tokio::test]
    async fn open_stream_hands_back_the_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1.1/statuses/filter.json"))
            .and(query_param("follow", "1,2"))
            .respond_with(ResponseTemplate::new(200).set_body_string("\r\n{\"id\":1}\r\n"))
            .mount(&server)
            .await;

        let client = HttpClient::new(&server.uri()).unwrap();
        let resp = client
            .open_stream(
                Method::POST,
                "1.1/statuses/filter.json",
                RequestOpts {
                    query: Some(vec![("follow", "1,2".into())]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(resp.text().await.unwrap(), "\r\n{\"id\":1}\r\n");
    }
}
