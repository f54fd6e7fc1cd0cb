//! Thin wrapper over the three Twitter v1.1 endpoints the monitor needs.
//!
//! Every call is signed with OAuth 1.0a user-context credentials and attempted
//! once. Failures are mapped onto [`EmojiLoveError`] so callers can tell a
//! fatal lookup or stream failure from a recoverable favorite failure.
use crate::twitter::stream::FilterStream;
use crate::twitter::types::User;
use emojilove_common::{EmojiLoveError, Result};
use emojilove_http::{Auth, HttpClient, HttpError, Method, OAuth1Signer, RequestOpts, StatusCode};
use std::sync::Arc;
use std::time::Duration;

const LOOKUP_PATH: &str = "1.1/users/lookup.json";
const FAVORITE_PATH: &str = "1.1/favorites/create.json";
const FILTER_PATH: &str = "1.1/statuses/filter.json";

/// Where the API lives and how to talk to it.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub api_url: String,
    pub stream_url: String,
    /// Applies to lookup and favorite calls. The stream has no overall timeout.
    pub request_timeout: Duration,
    pub stall_warnings: bool,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            api_url: "https://api.twitter.com".into(),
            stream_url: "https://stream.twitter.com".into(),
            request_timeout: Duration::from_secs(15),
            stall_warnings: true,
        }
    }
}

#[derive(Clone)]
pub struct TwitterApi {
    api: HttpClient,
    stream: HttpClient,
    signer: Arc<OAuth1Signer>,
    stall_warnings: bool,
}

impl TwitterApi {
    pub fn new(signer: OAuth1Signer, endpoints: &Endpoints) -> Result<Self> {
        let api = HttpClient::new(&with_trailing_slash(&endpoints.api_url))
            .map_err(|e| EmojiLoveError::Config(format!("twitter.api_url: {e}")))?
            .with_timeout(endpoints.request_timeout);
        let stream = HttpClient::new(&with_trailing_slash(&endpoints.stream_url))
            .map_err(|e| EmojiLoveError::Config(format!("twitter.stream_url: {e}")))?;
        Ok(Self {
            api,
            stream,
            signer: Arc::new(signer),
            stall_warnings: endpoints.stall_warnings,
        })
    }

    /// Resolve a screen name (with or without a leading `@`) to its numeric id.
    pub async fn lookup_user_id(&self, username: &str) -> Result<String> {
        let name = username.trim().trim_start_matches('@').trim();
        if name.is_empty() {
            return Err(EmojiLoveError::Lookup {
                username: username.to_string(),
                reason: "username is empty".into(),
            });
        }

        let opts = RequestOpts {
            timeout: None,
            auth: Some(Auth::OAuth1(&self.signer)),
            query: Some(vec![("screen_name", name.into())]),
        };
        let users: Vec<User> = match self.api.get_json(LOOKUP_PATH, opts).await {
            Ok(users) => users,
            Err(e) if e.status() == Some(StatusCode::NOT_FOUND) => {
                return Err(EmojiLoveError::UserNotFound(name.to_string()));
            }
            Err(e) => {
                return Err(EmojiLoveError::Lookup {
                    username: name.to_string(),
                    reason: e.to_string(),
                });
            }
        };

        let user = users
            .into_iter()
            .next()
            .ok_or_else(|| EmojiLoveError::UserNotFound(name.to_string()))?;
        tracing::info!(screen_name = %user.screen_name, id = %user.id_str, "twitter.lookup.resolved");
        Ok(user.id_str)
    }

    /// Mark a tweet as liked by the authenticated account.
    pub async fn favorite(&self, id: u64) -> Result<()> {
        let opts = RequestOpts {
            timeout: None,
            auth: Some(Auth::OAuth1(&self.signer)),
            query: Some(vec![("id", id.to_string().into())]),
        };
        self.api
            .post_json::<serde_json::Value>(FAVORITE_PATH, opts)
            .await
            .map(|_| tracing::debug!(id, "twitter.favorite.ok"))
            .map_err(|e| EmojiLoveError::Favorite {
                id,
                reason: e.to_string(),
            })
    }

    /// Open a filtered stream delivering tweets by any of `follow`.
    ///
    /// An empty follow set is rejected locally without a request.
    pub async fn filter(&self, follow: &[String]) -> Result<FilterStream> {
        let joined = follow.join(",");
        if follow.is_empty() {
            return Err(EmojiLoveError::StreamOpen {
                follow: joined,
                reason: "no user ids to follow".into(),
            });
        }

        let mut query = vec![("follow", joined.as_str().into())];
        if self.stall_warnings {
            query.push(("stall_warnings", "true".into()));
        }
        let opts = RequestOpts {
            timeout: None,
            auth: Some(Auth::OAuth1(&self.signer)),
            query: Some(query),
        };
        let resp = self
            .stream
            .open_stream(Method::POST, FILTER_PATH, opts)
            .await
            .map_err(|e: HttpError| EmojiLoveError::StreamOpen {
                follow: joined.clone(),
                reason: e.to_string(),
            })?;
        tracing::info!(follow = %joined, "twitter.stream.open");
        Ok(FilterStream::spawn(resp.bytes_stream()))
    }
}

fn with_trailing_slash(base: &str) -> String {
    if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{base}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::twitter::stream::{Post, StreamEvent};
    use wiremock::matchers::{header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api_for(server: &MockServer) -> TwitterApi {
        let endpoints = Endpoints {
            api_url: server.uri(),
            stream_url: server.uri(),
            request_timeout: Duration::from_secs(2),
            stall_warnings: true,
        };
        TwitterApi::new(OAuth1Signer::new("ck", "cs", "tk", "ts"), &endpoints).unwrap()
    }

    #[test]
    fn bad_base_urls_are_config_errors() {
        let endpoints = Endpoints {
            api_url: "not a url".into(),
            ..Endpoints::default()
        };
        let err = TwitterApi::new(OAuth1Signer::new("ck", "cs", "tk", "ts"), &endpoints)
            .err()
            .unwrap();
        assert!(matches!(err, EmojiLoveError::Config(_)));
    }

    #[tokio::test]
    async fn lookup_strips_at_sign_and_returns_first_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/1.1/users/lookup.json"))
            .and(query_param("screen_name", "alice"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[{"id_str":"783214","screen_name":"alice","name":"Alice"}]"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let id = api_for(&server).lookup_user_id("@alice").await.unwrap();
        assert_eq!(id, "783214");
    }

    #[tokio::test]
    async fn lookup_of_unknown_user_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/1.1/users/lookup.json"))
            .and(query_param("screen_name", "ghost"))
            .respond_with(ResponseTemplate::new(404).set_body_string(
                r#"{"errors":[{"code":17,"message":"No user matches for specified terms."}]}"#,
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/1.1/users/lookup.json"))
            .and(query_param("screen_name", "nobody"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .mount(&server)
            .await;

        let api = api_for(&server);
        let err = api.lookup_user_id("ghost").await.unwrap_err();
        assert!(matches!(err, EmojiLoveError::UserNotFound(ref u) if u == "ghost"));
        let err = api.lookup_user_id("nobody").await.unwrap_err();
        assert!(matches!(err, EmojiLoveError::UserNotFound(ref u) if u == "nobody"));
    }

    #[tokio::test]
    async fn lookup_failures_carry_the_reason() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/1.1/users/lookup.json"))
            .respond_with(ResponseTemplate::new(401).set_body_string(
                r#"{"errors":[{"code":32,"message":"Could not authenticate you."}]}"#,
            ))
            .mount(&server)
            .await;

        let err = api_for(&server).lookup_user_id("alice").await.unwrap_err();
        match err {
            EmojiLoveError::Lookup { username, reason } => {
                assert_eq!(username, "alice");
                assert!(reason.contains("Could not authenticate you."), "{reason}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_username_fails_without_a_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .expect(0)
            .mount(&server)
            .await;

        let err = api_for(&server).lookup_user_id(" @ ").await.unwrap_err();
        assert!(matches!(err, EmojiLoveError::Lookup { .. }));
    }

    #[tokio::test]
    async fn favorite_posts_the_tweet_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1.1/favorites/create.json"))
            .and(query_param("id", "1050118621198921728"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"id":1050118621198921728}"#))
            .expect(1)
            .mount(&server)
            .await;

        api_for(&server).favorite(1050118621198921728).await.unwrap();
    }

    #[tokio::test]
    async fn favorite_rejection_is_a_favorite_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1.1/favorites/create.json"))
            .respond_with(ResponseTemplate::new(403).set_body_string(
                r#"{"errors":[{"code":139,"message":"You have already favorited this status."}]}"#,
            ))
            .mount(&server)
            .await;

        let err = api_for(&server).favorite(42).await.unwrap_err();
        assert!(!err.is_fatal());
        assert!(matches!(err, EmojiLoveError::Favorite { id: 42, .. }));
    }

    #[tokio::test]
    async fn empty_follow_set_is_rejected_locally() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = api_for(&server).filter(&[]).await.err().unwrap();
        assert!(matches!(err, EmojiLoveError::StreamOpen { .. }));
    }

    #[tokio::test]
    async fn filter_streams_posts_from_followed_ids() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1.1/statuses/filter.json"))
            .and(query_param("follow", "783214"))
            .and(query_param("stall_warnings", "true"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "\r\n{\"id\":5,\"text\":\"hi 🌞\",\"user\":{\"screen_name\":\"alice\"}}\r\n",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let stream = api_for(&server).filter(&["783214".into()]).await.unwrap();
        let (mut rx, stopper) = stream.into_parts();
        assert_eq!(
            rx.recv().await,
            Some(StreamEvent::Post(Post {
                id: 5,
                text: "hi 🌞".into(),
                author: Some("alice".into()),
            }))
        );
        assert_eq!(rx.recv().await, None);
        stopper.stop().await;
    }

    #[tokio::test]
    async fn rejected_stream_is_a_stream_open_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1.1/statuses/filter.json"))
            .respond_with(ResponseTemplate::new(420).set_body_string("Enhance Your Calm"))
            .mount(&server)
            .await;

        let err = api_for(&server).filter(&["1".into()]).await.err().unwrap();
        match err {
            EmojiLoveError::StreamOpen { follow, reason } => {
                assert_eq!(follow, "1");
                assert!(reason.contains("420"), "{reason}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
