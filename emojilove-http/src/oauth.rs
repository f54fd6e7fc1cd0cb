//! OAuth 1.0a (HMAC-SHA1) request signing for user-context Twitter calls.
//!
//! The signer owns the four credential strings and produces an
//! `Authorization: OAuth ...` header value per request. Every query and form
//! parameter of the request takes part in the signature, so callers must pass
//! exactly the pairs they put on the wire.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use sha1::Sha1;
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::HttpError;

/// Everything except RFC 3986 unreserved characters.
const OAUTH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

type HmacSha1 = Hmac<Sha1>;

#[derive(Clone)]
pub struct OAuth1Signer {
    consumer_key: String,
    consumer_secret: String,
    token: String,
    token_secret: String,
}

impl fmt::Debug for OAuth1Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth1Signer").finish_non_exhaustive()
    }
}

impl OAuth1Signer {
    pub fn new(
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
        token: impl Into<String>,
        token_secret: impl Into<String>,
    ) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            token: token.into(),
            token_secret: token_secret.into(),
        }
    }

    /// Build the `Authorization` header value with a fresh nonce and timestamp.
    ///
    /// `url` must not carry a query string; its parameters go in `params`.
    pub fn authorization(
        &self,
        method: &str,
        url: &str,
        params: &[(String, String)],
    ) -> Result<String, HttpError> {
        let nonce = Uuid::new_v4().simple().to_string();
        let timestamp = OffsetDateTime::now_utc().unix_timestamp().to_string();
        self.authorization_with(method, url, params, &nonce, &timestamp)
    }

    fn authorization_with(
        &self,
        method: &str,
        url: &str,
        params: &[(String, String)],
        nonce: &str,
        timestamp: &str,
    ) -> Result<String, HttpError> {
        let mut oauth_params = vec![
            ("oauth_consumer_key".to_string(), self.consumer_key.clone()),
            ("oauth_nonce".to_string(), nonce.to_string()),
            ("oauth_signature_method".to_string(), "HMAC-SHA1".to_string()),
            ("oauth_timestamp".to_string(), timestamp.to_string()),
            ("oauth_token".to_string(), self.token.clone()),
            ("oauth_version".to_string(), "1.0".to_string()),
        ];

        let mut signed = oauth_params.clone();
        signed.extend(params.iter().cloned());
        let base = base_string(method, url, &signed);
        let signature = self.sign(&base)?;

        oauth_params.push(("oauth_signature".to_string(), signature));
        oauth_params.sort();

        let header = oauth_params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!("OAuth {header}"))
    }

    fn sign(&self, base: &str) -> Result<String, HttpError> {
        let key = format!(
            "{}&{}",
            percent_encode(&self.consumer_secret),
            percent_encode(&self.token_secret)
        );
        let mut mac = HmacSha1::new_from_slice(key.as_bytes())
            .map_err(|e| HttpError::Signing(e.to_string()))?;
        mac.update(base.as_bytes());
        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }
}

/// Percent-encode a string according to RFC 3986.
pub fn percent_encode(s: &str) -> String {
    utf8_percent_encode(s, OAUTH_ENCODE_SET).to_string()
}

/// Encode `pairs` as a query string with the same rules used for signing.
pub fn encode_query(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Signature base string: `METHOD&url&sorted-params`, each part encoded.
fn base_string(method: &str, url: &str, params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    encoded.sort();

    let param_string = encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        percent_encode(url),
        percent_encode(&param_string)
    )
}
