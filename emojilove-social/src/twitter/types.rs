use serde::{Deserialize, Serialize};

/// Entry of the `users/lookup` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id_str: String,
    pub screen_name: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tweet {
    pub id: u64,
    #[serde(default)]
    pub id_str: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub full_text: Option<String>,
    #[serde(default)]
    pub truncated: bool,

    // Present on streamed tweets longer than the legacy 140 characters.
    #[serde(default)]
    pub extended_tweet: Option<ExtendedTweet>,
    #[serde(default)]
    pub user: Option<TweetAuthor>,
}

impl Tweet {
    /// Longest body available on the payload.
    pub fn body(&self) -> &str {
        self.extended_tweet
            .as_ref()
            .map(|e| e.full_text.as_str())
            .or(self.full_text.as_deref())
            .or(self.text.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtendedTweet {
    pub full_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TweetAuthor {
    pub screen_name: String,
}

/// `{"disconnect": {...}}` notice sent before the server drops the stream.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Disconnect {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub stream_name: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// `{"warning": {...}}` stall warning, sent when `stall_warnings=true`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StallWarning {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub percent_full: Option<u32>,
}
