//! Loader for credentials and runtime settings.
//!
//! Credentials come only from four process environment variables and are
//! checked before anything touches the network. Everything else (endpoints,
//! timeouts, logging) is layered from an optional YAML file plus
//! `EMOJILOVE__`-prefixed environment overrides, with `${VAR}` expansion applied
//! to string values after the layers are merged.
use config::{Config, Environment, File};
use emojilove_common::observability::{LogConfig, LogFormat};
use emojilove_common::{EmojiLoveError, Result};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

pub const CONSUMER_KEY_ENV: &str = "CONSUMER_KEY";
pub const CONSUMER_SECRET_ENV: &str = "CONSUMER_SECRET";
pub const TOKEN_ENV: &str = "TOKEN";
pub const TOKEN_SECRET_ENV: &str = "TOKEN_SECRET";

/// OAuth 1.0a credentials for the monitoring account.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub token: String,
    pub token_secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("consumer_key", &"<redacted>")
            .field("consumer_secret", &"<redacted>")
            .field("token", &"<redacted>")
            .field("token_secret", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Read all four credentials from the process environment.
    ///
    /// Unset and empty variables both count as missing; every missing name is
    /// reported in a single [`EmojiLoveError::MissingCredentials`].
    pub fn from_env() -> Result<Self> {
        Self::from_source(|name| std::env::var(name).ok())
    }

    fn from_source(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut missing = Vec::new();
        let mut take = |name: &'static str| match get(name) {
            Some(v) if !v.trim().is_empty() => v,
            _ => {
                missing.push(name);
                String::new()
            }
        };

        let creds = Self {
            consumer_key: take(CONSUMER_KEY_ENV),
            consumer_secret: take(CONSUMER_SECRET_ENV),
            token: take(TOKEN_ENV),
            token_secret: take(TOKEN_SECRET_ENV),
        };

        if missing.is_empty() {
            Ok(creds)
        } else {
            Err(EmojiLoveError::MissingCredentials(missing))
        }
    }
}

/// Runtime settings; every field has a default so an empty source is valid.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EmojiLoveConfig {
    pub twitter: TwitterSettings,
    pub shutdown: ShutdownSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TwitterSettings {
    pub api_url: String,
    pub stream_url: String,
    pub request_timeout_secs: u64,
    pub stall_warnings: bool,
}

impl Default for TwitterSettings {
    fn default() -> Self {
        Self {
            api_url: "https://api.twitter.com".into(),
            stream_url: "https://stream.twitter.com".into(),
            request_timeout_secs: 15,
            stall_warnings: true,
        }
    }
}

impl TwitterSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ShutdownSettings {
    /// Upper bound on how long the reactor may take to drain after stop.
    pub grace_secs: u64,
}

impl Default for ShutdownSettings {
    fn default() -> Self {
        Self { grace_secs: 5 }
    }
}

impl ShutdownSettings {
    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub dir: Option<PathBuf>,
    pub format: LogFormat,
    pub filter: String,
    pub stderr: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            dir: None,
            format: LogFormat::Text,
            filter: "info".into(),
            stderr: false,
        }
    }
}

impl LoggingSettings {
    pub fn to_log_config(&self) -> LogConfig {
        LogConfig {
            log_dir: self.dir.clone(),
            emit_stderr: self.stderr,
            format: self.format,
            default_filter: self.filter.clone(),
            ..LogConfig::default()
        }
    }
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hides the `config` crate wiring (YAML + env overrides).
pub struct EmojiLoveConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for EmojiLoveConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl EmojiLoveConfigLoader {
    /// Start with no file layers; `EMOJILOVE__` environment overrides are
    /// always applied on [`load`](Self::load).
    ///
    /// ```
    /// use emojilove_config::EmojiLoveConfigLoader;
    ///
    /// let cfg = EmojiLoveConfigLoader::new().load().expect("defaults load");
    /// assert_eq!(cfg.twitter.api_url, "https://api.twitter.com");
    /// assert_eq!(cfg.shutdown.grace_secs, 5);
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
        }
    }

    /// Attach a settings file; the `config` crate infers format by suffix.
    /// A missing file is skipped.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Allow tests to merge inline YAML snippets.
    ///
    /// ```
    /// use emojilove_config::EmojiLoveConfigLoader;
    ///
    /// let cfg = EmojiLoveConfigLoader::new()
    ///     .with_yaml_str("shutdown:\n  grace_secs: 2\n")
    ///     .load()
    ///     .unwrap();
    /// assert_eq!(cfg.shutdown.grace_secs, 2);
    /// assert!(cfg.twitter.stall_warnings);
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources.
    ///
    /// Environment overrides are added last so they win over every file layer.
    pub fn load(self) -> Result<EmojiLoveConfig> {
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix("EMOJILOVE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| EmojiLoveError::Config(e.to_string()))?;

        let mut v: Value = cfg
            .try_deserialize()
            .map_err(|e| EmojiLoveError::Config(e.to_string()))?;
        expand_env_in_value(&mut v);

        serde_json::from_value(v).map_err(|e| EmojiLoveError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serial_test::serial;
    use std::collections::HashMap;

    fn source(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn credentials_load_when_all_present() {
        let creds = Credentials::from_source(source(&[
            ("CONSUMER_KEY", "ck"),
            ("CONSUMER_SECRET", "cs"),
            ("TOKEN", "t"),
            ("TOKEN_SECRET", "ts"),
        ]))
        .unwrap();
        assert_eq!(creds.consumer_key, "ck");
        assert_eq!(creds.token_secret, "ts");
    }

    #[test]
    fn missing_and_empty_credentials_are_reported_together() {
        let err = Credentials::from_source(source(&[
            ("CONSUMER_KEY", "ck"),
            ("CONSUMER_SECRET", "  "),
            ("TOKEN_SECRET", "ts"),
        ]))
        .unwrap_err();
        match err {
            EmojiLoveError::MissingCredentials(names) => {
                assert_eq!(names, vec!["CONSUMER_SECRET", "TOKEN"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn credentials_debug_is_redacted() {
        let creds = Credentials {
            consumer_key: "ck-secret".into(),
            consumer_secret: "cs-secret".into(),
            token: "t-secret".into(),
            token_secret: "ts-secret".into(),
        };
        let shown = format!("{creds:?}");
        for leaked in ["ck-secret", "cs-secret", "t-secret", "ts-secret"] {
            assert!(!shown.contains(leaked), "{leaked} leaked into {shown}");
        }
        assert!(shown.contains("<redacted>"));
    }

    #[test]
    #[serial]
    fn missing_token_env_var_fails() {
        temp_env::with_vars(
            [
                ("CONSUMER_KEY", Some("ck")),
                ("CONSUMER_SECRET", Some("cs")),
                ("TOKEN", None),
                ("TOKEN_SECRET", Some("ts")),
            ],
            || {
                let err = Credentials::from_env().unwrap_err();
                assert!(err.to_string().contains("TOKEN"));
                assert!(matches!(err, EmojiLoveError::MissingCredentials(ref n) if *n == vec!["TOKEN"]));
            },
        );
    }

    #[test]
    #[serial]
    fn env_overrides_yaml() {
        temp_env::with_var("EMOJILOVE__SHUTDOWN__GRACE_SECS", Some("9"), || {
            let cfg = EmojiLoveConfigLoader::new()
                .with_yaml_str("shutdown:\n  grace_secs: 2\n")
                .load()
                .unwrap();
            assert_eq!(cfg.shutdown.grace_secs, 9);
        });
    }

    #[test]
    #[serial]
    fn yaml_values_expand_env_placeholders() {
        temp_env::with_var("MOCK_STREAM_HOST", Some("127.0.0.1:9999"), || {
            let cfg = EmojiLoveConfigLoader::new()
                .with_yaml_str("twitter:\n  stream_url: \"http://${MOCK_STREAM_HOST}\"\n")
                .load()
                .unwrap();
            assert_eq!(cfg.twitter.stream_url, "http://127.0.0.1:9999");
            assert_eq!(cfg.twitter.api_url, "https://api.twitter.com");
        });
    }

    #[test]
    fn logging_settings_map_onto_log_config() {
        let cfg = EmojiLoveConfigLoader::new()
            .with_yaml_str("logging:\n  format: json\n  filter: debug\n  stderr: true\n")
            .load()
            .unwrap();
        let log = cfg.logging.to_log_config();
        assert_eq!(log.format, LogFormat::Json);
        assert_eq!(log.default_filter, "debug");
        assert!(log.emit_stderr);
        assert_eq!(log.app_name, "emojilove");
    }

    #[test]
    fn invalid_types_surface_as_config_errors() {
        let err = EmojiLoveConfigLoader::new()
            .with_yaml_str("shutdown:\n  grace_secs: soon\n")
            .load()
            .unwrap_err();
        assert!(matches!(err, EmojiLoveError::Config(_)));
    }

    #[test]
    #[serial]
    fn stops_on_cycles_and_leaves_value_reasonable() {
        temp_env::with_vars([("A", Some("${B}")), ("B", Some("${A}"))], || {
            let mut v = json!("x=${A}-y");
            expand_env_in_value(&mut v);
            let s = v.as_str().unwrap();
            assert!(s.starts_with("x=") && s.ends_with("-y"));
            assert!(s.contains("${"));
        });
    }

    #[test]
    fn unknown_vars_are_left_as_is() {
        let mut v = json!({ "url": "http://${DOES_NOT_EXIST}/" });
        expand_env_in_value(&mut v);
        assert_eq!(v, json!({ "url": "http://${DOES_NOT_EXIST}/" }));
    }
}
