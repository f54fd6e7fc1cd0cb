use emojilove_config::EmojiLoveConfigLoader;
use serial_test::serial;
use std::{fs, path::PathBuf};
use tempfile::TempDir;

/// Helper to write a YAML file in a temp dir and return its path.
fn write_yaml(tmp: &TempDir, name: &str, yaml: &str) -> PathBuf {
    let p = tmp.path().join(name);
    fs::write(&p, yaml).expect("write yaml");
    p
}

#[test]
#[serial]
fn test_config_load() {
    let tmp = TempDir::new().unwrap();

    let file_yaml = r#"
twitter:
  api_url: "http://127.0.0.1:8080"
  request_timeout_secs: 3
shutdown:
  grace_secs: 1
logging:
  dir: "/tmp/emojilove-logs"
  format: json
  "#;
    let p = write_yaml(&tmp, "emojilove.yaml", file_yaml);

    let config = EmojiLoveConfigLoader::new()
        .with_file(p)
        .load()
        .expect("load settings");

    assert_eq!(config.twitter.api_url, "http://127.0.0.1:8080");
    assert_eq!(config.twitter.stream_url, "https://stream.twitter.com");
    assert_eq!(config.twitter.request_timeout().as_secs(), 3);
    assert_eq!(config.shutdown.grace().as_secs(), 1);
    assert_eq!(
        config.logging.dir.as_deref(),
        Some(std::path::Path::new("/tmp/emojilove-logs"))
    );
}

#[test]
#[serial]
fn missing_settings_file_falls_back_to_defaults() {
    let tmp = TempDir::new().unwrap();

    let config = EmojiLoveConfigLoader::new()
        .with_file(tmp.path().join("absent.yaml"))
        .load()
        .expect("optional file");

    assert_eq!(config.twitter.api_url, "https://api.twitter.com");
    assert_eq!(config.shutdown.grace_secs, 5);
    assert!(!config.logging.stderr);
}
