use anyhow::{Context, Result};
use clap::Parser;
use emojilove_actors::ConsoleReporter;
use emojilove_common::observability::init_logging;
use emojilove_config::{Credentials, EmojiLoveConfig, EmojiLoveConfigLoader};
use emojilove_http::OAuth1Signer;
use emojilove_runtime::{EmojiLoveRuntime, wait_for_shutdown_signal};
use emojilove_social::twitter::{Endpoints, TwitterApi};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
mod lifecycle;

/// Like every tweet a given account posts that contains an emoji.
#[derive(Debug, Parser)]
#[command(name = "emojilove", version)]
struct Cli {
    /// Screen name of the account to follow.
    #[arg(long, default_value = "")]
    username: String,

    /// Optional settings file; skipped when absent.
    #[arg(long, default_value = "emojilove.yaml")]
    config: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1) Settings and credentials, before anything touches the network
    let cfg: EmojiLoveConfig = EmojiLoveConfigLoader::new().with_file(&cli.config).load()?;
    let creds = Credentials::from_env()?;

    let log_path = init_logging(cfg.logging.to_log_config())?;
    tracing::info!(log = %log_path.display(), username = %cli.username, "emojilove starting");

    let signer = OAuth1Signer::new(
        creds.consumer_key,
        creds.consumer_secret,
        creds.token,
        creds.token_secret,
    );
    let endpoints = Endpoints {
        api_url: cfg.twitter.api_url.clone(),
        stream_url: cfg.twitter.stream_url.clone(),
        request_timeout: cfg.twitter.request_timeout(),
        stall_warnings: cfg.twitter.stall_warnings,
    };
    let api = TwitterApi::new(signer, &endpoints)?;

    // 2) Run until a signal or the stream ends
    let runtime = EmojiLoveRuntime::build("emojilove", None).context("building tokio runtime")?;
    let cancel = runtime.handle().child_token();
    let shutdown = async {
        match wait_for_shutdown_signal().await {
            Ok(signal) => tracing::info!(signal, "shutdown signal received"),
            Err(e) => {
                tracing::error!(error = ?e, "cannot listen for shutdown signals");
                std::future::pending::<()>().await;
            }
        }
    };
    let outcome = runtime.block_on(lifecycle::run(
        api,
        &cli.username,
        Arc::new(ConsoleReporter),
        shutdown,
        cfg.shutdown.grace(),
        cancel,
    ));
    runtime.shutdown(Duration::from_secs(1));

    match &outcome {
        Ok(()) => tracing::info!("emojilove stopped"),
        Err(e) => tracing::error!(error = %e, "emojilove exiting with failure"),
    }
    outcome.map_err(anyhow::Error::from)
}
