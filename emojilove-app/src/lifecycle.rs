use emojilove_actors::{Liker, ReactorActor, StatusReporter, spawn_actor};
use emojilove_common::{EmojiLoveError, Result};
use emojilove_social::twitter::{FilterStream, TwitterApi};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Running,
    Stopping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Signal,
    StreamEnded,
}

struct Lifecycle {
    phase: Phase,
}

impl Lifecycle {
    fn new() -> Self {
        tracing::info!(phase = ?Phase::Init, "lifecycle.phase");
        Self { phase: Phase::Init }
    }

    fn enter(&mut self, next: Phase) {
        tracing::info!(from = ?self.phase, to = ?next, "lifecycle.phase");
        self.phase = next;
    }
}

/// Resolve `username`, follow it, and react to its posts until `shutdown`
/// resolves or the server ends the stream.
pub async fn run<F>(
    api: TwitterApi,
    username: &str,
    reporter: Arc<dyn StatusReporter>,
    shutdown: F,
    grace: Duration,
    cancel: CancellationToken,
) -> Result<()>
where
    F: Future<Output = ()>,
{
    let mut lifecycle = Lifecycle::new();

    let id = api.lookup_user_id(username).await?;
    let stream = api.filter(std::slice::from_ref(&id)).await?;
    println!("Monitoring tweets by {username} ({id}). Press Ctrl-C to stop.");

    let liker: Arc<dyn Liker> = Arc::new(api);
    match monitor(&mut lifecycle, stream, liker, reporter, shutdown, grace, cancel).await {
        StopReason::Signal => Ok(()),
        StopReason::StreamEnded => Err(EmojiLoveError::StreamEnded),
    }
}

async fn monitor<F>(
    lifecycle: &mut Lifecycle,
    stream: FilterStream,
    liker: Arc<dyn Liker>,
    reporter: Arc<dyn StatusReporter>,
    shutdown: F,
    grace: Duration,
    cancel: CancellationToken,
) -> StopReason
where
    F: Future<Output = ()>,
{
    let (events, stopper) = stream.into_parts();
    let reactor = spawn_actor(ReactorActor::new(liker, reporter), events, Some(cancel.clone()));
    let mut task = reactor.task;
    lifecycle.enter(Phase::Running);

    tokio::pin!(shutdown);
    tokio::select! {
        _ = &mut shutdown => {}
        res = &mut task => {
            // Reactor only finishes on its own once the channel closed.
            lifecycle.enter(Phase::Stopping);
            stopper.stop().await;
            log_reactor_exit(res);
            tracing::warn!("stream ended by server");
            return StopReason::StreamEnded;
        }
    }

    lifecycle.enter(Phase::Stopping);
    stopper.stop().await;
    match tokio::time::timeout(grace, &mut task).await {
        Ok(res) => log_reactor_exit(res),
        Err(_) => {
            tracing::warn!(grace_ms = grace.as_millis() as u64, "reactor did not drain in time; cancelling");
            cancel.cancel();
            log_reactor_exit(task.await);
        }
    }
    StopReason::Signal
}

fn log_reactor_exit(res: std::result::Result<anyhow::Result<()>, JoinError>) {
    match res {
        Ok(Ok(())) => tracing::debug!("reactor exited"),
        Ok(Err(e)) => tracing::error!(error = ?e, "reactor failed"),
        Err(e) => tracing::error!(error = %e, "reactor task panicked or was aborted"),
    }
}
