//! The reactor: single consumer of stream events.
//!
//! Posts are classified in arrival order. Matching posts get a favorite call
//! spawned onto the reactor's own `JoinSet`, so a slow favorite never holds up
//! the next event and a clean stop still waits for outstanding calls.
use crate::actor::{Actor, Context};
use anyhow::Result;
use async_trait::async_trait;
use emojilove_common::EmojiLoveError;
use emojilove_social::emoji::contains_emoji;
use emojilove_social::twitter::{Post, StreamEvent, TwitterApi};
use std::sync::Arc;
use tokio::task::JoinSet;

/// Something that can favorite a post by id.
#[async_trait]
pub trait Liker: Send + Sync + 'static {
    async fn favorite(&self, id: u64) -> emojilove_common::Result<()>;
}

#[async_trait]
impl Liker for TwitterApi {
    async fn favorite(&self, id: u64) -> emojilove_common::Result<()> {
        TwitterApi::favorite(self, id).await
    }
}

/// Receives one notification per reactor outcome.
pub trait StatusReporter: Send + Sync + 'static {
    fn loved(&self, post: &Post);
    fn no_emoji(&self, post: &Post);
    fn event_error(&self, message: &str);
    fn unsupported(&self, kind: &str);
    fn favorite_failed(&self, err: &EmojiLoveError);
}

/// Status lines on stdout, errors on stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

impl StatusReporter for ConsoleReporter {
    fn loved(&self, post: &Post) {
        tracing::info!(id = post.id, author = ?post.author, "reactor.loved");
        println!("😃  Tweet {} contained emoji - love it!", post.id);
    }

    fn no_emoji(&self, post: &Post) {
        tracing::info!(id = post.id, author = ?post.author, "reactor.no_emoji");
        println!("😞  Tweet {} did not contain any emoji.", post.id);
    }

    fn event_error(&self, message: &str) {
        tracing::warn!(error = %message, "reactor.event_error");
        eprintln!("Received an error: {message}");
    }

    fn unsupported(&self, kind: &str) {
        tracing::warn!(kind, "reactor.unsupported");
        println!("Unsupported message type: {kind}");
    }

    fn favorite_failed(&self, err: &EmojiLoveError) {
        tracing::warn!(error = %err, "reactor.favorite_failed");
        eprintln!("{err}");
    }
}

pub struct ReactorActor {
    liker: Arc<dyn Liker>,
    reporter: Arc<dyn StatusReporter>,
    inflight: JoinSet<()>,
}

impl ReactorActor {
    pub fn new(liker: Arc<dyn Liker>, reporter: Arc<dyn StatusReporter>) -> Self {
        Self {
            liker,
            reporter,
            inflight: JoinSet::new(),
        }
    }

    fn spawn_favorite(&mut self, id: u64) {
        while self.inflight.try_join_next().is_some() {}

        let liker = Arc::clone(&self.liker);
        let reporter = Arc::clone(&self.reporter);
        self.inflight.spawn(async move {
            if let Err(err) = liker.favorite(id).await {
                reporter.favorite_failed(&err);
            }
        });
    }
}

#[async_trait]
impl Actor for ReactorActor {
    type Msg = StreamEvent;

    async fn handle(&mut self, msg: StreamEvent, _ctx: &mut Context) -> Result<()> {
        match msg {
            StreamEvent::Post(post) => {
                if contains_emoji(&post.text) {
                    self.spawn_favorite(post.id);
                    self.reporter.loved(&post);
                } else {
                    self.reporter.no_emoji(&post);
                }
            }
            StreamEvent::Error(message) => self.reporter.event_error(&message),
            StreamEvent::Unrecognized(kind) => self.reporter.unsupported(&kind),
        }
        Ok(())
    }

    async fn stopped(&mut self) {
        if !self.inflight.is_empty() {
            tracing::info!(pending = self.inflight.len(), "reactor.draining_favorites");
        }
        while let Some(res) = self.inflight.join_next().await {
            if let Err(e) = res {
                tracing::warn!(error = %e, "favorite task did not complete");
            }
        }
        tracing::info!("reactor.stopped");
    }
}
