use anyhow::Result;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;

/// Minimal actor trait. `Self: Sized` keeps `spawn_actor` free of boxing.
#[async_trait::async_trait]
pub trait Actor: Send + Sized + 'static {
    type Msg: Send + 'static;

    /// Handle a single message. Return `Err` to stop the actor.
    async fn handle(&mut self, msg: Self::Msg, ctx: &mut Context) -> Result<()>;

    /// Called once after the mailbox closes or `ctx.stop()` is requested.
    /// Not called when the actor is cancelled.
    async fn stopped(&mut self) {}
}

/// Runtime context for an actor instance.
#[derive(Debug, Default)]
pub struct Context {
    pub stop: bool,
}

impl Context {
    /// Request a graceful stop after processing the current message.
    ///
    /// ```
    /// # use anyhow::Result;
    /// # use async_trait::async_trait;
    /// # use emojilove_actors::actor::{self, Actor, Context};
    /// # struct StopOnSecond(u8);
    /// # #[async_trait]
    /// # impl Actor for StopOnSecond {
    /// #     type Msg = u8;
    /// #     async fn handle(&mut self, msg: Self::Msg, ctx: &mut Context) -> Result<()> {
    /// #         self.0 += msg;
    /// #         if self.0 >= 2 {
    /// #             ctx.stop();
    /// #         }
    /// #         Ok(())
    /// #     }
    /// # }
    /// let rt = tokio::runtime::Runtime::new().unwrap();
    /// rt.block_on(async {
    ///     let (tx, rx) = tokio::sync::mpsc::channel(4);
    ///     let handle = actor::spawn_actor(StopOnSecond(0), rx, None);
    ///     tx.send(1).await.unwrap();
    ///     tx.send(1).await.unwrap();
    ///     handle.task.await.unwrap().unwrap();
    /// });
    /// ```
    pub fn stop(&mut self) {
        self.stop = true;
    }
}

/// Handle to a running actor task.
pub struct ActorHandle {
    pub task: JoinHandle<Result<()>>,
}

/// Spawn an actor draining an existing mailbox.
///
/// Stop conditions:
/// - `handle` returns `Err`
/// - all senders are dropped
/// - `ctx.stop()` is called
/// - `shutdown` is cancelled, which skips [`Actor::stopped`] and drops the
///   actor together with anything still queued
///
/// ```
/// # use anyhow::Result;
/// # use async_trait::async_trait;
/// # use emojilove_actors::actor::{self, Actor, Context};
/// # struct Accumulator(u8);
/// # #[async_trait]
/// # impl Actor for Accumulator {
/// #     type Msg = u8;
/// #     async fn handle(&mut self, msg: Self::Msg, _ctx: &mut Context) -> Result<()> {
/// #         self.0 += msg;
/// #         Ok(())
/// #     }
/// # }
/// let rt = tokio::runtime::Runtime::new().unwrap();
/// rt.block_on(async {
///     let (tx, rx) = tokio::sync::mpsc::channel(8);
///     let handle = actor::spawn_actor(Accumulator(0), rx, None);
///     tx.send(2).await.unwrap();
///     tx.send(3).await.unwrap();
///     drop(tx);
///     handle.task.await.unwrap().unwrap();
/// });
/// ```
pub fn spawn_actor<A: Actor>(
    mut actor: A,
    mut rx: mpsc::Receiver<A::Msg>,
    shutdown: Option<CancellationToken>,
) -> ActorHandle {
    let shutdown = shutdown.unwrap_or_default();

    let task = tokio::spawn(async move {
        let mut ctx = Context::default();

        loop {
            let maybe_msg = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::warn!(target: "emojilove-actors", "actor cancelled");
                    return Ok(());
                }
                maybe_msg = rx.recv() => maybe_msg,
            };
            let Some(msg) = maybe_msg else { break };
            if let Err(e) = actor.handle(msg, &mut ctx).await {
                tracing::error!(target: "emojilove-actors", error = ?e, "actor returned error; stopping");
                return Err(e);
            }
            if ctx.stop {
                break;
            }
        }

        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                tracing::warn!(target: "emojilove-actors", "actor cancelled while stopping");
            }
            _ = actor.stopped() => {}
        }
        Ok(())
    });

    ActorHandle { task }
}
