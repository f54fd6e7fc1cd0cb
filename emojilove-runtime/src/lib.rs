//! Tokio runtime ownership plus process signal handling.
use anyhow::Result;
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct EmojiLoveHandle {
    inner: Handle,
    cancel: CancellationToken,
}

pub struct EmojiLoveRuntime {
    runtime: Runtime,
    cancel: CancellationToken,
}

impl EmojiLoveRuntime {
    /// Build a multi-threaded Tokio runtime with all drivers enabled.
    ///
    /// ```
    /// use emojilove_runtime::EmojiLoveRuntime;
    /// use std::time::Duration;
    ///
    /// let runtime = EmojiLoveRuntime::build("doctest-runtime", Some(1))
    ///     .expect("runtime builds");
    /// let value = runtime.block_on(async { 2 + 2 });
    /// assert_eq!(value, 4);
    /// runtime.shutdown(Duration::from_millis(10));
    /// ```
    pub fn build(thread_name: &str, worker_threads: Option<usize>) -> Result<Self> {
        let mut builder = Builder::new_multi_thread();
        builder.enable_all().thread_name(thread_name);

        if let Some(workers) = worker_threads {
            builder.worker_threads(workers.max(1));
        }

        let runtime = builder.build()?;
        Ok(Self {
            runtime,
            cancel: CancellationToken::new(),
        })
    }

    pub fn handle(&self) -> EmojiLoveHandle {
        EmojiLoveHandle {
            inner: self.runtime.handle().clone(),
            cancel: self.cancel.clone(),
        }
    }

    pub fn block_on<F: std::future::Future>(&self, fut: F) -> F::Output {
        self.runtime.block_on(fut)
    }

    /// Cancel every token derived from this runtime, then give remaining
    /// tasks `graceful` to finish before the runtime is torn down.
    pub fn shutdown(self, graceful: Duration) {
        self.cancel.cancel();
        self.runtime.shutdown_timeout(graceful);
    }
}

impl EmojiLoveHandle {
    /// Spawn a future onto the shared runtime.
    ///
    /// ```
    /// use emojilove_runtime::EmojiLoveRuntime;
    /// use std::time::Duration;
    ///
    /// let runtime = EmojiLoveRuntime::build("handle-doctest", Some(1)).unwrap();
    /// let handle = runtime.handle();
    /// let task = handle.spawn(async { 21 * 2 });
    /// let result = runtime.block_on(async move { task.await.unwrap() });
    /// assert_eq!(result, 42);
    /// runtime.shutdown(Duration::from_millis(10));
    /// ```
    pub fn spawn<F, T>(&self, fut: F) -> JoinHandle<T>
    where
        F: std::future::Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.inner.spawn(fut)
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// A token cancelled together with the runtime but cancellable on its own.
    ///
    /// ```
    /// use emojilove_runtime::EmojiLoveRuntime;
    /// use std::time::Duration;
    ///
    /// let runtime = EmojiLoveRuntime::build("child-example", Some(1)).unwrap();
    /// let handle = runtime.handle();
    /// let child = handle.child_token();
    /// child.cancel();
    /// assert!(!handle.cancellation().is_cancelled());
    /// handle.cancellation().cancel();
    /// assert!(handle.child_token().is_cancelled());
    /// runtime.shutdown(Duration::from_millis(5));
    /// ```
    pub fn child_token(&self) -> CancellationToken {
        self.cancel.child_token()
    }
}

/// Resolve once the process receives SIGINT, or SIGTERM on unix.
/// Returns the name of the signal that arrived.
pub async fn wait_for_shutdown_signal() -> Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut term = signal(SignalKind::terminate())?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res?;
                Ok("SIGINT")
            }
            _ = term.recv() => Ok("SIGTERM"),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        Ok("SIGINT")
    }
}
