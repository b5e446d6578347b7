//! The designated execution context that owns all rendering work.
//!
//! Rendering and printing are never driven from the request handlers
//! directly; they are posted here, onto one dedicated `render` thread.

use std::future::Future;
use std::sync::mpsc;
use std::thread::JoinHandle;
use tokio::runtime::{Builder, Handle};
use tokio::sync::oneshot;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct ExecutionContext {
    handle: Handle,
}

impl ExecutionContext {
    /// Context backed by the runtime the caller is already running on.
    ///
    /// Panics when called outside of a tokio runtime.
    #[cfg(test)]
    pub fn current() -> Self {
        Self {
            handle: Handle::current(),
        }
    }

    /// Schedule `task` on this context. Returns immediately.
    pub fn post<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handle.spawn(task);
    }
}

/// Owner of the dedicated render thread. Dropping it stops the thread.
pub struct RenderThread {
    context: ExecutionContext,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl RenderThread {
    pub const NAME: &'static str = "render";

    pub fn spawn() -> std::io::Result<Self> {
        let (handle_tx, handle_rx) = mpsc::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let thread = std::thread::Builder::new()
            .name(Self::NAME.to_string())
            .spawn(move || {
                let runtime = match Builder::new_current_thread().enable_all().build() {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        let _ = handle_tx.send(Err(e));
                        return;
                    }
                };
                let _ = handle_tx.send(Ok(runtime.handle().clone()));
                runtime.block_on(async {
                    let _ = shutdown_rx.await;
                });
                debug!("Render thread stopped");
            })?;

        let handle = handle_rx.recv().map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::Other,
                "render thread exited before its runtime started",
            )
        })??;

        info!("Render thread started");

        Ok(Self {
            context: ExecutionContext { handle },
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    pub fn context(&self) -> ExecutionContext {
        self.context.clone()
    }
}

impl Drop for RenderThread {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
