//! Graceful shutdown: stop intake, drain in-flight requests within a
//! deadline, wait for detached work, then report the outcome.

use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::{oneshot, watch};
use tracing::{error, info, warn};

use crate::background::BackgroundTasks;

/// Lifecycle of the serving process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownState {
    Running,
    Draining,
    Drained,
    Failed(String),
}

impl ShutdownState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ShutdownState::Drained | ShutdownState::Failed(_))
    }
}

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("in-flight requests did not drain within {0:?}")]
    DrainTimeout(Duration),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Runs the listener and owns the single shutdown sequence of the process.
#[derive(Debug)]
pub struct ShutdownCoordinator {
    drain_deadline: Duration,
    tasks: BackgroundTasks,
    state: watch::Sender<ShutdownState>,
}

impl ShutdownCoordinator {
    pub fn new(drain_deadline: Duration, tasks: BackgroundTasks) -> Self {
        let (state, _) = watch::channel(ShutdownState::Running);
        Self {
            drain_deadline,
            tasks,
            state,
        }
    }

    pub fn state(&self) -> ShutdownState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ShutdownState> {
        self.state.subscribe()
    }

    /// Serves `app` on `listener` until `shutdown` resolves, then drains.
    ///
    /// The returned future is the single join point for both ways the server
    /// can stop: the serve loop failing on its own, or the shutdown sequence
    /// triggered by `shutdown`. Background tasks are waited for without a
    /// deadline once the listener has stopped.
    ///
    /// On [`ServeError::DrainTimeout`] the serve future is dropped, but the
    /// per-connection tasks it spawned are not cancelled. They keep running
    /// until the process exits, and a handler among them may still call
    /// [`BackgroundTasks::launch`] after the wait has already seen zero.
    pub async fn serve<S>(&self, listener: TcpListener, app: Router, shutdown: S) -> Result<(), ServeError>
    where
        S: Future<Output = ()> + Send,
    {
        let addr = listener.local_addr()?;
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let server = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(async move {
                let _ = stop_rx.await;
            })
            .into_future();
        tokio::pin!(server);
        tokio::pin!(shutdown);

        info!(%addr, "Starting server");

        tokio::select! {
            result = &mut server => {
                // The serve loop only ends by itself on failure.
                let err = match result {
                    Ok(()) => ServeError::Io(std::io::Error::other("listener stopped unexpectedly")),
                    Err(err) => ServeError::Io(err),
                };
                error!(%addr, error = %err, "Server stopped without a shutdown signal");
                self.transition(ShutdownState::Failed(err.to_string()));
                return Err(err);
            }
            () = &mut shutdown => {}
        }

        self.transition(ShutdownState::Draining);
        let _ = stop_tx.send(());

        let drained = match tokio::time::timeout(self.drain_deadline, &mut server).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(ServeError::Io(err)),
            Err(_) => {
                warn!(
                    %addr,
                    deadline = ?self.drain_deadline,
                    "Drain deadline exceeded, abandoning open connections"
                );
                Err(ServeError::DrainTimeout(self.drain_deadline))
            }
        };

        info!(%addr, pending = self.tasks.pending(), "Completing background tasks");
        self.tasks.wait().await;

        match drained {
            Ok(()) => {
                self.transition(ShutdownState::Drained);
                info!(%addr, "Stopped server");
                Ok(())
            }
            Err(err) => {
                error!(%addr, error = %err, "Shutdown failed");
                self.transition(ShutdownState::Failed(err.to_string()));
                Err(err)
            }
        }
    }

    fn transition(&self, next: ShutdownState) {
        self.state.send_if_modified(|current| {
            if current.is_terminal() {
                return false;
            }
            *current = next;
            true
        });
    }
}

/// Resolves on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!(signal = "SIGINT", "Caught signal, initiating graceful shutdown");
        },
        _ = terminate => {
            info!(signal = "SIGTERM", "Caught signal, initiating graceful shutdown");
        },
    }
}
