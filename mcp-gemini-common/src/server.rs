//! Server lifecycle utilities.
//!
//! Both transports share one [`Lifecycle`] state machine:
//!
//! ```text
//! Running --shutdown--> ShuttingDown --exit--> Exited
//!    \__________________exit_____________________/
//! ```
//!
//! A [`LifecycleHandle`] is cheap to clone and can be awaited by a transport
//! loop to stop accepting work once `exit` has been received.

use thiserror::Error;
#[cfg(unix)]
use tokio::signal::unix::{Signal, SignalKind, signal};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Errors that can occur when running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to the specified address
    #[error("Failed to bind to {addr}: {message}")]
    BindFailed { addr: String, message: String },

    /// Transport error during communication
    #[error("Transport error: {0}")]
    Transport(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Server lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    /// Accepting and executing commands.
    #[default]
    Running,
    /// `shutdown` received; only `exit` is still honoured.
    ShuttingDown,
    /// `exit` received; transports stop reading new input.
    Exited,
}

/// Shared handle to the server lifecycle.
#[derive(Debug, Clone)]
pub struct LifecycleHandle {
    tx: watch::Sender<Lifecycle>,
}

impl Default for LifecycleHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleHandle {
    /// Create a handle in the `Running` state.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Lifecycle::Running);
        Self { tx }
    }

    /// Current state.
    pub fn state(&self) -> Lifecycle {
        *self.tx.borrow()
    }

    /// Whether commands other than `exit` should still be executed.
    pub fn is_running(&self) -> bool {
        self.state() == Lifecycle::Running
    }

    /// Whether `exit` has been received.
    pub fn is_exited(&self) -> bool {
        self.state() == Lifecycle::Exited
    }

    /// Mark the server as shutting down. Has no effect once exited.
    pub fn request_shutdown(&self) {
        self.tx.send_if_modified(|state| {
            if *state == Lifecycle::Running {
                *state = Lifecycle::ShuttingDown;
                true
            } else {
                false
            }
        });
    }

    /// Mark the server as exited.
    pub fn request_exit(&self) {
        self.tx.send_if_modified(|state| {
            if *state == Lifecycle::Exited {
                false
            } else {
                *state = Lifecycle::Exited;
                true
            }
        });
    }

    /// Resolve once the lifecycle reaches `Exited`.
    pub async fn exited(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so `wait_for` can only fail if it is dropped.
        let _ = rx.wait_for(|state| *state == Lifecycle::Exited).await;
    }

    /// Resolve on `exit` or on an OS shutdown signal, whichever comes first.
    pub async fn stopped(&self) {
        let signal = ShutdownSignal::listen();
        tokio::select! {
            _ = self.exited() => {
                tracing::info!("Exit requested by client");
            }
            _ = signal.recv() => {
                self.request_exit();
            }
        }
    }

    /// Register for shutdown signals now and move to `Exited` when one arrives.
    ///
    /// Handlers are installed before this returns, so a signal delivered
    /// while the caller is busy is not lost. Abort the returned task to stop
    /// listening.
    pub fn exit_on_signal(&self) -> JoinHandle<()> {
        let signal = ShutdownSignal::listen();
        let lifecycle = self.clone();
        tokio::spawn(async move {
            signal.recv().await;
            lifecycle.request_exit();
        })
    }
}

/// SIGTERM and SIGINT listeners, registered on construction.
///
/// Falls back to Ctrl+C where unix signals are unavailable.
#[derive(Debug)]
pub struct ShutdownSignal {
    #[cfg(unix)]
    unix: Option<(Signal, Signal)>,
}

impl ShutdownSignal {
    /// Install the signal handlers. Must be called inside a tokio runtime.
    pub fn listen() -> Self {
        #[cfg(unix)]
        let unix = match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(sigterm), Ok(sigint)) => Some((sigterm, sigint)),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(error = %e, "Failed to register unix signal handlers, falling back to Ctrl+C");
                None
            }
        };

        Self {
            #[cfg(unix)]
            unix,
        }
    }

    /// Wait for the first signal.
    pub async fn recv(self) {
        #[cfg(unix)]
        if let Some((mut sigterm, mut sigint)) = self.unix {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT");
                }
            }
            return;
        }

        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Received Ctrl+C"),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
pub async fn wait_for_shutdown_signal() {
    ShutdownSignal::listen().recv().await;
}
