//! Handoff of lifecycle and shutdown requests into the engine task.
//!
//! The module registry and hook table are only mutated by the engine task.
//! Everything else (the HTTP control endpoint, module code, signal
//! handlers) holds a [`ControlHandle`] and sends requests over a channel.

use crate::error::{ModuleError, Outcome};
use crate::network::ConnectionState;
use std::fmt;
use std::str::FromStr;
use tokio::sync::{mpsc, oneshot, watch};

/// Lifecycle operations exposed to control callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleOp {
    Import,
    Deport,
    Load,
    Unload,
    Reload,
    Redo,
}

impl LifecycleOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleOp::Import => "import",
            LifecycleOp::Deport => "deport",
            LifecycleOp::Load => "load",
            LifecycleOp::Unload => "unload",
            LifecycleOp::Reload => "reload",
            LifecycleOp::Redo => "redo",
        }
    }
}

impl fmt::Display for LifecycleOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecycleOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "import" => Ok(LifecycleOp::Import),
            "deport" => Ok(LifecycleOp::Deport),
            "load" => Ok(LifecycleOp::Load),
            "unload" => Ok(LifecycleOp::Unload),
            "reload" => Ok(LifecycleOp::Reload),
            "redo" => Ok(LifecycleOp::Redo),
            other => Err(format!("unknown operation '{}'", other)),
        }
    }
}

/// A request waiting to be applied by the engine task.
#[derive(Debug)]
pub enum ControlRequest {
    Lifecycle {
        op: LifecycleOp,
        name: String,
        reply: oneshot::Sender<Outcome>,
    },
    Kill {
        message: String,
        forever: bool,
    },
}

pub type ControlReceiver = mpsc::UnboundedReceiver<ControlRequest>;

/// Cloneable sender side of the control channel.
#[derive(Clone, Debug)]
pub struct ControlHandle {
    tx: mpsc::UnboundedSender<ControlRequest>,
    state: watch::Receiver<ConnectionState>,
}

impl ControlHandle {
    pub fn channel(state: watch::Receiver<ConnectionState>) -> (Self, ControlReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, state }, rx)
    }

    /// A handle whose state never leaves `Disconnected`.
    pub fn detached() -> (Self, ControlReceiver) {
        let (_, state) = watch::channel(ConnectionState::Disconnected);
        Self::channel(state)
    }

    /// Ask the engine to apply `op` to `name` and wait for the result.
    pub async fn request(&self, op: LifecycleOp, name: &str) -> Outcome {
        let (reply, rx) = oneshot::channel();
        let request = ControlRequest::Lifecycle {
            op,
            name: name.to_string(),
            reply,
        };
        if self.tx.send(request).is_err() {
            return Outcome::from(Err(ModuleError::EngineStopped));
        }
        rx.await
            .unwrap_or_else(|_| Outcome::from(Err(ModuleError::EngineStopped)))
    }

    pub async fn import(&self, name: &str) -> Outcome {
        self.request(LifecycleOp::Import, name).await
    }

    pub async fn deport(&self, name: &str) -> Outcome {
        self.request(LifecycleOp::Deport, name).await
    }

    pub async fn load(&self, name: &str) -> Outcome {
        self.request(LifecycleOp::Load, name).await
    }

    pub async fn unload(&self, name: &str) -> Outcome {
        self.request(LifecycleOp::Unload, name).await
    }

    pub async fn reload(&self, name: &str) -> Outcome {
        self.request(LifecycleOp::Reload, name).await
    }

    pub async fn redo(&self, name: &str) -> Outcome {
        self.request(LifecycleOp::Redo, name).await
    }

    /// Quit the current session; with `forever` the engine stops too.
    ///
    /// Returns `false` if the engine is already gone.
    pub fn kill(&self, message: &str, forever: bool) -> bool {
        self.tx
            .send(ControlRequest::Kill {
                message: message.to_string(),
                forever,
            })
            .is_ok()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Resolve once the transport reaches `target`.
    pub async fn wait_for_state(&self, target: ConnectionState) -> bool {
        let mut state = self.state.clone();
        state.wait_for(|s| *s == target).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_op_names_round_trip() {
        for op in [
            LifecycleOp::Import,
            LifecycleOp::Deport,
            LifecycleOp::Load,
            LifecycleOp::Unload,
            LifecycleOp::Reload,
            LifecycleOp::Redo,
        ] {
            assert_eq!(op.as_str().parse::<LifecycleOp>(), Ok(op));
        }
        assert_eq!("RELOAD".parse::<LifecycleOp>(), Ok(LifecycleOp::Reload));
        assert!("explode".parse::<LifecycleOp>().is_err());
    }

    #[tokio::test]
    async fn test_request_reaches_receiver() {
        let (handle, mut rx) = ControlHandle::detached();
        let engine = tokio::spawn(async move {
            match rx.recv().await {
                Some(ControlRequest::Lifecycle { op, name, reply }) => {
                    assert_eq!(op, LifecycleOp::Load);
                    assert_eq!(name, "uptime");
                    reply.send(Outcome::ok()).unwrap();
                }
                other => panic!("unexpected request: {:?}", other),
            }
        });

        assert_eq!(handle.load("uptime").await, Outcome::ok());
        engine.await.unwrap();
    }

    #[tokio::test]
    async fn test_stopped_engine_reports_failure() {
        let (handle, rx) = ControlHandle::detached();
        drop(rx);

        let outcome = handle.reload("uptime").await;
        assert!(!outcome.success);
        assert_eq!(outcome.reason.as_deref(), Some("engine is not running"));
        assert!(!handle.kill("bye", true));
    }

    #[tokio::test]
    async fn test_dropped_reply_reports_failure() {
        let (handle, mut rx) = ControlHandle::detached();
        let engine = tokio::spawn(async move {
            // Receive and drop without replying.
            let _ = rx.recv().await;
        });

        assert!(!handle.unload("uptime").await.success);
        engine.await.unwrap();
    }
}
