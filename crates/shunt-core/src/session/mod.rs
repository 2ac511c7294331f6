//! Session collaborator traits and connection state.
//!
//! The supervisor drives an abstract [`Session`]; the russh-backed
//! implementation lives in the client crate, and tests substitute their own.

mod wake;

pub use wake::{WakeReason, WakeSignal};

use std::sync::Arc;

use async_trait::async_trait;

use crate::forward::ForwardIntent;
use crate::Result;

/// Supervisor-visible connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No run in progress.
    Idle,
    /// Transport handshake or forward attachment in progress.
    Connecting,
    /// Session established, forwards attached, shell relaying.
    Active,
    /// Woken; tearing down this attempt's forwards and transport.
    Draining,
    /// Run finished; a fresh supervisor is needed to connect again.
    Terminated,
}

impl ConnectionState {
    /// True while a `connect` call is in flight.
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Active | ConnectionState::Draining
        )
    }
}

/// Sink for interactive output relayed from the remote side.
///
/// Injected into the session and supervisor instead of ambient logging
/// state, so tests can capture what the shell produced.
pub trait ShellSink: Send + Sync {
    /// A chunk of interactive shell output.
    fn output(&self, data: &str);

    /// Authentication banner presented by the server before login.
    fn banner(&self, message: &str);
}

/// Default sink: shell output goes to the log, banners to stdout.
pub struct LogSink;

impl ShellSink for LogSink {
    fn output(&self, data: &str) {
        for line in data.lines() {
            tracing::info!("{line}");
        }
    }

    fn banner(&self, message: &str) {
        println!("{message}");
    }
}

/// A live forward started from one [`ForwardIntent`].
///
/// Dropped or stopped at the end of every attempt; the originating intent
/// stays behind so the next attempt can rebuild it.
#[async_trait]
pub trait ActiveForward: Send {
    /// Stop relaying. Stopping an already-stopped forward is a no-op.
    async fn stop(&mut self);
}

/// The secure-transport session the supervisor drives.
///
/// Implementations raise the wake signal when the remote side fails or the
/// underlying channel closes; the supervisor never observes those as errors,
/// only as wake reasons.
#[async_trait]
pub trait Session: Send {
    /// Establish the transport and authenticate.
    ///
    /// The sink receives banners and interactive output; the signal is the
    /// session's only way to wake the supervisor.
    async fn open(&mut self, sink: Arc<dyn ShellSink>, signal: Arc<WakeSignal>) -> Result<()>;

    /// Build and start a live forward for one intent.
    async fn start_forward(&mut self, intent: &ForwardIntent) -> Result<Box<dyn ActiveForward>>;

    /// Open the interactive shell and begin relaying its output to the sink.
    async fn start_shell(&mut self) -> Result<()>;

    /// Whether the transport currently reports itself connected.
    async fn is_connected(&self) -> bool;

    /// Tear the transport down. Callers draining an attempt discard the
    /// error: shutdown failures must not mask the reconnect decision.
    async fn close(&mut self) -> Result<()>;
}
