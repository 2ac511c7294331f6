//! The connection supervisor.
//!
//! Owns one end-to-end session lifecycle: connect, attach forwards, relay
//! until woken, tear down, then reconnect or terminate. Remote faults and
//! channel closures are wake reasons, not errors; the reconnect loop runs
//! with no backoff and no attempt cap. Only lifecycle failures (transport
//! establishment, authentication, forward attachment) escalate to the
//! caller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use shunt_core::{
    ActiveForward, ConnectionState, Error, ForwardSet, Result, Session, ShellSink, WakeReason,
    WakeSignal,
};

/// Supervises a single session, reconnecting across remote faults until
/// cancelled.
pub struct Supervisor<S: Session> {
    session: Mutex<S>,
    forwards: ForwardSet,
    sink: Arc<dyn ShellSink>,
    signal: Arc<WakeSignal>,
    running: AtomicBool,
    state: RwLock<ConnectionState>,
}

impl<S: Session> Supervisor<S> {
    /// Build a supervisor over a session and an already-validated forward
    /// set. The set is immutable from here on; every attempt rebuilds its
    /// live forwards from the same intents.
    pub fn new(session: S, forwards: ForwardSet, sink: Arc<dyn ShellSink>) -> Self {
        Self {
            session: Mutex::new(session),
            forwards,
            sink,
            signal: Arc::new(WakeSignal::new()),
            running: AtomicBool::new(false),
            state: RwLock::new(ConnectionState::Idle),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// Run the session until cancellation or a lifecycle failure.
    ///
    /// At most one run per instance may be in flight; a second call while
    /// the first is still running fails fast with `AlreadyConnected` and
    /// leaves the in-flight run untouched. Returns only after the session
    /// has fully disconnected and no reconnect is pending.
    pub async fn connect(&self, cancel: CancellationToken) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyConnected);
        }

        let result = self.run(cancel).await;

        self.set_state(ConnectionState::Terminated);
        self.running.store(false, Ordering::SeqCst);
        result
    }

    async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let mut session = self.session.lock().await;

        info!("Connecting...");

        loop {
            // Re-arm for this attempt; a stale raise from a torn-down
            // attempt must not end the new one.
            self.signal.clear();
            self.set_state(ConnectionState::Connecting);

            session
                .open(Arc::clone(&self.sink), Arc::clone(&self.signal))
                .await?;

            let mut active = match self.attach_forwards(&mut *session).await {
                Ok(active) => active,
                Err(e) => {
                    // All-or-nothing attach: never run with a partial set.
                    Self::force_disconnect(&mut *session).await;
                    return Err(e);
                }
            };

            if let Err(e) = session.start_shell().await {
                Self::stop_forwards(&mut active).await;
                Self::force_disconnect(&mut *session).await;
                return Err(e);
            }

            self.set_state(ConnectionState::Active);

            // The one designed suspension point. The signal is leveled, so
            // a wake raised while we were still attaching is not lost, and
            // both wake paths converge here.
            let reason = tokio::select! {
                reason = self.signal.wait() => reason,
                _ = cancel.cancelled() => WakeReason::Cancelled,
            };

            self.set_state(ConnectionState::Draining);
            debug!(?reason, "Attempt ended");

            Self::stop_forwards(&mut active).await;
            Self::force_disconnect(&mut *session).await;

            if cancel.is_cancelled() || !reason.wants_reconnect() {
                break;
            }

            info!("Reconnecting...");
        }

        info!("Disconnected.");
        Ok(())
    }

    /// Materialize a live forward per intent, in set order.
    async fn attach_forwards(&self, session: &mut S) -> Result<Vec<Box<dyn ActiveForward>>> {
        let mut active = Vec::with_capacity(self.forwards.len());

        for intent in &self.forwards {
            debug!(forward = %intent, "Attaching forward");
            match session.start_forward(intent).await {
                Ok(forward) => active.push(forward),
                Err(e) => {
                    error!(forward = %intent, error = %e, "Unable to attach forward");
                    Self::stop_forwards(&mut active).await;
                    return Err(e);
                }
            }
        }

        Ok(active)
    }

    /// Stop every forward started this attempt. Exhaustive and idempotent.
    async fn stop_forwards(active: &mut Vec<Box<dyn ActiveForward>>) {
        for forward in active.iter_mut() {
            forward.stop().await;
        }
        active.clear();
    }

    /// Force a disconnect if the session still claims to be connected,
    /// discarding any error: shutdown failures must never mask the
    /// reconnect/terminate decision.
    async fn force_disconnect(session: &mut S) {
        if session.is_connected().await {
            if let Err(e) = session.close().await {
                debug!(error = %e, "Ignoring error from forced disconnect");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use shunt_core::ForwardIntent;

    struct NullSink;

    impl ShellSink for NullSink {
        fn output(&self, _data: &str) {}
        fn banner(&self, _message: &str) {}
    }

    #[derive(Default)]
    struct Counters {
        opens: AtomicUsize,
        shells: AtomicUsize,
        forwards_started: AtomicUsize,
        forwards_stopped: AtomicUsize,
        closes: AtomicUsize,
    }

    /// Test double: counts lifecycle calls and exposes the wake signal
    /// handed to `open`, so tests can play the remote side.
    #[derive(Clone, Default)]
    struct FakeHooks {
        counters: Arc<Counters>,
        signal: Arc<StdMutex<Option<Arc<WakeSignal>>>>,
        /// Zero-based index of the `start_forward` call that should fail.
        fail_forward_at: Option<usize>,
    }

    impl FakeHooks {
        fn raise(&self, reason: WakeReason) {
            let signal = self.signal.lock().unwrap();
            signal.as_ref().expect("session not opened yet").raise(reason);
        }
    }

    struct FakeSession {
        hooks: FakeHooks,
        connected: bool,
    }

    impl FakeSession {
        fn new(hooks: FakeHooks) -> Self {
            Self {
                hooks,
                connected: false,
            }
        }
    }

    struct FakeForward {
        counters: Arc<Counters>,
        stopped: bool,
    }

    #[async_trait]
    impl ActiveForward for FakeForward {
        async fn stop(&mut self) {
            if self.stopped {
                return;
            }
            self.stopped = true;
            self.counters.forwards_stopped.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Session for FakeSession {
        async fn open(
            &mut self,
            _sink: Arc<dyn ShellSink>,
            signal: Arc<WakeSignal>,
        ) -> Result<()> {
            self.hooks.counters.opens.fetch_add(1, Ordering::SeqCst);
            *self.hooks.signal.lock().unwrap() = Some(signal);
            self.connected = true;
            Ok(())
        }

        async fn start_forward(&mut self, _intent: &ForwardIntent) -> Result<Box<dyn ActiveForward>> {
            let index = self.hooks.counters.forwards_started.load(Ordering::SeqCst);
            if self.hooks.fail_forward_at == Some(index) {
                return Err(Error::Forward {
                    message: "bind refused".into(),
                });
            }
            self.hooks.counters.forwards_started.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeForward {
                counters: Arc::clone(&self.hooks.counters),
                stopped: false,
            }))
        }

        async fn start_shell(&mut self) -> Result<()> {
            self.hooks.counters.shells.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn is_connected(&self) -> bool {
            self.connected
        }

        async fn close(&mut self) -> Result<()> {
            self.connected = false;
            self.hooks.counters.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn two_forwards() -> ForwardSet {
        ForwardSet::parse(&["8080:web:80".to_string()], &["5432:db:5432".to_string()]).unwrap()
    }

    fn supervisor_with(hooks: FakeHooks, forwards: ForwardSet) -> Arc<Supervisor<FakeSession>> {
        Arc::new(Supervisor::new(
            FakeSession::new(hooks),
            forwards,
            Arc::new(NullSink),
        ))
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn second_connect_while_active_fails_fast() {
        let hooks = FakeHooks::default();
        let supervisor = supervisor_with(hooks.clone(), two_forwards());
        let cancel = CancellationToken::new();

        let run = {
            let supervisor = Arc::clone(&supervisor);
            let cancel = cancel.clone();
            tokio::spawn(async move { supervisor.connect(cancel).await })
        };

        {
            let supervisor = Arc::clone(&supervisor);
            wait_until(move || supervisor.state() == ConnectionState::Active).await;
        }

        let err = supervisor.connect(CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyConnected));

        // The in-flight run is untouched and still cancellable.
        cancel.cancel();
        run.await.unwrap().unwrap();
        assert_eq!(hooks.counters.opens.load(Ordering::SeqCst), 1);
        assert_eq!(supervisor.state(), ConnectionState::Terminated);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn remote_error_reattaches_forwards_within_the_same_run() {
        let hooks = FakeHooks::default();
        let supervisor = supervisor_with(hooks.clone(), two_forwards());
        let cancel = CancellationToken::new();

        let run = {
            let supervisor = Arc::clone(&supervisor);
            let cancel = cancel.clone();
            tokio::spawn(async move { supervisor.connect(cancel).await })
        };

        {
            let supervisor = Arc::clone(&supervisor);
            wait_until(move || supervisor.state() == ConnectionState::Active).await;
        }

        hooks.raise(WakeReason::RemoteError);

        // A second attempt comes up inside the same connect call.
        {
            let hooks = hooks.clone();
            let supervisor = Arc::clone(&supervisor);
            wait_until(move || {
                hooks.counters.opens.load(Ordering::SeqCst) == 2
                    && supervisor.state() == ConnectionState::Active
            })
            .await;
        }

        cancel.cancel();
        run.await.unwrap().unwrap();

        let counters = &hooks.counters;
        assert_eq!(counters.opens.load(Ordering::SeqCst), 2);
        assert_eq!(counters.shells.load(Ordering::SeqCst), 2);
        // Two intents rebuilt per attempt, every started forward stopped.
        assert_eq!(counters.forwards_started.load(Ordering::SeqCst), 4);
        assert_eq!(counters.forwards_stopped.load(Ordering::SeqCst), 4);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn channel_close_also_triggers_reconnect() {
        let hooks = FakeHooks::default();
        let supervisor = supervisor_with(hooks.clone(), ForwardSet::default());
        let cancel = CancellationToken::new();

        let run = {
            let supervisor = Arc::clone(&supervisor);
            let cancel = cancel.clone();
            tokio::spawn(async move { supervisor.connect(cancel).await })
        };

        {
            let supervisor = Arc::clone(&supervisor);
            wait_until(move || supervisor.state() == ConnectionState::Active).await;
        }
        hooks.raise(WakeReason::ChannelClosed);
        {
            let hooks = hooks.clone();
            wait_until(move || hooks.counters.opens.load(Ordering::SeqCst) == 2).await;
        }

        cancel.cancel();
        run.await.unwrap().unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cancellation_returns_without_further_attempts() {
        let hooks = FakeHooks::default();
        let supervisor = supervisor_with(hooks.clone(), two_forwards());
        let cancel = CancellationToken::new();

        let run = {
            let supervisor = Arc::clone(&supervisor);
            let cancel = cancel.clone();
            tokio::spawn(async move { supervisor.connect(cancel).await })
        };

        {
            let supervisor = Arc::clone(&supervisor);
            wait_until(move || supervisor.state() == ConnectionState::Active).await;
        }

        cancel.cancel();
        // Cancelling twice is safe and changes nothing.
        cancel.cancel();
        run.await.unwrap().unwrap();

        let counters = &hooks.counters;
        assert_eq!(counters.opens.load(Ordering::SeqCst), 1);
        assert_eq!(counters.forwards_started.load(Ordering::SeqCst), 2);
        assert_eq!(counters.forwards_stopped.load(Ordering::SeqCst), 2);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
        assert_eq!(supervisor.state(), ConnectionState::Terminated);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cancellation_raised_before_the_wait_is_not_lost() {
        let hooks = FakeHooks::default();
        let supervisor = supervisor_with(hooks.clone(), ForwardSet::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        // Already-cancelled token: one attempt comes up and drains right away.
        supervisor.connect(cancel).await.unwrap();
        assert_eq!(hooks.counters.opens.load(Ordering::SeqCst), 1);
        assert_eq!(supervisor.state(), ConnectionState::Terminated);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn attach_failure_is_fatal_and_stops_started_forwards() {
        let hooks = FakeHooks {
            fail_forward_at: Some(1),
            ..FakeHooks::default()
        };
        let supervisor = supervisor_with(hooks.clone(), two_forwards());

        let err = supervisor.connect(CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, Error::Forward { .. }));

        let counters = &hooks.counters;
        // The first forward came up and was torn down again; nothing ran
        // with a partial set.
        assert_eq!(counters.forwards_started.load(Ordering::SeqCst), 1);
        assert_eq!(counters.forwards_stopped.load(Ordering::SeqCst), 1);
        assert_eq!(counters.shells.load(Ordering::SeqCst), 0);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
        assert_eq!(supervisor.state(), ConnectionState::Terminated);
    }

    #[tokio::test]
    async fn starts_idle() {
        let supervisor = supervisor_with(FakeHooks::default(), ForwardSet::default());
        assert_eq!(supervisor.state(), ConnectionState::Idle);
    }
}
