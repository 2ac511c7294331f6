//! The coalescing wake signal.
//!
//! One signal per supervised run coordinates every suspension: the remote
//! error path, the channel-closed path, and the cancellation path all
//! converge on the same primitive instead of mutating supervisor state from
//! callbacks. The reason is an atomically-set enum, not a plain flag, so
//! concurrent raisers cannot lose each other's update.

use std::sync::atomic::{AtomicU8, Ordering};

use tokio::sync::Notify;

const REASON_NONE: u8 = 0;
const REASON_REMOTE_ERROR: u8 = 1;
const REASON_CHANNEL_CLOSED: u8 = 2;
const REASON_CANCELLED: u8 = 3;

/// Why a suspension ended.
///
/// Ordered by strength: when raisers race, the strongest reason wins, and
/// `Cancelled` dominates everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    /// The remote side reported an error; reconnect is desired.
    RemoteError,
    /// The underlying channel closed; reconnect is desired.
    ChannelClosed,
    /// Cancellation was requested; the run must terminate.
    Cancelled,
}

impl WakeReason {
    fn as_u8(self) -> u8 {
        match self {
            WakeReason::RemoteError => REASON_REMOTE_ERROR,
            WakeReason::ChannelClosed => REASON_CHANNEL_CLOSED,
            WakeReason::Cancelled => REASON_CANCELLED,
        }
    }

    fn from_u8(value: u8) -> Option<Self> {
        match value {
            REASON_REMOTE_ERROR => Some(WakeReason::RemoteError),
            REASON_CHANNEL_CLOSED => Some(WakeReason::ChannelClosed),
            REASON_CANCELLED => Some(WakeReason::Cancelled),
            _ => None,
        }
    }

    /// Whether this reason asks for another attempt rather than termination.
    pub fn wants_reconnect(&self) -> bool {
        matches!(self, WakeReason::RemoteError | WakeReason::ChannelClosed)
    }
}

/// Leveled, coalescing wake primitive.
///
/// `raise` may be called any number of times, from any task, before or after
/// the waiter arrives; a raise that precedes the wait is not lost. Repeated
/// raises coalesce into a single wake carrying the strongest reason.
#[derive(Debug, Default)]
pub struct WakeSignal {
    reason: AtomicU8,
    notify: Notify,
}

impl WakeSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a wake reason and wake the waiter, if any.
    pub fn raise(&self, reason: WakeReason) {
        self.reason.fetch_max(reason.as_u8(), Ordering::SeqCst);
        self.notify.notify_one();
    }

    /// Suspend until a reason has been raised, consuming it.
    pub async fn wait(&self) -> WakeReason {
        loop {
            if let Some(reason) = self.take() {
                return reason;
            }
            self.notify.notified().await;
        }
    }

    /// Re-arm the signal for the next attempt, discarding any stale reason.
    pub fn clear(&self) {
        self.reason.store(REASON_NONE, Ordering::SeqCst);
    }

    fn take(&self) -> Option<WakeReason> {
        WakeReason::from_u8(self.reason.swap(REASON_NONE, Ordering::SeqCst))
    }
}
