//! Live port forward handlers.
//!
//! Each handler materializes one `ForwardIntent` against the active session
//! and implements `ActiveForward` with an idempotent stop. Per-connection
//! failures are logged warnings, never reconnect triggers.

mod local;
mod remote;

pub use local::LocalForward;
pub use remote::{RemoteForward, RemoteTargets};
