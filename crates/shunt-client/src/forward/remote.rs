//! Remote port forward handler (-R).
//!
//! Asks the server to bind a port and relays each forwarded connection back
//! to the local target. The target lookup table is shared with the session
//! handler, which serves the actual `forwarded-tcpip` channel opens.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use russh::client;
use tokio::sync::Mutex;
use tracing::{debug, info};

use shunt_core::{ActiveForward, Error, ForwardIntent, Result};

/// Bound server port -> local target, consumed by the session handler when
/// the server opens a forwarded channel.
pub type RemoteTargets = Arc<StdMutex<HashMap<u32, (String, u16)>>>;

/// A running remote forward: a server-side listener established with a
/// `tcpip-forward` global request.
pub struct RemoteForward<H: client::Handler> {
    handle: Arc<Mutex<client::Handle<H>>>,
    targets: RemoteTargets,
    bound_host: String,
    bound_port: u32,
    descriptor: String,
    stopped: bool,
}

impl<H> RemoteForward<H>
where
    H: client::Handler + Send + 'static,
{
    /// Request the server-side bind and register the relay target.
    pub async fn start(
        handle: Arc<Mutex<client::Handle<H>>>,
        targets: RemoteTargets,
        intent: &ForwardIntent,
    ) -> Result<Self> {
        let target_port = u16::try_from(intent.target_port()).map_err(|_| Error::Forward {
            message: format!(
                "target port {} out of range for '{intent}'",
                intent.target_port()
            ),
        })?;

        // RFC 4254: an empty address means "listen on all interfaces".
        let bound_host = intent.bound_host().to_string();
        let bound_port = intent.bound_port();

        let accepted = {
            let mut guard = handle.lock().await;
            guard
                .tcpip_forward(bound_host.as_str(), bound_port)
                .await
                .map_err(|e| Error::Forward {
                    message: format!("tcpip-forward request failed for '{intent}': {e}"),
                })?;
            true
        };
        if !accepted {
            return Err(Error::Forward {
                message: format!("server refused remote forward '{intent}'"),
            });
        }

        {
            let mut targets = targets.lock().unwrap_or_else(|e| e.into_inner());
            targets.insert(
                bound_port,
                (intent.target_host().to_string(), target_port),
            );
        }

        info!(forward = %intent, "Remote forward established");

        Ok(Self {
            handle,
            targets,
            bound_host,
            bound_port,
            descriptor: intent.to_string(),
            stopped: false,
        })
    }
}

#[async_trait]
impl<H> ActiveForward for RemoteForward<H>
where
    H: client::Handler + Send + 'static,
{
    async fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;

        {
            let mut targets = self.targets.lock().unwrap_or_else(|e| e.into_inner());
            targets.remove(&self.bound_port);
        }

        let result = {
            let mut guard = self.handle.lock().await;
            guard
                .cancel_tcpip_forward(self.bound_host.as_str(), self.bound_port)
                .await
        };
        match result {
            Ok(_) => debug!(forward = %self.descriptor, "Remote forward stopped"),
            // The transport is usually already gone when we drain an attempt.
            Err(e) => debug!(forward = %self.descriptor, error = %e, "Cancel request not delivered"),
        }
    }
}
