//! Local port forwarding handler (-L).
//!
//! Flow:
//! 1. Bind the local listener (empty bound host means all interfaces)
//! 2. Accept a local TCP connection
//! 3. Open a direct-tcpip channel to the target through the session
//! 4. Bidirectional relay until either side closes

use std::sync::Arc;

use async_trait::async_trait;
use russh::client;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use shunt_core::{ActiveForward, Error, ForwardIntent, Result};

/// A running local forward: one listener task plus a relay task per
/// accepted connection.
pub struct LocalForward {
    descriptor: String,
    accept_task: Option<JoinHandle<()>>,
}

impl LocalForward {
    /// Bind the listener and start accepting.
    pub async fn start<H>(
        handle: Arc<Mutex<client::Handle<H>>>,
        intent: &ForwardIntent,
    ) -> Result<Self>
    where
        H: client::Handler + Send + 'static,
    {
        let bind_host = if intent.bound_host().is_empty() {
            "0.0.0.0"
        } else {
            intent.bound_host()
        };
        let bind_port = u16::try_from(intent.bound_port()).map_err(|_| Error::Forward {
            message: format!("bound port {} out of range for '{intent}'", intent.bound_port()),
        })?;

        let listener = TcpListener::bind((bind_host, bind_port))
            .await
            .map_err(|e| Error::Forward {
                message: format!("unable to bind {bind_host}:{bind_port}: {e}"),
            })?;

        info!(forward = %intent, "Local forward listening");

        let target_host = intent.target_host().to_string();
        let target_port = intent.target_port();
        let descriptor = intent.to_string();
        let task_descriptor = descriptor.clone();

        let accept_task = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((mut stream, peer)) => {
                        debug!(peer = %peer, forward = %task_descriptor, "Accepted connection");

                        let handle = Arc::clone(&handle);
                        let target_host = target_host.clone();
                        tokio::spawn(async move {
                            let channel = {
                                let guard = handle.lock().await;
                                guard
                                    .channel_open_direct_tcpip(
                                        target_host.as_str(),
                                        target_port,
                                        peer.ip().to_string(),
                                        u32::from(peer.port()),
                                    )
                                    .await
                            };

                            match channel {
                                Ok(channel) => {
                                    let mut channel_stream = channel.into_stream();
                                    if let Err(e) = tokio::io::copy_bidirectional(
                                        &mut stream,
                                        &mut channel_stream,
                                    )
                                    .await
                                    {
                                        debug!(error = %e, "Relay ended");
                                    }
                                }
                                Err(e) => {
                                    warn!(
                                        error = %e,
                                        target = %format!("{target_host}:{target_port}"),
                                        "Exception on forwarded port"
                                    );
                                }
                            }
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, forward = %task_descriptor, "Accept failed");
                        break;
                    }
                }
            }
        });

        Ok(Self {
            descriptor,
            accept_task: Some(accept_task),
        })
    }
}

#[async_trait]
impl ActiveForward for LocalForward {
    async fn stop(&mut self) {
        if let Some(task) = self.accept_task.take() {
            task.abort();
            debug!(forward = %self.descriptor, "Local forward stopped");
        }
    }
}
