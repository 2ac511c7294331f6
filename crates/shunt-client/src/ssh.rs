//! russh-backed session.
//!
//! `RusshSession` implements the supervisor's `Session` trait on top of
//! russh: connect and authenticate, relay the interactive shell into the
//! injected sink, and build live forwards from intents. Remote-side trouble
//! never surfaces as an error from here; it raises the wake signal and lets
//! the supervisor decide.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use async_trait::async_trait;
use russh::client;
use russh::ChannelMsg;
use russh_keys::key::KeyPair;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use shunt_core::{
    ActiveForward, Error, ForwardDirection, ForwardIntent, Result, Session, ShellSink, WakeReason,
    WakeSignal,
};

use crate::forward::{LocalForward, RemoteForward, RemoteTargets};

/// Connection parameters for one session.
pub struct SshOptions {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub auth: SshAuth,
    /// Keepalive probe interval.
    pub keepalive_interval: Duration,
    /// Disconnect after this long without any traffic.
    pub inactivity_timeout: Duration,
}

impl SshOptions {
    pub fn new(host: String, port: u16, user: String, auth: SshAuth) -> Self {
        Self {
            host,
            port,
            user,
            auth,
            keepalive_interval: Duration::from_secs(30),
            inactivity_timeout: Duration::from_secs(3600),
        }
    }
}

/// Credential material. Password and key are mutually exclusive upstream.
pub enum SshAuth {
    /// Held zeroizing; consumed by the first authentication attempt.
    Password(Zeroizing<String>),
    Key(Arc<KeyPair>),
}

/// Client-side event handler shared with russh's session driver.
pub struct ClientHandler {
    sink: Arc<dyn ShellSink>,
    remote_targets: RemoteTargets,
}

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh_keys::key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        // Host key pinning is the transport library's concern; accept with a
        // warning the way a long-running keeper has to.
        warn!("Host key verification not implemented, accepting key");
        Ok(true)
    }

    async fn auth_banner(
        &mut self,
        banner: &str,
        _session: &mut client::Session,
    ) -> std::result::Result<(), Self::Error> {
        self.sink.banner(banner);
        Ok(())
    }

    async fn server_channel_open_forwarded_tcpip(
        &mut self,
        channel: russh::Channel<client::Msg>,
        connected_address: &str,
        connected_port: u32,
        originator_address: &str,
        originator_port: u32,
        _session: &mut client::Session,
    ) -> std::result::Result<(), Self::Error> {
        let target = {
            let targets = self.remote_targets.lock().unwrap_or_else(|e| e.into_inner());
            targets.get(&connected_port).cloned()
        };

        let Some((target_host, target_port)) = target else {
            warn!(
                address = connected_address,
                port = connected_port,
                "Forwarded connection for an unknown bound port, dropping"
            );
            return Ok(());
        };

        debug!(
            originator = %format!("{originator_address}:{originator_port}"),
            bound_port = connected_port,
            target = %format!("{target_host}:{target_port}"),
            "Relaying forwarded connection"
        );

        tokio::spawn(async move {
            match tokio::net::TcpStream::connect((target_host.as_str(), target_port)).await {
                Ok(mut stream) => {
                    let mut channel_stream = channel.into_stream();
                    if let Err(e) =
                        tokio::io::copy_bidirectional(&mut stream, &mut channel_stream).await
                    {
                        debug!(error = %e, "Forwarded relay ended");
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

        Ok(())
    }
}

type SharedHandle = Arc<Mutex<client::Handle<ClientHandler>>>;

/// The russh-backed [`Session`] implementation.
pub struct RusshSession {
    options: SshOptions,
    handle: Option<SharedHandle>,
    shell_task: Option<JoinHandle<()>>,
    sink: Option<Arc<dyn ShellSink>>,
    signal: Option<Arc<WakeSignal>>,
    remote_targets: RemoteTargets,
}

impl RusshSession {
    pub fn new(options: SshOptions) -> Self {
        Self {
            options,
            handle: None,
            shell_task: None,
            sink: None,
            signal: None,
            remote_targets: Arc::new(StdMutex::new(HashMap::new())),
        }
    }

    fn shared_handle(&self) -> Result<SharedHandle> {
        self.handle.clone().ok_or_else(|| Error::Session {
            message: "session is not connected".into(),
        })
    }
}

#[async_trait]
impl Session for RusshSession {
    async fn open(&mut self, sink: Arc<dyn ShellSink>, signal: Arc<WakeSignal>) -> Result<()> {
        let config = Arc::new(client::Config {
            inactivity_timeout: Some(self.options.inactivity_timeout),
            keepalive_interval: Some(self.options.keepalive_interval),
            keepalive_max: 3,
            ..Default::default()
        });

        let handler = ClientHandler {
            sink: Arc::clone(&sink),
            remote_targets: Arc::clone(&self.remote_targets),
        };

        let addr = (self.options.host.as_str(), self.options.port);
        let mut handle = client::connect(config, addr, handler)
            .await
            .map_err(|e| Error::Session {
                message: format!("connection failed: {e}"),
            })?;

        debug!(
            host = %self.options.host,
            port = self.options.port,
            "Transport established"
        );

        let authenticated = match &self.options.auth {
            SshAuth::Password(password) => handle
                .authenticate_password(self.options.user.as_str(), password.as_str())
                .await
                .map_err(|e| Error::Auth {
                    message: format!("password auth failed: {e}"),
                })?,
            SshAuth::Key(key) => handle
                .authenticate_publickey(self.options.user.as_str(), Arc::clone(key))
                .await
                .map_err(|e| Error::Auth {
                    message: format!("public key auth failed: {e}"),
                })?,
        };

        if !authenticated {
            return Err(Error::Auth {
                message: format!("server rejected authentication for '{}'", self.options.user),
            });
        }

        info!(user = %self.options.user, host = %self.options.host, "Authenticated");

        self.handle = Some(Arc::new(Mutex::new(handle)));
        self.sink = Some(sink);
        self.signal = Some(signal);
        Ok(())
    }

    async fn start_forward(&mut self, intent: &ForwardIntent) -> Result<Box<dyn ActiveForward>> {
        let handle = self.shared_handle()?;
        match intent.direction() {
            ForwardDirection::Local => {
                let forward = LocalForward::start(handle, intent).await?;
                Ok(Box::new(forward))
            }
            ForwardDirection::Remote => {
                let forward =
                    RemoteForward::start(handle, Arc::clone(&self.remote_targets), intent).await?;
                Ok(Box::new(forward))
            }
        }
    }

    async fn start_shell(&mut self) -> Result<()> {
        let handle = self.shared_handle()?;
        let sink = self.sink.clone().ok_or_else(|| Error::Session {
            message: "session is not connected".into(),
        })?;
        let signal = self.signal.clone().ok_or_else(|| Error::Session {
            message: "session is not connected".into(),
        })?;

        let mut channel = {
            let guard = handle.lock().await;
            guard.channel_open_session().await.map_err(|e| Error::Session {
                message: format!("unable to open shell channel: {e}"),
            })?
        };

        channel
            .request_pty(false, "xterm", 80, 40, 0, 0, &[])
            .await
            .map_err(|e| Error::Session {
                message: format!("pty request failed: {e}"),
            })?;
        channel
            .request_shell(true)
            .await
            .map_err(|e| Error::Session {
                message: format!("shell request failed: {e}"),
            })?;

        debug!("Shell channel ready");

        let task = tokio::spawn(async move {
            loop {
                match channel.wait().await {
                    Some(ChannelMsg::Data { data }) => {
                        sink.output(&String::from_utf8_lossy(&data));
                    }
                    Some(ChannelMsg::ExtendedData { data, .. }) => {
                        sink.output(&String::from_utf8_lossy(&data));
                    }
                    Some(ChannelMsg::ExitStatus { exit_status }) => {
                        debug!(exit_status, "Remote shell exited");
                    }
                    Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                        info!("Shell channel closed");
                        signal.raise(WakeReason::ChannelClosed);
                        break;
                    }
                    _ => {}
                }
            }
        });
        self.shell_task = Some(task);

        Ok(())
    }

    async fn is_connected(&self) -> bool {
        match &self.handle {
            Some(handle) => !handle.lock().await.is_closed(),
            None => false,
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(task) = self.shell_task.take() {
            task.abort();
        }

        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        let mut guard = handle.lock().await;
        guard
            .disconnect(russh::Disconnect::ByApplication, "", "")
            .await
            .map_err(|e| Error::Session {
                message: format!("disconnect failed: {e}"),
            })
    }
}
