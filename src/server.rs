// Copyright 2025 Dustin McAfee
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The public entry point: owns the framebuffer, accepts connections, and
//! fans damage notifications out to every client.
//!
//! No teacher file grounds this one directly — the retrieved copy of
//! `dustinmcafee-rustvncserver` references `pub mod server;` from its
//! `lib.rs` but does not carry the file itself. The accept loop and
//! `VncServer` shape below follow this crate's own conventions
//! (`client::run`'s per-connection state, `config::Config`'s security
//! fields) plus the tokio `TcpListener` accept-loop idiom `signal-slot-kmsvnc`'s
//! `vnc::server` module uses.

use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{error, info};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, Mutex};

use crate::client::{self, SecurityRuntime};
use crate::collaborators::Collaborators;
use crate::config::Config;
use crate::error::Result;
use crate::events::ServerEvent;
use crate::framebuffer::Framebuffer;
use crate::region::Region;
use crate::security::{vencrypt, vnc_auth::VncAuth};

/// Capacity of the damage broadcast channel. A lagging client drops the
/// oldest regions and falls back to a full-framebuffer resync on its next
/// update, rather than applying backpressure to `update_framebuffer`.
const DAMAGE_CHANNEL_CAPACITY: usize = 256;

/// A VNC/LTSM server bound to one framebuffer.
///
/// `security` is read once per [`Self::listen`] call: configure it with
/// [`Self::set_password`]/[`Self::from_config`] before calling `listen`,
/// not while it's already running.
pub struct VncServer {
    framebuffer: Arc<Framebuffer>,
    collaborators: Arc<Collaborators>,
    security: Mutex<SecurityRuntime>,
    damage_tx: broadcast::Sender<Region>,
    event_tx: mpsc::UnboundedSender<ServerEvent>,
    event_rx: Mutex<Option<mpsc::UnboundedReceiver<ServerEvent>>>,
    idle_timeout: Duration,
    next_id: AtomicUsize,
    listen_addr: IpAddr,
}

impl VncServer {
    /// Builds a server with a `width x height` framebuffer and no
    /// authentication (`SECURITY_TYPE_NONE`). Call [`Self::set_password`]
    /// before [`Self::listen`] to require VNC authentication instead.
    #[must_use]
    pub fn new(width: u16, height: u16) -> Self {
        let (damage_tx, _) = broadcast::channel(DAMAGE_CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            framebuffer: Arc::new(Framebuffer::new(width, height)),
            collaborators: Arc::new(Collaborators::new()),
            security: Mutex::new(SecurityRuntime { allow_none: true, ..SecurityRuntime::default() }),
            damage_tx,
            event_tx,
            event_rx: Mutex::new(Some(event_rx)),
            idle_timeout: Duration::from_secs(0),
            next_id: AtomicUsize::new(0),
            listen_addr: IpAddr::from([0, 0, 0, 0]),
        }
    }

    /// Builds a server from a loaded [`Config`], wiring every security
    /// sub-protocol its `SecurityConfig` enables.
    ///
    /// # Errors
    ///
    /// Returns `Err` if a VNC password file, TLS certificate/key pair, or
    /// Kerberos keytab is configured but cannot be read/parsed.
    pub fn from_config(config: &Config) -> Result<Self> {
        let server = Self::new(config.desktop_width, config.desktop_height);
        let sec = &config.security;

        let vnc_auth = match &sec.passwd_file {
            Some(path) if sec.allow_vnc_auth => Some(VncAuth::from_password_file(path).map_err(crate::error::VncError::Io)?),
            _ => None,
        };

        let vencrypt = if let (Some(cert), Some(key)) = (&sec.tls_cert, &sec.tls_key) {
            if sec.allow_vencrypt_tls_none || sec.allow_vencrypt_x509_none {
                let tls_config = crate::security::load_server_config(cert, key)?;
                let mut subtypes = Vec::new();
                if sec.allow_vencrypt_tls_none {
                    subtypes.push(crate::protocol::VENCRYPT_TLS_NONE);
                    if vnc_auth.is_some() {
                        subtypes.push(crate::protocol::VENCRYPT_TLS_VNC);
                    }
                }
                if sec.allow_vencrypt_x509_none {
                    subtypes.push(crate::protocol::VENCRYPT_X509_NONE);
                    if vnc_auth.is_some() {
                        subtypes.push(crate::protocol::VENCRYPT_X509_VNC);
                    }
                }
                Some(vencrypt::VencryptConfig::new(tls_config, subtypes))
            } else {
                None
            }
        } else {
            None
        };

        let gssapi = sec.allow_kerberos.then(|| sec.kerberos_keytab.as_ref().map(|keytab| crate::security::GssapiConfig {
            service: sec.kerberos_service.clone(),
            keytab: keytab.display().to_string(),
            trace: sec.kerberos_trace.clone(),
        })).flatten();

        let runtime = SecurityRuntime { allow_none: sec.allow_none, vnc_auth, vencrypt, gssapi };
        *server.security.try_lock().expect("no connections are running yet") = runtime;
        Ok(Self {
            idle_timeout: Duration::from_secs(config.idle_timeout_secs),
            listen_addr: config.listen_addr,
            ..server
        })
    }

    /// The address this server will bind in [`Self::listen`], configured
    /// via [`Self::from_config`] (defaults to `0.0.0.0`). Exposed so a
    /// caller that binds its own listener (e.g. the `--type auto`
    /// protocol sniff in `bin/connector`) can match it.
    #[must_use]
    pub fn listen_addr(&self) -> IpAddr {
        self.listen_addr
    }

    /// Enables VNC challenge/response authentication with a single
    /// in-memory password, disabling `SECURITY_TYPE_NONE`. Passing `None`
    /// reverts to no authentication.
    pub async fn set_password(&self, password: Option<String>) {
        let mut runtime = self.security.lock().await;
        match password {
            Some(p) => {
                runtime.allow_none = false;
                runtime.vnc_auth = Some(VncAuth::new(Some(p)));
            }
            None => {
                runtime.allow_none = true;
                runtime.vnc_auth = None;
            }
        }
    }

    /// Sets the idle timeout after which [`Collaborators::on_session_idle`]
    /// fires for a connection with no input activity. `0` disables it.
    pub fn set_idle_timeout(&mut self, timeout: Duration) {
        self.idle_timeout = timeout;
    }

    /// Installs the collaborator handlers this server's connections will
    /// invoke. Replaces any handlers set previously.
    pub fn set_collaborators(&mut self, collaborators: Collaborators) {
        self.collaborators = Arc::new(collaborators);
    }

    /// Takes the event receiver. Returns `None` if already taken.
    pub async fn take_events(&self) -> Option<mpsc::UnboundedReceiver<ServerEvent>> {
        self.event_rx.lock().await.take()
    }

    /// Replaces `region`'s pixels with `rgba` (tightly packed) and
    /// notifies every connected client of the damage.
    pub fn update_framebuffer(&self, rgba: &[u8], region: Region) {
        self.framebuffer.blit_bytes(region, rgba);
        let _ = self.damage_tx.send(region);
    }

    /// Shared handle to the framebuffer, for callers that want to read or
    /// paint into it directly (e.g. a capture backend).
    #[must_use]
    pub fn framebuffer(&self) -> Arc<Framebuffer> {
        Arc::clone(&self.framebuffer)
    }

    /// Binds `port` on all interfaces and serves connections until the
    /// listener fails or the process is asked to stop. Each accepted
    /// connection is handled on its own task by [`client::run`].
    ///
    /// # Errors
    ///
    /// Returns `Err` if the port cannot be bound.
    pub async fn listen(&self, port: u16) -> Result<()> {
        let listener = TcpListener::bind((self.listen_addr, port)).await?;
        info!("listening on {}:{port}", self.listen_addr);
        let security = Arc::new(self.security.lock().await.clone());

        loop {
            let (stream, addr) = match listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    error!("accept failed: {e}");
                    continue;
                }
            };
            self.spawn_connection(stream, addr, Arc::clone(&security));
        }
    }

    /// Hands an already-accepted connection to a fresh [`client::run`]
    /// task under this server's current security configuration. Exposed
    /// so a caller that already owns the `TcpListener` (e.g. the
    /// `--type auto` protocol sniff in `bin/connector`) can dispatch
    /// VNC-bound connections here instead of through [`Self::listen`].
    pub async fn spawn_accepted(&self, stream: tokio::net::TcpStream, addr: SocketAddr) {
        let security = Arc::new(self.security.lock().await.clone());
        self.spawn_connection(stream, addr, security);
    }

    fn spawn_connection(&self, stream: tokio::net::TcpStream, addr: SocketAddr, security: Arc<SecurityRuntime>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let framebuffer = Arc::clone(&self.framebuffer);
        let collaborators = Arc::clone(&self.collaborators);
        let damage_rx = self.damage_tx.subscribe();
        let event_tx = self.event_tx.clone();
        let idle_timeout = self.idle_timeout;

        tokio::spawn(async move {
            if let Err(e) = client::run(stream, id, addr, framebuffer, security, collaborators, damage_rx, event_tx, idle_timeout).await {
                error!("client {id} ({addr}) ended: {e}");
            } else {
                info!("client {id} ({addr}) disconnected");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_server_defaults_to_no_authentication() {
        let server = VncServer::new(640, 480);
        let runtime = server.security.try_lock().unwrap();
        assert!(runtime.allow_none);
        assert!(runtime.vnc_auth.is_none());
    }

    #[tokio::test]
    async fn set_password_disables_none_and_enables_vnc_auth() {
        let server = VncServer::new(640, 480);
        server.set_password(Some("hunter2".to_string())).await;
        let runtime = server.security.lock().await;
        assert!(!runtime.allow_none);
        assert!(runtime.vnc_auth.is_some());
    }

    #[test]
    fn update_framebuffer_broadcasts_the_damaged_region() {
        let server = VncServer::new(16, 16);
        let mut rx = server.damage_tx.subscribe();
        let region = Region::new(0, 0, 16, 16);
        server.update_framebuffer(&vec![0u8; 16 * 16 * 4], region);
        assert_eq!(rx.try_recv().unwrap(), region);
    }
}
