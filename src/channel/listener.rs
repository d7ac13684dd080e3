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

//! Accept loops for channel listeners, grounded on
//! `original_source/src/channels/channel_system.h`'s `Channel::Listener`
//! / `UnixListener` / `TcpListener`.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener as TokioTcpListener, UnixListener as TokioUnixListener};
use tokio::sync::mpsc;

use super::types::{ChannelMode, Speed};

/// An accepted connection handed from a listener's accept loop to the
/// controller, which turns it into a `Planned` entry and emits
/// `ChannelOpen` to the peer.
pub enum Accepted {
    /// An accepted Unix domain socket connection.
    Unix(tokio::net::UnixStream),
    /// An accepted TCP connection.
    Tcp(tokio::net::TcpStream),
}

/// One listener's accept loop state. `Drop` removes the bound Unix
/// socket path, mirroring the original's destructor.
pub struct Listener {
    running: Arc<AtomicBool>,
    client_url: String,
    client_mode: ChannelMode,
    server_mode: ChannelMode,
    speed: Speed,
    zlib: bool,
    unix_path: Option<PathBuf>,
}

impl Listener {
    /// Binds a Unix domain socket at `path` and spawns its accept loop,
    /// forwarding each accepted connection on `accepted`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the bind fails.
    pub fn bind_unix(
        path: PathBuf,
        client_url: String,
        client_mode: ChannelMode,
        server_mode: ChannelMode,
        speed: Speed,
        zlib: bool,
        accepted: mpsc::UnboundedSender<Accepted>,
    ) -> std::io::Result<Self> {
        let socket = TokioUnixListener::bind(&path)?;
        let running = Arc::new(AtomicBool::new(true));
        tokio::spawn(accept_loop_unix(socket, Arc::clone(&running), accepted));
        Ok(Self {
            running,
            client_url,
            client_mode,
            server_mode,
            speed,
            zlib,
            unix_path: Some(path),
        })
    }

    /// Binds a TCP listener to `127.0.0.1:port` (server-side sockets
    /// must not bind any other address, per policy) and spawns its
    /// accept loop.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the bind fails.
    pub async fn bind_tcp(
        port: u16,
        client_url: String,
        client_mode: ChannelMode,
        server_mode: ChannelMode,
        speed: Speed,
        zlib: bool,
        accepted: mpsc::UnboundedSender<Accepted>,
    ) -> std::io::Result<Self> {
        let socket = TokioTcpListener::bind(("127.0.0.1", port)).await?;
        let running = Arc::new(AtomicBool::new(true));
        tokio::spawn(accept_loop_tcp(socket, Arc::clone(&running), accepted));
        Ok(Self {
            running,
            client_url,
            client_mode,
            server_mode,
            speed,
            zlib,
            unix_path: None,
        })
    }

    /// The client-side URL new channels through this listener should
    /// advertise in `ChannelOpen`.
    #[must_use]
    pub fn client_url(&self) -> &str {
        &self.client_url
    }

    /// Mode the client side should use.
    #[must_use]
    pub fn client_mode(&self) -> ChannelMode {
        self.client_mode
    }

    /// Mode the server side (this process) will use.
    #[must_use]
    pub fn server_mode(&self) -> ChannelMode {
        self.server_mode
    }

    /// Throughput class newly accepted channels should use.
    #[must_use]
    pub fn speed(&self) -> Speed {
        self.speed
    }

    /// Whether newly accepted channels should zlib-wrap their frames.
    #[must_use]
    pub fn zlib(&self) -> bool {
        self.zlib
    }

    /// Stops the accept loop.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Whether the accept loop is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.stop();
        if let Some(path) = &self.unix_path {
            let _ = std::fs::remove_file(path);
        }
    }
}

async fn accept_loop_unix(socket: TokioUnixListener, running: Arc<AtomicBool>, accepted: mpsc::UnboundedSender<Accepted>) {
    while running.load(Ordering::Acquire) {
        match socket.accept().await {
            Ok((stream, _addr)) => {
                if accepted.send(Accepted::Unix(stream)).is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
    }
}

async fn accept_loop_tcp(socket: TokioTcpListener, running: Arc<AtomicBool>, accepted: mpsc::UnboundedSender<Accepted>) {
    while running.load(Ordering::Acquire) {
        match socket.accept().await {
            Ok((stream, _addr)) => {
                if accepted.send(Accepted::Tcp(stream)).is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tcp_listener_accepts_a_connection() {
        let (accepted_tx, mut accepted_rx) = mpsc::unbounded_channel();
        let listener = Listener::bind_tcp(0, "tcp://peer".into(), ChannelMode::ReadWrite, ChannelMode::ReadWrite, Speed::Medium, false, accepted_tx)
            .await
            .unwrap();
        assert!(listener.is_running());
        listener.stop();
        assert!(!listener.is_running());
        drop(accepted_rx.try_recv());
    }
}
