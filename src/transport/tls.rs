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

//! TLS transport used after VeNCrypt negotiates a `TLSNone`/`X509None`
//! sub-type and hands the raw socket off to a `rustls` session.

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::server::TlsStream;

use super::Transport;
use crate::error::{Result, VncError};

/// A VeNCrypt-negotiated TLS session wrapping the accepted TCP socket.
pub struct TlsTransport {
    stream: TlsStream<TcpStream>,
}

impl TlsTransport {
    /// Wraps an already-completed TLS server handshake.
    #[must_use]
    pub fn new(stream: TlsStream<TcpStream>) -> Self {
        Self { stream }
    }
}

#[async_trait]
impl Transport for TlsTransport {
    async fn recv_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.stream.read_exact(buf).await?;
        Ok(())
    }

    async fn recv(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.stream.read(buf).await?)
    }

    async fn send(&mut self, buf: &[u8]) -> Result<()> {
        self.stream.write_all(buf).await?;
        Ok(())
    }

    async fn send_flush(&mut self) -> Result<()> {
        self.stream.flush().await?;
        Ok(())
    }

    async fn has_input(&mut self) -> Result<bool> {
        // rustls buffers records internally; there is no peek equivalent
        // across a TLS session, so VeNCrypt-secured connections rely on
        // the protocol FSM's read loop rather than the idle-poll fast path.
        Ok(false)
    }

    async fn peek1(&mut self) -> Result<u8> {
        Err(VncError::TransportFailure(
            "peek1 is not supported once a TLS session is established".into(),
        ))
    }
}
