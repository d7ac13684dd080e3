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

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use super::Transport;
use crate::error::Result;

/// The teacher's original transport: a plain TCP socket.
pub struct RawTransport {
    stream: TcpStream,
}

impl RawTransport {
    /// Wraps an already-accepted TCP stream, matching the teacher's
    /// `VncClient::new` which disables Nagle's algorithm immediately.
    pub fn new(stream: TcpStream) -> Result<Self> {
        stream.set_nodelay(true)?;
        Ok(Self { stream })
    }

    /// Consumes `self`, returning the inner stream — used when handing
    /// the socket off to a TLS acceptor during VeNCrypt negotiation.
    #[must_use]
    pub fn into_inner(self) -> TcpStream {
        self.stream
    }
}

#[async_trait]
impl Transport for RawTransport {
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
        let mut b = [0u8; 1];
        // Non-destructive peek raced against an immediate timeout: if the
        // socket isn't already readable this resolves to "no" rather than
        // blocking the idle-tracking interval that calls it.
        match tokio::time::timeout(std::time::Duration::from_millis(0), self.stream.peek(&mut b)).await {
            Ok(Ok(0)) => Ok(false),
            Ok(Ok(_)) => Ok(true),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Ok(false),
        }
    }

    async fn peek1(&mut self) -> Result<u8> {
        let mut b = [0u8; 1];
        let n = self.stream.peek(&mut b).await?;
        if n == 0 {
            return Err(crate::error::VncError::ConnectionClosed);
        }
        Ok(b[0])
    }
}
