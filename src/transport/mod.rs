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

//! Pluggable byte transport sitting under the RFB protocol engine.
//!
//! Generalizes the teacher's direct `TcpStream` usage in `client.rs` so
//! that VeNCrypt (see `crate::security::vencrypt`) can swap the raw socket
//! for a TLS session mid-handshake without the protocol FSM above caring.

mod raw;
mod tls;
mod zlib;

pub use raw::RawTransport;
pub use tls::TlsTransport;
pub use zlib::{sync_flush_compress, sync_flush_decompress, ZlibTransport};

use async_trait::async_trait;
use tokio::io;

use crate::error::Result;

/// A byte-oriented, async, bidirectional transport.
///
/// Failure semantics: any I/O error aborts the connection — callers
/// propagate `VncError::Io`/`VncError::TransportFailure` up to the
/// connection task, which tears the client down. Partial writes are
/// retried internally (tokio's `write_all` already loops on `WouldBlock`).
#[async_trait]
pub trait Transport: Send {
    /// Reads exactly `buf.len()` bytes, blocking until available.
    async fn recv_exact(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Reads whatever is immediately available into `buf`, returning the
    /// number of bytes read (0 only at EOF).
    async fn recv(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Writes all of `buf`.
    async fn send(&mut self, buf: &[u8]) -> Result<()>;

    /// Flushes any buffered output to the underlying socket.
    async fn send_flush(&mut self) -> Result<()>;

    /// Non-blocking check for whether input is currently available,
    /// without consuming it. Used by the idle-tracking interval and by
    /// `--type auto`'s protocol sniff.
    async fn has_input(&mut self) -> Result<bool>;

    /// Peeks at the first byte of the stream without consuming it.
    /// Used by the `--type auto` RDP/SPICE/VNC sniff (spec's connector
    /// front-end reads byte 0 before committing to an RFB handshake).
    async fn peek1(&mut self) -> Result<u8>;
}

/// Reads a big-endian `u8`.
pub async fn read_u8(t: &mut (dyn Transport + Send)) -> Result<u8> {
    let mut b = [0u8; 1];
    t.recv_exact(&mut b).await?;
    Ok(b[0])
}

/// Reads a big-endian `u16`.
pub async fn read_u16(t: &mut (dyn Transport + Send)) -> Result<u16> {
    let mut b = [0u8; 2];
    t.recv_exact(&mut b).await?;
    Ok(u16::from_be_bytes(b))
}

/// Reads a big-endian `u32`.
pub async fn read_u32(t: &mut (dyn Transport + Send)) -> Result<u32> {
    let mut b = [0u8; 4];
    t.recv_exact(&mut b).await?;
    Ok(u32::from_be_bytes(b))
}

/// Maps a plain tokio `io::Error` into the crate's transport failure
/// variant, preserving the message.
pub(crate) fn map_io(e: io::Error) -> crate::error::VncError {
    crate::error::VncError::Io(e)
}
