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

//! Output-only zlib filter, plus the standalone compress/decompress
//! helpers the LTSM per-channel framing (spec §4.F, `channel::connector`)
//! uses directly, since a channel wraps raw `AsyncRead`/`AsyncWrite`
//! halves rather than a [`Transport`] and has no use for the framing
//! `ZlibTransport` wraps on top.

use async_trait::async_trait;
use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

use super::Transport;
use crate::error::{Result, VncError};

/// Compresses `data` against `compressor`'s running deflate stream with
/// `FlushCompress::Sync`, the "flush per frame" behavior spec §4.F
/// requires so each LTSM frame is independently inflatable by the peer.
/// Grows its output buffer and retries on `BufError` rather than
/// guessing a single worst-case size up front.
pub fn sync_flush_compress(compressor: &mut Compress, data: &[u8]) -> Result<Vec<u8>> {
    let before_in = compressor.total_in();
    let before_out = compressor.total_out();
    let mut out = vec![0u8; data.len() + 64];
    loop {
        let in_start = (compressor.total_in() - before_in) as usize;
        let out_start = (compressor.total_out() - before_out) as usize;
        if out_start == out.len() {
            out.resize(out.len() * 2, 0);
        }
        let status = compressor
            .compress(&data[in_start..], &mut out[out_start..], FlushCompress::Sync)
            .map_err(|e| VncError::TransportFailure(format!("zlib compress failed: {e}")))?;
        let consumed_all = (compressor.total_in() - before_in) as usize >= data.len();
        match status {
            Status::StreamEnd => break,
            Status::Ok | Status::BufError if consumed_all && (compressor.total_out() - before_out) as usize > out_start => break,
            Status::Ok | Status::BufError => continue,
        }
    }
    out.truncate((compressor.total_out() - before_out) as usize);
    Ok(out)
}

/// Decompresses `data` against `decompressor`'s running inflate stream
/// with `FlushDecompress::Sync`, the counterpart to
/// [`sync_flush_compress`] on the receiving end of one LTSM frame.
pub fn sync_flush_decompress(decompressor: &mut Decompress, data: &[u8]) -> Result<Vec<u8>> {
    let before_in = decompressor.total_in();
    let before_out = decompressor.total_out();
    let mut out = vec![0u8; data.len() * 4 + 64];
    loop {
        let in_start = (decompressor.total_in() - before_in) as usize;
        let out_start = (decompressor.total_out() - before_out) as usize;
        if out_start == out.len() {
            out.resize(out.len() * 2, 0);
        }
        let status = decompressor
            .decompress(&data[in_start..], &mut out[out_start..], FlushDecompress::Sync)
            .map_err(|e| VncError::TransportFailure(format!("zlib decompress failed: {e}")))?;
        let consumed_all = (decompressor.total_in() - before_in) as usize >= data.len();
        match status {
            Status::StreamEnd => break,
            Status::Ok | Status::BufError if consumed_all => break,
            Status::Ok | Status::BufError => continue,
        }
    }
    out.truncate((decompressor.total_out() - before_out) as usize);
    Ok(out)
}

/// Wraps an inner transport, compressing everything written through
/// `send` with a single persistent deflate stream and passing reads
/// straight through uncompressed (the reverse direction is handled by a
/// `flate2::Decompress` at the point of use, mirroring the
/// `encoding`/`decoding` split).
pub struct ZlibTransport<T: Transport> {
    inner: T,
    compressor: Compress,
    pending: Vec<u8>,
}

impl<T: Transport> ZlibTransport<T> {
    /// Wraps `inner`, starting a fresh deflate stream at the given level.
    #[must_use]
    pub fn new(inner: T, level: u32) -> Self {
        Self {
            inner,
            compressor: Compress::new(Compression::new(level), true),
            pending: Vec::new(),
        }
    }

    /// Compresses everything buffered since the last flush with
    /// `FlushCompress::Sync` and writes the resulting block to the inner
    /// transport. Grounded on `encoding::zlib::encode_zlib_persistent`'s
    /// use of the same `Compress` + `FlushCompress::Sync` combination.
    pub async fn sync_flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let out = sync_flush_compress(&mut self.compressor, &self.pending)?;
        self.inner.send(&out).await?;
        self.pending.clear();
        Ok(())
    }
}

#[async_trait]
impl<T: Transport> Transport for ZlibTransport<T> {
    async fn recv_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inner.recv_exact(buf).await
    }

    async fn recv(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.inner.recv(buf).await
    }

    async fn send(&mut self, buf: &[u8]) -> Result<()> {
        self.pending.extend_from_slice(buf);
        Ok(())
    }

    async fn send_flush(&mut self) -> Result<()> {
        self.sync_flush().await?;
        self.inner.send_flush().await
    }

    async fn has_input(&mut self) -> Result<bool> {
        self.inner.has_input().await
    }

    async fn peek1(&mut self) -> Result<u8> {
        self.inner.peek1().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compress_then_decompress_round_trips_a_sync_flushed_frame() {
        let mut compressor = Compress::new(Compression::fast(), true);
        let mut decompressor = Decompress::new(true);
        let payload = b"the quick brown fox jumps over the lazy dog".repeat(4);

        let compressed = sync_flush_compress(&mut compressor, &payload).unwrap();
        let decompressed = sync_flush_decompress(&mut decompressor, &compressed).unwrap();
        assert_eq!(decompressed, payload);
    }

    #[test]
    fn independent_frames_each_decompress_against_the_same_stream() {
        let mut compressor = Compress::new(Compression::fast(), true);
        let mut decompressor = Decompress::new(true);

        let frame_a = sync_flush_compress(&mut compressor, b"frame one").unwrap();
        let frame_b = sync_flush_compress(&mut compressor, b"frame two").unwrap();

        assert_eq!(sync_flush_decompress(&mut decompressor, &frame_a).unwrap(), b"frame one");
        assert_eq!(sync_flush_decompress(&mut decompressor, &frame_b).unwrap(), b"frame two");
    }
}
