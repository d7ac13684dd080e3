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

//! Per-channel reader/writer runtime, grounded on
//! `original_source/src/channels/channel_system.h`'s `Channel::Connector`
//! (`loopReader`/`loopWriter`, `isRunning`/`setRunning`,
//! `isRemoteConnected`). Threads become tokio tasks; the original's raw
//! fd is generalized to boxed `AsyncRead`/`AsyncWrite` halves so Unix
//! sockets, TCP sockets, files, and child-process stdio share one
//! implementation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use flate2::{Compress, Compression, Decompress};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use super::types::{ChannelId, ChannelMode, Speed};
use crate::error::Result;
use crate::transport::{sync_flush_compress, sync_flush_decompress};

/// The protocol engine's hook for handing a channel's outbound bytes to
/// the shared transport. Mirrors the original's abstract
/// `ChannelClient::sendLtsmEvent(channel, bytes, size)`: the connector
/// doesn't know about sockets or the send mutex, only that bytes for a
/// channel id need to reach the peer.
#[async_trait]
pub trait LtsmSink: Send + Sync {
    /// Sends `payload` to the peer as one or more LTSM frames on `channel`.
    async fn send_ltsm_event(&self, channel: ChannelId, payload: &[u8]) -> Result<()>;
}

/// What a reader/writer pair reported about its local fd, so the
/// controller can decide whether to emit `ChannelClose` or
/// `ChannelError` on the system channel.
#[derive(Debug)]
pub enum ConnectorEvent {
    /// The local resource hit EOF; the channel should close cleanly.
    Eof(ChannelId),
    /// The local resource failed with a non-retryable error.
    Error(ChannelId, String),
}

/// A running channel's reader/writer pair and shared state, the
/// generalized form of the original's `Channel::Connector`.
pub struct Connector {
    id: ChannelId,
    speed: Speed,
    zlib: bool,
    running: Arc<AtomicBool>,
    remote_connected: Arc<AtomicBool>,
    inbound: mpsc::UnboundedSender<Vec<u8>>,
    decompressor: Option<Arc<StdMutex<Decompress>>>,
}

impl Connector {
    /// Spawns the reader worker (if `mode` allows it) moving bytes from
    /// `reader` to `sink`, and the writer worker (if `mode` allows it)
    /// draining queued inbound buffers into `writer`. Either half may be
    /// `None` when `mode` doesn't call for it.
    pub fn spawn(
        id: ChannelId,
        mode: ChannelMode,
        speed: Speed,
        zlib: bool,
        reader: Option<Box<dyn AsyncRead + Unpin + Send>>,
        writer: Option<Box<dyn AsyncWrite + Unpin + Send>>,
        sink: Arc<dyn LtsmSink>,
        events: mpsc::UnboundedSender<ConnectorEvent>,
    ) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let remote_connected = Arc::new(AtomicBool::new(true));
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        // Independent compressor/decompressor state per channel, matching
        // the per-channel `Z_SYNC_FLUSH` framing: each direction keeps its
        // own deflate stream so one channel's frames never depend on
        // another's compression history.
        let compressor = zlib.then(|| Arc::new(StdMutex::new(Compress::new(Compression::fast(), true))));
        let decompressor = zlib.then(|| Arc::new(StdMutex::new(Decompress::new(true))));

        if mode.has_reader() {
            if let Some(reader) = reader {
                tokio::spawn(reader_loop(id, speed, reader, sink.clone(), Arc::clone(&running), events.clone(), compressor));
            }
        }
        if mode.has_writer() {
            if let Some(writer) = writer {
                tokio::spawn(writer_loop(id, speed, writer, inbound_rx, Arc::clone(&running), events));
            }
        }

        Self { id, speed, zlib, running, remote_connected, inbound: inbound_tx, decompressor }
    }

    /// This channel's id.
    #[must_use]
    pub fn channel(&self) -> ChannelId {
        self.id
    }

    /// Whether frames on this channel are zlib-wrapped.
    #[must_use]
    pub fn zlib(&self) -> bool {
        self.zlib
    }

    /// This channel's throughput class.
    #[must_use]
    pub fn speed(&self) -> Speed {
        self.speed
    }

    /// Whether the reader/writer workers are still meant to be running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Clears the running flag; workers observe it at their next loop
    /// head, finish the buffer in flight, and exit on their own.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Whether the peer has confirmed its side is connected.
    #[must_use]
    pub fn is_remote_connected(&self) -> bool {
        self.remote_connected.load(Ordering::Acquire)
    }

    /// Marks the peer as (dis)connected.
    pub fn set_remote_connected(&self, connected: bool) {
        self.remote_connected.store(connected, Ordering::Release);
    }

    /// Queues a buffer decoded from an incoming LTSM frame for the
    /// writer worker to drain to the local fd, inflating it first against
    /// this channel's own deflate stream when `zlib` is set.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the writer half has already exited, or if
    /// inflation fails.
    pub fn push_inbound(&self, data: Vec<u8>) -> Result<()> {
        let data = match &self.decompressor {
            Some(decompressor) => {
                let mut decompressor = decompressor.lock().unwrap();
                sync_flush_decompress(&mut decompressor, &data)?
            }
            None => data,
        };
        self.inbound
            .send(data)
            .map_err(|_| crate::error::VncError::ChannelStopped(self.id))
    }
}

async fn reader_loop(
    id: ChannelId,
    speed: Speed,
    mut reader: Box<dyn AsyncRead + Unpin + Send>,
    sink: Arc<dyn LtsmSink>,
    running: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<ConnectorEvent>,
    compressor: Option<Arc<StdMutex<Compress>>>,
) {
    let mut buf = vec![0u8; speed.block_size()];
    while running.load(Ordering::Acquire) {
        match reader.read(&mut buf).await {
            Ok(0) => {
                let _ = events.send(ConnectorEvent::Eof(id));
                break;
            }
            Ok(n) => {
                let outcome = match &compressor {
                    Some(compressor) => {
                        let mut compressor = compressor.lock().unwrap();
                        sync_flush_compress(&mut compressor, &buf[..n])
                    }
                    None => Ok(buf[..n].to_vec()),
                };
                let payload = match outcome {
                    Ok(payload) => payload,
                    Err(e) => {
                        let _ = events.send(ConnectorEvent::Error(id, e.to_string()));
                        break;
                    }
                };
                if let Err(e) = sink.send_ltsm_event(id, &payload).await {
                    let _ = events.send(ConnectorEvent::Error(id, e.to_string()));
                    break;
                }
            }
            Err(e) => {
                let _ = events.send(ConnectorEvent::Error(id, e.to_string()));
                break;
            }
        }
    }
}

async fn writer_loop(
    id: ChannelId,
    speed: Speed,
    mut writer: Box<dyn AsyncWrite + Unpin + Send>,
    mut inbound: mpsc::UnboundedReceiver<Vec<u8>>,
    running: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<ConnectorEvent>,
) {
    let mut delay = speed.poll_delay();
    let min_delay = std::time::Duration::from_millis(10);
    while running.load(Ordering::Acquire) {
        if inbound.len() > 10 {
            delay = delay.saturating_sub(std::time::Duration::from_millis(10)).max(min_delay);
        }
        match tokio::time::timeout(delay, inbound.recv()).await {
            Ok(Some(data)) => {
                if let Err(e) = writer.write_all(&data).await {
                    let _ = events.send(ConnectorEvent::Error(id, e.to_string()));
                    break;
                }
            }
            Ok(None) => break,
            Err(_elapsed) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    struct RecordingSink {
        sent: Arc<StdMutex<Vec<(ChannelId, Vec<u8>)>>>,
    }

    #[async_trait]
    impl LtsmSink for RecordingSink {
        async fn send_ltsm_event(&self, channel: ChannelId, payload: &[u8]) -> Result<()> {
            self.sent.lock().unwrap().push((channel, payload.to_vec()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn reader_forwards_bytes_to_sink_and_reports_eof() {
        let (mut local, remote) = duplex(64);
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::new(RecordingSink { sent: Arc::clone(&sent) });
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();

        let connector = Connector::spawn(3, ChannelMode::ReadOnly, Speed::Fast, false, Some(Box::new(remote)), None, sink, events_tx);

        local.write_all(b"hello").await.unwrap();
        drop(local);

        let event = events_rx.recv().await.unwrap();
        assert!(matches!(event, ConnectorEvent::Eof(3)));
        assert_eq!(sent.lock().unwrap().as_slice(), &[(3u8, b"hello".to_vec())]);
        assert_eq!(connector.channel(), 3);
    }

    #[tokio::test]
    async fn writer_drains_inbound_queue_to_local_fd() {
        let (local, mut remote) = duplex(64);
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::new(RecordingSink { sent });
        let (events_tx, _events_rx) = mpsc::unbounded_channel();

        let connector = Connector::spawn(9, ChannelMode::WriteOnly, Speed::UltraFast, false, None, Some(Box::new(local)), sink, events_tx);
        connector.push_inbound(b"world".to_vec()).unwrap();

        let mut out = [0u8; 5];
        remote.read_exact(&mut out).await.unwrap();
        assert_eq!(&out, b"world");
    }

    #[tokio::test]
    async fn zlib_channel_compresses_outbound_and_decompresses_inbound() {
        let (mut local, remote) = duplex(1024);
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::new(RecordingSink { sent: Arc::clone(&sent) });
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();

        let connector = Connector::spawn(5, ChannelMode::ReadWrite, Speed::Fast, true, Some(Box::new(remote)), None, sink, events_tx);

        let payload = b"the quick brown fox jumps over the lazy dog".repeat(4);
        local.write_all(&payload).await.unwrap();
        drop(local);

        let _ = events_rx.recv().await;
        let sent = sent.lock().unwrap();
        let (_, compressed) = &sent[0];
        assert_ne!(compressed, &payload, "zlib channel must not forward raw bytes");

        let mut decompressor = Decompress::new(true);
        let decompressed = sync_flush_decompress(&mut decompressor, compressed).unwrap();
        assert_eq!(decompressed, payload);

        // push_inbound must inflate against its own independent stream.
        let mut compressor = Compress::new(Compression::fast(), true);
        let reply = sync_flush_compress(&mut compressor, b"reply bytes").unwrap();
        connector.push_inbound(reply).unwrap();
    }
}
