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

//! Parallel tile dispatcher: splits a dirty region into the tile grid the
//! chosen encoding wants, runs each tile's [`Encoding::encode`] on the
//! blocking thread pool, and hands the caller back ordered, ready-to-send
//! rectangle bodies.
//!
//! Only the stateless encodings (Raw, RRE, CoRRE, Hextile, TRLE) go
//! through this path — Zlib, ZlibHex, and ZRLE carry a persistent
//! `flate2::Compress` stream that cannot be shared across concurrent
//! tasks, so callers drive those directly, one rectangle at a time,
//! through `encode_zlib_persistent`/`encode_zlibhex_persistent`/
//! `encode_zrle_persistent`.

use std::num::NonZeroUsize;
use std::sync::Arc;

use bytes::{BufMut, BytesMut};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;

use super::{get_encoder, tile_size};
use crate::error::{Result, VncError};
use crate::framebuffer::Framebuffer;
use crate::pixel::PixelFormat;
use crate::protocol::{Rectangle, SERVER_MSG_FRAMEBUFFER_UPDATE};
use crate::region::Region;
use crate::transport::Transport;

/// Number of concurrent tile-encoding workers: the host's hardware
/// concurrency, or 2 if that cannot be determined.
#[must_use]
pub fn worker_count() -> usize {
    std::thread::available_parallelism().map(NonZeroUsize::get).unwrap_or(2)
}

/// One encoded rectangle, ready to be written to the wire as a
/// `Rectangle` header followed by `body`.
#[derive(Debug)]
pub struct EncodedRectangle {
    /// Position, size, and encoding number of this rectangle.
    pub header: Rectangle,
    /// The encoder's output for this rectangle's body.
    pub body: Vec<u8>,
}

/// Splits `region` per `encoding_type`'s tile size, encodes every tile
/// concurrently (bounded by [`worker_count`]), and returns the encoded
/// rectangles in row-major tile order.
///
/// # Errors
///
/// Returns `Err` if `encoding_type` is not one of the stateless encodings
/// `get_encoder` recognizes.
pub async fn encode_region(
    framebuffer: Arc<Framebuffer>,
    region: Region,
    encoding_type: i32,
    format: PixelFormat,
    quality: u8,
    compression: u8,
) -> Result<Vec<EncodedRectangle>> {
    if get_encoder(encoding_type).is_none() {
        return Err(VncError::Encoding(format!("encoding {encoding_type} has no stateless tile encoder")));
    }

    let tiles = match tile_size(encoding_type) {
        Some(size) => region.divide_blocks(size),
        None => {
            if region.is_empty() {
                Vec::new()
            } else {
                vec![region]
            }
        }
    };
    if tiles.is_empty() {
        return Ok(Vec::new());
    }

    let semaphore = Arc::new(Semaphore::new(worker_count()));
    let mut set = JoinSet::new();
    for (index, tile) in tiles.iter().copied().enumerate() {
        let framebuffer = Arc::clone(&framebuffer);
        let format = format.clone();
        let semaphore = Arc::clone(&semaphore);
        set.spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("scheduler semaphore never closes");
            let rgba = framebuffer.extract_rgba(tile);
            let (actual_encoding, body) = tokio::task::spawn_blocking(move || {
                let encoder = get_encoder(encoding_type).expect("checked above");
                let (actual_encoding, buf) = encoder.encode(&rgba, tile.width, tile.height, &format, quality, compression);
                (actual_encoding, buf.to_vec())
            })
            .await
            .expect("tile encoder task panicked");
            (
                index,
                EncodedRectangle {
                    header: Rectangle { x: tile.x, y: tile.y, width: tile.width, height: tile.height, encoding: actual_encoding },
                    body,
                },
            )
        });
    }

    let mut results: Vec<Option<EncodedRectangle>> = (0..tiles.len()).map(|_| None).collect();
    while let Some(joined) = set.join_next().await {
        let (index, rect) = joined.expect("tile encoder task panicked");
        results[index] = Some(rect);
    }

    Ok(results.into_iter().map(|r| r.expect("every tile index was dispatched exactly once")).collect())
}

/// Serializes ordering of writes to a connection's transport. Shared
/// between the scheduler's rectangle writer and the LTSM channel
/// multiplexer's frame writer so their bytes never interleave on the
/// wire.
pub type SendLock = Arc<Mutex<()>>;

/// Builds a fresh, unlocked send lock for a new connection.
#[must_use]
pub fn new_send_lock() -> SendLock {
    Arc::new(Mutex::new(()))
}

/// Writes a complete `FramebufferUpdate` message (message type, padding,
/// rectangle count, then each rectangle's header and body) to `transport`,
/// holding `send_lock` for the duration so no other writer interleaves.
///
/// # Errors
///
/// Returns `Err` if the underlying transport write fails.
pub async fn send_framebuffer_update(transport: &mut dyn Transport, send_lock: &SendLock, rectangles: &[EncodedRectangle]) -> Result<()> {
    let _guard = send_lock.lock().await;

    let mut header = BytesMut::with_capacity(4);
    header.put_u8(SERVER_MSG_FRAMEBUFFER_UPDATE);
    header.put_u8(0); // padding
    header.put_u16(u16::try_from(rectangles.len()).unwrap_or(u16::MAX));
    transport.send(&header).await?;

    for rect in rectangles {
        let mut rect_header = BytesMut::with_capacity(12);
        rect.header.write_header(&mut rect_header);
        transport.send(&rect_header).await?;
        if !rect.body.is_empty() {
            transport.send(&rect.body).await?;
        }
    }

    transport.send_flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ENCODING_RAW;

    #[tokio::test]
    async fn encodes_every_tile_in_a_dirty_region() {
        let fb = Arc::new(Framebuffer::new(32, 32));
        fb.fill_color(Region::new(0, 0, 32, 32), crate::pixel::Color { r: 9, g: 9, b: 9 });
        let rects = encode_region(fb, Region::new(0, 0, 32, 32), ENCODING_RAW, PixelFormat::rgba32(), 0, 0)
            .await
            .unwrap();
        // Raw has no fixed tile size: the whole region is one rectangle.
        assert_eq!(rects.len(), 1);
        assert_eq!(rects[0].header.width, 32);
        assert_eq!(rects[0].header.height, 32);
    }

    #[tokio::test]
    async fn unknown_encoding_is_rejected() {
        let fb = Arc::new(Framebuffer::new(8, 8));
        let err = encode_region(fb, Region::new(0, 0, 8, 8), -1, PixelFormat::rgba32(), 0, 0).await;
        assert!(err.is_err());
    }
}
