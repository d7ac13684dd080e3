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

//! ZRLE: the TRLE tile stream for a whole rectangle, concatenated and
//! wrapped in a persistent zlib context (RFC 6143 6.7.4 / ZRLE extension).

use bytes::{BufMut, BytesMut};
use flate2::{Compress, FlushCompress, Status};
use std::io;

use super::trle::{encode_tile, TILE_SIZE};
use crate::pixel::PixelFormat;

/// Encodes a `width x height` rectangle as a ZRLE stream: every internal
/// 64x64 tile's `encode_tile` output is concatenated, then compressed as
/// one `[len:u32][deflated]` block through the connection's persistent
/// compressor — the same `Compress` + `FlushCompress::Sync` pairing as
/// `encoding::zlib::encode_zlib_persistent`, just over tile bytes instead
/// of raw pixel bytes.
pub fn encode_zrle_persistent(
    data: &[u8],
    width: u16,
    height: u16,
    format: &PixelFormat,
    compressor: &mut Compress,
) -> io::Result<Vec<u8>> {
    let mut tiles_buf = BytesMut::new();
    let pitch = usize::from(width) * 4;

    let mut y = 0usize;
    while y < usize::from(height) {
        let th = TILE_SIZE.min(usize::from(height) - y);
        let mut x = 0usize;
        while x < usize::from(width) {
            let tw = TILE_SIZE.min(usize::from(width) - x);
            let mut tile_rgba = Vec::with_capacity(tw * th * 4);
            for row in 0..th {
                let off = (y + row) * pitch + x * 4;
                tile_rgba.extend_from_slice(&data[off..off + tw * 4]);
            }
            encode_tile(&mut tiles_buf, &tile_rgba, tw, th, format);
            x += TILE_SIZE;
        }
        y += TILE_SIZE;
    }

    let max_compressed_size = tiles_buf.len() + tiles_buf.len() / 1000 + 64;
    let mut compressed_output = vec![0u8; max_compressed_size];
    let previous_in = compressor.total_in();
    let previous_out = compressor.total_out();

    loop {
        let consumed_so_far = (compressor.total_in() - previous_in) as usize;
        let status = compressor
            .compress(&tiles_buf[consumed_so_far..], &mut compressed_output, FlushCompress::Sync)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("ZRLE: zlib error {e}")))?;
        let consumed_now = (compressor.total_in() - previous_in) as usize;
        match status {
            Status::StreamEnd => break,
            Status::Ok | Status::BufError => {
                if consumed_now >= tiles_buf.len() {
                    break;
                }
            }
        }
    }

    let compressed_len = (compressor.total_out() - previous_out) as usize;
    let mut result = BytesMut::with_capacity(4 + compressed_len);
    result.put_u32(compressed_len as u32);
    result.extend_from_slice(&compressed_output[..compressed_len]);
    Ok(result.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;

    #[test]
    fn encodes_a_single_solid_tile_rectangle() {
        let format = PixelFormat::rgba32();
        let mut compressor = Compress::new(Compression::fast(), true);
        let data = vec![1u8, 2, 3, 255].repeat(32 * 32);
        let out = encode_zrle_persistent(&data, 32, 32, &format, &mut compressor).unwrap();
        assert!(out.len() > 4);
        let len = u32::from_be_bytes([out[0], out[1], out[2], out[3]]) as usize;
        assert_eq!(len, out.len() - 4);
    }
}
