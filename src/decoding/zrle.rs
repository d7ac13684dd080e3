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

//! ZRLE decoding: inflate the rectangle's deflate block through a
//! persistent `flate2::Decompress` stream, then walk the same 64x64 tile
//! grid the encoder used, decoding each tile with `decoding::trle`'s
//! tile decoder.

use bytes::Buf;
use flate2::{Decompress, FlushDecompress};

use super::trle::decode_tile;
use crate::error::{Result, VncError};
use crate::framebuffer::Framebuffer;
use crate::pixel::PixelFormat;
use crate::region::Region;

const TILE_SIZE: u16 = 64;

/// Reads a `[len:u32][deflated]` block from `buf`, inflates the
/// concatenated TRLE tile stream through `decompressor`, and blits the
/// decoded tiles into `framebuffer` at `region`.
///
/// # Errors
///
/// Returns `Err` if `buf` is truncated, the deflate stream is malformed,
/// or a tile's subencoding is unrecognized.
pub fn decode_zrle_persistent(buf: &mut dyn Buf, region: Region, format: &PixelFormat, framebuffer: &Framebuffer, decompressor: &mut Decompress) -> Result<()> {
    if buf.remaining() < 4 {
        return Err(VncError::Protocol("truncated ZRLE length header".into()));
    }
    let len = buf.get_u32() as usize;
    if buf.remaining() < len {
        return Err(VncError::Protocol(format!("truncated ZRLE payload: need {len} bytes, have {}", buf.remaining())));
    }
    let mut compressed = vec![0u8; len];
    buf.copy_to_slice(&mut compressed);

    // Tile stream is never larger than raw CPIXEL data for the rectangle;
    // oversize generously since the exact inflated length isn't known
    // up front (mirrors the encoder side's own overhead-formula estimate).
    let cap = region.width as usize * region.height as usize * 4 + 4096;
    let mut inflated = vec![0u8; cap];
    let before_in = decompressor.total_in();
    let before_out = decompressor.total_out();
    decompressor
        .decompress(&compressed, &mut inflated, FlushDecompress::Sync)
        .map_err(|e| VncError::Protocol(format!("ZRLE: inflate error {e}")))?;
    let produced = (decompressor.total_out() - before_out) as usize;
    let consumed = (decompressor.total_in() - before_in) as usize;
    if consumed < compressed.len() {
        return Err(VncError::Protocol(format!("ZRLE: incomplete inflate, consumed {consumed}/{} bytes", compressed.len())));
    }
    inflated.truncate(produced);

    let mut cursor = &inflated[..];
    let mut y = region.y;
    while u32::from(y) < region.bottom() {
        let h = TILE_SIZE.min((region.bottom() - u32::from(y)) as u16);
        let mut x = region.x;
        while u32::from(x) < region.right() {
            let w = TILE_SIZE.min((region.right() - u32::from(x)) as u16);
            let pixels = decode_tile(&mut cursor, usize::from(w), usize::from(h), format)?;
            let tile = Region::new(x, y, w, h);
            for ((px, py), color) in tile.points().zip(pixels) {
                framebuffer.set_pixel(px, py, color);
            }
            x += TILE_SIZE;
        }
        y += TILE_SIZE;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::Color;
    use flate2::{Compress, Compression};

    #[test]
    fn decodes_what_zrle_encoded() {
        let fb = Framebuffer::new(96, 80);
        let region = Region::new(0, 0, 96, 80);
        fb.fill_color(region, Color { r: 8, g: 8, b: 8 });
        fb.fill_color(Region::new(10, 10, 20, 20), Color { r: 1, g: 250, b: 1 });
        let rgba = fb.extract_rgba(region);
        let format = PixelFormat::rgba32();

        let mut compressor = Compress::new(Compression::fast(), true);
        let encoded = crate::encoding::zrle::encode_zrle_persistent(&rgba, 96, 80, &format, &mut compressor).unwrap();

        let fb2 = Framebuffer::new(96, 80);
        let mut decompressor = Decompress::new(true);
        let mut cursor = &encoded[..];
        decode_zrle_persistent(&mut cursor, region, &format, &fb2, &mut decompressor).unwrap();
        assert_eq!(fb2.extract_rgba(region), rgba);
    }
}
