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

//! TRLE decoding: the exact inverse of `encoding::trle`'s tile
//! subencodings. [`decode_tile`] is reused verbatim by `decoding::zrle`,
//! mirroring how `encoding::zrle` reuses `encoding::trle::encode_tile`.

use bytes::Buf;

use super::common::require;
use super::Decoding;
use crate::encoding::rle::read_run_length;
use crate::encoding::trle::packed_palette_bits;
use crate::error::{Result, VncError};
use crate::framebuffer::Framebuffer;
use crate::pixel::{read_cpixel, Color, PixelFormat};
use crate::region::Region;

const SUBENC_RAW: u8 = 0;
const SUBENC_SOLID: u8 = 1;
const SUBENC_PLAIN_RLE: u8 = 128;

/// Decodes one TRLE tile (`width * height <= 64*64` pixels) from `buf`,
/// returning its pixels row-major.
///
/// # Errors
///
/// Returns `Err` if `buf` is truncated or the subencoding byte is out of
/// the range `encoding::trle::encode_tile` ever produces.
pub(super) fn decode_tile(buf: &mut dyn Buf, width: usize, height: usize, format: &PixelFormat) -> Result<Vec<Color>> {
    require(buf, 1, "TRLE subencoding byte")?;
    let subencoding = buf.get_u8();
    let count = width * height;

    match subencoding {
        SUBENC_RAW => {
            let mut out = Vec::with_capacity(count);
            for _ in 0..count {
                require(buf, format.cpixel_size(), "TRLE raw pixel")?;
                out.push(format.unpack(read_cpixel(buf, format)));
            }
            Ok(out)
        }
        SUBENC_SOLID => {
            require(buf, format.cpixel_size(), "TRLE solid pixel")?;
            let color = format.unpack(read_cpixel(buf, format));
            Ok(vec![color; count])
        }
        SUBENC_PLAIN_RLE => {
            let mut out = Vec::with_capacity(count);
            while out.len() < count {
                require(buf, format.cpixel_size(), "TRLE plain-RLE pixel")?;
                let color = format.unpack(read_cpixel(buf, format));
                require(buf, 1, "TRLE plain-RLE run length")?;
                let run = read_run_length(buf) as usize;
                for _ in 0..run {
                    out.push(color);
                }
            }
            Ok(out)
        }
        2..=16 => {
            let palette_size = usize::from(subencoding);
            let mut palette = Vec::with_capacity(palette_size);
            for _ in 0..palette_size {
                require(buf, format.cpixel_size(), "TRLE packed palette entry")?;
                palette.push(format.unpack(read_cpixel(buf, format)));
            }
            let bits = packed_palette_bits(palette_size);
            let row_bytes = (width * bits as usize).div_ceil(8);
            let mut out = Vec::with_capacity(count);
            for _row in 0..height {
                require(buf, row_bytes, "TRLE packed palette row")?;
                let mut row_bits: Vec<u8> = Vec::with_capacity(row_bytes);
                for _ in 0..row_bytes {
                    row_bits.push(buf.get_u8());
                }
                for col in 0..width {
                    let bit_pos = col * bits as usize;
                    let byte = bit_pos / 8;
                    let shift = 8 - (bit_pos % 8) - bits as usize;
                    let idx = ((row_bits[byte] >> shift) & ((1 << bits) - 1)) as usize;
                    out.push(palette[idx.min(palette.len() - 1)]);
                }
            }
            Ok(out)
        }
        130..=255 => {
            let palette_size = usize::from(subencoding - 128);
            let mut palette = Vec::with_capacity(palette_size);
            for _ in 0..palette_size {
                require(buf, format.cpixel_size(), "TRLE palette-RLE entry")?;
                palette.push(format.unpack(read_cpixel(buf, format)));
            }
            let mut out = Vec::with_capacity(count);
            while out.len() < count {
                require(buf, 1, "TRLE palette-RLE index")?;
                let b = buf.get_u8();
                let idx = usize::from(b & 0x7F);
                if idx >= palette.len() {
                    return Err(VncError::Protocol(format!("TRLE palette-RLE index {idx} out of range")));
                }
                let run = if b & 0x80 != 0 { read_run_length(buf) as usize + 1 } else { 1 };
                for _ in 0..run {
                    out.push(palette[idx]);
                }
            }
            Ok(out)
        }
        other => Err(VncError::Protocol(format!("unrecognized TRLE subencoding {other}"))),
    }
}

/// Implements TRLE decoding: the rectangle is split into the same
/// 64x64-or-smaller tile grid the encoder used, each decoded with
/// [`decode_tile`] and blitted into the framebuffer.
pub struct TrleDecoding;

impl Decoding for TrleDecoding {
    fn decode(&self, buf: &mut dyn Buf, region: Region, format: &PixelFormat, framebuffer: &Framebuffer) -> Result<()> {
        const TILE_SIZE: u16 = 64;
        let mut y = region.y;
        while u32::from(y) < region.bottom() {
            let h = TILE_SIZE.min((region.bottom() - u32::from(y)) as u16);
            let mut x = region.x;
            while u32::from(x) < region.right() {
                let w = TILE_SIZE.min((region.right() - u32::from(x)) as u16);
                let pixels = decode_tile(buf, usize::from(w), usize::from(h), format)?;
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{Encoding, TrleEncoding};

    #[test]
    fn decodes_what_trle_encoded() {
        let fb = Framebuffer::new(64, 64);
        let region = Region::new(0, 0, 64, 64);
        fb.fill_color(region, Color { r: 7, g: 7, b: 7 });
        fb.fill_color(Region::new(0, 0, 20, 20), Color { r: 1, g: 2, b: 3 });
        let rgba = fb.extract_rgba(region);
        let format = PixelFormat::rgba32();
        let (_, encoded) = TrleEncoding.encode(&rgba, 64, 64, &format, 0, 0);

        let fb2 = Framebuffer::new(64, 64);
        let mut cursor = encoded.freeze();
        TrleDecoding.decode(&mut cursor, region, &format, &fb2).unwrap();
        assert_eq!(fb2.extract_rgba(region), rgba);
    }
}
