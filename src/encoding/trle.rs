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

//! TRLE: Tiled Run-Length Encoding, 64x64 tiles, no outer compression.
//!
//! ZRLE reuses `encode_tile` verbatim and wraps the concatenated tile
//! stream in a persistent zlib context (see `zrle.rs`); TRLE sends the
//! same byte stream unwrapped.

use bytes::{BufMut, BytesMut};
use std::collections::HashMap;

use super::rle::write_run_length;
use super::Encoding;
use crate::pixel::{write_cpixel, Color, PixelFormat};
use crate::protocol::ENCODING_TRLE;

pub(super) const TILE_SIZE: usize = 64;

fn rgba_to_rgb24_pixels(data: &[u8]) -> Vec<u32> {
    data.chunks_exact(4)
        .map(|c| Color { r: c[0], g: c[1], b: c[2] }.to_packed24())
        .collect()
}

/// Subencoding byte values per spec §4.C.
const SUBENC_RAW: u8 = 0;
const SUBENC_SOLID: u8 = 1;
const SUBENC_PLAIN_RLE: u8 = 128;
const SUBENC_PACKED_PALETTE_MAX: u8 = 16;

/// Bit width of a packed-palette field for a palette of size `k`
/// (`k` in `2..=16`), per spec's `ceil(log2(k))` rounded to `{1,2,4}`.
pub(crate) fn packed_palette_bits(k: usize) -> u32 {
    match k {
        0 | 1 => 0,
        2 => 1,
        3 | 4 => 2,
        _ => 4,
    }
}

/// Encodes a single tile (up to 64x64) into its TRLE subencoding form.
/// `data` is tightly packed RGBA for exactly `width * height` pixels.
pub(super) fn encode_tile(buf: &mut BytesMut, data: &[u8], width: usize, height: usize, format: &PixelFormat) {
    let pixels = rgba_to_rgb24_pixels(data);
    let cpixel_size = format.cpixel_size();

    let mut counts: HashMap<u32, usize> = HashMap::new();
    for &p in &pixels {
        *counts.entry(p).or_insert(0) += 1;
    }

    if counts.len() == 1 {
        buf.put_u8(SUBENC_SOLID);
        write_cpixel(buf, format.pack(Color::from_packed24(pixels[0])), format);
        return;
    }

    // Row-major runs (may span row boundaries per spec's plain-RLE scan).
    let mut runs: Vec<(u32, u32)> = Vec::new();
    let mut iter = pixels.iter();
    let mut cur = *iter.next().unwrap();
    let mut run_len: u32 = 1;
    for &p in iter {
        if p == cur {
            run_len += 1;
        } else {
            runs.push((cur, run_len));
            cur = p;
            run_len = 1;
        }
    }
    runs.push((cur, run_len));

    let mut palette: Vec<u32> = counts.keys().copied().collect();
    palette.sort_by_key(|c| std::cmp::Reverse(counts[c]));

    // Palettes of 2-16 colors always use packed palette, no size
    // comparison — only a palette too large for packed encoding
    // (`> 16`) falls back to computing and comparing raw/plain-RLE/
    // palette-RLE candidates, matching `sendEncodingTRLESubRegion`'s
    // three-way split.
    if (2..=usize::from(SUBENC_PACKED_PALETTE_MAX)).contains(&palette.len()) {
        encode_packed_palette(buf, &pixels, &palette, width, height, format);
        return;
    }

    let raw_size = 1 + pixels.len() * cpixel_size;
    let plain_rle_size: usize = 1 + runs.iter().map(|(_, len)| cpixel_size + rle_bytes(*len)).sum::<usize>();

    let use_palette = palette.len() <= 127;
    let palette_rle_size: usize = if use_palette {
        let idx: HashMap<u32, usize> = palette.iter().enumerate().map(|(i, &c)| (c, i)).collect();
        let body: usize = runs
            .iter()
            .map(|(pixel, len)| {
                let i = idx[pixel];
                if *len == 1 {
                    1
                } else {
                    1 + rle_bytes(*len - 1)
                }
            })
            .sum();
        1 + palette.len() * cpixel_size + body
    } else {
        usize::MAX
    };

    let candidates = [(raw_size, 0u8), (plain_rle_size, 1u8), (palette_rle_size, 2u8)];
    let (_, choice) = candidates.iter().min_by_key(|(size, _)| *size).unwrap();

    match choice {
        2 => encode_palette_rle(buf, &runs, &palette, format),
        1 => encode_plain_rle(buf, &runs, format),
        _ => encode_raw(buf, &pixels, format),
    }
}

fn rle_bytes(length: u32) -> usize {
    let mut remaining = length.saturating_sub(1);
    let mut n = 1;
    while remaining >= 255 {
        n += 1;
        remaining -= 255;
    }
    n
}

fn encode_raw(buf: &mut BytesMut, pixels: &[u32], format: &PixelFormat) {
    buf.put_u8(SUBENC_RAW);
    for &p in pixels {
        write_cpixel(buf, format.pack(Color::from_packed24(p)), format);
    }
}

fn encode_plain_rle(buf: &mut BytesMut, runs: &[(u32, u32)], format: &PixelFormat) {
    buf.put_u8(SUBENC_PLAIN_RLE);
    for &(pixel, len) in runs {
        write_cpixel(buf, format.pack(Color::from_packed24(pixel)), format);
        write_run_length(buf, len);
    }
}

fn encode_palette_rle(buf: &mut BytesMut, runs: &[(u32, u32)], palette: &[u32], format: &PixelFormat) {
    let idx: HashMap<u32, usize> = palette.iter().enumerate().map(|(i, &c)| (c, i)).collect();
    buf.put_u8(128 + palette.len() as u8);
    for &pixel in palette {
        write_cpixel(buf, format.pack(Color::from_packed24(pixel)), format);
    }
    for &(pixel, len) in runs {
        let i = idx[&pixel] as u8;
        if len == 1 {
            buf.put_u8(i);
        } else {
            buf.put_u8(i | 0x80);
            write_run_length(buf, len - 1);
        }
    }
}

fn encode_packed_palette(buf: &mut BytesMut, pixels: &[u32], palette: &[u32], width: usize, height: usize, format: &PixelFormat) {
    let idx: HashMap<u32, u8> = palette.iter().enumerate().map(|(i, &c)| (c, i as u8)).collect();
    buf.put_u8(palette.len() as u8);
    for &pixel in palette {
        write_cpixel(buf, format.pack(Color::from_packed24(pixel)), format);
    }
    let bits = packed_palette_bits(palette.len());
    let row_bytes = (width * bits as usize + 7) / 8;
    for row in 0..height {
        let mut packed = vec![0u8; row_bytes];
        for col in 0..width {
            let pixel_idx = idx[&pixels[row * width + col]];
            let bit_pos = col * bits as usize;
            let byte = bit_pos / 8;
            let shift = 8 - (bit_pos % 8) - bits as usize;
            packed[byte] |= pixel_idx << shift;
        }
        buf.extend_from_slice(&packed);
    }
}

/// TRLE encoder. The scheduler hands this exactly one tile (≤64x64) per
/// call; larger rectangles are split by `Region::divide_blocks(64)`
/// before dispatch.
pub struct TrleEncoding;

impl Encoding for TrleEncoding {
    fn encode(&self, data: &[u8], width: u16, height: u16, format: &PixelFormat, _quality: u8, _compression: u8) -> (i32, BytesMut) {
        debug_assert!(usize::from(width) <= TILE_SIZE && usize::from(height) <= TILE_SIZE);
        let mut buf = BytesMut::new();
        encode_tile(&mut buf, data, usize::from(width), usize::from(height), format);
        (ENCODING_TRLE, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::PixelFormat;

    fn solid_rgba(w: usize, h: usize, r: u8, g: u8, b: u8) -> Vec<u8> {
        let mut v = Vec::with_capacity(w * h * 4);
        for _ in 0..(w * h) {
            v.extend_from_slice(&[r, g, b, 255]);
        }
        v
    }

    #[test]
    fn solid_tile_uses_solid_subencoding() {
        let format = PixelFormat::rgba32();
        let data = solid_rgba(64, 64, 0, 255, 0);
        let mut buf = BytesMut::new();
        encode_tile(&mut buf, &data, 64, 64, &format);
        assert_eq!(buf[0], SUBENC_SOLID);
        assert_eq!(&buf[1..4], &[0, 255, 0]);
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn small_palette_always_uses_packed_palette_even_when_smaller_candidates_exist() {
        // 3 colors with one long run each: plain-RLE would be smaller
        // than packed palette here, but palettes of 2-16 colors must
        // always choose packed palette regardless of size.
        let format = PixelFormat::rgba32();
        let mut data = Vec::new();
        data.extend(solid_rgba(64, 21, 255, 0, 0));
        data.extend(solid_rgba(64, 21, 0, 255, 0));
        data.extend(solid_rgba(64, 22, 0, 0, 255));
        let mut buf = BytesMut::new();
        encode_tile(&mut buf, &data, 64, 64, &format);
        assert_eq!(buf[0], 3, "palette-size byte implies packed-palette subencoding (2..=16)");
    }

    #[test]
    fn packed_palette_bit_widths_match_table() {
        assert_eq!(packed_palette_bits(2), 1);
        assert_eq!(packed_palette_bits(3), 2);
        assert_eq!(packed_palette_bits(4), 2);
        assert_eq!(packed_palette_bits(5), 4);
        assert_eq!(packed_palette_bits(16), 4);
    }
}
