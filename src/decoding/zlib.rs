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

//! Zlib decoding: the exact inverse of `encoding::zlib::encode_zlib_persistent`.
//!
//! Like the encoder, this carries a persistent `flate2::Decompress` stream
//! across rectangles for the lifetime of a connection, so it's a free
//! function rather than a [`super::Decoding`] impl.

use bytes::Buf;
use flate2::{Decompress, FlushDecompress};

use crate::error::{Result, VncError};
use crate::framebuffer::Framebuffer;
use crate::pixel::{read_pixel, PixelFormat};
use crate::region::Region;

/// Reads a `[len:u32][deflated]` block from `buf`, inflates it through
/// `decompressor`, and blits the resulting pixels into `framebuffer` at
/// `region`.
///
/// # Errors
///
/// Returns `Err` if `buf` is truncated, the deflate stream is malformed,
/// or the inflated byte count doesn't cover `region`.
pub fn decode_zlib_persistent(buf: &mut dyn Buf, region: Region, format: &PixelFormat, framebuffer: &Framebuffer, decompressor: &mut Decompress) -> Result<()> {
    if buf.remaining() < 4 {
        return Err(VncError::Protocol("truncated Zlib length header".into()));
    }
    let len = buf.get_u32() as usize;
    if buf.remaining() < len {
        return Err(VncError::Protocol(format!("truncated Zlib payload: need {len} bytes, have {}", buf.remaining())));
    }
    let mut compressed = vec![0u8; len];
    buf.copy_to_slice(&mut compressed);

    let pixel_size = usize::from(format.bits_per_pixel / 8);
    let expected = region.width as usize * region.height as usize * pixel_size;
    let mut inflated = vec![0u8; expected];

    let before_in = decompressor.total_in();
    let before_out = decompressor.total_out();
    decompressor
        .decompress(&compressed, &mut inflated, FlushDecompress::Sync)
        .map_err(|e| VncError::Protocol(format!("Zlib: inflate error {e}")))?;
    let produced = (decompressor.total_out() - before_out) as usize;
    let consumed = (decompressor.total_in() - before_in) as usize;
    if consumed < compressed.len() || produced < expected {
        return Err(VncError::Protocol(format!("Zlib: incomplete inflate {produced}/{expected} bytes")));
    }

    let mut cursor = &inflated[..expected];
    for (px, py) in region.points() {
        let value = read_pixel(&mut cursor, format);
        framebuffer.set_pixel(px, py, format.unpack(value));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::Color;
    use flate2::{Compress, Compression};

    #[test]
    fn decodes_what_zlib_encoded() {
        let fb = Framebuffer::new(16, 16);
        let region = Region::new(0, 0, 16, 16);
        fb.fill_color(region, Color { r: 4, g: 5, b: 6 });
        let rgba = fb.extract_rgba(region);
        let format = PixelFormat::rgba32();

        let mut compressor = Compress::new(Compression::fast(), true);
        let encoded = crate::encoding::zlib::encode_zlib_persistent(&rgba, &format, &mut compressor).unwrap();

        let fb2 = Framebuffer::new(16, 16);
        let mut decompressor = Decompress::new(true);
        let mut cursor = &encoded[..];
        decode_zlib_persistent(&mut cursor, region, &format, &fb2, &mut decompressor).unwrap();
        assert_eq!(fb2.extract_rgba(region), rgba);
    }
}
