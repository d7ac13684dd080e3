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

//! ZlibHex decoding: inflate through a persistent `flate2::Decompress`
//! stream, then run the result through `decoding::hextile`'s tile decoder.

use bytes::Buf;
use flate2::{Decompress, FlushDecompress};

use super::hextile::HextileDecoding;
use super::Decoding;
use crate::error::{Result, VncError};
use crate::framebuffer::Framebuffer;
use crate::pixel::PixelFormat;
use crate::region::Region;

/// Reads a `[len:u32][deflated]` block from `buf`, inflates the Hextile
/// byte stream through `decompressor`, and decodes it into `framebuffer`
/// at `region` via [`HextileDecoding`].
///
/// # Errors
///
/// Returns `Err` if `buf` is truncated, the deflate stream is malformed,
/// or the inflated Hextile stream is itself malformed.
pub fn decode_zlibhex_persistent(buf: &mut dyn Buf, region: Region, format: &PixelFormat, framebuffer: &Framebuffer, decompressor: &mut Decompress) -> Result<()> {
    if buf.remaining() < 4 {
        return Err(VncError::Protocol("truncated ZlibHex length header".into()));
    }
    let len = buf.get_u32() as usize;
    if buf.remaining() < len {
        return Err(VncError::Protocol(format!("truncated ZlibHex payload: need {len} bytes, have {}", buf.remaining())));
    }
    let mut compressed = vec![0u8; len];
    buf.copy_to_slice(&mut compressed);

    // Hextile's worst case is raw tiles, bounded by the rectangle's full
    // pixel size plus per-tile subencoding overhead.
    let cap = region.width as usize * region.height as usize * 4 + 4096;
    let mut inflated = vec![0u8; cap];
    let before_in = decompressor.total_in();
    let before_out = decompressor.total_out();
    decompressor
        .decompress(&compressed, &mut inflated, FlushDecompress::Sync)
        .map_err(|e| VncError::Protocol(format!("ZlibHex: inflate error {e}")))?;
    let produced = (decompressor.total_out() - before_out) as usize;
    let consumed = (decompressor.total_in() - before_in) as usize;
    if consumed < compressed.len() {
        return Err(VncError::Protocol(format!("ZlibHex: incomplete inflate, consumed {consumed}/{} bytes", compressed.len())));
    }
    inflated.truncate(produced);

    let mut cursor = &inflated[..];
    HextileDecoding.decode(&mut cursor, region, format, framebuffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::Color;
    use flate2::{Compress, Compression};

    #[test]
    fn decodes_what_zlibhex_encoded() {
        let fb = Framebuffer::new(48, 48);
        let region = Region::new(0, 0, 48, 48);
        fb.fill_color(region, Color { r: 2, g: 2, b: 2 });
        fb.fill_color(Region::new(4, 4, 8, 8), Color { r: 250, g: 1, b: 1 });
        let rgba = fb.extract_rgba(region);
        let format = PixelFormat::rgba32();

        let mut compressor = Compress::new(Compression::fast(), true);
        let encoded = crate::encoding::zlibhex::encode_zlibhex_persistent(&rgba, 48, 48, &format, &mut compressor).unwrap();

        let fb2 = Framebuffer::new(48, 48);
        let mut decompressor = Decompress::new(true);
        let mut cursor = &encoded[..];
        decode_zlibhex_persistent(&mut cursor, region, &format, &fb2, &mut decompressor).unwrap();
        assert_eq!(fb2.extract_rgba(region), rgba);
    }
}
