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

//! CoRRE decoding: the exact inverse of `encoding::corre::CorRreEncoding`.

use bytes::Buf;

use super::common::{read_pixel_color, require};
use super::Decoding;
use crate::error::Result;
use crate::framebuffer::Framebuffer;
use crate::pixel::PixelFormat;
use crate::region::Region;

/// Implements CoRRE decoding: same shape as RRE but subrect coordinates
/// are `u8` (the scheduler only ever produces `<= 255x255` CoRRE tiles).
pub struct CorRreDecoding;

impl Decoding for CorRreDecoding {
    fn decode(&self, buf: &mut dyn Buf, region: Region, format: &PixelFormat, framebuffer: &Framebuffer) -> Result<()> {
        require(buf, 4, "CoRRE subrect count")?;
        let n_subrects = buf.get_u32();
        let bg = read_pixel_color(buf, format)?;
        framebuffer.fill_color(region, bg);

        for _ in 0..n_subrects {
            let color = read_pixel_color(buf, format)?;
            require(buf, 4, "CoRRE subrect header")?;
            let x = u16::from(buf.get_u8());
            let y = u16::from(buf.get_u8());
            let w = u16::from(buf.get_u8());
            let h = u16::from(buf.get_u8());
            framebuffer.fill_color(Region::new(region.x + x, region.y + y, w, h), color);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{CorRreEncoding, Encoding};

    #[test]
    fn decodes_what_corre_encoded() {
        let fb = Framebuffer::new(64, 64);
        let region = Region::new(0, 0, 64, 64);
        fb.fill_color(region, crate::pixel::Color { r: 9, g: 9, b: 9 });
        fb.fill_color(Region::new(2, 2, 10, 10), crate::pixel::Color { r: 1, g: 250, b: 1 });
        let rgba = fb.extract_rgba(region);
        let format = PixelFormat::rgba32();
        let (actual_encoding, encoded) = CorRreEncoding.encode(&rgba, 64, 64, &format, 0, 0);

        let fb2 = Framebuffer::new(64, 64);
        let mut cursor = encoded.freeze();
        if actual_encoding == crate::protocol::ENCODING_CORRE {
            CorRreDecoding.decode(&mut cursor, region, &format, &fb2).unwrap();
        } else {
            super::RawDecoding.decode(&mut cursor, region, &format, &fb2).unwrap();
        }
        assert_eq!(fb2.extract_rgba(region), rgba);
    }
}
