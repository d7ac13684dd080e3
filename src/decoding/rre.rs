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

//! RRE decoding: the exact inverse of `encoding::rre::RreEncoding`.

use bytes::Buf;

use super::common::{read_pixel_color, require};
use super::Decoding;
use crate::error::Result;
use crate::framebuffer::Framebuffer;
use crate::pixel::PixelFormat;
use crate::region::Region;

/// Implements RRE decoding: a background fill followed by `n` colored
/// subrectangles, each `[color][x:u16][y:u16][w:u16][h:u16]`.
pub struct RreDecoding;

impl Decoding for RreDecoding {
    fn decode(&self, buf: &mut dyn Buf, region: Region, format: &PixelFormat, framebuffer: &Framebuffer) -> Result<()> {
        require(buf, 4, "RRE subrect count")?;
        let n_subrects = buf.get_u32();
        let bg = read_pixel_color(buf, format)?;
        framebuffer.fill_color(region, bg);

        for _ in 0..n_subrects {
            let color = read_pixel_color(buf, format)?;
            require(buf, 8, "RRE subrect header")?;
            let x = buf.get_u16();
            let y = buf.get_u16();
            let w = buf.get_u16();
            let h = buf.get_u16();
            framebuffer.fill_color(Region::new(region.x + x, region.y + y, w, h), color);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{Encoding, RreEncoding};

    #[test]
    fn decodes_what_rre_encoded() {
        let fb = Framebuffer::new(32, 32);
        let region = Region::new(0, 0, 32, 32);
        fb.fill_color(region, crate::pixel::Color { r: 5, g: 5, b: 5 });
        fb.fill_color(Region::new(4, 4, 8, 8), crate::pixel::Color { r: 200, g: 0, b: 0 });
        let rgba = fb.extract_rgba(region);
        let format = PixelFormat::rgba32();
        let (actual_encoding, encoded) = RreEncoding.encode(&rgba, 32, 32, &format, 0, 0);

        let fb2 = Framebuffer::new(32, 32);
        let mut cursor = encoded.freeze();
        if actual_encoding == crate::protocol::ENCODING_RRE {
            RreDecoding.decode(&mut cursor, region, &format, &fb2).unwrap();
        } else {
            super::RawDecoding.decode(&mut cursor, region, &format, &fb2).unwrap();
        }
        assert_eq!(fb2.extract_rgba(region), rgba);
    }
}
