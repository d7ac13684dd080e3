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

//! Raw decoding: the exact inverse of `encoding::raw::RawEncoding`.

use bytes::Buf;

use super::common::{read_pixel_color, require};
use super::Decoding;
use crate::error::Result;
use crate::framebuffer::Framebuffer;
use crate::pixel::PixelFormat;
use crate::region::Region;

/// Implements Raw decoding: every pixel in `region`, row-major, in
/// `format`.
pub struct RawDecoding;

impl Decoding for RawDecoding {
    fn decode(&self, buf: &mut dyn Buf, region: Region, format: &PixelFormat, framebuffer: &Framebuffer) -> Result<()> {
        let bpp = usize::from(format.bits_per_pixel / 8);
        require(buf, usize::from(region.width) * usize::from(region.height) * bpp, "Raw rectangle")?;
        for (x, y) in region.points() {
            let color = read_pixel_color(buf, format)?;
            framebuffer.set_pixel(x, y, color);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{Encoding, RawEncoding};

    #[test]
    fn decodes_what_raw_encoded() {
        let fb = Framebuffer::new(4, 4);
        let region = Region::new(0, 0, 4, 4);
        fb.fill_color(region, crate::pixel::Color { r: 1, g: 2, b: 3 });
        let rgba = fb.extract_rgba(region);
        let format = PixelFormat::rgba32();
        let (_, encoded) = RawEncoding.encode(&rgba, 4, 4, &format, 0, 0);

        let fb2 = Framebuffer::new(4, 4);
        let mut cursor = encoded.freeze();
        RawDecoding.decode(&mut cursor, region, &format, &fb2).unwrap();
        assert_eq!(fb2.extract_rgba(region), rgba);
    }
}
