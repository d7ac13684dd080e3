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

//! Hextile decoding: the exact inverse of `encoding::hextile::HextileEncoding`.

use bytes::Buf;

use super::common::{read_pixel_color, require};
use super::Decoding;
use crate::error::Result;
use crate::framebuffer::Framebuffer;
use crate::pixel::{Color, PixelFormat};
use crate::protocol::{HEXTILE_ANY_SUBRECTS, HEXTILE_BACKGROUND_SPECIFIED, HEXTILE_FOREGROUND_SPECIFIED, HEXTILE_RAW, HEXTILE_SUBRECTS_COLOURED};
use crate::region::Region;

/// Implements Hextile decoding: 16x16 tiles, each raw, solid, or
/// subrect-based, with background/foreground color carried across tiles
/// within the same rectangle per RFC 6143 6.6.
pub struct HextileDecoding;

impl Decoding for HextileDecoding {
    fn decode(&self, buf: &mut dyn Buf, region: Region, format: &PixelFormat, framebuffer: &Framebuffer) -> Result<()> {
        let mut last_bg = Color { r: 0, g: 0, b: 0 };
        let mut last_fg = Color { r: 0, g: 0, b: 0 };

        let mut y = region.y;
        while u32::from(y) < region.bottom() {
            let tile_h = 16u16.min((region.bottom() - u32::from(y)) as u16);
            let mut x = region.x;
            while u32::from(x) < region.right() {
                let tile_w = 16u16.min((region.right() - u32::from(x)) as u16);
                let tile = Region::new(x, y, tile_w, tile_h);

                require(buf, 1, "Hextile subencoding byte")?;
                let subencoding = buf.get_u8();

                if subencoding & HEXTILE_RAW != 0 {
                    let bpp = usize::from(format.bits_per_pixel / 8);
                    require(buf, usize::from(tile_w) * usize::from(tile_h) * bpp, "Hextile raw tile")?;
                    for (px, py) in tile.points() {
                        let color = read_pixel_color(buf, format)?;
                        framebuffer.set_pixel(px, py, color);
                    }
                } else {
                    if subencoding & HEXTILE_BACKGROUND_SPECIFIED != 0 {
                        last_bg = read_pixel_color(buf, format)?;
                    }
                    framebuffer.fill_color(tile, last_bg);

                    if subencoding & HEXTILE_ANY_SUBRECTS != 0 {
                        if subencoding & HEXTILE_FOREGROUND_SPECIFIED != 0 {
                            last_fg = read_pixel_color(buf, format)?;
                        }
                        require(buf, 1, "Hextile subrect count")?;
                        let count = buf.get_u8();
                        let coloured = subencoding & HEXTILE_SUBRECTS_COLOURED != 0;
                        for _ in 0..count {
                            let color = if coloured { read_pixel_color(buf, format)? } else { last_fg };
                            require(buf, 2, "Hextile subrect geometry")?;
                            let xy = buf.get_u8();
                            let wh = buf.get_u8();
                            let sx = xy >> 4;
                            let sy = xy & 0x0F;
                            let sw = (wh >> 4) + 1;
                            let sh = (wh & 0x0F) + 1;
                            framebuffer.fill_color(Region::new(x + u16::from(sx), y + u16::from(sy), u16::from(sw), u16::from(sh)), color);
                        }
                    }
                }

                x += 16;
            }
            y += 16;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{Encoding, HextileEncoding};

    #[test]
    fn decodes_what_hextile_encoded() {
        let fb = Framebuffer::new(32, 32);
        let region = Region::new(0, 0, 32, 32);
        fb.fill_color(region, Color { r: 3, g: 3, b: 3 });
        fb.fill_color(Region::new(0, 0, 5, 5), Color { r: 250, g: 0, b: 0 });
        let rgba = fb.extract_rgba(region);
        let format = PixelFormat::rgba32();
        let (_, encoded) = HextileEncoding.encode(&rgba, 32, 32, &format, 0, 0);

        let fb2 = Framebuffer::new(32, 32);
        let mut cursor = encoded.freeze();
        HextileDecoding.decode(&mut cursor, region, &format, &fb2).unwrap();
        assert_eq!(fb2.extract_rgba(region), rgba);
    }
}
