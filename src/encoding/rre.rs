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

//! VNC RRE (Rise-and-Run-length Encoding) implementation.
//!
//! RRE encodes a rectangle as a background color plus a list of subrectangles
//! with their own colors. Effective for large solid regions.

use bytes::{BufMut, BytesMut};

use super::common::{find_subrects, get_background_color, rgba_to_rgb24_pixels};
use super::raw::RawEncoding;
use super::Encoding;
use crate::pixel::{write_pixel, Color, PixelFormat};
use crate::protocol::ENCODING_RRE;

/// Implements the VNC "RRE" (Rise-and-Run-length Encoding).
///
/// Format: `[nSubrects:u32][bgColor][subrect1]...[subrectN]`, each subrect
/// `[color][x:u16][y:u16][w:u16][h:u16]`. Falls back to Raw when the raw
/// encoding of the tile would be smaller — required so RRE never inflates
/// a busy tile instead of just sending it flat.
pub struct RreEncoding;

impl Encoding for RreEncoding {
    fn encode(&self, data: &[u8], width: u16, height: u16, format: &PixelFormat, quality: u8, compression: u8) -> (i32, BytesMut) {
        let pixels = rgba_to_rgb24_pixels(data);
        let bg_color = get_background_color(&pixels);
        let subrects = find_subrects(&pixels, usize::from(width), usize::from(height), bg_color);

        let bpp = usize::from(format.bits_per_pixel) / 8;
        let encoded_size = 4 + bpp + subrects.len() * (bpp + 8);
        let raw_size = usize::from(width) * usize::from(height) * bpp;
        if raw_size < encoded_size {
            return RawEncoding.encode(data, width, height, format, quality, compression);
        }

        let mut buf = BytesMut::with_capacity(encoded_size);
        buf.put_u32(subrects.len() as u32);
        write_pixel(&mut buf, format.pack(Color::from_packed24(bg_color)), format);
        for subrect in subrects {
            write_pixel(&mut buf, format.pack(Color::from_packed24(subrect.color)), format);
            buf.put_u16(subrect.x);
            buf.put_u16(subrect.y);
            buf.put_u16(subrect.w);
            buf.put_u16(subrect.h);
        }
        (ENCODING_RRE, buf)
    }
}
