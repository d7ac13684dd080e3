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

//! VNC CoRRE (Compact RRE) encoding implementation.
//!
//! CoRRE is like RRE but uses compact subrectangles with u8 coordinates.
//! The scheduler only ever hands this encoder 64x64 tiles (spec's fixed
//! CoRRE tile size), so u8 subrect coordinates always fit.

use bytes::{BufMut, BytesMut};

use super::common::{find_subrects, get_background_color, rgba_to_rgb24_pixels};
use super::raw::RawEncoding;
use super::Encoding;
use crate::pixel::{write_pixel, Color, PixelFormat};
use crate::protocol::ENCODING_CORRE;

/// Implements the VNC "CoRRE" (Compact RRE) encoding.
///
/// Format: `[nSubrects:u32][bgColor][subrect1]...[subrectN]`, each subrect
/// `[color][x:u8][y:u8][w:u8][h:u8]`. Falls back to true Raw (not a lossy
/// bg-only stub) whenever Raw would be smaller.
pub struct CorRreEncoding;

impl Encoding for CorRreEncoding {
    fn encode(&self, data: &[u8], width: u16, height: u16, format: &PixelFormat, quality: u8, compression: u8) -> (i32, BytesMut) {
        debug_assert!(width <= 255 && height <= 255, "CoRRE requires the scheduler's 64x64 tiling");

        let pixels = rgba_to_rgb24_pixels(data);
        let bg_color = get_background_color(&pixels);
        let subrects = find_subrects(&pixels, usize::from(width), usize::from(height), bg_color);

        let bpp = usize::from(format.bits_per_pixel) / 8;
        let encoded_size = 4 + bpp + subrects.len() * (bpp + 4);
        let raw_size = usize::from(width) * usize::from(height) * bpp;
        if raw_size < encoded_size {
            return RawEncoding.encode(data, width, height, format, quality, compression);
        }

        let mut buf = BytesMut::with_capacity(encoded_size);
        buf.put_u32(subrects.len() as u32);
        write_pixel(&mut buf, format.pack(Color::from_packed24(bg_color)), format);
        for subrect in subrects {
            write_pixel(&mut buf, format.pack(Color::from_packed24(subrect.color)), format);
            buf.put_u8(subrect.x as u8);
            buf.put_u8(subrect.y as u8);
            buf.put_u8(subrect.w as u8);
            buf.put_u8(subrect.h as u8);
        }
        (ENCODING_CORRE, buf)
    }
}
