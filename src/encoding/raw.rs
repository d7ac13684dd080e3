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

//! VNC Raw encoding implementation.
//!
//! The simplest encoding that sends pixel data directly without compression.
//! High bandwidth but universally supported.

use bytes::BytesMut;

use super::Encoding;
use crate::pixel::{write_pixel, Color, PixelFormat};
use crate::protocol::ENCODING_RAW;

/// Implements the VNC "Raw" encoding: every pixel is re-packed into the
/// negotiated client `PixelFormat` with no compression.
pub struct RawEncoding;

impl Encoding for RawEncoding {
    fn encode(&self, data: &[u8], _width: u16, _height: u16, format: &PixelFormat, _quality: u8, _compression: u8) -> (i32, BytesMut) {
        let mut buf = BytesMut::with_capacity(data.len() / 4 * (format.bits_per_pixel as usize / 8));
        for chunk in data.chunks_exact(4) {
            let color = Color { r: chunk[0], g: chunk[1], b: chunk[2] };
            write_pixel(&mut buf, format.pack(color), format);
        }
        (ENCODING_RAW, buf)
    }
}
