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

//! Helpers shared by the stateless tile decoders.

use bytes::Buf;

use crate::error::{Result, VncError};
use crate::framebuffer::Framebuffer;
use crate::pixel::{read_pixel, Color, PixelFormat};
use crate::region::Region;

/// Fails with [`VncError::Protocol`] if fewer than `needed` bytes remain
/// in `buf`. Every decoder checks this before reading a field, since a
/// truncated rectangle body must not panic the connection task.
pub fn require(buf: &dyn Buf, needed: usize, what: &str) -> Result<()> {
    if buf.remaining() < needed {
        return Err(VncError::Protocol(format!("truncated {what}: need {needed} bytes, have {}", buf.remaining())));
    }
    Ok(())
}

/// Reads one pixel in `format` and unpacks it into a [`Color`], checking
/// remaining-byte length first.
pub fn read_pixel_color(buf: &mut dyn Buf, format: &PixelFormat) -> Result<Color> {
    require(buf, usize::from(format.bits_per_pixel / 8), "pixel")?;
    Ok(format.unpack(read_pixel(buf, format)))
}

/// Fills every pixel of `region` in `framebuffer` with `color`. Used by
/// Hextile's solid-tile subencoding and RRE/CoRRE's background fill.
pub fn fill_region(framebuffer: &Framebuffer, region: Region, color: Color) {
    framebuffer.fill_color(region, color);
}
