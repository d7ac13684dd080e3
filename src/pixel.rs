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

//! Pixel format and colour value types shared by the encoding, decoding,
//! and protocol layers.
//!
//! This generalizes the teacher's `protocol::PixelFormat` (fixed at
//! RGBA32-on-the-wire) into the component-wise rescale model the RFB
//! protocol actually calls for, so a single `convert_from` entry point
//! serves both the bulk buffer path (Raw/Zlib) and the per-pixel path
//! (RRE/Hextile subrects, TRLE/ZRLE palette entries).

use bytes::{Buf, BufMut, BytesMut};
use std::io;

/// Represents the pixel format of a framebuffer, as negotiated over RFB.
///
/// Invariant: for each channel, `max << shift` fits within `bits_per_pixel`
/// and the three channel masks do not overlap. `is_valid` checks this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelFormat {
    /// Number of bits per pixel (8, 16, 24, or 32).
    pub bits_per_pixel: u8,
    /// Depth of the pixel in bits.
    pub depth: u8,
    /// Big-endian (1) or little-endian (0) pixel layout.
    pub big_endian_flag: u8,
    /// True-colour (1) or colour-mapped (0).
    pub true_colour_flag: u8,
    /// Maximum red component value.
    pub red_max: u16,
    /// Maximum green component value.
    pub green_max: u16,
    /// Maximum blue component value.
    pub blue_max: u16,
    /// Left shift to apply to get the red component.
    pub red_shift: u8,
    /// Left shift to apply to get the green component.
    pub green_shift: u8,
    /// Left shift to apply to get the blue component.
    pub blue_shift: u8,
}

impl PixelFormat {
    /// The server's native capture format: 32bpp RGBA, little-endian.
    #[must_use]
    pub fn rgba32() -> Self {
        Self {
            bits_per_pixel: 32,
            depth: 24,
            big_endian_flag: 0,
            true_colour_flag: 1,
            red_max: 255,
            green_max: 255,
            blue_max: 255,
            red_shift: 0,
            green_shift: 8,
            blue_shift: 16,
        }
    }

    /// 16-bit RGB565, a common fallback for bandwidth-constrained clients.
    #[must_use]
    pub fn rgb565() -> Self {
        Self {
            bits_per_pixel: 16,
            depth: 16,
            big_endian_flag: 0,
            true_colour_flag: 1,
            red_max: 31,
            green_max: 63,
            blue_max: 31,
            red_shift: 11,
            green_shift: 5,
            blue_shift: 0,
        }
    }

    /// 15-bit RGB555, used by some legacy clients that negotiate one bit
    /// less than RGB565 (the high bit of the 16-bit word is unused).
    #[must_use]
    pub fn rgb555() -> Self {
        Self {
            bits_per_pixel: 16,
            depth: 15,
            big_endian_flag: 0,
            true_colour_flag: 1,
            red_max: 31,
            green_max: 31,
            blue_max: 31,
            red_shift: 10,
            green_shift: 5,
            blue_shift: 0,
        }
    }

    /// 8-bit BGR233: 3 bits blue, 3 bits green, 2 bits red — the densest
    /// true-colour format RFB defines, used by very bandwidth-constrained
    /// clients.
    #[must_use]
    pub fn bgr233() -> Self {
        Self {
            bits_per_pixel: 8,
            depth: 8,
            big_endian_flag: 0,
            true_colour_flag: 1,
            red_max: 3,
            green_max: 7,
            blue_max: 7,
            red_shift: 6,
            green_shift: 3,
            blue_shift: 0,
        }
    }

    /// Returns true if this is bit-for-bit the server's native RGBA32 format.
    #[must_use]
    pub fn is_compatible_with_rgba32(&self) -> bool {
        *self == Self::rgba32()
    }

    /// Returns whether `(max << shift)` fits in `bits_per_pixel` for every
    /// channel and the channel masks are otherwise sane. Mirrors the
    /// teacher's `protocol::PixelFormat::is_valid`.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        if ![8u8, 16, 24, 32].contains(&self.bits_per_pixel) {
            return false;
        }
        if self.depth == 0 || self.depth > 32 {
            return false;
        }
        if self.true_colour_flag == 0 {
            return self.bits_per_pixel == 8;
        }

        let bits_for = |max: u16| -> u32 {
            if max == 0 { 0 } else { 16 - max.leading_zeros() }
        };

        let total = bits_for(self.red_max) + bits_for(self.green_max) + bits_for(self.blue_max);
        if total > u32::from(self.depth) {
            return false;
        }
        if self.red_shift >= 32 || self.green_shift >= 32 || self.blue_shift >= 32 {
            return false;
        }
        true
    }

    /// Packs a `Color` into this format's pixel value.
    #[must_use]
    pub fn pack(&self, color: Color) -> u32 {
        let r = downscale(color.r, self.red_max);
        let g = downscale(color.g, self.green_max);
        let b = downscale(color.b, self.blue_max);
        (u32::from(r) << self.red_shift) | (u32::from(g) << self.green_shift) | (u32::from(b) << self.blue_shift)
    }

    /// Unpacks a pixel value in this format back into a `Color`.
    #[must_use]
    pub fn unpack(&self, pixel: u32) -> Color {
        let r = (pixel >> self.red_shift) & u32::from(self.red_max);
        let g = (pixel >> self.green_shift) & u32::from(self.green_max);
        let b = (pixel >> self.blue_shift) & u32::from(self.blue_max);
        Color {
            r: upscale(r as u16, self.red_max),
            g: upscale(g as u16, self.green_max),
            b: upscale(b as u16, self.blue_max),
        }
    }

    /// Re-expresses `src_pixel` (encoded in `src_format`) as a pixel value
    /// in `self`'s format, rescaling each channel by the ratio of maxima.
    #[must_use]
    pub fn convert_from(&self, src_format: &PixelFormat, src_pixel: u32) -> u32 {
        if self == src_format {
            return src_pixel;
        }
        self.pack(src_format.unpack(src_pixel))
    }

    /// Writes the 16-byte wire form of this pixel format.
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.put_u8(self.bits_per_pixel);
        buf.put_u8(self.depth);
        buf.put_u8(self.big_endian_flag);
        buf.put_u8(self.true_colour_flag);
        buf.put_u16(self.red_max);
        buf.put_u16(self.green_max);
        buf.put_u16(self.blue_max);
        buf.put_u8(self.red_shift);
        buf.put_u8(self.green_shift);
        buf.put_u8(self.blue_shift);
        buf.put_bytes(0, 3);
    }

    /// Parses the 16-byte wire form of a pixel format.
    ///
    /// # Errors
    ///
    /// Returns `Err` if fewer than 16 bytes remain in `buf`.
    pub fn from_bytes(buf: &mut BytesMut) -> io::Result<Self> {
        if buf.len() < 16 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "not enough bytes for PixelFormat"));
        }
        let pf = Self {
            bits_per_pixel: buf.get_u8(),
            depth: buf.get_u8(),
            big_endian_flag: buf.get_u8(),
            true_colour_flag: buf.get_u8(),
            red_max: buf.get_u16(),
            green_max: buf.get_u16(),
            blue_max: buf.get_u16(),
            red_shift: buf.get_u8(),
            green_shift: buf.get_u8(),
            blue_shift: buf.get_u8(),
        };
        buf.advance(3);
        Ok(pf)
    }

    /// Number of bytes used by a CPIXEL under this format: 3 bytes when
    /// 32-bpp true-colour (the alpha/padding byte is dropped), else the
    /// full pixel width.
    #[must_use]
    pub fn cpixel_size(&self) -> usize {
        if self.bits_per_pixel == 32 && self.true_colour_flag != 0 {
            3
        } else {
            self.bits_per_pixel as usize / 8
        }
    }
}

/// Writes `value` to `buf` using `format`'s byte width and endianness.
/// Used by every encoder once it has converted a source pixel into the
/// negotiated client format via [`PixelFormat::pack`]/[`PixelFormat::convert_from`].
pub fn write_pixel(buf: &mut BytesMut, value: u32, format: &PixelFormat) {
    let bytes = value.to_be_bytes();
    let n = (format.bits_per_pixel / 8) as usize;
    let be = &bytes[4 - n..];
    if format.big_endian_flag != 0 {
        buf.put_slice(be);
    } else {
        buf.put_slice(&{
            let mut le: Vec<u8> = be.to_vec();
            le.reverse();
            le
        });
    }
}

/// Writes `value` as a CPIXEL: 3 bytes (R, G, B) when `format` is 32-bpp
/// true-colour, else the full `write_pixel` form. See the crate's
/// glossary entry for CPIXEL.
pub fn write_cpixel(buf: &mut BytesMut, value: u32, format: &PixelFormat) {
    if format.cpixel_size() == 3 {
        let r = ((value >> format.red_shift) & u32::from(format.red_max)) as u8;
        let g = ((value >> format.green_shift) & u32::from(format.green_max)) as u8;
        let b = ((value >> format.blue_shift) & u32::from(format.blue_max)) as u8;
        buf.put_u8(r);
        buf.put_u8(g);
        buf.put_u8(b);
    } else {
        write_pixel(buf, value, format);
    }
}

/// Reads one pixel value (`format.bits_per_pixel / 8` bytes, honoring
/// `format.big_endian_flag`) from `buf`. The inverse of [`write_pixel`].
pub fn read_pixel(buf: &mut impl Buf, format: &PixelFormat) -> u32 {
    let n = usize::from(format.bits_per_pixel / 8);
    let mut bytes = [0u8; 4];
    if format.big_endian_flag != 0 {
        buf.copy_to_slice(&mut bytes[4 - n..]);
        u32::from_be_bytes(bytes)
    } else {
        let mut tmp = vec![0u8; n];
        buf.copy_to_slice(&mut tmp);
        tmp.reverse();
        bytes[4 - n..].copy_from_slice(&tmp);
        u32::from_be_bytes(bytes)
    }
}

/// Reads one CPIXEL (3 bytes for 32-bpp true-colour, else the full pixel
/// width) from `buf`, returning it already packed in `format`'s layout so
/// it round-trips through [`PixelFormat::unpack`]. The inverse of
/// [`write_cpixel`].
pub fn read_cpixel(buf: &mut impl Buf, format: &PixelFormat) -> u32 {
    if format.cpixel_size() == 3 {
        let r = u32::from(buf.get_u8());
        let g = u32::from(buf.get_u8());
        let b = u32::from(buf.get_u8());
        (r << format.red_shift) | (g << format.green_shift) | (b << format.blue_shift)
    } else {
        read_pixel(buf, format)
    }
}

#[inline]
fn downscale(value: u8, max: u16) -> u16 {
    if max == 0 {
        0
    } else if max == 255 {
        u16::from(value)
    } else {
        ((u32::from(value) * u32::from(max)) / 255) as u16
    }
}

#[inline]
fn upscale(value: u16, max: u16) -> u8 {
    if max == 0 {
        0
    } else if max == 255 {
        value as u8
    } else {
        ((u64::from(value) * 255) / u64::from(max)) as u8
    }
}

/// An (r, g, b) colour triple. Equality and hashing are by packed 24-bit
/// RGB, matching the teacher's `rgba_to_rgb24_pixels` packing convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    /// Red channel, 0-255.
    pub r: u8,
    /// Green channel, 0-255.
    pub g: u8,
    /// Blue channel, 0-255.
    pub b: u8,
}

impl Color {
    /// Builds a `Color` from its packed 24-bit RGB representation
    /// (`r` in bits 0-7, `g` in bits 8-15, `b` in bits 16-23).
    #[must_use]
    pub fn from_packed24(v: u32) -> Self {
        Self {
            r: (v & 0xFF) as u8,
            g: ((v >> 8) & 0xFF) as u8,
            b: ((v >> 16) & 0xFF) as u8,
        }
    }

    /// Packs this colour into the 24-bit RGB representation used as the
    /// pixel key throughout the encoding engine.
    #[must_use]
    pub fn to_packed24(self) -> u32 {
        u32::from(self.r) | (u32::from(self.g) << 8) | (u32::from(self.b) << 16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_unpack_round_trip_rgba32() {
        let pf = PixelFormat::rgba32();
        let c = Color { r: 12, g: 200, b: 77 };
        assert_eq!(pf.unpack(pf.pack(c)), c);
    }

    #[test]
    fn pack_unpack_round_trip_rgb565() {
        let pf = PixelFormat::rgb565();
        for c in [
            Color { r: 0, g: 0, b: 0 },
            Color { r: 255, g: 255, b: 255 },
            Color { r: 128, g: 64, b: 32 },
        ] {
            let packed = pf.pack(c);
            let back = pf.unpack(packed);
            // Lossy quantization: round trip must stay within one scaled step.
            assert!((i16::from(back.r) - i16::from(c.r)).abs() <= 8);
            assert!((i16::from(back.g) - i16::from(c.g)).abs() <= 4);
            assert!((i16::from(back.b) - i16::from(c.b)).abs() <= 8);
        }
    }

    #[test]
    fn convert_from_identity_is_noop() {
        let pf = PixelFormat::rgba32();
        assert_eq!(pf.convert_from(&pf, 0x00_AA_BB_CC), 0x00_AA_BB_CC);
    }

    #[test]
    fn validity_rejects_overlapping_depth() {
        let mut pf = PixelFormat::rgba32();
        pf.depth = 2;
        assert!(!pf.is_valid());
    }

    #[test]
    fn cpixel_size_32bpp_truecolor_is_three() {
        assert_eq!(PixelFormat::rgba32().cpixel_size(), 3);
        assert_eq!(PixelFormat::rgb565().cpixel_size(), 2);
    }
}
