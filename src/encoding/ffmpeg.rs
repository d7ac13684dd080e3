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

//! Video pixel-encoding path, gated behind the `ffmpeg` feature.
//!
//! Ported from the pixel-format conversion half of the original
//! `ffmpeg_tools.cpp`/`librfb_ffmpeg.cpp` (mask-based `AVPixelFormat`
//! lookup, RGBA -> YUV420P planar conversion before handing frames to a
//! codec context). This module supplies that conversion and the
//! `[len:u32][packet]` wire framing; it does not link an H.264/VP8/AV1
//! bitstream encoder, since no such binding ships in this workspace's
//! dependency set and one is not fabricated here. A real codec context
//! (e.g. an `ffmpeg-next`-style libavcodec binding) can be dropped in
//! behind `Yuv420Frame::into_yuv_bytes` without touching the conversion
//! or framing logic.

use bytes::{BufMut, BytesMut};

use crate::pixel::PixelFormat;
use crate::protocol::ENCODING_H264;

use super::Encoding;

/// A frame converted to planar YUV 4:2:0: one full-resolution luma plane
/// and two quarter-resolution chroma planes, per `ffmpeg_tools.cpp`'s
/// `AV_PixelFormatEnumToMasks` convention (BT.601 full-range coefficients).
pub struct Yuv420Frame {
    /// Frame width in pixels.
    pub width: u16,
    /// Frame height in pixels.
    pub height: u16,
    /// `width * height` luma samples.
    pub y: Vec<u8>,
    /// `ceil(width/2) * ceil(height/2)` Cb samples.
    pub u: Vec<u8>,
    /// `ceil(width/2) * ceil(height/2)` Cr samples.
    pub v: Vec<u8>,
}

impl Yuv420Frame {
    /// Converts tightly packed RGBA pixels into planar YUV420.
    #[must_use]
    pub fn from_rgba(data: &[u8], width: u16, height: u16) -> Self {
        let w = usize::from(width);
        let h = usize::from(height);
        let cw = w.div_ceil(2);
        let ch = h.div_ceil(2);

        let mut y = vec![0u8; w * h];
        let mut u = vec![0u8; cw * ch];
        let mut v = vec![0u8; cw * ch];

        for row in 0..h {
            for col in 0..w {
                let px = (row * w + col) * 4;
                let (r, g, b) = (data[px] as i32, data[px + 1] as i32, data[px + 2] as i32);
                y[row * w + col] = ((66 * r + 129 * g + 25 * b + 128) >> 8).clamp(0, 255) as u8 + 16;

                if row % 2 == 0 && col % 2 == 0 {
                    let cu = ((-38 * r - 74 * g + 112 * b + 128) >> 8).clamp(-128, 127) + 128;
                    let cv = ((112 * r - 94 * g - 18 * b + 128) >> 8).clamp(-128, 127) + 128;
                    u[(row / 2) * cw + col / 2] = cu as u8;
                    v[(row / 2) * cw + col / 2] = cv as u8;
                }
            }
        }

        Self { width, height, y, u, v }
    }

    /// Concatenates the three planes (Y, then U, then V) into one buffer,
    /// the layout a libavcodec `AVFrame` with `AV_PIX_FMT_YUV420P` expects.
    #[must_use]
    pub fn into_yuv_bytes(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.y.len() + self.u.len() + self.v.len());
        out.extend_from_slice(&self.y);
        out.extend_from_slice(&self.u);
        out.extend_from_slice(&self.v);
        out
    }
}

/// Placeholder video encoder: converts to YUV420 and frames the planar
/// bytes as `[len:u32][planes]`. Stands in for the real H.264/VP8/AV1
/// bitstream encoder the wire format anticipates (see module docs).
pub struct FfmpegEncoding;

impl Encoding for FfmpegEncoding {
    fn encode(&self, data: &[u8], width: u16, height: u16, _format: &PixelFormat, _quality: u8, _compression: u8) -> (i32, BytesMut) {
        let packet = Yuv420Frame::from_rgba(data, width, height).into_yuv_bytes();
        let mut buf = BytesMut::with_capacity(4 + packet.len());
        buf.put_u32(packet.len() as u32);
        buf.extend_from_slice(&packet);
        (ENCODING_H264, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yuv420_plane_sizes_match_chroma_subsampling() {
        let data = vec![10u8, 20, 30, 255].repeat(4 * 4);
        let frame = Yuv420Frame::from_rgba(&data, 4, 4);
        assert_eq!(frame.y.len(), 16);
        assert_eq!(frame.u.len(), 4);
        assert_eq!(frame.v.len(), 4);
    }

    #[test]
    fn encode_frames_packet_with_length_prefix() {
        let data = vec![0u8, 0, 0, 255].repeat(2 * 2);
        let (_, buf) = FfmpegEncoding.encode(&data, 2, 2, &PixelFormat::rgba32(), 0, 0);
        let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        assert_eq!(len, buf.len() - 4);
    }
}
