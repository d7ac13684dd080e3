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

//! Owned pixel storage backing a `VncServer`, shared between the
//! application's update calls and the per-client encoding pipeline.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::pixel::{Color, PixelFormat};
use crate::region::Region;

/// A thread-safe RGBA32 framebuffer with damage-region tracking.
///
/// Mirrors the teacher's `Framebuffer` (referenced from `client.rs` as
/// `self.framebuffer`) while adding the pixel-analysis operations the
/// encoding engine needs (`pixel_weight`, `modal_pixel`, `to_rle`,
/// `all_of_pixel`).
pub struct Framebuffer {
    width: u16,
    height: u16,
    format: PixelFormat,
    data: RwLock<Vec<u8>>,
}

impl Framebuffer {
    /// Allocates a black `width x height` RGBA32 framebuffer.
    #[must_use]
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            format: PixelFormat::rgba32(),
            data: RwLock::new(vec![0u8; usize::from(width) * usize::from(height) * 4]),
        }
    }

    /// Framebuffer width in pixels.
    #[must_use]
    pub fn width(&self) -> u16 {
        self.width
    }

    /// Framebuffer height in pixels.
    #[must_use]
    pub fn height(&self) -> u16 {
        self.height
    }

    /// The framebuffer's native pixel format (always RGBA32 server-side).
    #[must_use]
    pub fn format(&self) -> &PixelFormat {
        &self.format
    }

    /// Bytes per scanline. Always `width * 4` since the buffer is tightly
    /// packed; kept as a named accessor so callers don't hardcode the `4`.
    #[must_use]
    pub fn pitch(&self) -> usize {
        usize::from(self.width) * 4
    }

    /// Replaces the full buffer (used by `VncServer::update_framebuffer`
    /// for whole-frame pushes from the application).
    pub fn replace_all(&self, rgba: &[u8]) {
        let mut data = self.data.write().expect("framebuffer lock poisoned");
        data.copy_from_slice(rgba);
    }

    /// Copies `rgba` (tightly packed, `region.width * region.height * 4`
    /// bytes) into the framebuffer at `region`'s location.
    pub fn blit_bytes(&self, region: Region, rgba: &[u8]) {
        let mut data = self.data.write().expect("framebuffer lock poisoned");
        let pitch = self.pitch();
        for row in 0..region.height {
            let src_off = usize::from(row) * usize::from(region.width) * 4;
            let dst_off = (usize::from(region.y + row) * pitch) + usize::from(region.x) * 4;
            let len = usize::from(region.width) * 4;
            if src_off + len > rgba.len() || dst_off + len > data.len() {
                break;
            }
            data[dst_off..dst_off + len].copy_from_slice(&rgba[src_off..src_off + len]);
        }
    }

    /// Copies a rectangle from `self` at `src` to `dst_point` within the
    /// same buffer, handling overlap correctly (used by CopyRect).
    pub fn blit(&self, src: Region, dst_point: (u16, u16)) {
        let mut data = self.data.write().expect("framebuffer lock poisoned");
        let pitch = self.pitch();
        let row_len = usize::from(src.width) * 4;
        let mut rows: Vec<Vec<u8>> = Vec::with_capacity(usize::from(src.height));
        for row in 0..src.height {
            let off = (usize::from(src.y + row) * pitch) + usize::from(src.x) * 4;
            rows.push(data[off..off + row_len].to_vec());
        }
        for (row, buf) in rows.into_iter().enumerate() {
            let off = (usize::from(dst_point.1 + row as u16) * pitch) + usize::from(dst_point.0) * 4;
            if off + row_len <= data.len() {
                data[off..off + row_len].copy_from_slice(&buf);
            }
        }
    }

    /// Reads the RGBA pixel at `(x, y)` as a packed 24-bit RGB value.
    #[must_use]
    pub fn pixel(&self, x: u16, y: u16) -> u32 {
        let data = self.data.read().expect("framebuffer lock poisoned");
        let off = usize::from(y) * self.pitch() + usize::from(x) * 4;
        Color { r: data[off], g: data[off + 1], b: data[off + 2] }.to_packed24()
    }

    /// Writes `color` at `(x, y)`.
    pub fn set_pixel(&self, x: u16, y: u16, color: Color) {
        let mut data = self.data.write().expect("framebuffer lock poisoned");
        let off = usize::from(y) * self.pitch() + usize::from(x) * 4;
        data[off] = color.r;
        data[off + 1] = color.g;
        data[off + 2] = color.b;
    }

    /// Fills every pixel in `region` with `color`.
    pub fn fill_color(&self, region: Region, color: Color) {
        let mut data = self.data.write().expect("framebuffer lock poisoned");
        let pitch = self.pitch();
        for row in 0..region.height {
            let y = region.y + row;
            for col in 0..region.width {
                let x = region.x + col;
                let off = usize::from(y) * pitch + usize::from(x) * 4;
                if off + 3 < data.len() {
                    data[off] = color.r;
                    data[off + 1] = color.g;
                    data[off + 2] = color.b;
                }
            }
        }
    }

    /// Draws an unfilled rectangle outline (single-pixel border) in `color`.
    pub fn draw_rect(&self, region: Region, color: Color) {
        if region.is_empty() {
            return;
        }
        let top = Region::new(region.x, region.y, region.width, 1);
        let bottom = Region::new(region.x, region.y + region.height - 1, region.width, 1);
        let left = Region::new(region.x, region.y, 1, region.height);
        let right = Region::new(region.x + region.width - 1, region.y, 1, region.height);
        for r in [top, bottom, left, right] {
            self.fill_color(r, color);
        }
    }

    /// Returns a tightly packed RGBA32 copy of `region`'s pixels, row-major.
    #[must_use]
    pub fn extract_rgba(&self, region: Region) -> Vec<u8> {
        let data = self.data.read().expect("framebuffer lock poisoned");
        let pitch = self.pitch();
        let mut out = Vec::with_capacity(usize::from(region.width) * usize::from(region.height) * 4);
        for row in 0..region.height {
            let off = usize::from(region.y + row) * pitch + usize::from(region.x) * 4;
            let len = usize::from(region.width) * 4;
            out.extend_from_slice(&data[off..off + len]);
        }
        out
    }

    /// Returns `(pixel, count)` pairs for `region`, ordered by descending
    /// count. Used by encoders to pick the modal/background colour.
    #[must_use]
    pub fn pixel_weight(&self, region: Region) -> Vec<(u32, u32)> {
        let rgba = self.extract_rgba(region);
        let mut counts: HashMap<u32, u32> = HashMap::new();
        for px in rgba.chunks_exact(4) {
            let key = Color { r: px[0], g: px[1], b: px[2] }.to_packed24();
            *counts.entry(key).or_insert(0) += 1;
        }
        let mut v: Vec<(u32, u32)> = counts.into_iter().collect();
        v.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        v
    }

    /// The single most frequent pixel value within `region`.
    #[must_use]
    pub fn modal_pixel(&self, region: Region) -> u32 {
        self.pixel_weight(region).first().map(|(p, _)| *p).unwrap_or(0)
    }

    /// Row-major run-length encoding of `region`'s pixels: `(pixel, run)`
    /// pairs, runs never crossing a row boundary.
    #[must_use]
    pub fn to_rle(&self, region: Region) -> Vec<(u32, u32)> {
        let rgba = self.extract_rgba(region);
        let mut runs = Vec::new();
        for row in rgba.chunks_exact(usize::from(region.width) * 4) {
            let mut iter = row.chunks_exact(4);
            let Some(first) = iter.next() else { continue };
            let mut cur = Color { r: first[0], g: first[1], b: first[2] }.to_packed24();
            let mut run_len: u32 = 1;
            for px in iter {
                let key = Color { r: px[0], g: px[1], b: px[2] }.to_packed24();
                if key == cur {
                    run_len += 1;
                } else {
                    runs.push((cur, run_len));
                    cur = key;
                    run_len = 1;
                }
            }
            runs.push((cur, run_len));
        }
        runs
    }

    /// True if every pixel in `region` equals `pixel` (packed 24-bit RGB).
    /// Short-circuits on the first mismatch.
    #[must_use]
    pub fn all_of_pixel(&self, region: Region, pixel: u32) -> bool {
        let data = self.data.read().expect("framebuffer lock poisoned");
        let pitch = self.pitch();
        for row in 0..region.height {
            let off = usize::from(region.y + row) * pitch + usize::from(region.x) * 4;
            for col in 0..region.width {
                let p = off + usize::from(col) * 4;
                let key = Color { r: data[p], g: data[p + 1], b: data[p + 2] }.to_packed24();
                if key != pixel {
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_then_all_of_pixel_agrees() {
        let fb = Framebuffer::new(8, 8);
        let region = Region::new(2, 2, 4, 4);
        let color = Color { r: 10, g: 20, b: 30 };
        fb.fill_color(region, color);
        assert!(fb.all_of_pixel(region, color.to_packed24()));
        assert!(!fb.all_of_pixel(Region::new(0, 0, 8, 8), color.to_packed24()));
    }

    #[test]
    fn to_rle_round_trips_pixel_count() {
        let fb = Framebuffer::new(4, 2);
        fb.fill_color(Region::new(0, 0, 4, 2), Color { r: 1, g: 2, b: 3 });
        fb.set_pixel(3, 0, Color { r: 9, g: 9, b: 9 });
        let runs = fb.to_rle(Region::new(0, 0, 4, 2));
        let total: u32 = runs.iter().map(|(_, n)| n).sum();
        assert_eq!(total, 8);
        assert_eq!(runs.len(), 3); // [1,2,3]x3, [9,9,9]x1, [1,2,3]x4
    }

    #[test]
    fn modal_pixel_picks_majority_color() {
        let fb = Framebuffer::new(4, 4);
        fb.fill_color(Region::new(0, 0, 4, 4), Color { r: 5, g: 5, b: 5 });
        fb.set_pixel(0, 0, Color { r: 250, g: 250, b: 250 });
        assert_eq!(fb.modal_pixel(Region::new(0, 0, 4, 4)), Color { r: 5, g: 5, b: 5 }.to_packed24());
    }

    #[test]
    fn blit_copies_overlapping_region_correctly() {
        let fb = Framebuffer::new(8, 8);
        fb.fill_color(Region::new(0, 0, 4, 4), Color { r: 1, g: 1, b: 1 });
        fb.blit(Region::new(0, 0, 4, 4), (2, 0));
        assert!(fb.all_of_pixel(Region::new(2, 0, 4, 4), Color { r: 1, g: 1, b: 1 }.to_packed24()));
    }
}
