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

//! Pixel-encoding implementations and the parallel tile scheduler.
//!
//! Stateless tile encoders (Raw, RRE, CoRRE, Hextile, TRLE) implement
//! [`Encoding`] and are selected via [`get_encoder`]. Zlib, ZlibHex, and
//! ZRLE additionally carry a persistent per-connection `flate2::Compress`
//! stream (RFC 6143 requires the deflate context survive across
//! rectangles), so they stay as free functions taking `&mut Compress`
//! rather than going through the stateless trait — exactly the split the
//! teacher's original module already used.

use bytes::BytesMut;

use crate::pixel::PixelFormat;
use crate::protocol::{ENCODING_CORRE, ENCODING_HEXTILE, ENCODING_RAW, ENCODING_RRE, ENCODING_TRLE};

pub mod common;
pub mod corre;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;
pub mod hextile;
pub mod raw;
pub mod rle;
pub mod rre;
pub mod scheduler;
pub mod trle;
pub mod zlib;
pub mod zlibhex;
pub mod zrle;

pub use common::*;
pub use corre::CorRreEncoding;
#[cfg(feature = "ffmpeg")]
pub use ffmpeg::FfmpegEncoding;
pub use hextile::HextileEncoding;
pub use raw::RawEncoding;
pub use rre::RreEncoding;
pub use scheduler::{encode_region, new_send_lock, send_framebuffer_update, worker_count, EncodedRectangle, SendLock};
pub use trle::TrleEncoding;

pub use zlib::encode_zlib_persistent;
pub use zlibhex::encode_zlibhex_persistent;
pub use zrle::encode_zrle_persistent;

/// Trait implemented by the stateless tile encoders.
pub trait Encoding {
    /// Encodes `data` (tightly packed RGBA, `width * height * 4` bytes)
    /// into `format`'s wire representation, returning the RFB encoding
    /// number the body is actually framed as (an encoder may decide a
    /// plain Raw body is smaller and emit that instead) alongside the
    /// body itself. Callers must write the returned number in the
    /// rectangle header, not the number they requested.
    fn encode(&self, data: &[u8], width: u16, height: u16, format: &PixelFormat, quality: u8, compression: u8) -> (i32, BytesMut);
}

/// Returns a stateless encoder for the given RFB encoding number, or
/// `None` for encodings that require persistent compressor state (Zlib,
/// ZlibHex, ZRLE) or aren't recognized.
#[must_use]
pub fn get_encoder(encoding_type: i32) -> Option<Box<dyn Encoding + Send>> {
    match encoding_type {
        ENCODING_RAW => Some(Box::new(RawEncoding)),
        ENCODING_RRE => Some(Box::new(RreEncoding)),
        ENCODING_CORRE => Some(Box::new(CorRreEncoding)),
        ENCODING_HEXTILE => Some(Box::new(HextileEncoding)),
        ENCODING_TRLE => Some(Box::new(TrleEncoding)),
        _ => None,
    }
}

/// Fixed tile size for each encoding family, per spec §4.C. `None` means
/// "the whole dirty rectangle as a single tile" (Raw, and the
/// self-internally-tiled Hextile).
#[must_use]
pub fn tile_size(encoding_type: i32) -> Option<u16> {
    match encoding_type {
        ENCODING_RRE => Some(128),
        ENCODING_CORRE => Some(64),
        ENCODING_TRLE => Some(64),
        _ => None,
    }
}

/// Walks `preferences` (the client's encoding list, in the order the
/// client sent them) and returns the first entry that is a known,
/// non-Raw encoding this server implements; `None` means fall back to
/// Raw. The client's own order is authoritative — there is no
/// server-side ranking — matching `serverSelectClientEncoding`'s
/// `for (int type : clientEncodings)` loop.
#[must_use]
pub fn select_encoding(preferences: &[i32]) -> Option<i32> {
    use crate::protocol::{ENCODING_CORRE, ENCODING_HEXTILE, ENCODING_RRE, ENCODING_TRLE, ENCODING_ZLIB, ENCODING_ZLIBHEX, ENCODING_ZRLE};
    let known = [ENCODING_ZLIBHEX, ENCODING_ZLIB, ENCODING_HEXTILE, ENCODING_ZRLE, ENCODING_TRLE, ENCODING_CORRE, ENCODING_RRE];
    preferences.iter().copied().find(|enc| known.contains(enc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ENCODING_HEXTILE, ENCODING_RAW, ENCODING_RRE, ENCODING_ZLIB, ENCODING_ZLIBHEX};

    #[test]
    fn selection_rule_follows_the_clients_own_order() {
        assert_eq!(select_encoding(&[ENCODING_RAW, ENCODING_ZLIB]), Some(ENCODING_ZLIB));
        assert_eq!(select_encoding(&[ENCODING_RAW, ENCODING_HEXTILE]), Some(ENCODING_HEXTILE));
        assert_eq!(select_encoding(&[ENCODING_RAW]), None);
    }

    #[test]
    fn a_lower_ranked_encoding_listed_first_still_wins() {
        assert_eq!(select_encoding(&[ENCODING_RRE, ENCODING_ZLIBHEX]), Some(ENCODING_RRE));
    }
}
