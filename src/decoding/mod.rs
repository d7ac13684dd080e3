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

//! Decoders for the encodings `encoding` produces.
//!
//! The teacher is a pure server and has no decode path; this module is
//! built fresh, mirroring `encoding/`'s per-encoding-module shape and its
//! stateless-vs-persistent split. Each stateless [`Decoding`] impl reads
//! from a `bytes::Buf` cursor positioned at the start of a rectangle's
//! body and writes the result into a caller-owned [`Framebuffer`] at
//! `region`. Zlib/ZlibHex/ZRLE carry a persistent `flate2::Decompress`
//! stream (mirroring the encoder side's persistent `Compress`) and stay
//! as free functions instead.

pub mod common;
pub mod corre;
pub mod hextile;
pub mod raw;
pub mod rre;
pub mod trle;
pub mod zlib;
pub mod zlibhex;
pub mod zrle;

pub use corre::CorRreDecoding;
pub use hextile::HextileDecoding;
pub use raw::RawDecoding;
pub use rre::RreDecoding;
pub use trle::TrleDecoding;

pub use zlib::decode_zlib_persistent;
pub use zlibhex::decode_zlibhex_persistent;
pub use zrle::decode_zrle_persistent;

use bytes::Buf;

use crate::error::Result;
use crate::framebuffer::Framebuffer;
use crate::pixel::PixelFormat;
use crate::protocol::{ENCODING_CORRE, ENCODING_HEXTILE, ENCODING_RAW, ENCODING_RRE, ENCODING_TRLE};
use crate::region::Region;

/// Trait implemented by the stateless tile decoders: the exact inverse
/// of [`crate::encoding::Encoding`].
pub trait Decoding {
    /// Decodes one rectangle's body from `buf` (positioned at the start
    /// of the body, per `region`'s already-parsed header) into
    /// `framebuffer` at `region`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `buf` runs out of bytes before the declared
    /// region is fully decoded, or the body is otherwise malformed.
    fn decode(&self, buf: &mut dyn Buf, region: Region, format: &PixelFormat, framebuffer: &Framebuffer) -> Result<()>;
}

/// Returns a stateless decoder for the given RFB encoding number, or
/// `None` for encodings that require persistent decompressor state
/// (Zlib, `ZlibHex`, ZRLE) or aren't recognized.
#[must_use]
pub fn get_decoder(encoding_type: i32) -> Option<Box<dyn Decoding + Send>> {
    match encoding_type {
        ENCODING_RAW => Some(Box::new(RawDecoding)),
        ENCODING_RRE => Some(Box::new(RreDecoding)),
        ENCODING_CORRE => Some(Box::new(CorRreDecoding)),
        ENCODING_HEXTILE => Some(Box::new(HextileDecoding)),
        ENCODING_TRLE => Some(Box::new(TrleDecoding)),
        _ => None,
    }
}
