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

//! TRLE/ZRLE multibyte run-length termination, shared by the plain-RLE
//! and palette-RLE subencodings.
//!
//! A run of length `L` (`L >= 1`) is emitted as zero or more `0xFF` bytes
//! followed by exactly one byte strictly less than `0xFF`; the reader sums
//! `255` for each `0xFF` byte and adds `terminator + 1` once it sees the
//! first byte below `0xFF`. Encoding `L - 1` in base-255 this way is what
//! makes the terminator byte alone (`< 0xFF`) sufficient to end the run.

use bytes::{Buf, BufMut, BytesMut};

/// Appends the multibyte run-length encoding of `length` to `buf`.
///
/// # Panics
///
/// Panics if `length == 0` — the wire format has no representation for a
/// zero-length run, and callers must never construct one.
pub fn write_run_length(buf: &mut BytesMut, length: u32) {
    assert!(length >= 1, "run length must be >= 1");
    let mut remaining = length - 1;
    while remaining >= 255 {
        buf.put_u8(0xFF);
        remaining -= 255;
    }
    buf.put_u8(remaining as u8);
}

/// Reads a multibyte run-length from `buf`, returning the decoded length.
pub fn read_run_length<B: Buf + ?Sized>(buf: &mut B) -> u32 {
    let mut length: u32 = 0;
    loop {
        let b = buf.get_u8();
        if b == 0xFF {
            length += 255;
        } else {
            length += u32::from(b) + 1;
            break;
        }
    }
    length
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn six_hundred_run_matches_worked_example() {
        let mut buf = BytesMut::new();
        write_run_length(&mut buf, 600);
        // 255 + 255 + 89 + 1 == 600; terminator 89 == 0x59.
        assert_eq!(&buf[..], &[0xFF, 0xFF, 0x59]);
    }

    #[test]
    fn round_trip_over_a_range_of_lengths() {
        for length in [1u32, 2, 254, 255, 256, 510, 511, 765, 100_000] {
            let mut buf = BytesMut::new();
            write_run_length(&mut buf, length);
            assert!(buf[..buf.len() - 1].iter().all(|&b| b == 0xFF));
            assert!(buf[buf.len() - 1] < 0xFF);
            let decoded = read_run_length(&mut buf);
            assert_eq!(decoded, length);
        }
    }

    #[test]
    #[should_panic]
    fn zero_length_is_illegal() {
        let mut buf = BytesMut::new();
        write_run_length(&mut buf, 0);
    }
}
