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

//! LTSM frame wire format: `[0xFF][0x01][channel:u8][len:u16 BE][payload]`.
//!
//! The leading `0xFF` is the RFB message type (`CLIENT_MSG_LTSM_PROTOCOL`
//! / `SERVER_MSG_LTSM_PROTOCOL`) and is consumed by the protocol FSM
//! before delegating here; [`encode_frames`] reproduces it so the bytes
//! this module hands to a `Transport::send` are the complete on-wire
//! message, header included.

use bytes::{BufMut, BytesMut};

use crate::protocol::{CLIENT_MSG_LTSM_PROTOCOL, LTSM_PROTOCOL_VERSION};

/// Largest payload a single LTSM frame can carry; the `length` field is
/// a `u16`.
pub const MAX_FRAME_PAYLOAD: usize = u16::MAX as usize;

/// Splits `payload` into one or more complete LTSM frames (message type,
/// version, channel id, length, bytes), each carrying at most
/// [`MAX_FRAME_PAYLOAD`] bytes. A payload of exactly `MAX_FRAME_PAYLOAD`
/// bytes produces a single frame; one byte more produces two.
#[must_use]
pub fn encode_frames(channel: u8, payload: &[u8]) -> Vec<BytesMut> {
    if payload.is_empty() {
        return vec![encode_one(channel, payload)];
    }
    payload.chunks(MAX_FRAME_PAYLOAD).map(|chunk| encode_one(channel, chunk)).collect()
}

fn encode_one(channel: u8, chunk: &[u8]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(5 + chunk.len());
    buf.put_u8(CLIENT_MSG_LTSM_PROTOCOL);
    buf.put_u8(LTSM_PROTOCOL_VERSION);
    buf.put_u8(channel);
    buf.put_u16(chunk.len() as u16);
    buf.extend_from_slice(chunk);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_payload_is_a_single_frame() {
        let payload = vec![0u8; MAX_FRAME_PAYLOAD];
        let frames = encode_frames(5, &payload);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), 5 + MAX_FRAME_PAYLOAD);
    }

    #[test]
    fn one_byte_over_max_splits_into_two() {
        let payload = vec![0u8; MAX_FRAME_PAYLOAD + 1];
        let frames = encode_frames(5, &payload);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].len(), 5 + MAX_FRAME_PAYLOAD);
        assert_eq!(frames[1].len(), 5 + 1);
    }

    #[test]
    fn frame_header_layout() {
        let frames = encode_frames(7, b"hi");
        let f = &frames[0];
        assert_eq!(f[0], CLIENT_MSG_LTSM_PROTOCOL);
        assert_eq!(f[1], LTSM_PROTOCOL_VERSION);
        assert_eq!(f[2], 7);
        assert_eq!(u16::from_be_bytes([f[3], f[4]]), 2);
        assert_eq!(&f[5..], b"hi");
    }
}
