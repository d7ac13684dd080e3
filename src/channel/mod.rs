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

//! The LTSM side-channel multiplexer: up to 253 bidirectional byte
//! streams riding inside the RFB transport as message type `0xFF`.
//!
//! Entirely new relative to the teacher, which is a single-purpose VNC
//! server with no side-channel concept. Grounded on
//! `original_source/src/channels/channel_system.{h,cpp}` for the state
//! machine and wire shapes, reworked into tokio tasks + `mpsc` channels
//! in place of the original's raw `std::thread` + mutex pairs.

mod connector;
mod controller;
mod frame;
mod listener;
mod system;
mod types;

pub use connector::{Connector, ConnectorEvent, LtsmSink};
pub use controller::{start_channel, ChannelController};
pub use frame::{encode_frames, MAX_FRAME_PAYLOAD};
pub use listener::{Accepted, Listener};
pub use system::SystemCommand;
pub use types::{ChannelId, ChannelMode, ConnectorType, Planned, Speed, MAX_CHANNEL_ID, RESERVED_CHANNEL, SYSTEM_CHANNEL};
