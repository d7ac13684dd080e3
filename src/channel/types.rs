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

//! Channel identifiers, connector attributes, and the `Planned` record,
//! grounded on `original_source/src/channels/channel_system.h`'s
//! `Channel` namespace (`ConnectorType`, `ConnectorMode`, `Speed`, `Planned`).

use std::time::Duration;

/// A channel id, `1..=253`. `0` is the system-control channel and `255`
/// is reserved; both are rejected by [`is_assignable`].
pub type ChannelId = u8;

/// Carries the LTSM system-channel JSON commands.
pub const SYSTEM_CHANNEL: ChannelId = 0;

/// Never allocated; mirrors the original's `Channel::Reserved`.
pub const RESERVED_CHANNEL: ChannelId = 255;

/// Highest id `createChannel` may allocate.
pub const MAX_CHANNEL_ID: ChannelId = 253;

/// True for ids in `1..=253`, the range `ChannelController::allocate_id`
/// draws from.
#[must_use]
pub fn is_assignable(id: ChannelId) -> bool {
    (1..=MAX_CHANNEL_ID).contains(&id)
}

/// What kind of local resource a channel tunnels to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorType {
    /// A Unix domain socket path.
    Unix,
    /// A TCP `host:port`.
    Socket,
    /// A plain file, read-only by convention.
    File,
    /// A spawned child process's stdio.
    Command,
}

/// Direction of data flow a channel endpoint permits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelMode {
    /// Local-to-remote (reader worker) only.
    #[serde(rename = "ro")]
    ReadOnly,
    /// Remote-to-local (writer worker) only.
    #[serde(rename = "wo")]
    WriteOnly,
    /// Both reader and writer workers.
    #[serde(rename = "rw")]
    ReadWrite,
}

impl ChannelMode {
    /// Whether this mode starts a reader worker (local fd -> remote).
    #[must_use]
    pub fn has_reader(self) -> bool {
        matches!(self, ChannelMode::ReadOnly | ChannelMode::ReadWrite)
    }

    /// Whether this mode starts a writer worker (remote -> local fd).
    #[must_use]
    pub fn has_writer(self) -> bool {
        matches!(self, ChannelMode::WriteOnly | ChannelMode::ReadWrite)
    }
}

/// Throughput class controlling a channel's reader block size and its
/// writer's idle poll delay. The exact `(block_size, poll_delay)` pairs
/// are spec'd, not tunable: `UltraSlow`/`VerySlow` ~4 KiB/sec up through
/// `UltraFast` ~800 KiB/sec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speed {
    /// `(2 KiB, 200ms)`.
    #[serde(rename = "very")]
    VerySlow,
    /// `(4 KiB, 100ms)`.
    Slow,
    /// `(8 KiB, 100ms)`.
    Medium,
    /// `(16 KiB, 60ms)`.
    Fast,
    /// `(32 KiB, 20ms)`.
    #[serde(rename = "ultra")]
    UltraFast,
}

impl Speed {
    /// Bytes the reader worker attempts to read per poll.
    #[must_use]
    pub fn block_size(self) -> usize {
        match self {
            Speed::VerySlow => 2 * 1024,
            Speed::Slow => 4 * 1024,
            Speed::Medium => 8 * 1024,
            Speed::Fast => 16 * 1024,
            Speed::UltraFast => 32 * 1024,
        }
    }

    /// How long the writer worker sleeps when its queue is empty.
    #[must_use]
    pub fn poll_delay(self) -> Duration {
        match self {
            Speed::VerySlow => Duration::from_millis(200),
            Speed::Slow | Speed::Medium => Duration::from_millis(100),
            Speed::Fast => Duration::from_millis(60),
            Speed::UltraFast => Duration::from_millis(20),
        }
    }
}

/// A channel awaiting its peer's `ChannelConnected` reply: created by
/// `ChannelController::create_channel` (server-initiated) or by a
/// `Listener` accept (peer-initiated), and removed once it graduates to
/// `channels` or the open attempt fails.
#[derive(Debug, Clone)]
pub struct Planned {
    /// The allocated id, matched against the peer's `ChannelConnected{id}`.
    pub channel: ChannelId,
    /// Kind of resource the *client* side should open.
    pub client_type: ConnectorType,
    /// Mode the client side should use.
    pub client_mode: ChannelMode,
    /// Mode the server side (this process) will use once running.
    pub server_mode: ChannelMode,
    /// Opaque client-side locator sent verbatim in `ChannelOpen`
    /// (a path, a `host:port`, or a command line).
    pub client_url: String,
    /// Server-side locator used to open the local endpoint on success.
    pub server_url: String,
    /// Throughput class for the eventual reader/writer pair.
    pub speed: Speed,
    /// Whether frames on this channel are zlib-wrapped.
    pub zlib: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_table_matches_spec() {
        assert_eq!(Speed::VerySlow.block_size(), 2048);
        assert_eq!(Speed::Slow.block_size(), 4096);
        assert_eq!(Speed::Medium.block_size(), 8192);
        assert_eq!(Speed::Fast.block_size(), 16384);
        assert_eq!(Speed::UltraFast.block_size(), 32768);
        assert_eq!(Speed::VerySlow.poll_delay(), Duration::from_millis(200));
        assert_eq!(Speed::UltraFast.poll_delay(), Duration::from_millis(20));
    }

    #[test]
    fn assignable_range_excludes_system_and_reserved() {
        assert!(!is_assignable(SYSTEM_CHANNEL));
        assert!(!is_assignable(RESERVED_CHANNEL));
        assert!(is_assignable(1));
        assert!(is_assignable(253));
        assert!(!is_assignable(254));
    }
}
