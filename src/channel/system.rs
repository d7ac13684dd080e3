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

//! System-channel (channel 0) JSON commands, grounded on
//! `ltsm_json_wrapper.cpp`'s `cmd`-discriminated object shape.

use serde::{Deserialize, Serialize};

use super::types::{ChannelId, ChannelMode, ConnectorType, Speed};

/// One JSON object carried as the payload of an LTSM frame on channel 0.
/// Tagged on the wire by its `cmd` field, matching the original's
/// `SystemCommand` string-view constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd")]
pub enum SystemCommand {
    /// Peer requests a new channel to a local resource.
    ChannelOpen {
        /// Allocated channel id.
        id: ChannelId,
        /// Kind of resource to open.
        #[serde(rename = "type")]
        connector_type: ConnectorType,
        /// Mode the recipient should open its endpoint in.
        mode: ChannelMode,
        /// Throughput class for the new channel.
        speed: Speed,
        /// Whether frames on this channel are zlib-wrapped.
        zlib: bool,
        /// Resource locator: a path, `host:port`, or command line,
        /// depending on `connector_type`.
        url: String,
    },
    /// Reply to `ChannelOpen`; moves the id from `planned` to `channels`.
    ChannelConnected {
        /// Id being confirmed.
        id: ChannelId,
        /// True if the peer failed to open its side.
        error: bool,
        /// Whether the peer will zlib-wrap its frames.
        zlib: bool,
    },
    /// Either side initiates teardown of a running channel.
    ChannelClose {
        /// Id to tear down.
        id: ChannelId,
    },
    /// Fatal per-channel error notification.
    ChannelError {
        /// Id the error pertains to.
        id: ChannelId,
        /// `errno`-style numeric code.
        code: i32,
        /// Human-readable description.
        error: String,
    },
    /// Client-reported environment/session variables.
    ClientVariables {
        /// Opaque key-value environment the client exposes (locale,
        /// timezone, and similar session hints).
        variables: serde_json::Value,
    },
    /// Client-side keyboard layout change notification.
    KeyboardChange {
        /// XKB layout names currently active, most-preferred first.
        layouts: Vec<String>,
        /// Index into `layouts` of the active group.
        group: i32,
    },
    /// Client requests a file transfer.
    TransferFiles {
        /// Paths offered for transfer.
        files: Vec<String>,
    },
    /// Session-manager reported a successful login.
    LoginSuccess {
        /// Display identifier the session is bound to.
        display: i32,
        /// Authenticated username.
        user: String,
    },
    /// Cursor-shape push failed on the sender's side.
    CursorFailed {
        /// Human-readable description of the failure.
        error: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_open_round_trips_through_json() {
        let cmd = SystemCommand::ChannelOpen {
            id: 5,
            connector_type: ConnectorType::Unix,
            mode: ChannelMode::ReadWrite,
            speed: Speed::Medium,
            zlib: false,
            url: "/tmp/foo.sock".to_string(),
        };
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("\"cmd\":\"ChannelOpen\""));
        let back: SystemCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cmd);
    }

    #[test]
    fn channel_connected_matches_worked_example() {
        let json = r#"{"cmd":"ChannelConnected","id":5,"error":false,"zlib":false}"#;
        let cmd: SystemCommand = serde_json::from_str(json).unwrap();
        assert_eq!(cmd, SystemCommand::ChannelConnected { id: 5, error: false, zlib: false });
    }
}
