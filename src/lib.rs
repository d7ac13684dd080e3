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


//! # rustvnc-ltsm
//!
//! A multi-protocol remote-desktop connector: an RFB/VNC protocol engine,
//! an LTSM side-channel multiplexer, and a parallel pixel-encoding
//! scheduler.
//!
//! This library provides a complete VNC server implementation following the RFB
//! (Remote Framebuffer) protocol specification (RFC 6143), plus LTSM's
//! side-channel multiplexing of file transfer, clipboard, and audio
//! connectors over the same transport.
//!
//! ## Features
//!
//! - **8 encoding types**: Raw, RRE, CoRRE, Hextile, Zlib, ZlibHex, ZRLE,
//!   and (behind the `ffmpeg` feature) an FFmpeg-backed encoder
//! - **All pixel formats**: 8/16/24/32-bit color depths, with conversion
//!   between arbitrary server and client formats
//! - **LTSM side channels**: up to 253 multiplexed connectors riding the
//!   RFB transport's `LtsmProtocol` message type
//! - **Async I/O**: Built on Tokio for efficient concurrent client handling
//! - **Memory safe**: Pure Rust with zero unsafe code in core logic
//!
//! ## Quick Start
//!
//! ```no_run
//! use rustvnc_ltsm::{VncServer, ServerEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Create a VNC server with 1920x1080 framebuffer
//!     let server = VncServer::new(1920, 1080);
//!
//!     // Optional: Set a password
//!     server.set_password(Some("secret".to_string())).await;
//!
//!     // Start listening on port 5900
//!     let server_handle = tokio::spawn(async move {
//!         server.listen(5900).await
//!     });
//!
//!     // Update the framebuffer
//!     // server.update_framebuffer(&pixels, rustvnc_ltsm::Region::new(0, 0, 1920, 1080));
//!
//!     server_handle.await??;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │           Your Application              │
//! │                                         │
//! │  • Provide framebuffer data             │
//! │  • Receive input events                 │
//! │  • Control server lifecycle             │
//! └──────────────────┬──────────────────────┘
//!                    │
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │           VncServer (Public)            │
//! │                                         │
//! │  • TCP listener                         │
//! │  • Client management                    │
//! │  • Event distribution                   │
//! └──────────────────┬──────────────────────┘
//!                    │
//!        ┌───────────┼───────────┐
//!        ▼           ▼           ▼
//!   ┌────────┐ ┌────────┐ ┌────────┐
//!   │Client 1│ │Client 2│ │Client N│
//!   └────────┘ └────────┘ └────────┘
//!        │           │           │
//!        └───────────┴───────────┘
//!                    │
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │      Framebuffer (Thread-safe)          │
//! │                                         │
//! │  • RGBA32 pixel storage                 │
//! │  • Region tracking                      │
//! │  • CopyRect operations                  │
//! └─────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod events;
pub mod protocol;
pub mod server;
pub mod framebuffer;
pub mod pixel;
pub mod region;
pub mod transport;
pub mod decoding;
pub mod channel;
pub mod collaborators;
pub mod security;
pub mod messages;
pub mod config;

// Internal modules
mod client;
pub mod encoding;

// Re-exports
pub use error::{VncError, Result};
pub use events::ServerEvent;
pub use server::VncServer;
pub use framebuffer::Framebuffer;
pub use protocol::PixelFormat;
pub use encoding::Encoding;
pub use collaborators::Collaborators;
pub use config::Config;
pub use region::Region;

/// VNC protocol version.
pub const PROTOCOL_VERSION: &str = "RFB 003.008\n";

/// Default VNC port.
pub const DEFAULT_PORT: u16 = 5900;
