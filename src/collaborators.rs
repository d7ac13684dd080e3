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

//! Call shapes for the external collaborators referenced only by
//! interface per spec §1/§4.G: the X11 capture layer, the session
//! manager's RPC bus, and the clipboard/resize surfaces they expose.
//!
//! None of these have a real binding in this crate — there is no X11 or
//! D-Bus dependency in the pack, and the spec is explicit that they are
//! out of scope beyond their interface. What's modeled here is the
//! Rust-side call shape: a struct of boxed closures the protocol engine
//! invokes, replacing what in the original is an abstract base class
//! (`ChannelClient`/the connector's virtual event hooks) that concrete
//! backends override. A struct-of-handlers avoids introducing a trait
//! object hierarchy for something this crate never implements a second
//! backend of.

use crate::region::Region;

/// A captured pixmap region, as `Capture::copyRootImageRegion` would
/// return it: raw bytes plus the geometry they cover.
#[derive(Debug, Clone)]
pub struct PixmapReply {
    /// Region the bytes cover.
    pub region: Region,
    /// Packed pixel bytes, in the capture's native format.
    pub bytes: Vec<u8>,
}

/// Events the capture layer's `pollEvent()` can surface.
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    /// A region of the desktop changed.
    DamageNotify(Region),
    /// The display was resized via Randr.
    RandrScreenChange {
        /// New framebuffer width.
        width: u16,
        /// New framebuffer height.
        height: u16,
    },
    /// The active XKB keyboard layout group changed.
    XkbGroupChange(u32),
    /// The X11 selection (clipboard) changed.
    SelectionNotify,
}

/// Status codes `ExtendedDesktopSize` replies with, per spec §7's
/// Capture/Randr error class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesktopSizeStatus {
    /// The resize was applied.
    Ok = 0,
    /// The resize was refused (policy or out-of-range request).
    Refused = 1,
    /// An out-of-band resize (e.g. a local admin action) occurred.
    OutOfBand = 3,
}

/// Boxed-closure handlers the protocol engine calls into, replacing the
/// original's virtual `ChannelClient`/connector hooks. Every field is
/// optional; a connection that never wires a handler simply doesn't
/// invoke it. All closures are `Send + Sync` since they may be called
/// from any connection task.
#[derive(Default)]
pub struct Collaborators {
    /// Called when the capture layer reports a damaged region.
    pub on_damage: Option<Box<dyn Fn(Region) + Send + Sync>>,

    /// Called once a login session is established: `(display, user, uid)`.
    pub on_login_success: Option<Box<dyn Fn(i32, &str, u32) + Send + Sync>>,

    /// Called when the manager bus asks this connector to shut down its
    /// display.
    pub on_shutdown: Option<Box<dyn Fn(i32) + Send + Sync>>,

    /// Called when the peer (or the manager bus) asks for a new LTSM
    /// channel to be created: `(client_url, server_url)`.
    pub on_create_channel: Option<Box<dyn Fn(&str, &str) + Send + Sync>>,

    /// Called when a channel should be torn down.
    pub on_destroy_channel: Option<Box<dyn Fn(u8) + Send + Sync>>,

    /// Called when the client's clipboard selection changed, with the
    /// new selection bytes.
    pub on_clipboard: Option<Box<dyn Fn(&[u8]) + Send + Sync>>,

    /// Called when the client requests a desktop resize:
    /// `(width, height) -> status`.
    pub on_resize_request: Option<Box<dyn Fn(u16, u16) -> DesktopSizeStatus + Send + Sync>>,

    /// Called when a keyboard layout/group change needs reporting
    /// upstream.
    pub on_keyboard_change: Option<Box<dyn Fn(&[String], i32) + Send + Sync>>,

    /// Called when the idle-tracking interval crosses the configured
    /// timeout with no input activity.
    pub on_session_idle: Option<Box<dyn Fn() + Send + Sync>>,

    /// Called when the connector should report itself alive to the
    /// manager bus (periodic heartbeat).
    pub on_connector_alive: Option<Box<dyn Fn(i32) + Send + Sync>>,
}

impl Collaborators {
    /// Builds a `Collaborators` with every handler unset.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Invokes `on_damage` if set.
    pub fn damage(&self, region: Region) {
        if let Some(f) = &self.on_damage {
            f(region);
        }
    }

    /// Invokes `on_login_success` if set.
    pub fn login_success(&self, display: i32, user: &str, uid: u32) {
        if let Some(f) = &self.on_login_success {
            f(display, user, uid);
        }
    }

    /// Invokes `on_shutdown` if set.
    pub fn shutdown(&self, display: i32) {
        if let Some(f) = &self.on_shutdown {
            f(display);
        }
    }

    /// Invokes `on_create_channel` if set.
    pub fn create_channel(&self, client_url: &str, server_url: &str) {
        if let Some(f) = &self.on_create_channel {
            f(client_url, server_url);
        }
    }

    /// Invokes `on_destroy_channel` if set.
    pub fn destroy_channel(&self, id: u8) {
        if let Some(f) = &self.on_destroy_channel {
            f(id);
        }
    }

    /// Invokes `on_clipboard` if set.
    pub fn clipboard(&self, bytes: &[u8]) {
        if let Some(f) = &self.on_clipboard {
            f(bytes);
        }
    }

    /// Invokes `on_resize_request` if set, defaulting to `Refused` when
    /// no handler is wired (no capture backend to honor the request).
    #[must_use]
    pub fn resize_request(&self, width: u16, height: u16) -> DesktopSizeStatus {
        self.on_resize_request.as_ref().map_or(DesktopSizeStatus::Refused, |f| f(width, height))
    }

    /// Invokes `on_keyboard_change` if set.
    pub fn keyboard_change(&self, layouts: &[String], group: i32) {
        if let Some(f) = &self.on_keyboard_change {
            f(layouts, group);
        }
    }

    /// Invokes `on_session_idle` if set.
    pub fn session_idle(&self) {
        if let Some(f) = &self.on_session_idle {
            f();
        }
    }

    /// Invokes `on_connector_alive` if set.
    pub fn connector_alive(&self, display: i32) {
        if let Some(f) = &self.on_connector_alive {
            f(display);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn unset_handlers_are_no_ops() {
        let collaborators = Collaborators::new();
        collaborators.damage(Region::new(0, 0, 1, 1));
        collaborators.login_success(1, "user", 1000);
        assert_eq!(collaborators.resize_request(1920, 1080), DesktopSizeStatus::Refused);
    }

    #[test]
    fn wired_handler_is_invoked() {
        let called = Arc::new(AtomicBool::new(false));
        let called2 = Arc::clone(&called);
        let mut collaborators = Collaborators::new();
        collaborators.on_shutdown = Some(Box::new(move |_display| {
            called2.store(true, Ordering::SeqCst);
        }));
        collaborators.shutdown(7);
        assert!(called.load(Ordering::SeqCst));
    }
}
