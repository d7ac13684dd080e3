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

//! Owns the three channel tables (`channels`, `planned`, `listeners`)
//! and the id-allocation rule, grounded on
//! `original_source/src/channels/channel_system.h`'s `ChannelClient`
//! (`findChannel`, `findPlanned`, `systemChannelOpen`/`Connected`/`Close`).
//!
//! Lock order is fixed at `channels -> planned -> listeners`, matching
//! the original's `scoped_lock{lockch, lockpl}` pattern, to avoid
//! deadlocks between the protocol FSM (which may need all three while
//! servicing a `ChannelOpen`) and the maintenance task's `reap`.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use super::connector::{Connector, ConnectorEvent, LtsmSink};
use super::listener::Listener;
use super::types::{ChannelId, ChannelMode, Planned, MAX_CHANNEL_ID};
use crate::error::{Result, VncError};

/// Owns every running channel, every planned (not-yet-confirmed) channel,
/// and every active listener for one connection.
pub struct ChannelController {
    channels: Mutex<HashMap<ChannelId, Connector>>,
    planned: Mutex<HashMap<ChannelId, Planned>>,
    listeners: Mutex<Vec<Listener>>,
}

impl Default for ChannelController {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelController {
    /// Builds an empty controller for a new connection.
    #[must_use]
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            planned: Mutex::new(HashMap::new()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Returns `min({1..=253} \ (running ids ∪ planned ids))`, or `None`
    /// if every id is taken.
    pub async fn allocate_id(&self) -> Option<ChannelId> {
        let channels = self.channels.lock().await;
        let planned = self.planned.lock().await;
        (1..=MAX_CHANNEL_ID).find(|id| !channels.contains_key(id) && !planned.contains_key(id))
    }

    /// Inserts a `Planned` record for a server-initiated `createChannel`
    /// call. Returns the allocated id.
    ///
    /// # Errors
    ///
    /// Returns `Err` if every assignable id is already in use.
    pub async fn plan_channel(&self, mut planned: Planned) -> Result<ChannelId> {
        let channels = self.channels.lock().await;
        let mut table = self.planned.lock().await;
        let id = (1..=MAX_CHANNEL_ID)
            .find(|id| !channels.contains_key(id) && !table.contains_key(id))
            .ok_or_else(|| VncError::InvalidOperation("no free channel id".into()))?;
        planned.channel = id;
        table.insert(id, planned);
        Ok(id)
    }

    /// Looks up and removes a planned entry, e.g. when a `ChannelConnected`
    /// reply arrives or an open attempt fails.
    pub async fn take_planned(&self, id: ChannelId) -> Option<Planned> {
        self.planned.lock().await.remove(&id)
    }

    /// Moves a newly spawned connector into the running `channels` table.
    pub async fn insert_channel(&self, connector: Connector) {
        let id = connector.channel();
        self.channels.lock().await.insert(id, connector);
    }

    /// Queues `data` (decoded from an incoming LTSM frame) for the
    /// channel's writer worker.
    ///
    /// # Errors
    ///
    /// Returns `Err(ChannelNotFound)` if `id` has no running connector,
    /// or `Err(ChannelStopped)` if the connector's writer has exited.
    pub async fn dispatch_inbound(&self, id: ChannelId, data: Vec<u8>) -> Result<()> {
        let channels = self.channels.lock().await;
        let connector = channels.get(&id).ok_or(VncError::ChannelNotFound(id))?;
        connector.push_inbound(data)
    }

    /// Clears a channel's running flag so its workers exit on their own;
    /// the entry itself is removed later by [`Self::reap`].
    ///
    /// # Errors
    ///
    /// Returns `Err(ChannelNotFound)` if `id` has no running connector.
    pub async fn close_channel(&self, id: ChannelId) -> Result<()> {
        let channels = self.channels.lock().await;
        let connector = channels.get(&id).ok_or(VncError::ChannelNotFound(id))?;
        connector.stop();
        Ok(())
    }

    /// Marks a running channel's peer side as connected, once its
    /// `ChannelConnected{error: false}` reply is observed.
    pub async fn mark_remote_connected(&self, id: ChannelId, connected: bool) {
        if let Some(connector) = self.channels.lock().await.get(&id) {
            connector.set_remote_connected(connected);
        }
    }

    /// Removes every channel whose `running` flag has been cleared.
    /// Called periodically by the connection's maintenance interval
    /// (the tokio equivalent of the original's detached 100ms-sleep
    /// deleter thread).
    pub async fn reap(&self) {
        self.channels.lock().await.retain(|_, connector| connector.is_running());
    }

    /// Registers an active listener.
    pub async fn add_listener(&self, listener: Listener) {
        self.listeners.lock().await.push(listener);
    }

    /// Removes listeners that have stopped.
    pub async fn reap_listeners(&self) {
        self.listeners.lock().await.retain(Listener::is_running);
    }

    /// Number of ids still available for allocation.
    pub async fn free_channel_count(&self) -> usize {
        let channels = self.channels.lock().await;
        let planned = self.planned.lock().await;
        usize::from(MAX_CHANNEL_ID) - channels.len() - planned.len()
    }
}

/// Spawns a channel's reader/writer pair and registers it with
/// `controller`, the shared logic behind both `createChannel`'s success
/// path and a listener's accepted-connection path.
pub async fn start_channel(
    controller: &ChannelController,
    id: ChannelId,
    mode: ChannelMode,
    speed: super::types::Speed,
    zlib: bool,
    reader: Option<Box<dyn tokio::io::AsyncRead + Unpin + Send>>,
    writer: Option<Box<dyn tokio::io::AsyncWrite + Unpin + Send>>,
    sink: Arc<dyn LtsmSink>,
    events: tokio::sync::mpsc::UnboundedSender<ConnectorEvent>,
) {
    let connector = Connector::spawn(id, mode, speed, zlib, reader, writer, sink, events);
    controller.insert_channel(connector).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::types::{ConnectorType, Speed};

    fn sample_planned(client_url: &str) -> Planned {
        Planned {
            channel: 0,
            client_type: ConnectorType::Unix,
            client_mode: ChannelMode::ReadWrite,
            server_mode: ChannelMode::ReadWrite,
            client_url: client_url.to_string(),
            server_url: client_url.to_string(),
            speed: Speed::Medium,
            zlib: false,
        }
    }

    #[tokio::test]
    async fn allocates_lowest_free_id() {
        let controller = ChannelController::new();
        let id1 = controller.plan_channel(sample_planned("a")).await.unwrap();
        let id2 = controller.plan_channel(sample_planned("b")).await.unwrap();
        assert_eq!(id1, 1);
        assert_eq!(id2, 2);

        controller.take_planned(1).await;
        let id3 = controller.plan_channel(sample_planned("c")).await.unwrap();
        assert_eq!(id3, 1, "freed id must be reused before allocating a new one");
    }

    #[tokio::test]
    async fn dispatch_to_unknown_channel_is_rejected() {
        let controller = ChannelController::new();
        let err = controller.dispatch_inbound(9, vec![1, 2, 3]).await;
        assert!(matches!(err, Err(VncError::ChannelNotFound(9))));
    }

    #[tokio::test]
    async fn exhausting_ids_fails_without_side_effects() {
        let controller = ChannelController::new();
        for i in 1..=MAX_CHANNEL_ID {
            controller.plan_channel(sample_planned(&i.to_string())).await.unwrap();
        }
        let before = controller.free_channel_count().await;
        assert_eq!(before, 0);
        let err = controller.plan_channel(sample_planned("overflow")).await;
        assert!(err.is_err());
        assert_eq!(controller.free_channel_count().await, 0);
    }
}
