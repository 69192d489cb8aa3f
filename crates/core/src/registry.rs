//! Channel-id keyed map of rooms across all tenants. Grounded on the
//! reference repo's `RoomManager` (`DashMap<ObjectId, MediaRoom>`), adapted
//! to this crate's `channelId = "{clientId}:{roomId}"` keying and the
//! tenant-disambiguation contract spec'd for `resolveByRoomId`.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::error::{CoreError, CoreResult};
use crate::identity::{channel_id, ChannelId};
use crate::model::Room;

/// A room plus the write guard serializing mutations to it (§5: "Each Room
/// has a single write guard serializing mutations"). The guard is a plain
/// (non-async) mutex — no `.await` is ever reached while it is held.
pub struct RoomEntry {
    pub guard: Mutex<Room>,
}

impl RoomEntry {
    fn new(room: Room) -> Arc<Self> {
        Arc::new(Self { guard: Mutex::new(room) })
    }
}

#[derive(Default)]
pub struct RoomRegistry {
    rooms: DashMap<ChannelId, Arc<RoomEntry>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, channel: &ChannelId) -> Option<Arc<RoomEntry>> {
        self.rooms.get(channel).map(|e| e.clone())
    }

    /// Returns the existing room entry for `(clientId, roomId)`, creating
    /// one if absent. The short-lived registry guard (the `DashMap` shard
    /// lock) covers only this lookup-or-insert, never the room's own
    /// mutations.
    pub fn create_if_absent(&self, client_id: &str, room_id: &str) -> Arc<RoomEntry> {
        let channel = channel_id(client_id, room_id);
        self.rooms
            .entry(channel)
            .or_insert_with(|| RoomEntry::new(Room::new(room_id.to_string(), client_id.to_string())))
            .clone()
    }

    pub fn list_by_client_id(&self, client_id: &str) -> Vec<ChannelId> {
        self.rooms
            .iter()
            .filter(|e| e.guard.lock().client_id == client_id)
            .map(|e| e.key().clone())
            .collect()
    }

    pub fn all_channel_ids(&self) -> Vec<ChannelId> {
        self.rooms.iter().map(|e| e.key().clone()).collect()
    }

    /// Resolves a bare `roomId` (optionally scoped by `clientId`) to a room
    /// entry. When `clientId` is supplied, looks up that exact channel. When
    /// absent, scans for every channel whose `roomId` component matches; zero
    /// matches is `not_found`, more than one is `ambiguous` with the
    /// candidate channel ids, exactly one is a hit.
    pub fn resolve_by_room_id(
        &self,
        room_id: &str,
        client_id: Option<&str>,
    ) -> CoreResult<(ChannelId, Arc<RoomEntry>)> {
        if let Some(client_id) = client_id {
            let channel = channel_id(client_id, room_id);
            return match self.rooms.get(&channel) {
                Some(e) => Ok((channel, e.clone())),
                None => Err(CoreError::NotFound(format!("room {channel} not found"))),
            };
        }

        let candidates: Vec<ChannelId> = self
            .rooms
            .iter()
            .filter(|e| e.guard.lock().id == room_id)
            .map(|e| e.key().clone())
            .collect();

        match candidates.len() {
            0 => Err(CoreError::NotFound(format!("room {room_id} not found"))),
            1 => {
                let channel = candidates.into_iter().next().unwrap();
                let entry = self.rooms.get(&channel).unwrap().clone();
                Ok((channel, entry))
            }
            _ => Err(CoreError::Ambiguous(candidates)),
        }
    }

    /// Marks the room for teardown: closes every producer/transport through
    /// the media plane, disconnects every socket, then removes it from the
    /// registry. Idempotent — a second call for an already-removed channel
    /// is a no-op.
    pub async fn force_close(
        &self,
        channel: &ChannelId,
        media_plane: &dyn crate::media_plane::MediaPlane,
        bus: &crate::events::ChannelBus,
    ) {
        let Some((_, entry)) = self.rooms.remove(channel) else {
            return;
        };
        bus.disconnect_channel(channel);
        bus.disconnect_pending_channel(channel);
        media_plane.destroy_router(channel).await;
        drop(entry);
    }

    /// Removes the room if it is empty and idle (no pending waiting-room
    /// entries, no active transcription/minutes hold registered by the
    /// caller). Called after any mutation that may have emptied the room.
    pub fn remove_if_idle(&self, channel: &ChannelId) -> bool {
        let should_remove = self
            .rooms
            .get(channel)
            .map(|e| e.guard.lock().is_empty_and_idle())
            .unwrap_or(false);
        if should_remove {
            self.rooms.remove(channel);
        }
        should_remove
    }
}
