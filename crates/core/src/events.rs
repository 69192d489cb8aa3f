//! Event fan-out: typed notifications to rooms/administrators. Grounded on
//! the reference repo's `ws/storage.rs` (connection bookkeeping) and
//! `ws/dispatcher.rs` (broadcast-by-id), generalized from per-user to
//! per-channel groups since an entire channel, not just a user, is the unit
//! of broadcast here.

use dashmap::DashMap;
use serde::Serialize;

use crate::identity::{ChannelId, UserId};
use crate::model::SocketRef;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "payload", rename_all_fields = "camelCase")]
pub enum Event {
    ProducerClosed { producer_id: String, user_id: String, kind: String, media_type: String },
    AdminProducerClosed { producer_id: String, user_id: String, kind: String, media_type: String },
    AdminMediaEnforced { user_id: String, reason: String, closed: Vec<String> },
    AdminBulkMediaEnforced { reason: String, closed_count: usize, affected_user_ids: Vec<String> },
    RoomLockChanged { locked: bool },
    ChatLockChanged { chat_locked: bool },
    NoGuestsChanged { no_guests: bool },
    TtsDisabledChanged { tts_disabled: bool },
    DmStateChanged { dm_enabled: bool },
    HostChanged { host_user_key: String },
    AdminUsersChanged { admin_user_keys: Vec<String> },
    PendingUsersSnapshot { pending: Vec<serde_json::Value> },
    UserAdmitted { user_key: String },
    UserRejected { user_key: String, reason: String },
    Kicked { reason: String },
    HandRaisedSnapshot { hand_raised_by_user_id: Vec<String> },
    AdminHandsCleared {},
    AdminNotice { message: String },
    RoomEnded { reason: String },
    ServerRestarting { reconnecting: bool, notice: Option<String> },
    DisplayNameUpdated { user_id: String, display_name: String },
    JoinSuperseded {},
    JoinApproved {},
    MediaEnforced { reason: String, producer_id: Option<String>, kind: Option<String>, media_type: Option<String> },
    ChatMessage { from_user_id: String, display_name: String, body: String },
    ChatDirect { from_user_id: String, to_user_id: String, display_name: String, body: String },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::ProducerClosed { .. } => "producerClosed",
            Event::AdminProducerClosed { .. } => "admin:producerClosed",
            Event::AdminMediaEnforced { .. } => "admin:mediaEnforced",
            Event::AdminBulkMediaEnforced { .. } => "admin:bulkMediaEnforced",
            Event::RoomLockChanged { .. } => "roomLockChanged",
            Event::ChatLockChanged { .. } => "chatLockChanged",
            Event::NoGuestsChanged { .. } => "noGuestsChanged",
            Event::TtsDisabledChanged { .. } => "ttsDisabledChanged",
            Event::DmStateChanged { .. } => "dmStateChanged",
            Event::HostChanged { .. } => "hostChanged",
            Event::AdminUsersChanged { .. } => "adminUsersChanged",
            Event::PendingUsersSnapshot { .. } => "pendingUsersSnapshot",
            Event::UserAdmitted { .. } => "userAdmitted",
            Event::UserRejected { .. } => "userRejected",
            Event::Kicked { .. } => "kicked",
            Event::HandRaisedSnapshot { .. } => "handRaisedSnapshot",
            Event::AdminHandsCleared {} => "admin:handsCleared",
            Event::AdminNotice { .. } => "adminNotice",
            Event::RoomEnded { .. } => "roomEnded",
            Event::ServerRestarting { .. } => "serverRestarting",
            Event::DisplayNameUpdated { .. } => "displayNameUpdated",
            Event::JoinSuperseded {} => "joinSuperseded",
            Event::JoinApproved {} => "joinApproved",
            Event::MediaEnforced { .. } => "mediaEnforced",
            Event::ChatMessage { .. } => "chatMessage",
            Event::ChatDirect { .. } => "chatDirect",
        }
    }

    /// Just the variant's fields, not the `{event, payload}` envelope the
    /// `tag`/`content` representation wraps them in — callers pair this
    /// with `name()` to build their own transport-level envelope.
    pub fn payload(&self) -> serde_json::Value {
        let tagged = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        tagged.get("payload").cloned().unwrap_or(serde_json::Value::Null)
    }
}

/// Tracks every socket belonging to a channel (broadcast group), alongside
/// the `userId` it belongs to so a single logical operation (e.g. "close
/// this participant's producer") can exclude that participant's own socket
/// from the room-wide notification without the caller needing to thread a
/// `SocketRef` of its own through the Moderation Engine. A socket may also
/// be tracked as a "pending" (waiting-room) member of a channel, addressed
/// separately by `disconnect_pending`.
#[derive(Default)]
pub struct ChannelBus {
    members: DashMap<ChannelId, Vec<(UserId, SocketRef)>>,
    pending: DashMap<ChannelId, Vec<SocketRef>>,
}

impl ChannelBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&self, channel: &ChannelId, user_id: UserId, socket: SocketRef) {
        self.members.entry(channel.clone()).or_default().push((user_id, socket));
    }

    pub fn leave(&self, channel: &ChannelId, socket: &SocketRef) {
        if let Some(mut v) = self.members.get_mut(channel) {
            v.retain(|(_, s)| !std::sync::Arc::ptr_eq(s, socket));
            if v.is_empty() {
                drop(v);
                self.members.remove(channel);
            }
        }
    }

    pub fn join_pending(&self, channel: &ChannelId, socket: SocketRef) {
        self.pending.entry(channel.clone()).or_default().push(socket);
    }

    pub fn leave_pending(&self, channel: &ChannelId, socket: &SocketRef) {
        if let Some(mut v) = self.pending.get_mut(channel) {
            v.retain(|s| !std::sync::Arc::ptr_eq(s, socket));
            if v.is_empty() {
                drop(v);
                self.pending.remove(channel);
            }
        }
    }

    pub fn send_to_channel(&self, channel: &ChannelId, event: &Event) {
        if let Some(v) = self.members.get(channel) {
            for (_, s) in v.iter() {
                s.send(event.name(), event.payload());
            }
        }
    }

    pub fn send_to_channel_except(&self, channel: &ChannelId, except_user_id: &UserId, event: &Event) {
        if let Some(v) = self.members.get(channel) {
            for (uid, s) in v.iter() {
                if uid == except_user_id {
                    continue;
                }
                s.send(event.name(), event.payload());
            }
        }
    }

    /// Same as [`Self::send_to_channel_except`] but excludes every `userId`
    /// in `excluded`, not just one — used by producer-close fan-out, which
    /// must reach every peer except the producer's owner and any webinar
    /// attendee (watch-only participants never see another peer's media
    /// lifecycle events).
    pub fn send_to_channel_except_set(&self, channel: &ChannelId, excluded: &std::collections::HashSet<UserId>, event: &Event) {
        if let Some(v) = self.members.get(channel) {
            for (uid, s) in v.iter() {
                if excluded.contains(uid) {
                    continue;
                }
                s.send(event.name(), event.payload());
            }
        }
    }

    pub fn send_to_pending_channel(&self, channel: &ChannelId, event: &Event) {
        if let Some(v) = self.pending.get(channel) {
            for s in v.iter() {
                s.send(event.name(), event.payload());
            }
        }
    }

    pub fn send_to_socket(&self, handle: &SocketRef, event: &Event) {
        handle.send(event.name(), event.payload());
    }

    pub fn disconnect_channel(&self, channel: &ChannelId) {
        if let Some((_, v)) = self.members.remove(channel) {
            for s in v {
                s.disconnect(true);
            }
        }
    }

    pub fn disconnect_pending_channel(&self, channel: &ChannelId) {
        if let Some((_, v)) = self.pending.remove(channel) {
            for s in v {
                s.disconnect(true);
            }
        }
    }

    pub fn all_channels(&self) -> Vec<ChannelId> {
        self.members.iter().map(|e| e.key().clone()).collect()
    }

    pub fn all_pending_channels(&self) -> Vec<ChannelId> {
        self.pending.iter().map(|e| e.key().clone()).collect()
    }
}
