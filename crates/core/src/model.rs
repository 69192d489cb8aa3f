use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::{ChannelId, UserId, UserKey};
use crate::media_plane::{MediaKind, MediaType, ProducerId};

/// Opaque capability over a socket-like connection: send an event, or
/// disconnect it. Never probed for shape — satisfied by whatever the
/// message-bus transport (WebSocket, in-memory channel in tests) provides.
pub trait SocketHandle: Send + Sync + std::fmt::Debug {
    fn send(&self, event: &str, payload: serde_json::Value);
    fn disconnect(&self, close_immediate: bool);
}

pub type SocketRef = std::sync::Arc<dyn SocketHandle>;

/// Capability tier a participant can hold. Derived from membership in the
/// room's admin/host sets, never from a type hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantMode {
    Meeting,
    Ghost,
    WebinarAttendee,
    Observer,
}

impl ParticipantMode {
    /// Webinar attendees and ghosts may never become admins (I8).
    pub fn admin_eligible(self) -> bool {
        matches!(self, ParticipantMode::Meeting | ParticipantMode::Observer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Host,
    Admin,
    Participant,
    Ghost,
    Attendee,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProducerKey {
    pub kind: MediaKind,
    pub media_type: MediaType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProducerRef {
    pub producer_id: ProducerId,
    pub kind: MediaKind,
    pub media_type: MediaType,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policies {
    pub locked: bool,
    pub chat_locked: bool,
    pub no_guests: bool,
    pub tts_disabled: bool,
    pub dm_enabled: bool,
    pub requires_meeting_invite_code: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyUpdate {
    pub locked: Option<bool>,
    pub chat_locked: Option<bool>,
    pub no_guests: Option<bool>,
    pub tts_disabled: Option<bool>,
    pub dm_enabled: Option<bool>,
    pub requires_meeting_invite_code: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct Participant {
    pub user_id: UserId,
    pub user_key: UserKey,
    pub display_name: String,
    pub mode: ParticipantMode,
    pub socket: SocketRef,
    pub producer_transport_id: Option<String>,
    pub consumer_transport_id: Option<String>,
    pub producers: HashMap<ProducerKey, ProducerRef>,
    pub consumer_count: usize,
    pub is_muted: bool,
    pub is_camera_off: bool,
    pub joined_at: DateTime<Utc>,
}

impl Participant {
    pub fn producer_by_id(&self, producer_id: &ProducerId) -> Option<&ProducerRef> {
        self.producers.values().find(|p| &p.producer_id == producer_id)
    }
}

#[derive(Debug, Clone)]
pub struct PendingEntry {
    pub user_key: UserKey,
    pub session_id: String,
    pub display_name: String,
    pub socket: SocketRef,
    pub enrolled_at: DateTime<Utc>,
    pub requested_mode: ParticipantMode,
}

/// A single-room slice of state. Mutated only through the Room State
/// Machine operations in `state_machine.rs`, always under the per-room
/// write guard owned by the registry entry wrapping it.
#[derive(Debug)]
pub struct Room {
    pub id: String,
    pub channel_id: ChannelId,
    pub client_id: String,
    pub created_at: DateTime<Utc>,

    pub clients: HashMap<UserId, Participant>,
    pub user_keys_by_id: HashMap<UserId, UserKey>,
    pub pending_clients: HashMap<UserKey, PendingEntry>,

    pub allowed_user_keys: HashSet<UserKey>,
    pub locked_allowed_user_keys: HashSet<UserKey>,
    pub blocked_user_keys: HashSet<UserKey>,

    pub admin_user_keys: HashSet<UserKey>,
    pub host_user_key: Option<UserKey>,

    pub policies: Policies,

    pub screen_share_producer_id: Option<ProducerId>,
    pub hand_raised_by_user_id: Vec<UserId>,

    pub display_names_by_user_key: HashMap<UserKey, String>,
    pub pending_disconnects: HashSet<UserId>,
}

impl Room {
    pub fn new(id: String, client_id: String) -> Self {
        let channel_id = crate::identity::channel_id(&client_id, &id);
        Self {
            id,
            channel_id,
            client_id,
            created_at: Utc::now(),
            clients: HashMap::new(),
            user_keys_by_id: HashMap::new(),
            pending_clients: HashMap::new(),
            allowed_user_keys: HashSet::new(),
            locked_allowed_user_keys: HashSet::new(),
            blocked_user_keys: HashSet::new(),
            admin_user_keys: HashSet::new(),
            host_user_key: None,
            policies: Policies::default(),
            screen_share_producer_id: None,
            hand_raised_by_user_id: Vec::new(),
            display_names_by_user_key: HashMap::new(),
            pending_disconnects: HashSet::new(),
        }
    }

    pub fn is_empty_and_idle(&self) -> bool {
        self.clients.is_empty() && self.pending_clients.is_empty()
    }

    pub fn role_of(&self, user_key: &str) -> Role {
        if self.host_user_key.as_deref() == Some(user_key) {
            Role::Host
        } else if self.admin_user_keys.contains(user_key) {
            Role::Admin
        } else {
            Role::Participant
        }
    }

    pub fn role_of_participant(&self, p: &Participant) -> Role {
        match p.mode {
            ParticipantMode::Ghost => Role::Ghost,
            ParticipantMode::WebinarAttendee | ParticipantMode::Observer => {
                if self.role_of(&p.user_key) == Role::Participant {
                    Role::Attendee
                } else {
                    self.role_of(&p.user_key)
                }
            }
            ParticipantMode::Meeting => self.role_of(&p.user_key),
        }
    }

    /// `userId`s currently in a watch-only attendee mode — excluded from
    /// peer-to-peer producer lifecycle notifications (§4.5: `producerClosed`
    /// reaches every peer except the owner and webinar attendees).
    pub fn webinar_attendee_user_ids(&self) -> std::collections::HashSet<UserId> {
        self.clients
            .values()
            .filter(|p| matches!(p.mode, ParticipantMode::WebinarAttendee | ParticipantMode::Observer))
            .map(|p| p.user_id.clone())
            .collect()
    }

    /// Snapshot accessor: participants ordered by admission time.
    pub fn participants_ordered(&self) -> Vec<&Participant> {
        let mut v: Vec<&Participant> = self.clients.values().collect();
        v.sort_by_key(|p| p.joined_at);
        v
    }

    /// Snapshot accessor: pending list ordered by enrollment time.
    pub fn pending_ordered(&self) -> Vec<&PendingEntry> {
        let mut v: Vec<&PendingEntry> = self.pending_clients.values().collect();
        v.sort_by_key(|p| p.enrolled_at);
        v
    }

    pub fn sorted_user_keys(set: &HashSet<UserKey>) -> BTreeSet<UserKey> {
        set.iter().cloned().collect()
    }

    pub fn other_participants(&self, exclude_user_id: &str) -> Vec<&Participant> {
        self.clients
            .values()
            .filter(|p| p.user_id != exclude_user_id)
            .collect()
    }
}
