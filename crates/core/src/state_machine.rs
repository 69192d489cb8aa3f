//! Room State Machine: every mutation returns `changed: bool` plus the
//! fan-out events to emit (only non-empty when `changed` is true). Callers
//! hold the room's write guard (a `parking_lot::Mutex`) for the duration of
//! these calls and release it before touching the media plane or any other
//! suspension point — these methods themselves never await anything.

use std::collections::HashSet;

use crate::events::Event;
use crate::identity::{is_guest_key, strip_session, UserId, UserKey};
use crate::media_plane::{MediaKind, MediaType, ProducerId};
use crate::model::{
    Participant, ParticipantMode, PendingEntry, PolicyUpdate, ProducerKey, ProducerRef, Room, SocketRef,
};

/// Outcome of a mutation: whether state changed, and the events to emit
/// (to the room channel and/or specific sockets) as a result.
pub struct Mutation {
    pub changed: bool,
    pub events: Vec<(Target, Event)>,
}

#[derive(Clone)]
pub enum Target {
    Channel,
    ChannelExcept(UserId),
    Socket(SocketRef),
}

impl Mutation {
    fn none() -> Self {
        Self { changed: false, events: vec![] }
    }

    fn changed(events: Vec<(Target, Event)>) -> Self {
        Self { changed: true, events }
    }
}

impl Room {
    /// Applies only the fields present in `update`. On `locked: true`,
    /// grandfathers every current participant's `userKey` into
    /// `lockedAllowedUserKeys` so they remain admissible on reconnect.
    pub fn set_policy(&mut self, update: PolicyUpdate) -> Mutation {
        let mut events = Vec::new();
        let mut changed = false;

        if let Some(locked) = update.locked {
            if self.policies.locked != locked {
                self.policies.locked = locked;
                changed = true;
                if locked {
                    for p in self.clients.values() {
                        self.locked_allowed_user_keys.insert(p.user_key.clone());
                    }
                }
                events.push((Target::Channel, Event::RoomLockChanged { locked }));
            }
        }
        if let Some(chat_locked) = update.chat_locked {
            if self.policies.chat_locked != chat_locked {
                self.policies.chat_locked = chat_locked;
                changed = true;
                events.push((Target::Channel, Event::ChatLockChanged { chat_locked }));
            }
        }
        if let Some(no_guests) = update.no_guests {
            if self.policies.no_guests != no_guests {
                self.policies.no_guests = no_guests;
                changed = true;
                events.push((Target::Channel, Event::NoGuestsChanged { no_guests }));
            }
        }
        if let Some(tts_disabled) = update.tts_disabled {
            if self.policies.tts_disabled != tts_disabled {
                self.policies.tts_disabled = tts_disabled;
                changed = true;
                events.push((Target::Channel, Event::TtsDisabledChanged { tts_disabled }));
            }
        }
        if let Some(dm_enabled) = update.dm_enabled {
            if self.policies.dm_enabled != dm_enabled {
                self.policies.dm_enabled = dm_enabled;
                changed = true;
                events.push((Target::Channel, Event::DmStateChanged { dm_enabled }));
            }
        }
        if let Some(req) = update.requires_meeting_invite_code {
            if self.policies.requires_meeting_invite_code != req {
                self.policies.requires_meeting_invite_code = req;
                changed = true;
            }
        }

        if changed {
            Mutation::changed(events)
        } else {
            Mutation::none()
        }
    }

    /// Reconciliation on `locked=false`: every pending entry whose
    /// `userKey ∈ allowedUserKeys` is auto-admitted. Returns the list of
    /// pending entries to admit (caller performs admission via the
    /// Admission Engine since that also drives participant installation).
    pub fn pending_auto_admissible(&self) -> Vec<UserKey> {
        self.pending_clients
            .keys()
            .filter(|k| self.allowed_user_keys.contains(*k))
            .cloned()
            .collect()
    }

    pub fn allow_user(&mut self, key: &str) -> Mutation {
        if self.allowed_user_keys.insert(key.to_string()) {
            Mutation::changed(vec![])
        } else {
            Mutation::none()
        }
    }

    pub fn revoke_allowed_user(&mut self, key: &str) -> Mutation {
        if self.allowed_user_keys.remove(key) {
            Mutation::changed(vec![])
        } else {
            Mutation::none()
        }
    }

    pub fn allow_locked_user(&mut self, key: &str) -> Mutation {
        if self.locked_allowed_user_keys.insert(key.to_string()) {
            Mutation::changed(vec![])
        } else {
            Mutation::none()
        }
    }

    pub fn revoke_locked_allowed_user(&mut self, key: &str) -> Mutation {
        if self.locked_allowed_user_keys.remove(key) {
            Mutation::changed(vec![])
        } else {
            Mutation::none()
        }
    }

    /// `blockUser` does not implicitly remove from `allowedUserKeys` (I4 is
    /// enforced as "block wins" at evaluation time in the Admission Engine,
    /// not by mutating `allowedUserKeys` here).
    pub fn block_user(&mut self, key: &str) -> Mutation {
        if self.blocked_user_keys.insert(key.to_string()) {
            Mutation::changed(vec![])
        } else {
            Mutation::none()
        }
    }

    /// `unblockUser` does not restore prior allow state (open question,
    /// resolved in DESIGN.md: no implicit restoration).
    pub fn unblock_user(&mut self, key: &str) -> Mutation {
        if self.blocked_user_keys.remove(key) {
            Mutation::changed(vec![])
        } else {
            Mutation::none()
        }
    }

    /// Adds to `pendingClients`, replacing any prior pending entry for the
    /// same key. Returns the superseded entry's socket (if distinct from the
    /// new one) so the caller can send it `joinSuperseded` and disconnect it.
    pub fn enroll_pending(&mut self, pending: PendingEntry) -> (Mutation, Option<SocketRef>) {
        let superseded = self.pending_clients.insert(pending.user_key.clone(), pending);
        let superseded_socket = superseded.map(|p| p.socket);
        (Mutation::changed(vec![]), superseded_socket)
    }

    pub fn remove_pending(&mut self, user_key: &str) -> Mutation {
        if self.pending_clients.remove(user_key).is_some() {
            Mutation::changed(vec![])
        } else {
            Mutation::none()
        }
    }

    /// Promotes the session identified by `userId` to administrator. Ghosts
    /// and webinar attendees are not eligible (I8).
    pub fn promote_to_admin(&mut self, user_id: &str) -> Result<Mutation, &'static str> {
        let Some(p) = self.clients.get(user_id) else {
            return Err("participant not found");
        };
        if !p.mode.admin_eligible() {
            return Err("participant's mode is not eligible for admin");
        }
        let key = p.user_key.clone();
        if self.admin_user_keys.insert(key.clone()) {
            Ok(Mutation::changed(vec![(
                Target::Channel,
                Event::AdminUsersChanged {
                    admin_user_keys: self.admin_user_keys.iter().cloned().collect(),
                },
            )]))
        } else {
            Ok(Mutation::none())
        }
    }

    pub fn demote_admin(&mut self, user_key: &str) -> Mutation {
        if self.admin_user_keys.remove(user_key) {
            if self.host_user_key.as_deref() == Some(user_key) {
                self.host_user_key = None;
            }
            Mutation::changed(vec![(
                Target::Channel,
                Event::AdminUsersChanged {
                    admin_user_keys: self.admin_user_keys.iter().cloned().collect(),
                },
            )])
        } else {
            Mutation::none()
        }
    }

    pub fn set_host(&mut self, user_key: &str) -> Mutation {
        if self.host_user_key.as_deref() == Some(user_key) {
            return Mutation::none();
        }
        self.admin_user_keys.insert(user_key.to_string());
        self.host_user_key = Some(user_key.to_string());
        Mutation::changed(vec![(
            Target::Channel,
            Event::HostChanged { host_user_key: user_key.to_string() },
        )])
    }

    /// Lowers every raised hand uniformly, including the host's (DESIGN.md:
    /// the source treats all participants uniformly; we keep that).
    pub fn clear_hands(&mut self) -> Mutation {
        if self.hand_raised_by_user_id.is_empty() {
            return Mutation::none();
        }
        self.hand_raised_by_user_id.clear();
        Mutation::changed(vec![(Target::Channel, Event::AdminHandsCleared {})])
    }

    pub fn raise_hand(&mut self, user_id: &str) -> Mutation {
        if self.hand_raised_by_user_id.iter().any(|u| u == user_id) {
            return Mutation::none();
        }
        self.hand_raised_by_user_id.push(user_id.to_string());
        Mutation::changed(vec![(
            Target::Channel,
            Event::HandRaisedSnapshot { hand_raised_by_user_id: self.hand_raised_by_user_id.clone() },
        )])
    }

    pub fn lower_hand(&mut self, user_id: &str) -> Mutation {
        let before = self.hand_raised_by_user_id.len();
        self.hand_raised_by_user_id.retain(|u| u != user_id);
        if self.hand_raised_by_user_id.len() == before {
            return Mutation::none();
        }
        Mutation::changed(vec![(
            Target::Channel,
            Event::HandRaisedSnapshot { hand_raised_by_user_id: self.hand_raised_by_user_id.clone() },
        )])
    }

    /// Locates the producer's owner, removes the producer entry, and clears
    /// `screenShareProducerId` if the closed producer was the screen share.
    /// Returns `(owner_user_id, kind, type)` on success.
    pub fn close_producer(&mut self, producer_id: &ProducerId) -> Option<(UserId, MediaKind, MediaType)> {
        let owner_id = self
            .clients
            .values()
            .find(|p| p.producer_by_id(producer_id).is_some())
            .map(|p| p.user_id.clone())?;

        let participant = self.clients.get_mut(&owner_id)?;
        let key = participant
            .producers
            .iter()
            .find(|(_, v)| &v.producer_id == producer_id)
            .map(|(k, _)| k.clone())?;
        let removed = participant.producers.remove(&key)?;

        if self.screen_share_producer_id.as_ref() == Some(producer_id) {
            self.screen_share_producer_id = None;
        }

        Some((owner_id, removed.kind, removed.media_type))
    }

    /// Registers a newly created producer on its owner, enforcing I7 (at
    /// most one producer per (kind, type) — the caller is responsible for
    /// closing any pre-existing producer of the same key first).
    pub fn install_producer(&mut self, user_id: &str, producer_id: ProducerId, kind: MediaKind, media_type: MediaType) {
        if let Some(p) = self.clients.get_mut(user_id) {
            let key = ProducerKey { kind, media_type };
            p.producers.insert(key, ProducerRef { producer_id, kind, media_type });
        }
    }

    /// Closes the participant's transports and producers, emits
    /// `producerClosed` to peers for each removed producer, and removes
    /// them from `clients`/`userKeysById`. Preserves `adminUserKeys` /
    /// `hostUserKey` (identity-scoped) unless explicitly demoted elsewhere.
    pub fn remove_participant(&mut self, user_id: &str) -> Option<(Participant, Vec<(Target, Event)>)> {
        let participant = self.clients.remove(user_id)?;
        self.user_keys_by_id.remove(user_id);
        self.pending_disconnects.remove(user_id);

        let mut events = Vec::new();
        for (_, producer) in participant.producers.iter() {
            if self.screen_share_producer_id.as_ref() == Some(&producer.producer_id) {
                self.screen_share_producer_id = None;
            }
            events.push((
                Target::ChannelExcept(user_id.to_string()),
                Event::ProducerClosed {
                    producer_id: producer.producer_id.clone(),
                    user_id: user_id.to_string(),
                    kind: format!("{:?}", producer.kind).to_lowercase(),
                    media_type: format!("{:?}", producer.media_type).to_lowercase(),
                },
            ));
        }
        self.hand_raised_by_user_id.retain(|u| u != user_id);

        Some((participant, events))
    }

    pub fn update_display_name(&mut self, user_key: &str, display_name: String) -> Mutation {
        let prior = self.display_names_by_user_key.get(user_key).cloned();
        if prior.as_deref() == Some(display_name.as_str()) {
            return Mutation::none();
        }
        self.display_names_by_user_key.insert(user_key.to_string(), display_name.clone());
        for p in self.clients.values_mut() {
            if p.user_key == user_key {
                p.display_name = display_name.clone();
            }
        }
        Mutation::changed(vec![(
            Target::Channel,
            Event::DisplayNameUpdated { user_id: user_key.to_string(), display_name },
        )])
    }

    /// Resolves a chat DM target per §4.7: case-insensitive, punctuation
    /// `[,:;.!?]+` stripped from the token end, matching `userId`, bare
    /// `userKey` (userId without session suffix), local handle (before `@`),
    /// or current display name. Returns the set of matching `userId`s.
    pub fn resolve_chat_target(&self, raw_handle: &str) -> HashSet<UserId> {
        let trimmed = raw_handle.trim_end_matches([',', ':', ';', '.', '!', '?']);
        let needle = trimmed.to_lowercase();
        let mut matches = HashSet::new();

        for p in self.clients.values() {
            let user_id_lower = p.user_id.to_lowercase();
            let user_key_lower = strip_session(&p.user_id).to_lowercase();
            let local_handle = p.user_key.split('@').next().unwrap_or(&p.user_key).to_lowercase();
            let display_lower = p.display_name.to_lowercase();

            if user_id_lower == needle || user_key_lower == needle || local_handle == needle || display_lower == needle {
                matches.insert(p.user_id.clone());
            }
        }
        matches
    }

    pub fn is_guest(&self, user_key: &str) -> bool {
        is_guest_key(user_key)
    }
}
