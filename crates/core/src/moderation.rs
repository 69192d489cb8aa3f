//! Moderation Engine: producer close by id/selector, bulk media
//! enforcement, kick, identity block, host transfer. Each operation briefly
//! locks the room to mutate state and compute the fan-out, releases the
//! lock, emits events through the `ChannelBus`, then (for anything that
//! must reach the media plane) awaits the `MediaPlane` call — the lock is
//! never held across that await.

use crate::error::{CoreError, CoreResult};
use crate::events::Event;
use crate::identity::{ChannelId, UserId, UserKey};
use crate::media_plane::{MediaKind, MediaPlane, MediaPlaneEvent, MediaType, ProducerId};
use crate::events::ChannelBus;
use crate::registry::RoomRegistry;
use crate::state_machine::Target;

#[derive(Debug, Clone, Default)]
pub struct ProducerSelector {
    pub kinds: Option<Vec<MediaKind>>,
    pub types: Option<Vec<MediaType>>,
}

impl ProducerSelector {
    fn matches(&self, kind: MediaKind, media_type: MediaType) -> bool {
        self.kinds.as_ref().map(|k| k.contains(&kind)).unwrap_or(true)
            && self.types.as_ref().map(|t| t.contains(&media_type)).unwrap_or(true)
    }
}

#[derive(Debug, Clone)]
pub struct ClosedProducer {
    pub user_id: UserId,
    pub producer_id: ProducerId,
    pub kind: MediaKind,
    pub media_type: MediaType,
}

/// `closeProducerById`. Idempotent (P4): a second call for an already-closed
/// producer returns `closed=false` with no side effects.
pub async fn close_producer_by_id(
    registry: &RoomRegistry,
    channel: &ChannelId,
    bus: &ChannelBus,
    media_plane: &dyn MediaPlane,
    producer_id: &ProducerId,
) -> CoreResult<Option<ClosedProducer>> {
    let Some(entry) = registry.get(channel) else {
        return Err(CoreError::NotFound(format!("room {channel} not found")));
    };

    let (outcome, mut excluded) = {
        let mut room = entry.guard.lock();
        let outcome = room.close_producer(producer_id);
        let excluded = room.webinar_attendee_user_ids();
        (outcome, excluded)
    };

    let Some((user_id, kind, media_type)) = outcome else {
        return Ok(None);
    };

    let kind_s = format!("{kind:?}").to_lowercase();
    let type_s = format!("{media_type:?}").to_lowercase();

    excluded.insert(user_id.clone());
    bus.send_to_channel_except_set(
        channel,
        &excluded,
        &Event::ProducerClosed {
            producer_id: producer_id.clone(),
            user_id: user_id.clone(),
            kind: kind_s.clone(),
            media_type: type_s.clone(),
        },
    );
    bus.send_to_channel(
        channel,
        &Event::AdminProducerClosed {
            producer_id: producer_id.clone(),
            user_id: user_id.clone(),
            kind: kind_s.clone(),
            media_type: type_s.clone(),
        },
    );

    media_plane.close_producer(channel, producer_id.clone()).await;

    Ok(Some(ClosedProducer { user_id, producer_id: producer_id.clone(), kind, media_type }))
}

/// `closeClientProducers`: enumerates the owner's producers, filters by
/// selector, closes each, and emits a single aggregate `mediaEnforced` to
/// the owner.
pub async fn close_client_producers(
    registry: &RoomRegistry,
    channel: &ChannelId,
    bus: &ChannelBus,
    media_plane: &dyn MediaPlane,
    user_id: &UserId,
    selector: &ProducerSelector,
    reason: &str,
) -> CoreResult<Vec<ClosedProducer>> {
    let Some(entry) = registry.get(channel) else {
        return Err(CoreError::NotFound(format!("room {channel} not found")));
    };

    let (target_ids, owner_socket) = {
        let room = entry.guard.lock();
        let Some(p) = room.clients.get(user_id) else {
            return Err(CoreError::NotFound(format!("participant {user_id} not found")));
        };
        let ids: Vec<ProducerId> = p
            .producers
            .values()
            .filter(|pr| selector.matches(pr.kind, pr.media_type))
            .map(|pr| pr.producer_id.clone())
            .collect();
        (ids, p.socket.clone())
    };

    let mut closed = Vec::new();
    for pid in &target_ids {
        if let Some(c) = close_producer_by_id(registry, channel, bus, media_plane, pid).await? {
            closed.push(c);
        }
    }

    if !closed.is_empty() {
        bus.send_to_socket(
            &owner_socket,
            &Event::MediaEnforced { reason: reason.to_string(), producer_id: None, kind: None, media_type: None },
        );
    }

    Ok(closed)
}

#[derive(Debug, Clone, Default)]
pub struct BulkCloseOptions {
    pub include_admins: bool,
    pub include_ghosts: bool,
    pub include_attendees: bool,
}

/// `bulkClose`: iterates `clients` respecting the include flags, closes
/// matching producers, and emits a room-wide `admin:bulkMediaEnforced` when
/// at least one producer was closed. Admins are never included unless
/// `include_admins` is explicitly set.
pub async fn bulk_close(
    registry: &RoomRegistry,
    channel: &ChannelId,
    bus: &ChannelBus,
    media_plane: &dyn MediaPlane,
    selector: &ProducerSelector,
    opts: &BulkCloseOptions,
    reason: &str,
) -> CoreResult<Vec<ClosedProducer>> {
    let Some(entry) = registry.get(channel) else {
        return Err(CoreError::NotFound(format!("room {channel} not found")));
    };

    let candidates: Vec<UserId> = {
        let room = entry.guard.lock();
        room.clients
            .values()
            .filter(|p| {
                let role = room.role_of_participant(p);
                use crate::model::Role;
                if role == Role::Admin || role == Role::Host {
                    if !opts.include_admins {
                        return false;
                    }
                }
                if matches!(p.mode, crate::model::ParticipantMode::Ghost) && !opts.include_ghosts {
                    return false;
                }
                if matches!(p.mode, crate::model::ParticipantMode::WebinarAttendee | crate::model::ParticipantMode::Observer)
                    && !opts.include_attendees
                {
                    return false;
                }
                true
            })
            .map(|p| p.user_id.clone())
            .collect()
    };

    let mut closed = Vec::new();
    for uid in &candidates {
        closed.extend(close_client_producers(registry, channel, bus, media_plane, uid, selector, reason).await?);
    }

    if !closed.is_empty() {
        bus.send_to_channel(
            channel,
            &Event::AdminBulkMediaEnforced {
                reason: reason.to_string(),
                closed_count: closed.len(),
                affected_user_ids: candidates,
            },
        );
    }

    Ok(closed)
}

/// `kick`: sends `kicked` then disconnects the socket. Does not mutate
/// access lists. An admin cannot kick themselves — rejected by the caller
/// (the operator/socket handler) before reaching this function, since only
/// the caller knows "self" for the current session.
pub fn kick(registry: &RoomRegistry, channel: &ChannelId, bus: &ChannelBus, user_id: &UserId, reason: &str) -> CoreResult<()> {
    let Some(entry) = registry.get(channel) else {
        return Err(CoreError::NotFound(format!("room {channel} not found")));
    };

    let removed = {
        let mut room = entry.guard.lock();
        let Some((participant, events)) = room.remove_participant(user_id) else {
            return Err(CoreError::NotFound(format!("participant {user_id} not found")));
        };
        (participant, events)
    };
    let (participant, producer_events) = removed;

    bus.send_to_socket(&participant.socket, &Event::Kicked { reason: reason.to_string() });
    for (target, event) in producer_events {
        match target {
            Target::Channel => bus.send_to_channel(channel, &event),
            Target::ChannelExcept(uid) => bus.send_to_channel_except(channel, &uid, &event),
            Target::Socket(s) => bus.send_to_socket(&s, &event),
        }
    }
    participant.socket.disconnect(true);

    Ok(())
}

/// Result of [`block_identity`]: whether the block-list mutation actually
/// changed anything (P3/idempotency — a second block of an already-blocked
/// key reports `changed: false`) and which live sessions were kicked.
#[derive(Debug, Clone)]
pub struct BlockOutcome {
    pub changed: bool,
    pub kicked: Vec<UserId>,
}

/// `blockIdentity`: inserts into `blockedUserKeys`, rejects any pending
/// entry for the key, and (if `kick_present`) kicks every active `userId`
/// whose back-lookup equals `userKey`.
pub fn block_identity(
    registry: &RoomRegistry,
    channel: &ChannelId,
    bus: &ChannelBus,
    user_key: &UserKey,
    kick_present: bool,
    reason: &str,
) -> CoreResult<BlockOutcome> {
    let Some(entry) = registry.get(channel) else {
        return Err(CoreError::NotFound(format!("room {channel} not found")));
    };

    let (changed, block_events, to_kick, rejected_pending_socket) = {
        let mut room = entry.guard.lock();
        let mutation = room.block_user(user_key);
        let pending_socket = room.pending_clients.remove(user_key).map(|p| p.socket);

        let to_kick: Vec<UserId> = if kick_present {
            room.clients
                .values()
                .filter(|p| &p.user_key == user_key)
                .map(|p| p.user_id.clone())
                .collect()
        } else {
            vec![]
        };
        (mutation.changed, mutation.events, to_kick, pending_socket)
    };

    for (target, event) in block_events {
        dispatch(bus, channel, target, &event);
    }

    if let Some(socket) = rejected_pending_socket {
        bus.send_to_socket(&socket, &Event::UserRejected { user_key: user_key.clone(), reason: reason.to_string() });
    }

    for uid in &to_kick {
        kick(registry, channel, bus, uid, reason)?;
    }

    Ok(BlockOutcome { changed, kicked: to_kick })
}

/// `transferHost`: validates the target is eligible (not ghost, not
/// attendee), promotes to admin if needed, sets `hostUserKey`.
pub fn transfer_host(registry: &RoomRegistry, channel: &ChannelId, bus: &ChannelBus, to_user_id: &UserId) -> CoreResult<()> {
    let Some(entry) = registry.get(channel) else {
        return Err(CoreError::NotFound(format!("room {channel} not found")));
    };

    let (host_key, promote_events, host_event) = {
        let mut room = entry.guard.lock();
        let Some(p) = room.clients.get(to_user_id) else {
            return Err(CoreError::NotFound(format!("participant {to_user_id} not found")));
        };
        if !p.mode.admin_eligible() {
            return Err(CoreError::Conflict("target participant is not eligible to become host".into()));
        }
        let key = p.user_key.clone();

        let promote = room.promote_to_admin(to_user_id).map_err(|e| CoreError::Conflict(e.to_string()))?;
        let host = room.set_host(&key);
        (key, promote, host)
    };

    for (target, event) in promote_events.events {
        dispatch(bus, channel, target, &event);
    }
    for (target, event) in host_event.events {
        dispatch(bus, channel, target, &event);
    }
    let _ = host_key;

    Ok(())
}

/// Folds an out-of-band [`MediaPlaneEvent`] — the media engine tearing
/// something down on its own (ICE failure, worker crash) rather than in
/// response to a call this crate made — back into room state and the
/// `ChannelBus`. Never calls back into `MediaPlane` here: the engine has
/// already torn down its own side, so this only reconciles the control
/// plane's view of it. Safe to run for a close the control plane itself
/// already handled, since `Room::close_producer`/`remove_participant` are
/// no-ops for an unknown id.
pub async fn reconcile_media_plane_event(
    registry: &RoomRegistry,
    bus: &ChannelBus,
    media_plane: &dyn MediaPlane,
    event: MediaPlaneEvent,
) {
    match event {
        MediaPlaneEvent::ProducerClosed { channel, producer, .. } => {
            let Some(entry) = registry.get(&channel) else { return };
            let outcome = {
                let mut room = entry.guard.lock();
                room.close_producer(&producer)
            };
            if let Some((user_id, kind, media_type)) = outcome {
                bus.send_to_channel(
                    &channel,
                    &Event::ProducerClosed {
                        producer_id: producer,
                        user_id,
                        kind: format!("{kind:?}").to_lowercase(),
                        media_type: format!("{media_type:?}").to_lowercase(),
                    },
                );
            }
        }
        MediaPlaneEvent::TransportClosed { channel, user, .. } => {
            let Some(entry) = registry.get(&channel) else { return };
            let removed = {
                let mut room = entry.guard.lock();
                room.remove_participant(&user)
            };
            if let Some((participant, events)) = removed {
                for (target, ev) in events {
                    dispatch(bus, &channel, target, &ev);
                }
                bus.send_to_socket(&participant.socket, &Event::Kicked { reason: "media transport closed".to_string() });
                participant.socket.disconnect(true);
            }
        }
        MediaPlaneEvent::RouterClosed { channel } => {
            registry.force_close(&channel, media_plane, bus).await;
        }
    }
}

fn dispatch(bus: &ChannelBus, channel: &ChannelId, target: Target, event: &Event) {
    match target {
        Target::Channel => bus.send_to_channel(channel, event),
        Target::ChannelExcept(uid) => bus.send_to_channel_except(channel, &uid, event),
        Target::Socket(s) => bus.send_to_socket(&s, event),
    }
}
