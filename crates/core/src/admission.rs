//! Admission Engine: decides whether a join request is admitted,
//! waitlisted, or rejected, and performs the bookkeeping admission implies
//! (installing the participant, clearing a stale pending entry).

use chrono::Utc;
use std::collections::HashMap;

use crate::identity::{compose_user_id, is_guest_key, UserId, UserKey};
use crate::media_plane::RtpCapabilities;
use crate::model::{Participant, ParticipantMode, PendingEntry, Room, SocketRef};
use crate::state_machine::{Mutation, Target};
use crate::events::Event;

pub struct JoinRequest {
    pub user_key: UserKey,
    pub session_id: String,
    pub display_name: String,
    pub requested_mode: ParticipantMode,
    pub is_admin_by_token: bool,
    pub socket: SocketRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    Blocked,
    GuestsDisabled,
}

pub enum Decision {
    AdmitAsAdmin,
    Admit,
    Waitlist,
    Reject(RejectReason),
}

/// Evaluates the join decision table (§4.4), first match wins.
pub fn decide(room: &Room, req: &JoinRequest) -> Decision {
    if room.blocked_user_keys.contains(&req.user_key) && !req.is_admin_by_token {
        return Decision::Reject(RejectReason::Blocked);
    }
    if req.is_admin_by_token || room.admin_user_keys.contains(&req.user_key) {
        return Decision::AdmitAsAdmin;
    }
    if room.policies.locked && !room.locked_allowed_user_keys.contains(&req.user_key) {
        return Decision::Waitlist;
    }
    if room.policies.no_guests && is_guest_key(&req.user_key) && !room.allowed_user_keys.contains(&req.user_key) {
        return Decision::Reject(RejectReason::GuestsDisabled);
    }
    Decision::Admit
}

pub struct AdmissionOutcome {
    pub user_id: UserId,
    pub is_admin: bool,
    pub mutation: Mutation,
}

/// Installs an admitted participant into the room. If the identity
/// previously had a pending entry, it is cleared; if that pending entry
/// belonged to a different session, its socket receives `joinApproved`
/// before being superseded by the live participant.
pub fn admit(room: &mut Room, req: JoinRequest, is_admin: bool) -> AdmissionOutcome {
    let user_id = compose_user_id(&req.user_key, &req.session_id);
    let mut events = Vec::new();

    if let Some(prior) = room.pending_clients.remove(&req.user_key) {
        if prior.session_id != req.session_id {
            events.push((Target::Socket(prior.socket.clone()), Event::JoinApproved {}));
        }
    }

    room.display_names_by_user_key.insert(req.user_key.clone(), req.display_name.clone());

    if is_admin {
        room.admin_user_keys.insert(req.user_key.clone());
        if room.host_user_key.is_none() {
            room.host_user_key = Some(req.user_key.clone());
        }
    }

    let participant = Participant {
        user_id: user_id.clone(),
        user_key: req.user_key.clone(),
        display_name: req.display_name,
        mode: req.requested_mode,
        socket: req.socket,
        producer_transport_id: None,
        consumer_transport_id: None,
        producers: HashMap::new(),
        consumer_count: 0,
        is_muted: false,
        is_camera_off: false,
        joined_at: Utc::now(),
    };
    room.user_keys_by_id.insert(user_id.clone(), req.user_key.clone());
    room.clients.insert(user_id.clone(), participant);

    AdmissionOutcome {
        user_id,
        is_admin,
        mutation: Mutation { changed: true, events },
    }
}

/// Enrolls the request in the waiting room. Returns the superseded prior
/// pending socket (if any and distinct) so the caller can notify/disconnect
/// it, matching `enrollPending`'s contract.
pub fn waitlist(room: &mut Room, req: JoinRequest) -> (Mutation, Option<SocketRef>) {
    let pending = PendingEntry {
        user_key: req.user_key.clone(),
        session_id: req.session_id,
        display_name: req.display_name,
        socket: req.socket,
        enrolled_at: Utc::now(),
        requested_mode: req.requested_mode,
    };
    room.enroll_pending(pending)
}

/// Reconciliation when a policy flips. `locked=false`: auto-admit every
/// pending entry whose `userKey` is in `allowedUserKeys`. Returns those
/// entries for the caller to turn into full admission (installing the
/// participant is a caller concern since it needs fresh `rtpCapabilities`
/// from the media plane).
pub fn reconcile_unlock(room: &Room) -> Vec<PendingEntry> {
    room.pending_clients
        .iter()
        .filter(|(k, _)| room.allowed_user_keys.contains(*k))
        .map(|(_, v)| v.clone())
        .collect()
}

/// Response to `joinRoom`: `{rtpCapabilities, status}`.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    pub rtp_capabilities: Option<RtpCapabilities>,
    pub status: JoinStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinStatus {
    Joined,
    Waiting,
}
