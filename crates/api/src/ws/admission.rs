//! Shared admission bookkeeping used by both the `joinRoom` socket event
//! and the operator HTTP paths that admit a waiting participant out of
//! band (`pending/{userKey}/admit`, `pending/admit-all`, and unlock
//! reconciliation after `policies` flips `locked` to `false`). Kept in one
//! place so every admission path creates the router, installs the
//! participant, and notifies their held socket identically.

use std::sync::Arc;

use sfuctl_core::admission::{self, AdmissionOutcome, JoinRequest};
use sfuctl_core::events::Event;
use sfuctl_core::identity::ChannelId;
use sfuctl_core::model::PendingEntry;
use sfuctl_core::registry::RoomEntry;

use crate::state::AppState;

/// Creates the room's router if needed, installs the pending entry as a
/// full participant, and pushes `joinApproved` with fresh `rtpCapabilities`
/// directly to the participant's held socket. Broadcasts `userAdmitted` to
/// the room for admin UIs tracking the waiting list.
pub async fn admit_pending_entry(state: &AppState, channel: &ChannelId, entry: &Arc<RoomEntry>, pending: PendingEntry) {
    let router = match state.core.media_plane.create_router(channel).await {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(%channel, error = %e, "failed to create router while admitting pending participant");
            return;
        }
    };

    let user_key = pending.user_key.clone();
    let req = JoinRequest {
        user_key: user_key.clone(),
        session_id: pending.session_id,
        display_name: pending.display_name,
        requested_mode: pending.requested_mode,
        is_admin_by_token: false,
        socket: pending.socket.clone(),
    };

    let AdmissionOutcome { user_id, mutation, .. } = {
        let mut room = entry.guard.lock();
        let outcome = admission::admit(&mut room, req, false);
        // An explicit admit out of the waiting room is a standing grant:
        // the admitted identity should not fall back into the waitlist on
        // a later reconnect while the room remains locked.
        if room.policies.locked {
            room.locked_allowed_user_keys.insert(user_key.clone());
        }
        outcome
    };

    state.core.bus.leave_pending(channel, &pending.socket);
    state.core.bus.join(channel, user_id.clone(), pending.socket.clone());
    crate::routes::emit(&state.core.bus, channel, mutation.events);

    pending.socket.send(
        "joinApproved",
        serde_json::json!({ "rtpCapabilities": router.rtp_capabilities.0, "status": "joined" }),
    );

    state.core.bus.send_to_channel(channel, &Event::UserAdmitted { user_key: pending.user_key });
}

/// Rejects a pending entry: notifies and disconnects its held socket, and
/// removes it from the waiting room.
pub fn reject_pending_entry(state: &AppState, channel: &ChannelId, entry: &Arc<RoomEntry>, user_key: &str, reason: &str) -> bool {
    let removed = {
        let mut room = entry.guard.lock();
        room.pending_clients.remove(user_key)
    };
    let Some(pending) = removed else {
        return false;
    };
    state.core.bus.leave_pending(channel, &pending.socket);
    state
        .core
        .bus
        .send_to_socket(&pending.socket, &Event::UserRejected { user_key: user_key.to_string(), reason: reason.to_string() });
    pending.socket.disconnect(true);
    true
}
