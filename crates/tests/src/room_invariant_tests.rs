//! Room State Machine invariants P1/P2, checked directly against
//! `sfuctl_core::model::Room` and the Admission Engine, without going
//! through HTTP or a socket — the same "exercise the core crate in
//! isolation" style the reference repo's unit tests use for `room_manager`
//! logic that doesn't need a live connection.

use std::sync::Arc;

use sfuctl_core::admission::{self, Decision, JoinRequest};
use sfuctl_core::model::{ParticipantMode, Room, SocketHandle};

#[derive(Debug)]
struct MockSocket;

impl SocketHandle for MockSocket {
    fn send(&self, _event: &str, _payload: serde_json::Value) {}
    fn disconnect(&self, _close_immediate: bool) {}
}

fn mock_socket() -> Arc<dyn SocketHandle> {
    Arc::new(MockSocket)
}

fn join_request(user_key: &str, session_id: &str) -> JoinRequest {
    JoinRequest {
        user_key: user_key.to_string(),
        session_id: session_id.to_string(),
        display_name: "Tester".to_string(),
        requested_mode: ParticipantMode::Meeting,
        is_admin_by_token: false,
        socket: mock_socket(),
    }
}

/// P1: the `userId -> userKey` back-lookup is a bijection against `clients`.
#[test]
fn back_lookup_is_bijective_with_clients() {
    let mut room = Room::new("r1".to_string(), "default".to_string());

    admission::admit(&mut room, join_request("alice@x.y", "s1"), true);
    admission::admit(&mut room, join_request("bob@x.y", "s2"), false);

    for user_id in room.clients.keys() {
        assert!(room.user_keys_by_id.contains_key(user_id), "{user_id} missing from back-lookup");
    }
    for user_id in room.user_keys_by_id.keys() {
        assert!(room.clients.contains_key(user_id), "{user_id} has a back-lookup entry but no participant");
    }
}

/// P2: no identity is simultaneously pending and active.
#[test]
fn pending_and_active_sets_are_disjoint() {
    let mut room = Room::new("r1".to_string(), "default".to_string());
    room.set_policy(sfuctl_core::model::PolicyUpdate { locked: Some(true), ..Default::default() });

    let decision = admission::decide(&room, &join_request("alice@x.y", "s1"));
    assert!(matches!(decision, Decision::Waitlist));
    admission::waitlist(&mut room, join_request("alice@x.y", "s1"));
    assert!(room.pending_clients.contains_key("alice@x.y"));

    // Now admit alice directly (as an operator would via the waiting-room
    // admit path) and confirm the pending entry is cleared.
    admission::admit(&mut room, join_request("alice@x.y", "s1"), false);

    let active_keys: std::collections::HashSet<_> = room.clients.values().map(|p| p.user_key.clone()).collect();
    let pending_keys: std::collections::HashSet<_> = room.pending_clients.keys().cloned().collect();
    assert!(active_keys.intersection(&pending_keys).next().is_none());
    assert!(!room.pending_clients.contains_key("alice@x.y"));
}

/// P3: block then unblock restores the pre-image of `blockedUserKeys`
/// (identity-list state only — kicks performed in between are not undone).
#[test]
fn block_then_unblock_restores_block_list() {
    let mut room = Room::new("r1".to_string(), "default".to_string());
    assert!(!room.blocked_user_keys.contains("alice@x.y"));

    room.block_user("alice@x.y");
    assert!(room.blocked_user_keys.contains("alice@x.y"));

    room.unblock_user("alice@x.y");
    assert!(!room.blocked_user_keys.contains("alice@x.y"));
}

/// Locking grandfathers current participants into `lockedAllowedUserKeys`.
#[test]
fn locking_grandfathers_current_participants() {
    let mut room = Room::new("r1".to_string(), "default".to_string());
    admission::admit(&mut room, join_request("alice@x.y", "s1"), true);

    assert!(!room.locked_allowed_user_keys.contains("alice@x.y"));
    room.set_policy(sfuctl_core::model::PolicyUpdate { locked: Some(true), ..Default::default() });
    assert!(room.locked_allowed_user_keys.contains("alice@x.y"));
}

/// Admin promotion is denied for ghost/attendee modes (I8).
#[test]
fn ghost_and_attendee_modes_cannot_be_promoted() {
    let mut room = Room::new("r1".to_string(), "default".to_string());
    let ghost_req = JoinRequest { requested_mode: ParticipantMode::Ghost, ..join_request("ghost@x.y", "s1") };
    let outcome = admission::admit(&mut room, ghost_req, false);

    assert!(room.promote_to_admin(&outcome.user_id).is_err());
}
