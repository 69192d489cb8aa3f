//! Deterministic `RoomSnapshot` serialization for the operator HTTP surface
//! and administrator socket responses.

use serde::Serialize;

use crate::model::Room;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSnapshot {
    pub user_id: String,
    pub user_key: String,
    pub display_name: String,
    pub mode: String,
    pub role: String,
    pub is_muted: bool,
    pub is_camera_off: bool,
    pub producer_count: usize,
    pub joined_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSnapshot {
    pub user_key: String,
    pub display_name: String,
    pub enrolled_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub channel_id: String,
    pub room_id: String,
    pub client_id: String,
    pub participants: Vec<ParticipantSnapshot>,
    pub pending: Vec<PendingSnapshot>,
    pub allowed_user_keys: Vec<String>,
    pub locked_allowed_user_keys: Vec<String>,
    pub blocked_user_keys: Vec<String>,
    pub admin_user_keys: Vec<String>,
    pub host_user_key: Option<String>,
    pub policies: crate::model::Policies,
    pub participant_count: usize,
    pub pending_count: usize,
    pub hand_raised_by_user_id: Vec<String>,
    pub screen_share_producer_id: Option<String>,
}

pub fn snapshot(room: &Room) -> RoomSnapshot {
    let participants = room
        .participants_ordered()
        .into_iter()
        .map(|p| ParticipantSnapshot {
            user_id: p.user_id.clone(),
            user_key: p.user_key.clone(),
            display_name: p.display_name.clone(),
            mode: format!("{:?}", p.mode),
            role: format!("{:?}", room.role_of_participant(p)),
            is_muted: p.is_muted,
            is_camera_off: p.is_camera_off,
            producer_count: p.producers.len(),
            joined_at: p.joined_at,
        })
        .collect();

    let pending = room
        .pending_ordered()
        .into_iter()
        .map(|p| PendingSnapshot {
            user_key: p.user_key.clone(),
            display_name: p.display_name.clone(),
            enrolled_at: p.enrolled_at,
        })
        .collect();

    RoomSnapshot {
        channel_id: room.channel_id.clone(),
        room_id: room.id.clone(),
        client_id: room.client_id.clone(),
        participants,
        pending,
        allowed_user_keys: Room::sorted_user_keys(&room.allowed_user_keys).into_iter().collect(),
        locked_allowed_user_keys: Room::sorted_user_keys(&room.locked_allowed_user_keys).into_iter().collect(),
        blocked_user_keys: Room::sorted_user_keys(&room.blocked_user_keys).into_iter().collect(),
        admin_user_keys: Room::sorted_user_keys(&room.admin_user_keys).into_iter().collect(),
        host_user_key: room.host_user_key.clone(),
        policies: room.policies.clone(),
        participant_count: room.clients.len(),
        pending_count: room.pending_clients.len(),
        hand_raised_by_user_id: room.hand_raised_by_user_id.clone(),
        screen_share_producer_id: room.screen_share_producer_id.clone(),
    }
}
