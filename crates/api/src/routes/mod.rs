//! Operator HTTP surface: every handler takes `RequireSecret` (the shared
//! `x-sfu-secret` check) and most take `TenantScope` to disambiguate a
//! bare `roomId` across tenants. Dispatches into `sfuctl_core`'s registry,
//! state machine, admission, and moderation modules — this module only
//! adapts HTTP <-> those calls, same division of labor as the reference
//! repo's `routes/conference.rs` calling into `room_manager`.

pub mod access;
pub mod admin;
pub mod hands;
pub mod health;
pub mod minutes;
pub mod moderation;
pub mod pending;
pub mod policies;

use axum::Router;
use axum::routing::{get, post};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/status", get(health::status))
        .route("/rooms", get(health::list_rooms))
        .route("/drain", post(admin::drain))
        .route("/admin/drain", post(admin::drain))
        .route("/admin/overview", get(admin::overview))
        .route("/admin/workers", get(admin::workers))
        .route("/admin/rooms", get(admin::admin_rooms))
        .route("/admin/rooms/{roomId}", get(admin::admin_room_detail))
        .route("/admin/rooms/{roomId}/policies", post(policies::set_policies))
        .route("/admin/rooms/{roomId}/notice", post(policies::notice))
        .route("/admin/rooms/{roomId}/end", post(policies::end_room))
        .route("/admin/rooms/{roomId}/producers/{producerId}/close", post(moderation::close_producer))
        .route("/admin/rooms/{roomId}/users/{userId}/kick", post(moderation::kick_user))
        .route("/admin/rooms/{roomId}/users/{userId}/media", post(moderation::enforce_media))
        .route("/admin/rooms/{roomId}/users/{userId}/mute", post(moderation::mute_user))
        .route("/admin/rooms/{roomId}/users/{userId}/video-off", post(moderation::video_off_user))
        .route("/admin/rooms/{roomId}/users/{userId}/stop-screen", post(moderation::stop_screen_user))
        .route("/admin/rooms/{roomId}/users/{userId}/block", post(moderation::block_user))
        .route("/admin/rooms/{roomId}/users/{userId}/unblock", post(moderation::unblock_user))
        .route("/admin/rooms/{roomId}/users/remove-non-admins", post(moderation::remove_non_admins))
        .route("/admin/rooms/{roomId}/access", get(access::list_access))
        .route("/admin/rooms/{roomId}/access/allow", post(access::allow))
        .route("/admin/rooms/{roomId}/access/revoke", post(access::revoke))
        .route("/admin/rooms/{roomId}/access/block", post(access::block))
        .route("/admin/rooms/{roomId}/access/unblock", post(access::unblock))
        .route("/admin/rooms/{roomId}/pending/{userKey}/admit", post(pending::admit_one))
        .route("/admin/rooms/{roomId}/pending/{userKey}/reject", post(pending::reject_one))
        .route("/admin/rooms/{roomId}/pending/admit-all", post(pending::admit_all))
        .route("/admin/rooms/{roomId}/pending/reject-all", post(pending::reject_all))
        .route("/admin/rooms/{roomId}/hands/clear", post(hands::clear))
        .route("/minutes", post(minutes::get_minutes))
}

/// Resolves `roomId` (optionally scoped by `clientId`) to its registry
/// entry, the shared lookup every room-scoped handler opens with.
pub(crate) fn resolve(
    state: &AppState,
    room_id: &str,
    tenant: &crate::extractors::TenantScope,
) -> Result<(sfuctl_core::identity::ChannelId, std::sync::Arc<sfuctl_core::registry::RoomEntry>), crate::error::ApiError>
{
    state
        .core
        .registry
        .resolve_by_room_id(room_id, tenant.0.as_deref())
        .map_err(Into::into)
}

/// Dispatches a batch of state-machine events to their targets.
pub(crate) fn emit(
    bus: &sfuctl_core::events::ChannelBus,
    channel: &sfuctl_core::identity::ChannelId,
    events: Vec<(sfuctl_core::state_machine::Target, sfuctl_core::events::Event)>,
) {
    for (target, event) in events {
        match target {
            sfuctl_core::state_machine::Target::Channel => bus.send_to_channel(channel, &event),
            sfuctl_core::state_machine::Target::ChannelExcept(uid) => {
                bus.send_to_channel_except(channel, &uid, &event)
            }
            sfuctl_core::state_machine::Target::Socket(s) => bus.send_to_socket(&s, &event),
        }
    }
}
