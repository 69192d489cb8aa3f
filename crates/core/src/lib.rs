pub mod admission;
pub mod chat;
pub mod drain;
pub mod error;
pub mod events;
pub mod identity;
pub mod media_plane;
pub mod model;
pub mod moderation;
pub mod registry;
pub mod snapshot;
pub mod state_machine;

use std::sync::Arc;

use events::ChannelBus;
use media_plane::MediaPlane;
use registry::RoomRegistry;

/// The single owner of process-global mutable state: the drain flag, the
/// room registry, and the event bus. Per design note §9 ("Process-global
/// mutable state ... wrapped in a single container with documented init and
/// teardown"), every other component receives references into this rather
/// than holding its own copies.
pub struct SfuState {
    pub registry: RoomRegistry,
    pub bus: ChannelBus,
    pub drain: drain::DrainCoordinator,
    pub media_plane: Arc<dyn MediaPlane>,
}

impl SfuState {
    pub fn new(media_plane: Arc<dyn MediaPlane>) -> Self {
        Self {
            registry: RoomRegistry::new(),
            bus: ChannelBus::new(),
            drain: drain::DrainCoordinator::new(),
            media_plane,
        }
    }
}
