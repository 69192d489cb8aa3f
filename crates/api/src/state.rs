//! Process-wide shared state: the core engine container, the transcription
//! and minutes subsystems, and the loaded settings. Generalized from the
//! reference repo's `AppState` (which also carried the Mongo handle and the
//! DAO set this control plane has no use for).

use std::sync::Arc;

use sfuctl_config::Settings;
use sfuctl_core::SfuState;
use sfuctl_minutes::MinutesGenerator;
use sfuctl_transcription::TranscriptionEngine;

#[derive(Clone)]
pub struct AppState {
    pub core: Arc<SfuState>,
    pub transcription: Arc<TranscriptionEngine>,
    pub minutes: Arc<MinutesGenerator>,
    pub settings: Arc<Settings>,
    pub instance_id: String,
}

impl AppState {
    pub fn new(
        core: Arc<SfuState>,
        transcription: Arc<TranscriptionEngine>,
        minutes: Arc<MinutesGenerator>,
        settings: Settings,
    ) -> Self {
        let instance_id = settings
            .app
            .instance_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Self {
            core,
            transcription,
            minutes,
            settings: Arc::new(settings),
            instance_id,
        }
    }
}
