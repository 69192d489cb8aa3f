//! Environment-driven settings, grounded on the reference repo's
//! `config::settings` module: layered `config/default` → `config/local` →
//! environment overrides, but with the `ROOMLER` prefix replaced by
//! `SFUCTL` and the sub-settings trimmed to this crate's actual scope.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("required setting missing: {0}")]
    Missing(String),
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSettings {
    pub host: String,
    pub port: u16,
    pub secret: String,
    pub instance_id: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MediasoupSettings {
    pub listen_ip: String,
    pub announced_ip: Option<String>,
    pub worker_count: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TranscriptionConfigSettings {
    pub asr_url: Option<String>,
    pub sample_rate: u32,
    pub decoder_path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MinutesSettings {
    pub summarizer_url: Option<String>,
    pub summarizer_token: Option<String>,
}

impl MinutesSettings {
    /// Missing summarizer token forces the local summarizer.
    pub fn uses_remote_summarizer(&self) -> bool {
        self.summarizer_url.is_some() && self.summarizer_token.is_some()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub app: AppSettings,
    pub mediasoup: MediasoupSettings,
    pub transcription: TranscriptionConfigSettings,
    pub minutes: MinutesSettings,
}

impl Settings {
    /// Loads settings the reference repo's way: `config/default` →
    /// `config/local` (both optional) → `SFUCTL__section__field`-style
    /// environment overrides, with `.env` loaded first via `dotenvy`.
    pub fn load() -> Result<Self, SettingsError> {
        let _ = dotenvy::dotenv();

        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::default().separator("__").prefix("SFUCTL").try_parsing(true))
            .set_default("app.host", "0.0.0.0")?
            .set_default("app.port", 8080)?
            .set_default("app.secret", "")?
            .set_default("mediasoup.listen_ip", "0.0.0.0")?
            .set_default("mediasoup.worker_count", 1)?
            .set_default("transcription.sample_rate", 16_000)?
            .set_default("transcription.decoder_path", "ffmpeg")?
            .build()?;

        let settings: Settings = config.try_deserialize()?;

        if settings.app.secret.is_empty() {
            return Err(SettingsError::Missing("app.secret (SFUCTL_APP__SECRET)".into()));
        }

        Ok(settings)
    }
}
