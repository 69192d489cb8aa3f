mod settings;

pub use settings::{AppSettings, MediasoupSettings, MinutesSettings, Settings, SettingsError, TranscriptionConfigSettings};
