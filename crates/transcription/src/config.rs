#[derive(Debug, Clone)]
pub struct TranscriptionSettings {
    /// Missing ASR URL disables transcription entirely.
    pub asr_url: Option<String>,
    pub sample_rate: u32,
    pub decoder_path: String,
}

impl TranscriptionSettings {
    pub fn enabled(&self) -> bool {
        self.asr_url.is_some()
    }
}
