use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum TranscribeError {
    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),
    #[error("transcription failed: {0}")]
    TranscriptionFailed(String),
    #[error("backend error: {0}")]
    Backend(String),
}

#[derive(Clone, Debug, Default)]
pub struct TranscribeOptions {
    /// Override for the external transcriber executable.
    pub engine_path: Option<String>,
    pub keep_diagnostics: bool,
}

#[derive(Clone, Debug)]
pub struct TranscribeResult {
    pub midi_bytes: Vec<u8>,
    pub diagnostics_path: Option<PathBuf>,
}

/// Narrow seam to the transcription backend: "submit audio, receive MIDI
/// bytes". The engine itself is an external collaborator.
pub trait TranscribePort: Send + Sync {
    fn transcribe(
        &self,
        audio_path: &str,
        options: TranscribeOptions,
    ) -> Result<TranscribeResult, TranscribeError>;
}
