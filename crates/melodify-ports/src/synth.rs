use crate::types::*;

#[derive(thiserror::Error, Debug)]
pub enum SynthError {
    #[error("soundfont load failed: {0}")]
    SoundFontLoad(String),
    #[error("unsupported soundfont format")]
    UnsupportedFormat,
    #[error("backend error: {0}")]
    Backend(String),
}

#[derive(Clone, Debug)]
pub struct SoundFontInfo {
    pub name: String,
    pub preset_count: usize,
}

/// Thread model:
/// - load_soundfont_from_path / set_sample_rate are called from the core thread
/// - handle_event / render are called from the audio thread (realtime-safe)
///
/// Until a soundfont is loaded the synth renders silence and drops triggers.
pub trait SynthPort: Send + Sync {
    fn load_soundfont_from_path(&self, path: &str) -> Result<SoundFontInfo, SynthError>;
    fn set_sample_rate(&self, sample_rate_hz: u32);
    fn is_loaded(&self) -> bool;

    fn handle_event(&self, event: KeyEvent, at: SampleTime);
    fn render(&self, frames: usize, out_l: &mut [f32], out_r: &mut [f32]);
}
