use melodify_ports::synth::{SoundFontInfo, SynthError, SynthPort};
use melodify_ports::types::{Gain01, KeyEvent, SampleTime};
use parking_lot::Mutex;
use rustysynth::{SoundFont, Synthesizer, SynthesizerSettings};
use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

/// SoundFont synth backed by rustysynth. Until a soundfont is loaded every
/// trigger is dropped and render produces silence; there is no fallback
/// instrument.
pub struct RustySynth {
    sample_rate_hz: AtomicU32,
    enabled: AtomicBool,
    sound_font: Mutex<Option<Arc<SoundFont>>>,
    synth: Mutex<Option<Synthesizer>>,
}

impl Default for RustySynth {
    fn default() -> Self {
        Self::new(44_100)
    }
}

impl RustySynth {
    pub fn new(sample_rate_hz: u32) -> Self {
        Self {
            sample_rate_hz: AtomicU32::new(sample_rate_hz),
            enabled: AtomicBool::new(false),
            sound_font: Mutex::new(None),
            synth: Mutex::new(None),
        }
    }

    fn rebuild_synthesizer(&self, sound_font: Arc<SoundFont>) -> Result<(), SynthError> {
        let sample_rate_hz = self.sample_rate_hz.load(Ordering::Relaxed) as i32;
        let mut settings = SynthesizerSettings::new(sample_rate_hz);
        settings.enable_reverb_and_chorus = false;

        let synth = Synthesizer::new(&sound_font, &settings)
            .map_err(|e| SynthError::Backend(e.to_string()))?;
        *self.synth.lock() = Some(synth);
        Ok(())
    }

    fn with_active_synth<T>(&self, f: impl FnOnce(&mut Synthesizer) -> T) -> Option<T> {
        // try_lock keeps the audio thread from blocking on a rebuild.
        let mut guard = self.synth.try_lock()?;
        let synth = guard.as_mut()?;
        Some(f(synth))
    }
}

/// rustysynth applies its own velocity curve; feeding the perceptual gain
/// back through it as a velocity keeps the loudness mapping of the trigger.
fn gain_to_velocity(gain: Gain01) -> i32 {
    ((gain.get() * 127.0).round() as i32).clamp(1, 127)
}

impl SynthPort for RustySynth {
    fn load_soundfont_from_path(&self, path: &str) -> Result<SoundFontInfo, SynthError> {
        let mut file = File::open(path).map_err(|e| SynthError::SoundFontLoad(e.to_string()))?;
        let sound_font = Arc::new(
            SoundFont::new(&mut file).map_err(|e| SynthError::SoundFontLoad(e.to_string()))?,
        );

        let name = sound_font.get_info().get_bank_name().trim().to_string();
        let name = if name.is_empty() {
            Path::new(path)
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or("SoundFont")
                .to_string()
        } else {
            name
        };
        let preset_count = sound_font.get_presets().len();

        *self.sound_font.lock() = Some(sound_font.clone());
        self.rebuild_synthesizer(sound_font)?;
        self.enabled.store(true, Ordering::Relaxed);

        Ok(SoundFontInfo { name, preset_count })
    }

    fn set_sample_rate(&self, sample_rate_hz: u32) {
        self.sample_rate_hz.store(sample_rate_hz, Ordering::Relaxed);
        let sound_font = self.sound_font.lock().clone();
        if let Some(sound_font) = sound_font {
            let _ = self.rebuild_synthesizer(sound_font);
        }
    }

    fn is_loaded(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    fn handle_event(&self, event: KeyEvent, _at: SampleTime) {
        if !self.enabled.load(Ordering::Relaxed) {
            return;
        }

        self.with_active_synth(|synth| match event {
            KeyEvent::On { key, gain } => {
                synth.note_on(0, key as i32, gain_to_velocity(gain));
            }
            KeyEvent::Off { key } => {
                synth.note_off(0, key as i32);
            }
        });
    }

    fn render(&self, frames: usize, out_l: &mut [f32], out_r: &mut [f32]) {
        for value in out_l.iter_mut() {
            *value = 0.0;
        }
        for value in out_r.iter_mut() {
            *value = 0.0;
        }

        if !self.enabled.load(Ordering::Relaxed) {
            return;
        }

        let _ = self.with_active_synth(|synth| {
            let frames = frames.min(out_l.len()).min(out_r.len());
            synth.render(&mut out_l[..frames], &mut out_r[..frames]);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gain_maps_back_to_the_velocity_range() {
        assert_eq!(gain_to_velocity(Gain01::new(1.0)), 127);
        assert_eq!(gain_to_velocity(Gain01::new(0.5)), 64);
        // Audible triggers never collapse to velocity zero.
        assert_eq!(gain_to_velocity(Gain01::new(0.001)), 1);
    }

    #[test]
    fn unloaded_synth_renders_silence_and_drops_events() {
        let synth = RustySynth::new(44_100);
        assert!(!synth.is_loaded());

        synth.handle_event(
            KeyEvent::On {
                key: 60,
                gain: Gain01::new(0.8),
            },
            0,
        );

        let mut left = vec![0.5f32; 64];
        let mut right = vec![0.5f32; 64];
        synth.render(64, &mut left, &mut right);
        assert!(left.iter().all(|s| *s == 0.0));
        assert!(right.iter().all(|s| *s == 0.0));
    }
}
