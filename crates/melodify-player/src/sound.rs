use crate::audio_graph::AudioGraph;
use log::debug;
use melodify_ports::audio::{AudioError, AudioOutputPort, AudioStreamHandle};
use melodify_ports::synth::SynthPort;
use melodify_ports::types::{
    AudioConfig, Gain01, KeyEvent, Micros, SampleTime, ScheduledKeyEvent,
};
use melodify_score::NoteEvent;
use parking_lot::Mutex;
use rtrb::{Producer, RingBuffer};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Perceptual loudness curve: velocity 0..=127 to linear gain. Squaring
/// matches how the ear hears amplitude, so quiet keystrokes stay quiet.
pub fn gain_for_velocity(velocity: u8) -> Gain01 {
    let v = velocity.min(127) as f32 / 127.0;
    Gain01::new(v * v)
}

/// Sample-time position of the running output stream, written by the audio
/// callback and read from the control thread.
pub struct AudioClock {
    sample_time: AtomicU64,
}

impl AudioClock {
    pub fn new() -> Self {
        Self {
            sample_time: AtomicU64::new(0),
        }
    }

    pub fn set(&self, sample_time: SampleTime) {
        self.sample_time.store(sample_time, Ordering::Relaxed);
    }

    pub fn get(&self) -> SampleTime {
        self.sample_time.load(Ordering::Relaxed)
    }
}

impl Default for AudioClock {
    fn default() -> Self {
        Self::new()
    }
}

/// The process-wide audio output chain: synth -> master gain -> limiter ->
/// device stream. Constructed lazily on the first user-initiated playback
/// and reused for the rest of the session; never torn down between files.
pub struct AudioOutputService {
    synth: Arc<dyn SynthPort>,
    clock: Arc<AudioClock>,
    producer: Mutex<Producer<ScheduledKeyEvent>>,
    sample_rate_hz: u32,
    // Held for its Drop; closing it would kill the stream.
    _stream: Box<dyn AudioStreamHandle>,
}

impl AudioOutputService {
    pub fn start(
        audio_port: &dyn AudioOutputPort,
        synth: Arc<dyn SynthPort>,
        config: AudioConfig,
    ) -> Result<Arc<Self>, AudioError> {
        let clock = Arc::new(AudioClock::new());
        let (producer, consumer) = RingBuffer::new(4096);

        synth.set_sample_rate(config.sample_rate_hz);
        let graph = AudioGraph::new(synth.clone(), consumer, clock.clone());
        let stream = audio_port.open_default_output(config, Box::new(graph))?;

        Ok(Arc::new(Self {
            synth,
            clock,
            producer: Mutex::new(producer),
            sample_rate_hz: config.sample_rate_hz,
            _stream: stream,
        }))
    }

    /// Ready means the stream is running and the instrument samples have
    /// finished loading.
    pub fn is_ready(&self) -> bool {
        self.synth.is_loaded()
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    pub fn sample_time(&self) -> SampleTime {
        self.clock.get()
    }

    pub fn push(&self, event: ScheduledKeyEvent) {
        // Audio thread owns the consumer; a full ring just drops the event.
        let _ = self.producer.lock().push(event);
    }
}

/// Maps emitted note batches to instrument triggers. Independent of the
/// visual renderer; it only ever pushes into the audio queue. Until the
/// output service is attached and ready, triggers are silently dropped,
/// never queued and never an error.
pub struct SoundRenderer {
    service: Mutex<Option<Arc<AudioOutputService>>>,
    enabled: AtomicBool,
}

impl SoundRenderer {
    pub fn new(enabled: bool) -> Self {
        Self {
            service: Mutex::new(None),
            enabled: AtomicBool::new(enabled),
        }
    }

    pub fn attach(&self, service: Arc<AudioOutputService>) {
        *self.service.lock() = Some(service);
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn handle_batch(&self, batch: &[NoteEvent]) {
        if !self.enabled.load(Ordering::Relaxed) {
            return;
        }
        let guard = self.service.lock();
        let Some(service) = guard.as_ref() else {
            return;
        };
        if !service.is_ready() {
            debug!("sound not ready, dropping batch of {}", batch.len());
            return;
        }

        let now = service.sample_time();
        let rate = service.sample_rate_hz();
        for event in batch {
            if event.velocity == 0 {
                continue;
            }
            service.push(ScheduledKeyEvent {
                at: now,
                event: KeyEvent::On {
                    key: event.key,
                    gain: gain_for_velocity(event.velocity),
                },
            });
            let off_at = now.saturating_add(micros_to_samples(event.duration_us, rate));
            service.push(ScheduledKeyEvent {
                at: off_at,
                event: KeyEvent::Off { key: event.key },
            });
        }
    }
}

pub fn micros_to_samples(micros: Micros, sample_rate_hz: u32) -> SampleTime {
    if micros <= 0 {
        return 0;
    }
    let samples = (micros as f64 * sample_rate_hz as f64 / 1_000_000.0).round();
    samples as SampleTime
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gain_curve_endpoints() {
        assert_eq!(gain_for_velocity(0).get(), 0.0);
        assert_eq!(gain_for_velocity(127).get(), 1.0);
    }

    #[test]
    fn gain_curve_is_nonlinear() {
        // Half velocity lands well below half gain.
        let half = gain_for_velocity(64).get();
        assert!(half > 0.2 && half < 0.3);
    }

    #[test]
    fn micros_to_samples_rounds() {
        assert_eq!(micros_to_samples(1_000_000, 48_000), 48_000);
        assert_eq!(micros_to_samples(-5, 48_000), 0);
        assert_eq!(micros_to_samples(10, 48_000), 0);
    }

    #[test]
    fn audio_service_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        // Both end up inside the Arc'd batch listeners.
        assert_send_sync::<AudioOutputService>();
        assert_send_sync::<SoundRenderer>();
    }
}
