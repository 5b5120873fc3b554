use crate::sound::AudioClock;
use melodify_ports::audio::AudioRenderCallback;
use melodify_ports::synth::SynthPort;
use melodify_ports::types::{KeyEvent, SampleTime, ScheduledKeyEvent};
use rtrb::Consumer;
use std::sync::Arc;

const MASTER_GAIN: f32 = 0.9;
const LIMIT: f32 = 0.98;

/// Realtime render callback: pulls scheduled key events off the ring buffer,
/// splits each buffer at event boundaries, and runs the synth output through
/// the master gain and a soft limiter (the compressor stage of the chain).
pub struct AudioGraph {
    synth: Arc<dyn SynthPort>,
    clock: Arc<AudioClock>,
    consumer: Consumer<ScheduledKeyEvent>,
    events: Vec<ScheduledKeyEvent>,
    /// Not-yet-due events held back by sample time. The ring arrives in
    /// push order, not time order: a sustained note's release can sit far
    /// in the future while later triggers are already due.
    pending: Vec<ScheduledKeyEvent>,
    limiter_gain: f32,
}

impl AudioGraph {
    pub fn new(
        synth: Arc<dyn SynthPort>,
        consumer: Consumer<ScheduledKeyEvent>,
        clock: Arc<AudioClock>,
    ) -> Self {
        Self {
            synth,
            clock,
            consumer,
            events: Vec::with_capacity(512),
            pending: Vec::with_capacity(4096),
            limiter_gain: 1.0,
        }
    }

    fn collect_events(&mut self, sample_time_end: SampleTime) {
        self.events.clear();

        // Drain the ring completely so a far-future release never blocks
        // triggers queued behind it.
        while let Ok(event) = self.consumer.pop() {
            self.pending.push(event);
        }

        let mut i = 0;
        while i < self.pending.len() {
            if self.pending[i].at < sample_time_end {
                self.events.push(self.pending.swap_remove(i));
            } else {
                i += 1;
            }
        }

        self.events.sort_by(|a, b| {
            a.at.cmp(&b.at)
                .then_with(|| event_rank(&a.event).cmp(&event_rank(&b.event)))
        });
    }

    fn render_segment(&mut self, out_l: &mut [f32], out_r: &mut [f32]) {
        let frames = out_l.len().min(out_r.len());
        self.synth.render(frames, out_l, out_r);

        let mut peak = 0.0_f32;
        for i in 0..frames {
            out_l[i] *= MASTER_GAIN;
            out_r[i] *= MASTER_GAIN;
            peak = peak.max(out_l[i].abs()).max(out_r[i].abs());
        }

        let target_gain = if peak > LIMIT { LIMIT / peak } else { 1.0 };
        // Fast attack, slow release.
        let coeff = if target_gain < self.limiter_gain { 0.25 } else { 0.01 };
        self.limiter_gain =
            (self.limiter_gain + coeff * (target_gain - self.limiter_gain)).clamp(0.0, 1.0);

        if self.limiter_gain < 0.999 {
            for i in 0..frames {
                out_l[i] *= self.limiter_gain;
                out_r[i] *= self.limiter_gain;
            }
        }
    }
}

// Releases before triggers at the same instant, so re-struck keys restart.
fn event_rank(event: &KeyEvent) -> u8 {
    match event {
        KeyEvent::Off { .. } => 0,
        KeyEvent::On { .. } => 1,
    }
}

impl AudioRenderCallback for AudioGraph {
    fn render(&mut self, sample_time_start: SampleTime, out_l: &mut [f32], out_r: &mut [f32]) {
        let frames = out_l.len().min(out_r.len());
        let sample_time_end = sample_time_start.saturating_add(frames as u64);

        self.collect_events(sample_time_end);

        let mut cursor_sample = sample_time_start;
        let mut cursor_frame = 0usize;

        for idx in 0..self.events.len() {
            let event = self.events[idx];
            if event.at >= sample_time_end {
                continue;
            }

            let event_sample = event.at.max(cursor_sample);
            let event_frame = (event_sample - cursor_sample) as usize;
            if event_frame > 0 {
                let end = cursor_frame + event_frame;
                self.render_segment(&mut out_l[cursor_frame..end], &mut out_r[cursor_frame..end]);
                cursor_frame = end;
                cursor_sample = event_sample;
            }
            self.synth.handle_event(event.event, event_sample);
        }

        if cursor_frame < frames {
            self.render_segment(&mut out_l[cursor_frame..frames], &mut out_r[cursor_frame..frames]);
        }
        self.clock.set(sample_time_end);
    }
}
