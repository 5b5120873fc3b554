use melodify_player::audio_graph::AudioGraph;
use melodify_player::sound::AudioClock;
use melodify_ports::audio::AudioRenderCallback;
use melodify_ports::synth::{SoundFontInfo, SynthError, SynthPort};
use melodify_ports::types::{Gain01, KeyEvent, SampleTime, ScheduledKeyEvent};
use parking_lot::Mutex;
use rtrb::RingBuffer;
use std::sync::Arc;

#[derive(Default)]
struct RecordingSynth {
    handled: Mutex<Vec<(KeyEvent, SampleTime)>>,
}

impl SynthPort for RecordingSynth {
    fn load_soundfont_from_path(&self, _path: &str) -> Result<SoundFontInfo, SynthError> {
        Ok(SoundFontInfo {
            name: "test".to_string(),
            preset_count: 0,
        })
    }

    fn set_sample_rate(&self, _sample_rate_hz: u32) {}

    fn is_loaded(&self) -> bool {
        true
    }

    fn handle_event(&self, event: KeyEvent, at: SampleTime) {
        self.handled.lock().push((event, at));
    }

    fn render(&self, frames: usize, out_l: &mut [f32], out_r: &mut [f32]) {
        out_l[..frames].fill(0.0);
        out_r[..frames].fill(0.0);
    }
}

fn on(key: u8, at: SampleTime) -> ScheduledKeyEvent {
    ScheduledKeyEvent {
        at,
        event: KeyEvent::On {
            key,
            gain: Gain01::new(0.5),
        },
    }
}

fn off(key: u8, at: SampleTime) -> ScheduledKeyEvent {
    ScheduledKeyEvent {
        at,
        event: KeyEvent::Off { key },
    }
}

#[test]
fn sustained_release_does_not_delay_later_triggers() {
    let synth = Arc::new(RecordingSynth::default());
    let clock = Arc::new(AudioClock::new());
    let (mut producer, consumer) = RingBuffer::new(64);
    let mut graph = AudioGraph::new(synth.clone(), consumer, clock);

    // Push order is the control thread's: the sustained note's release
    // lands in the ring before the next trigger.
    producer.push(on(60, 0)).unwrap();
    producer.push(off(60, 220_500)).unwrap();
    producer.push(on(64, 1_100)).unwrap();

    let mut left = vec![0.0f32; 1024];
    let mut right = vec![0.0f32; 1024];
    for block in 0..10u64 {
        graph.render(block * 1024, &mut left, &mut right);
    }

    let handled = synth.handled.lock();
    assert!(handled
        .iter()
        .any(|(event, at)| matches!(event, KeyEvent::On { key: 60, .. }) && *at == 0));
    assert!(
        handled
            .iter()
            .any(|(event, at)| matches!(event, KeyEvent::On { key: 64, .. }) && *at == 1_100),
        "trigger queued behind a sustained release was never handled"
    );
    // The release itself is not due yet.
    assert!(!handled
        .iter()
        .any(|(event, _)| matches!(event, KeyEvent::Off { key: 60 })));
}

#[test]
fn releases_fire_once_due() {
    let synth = Arc::new(RecordingSynth::default());
    let clock = Arc::new(AudioClock::new());
    let (mut producer, consumer) = RingBuffer::new(64);
    let mut graph = AudioGraph::new(synth.clone(), consumer, clock);

    producer.push(on(60, 0)).unwrap();
    producer.push(off(60, 2_000)).unwrap();

    let mut left = vec![0.0f32; 1024];
    let mut right = vec![0.0f32; 1024];
    for block in 0..3u64 {
        graph.render(block * 1024, &mut left, &mut right);
    }

    let handled = synth.handled.lock();
    assert!(handled
        .iter()
        .any(|(event, at)| matches!(event, KeyEvent::Off { key: 60 }) && *at == 2_000));
}

#[test]
fn release_precedes_trigger_at_the_same_instant() {
    let synth = Arc::new(RecordingSynth::default());
    let clock = Arc::new(AudioClock::new());
    let (mut producer, consumer) = RingBuffer::new(64);
    let mut graph = AudioGraph::new(synth.clone(), consumer, clock);

    // Pushed trigger-first; the graph must still release the old note
    // before re-striking it.
    producer.push(on(60, 500)).unwrap();
    producer.push(off(60, 500)).unwrap();

    let mut left = vec![0.0f32; 1024];
    let mut right = vec![0.0f32; 1024];
    graph.render(0, &mut left, &mut right);

    let handled = synth.handled.lock();
    let order: Vec<u8> = handled
        .iter()
        .map(|(event, _)| match event {
            KeyEvent::Off { .. } => 0,
            KeyEvent::On { .. } => 1,
        })
        .collect();
    assert_eq!(order, vec![0, 1]);
}
