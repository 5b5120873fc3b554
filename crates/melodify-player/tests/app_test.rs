use melodify_player::app::AppCore;
use melodify_player::ipc::{Command, Event, ScoreSource, SessionState};
use melodify_ports::audio::{
    AudioError, AudioOutputPort, AudioRenderCallback, AudioStreamHandle,
};
use melodify_ports::config::{ConfigError, Options, OptionsStorePort};
use melodify_ports::source::{SourceError, SourcePort};
use melodify_ports::synth::{SoundFontInfo, SynthError, SynthPort};
use melodify_ports::types::{AudioConfig, AudioOutputDevice, KeyEvent, SampleTime};
use midly::num::{u15, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

fn simple_midi() -> Vec<u8> {
    let track = vec![
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Midi {
                channel: u4::new(0),
                message: MidiMessage::NoteOn {
                    key: u7::new(60),
                    vel: u7::new(100),
                },
            },
        },
        TrackEvent {
            delta: u28::new(480),
            kind: TrackEventKind::Midi {
                channel: u4::new(0),
                message: MidiMessage::NoteOff {
                    key: u7::new(60),
                    vel: u7::new(0),
                },
            },
        },
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        },
    ];
    let smf = Smf {
        header: Header {
            format: Format::SingleTrack,
            timing: Timing::Metrical(u15::new(480)),
        },
        tracks: vec![track],
    };
    let mut data = Vec::new();
    smf.write(&mut data).expect("midi write should succeed");
    data
}

struct StubStream;

impl AudioStreamHandle for StubStream {
    fn close(self: Box<Self>) {}
}

struct StubAudio {
    fail: bool,
}

impl AudioOutputPort for StubAudio {
    fn list_outputs(&self) -> Result<Vec<AudioOutputDevice>, AudioError> {
        Ok(Vec::new())
    }

    fn open_default_output(
        &self,
        _config: AudioConfig,
        _cb: Box<dyn AudioRenderCallback>,
    ) -> Result<Box<dyn AudioStreamHandle>, AudioError> {
        if self.fail {
            Err(AudioError::Backend("no device".to_string()))
        } else {
            Ok(Box::new(StubStream))
        }
    }
}

#[derive(Default)]
struct StubSynth {
    loaded: AtomicBool,
    events: Mutex<Vec<(KeyEvent, SampleTime)>>,
}

impl SynthPort for StubSynth {
    fn load_soundfont_from_path(&self, path: &str) -> Result<SoundFontInfo, SynthError> {
        self.loaded.store(true, Ordering::SeqCst);
        Ok(SoundFontInfo {
            name: path.to_string(),
            preset_count: 1,
        })
    }

    fn set_sample_rate(&self, _sample_rate_hz: u32) {}

    fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    fn handle_event(&self, event: KeyEvent, at: SampleTime) {
        self.events.lock().push((event, at));
    }

    fn render(&self, frames: usize, out_l: &mut [f32], out_r: &mut [f32]) {
        out_l[..frames].fill(0.0);
        out_r[..frames].fill(0.0);
    }
}

struct MemorySource {
    files: HashMap<String, Vec<u8>>,
}

impl SourcePort for MemorySource {
    fn fetch(&self, source: &str) -> Result<Vec<u8>, SourceError> {
        self.files
            .get(source)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(source.to_string()))
    }
}

#[derive(Default)]
struct MemoryOptions {
    saved: Mutex<Option<Options>>,
}

impl OptionsStorePort for MemoryOptions {
    fn load_options(&self) -> Result<Options, ConfigError> {
        Ok(self.saved.lock().clone().unwrap_or_default())
    }

    fn save_options(&self, options: &Options) -> Result<(), ConfigError> {
        *self.saved.lock() = Some(options.clone());
        Ok(())
    }
}

fn app(fail_audio: bool, store: Option<Arc<MemoryOptions>>) -> AppCore {
    let mut files = HashMap::new();
    files.insert("song.mid".to_string(), simple_midi());

    struct SharedStore(Arc<MemoryOptions>);
    impl OptionsStorePort for SharedStore {
        fn load_options(&self) -> Result<Options, ConfigError> {
            self.0.load_options()
        }
        fn save_options(&self, options: &Options) -> Result<(), ConfigError> {
            self.0.save_options(options)
        }
    }

    AppCore::new(
        Box::new(StubAudio { fail: fail_audio }),
        Arc::new(StubSynth::default()),
        Box::new(MemorySource { files }),
        None,
        store.map(|inner| Box::new(SharedStore(inner)) as Box<dyn OptionsStorePort>),
    )
}

#[test]
fn load_score_emits_score_loaded() {
    let mut app = app(false, None);
    app.handle_command(Command::LoadScore {
        source: ScoreSource::MidiFile("song.mid".to_string()),
    });

    let events = app.drain_events();
    assert!(events.iter().any(|event| matches!(
        event,
        Event::ScoreLoaded {
            note_count: 1,
            total_us: 500_000,
            ..
        }
    )));
    assert_eq!(app.session_state(), SessionState::Ready);
}

#[test]
fn missing_source_emits_load_failed() {
    let mut app = app(false, None);
    app.handle_command(Command::LoadScore {
        source: ScoreSource::MidiFile("nope.mid".to_string()),
    });

    let events = app.drain_events();
    assert!(events
        .iter()
        .any(|event| matches!(event, Event::LoadFailed { .. })));
    assert_eq!(app.session_state(), SessionState::Idle);
}

#[test]
fn garbage_bytes_emit_load_failed() {
    let mut files = HashMap::new();
    files.insert("bad.mid".to_string(), vec![0u8; 16]);
    let mut app = AppCore::new(
        Box::new(StubAudio { fail: false }),
        Arc::new(StubSynth::default()),
        Box::new(MemorySource { files }),
        None,
        None,
    );

    app.handle_command(Command::LoadScore {
        source: ScoreSource::MidiFile("bad.mid".to_string()),
    });
    assert!(app
        .drain_events()
        .iter()
        .any(|event| matches!(event, Event::LoadFailed { .. })));
}

#[test]
fn transcription_without_backend_fails_cleanly() {
    let mut app = app(false, None);
    app.handle_command(Command::LoadScore {
        source: ScoreSource::AudioFile("take.wav".to_string()),
    });
    assert!(app
        .drain_events()
        .iter()
        .any(|event| matches!(event, Event::LoadFailed { .. })));
}

#[test]
fn toggle_without_score_is_a_no_op() {
    let mut app = app(false, None);
    app.handle_command(Command::TogglePlayPause);
    assert!(app.drain_events().is_empty());
}

#[test]
fn toggle_starts_playback_and_emits_transport() {
    let mut app = app(false, None);
    app.handle_command(Command::LoadScore {
        source: ScoreSource::MidiFile("song.mid".to_string()),
    });
    app.drain_events();

    app.handle_command(Command::TogglePlayPause);
    let events = app.drain_events();
    assert!(events.iter().any(|event| matches!(
        event,
        Event::TransportUpdated { paused: false, .. }
    )));
}

#[test]
fn audio_failure_degrades_to_visual_only() {
    let mut app = app(true, None);
    app.handle_command(Command::LoadScore {
        source: ScoreSource::MidiFile("song.mid".to_string()),
    });
    app.drain_events();

    // Audio comes up lazily on the first toggle; its failure must not
    // block the transport.
    app.handle_command(Command::TogglePlayPause);
    let events = app.drain_events();
    assert!(events.iter().any(|event| matches!(
        event,
        Event::TransportUpdated { paused: false, .. }
    )));

    sleep(Duration::from_millis(10));
    app.tick();
    assert!(app
        .drain_events()
        .iter()
        .any(|event| matches!(event, Event::NoteBatch { .. })));
}

#[test]
fn ticks_emit_note_batches_while_playing() {
    let mut app = app(false, None);
    app.handle_command(Command::LoadScore {
        source: ScoreSource::MidiFile("song.mid".to_string()),
    });
    app.handle_command(Command::TogglePlayPause);
    app.drain_events();

    sleep(Duration::from_millis(10));
    app.tick();
    let events = app.drain_events();
    let batch = events.iter().find_map(|event| match event {
        Event::NoteBatch { events } => Some(events.clone()),
        _ => None,
    });
    let batch = batch.expect("note at time zero should be emitted");
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].key, 60);
}

#[test]
fn reloading_replaces_the_player() {
    let mut app = app(false, None);
    app.handle_command(Command::LoadScore {
        source: ScoreSource::MidiFile("song.mid".to_string()),
    });
    app.handle_command(Command::TogglePlayPause);
    app.drain_events();

    // The second load rewinds to a fresh paused player.
    app.handle_command(Command::LoadScore {
        source: ScoreSource::MidiFile("song.mid".to_string()),
    });
    let events = app.drain_events();
    assert!(events.iter().any(|event| matches!(
        event,
        Event::TransportUpdated {
            current_us: 0,
            paused: true,
            ..
        }
    )));
}

#[test]
fn sound_toggle_updates_and_persists_options() {
    let store = Arc::new(MemoryOptions::default());
    let mut app = app(false, Some(store.clone()));

    app.handle_command(Command::SetSoundOn { on: false });
    let events = app.drain_events();
    assert!(events.iter().any(|event| matches!(
        event,
        Event::OptionsUpdated { options: Options { sound_on: false, .. } }
    )));
    assert_eq!(store.saved.lock().as_ref().map(|o| o.sound_on), Some(false));
}

#[test]
fn seek_moves_the_transport() {
    let mut app = app(false, None);
    app.handle_command(Command::LoadScore {
        source: ScoreSource::MidiFile("song.mid".to_string()),
    });
    app.drain_events();

    app.handle_command(Command::Seek { percent: 50.0 });
    let events = app.drain_events();
    assert!(events.iter().any(|event| matches!(
        event,
        Event::TransportUpdated {
            current_us: 250_000,
            ..
        }
    )));
}
