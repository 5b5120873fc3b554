use melodify_ports::config::{DrawMethod, Options};
use melodify_ports::types::Micros;
use melodify_score::NoteEvent;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ScoreSource {
    MidiFile(String),
    AudioFile(String),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Command {
    LoadScore { source: ScoreSource },
    TogglePlayPause,
    Restart,
    Seek { percent: f32 },
    SetSoundOn { on: bool },
    SetSoundFont { path: String },
    SetDrawMethod { method: DrawMethod },
    SetScrollSpeed { speed: u32 },
    SaveOptions,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Ready,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Event {
    ScoreLoaded {
        note_count: usize,
        total_us: Micros,
        title: String,
    },
    LoadFailed { reason: String },
    TransportUpdated {
        current_us: Micros,
        total_us: Micros,
        paused: bool,
    },
    NoteBatch { events: Vec<NoteEvent> },
    OptionsUpdated { options: Options },
}
