use melodify_ports::types::Micros;
use serde::{Deserialize, Serialize};

/// Time-division of a Standard MIDI File header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Division {
    TicksPerQuarter(u16),
    Smpte { fps: SmpteFps, ticks_per_frame: u8 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SmpteFps {
    Fps24,
    Fps25,
    Fps29,
    Fps30,
}

/// Raw event kinds the playback pipeline cares about. Everything else in the
/// file decodes to `Ignored` so delta times still accumulate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackEventKind {
    NoteOn { key: u8, velocity: u8 },
    NoteOff { key: u8 },
    Tempo { us_per_quarter: u32 },
    TimeSignature {
        numerator: u8,
        denominator: u8,
        metronome: u8,
        thirty_seconds: u8,
    },
    EndOfTrack,
    Ignored,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimedEvent {
    /// Ticks since the previous event in the same track.
    pub delta_ticks: u32,
    pub kind: TrackEventKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MidiTrack {
    pub events: Vec<TimedEvent>,
}

/// Decoded Standard MIDI File. Immutable once parsed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MidiFile {
    pub division: Division,
    pub tracks: Vec<MidiTrack>,
}

/// Tempo and meter metadata, resolved once from the first matching meta
/// events of track 0 and held constant for the whole piece. Mid-piece tempo
/// changes are ignored, matching the original player.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TempoContext {
    pub us_per_quarter: u32,
    pub numerator: u8,
    pub denominator: u8,
    /// MIDI clocks per metronome click.
    pub metronome: u8,
}

impl Default for TempoContext {
    fn default() -> Self {
        Self {
            us_per_quarter: 500_000, // 120 BPM
            numerator: 4,
            denominator: 4,
            metronome: 24,
        }
    }
}

impl TempoContext {
    /// First tempo and time-signature events found in track 0 win; anything
    /// later in the piece is deliberately not modeled.
    pub fn resolve(file: &MidiFile) -> Self {
        let mut context = Self::default();
        let Some(track) = file.tracks.first() else {
            return context;
        };

        let mut tempo_seen = false;
        let mut meter_seen = false;
        for event in &track.events {
            match event.kind {
                TrackEventKind::Tempo { us_per_quarter } if !tempo_seen => {
                    context.us_per_quarter = us_per_quarter;
                    tempo_seen = true;
                }
                TrackEventKind::TimeSignature {
                    numerator,
                    denominator,
                    metronome,
                    ..
                } if !meter_seen => {
                    context.numerator = numerator;
                    context.denominator = denominator;
                    context.metronome = metronome;
                    meter_seen = true;
                }
                _ => {}
            }
            if tempo_seen && meter_seen {
                break;
            }
        }
        context
    }
}

/// One played note in the absolute-time domain. The full sorted sequence is
/// the player's score; created once per loaded file and never mutated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub key: u8,
    pub velocity: u8,
    pub start_us: Micros,
    pub duration_us: Micros,
    pub track: usize,
}

impl NoteEvent {
    pub fn end_us(&self) -> Micros {
        self.start_us + self.duration_us
    }
}
