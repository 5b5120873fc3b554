use crate::model::{Division, MidiFile, MidiTrack, SmpteFps, TimedEvent, TrackEventKind};
use midly::{Fps, MetaMessage, MidiMessage, Smf, Timing, TrackEventKind as SmfEventKind};

#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("malformed midi file: {0}")]
    Malformed(String),
}

/// Decode a Standard MIDI File (format 0/1) byte buffer into the event
/// timeline. Pure and deterministic: the same bytes always produce a
/// structurally identical [`MidiFile`]. A malformed header, a bogus chunk
/// where a track is expected, or a variable-length quantity running past the
/// buffer all fail here, before playback can start.
pub fn decode(bytes: &[u8]) -> Result<MidiFile, DecodeError> {
    let smf = Smf::parse(bytes).map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let division = match smf.header.timing {
        Timing::Metrical(ticks) => Division::TicksPerQuarter(ticks.as_int()),
        Timing::Timecode(fps, ticks_per_frame) => Division::Smpte {
            fps: match fps {
                Fps::Fps24 => SmpteFps::Fps24,
                Fps::Fps25 => SmpteFps::Fps25,
                Fps::Fps29 => SmpteFps::Fps29,
                Fps::Fps30 => SmpteFps::Fps30,
            },
            ticks_per_frame,
        },
    };

    let tracks = smf
        .tracks
        .iter()
        .map(|track| MidiTrack {
            events: track
                .iter()
                .map(|event| TimedEvent {
                    delta_ticks: event.delta.as_int(),
                    kind: decode_kind(&event.kind),
                })
                .collect(),
        })
        .collect();

    Ok(MidiFile { division, tracks })
}

fn decode_kind(kind: &SmfEventKind) -> TrackEventKind {
    match kind {
        SmfEventKind::Midi { message, .. } => match message {
            MidiMessage::NoteOn { key, vel } => TrackEventKind::NoteOn {
                key: key.as_int(),
                velocity: vel.as_int(),
            },
            MidiMessage::NoteOff { key, .. } => TrackEventKind::NoteOff { key: key.as_int() },
            _ => TrackEventKind::Ignored,
        },
        SmfEventKind::Meta(MetaMessage::Tempo(us_per_quarter)) => TrackEventKind::Tempo {
            us_per_quarter: us_per_quarter.as_int(),
        },
        SmfEventKind::Meta(MetaMessage::TimeSignature(num, den_pow2, metronome, thirty_seconds)) => {
            TrackEventKind::TimeSignature {
                numerator: *num,
                denominator: 1u8.checked_shl(*den_pow2 as u32).unwrap_or(u8::MAX),
                metronome: *metronome,
                thirty_seconds: *thirty_seconds,
            }
        }
        SmfEventKind::Meta(MetaMessage::EndOfTrack) => TrackEventKind::EndOfTrack,
        _ => TrackEventKind::Ignored,
    }
}
