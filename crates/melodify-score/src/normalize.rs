use crate::model::{Division, MidiFile, NoteEvent, SmpteFps, TempoContext, TrackEventKind};
use log::debug;
use melodify_ports::types::Micros;
use std::collections::HashMap;

/// Flatten a decoded file into the time-ordered note-event score.
///
/// Each track keeps a running tick counter; ticks convert to microseconds
/// through the globally resolved tempo. Note pairing is a per-(track, key)
/// stack: a note-off (or a running-status note-on with velocity 0) closes
/// the most recently opened note of that key. Spurious note-offs are dropped,
/// as are note-ons never closed by end of track. Zero-duration notes are
/// kept so triggers still fire.
pub fn normalize(file: &MidiFile, context: &TempoContext) -> Vec<NoteEvent> {
    let (ticks_per_quarter, us_per_quarter) = time_base(file.division, context);
    let mut events = Vec::new();
    // Tags each note-on with its position in the file so simultaneous
    // notes sort in file order, not in the order their note-offs land.
    let mut on_seq: u64 = 0;

    for (track, data) in file.tracks.iter().enumerate() {
        let mut tick: u64 = 0;
        let mut open: HashMap<u8, Vec<(Micros, u8, u64)>> = HashMap::new();

        for event in &data.events {
            tick += event.delta_ticks as u64;
            match event.kind {
                TrackEventKind::NoteOn { key, velocity } if velocity > 0 => {
                    let start_us = ticks_to_us(tick, us_per_quarter, ticks_per_quarter);
                    open.entry(key).or_default().push((start_us, velocity, on_seq));
                    on_seq += 1;
                }
                TrackEventKind::NoteOn { key, .. } | TrackEventKind::NoteOff { key } => {
                    let now_us = ticks_to_us(tick, us_per_quarter, ticks_per_quarter);
                    match open.get_mut(&key).and_then(Vec::pop) {
                        Some((start_us, velocity, seq)) => events.push((
                            seq,
                            NoteEvent {
                                key,
                                velocity,
                                start_us,
                                duration_us: now_us - start_us,
                                track,
                            },
                        )),
                        None => {
                            debug!("track {track}: spurious note-off for key {key}, dropped");
                        }
                    }
                }
                _ => {}
            }
        }

        for (key, stack) in open {
            if !stack.is_empty() {
                debug!(
                    "track {track}: {} unterminated note-on(s) for key {key}, dropped",
                    stack.len()
                );
            }
        }
    }

    events.sort_by_key(|(seq, event)| (event.start_us, *seq));
    events.into_iter().map(|(_, event)| event).collect()
}

/// End of the piece: the latest note-off instant, 0 when there are no notes.
pub fn total_duration(events: &[NoteEvent]) -> Micros {
    events.iter().map(NoteEvent::end_us).max().unwrap_or(0)
}

/// Effective (ticks-per-quarter, µs-per-quarter) pair. SMPTE division is its
/// own conversion path: one "quarter" spans a second of frames.
fn time_base(division: Division, context: &TempoContext) -> (u16, u32) {
    match division {
        Division::TicksPerQuarter(ticks) => (ticks.max(1), context.us_per_quarter),
        Division::Smpte {
            fps,
            ticks_per_frame,
        } => {
            let ticks_per_frame = ticks_per_frame.max(1) as u16;
            match fps {
                SmpteFps::Fps24 => (24 * ticks_per_frame, 1_000_000),
                SmpteFps::Fps25 => (25 * ticks_per_frame, 1_000_000),
                SmpteFps::Fps30 => (30 * ticks_per_frame, 1_000_000),
                SmpteFps::Fps29 => (30 * ticks_per_frame, 1_001_000),
            }
        }
    }
}

fn ticks_to_us(ticks: u64, us_per_quarter: u32, ticks_per_quarter: u16) -> Micros {
    let ticks = ticks as i128;
    let us_per_quarter = us_per_quarter as i128;
    let ticks_per_quarter = ticks_per_quarter as i128;
    ((ticks * us_per_quarter) / ticks_per_quarter) as Micros
}
