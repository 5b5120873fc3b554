use melodify_score::{decode, Division, TempoContext, TrackEventKind};
use midly::num::{u15, u24, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind as SmfKind};

fn build_midi(tracks: Vec<Vec<TrackEvent<'static>>>) -> Vec<u8> {
    let smf = Smf {
        header: Header {
            format: if tracks.len() > 1 {
                Format::Parallel
            } else {
                Format::SingleTrack
            },
            timing: Timing::Metrical(u15::new(480)),
        },
        tracks,
    };
    let mut data = Vec::new();
    smf.write(&mut data).expect("midi write should succeed");
    data
}

fn note_on(delta: u32, key: u8, vel: u8) -> TrackEvent<'static> {
    TrackEvent {
        delta: u28::new(delta),
        kind: SmfKind::Midi {
            channel: u4::new(0),
            message: MidiMessage::NoteOn {
                key: u7::new(key),
                vel: u7::new(vel),
            },
        },
    }
}

fn end_of_track() -> TrackEvent<'static> {
    TrackEvent {
        delta: u28::new(0),
        kind: SmfKind::Meta(MetaMessage::EndOfTrack),
    }
}

#[test]
fn decode_reads_division_and_events() {
    let midi = build_midi(vec![vec![
        TrackEvent {
            delta: u28::new(0),
            kind: SmfKind::Meta(MetaMessage::Tempo(u24::new(600_000))),
        },
        note_on(0, 60, 100),
        end_of_track(),
    ]]);

    let file = decode(&midi).expect("decode should succeed");
    assert_eq!(file.division, Division::TicksPerQuarter(480));
    assert_eq!(file.tracks.len(), 1);
    assert!(file.tracks[0].events.iter().any(|e| matches!(
        e.kind,
        TrackEventKind::Tempo {
            us_per_quarter: 600_000
        }
    )));
    assert!(file.tracks[0]
        .events
        .iter()
        .any(|e| matches!(e.kind, TrackEventKind::NoteOn { key: 60, velocity: 100 })));
}

#[test]
fn decode_is_deterministic() {
    let midi = build_midi(vec![vec![
        note_on(0, 60, 100),
        note_on(240, 64, 90),
        end_of_track(),
    ]]);

    let first = decode(&midi).expect("decode should succeed");
    let second = decode(&midi).expect("decode should succeed");
    assert_eq!(first, second);
}

#[test]
fn decode_rejects_garbage() {
    assert!(decode(b"not a midi file at all").is_err());
    assert!(decode(&[]).is_err());
}

#[test]
fn decode_rejects_truncated_file() {
    let mut midi = build_midi(vec![vec![
        note_on(0, 60, 100),
        note_on(480, 60, 0),
        end_of_track(),
    ]]);
    midi.truncate(16); // header survives, track chunk does not
    assert!(decode(&midi).is_err());
}

#[test]
fn tempo_context_defaults_when_no_meta_events() {
    let midi = build_midi(vec![vec![note_on(0, 60, 100), end_of_track()]]);
    let file = decode(&midi).expect("decode should succeed");
    let context = TempoContext::resolve(&file);
    assert_eq!(context.us_per_quarter, 500_000);
    assert_eq!((context.numerator, context.denominator), (4, 4));
    assert_eq!(context.metronome, 24);
}

#[test]
fn tempo_context_takes_first_tempo_event() {
    let midi = build_midi(vec![vec![
        TrackEvent {
            delta: u28::new(0),
            kind: SmfKind::Meta(MetaMessage::Tempo(u24::new(400_000))),
        },
        TrackEvent {
            delta: u28::new(0),
            kind: SmfKind::Meta(MetaMessage::TimeSignature(3, 2, 36, 8)),
        },
        // A later tempo change is deliberately ignored.
        TrackEvent {
            delta: u28::new(960),
            kind: SmfKind::Meta(MetaMessage::Tempo(u24::new(250_000))),
        },
        end_of_track(),
    ]]);

    let file = decode(&midi).expect("decode should succeed");
    let context = TempoContext::resolve(&file);
    assert_eq!(context.us_per_quarter, 400_000);
    assert_eq!((context.numerator, context.denominator), (3, 4));
    assert_eq!(context.metronome, 36);
}
