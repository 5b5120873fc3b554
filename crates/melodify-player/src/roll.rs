use melodify_ports::types::Micros;
use melodify_score::NoteEvent;

/// Standard 88-key range: A0..=C8.
pub const FIRST_KEY: u8 = 21;
pub const LAST_KEY: u8 = 108;
pub const WHITE_KEY_COUNT: usize = 52;

/// Pitch classes that carry a black key (C#, D#, F#, G#, A#).
pub fn is_black_key(key: u8) -> bool {
    matches!(key % 12, 1 | 3 | 6 | 8 | 10)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KeySlot {
    pub key: u8,
    pub x: f32,
    pub width: f32,
    pub is_black: bool,
}

/// Keyboard geometry computed purely from the available container width:
/// 52 equal white columns, black keys offset into the gap above them at the
/// standard pattern (no black key above E or B, none past the last C).
/// Rebuilt wholesale on resize.
#[derive(Clone, Debug)]
pub struct KeyboardLayout {
    width: f32,
    white_key_width: f32,
    slots: Vec<KeySlot>,
}

impl KeyboardLayout {
    pub fn new(width: f32) -> Self {
        let white_key_width = width / WHITE_KEY_COUNT as f32;
        let mut slots = Vec::with_capacity(88);
        let mut key = FIRST_KEY;

        for column in 0..WHITE_KEY_COUNT {
            let x = white_key_width * column as f32;
            slots.push(KeySlot {
                key,
                x,
                width: white_key_width,
                is_black: false,
            });
            // White keys with a sharp neighbor above: A, C, D, F, G.
            if matches!(key % 12, 0 | 2 | 5 | 7 | 9) {
                let black = key + 1;
                if black <= LAST_KEY {
                    slots.push(KeySlot {
                        key: black,
                        x: x + white_key_width / 1.4,
                        width: white_key_width / 1.8,
                        is_black: true,
                    });
                }
                key += 1;
            }
            key += 1;
        }

        Self {
            width,
            white_key_width,
            slots,
        }
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn white_key_width(&self) -> f32 {
        self.white_key_width
    }

    pub fn slots(&self) -> &[KeySlot] {
        &self.slots
    }

    pub fn slot(&self, key: u8) -> Option<&KeySlot> {
        self.slots.iter().find(|slot| slot.key == key)
    }
}

/// One falling note block in view coordinates: x/width from the key column,
/// top/height from time-until-hit and duration. `y = height_rows` is the
/// keyboard line; blocks scroll downward toward it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoteBlock {
    pub key: u8,
    pub x: f32,
    pub width: f32,
    pub top: f32,
    pub bottom: f32,
    pub sounding: bool,
    pub track: usize,
}

/// Project the score around the playhead onto the view. `lead_us` is how
/// much upcoming time the view height covers; a note whose start equals the
/// playhead sits exactly on the keyboard line.
pub fn visible_blocks(
    layout: &KeyboardLayout,
    score: &[NoteEvent],
    playhead_us: Micros,
    lead_us: Micros,
    view_height: f32,
) -> Vec<NoteBlock> {
    let horizon = playhead_us + lead_us;
    let upper = score.partition_point(|event| event.start_us <= horizon);

    let mut blocks = Vec::new();
    for event in &score[..upper] {
        if event.end_us() < playhead_us {
            continue;
        }
        let Some(slot) = layout.slot(event.key) else {
            continue; // outside the 88-key range
        };

        let rows_per_us = view_height / lead_us as f32;
        let bottom = view_height - (event.start_us - playhead_us) as f32 * rows_per_us;
        let top = bottom - event.duration_us as f32 * rows_per_us;

        blocks.push(NoteBlock {
            key: event.key,
            x: slot.x,
            width: slot.width,
            top: top.max(0.0),
            bottom: bottom.min(view_height),
            sounding: event.start_us <= playhead_us && playhead_us < event.end_us(),
            track: event.track,
        });
    }
    blocks
}

/// Keys currently held down at the playhead, for key-press highlighting.
pub fn pressed_keys(score: &[NoteEvent], playhead_us: Micros) -> Vec<u8> {
    let mut keys: Vec<u8> = score
        .iter()
        .take_while(|event| event.start_us <= playhead_us)
        .filter(|event| playhead_us < event.end_us() || event.duration_us == 0 && event.start_us == playhead_us)
        .map(|event| event.key)
        .collect();
    keys.sort_unstable();
    keys.dedup();
    keys
}
