use std::sync::Arc;
use std::time::Duration;

use melodify_ports::config::{DrawMethod, Options};
use melodify_ports::types::Micros;
use melodify_score::NoteEvent;

use crate::roll::{visible_blocks, KeyboardLayout, NoteBlock};

/// One rendered snapshot of the falling-note view.
#[derive(Clone, Debug)]
pub struct RollFrame {
    pub playhead_us: Micros,
    pub blocks: Vec<NoteBlock>,
}

/// Strategy for producing roll frames. Chosen once from the draw-method
/// option when the score is loaded; switching methods requires a reload.
pub trait RollRenderer: Send {
    /// Produce the next frame. `player_us` is the transport position at the
    /// time of the call; whether the renderer trusts it is up to the strategy.
    fn frame(&mut self, player_us: Micros, view_height: f32) -> RollFrame;

    fn resize(&mut self, width: f32);

    fn seek(&mut self, player_us: Micros);
}

/// View height in time terms: a faster scroll speed shows less lead time.
pub fn lead_us_for_speed(scroll_speed: u32) -> Micros {
    120_000_000 / scroll_speed.max(1) as i64
}

/// Advances its own playhead by a fixed step per frame, assuming frames
/// arrive at the configured tick rate. Drifts under jitter but renders
/// perfectly smooth scrolling; resynced on every seek.
pub struct IntervalRenderer {
    score: Arc<Vec<NoteEvent>>,
    layout: KeyboardLayout,
    lead_us: Micros,
    step_us: Micros,
    playhead_us: Micros,
}

impl IntervalRenderer {
    pub fn new(score: Arc<Vec<NoteEvent>>, width: f32, options: &Options) -> Self {
        Self {
            score,
            layout: KeyboardLayout::new(width),
            lead_us: lead_us_for_speed(options.scroll_speed),
            step_us: Duration::from_millis(options.tick_ms).as_micros() as Micros,
            playhead_us: 0,
        }
    }
}

impl RollRenderer for IntervalRenderer {
    fn frame(&mut self, _player_us: Micros, view_height: f32) -> RollFrame {
        let blocks = visible_blocks(
            &self.layout,
            &self.score,
            self.playhead_us,
            self.lead_us,
            view_height,
        );
        let frame = RollFrame {
            playhead_us: self.playhead_us,
            blocks,
        };
        self.playhead_us += self.step_us;
        frame
    }

    fn resize(&mut self, width: f32) {
        self.layout = KeyboardLayout::new(width);
    }

    fn seek(&mut self, player_us: Micros) {
        self.playhead_us = player_us;
    }
}

/// Recomputes the view from the transport position on every call. Immune to
/// tick jitter; scroll granularity is whatever the clock delivers.
pub struct FrameRenderer {
    score: Arc<Vec<NoteEvent>>,
    layout: KeyboardLayout,
    lead_us: Micros,
}

impl FrameRenderer {
    pub fn new(score: Arc<Vec<NoteEvent>>, width: f32, options: &Options) -> Self {
        Self {
            score,
            layout: KeyboardLayout::new(width),
            lead_us: lead_us_for_speed(options.scroll_speed),
        }
    }
}

impl RollRenderer for FrameRenderer {
    fn frame(&mut self, player_us: Micros, view_height: f32) -> RollFrame {
        let blocks = visible_blocks(
            &self.layout,
            &self.score,
            player_us,
            self.lead_us,
            view_height,
        );
        RollFrame {
            playhead_us: player_us,
            blocks,
        }
    }

    fn resize(&mut self, width: f32) {
        self.layout = KeyboardLayout::new(width);
    }

    fn seek(&mut self, _player_us: Micros) {}
}

pub fn renderer_for(
    score: Arc<Vec<NoteEvent>>,
    width: f32,
    options: &Options,
) -> Box<dyn RollRenderer> {
    match options.draw_method {
        DrawMethod::Interval => Box::new(IntervalRenderer::new(score, width, options)),
        DrawMethod::Frame => Box::new(FrameRenderer::new(score, width, options)),
    }
}
