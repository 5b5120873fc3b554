use melodify_ports::types::Micros;
use melodify_score::{total_duration, NoteEvent};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub type NoteBatchCallback = Arc<dyn Fn(&[NoteEvent]) + Send + Sync>;

/// The playback clock: a virtual playhead over an immutable, time-sorted
/// note-event score.
///
/// Constructed paused at time 0. While playing, each [`advance`](Self::advance)
/// call adds the elapsed wall-clock delta and emits every event whose start
/// falls inside the just-elapsed window as one batch per tick, fanned out
/// synchronously to the listeners in registration order. Listeners never
/// mutate the player; transport state changes only through the explicit
/// transport calls. Pausing clears the wall-clock baseline synchronously, so
/// a tick that was already in flight observes the paused state and does
/// nothing.
pub struct Player {
    score: Arc<Vec<NoteEvent>>,
    listeners: Vec<NoteBatchCallback>,
    tick_interval: Duration,
    cursor: usize,
    current_us: Micros,
    total_us: Micros,
    paused: bool,
    last_tick: Option<Instant>,
}

impl Player {
    pub fn new(score: Arc<Vec<NoteEvent>>, tick_interval: Duration) -> Self {
        let total_us = total_duration(&score);
        Self {
            score,
            listeners: Vec::new(),
            tick_interval,
            cursor: 0,
            current_us: 0,
            total_us,
            paused: true,
            last_tick: None,
        }
    }

    /// Registration order is emission order; the sound renderer subscribes
    /// before the visual one so both see each batch in the same tick.
    pub fn subscribe(&mut self, listener: NoteBatchCallback) {
        self.listeners.push(listener);
    }

    pub fn score(&self) -> Arc<Vec<NoteEvent>> {
        self.score.clone()
    }

    pub fn current_us(&self) -> Micros {
        self.current_us
    }

    pub fn total_us(&self) -> Micros {
        self.total_us
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// An empty score is finished the moment it is loaded.
    pub fn is_finished(&self) -> bool {
        self.current_us >= self.total_us
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Paused -> playing (resumes from the current position) or
    /// playing -> paused (freezes time). Rapid double calls invert each
    /// other; nothing is double-armed.
    pub fn toggle_play_pause(&mut self, now: Instant) {
        if self.paused {
            self.paused = false;
            self.last_tick = Some(now);
        } else {
            self.paused = true;
            self.last_tick = None;
        }
    }

    /// Any state -> time 0, paused.
    pub fn restart(&mut self) {
        self.paused = true;
        self.last_tick = None;
        self.current_us = 0;
        self.cursor = 0;
    }

    /// Jump to `percent` (0-100) of the total duration. Play/pause state is
    /// unchanged; when playing, advancement continues from the new position.
    pub fn seek(&mut self, percent: f32, now: Instant) {
        let percent = percent.clamp(0.0, 100.0);
        self.current_us = ((self.total_us as f64) * (percent as f64) / 100.0).round() as Micros;
        self.cursor = self
            .score
            .partition_point(|event| event.start_us < self.current_us);
        if !self.paused {
            self.last_tick = Some(now);
        }
    }

    /// One clock tick: add the wall-clock delta since the previous tick and
    /// emit the events that became due. Reaching the end clamps the playhead
    /// to the total duration, flushes the remaining events, and
    /// auto-transitions to paused; no wraparound, no error.
    pub fn advance(&mut self, now: Instant) {
        if self.paused {
            return;
        }
        let Some(last) = self.last_tick else {
            return;
        };
        let elapsed = now.saturating_duration_since(last).as_micros() as Micros;
        self.last_tick = Some(now);
        if elapsed == 0 {
            return;
        }

        self.current_us = (self.current_us + elapsed).min(self.total_us);
        let reached_end = self.current_us >= self.total_us;

        let start = self.cursor;
        while let Some(event) = self.score.get(self.cursor) {
            let due = if reached_end {
                event.start_us <= self.current_us
            } else {
                event.start_us < self.current_us
            };
            if !due {
                break;
            }
            self.cursor += 1;
        }

        if self.cursor > start {
            let batch = &self.score[start..self.cursor];
            for listener in &self.listeners {
                listener(batch);
            }
        }

        if reached_end {
            self.paused = true;
            self.last_tick = None;
        }
    }
}
