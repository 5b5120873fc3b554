use crate::ipc::{Command, Event, ScoreSource, SessionState};
use crate::player::Player;
use crate::sound::{AudioOutputService, SoundRenderer};
use log::{info, warn};
use melodify_ports::audio::AudioOutputPort;
use melodify_ports::config::{Options, OptionsStorePort};
use melodify_ports::source::SourcePort;
use melodify_ports::synth::SynthPort;
use melodify_ports::transcribe::{TranscribeOptions, TranscribePort};
use melodify_ports::types::AudioConfig;
use melodify_score::{decode, normalize, total_duration, NoteEvent, TempoContext};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("source error: {0}")]
    Source(#[from] melodify_ports::source::SourceError),
    #[error("transcription error: {0}")]
    Transcribe(#[from] melodify_ports::transcribe::TranscribeError),
    #[error("score load failed: {0}")]
    ScoreLoad(String),
    #[error("no transcription backend configured")]
    NoTranscriber,
}

pub struct AppCore {
    audio_port: Box<dyn AudioOutputPort>,
    synth: Arc<dyn SynthPort>,
    source: Box<dyn SourcePort>,
    transcriber: Option<Box<dyn TranscribePort>>,
    options_store: Option<Box<dyn OptionsStorePort>>,
    options: Options,
    session_state: SessionState,
    player: Option<Player>,
    sound: Arc<SoundRenderer>,
    audio: Option<Arc<AudioOutputService>>,
    audio_failed: bool,
    visual_batches: Arc<Mutex<VecDeque<Vec<NoteEvent>>>>,
    events: VecDeque<Event>,
    last_transport_emit: Instant,
    last_emitted_paused: bool,
}

impl AppCore {
    pub fn new(
        audio_port: Box<dyn AudioOutputPort>,
        synth: Arc<dyn SynthPort>,
        source: Box<dyn SourcePort>,
        transcriber: Option<Box<dyn TranscribePort>>,
        options_store: Option<Box<dyn OptionsStorePort>>,
    ) -> Self {
        let options = options_store
            .as_ref()
            .and_then(|store| store.load_options().ok())
            .unwrap_or_default();

        let sound = Arc::new(SoundRenderer::new(options.sound_on));

        Self {
            audio_port,
            synth,
            source,
            transcriber,
            options_store,
            options,
            session_state: SessionState::Idle,
            player: None,
            sound,
            audio: None,
            audio_failed: false,
            visual_batches: Arc::new(Mutex::new(VecDeque::new())),
            events: VecDeque::new(),
            last_transport_emit: Instant::now(),
            last_emitted_paused: true,
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn session_state(&self) -> SessionState {
        self.session_state
    }

    pub fn player(&self) -> Option<&Player> {
        self.player.as_ref()
    }

    pub fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::LoadScore { source } => {
                if let Err(err) = self.load_score(source) {
                    warn!("score load failed: {err}");
                    self.events.push_back(Event::LoadFailed {
                        reason: err.to_string(),
                    });
                }
            }
            Command::TogglePlayPause => {
                self.ensure_audio();
                if let Some(player) = self.player.as_mut() {
                    player.toggle_play_pause(Instant::now());
                    self.emit_transport(true);
                }
            }
            Command::Restart => {
                if let Some(player) = self.player.as_mut() {
                    player.restart();
                    self.emit_transport(true);
                }
            }
            Command::Seek { percent } => {
                if let Some(player) = self.player.as_mut() {
                    player.seek(percent, Instant::now());
                    self.emit_transport(true);
                }
            }
            Command::SetSoundOn { on } => {
                self.options.sound_on = on;
                self.sound.set_enabled(on);
                self.save_options();
                self.emit_options();
            }
            Command::SetSoundFont { path } => {
                // Loaded lazily when the audio output comes up.
                self.options.soundfont_path = Some(path);
                self.save_options();
                self.emit_options();
            }
            Command::SetDrawMethod { method } => {
                // Takes effect on the next score load; the live renderer
                // keeps its strategy.
                self.options.draw_method = method;
                self.save_options();
                self.emit_options();
            }
            Command::SetScrollSpeed { speed } => {
                self.options.scroll_speed = speed.max(1);
                self.save_options();
                self.emit_options();
            }
            Command::SaveOptions => {
                self.save_options();
            }
        }
    }

    /// Drive the playback clock and flush queued note batches. Call at the
    /// configured tick interval.
    pub fn tick(&mut self) {
        if let Some(player) = self.player.as_mut() {
            player.advance(Instant::now());
        }

        let batches: Vec<Vec<NoteEvent>> = self.visual_batches.lock().drain(..).collect();
        for batch in batches {
            self.events.push_back(Event::NoteBatch { events: batch });
        }

        // Auto-pause at the end must reach the UI even between throttle
        // windows.
        let paused = self.player.as_ref().map_or(true, Player::is_paused);
        let force = paused != self.last_emitted_paused;
        self.emit_transport(force);
    }

    pub fn drain_events(&mut self) -> Vec<Event> {
        self.events.drain(..).collect()
    }

    fn load_score(&mut self, source: ScoreSource) -> Result<(), AppError> {
        let (bytes, title) = match source {
            ScoreSource::MidiFile(location) => {
                let bytes = self.source.fetch(&location)?;
                (bytes, display_title(&location))
            }
            ScoreSource::AudioFile(path) => {
                let transcriber = self.transcriber.as_ref().ok_or(AppError::NoTranscriber)?;
                let result = transcriber.transcribe(
                    &path,
                    TranscribeOptions {
                        engine_path: self.options.transcriber_path.clone(),
                        keep_diagnostics: false,
                    },
                )?;
                (result.midi_bytes, display_title(&path))
            }
        };

        let file = decode(&bytes).map_err(|err| AppError::ScoreLoad(err.to_string()))?;
        let tempo = TempoContext::resolve(&file);
        let score = Arc::new(normalize(&file, &tempo));
        let total_us = total_duration(&score);
        info!(
            "loaded {title}: {} notes, {} us, tempo {} us/quarter",
            score.len(),
            total_us,
            tempo.us_per_quarter
        );

        // Replacing the player drops its listeners with it, so a stale
        // clock can never keep feeding the renderers.
        let mut player = Player::new(
            score.clone(),
            Duration::from_millis(self.options.tick_ms),
        );

        let sound = self.sound.clone();
        player.subscribe(Arc::new(move |batch| sound.handle_batch(batch)));

        let queue = self.visual_batches.clone();
        player.subscribe(Arc::new(move |batch| {
            queue.lock().push_back(batch.to_vec());
        }));

        self.visual_batches.lock().clear();
        self.player = Some(player);
        self.session_state = SessionState::Ready;
        self.events.push_back(Event::ScoreLoaded {
            note_count: score.len(),
            total_us,
            title,
        });
        self.emit_transport(true);
        Ok(())
    }

    /// Bring up the audio output on first demand. Failure downgrades the
    /// session to visual-only; it is never retried and never fatal.
    fn ensure_audio(&mut self) {
        if self.audio.is_some() || self.audio_failed {
            return;
        }

        if !self.synth.is_loaded() {
            if let Some(path) = self.options.soundfont_path.clone() {
                match self.synth.load_soundfont_from_path(&path) {
                    Ok(info) => info!("loaded soundfont {}", info.name),
                    Err(err) => warn!("soundfont load failed, continuing without sound: {err}"),
                }
            }
        }

        let config = AudioConfig {
            sample_rate_hz: 44_100,
            channels: 2,
            buffer_size_frames: None,
        };
        match AudioOutputService::start(self.audio_port.as_ref(), self.synth.clone(), config) {
            Ok(service) => {
                self.sound.attach(service.clone());
                self.audio = Some(service);
            }
            Err(err) => {
                warn!("audio output unavailable, playback is visual-only: {err}");
                self.audio_failed = true;
            }
        }
    }

    fn emit_transport(&mut self, force: bool) {
        let Some(player) = self.player.as_ref() else {
            return;
        };
        let now = Instant::now();
        if !force && now.duration_since(self.last_transport_emit) < Duration::from_millis(33) {
            return;
        }
        self.events.push_back(Event::TransportUpdated {
            current_us: player.current_us(),
            total_us: player.total_us(),
            paused: player.is_paused(),
        });
        self.last_transport_emit = now;
        self.last_emitted_paused = player.is_paused();
    }

    fn emit_options(&mut self) {
        self.events.push_back(Event::OptionsUpdated {
            options: self.options.clone(),
        });
    }

    fn save_options(&self) {
        if let Some(store) = self.options_store.as_ref() {
            if let Err(err) = store.save_options(&self.options) {
                warn!("failed to persist options: {err}");
            }
        }
    }
}

fn display_title(location: &str) -> String {
    Path::new(location)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| location.to_string())
}
