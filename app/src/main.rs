use anyhow::{bail, Context, Result};
use clap::Parser;
use crossterm::cursor::{Hide, Show};
use crossterm::event::{self, Event as TermEvent, KeyCode, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use log::debug;
use melodify_infra_audio_cpal::CpalAudioOutputPort;
use melodify_infra_source_fs::{FsOptionsStore, FsSource};
use melodify_infra_synth_rustysynth::RustySynth;
use melodify_infra_transcribe_cli::CliTranscriber;
use melodify_player::app::AppCore;
use melodify_player::ipc::{Command, Event, ScoreSource};
use melodify_player::renderer::{renderer_for, RollRenderer};
use melodify_player::roll::KeyboardLayout;
use melodify_ports::config::DrawMethod;
use melodify_ports::types::Micros;
use std::io::stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};

mod ui;
use ui::{format_timestamp, progress_bar, TermUi};

/// Falling-note MIDI player for the terminal.
#[derive(Parser, Debug)]
#[command(name = "melodify")]
struct Opt {
    /// MIDI file to play (path or file:// URL)
    source: Option<String>,
    /// Transcribe an audio recording to MIDI and play the result
    #[arg(long)]
    transcribe: Option<String>,
    /// SoundFont (.sf2) used for sound output
    #[arg(long)]
    soundfont: Option<String>,
    /// External transcriber executable
    #[arg(long)]
    transcriber: Option<String>,
    /// Roll scroll speed (higher scrolls faster)
    #[arg(long)]
    speed: Option<u32>,
    /// Redraw strategy: "interval" or "frame"
    #[arg(long)]
    draw_method: Option<String>,
    /// Start with sound muted
    #[arg(long)]
    no_sound: bool,
}

struct RawGuard;
impl RawGuard {
    fn enter() -> Result<Self> {
        enable_raw_mode()?;
        execute!(stdout(), EnterAlternateScreen, Hide)?;
        Ok(Self)
    }
}
impl Drop for RawGuard {
    fn drop(&mut self) {
        let _ = execute!(stdout(), Show, LeaveAlternateScreen);
        let _ = disable_raw_mode();
    }
}

fn parse_draw_method(value: &str) -> Result<DrawMethod> {
    match value.to_ascii_lowercase().as_str() {
        "interval" => Ok(DrawMethod::Interval),
        "frame" => Ok(DrawMethod::Frame),
        other => bail!("unknown draw method {other}, expected interval or frame"),
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let opt = Opt::parse();

    let mut core = AppCore::new(
        Box::new(CpalAudioOutputPort::new()),
        Arc::new(RustySynth::default()),
        Box::new(FsSource::new()),
        Some(Box::new(CliTranscriber::new(opt.transcriber.clone()))),
        Some(Box::new(FsOptionsStore::default())),
    );

    if let Some(path) = opt.soundfont.clone() {
        core.handle_command(Command::SetSoundFont { path });
    }
    if opt.no_sound {
        core.handle_command(Command::SetSoundOn { on: false });
    }
    if let Some(speed) = opt.speed {
        core.handle_command(Command::SetScrollSpeed { speed });
    }
    if let Some(method) = opt.draw_method.as_deref() {
        let method = parse_draw_method(method)?;
        core.handle_command(Command::SetDrawMethod { method });
    }
    core.drain_events();

    let source = match (&opt.transcribe, &opt.source) {
        (Some(audio), _) => ScoreSource::AudioFile(audio.clone()),
        (None, Some(midi)) => ScoreSource::MidiFile(midi.clone()),
        (None, None) => bail!("nothing to play: pass a MIDI file or --transcribe <audio>"),
    };

    core.handle_command(Command::LoadScore { source });
    let mut title = String::new();
    for event in core.drain_events() {
        match event {
            Event::LoadFailed { reason } => bail!("could not load score: {reason}"),
            Event::ScoreLoaded {
                note_count,
                total_us,
                title: loaded,
            } => {
                debug!("score ready: {note_count} notes, {total_us} us");
                title = loaded;
            }
            _ => {}
        }
    }

    let player = core.player().context("score loaded but no player")?;
    let score = player.score();
    let tick_interval = player.tick_interval();

    let (cols, rows) = crossterm::terminal::size()?;
    let options = core.options().clone();
    let mut renderer = renderer_for(score, f32::from(cols), &options);
    let mut term = TermUi::new(cols, rows, &options.block_color, &options.key_press_color);
    let mut layout = KeyboardLayout::new(f32::from(cols));

    let _raw = RawGuard::enter()?;
    let mut out = stdout();

    let mut current_us: Micros = 0;
    let mut total_us: Micros = core.player().map(|p| p.total_us()).unwrap_or(0);
    let mut paused = true;
    let mut sound_on = options.sound_on;

    loop {
        let frame_start = Instant::now();
        core.tick();

        for event in core.drain_events() {
            match event {
                Event::TransportUpdated {
                    current_us: cur,
                    total_us: total,
                    paused: is_paused,
                } => {
                    current_us = cur;
                    total_us = total;
                    paused = is_paused;
                }
                Event::OptionsUpdated { options } => {
                    sound_on = options.sound_on;
                }
                _ => {}
            }
        }

        let frame = renderer.frame(current_us, term.view_height());
        let status = format!(
            "{} {} {} / {}  {}  [{}]  space pause  \u{2190}/\u{2192} seek  s restart  m sound  q quit",
            if paused { "\u{23f8}" } else { "\u{25b6}" },
            progress_bar(current_us, total_us, 20),
            format_timestamp(current_us),
            format_timestamp(total_us),
            title,
            if sound_on { "sound" } else { "muted" },
        );
        term.draw(&mut out, &layout, &frame, &status)?;

        while event::poll(Duration::from_millis(0))? {
            match event::read()? {
                TermEvent::Key(key) => match key.code {
                    KeyCode::Char(' ') => {
                        core.handle_command(Command::TogglePlayPause);
                    }
                    KeyCode::Char('s') => {
                        core.handle_command(Command::Restart);
                        resync(&mut renderer, &mut core);
                    }
                    KeyCode::Left => {
                        core.handle_command(Command::Seek {
                            percent: percent_of(current_us, total_us) - 5.0,
                        });
                        resync(&mut renderer, &mut core);
                    }
                    KeyCode::Right => {
                        core.handle_command(Command::Seek {
                            percent: percent_of(current_us, total_us) + 5.0,
                        });
                        resync(&mut renderer, &mut core);
                    }
                    KeyCode::Char('m') => {
                        core.handle_command(Command::SetSoundOn { on: !sound_on });
                    }
                    KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        return Ok(());
                    }
                    _ => {}
                },
                TermEvent::Resize(new_cols, new_rows) => {
                    term.resize(new_cols, new_rows);
                    renderer.resize(f32::from(new_cols));
                    layout = KeyboardLayout::new(f32::from(new_cols));
                }
                _ => {}
            }
        }

        let elapsed = frame_start.elapsed();
        if elapsed < tick_interval {
            std::thread::sleep(tick_interval - elapsed);
        }
    }
}

fn percent_of(current_us: Micros, total_us: Micros) -> f32 {
    if total_us <= 0 {
        return 0.0;
    }
    (current_us as f64 / total_us as f64 * 100.0) as f32
}

fn resync(renderer: &mut Box<dyn RollRenderer>, core: &mut AppCore) {
    if let Some(player) = core.player() {
        renderer.seek(player.current_us());
    }
}
