use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(String),
    #[error("serialization error: {0}")]
    Serde(String),
}

/// How the piano roll is redrawn. Both methods produce the same frames;
/// Interval redraws on the playback tick, Frame paces itself to the display
/// refresh rate and costs more CPU.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrawMethod {
    Interval,
    Frame,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectStyle {
    None,
    Fountain,
}

fn default_block_color() -> String {
    "#957DAD".to_string()
}

fn default_key_press_color() -> String {
    "#84E3F0".to_string()
}

fn default_draw_method() -> DrawMethod {
    DrawMethod::Frame
}

fn default_effect() -> EffectStyle {
    EffectStyle::Fountain
}

fn default_tick_ms() -> u64 {
    25
}

fn default_scroll_speed() -> u32 {
    35
}

fn default_sound_on() -> bool {
    true
}

/// Pass-through rendering/behavior toggles, persisted between runs.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Color of falling note blocks.
    #[serde(default = "default_block_color")]
    pub block_color: String,
    /// Color of a key (and its block) while sounding.
    #[serde(default = "default_key_press_color")]
    pub key_press_color: String,
    /// Key-press particle effect. Accepted and persisted for front ends
    /// that render effects; the terminal front end ignores it.
    #[serde(default = "default_effect")]
    pub effect: EffectStyle,
    #[serde(default = "default_draw_method")]
    pub draw_method: DrawMethod,
    /// Playback clock tick interval in milliseconds.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Roll scroll speed: visible lead time shrinks as this grows.
    #[serde(default = "default_scroll_speed")]
    pub scroll_speed: u32,
    #[serde(default = "default_sound_on")]
    pub sound_on: bool,
    /// Play-along scoring mode. Accepted and persisted for front ends
    /// that support it; the terminal front end ignores it.
    pub game_mode: bool,
    pub soundfont_path: Option<String>,
    pub transcriber_path: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            block_color: default_block_color(),
            key_press_color: default_key_press_color(),
            effect: default_effect(),
            draw_method: default_draw_method(),
            tick_ms: default_tick_ms(),
            scroll_speed: default_scroll_speed(),
            sound_on: default_sound_on(),
            game_mode: false,
            soundfont_path: None,
            transcriber_path: None,
        }
    }
}

pub trait OptionsStorePort: Send + Sync {
    fn load_options(&self) -> Result<Options, ConfigError>;
    fn save_options(&self, options: &Options) -> Result<(), ConfigError>;
}
