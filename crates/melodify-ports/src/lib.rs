pub mod audio;
pub mod config;
pub mod source;
pub mod synth;
pub mod transcribe;
pub mod types;

pub use audio::*;
pub use config::*;
pub use source::*;
pub use synth::*;
pub use transcribe::*;
pub use types::*;
