pub mod app;
pub mod audio_graph;
pub mod ipc;
pub mod player;
pub mod renderer;
pub mod roll;
pub mod sound;

pub use app::*;
pub use audio_graph::*;
pub use ipc::*;
pub use player::*;
pub use renderer::*;
pub use roll::*;
pub use sound::*;
