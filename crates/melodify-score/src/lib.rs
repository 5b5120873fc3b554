pub mod decode;
pub mod model;
pub mod normalize;

pub use decode::*;
pub use model::*;
pub use normalize::*;
