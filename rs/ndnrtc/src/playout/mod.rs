//! Deadline-driven release of samples from the buffer.
mod audio;
mod playout;
mod timing;
mod video;

pub use audio::*;
pub use playout::*;
pub use timing::*;
pub use video::*;
