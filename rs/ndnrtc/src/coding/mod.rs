//! Binary encoding for segment headers and assembled sample packets.
mod decode;
mod encode;

pub use decode::*;
pub use encode::*;
