//! The fetching pipeline of one remote stream.
mod consumer;
mod control;
mod drd;
mod interest;
mod latency;
mod pipeliner;
mod status;

pub use consumer::*;
pub use control::*;
pub use drd::*;
pub use interest::*;
pub use latency::*;
pub use pipeliner::*;
pub use status::*;
