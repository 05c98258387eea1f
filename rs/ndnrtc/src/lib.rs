//! # ndnrtc: real-time media over Named Data Networking
//!
//! A consumer pulls a live audio or video stream by expressing interests for the named
//! segments a producer publishes, reassembles them into samples, repairs losses with
//! Reed-Solomon parity and releases the samples on the producer's cadence.
//!
//! ## Pipeline
//!
//! - [Face]: the transport, delivering data, timeouts and nacks for expressed [Interest]s.
//! - [SegmentController]: demultiplexes transport responses into [WireSegment]s and
//!   signals starvation.
//! - [Pipeliner]: discovers the live edge and decides what to request next.
//! - [Buffer]: assembles segments into [BufferSlot]s, recovering missing data from parity.
//! - [Playout]: releases slots on the producer's timing, skipping what cannot be decoded.
//! - [Consumer]: wires the above together for one stream thread.
//! - [Registry]: owns the event loop and every consumer, and rebuffers stalled ones.
//!
//! ## Names
//!
//! Segments are named
//! `/<base>/ndnrtc/%FD<version>/<audio|video>/<stream>/<thread>/<d|k>/%FE<seq>[/_parity]/%00<seg>`,
//! see [extract_info] and [NamespaceInfo].

mod buffer;
mod clock;
mod config;
mod consumer;
mod controller;
mod error;
mod face;
mod fec;
mod frame;
mod id;
mod log;
mod name;
mod packet;
mod periodic;
mod playout;
mod registry;
mod render;
mod runtime;
mod segment;
mod stats;
mod supervisor;

pub mod coding;

pub use buffer::*;
pub use clock::*;
pub use config::*;
pub use consumer::*;
pub use controller::*;
pub use error::*;
pub use face::*;
pub use fec::*;
pub use frame::*;
pub use id::*;
pub use log::*;
pub use name::*;
pub use packet::*;
pub use periodic::*;
pub use playout::*;
pub use registry::*;
pub use render::*;
pub use runtime::*;
pub use segment::*;
pub use stats::*;
pub use supervisor::*;

#[cfg(test)]
mod testing;
