//! Hierarchical NDN names and the conferencing namespace built on top of them.
mod component;
mod info;
mod path;

pub use component::*;
pub use info::*;
pub use path::*;
