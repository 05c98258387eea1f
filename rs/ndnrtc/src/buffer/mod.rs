//! Reassembly of samples from their segments.
mod assembly;
mod pool;
mod slot;

pub use assembly::*;
pub use pool::*;
pub use slot::*;
