use std::sync::Arc;

use crate::{coding::DecodeError, fec::FecError};

/// A list of possible errors that can occur inside the pipeline.
#[derive(Debug, thiserror::Error, Clone)]
pub enum Error {
	#[error("closed")]
	Closed,

	#[error("not found")]
	NotFound,

	#[error("invalid id")]
	InvalidId,

	#[error("not initialized")]
	NotInitialized,

	#[error("already running")]
	AlreadyRunning,

	#[error("not running")]
	NotRunning,

	#[error("invalid name: {0}")]
	InvalidName(String),

	#[error("invalid config: {0}")]
	InvalidConfig(String),

	#[error("decode error: {0}")]
	Decode(#[from] DecodeError),

	#[error("fec error: {0}")]
	Fec(#[from] FecError),

	#[error("corrupt sample: {0}")]
	Corrupt(u64),

	#[error("codec error: {0}")]
	Codec(Arc<anyhow::Error>),

	#[error("runtime error: {0}")]
	Runtime(Arc<std::io::Error>),

	#[error("config error: {0}")]
	Config(Arc<anyhow::Error>),

	#[error("panic")]
	Panic,

	#[error("gave up after {0} restarts")]
	GaveUp(u32),
}

impl Error {
	/// A distinguished code, reported to the library observer.
	pub fn code(&self) -> i32 {
		match self {
			Self::Closed => -1,
			Self::NotFound => -2,
			Self::InvalidId => -3,
			Self::NotInitialized => -4,
			Self::AlreadyRunning => -5,
			Self::InvalidName(_) => -6,
			Self::InvalidConfig(_) => -7,
			Self::Decode(_) => -8,
			Self::Fec(_) => -9,
			Self::Corrupt(_) => -10,
			Self::Codec(_) => -11,
			Self::Runtime(_) => -12,
			Self::Config(_) => -13,
			Self::Panic => -14,
			Self::GaveUp(_) => -15,
			Self::NotRunning => -16,
		}
	}

	/// Whether the owning component has to be restarted explicitly.
	pub fn is_fatal(&self) -> bool {
		matches!(self, Self::Runtime(_) | Self::Panic | Self::GaveUp(_))
	}
}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		Error::Runtime(Arc::new(err))
	}
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_codes_are_distinct() {
		let errors = [
			Error::Closed,
			Error::NotFound,
			Error::InvalidId,
			Error::NotInitialized,
			Error::AlreadyRunning,
			Error::InvalidName("x".into()),
			Error::InvalidConfig("x".into()),
			Error::Decode(DecodeError::Short),
			Error::Fec(FecError::InvalidLength),
			Error::Corrupt(1),
			Error::Codec(Arc::new(anyhow::anyhow!("x"))),
			Error::Runtime(Arc::new(std::io::Error::other("x"))),
			Error::Config(Arc::new(anyhow::anyhow!("x"))),
			Error::Panic,
			Error::GaveUp(3),
			Error::NotRunning,
		];

		let mut codes: Vec<i32> = errors.iter().map(Error::code).collect();
		assert!(codes.iter().all(|code| *code < 0));

		codes.sort();
		codes.dedup();
		assert_eq!(codes.len(), errors.len());
	}

	#[test]
	fn test_fatal() {
		assert!(Error::Panic.is_fatal());
		assert!(!Error::Corrupt(7).is_fatal());
	}
}
