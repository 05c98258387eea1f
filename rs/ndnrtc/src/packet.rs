use std::time::Duration;

use bytes::Bytes;
use derive_more::Debug;

use crate::{Component, Name};

/// A request for a named piece of content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Interest {
	pub name: Name,
	pub lifetime: Duration,
	pub nonce: u32,

	/// Only a fresh answer from the producer is acceptable.
	pub must_be_fresh: bool,

	/// Ask for the rightmost (latest) child under `name`.
	pub rightmost: bool,
}

impl Interest {
	pub fn new(name: Name, lifetime: Duration) -> Self {
		Self {
			name,
			lifetime,
			nonce: rand::random(),
			must_be_fresh: false,
			rightmost: false,
		}
	}

	/// An interest for the latest sample published under `prefix`.
	pub fn rightmost(prefix: Name, lifetime: Duration) -> Self {
		Self {
			must_be_fresh: true,
			rightmost: true,
			..Self::new(prefix, lifetime)
		}
	}
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, num_enum::TryFromPrimitive, num_enum::IntoPrimitive)]
#[repr(u32)]
pub enum ContentType {
	#[default]
	Blob = 0,
	Link = 1,
	Key = 2,
	/// The producer answered, but has nothing for this name (yet).
	Nack = 3,
}

/// A named response to an [Interest].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Data {
	pub name: Name,

	#[debug("{} bytes", content.len())]
	pub content: Bytes,

	pub content_type: ContentType,

	/// The last segment of the sequence this data belongs to.
	pub final_block_id: Option<Component>,
}

impl Data {
	pub fn new<B: Into<Bytes>>(name: Name, content: B) -> Self {
		Self {
			name,
			content: content.into(),
			content_type: ContentType::Blob,
			final_block_id: None,
		}
	}

	pub fn with_final_block_id(mut self, last_segment: u64) -> Self {
		self.final_block_id = Some(Component::segment(last_segment));
		self
	}

	pub fn with_content_type(mut self, content_type: ContentType) -> Self {
		self.content_type = content_type;
		self
	}
}

/// Why the network refused to forward an interest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, num_enum::FromPrimitive)]
#[repr(u64)]
pub enum NackReason {
	None = 0,
	Congestion = 50,
	Duplicate = 100,
	NoRoute = 150,
	#[num_enum(catch_all)]
	Other(u64),
}

impl Default for NackReason {
	fn default() -> Self {
		Self::None
	}
}

impl NackReason {
	pub fn code(&self) -> u64 {
		match self {
			Self::None => 0,
			Self::Congestion => 50,
			Self::Duplicate => 100,
			Self::NoRoute => 150,
			Self::Other(code) => *code,
		}
	}
}

/// A network-layer negative acknowledgement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NetworkNack {
	pub reason: NackReason,
}

impl NetworkNack {
	pub fn new(reason: NackReason) -> Self {
		Self { reason }
	}
}
