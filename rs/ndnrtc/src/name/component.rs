use std::{fmt, str::FromStr};

use bytes::Bytes;

use crate::Error;

/// Marker byte preceding a version number.
pub const VERSION_MARKER: u8 = 0xFD;
/// Marker byte preceding a sequence number.
pub const SEQUENCE_MARKER: u8 = 0xFE;
/// Marker byte preceding a segment number.
pub const SEGMENT_MARKER: u8 = 0x00;
/// Marker byte preceding a timestamp.
pub const TIMESTAMP_MARKER: u8 = 0xFC;

/// One level of a hierarchical NDN name.
///
/// Printed and parsed using NDN URI percent-encoding.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Component(Bytes);

impl Component {
	pub fn new<B: Into<Bytes>>(bytes: B) -> Self {
		Self(bytes.into())
	}

	/// A component made of a marker byte followed by a big-endian number of minimal length.
	pub fn from_marked_number(marker: u8, number: u64) -> Self {
		let be = number.to_be_bytes();
		let skip = be.iter().take_while(|b| **b == 0).count().min(7);

		let mut bytes = Vec::with_capacity(9 - skip);
		bytes.push(marker);
		bytes.extend_from_slice(&be[skip..]);
		Self(bytes.into())
	}

	pub fn version(number: u64) -> Self {
		Self::from_marked_number(VERSION_MARKER, number)
	}

	pub fn sequence(number: u64) -> Self {
		Self::from_marked_number(SEQUENCE_MARKER, number)
	}

	pub fn segment(number: u64) -> Self {
		Self::from_marked_number(SEGMENT_MARKER, number)
	}

	pub fn timestamp(number: u64) -> Self {
		Self::from_marked_number(TIMESTAMP_MARKER, number)
	}

	/// Returns the number following `marker`, if this component starts with it.
	pub fn to_marked_number(&self, marker: u8) -> Option<u64> {
		let (first, rest) = self.0.split_first()?;
		if *first != marker || rest.is_empty() || rest.len() > 8 {
			return None;
		}

		Some(rest.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64))
	}

	pub fn to_version(&self) -> Option<u64> {
		self.to_marked_number(VERSION_MARKER)
	}

	pub fn to_sequence(&self) -> Option<u64> {
		self.to_marked_number(SEQUENCE_MARKER)
	}

	pub fn to_segment(&self) -> Option<u64> {
		self.to_marked_number(SEGMENT_MARKER)
	}

	pub fn to_timestamp(&self) -> Option<u64> {
		self.to_marked_number(TIMESTAMP_MARKER)
	}

	pub fn as_bytes(&self) -> &[u8] {
		&self.0
	}

	/// The component as a UTF-8 string, if it is one.
	pub fn as_str(&self) -> Option<&str> {
		std::str::from_utf8(&self.0).ok()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl From<&str> for Component {
	fn from(value: &str) -> Self {
		Self(Bytes::copy_from_slice(value.as_bytes()))
	}
}

impl From<String> for Component {
	fn from(value: String) -> Self {
		Self(Bytes::from(value))
	}
}

fn is_unreserved(b: u8) -> bool {
	b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~')
}

impl fmt::Display for Component {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		// A component of only periods gets three more, so it can't be confused with "." or "..".
		if self.0.iter().all(|b| *b == b'.') {
			f.write_str("...")?;
		}

		for b in self.0.iter() {
			match is_unreserved(*b) {
				true => write!(f, "{}", *b as char)?,
				false => write!(f, "%{:02X}", b)?,
			}
		}

		Ok(())
	}
}

impl fmt::Debug for Component {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self)
	}
}

impl FromStr for Component {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		if !s.is_empty() && s.bytes().all(|b| b == b'.') {
			return match s.len() {
				0..=2 => Err(Error::InvalidName(s.to_string())),
				n => Ok(Self(Bytes::from(vec![b'.'; n - 3]))),
			};
		}

		let mut bytes = Vec::with_capacity(s.len());
		let mut input = s.bytes();

		while let Some(b) = input.next() {
			if b != b'%' {
				bytes.push(b);
				continue;
			}

			let hi = input.next().and_then(|c| (c as char).to_digit(16));
			let lo = input.next().and_then(|c| (c as char).to_digit(16));
			match (hi, lo) {
				(Some(hi), Some(lo)) => bytes.push((hi * 16 + lo) as u8),
				_ => return Err(Error::InvalidName(s.to_string())),
			}
		}

		Ok(Self(bytes.into()))
	}
}
