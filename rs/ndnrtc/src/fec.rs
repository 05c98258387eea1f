//! Reed-Solomon erasure coding over GF(2^8).
//!
//! A block is `source` data symbols followed by `repair` parity symbols, all of the same
//! length. A coder session is created for every call.

use reed_solomon_erasure::galois_8::ReedSolomon;

/// The most symbols a block can have.
pub const MAX_SYMBOLS: usize = 256;

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum FecError {
	#[error("invalid block length")]
	InvalidLength,

	#[error("empty symbols")]
	EmptySymbol,

	#[error("insufficient symbols: {present} present, {required} required")]
	InsufficientSymbols { present: usize, required: usize },

	#[error("invalid readiness: {0:#04x}")]
	InvalidReadiness(u8),

	#[error("codec: {0:?}")]
	Codec(reed_solomon_erasure::Error),
}

impl From<reed_solomon_erasure::Error> for FecError {
	fn from(err: reed_solomon_erasure::Error) -> Self {
		FecError::Codec(err)
	}
}

/// The state of one symbol handed to [Rs28Decoder::decode].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Readiness {
	/// Missing, and not wanted.
	Empty = b'0',
	/// Present.
	Ready = b'1',
	/// Missing, reconstruct it.
	Repair = b'2',
}

impl TryFrom<u8> for Readiness {
	type Error = FecError;

	fn try_from(value: u8) -> Result<Self, Self::Error> {
		match value {
			b'0' => Ok(Self::Empty),
			b'1' => Ok(Self::Ready),
			b'2' => Ok(Self::Repair),
			other => Err(FecError::InvalidReadiness(other)),
		}
	}
}

fn session(source: usize, repair: usize) -> Result<ReedSolomon, FecError> {
	Ok(ReedSolomon::new(source, repair)?)
}

/// Computes parity symbols.
#[derive(Debug, Clone, Copy)]
pub struct Rs28Encoder {
	source: usize,
	repair: usize,
	symbol_len: usize,
}

impl Rs28Encoder {
	pub fn new(source: usize, repair: usize, symbol_len: usize) -> Result<Self, FecError> {
		if symbol_len == 0 {
			return Err(FecError::EmptySymbol);
		}

		Ok(Self {
			source,
			repair,
			symbol_len,
		})
	}

	/// Fill `parity` with `repair` symbols computed from `data`.
	///
	/// `data` must hold exactly `source` symbols and `parity` exactly `repair` symbols.
	/// On failure no parity is available.
	pub fn encode(&self, data: &[u8], parity: &mut [u8]) -> Result<(), FecError> {
		if data.len() != self.source * self.symbol_len || parity.len() != self.repair * self.symbol_len {
			return Err(FecError::InvalidLength);
		}

		parity.fill(0);
		let rs = session(self.source, self.repair)?;

		let data: Vec<&[u8]> = data.chunks(self.symbol_len).collect();
		let mut repair: Vec<&mut [u8]> = parity.chunks_mut(self.symbol_len).collect();
		rs.encode_sep(&data, &mut repair)?;

		Ok(())
	}
}

/// Reconstructs missing symbols.
#[derive(Debug, Clone, Copy)]
pub struct Rs28Decoder {
	source: usize,
	repair: usize,
	symbol_len: usize,
}

impl Rs28Decoder {
	pub fn new(source: usize, repair: usize, symbol_len: usize) -> Result<Self, FecError> {
		if symbol_len == 0 {
			return Err(FecError::EmptySymbol);
		}

		Ok(Self {
			source,
			repair,
			symbol_len,
		})
	}

	/// Reconstruct every symbol marked [Readiness::Repair].
	///
	/// `readiness` has one entry per data symbol followed by one per parity symbol.
	/// Recovered data symbols are written back into `data` at their offsets; parity is never
	/// written. Returns how many symbols were repaired.
	pub fn decode(&self, data: &mut [u8], parity: &[u8], readiness: &[Readiness]) -> Result<usize, FecError> {
		let total = self.source + self.repair;
		if data.len() != self.source * self.symbol_len
			|| parity.len() != self.repair * self.symbol_len
			|| readiness.len() != total
		{
			return Err(FecError::InvalidLength);
		}

		let present = readiness.iter().filter(|r| **r == Readiness::Ready).count();
		if present < self.source {
			return Err(FecError::InsufficientSymbols {
				present,
				required: self.source,
			});
		}

		let wanted = readiness.iter().filter(|r| **r == Readiness::Repair).count();
		if wanted == 0 {
			return Ok(0);
		}

		// The coder owns its copy of the symbols; nothing is shared with the caller's buffers.
		let mut shards: Vec<Option<Vec<u8>>> = data
			.chunks(self.symbol_len)
			.chain(parity.chunks(self.symbol_len))
			.zip(readiness)
			.map(|(symbol, ready)| (*ready == Readiness::Ready).then(|| symbol.to_vec()))
			.collect();

		let rs = session(self.source, self.repair)?;
		rs.reconstruct(&mut shards)?;

		let mut repaired = 0;
		for (index, (shard, ready)) in shards.iter().zip(readiness).enumerate() {
			if *ready != Readiness::Repair {
				continue;
			}

			let Some(shard) = shard else { continue };
			repaired += 1;

			if index < self.source {
				let offset = index * self.symbol_len;
				data[offset..offset + self.symbol_len].copy_from_slice(shard);
			}
		}

		Ok(repaired)
	}
}
