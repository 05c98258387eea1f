use super::BufferSlot;

/// Recycles slot allocations between samples.
#[derive(Debug)]
pub struct SlotPool {
	free: Vec<BufferSlot>,
	capacity: usize,
}

impl SlotPool {
	pub fn new(capacity: usize) -> Self {
		Self {
			free: Vec::with_capacity(capacity),
			capacity,
		}
	}

	/// A cleared slot, reused if one is available.
	pub fn take(&mut self) -> BufferSlot {
		self.free.pop().unwrap_or_default()
	}

	pub fn put(&mut self, mut slot: BufferSlot) {
		if self.free.len() < self.capacity {
			slot.clear();
			self.free.push(slot);
		}
	}

	/// Number of slots ready for reuse.
	pub fn len(&self) -> usize {
		self.free.len()
	}

	pub fn is_empty(&self) -> bool {
		self.free.is_empty()
	}
}
