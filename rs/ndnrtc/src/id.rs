use std::num::NonZero;

use crate::{Error, Result};

/// A handle to a consumer held by a [crate::Registry].
///
/// Zero is never a valid handle, so applications can use it as "none".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id(NonZero<u32>);

impl std::fmt::Display for Id {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0.get())
	}
}

// Slab indices shifted by one.
pub(crate) struct NonZeroSlab<T>(slab::Slab<T>);

impl<T> NonZeroSlab<T> {
	pub fn insert(&mut self, value: T) -> Result<Id> {
		let entry = self.0.vacant_entry();
		let id = u32::try_from(entry.key() + 1)
			.ok()
			.and_then(NonZero::new)
			.ok_or(Error::InvalidId)?;

		entry.insert(value);
		Ok(Id(id))
	}

	pub fn get(&self, id: Id) -> Option<&T> {
		self.0.get(Self::index(id))
	}

	pub fn get_mut(&mut self, id: Id) -> Option<&mut T> {
		self.0.get_mut(Self::index(id))
	}

	pub fn remove(&mut self, id: Id) -> Option<T> {
		self.0.try_remove(Self::index(id))
	}

	pub fn iter(&self) -> impl Iterator<Item = (Id, &T)> {
		self.0
			.iter()
			.filter_map(|(index, value)| Some((Id(NonZero::new(u32::try_from(index + 1).ok()?)?), value)))
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	fn index(id: Id) -> usize {
		(id.0.get() - 1) as usize
	}
}

impl TryFrom<i32> for Id {
	type Error = Error;

	fn try_from(value: i32) -> Result<Self> {
		Self::try_from(u32::try_from(value).map_err(|_| Error::InvalidId)?)
	}
}

impl TryFrom<u32> for Id {
	type Error = Error;

	fn try_from(value: u32) -> Result<Self> {
		NonZero::try_from(value).map(Id).map_err(|_| Error::InvalidId)
	}
}

impl From<Id> for u32 {
	fn from(value: Id) -> Self {
		value.0.get()
	}
}

impl TryFrom<Id> for i32 {
	type Error = Error;

	fn try_from(value: Id) -> Result<Self> {
		i32::try_from(u32::from(value)).map_err(|_| Error::InvalidId)
	}
}

impl<T> Default for NonZeroSlab<T> {
	fn default() -> Self {
		Self(slab::Slab::new())
	}
}
