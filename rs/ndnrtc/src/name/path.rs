use std::{fmt, str::FromStr};

use crate::{Component, Error};

/// A slash-delimited sequence of [Component]s.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Name(Vec<Component>);

impl Name {
	pub fn new() -> Self {
		Self::default()
	}

	/// Append a component, returning the name for chaining.
	pub fn append<C: Into<Component>>(mut self, component: C) -> Self {
		self.0.push(component.into());
		self
	}

	pub fn push<C: Into<Component>>(&mut self, component: C) {
		self.0.push(component.into());
	}

	pub fn append_version(self, version: u64) -> Self {
		self.append(Component::version(version))
	}

	pub fn append_sequence(self, seq: u64) -> Self {
		self.append(Component::sequence(seq))
	}

	pub fn append_segment(self, seg: u64) -> Self {
		self.append(Component::segment(seg))
	}

	pub fn append_timestamp(self, ts: u64) -> Self {
		self.append(Component::timestamp(ts))
	}

	/// Append every component of `other`.
	pub fn join(mut self, other: &Name) -> Self {
		self.0.extend(other.0.iter().cloned());
		self
	}

	pub fn get(&self, index: usize) -> Option<&Component> {
		self.0.get(index)
	}

	pub fn last(&self) -> Option<&Component> {
		self.0.last()
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn components(&self) -> &[Component] {
		&self.0
	}

	/// The first `count` components.
	pub fn prefix(&self, count: usize) -> Name {
		Self(self.0[..count.min(self.0.len())].to_vec())
	}

	/// Every component starting at `start`.
	pub fn sub_name(&self, start: usize) -> Name {
		Self(self.0[start.min(self.0.len())..].to_vec())
	}

	pub fn is_prefix_of(&self, other: &Name) -> bool {
		other.0.starts_with(&self.0)
	}
}

impl From<Component> for Name {
	fn from(component: Component) -> Self {
		Self(vec![component])
	}
}

impl From<Vec<Component>> for Name {
	fn from(components: Vec<Component>) -> Self {
		Self(components)
	}
}

impl fmt::Display for Name {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.0.is_empty() {
			return f.write_str("/");
		}

		for component in &self.0 {
			write!(f, "/{}", component)?;
		}

		Ok(())
	}
}

impl fmt::Debug for Name {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self)
	}
}

impl FromStr for Name {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let s = s.trim();
		let s = s.strip_prefix("ndn:").unwrap_or(s);

		s.split('/')
			.filter(|part| !part.is_empty())
			.map(Component::from_str)
			.collect::<Result<Vec<_>, _>>()
			.map(Self)
	}
}
