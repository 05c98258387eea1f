use serde::{Deserialize, Serialize};

use crate::{Component, Name};

/// The component separating an application prefix from the conferencing namespace.
pub const LIBRARY_COMPONENT: &str = "ndnrtc";
/// The namespace version published by this library.
pub const API_VERSION: u64 = 3;

pub const AUDIO_COMPONENT: &str = "audio";
pub const VIDEO_COMPONENT: &str = "video";
pub const DELTA_COMPONENT: &str = "d";
pub const KEY_COMPONENT: &str = "k";
pub const PARITY_COMPONENT: &str = "_parity";
pub const MANIFEST_COMPONENT: &str = "_manifest";
pub const META_COMPONENT: &str = "_meta";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StreamType {
	Audio,
	Video,
}

impl StreamType {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Audio => AUDIO_COMPONENT,
			Self::Video => VIDEO_COMPONENT,
		}
	}
}

/// Whether a video sample can be decoded on its own.
///
/// Audio samples carry no frame type and are always [SampleClass::Delta].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleClass {
	Delta,
	Key,
}

impl SampleClass {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Delta => DELTA_COMPONENT,
			Self::Key => KEY_COMPONENT,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentClass {
	Data,
	Parity,
	Manifest,
	Meta,
}

/// How much of a parsed name to rebuild, see [NamespaceInfo::prefix].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PrefixFilter {
	/// `<base>/ndnrtc/<version>`
	Library,
	/// Adds `<audio|video>/<stream>[/<timestamp>]`
	Stream,
	/// Adds `<thread>`
	Thread,
	/// Adds `<d|k>/<seq>` or `_meta/<version>`
	Sample,
	/// Adds `[_parity]/<seg>`
	Segment,
}

/// The identity of a segment, parsed from its name.
///
/// Meta segments have an empty thread name when they describe the whole stream,
/// and a zero sample number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceInfo {
	pub base_prefix: Name,
	pub api_version: u64,
	pub stream_type: StreamType,
	pub stream_name: String,
	pub stream_timestamp: Option<u64>,
	pub thread_name: String,
	pub class: SampleClass,
	pub segment_class: SegmentClass,
	pub sample_no: u64,
	pub segment_no: u64,
	pub meta_version: u64,
}

impl NamespaceInfo {
	pub fn is_delta(&self) -> bool {
		self.class == SampleClass::Delta
	}

	pub fn is_key(&self) -> bool {
		self.class == SampleClass::Key
	}

	pub fn is_parity(&self) -> bool {
		self.segment_class == SegmentClass::Parity
	}

	pub fn is_meta(&self) -> bool {
		self.segment_class == SegmentClass::Meta
	}

	/// Rebuild the name up to and including the level given by `filter`.
	pub fn prefix(&self, filter: PrefixFilter) -> Name {
		let mut name = library_prefix(&self.base_prefix, self.api_version);
		if filter == PrefixFilter::Library {
			return name;
		}

		name = name.append(self.stream_type.as_str()).append(self.stream_name.as_str());
		if let Some(ts) = self.stream_timestamp {
			name = name.append_timestamp(ts);
		}
		if filter == PrefixFilter::Stream {
			return name;
		}

		if !self.thread_name.is_empty() {
			name = name.append(self.thread_name.as_str());
		}
		if filter == PrefixFilter::Thread {
			return name;
		}

		name = match (self.segment_class, self.stream_type) {
			(SegmentClass::Meta, _) => name.append(META_COMPONENT).append_version(self.meta_version),
			(_, StreamType::Video) => name.append(self.class.as_str()).append_sequence(self.sample_no),
			(_, StreamType::Audio) => name.append_sequence(self.sample_no),
		};
		if filter == PrefixFilter::Sample {
			return name;
		}

		name = match self.segment_class {
			SegmentClass::Parity => name.append(PARITY_COMPONENT),
			SegmentClass::Manifest => name.append(MANIFEST_COMPONENT),
			SegmentClass::Data | SegmentClass::Meta => name,
		};
		name.append_segment(self.segment_no)
	}

	/// Whatever [NamespaceInfo::prefix] leaves out.
	pub fn suffix(&self, filter: PrefixFilter) -> Name {
		let prefix = self.prefix(filter);
		self.to_name().sub_name(prefix.len())
	}

	/// The full segment name.
	pub fn to_name(&self) -> Name {
		self.prefix(PrefixFilter::Segment)
	}
}

/// `<base>/ndnrtc/<version>`
pub fn library_prefix(base: &Name, api_version: u64) -> Name {
	base.clone().append(LIBRARY_COMPONENT).append_version(api_version)
}

/// `<base>/ndnrtc/<version>/<audio|video>/<stream>/<thread>`
pub fn thread_prefix(base: &Name, stream_type: StreamType, stream: &str, thread: &str) -> Name {
	library_prefix(base, API_VERSION)
		.append(stream_type.as_str())
		.append(stream)
		.append(thread)
}

fn is_literal(component: &Component, literal: &str) -> bool {
	component.as_bytes() == literal.as_bytes()
}

/// Parse a segment name.
///
/// Returns `None` unless every component of the grammar is present and well-formed.
pub fn extract_info(name: &Name) -> Option<NamespaceInfo> {
	let components = name.components();
	let library = components.iter().position(|c| is_literal(c, LIBRARY_COMPONENT))?;
	let mut rest = components[library + 1..].iter();

	let api_version = rest.next()?.to_version()?;
	let stream_type = match rest.next()? {
		c if is_literal(c, AUDIO_COMPONENT) => StreamType::Audio,
		c if is_literal(c, VIDEO_COMPONENT) => StreamType::Video,
		_ => return None,
	};
	let stream_name = rest.next()?.as_str()?.to_string();

	let mut next = rest.next()?;
	let stream_timestamp = next.to_timestamp();
	if stream_timestamp.is_some() {
		next = rest.next()?;
	}

	let mut info = NamespaceInfo {
		base_prefix: name.prefix(library),
		api_version,
		stream_type,
		stream_name,
		stream_timestamp,
		thread_name: String::new(),
		class: SampleClass::Delta,
		segment_class: SegmentClass::Data,
		sample_no: 0,
		segment_no: 0,
		meta_version: 0,
	};

	if !is_literal(next, META_COMPONENT) {
		info.thread_name = next.as_str()?.to_string();
		next = rest.next()?;
	}

	if is_literal(next, META_COMPONENT) {
		info.segment_class = SegmentClass::Meta;
		info.meta_version = rest.next()?.to_version()?;
		info.segment_no = rest.next()?.to_segment()?;
		return rest.next().is_none().then_some(info);
	}

	if stream_type == StreamType::Video {
		info.class = match next {
			c if is_literal(c, DELTA_COMPONENT) => SampleClass::Delta,
			c if is_literal(c, KEY_COMPONENT) => SampleClass::Key,
			_ => return None,
		};
		next = rest.next()?;
	}
	info.sample_no = next.to_sequence()?;

	next = rest.next()?;
	if is_literal(next, PARITY_COMPONENT) {
		info.segment_class = SegmentClass::Parity;
		next = rest.next()?;
	} else if is_literal(next, MANIFEST_COMPONENT) {
		info.segment_class = SegmentClass::Manifest;
		// A manifest may be published as a single unsegmented object.
		next = match rest.next() {
			Some(next) => next,
			None => return Some(info),
		};
	}
	info.segment_no = next.to_segment()?;

	rest.next().is_none().then_some(info)
}
