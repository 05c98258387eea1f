use std::{path::Path, sync::Arc, time::Duration};

use clap::Args;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};

use crate::{Error, Log, MAX_SEGMENTS, Name, Result, RetryPolicy, SampleClass, StreamType};

/// Everything needed to fetch one stream thread.
#[serde_as]
#[derive(Args, Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ConsumerConfig {
	/// The application prefix the producer publishes under.
	#[arg(long = "base-prefix", default_value = "/ndn")]
	#[serde_as(as = "DisplayFromStr")]
	pub base_prefix: Name,

	#[arg(long, default_value = "camera")]
	pub stream: String,

	/// The quality thread to fetch.
	#[arg(long, default_value = "hi")]
	pub thread: String,

	#[arg(long = "stream-type", value_enum, default_value_t = StreamType::Video)]
	pub stream_type: StreamType,

	#[arg(long = "interest-lifetime", value_parser = humantime::parse_duration, default_value = "2s")]
	#[serde(with = "humantime_serde")]
	pub interest_lifetime: Duration,

	/// Buffered media required before playout starts.
	#[arg(long = "jitter-target", value_parser = humantime::parse_duration, default_value = "150ms")]
	#[serde(with = "humantime_serde")]
	pub jitter_target: Duration,

	/// Least time between two decisions to shrink the pipeline.
	#[arg(long = "latency-timeout", value_parser = humantime::parse_duration, default_value = "1s")]
	#[serde(with = "humantime_serde")]
	pub latency_timeout: Duration,

	/// Samples held in the buffer before the oldest is evicted.
	#[arg(long = "buffer-capacity", default_value_t = 150)]
	pub buffer_capacity: usize,

	/// Samples requested ahead of playout.
	#[arg(long = "pipeline-window", default_value_t = 8)]
	pub pipeline_window: usize,

	/// Silence after which starvation is signaled.
	#[arg(long = "max-idle-time", value_parser = humantime::parse_duration, default_value = "2s")]
	#[serde(with = "humantime_serde")]
	pub max_idle_time: Duration,

	/// Re-expressions of a timed out interest.
	#[arg(long = "max-rtx", default_value_t = 2)]
	pub max_rtx: u32,

	/// Playout wait when the buffer is empty.
	#[arg(long = "queue-poll", value_parser = humantime::parse_duration, default_value = "10ms")]
	#[serde(with = "humantime_serde")]
	pub queue_poll: Duration,

	/// Assumed until the producer reports its own.
	#[arg(long = "default-rate", default_value_t = 30.)]
	pub default_rate: f64,

	#[arg(long = "delta-data-segments", default_value_t = 3)]
	pub delta_data_segments: usize,
	#[arg(long = "delta-parity-segments", default_value_t = 1)]
	pub delta_parity_segments: usize,
	#[arg(long = "key-data-segments", default_value_t = 10)]
	pub key_data_segments: usize,
	#[arg(long = "key-parity-segments", default_value_t = 2)]
	pub key_parity_segments: usize,
}

impl Default for ConsumerConfig {
	fn default() -> Self {
		Self {
			base_prefix: Name::from(crate::Component::from("ndn")),
			stream: "camera".into(),
			thread: "hi".into(),
			stream_type: StreamType::Video,
			interest_lifetime: Duration::from_secs(2),
			jitter_target: Duration::from_millis(150),
			latency_timeout: Duration::from_secs(1),
			buffer_capacity: 150,
			pipeline_window: 8,
			max_idle_time: Duration::from_secs(2),
			max_rtx: 2,
			queue_poll: Duration::from_millis(10),
			default_rate: 30.,
			delta_data_segments: 3,
			delta_parity_segments: 1,
			key_data_segments: 10,
			key_parity_segments: 2,
		}
	}
}

impl ConsumerConfig {
	pub fn validate(&self) -> Result<()> {
		let fail = |reason: &str| Err(Error::InvalidConfig(reason.into()));

		if self.base_prefix.is_empty() {
			return fail("empty base prefix");
		}
		if self.stream.is_empty() || self.thread.is_empty() {
			return fail("empty stream or thread name");
		}
		if self.buffer_capacity == 0 || self.pipeline_window == 0 {
			return fail("zero buffer capacity or pipeline window");
		}
		if !(self.default_rate.is_finite() && self.default_rate > 0.) {
			return fail("default rate must be positive");
		}
		if self.interest_lifetime.is_zero()
			|| self.max_idle_time.is_zero()
			|| self.queue_poll.is_zero()
			|| self.jitter_target.is_zero()
			|| self.latency_timeout.is_zero()
		{
			return fail("zero duration");
		}
		if self.delta_data_segments == 0 || self.key_data_segments == 0 {
			return fail("zero segment estimate");
		}

		let estimates = [
			self.delta_data_segments,
			self.delta_parity_segments,
			self.key_data_segments,
			self.key_parity_segments,
		];
		if estimates.iter().any(|n| *n > MAX_SEGMENTS) {
			return fail("segment estimate above the sample limit");
		}

		Ok(())
	}

	/// Initial data and parity segment estimates for a sample class.
	pub fn segment_estimate(&self, class: SampleClass) -> (usize, usize) {
		match class {
			SampleClass::Delta => (self.delta_data_segments, self.delta_parity_segments),
			SampleClass::Key => (self.key_data_segments, self.key_parity_segments),
		}
	}
}

/// Settings of the watchdog that rebuffers stalled consumers.
#[derive(Args, Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RecoveryConfig {
	#[arg(long = "recovery-interval", value_parser = humantime::parse_duration, default_value = "50ms")]
	#[serde(with = "humantime_serde")]
	pub interval: Duration,

	/// Idle time tolerated while fetching.
	#[arg(long = "recovery-max-idle", value_parser = humantime::parse_duration, default_value = "2s")]
	#[serde(with = "humantime_serde")]
	pub max_idle_time: Duration,

	/// Idle time tolerated before reaching the fetching state.
	#[arg(long = "recovery-max-chasing", value_parser = humantime::parse_duration, default_value = "5s")]
	#[serde(with = "humantime_serde")]
	pub max_chasing_time: Duration,

	#[command(flatten)]
	pub retry: RetryPolicy,
}

impl Default for RecoveryConfig {
	fn default() -> Self {
		Self {
			interval: Duration::from_millis(50),
			max_idle_time: Duration::from_secs(2),
			max_chasing_time: Duration::from_secs(5),
			retry: RetryPolicy::default(),
		}
	}
}

#[derive(Args, Clone, Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
	#[command(flatten)]
	pub log: Log,

	#[command(flatten)]
	pub consumer: ConsumerConfig,

	#[command(flatten)]
	pub recovery: RecoveryConfig,
}

impl Config {
	/// Read a TOML file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let text = std::fs::read_to_string(path)
			.map_err(|err| Error::Config(Arc::new(anyhow::Error::new(err).context(path.display().to_string()))))?;

		text.parse()
	}
}

impl std::str::FromStr for Config {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		toml::from_str(s).map_err(|err| Error::Config(Arc::new(err.into())))
	}
}
