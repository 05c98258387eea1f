use clap::Args;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use tracing::{Level, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;

/// Logging configuration.
#[serde_as]
#[derive(Args, Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Log {
	/// The level filter, `RUST_LOG` takes precedence.
	#[arg(id = "log-level", long = "log-level", env = "NDNRTC_LOG_LEVEL", default_value = "info")]
	#[serde_as(as = "DisplayFromStr")]
	pub level: Level,
}

impl Default for Log {
	fn default() -> Self {
		Self { level: Level::INFO }
	}
}

impl Log {
	pub fn level(&self) -> LevelFilter {
		LevelFilter::from_level(self.level)
	}

	/// Install a global subscriber writing to stderr.
	pub fn init(&self) -> anyhow::Result<()> {
		let filter = EnvFilter::builder()
			.with_default_directive(self.level().into())
			.from_env_lossy();

		tracing_subscriber::fmt()
			.with_env_filter(filter)
			.with_writer(std::io::stderr)
			.try_init()
			.map_err(|err| anyhow::anyhow!("failed to initialize logging: {err}"))
	}
}
