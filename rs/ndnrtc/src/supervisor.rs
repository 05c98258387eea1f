use std::{future::Future, time::Duration};

use clap::Args;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// How often a failed worker is restarted.
#[derive(Args, Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct RetryPolicy {
	/// Restarts allowed before giving up.
	#[arg(long = "retry-max-attempts", default_value_t = 3)]
	pub max_attempts: u32,

	/// Wait between a failure and the restart.
	#[arg(long = "retry-backoff", value_parser = humantime::parse_duration, default_value = "1s")]
	#[serde(with = "humantime_serde")]
	pub backoff: Duration,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			backoff: Duration::from_secs(1),
		}
	}
}

/// Owns a worker task and restarts it when it fails or panics.
pub struct Supervisor {
	name: String,
	policy: RetryPolicy,
}

impl Supervisor {
	pub fn new(name: impl Into<String>, policy: RetryPolicy) -> Self {
		Self {
			name: name.into(),
			policy,
		}
	}

	/// Run workers created by `worker` until one returns `Ok`.
	///
	/// Each worker runs as its own task so a panic is contained. After the policy's restarts
	/// are used up the last failure is logged and [Error::GaveUp] is returned.
	pub async fn run<F, Fut>(&self, mut worker: F) -> Result<()>
	where
		F: FnMut() -> Fut,
		Fut: Future<Output = Result<()>> + Send + 'static,
	{
		let mut restarts = 0;

		loop {
			let err = match tokio::spawn(worker()).await {
				Ok(Ok(())) => return Ok(()),
				Ok(Err(err)) => err,
				Err(err) if err.is_panic() => Error::Panic,
				Err(_) => Error::Closed,
			};

			if restarts >= self.policy.max_attempts {
				tracing::error!(name = %self.name, %err, restarts, "giving up");
				return Err(Error::GaveUp(restarts));
			}

			restarts += 1;
			tracing::warn!(name = %self.name, %err, restarts, "worker failed, restarting");

			tokio::time::sleep(self.policy.backoff).await;
		}
	}
}

#[cfg(test)]
mod tests {
	use std::sync::{
		Arc,
		atomic::{AtomicU32, Ordering},
	};

	use super::*;

	fn policy() -> RetryPolicy {
		RetryPolicy {
			max_attempts: 2,
			backoff: Duration::from_millis(100),
		}
	}

	#[tokio::test(start_paused = true)]
	async fn test_recovers() {
		let runs = Arc::new(AtomicU32::new(0));
		let supervisor = Supervisor::new("test", policy());

		let counter = runs.clone();
		let result = supervisor
			.run(move || {
				let run = counter.fetch_add(1, Ordering::SeqCst);
				async move {
					match run {
						0 => Err(Error::Closed),
						_ => Ok(()),
					}
				}
			})
			.await;

		assert!(result.is_ok());
		assert_eq!(runs.load(Ordering::SeqCst), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn test_gives_up() {
		let runs = Arc::new(AtomicU32::new(0));
		let supervisor = Supervisor::new("test", policy());
		let start = tokio::time::Instant::now();

		let counter = runs.clone();
		let result = supervisor
			.run(move || {
				counter.fetch_add(1, Ordering::SeqCst);
				async { Err(Error::NotFound) }
			})
			.await;

		assert!(matches!(result, Err(Error::GaveUp(2))));
		assert_eq!(runs.load(Ordering::SeqCst), 3);
		assert_eq!(start.elapsed(), Duration::from_millis(200));
	}

	#[tokio::test(start_paused = true)]
	async fn test_panic_contained() {
		let runs = Arc::new(AtomicU32::new(0));
		let supervisor = Supervisor::new("test", policy());

		let counter = runs.clone();
		let result = supervisor
			.run(move || {
				let run = counter.fetch_add(1, Ordering::SeqCst);
				async move {
					if run == 0 {
						panic!("worker exploded");
					}
					Ok(())
				}
			})
			.await;

		assert!(result.is_ok());
		assert_eq!(runs.load(Ordering::SeqCst), 2);
	}
}
