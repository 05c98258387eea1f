use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::{
	Consumer, ConsumerObserver, ConsumerStatus, Error, FaceLoop, Id, NonZeroSlab, RecoveryConfig, Result, Supervisor,
};

/// Receives failures that stopped the pipeline.
pub trait LibraryObserver: Send + Sync {
	/// `code` is [Error::code], `message` its description.
	fn on_error(&self, code: i32, message: &str);
}

/// Owns the event loop and every consumer running on it.
///
/// Consumers are referenced by [Id]. Lifecycle calls are marshaled onto the loop thread
/// and block until they complete there. Dropping the registry stops every consumer and
/// shuts the loop down.
pub struct Registry {
	face_loop: FaceLoop,
	shared: Arc<Shared>,
	recovery: RecoveryConfig,
	check: Mutex<Option<JoinHandle<()>>>,
}

struct Shared {
	consumers: Mutex<NonZeroSlab<Consumer>>,
	observer: Mutex<Option<Arc<dyn LibraryObserver>>>,
}

impl Registry {
	pub fn new(recovery: RecoveryConfig) -> Result<Self> {
		Ok(Self {
			face_loop: FaceLoop::new("ndnrtc-face")?,
			shared: Arc::new(Shared {
				consumers: Default::default(),
				observer: Default::default(),
			}),
			recovery,
			check: Default::default(),
		})
	}

	pub fn set_observer(&self, observer: Arc<dyn LibraryObserver>) {
		*self.shared.observer.lock() = Some(observer);
	}

	pub fn face_loop(&self) -> &FaceLoop {
		&self.face_loop
	}

	/// Initialize `consumer` and take ownership of it.
	pub fn add(&self, consumer: Consumer) -> Result<Id> {
		consumer.init()?;
		consumer.attach(Arc::new(Escalate {
			shared: Arc::downgrade(&self.shared),
		}));

		let id = self.shared.consumers.lock().insert(consumer)?;
		tracing::debug!(%id, "consumer added");

		Ok(id)
	}

	pub fn get(&self, id: Id) -> Option<Consumer> {
		self.shared.consumers.lock().get(id).cloned()
	}

	/// Stop the consumer and give it back.
	pub fn remove(&self, id: Id) -> Result<Consumer> {
		let consumer = self.shared.consumers.lock().remove(id).ok_or(Error::NotFound)?;

		let stopping = consumer.clone();
		self.face_loop.perform_synchronized(move || stopping.stop())?;

		tracing::debug!(%id, "consumer removed");
		Ok(consumer)
	}

	pub fn start(&self, id: Id) -> Result<()> {
		let consumer = self.get(id).ok_or(Error::NotFound)?;
		self.face_loop.perform_synchronized(move || consumer.start())?
	}

	pub fn stop(&self, id: Id) -> Result<()> {
		let consumer = self.get(id).ok_or(Error::NotFound)?;
		self.face_loop.perform_synchronized(move || consumer.stop())
	}

	pub fn len(&self) -> usize {
		self.shared.consumers.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.shared.consumers.lock().is_empty()
	}

	/// Periodically rebuffer consumers that stopped receiving data.
	///
	/// The check runs under a [Supervisor]; once it gives up the library observer is told
	/// and every consumer is stopped. Calling it again restarts the check.
	pub fn start_recovery_check(&self) {
		let shared = self.shared.clone();
		let config = self.recovery.clone();

		let task = self.face_loop.spawn(async move {
			let supervisor = Supervisor::new("recovery-check", config.retry.clone());
			let result = supervisor
				.run(|| run_recovery_check(shared.clone(), config.clone()))
				.await;

			if let Err(err) = result {
				shared.failure(&err);
			}
		});

		if let Some(previous) = self.check.lock().replace(task) {
			previous.abort();
		}
	}

	/// Report a fatal failure and stop every consumer.
	pub fn failure(&self, err: &Error) {
		self.shared.failure(err)
	}

	/// Stop every consumer and the recovery check.
	pub fn shutdown(&self) {
		if let Some(task) = self.check.lock().take() {
			task.abort();
		}

		let consumers = self.shared.snapshot();
		let stopped = self.face_loop.perform_synchronized(move || {
			for consumer in consumers {
				consumer.stop();
			}
		});

		if let Err(err) = stopped {
			tracing::error!(%err, "failed to stop consumers");
		}
	}
}

impl Drop for Registry {
	fn drop(&mut self) {
		self.shutdown();
	}
}

impl Shared {
	fn snapshot(&self) -> Vec<Consumer> {
		self.consumers.lock().iter().map(|(_, c)| c.clone()).collect()
	}

	fn failure(&self, err: &Error) {
		tracing::error!(%err, code = err.code(), "fatal failure");

		let observer = self.observer.lock().clone();
		if let Some(observer) = observer {
			observer.on_error(err.code(), &err.to_string());
		}

		for consumer in self.snapshot() {
			consumer.stop();
		}
	}
}

async fn run_recovery_check(shared: Arc<Shared>, config: RecoveryConfig) -> Result<()> {
	let mut interval = tokio::time::interval(config.interval);
	loop {
		interval.tick().await;
		recovery_check(&shared.snapshot(), &config);
	}
}

/// Rebuffer every running consumer idle for too long, returning how many were.
///
/// Playing consumers may idle for `max_idle_time`, the others for `max_chasing_time`.
pub fn recovery_check(consumers: &[Consumer], config: &RecoveryConfig) -> usize {
	let mut rebuffered = 0;

	for consumer in consumers {
		let status = consumer.status();
		if !status.is_running() {
			continue;
		}

		let limit = match status {
			ConsumerStatus::Fetching => config.max_idle_time,
			_ => config.max_chasing_time,
		};

		let idle = consumer.idle_time();
		if idle <= limit {
			continue;
		}

		tracing::warn!(?idle, %status, thread = %consumer.thread(), "consumer stalled");

		match consumer.trigger_rebuffering() {
			Ok(()) => rebuffered += 1,
			Err(err) => tracing::debug!(%err, "not rebuffered"),
		}
	}

	rebuffered
}

// Forwards consumer failures to the library observer.
struct Escalate {
	shared: Weak<Shared>,
}

impl ConsumerObserver for Escalate {
	fn on_error(&self, err: &Error) {
		let Some(shared) = self.shared.upgrade() else {
			return;
		};

		if err.is_fatal() {
			shared.failure(err);
		} else if let Some(observer) = shared.observer.lock().clone() {
			observer.on_error(err.code(), &err.to_string());
		}
	}
}
