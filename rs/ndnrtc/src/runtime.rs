use std::{
	future::Future,
	panic::{AssertUnwindSafe, catch_unwind},
	sync::mpsc,
	thread::{JoinHandle, ThreadId},
};

use tokio::{runtime::Handle, sync::oneshot};

use crate::{Error, Result};

/// A single threaded event loop on a dedicated thread.
///
/// Transport callbacks, idle checks and playout timers of every consumer run as tasks on this
/// loop, so pipeline state is only ever touched from one thread.
pub struct FaceLoop {
	handle: Handle,
	thread: ThreadId,

	// Dropping the sender ends the loop.
	shutdown: Option<oneshot::Sender<()>>,
	join: Option<JoinHandle<()>>,
}

impl FaceLoop {
	pub fn new(name: &str) -> Result<Self> {
		let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
		let handle = runtime.handle().clone();
		let (shutdown, closed) = oneshot::channel::<()>();

		let join = std::thread::Builder::new().name(name.into()).spawn(move || {
			runtime.block_on(async move {
				closed.await.ok();
			});
		})?;

		tracing::debug!(name, "face loop started");

		Ok(Self {
			handle,
			thread: join.thread().id(),
			shutdown: Some(shutdown),
			join: Some(join),
		})
	}

	pub fn handle(&self) -> &Handle {
		&self.handle
	}

	pub fn is_loop_thread(&self) -> bool {
		std::thread::current().id() == self.thread
	}

	/// Run `f` on the loop without waiting for it.
	pub fn dispatch<F>(&self, f: F)
	where
		F: FnOnce() + Send + 'static,
	{
		self.handle.spawn(async move {
			if catch_unwind(AssertUnwindSafe(f)).is_err() {
				tracing::error!("dispatched task panicked");
			}
		});
	}

	pub fn spawn<F>(&self, future: F) -> tokio::task::JoinHandle<F::Output>
	where
		F: Future + Send + 'static,
		F::Output: Send + 'static,
	{
		self.handle.spawn(future)
	}

	/// Run `f` on the loop and block the calling thread until it returns.
	///
	/// Runs inline when called from the loop thread itself. A panic inside `f` is caught
	/// and reported as [Error::Panic].
	pub fn perform_synchronized<F, T>(&self, f: F) -> Result<T>
	where
		F: FnOnce() -> T + Send + 'static,
		T: Send + 'static,
	{
		if self.is_loop_thread() {
			return catch_unwind(AssertUnwindSafe(f)).map_err(|_| Error::Panic);
		}

		let (tx, rx) = mpsc::sync_channel(1);
		self.handle.spawn(async move {
			let result = catch_unwind(AssertUnwindSafe(f)).map_err(|_| Error::Panic);
			tx.send(result).ok();
		});

		rx.recv().map_err(|_| Error::Closed)?
	}
}

impl Drop for FaceLoop {
	fn drop(&mut self) {
		self.shutdown.take();

		// Joining from the loop thread would wait on ourselves.
		if self.is_loop_thread() {
			return;
		}

		if let Some(join) = self.join.take() {
			if join.join().is_err() {
				tracing::error!("face loop thread panicked");
			}
		}
	}
}
