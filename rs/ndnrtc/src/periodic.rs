use std::time::Duration;

use tokio::{sync::oneshot, task::JoinHandle};

/// Repeatedly invokes a callback on the current tokio runtime.
///
/// The callback returns the delay until its next invocation, or `None` to stop.
/// Dropping the [Periodic] cancels the schedule.
pub struct Periodic {
	// Dropping the sender wakes the task up and ends the loop.
	cancel: Option<oneshot::Sender<()>>,
	task: JoinHandle<()>,
}

impl Periodic {
	/// Schedule `f` to run after `delay`.
	///
	/// Must be called from within a tokio runtime.
	pub fn start<F>(delay: Duration, mut f: F) -> Self
	where
		F: FnMut() -> Option<Duration> + Send + 'static,
	{
		let (cancel, mut cancelled) = oneshot::channel::<()>();

		let task = tokio::spawn(async move {
			let mut delay = delay;
			loop {
				tokio::select! {
					biased;
					_ = &mut cancelled => return,
					_ = tokio::time::sleep(delay) => {},
				}

				match f() {
					Some(next) => delay = next,
					None => return,
				}
			}
		});

		Self {
			cancel: Some(cancel),
			task,
		}
	}

	/// Stop invoking the callback.
	///
	/// A callback that is currently running is allowed to finish.
	pub fn cancel(&mut self) {
		self.cancel.take();
	}

	pub fn is_running(&self) -> bool {
		self.cancel.is_some() && !self.task.is_finished()
	}
}

impl Drop for Periodic {
	fn drop(&mut self) {
		self.cancel();
	}
}
