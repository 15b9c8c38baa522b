use std::future::Future;

use tokio::task::{JoinError, JoinSet};

use crate::TaskClass;

/// [`JoinSet`] wrapper that spawns on the worker runtime handle.
#[derive(Debug)]
pub struct WorkerJoinSet<T> {
	class: TaskClass,
	inner: JoinSet<T>,
}

impl<T> WorkerJoinSet<T>
where
	T: Send + 'static,
{
	pub fn new(class: TaskClass) -> Self {
		Self { class, inner: JoinSet::new() }
	}

	pub fn len(&self) -> usize {
		self.inner.len()
	}

	pub fn is_empty(&self) -> bool {
		self.inner.is_empty()
	}

	/// Spawns a future into the set on the current worker runtime handle.
	pub fn spawn<F>(&mut self, fut: F)
	where
		F: Future<Output = T> + Send + 'static,
	{
		tracing::trace!(worker_class = self.class.as_str(), pending = self.inner.len(), "worker.join_set.spawn");
		self.inner.spawn_on(fut, &crate::spawn::handle());
	}

	/// Waits for the next completed task.
	pub async fn join_next(&mut self) -> Option<Result<T, JoinError>> {
		self.inner.join_next().await
	}

	/// Returns one ready completion without waiting.
	pub fn try_join_next(&mut self) -> Option<Result<T, JoinError>> {
		self.inner.try_join_next()
	}

	/// Lets every task keep running after the set is dropped.
	pub fn detach_all(&mut self) {
		self.inner.detach_all();
	}

	/// Drops every finished task's output, returning how many were reaped.
	pub fn reap(&mut self) -> usize {
		let mut reaped = 0;
		while let Some(res) = self.inner.try_join_next() {
			self.log_panic(res);
			reaped += 1;
		}
		reaped
	}

	/// Waits for every task in the set, discarding outputs. Returns how many
	/// tasks panicked.
	///
	/// Cancel-safe: tasks not yet joined stay in the set.
	pub async fn drain(&mut self) -> usize {
		let mut panicked = 0;
		while let Some(res) = self.inner.join_next().await {
			if self.log_panic(res) {
				panicked += 1;
			}
		}
		panicked
	}

	fn log_panic(&self, res: Result<T, JoinError>) -> bool {
		let Err(err) = res else {
			return false;
		};
		match crate::join_error_panic_message(err) {
			Some(msg) => {
				tracing::error!(worker_class = self.class.as_str(), panic = %msg, "worker.join_set.panicked");
				true
			}
			None => false,
		}
	}
}
