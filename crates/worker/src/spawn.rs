use std::future::Future;
use std::sync::OnceLock;

use tokio::runtime::{Handle, Runtime};
use tokio::task::JoinHandle;

use crate::TaskClass;

static FALLBACK: OnceLock<Runtime> = OnceLock::new();

/// Single-threaded runtime for callers with no ambient one, such as a
/// coordinator dropped on a plain thread.
fn fallback() -> &'static Runtime {
	FALLBACK.get_or_init(|| {
		tokio::runtime::Builder::new_multi_thread()
			.worker_threads(1)
			.thread_name("swapslot-fallback")
			.enable_all()
			.build()
			.expect("swapslot fallback runtime")
	})
}

/// Ambient runtime handle, falling back to the shared one.
pub(crate) fn handle() -> Handle {
	Handle::try_current().unwrap_or_else(|_| fallback().handle().clone())
}

/// Spawns `fut` on the ambient runtime, or on the fallback runtime outside
/// one. `class` only labels the task in traces.
pub fn spawn<F>(class: TaskClass, fut: F) -> JoinHandle<F::Output>
where
	F: Future + Send + 'static,
	F::Output: Send + 'static,
{
	match Handle::try_current() {
		Ok(ambient) => {
			tracing::trace!(class = class.as_str(), "worker.spawn");
			ambient.spawn(fut)
		}
		Err(_) => {
			tracing::debug!(class = class.as_str(), "worker.spawn_fallback");
			fallback().spawn(fut)
		}
	}
}
