use std::sync::atomic::{AtomicU64, Ordering};

use swapslot_worker::Generation;
use tokio::sync::broadcast;

/// Observability events emitted by the coordinator.
///
/// Stale completions are reported here so they can be told apart from real
/// failures; they never reach the display.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SlotEvent {
	/// A new request took over the slot.
	Requested { generation: Generation },
	/// A handle was committed and published.
	Activated { generation: Generation },
	/// A fetch or creation result arrived after being superseded.
	StaleCompletion { generation: Generation, current: Generation },
	/// The fetcher failed for the current generation.
	FetchFailed { generation: Generation, message: String },
	/// The factory failed for the current generation.
	CreateFailed { generation: Generation, message: String },
	/// A handle was passed to the disposer and it returned successfully.
	Released,
	/// The disposer returned an error. The slot moved on regardless.
	ReleaseFailed { message: String },
	/// Waiting for a previous disposal exceeded its bound.
	BusyTimeout { generation: Generation },
	/// `dispose()` finished tearing the slot down.
	TornDown,
}

/// Point-in-time counters for one coordinator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotStats {
	/// Handles produced by the factory.
	pub created: u64,
	/// Disposer invocations, successful or not.
	pub released: u64,
	pub release_failures: u64,
	pub create_failures: u64,
	pub fetch_failures: u64,
	pub stale_discards: u64,
	pub busy_timeouts: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
	created: AtomicU64,
	released: AtomicU64,
	release_failures: AtomicU64,
	create_failures: AtomicU64,
	fetch_failures: AtomicU64,
	stale_discards: AtomicU64,
	busy_timeouts: AtomicU64,
}

impl Counters {
	pub(crate) fn record_created(&self) {
		self.created.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_released(&self, failed: bool) {
		self.released.fetch_add(1, Ordering::Relaxed);
		if failed {
			self.release_failures.fetch_add(1, Ordering::Relaxed);
		}
	}

	pub(crate) fn record_create_failure(&self) {
		self.create_failures.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_fetch_failure(&self) {
		self.fetch_failures.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_stale(&self) {
		self.stale_discards.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_busy(&self) {
		self.busy_timeouts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn snapshot(&self) -> SlotStats {
		SlotStats {
			created: self.created.load(Ordering::Relaxed),
			released: self.released.load(Ordering::Relaxed),
			release_failures: self.release_failures.load(Ordering::Relaxed),
			create_failures: self.create_failures.load(Ordering::Relaxed),
			fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
			stale_discards: self.stale_discards.load(Ordering::Relaxed),
			busy_timeouts: self.busy_timeouts.load(Ordering::Relaxed),
		}
	}
}

/// Broadcast fan-out for [`SlotEvent`]s. Sending with no subscribers is fine.
#[derive(Debug, Clone)]
pub(crate) struct EventBus {
	tx: broadcast::Sender<SlotEvent>,
}

impl EventBus {
	pub(crate) fn new(capacity: usize) -> Self {
		let (tx, _) = broadcast::channel(capacity.max(1));
		Self { tx }
	}

	pub(crate) fn emit(&self, event: SlotEvent) {
		let _ = self.tx.send(event);
	}

	pub(crate) fn subscribe(&self) -> broadcast::Receiver<SlotEvent> {
		self.tx.subscribe()
	}
}
