use std::sync::Arc;
use std::time::Duration;

use swapslot_worker::TaskClass;

use crate::error::BusyTimeout;
use crate::events::{EventBus, SlotEvent};
use crate::pipeline::{ResourceDisposer, ResourceHandle};
use crate::slot::{DisposalTicket, DisposeOutcome, ResourceSlot, ResourceState};

/// Orders disposal of the current resource before creation of the next.
///
/// Releases run on a background task so a caller that gives up waiting never
/// cancels a release halfway through. Callers wait on the slot's settle
/// signal instead, with an explicit bound.
pub struct DisposalSequencer<H> {
	disposer: Arc<dyn ResourceDisposer<H>>,
	events: EventBus,
}

/// Wait handle for one [`DisposalSequencer::retire`] call.
#[must_use = "a retirement does nothing unless waited on"]
pub struct Retirement<H> {
	slot: Arc<ResourceSlot<H>>,
	started: bool,
}

impl<H: ResourceHandle> Retirement<H> {
	/// Whether this call started the disposal, rather than joining one already
	/// in progress or finding the slot empty.
	pub fn started(&self) -> bool {
		self.started
	}

	/// Waits until the slot has left `DISPOSING`.
	pub async fn wait(self, timeout: Duration) -> Result<ResourceState, BusyTimeout> {
		self.slot.wait_settled(timeout).await
	}
}

impl<H: ResourceHandle> DisposalSequencer<H> {
	pub fn new(disposer: Arc<dyn ResourceDisposer<H>>) -> Self {
		Self::with_events(disposer, EventBus::new(1))
	}

	pub(crate) fn with_events(disposer: Arc<dyn ResourceDisposer<H>>, events: EventBus) -> Self {
		Self { disposer, events }
	}

	/// Starts retiring whatever the slot holds.
	///
	/// When the slot is empty or already disposing, nothing new starts and the
	/// returned handle resolves once the in-progress disposal (if any) ends.
	pub fn retire(&self, slot: &Arc<ResourceSlot<H>>) -> Retirement<H> {
		let started = match slot.begin_dispose() {
			Some(ticket) => {
				self.spawn_release(slot, ticket);
				true
			}
			None => false,
		};
		tracing::trace!(started, state = slot.state().as_str(), "sequencer.retire");
		Retirement {
			slot: Arc::clone(slot),
			started,
		}
	}

	/// `DISPOSED -> NONE`, once a retirement has been observed complete.
	pub fn reset(&self, slot: &ResourceSlot<H>) -> bool {
		slot.reset()
	}

	/// Releases a handle parked by a superseded creation, on the caller's task.
	pub async fn release_parked(&self, slot: &ResourceSlot<H>, ticket: DisposalTicket) -> DisposeOutcome {
		let outcome = slot.commit_dispose(ticket, self.disposer.as_ref()).await;
		report(&self.events, &outcome);
		outcome
	}

	/// Releases a handle the slot refused to take.
	pub async fn release_orphan(&self, slot: &ResourceSlot<H>, handle: H) {
		let result = self.disposer.release(handle).await;
		slot.counters().record_released(result.is_err());
		match result {
			Ok(()) => self.events.emit(SlotEvent::Released),
			Err(err) => {
				tracing::warn!(error = %err, "sequencer.orphan_release_failed");
				self.events.emit(SlotEvent::ReleaseFailed { message: err.to_string() });
			}
		}
	}

	fn spawn_release(&self, slot: &Arc<ResourceSlot<H>>, ticket: DisposalTicket) {
		let slot = Arc::clone(slot);
		let disposer = Arc::clone(&self.disposer);
		let events = self.events.clone();
		swapslot_worker::spawn(TaskClass::Background, async move {
			let outcome = slot.commit_dispose(ticket, disposer.as_ref()).await;
			report(&events, &outcome);
		});
	}
}

fn report(events: &EventBus, outcome: &DisposeOutcome) {
	match outcome {
		DisposeOutcome::Released => events.emit(SlotEvent::Released),
		DisposeOutcome::ReleaseFailed(err) => events.emit(SlotEvent::ReleaseFailed { message: err.to_string() }),
		DisposeOutcome::Deferred | DisposeOutcome::Stale => {}
	}
}
