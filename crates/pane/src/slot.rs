//! Single-slot resource state machine.
//!
//! ```text
//!  NONE ──begin_create──► CREATING ──commit_create──► ACTIVE
//!   ▲                        │  │                       │
//!   │            abort_create│  │begin_dispose          │begin_dispose
//!   │                        ▼  ▼                       ▼
//!   └──────reset──── DISPOSED ◄──commit_dispose─── DISPOSING
//! ```
//!
//! Every transition happens under one lock. The handle lives inside the
//! phase that owns it, so an `ACTIVE` slot always holds one and an empty slot
//! never does. A handle leaves the slot only by being taken for release, and
//! it can be taken once.
//!
//! Disposal may overtake an in-flight creation. The slot then stays
//! `DISPOSING` until the creator reports back: a produced handle is parked in
//! the disposal and released, and a failed creation ends it directly. Nobody
//! waiting on the slot can observe it empty while a factory call for the old
//! generation is still running.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use swapslot_worker::Generation;
use tokio::sync::Notify;

use crate::error::{BusyTimeout, ReleaseError};
use crate::events::{Counters, SlotStats};
use crate::pipeline::{ResourceDisposer, ResourceHandle};

/// Externally visible lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceState {
	/// Empty and ready for the next creation.
	None,
	/// A factory call is in flight.
	Creating,
	/// Holding a live handle.
	Active,
	/// A handle is being (or is about to be) released.
	Disposing,
	/// Release finished; must be [`reset`](ResourceSlot::reset) before reuse.
	Disposed,
}

impl ResourceState {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::None => "none",
			Self::Creating => "creating",
			Self::Active => "active",
			Self::Disposing => "disposing",
			Self::Disposed => "disposed",
		}
	}

	/// Returns true for the two states holding no live handle.
	pub const fn is_empty(self) -> bool {
		matches!(self, Self::None | Self::Disposed)
	}
}

enum Phase<H> {
	None,
	Creating {
		generation: Generation,
	},
	Active {
		generation: Generation,
		handle: H,
	},
	Disposing {
		epoch: u64,
		handle: Option<H>,
		/// Set when disposal overtook a creation that has not reported back.
		awaiting_creator: bool,
	},
	Disposed,
}

impl<H> Phase<H> {
	const fn state(&self) -> ResourceState {
		match self {
			Self::None => ResourceState::None,
			Self::Creating { .. } => ResourceState::Creating,
			Self::Active { .. } => ResourceState::Active,
			Self::Disposing { .. } => ResourceState::Disposing,
			Self::Disposed => ResourceState::Disposed,
		}
	}
}

struct SlotInner<H> {
	phase: Phase<H>,
	generation: Generation,
	next_epoch: u64,
	closed: bool,
}

impl<H> SlotInner<H> {
	fn take_epoch(&mut self) -> u64 {
		let epoch = self.next_epoch;
		self.next_epoch = self.next_epoch.wrapping_add(1);
		epoch
	}
}

/// Permission to finish one creation, returned by [`ResourceSlot::begin_create`].
///
/// Consumed by [`ResourceSlot::commit_create`] or [`ResourceSlot::abort_create`].
#[derive(Debug)]
#[must_use = "a creation ticket must be committed or aborted"]
pub struct CreateTicket {
	generation: Generation,
}

impl CreateTicket {
	pub const fn generation(&self) -> Generation {
		self.generation
	}
}

/// Permission to finish one disposal episode.
///
/// Several tickets may name the same episode. Only the holder that takes the
/// parked handle releases it and completes the episode.
#[derive(Debug)]
#[must_use = "a disposal ticket must be passed to commit_dispose"]
pub struct DisposalTicket {
	epoch: u64,
}

/// Result of [`ResourceSlot::commit_create`].
#[derive(Debug)]
#[must_use]
pub enum CreateCommit<H> {
	/// The slot is `ACTIVE`; the returned clone may be published.
	Active(H),
	/// The creation was superseded or overtaken by a disposal. The handle is
	/// parked in the slot and must be released through `commit_dispose`.
	Superseded(DisposalTicket),
	/// The slot was not expecting this creation. The caller owns the handle
	/// and must release it directly.
	Orphaned(H),
}

/// Result of [`ResourceSlot::commit_dispose`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisposeOutcome {
	/// The handle was released and the slot is `DISPOSED`.
	Released,
	/// The disposer failed; the slot is `DISPOSED` anyway.
	ReleaseFailed(ReleaseError),
	/// Nothing to take yet: a creator or another ticket holder finishes this
	/// episode.
	Deferred,
	/// The ticket's episode already ended.
	Stale,
}

/// Holds at most one live resource handle and its lifecycle state.
pub struct ResourceSlot<H> {
	inner: Mutex<SlotInner<H>>,
	/// Fired on every exit from `DISPOSING`.
	settled: Notify,
	counters: Arc<Counters>,
}

impl<H: ResourceHandle> Default for ResourceSlot<H> {
	fn default() -> Self {
		Self::new()
	}
}

impl<H: ResourceHandle> ResourceSlot<H> {
	/// Creates an empty slot at generation zero.
	pub fn new() -> Self {
		Self::with_counters(Arc::new(Counters::default()))
	}

	pub(crate) fn with_counters(counters: Arc<Counters>) -> Self {
		Self {
			inner: Mutex::new(SlotInner {
				phase: Phase::None,
				generation: Generation::ZERO,
				next_epoch: 0,
				closed: false,
			}),
			settled: Notify::new(),
			counters,
		}
	}

	pub fn state(&self) -> ResourceState {
		self.inner.lock().phase.state()
	}

	pub fn generation(&self) -> Generation {
		self.inner.lock().generation
	}

	pub fn is_current(&self, generation: Generation) -> bool {
		self.inner.lock().generation == generation
	}

	pub fn is_closed(&self) -> bool {
		self.inner.lock().closed
	}

	/// Returns a view of the live handle while `ACTIVE`.
	pub fn active_handle(&self) -> Option<H> {
		match &self.inner.lock().phase {
			Phase::Active { handle, .. } => Some(handle.clone()),
			_ => None,
		}
	}

	pub fn stats(&self) -> SlotStats {
		self.counters.snapshot()
	}

	pub(crate) fn counters(&self) -> &Counters {
		&self.counters
	}

	/// Starts a new generation; every earlier generation becomes stale.
	pub fn advance_generation(&self) -> Generation {
		let mut inner = self.inner.lock();
		inner.generation = inner.generation.next();
		inner.generation
	}

	/// Permanently closes the slot. Outstanding generations become stale and
	/// no creation may begin afterwards.
	pub fn close(&self) {
		let mut inner = self.inner.lock();
		inner.closed = true;
		inner.generation = inner.generation.next();
	}

	/// `NONE -> CREATING` for `generation`.
	///
	/// Returns `None` without side effects when the slot is not empty, is
	/// closed, or `generation` is no longer current. This is what keeps a
	/// stale completion from starting a creation.
	pub fn begin_create(&self, generation: Generation) -> Option<CreateTicket> {
		let mut inner = self.inner.lock();
		if inner.closed || inner.generation != generation || !matches!(inner.phase, Phase::None) {
			return None;
		}
		inner.phase = Phase::Creating { generation };
		tracing::trace!(%generation, "slot.creating");
		Some(CreateTicket { generation })
	}

	/// Hands the factory's result to the slot.
	///
	/// `CREATING -> ACTIVE` when the ticket is still current. Otherwise the
	/// handle is parked in a disposal and never becomes visible.
	pub fn commit_create(&self, ticket: CreateTicket, handle: H) -> CreateCommit<H> {
		self.counters.record_created();
		let mut inner = self.inner.lock();
		let current = inner.generation == ticket.generation && !inner.closed;

		match std::mem::replace(&mut inner.phase, Phase::None) {
			Phase::Creating { generation } if generation == ticket.generation => {
				if current {
					inner.phase = Phase::Active {
						generation,
						handle: handle.clone(),
					};
					tracing::debug!(%generation, "slot.active");
					CreateCommit::Active(handle)
				} else {
					let epoch = inner.take_epoch();
					inner.phase = Phase::Disposing {
						epoch,
						handle: Some(handle),
						awaiting_creator: false,
					};
					tracing::debug!(%generation, epoch, "slot.create_superseded");
					CreateCommit::Superseded(DisposalTicket { epoch })
				}
			}
			Phase::Disposing {
				epoch,
				handle: None,
				awaiting_creator: true,
			} => {
				inner.phase = Phase::Disposing {
					epoch,
					handle: Some(handle),
					awaiting_creator: false,
				};
				tracing::debug!(generation = %ticket.generation, epoch, "slot.create_overtaken");
				CreateCommit::Superseded(DisposalTicket { epoch })
			}
			other => {
				tracing::error!(generation = %ticket.generation, state = other.state().as_str(), "slot.commit_create from unexpected state");
				inner.phase = other;
				CreateCommit::Orphaned(handle)
			}
		}
	}

	/// Reports a failed factory call.
	///
	/// `CREATING -> NONE`, or `DISPOSING -> DISPOSED` when a disposal was
	/// waiting on this creation.
	pub fn abort_create(&self, ticket: CreateTicket) {
		let settled = {
			let mut inner = self.inner.lock();
			match std::mem::replace(&mut inner.phase, Phase::None) {
				Phase::Creating { generation } if generation == ticket.generation => {
					tracing::debug!(%generation, "slot.create_aborted");
					false
				}
				Phase::Disposing {
					handle: None,
					awaiting_creator: true,
					epoch,
				} => {
					inner.phase = Phase::Disposed;
					tracing::debug!(generation = %ticket.generation, epoch, "slot.disposed");
					true
				}
				other => {
					tracing::error!(generation = %ticket.generation, state = other.state().as_str(), "slot.abort_create from unexpected state");
					inner.phase = other;
					false
				}
			}
		};
		if settled {
			self.settled.notify_waiters();
		}
	}

	/// `{ACTIVE, CREATING} -> DISPOSING`.
	///
	/// Returns `None` when there is nothing to dispose or a disposal is
	/// already underway, so concurrent retire requests never release twice.
	pub fn begin_dispose(&self) -> Option<DisposalTicket> {
		let mut inner = self.inner.lock();
		let epoch = inner.next_epoch;
		let (phase, ticket) = match std::mem::replace(&mut inner.phase, Phase::None) {
			Phase::Active { handle, generation } => {
				tracing::debug!(%generation, epoch, "slot.disposing");
				(
					Phase::Disposing {
						epoch,
						handle: Some(handle),
						awaiting_creator: false,
					},
					Some(DisposalTicket { epoch }),
				)
			}
			Phase::Creating { generation } => {
				tracing::debug!(%generation, epoch, "slot.disposing_during_create");
				(
					Phase::Disposing {
						epoch,
						handle: None,
						awaiting_creator: true,
					},
					Some(DisposalTicket { epoch }),
				)
			}
			other => (other, None),
		};
		inner.phase = phase;
		if ticket.is_some() {
			inner.take_epoch();
		}
		ticket
	}

	/// Releases the parked handle and moves the slot to `DISPOSED`.
	///
	/// The handle is taken under the lock, so it reaches the disposer at most
	/// once however many tickets name this episode. A disposer error is logged
	/// and the slot still moves to `DISPOSED`: refusing to proceed would wedge
	/// every later request.
	pub async fn commit_dispose<D>(&self, ticket: DisposalTicket, disposer: &D) -> DisposeOutcome
	where
		D: ResourceDisposer<H> + ?Sized,
	{
		let handle = {
			let mut inner = self.inner.lock();
			match &mut inner.phase {
				Phase::Disposing { epoch, handle, .. } if *epoch == ticket.epoch => handle.take(),
				_ => return DisposeOutcome::Stale,
			}
		};
		let Some(handle) = handle else {
			return DisposeOutcome::Deferred;
		};

		tracing::trace!(epoch = ticket.epoch, ?handle, "slot.release");
		let result = disposer.release(handle).await;
		self.counters.record_released(result.is_err());

		{
			let mut inner = self.inner.lock();
			if matches!(inner.phase, Phase::Disposing { epoch, .. } if epoch == ticket.epoch) {
				inner.phase = Phase::Disposed;
			} else {
				tracing::error!(epoch = ticket.epoch, state = inner.phase.state().as_str(), "slot.commit_dispose episode ended early");
			}
		}
		self.settled.notify_waiters();

		match result {
			Ok(()) => {
				tracing::debug!(epoch = ticket.epoch, "slot.disposed");
				DisposeOutcome::Released
			}
			Err(err) => {
				tracing::warn!(epoch = ticket.epoch, error = %err, "slot.release_failed");
				DisposeOutcome::ReleaseFailed(err)
			}
		}
	}

	/// `DISPOSED -> NONE`. Returns whether the slot was reset.
	pub fn reset(&self) -> bool {
		let mut inner = self.inner.lock();
		if matches!(inner.phase, Phase::Disposed) {
			inner.phase = Phase::None;
			true
		} else {
			false
		}
	}

	/// Waits until the slot is not `DISPOSING`, for at most `timeout`.
	pub async fn wait_settled(&self, timeout: Duration) -> Result<ResourceState, BusyTimeout> {
		let deadline = tokio::time::Instant::now() + timeout;
		loop {
			let notified = {
				let inner = self.inner.lock();
				if !matches!(inner.phase, Phase::Disposing { .. }) {
					return Ok(inner.phase.state());
				}
				// Created under the lock: a disposal that ends between unlock
				// and await still wakes this waiter.
				self.settled.notified()
			};
			if tokio::time::timeout_at(deadline, notified).await.is_err() {
				return Err(BusyTimeout { waited: timeout });
			}
		}
	}
}
