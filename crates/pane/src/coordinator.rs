//! Cancel-and-replace request handling on top of a [`ResourceSlot`].
//!
//! Each `show`/`clear` takes a new generation, cancels the previous fetch and
//! retires the current resource before anything new is fetched. Completions
//! carry the generation they were started for; only the current one may touch
//! the slot or the display.

use std::sync::Arc;

use parking_lot::Mutex;
use swapslot_worker::{Generation, GenerationToken, TaskClass, WorkerJoinSet, join_error_panic_message};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

use crate::config::CoordinatorConfig;
use crate::display::{DisplayPublisher, DisplaySink, DisplayState};
use crate::error::{BusyTimeout, CoordinatorError, CreateError};
use crate::events::{EventBus, SlotEvent, SlotStats};
use crate::pipeline::{Content, ContentFetcher, ResourceDisposer, ResourceFactory, ResourceHandle};
use crate::sequencer::DisposalSequencer;
use crate::slot::{CreateCommit, ResourceSlot, ResourceState};

/// Entry point driven by selection changes in the owning pane.
///
/// Not `Clone`: dropping the coordinator without calling
/// [`dispose`](Self::dispose) still tears the slot down in the background.
/// Share it behind an `Arc` when several tasks issue requests.
pub struct RequestCoordinator<F, H>
where
	F: ContentFetcher,
	H: ResourceHandle,
{
	shared: Arc<Shared<F, H>>,
}

struct Requests<I> {
	item: Option<I>,
	fetch: Option<GenerationToken>,
	terminated: bool,
	torn_down: bool,
}

struct Shared<F, H>
where
	F: ContentFetcher,
	H: ResourceHandle,
{
	config: CoordinatorConfig,
	slot: Arc<ResourceSlot<H>>,
	sequencer: DisposalSequencer<H>,
	fetcher: F,
	factory: Arc<dyn ResourceFactory<F::Content, H>>,
	display: DisplayPublisher<F::Item, H>,
	requests: Mutex<Requests<F::Item>>,
	/// Parent of every fetch token; cancelled on teardown.
	root: CancellationToken,
	tasks: Mutex<WorkerJoinSet<()>>,
	events: EventBus,
}

impl<F, H> RequestCoordinator<F, H>
where
	F: ContentFetcher,
	H: ResourceHandle,
{
	pub fn new<R, D, S>(config: CoordinatorConfig, fetcher: F, factory: R, disposer: D, sink: S) -> Self
	where
		R: ResourceFactory<F::Content, H>,
		D: ResourceDisposer<H>,
		S: DisplaySink<F::Item, H>,
	{
		let events = EventBus::new(config.event_buffer_size());
		let shared = Shared {
			slot: Arc::new(ResourceSlot::new()),
			sequencer: DisposalSequencer::with_events(Arc::new(disposer), events.clone()),
			fetcher,
			factory: Arc::new(factory),
			display: DisplayPublisher::new(sink),
			requests: Mutex::new(Requests {
				item: None,
				fetch: None,
				terminated: false,
				torn_down: false,
			}),
			root: CancellationToken::new(),
			tasks: Mutex::new(WorkerJoinSet::new(TaskClass::Interactive)),
			events,
			config,
		};
		Self { shared: Arc::new(shared) }
	}

	/// Replaces whatever is shown with `item`.
	///
	/// Returns once the previous resource is retired and the fetch for `item`
	/// has started. The content arrives later through the display sink.
	pub async fn show(&self, item: F::Item) -> Result<Generation, CoordinatorError> {
		Arc::clone(&self.shared).request(Some(item)).await
	}

	/// Retires the current resource and shows nothing.
	pub async fn clear(&self) -> Result<Generation, CoordinatorError> {
		Arc::clone(&self.shared).request(None).await
	}

	/// Shows the current item again. Returns `None` when nothing is selected.
	pub async fn refresh(&self) -> Result<Option<Generation>, CoordinatorError> {
		let item = {
			let requests = self.shared.requests.lock();
			if requests.terminated {
				return Err(CoordinatorError::Disposed);
			}
			requests.item.clone()
		};
		match item {
			Some(item) => self.show(item).await.map(Some),
			None => Ok(None),
		}
	}

	/// Tears the coordinator down for good.
	///
	/// Cancels any fetch, closes the slot and waits (bounded by the teardown
	/// timeout) for the current resource to be released. Safe to call again,
	/// for instance after a [`CoordinatorError::Busy`].
	pub async fn dispose(&self) -> Result<(), CoordinatorError> {
		self.shared.dispose().await
	}

	pub fn current_state(&self) -> DisplayState<F::Item, H> {
		self.shared.display.current()
	}

	/// Latest-value subscription to the display state.
	pub fn watch(&self) -> watch::Receiver<DisplayState<F::Item, H>> {
		self.shared.display.watch()
	}

	pub fn subscribe(&self) -> broadcast::Receiver<SlotEvent> {
		self.shared.events.subscribe()
	}

	pub fn stats(&self) -> SlotStats {
		self.shared.slot.stats()
	}

	pub fn current_item(&self) -> Option<F::Item> {
		self.shared.requests.lock().item.clone()
	}

	pub fn generation(&self) -> Generation {
		self.shared.slot.generation()
	}

	pub fn slot_state(&self) -> ResourceState {
		self.shared.slot.state()
	}

	pub fn active_handle(&self) -> Option<H> {
		self.shared.slot.active_handle()
	}

	/// Waits until every fetch and creation started so far has finished and
	/// no disposal is running.
	pub async fn settle(&self) {
		loop {
			let taken = std::mem::replace(&mut *self.shared.tasks.lock(), WorkerJoinSet::new(TaskClass::Interactive));
			if taken.is_empty() {
				break;
			}
			let mut pending = DetachOnDrop(taken);
			let panicked = pending.0.drain().await;
			if panicked > 0 {
				tracing::error!(panicked, "coordinator.settle_panicked");
			}
		}
		if let Err(busy) = self.shared.slot.wait_settled(self.shared.config.teardown_timeout_value()).await {
			tracing::warn!(waited = ?busy.waited, "coordinator.settle_timeout");
		}
	}
}

impl<F, H> Drop for RequestCoordinator<F, H>
where
	F: ContentFetcher,
	H: ResourceHandle,
{
	fn drop(&mut self) {
		if !self.shared.terminate() {
			return;
		}
		tracing::debug!(generation = %self.shared.slot.generation(), "coordinator.dropped_without_dispose");
		let _ = self.shared.sequencer.retire(&self.shared.slot);
	}
}

/// Keeps tasks running when [`RequestCoordinator::settle`] is cancelled.
struct DetachOnDrop(WorkerJoinSet<()>);

impl Drop for DetachOnDrop {
	fn drop(&mut self) {
		self.0.detach_all();
	}
}

impl<F, H> Shared<F, H>
where
	F: ContentFetcher,
	H: ResourceHandle,
{
	async fn request(self: Arc<Self>, item: Option<F::Item>) -> Result<Generation, CoordinatorError> {
		let generation = {
			let mut requests = self.requests.lock();
			if requests.terminated {
				return Err(CoordinatorError::Disposed);
			}
			if let Some(previous) = requests.fetch.take() {
				previous.cancel();
			}
			requests.item = item.clone();
			let generation = self.slot.advance_generation();
			self.display.supersede(generation);
			generation
		};
		tracing::debug!(%generation, ?item, "coordinator.request");
		self.events.emit(SlotEvent::Requested { generation });

		let retired = self.sequencer.retire(&self.slot).wait(self.config.retire_timeout_value()).await;
		if let Err(busy) = retired {
			self.report_busy(generation, item, busy);
			return Err(busy.into());
		}
		self.sequencer.reset(&self.slot);

		let mut requests = self.requests.lock();
		if requests.terminated {
			return Err(CoordinatorError::Disposed);
		}
		if !self.slot.is_current(generation) {
			// A newer request took over while this one waited.
			return Ok(generation);
		}
		match item {
			None => {
				self.display.publish(generation, DisplayState::Empty);
			}
			Some(item) => {
				let token = GenerationToken::child_of(generation, &self.root);
				requests.fetch = Some(token.clone());
				self.display.publish(generation, DisplayState::Loading { item: item.clone() });

				let mut tasks = self.tasks.lock();
				tasks.reap();
				tasks.spawn(Arc::clone(&self).run_fetch(item, token));
			}
		}
		Ok(generation)
	}

	async fn run_fetch(self: Arc<Self>, item: F::Item, token: GenerationToken) {
		let generation = token.generation();
		let fetched = tokio::select! {
			biased;
			() = token.cancelled() => None,
			res = self.fetcher.fetch(item.clone(), token.clone()) => Some(res),
		};
		let Some(fetched) = fetched else {
			self.discard_stale(generation, "fetch_cancelled");
			return;
		};
		if !self.slot.is_current(generation) {
			self.discard_stale(generation, "fetch");
			return;
		}

		match fetched {
			Ok(content) => self.install(generation, item, content).await,
			Err(err) => {
				self.slot.counters().record_fetch_failure();
				tracing::warn!(%generation, ?item, error = %err, "coordinator.fetch_failed");
				self.events.emit(SlotEvent::FetchFailed {
					generation,
					message: err.message().to_string(),
				});
				self.display.publish(generation, DisplayState::Error {
					item: Some(item),
					message: err.to_string(),
				});
			}
		}
	}

	async fn install(&self, generation: Generation, item: F::Item, content: F::Content) {
		let Some(ticket) = self.slot.begin_create(generation) else {
			if self.slot.is_current(generation) {
				let state = self.slot.state();
				tracing::error!(%generation, state = state.as_str(), "coordinator.begin_create refused for current generation");
				self.display.publish(generation, DisplayState::Error {
					item: Some(item),
					message: format!("internal error: slot is {} when creation should start", state.as_str()),
				});
			} else {
				self.discard_stale(generation, "create");
			}
			return;
		};

		let kind = content.kind().to_owned();
		tracing::trace!(%generation, %kind, "coordinator.create");
		match self.create(generation, content).await {
			Ok(handle) => match self.slot.commit_create(ticket, handle) {
				CreateCommit::Active(view) => {
					tracing::debug!(%generation, ?item, %kind, "coordinator.activated");
					self.events.emit(SlotEvent::Activated { generation });
					self.display.publish(generation, DisplayState::Content { item, handle: view });
				}
				CreateCommit::Superseded(parked) => {
					self.discard_stale(generation, "create");
					let _ = self.sequencer.release_parked(&self.slot, parked).await;
				}
				CreateCommit::Orphaned(handle) => {
					self.sequencer.release_orphan(&self.slot, handle).await;
				}
			},
			Err(err) => {
				self.slot.abort_create(ticket);
				if !self.slot.is_current(generation) {
					self.discard_stale(generation, "create_failed");
					return;
				}
				self.slot.counters().record_create_failure();
				tracing::warn!(%generation, ?item, %kind, error = %err, "coordinator.create_failed");
				self.events.emit(SlotEvent::CreateFailed {
					generation,
					message: err.to_string(),
				});
				self.display.publish(generation, DisplayState::Error {
					item: Some(item),
					message: err.to_string(),
				});
			}
		}
	}

	/// Runs the factory on its own task so a panic surfaces as a failed
	/// creation instead of unwinding past the ticket.
	async fn create(&self, generation: Generation, content: F::Content) -> Result<H, CreateError> {
		let factory = Arc::clone(&self.factory);
		match swapslot_worker::spawn(TaskClass::Interactive, async move { factory.create(content).await }).await {
			Ok(created) => created,
			Err(err) => {
				let message = join_error_panic_message(err).unwrap_or_else(|| "task cancelled".to_string());
				tracing::error!(%generation, %message, "coordinator.factory_panicked");
				Err(CreateError::failed(format!("factory panicked: {message}")))
			}
		}
	}

	fn discard_stale(&self, generation: Generation, stage: &'static str) {
		let current = self.slot.generation();
		self.slot.counters().record_stale();
		tracing::debug!(%generation, %current, stage, "coordinator.stale_completion");
		self.events.emit(SlotEvent::StaleCompletion { generation, current });
	}

	fn report_busy(&self, generation: Generation, item: Option<F::Item>, busy: BusyTimeout) {
		self.slot.counters().record_busy();
		tracing::warn!(%generation, waited = ?busy.waited, state = self.slot.state().as_str(), "coordinator.busy_timeout");
		self.events.emit(SlotEvent::BusyTimeout { generation });
		self.display.publish(generation, DisplayState::Error {
			item,
			message: busy.to_string(),
		});
	}

	/// Marks the coordinator terminated and closes the slot. Returns false if
	/// it already was.
	fn terminate(&self) -> bool {
		{
			let mut requests = self.requests.lock();
			if requests.terminated {
				return false;
			}
			requests.terminated = true;
			requests.item = None;
			if let Some(fetch) = requests.fetch.take() {
				fetch.cancel();
			}
			self.slot.close();
			self.display.supersede(self.slot.generation());
		}
		self.root.cancel();
		true
	}

	async fn dispose(&self) -> Result<(), CoordinatorError> {
		if self.terminate() {
			tracing::debug!(generation = %self.slot.generation(), state = self.slot.state().as_str(), "coordinator.dispose");
		}
		let generation = self.slot.generation();
		let retired = self.sequencer.retire(&self.slot).wait(self.config.teardown_timeout_value()).await;
		if let Err(busy) = retired {
			self.report_busy(generation, None, busy);
			return Err(busy.into());
		}
		self.sequencer.reset(&self.slot);
		self.display.publish(generation, DisplayState::Empty);

		let first = {
			let mut requests = self.requests.lock();
			!std::mem::replace(&mut requests.torn_down, true)
		};
		if first {
			tracing::debug!(%generation, "coordinator.torn_down");
			self.events.emit(SlotEvent::TornDown);
		}
		Ok(())
	}
}
