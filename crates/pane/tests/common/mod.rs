#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use swapslot_pane::{
	Content, ContentFetcher, CoordinatorConfig, CreateError, DisplaySink, DisplayState, FetchError, GenerationToken, ReleaseError, RequestCoordinator,
	ResourceDisposer, ResourceFactory,
};
use tokio::sync::Semaphore;

pub type Item = &'static str;
pub type State = DisplayState<Item, Handle>;
pub type Coordinator = RequestCoordinator<Arc<ScriptedFetcher>, Handle>;

pub fn init_tracing() {
	let _ = tracing_subscriber::fmt().with_test_writer().with_env_filter("swapslot_pane=debug,swapslot_worker=debug").try_init();
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Handle {
	pub id: u32,
	pub item: Item,
}

#[derive(Debug)]
pub struct Doc {
	pub item: Item,
	pub kind: &'static str,
}

impl Content for Doc {
	fn kind(&self) -> &str {
		self.kind
	}
}

/// Fetcher whose items resolve immediately unless held.
#[derive(Default)]
pub struct ScriptedFetcher {
	gates: Mutex<FxHashMap<Item, Arc<Semaphore>>>,
	failing: Mutex<FxHashSet<Item>>,
	kinds: Mutex<FxHashMap<Item, &'static str>>,
	fetched: Mutex<Vec<Item>>,
}

impl ScriptedFetcher {
	/// Makes fetches of `item` block until [`resolve`](Self::resolve).
	pub fn hold(&self, item: Item) {
		self.gates.lock().insert(item, Arc::new(Semaphore::new(0)));
	}

	pub fn resolve(&self, item: Item) {
		if let Some(gate) = self.gates.lock().get(item) {
			gate.add_permits(1);
		}
	}

	pub fn fail(&self, item: Item) {
		self.failing.lock().insert(item);
	}

	pub fn kind(&self, item: Item, kind: &'static str) {
		self.kinds.lock().insert(item, kind);
	}

	pub fn fetched(&self) -> Vec<Item> {
		self.fetched.lock().clone()
	}
}

#[async_trait]
impl ContentFetcher for ScriptedFetcher {
	type Item = Item;
	type Content = Doc;

	async fn fetch(&self, item: Item, _token: GenerationToken) -> Result<Doc, FetchError> {
		self.fetched.lock().push(item);
		let gate = self.gates.lock().get(item).cloned();
		if let Some(gate) = gate {
			let _permit = gate.acquire().await.map_err(|_| FetchError::new("gate closed"))?;
		}
		if self.failing.lock().contains(item) {
			return Err(FetchError::new(format!("{item} unavailable")));
		}
		let kind = self.kinds.lock().get(item).copied().unwrap_or("doc");
		Ok(Doc { item, kind })
	}
}

/// Factory numbering handles from 1, optionally gated or failing per item.
#[derive(Default)]
pub struct MockFactory {
	next: AtomicU32,
	gate: Mutex<Option<Arc<Semaphore>>>,
	failing: Mutex<FxHashSet<Item>>,
	panicking: Mutex<FxHashSet<Item>>,
	created: Mutex<Vec<Handle>>,
	calls: Mutex<Vec<Item>>,
}

impl MockFactory {
	pub fn gated(&self) -> Arc<Semaphore> {
		let gate = Arc::new(Semaphore::new(0));
		*self.gate.lock() = Some(Arc::clone(&gate));
		gate
	}

	pub fn fail(&self, item: Item) {
		self.failing.lock().insert(item);
	}

	/// Makes the next creation of `item` panic.
	pub fn panic_once(&self, item: Item) {
		self.panicking.lock().insert(item);
	}

	pub fn heal(&self, item: Item) {
		self.failing.lock().remove(item);
	}

	pub fn created(&self) -> Vec<Handle> {
		self.created.lock().clone()
	}

	pub fn calls(&self) -> Vec<Item> {
		self.calls.lock().clone()
	}
}

#[async_trait]
impl ResourceFactory<Doc, Handle> for MockFactory {
	async fn create(&self, content: Doc) -> Result<Handle, CreateError> {
		self.calls.lock().push(content.item);
		let gate = self.gate.lock().clone();
		if let Some(gate) = gate {
			gate.acquire().await.map_err(|_| CreateError::failed("gate closed"))?.forget();
		}
		if self.panicking.lock().remove(content.item) {
			panic!("{} blew up the factory", content.item);
		}
		if self.failing.lock().contains(content.item) {
			return Err(CreateError::failed(format!("{} is malformed", content.item)));
		}
		let handle = Handle {
			id: self.next.fetch_add(1, Ordering::SeqCst) + 1,
			item: content.item,
		};
		self.created.lock().push(handle.clone());
		Ok(handle)
	}
}

/// Disposer recording every handle it is given.
#[derive(Default)]
pub struct MockDisposer {
	released: Mutex<Vec<Handle>>,
	gate: Mutex<Option<Arc<Semaphore>>>,
	fail: Mutex<bool>,
}

impl MockDisposer {
	pub fn gated(&self) -> Arc<Semaphore> {
		let gate = Arc::new(Semaphore::new(0));
		*self.gate.lock() = Some(Arc::clone(&gate));
		gate
	}

	pub fn failing(&self) {
		*self.fail.lock() = true;
	}

	pub fn released(&self) -> Vec<Handle> {
		self.released.lock().clone()
	}

	pub fn released_ids(&self) -> Vec<u32> {
		let mut ids: Vec<_> = self.released.lock().iter().map(|h| h.id).collect();
		ids.sort_unstable();
		ids
	}
}

#[async_trait]
impl ResourceDisposer<Handle> for MockDisposer {
	async fn release(&self, handle: Handle) -> Result<(), ReleaseError> {
		self.released.lock().push(handle);
		let gate = self.gate.lock().clone();
		if let Some(gate) = gate {
			gate.acquire().await.map_err(|_| ReleaseError::new("gate closed"))?.forget();
		}
		if *self.fail.lock() { Err(ReleaseError::new("device lost")) } else { Ok(()) }
	}
}

/// Sink keeping every published state in order.
#[derive(Default)]
pub struct RecordingSink {
	states: Mutex<Vec<State>>,
}

impl RecordingSink {
	pub fn states(&self) -> Vec<State> {
		self.states.lock().clone()
	}

	pub fn last(&self) -> Option<State> {
		self.states.lock().last().cloned()
	}
}

impl DisplaySink<Item, Handle> for RecordingSink {
	fn publish(&self, state: State) {
		self.states.lock().push(state);
	}
}

pub struct Harness {
	pub fetcher: Arc<ScriptedFetcher>,
	pub factory: Arc<MockFactory>,
	pub disposer: Arc<MockDisposer>,
	pub sink: Arc<RecordingSink>,
	pub coordinator: Arc<Coordinator>,
}

impl Harness {
	pub fn new() -> Self {
		Self::with_config(CoordinatorConfig::default())
	}

	pub fn with_config(config: CoordinatorConfig) -> Self {
		init_tracing();
		let fetcher = Arc::new(ScriptedFetcher::default());
		let factory = Arc::new(MockFactory::default());
		let disposer = Arc::new(MockDisposer::default());
		let sink = Arc::new(RecordingSink::default());
		let coordinator = RequestCoordinator::new(config, Arc::clone(&fetcher), Arc::clone(&factory), Arc::clone(&disposer), Arc::clone(&sink));
		Self {
			fetcher,
			factory,
			disposer,
			sink,
			coordinator: Arc::new(coordinator),
		}
	}

	pub fn content(item: Item, id: u32) -> State {
		DisplayState::Content {
			item,
			handle: Handle { id, item },
		}
	}
}

/// Polls `cond` until it holds, failing the test after two seconds.
pub async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
	let polled = tokio::time::timeout(Duration::from_secs(2), async {
		while !cond() {
			tokio::time::sleep(Duration::from_millis(1)).await;
		}
	})
	.await;
	assert!(polled.is_ok(), "timed out waiting for {what}");
}
