use std::sync::Arc;

use parking_lot::Mutex;
use swapslot_worker::Generation;
use tokio::sync::{mpsc, watch};

/// What the pane should render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayState<I, H> {
	Empty,
	Loading { item: I },
	Content { item: I, handle: H },
	Error { item: Option<I>, message: String },
}

impl<I, H> DisplayState<I, H> {
	pub fn item(&self) -> Option<&I> {
		match self {
			Self::Empty => None,
			Self::Loading { item } | Self::Content { item, .. } => Some(item),
			Self::Error { item, .. } => item.as_ref(),
		}
	}

	pub fn handle(&self) -> Option<&H> {
		match self {
			Self::Content { handle, .. } => Some(handle),
			_ => None,
		}
	}

	pub fn is_error(&self) -> bool {
		matches!(self, Self::Error { .. })
	}
}

/// Receives every externally visible display change.
///
/// Called while the publisher holds its ordering lock: implementations must
/// return quickly and must not call back into the coordinator.
pub trait DisplaySink<I, H>: Send + Sync + 'static {
	fn publish(&self, state: DisplayState<I, H>);
}

/// Sink that drops every state. Useful when only [`watch`] is consumed.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl<I, H> DisplaySink<I, H> for NullSink {
	fn publish(&self, _state: DisplayState<I, H>) {}
}

impl<I, H> DisplaySink<I, H> for mpsc::UnboundedSender<DisplayState<I, H>>
where
	I: Send + 'static,
	H: Send + 'static,
{
	fn publish(&self, state: DisplayState<I, H>) {
		let _ = self.send(state);
	}
}

impl<I, H, T> DisplaySink<I, H> for Arc<T>
where
	T: DisplaySink<I, H> + ?Sized,
{
	fn publish(&self, state: DisplayState<I, H>) {
		(**self).publish(state);
	}
}

/// Generation-gated fan-out to the sink and the latest-value channel.
///
/// A state tagged with a generation older than the newest one published or
/// superseded is dropped, so UI-visible updates follow request order, not
/// arrival order.
pub(crate) struct DisplayPublisher<I, H> {
	latest: Mutex<Generation>,
	current: watch::Sender<DisplayState<I, H>>,
	sink: Box<dyn DisplaySink<I, H>>,
}

impl<I, H> DisplayPublisher<I, H>
where
	I: Clone + Send + Sync + 'static,
	H: Clone + Send + Sync + 'static,
{
	pub(crate) fn new(sink: impl DisplaySink<I, H>) -> Self {
		let (current, _) = watch::channel(DisplayState::Empty);
		Self {
			latest: Mutex::new(Generation::ZERO),
			current,
			sink: Box::new(sink),
		}
	}

	/// Publishes `state` for `generation`. Returns false when it was dropped
	/// as stale or as a repeated `Empty`.
	pub(crate) fn publish(&self, generation: Generation, state: DisplayState<I, H>) -> bool {
		let mut latest = self.latest.lock();
		if generation < *latest {
			tracing::trace!(%generation, latest = %*latest, "display.stale_publish");
			return false;
		}
		*latest = generation;
		if matches!(state, DisplayState::Empty) && matches!(*self.current.borrow(), DisplayState::Empty) {
			return false;
		}
		self.current.send_replace(state.clone());
		self.sink.publish(state);
		true
	}

	/// Raises the floor to `generation` without publishing anything.
	///
	/// Called in the same critical section that makes `generation` current, so
	/// a publish from an older generation either lands before the previous
	/// resource starts retiring or is dropped.
	pub(crate) fn supersede(&self, generation: Generation) {
		let mut latest = self.latest.lock();
		if generation > *latest {
			*latest = generation;
		}
	}

	pub(crate) fn current(&self) -> DisplayState<I, H> {
		self.current.borrow().clone()
	}

	pub(crate) fn watch(&self) -> watch::Receiver<DisplayState<I, H>> {
		self.current.subscribe()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	type State = DisplayState<&'static str, u32>;

	fn publisher() -> (DisplayPublisher<&'static str, u32>, mpsc::UnboundedReceiver<State>) {
		let (tx, rx) = mpsc::unbounded_channel();
		(DisplayPublisher::new(tx), rx)
	}

	#[test]
	fn older_generation_cannot_overwrite_newer() {
		let (publisher, mut rx) = publisher();
		let g1 = Generation::new(1);
		let g2 = g1.next();

		assert!(publisher.publish(g2, DisplayState::Loading { item: "b" }));
		assert!(!publisher.publish(g1, DisplayState::Content { item: "a", handle: 1 }));
		assert!(publisher.publish(g2, DisplayState::Content { item: "b", handle: 2 }));

		assert_eq!(rx.try_recv().ok(), Some(DisplayState::Loading { item: "b" }));
		assert_eq!(rx.try_recv().ok(), Some(DisplayState::Content { item: "b", handle: 2 }));
		assert!(rx.try_recv().is_err());
		assert_eq!(publisher.current().handle(), Some(&2));
	}

	#[test]
	fn repeated_empty_is_not_republished() {
		let (publisher, mut rx) = publisher();
		assert!(!publisher.publish(Generation::new(1), DisplayState::Empty));
		assert!(publisher.publish(Generation::new(2), DisplayState::Loading { item: "a" }));
		assert!(publisher.publish(Generation::new(3), DisplayState::Empty));
		assert!(!publisher.publish(Generation::new(4), DisplayState::Empty));

		assert_eq!(rx.try_recv().ok(), Some(DisplayState::Loading { item: "a" }));
		assert_eq!(rx.try_recv().ok(), Some(DisplayState::Empty));
		assert!(rx.try_recv().is_err());
	}

	#[test]
	fn superseded_generation_is_dropped_before_anything_newer_publishes() {
		let (publisher, mut rx) = publisher();
		assert!(publisher.publish(Generation::new(1), DisplayState::Loading { item: "a" }));
		publisher.supersede(Generation::new(2));

		assert!(!publisher.publish(Generation::new(1), DisplayState::Content { item: "a", handle: 1 }));
		assert_eq!(publisher.current(), DisplayState::Loading { item: "a" });

		publisher.supersede(Generation::new(1));
		assert!(publisher.publish(Generation::new(2), DisplayState::Loading { item: "b" }));
		assert_eq!(rx.try_recv().ok(), Some(DisplayState::Loading { item: "a" }));
		assert_eq!(rx.try_recv().ok(), Some(DisplayState::Loading { item: "b" }));
		assert!(rx.try_recv().is_err());
	}

	#[tokio::test]
	async fn watch_sees_latest_state() {
		let publisher = DisplayPublisher::<&'static str, u32>::new(NullSink);
		let mut watch = publisher.watch();
		publisher.publish(Generation::new(1), DisplayState::Error {
			item: Some("a"),
			message: "nope".into(),
		});
		watch.changed().await.expect("sender alive");
		assert!(watch.borrow().is_error());
		assert_eq!(watch.borrow().item(), Some(&"a"));
	}
}
