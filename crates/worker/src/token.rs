use std::fmt;

use tokio_util::sync::CancellationToken;

/// Monotonic request generation.
///
/// Each new request gets a strictly larger generation than the one it
/// supersedes. Results tagged with an older generation are stale.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
	/// Generation of a freshly constructed owner, before any request.
	pub const ZERO: Self = Self(0);

	pub const fn new(raw: u64) -> Self {
		Self(raw)
	}

	/// Returns the successor generation.
	#[must_use]
	pub const fn next(self) -> Self {
		Self(self.0.wrapping_add(1))
	}

	pub const fn get(self) -> u64 {
		self.0
	}
}

impl fmt::Display for Generation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "g{}", self.0)
	}
}

/// Generation-scoped cancellation token handed to a fetch.
///
/// Cancellation is cooperative: the fetch may observe it at checkpoints, but
/// the owner never relies on it and compares [`Self::generation`] on
/// completion instead.
#[derive(Debug, Clone)]
pub struct GenerationToken {
	generation: Generation,
	cancel: CancellationToken,
}

impl GenerationToken {
	pub fn new(generation: Generation, cancel: CancellationToken) -> Self {
		Self { generation, cancel }
	}

	/// Creates a token whose cancellation follows `parent`.
	pub fn child_of(generation: Generation, parent: &CancellationToken) -> Self {
		Self::new(generation, parent.child_token())
	}

	pub const fn generation(&self) -> Generation {
		self.generation
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled()
	}

	pub fn cancel(&self) {
		self.cancel.cancel();
	}

	/// Resolves once cancellation is requested.
	pub async fn cancelled(&self) {
		self.cancel.cancelled().await;
	}

	/// Creates a child token in the same generation.
	pub fn child(&self) -> Self {
		Self {
			generation: self.generation,
			cancel: self.cancel.child_token(),
		}
	}
}
