use std::time::Duration;

/// A [`ContentFetcher`](crate::ContentFetcher) failed to produce content.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("fetch failed: {message}")]
pub struct FetchError {
	message: String,
}

impl FetchError {
	pub fn new(message: impl Into<String>) -> Self {
		Self { message: message.into() }
	}

	pub fn message(&self) -> &str {
		&self.message
	}
}

/// A [`ResourceFactory`](crate::ResourceFactory) could not build a handle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CreateError {
	/// The factory rejected the content.
	#[error("resource creation failed: {message}")]
	Failed { message: String },
	/// No factory is registered for this content kind.
	#[error("no resource factory for content kind `{kind}`")]
	Unsupported { kind: String },
}

impl CreateError {
	pub fn failed(message: impl Into<String>) -> Self {
		Self::Failed { message: message.into() }
	}
}

/// A [`ResourceDisposer`](crate::ResourceDisposer) reported a failed release.
///
/// Never propagated past the slot: the release is logged and the slot still
/// moves to `DISPOSED`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("resource release failed: {message}")]
pub struct ReleaseError {
	message: String,
}

impl ReleaseError {
	pub fn new(message: impl Into<String>) -> Self {
		Self { message: message.into() }
	}

	pub fn message(&self) -> &str {
		&self.message
	}
}

/// Waiting for an in-progress disposal exceeded its bound.
///
/// Points at a disposer that never returned. The slot is left as the stuck
/// disposal left it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("slot busy: previous disposal still running after {waited:?}")]
pub struct BusyTimeout {
	pub waited: Duration,
}

/// Errors returned to callers of [`RequestCoordinator`](crate::RequestCoordinator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum CoordinatorError {
	/// The coordinator was torn down by `dispose()`.
	#[error("coordinator has been disposed")]
	Disposed,
	/// The previous resource did not finish disposing in time.
	#[error(transparent)]
	Busy(#[from] BusyTimeout),
}

/// Errors from loading a [`CoordinatorConfig`](crate::CoordinatorConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("invalid config: {0}")]
	Parse(#[from] toml::de::Error),
	#[error("`{field}` must be greater than zero")]
	Zero { field: &'static str },
}
