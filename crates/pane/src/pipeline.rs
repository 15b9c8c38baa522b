//! Collaborator contracts the coordinator drives.
//!
//! None of these are implemented here: the owning pane supplies a fetcher
//! that turns an item into content, a factory that turns content into a live
//! handle, and a disposer that releases a handle.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use swapslot_worker::GenerationToken;

use crate::error::{CreateError, FetchError, ReleaseError};

/// Opaque handle to a live resource.
///
/// Handles are cheap to clone (ids, shared views). Cloning does not transfer
/// ownership: only the slot ever passes a handle to the disposer.
pub trait ResourceHandle: Clone + fmt::Debug + Send + Sync + 'static {}

impl<T> ResourceHandle for T where T: Clone + fmt::Debug + Send + Sync + 'static {}

/// Fetched content, tagged with the kind used for factory lookup.
pub trait Content: Send + 'static {
	fn kind(&self) -> &str;
}

/// Turns an item identifier into content.
#[async_trait]
pub trait ContentFetcher: Send + Sync + 'static {
	type Item: Clone + fmt::Debug + Send + Sync + 'static;
	type Content: Content;

	/// Fetches content for `item`.
	///
	/// `token` is cancelled once a newer request supersedes this one. Checking
	/// it is optional; a completion that arrives late is discarded anyway.
	async fn fetch(&self, item: Self::Item, token: GenerationToken) -> Result<Self::Content, FetchError>;
}

/// Builds a live handle from content. Failure must not leak partial state.
#[async_trait]
pub trait ResourceFactory<C, H>: Send + Sync + 'static {
	async fn create(&self, content: C) -> Result<H, CreateError>;
}

/// Releases a handle. Not assumed idempotent; the slot calls it at most once
/// per handle.
#[async_trait]
pub trait ResourceDisposer<H>: Send + Sync + 'static {
	async fn release(&self, handle: H) -> Result<(), ReleaseError>;
}

#[async_trait]
impl<T> ContentFetcher for Arc<T>
where
	T: ContentFetcher + ?Sized,
{
	type Item = T::Item;
	type Content = T::Content;

	async fn fetch(&self, item: Self::Item, token: GenerationToken) -> Result<Self::Content, FetchError> {
		(**self).fetch(item, token).await
	}
}

#[async_trait]
impl<T, C, H> ResourceFactory<C, H> for Arc<T>
where
	T: ResourceFactory<C, H> + ?Sized,
	C: Send + 'static,
	H: Send + 'static,
{
	async fn create(&self, content: C) -> Result<H, CreateError> {
		(**self).create(content).await
	}
}

#[async_trait]
impl<T, H> ResourceDisposer<H> for Arc<T>
where
	T: ResourceDisposer<H> + ?Sized,
	H: Send + 'static,
{
	async fn release(&self, handle: H) -> Result<(), ReleaseError> {
		(**self).release(handle).await
	}
}
