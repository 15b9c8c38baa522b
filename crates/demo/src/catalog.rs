//! Simulated catalog backing the demo pane.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use swapslot_pane::{Content, ContentFetcher, CreateError, FetchError, GenerationToken, ReleaseError, ResourceDisposer, ResourceFactory};

/// A fetched catalog entry.
#[derive(Debug)]
pub struct Entry {
	pub name: String,
	kind: &'static str,
	pub body: String,
}

impl Content for Entry {
	fn kind(&self) -> &str {
		self.kind
	}
}

pub struct CatalogFetcher {
	delay: Duration,
}

impl CatalogFetcher {
	pub fn new(delay: Duration) -> Self {
		Self { delay }
	}
}

#[async_trait]
impl ContentFetcher for CatalogFetcher {
	type Item = String;
	type Content = Entry;

	async fn fetch(&self, item: String, token: GenerationToken) -> Result<Entry, FetchError> {
		tokio::select! {
			() = token.cancelled() => return Err(FetchError::new("cancelled")),
			() = tokio::time::sleep(self.delay) => {}
		}
		if item.starts_with("broken:") {
			return Err(FetchError::new(format!("{item} not found")));
		}
		let kind = if item.starts_with("img:") { "image" } else { "text" };
		Ok(Entry {
			body: format!("contents of {item} ({})", token.generation()),
			name: item,
			kind,
		})
	}
}

/// A rendered view of an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Surface {
	pub id: u64,
	pub title: String,
}

#[derive(Default)]
pub struct TextSurfaces {
	next: AtomicU64,
}

#[async_trait]
impl ResourceFactory<Entry, Surface> for TextSurfaces {
	async fn create(&self, content: Entry) -> Result<Surface, CreateError> {
		if content.body.is_empty() {
			return Err(CreateError::failed("empty entry"));
		}
		let id = self.next.fetch_add(1, Ordering::Relaxed) + 1;
		tracing::info!(id, name = %content.name, "demo.surface_created");
		Ok(Surface { id, title: content.name })
	}
}

#[derive(Default)]
pub struct SurfaceReleaser {
	released: AtomicU64,
}

impl SurfaceReleaser {
	pub fn released(&self) -> u64 {
		self.released.load(Ordering::Relaxed)
	}
}

#[async_trait]
impl ResourceDisposer<Surface> for SurfaceReleaser {
	async fn release(&self, handle: Surface) -> Result<(), ReleaseError> {
		self.released.fetch_add(1, Ordering::Relaxed);
		tracing::info!(id = handle.id, title = %handle.title, "demo.surface_released");
		Ok(())
	}
}
