use std::sync::Arc;

use async_trait::async_trait;
use rustc_hash::FxHashMap;

use crate::error::CreateError;
use crate::pipeline::{Content, ResourceFactory};

/// Strategy table from content kind to the factory that builds it.
pub struct FactoryRegistry<C, H> {
	by_kind: FxHashMap<String, Arc<dyn ResourceFactory<C, H>>>,
	fallback: Option<Arc<dyn ResourceFactory<C, H>>>,
}

impl<C, H> Default for FactoryRegistry<C, H> {
	fn default() -> Self {
		Self {
			by_kind: FxHashMap::default(),
			fallback: None,
		}
	}
}

impl<C, H> FactoryRegistry<C, H>
where
	C: Content,
	H: Send + 'static,
{
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `factory` for `kind`, replacing any previous one.
	#[must_use]
	pub fn with(mut self, kind: impl Into<String>, factory: impl ResourceFactory<C, H>) -> Self {
		self.insert(kind, Arc::new(factory));
		self
	}

	/// Sets the factory used for kinds with no registration.
	#[must_use]
	pub fn with_fallback(mut self, factory: impl ResourceFactory<C, H>) -> Self {
		self.fallback = Some(Arc::new(factory));
		self
	}

	pub fn insert(&mut self, kind: impl Into<String>, factory: Arc<dyn ResourceFactory<C, H>>) -> Option<Arc<dyn ResourceFactory<C, H>>> {
		self.by_kind.insert(kind.into(), factory)
	}

	/// Returns the factory for `kind`, falling back when one is configured.
	pub fn resolve(&self, kind: &str) -> Option<&Arc<dyn ResourceFactory<C, H>>> {
		self.by_kind.get(kind).or(self.fallback.as_ref())
	}

	pub fn kinds(&self) -> impl Iterator<Item = &str> {
		self.by_kind.keys().map(String::as_str)
	}
}

#[async_trait]
impl<C, H> ResourceFactory<C, H> for FactoryRegistry<C, H>
where
	C: Content,
	H: Send + 'static,
{
	async fn create(&self, content: C) -> Result<H, CreateError> {
		let Some(factory) = self.resolve(content.kind()) else {
			return Err(CreateError::Unsupported {
				kind: content.kind().to_string(),
			});
		};
		factory.create(content).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	struct Doc {
		kind: &'static str,
		body: &'static str,
	}

	impl Content for Doc {
		fn kind(&self) -> &str {
			self.kind
		}
	}

	struct Tagged(&'static str);

	#[async_trait]
	impl ResourceFactory<Doc, String> for Tagged {
		async fn create(&self, content: Doc) -> Result<String, CreateError> {
			Ok(format!("{}:{}", self.0, content.body))
		}
	}

	fn doc(kind: &'static str, body: &'static str) -> Doc {
		Doc { kind, body }
	}

	#[tokio::test]
	async fn dispatches_by_kind() {
		let registry = FactoryRegistry::new().with("json", Tagged("json")).with("yaml", Tagged("yaml"));

		assert_eq!(registry.create(doc("json", "a")).await, Ok("json:a".to_string()));
		assert_eq!(registry.create(doc("yaml", "b")).await, Ok("yaml:b".to_string()));
	}

	#[tokio::test]
	async fn unknown_kind_is_unsupported() {
		let registry = FactoryRegistry::new().with("json", Tagged("json"));
		let err = registry.create(doc("xml", "c")).await.unwrap_err();
		assert_eq!(err, CreateError::Unsupported { kind: "xml".to_string() });
	}

	#[tokio::test]
	async fn fallback_covers_unregistered_kinds() {
		let registry = FactoryRegistry::new().with("json", Tagged("json")).with_fallback(Tagged("text"));
		assert_eq!(registry.create(doc("xml", "c")).await, Ok("text:c".to_string()));

		let mut kinds: Vec<_> = registry.kinds().collect();
		kinds.sort_unstable();
		assert_eq!(kinds, vec!["json"]);
	}
}
