//! Single-slot, cancel-and-replace resource management for UI panes.
//!
//! A pane shows one expensive resource at a time, built from content fetched
//! asynchronously. Selection can change faster than fetching and building
//! complete. [`RequestCoordinator`] keeps that safe:
//!
//! - every handle the factory produces reaches the disposer exactly once,
//! - only the latest request's result ever becomes visible,
//! - the previous resource is released before the next one is created.
//!
//! The lifecycle itself lives in [`ResourceSlot`]; [`DisposalSequencer`]
//! orders releases against creations and lets callers wait for them with a
//! bound.

mod config;
mod coordinator;
mod display;
mod error;
mod events;
mod factory;
mod pipeline;
mod sequencer;
mod slot;

pub use config::{ConfigFile, CoordinatorConfig};
pub use coordinator::RequestCoordinator;
pub use display::{DisplaySink, DisplayState, NullSink};
pub use error::{BusyTimeout, ConfigError, CoordinatorError, CreateError, FetchError, ReleaseError};
pub use events::{SlotEvent, SlotStats};
pub use factory::FactoryRegistry;
pub use pipeline::{Content, ContentFetcher, ResourceDisposer, ResourceFactory, ResourceHandle};
pub use sequencer::{DisposalSequencer, Retirement};
pub use slot::{CreateCommit, CreateTicket, DisposalTicket, DisposeOutcome, ResourceSlot, ResourceState};
pub use swapslot_worker::{Generation, GenerationToken};
