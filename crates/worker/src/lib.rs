//! Worker primitives shared by the swapslot crates.
//!
//! Every background task is spawned through [`spawn`] with a [`TaskClass`]
//! so trace output can attribute work. Fetches are tagged with a
//! [`GenerationToken`]; completions compare its [`Generation`] against the
//! owner's current one to discard superseded results.

mod class;
mod join_set;
mod panic;
mod spawn;
mod token;

pub use class::TaskClass;
pub use join_set::WorkerJoinSet;
pub use panic::join_error_panic_message;
pub use spawn::spawn;
pub use token::{Generation, GenerationToken};
