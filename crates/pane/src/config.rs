use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const DEFAULT_RETIRE_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_TEARDOWN_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_EVENT_BUFFER: usize = 64;

/// Timing and buffering knobs for a [`RequestCoordinator`](crate::RequestCoordinator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
	retire_timeout: Duration,
	teardown_timeout: Duration,
	event_buffer: usize,
}

impl Default for CoordinatorConfig {
	fn default() -> Self {
		Self {
			retire_timeout: Duration::from_millis(DEFAULT_RETIRE_TIMEOUT_MS),
			teardown_timeout: Duration::from_millis(DEFAULT_TEARDOWN_TIMEOUT_MS),
			event_buffer: DEFAULT_EVENT_BUFFER,
		}
	}
}

impl CoordinatorConfig {
	/// Bound on waiting for the previous disposal in `show`/`clear`.
	///
	/// # Panics
	///
	/// Panics if `timeout` is zero.
	#[must_use]
	pub fn retire_timeout(mut self, timeout: Duration) -> Self {
		assert!(!timeout.is_zero(), "retire timeout must be > 0");
		self.retire_timeout = timeout;
		self
	}

	/// Bound on the final retirement in `dispose`.
	///
	/// # Panics
	///
	/// Panics if `timeout` is zero.
	#[must_use]
	pub fn teardown_timeout(mut self, timeout: Duration) -> Self {
		assert!(!timeout.is_zero(), "teardown timeout must be > 0");
		self.teardown_timeout = timeout;
		self
	}

	/// Capacity of the [`SlotEvent`](crate::SlotEvent) broadcast buffer.
	///
	/// # Panics
	///
	/// Panics if `size` is zero.
	#[must_use]
	pub fn event_buffer(mut self, size: usize) -> Self {
		assert!(size > 0, "event buffer size must be > 0");
		self.event_buffer = size;
		self
	}

	pub fn retire_timeout_value(&self) -> Duration {
		self.retire_timeout
	}

	pub fn teardown_timeout_value(&self) -> Duration {
		self.teardown_timeout
	}

	pub fn event_buffer_size(&self) -> usize {
		self.event_buffer
	}

	/// Parses the TOML form. Missing keys keep their defaults.
	///
	/// ```toml
	/// retire_timeout_ms = 500
	/// teardown_timeout_ms = 3000
	/// event_buffer = 32
	/// ```
	pub fn from_toml(src: &str) -> Result<Self, ConfigError> {
		let file: ConfigFile = toml::from_str(src)?;
		Self::try_from(file)
	}
}

/// On-disk form of [`CoordinatorConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
	pub retire_timeout_ms: u64,
	pub teardown_timeout_ms: u64,
	pub event_buffer: usize,
}

impl Default for ConfigFile {
	fn default() -> Self {
		Self {
			retire_timeout_ms: DEFAULT_RETIRE_TIMEOUT_MS,
			teardown_timeout_ms: DEFAULT_TEARDOWN_TIMEOUT_MS,
			event_buffer: DEFAULT_EVENT_BUFFER,
		}
	}
}

impl TryFrom<ConfigFile> for CoordinatorConfig {
	type Error = ConfigError;

	fn try_from(file: ConfigFile) -> Result<Self, Self::Error> {
		if file.retire_timeout_ms == 0 {
			return Err(ConfigError::Zero { field: "retire_timeout_ms" });
		}
		if file.teardown_timeout_ms == 0 {
			return Err(ConfigError::Zero { field: "teardown_timeout_ms" });
		}
		if file.event_buffer == 0 {
			return Err(ConfigError::Zero { field: "event_buffer" });
		}
		Ok(Self {
			retire_timeout: Duration::from_millis(file.retire_timeout_ms),
			teardown_timeout: Duration::from_millis(file.teardown_timeout_ms),
			event_buffer: file.event_buffer,
		})
	}
}
