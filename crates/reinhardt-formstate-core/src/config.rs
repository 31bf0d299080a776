//! Form engine configuration

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default validation debounce window.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

/// Configuration of a form engine
///
/// # Examples
///
/// ```
/// use reinhardt_formstate_core::FormConfig;
/// use std::time::Duration;
///
/// let config = FormConfig::new()
///     .with_debounce(Duration::from_millis(50))
///     .with_trace_transitions(true);
///
/// assert_eq!(config.debounce(), Duration::from_millis(50));
/// assert!(config.trace_transitions());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormConfig {
	/// Quiet period before a field is validated
	#[serde(rename = "debounce_ms", with = "millis")]
	debounce: Duration,
	/// Whether the store logs every transition
	trace_transitions: bool,
}

impl FormConfig {
	/// Create a configuration with default values
	///
	/// Defaults:
	/// - `debounce`: 200 milliseconds
	/// - `trace_transitions`: false
	pub fn new() -> Self {
		Self {
			debounce: DEFAULT_DEBOUNCE,
			trace_transitions: false,
		}
	}

	/// Set the validation debounce window
	pub fn with_debounce(mut self, debounce: Duration) -> Self {
		self.debounce = debounce;
		self
	}

	/// Enable or disable transition logging
	pub fn with_trace_transitions(mut self, enabled: bool) -> Self {
		self.trace_transitions = enabled;
		self
	}

	/// Get the validation debounce window
	pub fn debounce(&self) -> Duration {
		self.debounce
	}

	/// Get whether transitions are logged
	pub fn trace_transitions(&self) -> bool {
		self.trace_transitions
	}

	/// Parse a configuration from TOML.
	///
	/// Missing keys take their default values.
	///
	/// # Errors
	///
	/// Returns [`ConfigError::Parse`] for malformed TOML or mistyped keys.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_formstate_core::FormConfig;
	/// use std::time::Duration;
	///
	/// let config = FormConfig::from_toml_str("debounce_ms = 350").unwrap();
	/// assert_eq!(config.debounce(), Duration::from_millis(350));
	/// assert!(!config.trace_transitions());
	/// ```
	pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
		Ok(toml::from_str(source)?)
	}
}

impl Default for FormConfig {
	fn default() -> Self {
		Self::new()
	}
}

mod millis {
	use serde::{Deserialize, Deserializer, Serializer};
	use std::time::Duration;

	pub(super) fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
	}

	pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
		u64::deserialize(deserializer).map(Duration::from_millis)
	}
}
