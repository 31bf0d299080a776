//! Error types for form state.
//!
//! Two families live here: [`FormError`] values are *data*, recorded inside
//! [`FormState`](crate::state::FormState) and observed by subscribers, while
//! [`ReduceError`] and [`ConfigError`] are failures of the engine itself.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An error recorded in form state.
///
/// Field validation errors are stored on the field's meta and aggregated into
/// the form meta on submission. Submission errors come from the
/// caller-supplied before-submit and submit hooks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FormError {
	/// A field failed its required check or its custom validator.
	#[error("{message}")]
	Field {
		/// Path of the field that produced the error.
		field: String,
		/// Human readable message.
		message: String,
	},

	/// A before-submit or submit hook failed.
	#[error("{message}")]
	Submission {
		/// Message of the hook error.
		message: String,
	},
}

impl FormError {
	/// Creates a field validation error.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_formstate_core::FormError;
	///
	/// let error = FormError::field("email", "email is required");
	/// assert_eq!(error.to_string(), "email is required");
	/// assert_eq!(error.field_name(), Some("email"));
	/// ```
	pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
		Self::Field {
			field: field.into(),
			message: message.into(),
		}
	}

	/// Creates a submission error.
	pub fn submission(message: impl Into<String>) -> Self {
		Self::Submission {
			message: message.into(),
		}
	}

	/// Returns the field path for field errors.
	pub fn field_name(&self) -> Option<&str> {
		match self {
			Self::Field { field, .. } => Some(field),
			Self::Submission { .. } => None,
		}
	}

	/// Returns the message without the field path.
	pub fn message(&self) -> &str {
		match self {
			Self::Field { message, .. } => message,
			Self::Submission { message } => message,
		}
	}
}

/// Failure of a single reducer transition.
///
/// The store never surfaces these to callers of `dispatch`; they are logged
/// and the previous state is retained.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ReduceError {
	/// The action payload does not have the expected shape.
	#[error("invalid action payload: {0}")]
	InvalidActionPayload(String),
}

/// Result type for reducer transitions.
pub type ReduceResult<T> = Result<T, ReduceError>;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// The TOML document could not be parsed.
	#[error("failed to parse form configuration: {0}")]
	Parse(#[from] toml::de::Error),
}
