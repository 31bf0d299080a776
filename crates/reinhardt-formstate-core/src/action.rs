//! Action vocabulary
//!
//! Every state transition of a form is described by an [`Action`]. Field
//! actions cover a single field's lifecycle, form actions cover the whole
//! form, and [`Action::Custom`] carries kinds this crate does not know about
//! (the reducer leaves state untouched for them, subscribers still see them).
//!
//! ## Wire shape
//!
//! Actions serialize to flat JSON objects tagged by `type`:
//!
//! ```text
//! {"type": "CHANGE", "name": "email", "meta": {}, "payload": "a@b.c"}
//! {"type": "FORM_UPDATE", "payload": [{"path": "email", "value": ""}]}
//! {"type": "SUBMIT", "phase": "requested"}
//! ```

use crate::error::{FormError, ReduceError, ReduceResult};
use crate::state::{FieldMetaPatch, FieldRegistration};
use crate::values::ValueChange;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field lifecycle actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FieldAction {
	/// Inserts or overwrites a field with fresh, clean meta.
	#[serde(rename = "REGISTER")]
	Register {
		name: String,
		#[serde(rename = "meta", default)]
		registration: FieldRegistration,
		#[serde(rename = "payload", default)]
		value: Value,
	},

	/// Sets the field value and marks it dirty.
	#[serde(rename = "CHANGE")]
	Change {
		name: String,
		#[serde(rename = "meta", default)]
		patch: FieldMetaPatch,
		#[serde(rename = "payload", default)]
		value: Value,
	},

	/// Removes the field, and its value when the flag is set.
	#[serde(rename = "DESTROY")]
	Destroy {
		name: String,
		#[serde(default)]
		destroy_value_on_unmount: bool,
	},

	/// Merges constraints into the field meta without touching its value or
	/// dirty flag.
	#[serde(rename = "CONFIGURE")]
	Configure {
		name: String,
		#[serde(rename = "meta", default)]
		patch: FieldMetaPatch,
	},

	/// Records a validation error on the field.
	#[serde(rename = "THROW_ERROR")]
	ThrowError {
		name: String,
		#[serde(rename = "payload")]
		error: FormError,
	},

	/// Clears the field's validation error.
	#[serde(rename = "CLEAR_ERROR")]
	ClearError { name: String },
}

impl FieldAction {
	const KINDS: [&'static str; 6] = [
		"REGISTER",
		"CHANGE",
		"DESTROY",
		"CONFIGURE",
		"THROW_ERROR",
		"CLEAR_ERROR",
	];

	/// Path of the field this action targets.
	pub fn name(&self) -> &str {
		match self {
			Self::Register { name, .. }
			| Self::Change { name, .. }
			| Self::Destroy { name, .. }
			| Self::Configure { name, .. }
			| Self::ThrowError { name, .. }
			| Self::ClearError { name } => name,
		}
	}

	/// Stable tag of this action.
	pub fn kind(&self) -> &'static str {
		match self {
			Self::Register { .. } => "REGISTER",
			Self::Change { .. } => "CHANGE",
			Self::Destroy { .. } => "DESTROY",
			Self::Configure { .. } => "CONFIGURE",
			Self::ThrowError { .. } => "THROW_ERROR",
			Self::ClearError { .. } => "CLEAR_ERROR",
		}
	}
}

/// Phases of a submission, used to label the snapshots the submission state
/// machine injects into the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitPhase {
	/// A caller asked for a submission.
	#[default]
	Requested,
	/// Whole-form validation failed; no handler was invoked.
	Rejected,
	/// Validation passed; hooks are running.
	Started,
	/// The submit handler resolved.
	Succeeded,
	/// A before-submit or submit hook failed.
	Failed,
}

/// Whole-form actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FormAction {
	/// Restores the initial, empty state.
	#[serde(rename = "FORM_INIT")]
	Init,

	/// Sets several registered values at once.
	#[serde(rename = "FORM_UPDATE")]
	Update {
		#[serde(rename = "payload")]
		changes: Vec<ValueChange>,
	},

	/// Restores every registered field to its default value.
	#[serde(rename = "FORM_RESET")]
	Reset,

	/// Submission trigger and submission snapshots.
	#[serde(rename = "SUBMIT")]
	Submit {
		#[serde(default)]
		phase: SubmitPhase,
	},
}

impl FormAction {
	const KINDS: [&'static str; 4] = ["FORM_INIT", "FORM_UPDATE", "FORM_RESET", "SUBMIT"];

	/// Stable tag of this action.
	pub fn kind(&self) -> &'static str {
		match self {
			Self::Init => "FORM_INIT",
			Self::Update { .. } => "FORM_UPDATE",
			Self::Reset => "FORM_RESET",
			Self::Submit { .. } => "SUBMIT",
		}
	}
}

/// Any action accepted by the store.
///
/// # Examples
///
/// ```
/// use reinhardt_formstate_core::Action;
/// use serde_json::json;
///
/// let action = Action::change("email", json!("a@b.c"));
/// assert_eq!(action.kind(), "CHANGE");
/// assert_eq!(action.field_name(), Some("email"));
/// assert!(action.touches("email"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged, try_from = "Value")]
pub enum Action {
	Field(FieldAction),
	Form(FormAction),
	/// An action of a kind this crate does not interpret.
	Custom {
		#[serde(rename = "type")]
		kind: String,
		#[serde(default)]
		payload: Value,
	},
}

impl Action {
	/// Registers `name` with the given constraints and initial value.
	pub fn register(name: impl Into<String>, registration: FieldRegistration, value: Value) -> Self {
		Self::Field(FieldAction::Register {
			name: name.into(),
			registration,
			value,
		})
	}

	/// Changes the value of `name`.
	pub fn change(name: impl Into<String>, value: Value) -> Self {
		Self::change_with(name, FieldMetaPatch::default(), value)
	}

	/// Changes the value of `name` and merges `patch` into its meta.
	pub fn change_with(name: impl Into<String>, patch: FieldMetaPatch, value: Value) -> Self {
		Self::Field(FieldAction::Change {
			name: name.into(),
			patch,
			value,
		})
	}

	/// Destroys the field `name`.
	pub fn destroy(name: impl Into<String>, destroy_value_on_unmount: bool) -> Self {
		Self::Field(FieldAction::Destroy {
			name: name.into(),
			destroy_value_on_unmount,
		})
	}

	/// Merges `patch` into the meta of `name`, leaving its value alone.
	pub fn configure(name: impl Into<String>, patch: FieldMetaPatch) -> Self {
		Self::Field(FieldAction::Configure {
			name: name.into(),
			patch,
		})
	}

	/// Records `error` on the field `name`.
	pub fn throw_error(name: impl Into<String>, error: FormError) -> Self {
		Self::Field(FieldAction::ThrowError {
			name: name.into(),
			error,
		})
	}

	/// Clears the error of the field `name`.
	pub fn clear_error(name: impl Into<String>) -> Self {
		Self::Field(FieldAction::ClearError { name: name.into() })
	}

	/// Sets several registered values at once.
	pub fn update(changes: Vec<ValueChange>) -> Self {
		Self::Form(FormAction::Update { changes })
	}

	/// Resets every registered field to its default value.
	pub fn reset() -> Self {
		Self::Form(FormAction::Reset)
	}

	/// Restores the initial, empty state.
	pub fn init() -> Self {
		Self::Form(FormAction::Init)
	}

	/// Submission trigger.
	pub fn submit() -> Self {
		Self::submit_phase(SubmitPhase::Requested)
	}

	/// Submission action labelled with `phase`.
	pub fn submit_phase(phase: SubmitPhase) -> Self {
		Self::Form(FormAction::Submit { phase })
	}

	/// An action of a caller-defined kind.
	pub fn custom(kind: impl Into<String>, payload: Value) -> Self {
		Self::Custom {
			kind: kind.into(),
			payload,
		}
	}

	/// Parses an externally produced action.
	///
	/// Objects whose `type` is not part of the vocabulary become
	/// [`Action::Custom`].
	///
	/// # Errors
	///
	/// Returns [`ReduceError::InvalidActionPayload`] when the object has no
	/// string `type`, or when a known kind carries a malformed payload (for
	/// example a `FORM_UPDATE` whose payload is not an array).
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_formstate_core::{Action, ReduceError};
	/// use serde_json::json;
	///
	/// let action = Action::from_json(json!({"type": "FORM_RESET"})).unwrap();
	/// assert_eq!(action, Action::reset());
	///
	/// let err = Action::from_json(json!({"type": "FORM_UPDATE", "payload": {"a": 1}}));
	/// assert!(matches!(err, Err(ReduceError::InvalidActionPayload(_))));
	/// ```
	pub fn from_json(value: Value) -> ReduceResult<Self> {
		let kind = value
			.get("type")
			.and_then(Value::as_str)
			.ok_or_else(|| ReduceError::InvalidActionPayload("action without a string `type`".into()))?
			.to_string();

		if kind == "FORM_UPDATE" && !value.get("payload").is_some_and(Value::is_array) {
			return Err(ReduceError::InvalidActionPayload(format!(
				"FORM_UPDATE expects an array payload, got: {}",
				value.get("payload").unwrap_or(&Value::Null)
			)));
		}

		let invalid = |err: serde_json::Error| ReduceError::InvalidActionPayload(format!("{kind}: {err}"));
		if FieldAction::KINDS.iter().any(|known| *known == kind) {
			serde_json::from_value(value).map(Self::Field).map_err(invalid)
		} else if FormAction::KINDS.iter().any(|known| *known == kind) {
			serde_json::from_value(value).map(Self::Form).map_err(invalid)
		} else {
			let payload = value.get("payload").cloned().unwrap_or(Value::Null);
			Ok(Self::Custom { kind, payload })
		}
	}

	/// Stable tag of this action.
	pub fn kind(&self) -> &str {
		match self {
			Self::Field(action) => action.kind(),
			Self::Form(action) => action.kind(),
			Self::Custom { kind, .. } => kind,
		}
	}

	/// Path of the field a field action targets.
	pub fn field_name(&self) -> Option<&str> {
		match self {
			Self::Field(action) => Some(action.name()),
			_ => None,
		}
	}

	/// Returns true when this action changes the value at `path`: a change of
	/// that field or an update whose change-set names it.
	pub fn touches(&self, path: &str) -> bool {
		match self {
			Self::Field(FieldAction::Change { name, .. }) => name == path,
			Self::Form(FormAction::Update { changes }) => changes.iter().any(|change| change.path == path),
			_ => false,
		}
	}

	/// The submission phase, for submit actions.
	pub fn submit_phase_of(&self) -> Option<SubmitPhase> {
		match self {
			Self::Form(FormAction::Submit { phase }) => Some(*phase),
			_ => None,
		}
	}
}

impl From<FieldAction> for Action {
	fn from(action: FieldAction) -> Self {
		Self::Field(action)
	}
}

impl From<FormAction> for Action {
	fn from(action: FormAction) -> Self {
		Self::Form(action)
	}
}

impl TryFrom<Value> for Action {
	type Error = ReduceError;

	fn try_from(value: Value) -> Result<Self, Self::Error> {
		Self::from_json(value)
	}
}
