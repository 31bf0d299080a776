//! Form state data model

use crate::error::FormError;
use crate::values::FormValues;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Per-field bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldMeta {
	/// Whether the value changed since registration or the last reset.
	pub dirty: bool,
	/// Whether an empty value is a validation error.
	pub required: bool,
	/// Value restored by a form reset.
	pub default_value: Value,
	/// Current validation error, if any.
	pub error: Option<FormError>,
	/// Whether destroying the field also drops its value.
	pub destroy_value_on_unmount: bool,
	/// Name used in error messages instead of the path.
	pub display_name: Option<String>,
}

impl FieldMeta {
	/// Name used in messages: the display name when set, the path otherwise.
	pub fn label<'a>(&'a self, path: &'a str) -> &'a str {
		self.display_name.as_deref().unwrap_or(path)
	}

	/// Applies a partial update.
	pub fn apply_patch(&mut self, patch: &FieldMetaPatch) {
		if let Some(required) = patch.required {
			self.required = required;
		}
		if let Some(default_value) = &patch.default_value {
			self.default_value = default_value.clone();
		}
		if let Some(display_name) = &patch.display_name {
			self.display_name = display_name.clone();
		}
		if let Some(destroy) = patch.destroy_value_on_unmount {
			self.destroy_value_on_unmount = destroy;
		}
	}
}

/// Constraints carried by a register action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldRegistration {
	pub required: bool,
	pub default_value: Value,
	pub display_name: Option<String>,
	pub destroy_value_on_unmount: bool,
}

impl FieldRegistration {
	/// Builds a fresh, clean field meta from these constraints.
	pub fn into_meta(self) -> FieldMeta {
		FieldMeta {
			dirty: false,
			required: self.required,
			default_value: self.default_value,
			error: None,
			destroy_value_on_unmount: self.destroy_value_on_unmount,
			display_name: self.display_name,
		}
	}
}

/// Partial meta update carried by a change or configure action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldMetaPatch {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub required: Option<bool>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub default_value: Option<Value>,
	/// `Some(None)` removes the display name; `null` on the wire.
	#[serde(
		default,
		skip_serializing_if = "Option::is_none",
		deserialize_with = "present_or_null"
	)]
	pub display_name: Option<Option<String>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub destroy_value_on_unmount: Option<bool>,
}

/// Maps a present key to `Some`, so that an explicit `null` survives as
/// `Some(None)` while a missing key falls back to `None`.
fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
	D: Deserializer<'de>,
	T: Deserialize<'de>,
{
	Option::<T>::deserialize(deserializer).map(Some)
}

impl FieldMetaPatch {
	/// Returns true when the patch changes nothing.
	pub fn is_empty(&self) -> bool {
		self == &Self::default()
	}
}

/// Aggregate form meta.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormMeta {
	/// A submission is in flight.
	pub submitting: bool,
	/// Derived: any registered field is dirty.
	pub dirty: bool,
	/// Errors recorded by the last submission attempt.
	pub errors: Vec<FormError>,
}

/// The single source of truth of a form.
///
/// `FormState::default()` is the initial state: no fields, no values,
/// `submitting == false` and no errors.
///
/// # Examples
///
/// ```
/// use reinhardt_formstate_core::FormState;
///
/// let state = FormState::default();
/// assert!(state.fields.is_empty());
/// assert!(state.values.is_empty());
/// assert!(!state.meta.submitting);
/// assert!(state.meta.errors.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormState {
	pub fields: BTreeMap<String, FieldMeta>,
	pub values: FormValues,
	pub meta: FormMeta,
}

impl FormState {
	/// Meta of the registered field at `path`.
	pub fn field(&self, path: &str) -> Option<&FieldMeta> {
		self.fields.get(path)
	}

	/// Value stored at `path`.
	pub fn value(&self, path: &str) -> Option<&Value> {
		self.values.get(path)
	}

	/// Returns true when a field is registered at `path`.
	pub fn is_registered(&self, path: &str) -> bool {
		self.fields.contains_key(path)
	}

	/// Current per-field errors, in path order.
	pub fn field_errors(&self) -> impl Iterator<Item = &FormError> {
		self.fields.values().filter_map(|field| field.error.as_ref())
	}

	/// Returns true when no field error and no form error is present.
	pub fn is_valid(&self) -> bool {
		self.meta.errors.is_empty() && self.field_errors().next().is_none()
	}

	/// Recomputes derived meta.
	pub(crate) fn refresh_derived(&mut self) {
		self.meta.dirty = self.fields.values().any(|field| field.dirty);
	}
}
