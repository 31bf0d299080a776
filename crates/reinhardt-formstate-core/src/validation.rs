//! Required checks and whole-form verification
//!
//! These are the synchronous parts of validation. The debounced, possibly
//! asynchronous per-field pipeline lives in the engine crate and calls
//! [`required_error`] before any custom validator; the submission state
//! machine calls [`verify_form`].

use crate::error::FormError;
use crate::state::{FieldMeta, FormState};
use serde_json::Value;

/// Returns true for values a required field rejects: a missing value,
/// `null`, the empty string, the empty array and the empty object.
///
/// # Examples
///
/// ```
/// use reinhardt_formstate_core::validation::is_empty_value;
/// use serde_json::json;
///
/// assert!(is_empty_value(None));
/// assert!(is_empty_value(Some(&json!(""))));
/// assert!(is_empty_value(Some(&json!([]))));
/// assert!(!is_empty_value(Some(&json!(0))));
/// assert!(!is_empty_value(Some(&json!(false))));
/// ```
pub fn is_empty_value(value: Option<&Value>) -> bool {
	match value {
		None | Some(Value::Null) => true,
		Some(Value::String(s)) => s.is_empty(),
		Some(Value::Array(items)) => items.is_empty(),
		Some(Value::Object(map)) => map.is_empty(),
		Some(Value::Bool(_) | Value::Number(_)) => false,
	}
}

/// Runs the required check for one field.
///
/// The message names the field by its display name, falling back to the path:
/// `"<name> is required"`.
pub fn required_error(path: &str, meta: &FieldMeta, value: Option<&Value>) -> Option<FormError> {
	if meta.required && is_empty_value(value) {
		Some(FormError::field(path, format!("{} is required", meta.label(path))))
	} else {
		None
	}
}

/// Whole-form verification used at submit time.
///
/// Re-runs the required check of every registered field against the current
/// values; errors already recorded on fields (for example by an asynchronous
/// validator) are kept. Returns `None` when the form is free of errors,
/// otherwise the state with the failing fields' errors set and every field
/// error collected into `meta.errors`.
///
/// Custom validators are not re-run here.
///
/// # Examples
///
/// ```
/// use reinhardt_formstate_core::{FieldRegistration, FormState};
/// use reinhardt_formstate_core::validation::verify_form;
/// use serde_json::json;
///
/// let mut state = FormState::default();
/// let registration = FieldRegistration { required: true, ..Default::default() };
/// state.fields.insert("email".into(), registration.into_meta());
/// state.values.set("email", json!("")).unwrap();
///
/// let verified = verify_form(&state).expect("email is empty");
/// assert_eq!(verified.meta.errors[0].to_string(), "email is required");
/// ```
pub fn verify_form(state: &FormState) -> Option<FormState> {
	let mut verified = state.clone();
	for (path, meta) in verified.fields.iter_mut() {
		if let Some(error) = required_error(path, meta, state.values.get(path)) {
			meta.error = Some(error);
		}
	}

	let errors: Vec<FormError> = verified.field_errors().cloned().collect();
	if errors.is_empty() {
		return None;
	}

	verified.meta.errors = errors;
	Some(verified)
}
