//! Path-addressed value tree
//!
//! Field names are dot-separated paths. `"user.fname"` is stored at
//! `{"user": {"fname": ...}}`, which is how nested form sections end up as
//! nested objects in the submitted values.

use crate::error::{ReduceError, ReduceResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Splits a dot-separated path into its segments.
///
/// # Errors
///
/// Returns [`ReduceError::InvalidActionPayload`] when the path is empty or
/// contains an empty segment (`"a..b"`, `".a"`, `"a."`).
///
/// # Examples
///
/// ```
/// use reinhardt_formstate_core::values::split_path;
///
/// assert_eq!(split_path("user.fname").unwrap(), vec!["user", "fname"]);
/// assert!(split_path("user..fname").is_err());
/// assert!(split_path("").is_err());
/// ```
pub fn split_path(path: &str) -> ReduceResult<Vec<&str>> {
	let segments: Vec<&str> = path.split('.').collect();
	if segments.iter().any(|segment| segment.is_empty()) {
		return Err(ReduceError::InvalidActionPayload(format!(
			"malformed field path: {path:?}"
		)));
	}
	Ok(segments)
}

/// Joins a section prefix and a field name.
///
/// An empty prefix yields the name unchanged.
pub fn join_path(prefix: &str, name: &str) -> String {
	if prefix.is_empty() {
		name.to_string()
	} else {
		format!("{prefix}.{name}")
	}
}

/// A single entry of a bulk value update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueChange {
	/// Dot-separated field path.
	pub path: String,
	/// New value for the field.
	pub value: Value,
}

impl ValueChange {
	/// Creates a change for `path`.
	pub fn new(path: impl Into<String>, value: impl Into<Value>) -> Self {
		Self {
			path: path.into(),
			value: value.into(),
		}
	}
}

/// The value tree of a form.
///
/// # Examples
///
/// ```
/// use reinhardt_formstate_core::FormValues;
/// use serde_json::json;
///
/// let mut values = FormValues::new();
/// values.set("user.fname", json!("Ada")).unwrap();
///
/// assert_eq!(values.get("user.fname"), Some(&json!("Ada")));
/// assert_eq!(values.to_value(), json!({"user": {"fname": "Ada"}}));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormValues(Map<String, Value>);

impl FormValues {
	/// Creates an empty value tree.
	pub fn new() -> Self {
		Self(Map::new())
	}

	/// Reads the value at `path`.
	///
	/// Malformed paths read as absent.
	pub fn get(&self, path: &str) -> Option<&Value> {
		let segments = split_path(path).ok()?;
		let (head, rest) = segments.split_first()?;
		get_in(self.0.get(*head)?, rest)
	}

	/// Returns true when a value is stored at `path`.
	pub fn contains(&self, path: &str) -> bool {
		self.get(path).is_some()
	}

	/// Writes `value` at `path`, creating intermediate objects.
	///
	/// Non-container intermediates are replaced by objects. Numeric segments
	/// index into existing arrays, either overwriting an element or appending
	/// right after the last one.
	///
	/// # Errors
	///
	/// Returns [`ReduceError::InvalidActionPayload`] for a malformed path or
	/// an array index past the end of the array.
	pub fn set(&mut self, path: &str, value: Value) -> ReduceResult<()> {
		let segments = split_path(path)?;
		let Some((head, rest)) = segments.split_first() else {
			return Err(ReduceError::InvalidActionPayload("empty field path".into()));
		};
		let slot = self.0.entry((*head).to_string()).or_insert(Value::Null);
		set_in(slot, rest, value)
	}

	/// Removes the value at `path`, returning it.
	///
	/// Array elements are replaced by `null` so that sibling indices stay
	/// stable.
	pub fn remove(&mut self, path: &str) -> Option<Value> {
		let segments = split_path(path).ok()?;
		let (last, parents) = segments.split_last()?;
		let Some((head, rest)) = parents.split_first() else {
			return self.0.remove(*last);
		};
		let mut target = self.0.get_mut(*head)?;
		for segment in rest {
			target = child_mut(target, segment)?;
		}
		match target {
			Value::Object(map) => map.remove(*last),
			Value::Array(items) => {
				let index = last.parse::<usize>().ok()?;
				items.get_mut(index).map(Value::take)
			}
			_ => None,
		}
	}

	/// Returns the underlying map.
	pub fn as_map(&self) -> &Map<String, Value> {
		&self.0
	}

	/// Returns true when no value is stored.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Converts the tree into a JSON object.
	pub fn to_value(&self) -> Value {
		Value::Object(self.0.clone())
	}

	/// Consumes the tree, returning the underlying map.
	pub fn into_inner(self) -> Map<String, Value> {
		self.0
	}
}

impl From<Map<String, Value>> for FormValues {
	fn from(map: Map<String, Value>) -> Self {
		Self(map)
	}
}

fn get_in<'a>(target: &'a Value, segments: &[&str]) -> Option<&'a Value> {
	segments
		.iter()
		.try_fold(target, |current, segment| match current {
			Value::Object(map) => map.get(*segment),
			Value::Array(items) => items.get(segment.parse::<usize>().ok()?),
			_ => None,
		})
}

fn child_mut<'a>(target: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
	match target {
		Value::Object(map) => map.get_mut(segment),
		Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?),
		_ => None,
	}
}

fn set_in(target: &mut Value, segments: &[&str], value: Value) -> ReduceResult<()> {
	let Some((head, rest)) = segments.split_first() else {
		*target = value;
		return Ok(());
	};

	if let (Value::Array(items), Ok(index)) = (&mut *target, head.parse::<usize>()) {
		if index > items.len() {
			return Err(ReduceError::InvalidActionPayload(format!(
				"array index {index} out of range for length {}",
				items.len()
			)));
		}
		if index == items.len() {
			items.push(Value::Null);
		}
		return set_in(&mut items[index], rest, value);
	}

	if !target.is_object() {
		*target = Value::Object(Map::new());
	}
	match target {
		Value::Object(map) => {
			let slot = map.entry((*head).to_string()).or_insert(Value::Null);
			set_in(slot, rest, value)
		}
		_ => Ok(()),
	}
}
