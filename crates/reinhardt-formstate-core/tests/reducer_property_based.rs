//! Reducer Property-Based Tests
//!
//! # Properties Tested
//!
//! - Register then change stores the last value and marks the field dirty
//! - Updates naming only unregistered paths leave values untouched
//! - Reset restores every default and clears dirty flags
//! - Derived `meta.dirty` always reflects the field flags

use proptest::prelude::*;
use reinhardt_formstate_core::{
	Action, FieldRegistration, FormReducer, FormState, IsolatedReducer, ValueChange,
};
use serde_json::{Value, json};
use std::sync::Arc;

// =============================================================================
// Strategy Definitions
// =============================================================================

/// Strategy for dot-separated field paths of one to three segments
fn path_strategy() -> impl Strategy<Value = String> {
	prop::collection::vec("[a-z]{1,6}", 1..=3).prop_map(|segments| segments.join("."))
}

/// Strategy for scalar field values
fn value_strategy() -> impl Strategy<Value = Value> {
	prop_oneof![
		Just(Value::Null),
		any::<bool>().prop_map(Value::from),
		any::<i64>().prop_map(Value::from),
		"[a-zA-Z0-9 ]{0,12}".prop_map(Value::from),
	]
}

fn apply(state: Arc<FormState>, action: Action) -> Arc<FormState> {
	IsolatedReducer::new(FormReducer).apply(&action, &state)
}

// =============================================================================
// Property Tests
// =============================================================================

proptest! {
	/// Property: the last change wins and the field is dirty
	#[test]
	fn test_register_then_changes_keep_last_value(
		path in path_strategy(),
		initial in value_strategy(),
		changes in prop::collection::vec(value_strategy(), 1..8),
	) {
		let mut state = apply(
			Arc::new(FormState::default()),
			Action::register(path.clone(), FieldRegistration::default(), initial),
		);
		for value in &changes {
			state = apply(state, Action::change(path.clone(), value.clone()));
		}

		prop_assert_eq!(state.value(&path), changes.last());
		prop_assert!(state.field(&path).map(|field| field.dirty).unwrap_or(false));
		prop_assert!(state.meta.dirty);
	}

	/// Property: updates of unregistered paths are identity
	#[test]
	fn test_update_of_unregistered_paths_is_identity(
		value in value_strategy(),
		ghost in path_strategy(),
	) {
		let state = apply(
			Arc::new(FormState::default()),
			Action::register("registered", FieldRegistration::default(), json!("kept")),
		);
		prop_assume!(ghost != "registered");

		let next = apply(Arc::clone(&state), Action::update(vec![ValueChange::new(ghost, value)]));

		prop_assert!(Arc::ptr_eq(&next, &state));
	}

	/// Property: reset restores defaults regardless of edits
	#[test]
	fn test_reset_restores_defaults(
		default_value in value_strategy(),
		edits in prop::collection::vec(value_strategy(), 0..5),
	) {
		let registration = FieldRegistration {
			default_value: default_value.clone(),
			..Default::default()
		};
		let mut state = apply(
			Arc::new(FormState::default()),
			Action::register("field", registration, default_value.clone()),
		);
		for value in edits {
			state = apply(state, Action::change("field", value));
		}

		let state = apply(state, Action::reset());

		prop_assert_eq!(state.value("field"), Some(&default_value));
		prop_assert!(!state.meta.dirty);
		prop_assert!(state.field("field").map(|field| !field.dirty).unwrap_or(false));
	}

	/// Property: unknown kinds never change state
	#[test]
	fn test_custom_actions_are_identity(kind in "[A-Z_]{1,12}", payload in value_strategy()) {
		let state = apply(
			Arc::new(FormState::default()),
			Action::register("field", FieldRegistration::default(), json!(1)),
		);

		let next = apply(Arc::clone(&state), Action::custom(kind, payload));

		prop_assert!(Arc::ptr_eq(&next, &state));
	}
}
