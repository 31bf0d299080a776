//! Reducer: the only place where form state changes shape
//!
//! [`FormReducer`] is a pure function of `(action, state)`. Transitions are
//! copy-on-write: the input `Arc<FormState>` is never mutated, a transition
//! that changes nothing hands back the same `Arc`.
//!
//! [`IsolatedReducer`] wraps any reducer so that a failing or panicking
//! transition is logged and the previous state is kept.

use crate::action::{Action, FieldAction, FormAction};
use crate::error::{ReduceError, ReduceResult};
use crate::state::FormState;
use crate::values::{ValueChange, split_path};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

/// A state transition function.
pub trait Reducer: Send + Sync {
	/// Computes the state that follows `state` under `action`.
	///
	/// # Errors
	///
	/// Returns [`ReduceError`] when the action cannot be applied.
	fn reduce(&self, action: &Action, state: &Arc<FormState>) -> ReduceResult<Arc<FormState>>;
}

impl<R: Reducer + ?Sized> Reducer for Box<R> {
	fn reduce(&self, action: &Action, state: &Arc<FormState>) -> ReduceResult<Arc<FormState>> {
		(**self).reduce(action, state)
	}
}

impl<R: Reducer + ?Sized> Reducer for Arc<R> {
	fn reduce(&self, action: &Action, state: &Arc<FormState>) -> ReduceResult<Arc<FormState>> {
		(**self).reduce(action, state)
	}
}

/// The form reducer.
///
/// # Examples
///
/// ```
/// use reinhardt_formstate_core::{Action, FieldRegistration, FormReducer, FormState, Reducer};
/// use serde_json::json;
/// use std::sync::Arc;
///
/// let state = Arc::new(FormState::default());
/// let state = FormReducer
///     .reduce(&Action::register("email", FieldRegistration::default(), json!("")), &state)
///     .unwrap();
/// let state = FormReducer
///     .reduce(&Action::change("email", json!("a@b.c")), &state)
///     .unwrap();
///
/// assert_eq!(state.value("email"), Some(&json!("a@b.c")));
/// assert!(state.field("email").unwrap().dirty);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct FormReducer;

impl Reducer for FormReducer {
	fn reduce(&self, action: &Action, state: &Arc<FormState>) -> ReduceResult<Arc<FormState>> {
		let next = match action {
			Action::Field(action) => reduce_field(action, state)?,
			Action::Form(action) => reduce_form(action, state)?,
			Action::Custom { .. } => None,
		};

		Ok(match next {
			Some(mut next) => {
				next.refresh_derived();
				Arc::new(next)
			}
			None => Arc::clone(state),
		})
	}
}

/// `None` means identity.
fn reduce_field(action: &FieldAction, state: &FormState) -> ReduceResult<Option<FormState>> {
	split_path(action.name())?;

	let next = match action {
		FieldAction::Register {
			name,
			registration,
			value,
		} => {
			let mut next = state.clone();
			next.fields.insert(name.clone(), registration.clone().into_meta());
			next.values.set(name, value.clone())?;
			Some(next)
		}
		FieldAction::Change { name, patch, value } => {
			let mut next = state.clone();
			let field = next.fields.entry(name.clone()).or_default();
			field.apply_patch(patch);
			field.dirty = true;
			next.values.set(name, value.clone())?;
			Some(next)
		}
		FieldAction::Destroy {
			name,
			destroy_value_on_unmount,
		} => {
			let mut next = state.clone();
			next.fields.remove(name);
			if *destroy_value_on_unmount {
				next.values.remove(name);
			}
			Some(next)
		}
		FieldAction::Configure { name, patch } => {
			if !state.is_registered(name) || patch.is_empty() {
				return Ok(None);
			}
			let mut next = state.clone();
			if let Some(field) = next.fields.get_mut(name) {
				field.apply_patch(patch);
			}
			Some(next)
		}
		FieldAction::ThrowError { name, error } => {
			if !state.is_registered(name) {
				return Ok(None);
			}
			let mut next = state.clone();
			if let Some(field) = next.fields.get_mut(name) {
				field.error = Some(error.clone());
			}
			Some(next)
		}
		FieldAction::ClearError { name } => {
			if !state.is_registered(name) {
				return Ok(None);
			}
			let mut next = state.clone();
			if let Some(field) = next.fields.get_mut(name) {
				field.error = None;
			}
			Some(next)
		}
	};
	Ok(next)
}

fn reduce_form(action: &FormAction, state: &FormState) -> ReduceResult<Option<FormState>> {
	match action {
		FormAction::Init => Ok(Some(FormState::default())),
		FormAction::Update { changes } => reduce_update(changes, state),
		FormAction::Reset => {
			let mut next = state.clone();
			for (path, field) in next.fields.iter_mut() {
				field.dirty = false;
				field.error = None;
				next.values.set(path, field.default_value.clone())?;
			}
			next.meta.submitting = false;
			next.meta.errors.clear();
			Ok(Some(next))
		}
		// Submission snapshots arrive through `Store::commit`.
		FormAction::Submit { .. } => Ok(None),
	}
}

fn reduce_update(changes: &[ValueChange], state: &FormState) -> ReduceResult<Option<FormState>> {
	for change in changes {
		split_path(&change.path)?;
	}

	let mut applicable = changes
		.iter()
		.filter(|change| state.is_registered(&change.path))
		.peekable();
	if applicable.peek().is_none() {
		return Ok(None);
	}

	let mut next = state.clone();
	for change in applicable {
		next.values.set(&change.path, change.value.clone())?;
		if let Some(field) = next.fields.get_mut(&change.path) {
			field.dirty = true;
		}
	}
	Ok(Some(next))
}

/// Error-isolating decorator.
///
/// Any `Err` or panic raised by the inner reducer is logged and the previous
/// state is returned unchanged, so a malformed action can never corrupt the
/// store.
///
/// # Examples
///
/// ```
/// use reinhardt_formstate_core::{Action, FormReducer, FormState, IsolatedReducer};
/// use std::sync::Arc;
///
/// let reducer = IsolatedReducer::new(FormReducer);
/// let state = Arc::new(FormState::default());
///
/// let next = reducer.apply(&Action::change("a..b", serde_json::json!(1)), &state);
/// assert!(Arc::ptr_eq(&next, &state));
/// ```
pub struct IsolatedReducer<R> {
	inner: R,
}

impl<R: Reducer> IsolatedReducer<R> {
	/// Wraps `inner`.
	pub fn new(inner: R) -> Self {
		Self { inner }
	}

	/// Applies `action`, falling back to `state` on failure.
	pub fn apply(&self, action: &Action, state: &Arc<FormState>) -> Arc<FormState> {
		match self.try_apply(action, state) {
			Ok(next) => next,
			Err(err) => {
				tracing::error!(action = action.kind(), error = %err, "form transition failed, keeping previous state");
				Arc::clone(state)
			}
		}
	}

	/// Applies `action`, converting panics into [`ReduceError`]s.
	///
	/// # Errors
	///
	/// Returns the inner reducer's error, or an
	/// [`ReduceError::InvalidActionPayload`] describing a panic.
	pub fn try_apply(&self, action: &Action, state: &Arc<FormState>) -> ReduceResult<Arc<FormState>> {
		match catch_unwind(AssertUnwindSafe(|| self.inner.reduce(action, state))) {
			Ok(result) => result,
			Err(panic) => {
				let message = panic
					.downcast_ref::<&str>()
					.map(|s| (*s).to_string())
					.or_else(|| panic.downcast_ref::<String>().cloned())
					.unwrap_or_else(|| "reducer panicked".to_string());
				Err(ReduceError::InvalidActionPayload(message))
			}
		}
	}

	/// Returns the wrapped reducer.
	pub fn inner(&self) -> &R {
		&self.inner
	}
}

impl<R: Reducer> Reducer for IsolatedReducer<R> {
	fn reduce(&self, action: &Action, state: &Arc<FormState>) -> ReduceResult<Arc<FormState>> {
		Ok(self.apply(action, state))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::FormError;
	use crate::state::{FieldMetaPatch, FieldRegistration};
	use rstest::{fixture, rstest};
	use serde_json::{Value, json};

	fn reduce(state: &Arc<FormState>, action: Action) -> Arc<FormState> {
		FormReducer.reduce(&action, state).unwrap()
	}

	fn registration(required: bool, default_value: Value) -> FieldRegistration {
		FieldRegistration {
			required,
			default_value,
			..Default::default()
		}
	}

	#[fixture]
	fn email_form() -> Arc<FormState> {
		let state = Arc::new(FormState::default());
		reduce(
			&state,
			Action::register("email", registration(true, json!("")), json!("")),
		)
	}

	#[rstest]
	fn test_register_inserts_clean_field(email_form: Arc<FormState>) {
		let field = email_form.field("email").unwrap();

		assert!(!field.dirty);
		assert!(field.required);
		assert_eq!(email_form.value("email"), Some(&json!("")));
		assert!(!email_form.meta.dirty);
	}

	#[rstest]
	fn test_register_overwrites_previous_meta(email_form: Arc<FormState>) {
		// Arrange
		let dirty = reduce(&email_form, Action::change("email", json!("x")));
		let errored = reduce(
			&dirty,
			Action::throw_error("email", FormError::field("email", "bad")),
		);

		// Act
		let state = reduce(
			&errored,
			Action::register("email", registration(false, json!("d")), json!("d")),
		);

		// Assert
		let field = state.field("email").unwrap();
		assert!(!field.dirty);
		assert!(!field.required);
		assert_eq!(field.error, None);
		assert_eq!(state.value("email"), Some(&json!("d")));
	}

	#[rstest]
	fn test_configure_merges_meta_without_dirtying(email_form: Arc<FormState>) {
		// Arrange
		let patch = FieldMetaPatch {
			display_name: Some(Some("E-mail".into())),
			..Default::default()
		};

		// Act
		let state = reduce(&email_form, Action::configure("email", patch.clone()));
		let ghost = reduce(&email_form, Action::configure("ghost", patch));

		// Assert
		let field = state.field("email").unwrap();
		assert_eq!(field.display_name.as_deref(), Some("E-mail"));
		assert!(!field.dirty);
		assert_eq!(state.value("email"), Some(&json!("")));
		assert!(Arc::ptr_eq(&ghost, &email_form));
	}

	#[rstest]
	fn test_change_marks_dirty_and_merges_patch(email_form: Arc<FormState>) {
		let patch = FieldMetaPatch {
			display_name: Some(Some("E-mail".into())),
			..Default::default()
		};

		let state = reduce(&email_form, Action::change_with("email", patch, json!("a@b.c")));

		let field = state.field("email").unwrap();
		assert!(field.dirty);
		assert!(field.required);
		assert_eq!(field.display_name.as_deref(), Some("E-mail"));
		assert_eq!(state.value("email"), Some(&json!("a@b.c")));
		assert!(state.meta.dirty);
	}

	#[rstest]
	fn test_change_does_not_mutate_input(email_form: Arc<FormState>) {
		let before = (*email_form).clone();

		let _ = reduce(&email_form, Action::change("email", json!("x")));

		assert_eq!(*email_form, before);
	}

	#[rstest]
	#[case(true, None)]
	#[case(false, Some(json!("kept")))]
	fn test_destroy_respects_value_flag(
		email_form: Arc<FormState>,
		#[case] destroy_value: bool,
		#[case] expected: Option<Value>,
	) {
		// Arrange
		let state = reduce(&email_form, Action::change("email", json!("kept")));

		// Act
		let state = reduce(&state, Action::destroy("email", destroy_value));

		// Assert
		assert!(!state.is_registered("email"));
		assert_eq!(state.value("email").cloned(), expected);
	}

	#[rstest]
	fn test_throw_and_clear_error(email_form: Arc<FormState>) {
		let error = FormError::field("email", "email is invalid");

		let errored = reduce(&email_form, Action::throw_error("email", error.clone()));
		assert_eq!(errored.field("email").unwrap().error, Some(error));
		assert_eq!(errored.values, email_form.values);

		let cleared = reduce(&errored, Action::clear_error("email"));
		assert_eq!(cleared.field("email").unwrap().error, None);
	}

	#[rstest]
	fn test_error_actions_ignore_unregistered_fields(email_form: Arc<FormState>) {
		let thrown = reduce(
			&email_form,
			Action::throw_error("ghost", FormError::field("ghost", "boo")),
		);
		let cleared = reduce(&email_form, Action::clear_error("ghost"));

		assert!(Arc::ptr_eq(&thrown, &email_form));
		assert!(Arc::ptr_eq(&cleared, &email_form));
	}

	#[rstest]
	fn test_update_only_touches_registered_paths(email_form: Arc<FormState>) {
		// Act
		let state = reduce(
			&email_form,
			Action::update(vec![
				ValueChange::new("email", "a@b.c"),
				ValueChange::new("ghost", "boo"),
			]),
		);

		// Assert
		assert_eq!(state.value("email"), Some(&json!("a@b.c")));
		assert!(state.field("email").unwrap().dirty);
		assert_eq!(state.value("ghost"), None);
		assert!(!state.is_registered("ghost"));
	}

	#[rstest]
	fn test_update_of_unregistered_path_is_identity(email_form: Arc<FormState>) {
		let state = reduce(&email_form, Action::update(vec![ValueChange::new("ghost", 1)]));

		assert!(Arc::ptr_eq(&state, &email_form));
		assert_eq!(state.values, email_form.values);
	}

	#[rstest]
	fn test_update_with_malformed_path_fails(email_form: Arc<FormState>) {
		let result = FormReducer.reduce(
			&Action::update(vec![ValueChange::new("email..x", 1)]),
			&email_form,
		);

		assert!(matches!(result, Err(ReduceError::InvalidActionPayload(_))));
	}

	#[rstest]
	fn test_change_past_array_end_keeps_previous_state() {
		// Arrange
		let state = reduce(
			&Arc::new(FormState::default()),
			Action::register("tags", registration(false, json!([])), json!(["a"])),
		);
		let isolated = IsolatedReducer::new(FormReducer);

		// Act
		let direct = FormReducer.reduce(&Action::change("tags.1000000000000", json!("x")), &state);
		let absorbed = isolated.apply(&Action::change("tags.1000000000000", json!("x")), &state);

		// Assert
		assert!(matches!(direct, Err(ReduceError::InvalidActionPayload(_))));
		assert!(Arc::ptr_eq(&absorbed, &state));
		assert_eq!(absorbed.value("tags"), Some(&json!(["a"])));
	}

	#[rstest]
	fn test_reset_restores_defaults_and_keeps_fields() {
		// Arrange
		let state = Arc::new(FormState::default());
		let state = reduce(
			&state,
			Action::register("name", registration(false, json!("anon")), json!("anon")),
		);
		let state = reduce(&state, Action::change("name", json!("Ada")));
		let state = reduce(
			&state,
			Action::throw_error("name", FormError::field("name", "bad")),
		);
		let mut submitted = (*state).clone();
		submitted.meta.submitting = true;
		submitted.meta.errors.push(FormError::submission("offline"));
		let state = Arc::new(submitted);

		// Act
		let state = reduce(&state, Action::reset());

		// Assert
		let field = state.field("name").unwrap();
		assert!(state.is_registered("name"));
		assert_eq!(state.value("name"), Some(&json!("anon")));
		assert!(!field.dirty);
		assert_eq!(field.error, None);
		assert!(!state.meta.submitting);
		assert!(state.meta.errors.is_empty());
		assert!(!state.meta.dirty);
	}

	#[rstest]
	fn test_init_restores_empty_state(email_form: Arc<FormState>) {
		let state = reduce(&email_form, Action::init());

		assert_eq!(*state, FormState::default());
	}

	#[rstest]
	#[case(Action::custom("FOCUS", json!({"name": "email"})))]
	#[case(Action::submit())]
	fn test_uninterpreted_actions_are_identity(email_form: Arc<FormState>, #[case] action: Action) {
		let state = reduce(&email_form, action);

		assert!(Arc::ptr_eq(&state, &email_form));
	}

	struct PanickingReducer;

	impl Reducer for PanickingReducer {
		fn reduce(&self, _action: &Action, _state: &Arc<FormState>) -> ReduceResult<Arc<FormState>> {
			panic!("boom");
		}
	}

	#[rstest]
	fn test_isolated_reducer_absorbs_panics(email_form: Arc<FormState>) {
		let reducer = IsolatedReducer::new(PanickingReducer);

		let state = reducer.apply(&Action::reset(), &email_form);

		assert!(Arc::ptr_eq(&state, &email_form));
		assert_eq!(
			reducer.try_apply(&Action::reset(), &email_form),
			Err(ReduceError::InvalidActionPayload("boom".into()))
		);
	}

	#[rstest]
	fn test_isolated_reducer_absorbs_errors(email_form: Arc<FormState>) {
		let reducer = IsolatedReducer::new(FormReducer);

		let state = reducer.apply(&Action::register("", FieldRegistration::default(), json!(1)), &email_form);

		assert!(Arc::ptr_eq(&state, &email_form));
	}
}
