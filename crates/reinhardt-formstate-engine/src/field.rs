//! Field registration and per-field handles

use crate::pipeline::FieldPipeline;
use crate::watch::{self, FieldSnapshot};
use async_trait::async_trait;
use parking_lot::Mutex;
use reinhardt_formstate_core::{
	Action, FieldMeta, FieldMetaPatch, FieldRegistration, Store, Subscription,
};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

/// Asynchronous field validator
///
/// `Ok(())` if the value is acceptable, `Err(message)` otherwise. The message
/// becomes the field's error as is.
#[async_trait]
pub trait Validator: Send + Sync {
	async fn validate(&self, value: &Value) -> Result<(), String>;
}

struct FnValidator<F> {
	validate: F,
}

#[async_trait]
impl<F, Fut> Validator for FnValidator<F>
where
	F: Fn(Value) -> Fut + Send + Sync,
	Fut: Future<Output = Result<(), String>> + Send,
{
	async fn validate(&self, value: &Value) -> Result<(), String> {
		(self.validate)(value.clone()).await
	}
}

/// Wraps an async closure as a [`Validator`].
///
/// # Examples
///
/// ```
/// use reinhardt_formstate_engine::{Validator, validator_fn};
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let validator = validator_fn(|value| async move {
///     match value.as_str() {
///         Some(s) if s.contains('@') => Ok(()),
///         _ => Err("email is invalid".to_string()),
///     }
/// });
///
/// assert!(validator.validate(&json!("a@b.c")).await.is_ok());
/// assert_eq!(validator.validate(&json!("nope")).await, Err("email is invalid".into()));
/// # });
/// ```
pub fn validator_fn<F, Fut>(validate: F) -> Arc<dyn Validator>
where
	F: Fn(Value) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = Result<(), String>> + Send + 'static,
{
	Arc::new(FnValidator { validate })
}

/// Registration options of a field
///
/// # Examples
///
/// ```
/// use reinhardt_formstate_engine::FieldOptions;
/// use serde_json::json;
///
/// let options = FieldOptions::new()
///     .required(true)
///     .default_value(json!(""))
///     .display_name("E-mail");
///
/// assert!(options.is_required());
/// ```
#[derive(Clone, Default)]
pub struct FieldOptions {
	required: bool,
	default_value: Value,
	display_name: Option<String>,
	destroy_value_on_unmount: bool,
	validator: Option<Arc<dyn Validator>>,
}

impl FieldOptions {
	pub fn new() -> Self {
		Self::default()
	}

	/// Reject empty values
	pub fn required(mut self, required: bool) -> Self {
		self.required = required;
		self
	}

	/// Initial value, restored by a form reset
	pub fn default_value(mut self, value: impl Into<Value>) -> Self {
		self.default_value = value.into();
		self
	}

	/// Name used in error messages instead of the path
	pub fn display_name(mut self, name: impl Into<String>) -> Self {
		self.display_name = Some(name.into());
		self
	}

	/// Drop the field's value when the field is destroyed
	pub fn destroy_value_on_unmount(mut self, destroy: bool) -> Self {
		self.destroy_value_on_unmount = destroy;
		self
	}

	/// Custom validator run after the required check
	pub fn validator(mut self, validator: Arc<dyn Validator>) -> Self {
		self.validator = Some(validator);
		self
	}

	pub fn is_required(&self) -> bool {
		self.required
	}

	pub fn get_default_value(&self) -> &Value {
		&self.default_value
	}

	fn registration(&self) -> FieldRegistration {
		FieldRegistration {
			required: self.required,
			default_value: self.default_value.clone(),
			display_name: self.display_name.clone(),
			destroy_value_on_unmount: self.destroy_value_on_unmount,
		}
	}

	/// Constraints of `next` that differ from `self` and can be applied
	/// without registering again.
	fn meta_patch(&self, next: &Self) -> FieldMetaPatch {
		FieldMetaPatch {
			display_name: (self.display_name != next.display_name).then(|| next.display_name.clone()),
			destroy_value_on_unmount: (self.destroy_value_on_unmount != next.destroy_value_on_unmount)
				.then_some(next.destroy_value_on_unmount),
			..Default::default()
		}
	}

	fn needs_pipeline(&self) -> bool {
		self.required || self.validator.is_some()
	}

	fn same_validator(&self, other: &Self) -> bool {
		match (&self.validator, &other.validator) {
			(Some(a), Some(b)) => Arc::ptr_eq(a, b),
			(None, None) => true,
			_ => false,
		}
	}
}

impl fmt::Debug for FieldOptions {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("FieldOptions")
			.field("required", &self.required)
			.field("default_value", &self.default_value)
			.field("display_name", &self.display_name)
			.field("destroy_value_on_unmount", &self.destroy_value_on_unmount)
			.field("validator", &self.validator.is_some())
			.finish()
	}
}

/// Observable state of a field's validation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationState {
	/// No validation scheduled since registration.
	#[default]
	Idle,
	/// Waiting for the debounce window to elapse.
	PendingDebounce,
	/// Running the required check and the validator.
	Validating,
	/// The last validation passed.
	Valid,
	/// The last validation failed.
	Invalid,
}

pub(crate) struct FieldContext {
	pub(crate) store: Store,
	pub(crate) debounce: Duration,
	pub(crate) runtime: Option<Handle>,
}

/// A registered field.
///
/// Dropping the handle destroys the field.
pub struct FieldHandle {
	name: String,
	context: FieldContext,
	options: Mutex<FieldOptions>,
	pipeline: Mutex<Option<FieldPipeline>>,
	destroyed: Mutex<bool>,
}

impl FieldHandle {
	pub(crate) fn register(name: String, options: FieldOptions, context: FieldContext) -> Self {
		context.store.dispatch(Action::register(
			name.clone(),
			options.registration(),
			options.default_value.clone(),
		));
		let pipeline = Self::pipeline_for(&name, &options, &context);
		tracing::debug!(field = %name, validated = pipeline.is_some(), "field registered");

		Self {
			name,
			context,
			options: Mutex::new(options),
			pipeline: Mutex::new(pipeline),
			destroyed: Mutex::new(false),
		}
	}

	fn pipeline_for(name: &str, options: &FieldOptions, context: &FieldContext) -> Option<FieldPipeline> {
		options.needs_pipeline().then(|| {
			FieldPipeline::spawn(
				context.store.clone(),
				name.to_string(),
				options.validator.clone(),
				context.debounce,
				context.runtime.clone(),
			)
		})
	}

	/// Full path of the field.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Current value.
	pub fn value(&self) -> Option<Value> {
		self.context.store.get_state().value(&self.name).cloned()
	}

	/// Current meta, `None` once destroyed.
	pub fn meta(&self) -> Option<FieldMeta> {
		self.context.store.get_state().field(&self.name).cloned()
	}

	/// Sets the value, marking the field dirty.
	pub fn on_change(&self, value: impl Into<Value>) {
		self.context
			.store
			.dispatch(Action::change(self.name.clone(), value.into()));
	}

	/// Sets the value and merges `patch` into the field meta.
	pub fn on_change_with(&self, value: impl Into<Value>, patch: FieldMetaPatch) {
		self.context
			.store
			.dispatch(Action::change_with(self.name.clone(), patch, value.into()));
	}

	/// Replaces the registration options.
	///
	/// The field is registered again, resetting its value to the default,
	/// only when `required` or the default value differ from the current
	/// options. A new display name or unmount flag alone is merged into the
	/// stored meta. The validation pipeline is rebuilt when the validator or the
	/// need for validation changed.
	pub fn update_constraints(&self, options: FieldOptions) {
		if self.is_destroyed() {
			return;
		}
		let mut current = self.options.lock();

		if current.required != options.required || current.default_value != options.default_value {
			self.context.store.dispatch(Action::register(
				self.name.clone(),
				options.registration(),
				options.default_value.clone(),
			));
		} else {
			let patch = current.meta_patch(&options);
			if !patch.is_empty() {
				self.context
					.store
					.dispatch(Action::configure(self.name.clone(), patch));
			}
		}

		if current.needs_pipeline() != options.needs_pipeline() || !current.same_validator(&options) {
			let replacement = Self::pipeline_for(&self.name, &options, &self.context);
			if let Some(previous) = std::mem::replace(&mut *self.pipeline.lock(), replacement) {
				previous.teardown();
			}
		}

		*current = options;
	}

	/// Calls `callback` with the current snapshot, then with every distinct
	/// value/meta snapshot of this field.
	pub fn watch<F>(&self, callback: F) -> Subscription
	where
		F: Fn(&FieldSnapshot) + Send + Sync + 'static,
	{
		let name = self.name.clone();
		watch::distinct(
			&self.context.store,
			move |state| FieldSnapshot {
				value: state.value(&name).cloned(),
				meta: state.field(&name).cloned(),
			},
			|next, prev| next != prev,
			callback,
		)
	}

	/// Current state of the validation pipeline.
	pub fn validation_state(&self) -> ValidationState {
		self.pipeline
			.lock()
			.as_ref()
			.map(FieldPipeline::state)
			.unwrap_or_default()
	}

	/// Unregisters the field and stops its validation.
	///
	/// Idempotent.
	pub fn destroy(&self) {
		{
			let mut destroyed = self.destroyed.lock();
			if *destroyed {
				return;
			}
			*destroyed = true;
		}

		if let Some(pipeline) = self.pipeline.lock().take() {
			pipeline.teardown();
		}
		if self.context.store.is_closed() {
			return;
		}

		let destroy_value = self.options.lock().destroy_value_on_unmount;
		self.context
			.store
			.dispatch(Action::destroy(self.name.clone(), destroy_value));
		tracing::debug!(field = %self.name, destroy_value, "field destroyed");
	}

	pub fn is_destroyed(&self) -> bool {
		*self.destroyed.lock()
	}
}

impl Drop for FieldHandle {
	fn drop(&mut self) {
		self.destroy();
	}
}

impl fmt::Debug for FieldHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("FieldHandle")
			.field("name", &self.name)
			.field("options", &*self.options.lock())
			.field("validation_state", &self.validation_state())
			.finish()
	}
}
