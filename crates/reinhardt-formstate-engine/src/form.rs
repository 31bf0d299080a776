//! The form handle

use crate::field::{FieldContext, FieldHandle, FieldOptions};
use crate::section::FormSection;
use crate::submission::{SubmitHooks, Submission, failed_fn, submit_fn, success_fn};
use crate::watch::{self, FieldChange};
use reinhardt_formstate_core::{
	Action, FormConfig, FormMeta, FormState, FormValues, Store, StoreEvent, Subscription,
	TraceHook, ValueChange,
};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Handle;

/// Builder for [`Form`]
///
/// # Examples
///
/// ```
/// use reinhardt_formstate_core::FormConfig;
/// use reinhardt_formstate_engine::Form;
/// use std::time::Duration;
///
/// let form = Form::builder()
///     .config(FormConfig::new().with_debounce(Duration::from_millis(100)))
///     .on_submit(|values, _meta| async move { Ok::<_, anyhow::Error>(values.to_value()) })
///     .on_failed(|_values, meta| async move {
///         eprintln!("submission failed: {:?}", meta.errors);
///     })
///     .build();
///
/// assert_eq!(form.config().debounce(), Duration::from_millis(100));
/// ```
#[derive(Default)]
pub struct FormBuilder {
	config: FormConfig,
	hooks: SubmitHooks,
	trace: Option<TraceHook>,
}

impl FormBuilder {
	pub fn config(mut self, config: FormConfig) -> Self {
		self.config = config;
		self
	}

	/// Hook awaited before `on_submit`. An error fails the submission.
	pub fn before_submit<F, Fut>(mut self, hook: F) -> Self
	where
		F: Fn(FormValues, FormMeta) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
	{
		self.hooks.before_submit = Some(submit_fn(hook));
		self
	}

	/// The submit handler. Its output is handed to `on_success`.
	pub fn on_submit<F, Fut>(mut self, hook: F) -> Self
	where
		F: Fn(FormValues, FormMeta) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
	{
		self.hooks.on_submit = Some(submit_fn(hook));
		self
	}

	pub fn on_success<F, Fut>(mut self, hook: F) -> Self
	where
		F: Fn(FormValues, FormMeta, Value) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = ()> + Send + 'static,
	{
		self.hooks.on_success = Some(success_fn(hook));
		self
	}

	/// Called for rejected and failed submissions.
	pub fn on_failed<F, Fut>(mut self, hook: F) -> Self
	where
		F: Fn(FormValues, FormMeta) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = ()> + Send + 'static,
	{
		self.hooks.on_failed = Some(failed_fn(hook));
		self
	}

	/// Transition hook called with `(previous, action, next)`.
	pub fn trace(mut self, hook: TraceHook) -> Self {
		self.trace = Some(hook);
		self
	}

	/// Builds the form.
	///
	/// The Tokio runtime current at this point, if any, drives validation
	/// and submission tasks; otherwise the runtime current at trigger time
	/// is used.
	pub fn build(self) -> Form {
		let mut store = Store::builder().with_trace_transitions(self.config.trace_transitions());
		if let Some(trace) = self.trace {
			store = store.with_trace_hook(trace);
		}
		let store = store.build();
		let runtime = Handle::try_current().ok();
		let submission = Submission::attach(&store, self.hooks, runtime.clone());

		Form {
			shared: Arc::new(FormShared {
				store,
				config: self.config,
				runtime,
				submission,
			}),
		}
	}
}

struct FormShared {
	store: Store,
	config: FormConfig,
	runtime: Option<Handle>,
	submission: Submission,
}

impl Drop for FormShared {
	fn drop(&mut self) {
		self.store.cleanup();
	}
}

/// A form engine instance.
///
/// Cloning yields another handle to the same form. Dropping the last handle
/// cleans the store up.
///
/// # Examples
///
/// ```
/// use reinhardt_formstate_engine::{FieldOptions, Form};
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let form = Form::builder().build();
/// let email = form.register("email", FieldOptions::new().default_value(""));
///
/// email.on_change("a@b.c");
///
/// assert_eq!(form.state().values.to_value(), json!({"email": "a@b.c"}));
/// assert!(form.state().meta.dirty);
/// # });
/// ```
#[derive(Clone)]
pub struct Form {
	shared: Arc<FormShared>,
}

impl Form {
	pub fn builder() -> FormBuilder {
		FormBuilder::default()
	}

	/// Creates a form with default configuration and no hooks.
	pub fn new() -> Self {
		Self::builder().build()
	}

	pub fn config(&self) -> &FormConfig {
		&self.shared.config
	}

	/// The underlying store.
	pub fn store(&self) -> &Store {
		&self.shared.store
	}

	/// Current state.
	pub fn state(&self) -> Arc<FormState> {
		self.shared.store.get_state()
	}

	pub fn dispatch(&self, action: Action) {
		self.shared.store.dispatch(action);
	}

	/// Registers `observer` for every `(action, state)` broadcast.
	pub fn subscribe<F>(&self, observer: F) -> Subscription
	where
		F: Fn(&StoreEvent) + Send + Sync + 'static,
	{
		self.shared.store.subscribe(observer)
	}

	/// Requests a submission. Ignored while one is in flight.
	pub fn submit(&self) {
		self.dispatch(Action::submit());
	}

	/// Returns true while a submission is in flight.
	pub fn is_submitting(&self) -> bool {
		self.shared.submission.in_flight()
	}

	/// Resolves once no submission is in flight.
	pub async fn settled(&self) {
		self.shared.submission.settled().await;
	}

	/// Restores every field to its default value.
	pub fn reset_form(&self) {
		self.dispatch(Action::reset());
	}

	/// Sets the values of registered fields. Other paths are ignored.
	pub fn update_form_values(&self, changes: Vec<ValueChange>) {
		self.dispatch(Action::update(changes));
	}

	/// Registers a field at `name`.
	pub fn register(&self, name: impl Into<String>, options: FieldOptions) -> FieldHandle {
		FieldHandle::register(name.into(), options, self.field_context())
	}

	/// Opens a section whose fields are registered under `prefix`.
	pub fn section(&self, prefix: impl Into<String>) -> FormSection {
		FormSection::new(self.clone(), prefix.into())
	}

	/// Calls `callback` with the current values, then whenever they change.
	pub fn watch_values<F>(&self, callback: F) -> Subscription
	where
		F: Fn(&FormValues) + Send + Sync + 'static,
	{
		watch::watch_values(&self.shared.store, |next, prev| next != prev, callback)
	}

	/// Like [`watch_values`](Self::watch_values), notifying only when
	/// `filter(next, prev)` returns true.
	pub fn watch_values_filtered<P, F>(&self, filter: P, callback: F) -> Subscription
	where
		P: Fn(&FormValues, &FormValues) -> bool + Send + Sync + 'static,
		F: Fn(&FormValues) + Send + Sync + 'static,
	{
		watch::watch_values(&self.shared.store, filter, callback)
	}

	/// Calls `callback` with the current meta, then whenever it changes.
	pub fn watch_meta<F>(&self, callback: F) -> Subscription
	where
		F: Fn(&FormMeta) + Send + Sync + 'static,
	{
		watch::watch_meta(&self.shared.store, callback)
	}

	/// Calls `callback` for every distinct field change.
	pub fn on_field_change<F>(&self, callback: F) -> Subscription
	where
		F: Fn(FieldChange) + Send + Sync + 'static,
	{
		watch::on_field_change(&self.shared.store, callback)
	}

	/// Releases subscribers and stops further processing. Idempotent.
	pub fn cleanup(&self) {
		self.shared.store.cleanup();
	}

	fn field_context(&self) -> FieldContext {
		FieldContext {
			store: self.shared.store.clone(),
			debounce: self.shared.config.debounce(),
			runtime: self.shared.runtime.clone(),
		}
	}
}

impl Default for Form {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Debug for Form {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Form")
			.field("config", &self.shared.config)
			.field("store", &self.shared.store)
			.field("submitting", &self.is_submitting())
			.finish()
	}
}
