//! Debounced, switch-to-latest field validation
//!
//! A [`FieldPipeline`] listens for value changes of one field. Every change
//! starts a new generation: the pending timer or in-flight validation of the
//! previous generation is aborted, and a result is applied only if its
//! generation is still the latest when it completes.

use crate::field::{ValidationState, Validator};
use parking_lot::{Mutex, ReentrantMutex};
use reinhardt_formstate_core::{Action, FormError, Store, Subscription, required_error};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

struct Supervisor {
	path: String,
	store: Store,
	validator: Option<Arc<dyn Validator>>,
	debounce: Duration,
	runtime: Option<Handle>,
	generation: AtomicU64,
	alive: AtomicBool,
	pending: Mutex<Option<JoinHandle<()>>>,
	/// Held from the last liveness check through the result dispatch.
	gate: ReentrantMutex<()>,
	state: Mutex<ValidationState>,
}

impl Supervisor {
	fn trigger(self: &Arc<Self>) {
		if !self.alive.load(Ordering::Acquire) {
			return;
		}
		let Some(runtime) = self.runtime.clone().or_else(|| Handle::try_current().ok()) else {
			tracing::error!(field = %self.path, "no Tokio runtime available, field validation skipped");
			return;
		};

		let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
		*self.state.lock() = ValidationState::PendingDebounce;

		let supervisor = Arc::clone(self);
		let task = runtime.spawn(async move { supervisor.run(generation).await });
		if let Some(previous) = self.pending.lock().replace(task) {
			previous.abort();
		}
	}

	fn is_current(&self, generation: u64) -> bool {
		self.alive.load(Ordering::Acquire) && self.generation.load(Ordering::Acquire) == generation
	}

	async fn run(self: Arc<Self>, generation: u64) {
		tokio::time::sleep(self.debounce).await;
		if !self.is_current(generation) {
			return;
		}

		let (value, required) = {
			let state = self.store.get_state();
			let Some(meta) = state.field(&self.path) else {
				return;
			};
			let value = state.value(&self.path).cloned();
			let required = required_error(&self.path, meta, value.as_ref());
			(value, required)
		};

		*self.state.lock() = ValidationState::Validating;
		let error = match (required, &self.validator) {
			(Some(error), _) => Some(error),
			(None, Some(validator)) => validator
				.validate(value.as_ref().unwrap_or(&Value::Null))
				.await
				.err()
				.map(|message| FormError::field(self.path.clone(), message)),
			(None, None) => None,
		};

		let _gate = self.gate.lock();
		if !self.is_current(generation) {
			tracing::debug!(field = %self.path, generation, "stale validation result discarded");
			return;
		}

		match error {
			Some(error) => {
				*self.state.lock() = ValidationState::Invalid;
				self.store.dispatch(Action::throw_error(self.path.clone(), error));
			}
			None => {
				*self.state.lock() = ValidationState::Valid;
				let has_error = self
					.store
					.get_state()
					.field(&self.path)
					.is_some_and(|field| field.error.is_some());
				if has_error {
					self.store.dispatch(Action::clear_error(self.path.clone()));
				}
			}
		}
	}

	fn shutdown(&self) {
		self.alive.store(false, Ordering::Release);
		// Waits for a result that passed the liveness check to be dispatched.
		drop(self.gate.lock());
		if let Some(task) = self.pending.lock().take() {
			task.abort();
		}
	}
}

/// Validation supervisor of a single field.
pub(crate) struct FieldPipeline {
	supervisor: Arc<Supervisor>,
	subscription: Mutex<Option<Subscription>>,
}

impl FieldPipeline {
	pub(crate) fn spawn(
		store: Store,
		path: String,
		validator: Option<Arc<dyn Validator>>,
		debounce: Duration,
		runtime: Option<Handle>,
	) -> Self {
		let supervisor = Arc::new(Supervisor {
			path,
			store: store.clone(),
			validator,
			debounce,
			runtime,
			generation: AtomicU64::new(0),
			alive: AtomicBool::new(true),
			pending: Mutex::new(None),
			gate: ReentrantMutex::new(()),
			state: Mutex::new(ValidationState::Idle),
		});

		let listener: Weak<Supervisor> = Arc::downgrade(&supervisor);
		let subscription = store.subscribe(move |event| {
			let Some(supervisor) = listener.upgrade() else {
				return;
			};
			if event.action.touches(&supervisor.path) {
				supervisor.trigger();
			}
		});

		Self {
			supervisor,
			subscription: Mutex::new(Some(subscription)),
		}
	}

	pub(crate) fn state(&self) -> ValidationState {
		*self.supervisor.state.lock()
	}

	/// Stops listening and cancels pending work. No dispatch happens after
	/// this returns.
	pub(crate) fn teardown(&self) {
		self.supervisor.shutdown();
		if let Some(subscription) = self.subscription.lock().take() {
			subscription.unsubscribe();
		}
	}
}

impl Drop for FieldPipeline {
	fn drop(&mut self) {
		self.teardown();
	}
}
