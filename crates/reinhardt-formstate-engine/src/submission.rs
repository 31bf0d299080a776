//! Single-flight submission
//!
//! A submit request runs whole-form verification first. A form with errors is
//! rejected without ever entering the submitting state; otherwise the
//! submission is started, the `before_submit` and `on_submit` hooks are
//! awaited in order, and the outcome is committed and reported. Requests
//! arriving while a submission is in flight are dropped.

use futures::FutureExt;
use futures::future::BoxFuture;
use reinhardt_formstate_core::{
	Action, FormError, FormMeta, FormState, FormValues, Store, SubmitPhase, Subscription,
	verify_form,
};
use serde_json::Value;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::runtime::Handle;
use tokio::sync::{oneshot, watch};

/// Type alias for `before_submit` and `on_submit` hooks
pub type SubmitFn =
	Arc<dyn Fn(FormValues, FormMeta) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

/// Type alias for `on_success` callbacks
pub type SuccessFn = Arc<dyn Fn(FormValues, FormMeta, Value) -> BoxFuture<'static, ()> + Send + Sync>;

/// Type alias for `on_failed` callbacks
pub type FailedFn = Arc<dyn Fn(FormValues, FormMeta) -> BoxFuture<'static, ()> + Send + Sync>;

pub(crate) fn submit_fn<F, Fut>(hook: F) -> SubmitFn
where
	F: Fn(FormValues, FormMeta) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
	Arc::new(move |values, meta| Box::pin(hook(values, meta)))
}

pub(crate) fn success_fn<F, Fut>(hook: F) -> SuccessFn
where
	F: Fn(FormValues, FormMeta, Value) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = ()> + Send + 'static,
{
	Arc::new(move |values, meta, output| Box::pin(hook(values, meta, output)))
}

pub(crate) fn failed_fn<F, Fut>(hook: F) -> FailedFn
where
	F: Fn(FormValues, FormMeta) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = ()> + Send + 'static,
{
	Arc::new(move |values, meta| Box::pin(hook(values, meta)))
}

#[derive(Clone, Default)]
pub(crate) struct SubmitHooks {
	pub(crate) before_submit: Option<SubmitFn>,
	pub(crate) on_submit: Option<SubmitFn>,
	pub(crate) on_success: Option<SuccessFn>,
	pub(crate) on_failed: Option<FailedFn>,
}

/// Outcome of whole-form verification, decided against the latest state.
enum Verdict {
	Rejected(FormState),
	Started(FormState),
}

struct Machine {
	store: Store,
	hooks: SubmitHooks,
	runtime: Option<Handle>,
	in_flight: AtomicBool,
	busy: watch::Sender<bool>,
}

/// Resets the in-flight flag even if the submission task is aborted.
struct InFlightGuard(Arc<Machine>);

impl Drop for InFlightGuard {
	fn drop(&mut self) {
		self.0.in_flight.store(false, Ordering::Release);
		self.0.busy.send_replace(false);
	}
}

impl Machine {
	fn request(self: &Arc<Self>) {
		if self.in_flight.swap(true, Ordering::AcqRel) {
			tracing::debug!("submission already in flight, request dropped");
			return;
		}
		let Some(runtime) = self.runtime.clone().or_else(|| Handle::try_current().ok()) else {
			tracing::error!("no Tokio runtime available, submission skipped");
			self.in_flight.store(false, Ordering::Release);
			return;
		};

		self.busy.send_replace(true);
		// Runs inside the drain of the request, so the verdict is applied
		// before the requesting dispatch returns and ahead of later edits.
		let (verdict_tx, verdict_rx) = oneshot::channel();
		self.store.resolve(move |latest| match verify_form(latest) {
			Some(verified) => {
				let _ = verdict_tx.send(Verdict::Rejected(verified.clone()));
				(Action::submit_phase(SubmitPhase::Rejected), verified)
			}
			None => {
				let mut next = latest.clone();
				next.meta.submitting = true;
				let _ = verdict_tx.send(Verdict::Started(next.clone()));
				(Action::submit_phase(SubmitPhase::Started), next)
			}
		});

		let guard = InFlightGuard(Arc::clone(self));
		runtime.spawn(async move {
			guard.0.run(verdict_rx).await;
			drop(guard);
		});
	}

	async fn run(&self, verdict_rx: oneshot::Receiver<Verdict>) {
		let loading = match verdict_rx.await {
			Ok(Verdict::Started(loading)) => loading,
			Ok(Verdict::Rejected(verified)) => {
				tracing::debug!(errors = verified.meta.errors.len(), "submission rejected by verification");
				self.failed(verified.values, verified.meta).await;
				return;
			}
			Err(_) => {
				tracing::debug!("store closed before the submission started");
				return;
			}
		};

		match self.invoke(&loading).await {
			Ok(output) => {
				let settled = self
					.settle(SubmitPhase::Succeeded, |latest| {
						let mut next = latest.clone();
						next.meta.submitting = false;
						next.meta.errors.clear();
						next
					})
					.await;
				if let Some(on_success) = &self.hooks.on_success {
					let callback = on_success(settled.values, settled.meta, output);
					if AssertUnwindSafe(callback).catch_unwind().await.is_err() {
						tracing::error!("on_success callback panicked");
					}
				}
			}
			Err(err) => {
				let message = format!("{err:#}");
				tracing::debug!(error = %message, "submission failed");
				let settled = self
					.settle(SubmitPhase::Failed, move |latest| {
						let mut next = latest.clone();
						next.meta.submitting = false;
						next.meta.errors = vec![FormError::submission(message)];
						next
					})
					.await;
				self.failed(settled.values, settled.meta).await;
			}
		}
	}

	/// Commits `patch` over the latest state and returns the state it produced.
	async fn settle<F>(&self, phase: SubmitPhase, patch: F) -> FormState
	where
		F: FnOnce(&FormState) -> FormState + Send + 'static,
	{
		let (tx, rx) = oneshot::channel();
		self.store.commit_with(Action::submit_phase(phase), move |latest| {
			let next = patch(latest);
			let _ = tx.send(next.clone());
			next
		});
		match rx.await {
			Ok(settled) => settled,
			// Closed store or panicking patch.
			Err(_) => FormState::clone(&self.store.get_state()),
		}
	}

	async fn invoke(&self, loading: &FormState) -> anyhow::Result<Value> {
		if let Some(before_submit) = &self.hooks.before_submit {
			guarded(before_submit(loading.values.clone(), loading.meta.clone())).await?;
		}
		match &self.hooks.on_submit {
			Some(on_submit) => guarded(on_submit(loading.values.clone(), loading.meta.clone())).await,
			None => Ok(Value::Null),
		}
	}

	async fn failed(&self, values: FormValues, meta: FormMeta) {
		if let Some(on_failed) = &self.hooks.on_failed {
			if AssertUnwindSafe(on_failed(values, meta)).catch_unwind().await.is_err() {
				tracing::error!("on_failed callback panicked");
			}
		}
	}
}

async fn guarded(hook: BoxFuture<'static, anyhow::Result<Value>>) -> anyhow::Result<Value> {
	match AssertUnwindSafe(hook).catch_unwind().await {
		Ok(result) => result,
		Err(_) => Err(anyhow::anyhow!("submit hook panicked")),
	}
}

/// The submission state machine of one form.
pub(crate) struct Submission {
	machine: Arc<Machine>,
	_subscription: Subscription,
}

impl Submission {
	pub(crate) fn attach(store: &Store, hooks: SubmitHooks, runtime: Option<Handle>) -> Self {
		let (busy, _) = watch::channel(false);
		let machine = Arc::new(Machine {
			store: store.clone(),
			hooks,
			runtime,
			in_flight: AtomicBool::new(false),
			busy,
		});

		let listener = Arc::downgrade(&machine);
		let subscription = store.subscribe(move |event| {
			if event.action.submit_phase_of() != Some(SubmitPhase::Requested) {
				return;
			}
			if let Some(machine) = listener.upgrade() {
				machine.request();
			}
		});

		Self {
			machine,
			_subscription: subscription,
		}
	}

	pub(crate) fn in_flight(&self) -> bool {
		self.machine.in_flight.load(Ordering::Acquire)
	}

	/// Resolves once no submission is in flight.
	pub(crate) async fn settled(&self) {
		let mut busy = self.machine.busy.subscribe();
		// The sender lives as long as the machine.
		let _ = busy.wait_for(|busy| !*busy).await;
	}
}
