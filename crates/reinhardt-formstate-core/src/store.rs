//! Serializing store
//!
//! The [`Store`] owns the canonical [`FormState`]. Every write goes through a
//! single FIFO queue: `dispatch` runs the reducer, `commit`/`commit_with`
//! inject a state computed elsewhere and `resolve` lets a patch choose the
//! action too. Whoever finds the queue idle drains it;
//! writes issued while a broadcast is being delivered (from a subscriber, or
//! from another thread) are processed after that broadcast completes, so
//! subscribers observe `(action, state)` pairs in processing order.

use crate::action::Action;
use crate::reducer::{FormReducer, IsolatedReducer, Reducer};
use crate::state::FormState;
use futures::{Stream, StreamExt};
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// One broadcast: the processed action and the state it produced.
#[derive(Debug, Clone)]
pub struct StoreEvent {
	pub action: Arc<Action>,
	pub state: Arc<FormState>,
}

/// Type alias for subscriber callbacks
pub type Observer = Arc<dyn Fn(&StoreEvent) + Send + Sync>;

/// Called with `(previous, action, next)` after every processed write.
pub type TraceHook = Arc<dyn Fn(&FormState, &Action, &FormState) + Send + Sync>;

/// Type alias for state patches applied by `commit_with`
type PatchFn = Box<dyn FnOnce(&FormState) -> FormState + Send>;

/// Type alias for patches applied by `resolve`, which also pick the action
type ResolveFn = Box<dyn FnOnce(&FormState) -> (Action, FormState) + Send>;

enum Write {
	Reduce(Action),
	Commit(Action, PatchFn),
	Resolve(ResolveFn),
}

impl Write {
	fn kind(&self) -> &str {
		match self {
			Self::Reduce(action) | Self::Commit(action, _) => action.kind(),
			Self::Resolve(_) => "<resolve>",
		}
	}
}

struct StoreInner {
	state: RwLock<Arc<FormState>>,
	queue: Mutex<VecDeque<Write>>,
	draining: AtomicBool,
	closed: AtomicBool,
	subscribers: RwLock<Vec<(u64, Observer)>>,
	next_subscriber: AtomicU64,
	observed: Mutex<Vec<JoinHandle<()>>>,
	reducer: IsolatedReducer<Box<dyn Reducer>>,
	trace_hook: Option<TraceHook>,
	trace_transitions: bool,
}

/// Builder for [`Store`].
///
/// # Examples
///
/// ```
/// use reinhardt_formstate_core::{Action, Store};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// let traced = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&traced);
/// let store = Store::builder()
///     .with_trace_hook(Arc::new(move |_prev, _action, _next| {
///         counter.fetch_add(1, Ordering::SeqCst);
///     }))
///     .build();
///
/// store.dispatch(Action::reset());
/// assert_eq!(traced.load(Ordering::SeqCst), 1);
/// ```
pub struct StoreBuilder {
	reducer: Box<dyn Reducer>,
	initial_state: FormState,
	trace_hook: Option<TraceHook>,
	trace_transitions: bool,
}

impl StoreBuilder {
	/// Replaces the reducer. Defaults to [`FormReducer`].
	pub fn with_reducer<R: Reducer + 'static>(mut self, reducer: R) -> Self {
		self.reducer = Box::new(reducer);
		self
	}

	/// Sets the state the store starts from.
	pub fn with_initial_state(mut self, state: FormState) -> Self {
		self.initial_state = state;
		self
	}

	/// Installs a transition hook.
	pub fn with_trace_hook(mut self, hook: TraceHook) -> Self {
		self.trace_hook = Some(hook);
		self
	}

	/// Logs every transition at debug level.
	pub fn with_trace_transitions(mut self, enabled: bool) -> Self {
		self.trace_transitions = enabled;
		self
	}

	pub fn build(self) -> Store {
		let mut initial_state = self.initial_state;
		initial_state.refresh_derived();
		Store {
			inner: Arc::new(StoreInner {
				state: RwLock::new(Arc::new(initial_state)),
				queue: Mutex::new(VecDeque::new()),
				draining: AtomicBool::new(false),
				closed: AtomicBool::new(false),
				subscribers: RwLock::new(Vec::new()),
				next_subscriber: AtomicU64::new(0),
				observed: Mutex::new(Vec::new()),
				reducer: IsolatedReducer::new(self.reducer),
				trace_hook: self.trace_hook,
				trace_transitions: self.trace_transitions,
			}),
		}
	}
}

impl Default for StoreBuilder {
	fn default() -> Self {
		Self {
			reducer: Box::new(FormReducer),
			initial_state: FormState::default(),
			trace_hook: None,
			trace_transitions: false,
		}
	}
}

/// The central form store.
///
/// Cloning a `Store` yields another handle to the same state.
///
/// # Examples
///
/// ```
/// use reinhardt_formstate_core::{Action, FieldRegistration, Store};
/// use serde_json::json;
/// use std::sync::Arc;
/// use parking_lot::Mutex;
///
/// let store = Store::new();
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink = Arc::clone(&seen);
/// let _subscription = store.subscribe(move |event| {
///     sink.lock().push(event.action.kind().to_string());
/// });
///
/// store.dispatch(Action::register("email", FieldRegistration::default(), json!("")));
/// store.dispatch(Action::change("email", json!("a@b.c")));
///
/// assert_eq!(*seen.lock(), vec!["REGISTER", "CHANGE"]);
/// assert_eq!(store.get_state().value("email"), Some(&json!("a@b.c")));
/// ```
#[derive(Clone)]
pub struct Store {
	inner: Arc<StoreInner>,
}

impl Store {
	/// Creates a store with the form reducer and the initial state.
	pub fn new() -> Self {
		Self::builder().build()
	}

	pub fn builder() -> StoreBuilder {
		StoreBuilder::default()
	}

	/// Current state.
	pub fn get_state(&self) -> Arc<FormState> {
		self.inner.state.read().clone()
	}

	/// Enqueues `action` for the reducer.
	pub fn dispatch(&self, action: Action) {
		self.enqueue(Write::Reduce(action));
	}

	/// Replaces the state with `state`, broadcasting it under `action`.
	pub fn commit(&self, action: Action, state: FormState) {
		self.commit_with(action, move |_| state);
	}

	/// Replaces the state with `patch(latest)`, broadcasting it under `action`.
	///
	/// The patch runs against the state current at processing time, not at
	/// call time.
	pub fn commit_with<F>(&self, action: Action, patch: F)
	where
		F: FnOnce(&FormState) -> FormState + Send + 'static,
	{
		self.enqueue(Write::Commit(action, Box::new(patch)));
	}

	/// Replaces the state with the state returned by `patch(latest)`,
	/// broadcasting it under the returned action.
	///
	/// Used when the action itself depends on the state at processing time.
	/// A panicking patch keeps the previous state and broadcasts nothing.
	pub fn resolve<F>(&self, patch: F)
	where
		F: FnOnce(&FormState) -> (Action, FormState) + Send + 'static,
	{
		self.enqueue(Write::Resolve(Box::new(patch)));
	}

	/// Feeds externally computed `(action, state)` pairs into [`commit`](Self::commit).
	///
	/// The pump runs on the current Tokio runtime and is aborted by
	/// [`cleanup`](Self::cleanup).
	pub fn observe<S>(&self, stream: S)
	where
		S: Stream<Item = (Action, FormState)> + Send + 'static,
	{
		if self.is_closed() {
			tracing::warn!("observe called on a cleaned up store");
			return;
		}
		let Ok(runtime) = tokio::runtime::Handle::try_current() else {
			tracing::error!("Store::observe requires a Tokio runtime, stream ignored");
			return;
		};

		let store = Arc::downgrade(&self.inner);
		let handle = runtime.spawn(async move {
			let mut stream = Box::pin(stream);
			while let Some((action, state)) = stream.next().await {
				let Some(inner) = store.upgrade() else {
					break;
				};
				Store { inner }.commit(action, state);
			}
		});
		self.inner.observed.lock().push(handle);
	}

	/// Registers `observer` for every subsequent broadcast.
	pub fn subscribe<F>(&self, observer: F) -> Subscription
	where
		F: Fn(&StoreEvent) + Send + Sync + 'static,
	{
		let id = self.inner.next_subscriber.fetch_add(1, Ordering::Relaxed);
		if !self.is_closed() {
			self.inner.subscribers.write().push((id, Arc::new(observer)));
		}
		Subscription {
			id,
			store: Arc::downgrade(&self.inner),
			active: true,
		}
	}

	/// Exposes the broadcast feed as a stream.
	///
	/// The stream ends when the store is cleaned up.
	pub fn subscribe_stream(&self) -> EventStream {
		let (tx, rx) = mpsc::unbounded_channel();
		let subscription = self.subscribe(move |event| {
			let _ = tx.send(event.clone());
		});
		EventStream {
			events: UnboundedReceiverStream::new(rx),
			_subscription: subscription,
		}
	}

	/// Releases subscribers and observed streams.
	///
	/// Later writes are ignored. Calling this twice is harmless.
	pub fn cleanup(&self) {
		if self.inner.closed.swap(true, Ordering::AcqRel) {
			return;
		}
		self.inner.subscribers.write().clear();
		for handle in self.inner.observed.lock().drain(..) {
			handle.abort();
		}
		self.inner.queue.lock().clear();
		tracing::debug!("form store cleaned up");
	}

	/// Returns true once [`cleanup`](Self::cleanup) ran.
	pub fn is_closed(&self) -> bool {
		self.inner.closed.load(Ordering::Acquire)
	}

	/// Number of live subscribers.
	pub fn subscriber_count(&self) -> usize {
		self.inner.subscribers.read().len()
	}

	fn enqueue(&self, write: Write) {
		if self.is_closed() {
			tracing::warn!(action = write.kind(), "write to a cleaned up store ignored");
			return;
		}
		self.inner.queue.lock().push_back(write);
		self.drain();
	}

	fn drain(&self) {
		loop {
			if self
				.inner
				.draining
				.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
				.is_err()
			{
				// The current drainer picks the write up.
				return;
			}

			{
				let _draining = DrainGuard(&self.inner.draining);
				loop {
					let next = self.inner.queue.lock().pop_front();
					let Some(write) = next else {
						break;
					};
					self.process(write);
				}
			}

			// A write may have landed between the last pop and the release.
			if self.inner.queue.lock().is_empty() {
				return;
			}
		}
	}

	fn process(&self, write: Write) {
		if self.is_closed() {
			return;
		}
		let previous = self.get_state();

		let (action, next) = match write {
			Write::Reduce(action) => {
				let next = self.inner.reducer.apply(&action, &previous);
				(action, next)
			}
			Write::Commit(action, patch) => {
				let next = match catch_unwind(AssertUnwindSafe(|| patch(&previous))) {
					Ok(mut next) => {
						next.refresh_derived();
						Arc::new(next)
					}
					Err(_) => {
						tracing::error!(action = action.kind(), "state patch panicked, keeping previous state");
						Arc::clone(&previous)
					}
				};
				(action, next)
			}
			Write::Resolve(patch) => match catch_unwind(AssertUnwindSafe(|| patch(&previous))) {
				Ok((action, mut next)) => {
					next.refresh_derived();
					(action, Arc::new(next))
				}
				Err(_) => {
					tracing::error!("state resolution panicked, keeping previous state");
					return;
				}
			},
		};

		*self.inner.state.write() = Arc::clone(&next);

		if self.inner.trace_transitions {
			tracing::debug!(
				action = action.kind(),
				changed = !Arc::ptr_eq(&previous, &next),
				submitting = next.meta.submitting,
				dirty = next.meta.dirty,
				"form transition"
			);
		}
		if let Some(hook) = &self.inner.trace_hook {
			if catch_unwind(AssertUnwindSafe(|| hook(&previous, &action, &next))).is_err() {
				tracing::error!(action = action.kind(), "trace hook panicked");
			}
		}

		self.broadcast(StoreEvent {
			action: Arc::new(action),
			state: next,
		});
	}

	fn broadcast(&self, event: StoreEvent) {
		let subscribers: Vec<(u64, Observer)> = self.inner.subscribers.read().clone();
		for (id, observer) in subscribers {
			if catch_unwind(AssertUnwindSafe(|| observer(&event))).is_err() {
				tracing::error!(
					subscriber = id,
					action = event.action.kind(),
					"store subscriber panicked"
				);
			}
		}
	}

	fn unsubscribe(inner: &StoreInner, id: u64) {
		inner.subscribers.write().retain(|(existing, _)| *existing != id);
	}
}

/// Releases the drain flag, also when a write unwinds.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
	fn drop(&mut self) {
		self.0.store(false, Ordering::Release);
	}
}

impl Default for Store {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Debug for Store {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Store")
			.field("state", &self.get_state())
			.field("subscribers", &self.subscriber_count())
			.field("closed", &self.is_closed())
			.finish()
	}
}

/// Handle of a store subscriber. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
	id: u64,
	store: Weak<StoreInner>,
	active: bool,
}

impl Subscription {
	/// Removes the subscriber.
	pub fn unsubscribe(mut self) {
		self.release();
	}

	fn release(&mut self) {
		if !std::mem::replace(&mut self.active, false) {
			return;
		}
		if let Some(inner) = self.store.upgrade() {
			Store::unsubscribe(&inner, self.id);
		}
	}
}

impl Drop for Subscription {
	fn drop(&mut self) {
		self.release();
	}
}

impl fmt::Debug for Subscription {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Subscription")
			.field("id", &self.id)
			.field("active", &self.active)
			.finish()
	}
}

/// Stream of [`StoreEvent`]s returned by [`Store::subscribe_stream`].
pub struct EventStream {
	events: UnboundedReceiverStream<StoreEvent>,
	_subscription: Subscription,
}

impl Stream for EventStream {
	type Item = StoreEvent;

	fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		Pin::new(&mut self.get_mut().events).poll_next(cx)
	}
}
