//! Value, meta and field-change watchers

use parking_lot::Mutex;
use reinhardt_formstate_core::{
	Action, FieldAction, FieldMeta, FormMeta, FormState, FormValues, Store, Subscription,
	ValueChange,
};
use serde_json::Value;
use std::sync::Arc;

/// Value and meta of one field at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSnapshot {
	pub value: Option<Value>,
	/// `None` while the field is not registered.
	pub meta: Option<FieldMeta>,
}

/// Handle to bulk-update form values from inside a watcher.
#[derive(Clone)]
pub struct FormUpdater {
	store: Store,
}

impl FormUpdater {
	pub(crate) fn new(store: Store) -> Self {
		Self { store }
	}

	/// Dispatches a bulk value update. Paths of unregistered fields are
	/// ignored.
	pub fn update_form_values(&self, changes: Vec<ValueChange>) {
		self.store.dispatch(Action::update(changes));
	}
}

/// A field change delivered to [`Form::on_field_change`](crate::Form::on_field_change).
pub struct FieldChange {
	/// The change action.
	pub action: FieldAction,
	/// Form values after the change.
	pub values: FormValues,
	pub updater: FormUpdater,
}

/// Calls `callback` with the current projection, then with every
/// projection for which `changed(next, prev)` holds.
pub(crate) fn distinct<T, P, C, F>(store: &Store, project: P, changed: C, callback: F) -> Subscription
where
	T: Clone + Send + 'static,
	P: Fn(&FormState) -> T + Send + Sync + 'static,
	C: Fn(&T, &T) -> bool + Send + Sync + 'static,
	F: Fn(&T) + Send + Sync + 'static,
{
	let last: Arc<Mutex<Option<T>>> = Arc::new(Mutex::new(None));
	let project = Arc::new(project);
	let callback = Arc::new(callback);

	let subscription = {
		let last = Arc::clone(&last);
		let project = Arc::clone(&project);
		let callback = Arc::clone(&callback);
		store.subscribe(move |event| {
			let next = project(&event.state);
			{
				let mut last = last.lock();
				// Unprimed: the initial projection reads this state or a later one.
				let Some(prev) = last.as_ref() else {
					return;
				};
				if !changed(&next, prev) {
					return;
				}
				*last = Some(next.clone());
			}
			callback(&next);
		})
	};

	let initial = {
		let mut last = last.lock();
		let initial = project(&store.get_state());
		*last = Some(initial.clone());
		initial
	};
	callback(&initial);
	subscription
}

pub(crate) fn watch_values<C, F>(store: &Store, changed: C, callback: F) -> Subscription
where
	C: Fn(&FormValues, &FormValues) -> bool + Send + Sync + 'static,
	F: Fn(&FormValues) + Send + Sync + 'static,
{
	distinct(store, |state| state.values.clone(), changed, callback)
}

pub(crate) fn watch_meta<F>(store: &Store, callback: F) -> Subscription
where
	F: Fn(&FormMeta) + Send + Sync + 'static,
{
	distinct(store, |state| state.meta.clone(), |next, prev| next != prev, callback)
}

pub(crate) fn on_field_change<F>(store: &Store, callback: F) -> Subscription
where
	F: Fn(FieldChange) + Send + Sync + 'static,
{
	let updater = FormUpdater::new(store.clone());
	let last: Mutex<Option<FieldAction>> = Mutex::new(None);

	store.subscribe(move |event| {
		let Action::Field(action @ FieldAction::Change { .. }) = event.action.as_ref() else {
			return;
		};
		{
			let mut last = last.lock();
			if last.as_ref() == Some(action) {
				return;
			}
			*last = Some(action.clone());
		}
		callback(FieldChange {
			action: action.clone(),
			values: event.state.values.clone(),
			updater: updater.clone(),
		});
	})
}
