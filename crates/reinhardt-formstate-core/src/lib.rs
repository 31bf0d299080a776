//! Form state core for Reinhardt
//!
//! This crate provides the synchronous heart of the form engine:
//! - The action vocabulary describing every state transition
//! - The pure, copy-on-write form reducer and its error-isolating decorator
//! - The serializing store broadcasting `(action, state)` pairs in order
//! - Path-addressed form values and per-field metadata
//! - Required checks and whole-form verification
//! - Engine configuration
//!
//! The asynchronous parts (debounced field validation, submission) live in
//! `reinhardt-formstate-engine`.

pub mod action;
pub mod config;
pub mod error;
pub mod reducer;
pub mod state;
pub mod store;
pub mod validation;
pub mod values;

pub use action::{Action, FieldAction, FormAction, SubmitPhase};
pub use config::{DEFAULT_DEBOUNCE, FormConfig};
pub use error::{ConfigError, FormError, ReduceError, ReduceResult};
pub use reducer::{FormReducer, IsolatedReducer, Reducer};
pub use state::{FieldMeta, FieldMetaPatch, FieldRegistration, FormMeta, FormState};
pub use store::{EventStream, Observer, Store, StoreBuilder, StoreEvent, Subscription, TraceHook};
pub use validation::{is_empty_value, required_error, verify_form};
pub use values::{FormValues, ValueChange, join_path, split_path};
