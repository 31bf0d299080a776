//! # Reinhardt Form State
//!
//! A reactive form-state engine: given named fields with values, validation
//! rules and dirty/error metadata, it computes a consistent next state on
//! every change, runs debounced (possibly asynchronous) validation and drives
//! a single-flight submission workflow. It renders nothing; UI widgets bind
//! to it through [`engine::FieldHandle`] and the watchers.
//!
//! ## Feature Flags
//!
//! - `core` - Action vocabulary, reducer, store and configuration
//! - `engine` (default) - Form handle, field pipelines and submission, on Tokio
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use reinhardt_formstate::{FieldOptions, Form};
//!
//! # async fn example() {
//! let form = Form::builder()
//!     .on_submit(|values, _meta| async move {
//!         println!("submitting {}", values.to_value());
//!         Ok::<_, anyhow::Error>(serde_json::Value::Null)
//!     })
//!     .build();
//!
//! let user = form.section("user");
//! let fname = user.register("fname", FieldOptions::new().required(true).default_value(""));
//! fname.on_change("Ada");
//!
//! form.submit();
//! form.settled().await;
//! # }
//! ```

#[cfg(feature = "core")]
pub mod core;
#[cfg(feature = "engine")]
pub mod engine;

// Re-export core types
#[cfg(feature = "core")]
pub use reinhardt_formstate_core::{
	Action, FieldAction, FieldMeta, FormAction, FormConfig, FormError, FormMeta, FormState,
	FormValues, ReduceError, Store, StoreEvent, SubmitPhase, Subscription, ValueChange,
};

// Re-export the form engine
#[cfg(feature = "engine")]
pub use reinhardt_formstate_engine::{
	FieldHandle, FieldOptions, Form, FormBuilder, FormSection, ValidationState, Validator,
	validator_fn,
};
