//! Form engine for Reinhardt
//!
//! This crate drives a [`reinhardt_formstate_core::Store`] from the outside:
//! - [`Form`]: the handle owning one store and its submission state machine
//! - [`FieldHandle`]: a registered field with debounced, cancellable validation
//! - [`FormSection`]: prefixes for nested field groups
//! - Value, meta and field-change watchers
//!
//! Validation and submission run as Tokio tasks.
//!
//! ## Example
//!
//! ```
//! use reinhardt_formstate_engine::{FieldOptions, Form};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicBool, Ordering};
//!
//! # tokio_test::block_on(async {
//! let submitted = Arc::new(AtomicBool::new(false));
//! let flag = Arc::clone(&submitted);
//! let form = Form::builder()
//!     .on_submit(move |_values, _meta| {
//!         let flag = Arc::clone(&flag);
//!         async move {
//!             flag.store(true, Ordering::SeqCst);
//!             Ok::<_, anyhow::Error>(serde_json::Value::Null)
//!         }
//!     })
//!     .build();
//! let _email = form.register("email", FieldOptions::new().required(true).default_value(""));
//!
//! form.submit();
//! form.settled().await;
//!
//! assert!(!submitted.load(Ordering::SeqCst));
//! assert_eq!(form.state().meta.errors[0].to_string(), "email is required");
//! # });
//! ```

pub mod field;
pub mod form;
mod pipeline;
pub mod section;
pub mod submission;
pub mod watch;

pub use field::{FieldHandle, FieldOptions, ValidationState, Validator, validator_fn};
pub use form::{Form, FormBuilder};
pub use section::FormSection;
pub use submission::{FailedFn, SubmitFn, SuccessFn};
pub use watch::{FieldChange, FieldSnapshot, FormUpdater};
