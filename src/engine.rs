//! Form engine module.
//!
//! This module provides access to the form handle, field registration,
//! debounced validation and the submission state machine.
//!
//! # Examples
//!
//! ```rust,no_run
//! # #[cfg(feature = "engine")]
//! use reinhardt_formstate::engine::{FieldOptions, Form};
//! ```

#[cfg(feature = "engine")]
pub use reinhardt_formstate_engine::*;
