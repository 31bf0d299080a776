//! Form state core module.
//!
//! This module provides access to the action vocabulary, the reducer, the
//! serializing store and engine configuration.
//!
//! # Examples
//!
//! ```rust,no_run
//! # #[cfg(feature = "core")]
//! use reinhardt_formstate::core::{Action, Store};
//! ```

#[cfg(feature = "core")]
pub use reinhardt_formstate_core::*;
