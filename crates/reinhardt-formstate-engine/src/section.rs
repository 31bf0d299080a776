//! Nested form sections

use crate::field::{FieldHandle, FieldOptions};
use crate::form::Form;
use reinhardt_formstate_core::join_path;

/// A named group of fields.
///
/// Fields registered through a section live under `"<prefix>.<name>"`, so
/// their values nest under the prefix in the form values.
///
/// # Examples
///
/// ```
/// use reinhardt_formstate_engine::{FieldOptions, Form};
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let form = Form::new();
/// let user = form.section("user");
/// let _fname = user.register("fname", FieldOptions::new().default_value(""));
/// let _city = user.section("address").register("city", FieldOptions::new().default_value(""));
///
/// assert_eq!(
///     form.state().values.to_value(),
///     json!({"user": {"fname": "", "address": {"city": ""}}})
/// );
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct FormSection {
	form: Form,
	prefix: String,
}

impl FormSection {
	pub(crate) fn new(form: Form, prefix: String) -> Self {
		Self { form, prefix }
	}

	/// Full path prefix of this section.
	pub fn prefix(&self) -> &str {
		&self.prefix
	}

	/// Registers `name` under this section's prefix.
	pub fn register(&self, name: &str, options: FieldOptions) -> FieldHandle {
		self.form.register(join_path(&self.prefix, name), options)
	}

	/// Opens a nested section.
	pub fn section(&self, name: &str) -> FormSection {
		FormSection::new(self.form.clone(), join_path(&self.prefix, name))
	}

	/// The form this section belongs to.
	pub fn form(&self) -> &Form {
		&self.form
	}
}
