//! Field validation pipeline tests
//!
//! Time is paused in every test, so debounce windows elapse deterministically.

use parking_lot::Mutex;
use reinhardt_formstate_core::{FormConfig, FormError, ValueChange};
use reinhardt_formstate_engine::{FieldOptions, Form, ValidationState, Validator, validator_fn};
use rstest::rstest;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

type Calls = Arc<Mutex<Vec<Value>>>;

/// Records every value and rejects `"taken"` after `delay`.
fn nickname_validator(calls: Calls, delay: Duration) -> Arc<dyn Validator> {
	validator_fn(move |value| {
		let calls = Arc::clone(&calls);
		async move {
			calls.lock().push(value.clone());
			sleep(delay).await;
			if value == json!("taken") {
				Err("nickname is taken".to_string())
			} else {
				Ok(())
			}
		}
	})
}

fn kinds(form: &Form) -> (Arc<Mutex<Vec<String>>>, reinhardt_formstate_core::Subscription) {
	let seen = Arc::new(Mutex::new(Vec::new()));
	let sink = Arc::clone(&seen);
	let subscription = form.subscribe(move |event| {
		sink.lock().push(event.action.kind().to_string());
	});
	(seen, subscription)
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_debounce_validates_final_value_once() {
	// Arrange
	let form = Form::new();
	let calls = Calls::default();
	let field = form.register(
		"nickname",
		FieldOptions::new()
			.default_value("")
			.validator(nickname_validator(Arc::clone(&calls), Duration::ZERO)),
	);

	// Act
	field.on_change("a");
	sleep(Duration::from_millis(50)).await;
	field.on_change("ab");
	sleep(Duration::from_millis(50)).await;
	field.on_change("abc");
	sleep(Duration::from_millis(500)).await;

	// Assert
	assert_eq!(*calls.lock(), vec![json!("abc")]);
	assert_eq!(field.validation_state(), ValidationState::Valid);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_nothing_runs_before_the_window_elapses() {
	let form = Form::builder()
		.config(FormConfig::new().with_debounce(Duration::from_millis(300)))
		.build();
	let calls = Calls::default();
	let field = form.register(
		"nickname",
		FieldOptions::new().validator(nickname_validator(Arc::clone(&calls), Duration::ZERO)),
	);
	assert_eq!(field.validation_state(), ValidationState::Idle);

	field.on_change("a");
	sleep(Duration::from_millis(250)).await;

	assert!(calls.lock().is_empty());
	assert_eq!(field.validation_state(), ValidationState::PendingDebounce);

	sleep(Duration::from_millis(100)).await;
	assert_eq!(*calls.lock(), vec![json!("a")]);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_required_error_set_and_cleared() {
	// Arrange
	let form = Form::new();
	let email = form.register("email", FieldOptions::new().required(true).default_value("x"));

	// Act
	email.on_change("");
	sleep(Duration::from_millis(250)).await;

	// Assert
	assert_eq!(
		email.meta().unwrap().error,
		Some(FormError::field("email", "email is required"))
	);
	assert_eq!(email.validation_state(), ValidationState::Invalid);

	email.on_change("a@b.c");
	sleep(Duration::from_millis(250)).await;
	assert_eq!(email.meta().unwrap().error, None);
	assert_eq!(email.validation_state(), ValidationState::Valid);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_required_message_uses_display_name() {
	let form = Form::new();
	let email = form.register(
		"contact.email",
		FieldOptions::new().required(true).display_name("E-mail"),
	);

	email.on_change(json!(null));
	sleep(Duration::from_millis(250)).await;

	assert_eq!(
		email.meta().unwrap().error.map(|error| error.to_string()),
		Some("E-mail is required".to_string())
	);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_required_check_short_circuits_validator() {
	let form = Form::new();
	let calls = Calls::default();
	let field = form.register(
		"nickname",
		FieldOptions::new()
			.required(true)
			.validator(nickname_validator(Arc::clone(&calls), Duration::ZERO)),
	);

	field.on_change("");
	sleep(Duration::from_millis(250)).await;

	assert!(calls.lock().is_empty());
	assert_eq!(
		field.meta().unwrap().error,
		Some(FormError::field("nickname", "nickname is required"))
	);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_stale_validation_result_is_discarded() {
	// Arrange
	let form = Form::new();
	let calls = Calls::default();
	let field = form.register(
		"nickname",
		FieldOptions::new().validator(nickname_validator(Arc::clone(&calls), Duration::from_secs(1))),
	);
	let (seen, _subscription) = kinds(&form);

	// Act
	field.on_change("taken");
	sleep(Duration::from_millis(300)).await;
	assert_eq!(field.validation_state(), ValidationState::Validating);
	field.on_change("free");
	sleep(Duration::from_secs(3)).await;

	// Assert
	assert_eq!(*calls.lock(), vec![json!("taken"), json!("free")]);
	assert_eq!(field.meta().unwrap().error, None);
	assert!(!seen.lock().iter().any(|kind| kind == "THROW_ERROR"));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_validator_error_is_thrown() {
	let form = Form::new();
	let calls = Calls::default();
	let field = form.register(
		"nickname",
		FieldOptions::new().validator(nickname_validator(Arc::clone(&calls), Duration::ZERO)),
	);

	field.on_change("taken");
	sleep(Duration::from_millis(250)).await;

	assert_eq!(
		field.meta().unwrap().error,
		Some(FormError::field("nickname", "nickname is taken"))
	);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_clear_error_only_when_error_is_set() {
	// Arrange
	let form = Form::new();
	let calls = Calls::default();
	let field = form.register(
		"nickname",
		FieldOptions::new().validator(nickname_validator(Arc::clone(&calls), Duration::ZERO)),
	);
	let (seen, _subscription) = kinds(&form);

	// Act
	field.on_change("free");
	sleep(Duration::from_millis(250)).await;

	// Assert
	assert_eq!(*seen.lock(), vec!["CHANGE"]);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_bulk_update_triggers_validation() {
	let form = Form::new();
	let calls = Calls::default();
	let _field = form.register(
		"nickname",
		FieldOptions::new().validator(nickname_validator(Arc::clone(&calls), Duration::ZERO)),
	);

	form.update_form_values(vec![ValueChange::new("nickname", "taken")]);
	sleep(Duration::from_millis(250)).await;

	assert_eq!(*calls.lock(), vec![json!("taken")]);
	assert!(form.state().field("nickname").unwrap().error.is_some());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_other_fields_do_not_trigger_validation() {
	let form = Form::new();
	let calls = Calls::default();
	let _nickname = form.register(
		"nickname",
		FieldOptions::new().validator(nickname_validator(Arc::clone(&calls), Duration::ZERO)),
	);
	let other = form.register("other", FieldOptions::new());

	other.on_change("x");
	form.update_form_values(vec![ValueChange::new("other", "y")]);
	sleep(Duration::from_millis(500)).await;

	assert!(calls.lock().is_empty());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_destroy_tears_down_pipeline() {
	// Arrange
	let form = Form::new();
	let calls = Calls::default();
	let field = form.register(
		"nickname",
		FieldOptions::new()
			.destroy_value_on_unmount(true)
			.validator(nickname_validator(Arc::clone(&calls), Duration::ZERO)),
	);
	let (seen, _subscription) = kinds(&form);

	// Act
	field.on_change("taken");
	field.destroy();
	field.destroy();
	sleep(Duration::from_millis(500)).await;

	// Assert
	assert!(calls.lock().is_empty());
	assert_eq!(*seen.lock(), vec!["CHANGE", "DESTROY"]);
	assert!(!form.state().is_registered("nickname"));
	assert_eq!(form.state().value("nickname"), None);
	assert!(field.is_destroyed());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_destroy_during_validation_discards_result() {
	// Arrange
	let form = Form::new();
	let calls = Calls::default();
	let field = form.register(
		"nickname",
		FieldOptions::new().validator(nickname_validator(Arc::clone(&calls), Duration::from_secs(1))),
	);
	let (seen, _subscription) = kinds(&form);

	// Act
	field.on_change("taken");
	sleep(Duration::from_millis(300)).await;
	let during = field.validation_state();
	field.destroy();
	sleep(Duration::from_secs(2)).await;

	// Assert
	assert_eq!(during, ValidationState::Validating);
	assert_eq!(*calls.lock(), vec![json!("taken")]);
	assert_eq!(*seen.lock(), vec!["CHANGE", "DESTROY"]);
	assert!(!form.state().is_registered("nickname"));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_dropping_handle_destroys_field_and_keeps_value() {
	let form = Form::new();
	{
		let field = form.register("nickname", FieldOptions::new().required(true));
		field.on_change("kept");
	}
	sleep(Duration::from_millis(500)).await;

	assert!(!form.state().is_registered("nickname"));
	assert_eq!(form.state().value("nickname"), Some(&json!("kept")));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_update_constraints_reregisters_on_required_change() {
	// Arrange
	let form = Form::new();
	let field = form.register("email", FieldOptions::new().default_value(""));
	field.on_change("typed");
	let (seen, _subscription) = kinds(&form);

	// Act
	field.update_constraints(FieldOptions::new().default_value(""));
	field.update_constraints(FieldOptions::new().required(true).default_value(""));

	// Assert
	assert_eq!(*seen.lock(), vec!["REGISTER"]);
	let meta = field.meta().unwrap();
	assert!(meta.required);
	assert!(!meta.dirty);
	assert_eq!(field.value(), Some(json!("")));

	field.on_change("");
	sleep(Duration::from_millis(250)).await;
	assert_eq!(field.validation_state(), ValidationState::Invalid);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_update_constraints_relabels_required_error() {
	// Arrange
	let form = Form::new();
	let field = form.register("email", FieldOptions::new().required(true).default_value(""));
	field.on_change("typed");
	let (seen, _subscription) = kinds(&form);

	// Act
	field.update_constraints(
		FieldOptions::new()
			.required(true)
			.default_value("")
			.display_name("E-mail"),
	);
	field.on_change("");
	sleep(Duration::from_millis(250)).await;

	// Assert
	assert_eq!(seen.lock()[0], "CONFIGURE");
	assert_eq!(field.value(), Some(json!("")));
	assert_eq!(
		field.meta().unwrap().error,
		Some(FormError::field("email", "E-mail is required"))
	);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_update_constraints_removes_display_name() {
	// Arrange
	let form = Form::new();
	let field = form.register(
		"email",
		FieldOptions::new().required(true).default_value("").display_name("E-mail"),
	);
	field.on_change("typed");

	// Act
	field.update_constraints(FieldOptions::new().required(true).default_value(""));
	field.on_change("");
	sleep(Duration::from_millis(250)).await;

	// Assert
	let meta = field.meta().unwrap();
	assert_eq!(meta.display_name, None);
	assert_eq!(meta.error, Some(FormError::field("email", "email is required")));
}
