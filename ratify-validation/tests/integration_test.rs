//! Integration tests for ratify-validation

use parking_lot::Mutex;
use ratify_validation::*;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::sleep;
use tokio_test::{assert_err, assert_ok};

/// Sync rule that records every argument list it is called with.
fn recording(fail_below: usize) -> (Rule, Arc<Mutex<Vec<Vec<Value>>>>) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let record = Arc::clone(&calls);
    let rule = Rule::sync(move |values| {
        record.lock().push(values.to_vec());
        let len = values[0].as_str().map_or(0, str::len);
        (len < fail_below).then(|| format!("need {fail_below} characters"))
    });
    (rule, calls)
}

/// Async rule resolving after `ms` with a fixed outcome.
fn delayed(ms: u64, message: Option<&str>) -> Rule {
    let message = message.map(str::to_string);
    Rule::future(move |_| {
        let message = message.clone();
        async move {
            sleep(Duration::from_millis(ms)).await;
            Ok(message)
        }
    })
}

#[tokio::test]
async fn test_untouched_field_is_not_validated() {
    let engine = ValidationEngine::new();
    let (rule, calls) = recording(100);
    engine
        .register_field("a", Some("a"), json!("x"), FieldRules::new().simple(rule))
        .unwrap();

    let outcomes = engine.validate("a").await;
    assert!(outcomes.is_empty());
    assert!(calls.lock().is_empty());
    assert!(engine.errors().is_empty());
}

#[tokio::test]
async fn test_validate_unknown_field_is_noop() {
    let engine = ValidationEngine::new();
    assert!(engine.validate("missing").await.is_empty());
}

#[tokio::test]
async fn test_keyed_rule_waits_for_all_members() {
    let engine = ValidationEngine::new();
    let (rule, calls) = recording(0);
    let a = engine
        .register_field("a", Some("a"), json!("foo"), FieldRules::new().keyed("pair", Some(rule)))
        .unwrap();
    let b = engine
        .register_field("b", Some("b"), json!("bar"), FieldRules::new().keyed("pair", None))
        .unwrap();
    assert_eq!(engine.group_size("pair"), 2);

    a.touch();
    engine.validate("a").await;
    assert!(calls.lock().is_empty());

    b.touch();
    engine.validate("b").await;
    assert_eq!(*calls.lock(), vec![vec![json!("foo"), json!("bar")]]);
}

#[tokio::test]
async fn test_keyed_mismatch_lands_on_rule_holder() {
    let engine = ValidationEngine::new();
    engine
        .register_field(
            "password",
            Some("password"),
            json!("secret"),
            FieldRules::new().keyed("confirm", Some(AllEqual.into_rule())),
        )
        .unwrap();
    let confirm = engine
        .register_field("confirm", Some("confirm"), json!("secret"), FieldRules::new().keyed("confirm", None))
        .unwrap();

    assert_ok!(engine.validate_all(None).await);

    confirm.set_value(json!("secrets"));
    let outcomes = engine.on_value_changed("confirm").await;
    assert_eq!(outcomes, vec![Err(RuleError::Failed("values do not match".into()))]);
    assert_eq!(engine.field("password").unwrap().errors(), vec!["values do not match"]);
    assert!(confirm.errors().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_out_of_order_results_converge_on_latest() {
    let delays = [600u64, 100, 400, 800, 200, 50];
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let rule = Rule::future(move |_| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            sleep(Duration::from_millis(delays[n])).await;
            Ok(Some(format!("error {n}")))
        }
    });

    let engine = ValidationEngine::new();
    let field = engine
        .register_field("a", Some("a"), json!(""), FieldRules::new().simple(rule))
        .unwrap();
    field.touch();

    let mut rounds = Vec::new();
    for _ in 0..delays.len() {
        rounds.push(engine.validate("a"));
    }
    assert_eq!(engine.pending_count(), 6);

    let outcomes: Vec<Settled> = futures::future::join_all(rounds)
        .await
        .into_iter()
        .flatten()
        .collect();

    assert_eq!(calls.load(Ordering::SeqCst), 6);
    assert_eq!(field.errors(), vec!["error 5"]);
    assert_eq!(outcomes[5], Err(RuleError::Failed("error 5".into())));
    for (n, outcome) in outcomes[..5].iter().enumerate() {
        assert_eq!(outcome, &Err(RuleError::Stale(format!("error {n}"))));
    }
    assert_eq!(engine.pending_count(), 0);
    assert!(!engine.validating());
}

#[tokio::test(start_paused = true)]
async fn test_pending_count_survives_reset() {
    let engine = ValidationEngine::new();
    let a = engine
        .register_field("a", Some("a"), json!(1), FieldRules::new().simple(delayed(40, Some("slow a"))))
        .unwrap();
    let b = engine
        .register_field("b", Some("b"), json!(2), FieldRules::new().simple(delayed(50, Some("slow b"))))
        .unwrap();
    a.touch();
    b.touch();

    let first = engine.validate("a");
    let second = engine.validate("b");
    assert_eq!(engine.pending_count(), 2);
    assert!(engine.validating());

    sleep(Duration::from_millis(45)).await;
    assert_eq!(engine.pending_count(), 1);
    assert_eq!(a.errors(), vec!["slow a"]);

    engine.reset_fields();
    assert_eq!(engine.pending_count(), 0);
    assert!(!b.touched());

    // the in-flight result arrives after reset and changes nothing
    assert_eq!(second.await, vec![Err(RuleError::Stale("slow b".into()))]);
    assert_eq!(first.await, vec![Err(RuleError::Failed("slow a".into()))]);
    assert_eq!(engine.pending_count(), 0);
    assert!(engine.errors().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_pending_count_symmetry_on_one_field() {
    let engine = ValidationEngine::new();
    let field = engine
        .register_field(
            "a",
            Some("a"),
            json!(""),
            FieldRules::new()
                .simple(delayed(40, Some("forty")))
                .simple(delayed(50, Some("fifty"))),
        )
        .unwrap();
    field.touch();

    let pending = engine.validate("a");
    assert_eq!(field.pending_count(), 2);
    assert_eq!(engine.pending_count(), 2);

    engine.reset_fields();
    assert_eq!(field.pending_count(), 0);
    assert_eq!(engine.pending_count(), 0);

    let outcomes = pending.await;
    assert_eq!(
        outcomes,
        vec![
            Err(RuleError::Stale("forty".into())),
            Err(RuleError::Stale("fifty".into())),
        ]
    );
    assert_eq!(field.raw_errors(), vec![None, None]);
    assert_eq!(field.pending_count(), 0);
    assert_eq!(engine.pending_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_debounced_burst_runs_once_with_last_value() {
    let engine = ValidationEngine::new();
    let (rule, calls) = recording(5);
    let field = engine
        .register_field(
            "a",
            Some("a"),
            json!(""),
            vec![RuleSpec::simple(rule).debounce_ms(20)],
        )
        .unwrap();
    field.touch();

    let mut rounds = Vec::new();
    for value in ["a", "ab", "abc"] {
        rounds.push(engine.set_value("a", json!(value)).unwrap());
        sleep(Duration::from_millis(5)).await;
    }
    assert!(calls.lock().is_empty());
    assert_eq!(engine.pending_count(), 3);

    let outcomes = futures::future::join_all(rounds).await;
    assert_eq!(*calls.lock(), vec![vec![json!("abc")]]);
    for outcome in outcomes {
        assert_eq!(outcome, vec![Err(RuleError::Failed("need 5 characters".into()))]);
    }
    assert_eq!(engine.pending_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_default_debounce_from_config() {
    let engine = ValidationEngine::with_config(EngineConfig::new().default_debounce_ms(30));
    let (rule, calls) = recording(0);
    let field = engine
        .register_field("a", Some("a"), json!("x"), FieldRules::new().simple(rule))
        .unwrap();
    field.touch();

    let first = engine.set_value("a", json!("xy")).unwrap();
    let second = engine.set_value("a", json!("xyz")).unwrap();
    let _ = futures::future::join(first, second).await;
    assert_eq!(*calls.lock(), vec![vec![json!("xyz")]]);
}

#[tokio::test(start_paused = true)]
async fn test_reset_cancels_debounced_burst() {
    let engine = ValidationEngine::new();
    let (rule, calls) = recording(5);
    let field = engine
        .register_field(
            "a",
            Some("a"),
            json!(""),
            vec![RuleSpec::simple(rule).debounce_ms(20)],
        )
        .unwrap();
    field.touch();

    let pending = engine.set_value("a", json!("ab")).unwrap();
    assert_eq!(engine.pending_count(), 1);
    engine.reset_fields();
    assert_eq!(engine.pending_count(), 0);

    assert_eq!(pending.await, vec![Ok(())]);
    sleep(Duration::from_millis(50)).await;
    assert!(calls.lock().is_empty());
    assert_eq!(field.value(), json!(""));
}

#[tokio::test]
async fn test_validate_all_touches_and_collects_errors() {
    let engine = ValidationEngine::new();
    engine
        .register_field("email", Some("email"), json!("nope"), FieldRules::new().simple(IsEmail.into_rule()))
        .unwrap();
    engine
        .register_field(
            "name",
            Some("name"),
            json!(""),
            FieldRules::new().simple(NotEmpty.into_rule()).simple(MinLength(2).into_rule()),
        )
        .unwrap();
    engine
        .register_field("age", Some("age"), json!(30), FieldRules::new().simple(InRange { min: 18.0, max: 120.0 }.into_rule()))
        .unwrap();

    let outcome = engine.validate_all(None).await;
    assert_eq!(outcome, Err(FormError::Invalid(ValidationError)));

    for id in engine.field_ids() {
        assert!(engine.field(&id).unwrap().touched());
    }

    let mut errors = engine.errors();
    errors.sort();
    assert_eq!(
        errors,
        vec![
            "must be a valid email",
            "must be at least 2 characters",
            "should not be empty",
        ]
    );
    assert!(engine.has_error());
}

#[tokio::test]
async fn test_validate_all_runs_each_rule_once() {
    let engine = ValidationEngine::new();
    let calls = Arc::new(AtomicUsize::new(0));
    for name in ["alpha", "beta", "gamma"] {
        let counter = Arc::clone(&calls);
        let rule = Rule::sync(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Some(name.to_string())
        });
        engine
            .register_field(name, Some(name), json!(null), FieldRules::new().simple(rule))
            .unwrap();
    }

    let outcome = engine.validate_all(None).await;
    assert_eq!(outcome, Err(FormError::Invalid(ValidationError)));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    for name in ["alpha", "beta", "gamma"] {
        assert!(engine.field(name).unwrap().touched());
    }

    let mut errors = engine.errors();
    errors.sort();
    assert_eq!(errors, vec!["alpha", "beta", "gamma"]);
}

#[tokio::test]
async fn test_validate_all_named_subset() {
    let engine = ValidationEngine::new();
    engine
        .register_field("e", Some("email"), json!(""), FieldRules::new().simple(NotEmpty.into_rule()))
        .unwrap();
    let other = engine
        .register_field("o", Some("other"), json!(""), FieldRules::new().simple(NotEmpty.into_rule()))
        .unwrap();

    assert_err!(engine.validate_all(Some(&["email"])).await);
    assert!(!other.touched());
    assert!(other.errors().is_empty());
    assert_eq!(engine.errors(), vec!["should not be empty"]);

    assert_ok!(engine.validate_all(Some(&[])).await);
}

#[tokio::test]
async fn test_async_rejection_and_fault() {
    let rejects = Rule::future(|_| async { Err(RuleRejection::message("taken")) });
    let faults = Rule::future(|_| async { Err(RuleRejection::fault("backend unreachable")) });

    let engine = ValidationEngine::with_config(EngineConfig::new().log_rule_faults(false));
    let user = engine
        .register_field("user", Some("user"), json!("admin"), FieldRules::new().simple(rejects))
        .unwrap();
    let mail = engine
        .register_field("mail", Some("mail"), json!("a@b.c"), FieldRules::new().simple(faults))
        .unwrap();

    assert_err!(engine.validate_all(None).await);
    assert_eq!(user.errors(), vec!["taken"]);
    assert!(mail.errors().is_empty());
    assert_eq!(engine.pending_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_reset_cancels_validate_all() {
    let engine = ValidationEngine::new();
    engine
        .register_field("a", Some("a"), json!(""), FieldRules::new().simple(delayed(100, Some("late"))))
        .unwrap();

    let pass = engine.validate_all(None);
    engine.reset_fields();

    let outcome = pass.await;
    assert_eq!(outcome, Err(FormError::Cancelled));
    assert!(outcome.unwrap_err().is_cancelled());

    sleep(Duration::from_millis(150)).await;
    assert!(engine.errors().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_submitting_flag() {
    let engine = ValidationEngine::new();
    engine
        .register_field("a", Some("a"), json!(""), FieldRules::new().simple(delayed(30, None)))
        .unwrap();

    assert!(!engine.submitting());
    let submit = engine.submit();
    assert!(engine.submitting());
    assert_ok!(submit.await);
    assert!(!engine.submitting());
}

#[tokio::test]
async fn test_dispose_dissolves_keyed_group() {
    let engine = ValidationEngine::new();
    let (rule, calls) = recording(0);
    let a = engine
        .register_field("a", Some("a"), json!("foo"), FieldRules::new().keyed("k", Some(rule)))
        .unwrap();
    engine
        .register_field("b", Some("b"), json!("bar"), FieldRules::new().keyed("k", None))
        .unwrap();
    assert_eq!(engine.group_size("k"), 2);

    assert_ok!(engine.dispose("b"));
    assert!(engine.group_keys().is_empty());
    assert_eq!(engine.group_size("k"), 0);
    assert_eq!(engine.len(), 1);

    a.touch();
    assert!(engine.validate("a").await.is_empty());
    assert_ok!(engine.validate_all(None).await);
    assert!(calls.lock().is_empty());

    assert_ok!(engine.dispose("a"));
    assert!(engine.is_empty());
    assert_eq!(
        engine.dispose("a"),
        Err(EngineError::UnknownField(FieldId::from("a")))
    );
}

#[tokio::test]
async fn test_dispose_clears_orphaned_keyed_error() {
    let engine = ValidationEngine::new();
    let (rule, calls) = recording(0);
    let a = engine
        .register_field("a", Some("a"), json!(1), FieldRules::new().keyed("trio", Some(rule)))
        .unwrap();
    engine
        .register_field("b", Some("b"), json!(2), FieldRules::new().keyed("trio", None))
        .unwrap();
    engine
        .register_field(
            "c",
            Some("c"),
            json!(3),
            FieldRules::new().keyed("trio", Some(AllEqual.into_rule())),
        )
        .unwrap();

    assert_err!(engine.validate_all(None).await);
    assert_eq!(*calls.lock(), vec![vec![json!(1), json!(2), json!(3)]]);
    assert_eq!(engine.errors(), vec!["values do not match"]);

    assert_ok!(engine.dispose("b"));
    assert!(engine.errors().is_empty());
    assert!(!a.has_error());

    assert_ok!(engine.validate_all(None).await);
    assert_eq!(calls.lock().len(), 1);
}

#[tokio::test]
async fn test_registry_errors() {
    let engine = ValidationEngine::new();
    engine.register_field("a", None, json!(null), Vec::new()).unwrap();

    let err = engine.register_field("a", None, json!(null), Vec::new()).unwrap_err();
    assert_eq!(err, EngineError::DuplicateField(FieldId::from("a")));
    assert!(engine.touch("zzz").is_err());
    assert!(engine.set_value("zzz", json!(1)).is_err());
}

#[tokio::test]
async fn test_report_lists_failing_fields() {
    let engine = ValidationEngine::new();
    engine
        .register_field("n", Some("name"), json!(""), FieldRules::new().simple(NotEmpty.into_rule()))
        .unwrap();
    engine
        .register_field("m", Some("mail"), json!("a@b.co"), FieldRules::new().simple(IsEmail.into_rule()))
        .unwrap();

    assert_err!(engine.validate_all(None).await);
    let report = engine.report();
    assert_eq!(report.len(), 1);
    let name = report.get_field_errors("name").unwrap();
    assert_eq!(name.errors, vec!["should not be empty"]);
    assert!(report.get_field_errors("mail").is_none());
}

#[tokio::test]
async fn test_behavior_gating() {
    let engine = ValidationEngine::new();
    let (rule, calls) = recording(0);
    let field = engine
        .register_field(
            "a",
            Some("a"),
            json!("x"),
            vec![RuleSpec::simple(rule).behavior(ValidationBehavior::submit_only())],
        )
        .unwrap();
    field.touch();

    engine.validate("a").await;
    assert!(calls.lock().is_empty());

    assert_ok!(engine.submit().await);
    assert_eq!(calls.lock().len(), 1);
}
