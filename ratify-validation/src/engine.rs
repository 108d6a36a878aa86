//! The validation engine.
//!
//! [`ValidationEngine`] is the field registry and the orchestrator of
//! validation passes. Entry points that start rule work are plain functions:
//! they do every synchronous step (touching fields, evaluating behaviors,
//! running synchronous rules) before returning, and hand back a future that
//! only collects outcomes. Asynchronous rules and debounce timers run as
//! spawned tasks, so a Tokio runtime must be current.
//!
//! ```no_run
//! use ratify_validation::{FieldRules, Rule, ValidationEngine};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let engine = ValidationEngine::new();
//! let rules = FieldRules::new().simple(Rule::sync(|values| {
//!     values[0].as_str().filter(|s| s.is_empty()).map(|_| "required".to_string())
//! }));
//! let field = engine
//!     .register_field("email", Some("email"), json!(""), rules)
//!     .unwrap();
//!
//! field.touch();
//! engine.validate("email").await;
//! assert_eq!(engine.errors(), vec!["required"]);
//! # }
//! ```

use crate::cancel::{Canceller, cancellable};
use crate::field::ValidatorMode;
use crate::{
    EngineConfig, EngineError, EngineResult, Field, FieldErrors, FieldId, FormError, GroupMember,
    GroupRegistry, Invocation, PendingCounter, Rollback, RuleSpec, Trigger,
    ValidationError, ValidationReport, Validator,
};
use futures::FutureExt;
use futures::future::{BoxFuture, JoinAll, join_all};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

type FormOutcome = Result<(), FormError>;

struct FieldEntry {
    field: Arc<Field>,
    simple: Vec<Validator>,
    simple_eager: Vec<Validator>,
    keys: Vec<String>,
    rollbacks: Vec<Rollback>,
}

/// Validators of one field, cloned out of the registry so no lock is held
/// while rules run.
struct Plan {
    field: Arc<Field>,
    simple: Vec<Validator>,
    eager: Vec<Validator>,
    keys: Vec<String>,
}

/// Decrements the submitting counter when a submit settles or is dropped.
struct SubmitGuard(Arc<AtomicUsize>);

impl Drop for SubmitGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Field registry and validation orchestrator.
pub struct ValidationEngine {
    config: EngineConfig,
    fields: RwLock<Vec<FieldEntry>>,
    groups: GroupRegistry,
    pending: Arc<PendingCounter>,
    submitting: Arc<AtomicUsize>,
    cancellers: Arc<Mutex<Vec<Canceller<FormOutcome>>>>,
}

impl ValidationEngine {
    /// Create an engine with default configuration.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create an engine with custom configuration.
    pub fn with_config(config: EngineConfig) -> Self {
        debug!(
            "Engine config - default_debounce_ms: {:?}, log_rule_faults: {}",
            config.default_debounce_ms, config.log_rule_faults
        );
        Self {
            config,
            fields: RwLock::new(Vec::new()),
            groups: GroupRegistry::new(),
            pending: Arc::new(PendingCounter::new()),
            submitting: Arc::new(AtomicUsize::new(0)),
            cancellers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register a field with its ordered rule slots.
    ///
    /// Keyed rules join their group here. The caller owns change
    /// notification: call [`on_value_changed`](Self::on_value_changed) (or
    /// write through [`set_value`](Self::set_value)) when the value changes.
    pub fn register_field(
        &self,
        id: impl Into<FieldId>,
        name: Option<&str>,
        value: Value,
        rules: impl IntoIterator<Item = RuleSpec>,
    ) -> EngineResult<Arc<Field>> {
        let id = id.into();
        let specs: Vec<RuleSpec> = rules.into_iter().collect();

        let mut fields = self.fields.write();
        if fields.iter().any(|e| e.field.id() == &id) {
            return Err(EngineError::DuplicateField(id));
        }

        let field = Field::new(
            id.clone(),
            name.map(str::to_string),
            value,
            &specs,
            Arc::clone(&self.pending),
            &self.config,
        );

        let mut entry = FieldEntry {
            field: Arc::clone(&field),
            simple: Vec::new(),
            simple_eager: Vec::new(),
            keys: Vec::new(),
            rollbacks: Vec::new(),
        };

        for (slot, spec) in specs.iter().enumerate() {
            let validator = Validator::new(Arc::clone(&field), slot, ValidatorMode::Debounced);
            let eager = Validator::new(Arc::clone(&field), slot, ValidatorMode::Eager);
            match spec.key() {
                None => {
                    entry.simple.push(validator);
                    entry.simple_eager.push(eager);
                }
                Some(key) => {
                    let rollback = self.groups.join(key, GroupMember { validator, eager });
                    entry.rollbacks.push(rollback);
                    if !entry.keys.iter().any(|k| k == key) {
                        entry.keys.push(key.to_string());
                    }
                }
            }
        }

        debug!(
            field = %id,
            rules = specs.len(),
            keys = ?entry.keys,
            "registered field"
        );
        fields.push(entry);
        Ok(field)
    }

    /// Look up a field by id.
    pub fn field(&self, id: impl AsRef<str>) -> Option<Arc<Field>> {
        let id = id.as_ref();
        self.fields
            .read()
            .iter()
            .find(|e| e.field.id().as_str() == id)
            .map(|e| Arc::clone(&e.field))
    }

    /// Look up the first field registered under a logical name.
    pub fn field_by_name(&self, name: &str) -> Option<Arc<Field>> {
        self.fields
            .read()
            .iter()
            .find(|e| e.field.name() == Some(name))
            .map(|e| Arc::clone(&e.field))
    }

    /// Ids of all registered fields, in registration order.
    pub fn field_ids(&self) -> Vec<FieldId> {
        self.fields
            .read()
            .iter()
            .map(|e| e.field.id().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.fields.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.read().is_empty()
    }

    /// Mark a field touched.
    pub fn touch(&self, id: impl AsRef<str>) -> EngineResult<()> {
        let field = self.field_or_err(id.as_ref())?;
        field.touch();
        Ok(())
    }

    /// Write a field's value, then notify the engine of the change.
    pub fn set_value(
        &self,
        id: impl AsRef<str>,
        value: Value,
    ) -> EngineResult<JoinAll<Invocation>> {
        let id = id.as_ref();
        self.field_or_err(id)?.set_value(value);
        Ok(self.on_value_changed(id))
    }

    /// Change notification from the binding layer. Revalidates the field if
    /// it is touched.
    pub fn on_value_changed(&self, id: impl AsRef<str>) -> JoinAll<Invocation> {
        self.validate(id)
    }

    /// Validate one field: its simple rules plus every keyed group it
    /// belongs to, through the gated, debounced path.
    ///
    /// Does nothing unless the field is touched. Outcomes are settled-all;
    /// one rejection never stops the others.
    pub fn validate(&self, id: impl AsRef<str>) -> JoinAll<Invocation> {
        let id = id.as_ref();
        let Some(plan) = self.plan(id) else {
            debug!(field = id, "validate on unknown field");
            return join_all(Vec::new());
        };
        if !plan.field.touched() {
            return join_all(Vec::new());
        }

        let value = plan.field.value();
        let mut invocations: Vec<Invocation> = plan
            .simple
            .iter()
            .filter_map(|v| v.call(vec![value.clone()], Trigger::CHANGE))
            .collect();
        for key in &plan.keys {
            invocations.extend(self.groups.validate_debounced(key, plan.field.id()));
        }

        join_all(invocations)
    }

    /// Validate the whole form, or only the fields whose name is in
    /// `names` (plus the keyed groups they take part in).
    ///
    /// Every participating field is touched first and rules run through
    /// their eager validators with `submit` set. Fails with
    /// [`FormError::Invalid`] if any rule produced an error, or with
    /// [`FormError::Cancelled`] if [`reset_fields`](Self::reset_fields) is
    /// called before the pass settles.
    pub fn validate_all(&self, names: Option<&[&str]>) -> BoxFuture<'static, FormOutcome> {
        let (canceller, cancellable) = cancellable();
        {
            let mut cancellers = self.cancellers.lock();
            cancellers.retain(|c| !c.is_settled());
            cancellers.push(canceller.clone());
        }

        let plans = self.select(names);
        for plan in &plans {
            plan.field.touch();
        }

        let mut keys: Vec<String> = Vec::new();
        for plan in &plans {
            for key in &plan.keys {
                if !keys.contains(key) {
                    keys.push(key.clone());
                }
            }
        }
        let mut invocations: Vec<Invocation> = Vec::new();
        for plan in &plans {
            let value = plan.field.value();
            invocations.extend(
                plan.eager
                    .iter()
                    .filter_map(|v| v.call(vec![value.clone()], Trigger::SUBMIT)),
            );
        }
        // group members outside `names` are touched here as well
        for key in &keys {
            invocations.extend(self.groups.validate_eager(key));
        }
        debug!(
            fields = plans.len(),
            groups = keys.len(),
            invocations = invocations.len(),
            "validate_all started"
        );

        let work = join_all(invocations);
        let cancellers = Arc::clone(&self.cancellers);
        async move {
            let outcome = cancellable
                .race(async move {
                    let settled = work.await;
                    if settled.iter().any(Result::is_err) {
                        Err(FormError::Invalid(ValidationError))
                    } else {
                        Ok(())
                    }
                })
                .await;
            cancellers.lock().retain(|c| !Canceller::ptr_eq(c, &canceller));
            outcome
        }
        .boxed()
    }

    /// Whole-form validation on behalf of a submit; sets
    /// [`submitting`](Self::submitting) until it settles.
    pub fn submit(&self) -> BoxFuture<'static, FormOutcome> {
        self.submitting.fetch_add(1, Ordering::SeqCst);
        let guard = SubmitGuard(Arc::clone(&self.submitting));
        let pass = self.validate_all(None);
        async move {
            let outcome = pass.await;
            drop(guard);
            match &outcome {
                Ok(()) => info!("submit passed validation"),
                Err(e) => info!("submit rejected: {}", e),
            }
            outcome
        }
        .boxed()
    }

    /// Reset every field and cancel in-flight whole-form passes. Fields and
    /// groups stay registered.
    pub fn reset_fields(&self) {
        let cancellers = mem::take(&mut *self.cancellers.lock());
        let cancelled = cancellers
            .iter()
            .filter(|c| c.resolve(Err(FormError::Cancelled)))
            .count();

        let fields: Vec<Arc<Field>> = self
            .fields
            .read()
            .iter()
            .map(|e| Arc::clone(&e.field))
            .collect();
        for field in &fields {
            field.reset();
        }
        info!(fields = fields.len(), cancelled, "reset all fields");
    }

    /// Remove a field: dissolve every keyed group it belongs to, drop it
    /// from the registry and dispose it.
    pub fn dispose(&self, id: impl AsRef<str>) -> EngineResult<()> {
        let id = id.as_ref();
        let entry = {
            let mut fields = self.fields.write();
            let position = fields
                .iter()
                .position(|e| e.field.id().as_str() == id)
                .ok_or_else(|| EngineError::UnknownField(FieldId::from(id)))?;
            fields.remove(position)
        };

        for rollback in entry.rollbacks {
            rollback.run();
        }
        entry.field.dispose();
        debug!(field = id, "disposed field");
        Ok(())
    }

    /// Every field's errors, concatenated in registration order.
    pub fn errors(&self) -> Vec<String> {
        self.fields
            .read()
            .iter()
            .flat_map(|e| e.field.errors())
            .collect()
    }

    /// Per-field error snapshot.
    pub fn report(&self) -> ValidationReport {
        ValidationReport::new(
            self.fields
                .read()
                .iter()
                .map(|e| FieldErrors {
                    id: e.field.id().clone(),
                    name: e.field.name().map(str::to_string),
                    errors: e.field.errors(),
                })
                .collect(),
        )
    }

    pub fn has_error(&self) -> bool {
        self.fields.read().iter().any(|e| e.field.has_error())
    }

    /// Sum of every field's in-flight evaluations.
    pub fn pending_count(&self) -> usize {
        self.pending.count()
    }

    pub fn validating(&self) -> bool {
        self.pending.is_pending()
    }

    /// Whether a [`submit`](Self::submit) is outstanding.
    pub fn submitting(&self) -> bool {
        self.submitting.load(Ordering::SeqCst) > 0
    }

    /// Keys of all live keyed groups, sorted.
    pub fn group_keys(&self) -> Vec<String> {
        self.groups.keys()
    }

    /// Member count of a keyed group (0 if absent).
    pub fn group_size(&self, key: &str) -> usize {
        self.groups.size(key)
    }

    fn field_or_err(&self, id: &str) -> EngineResult<Arc<Field>> {
        self.field(id)
            .ok_or_else(|| EngineError::UnknownField(FieldId::from(id)))
    }

    fn plan(&self, id: &str) -> Option<Plan> {
        self.fields
            .read()
            .iter()
            .find(|e| e.field.id().as_str() == id)
            .map(Self::plan_for)
    }

    fn select(&self, names: Option<&[&str]>) -> Vec<Plan> {
        let fields = self.fields.read();
        match names {
            None => fields.iter().map(Self::plan_for).collect(),
            Some(names) => {
                let plans: Vec<Plan> = fields
                    .iter()
                    .filter(|e| e.field.name().is_some_and(|n| names.contains(&n)))
                    .map(Self::plan_for)
                    .collect();
                if plans.is_empty() && !names.is_empty() {
                    warn!(?names, "validate_all matched no fields");
                }
                plans
            }
        }
    }

    fn plan_for(entry: &FieldEntry) -> Plan {
        Plan {
            field: Arc::clone(&entry.field),
            simple: entry.simple.clone(),
            eager: entry.simple_eager.clone(),
            keys: entry.keys.clone(),
        }
    }
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self::new()
    }
}
