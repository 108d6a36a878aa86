//! Form fields and their rule validators.
//!
//! A [`Field`] owns one value, its touched/dirty flags, one error slot per
//! declared rule and the bookkeeping for in-flight rule evaluations. Rules
//! run through [`Validator`] handles: one debounced and one eager handle per
//! rule slot.
//!
//! Asynchronous rule evaluations run as spawned tasks. Each one takes a
//! generation ticket; only a result whose ticket is still current may write
//! the error slot. Superseded results still reach their direct caller as
//! [`RuleError::Stale`].

use crate::debounce::{Debouncer, Fired};
use crate::generation::{GenerationBuffer, Ticket, TicketStatus};
use crate::{
    BehaviorContext, EngineConfig, PendingCounter, Rule, RuleError, RuleOutput, RuleRejection,
    RuleSpec, Settled, Trigger, ValidationBehavior,
};
use futures::FutureExt;
use futures::future::{self, BoxFuture};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Borrow;
use std::fmt;
use std::future::Future;
use std::mem;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

/// Caller-supplied unique field identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldId(String);

impl FieldId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Random v4 UUID id, for callers without a natural key.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FieldId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for FieldId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for FieldId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for FieldId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Future of one rule invocation.
///
/// Synchronous rules are already settled when this is returned;
/// asynchronous and debounced ones settle when their evaluation finishes.
/// The evaluation itself runs regardless of whether this is awaited.
#[must_use = "dropping an invocation discards its outcome but not the evaluation"]
pub struct Invocation {
    inner: BoxFuture<'static, Settled>,
}

impl Invocation {
    fn ready(outcome: Settled) -> Self {
        Self {
            inner: future::ready(outcome).boxed(),
        }
    }

    fn spawned(handle: tokio::task::JoinHandle<Settled>) -> Self {
        Self {
            inner: async move {
                handle.await.unwrap_or_else(|e| {
                    warn!("rule evaluation task failed: {}", e);
                    Ok(())
                })
            }
            .boxed(),
        }
    }

    fn waiting(rx: oneshot::Receiver<Settled>) -> Self {
        // a dropped sender means the burst was torn down
        Self {
            inner: async move { rx.await.unwrap_or(Ok(())) }.boxed(),
        }
    }
}

impl Future for Invocation {
    type Output = Settled;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Settled> {
        self.inner.as_mut().poll(cx)
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Invocation(..)")
    }
}

struct RuleSlot {
    behavior: ValidationBehavior,
    rule: Option<Rule>,
    key: Option<String>,
    debouncer: Option<Arc<Debouncer<Vec<Value>>>>,
}

struct FieldState {
    value: Value,
    touched: bool,
    dirty: bool,
    raw_errors: Vec<Option<String>>,
    generations: Vec<GenerationBuffer>,
    pending: usize,
    epoch: u64,
    disposed: bool,
}

impl FieldState {
    fn has_error(&self) -> bool {
        self.raw_errors.iter().any(Option::is_some)
    }
}

/// One form value under validation
pub struct Field {
    id: FieldId,
    name: Option<String>,
    initial: Value,
    slots: Vec<RuleSlot>,
    state: Mutex<FieldState>,
    engine_pending: Arc<PendingCounter>,
    log_faults: bool,
}

impl Field {
    pub(crate) fn new(
        id: FieldId,
        name: Option<String>,
        value: Value,
        specs: &[RuleSpec],
        engine_pending: Arc<PendingCounter>,
        config: &EngineConfig,
    ) -> Arc<Self> {
        let slots: Vec<RuleSlot> = specs
            .iter()
            .map(|spec| RuleSlot {
                behavior: spec.behavior.clone(),
                rule: spec.rule().cloned(),
                key: spec.key().map(str::to_string),
                debouncer: spec
                    .debounce
                    .or_else(|| config.default_debounce())
                    .map(Debouncer::new),
            })
            .collect();

        let state = FieldState {
            value: value.clone(),
            touched: false,
            dirty: false,
            raw_errors: vec![None; slots.len()],
            generations: slots.iter().map(|_| GenerationBuffer::new()).collect(),
            pending: 0,
            epoch: 0,
            disposed: false,
        };

        Arc::new(Self {
            id,
            name,
            initial: value,
            slots,
            state: Mutex::new(state),
            engine_pending,
            log_faults: config.log_rule_faults,
        })
    }

    pub fn id(&self) -> &FieldId {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Current value (a copy).
    pub fn value(&self) -> Value {
        self.state.lock().value.clone()
    }

    /// The value `reset` restores.
    pub fn initial_value(&self) -> &Value {
        &self.initial
    }

    /// Write the value and mark the field dirty.
    ///
    /// Does not revalidate; see
    /// [`ValidationEngine::set_value`](crate::ValidationEngine::set_value).
    pub fn set_value(&self, value: Value) {
        let mut state = self.state.lock();
        if state.disposed {
            debug!(field = %self.id, "ignoring write to disposed field");
            return;
        }
        state.value = value;
        state.dirty = true;
    }

    pub fn touched(&self) -> bool {
        self.state.lock().touched
    }

    pub fn set_touched(&self, touched: bool) {
        self.state.lock().touched = touched;
    }

    /// Mark the field as validation-eligible.
    pub fn touch(&self) {
        self.set_touched(true);
    }

    pub fn dirty(&self) -> bool {
        self.state.lock().dirty
    }

    /// One slot per rule, `None` meaning no error.
    pub fn raw_errors(&self) -> Vec<Option<String>> {
        self.state.lock().raw_errors.clone()
    }

    /// Error messages in rule order.
    pub fn errors(&self) -> Vec<String> {
        self.state.lock().raw_errors.iter().flatten().cloned().collect()
    }

    pub fn has_error(&self) -> bool {
        self.state.lock().has_error()
    }

    /// In-flight rule evaluations, including debounced attempts waiting for
    /// their trailing call.
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending
    }

    pub fn validating(&self) -> bool {
        self.pending_count() > 0
    }

    pub fn rule_count(&self) -> usize {
        self.slots.len()
    }

    /// Group key of a rule slot, if it is keyed.
    pub fn rule_key(&self, slot: usize) -> Option<&str> {
        self.slots.get(slot).and_then(|s| s.key.as_deref())
    }

    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    /// Restore the initial value and clear all validation state.
    pub fn reset(&self) {
        self.reset_to(self.initial.clone());
    }

    /// Restore `value` and clear all validation state.
    ///
    /// Cancels debounced bursts, revokes every outstanding generation ticket
    /// and returns this field's pending contribution to the engine. Results of
    /// evaluations still in flight become inert.
    pub fn reset_to(&self, value: Value) {
        self.cancel_bursts();
        let mut state = self.state.lock();
        state.value = value;
        state.touched = false;
        state.dirty = false;
        for error in state.raw_errors.iter_mut() {
            *error = None;
        }
        self.revoke_locked(&mut state);
        debug!(field = %self.id, "field reset");
    }

    /// Permanently detach the field. Called once by the owning engine.
    pub(crate) fn dispose(&self) {
        self.cancel_bursts();
        let mut state = self.state.lock();
        state.disposed = true;
        self.revoke_locked(&mut state);
        debug!(field = %self.id, "field disposed");
    }

    /// Forget a keyed slot's outcome once its group has dissolved.
    ///
    /// A pending burst is dropped and in-flight results are superseded, so
    /// nothing arriving later writes the slot.
    pub(crate) fn clear_slot(&self, slot: usize) {
        let dropped = self.slots[slot].debouncer.as_ref().map_or(0, |d| d.cancel());
        let mut state = self.state.lock();
        self.end_pending_locked(&mut state, dropped);
        state.raw_errors[slot] = None;
        state.generations[slot].issue();
        trace!(field = %self.id, slot, dropped, "keyed slot cleared");
    }

    fn cancel_bursts(&self) {
        for slot in &self.slots {
            if let Some(debouncer) = &slot.debouncer {
                // the discarded attempts are part of the pending count that
                // revoke_locked hands back
                debouncer.cancel();
            }
        }
    }

    fn revoke_locked(&self, state: &mut FieldState) {
        for generation in state.generations.iter_mut() {
            generation.revoke_all();
        }
        state.epoch += 1;
        let contributed = mem::take(&mut state.pending);
        self.engine_pending.end(contributed);
        trace!(field = %self.id, contributed, "pending revoked");
    }

    /// Retire `n` in-flight evaluations begun in `epoch`. Returns `false`
    /// (changing nothing) if the field was reset since.
    pub(crate) fn end_pending(&self, epoch: u64, n: usize) -> bool {
        let mut state = self.state.lock();
        if state.epoch != epoch {
            return false;
        }
        self.end_pending_locked(&mut state, n);
        true
    }

    /// Count `n` new in-flight evaluations on the field and the engine.
    fn begin_pending_locked(&self, state: &mut FieldState, n: usize) {
        state.pending += n;
        self.engine_pending.begin(n);
    }

    fn end_pending_locked(&self, state: &mut FieldState, n: usize) {
        let n = n.min(state.pending);
        state.pending -= n;
        self.engine_pending.end(n);
    }

    fn epoch(&self) -> u64 {
        self.state.lock().epoch
    }

    /// Evaluate the slot's behavior. Returns the epoch the decision was
    /// taken in, or `None` if the attempt is declined.
    fn admit(&self, slot: usize, trigger: Trigger) -> Option<u64> {
        let state = self.state.lock();
        if state.disposed {
            return None;
        }
        let ctx = BehaviorContext {
            value: &state.value,
            touched: state.touched,
            dirty: state.dirty,
            has_error: state.has_error(),
            force: trigger.force,
            submit: trigger.submit,
        };
        self.slots[slot].behavior.allows(&ctx).then_some(state.epoch)
    }

    /// Invoke `rule` for `slot` right away. Nothing is recorded if the field
    /// was reset after `epoch`.
    fn run_rule(
        self: &Arc<Self>,
        slot: usize,
        rule: &Rule,
        args: Vec<Value>,
        epoch: u64,
    ) -> Invocation {
        let output = match std::panic::catch_unwind(AssertUnwindSafe(|| rule.invoke(&args))) {
            Ok(output) => output,
            Err(_) => {
                warn!(field = %self.id, slot, "rule panicked; treating as no error");
                RuleOutput::Ready(None)
            }
        };

        match output {
            RuleOutput::Ready(result) => {
                let mut state = self.state.lock();
                if state.epoch != epoch {
                    trace!(field = %self.id, slot, "field reset during sync rule; discarded");
                    return Invocation::ready(Self::stale(result));
                }
                let ticket = state.generations[slot].issue();
                trace!(field = %self.id, slot, ?ticket, "sync rule settled");
                Invocation::ready(Self::set_error(&mut state, slot, result))
            }
            RuleOutput::Pending(future) => {
                let ticket = {
                    let mut state = self.state.lock();
                    if state.epoch != epoch {
                        trace!(field = %self.id, slot, "field reset before async rule started");
                        return Invocation::ready(Ok(()));
                    }
                    self.begin_pending_locked(&mut state, 1);
                    state.generations[slot].issue()
                };
                trace!(field = %self.id, slot, ?ticket, "async rule started");

                let field = Arc::clone(self);
                Invocation::spawned(tokio::spawn(async move {
                    let result = match AssertUnwindSafe(future).catch_unwind().await {
                        Ok(Ok(result)) => result,
                        Ok(Err(RuleRejection::Message(message))) => Some(message),
                        Ok(Err(RuleRejection::Fault(fault))) => {
                            if field.log_faults {
                                warn!(field = %field.id, slot, "rule fault treated as no error: {}", fault);
                            }
                            None
                        }
                        Err(_) => {
                            warn!(field = %field.id, slot, "rule panicked; treating as no error");
                            None
                        }
                    };
                    field.settle(slot, ticket, result)
                }))
            }
        }
    }

    fn settle(&self, slot: usize, ticket: Ticket, result: Option<String>) -> Settled {
        let mut state = self.state.lock();
        let status = state.generations[slot].status(ticket);
        trace!(field = %self.id, slot, ?ticket, ?status, "async rule settled");
        match status {
            TicketStatus::Current => {
                self.end_pending_locked(&mut state, 1);
                Self::set_error(&mut state, slot, result)
            }
            TicketStatus::Superseded => {
                self.end_pending_locked(&mut state, 1);
                Self::stale(result)
            }
            TicketStatus::Revoked => Self::stale(result),
        }
    }

    fn set_error(state: &mut FieldState, slot: usize, result: Option<String>) -> Settled {
        match result {
            Some(message) => {
                state.raw_errors[slot] = Some(message.clone());
                Err(RuleError::Failed(message))
            }
            None => {
                state.raw_errors[slot] = None;
                Ok(())
            }
        }
    }

    fn stale(result: Option<String>) -> Settled {
        match result {
            Some(message) => Err(RuleError::Stale(message)),
            None => Ok(()),
        }
    }

    fn attempt_debounced(
        self: &Arc<Self>,
        slot: usize,
        debouncer: &Arc<Debouncer<Vec<Value>>>,
        rule: Rule,
        args: Vec<Value>,
        epoch: u64,
    ) -> Invocation {
        {
            let mut state = self.state.lock();
            if state.epoch != epoch {
                return Invocation::ready(Ok(()));
            }
            self.begin_pending_locked(&mut state, 1);
        }

        let field = Arc::clone(self);
        let rx = debouncer.attempt(args, move |fired: Fired<Vec<Value>>| {
            if field.epoch() != epoch {
                return future::ready(Ok(())).boxed();
            }
            let invocation = field.run_rule(slot, &rule, fired.args, epoch);
            field.end_pending(epoch, fired.attempts);
            invocation.boxed()
        });
        Invocation::waiting(rx)
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Field")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("value", &state.value)
            .field("touched", &state.touched)
            .field("dirty", &state.dirty)
            .field("raw_errors", &state.raw_errors)
            .field("pending", &state.pending)
            .finish()
    }
}

/// How a [`Validator`] schedules its rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidatorMode {
    /// Honors the slot's debounce window, if any
    Debounced,
    /// Runs immediately; used by whole-form validation
    Eager,
}

/// Callable handle for one rule slot of one field.
#[derive(Clone)]
pub struct Validator {
    field: Arc<Field>,
    slot: usize,
    mode: ValidatorMode,
}

impl Validator {
    pub(crate) fn new(field: Arc<Field>, slot: usize, mode: ValidatorMode) -> Self {
        Self { field, slot, mode }
    }

    pub fn field(&self) -> &Arc<Field> {
        &self.field
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn mode(&self) -> ValidatorMode {
        self.mode
    }

    /// Whether this slot carries a rule of its own.
    pub fn has_rule(&self) -> bool {
        self.field.slots[self.slot].rule.is_some()
    }

    /// Attempt the slot's rule with `args`.
    ///
    /// Returns `None`, having done nothing, when the behavior declines or
    /// the slot has no rule.
    pub fn call(&self, args: Vec<Value>, trigger: Trigger) -> Option<Invocation> {
        let rule_slot = &self.field.slots[self.slot];
        let rule = rule_slot.rule.clone()?;
        let Some(epoch) = self.field.admit(self.slot, trigger) else {
            trace!(field = %self.field.id, slot = self.slot, "behavior skipped attempt");
            return None;
        };

        match (&rule_slot.debouncer, self.mode) {
            (Some(debouncer), ValidatorMode::Debounced) => {
                Some(self.field.attempt_debounced(self.slot, debouncer, rule, args, epoch))
            }
            _ => Some(self.field.run_rule(self.slot, &rule, args, epoch)),
        }
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("field", &self.field.id)
            .field("slot", &self.slot)
            .field("mode", &self.mode)
            .finish()
    }
}
