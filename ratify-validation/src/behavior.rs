//! Validation behaviors.
//!
//! A behavior is the gate in front of every rule attempt. It is evaluated
//! freshly on each attempt, including each debounced attempt, and a `false`
//! answer skips the attempt entirely: no rule call, no state change, no
//! pending work.
//!
//! ```
//! use ratify_validation::{BehaviorContext, ValidationBehavior};
//! use serde_json::json;
//!
//! let behavior = ValidationBehavior::touched().or(ValidationBehavior::submit_only());
//! let value = json!("");
//! let ctx = BehaviorContext {
//!     value: &value,
//!     touched: false,
//!     dirty: false,
//!     has_error: false,
//!     force: false,
//!     submit: true,
//! };
//! assert!(behavior.allows(&ctx));
//! ```

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Field state handed to a behavior for one attempt.
#[derive(Debug, Clone, Copy)]
pub struct BehaviorContext<'a> {
    pub value: &'a Value,
    pub touched: bool,
    pub dirty: bool,
    pub has_error: bool,
    pub force: bool,
    pub submit: bool,
}

/// Why an attempt is being made.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Trigger {
    /// Revalidation requested on behalf of another field
    pub force: bool,
    /// Whole-form validation
    pub submit: bool,
}

impl Trigger {
    /// Plain revalidation after a change.
    pub const CHANGE: Trigger = Trigger {
        force: false,
        submit: false,
    };

    /// Forced revalidation.
    pub const FORCED: Trigger = Trigger {
        force: true,
        submit: false,
    };

    /// Whole-form validation.
    pub const SUBMIT: Trigger = Trigger {
        force: false,
        submit: true,
    };
}

type Predicate = dyn Fn(&BehaviorContext<'_>) -> bool + Send + Sync;

/// Gating predicate deciding whether a rule attempt runs.
#[derive(Clone)]
pub struct ValidationBehavior {
    name: &'static str,
    predicate: Arc<Predicate>,
}

impl ValidationBehavior {
    /// Create a custom behavior.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&BehaviorContext<'_>) -> bool + Send + Sync + 'static,
    {
        Self::named("custom", predicate)
    }

    fn named<F>(name: &'static str, predicate: F) -> Self
    where
        F: Fn(&BehaviorContext<'_>) -> bool + Send + Sync + 'static,
    {
        Self {
            name,
            predicate: Arc::new(predicate),
        }
    }

    /// Evaluate the behavior.
    #[inline]
    pub fn allows(&self, ctx: &BehaviorContext<'_>) -> bool {
        (self.predicate)(ctx)
    }

    /// Preset name, or `"custom"`.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Run on every attempt.
    pub fn always() -> Self {
        Self::named("always", |_| true)
    }

    /// Never run.
    pub fn never() -> Self {
        Self::named("never", |_| false)
    }

    /// Run once the field is touched.
    pub fn touched() -> Self {
        Self::named("touched", |ctx| ctx.touched)
    }

    /// Run once the value has changed since creation or reset.
    pub fn dirty() -> Self {
        Self::named("dirty", |ctx| ctx.dirty)
    }

    /// Run once touched, and always on submit.
    pub fn touched_or_submit() -> Self {
        Self::named("touched_or_submit", |ctx| ctx.touched || ctx.submit)
    }

    /// Run on submit only.
    pub fn submit_only() -> Self {
        Self::named("submit_only", |ctx| ctx.submit)
    }

    /// Stay quiet until the field already shows an error; then revalidate
    /// eagerly. Forced attempts and submit always run.
    pub fn eager_after_error() -> Self {
        Self::named("eager_after_error", |ctx| {
            (ctx.touched && ctx.has_error) || ctx.force || ctx.submit
        })
    }

    /// Run when touched and dirty, or on submit.
    pub fn lazy() -> Self {
        Self::named("lazy", |ctx| (ctx.touched && ctx.dirty) || ctx.submit)
    }

    /// Either behavior allows.
    pub fn or(self, other: ValidationBehavior) -> Self {
        Self::named("custom", move |ctx| self.allows(ctx) || other.allows(ctx))
    }

    /// Both behaviors allow.
    pub fn and(self, other: ValidationBehavior) -> Self {
        Self::named("custom", move |ctx| self.allows(ctx) && other.allows(ctx))
    }
}

impl Default for ValidationBehavior {
    fn default() -> Self {
        Self::touched_or_submit()
    }
}

impl fmt::Debug for ValidationBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ValidationBehavior").field(&self.name).finish()
    }
}
