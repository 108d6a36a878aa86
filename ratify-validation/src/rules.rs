// Rules and per-field rule declarations

use crate::{AsyncRule, RuleRejection, SyncRule, ValidationBehavior};
use futures::future::BoxFuture;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Future produced by an asynchronous rule.
pub type RuleFuture = BoxFuture<'static, Result<Option<String>, RuleRejection>>;

/// What a rule returns when invoked.
pub enum RuleOutput {
    /// Synchronous result: `None` passes, `Some(message)` fails
    Ready(Option<String>),
    /// Pending computation resolving to the same thing
    Pending(RuleFuture),
}

impl RuleOutput {
    /// Passing result.
    pub fn ok() -> Self {
        RuleOutput::Ready(None)
    }

    /// Failing result.
    pub fn error(message: impl Into<String>) -> Self {
        RuleOutput::Ready(Some(message.into()))
    }

    /// Wrap a future as a pending result.
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = Result<Option<String>, RuleRejection>> + Send + 'static,
    {
        RuleOutput::Pending(Box::pin(future))
    }
}

impl fmt::Debug for RuleOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleOutput::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            RuleOutput::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

type RuleFn = dyn Fn(&[Value]) -> RuleOutput + Send + Sync;

/// A validation rule. Cheap to clone; immutable once built.
#[derive(Clone)]
pub struct Rule {
    inner: Arc<RuleFn>,
}

impl Rule {
    /// Create a rule from a function returning a [`RuleOutput`].
    pub fn new<F>(rule: F) -> Self
    where
        F: Fn(&[Value]) -> RuleOutput + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(rule),
        }
    }

    /// Create a synchronous rule.
    ///
    /// # Examples
    ///
    /// ```
    /// use ratify_validation::Rule;
    ///
    /// let rule = Rule::sync(|values| match values[0].as_str() {
    ///     Some("") | None => Some("required".to_string()),
    ///     Some(_) => None,
    /// });
    /// # let _ = rule;
    /// ```
    pub fn sync<F>(rule: F) -> Self
    where
        F: Fn(&[Value]) -> Option<String> + Send + Sync + 'static,
    {
        Self::new(move |values| RuleOutput::Ready(rule(values)))
    }

    /// Create an asynchronous rule from an async closure.
    pub fn future<F, Fut>(rule: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<String>, RuleRejection>> + Send + 'static,
    {
        Self::new(move |values| RuleOutput::pending(rule(values.to_vec())))
    }

    /// Create a rule from a [`SyncRule`] implementation.
    pub fn from_sync<R>(rule: R) -> Self
    where
        R: SyncRule + 'static,
    {
        Self::new(move |values| RuleOutput::Ready(rule.check(values)))
    }

    /// Create a rule from an [`AsyncRule`] implementation.
    pub fn from_async<R>(rule: R) -> Self
    where
        R: AsyncRule + 'static,
    {
        let rule = Arc::new(rule);
        Self::new(move |values| {
            let rule = Arc::clone(&rule);
            let values = values.to_vec();
            RuleOutput::pending(async move { rule.check(values).await })
        })
    }

    pub(crate) fn invoke(&self, values: &[Value]) -> RuleOutput {
        (self.inner)(values)
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule").finish_non_exhaustive()
    }
}

/// Which rule a slot runs.
#[derive(Debug, Clone)]
pub enum RuleTarget {
    /// Rule bound to this field alone
    Simple(Rule),
    /// Rule shared by every field declaring the same key.
    ///
    /// A member declared without a rule still contributes its value and
    /// its touched state to the group, but runs nothing itself.
    Keyed { key: String, rule: Option<Rule> },
}

/// Declaration of one rule slot on a field.
///
/// Slot order is significant: the index of a spec is the index of its
/// error in [`Field::raw_errors`](crate::Field::raw_errors).
#[derive(Debug, Clone)]
pub struct RuleSpec {
    pub behavior: ValidationBehavior,
    pub target: RuleTarget,
    pub debounce: Option<Duration>,
}

impl RuleSpec {
    /// Simple rule with the default behavior and no debounce.
    pub fn simple(rule: Rule) -> Self {
        Self {
            behavior: ValidationBehavior::default(),
            target: RuleTarget::Simple(rule),
            debounce: None,
        }
    }

    /// Keyed rule; pass `None` to join the group without running a rule.
    pub fn keyed(key: impl Into<String>, rule: Option<Rule>) -> Self {
        Self {
            behavior: ValidationBehavior::default(),
            target: RuleTarget::Keyed {
                key: key.into(),
                rule,
            },
            debounce: None,
        }
    }

    /// Set the gating behavior.
    pub fn behavior(mut self, behavior: ValidationBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Debounce attempts by the given window.
    pub fn debounce(mut self, window: Duration) -> Self {
        self.debounce = Some(window);
        self
    }

    /// Debounce attempts by the given window in milliseconds.
    pub fn debounce_ms(self, ms: u64) -> Self {
        self.debounce(Duration::from_millis(ms))
    }

    /// Group key, if this is a keyed rule.
    pub fn key(&self) -> Option<&str> {
        match &self.target {
            RuleTarget::Simple(_) => None,
            RuleTarget::Keyed { key, .. } => Some(key),
        }
    }

    pub(crate) fn rule(&self) -> Option<&Rule> {
        match &self.target {
            RuleTarget::Simple(rule) => Some(rule),
            RuleTarget::Keyed { rule, .. } => rule.as_ref(),
        }
    }
}

/// Builder for the ordered rule list of one field
#[derive(Debug, Clone, Default)]
pub struct FieldRules {
    specs: Vec<RuleSpec>,
}

impl FieldRules {
    /// Create an empty rule list
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule slot
    #[allow(clippy::should_implement_trait)]
    pub fn add(mut self, spec: RuleSpec) -> Self {
        self.specs.push(spec);
        self
    }

    /// Add a simple rule with the default behavior
    pub fn simple(self, rule: Rule) -> Self {
        self.add(RuleSpec::simple(rule))
    }

    /// Add a keyed rule with the default behavior
    pub fn keyed(self, key: impl Into<String>, rule: Option<Rule>) -> Self {
        self.add(RuleSpec::keyed(key, rule))
    }

    /// Number of rule slots
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Check if no rules were added
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl IntoIterator for FieldRules {
    type Item = RuleSpec;
    type IntoIter = std::vec::IntoIter<RuleSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.specs.into_iter()
    }
}

impl From<Vec<RuleSpec>> for FieldRules {
    fn from(specs: Vec<RuleSpec>) -> Self {
        Self { specs }
    }
}
