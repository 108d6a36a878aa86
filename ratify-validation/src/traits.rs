// Rule traits

use crate::{Rule, RuleRejection};
use async_trait::async_trait;
use serde_json::Value;

/// A synchronous validation rule.
///
/// Receives one value for a simple rule, or one value per group member
/// (in member-registration order) for a keyed rule. Returns the error
/// message on failure.
pub trait SyncRule: Send + Sync {
    fn check(&self, values: &[Value]) -> Option<String>;

    /// Wrap into a [`Rule`].
    fn into_rule(self) -> Rule
    where
        Self: Sized + 'static,
    {
        Rule::from_sync(self)
    }
}

/// Trait for async rules (e.g., uniqueness checks against a backend)
#[async_trait]
pub trait AsyncRule: Send + Sync {
    /// Resolve to `Ok(Some(message))` or `Err(RuleRejection::Message(..))` to fail.
    async fn check(&self, values: Vec<Value>) -> Result<Option<String>, RuleRejection>;
}
