// Keyed (cross-field) rule groups

use crate::{FieldId, Invocation, Trigger, Validator};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// One field's participation in a keyed group.
#[derive(Debug, Clone)]
pub struct GroupMember {
    /// Gated validator used on change
    pub validator: Validator,
    /// Immediate validator used by whole-form validation
    pub eager: Validator,
}

impl GroupMember {
    fn field_id(&self) -> &FieldId {
        self.validator.field().id()
    }
}

/// Fields sharing a group key, in registration order
#[derive(Debug, Clone)]
pub struct KeyedRuleGroup {
    pub key: String,
    pub members: Vec<GroupMember>,
}

impl KeyedRuleGroup {
    /// Current value of every member, in registration order.
    fn values(&self) -> Vec<Value> {
        self.members
            .iter()
            .map(|m| m.validator.field().value())
            .collect()
    }

    fn all_touched(&self) -> bool {
        self.members.iter().all(|m| m.validator.field().touched())
    }
}

/// Undo for one registration step, run when the field is disposed.
pub struct Rollback(Box<dyn FnOnce() + Send + Sync>);

impl Rollback {
    pub fn new<F>(undo: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self(Box::new(undo))
    }

    pub fn run(self) {
        (self.0)()
    }
}

impl fmt::Debug for Rollback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Rollback(..)")
    }
}

/// Registry of keyed groups, shared with the rollbacks it hands out.
#[derive(Debug, Clone, Default)]
pub struct GroupRegistry {
    groups: Arc<Mutex<HashMap<String, KeyedRuleGroup>>>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member to `key`, creating the group on first use.
    ///
    /// The returned rollback dissolves the group: a keyed rule never runs
    /// with a member missing.
    pub fn join(&self, key: &str, member: GroupMember) -> Rollback {
        let field_id = member.field_id().clone();
        let slot = member.validator.slot();

        self.groups
            .lock()
            .entry(key.to_string())
            .or_insert_with(|| {
                debug!(key, "creating keyed rule group");
                KeyedRuleGroup {
                    key: key.to_string(),
                    members: Vec::new(),
                }
            })
            .members
            .push(member);

        let registry = self.clone();
        let key = key.to_string();
        Rollback::new(move || registry.leave(&key, &field_id, slot))
    }

    fn leave(&self, key: &str, field_id: &FieldId, slot: usize) {
        let group = {
            let mut groups = self.groups.lock();
            let joined = groups.get(key).is_some_and(|g| {
                g.members
                    .iter()
                    .any(|m| m.field_id() == field_id && m.validator.slot() == slot)
            });
            if !joined {
                return;
            }
            match groups.remove(key) {
                Some(group) => group,
                None => return,
            }
        };

        let mut orphaned = 0;
        for member in group.members.iter().filter(|m| m.field_id() != field_id) {
            member.validator.field().clear_slot(member.validator.slot());
            orphaned += 1;
        }
        debug!(key, field = %field_id, orphaned, "dissolved keyed rule group");
    }

    fn snapshot(&self, key: &str) -> Option<KeyedRuleGroup> {
        self.groups.lock().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.groups.lock().contains_key(key)
    }

    /// Number of members in `key`, or 0 if the group does not exist.
    pub fn size(&self, key: &str) -> usize {
        self.groups.lock().get(key).map_or(0, |g| g.members.len())
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.groups.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Gated path, used when `origin` asks for revalidation.
    ///
    /// Nothing runs unless every member is touched. Members other than
    /// `origin` are attempted with `force` set.
    pub fn validate_debounced(&self, key: &str, origin: &FieldId) -> Vec<Invocation> {
        let Some(group) = self.snapshot(key) else {
            return Vec::new();
        };
        if !group.all_touched() {
            trace!(key, "keyed group not fully touched; skipping");
            return Vec::new();
        }

        let values = group.values();
        group
            .members
            .iter()
            .filter_map(|member| {
                let trigger = if member.field_id() == origin {
                    Trigger::CHANGE
                } else {
                    Trigger::FORCED
                };
                member.validator.call(values.clone(), trigger)
            })
            .collect()
    }

    /// Whole-form path: touch every member, then run each member's eager
    /// validator with the shared values.
    pub fn validate_eager(&self, key: &str) -> Vec<Invocation> {
        let Some(group) = self.snapshot(key) else {
            return Vec::new();
        };
        for member in &group.members {
            member.eager.field().touch();
        }

        let values = group.values();
        group
            .members
            .iter()
            .filter_map(|member| member.eager.call(values.clone(), Trigger::SUBMIT))
            .collect()
    }
}
