//! Rule registry and inverted dependency index.
//!
//! Rules live in a slotmap arena; the index maps node id → keys of the rules
//! that depend on it. The index is consulted on every single node update, so
//! it is maintained incrementally — batch insertion extends it once per
//! dependency, never by rescanning existing state.

use std::collections::HashMap;
use std::rc::Rc;

use slotmap::{new_key_type, SlotMap};

use crate::error::EngineError;
use crate::rule::{ConditionFn, EffectFn, Rule, RuleInfo};

new_key_type! {
    /// Key into the rule arena. Copy, lightweight (u64).
    pub(crate) struct RuleKey;
}

#[derive(Debug)]
struct StoredRule {
    rule: Rule,
    /// Monotonic insertion sequence; tiebreak after priority so rule order is
    /// deterministic. Replacing a rule assigns a fresh sequence.
    seq: u64,
}

// ---------------------------------------------------------------------------
// RuleRegistry
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub(crate) struct RuleRegistry {
    rules: SlotMap<RuleKey, StoredRule>,
    by_id: HashMap<String, RuleKey>,
    /// Inverted index: node id → rules whose dependencies include it.
    index: HashMap<String, Vec<RuleKey>>,
    next_seq: u64,
}

impl RuleRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Insert a rule, replacing any existing definition with the same id.
    ///
    /// Replacement removes the old definition's index entries first, so
    /// dependencies the new definition no longer lists leave no stale index
    /// state behind.
    pub(crate) fn insert(&mut self, rule: Rule) -> Result<(), EngineError> {
        rule.validate()?;
        self.insert_validated(rule);
        Ok(())
    }

    /// Insert a batch of rules.
    ///
    /// All rules are validated up front; on error nothing is inserted. Total
    /// insertion cost is linear in the combined dependency count, independent
    /// of existing registry size.
    pub(crate) fn insert_batch(&mut self, rules: Vec<Rule>) -> Result<(), EngineError> {
        for rule in &rules {
            rule.validate()?;
        }
        self.rules.reserve(rules.len());
        self.by_id.reserve(rules.len());
        for rule in rules {
            self.insert_validated(rule);
        }
        Ok(())
    }

    fn insert_validated(&mut self, rule: Rule) {
        if let Some(old_key) = self.by_id.remove(rule.id()) {
            self.unindex(old_key);
            self.rules.remove(old_key);
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        let id = rule.id().to_owned();
        let deps = rule.dependencies().to_vec();
        let key = self.rules.insert(StoredRule { rule, seq });
        self.by_id.insert(id, key);
        for dep in deps {
            self.index.entry(dep).or_default().push(key);
        }
    }

    /// Remove a rule and all its index entries. Returns `false` if unknown.
    pub(crate) fn remove(&mut self, id: &str) -> bool {
        let Some(key) = self.by_id.remove(id) else {
            return false;
        };
        self.unindex(key);
        self.rules.remove(key);
        true
    }

    fn unindex(&mut self, key: RuleKey) {
        let Some(stored) = self.rules.get(key) else {
            return;
        };
        for dep in stored.rule.dependencies().to_vec() {
            if let Some(bucket) = self.index.get_mut(&dep) {
                bucket.retain(|&k| k != key);
                if bucket.is_empty() {
                    self.index.remove(&dep);
                }
            }
        }
    }

    /// Metadata snapshot for a rule.
    pub(crate) fn info(&self, id: &str) -> Option<RuleInfo> {
        let stored = self.rules.get(*self.by_id.get(id)?)?;
        Some(RuleInfo {
            id: stored.rule.id().to_owned(),
            dependencies: stored.rule.dependencies().to_vec(),
            priority: stored.rule.priority(),
        })
    }

    /// Keys of the rules that depend on `node_id`, sorted by
    /// (priority, insertion sequence) ascending.
    pub(crate) fn triggered_by(&self, node_id: &str) -> Vec<RuleKey> {
        let Some(bucket) = self.index.get(node_id) else {
            return Vec::new();
        };
        let mut ordered: Vec<(i32, u64, RuleKey)> = bucket
            .iter()
            .filter_map(|&key| {
                let stored = self.rules.get(key)?;
                Some((stored.rule.priority(), stored.seq, key))
            })
            .collect();
        ordered.sort_unstable_by_key(|&(priority, seq, _)| (priority, seq));
        ordered.into_iter().map(|(_, _, key)| key).collect()
    }

    /// Clone out a rule's id and closures for execution.
    ///
    /// Owned `Rc` clones let the scheduler run the closures without holding a
    /// borrow on the registry, so effects may re-enter the engine freely.
    #[allow(clippy::type_complexity)]
    pub(crate) fn fx(
        &self,
        key: RuleKey,
    ) -> Option<(String, Option<Rc<ConditionFn>>, Rc<EffectFn>)> {
        let stored = self.rules.get(key)?;
        Some((
            stored.rule.id().to_owned(),
            stored.rule.condition.clone(),
            stored.rule.effect.clone(),
        ))
    }

    /// Drop the index bucket for a node that is being unregistered.
    ///
    /// Rule definitions keep their dependency lists; re-adding a rule
    /// re-indexes it.
    pub(crate) fn purge_node(&mut self, node_id: &str) {
        self.index.remove(node_id);
    }

    /// Whether any rule is indexed under `node_id`. Distinguishes a missing
    /// bucket from an empty one, which `triggered_by` cannot.
    #[cfg(test)]
    pub(crate) fn has_index_for(&self, node_id: &str) -> bool {
        self.index.contains_key(node_id)
    }

    pub(crate) fn len(&self) -> usize {
        self.rules.len()
    }
}
