//! Engine façade: the public surface UI bindings call.
//!
//! Each [`Engine`] owns one node store, one rule registry with its dependency
//! index, one scheduler, and one subscription bus. Instances are fully
//! independent — construct one per logical form; nothing is shared through
//! globals. `Engine` itself is a cheap `Clone` handle over shared internals
//! so bindings and effects can hold it.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use crate::bus::{SubscriberBus, SubscriptionId};
use crate::error::EngineError;
use crate::node::{NodeDescriptor, NodePatch, NodeState};
use crate::registry::RuleRegistry;
use crate::rule::{Rule, RuleInfo};
use crate::scheduler::{self, SchedState};
use crate::store::NodeStore;

// ---------------------------------------------------------------------------
// EngineOptions
// ---------------------------------------------------------------------------

/// Construction options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineOptions {
    /// Emit verbose `tracing` events for registration and evaluation.
    /// Never alters evaluation semantics.
    pub debug: bool,
}

impl EngineOptions {
    /// Create default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable debug tracing (builder).
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub(crate) struct EngineInner {
    pub(crate) store: RefCell<NodeStore>,
    pub(crate) rules: RefCell<RuleRegistry>,
    pub(crate) sched: RefCell<SchedState>,
    pub(crate) bus: RefCell<SubscriberBus>,
    pub(crate) debug: bool,
}

/// The reactive rule engine.
///
/// Single-threaded and synchronous: all propagation happens inline on the
/// calling stack of [`update_node`](Engine::update_node) /
/// [`evaluate_for_node`](Engine::evaluate_for_node), and the engine is fully
/// settled when those calls return.
#[derive(Clone)]
pub struct Engine {
    inner: Rc<EngineInner>,
}

impl Engine {
    /// Create an engine with default options.
    pub fn new() -> Self {
        Self::with_options(EngineOptions::default())
    }

    /// Create an engine with the given options.
    pub fn with_options(options: EngineOptions) -> Self {
        Self {
            inner: Rc::new(EngineInner {
                store: RefCell::new(NodeStore::new()),
                rules: RefCell::new(RuleRegistry::new()),
                sched: RefCell::new(SchedState::new()),
                bus: RefCell::new(SubscriberBus::new()),
                debug: options.debug,
            }),
        }
    }

    // -- node lifecycle ----------------------------------------------------

    /// Register a node. Re-registering an existing id is an idempotent no-op;
    /// the existing state is kept.
    pub fn register_node(&self, descriptor: NodeDescriptor) {
        let id = descriptor.id().to_owned();
        let inserted = self.inner.store.borrow_mut().register(descriptor);
        if self.inner.debug {
            debug!(node = %id, inserted, "register node");
        }
    }

    /// Unregister a node: removes it from the store and drops every
    /// dependency-index entry under its id. Later updates for the id are
    /// silent no-ops.
    pub fn unregister_node(&self, id: &str) {
        let removed = self.inner.store.borrow_mut().remove(id).is_some();
        self.inner.rules.borrow_mut().purge_node(id);
        if self.inner.debug {
            debug!(node = id, removed, "unregister node");
        }
    }

    /// Immutable snapshot of a node's state, or `None` if unregistered.
    pub fn get_node(&self, id: &str) -> Option<NodeState> {
        self.inner.store.borrow().get(id)
    }

    /// Patch a node and synchronously run every rule the change triggers.
    ///
    /// Subscribers receive exactly one notification per top-level call on a
    /// registered node, after propagation fully settles. Unknown ids are a
    /// debug-logged no-op with no notification.
    pub fn update_node(&self, id: &str, patch: NodePatch) {
        scheduler::run_update(&self.inner, id, &patch);
    }

    /// Number of registered nodes.
    pub fn node_count(&self) -> usize {
        self.inner.store.borrow().len()
    }

    // -- rule lifecycle ----------------------------------------------------

    /// Add a rule, replacing any existing definition with the same id.
    /// Malformed rules are rejected here, never inside a propagation pass.
    pub fn add_rule(&self, rule: Rule) -> Result<(), EngineError> {
        if self.inner.debug {
            debug!(rule = rule.id(), deps = rule.dependencies().len(), "add rule");
        }
        self.inner.rules.borrow_mut().insert(rule)
    }

    /// Add a batch of rules in one linear index extension.
    ///
    /// Equivalent to [`add_rule`](Engine::add_rule) per entry except that all
    /// rules are validated up front (on error nothing is inserted) and total
    /// cost is linear in the batch, independent of existing registry size.
    pub fn add_rules(&self, rules: Vec<Rule>) -> Result<(), EngineError> {
        if self.inner.debug {
            debug!(count = rules.len(), "add rule batch");
        }
        self.inner.rules.borrow_mut().insert_batch(rules)
    }

    /// Metadata for a registered rule, or `None` if unknown.
    pub fn get_rule(&self, id: &str) -> Option<RuleInfo> {
        self.inner.rules.borrow().info(id)
    }

    /// Remove a rule and all its dependency-index entries.
    /// Returns `false` if the id is unknown.
    pub fn remove_rule(&self, id: &str) -> bool {
        let removed = self.inner.rules.borrow_mut().remove(id);
        if self.inner.debug {
            debug!(rule = id, removed, "remove rule");
        }
        removed
    }

    /// Number of registered rules.
    pub fn rule_count(&self) -> usize {
        self.inner.rules.borrow().len()
    }

    // -- evaluation --------------------------------------------------------

    /// Run the rules that depend on `id` against current state without
    /// requiring a prior write — deterministic first-render evaluation.
    /// Notifies subscribers exactly once.
    pub fn evaluate_for_node(&self, id: &str) {
        if self.inner.debug {
            debug!(node = id, "forced evaluation");
        }
        scheduler::run_forced(&self.inner, id);
    }

    // -- subscriptions -----------------------------------------------------

    /// Subscribe to change notifications: `callback` runs once per completed
    /// evaluation pass, not per intermediate mutation.
    pub fn subscribe(&self, callback: impl Fn() + 'static) -> SubscriptionId {
        self.inner.bus.borrow_mut().subscribe(Rc::new(callback))
    }

    /// Cancel a subscription. Returns `false` if the id is unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.bus.borrow_mut().unsubscribe(id)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[test]
    fn register_and_get_node() {
        let engine = Engine::new();
        engine.register_node(NodeDescriptor::new("a").value("hello"));
        let state = engine.get_node("a").unwrap();
        assert_eq!(state.value.as_str(), Some("hello"));
        assert!(state.visible);
        assert_eq!(engine.node_count(), 1);
    }

    #[test]
    fn duplicate_registration_is_noop() {
        let engine = Engine::new();
        engine.register_node(NodeDescriptor::new("a").value("first"));
        let before = engine.get_node("a").unwrap();
        engine.register_node(NodeDescriptor::new("a").value("first"));
        assert_eq!(engine.get_node("a").unwrap(), before);
        assert_eq!(engine.node_count(), 1);
    }

    #[test]
    fn update_unknown_node_is_silent() {
        let engine = Engine::new();
        engine.update_node("ghost", NodePatch::new().value(1_i64));
        assert!(engine.get_node("ghost").is_none());
    }

    #[test]
    fn update_triggers_dependent_rule() {
        let engine = Engine::new();
        engine.register_node(NodeDescriptor::new("source"));
        engine.register_node(NodeDescriptor::new("derived"));
        engine
            .add_rule(Rule::new("mirror", ["source"], |ctx, snap| {
                let value = snap.value("source").cloned().unwrap_or(Value::Null);
                ctx.update("derived", NodePatch::new().value(value));
                Ok(())
            }))
            .unwrap();

        engine.update_node("source", NodePatch::new().value("copied"));
        assert_eq!(
            engine.get_node("derived").unwrap().value.as_str(),
            Some("copied")
        );
    }

    #[test]
    fn unchanged_write_does_not_trigger() {
        let engine = Engine::new();
        engine.register_node(NodeDescriptor::new("a").value("same"));
        let runs = Rc::new(Cell::new(0_u32));
        let runs_c = runs.clone();
        engine
            .add_rule(Rule::new("watch", ["a"], move |_, _| {
                runs_c.set(runs_c.get() + 1);
                Ok(())
            }))
            .unwrap();

        engine.update_node("a", NodePatch::new().value("same"));
        assert_eq!(runs.get(), 0);
        engine.update_node("a", NodePatch::new().value("different"));
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn condition_gates_effect() {
        let engine = Engine::new();
        engine.register_node(NodeDescriptor::new("gate").value(false));
        engine.register_node(NodeDescriptor::new("x"));
        let runs = Rc::new(Cell::new(0_u32));
        let runs_c = runs.clone();
        engine
            .add_rule(
                Rule::new("guarded", ["x"], move |_, _| {
                    runs_c.set(runs_c.get() + 1);
                    Ok(())
                })
                .with_condition(|snap| {
                    snap.value("gate").and_then(Value::as_bool).unwrap_or(false)
                }),
            )
            .unwrap();

        engine.update_node("x", NodePatch::new().value(1_i64));
        assert_eq!(runs.get(), 0);
        engine.update_node("gate", NodePatch::new().value(true));
        engine.update_node("x", NodePatch::new().value(2_i64));
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn evaluate_for_node_runs_without_a_write() {
        let engine = Engine::new();
        engine.register_node(NodeDescriptor::new("a").value("ab"));
        engine.register_node(NodeDescriptor::new("b"));
        engine
            .add_rule(Rule::new("len", ["a"], |ctx, snap| {
                let len = snap
                    .value("a")
                    .and_then(Value::as_str)
                    .map_or(0, str::len);
                ctx.update("b", NodePatch::new().value(len as i64));
                Ok(())
            }))
            .unwrap();

        // No update has happened; forced evaluation runs against initial state.
        engine.evaluate_for_node("a");
        assert_eq!(engine.get_node("b").unwrap().value.as_int(), Some(2));
    }

    #[test]
    fn rule_replacement_uses_new_definition() {
        let engine = Engine::new();
        engine.register_node(NodeDescriptor::new("a"));
        engine.register_node(NodeDescriptor::new("out"));
        engine
            .add_rule(Rule::new("r", ["a"], |ctx, _| {
                ctx.update("out", NodePatch::new().value("old"));
                Ok(())
            }))
            .unwrap();
        engine
            .add_rule(Rule::new("r", ["a"], |ctx, _| {
                ctx.update("out", NodePatch::new().value("new"));
                Ok(())
            }))
            .unwrap();
        assert_eq!(engine.rule_count(), 1);

        engine.update_node("a", NodePatch::new().value(1_i64));
        assert_eq!(engine.get_node("out").unwrap().value.as_str(), Some("new"));
    }

    #[test]
    fn get_rule_metadata() {
        let engine = Engine::new();
        engine
            .add_rule(Rule::new("r", ["a", "b"], |_, _| Ok(())).with_priority(3))
            .unwrap();
        let info = engine.get_rule("r").unwrap();
        assert_eq!(info.id, "r");
        assert_eq!(info.dependencies, ["a", "b"]);
        assert_eq!(info.priority, 3);
        assert!(engine.get_rule("missing").is_none());
    }

    #[test]
    fn remove_rule_stops_triggering() {
        let engine = Engine::new();
        engine.register_node(NodeDescriptor::new("a"));
        let runs = Rc::new(Cell::new(0_u32));
        let runs_c = runs.clone();
        engine
            .add_rule(Rule::new("r", ["a"], move |_, _| {
                runs_c.set(runs_c.get() + 1);
                Ok(())
            }))
            .unwrap();
        assert!(engine.remove_rule("r"));
        assert!(!engine.remove_rule("r"));

        engine.update_node("a", NodePatch::new().value(1_i64));
        assert_eq!(runs.get(), 0);
    }

    #[test]
    fn add_rule_rejects_malformed() {
        let engine = Engine::new();
        let err = engine.add_rule(Rule::new("", ["a"], |_, _| Ok(()))).unwrap_err();
        assert_eq!(err, EngineError::EmptyRuleId);
    }

    #[test]
    fn one_notification_per_update() {
        let engine = Engine::new();
        engine.register_node(NodeDescriptor::new("a"));
        engine.register_node(NodeDescriptor::new("b"));
        engine
            .add_rule(Rule::new("spread", ["a"], |ctx, _| {
                ctx.update("b", NodePatch::new().value(1_i64));
                ctx.update("b", NodePatch::new().value(2_i64));
                Ok(())
            }))
            .unwrap();
        let notifications = Rc::new(Cell::new(0_u32));
        let notifications_c = notifications.clone();
        engine.subscribe(move || notifications_c.set(notifications_c.get() + 1));

        engine.update_node("a", NodePatch::new().value("go"));
        // Two transitive writes, one pass, one notification.
        assert_eq!(notifications.get(), 1);
    }

    #[test]
    fn no_notification_for_unknown_node_update() {
        let engine = Engine::new();
        let notifications = Rc::new(Cell::new(0_u32));
        let notifications_c = notifications.clone();
        engine.subscribe(move || notifications_c.set(notifications_c.get() + 1));
        engine.update_node("ghost", NodePatch::new().value(1_i64));
        assert_eq!(notifications.get(), 0);
    }

    #[test]
    fn unsubscribe_stops_notifications() {
        let engine = Engine::new();
        engine.register_node(NodeDescriptor::new("a"));
        let notifications = Rc::new(Cell::new(0_u32));
        let notifications_c = notifications.clone();
        let sub = engine.subscribe(move || notifications_c.set(notifications_c.get() + 1));

        engine.update_node("a", NodePatch::new().value(1_i64));
        assert_eq!(notifications.get(), 1);

        assert!(engine.unsubscribe(sub));
        engine.update_node("a", NodePatch::new().value(2_i64));
        assert_eq!(notifications.get(), 1);
    }

    #[test]
    fn unregister_purges_index_and_silences_updates() {
        let engine = Engine::new();
        engine.register_node(NodeDescriptor::new("x"));
        let runs = Rc::new(Cell::new(0_u32));
        let runs_c = runs.clone();
        engine
            .add_rule(Rule::new("r", ["x"], move |_, _| {
                runs_c.set(runs_c.get() + 1);
                Ok(())
            }))
            .unwrap();

        engine.unregister_node("x");
        assert!(engine.get_node("x").is_none());
        engine.update_node("x", NodePatch::new().value(1_i64));
        engine.evaluate_for_node("x");
        assert_eq!(runs.get(), 0);
    }

    #[test]
    fn engines_are_independent() {
        let a = Engine::new();
        let b = Engine::new();
        a.register_node(NodeDescriptor::new("shared").value("a"));
        b.register_node(NodeDescriptor::new("shared").value("b"));
        a.update_node("shared", NodePatch::new().value("a2"));
        assert_eq!(a.get_node("shared").unwrap().value.as_str(), Some("a2"));
        assert_eq!(b.get_node("shared").unwrap().value.as_str(), Some("b"));
    }

    #[test]
    fn debug_option_does_not_alter_semantics() {
        let quiet = Engine::new();
        let verbose = Engine::with_options(EngineOptions::new().debug(true));
        for engine in [&quiet, &verbose] {
            engine.register_node(NodeDescriptor::new("a"));
            engine.register_node(NodeDescriptor::new("b"));
            engine
                .add_rule(Rule::new("r", ["a"], |ctx, snap| {
                    let v = snap.value("a").cloned().unwrap_or(Value::Null);
                    ctx.update("b", NodePatch::new().value(v));
                    Ok(())
                }))
                .unwrap();
            engine.update_node("a", NodePatch::new().value(9_i64));
        }
        assert_eq!(quiet.get_node("b"), verbose.get_node("b"));
    }

    #[test]
    fn nested_update_through_engine_handle_joins_pass() {
        let engine = Engine::new();
        engine.register_node(NodeDescriptor::new("a"));
        engine.register_node(NodeDescriptor::new("b"));
        let handle = engine.clone();
        engine
            .add_rule(Rule::new("via_handle", ["a"], move |_, _| {
                // Writing through a captured handle instead of the ctx.
                handle.update_node("b", NodePatch::new().value("nested"));
                Ok(())
            }))
            .unwrap();
        let notifications = Rc::new(Cell::new(0_u32));
        let notifications_c = notifications.clone();
        engine.subscribe(move || notifications_c.set(notifications_c.get() + 1));

        engine.update_node("a", NodePatch::new().value(1_i64));
        assert_eq!(engine.get_node("b").unwrap().value.as_str(), Some("nested"));
        // Still a single pass, single notification.
        assert_eq!(notifications.get(), 1);
    }

    #[test]
    fn subscriber_order_is_subscription_order() {
        let engine = Engine::new();
        engine.register_node(NodeDescriptor::new("a"));
        let log = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let log_c = log.clone();
            engine.subscribe(move || log_c.borrow_mut().push(i));
        }
        engine.update_node("a", NodePatch::new().value(1_i64));
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
    }
}
