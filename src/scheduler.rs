//! Evaluation scheduler: deterministic, depth-first rule propagation.
//!
//! A top-level write (or forced evaluation) opens a *pass*. Within a pass,
//! triggering a node runs the rules indexed under it in (priority, insertion
//! order); each effect's [`EffectCtx::update`] call synchronously recurses
//! into the target node's rules before returning, so a chain of
//! rule → node → rule fully settles before the outer effect continues.
//! When the outermost call unwinds, the bus flushes exactly one notification.
//!
//! Guard state is explicit, not borrowed from the call stack:
//!
//! - `running` — node ids currently being propagated on the stack. Re-entering
//!   one is a dynamic cycle; it is skipped with a logged warning. Effects may
//!   write nodes outside their declared dependencies, so cycles can only be
//!   caught here, at propagation time.
//! - `executed` — rules already run this pass. A rule whose dependencies
//!   overlap fires at most once per top-level trigger.
//!
//! Rule failures are contained at the per-rule boundary: an effect returning
//! `Err` or a panicking condition/effect is logged and the pass continues.
//! Patches already applied stay applied; patches are not transactional.

use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use tracing::{debug, warn};

use crate::engine::EngineInner;
use crate::node::{NodePatch, NodeState};
use crate::registry::RuleKey;

// ---------------------------------------------------------------------------
// Pass state
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub(crate) struct SchedState {
    /// Node ids on the current propagation stack.
    running: HashSet<String>,
    /// Rules already executed in the current pass.
    executed: HashSet<RuleKey>,
    /// Whether a top-level pass is open.
    pass_active: bool,
    /// Current propagation depth, for tracing.
    depth: usize,
}

impl SchedState {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// EffectCtx
// ---------------------------------------------------------------------------

/// Write handle passed to rule effects.
///
/// The sanctioned way for a rule to mutate node state. `update` propagates
/// depth-first: by the time it returns, every rule transitively triggered by
/// the write has run.
pub struct EffectCtx<'a> {
    inner: &'a Rc<EngineInner>,
}

impl EffectCtx<'_> {
    /// Patch a node and synchronously propagate if the patch changed state.
    ///
    /// Unknown targets are a logged no-op (UI teardown races are expected);
    /// unchanged writes do not re-trigger rules.
    pub fn update(&mut self, id: &str, patch: NodePatch) {
        // Bind first: matching on the expression directly would hold the
        // store's `RefMut` across the recursive trigger.
        let applied = self.inner.store.borrow_mut().apply(id, &patch);
        match applied {
            None => debug!(node = id, "effect update for unknown node ignored"),
            Some(true) => trigger(self.inner, id),
            Some(false) => {}
        }
    }

    /// Read a node's *live* state — unlike the snapshot, this sees writes
    /// made earlier in the same effect.
    pub fn get(&self, id: &str) -> Option<NodeState> {
        self.inner.store.borrow().get(id)
    }
}

// ---------------------------------------------------------------------------
// Pass entry points
// ---------------------------------------------------------------------------

/// Top-level write: apply the patch, propagate on change, notify once.
///
/// A nested call (an effect writing through a captured engine handle) joins
/// the pass already open instead of notifying again.
pub(crate) fn run_update(inner: &Rc<EngineInner>, id: &str, patch: &NodePatch) {
    let Some(changed) = inner.store.borrow_mut().apply(id, patch) else {
        debug!(node = id, "update for unknown node ignored");
        return;
    };
    let outermost = begin_pass(inner);
    if changed {
        trigger(inner, id);
    }
    if outermost {
        finish_pass(inner);
    }
}

/// Forced evaluation: run the rules indexed under `id` against current state
/// without requiring a prior write. Used for deterministic first-render
/// evaluation.
pub(crate) fn run_forced(inner: &Rc<EngineInner>, id: &str) {
    let outermost = begin_pass(inner);
    trigger(inner, id);
    if outermost {
        finish_pass(inner);
    }
}

/// Open a pass if none is active. Returns whether this call is outermost.
fn begin_pass(inner: &Rc<EngineInner>) -> bool {
    let mut sched = inner.sched.borrow_mut();
    if sched.pass_active {
        return false;
    }
    sched.pass_active = true;
    sched.running.clear();
    sched.executed.clear();
    sched.depth = 0;
    true
}

/// Close the pass and flush exactly one notification to subscribers.
fn finish_pass(inner: &Rc<EngineInner>) {
    {
        let mut sched = inner.sched.borrow_mut();
        sched.pass_active = false;
        sched.running.clear();
        sched.executed.clear();
        sched.depth = 0;
    }
    // Callbacks run with no borrows held; they may re-enter the engine.
    let callbacks = inner.bus.borrow().callbacks();
    for callback in callbacks {
        callback();
    }
}

// ---------------------------------------------------------------------------
// Propagation
// ---------------------------------------------------------------------------

/// Unmarks a node as running when its `trigger` frame exits, including via
/// unwind — a panic escaping a nested frame must not leave stale `running`
/// entries (or a drifted depth) for the rest of the pass.
struct RunningGuard<'a> {
    inner: &'a Rc<EngineInner>,
    node_id: &'a str,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        let mut sched = self.inner.sched.borrow_mut();
        sched.running.remove(self.node_id);
        sched.depth = sched.depth.saturating_sub(1);
    }
}

/// Run the rules indexed under `node_id`, depth-first.
pub(crate) fn trigger(inner: &Rc<EngineInner>, node_id: &str) {
    {
        let mut sched = inner.sched.borrow_mut();
        if sched.running.contains(node_id) {
            warn!(node = node_id, "propagation cycle detected, skipping re-entry");
            return;
        }
        sched.running.insert(node_id.to_owned());
        sched.depth += 1;
    }
    let _guard = RunningGuard { inner, node_id };

    let keys = inner.rules.borrow().triggered_by(node_id);
    if inner.debug {
        let depth = inner.sched.borrow().depth;
        debug!(node = node_id, rules = keys.len(), depth, "evaluating node");
    }

    for key in keys {
        // A rule fires at most once per pass, even when its dependency set
        // overlaps the nodes its own cascade touches.
        if inner.sched.borrow().executed.contains(&key) {
            continue;
        }
        // Clone the closures out so no registry borrow is held while they run.
        let Some((rule_id, condition, effect)) = inner.rules.borrow().fx(key) else {
            continue;
        };
        let snapshot = inner.store.borrow().snapshot();

        let should_run = match &condition {
            None => true,
            Some(cond) => match catch_unwind(AssertUnwindSafe(|| cond(&snapshot))) {
                Ok(result) => result,
                Err(_) => {
                    warn!(rule = %rule_id, "rule condition panicked, skipping rule");
                    false
                }
            },
        };
        if !should_run {
            if inner.debug {
                debug!(rule = %rule_id, "condition false, effect skipped");
            }
            // Not marked executed: another dependency changing later in this
            // pass may satisfy the condition and the rule must still fire.
            continue;
        }

        inner.sched.borrow_mut().executed.insert(key);
        let mut ctx = EffectCtx { inner };
        match catch_unwind(AssertUnwindSafe(|| effect(&mut ctx, &snapshot))) {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                warn!(rule = %rule_id, error = %error, "rule effect failed, continuing pass");
            }
            Err(_) => {
                warn!(rule = %rule_id, "rule effect panicked, continuing pass");
            }
        }
    }
}
