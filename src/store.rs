//! Node store: canonical state of every registered node.
//!
//! Total operations over its own state — no failure recovery lives here
//! (that belongs to the scheduler). Unknown-node writes surface as `None` so
//! the caller can log and move on; UI teardown races make them expected.

use std::collections::HashMap;

use crate::node::{NodeDescriptor, NodePatch, NodeState};
use crate::value::Value;

// ---------------------------------------------------------------------------
// NodeStore
// ---------------------------------------------------------------------------

/// id → [`NodeState`] map owned by the engine.
#[derive(Debug, Default)]
pub(crate) struct NodeStore {
    nodes: HashMap<String, NodeState>,
}

impl NodeStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a node. Duplicate registration is an idempotent no-op:
    /// the existing state is kept and `false` is returned.
    pub(crate) fn register(&mut self, descriptor: NodeDescriptor) -> bool {
        let NodeDescriptor { id, state } = descriptor;
        if self.nodes.contains_key(&id) {
            return false;
        }
        self.nodes.insert(id, state);
        true
    }

    /// Cloned snapshot of a node's state. Never a live reference.
    pub(crate) fn get(&self, id: &str) -> Option<NodeState> {
        self.nodes.get(id).cloned()
    }

    /// Shallow-merge `patch` into the node.
    ///
    /// Returns `None` if the node is unknown, otherwise `Some(changed)`.
    pub(crate) fn apply(&mut self, id: &str, patch: &NodePatch) -> Option<bool> {
        let state = self.nodes.get_mut(id)?;
        Some(patch.apply_to(state))
    }

    /// Remove a node, returning its final state if it existed.
    pub(crate) fn remove(&mut self, id: &str) -> Option<NodeState> {
        self.nodes.remove(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Owned, read-only copy of all node state for rule evaluation.
    pub(crate) fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            nodes: self.nodes.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// StateSnapshot
// ---------------------------------------------------------------------------

/// Read-only copy of all node state at one point in a propagation pass.
///
/// Handed to rule conditions and effects. Owned and detached: mutating the
/// engine from an effect never invalidates the snapshot the effect is
/// reading, and nothing an effect does to a snapshot can corrupt the store.
#[derive(Debug, Clone)]
pub struct StateSnapshot {
    nodes: HashMap<String, NodeState>,
}

impl StateSnapshot {
    /// The state of a node, or `None` if it is not registered.
    pub fn node(&self, id: &str) -> Option<&NodeState> {
        self.nodes.get(id)
    }

    /// The value of a node, or `None` if it is not registered.
    pub fn value(&self, id: &str) -> Option<&Value> {
        self.nodes.get(id).map(|n| &n.value)
    }

    /// Whether a node exists and is visible. Unknown nodes are `false`.
    pub fn is_visible(&self, id: &str) -> bool {
        self.nodes.get(id).is_some_and(|n| n.visible)
    }

    /// Whether a node exists and is disabled. Unknown nodes are `false`.
    pub fn is_disabled(&self, id: &str) -> bool {
        self.nodes.get(id).is_some_and(|n| n.disabled)
    }

    /// Whether a node with this id exists in the snapshot.
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of nodes captured.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
