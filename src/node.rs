//! Node types: state, registration descriptors, patches.

use crate::value::Value;

// ---------------------------------------------------------------------------
// NodeState
// ---------------------------------------------------------------------------

/// The mutable state of a single registered node.
///
/// Returned to callers only as cloned snapshots — never as a live reference
/// into the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeState {
    /// The node's value. Opaque to the engine.
    pub value: Value,
    /// Whether the bound field is visible.
    pub visible: bool,
    /// Whether the bound field is disabled.
    pub disabled: bool,
    /// Validation error message, if any.
    pub error: Option<String>,
}

impl Default for NodeState {
    fn default() -> Self {
        Self {
            value: Value::Null,
            visible: true,
            disabled: false,
            error: None,
        }
    }
}

// ---------------------------------------------------------------------------
// NodeDescriptor
// ---------------------------------------------------------------------------

/// Registration payload: a node id plus its initial state.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDescriptor {
    pub(crate) id: String,
    pub(crate) state: NodeState,
}

impl NodeDescriptor {
    /// Create a descriptor with default state (null value, visible, enabled).
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: NodeState::default(),
        }
    }

    /// Set the initial value (builder).
    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.state.value = value.into();
        self
    }

    /// Set initial visibility (builder).
    pub fn visible(mut self, visible: bool) -> Self {
        self.state.visible = visible;
        self
    }

    /// Set the initial disabled flag (builder).
    pub fn disabled(mut self, disabled: bool) -> Self {
        self.state.disabled = disabled;
        self
    }

    /// Set an initial error message (builder).
    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.state.error = Some(error.into());
        self
    }

    /// The node id.
    pub fn id(&self) -> &str {
        &self.id
    }
}

// ---------------------------------------------------------------------------
// NodePatch
// ---------------------------------------------------------------------------

/// A shallow-merge patch against a node's state.
///
/// Every field is optional; absent fields are left untouched. The `error`
/// field distinguishes "set to this message" from "clear" via
/// [`NodePatch::error`] and [`NodePatch::clear_error`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodePatch {
    value: Option<Value>,
    visible: Option<bool>,
    disabled: Option<bool>,
    error: Option<Option<String>>,
}

impl NodePatch {
    /// Create an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Patch the value (builder).
    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Patch visibility (builder).
    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = Some(visible);
        self
    }

    /// Patch the disabled flag (builder).
    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = Some(disabled);
        self
    }

    /// Patch the error message (builder).
    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(Some(error.into()));
        self
    }

    /// Clear any error message (builder).
    pub fn clear_error(mut self) -> Self {
        self.error = Some(None);
        self
    }

    /// Whether the patch touches no fields at all.
    pub fn is_empty(&self) -> bool {
        self.value.is_none()
            && self.visible.is_none()
            && self.disabled.is_none()
            && self.error.is_none()
    }

    /// Shallow-merge this patch into `state`.
    ///
    /// Returns `true` if any field actually changed. Propagation is gated on
    /// this: writing a value a node already holds does not re-trigger rules.
    pub(crate) fn apply_to(&self, state: &mut NodeState) -> bool {
        let mut changed = false;
        if let Some(value) = &self.value {
            if state.value != *value {
                state.value = value.clone();
                changed = true;
            }
        }
        if let Some(visible) = self.visible {
            if state.visible != visible {
                state.visible = visible;
                changed = true;
            }
        }
        if let Some(disabled) = self.disabled {
            if state.disabled != disabled {
                state.disabled = disabled;
                changed = true;
            }
        }
        if let Some(error) = &self.error {
            if state.error != *error {
                state.error = error.clone();
                changed = true;
            }
        }
        changed
    }
}
