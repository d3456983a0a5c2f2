//! # rulegraph
//!
//! A reactive rule engine for form state: named nodes hold mutable state
//! (value / visible / disabled / error), rules declare which nodes they
//! depend on, and an inverted dependency index plus a deterministic
//! depth-first scheduler propagate every change to completion — safely, even
//! through long transitive chains — before control returns to the caller.
//!
//! ## Core Systems
//!
//! - **[`value`]** — The opaque-to-the-engine node value type
//! - **[`node`]** — Node state, registration descriptors, shallow-merge patches
//! - **[`store`]** — Canonical node store and read-only state snapshots
//! - **[`rule`]** — Rule definitions: dependencies, priority, condition, effect
//! - **[`registry`]** — Slotmap-backed rule arena with the inverted dependency index
//! - **[`scheduler`]** — Depth-first propagation with cycle skip and per-rule fault isolation
//! - **[`bus`]** — Subscriptions: one aggregated notification per evaluation pass
//! - **[`engine`]** — The [`Engine`] façade tying everything together
//!
//! ## Example
//!
//! ```
//! use rulegraph::{Engine, NodeDescriptor, NodePatch, Rule, Value};
//!
//! let engine = Engine::new();
//! engine.register_node(NodeDescriptor::new("country"));
//! engine.register_node(NodeDescriptor::new("state"));
//!
//! engine.add_rule(Rule::new("state_visibility", ["country"], |ctx, snap| {
//!     let is_us = snap.value("country").and_then(Value::as_str) == Some("US");
//!     ctx.update("state", NodePatch::new().visible(is_us));
//!     Ok(())
//! })).unwrap();
//!
//! engine.update_node("country", NodePatch::new().value("US"));
//! assert!(engine.get_node("state").unwrap().visible);
//! ```

pub mod bus;
pub mod engine;
pub mod error;
pub mod node;
pub mod registry;
pub mod rule;
pub mod scheduler;
pub mod store;
pub mod value;

pub use bus::SubscriptionId;
pub use engine::{Engine, EngineOptions};
pub use error::EngineError;
pub use node::{NodeDescriptor, NodePatch, NodeState};
pub use rule::{EffectError, Rule, RuleInfo};
pub use scheduler::EffectCtx;
pub use store::StateSnapshot;
pub use value::Value;
