//! Error types.
//!
//! Only rule validation is fallible at the API boundary. Everything else the
//! engine treats as recoverable: unknown-node writes, duplicate registration,
//! cycle skips, and effect faults are logged and execution continues.

/// Errors surfaced by [`Engine::add_rule`](crate::Engine::add_rule) and
/// [`Engine::add_rules`](crate::Engine::add_rules).
///
/// Malformed rules are rejected at registration so they can never fail deep
/// inside a propagation pass.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("rule id must not be empty")]
    EmptyRuleId,
    #[error("rule `{rule_id}` declares an empty dependency id")]
    EmptyDependency { rule_id: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(EngineError::EmptyRuleId.to_string(), "rule id must not be empty");
        let err = EngineError::EmptyDependency {
            rule_id: "r1".into(),
        };
        assert_eq!(err.to_string(), "rule `r1` declares an empty dependency id");
    }
}
