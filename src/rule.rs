//! Rule types: declared dependencies, conditions, effects.

use std::fmt;
use std::rc::Rc;

use crate::error::EngineError;
use crate::scheduler::EffectCtx;
use crate::store::StateSnapshot;

/// Error type effects may return. Failures are contained at the per-rule
/// boundary by the scheduler; they never abort a propagation pass.
pub type EffectError = Box<dyn std::error::Error>;

/// Predicate over a read-only snapshot. Absent means "always run".
pub type ConditionFn = dyn Fn(&StateSnapshot) -> bool;

/// A rule's effect: may patch any node through the [`EffectCtx`], including
/// nodes it does not declare as dependencies.
pub type EffectFn = dyn Fn(&mut EffectCtx<'_>, &StateSnapshot) -> Result<(), EffectError>;

// ---------------------------------------------------------------------------
// Rule
// ---------------------------------------------------------------------------

/// A declarative unit: when any dependency node changes, evaluate `condition`
/// against a snapshot and, if it holds, run `effect`.
///
/// Effects are deliberately unrestricted in what they may write — cycles are
/// therefore only detectable dynamically, which is the scheduler's job.
#[derive(Clone)]
pub struct Rule {
    pub(crate) id: String,
    pub(crate) dependencies: Vec<String>,
    pub(crate) priority: i32,
    pub(crate) condition: Option<Rc<ConditionFn>>,
    pub(crate) effect: Rc<EffectFn>,
}

impl Rule {
    /// Create a rule with the given id, dependency node ids, and effect.
    ///
    /// Duplicate dependency entries are dropped (first occurrence wins).
    /// Priority defaults to 0; lower priorities run first.
    pub fn new(
        id: impl Into<String>,
        dependencies: impl IntoIterator<Item = impl Into<String>>,
        effect: impl Fn(&mut EffectCtx<'_>, &StateSnapshot) -> Result<(), EffectError> + 'static,
    ) -> Self {
        let mut deps: Vec<String> = Vec::new();
        for dep in dependencies {
            let dep = dep.into();
            if !deps.contains(&dep) {
                deps.push(dep);
            }
        }
        Self {
            id: id.into(),
            dependencies: deps,
            priority: 0,
            condition: None,
            effect: Rc::new(effect),
        }
    }

    /// Set the priority (builder). Lower runs first.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the condition predicate (builder).
    pub fn with_condition(mut self, condition: impl Fn(&StateSnapshot) -> bool + 'static) -> Self {
        self.condition = Some(Rc::new(condition));
        self
    }

    /// The rule id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The declared dependency node ids, deduplicated, in declaration order.
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// The rule priority.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Reject malformed rules before they reach the registry.
    pub(crate) fn validate(&self) -> Result<(), EngineError> {
        if self.id.is_empty() {
            return Err(EngineError::EmptyRuleId);
        }
        if self.dependencies.iter().any(String::is_empty) {
            return Err(EngineError::EmptyDependency {
                rule_id: self.id.clone(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("dependencies", &self.dependencies)
            .field("priority", &self.priority)
            .field("has_condition", &self.condition.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// RuleInfo
// ---------------------------------------------------------------------------

/// Inspectable metadata for a registered rule.
///
/// Returned by [`Engine::get_rule`](crate::Engine::get_rule); closures are
/// not inspectable, so lookups expose the declarative fields only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleInfo {
    pub id: String,
    pub dependencies: Vec<String>,
    pub priority: i32,
}
