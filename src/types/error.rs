use thiserror::Error;

use super::identity::Level;
use crate::parse::ParseError;

/// Errors in the tenant identity itself. Reported before any rule is touched.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("hierarchy gap: '{found}' is set but '{missing}' is empty")]
    HierarchyGap { missing: Level, found: Level },

    #[error("empty value for identity label '{label}'")]
    EmptyLabelValue { label: String },

    #[error("invalid identity label name '{label}'")]
    InvalidLabelName { label: String },
}

/// Errors scoping a single rule.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("invalid expression: {0}")]
    ExpressionParse(#[from] ParseError),

    #[error(
        "selector {selector} already matches {label}=\"{existing}\", cannot scope to {label}=\"{requested}\""
    )]
    ConflictingMatcher {
        selector: String,
        label: String,
        existing: String,
        requested: String,
    },

    #[error("result label '{label}' already set to \"{value}\"")]
    LabelAlreadySet { label: String, value: String },

    #[error("rule must set exactly one of 'record' or 'alert'")]
    InvalidRuleKind,
}

/// Error returned by [`scope`](crate::scope).
#[derive(Debug, Error)]
pub enum ScopeError {
    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("group '{group}', rule '{rule}': {source}")]
    Rule {
        group: String,
        rule: String,
        #[source]
        source: RuleError,
    },
}

impl ScopeError {
    /// The per-rule failure, if this error is not an identity error.
    #[must_use]
    pub fn rule_error(&self) -> Option<&RuleError> {
        match self {
            ScopeError::Rule { source, .. } => Some(source),
            ScopeError::Identity(_) => None,
        }
    }
}
