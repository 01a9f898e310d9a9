//! Tenant scoping for Prometheus-style recording and alerting rules.
//!
//! [`scope`] rewrites a [`RuleGroups`] document so that every rule only
//! selects series carrying a tenant's identity labels and every series it
//! produces carries them too. Expressions are parsed into an [`Expr`] tree,
//! matchers are injected into each selector, and the tree is printed back.

mod error;
mod inject;
mod merge;
pub mod parse;
mod scope;
mod types;
mod walk;

pub use error::Error;
pub use scope::scope;
pub use types::{
    selector, AggregateExpr, AggregateOp, AtModifier, BinaryExpr, BinaryOp, Call, Duration, Expr,
    FlatIdentity, GroupModifier, Grouping, HierarchicalIdentity, Identity, IdentityError, Level,
    MatchOp, Matcher, MatchingAxis, MatrixSelector, RuleError, RuleGroup, RuleGroups, RuleKind,
    RuleNode, ScopeError, SubqueryExpr, UnaryOp, VectorMatching, VectorSelector, LEVELS,
};
