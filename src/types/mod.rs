mod duration;
mod error;
mod expr;
mod identity;
mod matcher;
mod rule;

pub use duration::Duration;
pub use error::{IdentityError, RuleError, ScopeError};
pub use expr::{
    selector, AggregateExpr, AggregateOp, AtModifier, BinaryExpr, BinaryOp, Call, Expr,
    GroupModifier, Grouping, MatchingAxis, MatrixSelector, SubqueryExpr, UnaryOp, VectorMatching,
    VectorSelector,
};
pub use identity::{FlatIdentity, HierarchicalIdentity, Identity, Level, LEVELS};
pub use matcher::{MatchOp, Matcher};
pub use rule::{RuleGroup, RuleGroups, RuleKind, RuleNode};
