use thiserror::Error;

use crate::parse::ParseError;
use crate::ScopeError;

/// Unified error type covering scoping, expression parsing, and document I/O.
///
/// Returned by convenience methods like
/// [`RuleGroups::from_file()`](crate::RuleGroups::from_file).
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Scope(#[from] ScopeError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[cfg(feature = "json")]
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
