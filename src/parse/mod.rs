mod error;
mod grammar;

pub use error::ParseError;

use crate::Expr;

/// Parse a query expression into an [`Expr`] tree.
///
/// The whole input must be consumed; trailing text is an error. Nesting is
/// bounded, so pathological input fails instead of exhausting the stack.
///
/// # Errors
///
/// Returns [`ParseError`] if the input is not a valid expression.
pub fn parse(input: &str) -> Result<Expr, ParseError> {
    use winnow::{Parser, Stateful};
    grammar::query
        .parse(Stateful {
            input,
            state: grammar::Depth::default(),
        })
        .map_err(|e| ParseError::new(e.offset(), e.to_string()))
}
