use crate::inject::inject;
use crate::{Expr, RuleError, VectorSelector};

/// Inject every `(name, value)` pair into every selector of `expr`.
///
/// Selectors are visited depth-first in pre-order and pairs in the given
/// order. The first error aborts the walk. Only matcher lists change; the
/// tree shape is untouched.
pub(crate) fn scope_selectors(expr: &mut Expr, pairs: &[(&str, &str)]) -> Result<(), RuleError> {
    visit_selectors(expr, &mut |selector| {
        for &(name, value) in pairs {
            inject(selector, name, value)?;
        }
        Ok(())
    })
}

fn visit_selectors<F>(expr: &mut Expr, visit: &mut F) -> Result<(), RuleError>
where
    F: FnMut(&mut VectorSelector) -> Result<(), RuleError>,
{
    match expr {
        Expr::Vector(v) => visit(v),
        Expr::Matrix(m) => visit(&mut m.vector),
        Expr::Call(call) => {
            for arg in &mut call.args {
                visit_selectors(arg, visit)?;
            }
            Ok(())
        }
        Expr::Aggregate(agg) => {
            if let Some(param) = &mut agg.param {
                visit_selectors(param, visit)?;
            }
            visit_selectors(&mut agg.expr, visit)
        }
        Expr::Binary(bin) => {
            visit_selectors(&mut bin.lhs, visit)?;
            visit_selectors(&mut bin.rhs, visit)
        }
        Expr::Unary(_, inner) | Expr::Paren(inner) => visit_selectors(inner, visit),
        Expr::Subquery(sq) => visit_selectors(&mut sq.expr, visit),
        Expr::Number(_) | Expr::String(_) => Ok(()),
    }
}
