use std::fmt;

use super::duration::Duration;
use super::matcher::{write_quoted, Matcher};

/// Query expression tree produced by [`parse`](crate::parse::parse).
///
/// Parentheses are kept as explicit [`Expr::Paren`] nodes, so printing a tree
/// with [`Display`](fmt::Display) reproduces the original grouping without
/// re-deriving operator precedence.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    String(String),
    Vector(VectorSelector),
    Matrix(MatrixSelector),
    Call(Call),
    Aggregate(AggregateExpr),
    Binary(BinaryExpr),
    Unary(UnaryOp, Box<Expr>),
    Paren(Box<Expr>),
    Subquery(SubqueryExpr),
}

/// The `@` modifier pinning evaluation time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AtModifier {
    Timestamp(f64),
    Start,
    End,
}

/// An instant vector selector: `metric{label="value", ...}`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VectorSelector {
    pub name: Option<String>,
    pub matchers: Vec<Matcher>,
    pub offset: Option<Duration>,
    pub at: Option<AtModifier>,
}

/// A range vector selector: `metric{...}[5m]`. Offset and `@` live on the
/// inner vector selector.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixSelector {
    pub vector: VectorSelector,
    pub range: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub func: String,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateOp {
    Sum,
    Avg,
    Count,
    Min,
    Max,
    Group,
    Stddev,
    Stdvar,
    Topk,
    Bottomk,
    CountValues,
    Quantile,
    Limitk,
    LimitRatio,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grouping {
    By(Vec<String>),
    Without(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateExpr {
    pub op: AggregateOp,
    /// Leading parameter for `topk`, `quantile`, `count_values` and friends.
    pub param: Option<Box<Expr>>,
    pub expr: Box<Expr>,
    pub grouping: Option<Grouping>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Atan2,
    Eq,
    Neq,
    Gt,
    Lt,
    Gte,
    Lte,
    And,
    Or,
    Unless,
}

/// `on(...)` / `ignoring(...)` label matching between two vectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchingAxis {
    On(Vec<String>),
    Ignoring(Vec<String>),
}

/// Many-to-one / one-to-many modifier with its extra labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupModifier {
    Left(Vec<String>),
    Right(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorMatching {
    pub axis: MatchingAxis,
    pub group: Option<GroupModifier>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpr {
    pub op: BinaryOp,
    pub lhs: Box<Expr>,
    pub rhs: Box<Expr>,
    /// Set by the `bool` modifier on comparison operators.
    pub return_bool: bool,
    pub matching: Option<VectorMatching>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubqueryExpr {
    pub expr: Box<Expr>,
    pub range: Duration,
    pub step: Option<Duration>,
    pub offset: Option<Duration>,
    pub at: Option<AtModifier>,
}

impl AggregateOp {
    const ALL: [AggregateOp; 14] = [
        AggregateOp::Sum,
        AggregateOp::Avg,
        AggregateOp::Count,
        AggregateOp::Min,
        AggregateOp::Max,
        AggregateOp::Group,
        AggregateOp::Stddev,
        AggregateOp::Stdvar,
        AggregateOp::Topk,
        AggregateOp::Bottomk,
        AggregateOp::CountValues,
        AggregateOp::Quantile,
        AggregateOp::Limitk,
        AggregateOp::LimitRatio,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            AggregateOp::Sum => "sum",
            AggregateOp::Avg => "avg",
            AggregateOp::Count => "count",
            AggregateOp::Min => "min",
            AggregateOp::Max => "max",
            AggregateOp::Group => "group",
            AggregateOp::Stddev => "stddev",
            AggregateOp::Stdvar => "stdvar",
            AggregateOp::Topk => "topk",
            AggregateOp::Bottomk => "bottomk",
            AggregateOp::CountValues => "count_values",
            AggregateOp::Quantile => "quantile",
            AggregateOp::Limitk => "limitk",
            AggregateOp::LimitRatio => "limit_ratio",
        }
    }

    /// Case-insensitive lookup by keyword.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.name().eq_ignore_ascii_case(name))
    }

    /// Whether the aggregation takes a leading parameter argument.
    #[must_use]
    pub fn takes_param(self) -> bool {
        matches!(
            self,
            AggregateOp::Topk
                | AggregateOp::Bottomk
                | AggregateOp::CountValues
                | AggregateOp::Quantile
                | AggregateOp::Limitk
                | AggregateOp::LimitRatio
        )
    }
}

impl BinaryOp {
    #[must_use]
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Neq | BinaryOp::Gt | BinaryOp::Lt | BinaryOp::Gte | BinaryOp::Lte
        )
    }

    #[must_use]
    pub fn is_set_operator(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or | BinaryOp::Unless)
    }
}

impl VectorSelector {
    /// A selector for `name` with no label matchers.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: Some(name.to_owned()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_matcher(mut self, matcher: Matcher) -> Self {
        self.matchers.push(matcher);
        self
    }

    /// Matchers whose label name is `name`, in selector order.
    pub fn matchers_for<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Matcher> + 'a {
        self.matchers.iter().filter(move |m| m.name == name)
    }

    fn write_body(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.name {
            write!(f, "{name}")?;
        }
        if self.name.is_none() || !self.matchers.is_empty() {
            write!(f, "{{")?;
            for (i, m) in self.matchers.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                write!(f, "{m}")?;
            }
            write!(f, "}}")?;
        }
        Ok(())
    }
}

impl Expr {
    /// Binary expression without `bool` or vector matching modifiers.
    #[must_use]
    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary(BinaryExpr {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            return_bool: false,
            matching: None,
        })
    }

    /// Every vector selector in the tree, in depth-first pre-order.
    ///
    /// Range selectors contribute their inner vector selector.
    #[must_use]
    pub fn selectors(&self) -> Vec<&VectorSelector> {
        let mut out = Vec::new();
        collect_selectors(self, &mut out);
        out
    }
}

fn collect_selectors<'a>(expr: &'a Expr, out: &mut Vec<&'a VectorSelector>) {
    match expr {
        Expr::Vector(v) => out.push(v),
        Expr::Matrix(m) => out.push(&m.vector),
        Expr::Call(call) => {
            for arg in &call.args {
                collect_selectors(arg, out);
            }
        }
        Expr::Aggregate(agg) => {
            if let Some(param) = &agg.param {
                collect_selectors(param, out);
            }
            collect_selectors(&agg.expr, out);
        }
        Expr::Binary(bin) => {
            collect_selectors(&bin.lhs, out);
            collect_selectors(&bin.rhs, out);
        }
        Expr::Unary(_, inner) | Expr::Paren(inner) => collect_selectors(inner, out),
        Expr::Subquery(sq) => collect_selectors(&sq.expr, out),
        Expr::Number(_) | Expr::String(_) => {}
    }
}

/// Shorthand for [`VectorSelector::new`].
#[must_use]
pub fn selector(name: &str) -> VectorSelector {
    VectorSelector::new(name)
}

// -- Printing ---------------------------------------------------------------

fn write_number(f: &mut fmt::Formatter<'_>, v: f64) -> fmt::Result {
    if v.is_nan() {
        write!(f, "NaN")
    } else if v.is_infinite() {
        write!(f, "{}Inf", if v < 0.0 { "-" } else { "" })
    } else {
        write!(f, "{v}")
    }
}

fn write_labels(f: &mut fmt::Formatter<'_>, labels: &[String]) -> fmt::Result {
    write!(f, "({})", labels.join(", "))
}

fn write_modifiers(
    f: &mut fmt::Formatter<'_>,
    at: Option<AtModifier>,
    offset: Option<Duration>,
) -> fmt::Result {
    if let Some(at) = at {
        write!(f, " {at}")?;
    }
    if let Some(offset) = offset {
        write!(f, " offset {offset}")?;
    }
    Ok(())
}

impl fmt::Display for AtModifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AtModifier::Timestamp(ts) => {
                write!(f, "@ ")?;
                write_number(f, *ts)
            }
            AtModifier::Start => write!(f, "@ start()"),
            AtModifier::End => write!(f, "@ end()"),
        }
    }
}

impl fmt::Display for VectorSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_body(f)?;
        write_modifiers(f, self.at, self.offset)
    }
}

impl fmt::Display for MatrixSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.vector.write_body(f)?;
        write!(f, "[{}]", self.range)?;
        write_modifiers(f, self.vector.at, self.vector.offset)
    }
}

impl fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl fmt::Display for Grouping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grouping::By(labels) => {
                write!(f, "by ")?;
                write_labels(f, labels)
            }
            Grouping::Without(labels) => {
                write!(f, "without ")?;
                write_labels(f, labels)
            }
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "^",
            BinaryOp::Atan2 => "atan2",
            BinaryOp::Eq => "==",
            BinaryOp::Neq => "!=",
            BinaryOp::Gt => ">",
            BinaryOp::Lt => "<",
            BinaryOp::Gte => ">=",
            BinaryOp::Lte => "<=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Unless => "unless",
        };
        write!(f, "{s}")
    }
}

impl fmt::Display for VectorMatching {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.axis {
            MatchingAxis::On(labels) => {
                write!(f, "on ")?;
                write_labels(f, labels)?;
            }
            MatchingAxis::Ignoring(labels) => {
                write!(f, "ignoring ")?;
                write_labels(f, labels)?;
            }
        }
        let (keyword, labels) = match &self.group {
            None => return Ok(()),
            Some(GroupModifier::Left(labels)) => ("group_left", labels),
            Some(GroupModifier::Right(labels)) => ("group_right", labels),
        };
        write!(f, " {keyword}")?;
        if !labels.is_empty() {
            write!(f, " ")?;
            write_labels(f, labels)?;
        }
        Ok(())
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(v) => write_number(f, *v),
            Expr::String(s) => write_quoted(f, s),
            Expr::Vector(v) => write!(f, "{v}"),
            Expr::Matrix(m) => write!(f, "{m}"),
            Expr::Call(call) => {
                write!(f, "{}(", call.func)?;
                for (i, arg) in call.args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            Expr::Aggregate(agg) => {
                write!(f, "{}", agg.op)?;
                if let Some(grouping) = &agg.grouping {
                    write!(f, " {grouping} ")?;
                }
                write!(f, "(")?;
                if let Some(param) = &agg.param {
                    write!(f, "{param}, ")?;
                }
                write!(f, "{})", agg.expr)
            }
            Expr::Binary(bin) => {
                write!(f, "{} {}", bin.lhs, bin.op)?;
                if bin.return_bool {
                    write!(f, " bool")?;
                }
                if let Some(matching) = &bin.matching {
                    write!(f, " {matching}")?;
                }
                write!(f, " {}", bin.rhs)
            }
            Expr::Unary(UnaryOp::Neg, inner) => write!(f, "-{inner}"),
            Expr::Unary(UnaryOp::Pos, inner) => write!(f, "+{inner}"),
            Expr::Paren(inner) => write!(f, "({inner})"),
            Expr::Subquery(sq) => {
                write!(f, "{}[{}:", sq.expr, sq.range)?;
                if let Some(step) = sq.step {
                    write!(f, "{step}")?;
                }
                write!(f, "]")?;
                write_modifiers(f, sq.at, sq.offset)
            }
        }
    }
}
