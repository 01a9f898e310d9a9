use promscope::{
    selector, AggregateExpr, AggregateOp, BinaryOp, Call, Duration, Expr, FlatIdentity, Grouping,
    HierarchicalIdentity, Level, MatchOp, Matcher, MatrixSelector, RuleGroup, RuleGroups,
    RuleNode, SubqueryExpr, UnaryOp, LEVELS,
};
use proptest::prelude::*;

// --- Fixed label schema ---
// Selectors only carry matchers on `job` and `env`; identities only use
// `tenant`, `team`, `zone` or the hierarchy labels, so generated trees never
// conflict with the identity they are scoped to.

const METRICS: &[&str] = &["up", "http_requests_total", "node_cpu_seconds_total"];
const SELECTOR_LABELS: &[&str] = &["job", "env"];
const SELECTOR_VALUES: &[&str] = &["api", "prod", "a.*"];
const IDENTITY_LABELS: &[&str] = &["tenant", "team", "zone"];
const IDENTITY_VALUES: &[&str] = &["t1", "t2", "x"];

fn arb_matcher() -> impl Strategy<Value = Matcher> {
    (
        prop::sample::select(SELECTOR_LABELS),
        prop::sample::select(&[MatchOp::Equal, MatchOp::NotEqual, MatchOp::Regex, MatchOp::NotRegex][..]),
        prop::sample::select(SELECTOR_VALUES),
    )
        .prop_map(|(name, op, value)| Matcher::new(name, op, value))
}

fn arb_selector() -> impl Strategy<Value = promscope::VectorSelector> {
    (
        prop::sample::select(METRICS),
        prop::collection::vec(arb_matcher(), 0..3),
    )
        .prop_map(|(name, matchers)| {
            let mut sel = selector(name);
            sel.matchers = matchers;
            sel
        })
}

/// Generate a leaf: number, instant selector, or range selector.
fn arb_leaf_expr() -> impl Strategy<Value = Expr> {
    prop_oneof![
        (0_u32..1000).prop_map(|n| Expr::Number(f64::from(n))),
        arb_selector().prop_map(Expr::Vector),
        (arb_selector(), 1_i64..60).prop_map(|(vector, mins)| {
            Expr::Matrix(MatrixSelector {
                vector,
                range: Duration::from_mins(mins),
            })
        }),
    ]
}

fn paren(e: Expr) -> Expr {
    Expr::Paren(Box::new(e))
}

/// Generate a composite expression tree, bounded depth. Binary operands are
/// parenthesised so the printed text keeps the generated grouping.
pub fn arb_expr(max_depth: u32) -> impl Strategy<Value = Expr> {
    arb_leaf_expr().prop_recursive(max_depth, 32, 2, |inner| {
        prop_oneof![
            (
                inner.clone(),
                inner.clone(),
                prop::sample::select(
                    &[BinaryOp::Add, BinaryOp::Div, BinaryOp::Gt, BinaryOp::And, BinaryOp::Or][..]
                ),
            )
                .prop_map(|(a, b, op)| Expr::binary(op, paren(a), paren(b))),
            inner.clone().prop_map(|e| Expr::Call(Call {
                func: "abs".into(),
                args: vec![e],
            })),
            inner.clone().prop_map(|e| Expr::Aggregate(AggregateExpr {
                op: AggregateOp::Sum,
                param: None,
                expr: Box::new(e),
                grouping: Some(Grouping::By(vec!["job".into()])),
            })),
            inner.clone().prop_map(|e| Expr::Subquery(SubqueryExpr {
                expr: Box::new(paren(e)),
                range: Duration::from_mins(30),
                step: Some(Duration::from_mins(1)),
                offset: None,
                at: None,
            })),
            inner.prop_map(|e| Expr::Unary(UnaryOp::Neg, Box::new(paren(e)))),
        ]
    })
}

/// Generate a hierarchical identity where each level is independently set
/// or empty, so both valid and gapped identities appear.
pub fn arb_hierarchy() -> impl Strategy<Value = HierarchicalIdentity> {
    prop::collection::vec(prop::option::of(prop::sample::select(IDENTITY_VALUES)), 5).prop_map(
        |values| {
            LEVELS
                .iter()
                .zip(values)
                .fold(HierarchicalIdentity::new(), |id, (&level, value)| {
                    id.with(level, value.unwrap_or(""))
                })
        },
    )
}

/// Generate a hierarchical identity that satisfies the prefix invariant.
pub fn arb_valid_hierarchy() -> impl Strategy<Value = HierarchicalIdentity> {
    (0_usize..=5, prop::sample::select(IDENTITY_VALUES)).prop_map(|(depth, value)| {
        LEVELS[..depth]
            .iter()
            .fold(HierarchicalIdentity::new(), |id, &level| id.with(level, value))
    })
}

pub fn arb_flat_identity() -> impl Strategy<Value = FlatIdentity> {
    (
        prop::sample::subsequence(IDENTITY_LABELS, 1..=3),
        prop::collection::vec(prop::sample::select(IDENTITY_VALUES), 3),
    )
        .prop_map(|(names, values)| {
            FlatIdentity::new(names.into_iter().zip(values))
                .expect("generated identity should be valid")
        })
}

/// A document of recording rules, one group per chunk of expressions.
pub fn arb_document() -> impl Strategy<Value = RuleGroups> {
    prop::collection::vec(prop::collection::vec(arb_expr(4), 1..4), 1..3).prop_map(|groups| {
        groups
            .into_iter()
            .enumerate()
            .fold(RuleGroups::new(), |doc, (g, exprs)| {
                let group = exprs
                    .into_iter()
                    .enumerate()
                    .fold(RuleGroup::new(&format!("group_{g}")), |group, (r, e)| {
                        group.rule(RuleNode::recording(&format!("rule_{g}_{r}"), &e.to_string()))
                    });
                doc.group(group)
            })
    })
}

/// Whether the set/empty pattern of `id` is a prefix of set levels.
pub fn is_prefix_closed(id: &HierarchicalIdentity) -> bool {
    let set: Vec<bool> = LEVELS.iter().map(|&l| !id.get(l).is_empty()).collect();
    set.windows(2).all(|w| w[0] || !w[1])
}

pub fn terminal_of(id: &HierarchicalIdentity) -> Level {
    LEVELS
        .iter()
        .rev()
        .copied()
        .find(|&l| !id.get(l).is_empty())
        .unwrap_or(Level::ProjectId)
}
