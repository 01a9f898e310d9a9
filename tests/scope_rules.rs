use std::collections::BTreeMap;

use promscope::{
    scope, FlatIdentity, HierarchicalIdentity, Identity, IdentityError, Level, RuleError,
    RuleGroup, RuleGroups, RuleNode, ScopeError,
};

fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect()
}

fn single(rule: RuleNode) -> RuleGroups {
    RuleGroups::new().group(RuleGroup::new("g").rule(rule))
}

fn flat(pairs: &[(&str, &str)]) -> Identity {
    FlatIdentity::new(pairs.iter().copied()).unwrap().into()
}

#[test]
fn hierarchy_gap_is_rejected() {
    let identity = HierarchicalIdentity::for_location("p", "l").with(Level::Namespace, "n");
    let err = scope(single(RuleNode::recording("r", "up")), &identity.into()).unwrap_err();
    assert!(matches!(
        err,
        ScopeError::Identity(IdentityError::HierarchyGap {
            missing: Level::Cluster,
            found: Level::Namespace,
        })
    ));
}

#[test]
fn partial_hierarchy_scopes_set_levels_only() {
    let identity = HierarchicalIdentity::for_location("p", "l");
    assert_eq!(identity.validate().unwrap(), Level::Location);

    let out = scope(single(RuleNode::recording("r", "up")), &identity.into()).unwrap();
    let rule = &out.groups[0].rules[0];
    assert_eq!(rule.expr, r#"up{project_id="p",location="l"}"#);
    assert_eq!(
        rule.labels,
        Some(labels(&[("project_id", "p"), ("location", "l")]))
    );
}

#[test]
fn scoping_twice_only_fails_on_result_labels() {
    let identity = HierarchicalIdentity::for_namespace("p", "l", "c", "n").into();
    let once = scope(single(RuleNode::recording("r", "rate(x[5m])")), &identity).unwrap();
    let expr = once.groups[0].rules[0].expr.clone();

    // selectors are already scoped, so only the labels stand in the way
    let mut stripped = once.clone();
    stripped.groups[0].rules[0].labels = None;
    let twice = scope(stripped, &identity).unwrap();
    assert_eq!(twice.groups[0].rules[0].expr, expr);
    assert_eq!(twice, once);

    let err = scope(once, &identity).unwrap_err();
    assert!(matches!(
        err.rule_error(),
        Some(RuleError::LabelAlreadySet { .. })
    ));
}

#[test]
fn conflicting_matcher_fails() {
    let identity = HierarchicalIdentity::for_project("p").into();
    let err = scope(
        single(RuleNode::recording("r", r#"up{project_id="other"}"#)),
        &identity,
    )
    .unwrap_err();
    match err {
        ScopeError::Rule { group, rule, source } => {
            assert_eq!(group, "g");
            assert_eq!(rule, "r");
            assert!(matches!(
                source,
                RuleError::ConflictingMatcher { ref existing, ref requested, .. }
                    if existing == "other" && requested == "p"
            ));
        }
        other => panic!("expected rule error, got {other:?}"),
    }
}

#[test]
fn matching_matcher_is_left_unchanged() {
    let identity = HierarchicalIdentity::for_project("p").into();
    let out = scope(
        single(RuleNode::recording("r", r#"up{project_id="p"}"#)),
        &identity,
    )
    .unwrap();
    assert_eq!(out.groups[0].rules[0].expr, r#"up{project_id="p"}"#);
}

#[test]
fn both_selectors_of_binary_are_scoped() {
    let out = scope(
        single(RuleNode::recording("r", r#"metric_a / metric_b{x="1"}"#)),
        &flat(&[("tenant", "t")]),
    )
    .unwrap();
    assert_eq!(
        out.groups[0].rules[0].expr,
        r#"metric_a{tenant="t"} / metric_b{x="1",tenant="t"}"#
    );
}

#[test]
fn result_labels_are_added() {
    let identity = flat(&[("l1", "v1"), ("l2", "v2")]);

    let out = scope(single(RuleNode::recording("r", "up")), &identity).unwrap();
    assert_eq!(
        out.groups[0].rules[0].labels,
        Some(labels(&[("l1", "v1"), ("l2", "v2")]))
    );

    let out = scope(
        single(RuleNode::recording("r", "up").with_label("a", "b")),
        &identity,
    )
    .unwrap();
    assert_eq!(
        out.groups[0].rules[0].labels,
        Some(labels(&[("a", "b"), ("l1", "v1"), ("l2", "v2")]))
    );
}

#[test]
fn existing_result_label_fails_even_when_equal() {
    let err = scope(
        single(RuleNode::recording("r", "up").with_label("l1", "v1")),
        &flat(&[("l1", "v1")]),
    )
    .unwrap_err();
    assert!(matches!(
        err.rule_error(),
        Some(RuleError::LabelAlreadySet { label, value }) if label == "l1" && value == "v1"
    ));
}

#[test]
fn failure_mid_document_returns_error() {
    let doc = RuleGroups::new()
        .group(
            RuleGroup::new("first")
                .rule(RuleNode::recording("a", "up"))
                .rule(RuleNode::recording("b", "up"))
                .rule(RuleNode::recording("c", r#"up{tenant="other"}"#)),
        )
        .group(
            RuleGroup::new("second")
                .rule(RuleNode::recording("d", "up"))
                .rule(RuleNode::recording("e", "up")),
        );

    let err = scope(doc, &flat(&[("tenant", "t")])).unwrap_err();
    match err {
        ScopeError::Rule { group, rule, .. } => {
            assert_eq!(group, "first");
            assert_eq!(rule, "c");
        }
        other => panic!("expected rule error, got {other:?}"),
    }
}

#[test]
fn order_and_passthrough_fields_are_preserved() {
    let mut alert = RuleNode::alerting("HighErrorRate", "rate(errors[5m]) > 0.1");
    alert.for_duration = Some("10m".into());
    alert.keep_firing_for = Some("5m".into());
    alert.annotations = Some(labels(&[("summary", "too many errors")]));

    let mut group = RuleGroup::new("alerts").rule(alert);
    group.interval = Some("30s".into());
    group.limit = Some(10);
    let doc = RuleGroups::new()
        .group(RuleGroup::new("records").rule(RuleNode::recording("job:up:sum", "sum by (job) (up)")))
        .group(group);

    let out = scope(doc, &HierarchicalIdentity::for_cluster("p", "l", "c").into()).unwrap();

    let names: Vec<&str> = out.groups.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(names, ["records", "alerts"]);

    let alerts = &out.groups[1];
    assert_eq!(alerts.interval.as_deref(), Some("30s"));
    assert_eq!(alerts.limit, Some(10));
    let rule = &alerts.rules[0];
    assert_eq!(rule.alert.as_deref(), Some("HighErrorRate"));
    assert_eq!(rule.for_duration.as_deref(), Some("10m"));
    assert_eq!(rule.keep_firing_for.as_deref(), Some("5m"));
    assert_eq!(rule.annotations, Some(labels(&[("summary", "too many errors")])));
    assert_eq!(
        rule.expr,
        r#"rate(errors{project_id="p",location="l",cluster="c"}[5m]) > 0.1"#
    );
}

#[test]
fn empty_identity_leaves_rules_untouched() {
    let doc = single(RuleNode::recording("r", "sum(rate(x[5m]))"));
    let out = scope(doc.clone(), &HierarchicalIdentity::new().into()).unwrap();
    assert_eq!(out, doc);
}
