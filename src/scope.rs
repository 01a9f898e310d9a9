use tracing::{debug, info};

use crate::merge::merge_labels;
use crate::walk::scope_selectors;
use crate::{Identity, RuleError, RuleGroups, RuleNode, ScopeError};

/// Rewrite every rule in `groups` so it only reads and only writes series
/// belonging to `identity`.
///
/// Each rule's expression gets an equality matcher per identity label on
/// every selector, and each identity label is added to the rule's result
/// labels. Empty hierarchical levels are skipped. Groups and rules keep
/// their order and all other fields pass through unchanged.
///
/// The document is consumed: on error it is dropped, so a partially scoped
/// document can never be observed.
///
/// # Errors
///
/// Returns [`ScopeError::Identity`] for an invalid identity, before any rule
/// is touched, and [`ScopeError::Rule`] naming the group and rule for the
/// first rule that fails to parse or conflicts with the identity.
pub fn scope(mut groups: RuleGroups, identity: &Identity) -> Result<RuleGroups, ScopeError> {
    identity.validate()?;
    let pairs = identity.as_ordered_pairs();

    for group in &mut groups.groups {
        for rule in &mut group.rules {
            scope_rule(rule, &pairs).map_err(|source| {
                debug!(group = %group.name, rule = rule.name(), error = %source, "scoping failed");
                ScopeError::Rule {
                    group: group.name.clone(),
                    rule: rule.name().to_owned(),
                    source,
                }
            })?;
            debug!(group = %group.name, rule = rule.name(), expr = %rule.expr, "scoped rule");
        }
    }

    info!(
        mode = identity.mode(),
        groups = groups.groups.len(),
        rules = groups.rule_count(),
        "scoped rule groups"
    );
    Ok(groups)
}

fn scope_rule(rule: &mut RuleNode, pairs: &[(&str, &str)]) -> Result<(), RuleError> {
    if rule.kind().is_none() {
        return Err(RuleError::InvalidRuleKind);
    }
    let mut expr = crate::parse::parse(&rule.expr)?;
    scope_selectors(&mut expr, pairs)?;
    merge_labels(&mut rule.labels, pairs)?;
    rule.expr = expr.to_string();
    Ok(())
}

impl RuleGroups {
    /// Method form of [`scope`].
    ///
    /// # Errors
    ///
    /// See [`scope`].
    pub fn scoped(self, identity: &Identity) -> Result<Self, ScopeError> {
        scope(self, identity)
    }
}
