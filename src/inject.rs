use crate::{Matcher, RuleError, VectorSelector};

/// Ensure `selector` only matches series with `name="value"`.
///
/// An empty `value` is a no-op. An existing equality matcher with the same
/// value satisfies the constraint; one with a different value is a conflict.
/// Matchers with any other operator on `name` are left alone and do not
/// count as either.
pub(crate) fn inject(
    selector: &mut VectorSelector,
    name: &str,
    value: &str,
) -> Result<(), RuleError> {
    if value.is_empty() {
        return Ok(());
    }

    let mut satisfied = false;
    for existing in selector.matchers.iter().filter(|m| m.is_equality() && m.name == name) {
        if existing.value != value {
            return Err(RuleError::ConflictingMatcher {
                selector: selector.to_string(),
                label: name.to_owned(),
                existing: existing.value.clone(),
                requested: value.to_owned(),
            });
        }
        satisfied = true;
    }

    if !satisfied {
        selector.matchers.push(Matcher::equal(name, value));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{selector, MatchOp};

    #[test]
    fn appends_missing_matcher() {
        let mut sel = selector("up");
        inject(&mut sel, "tenant", "t").unwrap();
        assert_eq!(sel.matchers, vec![Matcher::equal("tenant", "t")]);
    }

    #[test]
    fn empty_value_is_noop() {
        let mut sel = selector("up");
        inject(&mut sel, "cluster", "").unwrap();
        assert!(sel.matchers.is_empty());
    }

    #[test]
    fn matching_value_is_idempotent() {
        let mut sel = selector("up").with_matcher(Matcher::equal("tenant", "t"));
        inject(&mut sel, "tenant", "t").unwrap();
        inject(&mut sel, "tenant", "t").unwrap();
        assert_eq!(sel.matchers.len(), 1);
    }

    #[test]
    fn different_value_conflicts() {
        let mut sel = selector("up").with_matcher(Matcher::equal("project_id", "other"));
        let err = inject(&mut sel, "project_id", "p").unwrap_err();
        match err {
            RuleError::ConflictingMatcher {
                selector,
                label,
                existing,
                requested,
            } => {
                assert_eq!(selector, r#"up{project_id="other"}"#);
                assert_eq!(label, "project_id");
                assert_eq!(existing, "other");
                assert_eq!(requested, "p");
            }
            other => panic!("expected ConflictingMatcher, got {other:?}"),
        }
        assert_eq!(sel.matchers.len(), 1);
    }

    #[test]
    fn non_equality_matcher_is_not_a_conflict() {
        let mut sel = selector("up")
            .with_matcher(Matcher::new("tenant", MatchOp::Regex, "a|b"))
            .with_matcher(Matcher::new("tenant", MatchOp::NotEqual, "t"));
        inject(&mut sel, "tenant", "t").unwrap();
        assert_eq!(sel.matchers.len(), 3);
        assert_eq!(sel.matchers[2], Matcher::equal("tenant", "t"));
    }
}
