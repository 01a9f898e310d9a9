use std::collections::BTreeMap;

use crate::RuleError;

/// Add each non-empty `(name, value)` pair to a rule's result labels.
///
/// Any existing label with the same name is an error, even when the value is
/// identical. The label map is only created once there is something to add.
pub(crate) fn merge_labels(
    labels: &mut Option<BTreeMap<String, String>>,
    pairs: &[(&str, &str)],
) -> Result<(), RuleError> {
    for &(name, value) in pairs.iter().filter(|(_, v)| !v.is_empty()) {
        let labels = labels.get_or_insert_with(BTreeMap::new);
        if let Some(current) = labels.get(name) {
            return Err(RuleError::LabelAlreadySet {
                label: name.to_owned(),
                value: current.clone(),
            });
        }
        labels.insert(name.to_owned(), value.to_owned());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn creates_missing_map() {
        let mut labels = None;
        merge_labels(&mut labels, &[("l1", "v1"), ("l2", "v2")]).unwrap();
        assert_eq!(labels, Some(map(&[("l1", "v1"), ("l2", "v2")])));
    }

    #[test]
    fn keeps_existing_labels() {
        let mut labels = Some(map(&[("a", "b")]));
        merge_labels(&mut labels, &[("l1", "v1"), ("l2", "v2")]).unwrap();
        assert_eq!(labels, Some(map(&[("a", "b"), ("l1", "v1"), ("l2", "v2")])));
    }

    #[test]
    fn equal_existing_value_still_fails() {
        let mut labels = Some(map(&[("l1", "v1")]));
        let err = merge_labels(&mut labels, &[("l1", "v1")]).unwrap_err();
        assert!(matches!(
            err,
            RuleError::LabelAlreadySet { label, value } if label == "l1" && value == "v1"
        ));
    }

    #[test]
    fn empty_values_are_skipped() {
        let mut labels = None;
        merge_labels(&mut labels, &[("cluster", ""), ("namespace", "")]).unwrap();
        assert_eq!(labels, None);
    }
}
