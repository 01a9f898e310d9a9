use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A rule file: an ordered list of rule groups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleGroups {
    #[serde(default)]
    pub groups: Vec<RuleGroup>,
}

/// A named group of rules evaluated together.
///
/// Only `rules` is rewritten by scoping; every other field passes through.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleGroup {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_offset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub rules: Vec<RuleNode>,
}

/// Whether a rule records a new series or fires an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Recording,
    Alerting,
}

/// A single recording or alerting rule.
///
/// Exactly one of `record` and `alert` must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert: Option<String>,
    pub expr: String,
    #[serde(default, rename = "for", skip_serializing_if = "Option::is_none")]
    pub for_duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_firing_for: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
}

impl RuleNode {
    #[must_use]
    pub fn recording(record: &str, expr: &str) -> Self {
        Self {
            record: Some(record.to_owned()),
            expr: expr.to_owned(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn alerting(alert: &str, expr: &str) -> Self {
        Self {
            alert: Some(alert.to_owned()),
            expr: expr.to_owned(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_label(mut self, name: &str, value: &str) -> Self {
        self.labels
            .get_or_insert_with(BTreeMap::new)
            .insert(name.to_owned(), value.to_owned());
        self
    }

    /// `None` unless exactly one of `record` and `alert` is set.
    #[must_use]
    pub fn kind(&self) -> Option<RuleKind> {
        match (&self.record, &self.alert) {
            (Some(_), None) => Some(RuleKind::Recording),
            (None, Some(_)) => Some(RuleKind::Alerting),
            _ => None,
        }
    }

    /// The record or alert name, whichever is set.
    #[must_use]
    pub fn name(&self) -> &str {
        self.record
            .as_deref()
            .or(self.alert.as_deref())
            .unwrap_or_default()
    }
}

impl RuleGroup {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn rule(mut self, rule: RuleNode) -> Self {
        self.rules.push(rule);
        self
    }
}

impl RuleGroups {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn group(mut self, group: RuleGroup) -> Self {
        self.groups.push(group);
        self
    }

    /// Total number of rules across all groups.
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.groups.iter().map(|g| g.rules.len()).sum()
    }
}

#[cfg(feature = "json")]
impl RuleGroups {
    /// Parse a rule document from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if the input does not match
    /// the rule-file schema.
    pub fn from_json(input: &str) -> Result<Self, crate::Error> {
        Ok(serde_json::from_str(input)?)
    }

    /// Read a JSON rule document from a file.
    ///
    /// # Errors
    ///
    /// Returns [`Error`](crate::Error) on I/O or decoding failure.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, crate::Error> {
        let input = std::fs::read_to_string(path)?;
        Self::from_json(&input)
    }

    /// Serialize to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if encoding fails.
    pub fn to_json(&self) -> Result<String, crate::Error> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
