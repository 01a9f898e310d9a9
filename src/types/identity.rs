use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::IdentityError;

/// One level of the hierarchical tenant address, coarsest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    ProjectId,
    Location,
    Cluster,
    Namespace,
    Job,
}

/// Hierarchy levels in priority order. A non-empty level may only follow
/// non-empty levels.
pub const LEVELS: [Level; 5] = [
    Level::ProjectId,
    Level::Location,
    Level::Cluster,
    Level::Namespace,
    Level::Job,
];

impl Level {
    /// The series label this level is written to.
    #[must_use]
    pub fn label_name(self) -> &'static str {
        match self {
            Level::ProjectId => "project_id",
            Level::Location => "location",
            Level::Cluster => "cluster",
            Level::Namespace => "namespace",
            Level::Job => "job",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label_name())
    }
}

/// A strict hierarchical tenant address.
///
/// Empty fields mean "unconstrained at and below this level" and are never
/// injected. Use [`validate`](Self::validate) to check that no set field
/// follows an empty one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchicalIdentity {
    pub project_id: String,
    pub location: String,
    pub cluster: String,
    pub namespace: String,
    pub job: String,
}

impl HierarchicalIdentity {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn for_project(project_id: &str) -> Self {
        Self::new().with(Level::ProjectId, project_id)
    }

    #[must_use]
    pub fn for_location(project_id: &str, location: &str) -> Self {
        Self::for_project(project_id).with(Level::Location, location)
    }

    #[must_use]
    pub fn for_cluster(project_id: &str, location: &str, cluster: &str) -> Self {
        Self::for_location(project_id, location).with(Level::Cluster, cluster)
    }

    #[must_use]
    pub fn for_namespace(project_id: &str, location: &str, cluster: &str, namespace: &str) -> Self {
        Self::for_cluster(project_id, location, cluster).with(Level::Namespace, namespace)
    }

    /// Set the value of a single level.
    #[must_use]
    pub fn with(mut self, level: Level, value: &str) -> Self {
        *self.field_mut(level) = value.to_owned();
        self
    }

    #[must_use]
    pub fn get(&self, level: Level) -> &str {
        match level {
            Level::ProjectId => &self.project_id,
            Level::Location => &self.location,
            Level::Cluster => &self.cluster,
            Level::Namespace => &self.namespace,
            Level::Job => &self.job,
        }
    }

    fn field_mut(&mut self, level: Level) -> &mut String {
        match level {
            Level::ProjectId => &mut self.project_id,
            Level::Location => &mut self.location,
            Level::Cluster => &mut self.cluster,
            Level::Namespace => &mut self.namespace,
            Level::Job => &mut self.job,
        }
    }

    /// Check the prefix invariant and return the terminal level: the last
    /// non-empty level, or [`Level::ProjectId`] when every level is empty.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::HierarchyGap`] naming the first empty level
    /// and the later level that is set anyway.
    pub fn validate(&self) -> Result<Level, IdentityError> {
        let mut terminal = Level::ProjectId;
        let mut first_empty: Option<Level> = None;
        for level in LEVELS {
            let set = !self.get(level).is_empty();
            match (set, first_empty) {
                (true, Some(missing)) => {
                    return Err(IdentityError::HierarchyGap {
                        missing,
                        found: level,
                    });
                }
                (true, None) => terminal = level,
                (false, None) => first_empty = Some(level),
                (false, Some(_)) => {}
            }
        }
        Ok(terminal)
    }

    /// All five `(label, value)` pairs in priority order, empty values included.
    #[must_use]
    pub fn as_ordered_pairs(&self) -> Vec<(&'static str, &str)> {
        LEVELS
            .iter()
            .map(|&level| (level.label_name(), self.get(level)))
            .collect()
    }
}

/// An arbitrary label set used for unconstrained scoping.
///
/// Pairs are kept sorted by label name so injection order is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct FlatIdentity {
    labels: BTreeMap<String, String>,
}

impl FlatIdentity {
    /// Build a flat identity from label pairs.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::InvalidLabelName`] for a name outside
    /// `[a-zA-Z_][a-zA-Z0-9_]*` and [`IdentityError::EmptyLabelValue`] for an
    /// empty value.
    pub fn new<K, V>(labels: impl IntoIterator<Item = (K, V)>) -> Result<Self, IdentityError>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let labels: BTreeMap<String, String> = labels
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::try_from(labels)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.labels.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Pairs sorted by label name.
    #[must_use]
    pub fn as_ordered_pairs(&self) -> Vec<(&str, &str)> {
        self.labels
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

impl TryFrom<BTreeMap<String, String>> for FlatIdentity {
    type Error = IdentityError;

    fn try_from(labels: BTreeMap<String, String>) -> Result<Self, Self::Error> {
        for (name, value) in &labels {
            if !is_valid_label_name(name) {
                return Err(IdentityError::InvalidLabelName { label: name.clone() });
            }
            if value.is_empty() {
                return Err(IdentityError::EmptyLabelValue { label: name.clone() });
            }
        }
        Ok(Self { labels })
    }
}

impl From<FlatIdentity> for BTreeMap<String, String> {
    fn from(identity: FlatIdentity) -> Self {
        identity.labels
    }
}

/// The identity a rule set is scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Hierarchical(HierarchicalIdentity),
    Flat(FlatIdentity),
}

impl Identity {
    /// Validate the identity. Flat identities are validated on construction.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::HierarchyGap`] for a hierarchical identity
    /// with a set level after an empty one.
    pub fn validate(&self) -> Result<(), IdentityError> {
        match self {
            Identity::Hierarchical(h) => h.validate().map(|_| ()),
            Identity::Flat(_) => Ok(()),
        }
    }

    /// Identity-mode agnostic view of the `(label, value)` pairs to apply.
    #[must_use]
    pub fn as_ordered_pairs(&self) -> Vec<(&str, &str)> {
        match self {
            Identity::Hierarchical(h) => h.as_ordered_pairs(),
            Identity::Flat(f) => f.as_ordered_pairs(),
        }
    }

    pub(crate) fn mode(&self) -> &'static str {
        match self {
            Identity::Hierarchical(_) => "hierarchical",
            Identity::Flat(_) => "flat",
        }
    }
}

impl From<HierarchicalIdentity> for Identity {
    fn from(identity: HierarchicalIdentity) -> Self {
        Identity::Hierarchical(identity)
    }
}

impl From<FlatIdentity> for Identity {
    fn from(identity: FlatIdentity) -> Self {
        Identity::Flat(identity)
    }
}

pub(crate) fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
