//! The local `Issue` object: desired state, metadata, and observed status.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Finalizer token that keeps an object alive until its remote issue is closed.
pub const FINALIZER: &str = "issues.issuesync.dev/finalizer";

/// Namespace used when a manifest or key does not name one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Condition type tracking whether the remote issue is open.
pub const CONDITION_ISSUE_IS_OPEN: &str = "IssueIsOpen";

/// Condition type tracking whether the remote issue has a linked pull request.
pub const CONDITION_ISSUE_HAS_PR: &str = "IssueHasPR";

/// Identifies an object in the store as `namespace/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    /// Namespace the object lives in.
    pub namespace: String,
    /// Object name, unique within its namespace.
    pub name: String,
}

impl ObjectKey {
    /// Creates a key from its parts.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), name: name.into() }
    }

    /// Checks that both parts are usable as a single path component.
    ///
    /// # Errors
    ///
    /// Returns the reason when a part is empty, is `.` or `..`, or contains
    /// a path separator or NUL.
    pub fn validate(&self) -> Result<(), String> {
        check_segment("namespace", &self.namespace)?;
        check_segment("name", &self.name)
    }
}

fn check_segment(part: &str, value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err(format!("{part} must not be empty"));
    }
    if value == "." || value == ".." {
        return Err(format!("{part} must not be {value:?}"));
    }
    if value.contains(['/', '\\', '\0']) {
        return Err(format!("{part} {value:?} must not contain path separators"));
    }
    Ok(())
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl FromStr for ObjectKey {
    type Err = String;

    /// Parses `namespace/name`, or a bare `name` in the default namespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let key = match s.split_once('/') {
            Some((ns, name)) => Self::new(ns, name),
            None => Self::new(DEFAULT_NAMESPACE, s),
        };
        key.validate()
            .map_err(|reason| format!("Invalid object key {s:?}: {reason}; expected <namespace>/<name>"))?;
        Ok(key)
    }
}

/// Desired state of a remote issue, as declared by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueSpec {
    /// URL of the repository the issue belongs to, e.g. `https://github.com/acme/app`.
    pub repo: String,
    /// Issue title; also the key used to find the remote counterpart.
    pub title: String,
    /// Issue body.
    #[serde(default)]
    pub description: String,
}

/// Tri-state value of a [`Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    /// The condition holds.
    True,
    /// The condition does not hold.
    False,
    /// The condition could not be determined.
    Unknown,
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::True => "True",
            Self::False => "False",
            Self::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// An observation about the remote issue, stored on the object's status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Condition type, e.g. [`CONDITION_ISSUE_IS_OPEN`].
    #[serde(rename = "type")]
    pub type_: String,
    /// Current value.
    pub status: ConditionStatus,
    /// Machine-readable reason for the value.
    pub reason: String,
    /// Human-readable explanation.
    pub message: String,
    /// When the condition was last rewritten.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
}

impl Condition {
    /// Builds a condition without a transition time.
    pub fn new(
        type_: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_: type_.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: None,
        }
    }
}

/// Observed state of the object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueStatus {
    /// Conditions, ordered by type with at most one entry per type.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl IssueStatus {
    /// Returns the condition of the given type, if present.
    #[must_use]
    pub fn condition(&self, type_: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.type_ == type_)
    }

    /// Returns `true` if the condition of the given type is present and `True`.
    #[must_use]
    pub fn is_true(&self, type_: &str) -> bool {
        self.condition(type_).is_some_and(|c| c.status == ConditionStatus::True)
    }
}

/// Object metadata maintained by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Object name.
    pub name: String,
    /// Object namespace.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Unique id assigned by the store on creation.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,
    /// Optimistic-concurrency token, bumped on every write.
    #[serde(default)]
    pub resource_version: u64,
    /// Finalizer tokens blocking removal.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub finalizers: Vec<String>,
    /// Set when deletion has been requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<DateTime<Utc>>,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

/// A declared issue as persisted in the object store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueObject {
    /// Store-managed metadata.
    pub metadata: ObjectMeta,
    /// Desired state.
    pub spec: IssueSpec,
    /// Observed state.
    #[serde(default)]
    pub status: IssueStatus,
}

impl IssueObject {
    /// Creates a fresh object with empty status and no finalizers.
    pub fn new(key: &ObjectKey, spec: IssueSpec) -> Self {
        Self {
            metadata: ObjectMeta {
                name: key.name.clone(),
                namespace: key.namespace.clone(),
                ..ObjectMeta::default()
            },
            spec,
            status: IssueStatus::default(),
        }
    }

    /// Returns the store key of this object.
    #[must_use]
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.metadata.namespace, &self.metadata.name)
    }

    /// Returns `true` once deletion has been requested.
    #[must_use]
    pub fn is_deleting(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    /// Returns `true` if the given finalizer token is present.
    #[must_use]
    pub fn has_finalizer(&self, token: &str) -> bool {
        self.metadata.finalizers.iter().any(|f| f == token)
    }
}

/// A user-authored manifest declaring an issue object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueManifest {
    /// Name and namespace of the object.
    pub metadata: ManifestMeta,
    /// Desired state.
    pub spec: IssueSpec,
}

/// Identity section of an [`IssueManifest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestMeta {
    /// Object name.
    pub name: String,
    /// Object namespace.
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl IssueManifest {
    /// Parses a manifest from YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed, a required field is missing,
    /// or the name or namespace is not a valid key part.
    pub fn from_yaml(yaml: &str) -> Result<Self, String> {
        let manifest: Self =
            serde_yaml::from_str(yaml).map_err(|e| format!("Failed to parse issue manifest: {e}"))?;
        manifest.key().validate().map_err(|reason| format!("Invalid issue manifest: {reason}"))?;
        Ok(manifest)
    }

    /// Returns the store key declared by this manifest.
    #[must_use]
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.metadata.namespace, &self.metadata.name)
    }
}
