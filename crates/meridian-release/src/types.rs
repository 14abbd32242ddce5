//! Core types for meridian-release.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix marking an identifier as a release id.
pub const RELEASE_ID_PREFIX: &str = "R";

/// Unique identifier for a release.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReleaseId(String);

impl ReleaseId {
    /// Create a release ID from an existing value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a new unique release ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("{RELEASE_ID_PREFIX}{}", ulid::Ulid::new()))
    }

    /// Get the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the ID is blank.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for ReleaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ReleaseId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Reference to a registered task definition, rendered as `family:revision`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct TaskDefinitionRef {
    /// Task definition family.
    pub family: String,
    /// Revision assigned by the scheduler, starting at 1.
    pub revision: u32,
}

impl TaskDefinitionRef {
    /// Create a new task definition reference.
    #[must_use]
    pub fn new(family: impl Into<String>, revision: u32) -> Self {
        Self {
            family: family.into(),
            revision,
        }
    }
}

impl fmt::Display for TaskDefinitionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.family, self.revision)
    }
}

impl FromStr for TaskDefinitionRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (family, revision) = s
            .rsplit_once(':')
            .ok_or_else(|| format!("task reference '{s}' is not family:revision"))?;

        if family.is_empty() {
            return Err(format!("task reference '{s}' has an empty family"));
        }

        let revision: u32 = revision
            .parse()
            .map_err(|e| format!("task reference '{s}' has an invalid revision: {e}"))?;

        if revision == 0 {
            return Err(format!("task reference '{s}' has revision 0"));
        }

        Ok(Self::new(family, revision))
    }
}

impl From<TaskDefinitionRef> for String {
    fn from(value: TaskDefinitionRef) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for TaskDefinitionRef {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A process declared in a release manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Process {
    /// Process name (unique within the manifest).
    pub name: String,
    /// Desired number of running replicas.
    #[serde(default = "default_count")]
    pub count: u32,
    /// Command override, run through `sh -c`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Container ports the process listens on.
    #[serde(default)]
    pub ports: Vec<u16>,
}

const fn default_count() -> u32 {
    1
}

impl Process {
    /// Create a process with one replica, no command override and no ports.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            count: default_count(),
            command: None,
            ports: Vec::new(),
        }
    }

    /// Set the replica count.
    #[must_use]
    pub const fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    /// Set the command override.
    #[must_use]
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    /// Set the declared container ports.
    #[must_use]
    pub fn with_ports(mut self, ports: impl Into<Vec<u16>>) -> Self {
        self.ports = ports.into();
        self
    }
}

/// A versioned bundle of build, environment and manifest for one app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    /// Unique release identifier.
    pub id: ReleaseId,
    /// Cluster the owning app runs in.
    pub cluster: String,
    /// Owning application name.
    pub app: String,
    /// Build this release packages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<String>,
    /// Serialised environment (`KEY=VALUE` lines).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,
    /// Serialised process manifest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<String>,
    /// Registered task definition per process name.
    #[serde(default)]
    pub tasks: BTreeMap<String, TaskDefinitionRef>,
    /// When the release was first saved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    /// Whether this is the app's active release, as of the read that produced it.
    #[serde(default)]
    pub active: bool,
}

impl Release {
    /// Create a new, unsaved release with a generated ID.
    #[must_use]
    pub fn new(cluster: impl Into<String>, app: impl Into<String>) -> Self {
        Self {
            id: ReleaseId::generate(),
            cluster: cluster.into(),
            app: app.into(),
            build: None,
            env: None,
            manifest: None,
            tasks: BTreeMap::new(),
            created: None,
            active: false,
        }
    }

    /// Set the build reference.
    #[must_use]
    pub fn with_build(mut self, build: impl Into<String>) -> Self {
        self.build = Some(build.into());
        self
    }

    /// Set the environment blob.
    #[must_use]
    pub fn with_env(mut self, env: impl Into<String>) -> Self {
        self.env = Some(env.into());
        self
    }

    /// Set the manifest.
    #[must_use]
    pub fn with_manifest(mut self, manifest: impl Into<String>) -> Self {
        self.manifest = Some(manifest.into());
        self
    }

    /// Name of the stack that deploys this release's app.
    #[must_use]
    pub fn stack_name(&self) -> String {
        format!("{}-{}", self.cluster, self.app)
    }

    /// Name of the scheduler service (and task family) for a process.
    #[must_use]
    pub fn process_resource_name(&self, process: &str) -> String {
        format!("{}-{}-{}", self.cluster, self.app, process)
    }
}
