//! Application records.
//!
//! Application management lives outside this crate. Release operations only
//! need to read an app's active release pointer, its configuration
//! parameters and the infrastructure outputs its stack produced.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{Collaborator, ReleaseError, ReleaseResult, Resource};
use crate::types::ReleaseId;

/// Stack output naming the load balancer services attach to.
pub const OUTPUT_BALANCER: &str = "Balancer";

/// Stack output naming the bucket that holds app settings.
pub const OUTPUT_SETTINGS: &str = "Settings";

/// An application record as seen by release operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct App {
    /// Cluster the app runs in.
    pub cluster: String,
    /// Application name.
    pub name: String,
    /// Currently active release, if any.
    pub release: Option<ReleaseId>,
    /// Stack parameters configured for the app.
    pub parameters: BTreeMap<String, String>,
    /// Outputs of the app's stack.
    pub outputs: BTreeMap<String, String>,
}

impl App {
    /// Create an app with no active release, parameters or outputs.
    #[must_use]
    pub fn new(cluster: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Returns true if `id` is this app's active release.
    #[must_use]
    pub fn is_active(&self, id: &ReleaseId) -> bool {
        self.release.as_ref() == Some(id)
    }

    /// Look up a required stack output.
    pub fn output(&self, key: &str) -> ReleaseResult<&str> {
        self.outputs
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ReleaseError::not_found(Resource::Output, format!("{}/{key}", self.name)))
    }
}

/// Read access to application records.
#[async_trait]
pub trait AppDirectory: Send + Sync {
    /// Get an app by cluster and name.
    ///
    /// Returns `NotFound` if the app does not exist.
    async fn get_app(&self, cluster: &str, app: &str) -> ReleaseResult<App>;
}

/// In-memory app directory for testing.
#[derive(Debug, Default)]
pub struct MemoryAppDirectory {
    apps: RwLock<HashMap<(String, String), App>>,
}

impl MemoryAppDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an app record.
    pub fn put(&self, app: App) -> ReleaseResult<()> {
        let mut apps = self.apps.write().map_err(|_| poisoned())?;
        apps.insert((app.cluster.clone(), app.name.clone()), app);
        Ok(())
    }

    /// Point an app at a new active release.
    pub fn set_release(&self, cluster: &str, app: &str, release: ReleaseId) -> ReleaseResult<()> {
        let mut apps = self.apps.write().map_err(|_| poisoned())?;
        let record = apps
            .get_mut(&(cluster.to_owned(), app.to_owned()))
            .ok_or_else(|| ReleaseError::not_found(Resource::App, app))?;
        record.release = Some(release);
        Ok(())
    }
}

fn poisoned() -> ReleaseError {
    ReleaseError::dependency(Collaborator::AppDirectory, "lock", "lock poisoned")
}

#[async_trait]
impl AppDirectory for MemoryAppDirectory {
    async fn get_app(&self, cluster: &str, app: &str) -> ReleaseResult<App> {
        let apps = self.apps.read().map_err(|_| poisoned())?;
        apps.get(&(cluster.to_owned(), app.to_owned()))
            .cloned()
            .ok_or_else(|| ReleaseError::not_found(Resource::App, app))
    }
}
