//! Build registry lookups.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{Collaborator, ReleaseError, ReleaseResult, Resource};

/// A resolved build artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Build {
    /// Build identifier.
    pub id: String,
    /// App the build belongs to.
    pub app: String,
    /// Registry host images were pushed to, if not the default.
    pub registry: Option<String>,
}

impl Build {
    /// Create a build pushed to the default registry.
    #[must_use]
    pub fn new(id: impl Into<String>, app: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            app: app.into(),
            registry: None,
        }
    }

    /// Set the registry host.
    #[must_use]
    pub fn with_registry(mut self, registry: impl Into<String>) -> Self {
        self.registry = Some(registry.into());
        self
    }

    /// Pullable image reference for one process of this build.
    #[must_use]
    pub fn image(&self, process: &str) -> String {
        match &self.registry {
            Some(registry) => format!("{registry}/{}-{process}:{}", self.app, self.id),
            None => format!("{}-{process}:{}", self.app, self.id),
        }
    }
}

/// Resolves build ids to build artifacts.
#[async_trait]
pub trait BuildRegistry: Send + Sync {
    /// Resolve a build.
    ///
    /// Returns `NotFound` if the build does not exist.
    async fn get_build(&self, cluster: &str, app: &str, id: &str) -> ReleaseResult<Build>;
}

/// In-memory build registry for testing.
#[derive(Debug, Default)]
pub struct MemoryBuildRegistry {
    builds: RwLock<HashMap<(String, String, String), Build>>,
}

impl MemoryBuildRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a build for an app in a cluster.
    pub fn put(&self, cluster: &str, build: Build) -> ReleaseResult<()> {
        let mut builds = self.builds.write().map_err(|_| {
            ReleaseError::dependency(Collaborator::BuildRegistry, "lock", "lock poisoned")
        })?;
        builds.insert(
            (cluster.to_owned(), build.app.clone(), build.id.clone()),
            build,
        );
        Ok(())
    }
}

#[async_trait]
impl BuildRegistry for MemoryBuildRegistry {
    async fn get_build(&self, cluster: &str, app: &str, id: &str) -> ReleaseResult<Build> {
        let builds = self.builds.read().map_err(|_| {
            ReleaseError::dependency(Collaborator::BuildRegistry, "lock", "lock poisoned")
        })?;

        builds
            .get(&(cluster.to_owned(), app.to_owned(), id.to_owned()))
            .cloned()
            .ok_or_else(|| ReleaseError::not_found(Resource::Build, id))
    }
}
