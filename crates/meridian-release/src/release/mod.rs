//! Release lifecycle.
//!
//! A release is saved (task definitions are registered, then the record is
//! written) and later promoted (the stack is updated, then services are
//! reconciled). None of these steps are transactional across systems: a
//! failure part way leaves whatever was already done in place, and every
//! step is safe to repeat because family and service names are derived
//! from the cluster, app and process names.
//!
//! Nothing serialises concurrent promotions of the same app. Two promotions
//! racing each other both submit stack updates and reconcile services, and
//! the last one the orchestrator accepts wins.

mod promoter;
mod reconciler;
mod registrar;
mod store;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod fixtures;

pub use promoter::StackPromoter;
pub use reconciler::ServiceReconciler;
pub use registrar::TaskRegistrar;
pub use store::{ReleaseStore, RELEASE_PAGE_SIZE};

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, instrument};

use crate::apps::AppDirectory;
use crate::builds::BuildRegistry;
use crate::config::ReleaseConfig;
use crate::error::{ReleaseError, ReleaseResult};
use crate::manifest::ManifestLoader;
use crate::ports::{FixedBasePorts, PortAllocator};
use crate::scheduler::ContainerScheduler;
use crate::settings::SettingsStore;
use crate::stack::StackOrchestrator;
use crate::store::ReleaseTable;
use crate::template::TemplateCompiler;
use crate::types::{Process, Release, ReleaseId, TaskDefinitionRef};

/// Processes declared by a release's manifest.
///
/// Unlike registration, which treats a missing manifest as having no
/// processes, anything that deploys processes needs one.
pub(crate) fn release_processes(
    manifest: &dyn ManifestLoader,
    release: &Release,
) -> ReleaseResult<Vec<Process>> {
    let raw = release
        .manifest
        .as_deref()
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| {
            ReleaseError::validation(format!("release {} has no manifest", release.id))
        })?;

    manifest.load(raw)
}

/// External systems release operations drive.
pub struct Collaborators {
    /// Release record storage.
    pub table: Arc<dyn ReleaseTable>,
    /// Application records.
    pub apps: Arc<dyn AppDirectory>,
    /// Build lookups.
    pub builds: Arc<dyn BuildRegistry>,
    /// Container scheduler.
    pub scheduler: Arc<dyn ContainerScheduler>,
    /// Stack orchestrator.
    pub stacks: Arc<dyn StackOrchestrator>,
    /// Settings buckets.
    pub settings: Arc<dyn SettingsStore>,
    /// Stack template generator.
    pub template: Arc<dyn TemplateCompiler>,
    /// Manifest format.
    pub manifest: Arc<dyn ManifestLoader>,
}

/// Entry point for release operations.
pub struct ReleaseManager {
    store: ReleaseStore,
    registrar: Arc<TaskRegistrar>,
    promoter: StackPromoter,
    reconciler: Arc<ServiceReconciler>,
    manifest: Arc<dyn ManifestLoader>,
    template: Arc<dyn TemplateCompiler>,
    ports: Arc<dyn PortAllocator>,
}

impl ReleaseManager {
    /// Wire release operations over a set of collaborators.
    ///
    /// Host ports are allocated from `tasks.base_port`; task registration
    /// and template compilation share the one allocator.
    pub fn new(collaborators: Collaborators, config: &ReleaseConfig) -> Self {
        let Collaborators {
            table,
            apps,
            builds,
            scheduler,
            stacks,
            settings,
            template,
            manifest,
        } = collaborators;

        let ports: Arc<dyn PortAllocator> = Arc::new(FixedBasePorts::new(config.tasks.base_port));

        let registrar = Arc::new(TaskRegistrar::new(
            builds,
            Arc::clone(&scheduler),
            Arc::clone(&manifest),
            Arc::clone(&ports),
            config.tasks.clone(),
        ));

        let reconciler = Arc::new(ServiceReconciler::new(
            Arc::clone(&apps),
            scheduler,
            Arc::clone(&manifest),
            config.tasks.container_name.clone(),
            config.services.clone(),
        ));

        let promoter = StackPromoter::new(
            Arc::clone(&apps),
            Arc::clone(&manifest),
            Arc::clone(&template),
            Arc::clone(&ports),
            stacks,
            Arc::clone(&reconciler),
        );

        let store = ReleaseStore::new(table, apps, settings, Arc::clone(&registrar));

        Self {
            store,
            registrar,
            promoter,
            reconciler,
            manifest,
            template,
            ports,
        }
    }

    /// Release persistence.
    #[must_use]
    pub const fn store(&self) -> &ReleaseStore {
        &self.store
    }

    /// Task definition registration.
    #[must_use]
    pub fn registrar(&self) -> &TaskRegistrar {
        &self.registrar
    }

    /// Stack promotion.
    #[must_use]
    pub const fn promoter(&self) -> &StackPromoter {
        &self.promoter
    }

    /// Service reconciliation.
    #[must_use]
    pub fn reconciler(&self) -> &ServiceReconciler {
        &self.reconciler
    }

    /// List an app's most recent releases, newest first.
    #[instrument(skip(self))]
    pub async fn list(&self, cluster: &str, app: &str) -> ReleaseResult<Vec<Release>> {
        self.store.list(cluster, app).await
    }

    /// Get a release by id.
    #[instrument(skip(self), fields(release = %id))]
    pub async fn get(&self, cluster: &str, app: &str, id: &ReleaseId) -> ReleaseResult<Release> {
        self.store.get(cluster, app, id).await
    }

    /// Register the release's task definitions and persist it.
    #[instrument(
        skip(self, release),
        fields(cluster = %release.cluster, app = %release.app, release = %release.id)
    )]
    pub async fn save(&self, release: &mut Release) -> ReleaseResult<()> {
        self.store.save(release).await
    }

    /// Register the release's task definitions without persisting it.
    #[instrument(
        skip(self, release),
        fields(cluster = %release.cluster, app = %release.app, release = %release.id)
    )]
    pub async fn register_tasks(
        &self,
        release: &mut Release,
    ) -> ReleaseResult<BTreeMap<String, TaskDefinitionRef>> {
        self.registrar.register_tasks(release).await
    }

    /// Deploy a saved release.
    #[instrument(
        skip(self, release),
        fields(cluster = %release.cluster, app = %release.app, release = %release.id)
    )]
    pub async fn promote(&self, release: &Release) -> ReleaseResult<()> {
        info!("promoting release");
        self.promoter.promote(release).await?;
        info!("release promoted");
        Ok(())
    }

    /// Remove the release's stored environment object.
    #[instrument(
        skip(self, release),
        fields(cluster = %release.cluster, app = %release.app, release = %release.id)
    )]
    pub async fn cleanup(&self, release: &Release) -> ReleaseResult<()> {
        self.store.cleanup(release).await
    }

    /// Processes the release's manifest declares.
    pub fn processes(&self, release: &Release) -> ReleaseResult<Vec<Process>> {
        release_processes(self.manifest.as_ref(), release)
    }

    /// Render the stack template for the release without deploying it.
    #[instrument(
        skip(self, release),
        fields(cluster = %release.cluster, app = %release.app, release = %release.id)
    )]
    pub async fn formation(&self, release: &Release) -> ReleaseResult<String> {
        let processes = self.processes(release)?;
        self.template
            .compile(&processes, self.ports.as_ref())
            .await
    }
}

impl std::fmt::Debug for ReleaseManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleaseManager")
            .field("registrar", &self.registrar)
            .field("reconciler", &self.reconciler)
            .finish_non_exhaustive()
    }
}
