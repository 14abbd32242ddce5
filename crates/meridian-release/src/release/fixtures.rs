//! Shared wiring for release unit tests.

use std::sync::Arc;

use object_store::memory::InMemory;

use crate::apps::{App, MemoryAppDirectory, OUTPUT_BALANCER, OUTPUT_SETTINGS};
use crate::builds::{Build, MemoryBuildRegistry};
use crate::config::{ReleaseConfig, ServiceConfig, SettingsConfig, TaskConfig};
use crate::manifest::TomlManifest;
use crate::ports::FixedBasePorts;
use crate::scheduler::MemoryScheduler;
use crate::settings::ObjectStoreSettings;
use crate::stack::MemoryStackOrchestrator;
use crate::store::{releases_table, MemoryReleaseTable};
use crate::template::StaticTemplate;
use crate::types::Release;

use super::{
    Collaborators, ReleaseManager, ReleaseStore, ServiceReconciler, StackPromoter, TaskRegistrar,
};

pub(crate) const CLUSTER: &str = "prod";
pub(crate) const APP: &str = "shop";
pub(crate) const BUILD: &str = "B1";
pub(crate) const BALANCER: &str = "shop-lb";
pub(crate) const SETTINGS_BUCKET: &str = "shop-settings";
pub(crate) const TEMPLATE: &str = r#"{"Resources":{}}"#;

pub(crate) const MANIFEST: &str = r#"
[[process]]
name = "web"
count = 2
command = "bin/web"
ports = [5000]

[[process]]
name = "worker"
"#;

pub(crate) struct Fixture {
    pub table: Arc<MemoryReleaseTable>,
    pub apps: Arc<MemoryAppDirectory>,
    pub builds: Arc<MemoryBuildRegistry>,
    pub scheduler: Arc<MemoryScheduler>,
    pub stacks: Arc<MemoryStackOrchestrator>,
    pub bucket: Arc<InMemory>,
    settings: Arc<ObjectStoreSettings>,
}

impl Fixture {
    pub fn new() -> Self {
        let apps = Arc::new(MemoryAppDirectory::new());
        let mut app = App::new(CLUSTER, APP);
        app.outputs
            .insert(OUTPUT_BALANCER.to_owned(), BALANCER.to_owned());
        app.outputs
            .insert(OUTPUT_SETTINGS.to_owned(), SETTINGS_BUCKET.to_owned());
        for (key, value) in [("Cluster", CLUSTER), ("WebCount", "2"), ("Legacy", "x")] {
            app.parameters.insert(key.to_owned(), value.to_owned());
        }
        apps.put(app).unwrap();

        let builds = Arc::new(MemoryBuildRegistry::new());
        builds.put(CLUSTER, Build::new(BUILD, APP)).unwrap();

        let stacks = Arc::new(MemoryStackOrchestrator::new());
        stacks
            .put_stack(format!("{CLUSTER}-{APP}"), ["Cluster", "WebCount", "Version"])
            .unwrap();

        let bucket = Arc::new(InMemory::new());
        let settings = Arc::new(
            ObjectStoreSettings::new(SettingsConfig::default())
                .with_bucket(SETTINGS_BUCKET, bucket.clone()),
        );

        Self {
            table: Arc::new(MemoryReleaseTable::new()),
            apps,
            builds,
            scheduler: Arc::new(MemoryScheduler::new()),
            stacks,
            bucket,
            settings,
        }
    }

    pub fn table_name(&self) -> String {
        releases_table(CLUSTER, APP)
    }

    /// An unsaved release with a build, environment and two processes.
    pub fn release(&self) -> Release {
        Release::new(CLUSTER, APP)
            .with_build(BUILD)
            .with_env("KEY=VALUE")
            .with_manifest(MANIFEST)
    }

    /// A release whose task definitions have been registered.
    pub async fn registered_release(&self) -> Release {
        let mut release = self.release();
        self.registrar().register_tasks(&mut release).await.unwrap();
        release
    }

    pub fn registrar(&self) -> TaskRegistrar {
        TaskRegistrar::new(
            self.builds.clone(),
            self.scheduler.clone(),
            Arc::new(TomlManifest),
            Arc::new(FixedBasePorts::default()),
            TaskConfig::default(),
        )
    }

    pub fn store(&self) -> ReleaseStore {
        ReleaseStore::new(
            self.table.clone(),
            self.apps.clone(),
            self.settings.clone(),
            Arc::new(self.registrar()),
        )
    }

    pub fn reconciler(&self, config: ServiceConfig) -> ServiceReconciler {
        ServiceReconciler::new(
            self.apps.clone(),
            self.scheduler.clone(),
            Arc::new(TomlManifest),
            TaskConfig::default().container_name,
            config,
        )
    }

    pub fn promoter(&self) -> StackPromoter {
        StackPromoter::new(
            self.apps.clone(),
            Arc::new(TomlManifest),
            Arc::new(StaticTemplate::new(TEMPLATE)),
            Arc::new(FixedBasePorts::default()),
            self.stacks.clone(),
            Arc::new(self.reconciler(ServiceConfig::default())),
        )
    }

    pub fn manager(&self) -> ReleaseManager {
        ReleaseManager::new(
            Collaborators {
                table: self.table.clone(),
                apps: self.apps.clone(),
                builds: self.builds.clone(),
                scheduler: self.scheduler.clone(),
                stacks: self.stacks.clone(),
                settings: self.settings.clone(),
                template: Arc::new(StaticTemplate::new(TEMPLATE)),
                manifest: Arc::new(TomlManifest),
            },
            &ReleaseConfig::default(),
        )
    }
}
