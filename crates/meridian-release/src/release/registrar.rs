//! Task definition registration.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::builds::{Build, BuildRegistry};
use crate::config::TaskConfig;
use crate::environment::parse_environment;
use crate::error::{ReleaseError, ReleaseResult};
use crate::manifest::ManifestLoader;
use crate::ports::PortAllocator;
use crate::scheduler::{ContainerDefinition, ContainerScheduler, EnvVar, TaskDefinition};
use crate::types::{Process, Release, TaskDefinitionRef};

/// Registers one task definition per manifest process.
pub struct TaskRegistrar {
    builds: Arc<dyn BuildRegistry>,
    scheduler: Arc<dyn ContainerScheduler>,
    manifest: Arc<dyn ManifestLoader>,
    ports: Arc<dyn PortAllocator>,
    config: TaskConfig,
}

impl TaskRegistrar {
    /// Create a task registrar.
    pub fn new(
        builds: Arc<dyn BuildRegistry>,
        scheduler: Arc<dyn ContainerScheduler>,
        manifest: Arc<dyn ManifestLoader>,
        ports: Arc<dyn PortAllocator>,
        config: TaskConfig,
    ) -> Self {
        Self {
            builds,
            scheduler,
            manifest,
            ports,
            config,
        }
    }

    /// Register a task definition for every process in the release manifest.
    ///
    /// On success the references are stored into `release.tasks` and
    /// returned. On failure `release.tasks` is left untouched; definitions
    /// registered before the failure stay registered with the scheduler.
    /// Definitions are built in full, host ports included, before the first
    /// one is registered. A release without a manifest registers nothing.
    pub async fn register_tasks(
        &self,
        release: &mut Release,
    ) -> ReleaseResult<BTreeMap<String, TaskDefinitionRef>> {
        let processes = self
            .manifest
            .load(release.manifest.as_deref().unwrap_or_default())?;

        let mut tasks = BTreeMap::new();

        if !processes.is_empty() {
            let build = self.resolve_build(release).await?;
            let environment = environment_vars(release.env.as_deref());

            let definitions = processes
                .iter()
                .map(|process| self.task_definition(release, &build, &environment, process))
                .collect::<ReleaseResult<Vec<_>>>()?;

            for (process, definition) in processes.iter().zip(&definitions) {
                debug!(
                    process = %process.name,
                    family = %definition.family,
                    "registering task definition"
                );

                let task_ref = self.scheduler.register_task_definition(definition).await?;
                info!(process = %process.name, task = %task_ref, "task definition registered");

                tasks.insert(process.name.clone(), task_ref);
            }
        }

        release.tasks.clone_from(&tasks);
        Ok(tasks)
    }

    async fn resolve_build(&self, release: &Release) -> ReleaseResult<Build> {
        let id = release
            .build
            .as_deref()
            .filter(|b| !b.trim().is_empty())
            .ok_or_else(|| ReleaseError::validation("release has processes but no build"))?;

        self.builds
            .get_build(&release.cluster, &release.app, id)
            .await
    }

    fn task_definition(
        &self,
        release: &Release,
        build: &Build,
        environment: &[EnvVar],
        process: &Process,
    ) -> ReleaseResult<TaskDefinition> {
        let command = process
            .command
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .map(|c| vec!["sh".to_owned(), "-c".to_owned(), c.to_owned()]);

        let container = ContainerDefinition {
            name: self.config.container_name.clone(),
            image: build.image(&process.name),
            cpu: self.config.cpu,
            memory_mb: self.config.memory_mb,
            essential: true,
            command,
            environment: environment.to_vec(),
            port_mappings: self.ports.bind(&process.ports)?,
        };

        Ok(TaskDefinition {
            family: release.process_resource_name(&process.name),
            containers: vec![container],
        })
    }
}

fn environment_vars(env: Option<&str>) -> Vec<EnvVar> {
    parse_environment(env.unwrap_or_default())
        .into_iter()
        .map(|(name, value)| EnvVar { name, value })
        .collect()
}

impl std::fmt::Debug for TaskRegistrar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistrar")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
