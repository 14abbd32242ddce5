//! Scheduler service reconciliation.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::apps::{App, AppDirectory, OUTPUT_BALANCER};
use crate::config::ServiceConfig;
use crate::error::{ReleaseError, ReleaseResult};
use crate::manifest::ManifestLoader;
use crate::scheduler::{
    ContainerScheduler, CreateServiceRequest, LoadBalancerBinding, ServiceDescription,
    UpdateServiceRequest,
};
use crate::types::{Process, Release, TaskDefinitionRef};

use super::release_processes;

/// Makes sure every process of a release runs as a scheduler service.
pub struct ServiceReconciler {
    apps: Arc<dyn AppDirectory>,
    scheduler: Arc<dyn ContainerScheduler>,
    manifest: Arc<dyn ManifestLoader>,
    container_name: String,
    config: ServiceConfig,
}

impl ServiceReconciler {
    /// Create a service reconciler.
    pub fn new(
        apps: Arc<dyn AppDirectory>,
        scheduler: Arc<dyn ContainerScheduler>,
        manifest: Arc<dyn ManifestLoader>,
        container_name: impl Into<String>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            apps,
            scheduler,
            manifest,
            container_name: container_name.into(),
            config,
        }
    }

    /// Create the service of every process that has none yet.
    ///
    /// Services that already exist are left as they are unless
    /// `update_existing` is configured, in which case they are moved to the
    /// release's task definition and the process count.
    pub async fn reconcile(&self, release: &Release) -> ReleaseResult<()> {
        let processes = release_processes(self.manifest.as_ref(), release)?;
        let app = self.apps.get_app(&release.cluster, &release.app).await?;

        for process in &processes {
            let task_ref = release.tasks.get(&process.name).ok_or_else(|| {
                ReleaseError::validation(format!(
                    "process '{}' has no registered task definition",
                    process.name
                ))
            })?;

            let service_name = release.process_resource_name(&process.name);

            match self
                .scheduler
                .describe_service(&release.cluster, &service_name)
                .await?
            {
                None => {
                    self.create(release, &app, process, &service_name, task_ref)
                        .await?;
                }
                Some(existing) if self.config.update_existing => {
                    self.update(release, process, existing, task_ref).await?;
                }
                Some(existing) => {
                    warn!(
                        service = %service_name,
                        running = %existing.task_definition,
                        release_task = %task_ref,
                        "service exists, leaving it on its current task definition"
                    );
                }
            }
        }

        Ok(())
    }

    async fn create(
        &self,
        release: &Release,
        app: &App,
        process: &Process,
        service_name: &str,
        task_ref: &TaskDefinitionRef,
    ) -> ReleaseResult<()> {
        let load_balancers = if process.ports.is_empty() {
            Vec::new()
        } else {
            let balancer = app.output(OUTPUT_BALANCER)?;
            process
                .ports
                .iter()
                .map(|&port| LoadBalancerBinding {
                    load_balancer_name: balancer.to_owned(),
                    container_name: self.container_name.clone(),
                    container_port: port,
                })
                .collect()
        };

        let request = CreateServiceRequest {
            cluster: release.cluster.clone(),
            service_name: service_name.to_owned(),
            task_definition: task_ref.clone(),
            desired_count: process.count,
            load_balancers,
            role: self.config.role.clone(),
        };

        debug!(
            service = %service_name,
            load_balancers = request.load_balancers.len(),
            "creating service"
        );
        self.scheduler.create_service(&request).await?;
        info!(service = %service_name, task = %task_ref, count = process.count, "service created");

        Ok(())
    }

    async fn update(
        &self,
        release: &Release,
        process: &Process,
        existing: ServiceDescription,
        task_ref: &TaskDefinitionRef,
    ) -> ReleaseResult<()> {
        if existing.task_definition == *task_ref && existing.desired_count == process.count {
            debug!(service = %existing.name, "service already up to date");
            return Ok(());
        }

        let request = UpdateServiceRequest {
            cluster: release.cluster.clone(),
            service_name: existing.name,
            task_definition: task_ref.clone(),
            desired_count: process.count,
        };

        self.scheduler.update_service(&request).await?;
        info!(
            service = %request.service_name,
            from = %existing.task_definition,
            to = %task_ref,
            "service updated"
        );

        Ok(())
    }
}

impl std::fmt::Debug for ServiceReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceReconciler")
            .field("container_name", &self.container_name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::release::fixtures::{Fixture, BALANCER, CLUSTER};

    #[tokio::test]
    async fn creates_missing_services() {
        let fx = Fixture::new();
        let release = fx.registered_release().await;

        fx.reconciler(ServiceConfig::default())
            .reconcile(&release)
            .await
            .unwrap();

        let created = fx.scheduler.created_services().unwrap();
        assert_eq!(created.len(), 2);

        let web = &created[0];
        assert_eq!(web.service_name, "prod-shop-web");
        assert_eq!(web.task_definition, release.tasks["web"]);
        assert_eq!(web.desired_count, 2);
        assert_eq!(
            web.load_balancers,
            vec![LoadBalancerBinding {
                load_balancer_name: BALANCER.to_owned(),
                container_name: "main".to_owned(),
                container_port: 5000,
            }]
        );

        assert_eq!(created[1].service_name, "prod-shop-worker");
        assert!(created[1].load_balancers.is_empty());
    }

    #[tokio::test]
    async fn existing_service_is_not_updated_by_default() {
        let fx = Fixture::new();
        let reconciler = fx.reconciler(ServiceConfig::default());
        let first = fx.registered_release().await;
        reconciler.reconcile(&first).await.unwrap();

        let second = fx.registered_release().await;
        reconciler.reconcile(&second).await.unwrap();

        assert_eq!(fx.scheduler.created_services().unwrap().len(), 2);
        // Promoting a newer release does not move running services to it.
        assert!(fx.scheduler.updated_services().unwrap().is_empty());
        let web = fx.scheduler.service(CLUSTER, "prod-shop-web").unwrap().unwrap();
        assert_eq!(web.task_definition, first.tasks["web"]);
        assert_ne!(web.task_definition, second.tasks["web"]);
    }

    #[tokio::test]
    async fn update_existing_moves_services_to_new_tasks() {
        let fx = Fixture::new();
        let reconciler = fx.reconciler(ServiceConfig {
            update_existing: true,
            ..ServiceConfig::default()
        });
        let first = fx.registered_release().await;
        reconciler.reconcile(&first).await.unwrap();

        let second = fx.registered_release().await;
        reconciler.reconcile(&second).await.unwrap();
        reconciler.reconcile(&second).await.unwrap();

        assert_eq!(fx.scheduler.updated_services().unwrap().len(), 2);
        let web = fx.scheduler.service(CLUSTER, "prod-shop-web").unwrap().unwrap();
        assert_eq!(web.task_definition, second.tasks["web"]);
    }

    #[tokio::test]
    async fn role_is_passed_to_created_services() {
        let fx = Fixture::new();
        let release = fx.registered_release().await;

        fx.reconciler(ServiceConfig {
            role: Some("service-role".to_owned()),
            ..ServiceConfig::default()
        })
        .reconcile(&release)
        .await
        .unwrap();

        let created = fx.scheduler.created_services().unwrap();
        assert!(created
            .iter()
            .all(|c| c.role.as_deref() == Some("service-role")));
    }

    #[tokio::test]
    async fn missing_task_reference_fails_validation() {
        let fx = Fixture::new();
        let release = fx.release();

        let err = fx
            .reconciler(ServiceConfig::default())
            .reconcile(&release)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(fx.scheduler.created_services().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_manifest_fails_validation() {
        let fx = Fixture::new();
        let mut release = fx.registered_release().await;
        release.manifest = None;

        let err = fx
            .reconciler(ServiceConfig::default())
            .reconcile(&release)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
