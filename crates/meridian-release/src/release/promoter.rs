//! Stack promotion.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::apps::AppDirectory;
use crate::error::ReleaseResult;
use crate::manifest::ManifestLoader;
use crate::ports::PortAllocator;
use crate::stack::{StackOrchestrator, StackParameter, UpdateStackRequest};
use crate::template::TemplateCompiler;
use crate::types::Release;

use super::{release_processes, ServiceReconciler};

/// Deploys a release by updating the app's stack, then reconciling its
/// services.
pub struct StackPromoter {
    apps: Arc<dyn AppDirectory>,
    manifest: Arc<dyn ManifestLoader>,
    template: Arc<dyn TemplateCompiler>,
    ports: Arc<dyn PortAllocator>,
    stacks: Arc<dyn StackOrchestrator>,
    reconciler: Arc<ServiceReconciler>,
}

impl StackPromoter {
    /// Create a stack promoter.
    pub fn new(
        apps: Arc<dyn AppDirectory>,
        manifest: Arc<dyn ManifestLoader>,
        template: Arc<dyn TemplateCompiler>,
        ports: Arc<dyn PortAllocator>,
        stacks: Arc<dyn StackOrchestrator>,
        reconciler: Arc<ServiceReconciler>,
    ) -> Self {
        Self {
            apps,
            manifest,
            template,
            ports,
            stacks,
            reconciler,
        }
    }

    /// Promote a release.
    ///
    /// The stack update is submitted and accepted before services are
    /// reconciled; the stack may still be converging while services are
    /// created. Only app parameters the deployed stack already declares are
    /// submitted.
    pub async fn promote(&self, release: &Release) -> ReleaseResult<()> {
        let processes = release_processes(self.manifest.as_ref(), release)?;
        let app = self.apps.get_app(&release.cluster, &release.app).await?;

        let template_body = self
            .template
            .compile(&processes, self.ports.as_ref())
            .await?;

        let stack_name = release.stack_name();
        let accepted = self.stacks.stack_parameters(&stack_name).await?;

        let mut parameters = Vec::with_capacity(app.parameters.len());
        for (key, value) in &app.parameters {
            if accepted.contains(key) {
                parameters.push(StackParameter {
                    key: key.clone(),
                    value: value.clone(),
                });
            } else {
                warn!(stack = %stack_name, parameter = %key, "stack does not declare parameter, dropping it");
            }
        }

        debug!(
            stack = %stack_name,
            parameters = parameters.len(),
            template_bytes = template_body.len(),
            "submitting stack update"
        );

        self.stacks
            .update_stack(&UpdateStackRequest {
                stack_name: stack_name.clone(),
                template_body,
                parameters,
            })
            .await?;

        info!(stack = %stack_name, release = %release.id, "stack update accepted");

        self.reconciler.reconcile(release).await
    }
}

impl std::fmt::Debug for StackPromoter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StackPromoter").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::error::ErrorKind;
    use crate::release::fixtures::{Fixture, TEMPLATE};

    #[tokio::test]
    async fn submits_template_and_known_parameters() {
        let fx = Fixture::new();
        let release = fx.registered_release().await;

        fx.promoter().promote(&release).await.unwrap();

        let updates = fx.stacks.updates().unwrap();
        assert_eq!(updates.len(), 1);

        let update = &updates[0];
        assert_eq!(update.stack_name, "prod-shop");
        assert_eq!(update.template_body, TEMPLATE);

        let keys: Vec<_> = update.parameters.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["Cluster", "WebCount"]);

        assert_eq!(fx.scheduler.created_services().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn rejected_stack_update_stops_promotion() {
        let fx = Fixture::new();
        let release = fx.registered_release().await;
        fx.stacks.reject_updates().unwrap();

        let err = fx.promoter().promote(&release).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Dependency);
        assert!(fx.scheduler.created_services().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_stack_stops_promotion() {
        let fx = Fixture::new();
        let mut release = fx.registered_release().await;
        release.app = "other".to_owned();
        fx.apps
            .put(crate::apps::App::new(release.cluster.clone(), "other"))
            .unwrap();

        let err = fx.promoter().promote(&release).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Dependency);
        assert!(fx.stacks.updates().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_manifest_fails_validation() {
        let fx = Fixture::new();
        let mut release = fx.registered_release().await;
        release.manifest = None;

        let err = fx.promoter().promote(&release).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(fx.stacks.updates().unwrap().is_empty());
    }
}
