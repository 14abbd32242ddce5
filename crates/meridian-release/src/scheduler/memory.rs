//! In-memory container scheduler for testing.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{Collaborator, ReleaseError, ReleaseResult};
use crate::types::TaskDefinitionRef;

use super::{
    ContainerScheduler, CreateServiceRequest, ServiceDescription, TaskDefinition,
    UpdateServiceRequest,
};

#[derive(Debug, Default)]
struct State {
    revisions: HashMap<String, u32>,
    definitions: Vec<(TaskDefinitionRef, TaskDefinition)>,
    services: HashMap<(String, String), ServiceDescription>,
    created: Vec<CreateServiceRequest>,
    updated: Vec<UpdateServiceRequest>,
    failing_families: HashSet<String>,
}

/// In-memory scheduler that records every call.
///
/// Revisions are assigned per family starting at 1, as a real scheduler
/// does. Registration for a family can be made to fail to exercise partial
/// registration.
#[derive(Debug, Default)]
pub struct MemoryScheduler {
    state: RwLock<State>,
}

impl MemoryScheduler {
    /// Create an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every registration for `family` fail.
    pub fn fail_family(&self, family: impl Into<String>) -> ReleaseResult<()> {
        self.write()?.failing_families.insert(family.into());
        Ok(())
    }

    /// Stop failing registrations.
    pub fn clear_failures(&self) -> ReleaseResult<()> {
        self.write()?.failing_families.clear();
        Ok(())
    }

    /// Add a service as if it had been created earlier.
    pub fn insert_service(&self, service: ServiceDescription) -> ReleaseResult<()> {
        self.write()?
            .services
            .insert((service.cluster.clone(), service.name.clone()), service);
        Ok(())
    }

    /// Task definitions registered so far, in order.
    pub fn registered(&self) -> ReleaseResult<Vec<(TaskDefinitionRef, TaskDefinition)>> {
        Ok(self.read()?.definitions.clone())
    }

    /// Create-service requests received so far, in order.
    pub fn created_services(&self) -> ReleaseResult<Vec<CreateServiceRequest>> {
        Ok(self.read()?.created.clone())
    }

    /// Update-service requests received so far, in order.
    pub fn updated_services(&self) -> ReleaseResult<Vec<UpdateServiceRequest>> {
        Ok(self.read()?.updated.clone())
    }

    /// Current state of a service.
    pub fn service(&self, cluster: &str, name: &str) -> ReleaseResult<Option<ServiceDescription>> {
        Ok(self
            .read()?
            .services
            .get(&(cluster.to_owned(), name.to_owned()))
            .cloned())
    }

    fn read(&self) -> ReleaseResult<std::sync::RwLockReadGuard<'_, State>> {
        self.state.read().map_err(|_| poisoned())
    }

    fn write(&self) -> ReleaseResult<std::sync::RwLockWriteGuard<'_, State>> {
        self.state.write().map_err(|_| poisoned())
    }
}

fn poisoned() -> ReleaseError {
    ReleaseError::dependency(Collaborator::Scheduler, "lock", "lock poisoned")
}

#[async_trait]
impl ContainerScheduler for MemoryScheduler {
    async fn register_task_definition(
        &self,
        definition: &TaskDefinition,
    ) -> ReleaseResult<TaskDefinitionRef> {
        let mut state = self.write()?;

        if state.failing_families.contains(&definition.family) {
            return Err(ReleaseError::dependency(
                Collaborator::Scheduler,
                "register task definition",
                format!("registration rejected for {}", definition.family),
            ));
        }

        let revision = state
            .revisions
            .entry(definition.family.clone())
            .and_modify(|r| *r += 1)
            .or_insert(1);
        let task_ref = TaskDefinitionRef::new(definition.family.clone(), *revision);

        state
            .definitions
            .push((task_ref.clone(), definition.clone()));

        Ok(task_ref)
    }

    async fn describe_service(
        &self,
        cluster: &str,
        service_name: &str,
    ) -> ReleaseResult<Option<ServiceDescription>> {
        self.service(cluster, service_name)
    }

    async fn create_service(
        &self,
        request: &CreateServiceRequest,
    ) -> ReleaseResult<ServiceDescription> {
        let mut state = self.write()?;
        let key = (request.cluster.clone(), request.service_name.clone());

        if state.services.contains_key(&key) {
            return Err(ReleaseError::dependency(
                Collaborator::Scheduler,
                "create service",
                format!("service {} already exists", request.service_name),
            ));
        }

        let service = ServiceDescription {
            name: request.service_name.clone(),
            cluster: request.cluster.clone(),
            task_definition: request.task_definition.clone(),
            desired_count: request.desired_count,
            load_balancers: request.load_balancers.clone(),
        };

        state.services.insert(key, service.clone());
        state.created.push(request.clone());

        Ok(service)
    }

    async fn update_service(
        &self,
        request: &UpdateServiceRequest,
    ) -> ReleaseResult<ServiceDescription> {
        let mut state = self.write()?;
        let key = (request.cluster.clone(), request.service_name.clone());

        let service = state.services.get_mut(&key).ok_or_else(|| {
            ReleaseError::dependency(
                Collaborator::Scheduler,
                "update service",
                format!("service {} not found", request.service_name),
            )
        })?;

        service.task_definition = request.task_definition.clone();
        service.desired_count = request.desired_count;
        let service = service.clone();

        state.updated.push(request.clone());

        Ok(service)
    }
}
