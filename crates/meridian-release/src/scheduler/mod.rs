//! Container scheduler integration.
//!
//! The scheduler runs task definitions (one container per process) as
//! long-lived services. Release operations register task definitions and
//! create services; they never start or stop individual tasks.

mod client;
mod memory;

pub use client::SchedulerClient;
pub use memory::MemoryScheduler;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ReleaseResult;
use crate::ports::PortBinding;
use crate::types::TaskDefinitionRef;

/// An environment variable set on a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    /// Variable name.
    pub name: String,
    /// Variable value.
    pub value: String,
}

/// A container inside a task definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerDefinition {
    /// Container name.
    pub name: String,
    /// Image reference to pull.
    pub image: String,
    /// CPU units reserved.
    pub cpu: u32,
    /// Memory reserved in MB.
    pub memory_mb: u32,
    /// Whether the task stops when this container stops.
    pub essential: bool,
    /// Command override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
    /// Environment variables.
    #[serde(default)]
    pub environment: Vec<EnvVar>,
    /// Published ports.
    #[serde(default)]
    pub port_mappings: Vec<PortBinding>,
}

/// A task definition to register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinition {
    /// Family the definition is registered under.
    pub family: String,
    /// Containers in the task.
    pub containers: Vec<ContainerDefinition>,
}

/// Attachment of a container port to a load balancer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancerBinding {
    /// Load balancer name.
    pub load_balancer_name: String,
    /// Container receiving traffic.
    pub container_name: String,
    /// Container port receiving traffic.
    pub container_port: u16,
}

/// A service as reported by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescription {
    /// Service name.
    pub name: String,
    /// Cluster the service runs in.
    pub cluster: String,
    /// Task definition the service runs.
    pub task_definition: TaskDefinitionRef,
    /// Desired number of running tasks.
    pub desired_count: u32,
    /// Load balancer attachments.
    #[serde(default)]
    pub load_balancers: Vec<LoadBalancerBinding>,
}

/// Request to create a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateServiceRequest {
    /// Cluster to create the service in.
    pub cluster: String,
    /// Service name.
    pub service_name: String,
    /// Task definition to run.
    pub task_definition: TaskDefinitionRef,
    /// Desired number of running tasks.
    pub desired_count: u32,
    /// Load balancer attachments.
    #[serde(default)]
    pub load_balancers: Vec<LoadBalancerBinding>,
    /// Role used to register tasks with load balancers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Request to point an existing service at a new task definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateServiceRequest {
    /// Cluster the service runs in.
    pub cluster: String,
    /// Service name.
    pub service_name: String,
    /// Task definition to run.
    pub task_definition: TaskDefinitionRef,
    /// Desired number of running tasks.
    pub desired_count: u32,
}

/// Operations release promotion needs from the container scheduler.
#[async_trait]
pub trait ContainerScheduler: Send + Sync {
    /// Register a task definition.
    ///
    /// Returns the family and the revision assigned to this registration.
    /// Revisions increase monotonically per family, starting at 1.
    async fn register_task_definition(
        &self,
        definition: &TaskDefinition,
    ) -> ReleaseResult<TaskDefinitionRef>;

    /// Describe a service by name.
    ///
    /// Returns `None` if the service does not exist in the cluster.
    async fn describe_service(
        &self,
        cluster: &str,
        service_name: &str,
    ) -> ReleaseResult<Option<ServiceDescription>>;

    /// Create a service.
    async fn create_service(
        &self,
        request: &CreateServiceRequest,
    ) -> ReleaseResult<ServiceDescription>;

    /// Update an existing service's task definition and desired count.
    async fn update_service(
        &self,
        request: &UpdateServiceRequest,
    ) -> ReleaseResult<ServiceDescription>;
}
