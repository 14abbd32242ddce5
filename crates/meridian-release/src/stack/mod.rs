//! Deployment stack orchestration.
//!
//! Each app is deployed by one infrastructure stack named `{cluster}-{app}`.
//! Promotion replaces the stack's template and re-submits the parameters
//! the stack already declares.

mod client;
mod memory;

pub use client::StackClient;
pub use memory::MemoryStackOrchestrator;

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ReleaseResult;

/// A parameter value submitted with a stack update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackParameter {
    /// Parameter key.
    pub key: String,
    /// Parameter value.
    pub value: String,
}

/// Request to update a deployed stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateStackRequest {
    /// Stack to update.
    pub stack_name: String,
    /// Full replacement template.
    pub template_body: String,
    /// Parameter values, each already accepted by the stack.
    #[serde(default)]
    pub parameters: Vec<StackParameter>,
}

/// Operations release promotion needs from the stack orchestrator.
#[async_trait]
pub trait StackOrchestrator: Send + Sync {
    /// Parameter keys the currently deployed stack accepts.
    async fn stack_parameters(&self, stack_name: &str) -> ReleaseResult<BTreeSet<String>>;

    /// Submit a stack update.
    ///
    /// Returns once the orchestrator has accepted the update. It does not
    /// wait for the stack to converge.
    async fn update_stack(&self, request: &UpdateStackRequest) -> ReleaseResult<()>;
}
