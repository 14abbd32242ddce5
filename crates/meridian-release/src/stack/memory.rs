//! In-memory stack orchestrator for testing.

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{Collaborator, ReleaseError, ReleaseResult};

use super::{StackOrchestrator, UpdateStackRequest};

#[derive(Debug, Default)]
struct State {
    stacks: HashMap<String, BTreeSet<String>>,
    updates: Vec<UpdateStackRequest>,
    reject_updates: bool,
}

/// In-memory orchestrator that records submitted updates.
#[derive(Debug, Default)]
pub struct MemoryStackOrchestrator {
    state: RwLock<State>,
}

impl MemoryStackOrchestrator {
    /// Create an orchestrator with no stacks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a deployed stack and the parameter keys it accepts.
    pub fn put_stack<I, S>(&self, stack_name: impl Into<String>, parameters: I) -> ReleaseResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.write()?.stacks.insert(
            stack_name.into(),
            parameters.into_iter().map(Into::into).collect(),
        );
        Ok(())
    }

    /// Make every subsequent update fail.
    pub fn reject_updates(&self) -> ReleaseResult<()> {
        self.write()?.reject_updates = true;
        Ok(())
    }

    /// Updates accepted so far, in order.
    pub fn updates(&self) -> ReleaseResult<Vec<UpdateStackRequest>> {
        Ok(self.read()?.updates.clone())
    }

    fn read(&self) -> ReleaseResult<std::sync::RwLockReadGuard<'_, State>> {
        self.state.read().map_err(|_| poisoned())
    }

    fn write(&self) -> ReleaseResult<std::sync::RwLockWriteGuard<'_, State>> {
        self.state.write().map_err(|_| poisoned())
    }
}

fn poisoned() -> ReleaseError {
    ReleaseError::dependency(Collaborator::StackOrchestrator, "lock", "lock poisoned")
}

fn missing(operation: &'static str, stack_name: &str) -> ReleaseError {
    ReleaseError::dependency(
        Collaborator::StackOrchestrator,
        operation,
        format!("stack {stack_name} does not exist"),
    )
}

#[async_trait]
impl StackOrchestrator for MemoryStackOrchestrator {
    async fn stack_parameters(&self, stack_name: &str) -> ReleaseResult<BTreeSet<String>> {
        self.read()?
            .stacks
            .get(stack_name)
            .cloned()
            .ok_or_else(|| missing("describe stack", stack_name))
    }

    async fn update_stack(&self, request: &UpdateStackRequest) -> ReleaseResult<()> {
        let mut state = self.write()?;

        if state.reject_updates {
            return Err(ReleaseError::dependency(
                Collaborator::StackOrchestrator,
                "update stack",
                "update rejected",
            ));
        }

        if !state.stacks.contains_key(&request.stack_name) {
            return Err(missing("update stack", &request.stack_name));
        }

        state.updates.push(request.clone());
        Ok(())
    }
}
