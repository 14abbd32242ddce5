//! Stack template compilation.
//!
//! The stack template is rendered by an external generator from the
//! process topology. The generator only needs to know which host ports the
//! app publishes; it receives one `-p HOST:HOST` flag per bound port. The
//! caller passes the same [`PortAllocator`] task registration uses, so the
//! flags match the host ports in the registered task definitions.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command as TokioCommand;
use tracing::{debug, instrument};

use crate::config::TemplateConfig;
use crate::error::{Collaborator, ReleaseError, ReleaseResult};
use crate::ports::PortAllocator;
use crate::types::Process;

/// Renders the stack template for a set of processes.
#[async_trait]
pub trait TemplateCompiler: Send + Sync {
    /// Render the template body, publishing host ports from `ports`.
    async fn compile(
        &self,
        processes: &[Process],
        ports: &dyn PortAllocator,
    ) -> ReleaseResult<String>;
}

/// Generator flags publishing every bound host port of `processes`.
pub fn port_args(processes: &[Process], ports: &dyn PortAllocator) -> ReleaseResult<Vec<String>> {
    let mut args = Vec::new();
    for process in processes {
        for binding in ports.bind(&process.ports)? {
            args.push("-p".to_owned());
            args.push(format!("{0}:{0}", binding.host_port));
        }
    }
    Ok(args)
}

/// Compiles templates by running an external program.
#[derive(Debug, Clone)]
pub struct CommandTemplateCompiler {
    program: String,
    args: Vec<String>,
}

impl CommandTemplateCompiler {
    /// Create a compiler from configuration.
    #[must_use]
    pub fn new(config: &TemplateConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
        }
    }
}

#[async_trait]
impl TemplateCompiler for CommandTemplateCompiler {
    #[instrument(skip_all)]
    async fn compile(
        &self,
        processes: &[Process],
        ports: &dyn PortAllocator,
    ) -> ReleaseResult<String> {
        let mut args = self.args.clone();
        args.extend(port_args(processes, ports)?);
        debug!(program = %self.program, ?args, "running template generator");

        let output = TokioCommand::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| ReleaseError::dependency(Collaborator::TemplateGenerator, "spawn", e))?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            return Err(ReleaseError::dependency(
                Collaborator::TemplateGenerator,
                "compile template",
                format!("{} exited with {}: {}", self.program, output.status, combined.trim()),
            ));
        }

        Ok(combined)
    }
}

/// Template compiler returning a fixed body.
///
/// Useful for tests and for environments without a generator installed.
#[derive(Debug, Clone, Default)]
pub struct StaticTemplate {
    body: String,
}

impl StaticTemplate {
    /// Always render `body`.
    #[must_use]
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }
}

#[async_trait]
impl TemplateCompiler for StaticTemplate {
    async fn compile(
        &self,
        _processes: &[Process],
        _ports: &dyn PortAllocator,
    ) -> ReleaseResult<String> {
        Ok(self.body.clone())
    }
}
