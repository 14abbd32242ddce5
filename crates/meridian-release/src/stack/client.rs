//! HTTP client for the stack orchestrator API.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::Deserialize;
use tracing::debug;

use crate::config::StackConfig;
use crate::error::{Collaborator, ReleaseError, ReleaseResult};

use super::{StackOrchestrator, UpdateStackRequest};

#[derive(Deserialize)]
struct ParametersResponse {
    parameters: Vec<String>,
}

/// HTTP client for the stack orchestrator.
#[derive(Debug, Clone)]
pub struct StackClient {
    client: Client,
    base_url: Url,
}

fn http_error(operation: &'static str) -> impl FnOnce(reqwest::Error) -> ReleaseError {
    move |e| ReleaseError::dependency(Collaborator::StackOrchestrator, operation, e)
}

impl StackClient {
    /// Create a new stack client from configuration.
    pub fn new(config: &StackConfig) -> ReleaseResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(http_error("build client"))?;

        let base_url = Url::parse(&config.url).map_err(|e| {
            ReleaseError::Config(format!("invalid stack orchestrator url {}: {e}", config.url))
        })?;

        Ok(Self { client, base_url })
    }

    /// Create a new stack client with a custom base URL.
    pub fn with_url(url: impl Into<String>) -> ReleaseResult<Self> {
        Self::new(&StackConfig {
            url: url.into(),
            ..StackConfig::default()
        })
    }

    fn stack_url(&self, stack_name: &str, rest: &[&str]) -> ReleaseResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                ReleaseError::Config(format!(
                    "stack orchestrator url {} cannot be a base",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(["stacks", stack_name])
            .extend(rest);
        Ok(url)
    }

    async fn check(response: Response, operation: &'static str) -> ReleaseResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ReleaseError::dependency(
            Collaborator::StackOrchestrator,
            operation,
            format!("unexpected status {status}: {body}"),
        ))
    }
}

#[async_trait]
impl StackOrchestrator for StackClient {
    async fn stack_parameters(&self, stack_name: &str) -> ReleaseResult<BTreeSet<String>> {
        const OP: &str = "describe stack";

        let response = self
            .client
            .get(self.stack_url(stack_name, &["parameters"])?)
            .send()
            .await
            .map_err(http_error(OP))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ReleaseError::dependency(
                Collaborator::StackOrchestrator,
                OP,
                format!("stack {stack_name} does not exist"),
            ));
        }

        let body: ParametersResponse = Self::check(response, OP)
            .await?
            .json()
            .await
            .map_err(http_error(OP))?;

        Ok(body.parameters.into_iter().collect())
    }

    async fn update_stack(&self, request: &UpdateStackRequest) -> ReleaseResult<()> {
        const OP: &str = "update stack";

        let response = self
            .client
            .put(self.stack_url(&request.stack_name, &[])?)
            .json(request)
            .send()
            .await
            .map_err(http_error(OP))?;

        let status = Self::check(response, OP).await?.status();
        debug!(stack = %request.stack_name, %status, "stack update accepted");

        Ok(())
    }
}
