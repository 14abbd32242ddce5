//! HTTP client for the container scheduler API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::SchedulerConfig;
use crate::error::{Collaborator, ReleaseError, ReleaseResult};
use crate::types::TaskDefinitionRef;

use super::{
    ContainerScheduler, CreateServiceRequest, ServiceDescription, TaskDefinition,
    UpdateServiceRequest,
};

/// Raw registration response from the scheduler API.
#[derive(Deserialize)]
struct RawRegistration {
    family: String,
    revision: u32,
}

/// HTTP client for interacting with the container scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerClient {
    client: Client,
    base_url: Url,
}

fn http_error(operation: &'static str) -> impl FnOnce(reqwest::Error) -> ReleaseError {
    move |e| ReleaseError::dependency(Collaborator::Scheduler, operation, e)
}

impl SchedulerClient {
    /// Create a new scheduler client from configuration.
    pub fn new(config: &SchedulerConfig) -> ReleaseResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(http_error("build client"))?;

        let base_url = Url::parse(&config.url).map_err(|e| {
            ReleaseError::Config(format!("invalid scheduler url {}: {e}", config.url))
        })?;

        Ok(Self { client, base_url })
    }

    /// Create a new scheduler client with a custom base URL.
    pub fn with_url(url: impl Into<String>) -> ReleaseResult<Self> {
        Self::new(&SchedulerConfig {
            url: url.into(),
            ..SchedulerConfig::default()
        })
    }

    /// Base URL with `segments` appended, each percent-encoded.
    fn url(&self, segments: &[&str]) -> ReleaseResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                ReleaseError::Config(format!("scheduler url {} cannot be a base", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn service_url(&self, cluster: &str, service_name: &str) -> ReleaseResult<Url> {
        self.url(&["clusters", cluster, "services", service_name])
    }

    async fn read_json<T: DeserializeOwned>(
        response: Response,
        operation: &'static str,
    ) -> ReleaseResult<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReleaseError::dependency(
                Collaborator::Scheduler,
                operation,
                format!("unexpected status {status}: {body}"),
            ));
        }

        response.json().await.map_err(http_error(operation))
    }
}

#[async_trait]
impl ContainerScheduler for SchedulerClient {
    async fn register_task_definition(
        &self,
        definition: &TaskDefinition,
    ) -> ReleaseResult<TaskDefinitionRef> {
        const OP: &str = "register task definition";

        let response = self
            .client
            .post(self.url(&["task-definitions"])?)
            .json(definition)
            .send()
            .await
            .map_err(http_error(OP))?;

        let raw: RawRegistration = Self::read_json(response, OP).await?;

        if raw.revision == 0 {
            return Err(ReleaseError::dependency(
                Collaborator::Scheduler,
                OP,
                format!("scheduler assigned revision 0 to {}", raw.family),
            ));
        }

        Ok(TaskDefinitionRef::new(raw.family, raw.revision))
    }

    async fn describe_service(
        &self,
        cluster: &str,
        service_name: &str,
    ) -> ReleaseResult<Option<ServiceDescription>> {
        const OP: &str = "describe service";

        let response = self
            .client
            .get(self.service_url(cluster, service_name)?)
            .send()
            .await
            .map_err(http_error(OP))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        Self::read_json(response, OP).await.map(Some)
    }

    async fn create_service(
        &self,
        request: &CreateServiceRequest,
    ) -> ReleaseResult<ServiceDescription> {
        const OP: &str = "create service";

        let response = self
            .client
            .post(self.url(&["clusters", &request.cluster, "services"])?)
            .json(request)
            .send()
            .await
            .map_err(http_error(OP))?;

        Self::read_json(response, OP).await
    }

    async fn update_service(
        &self,
        request: &UpdateServiceRequest,
    ) -> ReleaseResult<ServiceDescription> {
        const OP: &str = "update service";

        let response = self
            .client
            .put(self.service_url(&request.cluster, &request.service_name)?)
            .json(request)
            .send()
            .await
            .map_err(http_error(OP))?;

        Self::read_json(response, OP).await
    }
}
