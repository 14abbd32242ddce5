//! Configuration for meridian-release.

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::Deserialize;

use crate::error::{ReleaseError, ReleaseResult};
use crate::ports::DEFAULT_BASE_PORT;

/// Top-level configuration for release operations.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ReleaseConfig {
    /// Release table database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Container scheduler client configuration.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Stack orchestrator client configuration.
    #[serde(default)]
    pub stack: StackConfig,

    /// Stack template generator configuration.
    #[serde(default)]
    pub template: TemplateConfig,

    /// Task definition defaults.
    #[serde(default)]
    pub tasks: TaskConfig,

    /// Service reconciliation behaviour.
    #[serde(default)]
    pub services: ServiceConfig,

    /// Settings bucket access.
    #[serde(default)]
    pub settings: SettingsConfig,
}

impl ReleaseConfig {
    /// Load configuration from the default sources.
    ///
    /// Configuration is loaded in the following order (later sources override earlier):
    /// 1. Default values
    /// 2. `meridian.toml` in the current directory (if present)
    /// 3. Environment variables with `MERIDIAN_` prefix
    pub fn load() -> ReleaseResult<Self> {
        Figment::new()
            .merge(Toml::file("meridian.toml"))
            .merge(Env::prefixed("MERIDIAN_").split("__"))
            .extract()
            .map_err(|e| ReleaseError::Config(e.to_string()))
    }

    /// Load configuration from a specific TOML file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> ReleaseResult<Self> {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("MERIDIAN_").split("__"))
            .extract()
            .map_err(|e| ReleaseError::Config(e.to_string()))
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL.
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_database_url() -> String {
    "postgres://localhost/meridian".to_owned()
}

const fn default_max_connections() -> u32 {
    10
}

const fn default_connect_timeout_secs() -> u64 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

/// Container scheduler client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Base URL for the scheduler HTTP API.
    #[serde(default = "default_scheduler_url")]
    pub url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_scheduler_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_scheduler_url() -> String {
    "http://localhost:8082".to_owned()
}

const fn default_scheduler_timeout_secs() -> u64 {
    10
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            url: default_scheduler_url(),
            timeout_secs: default_scheduler_timeout_secs(),
        }
    }
}

/// Stack orchestrator client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StackConfig {
    /// Base URL for the orchestrator HTTP API.
    #[serde(default = "default_stack_url")]
    pub url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_stack_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_stack_url() -> String {
    "http://localhost:8084".to_owned()
}

const fn default_stack_timeout_secs() -> u64 {
    30
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            url: default_stack_url(),
            timeout_secs: default_stack_timeout_secs(),
        }
    }
}

/// External template generator configuration.
///
/// The generator is run as `program args... -p HOST:HOST ...` and must print
/// the stack template on its output.
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateConfig {
    /// Program to execute.
    #[serde(default = "default_template_program")]
    pub program: String,

    /// Arguments placed before the port flags.
    #[serde(default = "default_template_args")]
    pub args: Vec<String>,
}

fn default_template_program() -> String {
    "docker".to_owned()
}

fn default_template_args() -> Vec<String> {
    vec!["run".to_owned(), "convox/app".to_owned()]
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            program: default_template_program(),
            args: default_template_args(),
        }
    }
}

/// Defaults applied to every registered task definition.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// Name of the single container in each task definition.
    #[serde(default = "default_container_name")]
    pub container_name: String,

    /// CPU units reserved for the container.
    #[serde(default = "default_cpu")]
    pub cpu: u32,

    /// Memory reserved for the container in MB.
    #[serde(default = "default_memory_mb")]
    pub memory_mb: u32,

    /// First host port for published container ports.
    #[serde(default = "default_base_port")]
    pub base_port: u16,
}

fn default_container_name() -> String {
    "main".to_owned()
}

const fn default_cpu() -> u32 {
    200
}

const fn default_memory_mb() -> u32 {
    300
}

const fn default_base_port() -> u16 {
    DEFAULT_BASE_PORT
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            container_name: default_container_name(),
            cpu: default_cpu(),
            memory_mb: default_memory_mb(),
            base_port: default_base_port(),
        }
    }
}

/// Service reconciliation behaviour.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceConfig {
    /// Role the scheduler assumes to manage load balancer registration.
    #[serde(default)]
    pub role: Option<String>,

    /// Point services that already exist at the new task definition.
    ///
    /// Off by default: promoting a release whose services already exist
    /// leaves them running the previous task definition.
    #[serde(default)]
    pub update_existing: bool,
}

/// Settings bucket access configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsConfig {
    /// S3 endpoint URL (for S3-compatible stores).
    pub endpoint: Option<String>,

    /// S3 region.
    pub region: Option<String>,
}
