//! Meridian Release Core
//!
//! This crate manages application releases: immutable bundles of a build,
//! an environment and a process manifest that can be stored, inspected and
//! promoted into a running deployment.
//!
//! # Architecture
//!
//! Release operations drive several external systems, each behind a trait
//! with an HTTP or database backed implementation and an in-memory one:
//!
//! - **Release table** ([`store::ReleaseTable`]): release records per app,
//!   ordered by creation time
//! - **Container scheduler** ([`scheduler::ContainerScheduler`]): task
//!   definitions and long-running services
//! - **Stack orchestrator** ([`stack::StackOrchestrator`]): the
//!   infrastructure stack deploying each app
//! - **Settings buckets** ([`settings::SettingsStore`]): per-release
//!   environment objects
//! - **Apps and builds** ([`apps::AppDirectory`], [`builds::BuildRegistry`]):
//!   records owned by other services, read only
//!
//! # Lifecycle
//!
//! ```text
//! Release::new ──▶ save ──▶ promote
//!                   │          │
//!                   ▼          ├──▶ compile template
//!            register tasks    ├──▶ update stack
//!                   │          └──▶ reconcile services
//!                   ▼
//!             write record
//! ```
//!
//! No step is rolled back when a later one fails. Every step can be
//! repeated: task families and service names are derived from the cluster,
//! app and process names, so a retry re-registers or finds what the failed
//! attempt left behind.
//!
//! # Example
//!
//! ```ignore
//! use meridian_release::{Release, ReleaseManager};
//!
//! let mut release = Release::new("prod", "shop")
//!     .with_build("B1")
//!     .with_env("DATABASE_URL=postgres://db/shop")
//!     .with_manifest(manifest);
//!
//! manager.save(&mut release).await?;
//! manager.promote(&release).await?;
//! ```

#![forbid(unsafe_code)]

pub mod apps;
pub mod builds;
pub mod config;
pub mod environment;
pub mod error;
pub mod manifest;
pub mod ports;
pub mod release;
pub mod scheduler;
pub mod settings;
pub mod stack;
pub mod store;
pub mod template;
pub mod types;

// Re-export commonly used types at the crate root
pub use config::ReleaseConfig;
pub use error::{ErrorKind, ReleaseError, ReleaseResult};
pub use release::{
    Collaborators, ReleaseManager, ReleaseStore, ServiceReconciler, StackPromoter, TaskRegistrar,
    RELEASE_PAGE_SIZE,
};
pub use scheduler::{MemoryScheduler, SchedulerClient};
pub use stack::{MemoryStackOrchestrator, StackClient};
pub use store::{MemoryReleaseTable, PostgresReleaseTable, ReleaseTable};
pub use template::{CommandTemplateCompiler, StaticTemplate, TemplateCompiler};
pub use types::{Process, Release, ReleaseId, TaskDefinitionRef};
