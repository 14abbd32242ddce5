//! Common test utilities for release integration tests.

#![allow(dead_code, clippy::unwrap_used)]

pub mod fixtures;

use meridian_release::apps::MemoryAppDirectory;
use meridian_release::builds::{Build, MemoryBuildRegistry};
use meridian_release::config::{ReleaseConfig, SettingsConfig};
use meridian_release::manifest::TomlManifest;
use meridian_release::settings::ObjectStoreSettings;
use meridian_release::{
    Collaborators, MemoryReleaseTable, MemoryScheduler, MemoryStackOrchestrator, ReleaseManager,
    StaticTemplate, TemplateCompiler,
};
use object_store::memory::InMemory;
use std::sync::Arc;

use fixtures::AppBuilder;

pub const CLUSTER: &str = "prod";
pub const APP: &str = "shop";
pub const BUILD: &str = "BREL42";
pub const BALANCER: &str = "shop-balancer";
pub const SETTINGS_BUCKET: &str = "shop-settings";
pub const TEMPLATE: &str = r#"{"AWSTemplateFormatVersion":"2010-09-09"}"#;

/// Release manager wired to in-memory collaborators.
pub struct TestHarness {
    pub table: Arc<MemoryReleaseTable>,
    pub apps: Arc<MemoryAppDirectory>,
    pub builds: Arc<MemoryBuildRegistry>,
    pub scheduler: Arc<MemoryScheduler>,
    pub stacks: Arc<MemoryStackOrchestrator>,
    pub bucket: Arc<InMemory>,
    pub manager: ReleaseManager,
}

impl TestHarness {
    /// Creates a harness with one app, one build and its stack.
    pub fn new() -> Self {
        Self::with_config(ReleaseConfig::default())
    }

    /// Creates a harness with custom release configuration.
    pub fn with_config(config: ReleaseConfig) -> Self {
        Self::with_template(config, Arc::new(StaticTemplate::new(TEMPLATE)))
    }

    /// Creates a harness with custom configuration and template compiler.
    pub fn with_template(config: ReleaseConfig, template: Arc<dyn TemplateCompiler>) -> Self {
        let table = Arc::new(MemoryReleaseTable::new());
        let apps = Arc::new(MemoryAppDirectory::new());
        let builds = Arc::new(MemoryBuildRegistry::new());
        let scheduler = Arc::new(MemoryScheduler::new());
        let stacks = Arc::new(MemoryStackOrchestrator::new());
        let bucket = Arc::new(InMemory::new());

        apps.put(
            AppBuilder::new(CLUSTER, APP)
                .with_output("Balancer", BALANCER)
                .with_output("Settings", SETTINGS_BUCKET)
                .with_parameter("Cluster", CLUSTER)
                .with_parameter("Private", "No")
                .with_parameter("Removed", "yes")
                .build(),
        )
        .unwrap();

        builds.put(CLUSTER, Build::new(BUILD, APP)).unwrap();

        stacks
            .put_stack(format!("{CLUSTER}-{APP}"), ["Cluster", "Private", "Version"])
            .unwrap();

        let settings = ObjectStoreSettings::new(SettingsConfig::default())
            .with_bucket(SETTINGS_BUCKET, bucket.clone());

        let manager = ReleaseManager::new(
            Collaborators {
                table: table.clone(),
                apps: apps.clone(),
                builds: builds.clone(),
                scheduler: scheduler.clone(),
                stacks: stacks.clone(),
                settings: Arc::new(settings),
                template,
                manifest: Arc::new(TomlManifest),
            },
            &config,
        );

        Self {
            table,
            apps,
            builds,
            scheduler,
            stacks,
            bucket,
            manager,
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
