//! Release table storage backends.
//!
//! Releases live in one table per cluster/app pair. Each release is stored
//! as a sparse item of string attributes: `id`, `cluster`, `app` and
//! `created` are always present, `build`, `env` and `manifest` only when
//! set, and `tasks` as a JSON object string. Backends only move items; the
//! mapping between items and [`Release`] values lives here.

mod memory;
mod postgres;

pub use memory::MemoryReleaseTable;
pub use postgres::PostgresReleaseTable;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::{Collaborator, ReleaseError, ReleaseResult};
use crate::types::{Release, ReleaseId, TaskDefinitionRef};

/// A stored release: attribute name to string value.
pub type Item = BTreeMap<String, String>;

/// Attribute names used in release items.
pub mod attr {
    /// Release id (primary key).
    pub const ID: &str = "id";
    /// Owning cluster.
    pub const CLUSTER: &str = "cluster";
    /// Owning app (query key).
    pub const APP: &str = "app";
    /// Sortable creation time (sort key).
    pub const CREATED: &str = "created";
    /// Build reference.
    pub const BUILD: &str = "build";
    /// Environment blob.
    pub const ENV: &str = "env";
    /// Manifest.
    pub const MANIFEST: &str = "manifest";
    /// Task references as a JSON object.
    pub const TASKS: &str = "tasks";
}

/// Format of the `created` attribute. Lexical order matches time order.
pub const CREATED_FORMAT: &str = "%Y%m%d.%H%M%S.%9f";

/// Name of the release table for an app.
#[must_use]
pub fn releases_table(cluster: &str, app: &str) -> String {
    format!("{cluster}-{app}-releases")
}

/// Backend holding release tables.
///
/// `get` must be strongly consistent: release data feeds deployment
/// decisions and a stale replica read could promote the wrong tasks.
#[async_trait]
pub trait ReleaseTable: Send + Sync {
    /// Get an item by release id.
    ///
    /// Returns `None` if the item does not exist.
    async fn get(&self, table: &str, id: &str) -> ReleaseResult<Option<Item>>;

    /// Query the items of an app, newest `created` first, at most `limit`.
    async fn query_app(&self, table: &str, app: &str, limit: usize) -> ReleaseResult<Vec<Item>>;

    /// Write an item, replacing any item with the same id.
    async fn put(&self, table: &str, item: Item) -> ReleaseResult<()>;
}

/// Format a creation time for storage.
#[must_use]
pub fn format_created(created: DateTime<Utc>) -> String {
    created.format(CREATED_FORMAT).to_string()
}

/// Parse a stored creation time.
pub fn parse_created(value: &str) -> ReleaseResult<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, CREATED_FORMAT)
        .map(|t| t.and_utc())
        .map_err(|e| {
            ReleaseError::dependency(
                Collaborator::MetadataStore,
                "decode item",
                format!("invalid created time '{value}': {e}"),
            )
        })
}

/// Convert a release into a storable item.
///
/// The release must already carry an id and a creation time.
pub fn item_from_release(release: &Release) -> ReleaseResult<Item> {
    let created = release
        .created
        .ok_or_else(|| ReleaseError::validation("release has no creation time"))?;

    let mut item = Item::new();
    item.insert(attr::ID.to_owned(), release.id.as_str().to_owned());
    item.insert(attr::CLUSTER.to_owned(), release.cluster.clone());
    item.insert(attr::APP.to_owned(), release.app.clone());
    item.insert(attr::CREATED.to_owned(), format_created(created));

    let optional = [
        (attr::BUILD, &release.build),
        (attr::ENV, &release.env),
        (attr::MANIFEST, &release.manifest),
    ];
    for (name, value) in optional {
        if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
            item.insert(name.to_owned(), value.to_owned());
        }
    }

    let tasks = serde_json::to_string(&release.tasks).map_err(|e| {
        ReleaseError::dependency(Collaborator::MetadataStore, "encode item", e)
    })?;
    item.insert(attr::TASKS.to_owned(), tasks);

    Ok(item)
}

/// Convert a stored item back into a release.
///
/// `active` is always `false`; callers compute it against the app record.
pub fn release_from_item(item: &Item) -> ReleaseResult<Release> {
    let id = item
        .get(attr::ID)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            ReleaseError::dependency(
                Collaborator::MetadataStore,
                "decode item",
                "item has no id",
            )
        })?;

    let created = item
        .get(attr::CREATED)
        .map(|v| parse_created(v.as_str()))
        .transpose()?;

    let tasks: BTreeMap<String, TaskDefinitionRef> = match item.get(attr::TASKS) {
        Some(raw) => serde_json::from_str(raw).map_err(|e| {
            ReleaseError::dependency(Collaborator::MetadataStore, "decode item", e)
        })?,
        None => BTreeMap::new(),
    };

    let text = |name: &str| item.get(name).cloned().unwrap_or_default();
    let optional = |name: &str| item.get(name).filter(|v| !v.is_empty()).cloned();

    Ok(Release {
        id: ReleaseId::new(id.clone()),
        cluster: text(attr::CLUSTER),
        app: text(attr::APP),
        build: optional(attr::BUILD),
        env: optional(attr::ENV),
        manifest: optional(attr::MANIFEST),
        tasks,
        created,
        active: false,
    })
}
