//! Release persistence.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::apps::{AppDirectory, OUTPUT_SETTINGS};
use crate::error::{ReleaseError, ReleaseResult, Resource};
use crate::settings::{release_env_key, SettingsStore};
use crate::store::{item_from_release, release_from_item, releases_table, ReleaseTable};
use crate::types::{Release, ReleaseId};

use super::TaskRegistrar;

/// Maximum number of releases returned by [`ReleaseStore::list`].
pub const RELEASE_PAGE_SIZE: usize = 10;

/// Reads and writes release records.
///
/// Every read resolves the owning app first: a missing app fails the read,
/// and the app's active release pointer decides each release's `active`
/// flag.
pub struct ReleaseStore {
    table: Arc<dyn ReleaseTable>,
    apps: Arc<dyn AppDirectory>,
    settings: Arc<dyn SettingsStore>,
    registrar: Arc<TaskRegistrar>,
}

impl ReleaseStore {
    /// Create a release store.
    pub fn new(
        table: Arc<dyn ReleaseTable>,
        apps: Arc<dyn AppDirectory>,
        settings: Arc<dyn SettingsStore>,
        registrar: Arc<TaskRegistrar>,
    ) -> Self {
        Self {
            table,
            apps,
            settings,
            registrar,
        }
    }

    /// List an app's most recent releases, newest first.
    pub async fn list(&self, cluster: &str, app: &str) -> ReleaseResult<Vec<Release>> {
        let record = self.apps.get_app(cluster, app).await?;

        let items = self
            .table
            .query_app(&releases_table(cluster, app), app, RELEASE_PAGE_SIZE)
            .await?;

        items
            .iter()
            .map(|item| {
                let mut release = release_from_item(item)?;
                release.active = record.is_active(&release.id);
                Ok(release)
            })
            .collect()
    }

    /// Get a release by id.
    pub async fn get(&self, cluster: &str, app: &str, id: &ReleaseId) -> ReleaseResult<Release> {
        let record = self.apps.get_app(cluster, app).await?;

        let item = self
            .table
            .get(&releases_table(cluster, app), id.as_str())
            .await?
            .ok_or_else(|| ReleaseError::not_found(Resource::Release, id.as_str()))?;

        let mut release = release_from_item(&item)?;
        release.active = record.is_active(&release.id);
        Ok(release)
    }

    /// Persist a release.
    ///
    /// Sets `created` on first save and registers the release's task
    /// definitions before writing. If registration fails nothing is
    /// written.
    pub async fn save(&self, release: &mut Release) -> ReleaseResult<()> {
        if release.id.is_empty() {
            return Err(ReleaseError::validation("release id is required"));
        }

        if release.created.is_none() {
            release.created = Some(Utc::now());
        }

        self.registrar.register_tasks(release).await?;

        let item = item_from_release(release)?;
        self.table
            .put(&releases_table(&release.cluster, &release.app), item)
            .await?;

        info!(
            release = %release.id,
            tasks = release.tasks.len(),
            "release saved"
        );

        Ok(())
    }

    /// Delete the release's environment object from the app's settings
    /// bucket. The release record itself is kept.
    pub async fn cleanup(&self, release: &Release) -> ReleaseResult<()> {
        let record = self.apps.get_app(&release.cluster, &release.app).await?;
        let bucket = record.output(OUTPUT_SETTINGS)?;
        let key = release_env_key(&release.id);

        self.settings.delete(bucket, &key).await?;

        debug!(release = %release.id, bucket = %bucket, key = %key, "release environment removed");
        Ok(())
    }
}

impl std::fmt::Debug for ReleaseStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleaseStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, TimeZone};
    use object_store::path::Path as ObjectPath;
    use object_store::{ObjectStore, PutPayload};

    use super::*;
    use crate::error::ErrorKind;
    use crate::release::fixtures::{Fixture, APP, CLUSTER};

    #[tokio::test]
    async fn save_sets_created_once() {
        let fx = Fixture::new();
        let store = fx.store();

        let mut release = Release::new(CLUSTER, APP);
        store.save(&mut release).await.unwrap();
        let first = release.created.unwrap();

        store.save(&mut release).await.unwrap();
        assert_eq!(release.created, Some(first));

        let stored = store.get(CLUSTER, APP, &release.id).await.unwrap();
        assert_eq!(stored.created, Some(first));
    }

    #[tokio::test]
    async fn save_with_blank_id_writes_nothing() {
        let fx = Fixture::new();
        let store = fx.store();

        let mut release = fx.release();
        release.id = ReleaseId::new(" ");

        let err = store.save(&mut release).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(release.created.is_none());
        assert!(fx.table.is_empty(&fx.table_name()).unwrap());
        assert!(fx.scheduler.registered().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_registration_writes_nothing() {
        let fx = Fixture::new();
        let store = fx.store();

        let mut release = fx.release().with_build("missing");
        let err = store.save(&mut release).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(fx.table.is_empty(&fx.table_name()).unwrap());
    }

    #[tokio::test]
    async fn get_missing_release_is_not_found() {
        let fx = Fixture::new();
        let err = fx
            .store()
            .get(CLUSTER, APP, &ReleaseId::new("RNOPE"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn reads_require_the_app() {
        let fx = Fixture::new();
        let store = fx.store();

        let err = store.list(CLUSTER, "ghost").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = store
            .get(CLUSTER, "ghost", &ReleaseId::new("R1"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn list_is_newest_first_and_paged() {
        let fx = Fixture::new();
        let store = fx.store();
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        let mut ids = Vec::new();
        for i in 0..12 {
            let mut release = Release::new(CLUSTER, APP);
            release.created = Some(start + Duration::minutes(i));
            store.save(&mut release).await.unwrap();
            ids.push(release.id);
        }

        let listed = store.list(CLUSTER, APP).await.unwrap();
        assert_eq!(listed.len(), RELEASE_PAGE_SIZE);
        assert_eq!(listed[0].id, ids[11]);
        assert!(listed
            .windows(2)
            .all(|pair| pair[0].created > pair[1].created));
    }

    #[tokio::test]
    async fn active_flag_follows_the_app() {
        let fx = Fixture::new();
        let store = fx.store();

        let mut first = Release::new(CLUSTER, APP);
        let mut second = Release::new(CLUSTER, APP);
        store.save(&mut first).await.unwrap();
        store.save(&mut second).await.unwrap();

        let listed = store.list(CLUSTER, APP).await.unwrap();
        assert!(listed.iter().all(|r| !r.active));

        fx.apps.set_release(CLUSTER, APP, first.id.clone()).unwrap();

        let listed = store.list(CLUSTER, APP).await.unwrap();
        let active: Vec<_> = listed.iter().filter(|r| r.active).collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, first.id);

        assert!(store.get(CLUSTER, APP, &first.id).await.unwrap().active);
        assert!(!store.get(CLUSTER, APP, &second.id).await.unwrap().active);
    }

    #[tokio::test]
    async fn cleanup_removes_only_the_environment_object() {
        let fx = Fixture::new();
        let store = fx.store();

        let mut release = fx.release();
        store.save(&mut release).await.unwrap();

        let path = ObjectPath::from(release_env_key(&release.id));
        fx.bucket
            .put(&path, PutPayload::from(b"KEY=VALUE".to_vec()))
            .await
            .unwrap();

        store.cleanup(&release).await.unwrap();

        assert!(fx.bucket.head(&path).await.is_err());
        assert!(store.get(CLUSTER, APP, &release.id).await.is_ok());
    }

    #[tokio::test]
    async fn cleanup_requires_settings_output() {
        let fx = Fixture::new();
        fx.apps.put(crate::apps::App::new(CLUSTER, APP)).unwrap();

        let err = fx
            .store()
            .cleanup(&Release::new(CLUSTER, APP))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
