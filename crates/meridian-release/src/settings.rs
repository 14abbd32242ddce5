//! App settings bucket access.
//!
//! Each app's stack provisions a settings bucket (the `Settings` output).
//! Releases keep their environment there under `releases/{id}/env`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use tracing::debug;

use crate::config::SettingsConfig;
use crate::error::{Collaborator, ReleaseError, ReleaseResult};
use crate::types::ReleaseId;

/// Key of a release's environment object inside the settings bucket.
#[must_use]
pub fn release_env_key(id: &ReleaseId) -> String {
    format!("releases/{id}/env")
}

/// Object operations on settings buckets.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Delete an object. Deleting a missing object succeeds.
    async fn delete(&self, bucket: &str, key: &str) -> ReleaseResult<()>;
}

/// Settings buckets backed by `object_store`.
///
/// Buckets are opened lazily as S3 buckets and cached. Tests and local
/// setups can register a pre-built store for a bucket name instead.
pub struct ObjectStoreSettings {
    config: SettingsConfig,
    buckets: RwLock<HashMap<String, Arc<dyn ObjectStore>>>,
}

impl ObjectStoreSettings {
    /// Create a settings store that opens S3 buckets on demand.
    #[must_use]
    pub fn new(config: SettingsConfig) -> Self {
        Self {
            config,
            buckets: RwLock::new(HashMap::new()),
        }
    }

    /// Use a pre-built object store for a bucket name.
    #[must_use]
    pub fn with_bucket(self, bucket: impl Into<String>, store: Arc<dyn ObjectStore>) -> Self {
        if let Ok(mut buckets) = self.buckets.write() {
            buckets.insert(bucket.into(), store);
        }
        self
    }

    fn bucket(&self, bucket: &str) -> ReleaseResult<Arc<dyn ObjectStore>> {
        if let Some(store) = self
            .buckets
            .read()
            .map_err(|_| poisoned())?
            .get(bucket)
        {
            return Ok(Arc::clone(store));
        }

        let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);

        if let Some(endpoint) = &self.config.endpoint {
            builder = builder.with_endpoint(endpoint);
            if endpoint.starts_with("http://") {
                builder = builder.with_allow_http(true);
            }
        }

        if let Some(region) = &self.config.region {
            builder = builder.with_region(region);
        }

        let store: Arc<dyn ObjectStore> = Arc::new(
            builder
                .build()
                .map_err(|e| ReleaseError::dependency(Collaborator::ObjectStore, "open bucket", e))?,
        );

        self.buckets
            .write()
            .map_err(|_| poisoned())?
            .insert(bucket.to_owned(), Arc::clone(&store));

        Ok(store)
    }
}

fn poisoned() -> ReleaseError {
    ReleaseError::dependency(Collaborator::ObjectStore, "lock", "lock poisoned")
}

impl std::fmt::Debug for ObjectStoreSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreSettings")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SettingsStore for ObjectStoreSettings {
    async fn delete(&self, bucket: &str, key: &str) -> ReleaseResult<()> {
        let store = self.bucket(bucket)?;
        let path = ObjectPath::from(key);

        debug!(bucket = %bucket, key = %key, "deleting settings object");

        match store.delete(&path).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(ReleaseError::dependency(
                Collaborator::ObjectStore,
                "delete object",
                e,
            )),
        }
    }
}
