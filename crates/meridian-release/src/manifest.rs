//! Manifest loading.
//!
//! A manifest describes the processes that make up an app. The rest of the
//! crate only depends on the ordered process list a [`ManifestLoader`]
//! produces, so other manifest formats can be plugged in.
//!
//! The bundled [`TomlManifest`] reads an array of `process` tables:
//!
//! ```toml
//! [[process]]
//! name = "web"
//! count = 2
//! command = "bin/web --port 5000"
//! ports = [5000]
//!
//! [[process]]
//! name = "worker"
//! ```

use std::collections::HashSet;

use serde::Deserialize;

use crate::error::{ReleaseError, ReleaseResult};
use crate::types::Process;

/// Parses a serialised manifest into its processes.
pub trait ManifestLoader: Send + Sync {
    /// Parse `manifest` into processes, preserving declaration order.
    fn load(&self, manifest: &str) -> ReleaseResult<Vec<Process>>;
}

/// TOML manifest format.
#[derive(Debug, Clone, Copy, Default)]
pub struct TomlManifest;

#[derive(Deserialize)]
struct RawManifest {
    #[serde(default)]
    process: Vec<Process>,
}

impl ManifestLoader for TomlManifest {
    fn load(&self, manifest: &str) -> ReleaseResult<Vec<Process>> {
        let raw: RawManifest = toml::from_str(manifest)
            .map_err(|e| ReleaseError::validation(format!("malformed manifest: {e}")))?;

        let mut seen = HashSet::new();
        for process in &raw.process {
            if process.name.trim().is_empty() {
                return Err(ReleaseError::validation("manifest process has no name"));
            }
            if !seen.insert(process.name.as_str()) {
                return Err(ReleaseError::validation(format!(
                    "manifest declares process '{}' more than once",
                    process.name
                )));
            }
        }

        Ok(raw.process)
    }
}
