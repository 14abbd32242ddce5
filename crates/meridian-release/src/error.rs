//! Error types for meridian-release.

use std::fmt;

/// Result type alias using [`ReleaseError`].
pub type ReleaseResult<T> = Result<T, ReleaseError>;

/// Boxed error carried as the source of a [`ReleaseError::Dependency`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// External system a release operation talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collaborator {
    /// Release table storage.
    MetadataStore,
    /// Settings bucket holding release environment objects.
    ObjectStore,
    /// Container scheduler (task definitions and services).
    Scheduler,
    /// Deployment stack orchestrator.
    StackOrchestrator,
    /// External stack template generator.
    TemplateGenerator,
    /// Build registry.
    BuildRegistry,
    /// Application record directory.
    AppDirectory,
}

impl Collaborator {
    /// Get the collaborator name as a static string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MetadataStore => "metadata store",
            Self::ObjectStore => "object store",
            Self::Scheduler => "scheduler",
            Self::StackOrchestrator => "stack orchestrator",
            Self::TemplateGenerator => "template generator",
            Self::BuildRegistry => "build registry",
            Self::AppDirectory => "app directory",
        }
    }
}

impl fmt::Display for Collaborator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of record a lookup missed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// Application record.
    App,
    /// Build artifact.
    Build,
    /// Release record.
    Release,
    /// Named output on an application record.
    Output,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::App => "app",
            Self::Build => "build",
            Self::Release => "release",
            Self::Output => "app output",
        };
        f.write_str(name)
    }
}

/// Coarse classification of a [`ReleaseError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required field was missing or malformed.
    Validation,
    /// A lookup did not find its record.
    NotFound,
    /// An external collaborator failed.
    Dependency,
    /// Configuration could not be loaded.
    Config,
}

/// Errors that can occur while storing or promoting releases.
#[derive(Debug, thiserror::Error)]
pub enum ReleaseError {
    /// A required field is missing or invalid.
    #[error("validation error: {0}")]
    Validation(String),

    /// A lookup missed.
    #[error("{resource} not found: {id}")]
    NotFound {
        /// What was looked up.
        resource: Resource,
        /// Identifier that missed.
        id: String,
    },

    /// An external collaborator failed.
    #[error("{collaborator} {operation} failed: {source}")]
    Dependency {
        /// Which collaborator failed.
        collaborator: Collaborator,
        /// Operation that was being performed.
        operation: &'static str,
        /// Underlying error.
        #[source]
        source: BoxError,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ReleaseError {
    /// Create a validation error.
    #[must_use]
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a not-found error.
    #[must_use]
    pub fn not_found(resource: Resource, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource,
            id: id.into(),
        }
    }

    /// Wrap a collaborator failure with the operation that produced it.
    #[must_use]
    pub fn dependency(
        collaborator: Collaborator,
        operation: &'static str,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Dependency {
            collaborator,
            operation,
            source: source.into(),
        }
    }

    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Dependency { .. } => ErrorKind::Dependency,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    /// The collaborator that failed, for dependency errors.
    #[must_use]
    pub const fn collaborator(&self) -> Option<Collaborator> {
        match self {
            Self::Dependency { collaborator, .. } => Some(*collaborator),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependency_error_names_collaborator_and_operation() {
        let err = ReleaseError::dependency(Collaborator::Scheduler, "create service", "boom");

        assert_eq!(err.kind(), ErrorKind::Dependency);
        assert_eq!(err.collaborator(), Some(Collaborator::Scheduler));
        assert_eq!(err.to_string(), "scheduler create service failed: boom");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn not_found_display() {
        let err = ReleaseError::not_found(Resource::Build, "B123");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "build not found: B123");
        assert!(err.collaborator().is_none());
    }
}
