use std::sync::Arc;

use thiserror::Error;

use crate::hook::{HookError, HookStage};
use crate::report::ResolutionReport;
use crate::resource::ResourceId;

#[derive(Error, Debug)]
pub enum ResolverError {
    // Normal resolution failures, the report explains why
    #[error("Could not resolve modules: {}", report.summary())]
    Resolution { report: Arc<ResolutionReport> },

    // Hook errors
    #[error("Resolver hook failed during {stage}: {source}")]
    Hook {
        stage: HookStage,
        #[source]
        source: HookError,
    },

    #[error("Resolve operation invoked from within a resolve operation on the same thread")]
    ReentrantResolve,

    #[error("Search limit of {limit} candidate attempts exceeded")]
    SearchLimitExceeded { limit: u64 },

    // Lifecycle errors
    #[error("Unknown resource: {0}")]
    UnknownResource(ResourceId),

    #[error("A resource is already installed at location {location}")]
    DuplicateLocation { location: String },

    #[error("Invalid version: {0}")]
    InvalidVersion(#[from] modwire_version::VersionError),

    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ResolverError {
    /// The resolution report, when this is an ordinary resolution failure
    pub fn report(&self) -> Option<&Arc<ResolutionReport>> {
        match self {
            ResolverError::Resolution { report } => Some(report),
            _ => None,
        }
    }

    pub(crate) fn hook(stage: HookStage, source: HookError) -> Self {
        ResolverError::Hook { stage, source }
    }
}

pub type Result<T> = std::result::Result<T, ResolverError>;
