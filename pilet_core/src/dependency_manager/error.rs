use thiserror::Error;

/// Errors produced while linking or unlinking pilet dependencies.
///
/// Values of this type are the output of shared load futures that may have
/// several awaiters, so the type is `Clone` and only carries string context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DependencyError {
    #[error("Failed to load resource {url}: {reason}")]
    ResourceLoad { url: String, reason: String },

    #[error("Failed to unload resource {url}: {reason}")]
    ResourceUnload { url: String, reason: String },

    #[error("Failed to load isolated bundle {id}: {reason}")]
    BundleLoad { id: String, reason: String },

    #[error("Failed to unload isolated bundle {id}: {reason}")]
    BundleUnload { id: String, reason: String },

    #[error("Host did not become ready: {0}")]
    HostNotReady(String),

    #[error("No module reference declared for pilet {0}")]
    MissingModuleReference(String),

    #[error("Dependency orchestrator was dropped before the load started")]
    OrchestratorDropped,
}

impl DependencyError {
    /// Whether the error was raised while tearing a dependency down.
    pub fn is_unload_failure(&self) -> bool {
        matches!(
            self,
            DependencyError::ResourceUnload { .. } | DependencyError::BundleUnload { .. }
        )
    }
}
