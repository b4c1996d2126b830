pub mod config;
pub mod dependency_manager;
pub mod event_log;
pub mod events;
pub mod host;

pub use config::{ConfigError, LoadPlan, LoaderConfig};
pub use dependency_manager::{
    DependencyError, DependencyLoader, DependencyOrchestrator, LoadStatus, LoaderHandle,
    PiletManifest, PiletMetadata,
};
pub use event_log::{EventLog, EventStats};
pub use events::{EventBus, PiletEvent};
pub use host::{BundleDescriptor, HostBootstrap, HostCapabilities, InMemoryHost, ResourceHost};
