mod error;
mod loader;
mod manager;
mod manifest;
mod priority;
pub mod references;
mod registry;
mod release;
mod session;


pub use error::DependencyError;
pub use manager::{DependencyLoader, DependencyOrchestrator};
pub use manifest::{PiletManifest, PiletMetadata};
pub use priority::{clamp_priority, PriorityLoadEntry, PriorityQueue};
pub use registry::{
    DependencySnapshot, ReleaseOutcome, SharedDependencyRecord, SharedDependencyRegistry,
};
pub use session::{LoadStatus, LoaderHandle};

use futures::future::{BoxFuture, Shared};

pub type Result<T> = std::result::Result<T, DependencyError>;

/// A memoized load that any number of awaiters can share.
pub type LoadFuture = Shared<BoxFuture<'static, Result<()>>>;

// Constants
pub const MODULE_EXTENSION: &str = ".dll";
pub const SYMBOL_EXTENSION: &str = ".pdb";
pub const FRAMEWORK_MARKER: &str = "_framework";
pub const DEFAULT_PILET_NAME: &str = "(unknown)";
pub const DEFAULT_PILET_VERSION: &str = "0.0.0";
