//! Interface to the host runtime that actually links pilet binaries.
//!
//! The orchestrator never fetches or links anything itself; it drives a
//! [`ResourceHost`] and waits on the host's bootstrap through a
//! [`HostBootstrap`].

mod memory;

pub use memory::{HostCall, InMemoryHost};

use crate::dependency_manager::{DependencyError, Result};
use async_trait::async_trait;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use tokio::sync::oneshot;

pub const CAPABILITY_LOAD: &str = "load";
pub const CAPABILITY_LANGUAGE: &str = "language";
pub const CAPABILITY_DEPENDENCY_SYMBOLS: &str = "dependency-symbols";

/// Locale name to the satellite resources shipped for it.
pub type Satellites = BTreeMap<String, Vec<String>>;

/// Primitives the host runtime exposes for linking pilet binaries.
#[async_trait]
pub trait ResourceHost: Send + Sync {
    /// Fetch and link a single module.
    async fn load_resource(&self, url: &str) -> Result<()>;

    /// Fetch and link a module together with its debug symbols.
    async fn load_resource_with_symbol(&self, url: &str, symbol_url: &str) -> Result<()>;

    /// Unlink a module previously linked by one of the load primitives.
    async fn unload_resource(&self, url: &str) -> Result<()>;

    /// Link a dedicated bundle for one pilet.
    async fn load_isolated_bundle(&self, id: &str, descriptor: BundleDescriptor) -> Result<()>;

    /// Tear down a bundle created by `load_isolated_bundle`.
    async fn unload_isolated_bundle(&self, id: &str) -> Result<()>;
}

/// Everything the host needs to link an isolated pilet bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleDescriptor {
    pub name: String,
    pub version: String,
    /// The pilet configuration serialized as JSON
    pub config: String,
    pub base_url: String,
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependency_symbols: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub satellites: Option<Satellites>,
    pub module_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol_url: Option<String>,
}

/// Feature flags the host declares once its bootstrap completed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostCapabilities(BTreeSet<String>);

impl HostCapabilities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, capability: impl Into<String>) -> Self {
        self.0.insert(capability.into());
        self
    }

    pub fn contains(&self, capability: &str) -> bool {
        self.0.contains(capability)
    }

    /// The host links every pilet as its own bundle.
    pub fn isolated_load(&self) -> bool {
        self.contains(CAPABILITY_LOAD)
    }

    /// The host understands satellite (locale) resources.
    pub fn language(&self) -> bool {
        self.contains(CAPABILITY_LANGUAGE)
    }

    /// The host accepts debug symbols for auxiliary dependencies.
    pub fn dependency_symbols(&self) -> bool {
        self.contains(CAPABILITY_DEPENDENCY_SYMBOLS)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for HostCapabilities {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Resolves once the host finished its own bootstrap.
pub type HostReady = Shared<BoxFuture<'static, Result<HostCapabilities>>>;

/// The host's activation mode plus its reusable ready future.
#[derive(Clone)]
pub struct HostBootstrap {
    lazy: bool,
    ready: HostReady,
}

impl HostBootstrap {
    pub fn new<F>(lazy: bool, ready: F) -> Self
    where
        F: Future<Output = Result<HostCapabilities>> + Send + 'static,
    {
        Self {
            lazy,
            ready: ready.boxed().shared(),
        }
    }

    /// A host that is already up with the given capabilities.
    pub fn ready(lazy: bool, capabilities: HostCapabilities) -> Self {
        Self::new(lazy, async move { Ok(capabilities) })
    }

    /// A host whose bootstrap completes when the returned signal fires.
    pub fn deferred(lazy: bool) -> (Self, HostReadySignal) {
        let (tx, rx) = oneshot::channel();
        let bootstrap = Self::new(lazy, async move {
            match rx.await {
                Ok(outcome) => outcome,
                Err(_) => Err(DependencyError::HostNotReady(
                    "bootstrap signal dropped".to_string(),
                )),
            }
        });
        (bootstrap, HostReadySignal { tx })
    }

    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    pub fn ready_future(&self) -> HostReady {
        self.ready.clone()
    }
}

impl std::fmt::Debug for HostBootstrap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostBootstrap")
            .field("lazy", &self.lazy)
            .field("ready", &self.ready.peek().is_some())
            .finish()
    }
}

/// Completes a [`HostBootstrap::deferred`] bootstrap.
#[derive(Debug)]
pub struct HostReadySignal {
    tx: oneshot::Sender<Result<HostCapabilities>>,
}

impl HostReadySignal {
    pub fn ready(self, capabilities: HostCapabilities) {
        let _ = self.tx.send(Ok(capabilities));
    }

    pub fn fail(self, reason: impl Into<String>) {
        let _ = self
            .tx
            .send(Err(DependencyError::HostNotReady(reason.into())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities() {
        let caps: HostCapabilities = ["load", "language"].into_iter().collect();
        assert!(caps.isolated_load());
        assert!(caps.language());
        assert!(!caps.dependency_symbols());

        let caps = caps.with(CAPABILITY_DEPENDENCY_SYMBOLS);
        assert!(caps.dependency_symbols());
        assert_eq!(caps.iter().count(), 3);
    }

    #[test]
    fn test_descriptor_wire_format() {
        let descriptor = BundleDescriptor {
            name: "pilet".to_string(),
            version: "1.0.0".to_string(),
            config: "{}".to_string(),
            base_url: "https://cdn/pilet".to_string(),
            dependencies: vec!["b.dll".to_string()],
            dependency_symbols: None,
            satellites: None,
            module_url: "c.dll".to_string(),
            symbol_url: Some("c.pdb".to_string()),
        };

        let value = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(value["baseUrl"], "https://cdn/pilet");
        assert_eq!(value["moduleUrl"], "c.dll");
        assert_eq!(value["symbolUrl"], "c.pdb");
        assert!(value.get("dependencySymbols").is_none());
    }

    #[tokio::test]
    async fn test_deferred_bootstrap() {
        let (bootstrap, signal) = HostBootstrap::deferred(false);
        assert!(!bootstrap.is_lazy());

        signal.ready(HostCapabilities::new().with(CAPABILITY_LOAD));
        let caps = bootstrap.ready_future().await.unwrap();
        assert!(caps.isolated_load());
    }

    #[tokio::test]
    async fn test_deferred_bootstrap_failure() {
        let (bootstrap, signal) = HostBootstrap::deferred(true);
        signal.fail("converter crashed");

        let result = bootstrap.ready_future().await;
        assert_eq!(
            result,
            Err(DependencyError::HostNotReady("converter crashed".to_string()))
        );
    }
}
