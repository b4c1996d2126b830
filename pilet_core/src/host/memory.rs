use super::{BundleDescriptor, ResourceHost};
use crate::dependency_manager::{DependencyError, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

/// A primitive invocation observed by [`InMemoryHost`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum HostCall {
    LoadResource {
        url: String,
    },
    LoadResourceWithSymbol {
        url: String,
        symbol_url: String,
    },
    UnloadResource {
        url: String,
    },
    LoadBundle {
        id: String,
        descriptor: BundleDescriptor,
    },
    UnloadBundle {
        id: String,
    },
}

#[derive(Debug, Default)]
struct HostState {
    calls: Vec<HostCall>,
    linked: BTreeSet<String>,
    bundles: BTreeMap<String, BundleDescriptor>,
    failing: HashSet<String>,
}

/// In-process host that records every primitive call instead of linking
/// real binaries.
///
/// Calls are recorded before the simulated latency elapses, so the call log
/// reflects the order in which the orchestrator issued them.
#[derive(Debug, Clone, Default)]
pub struct InMemoryHost {
    state: Arc<Mutex<HostState>>,
    latency: Option<Duration>,
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            state: Arc::default(),
            latency: Some(latency),
        }
    }

    fn state(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every primitive touching `key` (a url or bundle id) fail.
    pub fn fail_on(&self, key: impl Into<String>) {
        self.state().failing.insert(key.into());
    }

    pub fn clear_failures(&self) {
        self.state().failing.clear();
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.state().calls.clone()
    }

    /// Urls passed to either resource load primitive, in call order.
    pub fn loaded_urls(&self) -> Vec<String> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                HostCall::LoadResource { url } | HostCall::LoadResourceWithSymbol { url, .. } => {
                    Some(url.clone())
                }
                _ => None,
            })
            .collect()
    }

    pub fn unloaded_urls(&self) -> Vec<String> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                HostCall::UnloadResource { url } => Some(url.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn loaded_bundles(&self) -> Vec<(String, BundleDescriptor)> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                HostCall::LoadBundle { id, descriptor } => Some((id.clone(), descriptor.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn unloaded_bundles(&self) -> Vec<String> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                HostCall::UnloadBundle { id } => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    /// Resources currently linked into the host.
    pub fn linked_resources(&self) -> Vec<String> {
        self.state().linked.iter().cloned().collect()
    }

    /// Ids of bundles currently linked into the host.
    pub fn active_bundles(&self) -> Vec<String> {
        self.state().bundles.keys().cloned().collect()
    }

    fn record(&self, call: HostCall) {
        debug!(?call, "Host primitive invoked");
        self.state().calls.push(call);
    }

    fn is_failing(&self, key: &str) -> bool {
        self.state().failing.contains(key)
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    async fn link(&self, url: &str, symbol_url: Option<&str>) -> Result<()> {
        self.simulate_latency().await;

        let failing = self.is_failing(url) || symbol_url.is_some_and(|s| self.is_failing(s));
        if failing {
            warn!(url, "Simulated resource load failure");
            return Err(DependencyError::ResourceLoad {
                url: url.to_string(),
                reason: "simulated failure".to_string(),
            });
        }

        self.state().linked.insert(url.to_string());
        Ok(())
    }
}

#[async_trait]
impl ResourceHost for InMemoryHost {
    async fn load_resource(&self, url: &str) -> Result<()> {
        self.record(HostCall::LoadResource {
            url: url.to_string(),
        });
        self.link(url, None).await
    }

    async fn load_resource_with_symbol(&self, url: &str, symbol_url: &str) -> Result<()> {
        self.record(HostCall::LoadResourceWithSymbol {
            url: url.to_string(),
            symbol_url: symbol_url.to_string(),
        });
        self.link(url, Some(symbol_url)).await
    }

    async fn unload_resource(&self, url: &str) -> Result<()> {
        self.record(HostCall::UnloadResource {
            url: url.to_string(),
        });
        self.simulate_latency().await;

        if self.is_failing(url) {
            return Err(DependencyError::ResourceUnload {
                url: url.to_string(),
                reason: "simulated failure".to_string(),
            });
        }

        self.state().linked.remove(url);
        Ok(())
    }

    async fn load_isolated_bundle(&self, id: &str, descriptor: BundleDescriptor) -> Result<()> {
        self.record(HostCall::LoadBundle {
            id: id.to_string(),
            descriptor: descriptor.clone(),
        });
        self.simulate_latency().await;

        if self.is_failing(id) || self.is_failing(&descriptor.module_url) {
            return Err(DependencyError::BundleLoad {
                id: id.to_string(),
                reason: "simulated failure".to_string(),
            });
        }

        self.state().bundles.insert(id.to_string(), descriptor);
        Ok(())
    }

    async fn unload_isolated_bundle(&self, id: &str) -> Result<()> {
        self.record(HostCall::UnloadBundle { id: id.to_string() });
        self.simulate_latency().await;

        if self.is_failing(id) {
            return Err(DependencyError::BundleUnload {
                id: id.to_string(),
                reason: "simulated failure".to_string(),
            });
        }

        self.state().bundles.remove(id);
        Ok(())
    }
}
