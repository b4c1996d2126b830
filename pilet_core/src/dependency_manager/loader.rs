use super::{
    manager::LoaderContext,
    manifest::PiletMetadata,
    priority::PriorityLoadEntry,
    references::{
        declared_symbol_path, derive_base_url, file_name, is_module_reference, partition_modules,
    },
    session::{lock_ledger, SharedLedger},
    DependencyError, Result, DEFAULT_PILET_NAME, DEFAULT_PILET_VERSION,
};
use crate::events::PiletEvent;
use crate::host::{BundleDescriptor, HostCapabilities, Satellites};
use futures::future::try_join_all;
use futures::FutureExt;
use serde_json::Value;
use std::sync::{Arc, Weak};
use tracing::{debug, error, info};
use uuid::Uuid;

/// Everything one pilet's load needs, captured when its references are
/// defined. Executed at most once through its [`LoaderHandle`].
///
/// [`LoaderHandle`]: super::LoaderHandle
pub(crate) struct LoadOperation {
    context: Weak<LoaderContext>,
    ledger: SharedLedger,
    session_id: Uuid,
    references: Vec<String>,
    metadata: PiletMetadata,
    satellites: Option<Satellites>,
    priority: u32,
}

impl LoadOperation {
    pub(crate) fn new(
        context: Weak<LoaderContext>,
        ledger: SharedLedger,
        session_id: Uuid,
        references: Vec<String>,
        metadata: PiletMetadata,
        satellites: Option<Satellites>,
        priority: u32,
    ) -> Self {
        Self {
            context,
            ledger,
            session_id,
            references,
            metadata,
            satellites,
            priority,
        }
    }

    pub(crate) fn priority(&self) -> u32 {
        self.priority
    }

    pub(crate) fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub(crate) fn metadata(&self) -> &PiletMetadata {
        &self.metadata
    }

    pub(crate) async fn run(self: Arc<Self>, capabilities: HostCapabilities) -> Result<()> {
        let context = self
            .context
            .upgrade()
            .ok_or(DependencyError::OrchestratorDropped)?;
        let pilet = self.metadata.display_name();

        // let others finish first
        let barrier = context.priorities.higher_than(self.priority);
        if !barrier.is_empty() {
            debug!(
                pilet,
                priority = self.priority,
                waiting_on = barrier.len(),
                "Waiting for higher priority pilets"
            );
            if let Err(err) = try_join_all(barrier.iter().map(PriorityLoadEntry::load_once)).await {
                error!(pilet, "Higher priority pilet failed to load: {}", err);
                return Err(err);
            }
        }

        info!(pilet, priority = self.priority, "Loading pilet dependencies");
        context.events.publish(PiletEvent::load_starting(
            self.metadata.clone(),
            Some(self.session_id),
        ));

        let outcome = if capabilities.isolated_load() {
            self.load_isolated(&context, &capabilities).await
        } else {
            self.load_shared(&context).await
        };

        if let Err(err) = outcome {
            error!(pilet, "Failed to load pilet dependencies: {}", err);
            return Err(err);
        }

        context.events.publish(PiletEvent::load_finished(
            self.metadata.clone(),
            Some(self.session_id),
        ));
        info!(pilet, "Pilet dependencies loaded");
        Ok(())
    }

    /// Link the pilet as one dedicated bundle.
    async fn load_isolated(
        &self,
        context: &LoaderContext,
        capabilities: &HostCapabilities,
    ) -> Result<()> {
        let (dependencies, module_url) = partition_modules(&self.references).ok_or_else(|| {
            DependencyError::MissingModuleReference(self.metadata.display_name().to_string())
        })?;

        let symbol_url = declared_symbol_path(&module_url, &self.references);
        let dependency_symbols = capabilities.dependency_symbols().then(|| {
            dependencies
                .iter()
                .filter_map(|dep| declared_symbol_path(dep, &self.references))
                .collect()
        });
        let satellites = if capabilities.language() {
            self.satellites.clone()
        } else {
            None
        };

        let descriptor = BundleDescriptor {
            name: non_empty(self.metadata.name.as_deref())
                .unwrap_or(DEFAULT_PILET_NAME)
                .to_string(),
            version: non_empty(self.metadata.version.as_deref())
                .unwrap_or(DEFAULT_PILET_VERSION)
                .to_string(),
            config: self.config_json(),
            base_url: match non_empty(self.metadata.base_path.as_deref()) {
                Some(base_path) => base_path.to_string(),
                None => derive_base_url(&module_url),
            },
            dependencies,
            dependency_symbols,
            satellites,
            module_url,
            symbol_url,
        };

        let id = Uuid::new_v4().simple().to_string();
        debug!(
            pilet = %descriptor.name,
            bundle_id = %id,
            module_url = %descriptor.module_url,
            dependencies = descriptor.dependencies.len(),
            "Loading isolated bundle"
        );

        context.host.load_isolated_bundle(&id, descriptor).await?;
        lock_ledger(&self.ledger).loaded_bundle_ids.push(id);
        Ok(())
    }

    /// Link every module through the shared registry, reusing files other
    /// pilets already linked.
    async fn load_shared(&self, context: &LoaderContext) -> Result<()> {
        for url in self.references.iter().filter(|r| is_module_reference(r)) {
            let name = file_name(url).to_string();

            let (future, created) = context.shared.acquire(&name, url, || {
                let host = Arc::clone(&context.host);
                let url = url.clone();
                let symbol_url = declared_symbol_path(&url, &self.references);

                async move {
                    match symbol_url {
                        Some(symbol_url) => host.load_resource_with_symbol(&url, &symbol_url).await,
                        None => host.load_resource(&url).await,
                    }
                }
                .boxed()
                .shared()
            });

            // Recorded before awaiting so a release always balances the
            // reference taken above.
            lock_ledger(&self.ledger).defined_references.push(name.clone());

            debug!(dependency = %name, created, "Awaiting shared dependency");
            future.await?;
        }

        Ok(())
    }

    fn config_json(&self) -> String {
        match &self.metadata.config {
            None | Some(Value::Null) => "{}".to_string(),
            Some(config) => config.to_string(),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
