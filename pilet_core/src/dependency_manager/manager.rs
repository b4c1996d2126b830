use super::{
    clamp_priority,
    loader::LoadOperation,
    manifest::{PiletManifest, PiletMetadata},
    priority::{PriorityLoadEntry, PriorityQueue},
    registry::SharedDependencyRegistry,
    release::release_session,
    session::{lock_ledger, LoadStatus, LoaderHandle, SessionLedger, SharedLedger},
    LoadFuture, Result,
};
use crate::events::EventBus;
use crate::host::{HostBootstrap, ResourceHost, Satellites};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// State shared by every session of one host application.
pub(crate) struct LoaderContext {
    pub(crate) host: Arc<dyn ResourceHost>,
    pub(crate) shared: SharedDependencyRegistry,
    pub(crate) priorities: PriorityQueue,
    pub(crate) events: EventBus,
    pub(crate) bootstrap: HostBootstrap,
    pub(crate) activation: watch::Sender<bool>,
}

/// Root object owning the shared dependency registry and the priority queue
/// for one host application. Hands out one [`DependencyLoader`] per pilet.
///
/// Eager loads are held back until [`activate`](Self::activate) is called,
/// so every pilet of a registration batch is queued before any priority
/// barrier is evaluated.
#[derive(Clone)]
pub struct DependencyOrchestrator {
    context: Arc<LoaderContext>,
}

impl DependencyOrchestrator {
    pub fn new(host: Arc<dyn ResourceHost>, bootstrap: HostBootstrap) -> Self {
        Self::with_events(host, bootstrap, EventBus::default())
    }

    pub fn with_events(
        host: Arc<dyn ResourceHost>,
        bootstrap: HostBootstrap,
        events: EventBus,
    ) -> Self {
        debug!(lazy = bootstrap.is_lazy(), "Creating dependency orchestrator");
        let (activation, _) = watch::channel(false);
        Self {
            context: Arc::new(LoaderContext {
                host,
                shared: SharedDependencyRegistry::new(),
                priorities: PriorityQueue::new(),
                events,
                bootstrap,
                activation,
            }),
        }
    }

    /// Release the eager loads of every pilet defined so far. Pilets defined
    /// afterwards start as soon as they are defined.
    pub fn activate(&self) {
        if !self.context.activation.send_replace(true) {
            info!(
                pending = self.context.priorities.len(),
                "Activating eager pilet loads"
            );
        }
    }

    pub fn is_active(&self) -> bool {
        *self.context.activation.borrow()
    }

    /// Create the load/release pair for one pilet instance.
    pub fn create_loader(&self) -> DependencyLoader {
        DependencyLoader {
            context: Arc::clone(&self.context),
            ledger: Arc::new(Mutex::new(SessionLedger::default())),
            session_id: Uuid::new_v4(),
            dependency: Mutex::new(None),
        }
    }

    pub fn shared_dependencies(&self) -> &SharedDependencyRegistry {
        &self.context.shared
    }

    pub fn priorities(&self) -> &PriorityQueue {
        &self.context.priorities
    }

    pub fn events(&self) -> &EventBus {
        &self.context.events
    }
}

/// Load and release coordinator for a single pilet.
pub struct DependencyLoader {
    context: Arc<LoaderContext>,
    ledger: SharedLedger,
    session_id: Uuid,
    dependency: Mutex<Option<LoaderHandle>>,
}

impl DependencyLoader {
    /// Register the pilet's binary references and build its load.
    ///
    /// A positive priority is queued immediately so other pilets order
    /// themselves against it before it runs. Unless the host activates
    /// pilets lazily, the load is scheduled behind orchestrator activation
    /// and host ready.
    pub fn define_references(
        &self,
        references: Vec<String>,
        metadata: PiletMetadata,
        satellites: Option<Satellites>,
        priority: i64,
    ) -> LoaderHandle {
        let priority = clamp_priority(priority);
        let operation = LoadOperation::new(
            Arc::downgrade(&self.context),
            Arc::clone(&self.ledger),
            self.session_id,
            references,
            metadata,
            satellites,
            priority,
        );
        let handle = LoaderHandle::new(operation, self.context.bootstrap.ready_future());

        debug!(
            pilet = handle.pilet_name(),
            priority,
            lazy = self.context.bootstrap.is_lazy(),
            "Defined pilet references"
        );

        *self
            .dependency
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle.clone());

        if priority > 0 {
            self.context
                .priorities
                .push(PriorityLoadEntry::new(priority, handle.clone()));
        }

        if !self.context.bootstrap.is_lazy() {
            spawn_eager(handle.clone(), self.context.activation.subscribe());
        }

        handle
    }

    /// Shorthand for defining the references of a plan entry.
    pub fn define_manifest(&self, manifest: &PiletManifest) -> LoaderHandle {
        self.define_references(
            manifest.references.clone(),
            manifest.metadata(),
            manifest.satellites.clone(),
            manifest.priority,
        )
    }

    /// The handle of the most recent definition.
    pub fn dependency(&self) -> Option<LoaderHandle> {
        self.dependency
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn status(&self) -> LoadStatus {
        self.dependency()
            .map_or(LoadStatus::Unregistered, |handle| handle.status())
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Shared file names this session holds references on.
    pub fn defined_references(&self) -> Vec<String> {
        lock_ledger(&self.ledger).defined_references.clone()
    }

    /// Isolated bundles this session linked.
    pub fn loaded_bundle_ids(&self) -> Vec<String> {
        lock_ledger(&self.ledger).loaded_bundle_ids.clone()
    }

    /// Release everything the session linked.
    pub async fn release_references(&self) -> Result<()> {
        debug!(session = %self.session_id, "Releasing pilet references");
        release_session(&self.context, &self.ledger).await
    }
}

/// Drive an eager load once the orchestrator is activated.
fn spawn_eager(handle: LoaderHandle, mut activation: watch::Receiver<bool>) {
    let runtime = match tokio::runtime::Handle::try_current() {
        Ok(runtime) => runtime,
        Err(_) => {
            warn!(
                pilet = handle.pilet_name(),
                "No async runtime available; load starts when first awaited"
            );
            return;
        }
    };

    runtime.spawn(async move {
        let activated = activation.wait_for(|active| *active).await.is_ok();
        if !activated {
            debug!(pilet = handle.pilet_name(), "Orchestrator dropped before activation");
            return;
        }

        let load: LoadFuture = handle.load_when_ready();
        if let Err(err) = load.await {
            debug!(pilet = handle.pilet_name(), "Eager pilet load failed: {}", err);
        }
    });
}
