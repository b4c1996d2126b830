use super::{loader::LoadOperation, DependencyError, LoadFuture};
use crate::host::{HostCapabilities, HostReady};
use futures::FutureExt;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// Observable state of a pilet's dependency load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    /// No references were defined yet
    Unregistered,
    /// References defined, load not triggered
    Pending,
    /// Load triggered and still running
    Loading,
    Resolved,
    Failed(DependencyError),
}

/// Bookkeeping a session accumulates so it can be released later.
#[derive(Debug, Default)]
pub(crate) struct SessionLedger {
    pub defined_references: Vec<String>,
    pub loaded_bundle_ids: Vec<String>,
}

impl SessionLedger {
    /// Take everything recorded so far, leaving the ledger empty.
    pub fn drain(&mut self) -> (Vec<String>, Vec<String>) {
        (
            std::mem::take(&mut self.defined_references),
            std::mem::take(&mut self.loaded_bundle_ids),
        )
    }
}

pub(crate) type SharedLedger = Arc<Mutex<SessionLedger>>;

pub(crate) fn lock_ledger(ledger: &SharedLedger) -> MutexGuard<'_, SessionLedger> {
    ledger.lock().unwrap_or_else(PoisonError::into_inner)
}

enum SessionState {
    Pending,
    Started(LoadFuture),
}

struct HandleInner {
    state: Mutex<SessionState>,
    operation: Arc<LoadOperation>,
    ready: HostReady,
}

/// Idempotent entry point to one pilet's dependency load.
///
/// Whichever method is called first starts the load; every later call, with
/// any argument, returns the same memoized future.
#[derive(Clone)]
pub struct LoaderHandle {
    inner: Arc<HandleInner>,
}

impl LoaderHandle {
    pub(crate) fn new(operation: LoadOperation, ready: HostReady) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                state: Mutex::new(SessionState::Pending),
                operation: Arc::new(operation),
                ready,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn start_with<F>(&self, start: F) -> LoadFuture
    where
        F: FnOnce(Arc<LoadOperation>) -> LoadFuture,
    {
        let mut state = self.state();
        match &*state {
            SessionState::Started(future) => future.clone(),
            SessionState::Pending => {
                let future = start(Arc::clone(&self.inner.operation));
                *state = SessionState::Started(future.clone());
                future
            }
        }
    }

    /// Run the load with capabilities supplied by the caller.
    pub fn load(&self, capabilities: HostCapabilities) -> LoadFuture {
        self.start_with(move |operation| operation.run(capabilities).boxed().shared())
    }

    /// Run the load once the host finished bootstrapping, using the
    /// capabilities the host reported.
    pub fn load_when_ready(&self) -> LoadFuture {
        let ready = self.inner.ready.clone();
        self.start_with(move |operation| {
            async move {
                let capabilities = ready.await?;
                operation.run(capabilities).await
            }
            .boxed()
            .shared()
        })
    }

    /// The memoized future, if the load was triggered.
    pub fn result(&self) -> Option<LoadFuture> {
        match &*self.state() {
            SessionState::Pending => None,
            SessionState::Started(future) => Some(future.clone()),
        }
    }

    pub fn status(&self) -> LoadStatus {
        match &*self.state() {
            SessionState::Pending => LoadStatus::Pending,
            SessionState::Started(future) => match future.peek() {
                None => LoadStatus::Loading,
                Some(Ok(())) => LoadStatus::Resolved,
                Some(Err(err)) => LoadStatus::Failed(err.clone()),
            },
        }
    }

    pub fn priority(&self) -> u32 {
        self.inner.operation.priority()
    }

    pub fn session_id(&self) -> Uuid {
        self.inner.operation.session_id()
    }

    pub fn pilet_name(&self) -> &str {
        self.inner.operation.metadata().display_name()
    }
}

impl fmt::Debug for LoaderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderHandle")
            .field("pilet", &self.pilet_name())
            .field("priority", &self.priority())
            .field("status", &self.status())
            .finish()
    }
}
