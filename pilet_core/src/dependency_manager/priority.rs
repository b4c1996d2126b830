use super::{session::LoaderHandle, LoadFuture};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Clamp a declared priority into the non-negative range.
pub fn clamp_priority(priority: i64) -> u32 {
    u32::try_from(priority.max(0)).unwrap_or(u32::MAX)
}

/// A registered load that lower-priority sessions wait for.
#[derive(Clone)]
pub struct PriorityLoadEntry {
    pub priority: u32,
    handle: LoaderHandle,
}

impl PriorityLoadEntry {
    pub fn new(priority: u32, handle: LoaderHandle) -> Self {
        Self { priority, handle }
    }

    /// The entry's load, started after host ready if nobody triggered it yet.
    pub fn load_once(&self) -> LoadFuture {
        self.handle.load_when_ready()
    }
}

impl fmt::Debug for PriorityLoadEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriorityLoadEntry")
            .field("priority", &self.priority)
            .field("pilet", &self.handle.pilet_name())
            .finish()
    }
}

/// Append-only queue of prioritised loads.
///
/// Entries stay for the lifetime of the orchestrator; once settled they are
/// permanently resolved futures, so barrier queries stay stable.
#[derive(Debug, Clone, Default)]
pub struct PriorityQueue {
    entries: Arc<Mutex<Vec<PriorityLoadEntry>>>,
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, Vec<PriorityLoadEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, entry: PriorityLoadEntry) {
        self.entries().push(entry);
    }

    /// Every entry that must finish before a session of `priority` may start.
    pub fn higher_than(&self, priority: u32) -> Vec<PriorityLoadEntry> {
        self.entries()
            .iter()
            .filter(|entry| entry.priority > priority)
            .cloned()
            .collect()
    }

    /// Priorities in registration order.
    pub fn priorities(&self) -> Vec<u32> {
        self.entries().iter().map(|entry| entry.priority).collect()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}
