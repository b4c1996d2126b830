use crate::events::PiletEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub timestamp: DateTime<Utc>,
    pub event: PiletEvent,
}

impl fmt::Display for EventRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {}",
            self.timestamp.format("%H:%M:%S%.3f"),
            self.event.name(),
            self.event.pilet().display_name()
        )
    }
}

/// Bounded, thread-safe log of pilet events; the oldest record is dropped
/// once the log is full.
#[derive(Debug, Clone)]
pub struct EventLog {
    records: Arc<Mutex<VecDeque<EventRecord>>>,
    max_size: usize,
}

impl EventLog {
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            records: Arc::new(Mutex::new(VecDeque::with_capacity(max_size))),
            max_size,
        }
    }

    fn records(&self) -> MutexGuard<'_, VecDeque<EventRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn append(&self, event: PiletEvent) {
        let record = EventRecord {
            timestamp: event.metadata().timestamp,
            event,
        };
        let mut records = self.records();
        if records.len() >= self.max_size {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// Move every event currently buffered in `rx` into the log.
    pub fn drain_from(&self, rx: &mut broadcast::Receiver<PiletEvent>) -> usize {
        let mut count = 0;
        loop {
            match rx.try_recv() {
                Ok(event) => {
                    self.append(event);
                    count += 1;
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event log missed pilet events");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        count
    }

    pub fn all(&self) -> Vec<EventRecord> {
        self.records().iter().cloned().collect()
    }

    /// Records emitted by the pilet with the given name.
    pub fn for_pilet(&self, name: &str) -> Vec<EventRecord> {
        self.records()
            .iter()
            .filter(|record| record.event.pilet().name.as_deref() == Some(name))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(1024)
    }
}
