use super::EventRecord;
use crate::events::PiletEvent;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Last observed state of one load session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub pilet: String,
    pub status: String,
}

#[derive(Debug, Default)]
pub struct EventStats {
    pub loads_started: usize,
    pub loads_finished: usize,
    /// Keyed by session id, or by event id for uncorrelated events
    pub session_statuses: BTreeMap<Uuid, SessionStatus>,
}

impl EventStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: &[EventRecord]) -> Self {
        let mut stats = Self::new();
        for record in records {
            stats.process_event(&record.event);
        }
        stats
    }

    pub fn process_event(&mut self, event: &PiletEvent) {
        let metadata = event.metadata();
        let session = metadata.correlation_id.unwrap_or(metadata.event_id);
        let status = match event {
            PiletEvent::LoadStarting { .. } => {
                self.loads_started += 1;
                "loading"
            }
            PiletEvent::LoadFinished { .. } => {
                self.loads_finished += 1;
                "loaded"
            }
        };
        self.session_statuses.insert(
            session,
            SessionStatus {
                pilet: event.pilet().display_name().to_string(),
                status: status.to_string(),
            },
        );
    }

    /// Pilets whose session started loading but never reported completion.
    pub fn unfinished(&self) -> Vec<&str> {
        self.session_statuses
            .values()
            .filter(|session| session.status == "loading")
            .map(|session| session.pilet.as_str())
            .collect()
    }
}
