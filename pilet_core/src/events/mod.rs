mod bus;
pub mod metadata;

pub use bus::{EventBus, DEFAULT_EVENT_CAPACITY};
pub use metadata::EventMetadata;

use crate::dependency_manager::PiletMetadata;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle notifications published while pilet dependencies load
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PiletEvent {
    /// The pilet passed its priority barrier and starts linking
    LoadStarting {
        /// Metadata the pilet was registered with
        pilet: PiletMetadata,
        /// Event metadata
        metadata: EventMetadata,
    },
    /// Every dependency of the pilet is linked
    LoadFinished {
        /// Metadata the pilet was registered with
        pilet: PiletMetadata,
        /// Event metadata
        metadata: EventMetadata,
    },
}

impl PiletEvent {
    pub fn load_starting(pilet: PiletMetadata, session_id: Option<Uuid>) -> Self {
        PiletEvent::LoadStarting {
            pilet,
            metadata: EventMetadata::new(session_id),
        }
    }

    pub fn load_finished(pilet: PiletMetadata, session_id: Option<Uuid>) -> Self {
        PiletEvent::LoadFinished {
            pilet,
            metadata: EventMetadata::new(session_id),
        }
    }

    /// Wire name of the notification
    pub fn name(&self) -> &'static str {
        match self {
            PiletEvent::LoadStarting { .. } => "loading-pilet",
            PiletEvent::LoadFinished { .. } => "loaded-pilet",
        }
    }

    pub fn pilet(&self) -> &PiletMetadata {
        match self {
            PiletEvent::LoadStarting { pilet, .. } | PiletEvent::LoadFinished { pilet, .. } => {
                pilet
            }
        }
    }

    pub fn metadata(&self) -> &EventMetadata {
        match self {
            PiletEvent::LoadStarting { metadata, .. }
            | PiletEvent::LoadFinished { metadata, .. } => metadata,
        }
    }

    pub fn is_starting(&self) -> bool {
        matches!(self, PiletEvent::LoadStarting { .. })
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, PiletEvent::LoadFinished { .. })
    }
}
