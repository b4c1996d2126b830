use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

/// Metadata attached to every pilet event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique identifier for this event
    pub event_id: Uuid,

    /// When the event occurred
    pub timestamp: DateTime<Utc>,

    /// Session that emitted the event
    pub correlation_id: Option<Uuid>,

    /// Additional context for the event
    pub context: Value,
}

impl EventMetadata {
    pub fn new(correlation_id: Option<Uuid>) -> Self {
        create_metadata(correlation_id)
    }

    pub fn with_context(correlation_id: Option<Uuid>, context: Value) -> Self {
        create_metadata_with_context(correlation_id, context)
    }

    /// Fresh metadata for a follow-up event of the same session
    pub fn correlated(&self) -> Self {
        create_metadata_with_context(self.correlation_id, self.context.clone())
    }
}

/// Create new event metadata with optional correlation ID
pub fn create_metadata(correlation_id: Option<Uuid>) -> EventMetadata {
    create_metadata_with_context(correlation_id, json!({}))
}

/// Create new event metadata with context
pub fn create_metadata_with_context(correlation_id: Option<Uuid>, context: Value) -> EventMetadata {
    EventMetadata {
        event_id: Uuid::new_v4(),
        timestamp: Utc::now(),
        correlation_id,
        context,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_metadata() {
        let correlation_id = Some(Uuid::new_v4());
        let metadata = EventMetadata::new(correlation_id);

        assert_ne!(metadata.event_id, Uuid::nil());
        assert_eq!(metadata.correlation_id, correlation_id);
        assert_eq!(metadata.context, json!({}));
    }

    #[test]
    fn test_correlated_metadata() {
        let original = EventMetadata::with_context(
            Some(Uuid::new_v4()),
            json!({
                "priority": 3
            }),
        );
        let correlated = original.correlated();

        assert_ne!(correlated.event_id, original.event_id);
        assert_eq!(correlated.correlation_id, original.correlation_id);
        assert_eq!(correlated.context, original.context);
    }
}
