mod record;
mod stats;

pub use record::{EventLog, EventRecord};
pub use stats::{EventStats, SessionStatus};
