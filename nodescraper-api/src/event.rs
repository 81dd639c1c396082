//! A single observation emitted by a collector or analyzer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::enums::{EventCategory, EventPriority};
use crate::errors::EventError;

const MAX_DESCRIPTION_BYTES: usize = 2 * 1024;
const MAX_DATA_BYTES: usize = 100 * 1024;

/// Immutable once constructed. Size caps are enforced here, not at the call
/// site, so there is exactly one place that can produce an oversized event:
/// nowhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub reporter: String,
    pub category: EventCategory,
    pub description: String,
    pub data: Value,
    pub priority: EventPriority,
    pub system_id: Option<String>,
}

impl Event {
    /// Builds an event stamped with the current UTC time.
    pub fn new(
        reporter: impl Into<String>,
        category: EventCategory,
        description: impl Into<String>,
        data: Value,
        priority: EventPriority,
    ) -> Result<Self, EventError> {
        Self::with_timestamp(reporter, category, description, data, priority, Utc::now())
    }

    pub fn with_timestamp(
        reporter: impl Into<String>,
        category: EventCategory,
        description: impl Into<String>,
        data: Value,
        priority: EventPriority,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, EventError> {
        let description = description.into();
        if description.len() > MAX_DESCRIPTION_BYTES {
            return Err(EventError::DescriptionTooLarge(description.len()));
        }
        let serialized_len = serde_json::to_vec(&data)
            .map(|bytes| bytes.len())
            .unwrap_or(usize::MAX);
        if serialized_len > MAX_DATA_BYTES {
            return Err(EventError::DataTooLarge(serialized_len));
        }
        Ok(Event {
            id: Uuid::new_v4(),
            timestamp,
            reporter: reporter.into(),
            category,
            description,
            data,
            priority,
            system_id: None,
        })
    }

    pub fn with_system_id(mut self, system_id: impl Into<String>) -> Self {
        self.system_id = Some(system_id.into());
        self
    }
}
