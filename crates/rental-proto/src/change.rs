//! Row-level change events delivered by the realtime feed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;
use crate::query::tables;

/// Schema the reservation tables live in.
pub const DEFAULT_SCHEMA: &str = "public";

/// Types of changes that can occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeType {
    /// A new row was inserted.
    Insert,
    /// An existing row was updated.
    Update,
    /// A row was deleted.
    Delete,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Insert => "INSERT",
            ChangeType::Update => "UPDATE",
            ChangeType::Delete => "DELETE",
        }
    }
}

impl FromStr for ChangeType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INSERT" => Ok(ChangeType::Insert),
            "UPDATE" => Ok(ChangeType::Update),
            "DELETE" => Ok(ChangeType::Delete),
            other => Err(Error::UnknownChangeType(other.to_string())),
        }
    }
}

/// Which change types a subscription wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventFilter {
    /// Every change type (`*`).
    All,
    /// Only one change type.
    Only(ChangeType),
}

impl EventFilter {
    /// Whether `change_type` passes this filter.
    pub fn accepts(&self, change_type: ChangeType) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Only(wanted) => *wanted == change_type,
        }
    }

    /// Wire representation used in channel join configs.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventFilter::All => "*",
            EventFilter::Only(change_type) => change_type.as_str(),
        }
    }
}

impl fmt::Display for EventFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subscription scope: schema, table and change types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChangeFilter {
    pub schema: String,
    pub table: String,
    pub event: EventFilter,
}

impl ChangeFilter {
    /// Watch all change types on `schema.table`.
    pub fn table(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            event: EventFilter::All,
        }
    }

    /// Every change on `public.reservations`.
    pub fn reservations() -> Self {
        Self::table(DEFAULT_SCHEMA, tables::RESERVATIONS)
    }

    /// Restrict to one change type.
    pub fn with_event(mut self, event: EventFilter) -> Self {
        self.event = event;
        self
    }

    /// Whether `event` falls inside this scope.
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        self.schema == event.schema && self.table == event.table && self.event.accepts(event.change_type)
    }
}

/// A single row-level change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Schema of the changed table.
    pub schema: String,
    /// Changed table.
    pub table: String,
    /// The type of change.
    pub change_type: ChangeType,
    /// Commit timestamp as reported by the feed.
    #[serde(default)]
    pub commit_timestamp: Option<String>,
    /// Row image after the change. Empty object for deletes.
    #[serde(default)]
    pub new_record: Value,
    /// Row image before the change, when the table publishes it.
    #[serde(default)]
    pub old_record: Value,
}

impl ChangeEvent {
    /// Create an event with a new row image and no old image.
    pub fn new(
        schema: impl Into<String>,
        table: impl Into<String>,
        change_type: ChangeType,
        new_record: Value,
    ) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            change_type,
            commit_timestamp: None,
            new_record,
            old_record: Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reservation_row() -> Value {
        json!({
            "id": "r-1",
            "status": "pending",
            "start_date": "2024-03-05",
            "end_date": "2024-03-06",
            "total_price": 40
        })
    }

    #[test]
    fn test_filter_matches_scope() {
        let filter = ChangeFilter::reservations();
        let event = ChangeEvent::new("public", "reservations", ChangeType::Update, reservation_row());
        assert!(filter.matches(&event));

        let other_table = ChangeEvent::new("public", "customers", ChangeType::Update, json!({}));
        assert!(!filter.matches(&other_table));

        let other_schema = ChangeEvent::new("audit", "reservations", ChangeType::Update, json!({}));
        assert!(!filter.matches(&other_schema));
    }

    #[test]
    fn test_event_filter() {
        let filter = ChangeFilter::reservations().with_event(EventFilter::Only(ChangeType::Insert));
        let insert = ChangeEvent::new("public", "reservations", ChangeType::Insert, json!({}));
        let delete = ChangeEvent::new("public", "reservations", ChangeType::Delete, json!({}));
        assert!(filter.matches(&insert));
        assert!(!filter.matches(&delete));
        assert_eq!(EventFilter::All.as_str(), "*");
    }

    #[test]
    fn test_change_type_parse() {
        assert_eq!("UPDATE".parse::<ChangeType>().unwrap(), ChangeType::Update);
        assert!("TRUNCATE".parse::<ChangeType>().is_err());
    }
}
