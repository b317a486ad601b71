//! Row and view types for the aggregation store.
//!
//! Timestamps are wall-clock values in the zone the caller localised them
//! to before writing; the store never converts between zones.

use chrono::{NaiveDate, NaiveDateTime};

/// Calendar-day format used for grouping and for naming collages.
pub const DAY_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRow {
    pub channel_id: i64,
    pub message_id: i64,
    pub submitted_at: NaiveDateTime,
    pub url: String,
}

/// All links of one channel that share a calendar day, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayGroup {
    pub day: NaiveDate,
    pub links: Vec<LinkRow>,
}

impl DayGroup {
    pub fn day_label(&self) -> String {
        self.day.format(DAY_FORMAT).to_string()
    }

    pub fn message_ids(&self) -> Vec<i64> {
        self.links.iter().map(|l| l.message_id).collect()
    }
}

/// Point-in-time snapshot of a channel's pending links.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Drained {
    /// Every message id in the snapshot, in timestamp order.
    pub message_ids: Vec<i64>,
    /// The same links partitioned by day, ordered by day.
    pub groups: Vec<DayGroup>,
}

impl Drained {
    pub fn is_empty(&self) -> bool {
        self.message_ids.is_empty()
    }
}
