use chrono::{DateTime, NaiveDateTime};
use rusqlite::{Connection, ErrorCode, OptionalExtension};
use tracing::debug;

use crate::models::{DayGroup, Drained, LinkRow};
use crate::{Result, Store, StoreError};

impl Store {
    // -- Channels --

    /// Fails with `StoreError::DuplicateKey` if the channel is already known.
    pub fn register_channel(&self, channel_id: i64, at: NaiveDateTime) -> Result<()> {
        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT INTO chats (chat_id, timestamp) VALUES (?1, ?2)",
                (channel_id, to_secs(at)),
            );

            match inserted {
                Ok(_) => Ok(()),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == ErrorCode::ConstraintViolation =>
                {
                    Err(StoreError::DuplicateKey(channel_id))
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn channel_registered_at(&self, channel_id: i64) -> Result<Option<NaiveDateTime>> {
        self.with_conn(|conn| {
            let secs: Option<i64> = conn
                .query_row(
                    "SELECT timestamp FROM chats WHERE chat_id = ?1",
                    [channel_id],
                    |row| row.get(0),
                )
                .optional()?;

            secs.map(from_secs).transpose()
        })
    }

    /// All registered channels, ascending by id.
    pub fn list_channels(&self) -> Result<Vec<i64>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT chat_id FROM chats ORDER BY chat_id ASC")?;
            let ids = stmt
                .query_map([], |row| row.get::<_, i64>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(ids)
        })
    }

    // -- Links --

    /// Append a link. A message already recorded for the channel is kept
    /// as is, so a redelivered post is stored once.
    pub fn record_link(
        &self,
        channel_id: i64,
        message_id: i64,
        at: NaiveDateTime,
        url: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO links (chat_id, timestamp, url, message_id)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![channel_id, to_secs(at), url, message_id],
            )?;
            if inserted == 0 {
                debug!("Message {} in channel {} already recorded", message_id, channel_id);
            }
            Ok(())
        })
    }

    /// Snapshot the channel's pending links grouped by calendar day.
    /// Read-only: nothing is removed until `delete_links`.
    pub fn drain_groups(&self, channel_id: i64) -> Result<Drained> {
        let rows = self.with_conn(|conn| query_links(conn, channel_id))?;
        debug!("Drained {} links for channel {}", rows.len(), channel_id);
        Ok(group_by_day(rows))
    }

    /// Remove the given links of one channel. Ids that are already gone are
    /// skipped, so repeating a delete is harmless. Returns rows removed.
    pub fn delete_links(&self, channel_id: i64, message_ids: &[i64]) -> Result<usize> {
        if message_ids.is_empty() {
            return Ok(0);
        }

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut removed = 0;
            {
                let mut stmt =
                    tx.prepare("DELETE FROM links WHERE chat_id = ?1 AND message_id = ?2")?;
                for id in message_ids {
                    removed += stmt.execute((channel_id, id))?;
                }
            }
            tx.commit()?;

            debug!("Deleted {} links for channel {}", removed, channel_id);
            Ok(removed)
        })
    }
}

fn query_links(conn: &Connection, channel_id: i64) -> Result<Vec<LinkRow>> {
    // rowid breaks ties between posts stamped in the same second
    let mut stmt = conn.prepare(
        "SELECT timestamp, url, message_id
         FROM links
         WHERE chat_id = ?1
         ORDER BY timestamp ASC, rowid ASC",
    )?;

    let raw = stmt
        .query_map([channel_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    raw.into_iter()
        .map(|(secs, url, message_id)| {
            Ok(LinkRow {
                channel_id,
                message_id,
                submitted_at: from_secs(secs)?,
                url,
            })
        })
        .collect()
}

/// Partition timestamp-ordered rows into day groups. A new group starts
/// whenever the day differs from the previous row's.
pub fn group_by_day(rows: Vec<LinkRow>) -> Drained {
    let mut drained = Drained::default();

    for row in rows {
        drained.message_ids.push(row.message_id);

        let day = row.submitted_at.date();
        match drained.groups.last_mut() {
            Some(group) if group.day == day => group.links.push(row),
            _ => drained.groups.push(DayGroup {
                day,
                links: vec![row],
            }),
        }
    }

    drained
}

// Wall-clock seconds: the naive value is written as if it were UTC.
fn to_secs(at: NaiveDateTime) -> i64 {
    at.and_utc().timestamp()
}

fn from_secs(secs: i64) -> Result<NaiveDateTime> {
    DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.naive_utc())
        .ok_or(StoreError::BadTimestamp(secs))
}
