use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);"
    )?;

    let version: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Store: running migration v1 (chats + links)");
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS chats (
                chat_id     INTEGER NOT NULL PRIMARY KEY,
                timestamp   INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS links (
                chat_id     INTEGER NOT NULL,
                timestamp   INTEGER NOT NULL,
                url         TEXT NOT NULL,
                message_id  INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_links_chat
                ON links(chat_id, timestamp);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Store: running migration v2 (unique message per chat)");
        conn.execute_batch(
            "
            DELETE FROM links
             WHERE rowid NOT IN (
                SELECT MIN(rowid) FROM links GROUP BY chat_id, message_id
             );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_links_message
                ON links(chat_id, message_id);

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    Ok(())
}
