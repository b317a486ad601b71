pub mod error;
pub mod migrations;
pub mod models;
pub mod queries;

use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};
use tracing::info;

pub use error::{Result, StoreError};
pub use models::{DAY_FORMAT, DayGroup, Drained, LinkRow};

const READER_POOL_SIZE: usize = 4;

/// SQLite-backed record of registered channels and their pending links.
///
/// One writer connection plus a small read-only pool. Every operation first
/// takes `gate`, a store-wide reader/writer lock: queries share it, writes
/// hold it exclusively, so a drain never observes a half-applied delete.
pub struct Store {
    gate: RwLock<()>,
    writer: Mutex<Connection>,
    readers: Vec<Mutex<Connection>>,
    reader_idx: AtomicUsize,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let writer = Connection::open(path)?;
        configure(&writer)?;
        migrations::run(&writer)?;

        let mut readers = Vec::with_capacity(READER_POOL_SIZE);
        for _ in 0..READER_POOL_SIZE {
            let conn = Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            readers.push(Mutex::new(conn));
        }

        info!(
            "Store opened at {} (1 writer + {} readers)",
            path.display(),
            READER_POOL_SIZE
        );
        Ok(Self::from_parts(writer, readers))
    }

    /// Private in-memory store; reads go through the writer connection.
    pub fn open_in_memory() -> Result<Self> {
        let writer = Connection::open_in_memory()?;
        migrations::run(&writer)?;
        Ok(Self::from_parts(writer, Vec::new()))
    }

    fn from_parts(writer: Connection, readers: Vec<Mutex<Connection>>) -> Self {
        Self {
            gate: RwLock::new(()),
            writer: Mutex::new(writer),
            readers,
            reader_idx: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let _shared = self.gate.read().map_err(|_| StoreError::LockPoisoned)?;

        if self.readers.is_empty() {
            let conn = self.writer.lock().map_err(|_| StoreError::LockPoisoned)?;
            return f(&conn);
        }

        let idx = self.reader_idx.fetch_add(1, Ordering::Relaxed) % self.readers.len();
        let conn = self.readers[idx]
            .lock()
            .map_err(|_| StoreError::LockPoisoned)?;
        f(&conn)
    }

    pub(crate) fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let _exclusive = self.gate.write().map_err(|_| StoreError::LockPoisoned)?;
        let mut conn = self.writer.lock().map_err(|_| StoreError::LockPoisoned)?;
        f(&mut conn)
    }

    /// Close every connection. Reports the first failure but still attempts
    /// to close the rest.
    pub fn close(self) -> Result<()> {
        let mut first_err = None;

        let writer = self.writer.into_inner().map_err(|_| StoreError::LockPoisoned)?;
        let conns = self
            .readers
            .into_iter()
            .filter_map(|r| r.into_inner().ok())
            .chain(std::iter::once(writer));

        for conn in conns {
            if let Err((_, e)) = conn.close() {
                first_err.get_or_insert(e);
            }
        }

        match first_err {
            Some(e) => Err(e.into()),
            None => {
                info!("Store closed");
                Ok(())
            }
        }
    }
}

fn configure(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;
    Ok(())
}
