//! SQLite-backed [`KeyValueStore`].
//!
//! Entries live in a single table compatible with Python's `dbm.sqlite3`
//! layout, so each key is one row and every write is a single atomic
//! statement.

use crate::error::StoreError;
use crate::store::{KeyIter, KeyValueStore};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::collections::VecDeque;
use std::path::Path;
use tracing::debug;

const SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS Dict (key BLOB UNIQUE NOT NULL, value BLOB NOT NULL)";

/// Rows fetched per round trip while iterating keys.
const PAGE_SIZE: i64 = 256;

/// How a store file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
    /// Open an existing file read-only.
    Read,
    /// Open an existing file for reading and writing.
    Write,
    /// Open for reading and writing, creating the file if missing.
    #[default]
    Create,
    /// Always start from a new, empty file.
    New,
}

impl OpenMode {
    /// Parses the single-letter flags used by `dbm`-style tools (`r`, `w`, `c`, `n`).
    #[must_use]
    pub fn from_flag(flag: char) -> Option<Self> {
        match flag {
            'r' => Some(Self::Read),
            'w' => Some(Self::Write),
            'c' => Some(Self::Create),
            'n' => Some(Self::New),
            _ => None,
        }
    }
}

/// Persistent store in a single SQLite file.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    read_only: bool,
}

impl SqliteStore {
    /// Opens or creates a store file according to `mode`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Missing` if the file is absent in `Read` or `Write`
    /// mode, or a backend error if SQLite cannot open it.
    pub fn open(path: impl AsRef<Path>, mode: OpenMode) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let exists = path.exists();

        let conn = match mode {
            OpenMode::Read | OpenMode::Write if !exists => {
                return Err(StoreError::Missing(path.to_path_buf()));
            }
            OpenMode::Read => Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?,
            OpenMode::Write => {
                Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_WRITE)?
            }
            OpenMode::Create => Connection::open(path)?,
            OpenMode::New => {
                if exists {
                    std::fs::remove_file(path)?;
                }
                Connection::open(path)?
            }
        };

        let read_only = mode == OpenMode::Read;
        if !read_only {
            conn.execute(SCHEMA, [])?;
        }
        debug!(path = %path.display(), ?mode, "opened sqlite store");

        Ok(Self { conn, read_only })
    }

    /// Opens a private in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns a backend error if SQLite fails to initialise.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute(SCHEMA, [])?;
        Ok(Self { conn, read_only: false })
    }

    fn ensure_writable(&self) -> Result<(), StoreError> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        Ok(())
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let value = self
            .conn
            .prepare_cached("SELECT value FROM Dict WHERE key = CAST(?1 AS BLOB)")?
            .query_row(params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.ensure_writable()?;
        self.conn
            .prepare_cached(
                "INSERT OR REPLACE INTO Dict (key, value) \
                 VALUES (CAST(?1 AS BLOB), CAST(?2 AS BLOB))",
            )?
            .execute(params![key, value])?;
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<bool, StoreError> {
        self.ensure_writable()?;
        let removed = self
            .conn
            .prepare_cached("DELETE FROM Dict WHERE key = CAST(?1 AS BLOB)")?
            .execute(params![key])?;
        Ok(removed > 0)
    }

    fn contains(&self, key: &[u8]) -> Result<bool, StoreError> {
        let found = self
            .conn
            .prepare_cached("SELECT 1 FROM Dict WHERE key = CAST(?1 AS BLOB)")?
            .exists(params![key])?;
        Ok(found)
    }

    fn keys(&self) -> Result<KeyIter<'_>, StoreError> {
        Ok(Box::new(PagedKeys {
            conn: &self.conn,
            after_rowid: 0,
            page: VecDeque::new(),
            done: false,
        }))
    }

    fn count(&self) -> Result<usize, StoreError> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM Dict", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn close(self) -> Result<(), StoreError> {
        self.conn.close().map_err(|(_, err)| StoreError::Sqlite(err))
    }
}

/// Walks the table in rowid order, one page per query.
struct PagedKeys<'a> {
    conn: &'a Connection,
    after_rowid: i64,
    page: VecDeque<Vec<u8>>,
    done: bool,
}

impl PagedKeys<'_> {
    fn fetch_page(&mut self) -> Result<(), StoreError> {
        let conn = self.conn;
        let mut stmt = conn.prepare_cached(
            "SELECT rowid, key FROM Dict WHERE rowid > ?1 ORDER BY rowid LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![self.after_rowid, PAGE_SIZE], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?))
        })?;

        for row in rows {
            let (rowid, key) = row?;
            self.after_rowid = rowid;
            self.page.push_back(key);
        }
        if self.page.len() < usize::try_from(PAGE_SIZE).unwrap_or(usize::MAX) {
            self.done = true;
        }
        Ok(())
    }
}

impl Iterator for PagedKeys<'_> {
    type Item = Result<Vec<u8>, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.page.is_empty() && !self.done {
            if let Err(err) = self.fetch_page() {
                self.done = true;
                return Some(Err(err));
            }
        }
        self.page.pop_front().map(Ok)
    }
}
