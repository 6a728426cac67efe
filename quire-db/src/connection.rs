//! The shared connection and atomic units of work.

use crate::error::{DbError, DbResult};
use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};

const SAVEPOINT: &str = "quire_atomic";

/// Connection-level options.
#[derive(Debug, Clone)]
pub struct DbOptions {
    /// How long a statement waits on a locked database before failing.
    pub busy_timeout: Duration,
}

impl Default for DbOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_millis(5_000),
        }
    }
}

/// A shared SQLite connection.
///
/// Cloning is cheap; clones share the connection. Every operation holds the
/// connection lock for its whole duration, so one logical operation runs to
/// completion before the next starts.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl Database {
    /// Opens (or creates) a database file.
    pub fn open(path: impl AsRef<Path>, options: &DbOptions) -> DbResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        configure(&conn, options)?;
        info!(path = %path.display(), "Opened database");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_path_buf()),
        })
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        configure(&conn, &DbOptions::default())?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    /// File backing this database, `None` when in memory.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::LockPoisoned)
    }

    /// Runs `f` with the connection, outside any explicit transaction.
    pub fn with_conn<T, E>(&self, f: impl FnOnce(&Connection) -> Result<T, E>) -> Result<T, E>
    where
        E: From<DbError>,
    {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Runs `f` as one atomic unit: everything it writes becomes visible
    /// together, or not at all if it returns an error.
    pub fn atomic<T, E>(&self, f: impl FnOnce(&Connection) -> Result<T, E>) -> Result<T, E>
    where
        E: From<DbError>,
    {
        let conn = self.lock()?;
        atomic(&conn, f)
    }
}

/// Runs `f` inside a savepoint on `conn`.
///
/// At top level the savepoint opens a transaction; inside a caller's
/// transaction it nests, so a failing inner unit rolls back only its own
/// writes.
pub fn atomic<T, E>(conn: &Connection, f: impl FnOnce(&Connection) -> Result<T, E>) -> Result<T, E>
where
    E: From<DbError>,
{
    conn.execute_batch(&format!("SAVEPOINT {SAVEPOINT}"))
        .map_err(DbError::from)?;
    match f(conn) {
        Ok(value) => {
            conn.execute_batch(&format!("RELEASE {SAVEPOINT}"))
                .map_err(DbError::from)?;
            Ok(value)
        }
        Err(err) => {
            debug!("Rolling back atomic unit");
            conn.execute_batch(&format!("ROLLBACK TO {SAVEPOINT}; RELEASE {SAVEPOINT}"))
                .map_err(DbError::from)?;
            Err(err)
        }
    }
}

fn configure(conn: &Connection, options: &DbOptions) -> DbResult<()> {
    conn.busy_timeout(options.busy_timeout)?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    register_regexp(conn)?;
    Ok(())
}

/// Registers `REGEXP` so filters can write `column REGEXP ?`.
///
/// SQLite evaluates `X REGEXP Y` as `regexp(Y, X)`. A NULL subject never matches.
fn register_regexp(conn: &Connection) -> DbResult<()> {
    conn.create_scalar_function(
        "regexp",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let re = ctx.get_or_create_aux(0, |vr| -> Result<regex_lite::Regex, Box<dyn std::error::Error + Send + Sync>> {
                Ok(regex_lite::Regex::new(vr.as_str()?)?)
            })?;
            let subject: Option<String> = ctx.get(1)?;
            Ok(subject.is_some_and(|s| re.is_match(&s)))
        },
    )?;
    Ok(())
}
