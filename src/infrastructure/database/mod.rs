//! SQLite persistence for plugins, groups, requests and the SQL audit log

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, Result as SqliteResult};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::domain::entities::{BlockType, HandleType, OverrideScope, PluginKind, RequestKind};

mod console;
mod groups;
mod levels;
mod plugins;
mod requests;

pub use console::JsonRow;

/// Single-connection store. The connection sits behind a mutex so the store
/// can be shared across tasks; multi-step writes run in one transaction.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn new(path: impl AsRef<Path>) -> SqliteResult<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> SqliteResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> SqliteResult<Self> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_tables()?;
        Ok(db)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn init_tables(&self) -> SqliteResult<()> {
        self.conn().execute_batch(
            "CREATE TABLE IF NOT EXISTS plugin_info (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                module TEXT UNIQUE NOT NULL,
                name TEXT NOT NULL,
                status INTEGER NOT NULL DEFAULT 1,
                block_type TEXT,
                default_status INTEGER NOT NULL DEFAULT 1,
                plugin_type TEXT NOT NULL DEFAULT 'normal',
                load_status INTEGER NOT NULL DEFAULT 1,
                author TEXT,
                version TEXT
            );

            CREATE TABLE IF NOT EXISTS group_console (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                group_id TEXT NOT NULL,
                channel_id TEXT,
                group_name TEXT NOT NULL DEFAULT '',
                max_member_count INTEGER NOT NULL DEFAULT 0,
                member_count INTEGER NOT NULL DEFAULT 0,
                group_flag INTEGER NOT NULL DEFAULT 0,
                status INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_group_console_group
                ON group_console(group_id) WHERE channel_id IS NULL;

            -- Per-group overrides: one row per (group, module, scope)
            CREATE TABLE IF NOT EXISTS group_block_plugin (
                group_id TEXT NOT NULL,
                module TEXT NOT NULL,
                scope TEXT NOT NULL,
                PRIMARY KEY (group_id, module, scope)
            );

            CREATE TABLE IF NOT EXISTS level_user (
                user_id TEXT NOT NULL,
                group_id TEXT NOT NULL,
                user_level INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (user_id, group_id)
            );

            CREATE TABLE IF NOT EXISTS fg_request (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                request_type TEXT NOT NULL,
                platform TEXT NOT NULL,
                bot_id TEXT NOT NULL,
                flag TEXT NOT NULL,
                user_id TEXT NOT NULL,
                group_id TEXT,
                nickname TEXT NOT NULL DEFAULT '',
                comment TEXT,
                handle_type TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_fg_request_user
                ON fg_request(request_type, user_id, group_id);

            CREATE TABLE IF NOT EXISTS sql_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ip TEXT NOT NULL,
                sql TEXT NOT NULL,
                result TEXT NOT NULL DEFAULT '',
                is_suc INTEGER NOT NULL DEFAULT 1,
                create_time TEXT NOT NULL
            );",
        )
    }
}

macro_rules! text_enum_sql {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl ToSql for $ty {
                fn to_sql(&self) -> SqliteResult<ToSqlOutput<'_>> {
                    Ok(ToSqlOutput::from(self.as_str()))
                }
            }

            impl FromSql for $ty {
                fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                    value
                        .as_str()?
                        .parse()
                        .map_err(|e: String| FromSqlError::Other(e.into()))
                }
            }
        )+
    };
}

text_enum_sql!(BlockType, PluginKind, RequestKind, HandleType);

impl ToSql for OverrideScope {
    fn to_sql(&self) -> SqliteResult<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}
