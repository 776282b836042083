use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};

use super::Database;
use crate::domain::entities::{GroupInfo, GroupRecord, OverrideScope, PluginKind};

const GROUP_COLUMNS: &str =
    "id, group_id, channel_id, group_name, max_member_count, member_count, group_flag, status, created_at";

fn group_from_row(row: &Row<'_>) -> SqliteResult<GroupRecord> {
    Ok(GroupRecord {
        id: row.get(0)?,
        group_id: row.get(1)?,
        channel_id: row.get(2)?,
        group_name: row.get(3)?,
        max_member_count: row.get(4)?,
        member_count: row.get(5)?,
        group_flag: row.get(6)?,
        status: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn find_group(conn: &Connection, group_id: &str) -> SqliteResult<Option<GroupRecord>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM group_console WHERE group_id = ?1 AND channel_id IS NULL",
            GROUP_COLUMNS
        ),
        [group_id],
        group_from_row,
    )
    .optional()
}

impl Database {
    /// Group-scope record (no channel) for `group_id`.
    pub fn get_group(&self, group_id: &str) -> SqliteResult<Option<GroupRecord>> {
        find_group(&self.conn(), group_id)
    }

    /// Fetch the group-scope record, creating it when missing. A new group
    /// starts with an admin override for every normal plugin whose default
    /// status is off. Returns whether the record was created.
    pub fn ensure_group(&self, group_id: &str, now: DateTime<Utc>) -> SqliteResult<(GroupRecord, bool)> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        if let Some(group) = find_group(&tx, group_id)? {
            return Ok((group, false));
        }

        tx.execute(
            "INSERT INTO group_console (group_id, created_at) VALUES (?1, ?2)",
            params![group_id, now],
        )?;
        tx.execute(
            "INSERT OR IGNORE INTO group_block_plugin (group_id, module, scope)
             SELECT ?1, module, ?2 FROM plugin_info
             WHERE plugin_type = ?3 AND default_status = 0",
            params![group_id, OverrideScope::Admin, PluginKind::Normal],
        )?;
        let group = find_group(&tx, group_id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        tx.commit()?;
        Ok((group, true))
    }

    pub fn update_group_info(&self, info: &GroupInfo) -> SqliteResult<usize> {
        self.conn().execute(
            "UPDATE group_console SET group_name = ?1, max_member_count = ?2, member_count = ?3
             WHERE group_id = ?4 AND channel_id IS NULL",
            params![info.group_name, info.max_member_count, info.member_count, info.group_id],
        )
    }

    pub fn set_group_flag(&self, group_id: &str, flag: i64) -> SqliteResult<usize> {
        self.conn().execute(
            "UPDATE group_console SET group_flag = ?1 WHERE group_id = ?2 AND channel_id IS NULL",
            params![flag, group_id],
        )
    }

    pub fn set_group_status(&self, group_id: &str, status: bool) -> SqliteResult<usize> {
        self.conn().execute(
            "UPDATE group_console SET status = ?1 WHERE group_id = ?2 AND channel_id IS NULL",
            params![status, group_id],
        )
    }

    pub fn has_override(&self, group_id: &str, module: &str, scope: OverrideScope) -> SqliteResult<bool> {
        self.conn().query_row(
            "SELECT EXISTS(
                SELECT 1 FROM group_block_plugin WHERE group_id = ?1 AND module = ?2 AND scope = ?3
             )",
            params![group_id, module, scope],
            |row| row.get(0),
        )
    }

    /// Returns false when the override was already present.
    pub fn add_override(&self, group_id: &str, module: &str, scope: OverrideScope) -> SqliteResult<bool> {
        let rows = self.conn().execute(
            "INSERT OR IGNORE INTO group_block_plugin (group_id, module, scope) VALUES (?1, ?2, ?3)",
            params![group_id, module, scope],
        )?;
        Ok(rows > 0)
    }

    /// Returns false when there was nothing to remove.
    pub fn remove_override(&self, group_id: &str, module: &str, scope: OverrideScope) -> SqliteResult<bool> {
        let rows = self.conn().execute(
            "DELETE FROM group_block_plugin WHERE group_id = ?1 AND module = ?2 AND scope = ?3",
            params![group_id, module, scope],
        )?;
        Ok(rows > 0)
    }

    pub fn add_overrides(&self, group_id: &str, modules: &[String], scope: OverrideScope) -> SqliteResult<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO group_block_plugin (group_id, module, scope) VALUES (?1, ?2, ?3)",
            )?;
            for module in modules {
                inserted += stmt.execute(params![group_id, module, scope])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    pub fn remove_overrides(&self, group_id: &str, modules: &[String], scope: OverrideScope) -> SqliteResult<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let mut removed = 0;
        {
            let mut stmt = tx.prepare(
                "DELETE FROM group_block_plugin WHERE group_id = ?1 AND module = ?2 AND scope = ?3",
            )?;
            for module in modules {
                removed += stmt.execute(params![group_id, module, scope])?;
            }
        }
        tx.commit()?;
        Ok(removed)
    }

    pub fn list_overrides(&self, group_id: &str, scope: OverrideScope) -> SqliteResult<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT module FROM group_block_plugin WHERE group_id = ?1 AND scope = ?2 ORDER BY module",
        )?;
        let rows = stmt.query_map(params![group_id, scope], |row| row.get(0))?;
        rows.collect()
    }
}
