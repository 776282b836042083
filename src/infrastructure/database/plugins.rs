use rusqlite::{params, OptionalExtension, Result as SqliteResult, Row};

use super::Database;
use crate::domain::entities::{BlockType, NewPlugin, PluginKind, PluginRecord};

const PLUGIN_COLUMNS: &str =
    "id, module, name, status, block_type, default_status, plugin_type, load_status, author, version";

fn plugin_from_row(row: &Row<'_>) -> SqliteResult<PluginRecord> {
    Ok(PluginRecord {
        id: row.get(0)?,
        module: row.get(1)?,
        name: row.get(2)?,
        status: row.get(3)?,
        block_type: row.get(4)?,
        default_status: row.get(5)?,
        plugin_kind: row.get(6)?,
        load_status: row.get(7)?,
        author: row.get(8)?,
        version: row.get(9)?,
    })
}

impl Database {
    /// Insert a plugin or refresh its descriptive fields. Operator-controlled
    /// fields (status, block type, default status) survive re-registration.
    pub fn upsert_plugin(&self, plugin: &NewPlugin) -> SqliteResult<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO plugin_info (module, name, default_status, plugin_type, load_status, author, version)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(module) DO UPDATE SET
                name = excluded.name,
                plugin_type = excluded.plugin_type,
                load_status = excluded.load_status,
                author = excluded.author,
                version = excluded.version",
            params![
                plugin.module,
                plugin.name,
                plugin.default_status,
                plugin.plugin_kind,
                plugin.load_status,
                plugin.author,
                plugin.version,
            ],
        )?;
        conn.query_row(
            "SELECT id FROM plugin_info WHERE module = ?1",
            [&plugin.module],
            |row| row.get(0),
        )
    }

    pub fn get_plugin_by_id(&self, id: i64) -> SqliteResult<Option<PluginRecord>> {
        self.conn()
            .query_row(
                &format!("SELECT {} FROM plugin_info WHERE id = ?1", PLUGIN_COLUMNS),
                [id],
                plugin_from_row,
            )
            .optional()
    }

    /// Name lookup only matches loaded, non-parent plugins.
    pub fn get_plugin_by_name(&self, name: &str) -> SqliteResult<Option<PluginRecord>> {
        self.conn()
            .query_row(
                &format!(
                    "SELECT {} FROM plugin_info
                     WHERE name = ?1 AND load_status = 1 AND plugin_type != ?2
                     ORDER BY id LIMIT 1",
                    PLUGIN_COLUMNS
                ),
                params![name, PluginKind::Parent],
                plugin_from_row,
            )
            .optional()
    }

    pub fn get_plugin_by_module(&self, module: &str) -> SqliteResult<Option<PluginRecord>> {
        self.conn()
            .query_row(
                &format!("SELECT {} FROM plugin_info WHERE module = ?1", PLUGIN_COLUMNS),
                [module],
                plugin_from_row,
            )
            .optional()
    }

    pub fn set_plugin_default_status(&self, id: i64, status: bool) -> SqliteResult<usize> {
        self.conn().execute(
            "UPDATE plugin_info SET default_status = ?1 WHERE id = ?2",
            params![status, id],
        )
    }

    /// Writes `block_type` together with the status it implies.
    pub fn set_plugin_block(&self, id: i64, block_type: Option<BlockType>) -> SqliteResult<usize> {
        self.conn().execute(
            "UPDATE plugin_info SET status = ?1, block_type = ?2 WHERE id = ?3",
            params![PluginRecord::status_for(block_type), block_type, id],
        )
    }

    pub fn set_module_block(&self, module: &str, block_type: Option<BlockType>) -> SqliteResult<usize> {
        self.conn().execute(
            "UPDATE plugin_info SET status = ?1, block_type = ?2 WHERE module = ?3",
            params![PluginRecord::status_for(block_type), block_type, module],
        )
    }

    pub fn set_all_default_status(&self, kind: PluginKind, status: bool) -> SqliteResult<usize> {
        self.conn().execute(
            "UPDATE plugin_info SET default_status = ?1 WHERE plugin_type = ?2",
            params![status, kind],
        )
    }

    pub fn set_all_block(&self, kind: PluginKind, block_type: Option<BlockType>) -> SqliteResult<usize> {
        self.conn().execute(
            "UPDATE plugin_info SET status = ?1, block_type = ?2 WHERE plugin_type = ?3",
            params![PluginRecord::status_for(block_type), block_type, kind],
        )
    }

    pub fn list_modules(&self, kind: PluginKind) -> SqliteResult<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT module FROM plugin_info WHERE plugin_type = ?1 ORDER BY id")?;
        let rows = stmt.query_map([kind], |row| row.get(0))?;
        rows.collect()
    }

    /// Every plugin except hidden ones, ordered by id.
    pub fn list_visible_plugins(&self) -> SqliteResult<Vec<PluginRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM plugin_info WHERE plugin_type != ?1 ORDER BY id",
            PLUGIN_COLUMNS
        ))?;
        let rows = stmt.query_map([PluginKind::Hidden], plugin_from_row)?;
        rows.collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_keeps_operator_fields() {
        let db = Database::open_in_memory().unwrap();
        let id = db.upsert_plugin(&NewPlugin::new("sign_in", "Sign in")).unwrap();
        db.set_plugin_block(id, Some(BlockType::Group)).unwrap();
        db.set_plugin_default_status(id, false).unwrap();

        let again = db
            .upsert_plugin(&NewPlugin::new("sign_in", "Daily sign in").with_version("0.2"))
            .unwrap();
        assert_eq!(again, id);

        let plugin = db.get_plugin_by_id(id).unwrap().unwrap();
        assert_eq!(plugin.name, "Daily sign in");
        assert_eq!(plugin.version.as_deref(), Some("0.2"));
        assert_eq!(plugin.block_type, Some(BlockType::Group));
        assert!(!plugin.status);
        assert!(!plugin.default_status);
    }

    #[test]
    fn test_block_writes_status_and_type_together() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_plugin(&NewPlugin::new("roll", "Roll")).unwrap();

        assert_eq!(db.set_module_block("roll", Some(BlockType::All)).unwrap(), 1);
        let plugin = db.get_plugin_by_module("roll").unwrap().unwrap();
        assert!(!plugin.status);
        assert_eq!(plugin.block_type, Some(BlockType::All));

        db.set_module_block("roll", None).unwrap();
        let plugin = db.get_plugin_by_module("roll").unwrap().unwrap();
        assert!(plugin.status);
        assert_eq!(plugin.block_type, None);
    }

    #[test]
    fn test_name_lookup_skips_unloaded_and_parent() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_plugin(&NewPlugin::new("a", "broken").with_load_status(false)).unwrap();
        db.upsert_plugin(&NewPlugin::new("b", "family").with_kind(PluginKind::Parent)).unwrap();

        assert!(db.get_plugin_by_name("broken").unwrap().is_none());
        assert!(db.get_plugin_by_name("family").unwrap().is_none());
        assert!(db.get_plugin_by_module("a").unwrap().is_some());
    }
}
