use chrono::{DateTime, Utc};
use rusqlite::types::ValueRef;
use rusqlite::{params, Result as SqliteResult};
use serde_json::{Map, Value};

use super::Database;
use crate::domain::entities::{Column, SqlLog};

/// One result row keyed by column name
pub type JsonRow = Map<String, Value>;

fn json_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::from(b.to_vec()),
    }
}

impl Database {
    /// Run a read query and return its rows as JSON objects.
    pub fn query_json(&self, sql: &str) -> SqliteResult<Vec<JsonRow>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut map = Map::with_capacity(names.len());
            for (i, name) in names.iter().enumerate() {
                map.insert(name.clone(), json_value(row.get_ref(i)?));
            }
            out.push(map);
        }
        Ok(out)
    }

    /// Execute one statement, returning affected rows.
    pub fn execute_statement(&self, sql: &str) -> SqliteResult<usize> {
        self.conn().execute(sql, [])
    }

    pub fn table_names(&self) -> SqliteResult<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect()
    }

    pub fn table_columns(&self, table: &str) -> SqliteResult<Vec<Column>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?1) ORDER BY cid",
        )?;
        let rows = stmt.query_map([table], |row| {
            Ok(Column {
                column_name: row.get(0)?,
                data_type: row.get(1)?,
                is_nullable: !row.get::<_, bool>(2)?,
                default_value: row.get(3)?,
                primary_key: row.get::<_, i64>(4)? > 0,
            })
        })?;
        rows.collect()
    }

    pub fn add_sql_log(
        &self,
        ip: &str,
        sql: &str,
        result: &str,
        is_suc: bool,
        now: DateTime<Utc>,
    ) -> SqliteResult<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO sql_log (ip, sql, result, is_suc, create_time) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![ip, sql, result, is_suc, now],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn count_sql_logs(&self) -> SqliteResult<i64> {
        self.conn().query_row("SELECT COUNT(*) FROM sql_log", [], |row| row.get(0))
    }

    /// Newest first.
    pub fn sql_logs(&self, offset: i64, limit: i64) -> SqliteResult<Vec<SqlLog>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, ip, sql, result, is_suc, create_time FROM sql_log
             ORDER BY id DESC LIMIT ?1 OFFSET ?2",
        )?;
        let rows = stmt.query_map(params![limit, offset], |row| {
            Ok(SqlLog {
                id: row.get(0)?,
                ip: row.get(1)?,
                sql: row.get(2)?,
                result: row.get(3)?,
                is_suc: row.get(4)?,
                create_time: row.get(5)?,
            })
        })?;
        rows.collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_json_maps_sqlite_types() {
        let db = Database::open_in_memory().unwrap();
        let rows = db
            .query_json("SELECT 1 AS n, 1.5 AS r, 'x' AS t, NULL AS z")
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["n"], Value::from(1));
        assert_eq!(rows[0]["r"], Value::from(1.5));
        assert_eq!(rows[0]["t"], Value::from("x"));
        assert_eq!(rows[0]["z"], Value::Null);
    }

    #[test]
    fn test_table_columns() {
        let db = Database::open_in_memory().unwrap();
        let columns = db.table_columns("sql_log").unwrap();
        let names: Vec<&str> = columns.iter().map(|c| c.column_name.as_str()).collect();
        assert_eq!(names, vec!["id", "ip", "sql", "result", "is_suc", "create_time"]);
        assert!(columns[0].primary_key);
        assert!(!columns[1].is_nullable);
    }

    #[test]
    fn test_sql_logs_newest_first() {
        let db = Database::open_in_memory().unwrap();
        for i in 0..3 {
            db.add_sql_log("127.0.0.1", &format!("select {}", i), "", true, Utc::now()).unwrap();
        }
        assert_eq!(db.count_sql_logs().unwrap(), 3);
        let page = db.sql_logs(0, 2).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].sql, "select 2");
    }
}
