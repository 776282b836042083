//! Raw SQL console with an audit trail

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

use crate::application::errors::StoreError;
use crate::domain::entities::{Column, SqlLog};
use crate::domain::traits::Clock;
use crate::infrastructure::database::{Database, JsonRow};

/// IP recorded when the caller's address is unknown
pub const UNKNOWN_IP: &str = "0.0.0.0";

static SELECT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*select\b").expect("valid select regex"));

/// Response envelope shared by every console call
#[derive(Debug, Clone, Serialize)]
pub struct ConsoleResult<T> {
    pub suc: bool,
    pub code: u16,
    pub info: String,
    pub warning: Option<String>,
    pub data: Option<T>,
}

impl<T> ConsoleResult<T> {
    pub fn ok(data: T, info: impl Into<String>) -> Self {
        Self {
            suc: true,
            code: 200,
            info: info.into(),
            warning: None,
            data: Some(data),
        }
    }

    /// The call went through but the statement itself failed
    pub fn warning(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            suc: false,
            code: 200,
            info: message.clone(),
            warning: Some(message),
            data: None,
        }
    }

    pub fn fail(info: impl Into<String>) -> Self {
        Self {
            suc: false,
            code: 500,
            info: info.into(),
            warning: None,
            data: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SqlLogPage {
    pub total: i64,
    pub data: Vec<SqlLog>,
}

enum Executed {
    Rows(Vec<JsonRow>),
    Affected(usize),
}

/// True for statements that read: leading `select`, any case.
pub fn is_select(sql: &str) -> bool {
    SELECT_RE.is_match(sql)
}

/// Number of non-empty statements in `sql`. Semicolons inside quotes and
/// comments do not count.
pub fn statement_count(sql: &str) -> usize {
    let mut count = 0;
    let mut has_content = false;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' | '`' => {
                has_content = true;
                for inner in chars.by_ref() {
                    if inner == c {
                        break;
                    }
                }
            }
            '-' if chars.peek() == Some(&'-') => {
                for inner in chars.by_ref() {
                    if inner == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for inner in chars.by_ref() {
                    if prev == '*' && inner == '/' {
                        break;
                    }
                    prev = inner;
                }
            }
            ';' => {
                if has_content {
                    count += 1;
                }
                has_content = false;
            }
            c if c.is_whitespace() => {}
            _ => has_content = true,
        }
    }

    if has_content {
        count += 1;
    }
    count
}

pub struct SqlConsole {
    db: Arc<Database>,
    clock: Arc<dyn Clock>,
}

impl SqlConsole {
    pub fn new(db: Arc<Database>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    pub fn get_table_list(&self) -> ConsoleResult<Vec<String>> {
        match self.db.table_names() {
            Ok(tables) => ConsoleResult::ok(tables, "Got the tables!"),
            Err(e) => {
                error!(call = "get_table_list", error = %e, "SQL console call failed");
                ConsoleResult::fail(format!("Something went wrong: {}", e))
            }
        }
    }

    pub fn get_table_column(&self, table: &str) -> ConsoleResult<Vec<Column>> {
        match self.db.table_columns(table) {
            Ok(columns) => ConsoleResult::ok(columns, "Got the columns!"),
            Err(e) => {
                error!(call = "get_table_column", table, error = %e, "SQL console call failed");
                ConsoleResult::fail(format!("Something went wrong: {}", e))
            }
        }
    }

    /// Run a statement and audit it. Reads return rows; anything else must be
    /// a single statement and returns no data.
    pub fn exec_sql(&self, sql: &str, ip: Option<&str>) -> ConsoleResult<Vec<JsonRow>> {
        let ip = ip.unwrap_or(UNKNOWN_IP);

        let (result, audit_text, is_suc) = match self.run(sql) {
            Ok(Executed::Rows(rows)) => (ConsoleResult::ok(rows, "Executed successfully!"), String::new(), true),
            Ok(Executed::Affected(rows)) => (
                ConsoleResult::ok(Vec::new(), "Executed successfully!"),
                format!("{} rows affected", rows),
                true,
            ),
            Err(e) => {
                error!(call = "exec_sql", ip, sql, error = %e, "SQL console call failed");
                (ConsoleResult::warning(format!("SQL error: {}", e)), e.to_string(), false)
            }
        };

        if let Err(e) = self.db.add_sql_log(ip, sql, &audit_text, is_suc, self.clock.now()) {
            error!(call = "exec_sql", ip, sql, error = %e, "Failed to write SQL audit log");
            return ConsoleResult::fail(format!("Something went wrong: {}", e));
        }
        info!(ip, is_suc, "SQL console statement executed");
        result
    }

    fn run(&self, sql: &str) -> Result<Executed, StoreError> {
        if is_select(sql) {
            return Ok(Executed::Rows(self.db.query_json(sql)?));
        }
        match statement_count(sql) {
            0 => Err(StoreError::Rejected("empty statement".to_string())),
            1 => Ok(Executed::Affected(self.db.execute_statement(sql)?)),
            n => Err(StoreError::Rejected(format!(
                "only one statement may be executed at a time, got {}",
                n
            ))),
        }
    }

    /// Page `index` (1-based) of the audit log, newest first.
    pub fn get_sql_log(&self, index: u32, size: u32) -> ConsoleResult<SqlLogPage> {
        if index == 0 || size == 0 {
            return ConsoleResult::fail("index and size must be positive");
        }
        let offset = i64::from(index - 1) * i64::from(size);
        match self.log_page(offset, i64::from(size)) {
            Ok(page) => ConsoleResult::ok(page, "Got the logs!"),
            Err(e) => {
                error!(call = "get_sql_log", error = %e, "SQL console call failed");
                ConsoleResult::fail(format!("Something went wrong: {}", e))
            }
        }
    }

    fn log_page(&self, offset: i64, limit: i64) -> Result<SqlLogPage, StoreError> {
        let total = self.db.count_sql_logs()?;
        let data = self.db.sql_logs(offset, limit)?;
        Ok(SqlLogPage { total, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::NewPlugin;
    use crate::domain::traits::SystemClock;

    fn console() -> (Arc<Database>, SqlConsole) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.upsert_plugin(&NewPlugin::new("roll", "Roll")).unwrap();
        let console = SqlConsole::new(db.clone(), Arc::new(SystemClock));
        (db, console)
    }

    #[test]
    fn test_is_select() {
        assert!(is_select("SELECT * FROM plugin_info"));
        assert!(is_select("  select 1"));
        assert!(!is_select("selected"));
        assert!(!is_select("update plugin_info set status = 0"));
    }

    #[test]
    fn test_statement_count() {
        assert_eq!(statement_count(""), 0);
        assert_eq!(statement_count(" ; ;"), 0);
        assert_eq!(statement_count("delete from t;"), 1);
        assert_eq!(statement_count("update t set a = 'x;y'"), 1);
        assert_eq!(statement_count("update t set a = 1 -- trailing; comment"), 1);
        assert_eq!(statement_count("update t set a = 1 /* ; */"), 1);
        assert_eq!(statement_count("delete from t; drop table t"), 2);
    }

    #[test]
    fn test_select_returns_rows_and_is_audited() {
        let (db, console) = console();
        let result = console.exec_sql("select module, name from plugin_info", Some("10.0.0.1"));
        assert!(result.suc);
        let rows = result.data.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["module"], "roll");

        let logs = db.sql_logs(0, 10).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].ip, "10.0.0.1");
        assert!(logs[0].is_suc);
    }

    #[test]
    fn test_write_statement_runs_once() {
        let (db, console) = console();
        let result = console.exec_sql("update plugin_info set name = 'Dice' where module = 'roll'", None);
        assert!(result.suc);
        assert_eq!(db.get_plugin_by_module("roll").unwrap().unwrap().name, "Dice");

        let logs = db.sql_logs(0, 10).unwrap();
        assert_eq!(logs[0].ip, UNKNOWN_IP);
        assert_eq!(logs[0].result, "1 rows affected");
    }

    #[test]
    fn test_multiple_write_statements_are_rejected() {
        let (db, console) = console();
        let result = console.exec_sql("delete from plugin_info; delete from sql_log", None);
        assert!(!result.suc);
        assert!(result.warning.is_some());
        assert!(db.get_plugin_by_module("roll").unwrap().is_some());

        let logs = db.sql_logs(0, 10).unwrap();
        assert_eq!(logs.len(), 1);
        assert!(!logs[0].is_suc);
    }

    #[test]
    fn test_failed_statement_is_audited_with_error() {
        let (db, console) = console();
        let result = console.exec_sql("select * from missing_table", Some("1.2.3.4"));
        assert!(!result.suc);
        assert!(result.info.starts_with("SQL error"));

        let logs = db.sql_logs(0, 10).unwrap();
        assert!(!logs[0].is_suc);
        assert!(logs[0].result.contains("missing_table"));
    }

    #[test]
    fn test_sql_log_paging() {
        let (_, console) = console();
        for _ in 0..3 {
            console.exec_sql("select 1", None);
        }
        let page = console.get_sql_log(2, 2).data.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.data.len(), 1);

        assert!(!console.get_sql_log(0, 2).suc);
    }

    #[test]
    fn test_table_introspection() {
        let (_, console) = console();
        let tables = console.get_table_list().data.unwrap();
        assert!(tables.contains(&"plugin_info".to_string()));
        let columns = console.get_table_column("plugin_info").data.unwrap();
        assert!(columns.iter().any(|c| c.column_name == "block_type" && c.is_nullable));
    }
}
