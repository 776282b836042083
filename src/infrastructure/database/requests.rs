use rusqlite::{params, Result as SqliteResult, Row};

use super::Database;
use crate::domain::entities::{HandleType, NewRequest, RequestKind, RequestRecord};

const REQUEST_COLUMNS: &str =
    "id, request_type, platform, bot_id, flag, user_id, group_id, nickname, comment, handle_type, created_at";

fn request_from_row(row: &Row<'_>) -> SqliteResult<RequestRecord> {
    Ok(RequestRecord {
        id: row.get(0)?,
        request_kind: row.get(1)?,
        platform: row.get(2)?,
        bot_id: row.get(3)?,
        flag: row.get(4)?,
        user_id: row.get(5)?,
        group_id: row.get(6)?,
        nickname: row.get(7)?,
        comment: row.get(8)?,
        handle_type: row.get(9)?,
        created_at: row.get(10)?,
    })
}

impl Database {
    /// Expire every pending request with the same kind, requester and group,
    /// then insert `request` as the only pending one. Both steps share one
    /// transaction. Returns the number of expired rows and the new id.
    pub fn replace_pending_request(&self, request: &NewRequest) -> SqliteResult<(usize, i64)> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let expired = tx.execute(
            "UPDATE fg_request SET handle_type = ?1
             WHERE request_type = ?2 AND user_id = ?3 AND handle_type IS NULL
               AND (?4 IS NULL OR group_id = ?4)",
            params![HandleType::Expire, request.request_kind, request.user_id, request.group_id],
        )?;

        tx.execute(
            "INSERT INTO fg_request
                (request_type, platform, bot_id, flag, user_id, group_id, nickname, comment, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                request.request_kind,
                request.platform,
                request.bot_id,
                request.flag,
                request.user_id,
                request.group_id,
                request.nickname,
                request.comment,
                request.created_at,
            ],
        )?;
        let id = tx.last_insert_rowid();

        tx.commit()?;
        Ok((expired, id))
    }

    pub fn list_requests(&self, kind: Option<RequestKind>, pending_only: bool) -> SqliteResult<Vec<RequestRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM fg_request
             WHERE (?1 IS NULL OR request_type = ?1) AND (?2 = 0 OR handle_type IS NULL)
             ORDER BY id",
            REQUEST_COLUMNS
        ))?;
        let rows = stmt.query_map(params![kind, pending_only], request_from_row)?;
        rows.collect()
    }

    /// Close a pending request. Already handled requests are left untouched.
    pub fn set_request_handle(&self, id: i64, handle: HandleType) -> SqliteResult<usize> {
        self.conn().execute(
            "UPDATE fg_request SET handle_type = ?1 WHERE id = ?2 AND handle_type IS NULL",
            params![handle, id],
        )
    }
}
