use rusqlite::{params, OptionalExtension, Result as SqliteResult};

use super::Database;
use crate::application::errors::StoreError;
use crate::domain::traits::LevelSource;

impl Database {
    pub fn get_user_level(&self, user_id: &str, group_id: &str) -> SqliteResult<Option<i64>> {
        self.conn()
            .query_row(
                "SELECT user_level FROM level_user WHERE user_id = ?1 AND group_id = ?2",
                params![user_id, group_id],
                |row| row.get(0),
            )
            .optional()
    }

    pub fn set_user_level(&self, user_id: &str, group_id: &str, level: i64) -> SqliteResult<()> {
        self.conn().execute(
            "INSERT INTO level_user (user_id, group_id, user_level) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id, group_id) DO UPDATE SET user_level = excluded.user_level",
            params![user_id, group_id, level],
        )?;
        Ok(())
    }
}

impl LevelSource for Database {
    fn user_level(&self, user_id: &str, group_id: &str) -> Result<Option<i64>, StoreError> {
        Ok(self.get_user_level(user_id, group_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_is_per_group() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.get_user_level("42", "7").unwrap(), None);

        db.set_user_level("42", "7", 3).unwrap();
        db.set_user_level("42", "7", 6).unwrap();
        assert_eq!(db.get_user_level("42", "7").unwrap(), Some(6));
        assert_eq!(db.user_level("42", "8").unwrap(), None);
    }
}
