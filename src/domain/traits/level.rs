use crate::application::errors::StoreError;

/// Per-group permission levels
pub trait LevelSource: Send + Sync {
    /// `None` when the user has no level in that group
    fn user_level(&self, user_id: &str, group_id: &str) -> Result<Option<i64>, StoreError>;
}
