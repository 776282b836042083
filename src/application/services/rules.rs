//! Permission and scope gates for group admin commands

use std::collections::HashSet;
use std::sync::Arc;

use crate::application::errors::StoreError;
use crate::domain::entities::Session;
use crate::domain::traits::LevelSource;

/// Level a group admin needs to switch plugins in their group
pub const DEFAULT_ADMIN_LEVEL: i64 = 5;

/// Result of gating a group admin command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allowed,
    /// Sent outside a group or channel
    NotInGroup,
    Denied,
}

pub struct Rules {
    superusers: HashSet<String>,
    levels: Arc<dyn LevelSource>,
}

impl Rules {
    pub fn new(superusers: impl IntoIterator<Item = String>, levels: Arc<dyn LevelSource>) -> Self {
        Self {
            superusers: superusers.into_iter().collect(),
            levels,
        }
    }

    pub fn is_superuser(&self, user_id: &str) -> bool {
        self.superusers.contains(user_id)
    }

    pub fn ensure_group(session: &Session) -> bool {
        session.is_group()
    }

    /// Superusers always pass. Anyone else needs a level of at least `level`
    /// in the session's group; without a required level only superusers pass.
    pub fn admin_check(&self, session: &Session, level: Option<i64>) -> Result<bool, StoreError> {
        let Some(user_id) = session.user_id.as_deref() else {
            return Ok(false);
        };
        if self.is_superuser(user_id) {
            return Ok(true);
        }
        let (Some(group_id), Some(level)) = (session.group_id.as_deref(), level) else {
            return Ok(false);
        };
        let held = self.levels.user_level(user_id, group_id)?;
        Ok(held.is_some_and(|held| held >= level))
    }

    pub fn group_admin_access(&self, session: &Session, level: i64) -> Result<Access, StoreError> {
        if !Self::ensure_group(session) {
            return Ok(Access::NotInGroup);
        }
        if !self.admin_check(session, Some(level))? {
            tracing::debug!(user_id = ?session.user_id, group_id = ?session.group_id, level, "Group admin check failed");
            return Ok(Access::Denied);
        }
        Ok(Access::Allowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::Database;

    fn rules() -> (Arc<Database>, Rules) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.set_user_level("admin", "7", 5).unwrap();
        db.set_user_level("member", "7", 1).unwrap();
        let rules = Rules::new(vec!["root".to_string()], db.clone());
        (db, rules)
    }

    #[test]
    fn test_ensure_group() {
        assert!(Rules::ensure_group(&Session::new("qq").in_group("7")));
        assert!(Rules::ensure_group(&Session::new("qq").in_channel("7")));
        assert!(!Rules::ensure_group(&Session::new("qq").with_user("42")));
    }

    #[test]
    fn test_admin_check_by_level() {
        let (_, rules) = rules();
        let in_group = |user: &str| Session::new("qq").with_user(user).in_group("7");

        assert!(rules.admin_check(&in_group("admin"), Some(5)).unwrap());
        assert!(!rules.admin_check(&in_group("admin"), Some(6)).unwrap());
        assert!(!rules.admin_check(&in_group("member"), Some(5)).unwrap());
        assert!(!rules.admin_check(&in_group("stranger"), Some(0)).unwrap());
        // No required level: superusers only
        assert!(!rules.admin_check(&in_group("admin"), None).unwrap());
        assert!(rules.admin_check(&in_group("root"), None).unwrap());
    }

    #[test]
    fn test_level_does_not_carry_across_groups() {
        let (_, rules) = rules();
        let elsewhere = Session::new("qq").with_user("admin").in_group("8");
        assert!(!rules.admin_check(&elsewhere, Some(1)).unwrap());
    }

    #[test]
    fn test_superuser_passes_in_private() {
        let (_, rules) = rules();
        let private = Session::new("qq").with_user("root");
        assert!(rules.admin_check(&private, Some(5)).unwrap());
        assert!(!rules.admin_check(&Session::new("qq"), Some(0)).unwrap());
    }

    #[test]
    fn test_group_admin_access() {
        let (_, rules) = rules();
        let admin = Session::new("qq").with_user("admin");
        assert_eq!(rules.group_admin_access(&admin, 5).unwrap(), Access::NotInGroup);
        assert_eq!(
            rules.group_admin_access(&admin.clone().in_group("7"), DEFAULT_ADMIN_LEVEL).unwrap(),
            Access::Allowed
        );
        let member = Session::new("qq").with_user("member").in_group("7");
        assert_eq!(rules.group_admin_access(&member, DEFAULT_ADMIN_LEVEL).unwrap(), Access::Denied);
    }
}
