use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A group known to the bot. Records with a `channel_id` belong to a
/// sub-channel; group-scope lookups only consider `channel_id == None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub id: i64,
    pub group_id: String,
    pub channel_id: Option<String>,
    pub group_name: String,
    pub max_member_count: i64,
    pub member_count: i64,
    pub group_flag: i64,
    /// Whether the bot is awake in this group.
    pub status: bool,
    pub created_at: DateTime<Utc>,
}

/// Who placed a per-group override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideScope {
    Admin,
    Superuser,
}

impl OverrideScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverrideScope::Admin => "admin",
            OverrideScope::Superuser => "superuser",
        }
    }
}

impl fmt::Display for OverrideScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Group details reported by the platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub group_id: String,
    pub group_name: String,
    pub max_member_count: i64,
    pub member_count: i64,
}
