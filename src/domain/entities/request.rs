use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Friend,
    Group,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Friend => "friend",
            RequestKind::Group => "group",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "friend" => Ok(RequestKind::Friend),
            "group" => Ok(RequestKind::Group),
            other => Err(format!("unknown request kind: {}", other)),
        }
    }
}

/// Outcome of a request. A record without one is pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandleType {
    Expire,
    Approve,
    Refuse,
    Ignore,
}

impl HandleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandleType::Expire => "expire",
            HandleType::Approve => "approve",
            HandleType::Refuse => "refuse",
            HandleType::Ignore => "ignore",
        }
    }
}

impl fmt::Display for HandleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HandleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "expire" => Ok(HandleType::Expire),
            "approve" => Ok(HandleType::Approve),
            "refuse" => Ok(HandleType::Refuse),
            "ignore" => Ok(HandleType::Ignore),
            other => Err(format!("unknown handle type: {}", other)),
        }
    }
}

/// A persisted friend/group request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub id: i64,
    pub request_kind: RequestKind,
    pub platform: String,
    pub bot_id: String,
    pub flag: String,
    pub user_id: String,
    pub group_id: Option<String>,
    pub nickname: String,
    pub comment: Option<String>,
    pub handle_type: Option<HandleType>,
    pub created_at: DateTime<Utc>,
}

impl RequestRecord {
    pub fn is_pending(&self) -> bool {
        self.handle_type.is_none()
    }
}

/// Insert payload for a new pending request.
#[derive(Debug, Clone)]
pub struct NewRequest {
    pub request_kind: RequestKind,
    pub platform: String,
    pub bot_id: String,
    pub flag: String,
    pub user_id: String,
    pub group_id: Option<String>,
    pub nickname: String,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Inbound friend request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FriendRequestEvent {
    pub user_id: String,
    pub flag: String,
    pub comment: Option<String>,
}

/// Inbound group request. Only `sub_type == "invite"` is recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRequestEvent {
    pub user_id: String,
    pub group_id: String,
    pub flag: String,
    pub sub_type: String,
    pub comment: Option<String>,
}

impl GroupRequestEvent {
    pub fn is_invite(&self) -> bool {
        self.sub_type == "invite"
    }
}

/// Platform profile of a requester.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrangerInfo {
    pub user_id: String,
    pub nickname: String,
}
