use async_trait::async_trait;
use crate::domain::entities::{GroupInfo, StrangerInfo};
use crate::application::errors::PlatformError;

/// Bot trait - platform actions the request handlers rely on
#[async_trait]
pub trait Bot: Send + Sync {
    /// Look up a requester's public profile
    async fn get_stranger_info(&self, user_id: &str) -> Result<StrangerInfo, PlatformError>;

    /// Approve or reject a pending group request
    async fn set_group_add_request(&self, flag: &str, sub_type: &str, approve: bool) -> Result<(), PlatformError>;

    /// Fetch group name and member counts
    async fn get_group_info(&self, group_id: &str) -> Result<GroupInfo, PlatformError>;

    /// Get bot info
    fn bot_info(&self) -> BotInfo;
}

/// Bot information
#[derive(Debug, Clone)]
pub struct BotInfo {
    pub id: String,
    pub name: String,
    pub platform: String,
}
