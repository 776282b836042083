//! Console adapter for development/testing
//!
//! Reads request events from stdin, one per line:
//!
//! ```text
//! friend <user_id> <flag> [comment...]
//! group <user_id> <group_id> <flag> [sub_type]
//! block <user_id> <group_id|-> <plugin...>
//! unblock <user_id> <group_id|-> <plugin...>
//! sweep
//! quit
//! ```

use async_trait::async_trait;
use crate::application::errors::PlatformError;
use crate::domain::entities::{FriendRequestEvent, GroupInfo, GroupRequestEvent, StrangerInfo};
use crate::domain::traits::{Bot, BotInfo};

/// One parsed console line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleEvent {
    Friend(FriendRequestEvent),
    Group(GroupRequestEvent),
    /// Group admin plugin switch; `group_id` is `None` for a private message
    Switch {
        user_id: String,
        group_id: Option<String>,
        plugin: String,
        enable: bool,
    },
    Sweep,
    Quit,
}

impl ConsoleEvent {
    pub fn parse(line: &str) -> Result<Self, String> {
        let mut parts = line.split_whitespace();
        let kind = parts.next().ok_or_else(|| "empty line".to_string())?;

        match kind {
            "friend" => {
                let (Some(user_id), Some(flag)) = (parts.next(), parts.next()) else {
                    return Err("usage: friend <user_id> <flag> [comment...]".to_string());
                };
                let comment = parts.collect::<Vec<_>>().join(" ");
                Ok(ConsoleEvent::Friend(FriendRequestEvent {
                    user_id: user_id.to_string(),
                    flag: flag.to_string(),
                    comment: (!comment.is_empty()).then_some(comment),
                }))
            }
            "group" => {
                let (Some(user_id), Some(group_id), Some(flag)) = (parts.next(), parts.next(), parts.next()) else {
                    return Err("usage: group <user_id> <group_id> <flag> [sub_type]".to_string());
                };
                Ok(ConsoleEvent::Group(GroupRequestEvent {
                    user_id: user_id.to_string(),
                    group_id: group_id.to_string(),
                    flag: flag.to_string(),
                    sub_type: parts.next().unwrap_or("invite").to_string(),
                    comment: None,
                }))
            }
            "block" | "unblock" => {
                let (Some(user_id), Some(group_id)) = (parts.next(), parts.next()) else {
                    return Err(format!("usage: {} <user_id> <group_id|-> <plugin...>", kind));
                };
                let plugin = parts.collect::<Vec<_>>().join(" ");
                if plugin.is_empty() {
                    return Err(format!("usage: {} <user_id> <group_id|-> <plugin...>", kind));
                }
                Ok(ConsoleEvent::Switch {
                    user_id: user_id.to_string(),
                    group_id: (group_id != "-").then(|| group_id.to_string()),
                    plugin,
                    enable: kind == "unblock",
                })
            }
            "sweep" => Ok(ConsoleEvent::Sweep),
            "quit" | "exit" => Ok(ConsoleEvent::Quit),
            other => Err(format!("unknown event: {}", other)),
        }
    }
}

/// Console bot adapter for local development
pub struct ConsoleAdapter {
    info: BotInfo,
}

impl ConsoleAdapter {
    pub fn new() -> Self {
        Self {
            info: BotInfo {
                id: "console".to_string(),
                name: "zxpm".to_string(),
                platform: "console".to_string(),
            },
        }
    }
}

impl Default for ConsoleAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Bot for ConsoleAdapter {
    async fn get_stranger_info(&self, user_id: &str) -> Result<StrangerInfo, PlatformError> {
        Ok(StrangerInfo {
            user_id: user_id.to_string(),
            nickname: user_id.to_string(),
        })
    }

    async fn set_group_add_request(&self, flag: &str, sub_type: &str, approve: bool) -> Result<(), PlatformError> {
        println!("[BOT] set_group_add_request flag={} sub_type={} approve={}", flag, sub_type, approve);
        Ok(())
    }

    async fn get_group_info(&self, group_id: &str) -> Result<GroupInfo, PlatformError> {
        Ok(GroupInfo {
            group_id: group_id.to_string(),
            group_name: format!("console group {}", group_id),
            max_member_count: 0,
            member_count: 0,
        })
    }

    fn bot_info(&self) -> BotInfo {
        self.info.clone()
    }
}
