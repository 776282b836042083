/// Scope an event happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionLevel {
    #[default]
    Private,
    Group,
    /// Sub-channel of a group
    Channel,
}

/// Where an event came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub platform: String,
    pub level: SessionLevel,
    pub user_id: Option<String>,
    pub group_id: Option<String>,
}

impl Session {
    pub fn new(platform: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            level: SessionLevel::Private,
            user_id: None,
            group_id: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn in_group(mut self, group_id: impl Into<String>) -> Self {
        self.level = SessionLevel::Group;
        self.group_id = Some(group_id.into());
        self
    }

    pub fn in_channel(mut self, group_id: impl Into<String>) -> Self {
        self.level = SessionLevel::Channel;
        self.group_id = Some(group_id.into());
        self
    }

    pub fn is_group(&self) -> bool {
        matches!(self.level, SessionLevel::Group | SessionLevel::Channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_scope() {
        let private = Session::new("qq").with_user("42");
        assert!(!private.is_group());
        assert_eq!(private.group_id, None);

        assert!(Session::new("qq").in_group("7").is_group());
        let channel = Session::new("qq").in_channel("7");
        assert_eq!(channel.level, SessionLevel::Channel);
        assert!(channel.is_group());
    }
}
