//! Friend/group request recording

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use super::dedup::{DedupKey, DedupTimer};
use crate::application::errors::BotError;
use crate::domain::entities::{
    FriendRequestEvent, GroupRequestEvent, HandleType, NewRequest, RequestKind, Session,
};
use crate::domain::traits::{Bot, Clock};
use crate::infrastructure::database::Database;

/// What happened to an inbound request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Persisted as the pending request with this id
    Recorded(i64),
    /// Seen inside the trailing window
    Duplicate,
    /// Not a request kind that gets recorded
    Ignored,
    /// Superuser invite; `approved` is false when the platform refused
    AutoApproved { approved: bool },
}

pub struct RequestRecorder {
    db: Arc<Database>,
    timer: DedupTimer,
    superusers: HashSet<String>,
}

impl RequestRecorder {
    pub fn new(
        db: Arc<Database>,
        superusers: impl IntoIterator<Item = String>,
        window: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            db,
            timer: DedupTimer::new(window, clock),
            superusers: superusers.into_iter().collect(),
        }
    }

    pub fn timer(&self) -> &DedupTimer {
        &self.timer
    }

    pub fn is_superuser(&self, user_id: &str) -> bool {
        self.superusers.contains(user_id)
    }

    pub async fn on_friend_request<B: Bot + ?Sized>(
        &self,
        bot: &B,
        session: &Session,
        event: &FriendRequestEvent,
    ) -> Result<RequestOutcome, BotError> {
        if event.user_id.is_empty() {
            return Ok(RequestOutcome::Ignored);
        }

        let key = DedupKey::friend(&event.user_id);
        // Stamped before the platform lookup so a concurrent repeat is a duplicate
        if !self.timer.try_accept(&key) {
            debug!(user_id = %event.user_id, "Friend request repeated within window, ignored");
            return Ok(RequestOutcome::Duplicate);
        }

        debug!(user_id = %event.user_id, "Recording friend request");
        match self.persist_friend(bot, session, event).await {
            Ok((expired, id)) => {
                info!(user_id = %event.user_id, id, expired, "Friend request recorded");
                Ok(RequestOutcome::Recorded(id))
            }
            Err(e) => {
                self.timer.forget(&key);
                Err(e)
            }
        }
    }

    async fn persist_friend<B: Bot + ?Sized>(
        &self,
        bot: &B,
        session: &Session,
        event: &FriendRequestEvent,
    ) -> Result<(usize, i64), BotError> {
        let stranger = bot.get_stranger_info(&event.user_id).await?;
        let request = NewRequest {
            request_kind: RequestKind::Friend,
            platform: session.platform.clone(),
            bot_id: bot.bot_info().id,
            flag: event.flag.clone(),
            user_id: event.user_id.clone(),
            group_id: None,
            nickname: stranger.nickname,
            comment: event.comment.clone(),
            created_at: self.timer.now(),
        };
        Ok(self.db.replace_pending_request(&request)?)
    }

    pub async fn on_group_request<B: Bot + ?Sized>(
        &self,
        bot: &B,
        session: &Session,
        event: &GroupRequestEvent,
    ) -> Result<RequestOutcome, BotError> {
        if !event.is_invite() {
            return Ok(RequestOutcome::Ignored);
        }

        if self.is_superuser(&event.user_id) {
            debug!(user_id = %event.user_id, group_id = %event.group_id, "Auto approving superuser invite");
            return self.approve_superuser_invite(bot, event).await;
        }

        let key = DedupKey::group(&event.user_id, &event.group_id);
        if !self.timer.try_accept(&key) {
            debug!(key = %key, "Group request repeated within window, ignored");
            return Ok(RequestOutcome::Duplicate);
        }

        let request = NewRequest {
            request_kind: RequestKind::Group,
            platform: session.platform.clone(),
            bot_id: bot.bot_info().id,
            flag: event.flag.clone(),
            user_id: event.user_id.clone(),
            group_id: Some(event.group_id.clone()),
            nickname: String::new(),
            comment: event.comment.clone(),
            created_at: self.timer.now(),
        };
        let (expired, id) = match self.db.replace_pending_request(&request) {
            Ok(stored) => stored,
            Err(e) => {
                self.timer.forget(&key);
                return Err(e.into());
            }
        };

        info!(
            user_id = %event.user_id,
            group_id = %event.group_id,
            id,
            expired,
            "Group request recorded"
        );
        Ok(RequestOutcome::Recorded(id))
    }

    /// Platform failures are logged and reported through the outcome; store
    /// failures still propagate.
    async fn approve_superuser_invite<B: Bot + ?Sized>(
        &self,
        bot: &B,
        event: &GroupRequestEvent,
    ) -> Result<RequestOutcome, BotError> {
        self.db.ensure_group(&event.group_id, self.timer.now())?;
        // Marks the group as authorised by a superuser, new or not
        self.db.set_group_flag(&event.group_id, 1)?;

        match self.join_and_refresh(bot, event).await {
            Ok(()) => {
                info!(group_id = %event.group_id, "Joined group on superuser invite");
                Ok(RequestOutcome::AutoApproved { approved: true })
            }
            Err(BotError::Platform(e)) => {
                error!(
                    user_id = %event.user_id,
                    group_id = %event.group_id,
                    error = %e,
                    "Failed to auto approve superuser invite"
                );
                Ok(RequestOutcome::AutoApproved { approved: false })
            }
            Err(e) => Err(e),
        }
    }

    async fn join_and_refresh<B: Bot + ?Sized>(&self, bot: &B, event: &GroupRequestEvent) -> Result<(), BotError> {
        bot.set_group_add_request(&event.flag, "invite", true).await?;
        let mut info = bot.get_group_info(&event.group_id).await?;
        info.group_id = event.group_id.clone();
        self.db.update_group_info(&info)?;
        Ok(())
    }

    /// Close a pending request with the operator's decision.
    pub fn mark_handled(&self, id: i64, handle: HandleType) -> Result<(), BotError> {
        if self.db.set_request_handle(id, handle)? == 0 {
            return Err(BotError::InvalidArgs(format!("no pending request with id {}", id)));
        }
        info!(id, handle = %handle, "Request handled");
        Ok(())
    }

    /// Drop expired timer entries.
    pub fn sweep(&self) {
        self.timer.sweep();
    }

    /// Run `sweep` on a fixed interval until the task is aborted.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        let recorder = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                recorder.sweep();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::errors::PlatformError;
    use crate::application::services::dedup::DEFAULT_WINDOW;
    use crate::domain::entities::{GroupInfo, StrangerInfo};
    use crate::domain::traits::{BotInfo, ManualClock};
    use async_trait::async_trait;
    use chrono::{TimeDelta, Utc};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeBot {
        fail_approve: bool,
        yield_lookup: bool,
        approved: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Bot for FakeBot {
        async fn get_stranger_info(&self, user_id: &str) -> Result<StrangerInfo, PlatformError> {
            if self.yield_lookup {
                tokio::task::yield_now().await;
            }
            Ok(StrangerInfo {
                user_id: user_id.to_string(),
                nickname: format!("nick-{}", user_id),
            })
        }

        async fn set_group_add_request(&self, flag: &str, _sub_type: &str, _approve: bool) -> Result<(), PlatformError> {
            if self.fail_approve {
                return Err(PlatformError::action_failed("set_group_add_request", "retcode 100"));
            }
            self.approved.lock().unwrap().push(flag.to_string());
            Ok(())
        }

        async fn get_group_info(&self, group_id: &str) -> Result<GroupInfo, PlatformError> {
            Ok(GroupInfo {
                group_id: group_id.to_string(),
                group_name: "Test group".to_string(),
                max_member_count: 500,
                member_count: 42,
            })
        }

        fn bot_info(&self) -> BotInfo {
            BotInfo {
                id: "10000".to_string(),
                name: "test".to_string(),
                platform: "qq".to_string(),
            }
        }
    }

    fn recorder() -> (Arc<Database>, Arc<ManualClock>, RequestRecorder) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let recorder = RequestRecorder::new(
            db.clone(),
            vec!["1".to_string()],
            DEFAULT_WINDOW,
            clock.clone(),
        );
        (db, clock, recorder)
    }

    fn friend(user: &str, flag: &str) -> FriendRequestEvent {
        FriendRequestEvent {
            user_id: user.to_string(),
            flag: flag.to_string(),
            comment: Some("hi".to_string()),
        }
    }

    fn invite(user: &str, group: &str, flag: &str) -> GroupRequestEvent {
        GroupRequestEvent {
            user_id: user.to_string(),
            group_id: group.to_string(),
            flag: flag.to_string(),
            sub_type: "invite".to_string(),
            comment: None,
        }
    }

    #[tokio::test]
    async fn test_friend_request_is_recorded_once_per_window() {
        let (db, clock, recorder) = recorder();
        let bot = FakeBot::default();
        let session = Session::new("qq");

        let first = recorder.on_friend_request(&bot, &session, &friend("42", "f1")).await.unwrap();
        assert!(matches!(first, RequestOutcome::Recorded(_)));

        clock.advance(TimeDelta::minutes(2));
        let second = recorder.on_friend_request(&bot, &session, &friend("42", "f2")).await.unwrap();
        assert_eq!(second, RequestOutcome::Duplicate);

        let rows = db.list_requests(Some(RequestKind::Friend), false).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].nickname, "nick-42");
        assert_eq!(rows[0].bot_id, "10000");
        assert_eq!(rows[0].comment.as_deref(), Some("hi"));
        assert!(rows[0].is_pending());
    }

    #[tokio::test]
    async fn test_friend_request_after_window_expires_previous() {
        let (db, clock, recorder) = recorder();
        let bot = FakeBot::default();
        let session = Session::new("qq");

        recorder.on_friend_request(&bot, &session, &friend("42", "f1")).await.unwrap();
        clock.advance(TimeDelta::minutes(5));
        recorder.on_friend_request(&bot, &session, &friend("42", "f2")).await.unwrap();

        let rows = db.list_requests(Some(RequestKind::Friend), false).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].handle_type, Some(HandleType::Expire));
        assert!(rows[1].is_pending());
        assert_eq!(rows[1].flag, "f2");
    }

    #[tokio::test]
    async fn test_concurrent_friend_requests_record_once() {
        let (db, _, recorder) = recorder();
        let bot = FakeBot {
            yield_lookup: true,
            ..Default::default()
        };
        let session = Session::new("qq");
        let (a, b) = (friend("42", "f1"), friend("42", "f2"));

        let (first, second) = tokio::join!(
            recorder.on_friend_request(&bot, &session, &a),
            recorder.on_friend_request(&bot, &session, &b),
        );
        let outcomes = [first.unwrap(), second.unwrap()];
        assert_eq!(outcomes.iter().filter(|o| matches!(o, RequestOutcome::Recorded(_))).count(), 1);
        assert!(outcomes.contains(&RequestOutcome::Duplicate));

        let rows = db.list_requests(Some(RequestKind::Friend), false).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_pending());
    }

    #[tokio::test]
    async fn test_friend_request_without_user_is_ignored() {
        let (db, _, recorder) = recorder();
        let out = recorder
            .on_friend_request(&FakeBot::default(), &Session::new("qq"), &friend("", "f1"))
            .await
            .unwrap();
        assert_eq!(out, RequestOutcome::Ignored);
        assert!(recorder.timer().is_empty());
        assert!(db.list_requests(None, false).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_superuser_invite_flags_existing_group() {
        let (db, _, recorder) = recorder();
        let (group, created) = db.ensure_group("7", Utc::now()).unwrap();
        assert!(created);
        assert_eq!(group.group_flag, 0);

        let out = recorder
            .on_group_request(&FakeBot::default(), &Session::new("qq"), &invite("1", "7", "f1"))
            .await
            .unwrap();
        assert_eq!(out, RequestOutcome::AutoApproved { approved: true });
        assert_eq!(db.get_group("7").unwrap().unwrap().group_flag, 1);
    }

    #[tokio::test]
    async fn test_mark_handled_closes_pending_only() {
        let (db, _, recorder) = recorder();
        let out = recorder
            .on_friend_request(&FakeBot::default(), &Session::new("qq"), &friend("42", "f1"))
            .await
            .unwrap();
        let RequestOutcome::Recorded(id) = out else {
            panic!("expected a recorded request");
        };

        recorder.mark_handled(id, HandleType::Approve).unwrap();
        let rows = db.list_requests(None, false).unwrap();
        assert_eq!(rows[0].handle_type, Some(HandleType::Approve));

        let err = recorder.mark_handled(id, HandleType::Refuse).unwrap_err();
        assert!(matches!(err, BotError::InvalidArgs(_)));
    }

    #[tokio::test]
    async fn test_non_invite_group_request_is_ignored() {
        let (db, _, recorder) = recorder();
        let bot = FakeBot::default();
        let mut event = invite("42", "7", "f1");
        event.sub_type = "add".to_string();

        let out = recorder.on_group_request(&bot, &Session::new("qq"), &event).await.unwrap();
        assert_eq!(out, RequestOutcome::Ignored);
        assert!(db.list_requests(None, false).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_superuser_invite_is_auto_approved() {
        let (db, _, recorder) = recorder();
        let bot = FakeBot::default();

        let out = recorder
            .on_group_request(&bot, &Session::new("qq"), &invite("1", "7", "f1"))
            .await
            .unwrap();
        assert_eq!(out, RequestOutcome::AutoApproved { approved: true });
        assert_eq!(bot.approved.lock().unwrap().as_slice(), ["f1".to_string()]);

        let group = db.get_group("7").unwrap().unwrap();
        assert_eq!(group.group_name, "Test group");
        assert_eq!(group.member_count, 42);
        assert_eq!(group.max_member_count, 500);
        assert_eq!(group.group_flag, 1);
        assert!(db.list_requests(None, false).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_platform_failure_does_not_fail_handler() {
        let (db, _, recorder) = recorder();
        let bot = FakeBot {
            fail_approve: true,
            ..Default::default()
        };

        let out = recorder
            .on_group_request(&bot, &Session::new("qq"), &invite("1", "7", "f1"))
            .await
            .unwrap();
        assert_eq!(out, RequestOutcome::AutoApproved { approved: false });
        // Group record still created before the platform call
        assert!(db.get_group("7").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_group_keys_are_per_group() {
        let (db, _, recorder) = recorder();
        let bot = FakeBot::default();
        let session = Session::new("qq");

        recorder.on_group_request(&bot, &session, &invite("42", "7", "f1")).await.unwrap();
        let other = recorder.on_group_request(&bot, &session, &invite("42", "8", "f2")).await.unwrap();
        assert!(matches!(other, RequestOutcome::Recorded(_)));
        // Friend key for the same user is independent
        let friend_out = recorder.on_friend_request(&bot, &session, &friend("42", "f3")).await.unwrap();
        assert!(matches!(friend_out, RequestOutcome::Recorded(_)));

        assert_eq!(db.list_requests(None, true).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_sweep_reopens_window_bookkeeping() {
        let (_, clock, recorder) = recorder();
        let bot = FakeBot::default();
        recorder.on_friend_request(&bot, &Session::new("qq"), &friend("42", "f1")).await.unwrap();
        assert_eq!(recorder.timer().len(), 1);

        clock.advance(TimeDelta::minutes(6));
        recorder.sweep();
        assert!(recorder.timer().is_empty());
    }
}
