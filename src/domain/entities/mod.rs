//! Domain entities - Core business objects with no external dependencies

pub mod plugin;
pub mod group;
pub mod request;
pub mod session;
pub mod sql_log;

pub use plugin::{BlockType, NewPlugin, PluginKind, PluginRecord, PluginRef, PluginState};
pub use group::{GroupInfo, GroupRecord, OverrideScope};
pub use request::{
    FriendRequestEvent, GroupRequestEvent, HandleType, NewRequest, RequestKind, RequestRecord,
    StrangerInfo,
};
pub use session::{Session, SessionLevel};
pub use sql_log::{Column, SqlLog};
