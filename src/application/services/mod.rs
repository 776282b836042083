//! Application services

pub mod dedup;
pub mod plugin_manage;
pub mod request_recorder;
pub mod rules;
pub mod sql_console;

pub use dedup::{DedupKey, DedupTimer};
pub use plugin_manage::{Outcome, PluginManage};
pub use request_recorder::{RequestOutcome, RequestRecorder};
pub use rules::{Access, Rules};
pub use sql_console::{ConsoleResult, SqlConsole};
