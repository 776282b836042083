//! Plugin management and request recording for a chat bot
//!
//! - Plugin status rules: global, per-group and per-group superuser switches
//! - Friend/group request recording with trailing-window de-duplication
//! - SQL console with an audit log

pub mod domain;
pub mod application;
pub mod infrastructure;
