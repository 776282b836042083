//! Domain traits - Abstractions over the host platform, permissions and time

pub mod bot;
pub mod clock;
pub mod level;

pub use bot::{Bot, BotInfo};
pub use clock::{Clock, ManualClock, SystemClock};
pub use level::LevelSource;
