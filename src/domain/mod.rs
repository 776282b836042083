//! Domain layer - Core business objects
//!
//! This layer contains:
//! - Entities: Plugins, groups, requests and SQL audit entries
//! - Traits: Abstractions for infrastructure (Bot, Clock)

pub mod entities;
pub mod traits;
