//! Infrastructure layer - External concerns
//! 
//! This layer contains:
//! - Config: Configuration loading
//! - Database: SQLite persistence
//! - Adapters: Platform integrations (console)

pub mod config;
pub mod database;
pub mod adapters;
