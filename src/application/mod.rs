//! Application layer - Use cases and business logic
//! 
//! This layer contains:
//! - Services: Plugin rules, permission gates, request recording, SQL console
//! - Errors: Domain-specific errors

pub mod errors;
pub mod services;
