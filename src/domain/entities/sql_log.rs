use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audit entry for a statement run through the SQL console.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlLog {
    pub id: i64,
    pub ip: String,
    pub sql: String,
    pub result: String,
    pub is_suc: bool,
    pub create_time: DateTime<Utc>,
}

/// Column description returned by schema introspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub column_name: String,
    pub data_type: String,
    pub is_nullable: bool,
    pub default_value: Option<String>,
    pub primary_key: bool,
}
