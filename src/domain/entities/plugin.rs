use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Extent of a global disable. `None` on a record means "not blocked".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    All,
    Group,
    Private,
}

impl BlockType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockType::All => "all",
            BlockType::Group => "group",
            BlockType::Private => "private",
        }
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlockType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(BlockType::All),
            "group" => Ok(BlockType::Group),
            "private" => Ok(BlockType::Private),
            other => Err(format!("unknown block type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginKind {
    Normal,
    Hidden,
    Parent,
}

impl PluginKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PluginKind::Normal => "normal",
            PluginKind::Hidden => "hidden",
            PluginKind::Parent => "parent",
        }
    }
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PluginKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "normal" => Ok(PluginKind::Normal),
            "hidden" => Ok(PluginKind::Hidden),
            "parent" => Ok(PluginKind::Parent),
            other => Err(format!("unknown plugin kind: {}", other)),
        }
    }
}

/// A persisted plugin (feature) record.
///
/// `status` and `block_type` always move together: a plugin is globally
/// enabled exactly when it carries no block type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginRecord {
    pub id: i64,
    pub module: String,
    pub name: String,
    pub status: bool,
    pub block_type: Option<BlockType>,
    pub default_status: bool,
    pub plugin_kind: PluginKind,
    pub load_status: bool,
    pub author: Option<String>,
    pub version: Option<String>,
}

impl PluginRecord {
    /// Status value implied by a block type.
    pub fn status_for(block_type: Option<BlockType>) -> bool {
        block_type.is_none()
    }
}

/// Plugin registration data reported by the host at boot.
#[derive(Debug, Clone)]
pub struct NewPlugin {
    pub module: String,
    pub name: String,
    pub plugin_kind: PluginKind,
    pub default_status: bool,
    pub load_status: bool,
    pub author: Option<String>,
    pub version: Option<String>,
}

impl NewPlugin {
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
            plugin_kind: PluginKind::Normal,
            default_status: true,
            load_status: true,
            author: None,
            version: None,
        }
    }

    pub fn with_kind(mut self, kind: PluginKind) -> Self {
        self.plugin_kind = kind;
        self
    }

    pub fn with_default_status(mut self, status: bool) -> Self {
        self.default_status = status;
        self
    }

    pub fn with_load_status(mut self, loaded: bool) -> Self {
        self.load_status = loaded;
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

/// How an operator refers to a plugin.
///
/// A purely numeric reference is always a primary key, even when a plugin is
/// literally named like a number. Name references only match plugins that
/// loaded successfully and are not parent plugins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginRef {
    Id(i64),
    Name(String),
}

impl PluginRef {
    /// Returns `None` for numeric references outside the id range, which can
    /// never resolve.
    pub fn parse(input: &str) -> Option<Self> {
        if !input.is_empty() && input.chars().all(|c| c.is_ascii_digit()) {
            input.parse().ok().map(PluginRef::Id)
        } else {
            Some(PluginRef::Name(input.to_string()))
        }
    }
}

/// Effective state of a plugin for one scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PluginState {
    Active,
    GloballyBlocked,
    SuperuserBlocked,
    GroupBlocked,
}

impl PluginState {
    pub fn is_active(&self) -> bool {
        matches!(self, PluginState::Active)
    }
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            PluginState::Active => "active",
            PluginState::GloballyBlocked => "blocked globally",
            PluginState::SuperuserBlocked => "blocked by superuser",
            PluginState::GroupBlocked => "blocked by group admin",
        };
        f.write_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_reference_is_id() {
        assert_eq!(PluginRef::parse("7"), Some(PluginRef::Id(7)));
        assert_eq!(PluginRef::parse("007"), Some(PluginRef::Id(7)));
    }

    #[test]
    fn test_mixed_reference_is_name() {
        assert_eq!(PluginRef::parse("abc"), Some(PluginRef::Name("abc".to_string())));
        assert_eq!(PluginRef::parse("7a"), Some(PluginRef::Name("7a".to_string())));
        assert_eq!(PluginRef::parse("-7"), Some(PluginRef::Name("-7".to_string())));
    }

    #[test]
    fn test_overflowing_id_never_resolves() {
        assert_eq!(PluginRef::parse("99999999999999999999999"), None);
    }

    #[test]
    fn test_block_type_from_str() {
        assert_eq!("GROUP".parse::<BlockType>(), Ok(BlockType::Group));
        assert!("both".parse::<BlockType>().is_err());
    }
}
