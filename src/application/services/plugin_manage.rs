//! Plugin status rules: global, per-group admin and per-group superuser switches

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::application::errors::StoreError;
use crate::domain::entities::{
    BlockType, NewPlugin, OverrideScope, PluginKind, PluginRecord, PluginRef, PluginState,
};
use crate::domain::traits::Clock;
use crate::infrastructure::database::Database;

const PLUGIN_NOT_FOUND: &str = "Plugin not found...";
const GROUP_NOT_FOUND: &str = "Group not found...";

/// Result of a rules operation. Business outcomes are values; only store
/// failures travel as errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "message", rename_all = "kebab-case")]
pub enum Outcome {
    Done(String),
    Unchanged(String),
    NotFound(String),
}

impl Outcome {
    pub fn message(&self) -> &str {
        match self {
            Outcome::Done(m) | Outcome::Unchanged(m) | Outcome::NotFound(m) => m,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Outcome::Done(_))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

fn on_off(status: bool) -> &'static str {
    if status {
        "on"
    } else {
        "off"
    }
}

/// Plugin management service
pub struct PluginManage {
    db: Arc<Database>,
    clock: Arc<dyn Clock>,
}

impl PluginManage {
    pub fn new(db: Arc<Database>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Resolve an operator reference: digits go to the primary key, anything
    /// else to a loaded, non-parent plugin of that name.
    pub fn resolve(&self, reference: &str) -> Result<Option<PluginRecord>, StoreError> {
        let plugin = match PluginRef::parse(reference) {
            Some(PluginRef::Id(id)) => self.db.get_plugin_by_id(id)?,
            Some(PluginRef::Name(name)) => self.db.get_plugin_by_name(&name)?,
            None => None,
        };
        Ok(plugin)
    }

    /// Register a plugin reported by the host at boot.
    pub fn register_plugin(&self, plugin: &NewPlugin) -> Result<i64, StoreError> {
        let id = self.db.upsert_plugin(plugin)?;
        tracing::debug!(id, module = %plugin.module, "Registered plugin");
        Ok(id)
    }

    pub fn list_plugins(&self) -> Result<Vec<PluginRecord>, StoreError> {
        Ok(self.db.list_visible_plugins()?)
    }

    /// Effective state of `module`, globally or for one group. `None` when
    /// the module is unknown.
    pub fn resolve_state(&self, module: &str, group_id: Option<&str>) -> Result<Option<PluginState>, StoreError> {
        let Some(plugin) = self.db.get_plugin_by_module(module)? else {
            return Ok(None);
        };
        if !plugin.status {
            return Ok(Some(PluginState::GloballyBlocked));
        }
        if let Some(group_id) = group_id {
            if self.db.has_override(group_id, module, OverrideScope::Superuser)? {
                return Ok(Some(PluginState::SuperuserBlocked));
            }
            if self.db.has_override(group_id, module, OverrideScope::Admin)? {
                return Ok(Some(PluginState::GroupBlocked));
            }
        }
        Ok(Some(PluginState::Active))
    }

    pub fn is_active(&self, module: &str, group_id: Option<&str>) -> Result<bool, StoreError> {
        Ok(self
            .resolve_state(module, group_id)?
            .map(|s| s.is_active())
            .unwrap_or(false))
    }

    /// Set the state a plugin starts in when the bot joins a new group.
    pub fn set_default_status(&self, reference: &str, status: bool) -> Result<Outcome, StoreError> {
        let Some(plugin) = self.resolve(reference)? else {
            return Ok(Outcome::NotFound(PLUGIN_NOT_FOUND.to_string()));
        };
        self.db.set_plugin_default_status(plugin.id, status)?;
        Ok(Outcome::Done(format!(
            "Default status of {} for new groups set to: {}",
            plugin.name,
            on_off(status)
        )))
    }

    /// Bulk switch for every normal plugin: default status, one group's admin
    /// overrides, or the global status, in that order of precedence.
    pub fn set_all_plugin_status(
        &self,
        status: bool,
        is_default: bool,
        group_id: Option<&str>,
    ) -> Result<Outcome, StoreError> {
        if is_default {
            let rows = self.db.set_all_default_status(PluginKind::Normal, status)?;
            tracing::info!(rows, status, "Updated default status of all plugins");
            return Ok(Outcome::Done(format!(
                "Default status of all plugins for new groups set to: {}",
                on_off(status)
            )));
        }

        // An empty group id means no group
        if let Some(group_id) = group_id.filter(|g| !g.is_empty()) {
            if self.db.get_group(group_id)?.is_none() {
                return Ok(Outcome::NotFound(GROUP_NOT_FOUND.to_string()));
            }
            let modules = self.db.list_modules(PluginKind::Normal)?;
            let rows = if status {
                self.db.remove_overrides(group_id, &modules, OverrideScope::Admin)?
            } else {
                self.db.add_overrides(group_id, &modules, OverrideScope::Admin)?
            };
            tracing::info!(group_id, rows, status, "Updated all plugins of group");
            return Ok(Outcome::Done(format!(
                "All plugins of this group set to: {}",
                on_off(status)
            )));
        }

        let block_type = if status { None } else { Some(BlockType::All) };
        let rows = self.db.set_all_block(PluginKind::Normal, block_type)?;
        tracing::info!(rows, status, "Updated global status of all plugins");
        Ok(Outcome::Done(format!(
            "Global status of all plugins set to: {}",
            on_off(status)
        )))
    }

    /// Whether the bot is awake in the group. Unknown groups count as asleep.
    pub fn is_awake(&self, group_id: &str) -> Result<bool, StoreError> {
        Ok(self.db.get_group(group_id)?.map(|g| g.status).unwrap_or(false))
    }

    pub fn sleep(&self, group_id: &str) -> Result<(), StoreError> {
        self.db.set_group_status(group_id, false)?;
        Ok(())
    }

    pub fn wake(&self, group_id: &str) -> Result<(), StoreError> {
        self.db.set_group_status(group_id, true)?;
        Ok(())
    }

    /// Globally disable a module. Unknown modules are a no-op.
    pub fn block(&self, module: &str) -> Result<(), StoreError> {
        let rows = self.db.set_module_block(module, Some(BlockType::All))?;
        tracing::debug!(module, rows, "Blocked module");
        Ok(())
    }

    pub fn unblock(&self, module: &str) -> Result<(), StoreError> {
        let rows = self.db.set_module_block(module, None)?;
        tracing::debug!(module, rows, "Unblocked module");
        Ok(())
    }

    pub fn block_group_plugin(&self, reference: &str, group_id: &str) -> Result<Outcome, StoreError> {
        self.change_group_plugin(reference, group_id, false)
    }

    pub fn unblock_group_plugin(&self, reference: &str, group_id: &str) -> Result<Outcome, StoreError> {
        self.change_group_plugin(reference, group_id, true)
    }

    fn change_group_plugin(&self, reference: &str, group_id: &str, status: bool) -> Result<Outcome, StoreError> {
        let Some(plugin) = self.resolve(reference)? else {
            return Ok(Outcome::NotFound(PLUGIN_NOT_FOUND.to_string()));
        };

        let changed = if status {
            self.db.remove_override(group_id, &plugin.module, OverrideScope::Admin)?
        } else {
            self.db.ensure_group(group_id, self.clock.now())?;
            self.db.add_override(group_id, &plugin.module, OverrideScope::Admin)?
        };

        let status_str = on_off(status);
        if changed {
            tracing::info!(group_id, module = %plugin.module, status, "Changed group plugin");
            Ok(Outcome::Done(format!("Switched {} {} successfully!", plugin.name, status_str)))
        } else {
            Ok(Outcome::Unchanged(format!(
                "{} is already {}, no need to switch it {} again...",
                plugin.name, status_str, status_str
            )))
        }
    }

    /// Superuser disable. With a group, adds the superuser override for that
    /// group; without one, writes the global block type.
    pub fn superuser_block(
        &self,
        reference: &str,
        block_type: Option<BlockType>,
        group_id: Option<&str>,
    ) -> Result<Outcome, StoreError> {
        let Some(plugin) = self.resolve(reference)? else {
            return Ok(Outcome::NotFound(PLUGIN_NOT_FOUND.to_string()));
        };

        if let Some(group_id) = group_id {
            self.db.ensure_group(group_id, self.clock.now())?;
            if self.db.add_override(group_id, &plugin.module, OverrideScope::Superuser)? {
                tracing::info!(group_id, module = %plugin.module, "Superuser blocked plugin in group");
                return Ok(Outcome::Done(format!(
                    "Disabled {} for group {} successfully!",
                    plugin.name, group_id
                )));
            }
            return Ok(Outcome::Unchanged(
                "This plugin is already disabled by a superuser in this group...".to_string(),
            ));
        }

        self.db.set_plugin_block(plugin.id, block_type)?;
        tracing::info!(module = %plugin.module, block_type = ?block_type, "Superuser set global block");
        let message = match block_type {
            None => format!("{} is now enabled globally!", plugin.name),
            Some(BlockType::All) => format!("{} is now disabled globally!", plugin.name),
            Some(BlockType::Group) => format!("{} is now disabled in all groups!", plugin.name),
            Some(BlockType::Private) => format!("{} is now disabled in all private chats!", plugin.name),
        };
        Ok(Outcome::Done(message))
    }

    /// Superuser enable. With a group, removes the superuser override; without
    /// one, `block_type` is the block that remains after enabling.
    pub fn superuser_unblock(
        &self,
        reference: &str,
        block_type: Option<BlockType>,
        group_id: Option<&str>,
    ) -> Result<Outcome, StoreError> {
        let Some(plugin) = self.resolve(reference)? else {
            return Ok(Outcome::NotFound(PLUGIN_NOT_FOUND.to_string()));
        };

        if let Some(group_id) = group_id {
            if self.db.remove_override(group_id, &plugin.module, OverrideScope::Superuser)? {
                tracing::info!(group_id, module = %plugin.module, "Superuser unblocked plugin in group");
                return Ok(Outcome::Done(format!(
                    "Enabled {} for group {} successfully!",
                    plugin.name, group_id
                )));
            }
            return Ok(Outcome::Unchanged(
                "This plugin is already enabled by a superuser in this group...".to_string(),
            ));
        }

        self.db.set_plugin_block(plugin.id, block_type)?;
        tracing::info!(module = %plugin.module, block_type = ?block_type, "Superuser set global block");
        let message = match block_type {
            None | Some(BlockType::All) => format!("{} is now enabled globally!", plugin.name),
            Some(BlockType::Group) => format!("{} is now enabled in all groups!", plugin.name),
            Some(BlockType::Private) => format!("{} is now enabled in all private chats!", plugin.name),
        };
        Ok(Outcome::Done(message))
    }
}
