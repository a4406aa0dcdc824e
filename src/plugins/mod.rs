//! Plugin hooks — ordered interceptors around data operations.
//!
//! A plugin implements [`VaultPlugin`]; every hook has a no-op default,
//! so a plugin only writes the hooks it cares about.  Hooks run in
//! registration order.
//!
//! `before_*` hooks can veto: the first [`HookDecision::Veto`] aborts
//! the operation with `PluginRejected` and short-circuits the remaining
//! plugins.  `after_*` hooks are side-effect only — they run after the
//! mutation is durably persisted, and an error from one is logged and
//! swallowed, never propagated to the caller.

use serde_json::Value;

use crate::errors::{Result, VaultError};

/// Outcome of a `before_*` hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookDecision {
    Allow,
    Veto(String),
}

/// Capability interface for vault interceptors.  All hooks optional.
pub trait VaultPlugin {
    /// Stable name, used in rejection errors and logs.
    fn name(&self) -> &str;

    fn before_read(&self, _key: &str) -> HookDecision {
        HookDecision::Allow
    }

    fn before_write(&self, _key: &str, _value: &Value) -> HookDecision {
        HookDecision::Allow
    }

    fn before_delete(&self, _key: &str) -> HookDecision {
        HookDecision::Allow
    }

    /// Runs after a write is durably persisted.
    fn after_write(&self, _key: &str, _value: &Value) -> Result<()> {
        Ok(())
    }

    /// Runs after a delete is durably persisted.
    fn after_delete(&self, _key: &str) -> Result<()> {
        Ok(())
    }
}

/// Registration-ordered plugin dispatcher.
#[derive(Default)]
pub struct PluginHooks {
    plugins: Vec<Box<dyn VaultPlugin>>,
}

impl PluginHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: Box<dyn VaultPlugin>) {
        self.plugins.push(plugin);
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn before_read(&self, key: &str) -> Result<()> {
        self.check(|p| p.before_read(key))
    }

    pub fn before_write(&self, key: &str, value: &Value) -> Result<()> {
        self.check(|p| p.before_write(key, value))
    }

    pub fn before_delete(&self, key: &str) -> Result<()> {
        self.check(|p| p.before_delete(key))
    }

    pub fn after_write(&self, key: &str, value: &Value) {
        for plugin in &self.plugins {
            if let Err(err) = plugin.after_write(key, value) {
                tracing::warn!(plugin = plugin.name(), error = %err, "after_write hook failed");
            }
        }
    }

    pub fn after_delete(&self, key: &str) {
        for plugin in &self.plugins {
            if let Err(err) = plugin.after_delete(key) {
                tracing::warn!(plugin = plugin.name(), error = %err, "after_delete hook failed");
            }
        }
    }

    /// First veto wins; remaining plugins are not consulted.
    fn check(&self, hook: impl Fn(&dyn VaultPlugin) -> HookDecision) -> Result<()> {
        for plugin in &self.plugins {
            if let HookDecision::Veto(reason) = hook(plugin.as_ref()) {
                return Err(VaultError::PluginRejected {
                    plugin: plugin.name().to_string(),
                    reason,
                });
            }
        }
        Ok(())
    }
}
