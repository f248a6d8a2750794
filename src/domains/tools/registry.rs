//! Tool Registry - name to handler mapping.
//!
//! The registry is populated once at process start and treated as read-only
//! while serving. When the startup sequence builds a fresh server instance
//! instead of reusing the one that owns the populated registry, the entries
//! are carried over with [`ToolRegistry::migrate_into`].
//!
//! Migration is a snapshot: handlers registered in the source afterwards are
//! not visible in the destination.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use rmcp::model::Tool;
use tracing::debug;

use super::{ToolError, ToolHandler};

/// Registry of all tools exposed by a server instance.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its own name.
    ///
    /// The registry is append-only: a second handler with the same name is
    /// rejected.
    pub fn register<H>(&mut self, handler: H) -> Result<(), ToolError>
    where
        H: ToolHandler + 'static,
    {
        self.register_arc(Arc::new(handler))
    }

    /// Register an already shared handler.
    pub fn register_arc(&mut self, handler: Arc<dyn ToolHandler>) -> Result<(), ToolError> {
        let name = handler.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ToolError::AlreadyRegistered(name));
        }
        debug!("Registered tool {}", name);
        self.tools.insert(name, handler);
        Ok(())
    }

    /// Look up a handler by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolHandler>> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// All tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Tool metadata for `tools/list`, sorted by name.
    pub fn tools(&self) -> Vec<Tool> {
        self.tools.values().map(|handler| handler.tool()).collect()
    }

    /// Copy every entry of this registry into `dest`.
    ///
    /// On a name collision the entry from `self` replaces the one in `dest`.
    /// Re-running against an already migrated destination leaves it
    /// unchanged. Returns the number of entries copied.
    pub fn migrate_into(&self, dest: &mut ToolRegistry) -> usize {
        for (name, handler) in &self.tools {
            if let Some(previous) = dest.tools.insert(name.clone(), Arc::clone(handler)) {
                if !Arc::ptr_eq(&previous, handler) {
                    debug!("Migration replaced existing tool {}", name);
                }
            }
        }
        debug!("Migrated {} tools", self.tools.len());
        self.tools.len()
    }
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}
