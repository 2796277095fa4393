//! Tool registry — the single source of truth for every callable tool.
//!
//! Every tool is declared once, at startup, as an entry in an explicit
//! table: name, category, JSON-schema literal, and a handler function
//! pointer. Schema export and the filtered views below are pure functions
//! over that table; nothing here depends on process-wide mutable state or
//! on scanning/macro-driven discovery.

use std::collections::HashMap;
use std::sync::Arc;

use eda_domain::tool::{ToolCategory, ToolDefinition};
use serde::{Deserialize, Serialize};

use crate::executor::{HandlerFn, ToolContext};

/// One entry in the registry table.
#[derive(Clone)]
pub struct ToolEntry {
    pub definition: ToolDefinition,
    pub handler: HandlerFn,
}

/// Tool-visibility filter. Mirrors `eda_domain::config::ToolFilterMode`
/// but carries the resolved category set for `Custom` rather than raw
/// strings, so the registry never has to re-parse configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ToolFilter {
    All,
    Essential,
    Custom { categories: Vec<ToolCategory> },
}

impl Default for ToolFilter {
    fn default() -> Self {
        ToolFilter::All
    }
}

/// Tools always visible regardless of filter mode (session management).
const ALWAYS_VISIBLE: &[&str] = &[
    "create_session",
    "list_sessions",
    "set_active_session",
    "get_current_session",
    "delete_session",
    "configure_tool_filter",
];

/// Fixed allow-list for `essential` mode: the minimum workflow subset.
const ESSENTIAL_TOOLS: &[&str] = &[
    "write_spec",
    "read_spec",
    "write_file",
    "read_file",
    "list_files_tool",
    "linter_tool",
    "simulation_tool",
];

/// Explicit, in-process table of every callable tool.
pub struct ToolRegistry {
    entries: HashMap<String, ToolEntry>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register one tool. Panics on a duplicate name: a collision is a
    /// programming error in the catalog, not a runtime condition.
    pub fn register(&mut self, definition: ToolDefinition, handler: HandlerFn) {
        let name = definition.name.clone();
        if self.entries.contains_key(&name) {
            panic!("tool '{name}' registered twice");
        }
        self.order.push(name.clone());
        self.entries.insert(name, ToolEntry { definition, handler });
    }

    pub fn get(&self, name: &str) -> Option<&ToolEntry> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All tool definitions, in registration order. Feeds the unfiltered
    /// MCP `tools/list` response and the admin/introspection surface.
    pub fn all_definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.entries.get(name))
            .map(|e| e.definition.clone())
            .collect()
    }

    /// The schema export canonical shape: every definition's
    /// `(name, description, parameters, category)`, which is exactly what
    /// `ToolDefinition` already carries — this exists as a named seam so
    /// callers don't reach into `all_definitions` and assume shape.
    pub fn schema_export(&self) -> Vec<ToolDefinition> {
        self.all_definitions()
    }

    /// Tool definitions visible under `filter`, always including the
    /// session-management tools.
    pub fn filtered(&self, filter: &ToolFilter) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.entries.get(name))
            .filter(|e| Self::visible(&e.definition, filter))
            .map(|e| e.definition.clone())
            .collect()
    }

    fn visible(def: &ToolDefinition, filter: &ToolFilter) -> bool {
        if ALWAYS_VISIBLE.contains(&def.name.as_str()) {
            return true;
        }
        match filter {
            ToolFilter::All => true,
            ToolFilter::Essential => ESSENTIAL_TOOLS.contains(&def.name.as_str()),
            ToolFilter::Custom { categories } => categories.contains(&def.category),
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the registry populated with the full EDA tool catalog, wired
/// against the shared tool context (workspace store, session store, job
/// supervisor). One call site, at startup.
pub fn build_registry(ctx: Arc<ToolContext>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    crate::catalog::register_all(&mut registry, ctx);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use eda_domain::tool::ToolCategory;

    fn dummy_def(name: &str, category: ToolCategory) -> ToolDefinition {
        ToolDefinition {
            name: name.to_string(),
            description: "test".into(),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
            category,
        }
    }

    fn dummy_handler() -> HandlerFn {
        Arc::new(|_ctx, _args| Box::pin(async { Ok("ok".to_string()) }))
    }

    #[test]
    #[should_panic(expected = "registered twice")]
    fn duplicate_registration_panics() {
        let mut r = ToolRegistry::new();
        r.register(dummy_def("write_file", ToolCategory::Essential), dummy_handler());
        r.register(dummy_def("write_file", ToolCategory::Essential), dummy_handler());
    }

    #[test]
    fn essential_filter_excludes_non_essential_tools() {
        let mut r = ToolRegistry::new();
        r.register(dummy_def("write_file", ToolCategory::Essential), dummy_handler());
        r.register(dummy_def("schematic_tool", ToolCategory::Synthesis), dummy_handler());
        let visible = r.filtered(&ToolFilter::Essential);
        let names: Vec<_> = visible.iter().map(|d| d.name.as_str()).collect();
        assert!(names.contains(&"write_file"));
        assert!(!names.contains(&"schematic_tool"));
    }

    #[test]
    fn session_tools_always_visible() {
        let mut r = ToolRegistry::new();
        r.register(dummy_def("create_session", ToolCategory::Session), dummy_handler());
        r.register(dummy_def("schematic_tool", ToolCategory::Synthesis), dummy_handler());
        let visible = r.filtered(&ToolFilter::Essential);
        let names: Vec<_> = visible.iter().map(|d| d.name.as_str()).collect();
        assert!(names.contains(&"create_session"));
        assert!(!names.contains(&"schematic_tool"));
    }

    #[test]
    fn custom_filter_matches_category_union() {
        let mut r = ToolRegistry::new();
        r.register(dummy_def("schematic_tool", ToolCategory::Synthesis), dummy_handler());
        r.register(dummy_def("waveform_tool", ToolCategory::Verification), dummy_handler());
        let visible = r.filtered(&ToolFilter::Custom {
            categories: vec![ToolCategory::Synthesis],
        });
        let names: Vec<_> = visible.iter().map(|d| d.name.as_str()).collect();
        assert!(names.contains(&"schematic_tool"));
        assert!(!names.contains(&"waveform_tool"));
    }

    #[test]
    fn all_filter_includes_everything() {
        let mut r = ToolRegistry::new();
        r.register(dummy_def("a", ToolCategory::Essential), dummy_handler());
        r.register(dummy_def("b", ToolCategory::Synthesis), dummy_handler());
        assert_eq!(r.filtered(&ToolFilter::All).len(), 2);
    }
}
