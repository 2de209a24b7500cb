//! Tool implementations for Flowdeck flows.
//!
//! Tools give a flow's model the ability to act: look up the (canned)
//! weather, convert temperatures, search the menu index, ask the user a
//! question, and read and patch the canvas artifact.

pub mod artifacts;
pub mod canvas;
pub mod menu;
pub mod research;
pub mod temperature;
pub mod weather;

use flowdeck_config::{CanvasConfig, StorageKind};
use flowdeck_core::document::Retriever;
use flowdeck_core::error::ToolError;
use flowdeck_core::tool::ToolRegistry;
use std::sync::Arc;

pub use artifacts::{ArtifactManager, FileSystemArtifactManager, InMemoryArtifactManager};

/// Tool names the canvas agent may call.
pub const CANVAS_AGENT_TOOLS: [&str; 4] = [
    "find_and_replace",
    "read_file",
    "write_to_file",
    "open_file_preview",
];

/// Read a required string field from tool input.
pub(crate) fn required_str<'a>(
    tool: &str,
    input: &'a serde_json::Value,
    key: &str,
) -> Result<&'a str, ToolError> {
    input[key]
        .as_str()
        .ok_or_else(|| ToolError::InvalidArguments(format!("{tool}: missing '{key}' argument")))
}

/// Register the stateless demo tools.
pub fn register_demo_tools(registry: &mut ToolRegistry) {
    registry.register(Arc::new(weather::GetWeatherTool));
    registry.register(Arc::new(temperature::ConvertTemperatureTool));
    registry.register(Arc::new(research::SearchWebTool));
    registry.register(Arc::new(research::AskUserTool));
}

/// Register the canvas file tools over one artifact store.
pub fn register_canvas_tools(registry: &mut ToolRegistry, manager: Arc<dyn ArtifactManager>) {
    registry.register(Arc::new(canvas::FindAndReplaceTool::new(manager.clone())));
    registry.register(Arc::new(canvas::ReadFileTool::new(manager.clone())));
    registry.register(Arc::new(canvas::WriteToFileTool::new(manager.clone())));
    registry.register(Arc::new(canvas::ListFilesTool::new(manager.clone())));
    registry.register(Arc::new(canvas::SearchFilesTool::new(manager)));
    registry.register(Arc::new(canvas::OpenFilePreviewTool));
}

/// Build a registry holding every tool.
pub fn default_registry(
    menu_retriever: Arc<dyn Retriever>,
    retriever_k: usize,
    artifacts: Arc<dyn ArtifactManager>,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    register_demo_tools(&mut registry);
    registry.register(Arc::new(menu::MenuRagTool::new(menu_retriever, retriever_k)));
    register_canvas_tools(&mut registry, artifacts);
    registry
}

/// Create the artifact store selected in config.
pub fn artifact_manager_from_config(config: &CanvasConfig) -> Arc<dyn ArtifactManager> {
    match (config.storage, &config.root_dir) {
        (StorageKind::Filesystem, Some(root)) => {
            tracing::info!(root = %root.display(), "Canvas artifacts stored on disk");
            Arc::new(FileSystemArtifactManager::new(root.clone()))
        }
        _ => Arc::new(InMemoryArtifactManager::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowdeck_core::document::Document;
    use flowdeck_core::error::StoreError;

    struct NoDocs;

    #[async_trait::async_trait]
    impl Retriever for NoDocs {
        fn name(&self) -> &str {
            "none"
        }
        async fn retrieve(&self, _q: &str, _k: usize) -> Result<Vec<Document>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn default_registry_has_all_tools() {
        let registry = default_registry(Arc::new(NoDocs), 3, Arc::new(InMemoryArtifactManager::new()));
        assert_eq!(
            registry.names(),
            vec![
                "askUser",
                "convertTemperature",
                "find_and_replace",
                "getWeather",
                "list_files",
                "menuRagTool",
                "open_file_preview",
                "read_file",
                "searchWeb",
                "search_files",
                "write_to_file",
            ]
        );
        assert!(registry.definitions_for(&CANVAS_AGENT_TOOLS).is_ok());
    }

    #[test]
    fn required_str_reports_key() {
        let err = required_str("getWeather", &serde_json::json!({}), "location").unwrap_err();
        assert!(err.to_string().contains("location"));
    }
}
