//! File tools the canvas agent uses to build and patch its artifact.
//!
//! Failures are reported back to the model as plain text results rather
//! than tool errors, so the model can read them and correct itself.

use async_trait::async_trait;
use flowdeck_core::error::ToolError;
use flowdeck_core::tool::{Tool, ToolContext};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::artifacts::ArtifactManager;
use crate::required_str;

const SEARCH_MARKER: &str = "------- SEARCH";
const DIVIDER: &str = "=======";
const REPLACE_MARKER: &str = "+++++++ REPLACE";

/// One parsed SEARCH/REPLACE block.
#[derive(Debug, PartialEq)]
pub struct ReplaceBlock {
    pub search: String,
    pub replace: String,
}

/// Outcome of applying a diff to some content.
#[derive(Debug, PartialEq)]
pub enum PatchOutcome {
    Changed(String),
    Unchanged,
    /// 1-based index of the block whose search text was not found
    SearchNotFound { block: usize, search: String },
}

/// Split a diff into SEARCH/REPLACE blocks. Text before the first
/// `------- SEARCH` marker is ignored.
pub fn parse_diff(diff: &str) -> Result<Vec<ReplaceBlock>, String> {
    diff.split(SEARCH_MARKER)
        .skip(1)
        .enumerate()
        .map(|(i, block)| {
            let (search, rest) = block
                .split_once(DIVIDER)
                .ok_or_else(|| format!("block {} is missing '{DIVIDER}'", i + 1))?;
            let replace = rest.split(REPLACE_MARKER).next().unwrap_or_default();
            Ok(ReplaceBlock {
                search: search.trim().to_string(),
                replace: replace.trim().to_string(),
            })
        })
        .collect()
}

/// Apply blocks in order, each replacing the first occurrence of its search text.
pub fn apply_blocks(content: &str, blocks: &[ReplaceBlock]) -> PatchOutcome {
    let mut patched = content.to_string();
    for (i, block) in blocks.iter().enumerate() {
        if !patched.contains(&block.search) {
            return PatchOutcome::SearchNotFound {
                block: i + 1,
                search: block.search.clone(),
            };
        }
        patched = patched.replacen(&block.search, &block.replace, 1);
    }

    if patched == content {
        PatchOutcome::Unchanged
    } else {
        PatchOutcome::Changed(patched)
    }
}

const FIND_AND_REPLACE_DIFF_HELP: &str = r#"Use one or more SEARCH/REPLACE blocks to specify the changes.
```
------- SEARCH
[The exact lines of code to find]
=======
[The new lines of code to replace them with]
+++++++ REPLACE
```
Guidelines:
* Exact matches only: the SEARCH text must match the file character for character, including indentation and whitespace.
* Each block replaces only the first occurrence of its SEARCH text. Use several blocks for several changes, ordered as they appear in the file.
* To insert code, search for a neighbouring line and repeat it in the REPLACE text along with the new code.
* To delete code, leave the REPLACE section empty.
* To move code, delete it with one block and insert it with another."#;

pub struct FindAndReplaceTool {
    manager: Arc<dyn ArtifactManager>,
}

impl FindAndReplaceTool {
    pub fn new(manager: Arc<dyn ArtifactManager>) -> Self {
        Self { manager }
    }

    async fn run(&self, path: &str, diff: &str) -> Result<String, String> {
        let content = self.manager.read_file(path).await.map_err(|e| e.to_string())?;
        let blocks = parse_diff(diff)?;

        match apply_blocks(&content, &blocks) {
            PatchOutcome::SearchNotFound { block, search } => {
                Ok(format!("failed to find search term in block {block}: \n{search}"))
            }
            PatchOutcome::Unchanged => Ok(format!("no changes made to {path}")),
            PatchOutcome::Changed(patched) => {
                self.manager
                    .write_file(path, &patched)
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(format!("successfully completed find_and_replace in {path}"))
            }
        }
    }
}

#[async_trait]
impl Tool for FindAndReplaceTool {
    fn name(&self) -> &str {
        "find_and_replace"
    }

    fn description(&self) -> &str {
        "Performs a search and replace operation on a file. This tool is used to make targeted modifications to existing files. You can specify one or more blocks of text to find and replace. This is the preferred tool for making small changes to large files, as it avoids having to rewrite the entire file."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The path of the file to modify"
                },
                "diff": {
                    "type": "string",
                    "description": FIND_AND_REPLACE_DIFF_HELP
                }
            },
            "required": ["path", "diff"]
        })
    }

    async fn execute(&self, _ctx: &ToolContext, input: Value) -> Result<Value, ToolError> {
        let path = required_str(self.name(), &input, "path")?;
        let diff = required_str(self.name(), &input, "diff")?;

        let text = self.run(path, diff).await.unwrap_or_else(|reason| {
            format!("failed to complete find_and_replace in {path}: {reason}")
        });
        tracing::debug!(path, result = %text, "find_and_replace");
        Ok(json!(text))
    }
}

pub struct ReadFileTool {
    manager: Arc<dyn ArtifactManager>,
}

impl ReadFileTool {
    pub fn new(manager: Arc<dyn ArtifactManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Reads the entire content of a file at a given path. Use this to inspect the current artifact before changing it. This tool is not for directory listings; use `list_files` for that."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "The path of the file to read" }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, _ctx: &ToolContext, input: Value) -> Result<Value, ToolError> {
        let path = required_str(self.name(), &input, "path")?;
        let text = match self.manager.read_file(path).await {
            Ok(content) => content,
            Err(e) => format!("failed to read file {path}: {e}"),
        };
        Ok(json!(text))
    }
}

pub struct WriteToFileTool {
    manager: Arc<dyn ArtifactManager>,
}

impl WriteToFileTool {
    pub fn new(manager: Arc<dyn ArtifactManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Tool for WriteToFileTool {
    fn name(&self) -> &str {
        "write_to_file"
    }

    fn description(&self) -> &str {
        "Writes content to a file. This will create the file if it doesn't exist, or completely overwrite it if it does. Any necessary parent directories will be created automatically."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "The path of the file to write to" },
                "content": {
                    "type": "string",
                    "description": "The COMPLETE intended content of the file, without truncation or omissions."
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, _ctx: &ToolContext, input: Value) -> Result<Value, ToolError> {
        let path = required_str(self.name(), &input, "path")?;
        let content = required_str(self.name(), &input, "content")?;
        let text = match self.manager.write_file(path, content).await {
            Ok(()) => format!("successfully wrote to {path}"),
            Err(e) => format!("failed to write to {path}: {e}"),
        };
        Ok(json!(text))
    }
}

pub struct ListFilesTool {
    manager: Arc<dyn ArtifactManager>,
}

impl ListFilesTool {
    pub fn new(manager: Arc<dyn ArtifactManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "Lists the files and subdirectories within a specified directory, either recursively or just the top level."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "The directory to list" },
                "recursive": {
                    "type": "boolean",
                    "description": "Whether to list files recursively"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, _ctx: &ToolContext, input: Value) -> Result<Value, ToolError> {
        let path = required_str(self.name(), &input, "path")?;
        let recursive = input["recursive"].as_bool().unwrap_or(false);
        let text = match self.manager.list_files(path, recursive).await {
            Ok(files) => files.join("\n"),
            Err(e) => format!("failed to list files in {path}: {e}"),
        };
        Ok(json!(text))
    }
}

pub struct SearchFilesTool {
    manager: Arc<dyn ArtifactManager>,
}

impl SearchFilesTool {
    pub fn new(manager: Arc<dyn ArtifactManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Tool for SearchFilesTool {
    fn name(&self) -> &str {
        "search_files"
    }

    fn description(&self) -> &str {
        "Searches for a regex pattern within files in a given directory. It returns the matching lines along with surrounding lines for context."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The directory to search in, recursively"
                },
                "regex": {
                    "type": "string",
                    "description": "The regular expression pattern to search for. Uses Rust regex syntax."
                },
                "file_pattern": {
                    "type": "string",
                    "description": "Glob pattern to filter files (e.g., '*.html'). Defaults to all files."
                }
            },
            "required": ["path", "regex"]
        })
    }

    async fn execute(&self, _ctx: &ToolContext, input: Value) -> Result<Value, ToolError> {
        let path = required_str(self.name(), &input, "path")?;
        let regex = required_str(self.name(), &input, "regex")?;
        let file_pattern = input["file_pattern"].as_str();
        let text = match self.manager.search_files(path, regex, file_pattern).await {
            Ok(results) => results,
            Err(e) => format!("failed to search files: {e}"),
        };
        Ok(json!(text))
    }
}

/// Tells the UI to reload its preview of a file.
pub struct OpenFilePreviewTool;

#[async_trait]
impl Tool for OpenFilePreviewTool {
    fn name(&self) -> &str {
        "open_file_preview"
    }

    fn description(&self) -> &str {
        "used to signal to the UI that the file has been created or edited and needs to be opened or reloaded in the preview"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "path": { "type": "string", "description": "file path" } },
            "required": ["path"]
        })
    }

    async fn execute(&self, _ctx: &ToolContext, _input: Value) -> Result<Value, ToolError> {
        Ok(json!("done"))
    }
}
