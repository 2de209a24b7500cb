//! Artifact storage for the canvas agent.
//!
//! The agent edits a single artifact (usually `main.html`) through file
//! tools. Two stores are provided: an in-memory map (the default) and a
//! directory on disk.

use async_trait::async_trait;
use flowdeck_core::error::StoreError;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

/// File operations the canvas tools need.
#[async_trait]
pub trait ArtifactManager: Send + Sync {
    async fn read_file(&self, path: &str) -> Result<String, StoreError>;

    async fn write_file(&self, path: &str, content: &str) -> Result<(), StoreError>;

    /// List entries under `path`; directories end with `/` when not recursive.
    async fn list_files(&self, path: &str, recursive: bool) -> Result<Vec<String>, StoreError>;

    /// Search files under `path` for `regex`, optionally filtered by a file
    /// pattern such as `*.html`. See [`format_matches`] for the output shape.
    async fn search_files(
        &self,
        path: &str,
        regex: &str,
        file_pattern: Option<&str>,
    ) -> Result<String, StoreError>;
}

fn compile(regex: &str) -> Result<Regex, StoreError> {
    Regex::new(regex).map_err(|e| StoreError::InvalidPattern(e.to_string()))
}

/// Append every match of `re` in `content` as `\n<path>:<line>\n` followed by
/// two lines of context either side.
pub fn format_matches(out: &mut String, path: &str, content: &str, re: &Regex) {
    let lines: Vec<&str> = content.split('\n').collect();
    for m in re.find_iter(content) {
        let line = content[..m.start()].matches('\n').count();
        let start = line.saturating_sub(2);
        let end = (line + 3).min(lines.len());
        out.push_str(&format!("\n{path}:{}\n", line + 1));
        out.push_str(&lines[start..end].join("\n"));
        out.push('\n');
    }
}

fn finish_search(results: String) -> String {
    let trimmed = results.trim();
    if trimmed.is_empty() {
        "no matches found".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Artifacts kept in a map of path to content.
#[derive(Default)]
pub struct InMemoryArtifactManager {
    files: RwLock<BTreeMap<String, String>>,
}

impl InMemoryArtifactManager {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArtifactManager for InMemoryArtifactManager {
    async fn read_file(&self, path: &str) -> Result<String, StoreError> {
        self.files
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("File not found: {path}")))
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<(), StoreError> {
        debug!(path, bytes = content.len(), "Writing in-memory artifact");
        self.files
            .write()
            .await
            .insert(path.to_string(), content.to_string());
        Ok(())
    }

    async fn list_files(&self, path: &str, recursive: bool) -> Result<Vec<String>, StoreError> {
        let files = self.files.read().await;
        if path.is_empty() || path == "/" {
            return Ok(files.keys().cloned().collect());
        }

        let prefix = format!("{path}/");
        let nested = files.keys().filter(|p| p.starts_with(&prefix));
        if recursive {
            return Ok(nested.cloned().collect());
        }

        let top_level: BTreeSet<String> = nested
            .map(|p| match p[prefix.len()..].split_once('/') {
                Some((dir, _)) => format!("{dir}/"),
                None => p[prefix.len()..].to_string(),
            })
            .collect();
        Ok(top_level.into_iter().collect())
    }

    async fn search_files(
        &self,
        path: &str,
        regex: &str,
        file_pattern: Option<&str>,
    ) -> Result<String, StoreError> {
        let re = compile(regex)?;
        let suffix = file_pattern.map(|p| p.replacen('*', "", 1));
        let mut results = String::new();

        for (file_path, content) in self.files.read().await.iter() {
            if !file_path.starts_with(path) {
                continue;
            }
            if let Some(suffix) = &suffix
                && !file_path.ends_with(suffix.as_str())
            {
                continue;
            }
            format_matches(&mut results, file_path, content, &re);
        }
        Ok(finish_search(results))
    }
}

/// Artifacts stored under a root directory on disk.
pub struct FileSystemArtifactManager {
    root: PathBuf,
}

impl FileSystemArtifactManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative artifact path under the root. A leading `/` is
    /// treated as the root itself; `..` may not climb above it.
    fn resolve(&self, path: &str) -> Result<PathBuf, StoreError> {
        let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
        for component in Path::new(path).components() {
            match component {
                Component::Normal(p) => parts.push(p),
                Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
                Component::ParentDir => {
                    if parts.pop().is_none() {
                        return Err(StoreError::PathEscape(path.to_string()));
                    }
                }
            }
        }
        Ok(parts.iter().fold(self.root.clone(), |acc, p| acc.join(p)))
    }

    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    async fn walk(&self, dir: &Path, out: &mut Vec<String>) -> Result<(), StoreError> {
        let mut stack = vec![dir.to_path_buf()];
        while let Some(current) = stack.pop() {
            let mut entries = tokio::fs::read_dir(&current)
                .await
                .map_err(|e| StoreError::Storage(format!("{}: {e}", current.display())))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| StoreError::Storage(e.to_string()))?
            {
                let path = entry.path();
                let rel = path.strip_prefix(dir).unwrap_or(&path).to_string_lossy().replace('\\', "/");
                if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                    out.push(format!("{rel}/"));
                    stack.push(path);
                } else {
                    out.push(rel);
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ArtifactManager for FileSystemArtifactManager {
    async fn read_file(&self, path: &str) -> Result<String, StoreError> {
        let full = self.resolve(path)?;
        tokio::fs::read_to_string(&full).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StoreError::NotFound(format!("File not found: {path}")),
            _ => StoreError::Storage(format!("{path}: {e}")),
        })
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<(), StoreError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Storage(format!("Failed to create directory: {e}")))?;
        }
        debug!(path = %full.display(), bytes = content.len(), "Writing artifact");
        tokio::fs::write(&full, content)
            .await
            .map_err(|e| StoreError::Storage(format!("{path}: {e}")))
    }

    async fn list_files(&self, path: &str, recursive: bool) -> Result<Vec<String>, StoreError> {
        let dir = self.resolve(path)?;
        let mut out = Vec::new();

        if recursive {
            self.walk(&dir, &mut out).await?;
        } else {
            let mut entries = tokio::fs::read_dir(&dir)
                .await
                .map_err(|e| StoreError::Storage(format!("{path}: {e}")))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| StoreError::Storage(e.to_string()))?
            {
                let name = entry.file_name().to_string_lossy().to_string();
                if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                    out.push(format!("{name}/"));
                } else {
                    out.push(name);
                }
            }
        }

        out.sort();
        Ok(out)
    }

    async fn search_files(
        &self,
        path: &str,
        regex: &str,
        file_pattern: Option<&str>,
    ) -> Result<String, StoreError> {
        let re = compile(regex)?;
        let dir = self.resolve(path)?;
        let pattern = format!(
            "{}/**/{}",
            glob::Pattern::escape(&dir.to_string_lossy()),
            file_pattern.unwrap_or("*")
        );

        let paths = glob::glob(&pattern).map_err(|e| StoreError::InvalidPattern(e.to_string()))?;
        let mut results = String::new();

        for file in paths.flatten().filter(|p| p.is_file()) {
            // Unreadable or binary files are skipped
            let Ok(content) = tokio::fs::read_to_string(&file).await else {
                continue;
            };
            format_matches(&mut results, &self.relative(&file), &content, &re);
        }
        Ok(finish_search(results))
    }
}
