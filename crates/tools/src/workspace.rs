//! Workspace store — a per-session bounded filesystem view.
//!
//! Every path a tool touches is constructed as a [`SessionPath`], which
//! carries the workspace root alongside the requested relative path and
//! normalizes/confines it at construction time rather than leaving callers
//! to pass bare strings around and check them ad hoc.

use std::path::{Component, Path, PathBuf};

use eda_domain::error::{Error, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// A workspace-relative path, already confined to its session's root.
///
/// Construction is the only place confinement is checked: once a
/// `SessionPath` exists, every consumer can trust it resolves under its
/// workspace root.
#[derive(Debug, Clone)]
pub struct SessionPath {
    root: PathBuf,
    relative: PathBuf,
}

impl SessionPath {
    /// Build a confined path. Rejects absolute inputs, `..` components,
    /// and anything that normalizes outside `root`.
    pub fn new(root: impl Into<PathBuf>, requested: &str) -> Result<Self> {
        let root = root.into();
        let requested_path = Path::new(requested);
        if requested_path.is_absolute() {
            return Err(Error::WorkspacePathEscape(requested.to_owned()));
        }
        let mut normalized = PathBuf::new();
        for component in requested_path.components() {
            match component {
                Component::Normal(part) => normalized.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(Error::WorkspacePathEscape(requested.to_owned()));
                }
            }
        }
        Ok(Self {
            root,
            relative: normalized,
        })
    }

    pub fn absolute(&self) -> PathBuf {
        self.root.join(&self.relative)
    }

    pub fn relative(&self) -> &Path {
        &self.relative
    }
}

/// Semantic classification of a workspace file, derived from extension
/// and, for ambiguous extensions, a light content sniff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Spec,
    VerilogSource,
    Testbench,
    Waveform,
    SchematicSvg,
    LayoutSvg,
    Constraints,
    Report,
    SynthesisLog,
    Other,
}

pub fn classify(path: &Path) -> ArtifactKind {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        "yaml" | "yml" => ArtifactKind::Spec,
        "vcd" => ArtifactKind::Waveform,
        "sdc" => ArtifactKind::Constraints,
        "md" => ArtifactKind::Report,
        "log" => ArtifactKind::SynthesisLog,
        "svg" => {
            if name.contains("layout") || name.contains("gds") {
                ArtifactKind::LayoutSvg
            } else {
                ArtifactKind::SchematicSvg
            }
        }
        "v" | "sv" => {
            if name.ends_with("_tb.v") || name.ends_with("_tb.sv") || name.contains("testbench") {
                ArtifactKind::Testbench
            } else {
                ArtifactKind::VerilogSource
            }
        }
        _ => ArtifactKind::Other,
    }
}

/// A workspace entry returned by `list_files`.
#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceEntry {
    pub path: String,
    pub kind: ArtifactKind,
    pub size: u64,
    pub is_dir: bool,
}

/// One substring or line-range substitution applied by `edit_file`.
#[derive(Debug, Clone, Deserialize)]
pub struct Edit {
    pub anchor: String,
    pub replacement: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    CreateOrReplace,
    CreateExclusive,
}

/// A per-session bounded view of the filesystem.
pub struct WorkspaceStore {
    root: PathBuf,
    max_file_bytes: u64,
}

impl WorkspaceStore {
    pub fn new(root: impl Into<PathBuf>, max_file_bytes: u64) -> Self {
        Self {
            root: root.into(),
            max_file_bytes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, requested: &str) -> Result<SessionPath> {
        SessionPath::new(&self.root, requested)
    }

    pub async fn write_file(
        &self,
        requested: &str,
        content: &[u8],
        mode: WriteMode,
    ) -> Result<()> {
        let path = self.path(requested)?;
        if content.len() as u64 > self.max_file_bytes {
            return Err(Error::FileTooLarge {
                path: requested.to_owned(),
                size: content.len() as u64,
                cap: self.max_file_bytes,
            });
        }
        let abs = path.absolute();
        if mode == WriteMode::CreateExclusive && fs::try_exists(&abs).await.unwrap_or(false) {
            return Err(Error::Other(format!("'{requested}' already exists")));
        }
        if let Some(parent) = abs.parent() {
            fs::create_dir_all(parent).await.map_err(Error::Io)?;
        }
        let tmp = abs.with_extension(format!(
            "{}.tmp-{}",
            abs.extension().and_then(|e| e.to_str()).unwrap_or(""),
            uuid::Uuid::new_v4().as_simple()
        ));
        let mut file = fs::File::create(&tmp).await.map_err(Error::Io)?;
        file.write_all(content).await.map_err(Error::Io)?;
        file.flush().await.map_err(Error::Io)?;
        file.sync_data().await.map_err(Error::Io)?;
        drop(file);
        fs::rename(&tmp, &abs).await.map_err(Error::Io)?;
        tracing::debug!(path = requested, bytes = content.len(), "workspace file written");
        Ok(())
    }

    pub async fn read_file(&self, requested: &str) -> Result<Vec<u8>> {
        let path = self.path(requested)?;
        fs::read(path.absolute()).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound(requested.to_owned())
            } else {
                Error::Io(e)
            }
        })
    }

    pub async fn read_file_text(&self, requested: &str) -> Result<String> {
        let bytes = self.read_file(requested).await?;
        String::from_utf8(bytes).map_err(|e| Error::Other(e.to_string()))
    }

    /// Apply ordered substring substitutions and return a unified-diff
    /// summary. An empty edit list is a no-op and produces an empty diff.
    pub async fn edit_file(&self, requested: &str, edits: &[Edit]) -> Result<String> {
        if edits.is_empty() {
            return Ok(String::new());
        }
        let before = self.read_file_text(requested).await?;
        let mut after = before.clone();
        for edit in edits {
            if !after.contains(&edit.anchor) {
                return Err(Error::ConflictNotFound(edit.anchor.clone()));
            }
            after = after.replacen(&edit.anchor, &edit.replacement, 1);
        }
        self.write_file(requested, after.as_bytes(), WriteMode::CreateOrReplace)
            .await?;
        Ok(unified_diff(requested, &before, &after))
    }

    pub async fn list_files(&self, subdir: &str) -> Result<Vec<WorkspaceEntry>> {
        let path = self.path(subdir)?;
        let abs = path.absolute();
        if !fs::try_exists(&abs).await.unwrap_or(false) {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        let mut stack = vec![abs.clone()];
        while let Some(dir) = stack.pop() {
            let mut rd = fs::read_dir(&dir).await.map_err(Error::Io)?;
            while let Some(entry) = rd.next_entry().await.map_err(Error::Io)? {
                let meta = entry.metadata().await.map_err(Error::Io)?;
                let entry_path = entry.path();
                if meta.is_dir() {
                    stack.push(entry_path.clone());
                    continue;
                }
                let relative = entry_path
                    .strip_prefix(&self.root)
                    .unwrap_or(&entry_path)
                    .to_string_lossy()
                    .to_string();
                out.push(WorkspaceEntry {
                    path: relative,
                    kind: classify(&entry_path),
                    size: meta.len(),
                    is_dir: false,
                });
            }
        }
        out.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(out)
    }

    pub async fn delete_file(&self, requested: &str) -> Result<()> {
        let path = self.path(requested)?;
        fs::remove_file(path.absolute()).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound(requested.to_owned())
            } else {
                Error::Io(e)
            }
        })
    }

    pub async fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await.map_err(Error::Io)
    }
}

fn unified_diff(path: &str, before: &str, after: &str) -> String {
    let before_lines: Vec<&str> = before.lines().collect();
    let after_lines: Vec<&str> = after.lines().collect();
    let mut out = format!("--- {path}\n+++ {path}\n");
    let max = before_lines.len().max(after_lines.len());
    let mut changed = 0usize;
    for i in 0..max {
        let b = before_lines.get(i).copied();
        let a = after_lines.get(i).copied();
        if b != a {
            changed += 1;
            if let Some(b) = b {
                out.push_str(&format!("-{b}\n"));
            }
            if let Some(a) = a {
                out.push_str(&format!("+{a}\n"));
            }
        }
    }
    if changed == 0 {
        return String::new();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, WorkspaceStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = WorkspaceStore::new(dir.path(), 16 * 1024 * 1024);
        (dir, store)
    }

    #[tokio::test]
    async fn write_then_read_roundtrip() {
        let (_dir, store) = store();
        store
            .write_file("counter.v", b"module counter;", WriteMode::CreateOrReplace)
            .await
            .unwrap();
        let content = store.read_file_text("counter.v").await.unwrap();
        assert_eq!(content, "module counter;");
    }

    #[tokio::test]
    async fn path_escape_is_rejected() {
        let (_dir, store) = store();
        let err = store
            .write_file("../escape.v", b"x", WriteMode::CreateOrReplace)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::WorkspacePathEscape(_)));
    }

    #[tokio::test]
    async fn absolute_path_is_rejected() {
        let (_dir, store) = store();
        let err = store
            .write_file("/etc/passwd", b"x", WriteMode::CreateOrReplace)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::WorkspacePathEscape(_)));
    }

    #[tokio::test]
    async fn oversized_write_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = WorkspaceStore::new(dir.path(), 4);
        let err = store
            .write_file("big.v", b"way too big", WriteMode::CreateOrReplace)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::FileTooLarge { .. }));
    }

    #[tokio::test]
    async fn read_missing_file_is_not_found() {
        let (_dir, store) = store();
        let err = store.read_file_text("ghost.v").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn edit_file_empty_edits_is_noop() {
        let (_dir, store) = store();
        store
            .write_file("a.v", b"hello", WriteMode::CreateOrReplace)
            .await
            .unwrap();
        let diff = store.edit_file("a.v", &[]).await.unwrap();
        assert_eq!(diff, "");
        assert_eq!(store.read_file_text("a.v").await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn edit_file_missing_anchor_errors() {
        let (_dir, store) = store();
        store
            .write_file("a.v", b"hello", WriteMode::CreateOrReplace)
            .await
            .unwrap();
        let err = store
            .edit_file(
                "a.v",
                &[Edit {
                    anchor: "nope".into(),
                    replacement: "x".into(),
                }],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConflictNotFound(_)));
    }

    #[tokio::test]
    async fn edit_file_applies_substitution_and_diffs() {
        let (_dir, store) = store();
        store
            .write_file("a.v", b"reg [3:0] count <= 1;", WriteMode::CreateOrReplace)
            .await
            .unwrap();
        let diff = store
            .edit_file(
                "a.v",
                &[Edit {
                    anchor: "count <= 1".into(),
                    replacement: "count <= 0".into(),
                }],
            )
            .await
            .unwrap();
        assert!(diff.contains("-reg"));
        assert!(diff.contains("+reg"));
        assert_eq!(
            store.read_file_text("a.v").await.unwrap(),
            "reg [3:0] count <= 0;"
        );
    }

    #[tokio::test]
    async fn list_files_classifies_entries() {
        let (_dir, store) = store();
        store
            .write_file("spec.yaml", b"module: x", WriteMode::CreateOrReplace)
            .await
            .unwrap();
        store
            .write_file("counter.v", b"module counter;", WriteMode::CreateOrReplace)
            .await
            .unwrap();
        store
            .write_file("counter_tb.v", b"module counter_tb;", WriteMode::CreateOrReplace)
            .await
            .unwrap();
        let entries = store.list_files(".").await.unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries
            .iter()
            .any(|e| e.path == "spec.yaml" && e.kind == ArtifactKind::Spec));
        assert!(entries
            .iter()
            .any(|e| e.path == "counter_tb.v" && e.kind == ArtifactKind::Testbench));
    }

    #[tokio::test]
    async fn delete_file_removes_entry() {
        let (_dir, store) = store();
        store
            .write_file("a.v", b"x", WriteMode::CreateOrReplace)
            .await
            .unwrap();
        store.delete_file("a.v").await.unwrap();
        assert!(matches!(
            store.read_file_text("a.v").await.unwrap_err(),
            Error::NotFound(_)
        ));
    }
}
