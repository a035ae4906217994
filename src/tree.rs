// src/tree.rs

//! Directory listing and single-document reads.
//!
//! The listing applies the same [`IgnoreSet`] as the watcher, so what the
//! client sees and what triggers reloads stay in agreement.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::ignore::IgnoreSet;

/// Extension (without the dot) of the served document type.
pub const DOCUMENT_EXTENSION: &str = "md";

/// Whether a path names a served document, by case-insensitive extension.
pub fn is_document(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(DOCUMENT_EXTENSION))
}

/// One entry in the document listing.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileNode {
    /// Path relative to the document root.
    pub path: String,
    /// Base name of the entry.
    pub name: String,
    /// Whether the entry is a directory.
    pub is_dir: bool,
    /// Child entries, for directories.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FileNode>,
}

/// Builds the nested document listing for `root`.
///
/// Only documents and directories that transitively contain at least one
/// document are included. Entries are sorted by name so the payload is
/// stable across platforms. Failing to enumerate the root is an error;
/// failures inside a subdirectory just prune that subtree.
pub fn build_tree(root: &Path, ignore: &IgnoreSet) -> io::Result<Vec<FileNode>> {
    build_subtree(root, root, ignore)
}

fn build_subtree(root: &Path, dir: &Path, ignore: &IgnoreSet) -> io::Result<Vec<FileNode>> {
    let mut entries: Vec<fs::DirEntry> = fs::read_dir(dir)?.filter_map(Result::ok).collect();
    entries.sort_by_key(|entry| entry.file_name());

    let mut nodes = Vec::new();
    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        if ignore.should_ignore(&name) {
            continue;
        }
        let full = entry.path();
        let relative = full
            .strip_prefix(root)
            .unwrap_or(&full)
            .to_string_lossy()
            .into_owned();
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);

        if is_dir {
            let children = build_subtree(root, &full, ignore).unwrap_or_default();
            if !children.is_empty() {
                nodes.push(FileNode {
                    path: relative,
                    name,
                    is_dir: true,
                    children,
                });
            }
        } else if is_document(&full) {
            nodes.push(FileNode {
                path: relative,
                name,
                is_dir: false,
                children: Vec::new(),
            });
        }
    }
    Ok(nodes)
}

/// Why a document read was refused or failed.
#[derive(Debug, Error)]
pub enum DocError {
    #[error("document path required")]
    EmptyPath,
    #[error("invalid document path")]
    OutsideRoot,
    #[error("only markdown documents may be read")]
    NotADocument,
    #[error("document not found")]
    NotFound,
    #[error("error reading document: {0}")]
    Io(#[from] io::Error),
}

/// Reads the raw bytes of the document at `relative` under `root`.
///
/// The requested path is normalized lexically and checked against the root
/// before any filesystem access, so traversal attempts are rejected without
/// touching the disk.
pub fn read_document(root: &Path, relative: &str) -> Result<Vec<u8>, DocError> {
    if relative.is_empty() {
        return Err(DocError::EmptyPath);
    }
    let root = normalize(root);
    let requested = normalize(&root.join(relative));
    if !requested.starts_with(&root) {
        return Err(DocError::OutsideRoot);
    }
    if !is_document(&requested) {
        return Err(DocError::NotADocument);
    }
    match fs::read(&requested) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(DocError::NotFound),
        Err(e) => Err(DocError::Io(e)),
    }
}

/// Lexically resolves `.` and `..` components without touching the
/// filesystem. `..` at the root is dropped, matching path-clean semantics.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(path: &Path, contents: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        File::create(path)
            .expect("create file")
            .write_all(contents.as_bytes())
            .expect("write file");
    }

    #[test]
    fn is_document_matches_extension_case_insensitively() {
        assert!(is_document(Path::new("a.md")));
        assert!(is_document(Path::new("A.MD")));
        assert!(!is_document(Path::new("a.txt")));
        assert!(!is_document(Path::new("md")));
        assert!(!is_document(Path::new("a.md.bak")));
    }

    #[test]
    fn tree_lists_documents_and_skips_ignored_directories() {
        let tmp = TempDir::new().expect("temp dir");
        let root = tmp.path();
        write_file(&root.join("a.md"), "# a");
        write_file(&root.join("node_modules/b.md"), "# hidden");
        write_file(&root.join(".cache/c.md"), "# hidden");

        let nodes = build_tree(root, &IgnoreSet::default()).expect("build tree");
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].name, "a.md");
        assert!(!nodes[0].is_dir);
    }

    #[test]
    fn tree_excludes_directories_without_documents() {
        let tmp = TempDir::new().expect("temp dir");
        let root = tmp.path();
        write_file(&root.join("notes/deep/keep.md"), "# keep");
        write_file(&root.join("images/photo.png"), "");
        write_file(&root.join("readme.txt"), "plain");

        let nodes = build_tree(root, &IgnoreSet::default()).expect("build tree");
        assert_eq!(nodes.len(), 1);
        let notes = &nodes[0];
        assert_eq!(notes.name, "notes");
        assert!(notes.is_dir);
        assert_eq!(notes.children.len(), 1);
        let deep = &notes.children[0];
        assert!(deep.is_dir);
        assert_eq!(deep.children[0].name, "keep.md");
        assert_eq!(
            deep.children[0].path,
            Path::new("notes").join("deep").join("keep.md").to_string_lossy()
        );
    }

    #[test]
    fn tree_entries_are_sorted_by_name() {
        let tmp = TempDir::new().expect("temp dir");
        let root = tmp.path();
        for name in ["zebra.md", "apple.md", "mango.md"] {
            write_file(&root.join(name), "#");
        }
        let nodes = build_tree(root, &IgnoreSet::default()).expect("build tree");
        let names: Vec<&str> = nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["apple.md", "mango.md", "zebra.md"]);
    }

    #[test]
    fn tree_serializes_with_camel_case_keys() {
        let node = FileNode {
            path: "a.md".into(),
            name: "a.md".into(),
            is_dir: false,
            children: Vec::new(),
        };
        let json = serde_json::to_string(&node).expect("serialize");
        assert!(json.contains("\"isDir\":false"));
        assert!(!json.contains("children"));
    }

    #[test]
    fn read_rejects_traversal_before_any_file_access() {
        let tmp = TempDir::new().expect("temp dir");
        let err = read_document(tmp.path(), "../../etc/passwd").expect_err("must be rejected");
        assert!(matches!(err, DocError::OutsideRoot));
    }

    #[test]
    fn read_rejects_non_documents_and_empty_paths() {
        let tmp = TempDir::new().expect("temp dir");
        write_file(&tmp.path().join("notes.txt"), "plain");
        assert!(matches!(
            read_document(tmp.path(), "notes.txt"),
            Err(DocError::NotADocument)
        ));
        assert!(matches!(
            read_document(tmp.path(), ""),
            Err(DocError::EmptyPath)
        ));
    }

    #[test]
    fn read_distinguishes_missing_documents() {
        let tmp = TempDir::new().expect("temp dir");
        assert!(matches!(
            read_document(tmp.path(), "missing.md"),
            Err(DocError::NotFound)
        ));
    }

    #[test]
    fn read_returns_document_bytes() {
        let tmp = TempDir::new().expect("temp dir");
        write_file(&tmp.path().join("nested/doc.md"), "# hello");
        let bytes = read_document(tmp.path(), "nested/doc.md").expect("read");
        assert_eq!(bytes, b"# hello");
    }

    #[test]
    fn internal_parent_components_that_stay_inside_root_are_allowed() {
        let tmp = TempDir::new().expect("temp dir");
        write_file(&tmp.path().join("a.md"), "# a");
        let bytes = read_document(tmp.path(), "nested/../a.md").expect("read");
        assert_eq!(bytes, b"# a");
    }
}
