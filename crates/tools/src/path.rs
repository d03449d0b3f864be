//! Workspace path containment for file tools.
//!
//! Every path a tool touches is resolved against the workspace root and
//! refused if it lands outside it, whether through `..`, an absolute path,
//! or a symlink.

use cinder_core::error::ToolError;
use std::path::{Component, Path, PathBuf};

/// Resolve `requested` inside `root`, returning the absolute path.
pub fn resolve_in_workspace(root: &Path, requested: &str) -> Result<PathBuf, ToolError> {
    let requested = requested.trim();
    if requested.is_empty() {
        return Err(ToolError::InvalidArguments("path must not be empty".into()));
    }

    let root = root.canonicalize().unwrap_or_else(|_| normalize(root));
    let candidate = normalize(&root.join(requested));

    if !candidate.starts_with(&root) {
        return Err(ToolError::PermissionDenied(format!(
            "'{requested}' is outside the workspace"
        )));
    }

    // Symlinks: the deepest existing ancestor must still resolve inside root.
    if let Some(existing) = candidate.ancestors().find(|p| p.exists()) {
        let real = existing.canonicalize()?;
        if !real.starts_with(&root) {
            return Err(ToolError::PermissionDenied(format!(
                "'{requested}' resolves outside the workspace"
            )));
        }
    }

    Ok(candidate)
}

/// Lexically resolve `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_resolve_inside() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().canonicalize().unwrap();
        let resolved = resolve_in_workspace(&root, "notes/today.md").unwrap();
        assert_eq!(resolved, root.join("notes/today.md"));

        let resolved = resolve_in_workspace(&root, "./a/../b.txt").unwrap();
        assert_eq!(resolved, root.join("b.txt"));
    }

    #[test]
    fn traversal_blocked() {
        let tmp = tempfile::tempdir().unwrap();
        let err = resolve_in_workspace(tmp.path(), "../../../etc/passwd").unwrap_err();
        assert!(matches!(err, ToolError::PermissionDenied(_)));
    }

    #[test]
    fn absolute_outside_blocked() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(resolve_in_workspace(tmp.path(), "/etc/passwd").is_err());
    }

    #[test]
    fn empty_path_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(
            resolve_in_workspace(tmp.path(), "  "),
            Err(ToolError::InvalidArguments(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escape_blocked() {
        let outside = tempfile::tempdir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), tmp.path().join("link")).unwrap();
        let err = resolve_in_workspace(tmp.path(), "link/secret.txt").unwrap_err();
        assert!(matches!(err, ToolError::PermissionDenied(_)));
    }
}
