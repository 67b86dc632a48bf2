//! Path-safety guard for every filesystem write.
//!
//! A candidate is safe for a root when, after both are resolved to absolute
//! form, the candidate is the root itself or one of its descendants. The check
//! is component-based, so `/data/skills2` is never inside `/data/skills`.
//! Existing ancestors are canonicalized, which means a symlinked directory
//! pointing elsewhere is judged by where it really lands.

use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Returns `true` when `candidate` equals `root` or lives beneath it.
pub fn is_safe(root: &Path, candidate: &Path) -> bool {
    let root = resolve(root);
    let candidate = resolve(candidate);
    candidate.starts_with(&root)
}

/// Like [`is_safe`] but returns [`Error::PathEscape`] on failure.
pub fn ensure_safe(root: &Path, candidate: &Path) -> Result<()> {
    if is_safe(root, candidate) {
        Ok(())
    } else {
        tracing::warn!(root = %root.display(), candidate = %candidate.display(), "path escape rejected");
        Err(Error::path_escape(root, candidate))
    }
}

/// Make `path` absolute against the current directory and fold `.`/`..`
/// components without touching the filesystem.
pub fn absolutize(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {},
            Component::ParentDir => {
                out.pop();
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Absolute form of `path` with its longest existing prefix canonicalized.
pub fn resolve(path: &Path) -> PathBuf {
    let abs = absolutize(path);
    let mut existing = abs.as_path();
    let mut tail = Vec::new();
    loop {
        if let Ok(canonical) = std::fs::canonicalize(existing) {
            let mut out = canonical;
            for part in tail.iter().rev() {
                out.push(part);
            }
            return out;
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                existing = parent;
            },
            _ => return abs,
        }
    }
}

/// Normalize a relative resource path: backslashes become `/`, `.` segments
/// and empty segments are dropped, case is preserved. Returns `None` for
/// absolute paths or anything climbing out with `..`.
pub fn normalize_relative(raw: &str) -> Option<String> {
    let unified = raw.trim().replace('\\', "/");
    if unified.starts_with('/') || unified.contains(':') {
        return None;
    }
    let mut parts = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {},
            ".." => return None,
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_itself_is_safe() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(is_safe(tmp.path(), tmp.path()));
    }

    #[test]
    fn descendants_are_safe_even_if_missing() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(is_safe(tmp.path(), &tmp.path().join("a/b/c.md")));
    }

    #[test]
    fn sibling_with_shared_prefix_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("root");
        let sibling = tmp.path().join("root2");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::create_dir_all(&sibling).unwrap();
        assert!(!is_safe(&root, &sibling));
        assert!(!is_safe(&root, &sibling.join("x")));
    }

    #[test]
    fn parent_dir_traversal_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("root");
        std::fs::create_dir_all(&root).unwrap();
        assert!(!is_safe(&root, &root.join("../outside")));
        let err = ensure_safe(&root, &root.join("a/../../etc")).unwrap_err();
        assert!(err.is_path_escape());
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_directory_escaping_root_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("root");
        let outside = tmp.path().join("outside");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::create_dir_all(&outside).unwrap();
        std::os::unix::fs::symlink(&outside, root.join("link")).unwrap();
        assert!(!is_safe(&root, &root.join("link/file.txt")));
    }

    #[test]
    fn normalize_relative_paths() {
        assert_eq!(
            normalize_relative("./references\\Guide.md").as_deref(),
            Some("references/Guide.md")
        );
        assert_eq!(normalize_relative("a//b/./c").as_deref(), Some("a/b/c"));
        assert_eq!(normalize_relative("../x"), None);
        assert_eq!(normalize_relative("/etc/passwd"), None);
        assert_eq!(normalize_relative("C:/x"), None);
        assert_eq!(normalize_relative("."), None);
    }
}
