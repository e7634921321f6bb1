use crate::error::SandboxError;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::{Component, Path, PathBuf};

/// Location guard for every path the tools touch.
///
/// A path is allowed when its lexically normalized absolute form lives under the workspace root
/// and its root-relative, slash-normalized form is not matched by the ignore patterns (or by any
/// ignore pattern applied to one of its parents). The root itself is always allowed.
#[derive(Debug, Clone)]
pub struct PathSandbox {
    root: PathBuf,
    patterns: Vec<String>,
    matcher: Gitignore,
}

impl PathSandbox {
    pub fn new(root: impl AsRef<Path>, patterns: &[String]) -> Result<Self, SandboxError> {
        let root = normalize_path(root.as_ref());
        let patterns: Vec<String> = patterns
            .iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();

        let mut builder = GitignoreBuilder::new(&root);
        for pattern in &patterns {
            builder
                .add_line(None, pattern)
                .map_err(|err| SandboxError::InvalidPattern(format!("{pattern}: {err}")))?;
        }
        let matcher = builder
            .build()
            .map_err(|err| SandboxError::InvalidPattern(err.to_string()))?;

        Ok(Self {
            root,
            patterns,
            matcher,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ignored_patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Resolve a caller supplied path: relative paths are anchored at the root.
    pub fn resolve(&self, raw: impl AsRef<Path>) -> PathBuf {
        let raw = raw.as_ref();
        if raw.is_absolute() {
            normalize_path(raw)
        } else {
            normalize_path(&self.root.join(raw))
        }
    }

    /// Root-relative path with `/` separators, or `None` when outside the root.
    pub fn relative_slash_path(&self, target: impl AsRef<Path>) -> Option<String> {
        let target = normalize_path(target.as_ref());
        let rel = target.strip_prefix(&self.root).ok()?;
        Some(to_slash(rel))
    }

    pub fn is_allowed(&self, target: impl AsRef<Path>) -> bool {
        let target = normalize_path(target.as_ref());
        let Ok(rel) = target.strip_prefix(&self.root) else {
            return false;
        };
        if rel.as_os_str().is_empty() {
            return true;
        }

        let rel = to_slash(rel);
        !self
            .matcher
            .matched_path_or_any_parents(Path::new(&rel), target.is_dir())
            .is_ignore()
    }

    /// Returns the normalized path when allowed.
    pub fn assert_allowed(&self, target: impl AsRef<Path>) -> Result<PathBuf, SandboxError> {
        let target = target.as_ref();
        if self.is_allowed(target) {
            Ok(normalize_path(target))
        } else {
            Err(SandboxError::AccessDenied(target.to_path_buf()))
        }
    }

    pub fn filter_allowed<P, I>(&self, paths: I) -> Vec<P>
    where
        P: AsRef<Path>,
        I: IntoIterator<Item = P>,
    {
        paths.into_iter().filter(|p| self.is_allowed(p)).collect()
    }
}

/// Lexical normalization: absolute, no `.` components, `..` folded into the parent.
///
/// Symlinks are not resolved.
pub fn normalize_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

fn to_slash(rel: &Path) -> String {
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    fn ignored() -> Vec<String> {
        ["node_modules", ".git", "target", "build/"]
            .iter()
            .map(|s| (*s).to_string())
            .collect()
    }

    #[test]
    fn root_and_children_are_allowed() {
        let tmp = tempdir().unwrap();
        let sandbox = PathSandbox::new(tmp.path(), &ignored()).unwrap();

        assert!(sandbox.is_allowed(tmp.path()));
        assert!(sandbox.is_allowed(tmp.path().join("src/lib.rs")));
        assert!(sandbox.is_allowed(tmp.path().join("a/./b/../c.txt")));
    }

    #[test]
    fn parent_escapes_are_rejected() {
        let tmp = tempdir().unwrap();
        let sandbox = PathSandbox::new(tmp.path(), &ignored()).unwrap();

        assert!(!sandbox.is_allowed(tmp.path().join("..")));
        assert!(!sandbox.is_allowed(tmp.path().join("src/../../etc/passwd")));
        assert!(!sandbox.is_allowed("/etc/passwd"));
    }

    #[test]
    fn sibling_with_shared_prefix_is_outside() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().join("ws");
        let sandbox = PathSandbox::new(&root, &[]).unwrap();

        assert!(sandbox.is_allowed(root.join("file.txt")));
        assert!(!sandbox.is_allowed(tmp.path().join("ws2/file.txt")));
    }

    #[test]
    fn ignored_directories_and_their_contents_are_denied() {
        let tmp = tempdir().unwrap();
        let sandbox = PathSandbox::new(tmp.path(), &ignored()).unwrap();

        assert!(!sandbox.is_allowed(tmp.path().join("node_modules")));
        assert!(!sandbox.is_allowed(tmp.path().join("node_modules/pkg/index.js")));
        assert!(!sandbox.is_allowed(tmp.path().join("web/node_modules/pkg/index.js")));
        assert!(!sandbox.is_allowed(tmp.path().join(".git/HEAD")));
        assert!(sandbox.is_allowed(tmp.path().join("node_modules_notes.md")));
    }

    #[test]
    fn directory_only_patterns_need_a_directory() {
        let tmp = tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("build")).unwrap();
        fs::write(tmp.path().join("docs-build"), "x").unwrap();
        let sandbox = PathSandbox::new(tmp.path(), &ignored()).unwrap();

        assert!(!sandbox.is_allowed(tmp.path().join("build")));
        assert!(!sandbox.is_allowed(tmp.path().join("build/out.o")));
        assert!(sandbox.is_allowed(tmp.path().join("docs-build")));
    }

    #[test]
    fn assert_and_filter_agree_with_is_allowed() {
        let tmp = tempdir().unwrap();
        let sandbox = PathSandbox::new(tmp.path(), &ignored()).unwrap();

        let inside = tmp.path().join("src/main.rs");
        assert_eq!(sandbox.assert_allowed(&inside).unwrap(), inside);
        let err = sandbox
            .assert_allowed(tmp.path().join("target/debug/app"))
            .unwrap_err();
        assert!(matches!(err, SandboxError::AccessDenied(_)));

        let kept = sandbox.filter_allowed(vec![
            tmp.path().join("a.txt"),
            tmp.path().join("target/x"),
            PathBuf::from("/outside"),
        ]);
        assert_eq!(kept, vec![tmp.path().join("a.txt")]);
    }

    #[test]
    fn relative_paths_resolve_against_root() {
        let tmp = tempdir().unwrap();
        let sandbox = PathSandbox::new(tmp.path(), &[]).unwrap();

        assert_eq!(sandbox.resolve("a/b.txt"), tmp.path().join("a/b.txt"));
        assert_eq!(
            sandbox.relative_slash_path(tmp.path().join("a/b.txt")),
            Some("a/b.txt".to_string())
        );
        assert_eq!(sandbox.relative_slash_path("/elsewhere"), None);
    }

    #[test]
    fn normalize_folds_parent_components() {
        assert_eq!(
            normalize_path(Path::new("/a/b/../c/./d")),
            PathBuf::from("/a/c/d")
        );
        assert_eq!(normalize_path(Path::new("/..")), PathBuf::from("/"));
    }
}
