use ignore::overrides::{Override, OverrideBuilder};
use std::path::{Component, Path, PathBuf};

/// Caller globs with ripgrep's `-g` semantics, anchored at the search root.
///
/// A leading `!` excludes. When several globs match, the last one given wins. When at least one
/// include glob is present, files matching no glob are excluded. Directories are tested on the
/// way down, so an excluded directory hides everything beneath it.
#[derive(Debug, Clone)]
pub struct CallerGlobs {
    root: PathBuf,
    overrides: Override,
}

impl CallerGlobs {
    pub fn new(root: &Path, globs: &[String]) -> Result<Self, ignore::Error> {
        let mut builder = OverrideBuilder::new(root);
        for glob in effective_globs(globs) {
            builder.add(glob)?;
        }
        Ok(Self {
            root: root.to_path_buf(),
            overrides: builder.build()?,
        })
    }

    pub fn is_active(&self) -> bool {
        !self.overrides.is_empty()
    }

    /// `path` must lie under the root. The root itself is always allowed.
    pub fn allows(&self, path: &Path) -> bool {
        if !self.is_active() {
            return true;
        }
        let Ok(rel) = path.strip_prefix(&self.root) else {
            return false;
        };
        let parts: Vec<Component<'_>> = rel.components().collect();
        let Some((_, parents)) = parts.split_last() else {
            return true;
        };

        let mut dir = self.root.clone();
        for part in parents {
            dir.push(part);
            if self.overrides.matched(&dir, true).is_ignore() {
                return false;
            }
        }
        !self.overrides.matched(path, path.is_dir()).is_ignore()
    }
}

/// Trimmed globs with blanks (and a bare `!`) dropped; both strategies see exactly this list.
pub fn effective_globs(globs: &[String]) -> impl Iterator<Item = &str> {
    globs
        .iter()
        .map(|g| g.trim())
        .filter(|g| !g.is_empty() && *g != "!")
}
