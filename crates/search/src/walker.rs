use crate::sandbox::PathSandbox;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Deterministic, sandbox-pruned file enumeration.
///
/// Entries are visited depth-first with siblings in file-name order, so repeated walks over the
/// same tree yield the same sequence. Directories that fail the sandbox check are never entered.
/// Symlinks are not followed.
pub struct SandboxWalker<'a> {
    sandbox: &'a PathSandbox,
}

impl<'a> SandboxWalker<'a> {
    pub fn new(sandbox: &'a PathSandbox) -> Self {
        Self { sandbox }
    }

    pub fn files(&self, start: &Path) -> impl Iterator<Item = PathBuf> + 'a {
        let sandbox = self.sandbox;
        WalkDir::new(start)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| sandbox.is_allowed(entry.path()))
            .filter_map(|result| match result {
                Ok(entry) => Some(entry),
                Err(err) => {
                    log::debug!("Skipping unreadable entry: {err}");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(walkdir::DirEntry::into_path)
    }

    /// Files whose extension (case-insensitive) is in `extensions`.
    pub fn files_with_extensions(
        &self,
        start: &Path,
        extensions: &'a [&'a str],
    ) -> impl Iterator<Item = PathBuf> + 'a {
        self.files(start).filter(move |path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| extensions.iter().any(|c| c.eq_ignore_ascii_case(ext)))
        })
    }

    /// Immediate child directories of `start` that pass the sandbox, sorted by name.
    pub fn child_dirs(&self, start: &Path) -> std::io::Result<Vec<PathBuf>> {
        let mut dirs: Vec<PathBuf> = std::fs::read_dir(start)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_ok_and(|ft| ft.is_dir()))
            .map(|entry| entry.path())
            .filter(|path| self.sandbox.is_allowed(path))
            .collect();
        dirs.sort();
        Ok(dirs)
    }
}
