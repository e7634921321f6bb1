use super::error::ToolError;
use super::schemas::repo_list::{RepoListRequest, RepoListResult, WorkspaceEntry};
use super::ToolContext;
use scout_search::SandboxWalker;

pub(super) fn repo_list(
    ctx: &ToolContext,
    _request: RepoListRequest,
) -> Result<RepoListResult, ToolError> {
    let sandbox = ctx.sandbox();
    let root = sandbox.root();
    if !root.is_dir() {
        return Err(ToolError::NotFound(format!(
            "Workspace root does not exist: {}",
            root.display()
        )));
    }

    let dirs = SandboxWalker::new(sandbox)
        .child_dirs(root)
        .map_err(|err| ToolError::Execution(format!("Failed to list {}: {err}", root.display())))?;
    let workspaces = dirs
        .into_iter()
        .map(|dir| WorkspaceEntry {
            name: dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            path: dir.to_string_lossy().into_owned(),
        })
        .collect();

    Ok(RepoListResult {
        workspace_root: root.to_string_lossy().into_owned(),
        workspaces,
        ignored: sandbox.ignored_patterns().to_vec(),
    })
}
