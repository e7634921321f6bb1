use super::error::ToolError;
use super::schemas::file_read::{FileReadRequest, FileReadResult, NumberedLine, DEFAULT_MAX_LINES};
use super::ToolContext;
use std::io::ErrorKind;

/// Requested line range after defaults and validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct LineWindow {
    pub(super) start: usize,
    pub(super) end: Option<usize>,
    pub(super) max_lines: usize,
}

impl LineWindow {
    pub(super) fn from_request(request: &FileReadRequest) -> Result<Self, ToolError> {
        let start = request.start_line.unwrap_or(1);
        if start == 0 {
            return Err(ToolError::InvalidArguments(
                "startLine is 1-based and must be at least 1".to_string(),
            ));
        }
        let max_lines = request.max_lines.unwrap_or(DEFAULT_MAX_LINES);
        if max_lines == 0 {
            return Err(ToolError::InvalidArguments(
                "maxLines must be greater than zero".to_string(),
            ));
        }
        if let Some(end) = request.end_line {
            if end < start {
                return Err(ToolError::InvalidArguments(format!(
                    "endLine ({end}) must not be before startLine ({start})"
                )));
            }
        }
        Ok(Self {
            start,
            end: request.end_line,
            max_lines,
        })
    }

    /// Slice `lines` (the whole file) into numbered lines plus the truncation flag.
    pub(super) fn apply<S: AsRef<str>>(&self, lines: &[S]) -> (Vec<NumberedLine>, usize, bool) {
        let total = lines.len();
        if self.start > total {
            return (Vec::new(), self.start - 1, false);
        }

        let requested_end = self.end.map_or(total, |end| end.min(total));
        let capped_end = self.start.saturating_add(self.max_lines - 1);
        let end = requested_end.min(capped_end);

        let numbered = lines[self.start - 1..end]
            .iter()
            .enumerate()
            .map(|(offset, text)| NumberedLine {
                line: self.start + offset,
                text: text.as_ref().to_string(),
            })
            .collect();
        (numbered, end, end < requested_end)
    }
}

pub(super) async fn file_read(
    ctx: &ToolContext,
    request: FileReadRequest,
) -> Result<FileReadResult, ToolError> {
    if request.path.trim().is_empty() {
        return Err(ToolError::InvalidArguments("path must not be empty".to_string()));
    }
    let window = LineWindow::from_request(&request)?;

    let sandbox = ctx.sandbox();
    let path = sandbox.assert_allowed(sandbox.resolve(request.path.trim()))?;

    let metadata = match tokio::fs::metadata(&path).await {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(ToolError::NotFound(format!(
                "File not found: {}",
                path.display()
            )));
        }
        Err(err) => {
            return Err(ToolError::Execution(format!(
                "Failed to stat {}: {err}",
                path.display()
            )));
        }
    };
    if metadata.is_dir() {
        return Err(ToolError::InvalidArguments(format!(
            "{} is a directory",
            path.display()
        )));
    }

    let bytes = tokio::fs::read(&path).await.map_err(|err| {
        ToolError::Execution(format!("Failed to read {}: {err}", path.display()))
    })?;
    let content = String::from_utf8_lossy(&bytes);
    let all_lines: Vec<&str> = content.lines().collect();
    let (lines, end_line, truncated) = window.apply(&all_lines);

    Ok(FileReadResult {
        path: path.to_string_lossy().into_owned(),
        start_line: window.start,
        end_line,
        lines,
        truncated,
    })
}
