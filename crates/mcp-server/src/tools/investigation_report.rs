use super::error::ToolError;
use super::schemas::investigation_report::{InvestigationReportRequest, InvestigationReportResult};

#[derive(Default)]
struct MarkdownBuilder {
    out: String,
}

impl MarkdownBuilder {
    fn push_line(&mut self, line: &str) {
        self.out.push_str(line);
        self.out.push('\n');
    }

    fn push_blank(&mut self) {
        if !self.out.ends_with('\n') {
            self.out.push('\n');
        }
        self.out.push('\n');
    }

    fn finish(self) -> String {
        self.out
    }
}

fn joined_or(items: &[String], fallback: &str) -> String {
    if items.is_empty() {
        fallback.to_string()
    } else {
        items.join(", ")
    }
}

fn or_na(value: Option<&str>) -> &str {
    value.map(str::trim).filter(|v| !v.is_empty()).unwrap_or("N/A")
}

/// Markdown skeleton for an incident investigation. Pure formatting, no filesystem access.
pub(super) fn build_investigation_report(
    request: InvestigationReportRequest,
) -> Result<InvestigationReportResult, ToolError> {
    let title = request.incident_title.trim();
    if title.is_empty() {
        return Err(ToolError::InvalidArguments(
            "incidentTitle must not be empty".to_string(),
        ));
    }

    let window = request.time_window.unwrap_or_default();
    let environment = request
        .environment
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("Unknown");

    let mut md = MarkdownBuilder::default();
    md.push_line("# Investigation Report");
    md.push_line(&format!("## Incident: {title}"));
    md.push_line(&format!("**Environment**: {environment}"));
    md.push_line(&format!(
        "**Time Window**: {} - {}",
        or_na(window.start.as_deref()),
        or_na(window.end.as_deref())
    ));
    md.push_line(&format!(
        "**Associated Services**: {}",
        joined_or(&request.services, "N/A")
    ));
    md.push_blank();

    md.push_line("### Impacted Entities");
    md.push_line(&format!(
        "- Trace IDs: {}",
        joined_or(&request.trace_ids, "None provided")
    ));
    md.push_line(&format!(
        "- Error Codes: {}",
        joined_or(&request.error_codes, "None provided")
    ));
    md.push_blank();

    md.push_line("### Provided Evidence");
    if request.log_snippets.is_empty() {
        md.push_line("*No log snippets provided.*");
    } else {
        for snippet in &request.log_snippets {
            md.push_line("```");
            md.push_line(snippet.trim_end());
            md.push_line("```");
        }
    }
    md.push_blank();

    md.push_line("---");
    md.push_line("### Next Steps & Required Evidence");
    if request.error_codes.is_empty() {
        md.push_line(
            "1. **Search Code for Error Messages**: Use `code_search` with distinctive text from the logs.",
        );
    } else {
        md.push_line(&format!(
            "1. **Search Code for Error Codes**: Use `code_search` looking for the specified error codes ({}).",
            request.error_codes.join(", ")
        ));
    }
    md.push_line(
        "2. **Review Logs**: If logs provide stacktraces, use `code_search` or `file_read` to inspect lines showing failure components.",
    );
    md.push_line(
        "3. **Trace API Endpoints**: Use `symbol_hint` to match incoming endpoint URLs to source functions and controllers.",
    );
    md.push_line(
        "4. **Determine Root Cause**: Read the implementation around error sites with `file_read`.",
    );
    md.push_blank();
    md.push_line("### Findings");
    md.push_line("*(To be filled in as the investigation progresses.)*");

    Ok(InvestigationReportResult {
        markdown: md.finish(),
    })
}
