use super::error::ToolError;
use super::schemas::code_search::CodeSearchRequest;
use super::ToolContext;
use scout_protocol::{SearchQuery, SearchResultSet, DEFAULT_SEARCH_MAX_RESULTS};

pub(super) fn to_query(request: CodeSearchRequest) -> SearchQuery {
    SearchQuery {
        text: request.query,
        is_regex: request.regex.unwrap_or(false),
        case_sensitive: request.case_sensitive.unwrap_or(false),
        globs: request.glob.unwrap_or_default(),
        max_results: request.max_results.unwrap_or(DEFAULT_SEARCH_MAX_RESULTS),
    }
}

pub(super) async fn code_search(
    ctx: &ToolContext,
    request: CodeSearchRequest,
) -> Result<SearchResultSet, ToolError> {
    let query = to_query(request);
    let root = ctx.sandbox().root().to_path_buf();
    Ok(ctx.engine().search(&query, &root).await?)
}
