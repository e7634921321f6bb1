use super::error::ToolError;
use super::schemas::symbol_hint::{SymbolHintRequest, SymbolHintResult};
use super::ToolContext;
use scout_protocol::DEFAULT_SYMBOL_MAX_RESULTS;

pub(super) async fn symbol_hint(
    ctx: &ToolContext,
    request: SymbolHintRequest,
) -> Result<SymbolHintResult, ToolError> {
    let max_results = request.max_results.unwrap_or(DEFAULT_SYMBOL_MAX_RESULTS);
    if max_results == 0 {
        return Err(ToolError::InvalidArguments(
            "maxResults must be greater than zero".to_string(),
        ));
    }

    let extractor = ctx.symbols().clone();
    let query = request.query;
    let hints = tokio::task::spawn_blocking(move || extractor.extract(query.as_deref(), max_results))
        .await
        .map_err(|err| ToolError::Execution(format!("symbol scan failed: {err}")))??;
    Ok(SymbolHintResult { hints })
}
