use crate::engine::{build_match, char_column, MatchCollector, SearchPlan, SearchStrategy};
use crate::error::StrategyError;
use crate::walker::SandboxWalker;
use async_trait::async_trait;
use scout_protocol::SearchResultSet;
use std::path::Path;

/// Reference strategy: walk the sandbox and scan every text file in process.
///
/// Slower than the native tool but needs nothing from the host. Files that cannot be read, or
/// that contain a NUL byte, are skipped without failing the search.
#[derive(Debug, Clone, Copy, Default)]
pub struct WalkStrategy;

#[async_trait]
impl SearchStrategy for WalkStrategy {
    fn name(&self) -> &'static str {
        "walk"
    }

    async fn run(&self, plan: &SearchPlan) -> Result<SearchResultSet, StrategyError> {
        let plan = plan.clone();
        tokio::task::spawn_blocking(move || scan(&plan))
            .await
            .map_err(|err| StrategyError::Unavailable(format!("walk task failed: {err}")))
    }
}

pub fn scan(plan: &SearchPlan) -> SearchResultSet {
    let mut collector = MatchCollector::new(plan.query.max_results);
    let walker = SandboxWalker::new(&plan.sandbox);

    'files: for path in walker.files(&plan.root) {
        if !plan.passes_globs(&path) {
            continue;
        }
        let Some(content) = read_text(&path) else {
            continue;
        };

        let lines: Vec<&str> = content.lines().collect();
        for (idx, line) in lines.iter().enumerate() {
            let Some(found) = plan.matcher.find(line) else {
                continue;
            };
            let column = char_column(line, found.start());
            if collector
                .push(build_match(&path, &lines, idx + 1, column))
                .is_break()
            {
                break 'files;
            }
        }
    }

    collector.finish(&plan.query)
}

fn read_text(path: &Path) -> Option<String> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            log::debug!("Skipping {}: {err}", path.display());
            return None;
        }
    };
    if bytes.contains(&0) {
        log::debug!("Skipping binary file {}", path.display());
        return None;
    }
    Some(String::from_utf8_lossy(&bytes).into_owned())
}
