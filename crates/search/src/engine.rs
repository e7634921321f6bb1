use crate::error::{Result, SearchError, StrategyError};
use crate::fallback::WalkStrategy;
use crate::globs::CallerGlobs;
use crate::native::RipgrepStrategy;
use crate::sandbox::PathSandbox;
use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use scout_protocol::{MatchContext, SearchMatch, SearchQuery, SearchResultSet};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const DEFAULT_NATIVE_TOOL: &str = "rg";

/// Everything a strategy needs to answer one query, validated up front by the engine.
#[derive(Debug, Clone)]
pub struct SearchPlan {
    pub query: SearchQuery,
    /// Regex equivalent of the query (literal text already escaped, case flag applied).
    pub matcher: Regex,
    pub globs: CallerGlobs,
    pub root: PathBuf,
    pub sandbox: Arc<PathSandbox>,
}

impl SearchPlan {
    pub fn new(query: &SearchQuery, root: &Path, sandbox: Arc<PathSandbox>) -> Result<Self> {
        if query.text.is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        if query.max_results == 0 {
            return Err(SearchError::InvalidMaxResults);
        }

        let root = sandbox.assert_allowed(root)?;
        let pattern = if query.is_regex {
            query.text.clone()
        } else {
            regex::escape(&query.text)
        };
        let matcher = RegexBuilder::new(&pattern)
            .case_insensitive(!query.case_sensitive)
            .build()
            .map_err(|err| SearchError::InvalidPattern(err.to_string()))?;
        let globs = CallerGlobs::new(&root, &query.globs)
            .map_err(|err| SearchError::InvalidGlob(err.to_string()))?;

        Ok(Self {
            query: query.clone(),
            matcher,
            globs,
            root,
            sandbox,
        })
    }

    /// Caller globs are evaluated against the path relative to the search root, directories
    /// included. A root that is itself a file is always searched.
    pub fn passes_globs(&self, path: &Path) -> bool {
        self.globs.allows(path)
    }
}

/// Bounded accumulator shared by every strategy so the cutoff rule cannot drift between them.
#[derive(Debug)]
pub struct MatchCollector {
    limit: usize,
    matches: Vec<SearchMatch>,
    truncated: bool,
}

impl MatchCollector {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            matches: Vec::new(),
            truncated: false,
        }
    }

    /// Accepts a match while under the limit. A match arriving after the limit is reached proves
    /// more results exist: it is dropped, `truncated` is set and the caller should stop.
    pub fn push(&mut self, found: SearchMatch) -> ControlFlow<()> {
        if self.matches.len() >= self.limit {
            self.truncated = true;
            return ControlFlow::Break(());
        }
        self.matches.push(found);
        ControlFlow::Continue(())
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn finish(self, query: &SearchQuery) -> SearchResultSet {
        SearchResultSet {
            matches: self.matches,
            truncated: self.truncated,
            ..SearchResultSet::empty(query)
        }
    }
}

/// Build a match from the full text of its file.
pub fn build_match<S: AsRef<str>>(
    path: &Path,
    file_lines: &[S],
    line: usize,
    column: usize,
) -> SearchMatch {
    let preview = line
        .checked_sub(1)
        .and_then(|idx| file_lines.get(idx))
        .map(|l| l.as_ref().trim().to_string())
        .unwrap_or_default();
    SearchMatch {
        path: path.to_string_lossy().into_owned(),
        line,
        column,
        preview,
        context: MatchContext::around(file_lines, line),
    }
}

/// 1-based character column for a byte offset into `line`.
pub fn char_column(line: &str, byte_offset: usize) -> usize {
    line.get(..byte_offset)
        .map_or(byte_offset, |prefix| prefix.chars().count())
        + 1
}

#[async_trait]
pub trait SearchStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, plan: &SearchPlan) -> std::result::Result<SearchResultSet, StrategyError>;
}

/// Literal/regex search over sandbox-allowed files, trying each strategy in order until one
/// completes.
pub struct SearchEngine {
    sandbox: Arc<PathSandbox>,
    strategies: Vec<Box<dyn SearchStrategy>>,
}

impl SearchEngine {
    /// Native tool resolved from `PATH`, with the in-process walk as fallback.
    pub fn new(sandbox: Arc<PathSandbox>) -> Self {
        Self::with_native_tool(sandbox, DEFAULT_NATIVE_TOOL)
    }

    pub fn with_native_tool(sandbox: Arc<PathSandbox>, program: impl Into<PathBuf>) -> Self {
        Self::with_strategies(
            sandbox,
            vec![
                Box::new(RipgrepStrategy::new(program)),
                Box::new(WalkStrategy),
            ],
        )
    }

    pub fn without_native_tool(sandbox: Arc<PathSandbox>) -> Self {
        Self::with_strategies(sandbox, vec![Box::new(WalkStrategy)])
    }

    pub fn with_strategies(
        sandbox: Arc<PathSandbox>,
        strategies: Vec<Box<dyn SearchStrategy>>,
    ) -> Self {
        Self {
            sandbox,
            strategies,
        }
    }

    pub fn sandbox(&self) -> &PathSandbox {
        &self.sandbox
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub async fn search(&self, query: &SearchQuery, root: &Path) -> Result<SearchResultSet> {
        let plan = SearchPlan::new(query, root, Arc::clone(&self.sandbox))?;

        let mut last_failure = String::from("no strategies configured");
        for strategy in &self.strategies {
            match strategy.run(&plan).await {
                Ok(result) => {
                    log::debug!(
                        "{} returned {} matches (truncated: {})",
                        strategy.name(),
                        result.matches.len(),
                        result.truncated
                    );
                    return Ok(result);
                }
                Err(StrategyError::Unavailable(reason)) => {
                    log::info!("Search strategy {} unavailable: {reason}", strategy.name());
                    last_failure = reason;
                }
            }
        }
        Err(SearchError::Exhausted(last_failure))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    fn dummy(line: usize) -> SearchMatch {
        build_match(Path::new("/ws/a.txt"), &["x"], line, 1)
    }

    #[test]
    fn collector_keeps_everything_under_the_limit() {
        let mut collector = MatchCollector::new(3);
        for line in 1..=3 {
            assert!(collector.push(dummy(line)).is_continue());
        }
        let result = collector.finish(&SearchQuery::literal("x"));
        assert_eq!(result.matches.len(), 3);
        assert!(!result.truncated);
    }

    #[test]
    fn collector_truncates_only_when_an_extra_match_arrives() {
        let mut collector = MatchCollector::new(2);
        assert!(collector.push(dummy(1)).is_continue());
        assert!(collector.push(dummy(2)).is_continue());
        assert!(collector.push(dummy(3)).is_break());
        let result = collector.finish(&SearchQuery::literal("x"));
        assert_eq!(result.matches.len(), 2);
        assert!(result.truncated);
    }

    #[test]
    fn char_column_counts_characters_not_bytes() {
        assert_eq!(char_column("needle", 0), 1);
        assert_eq!(char_column("  needle", 2), 3);
        assert_eq!(char_column("héllo needle", "héllo ".len()), 7);
    }

    #[test]
    fn plan_rejects_bad_queries() {
        let tmp = tempdir().unwrap();
        let sandbox = Arc::new(PathSandbox::new(tmp.path(), &[]).unwrap());

        let empty = SearchPlan::new(&SearchQuery::literal(""), tmp.path(), Arc::clone(&sandbox));
        assert!(matches!(empty, Err(SearchError::EmptyQuery)));

        let zero = SearchQuery::literal("x").max_results(0);
        let zero = SearchPlan::new(&zero, tmp.path(), Arc::clone(&sandbox));
        assert!(matches!(zero, Err(SearchError::InvalidMaxResults)));

        let bad = SearchPlan::new(&SearchQuery::regex("("), tmp.path(), Arc::clone(&sandbox));
        assert!(matches!(bad, Err(SearchError::InvalidPattern(_))));

        let glob = SearchQuery::literal("x").globs(vec!["src/[".to_string()]);
        let glob = SearchPlan::new(&glob, tmp.path(), Arc::clone(&sandbox));
        assert!(matches!(glob, Err(SearchError::InvalidGlob(_))));

        let outside = SearchPlan::new(&SearchQuery::literal("x"), Path::new("/"), sandbox);
        assert!(matches!(outside, Err(SearchError::Sandbox(_))));
    }

    #[test]
    fn literal_queries_are_escaped() {
        let tmp = tempdir().unwrap();
        let sandbox = Arc::new(PathSandbox::new(tmp.path(), &[]).unwrap());
        let plan = SearchPlan::new(&SearchQuery::literal("a.b("), tmp.path(), sandbox).unwrap();
        assert!(plan.matcher.is_match("x a.b( y"));
        assert!(!plan.matcher.is_match("axb("));
    }

    #[test]
    fn case_flag_controls_folding() {
        let tmp = tempdir().unwrap();
        let sandbox = Arc::new(PathSandbox::new(tmp.path(), &[]).unwrap());
        let folded =
            SearchPlan::new(&SearchQuery::literal("Needle"), tmp.path(), Arc::clone(&sandbox))
                .unwrap();
        assert!(folded.matcher.is_match("NEEDLE"));

        let exact = SearchQuery::literal("Needle").case_sensitive(true);
        let exact = SearchPlan::new(&exact, tmp.path(), sandbox).unwrap();
        assert!(!exact.matcher.is_match("NEEDLE"));
        assert!(exact.matcher.is_match("Needle"));
    }

    struct Unavailable(Arc<AtomicUsize>);

    #[async_trait]
    impl SearchStrategy for Unavailable {
        fn name(&self) -> &'static str {
            "unavailable"
        }

        async fn run(
            &self,
            _plan: &SearchPlan,
        ) -> std::result::Result<SearchResultSet, StrategyError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(StrategyError::Unavailable("not installed".to_string()))
        }
    }

    #[tokio::test]
    async fn engine_falls_through_unavailable_strategies() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("a.txt"), "needle\n").unwrap();
        let sandbox = Arc::new(PathSandbox::new(tmp.path(), &[]).unwrap());
        let calls = Arc::new(AtomicUsize::new(0));

        let engine = SearchEngine::with_strategies(
            sandbox,
            vec![
                Box::new(Unavailable(Arc::clone(&calls))),
                Box::new(WalkStrategy),
            ],
        );
        let result = engine
            .search(&SearchQuery::literal("needle"), tmp.path())
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.matches.len(), 1);
    }

    #[tokio::test]
    async fn engine_reports_exhaustion_when_nothing_completes() {
        let tmp = tempdir().unwrap();
        let sandbox = Arc::new(PathSandbox::new(tmp.path(), &[]).unwrap());
        let engine = SearchEngine::with_strategies(
            sandbox,
            vec![Box::new(Unavailable(Arc::new(AtomicUsize::new(0))))],
        );

        let err = engine
            .search(&SearchQuery::literal("needle"), tmp.path())
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Exhausted(_)));
    }
}
