mod engine;
mod error;
mod fallback;
mod globs;
mod native;
mod sandbox;
mod symbols;
mod walker;

pub use engine::{
    build_match, MatchCollector, SearchEngine, SearchPlan, SearchStrategy, DEFAULT_NATIVE_TOOL,
};
pub use error::{Result, SandboxError, SearchError, StrategyError};
pub use fallback::WalkStrategy;
pub use globs::{effective_globs, CallerGlobs};
pub use native::{parse_match_event, MatchEvent, RipgrepStrategy, MAX_OUTPUT_BYTES};
pub use sandbox::{normalize_path, PathSandbox};
pub use symbols::{SymbolExtractor, SYMBOL_EXTENSIONS};
pub use walker::SandboxWalker;
