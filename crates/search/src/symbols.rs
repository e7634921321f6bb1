use crate::error::Result;
use crate::sandbox::PathSandbox;
use crate::walker::SandboxWalker;
use regex::Regex;
use scout_protocol::{SymbolHint, SymbolKind};
use std::path::Path;
use std::sync::{Arc, OnceLock};

pub const SYMBOL_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs", "py", "java"];

struct SymbolRule {
    kind: SymbolKind,
    pattern: Regex,
}

fn rules() -> &'static [SymbolRule] {
    static RULES: OnceLock<Vec<SymbolRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        [
            (
                SymbolKind::ClassOrInterface,
                r"(?:class|interface)\s+([A-Za-z0-9_]+)",
            ),
            (SymbolKind::Function, r"(?:function|def)\s+([A-Za-z0-9_]+)"),
            (
                SymbolKind::Endpoint,
                r#"(?:@GetMapping|@PostMapping|@PutMapping|@DeleteMapping|@RequestMapping|app\.(?:get|post|put|delete|patch))\s*\(\s*['"]([^'"]+)['"]"#,
            ),
        ]
        .into_iter()
        .filter_map(|(kind, source)| match Regex::new(source) {
            Ok(pattern) => Some(SymbolRule { kind, pattern }),
            Err(err) => {
                log::error!("Symbol rule {} failed to compile: {err}", kind.as_str());
                None
            }
        })
        .collect()
    })
}

/// Lexical landmark scan over sandbox-allowed source files.
///
/// Heuristic only: declarations inside comments or string literals are reported too.
#[derive(Debug, Clone)]
pub struct SymbolExtractor {
    sandbox: Arc<PathSandbox>,
}

impl SymbolExtractor {
    pub fn new(sandbox: Arc<PathSandbox>) -> Self {
        Self { sandbox }
    }

    /// Hints under the sandbox root, in walk order, stopping at `max_results`.
    pub fn extract(&self, query: Option<&str>, max_results: usize) -> Result<Vec<SymbolHint>> {
        self.extract_under(self.sandbox.root(), query, max_results)
    }

    pub fn extract_under(
        &self,
        start: &Path,
        query: Option<&str>,
        max_results: usize,
    ) -> Result<Vec<SymbolHint>> {
        let start = self.sandbox.assert_allowed(start)?;
        let needle = query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase);

        let mut hints = Vec::new();
        if max_results == 0 {
            return Ok(hints);
        }

        let walker = SandboxWalker::new(&self.sandbox);
        for path in walker.files_with_extensions(&start, SYMBOL_EXTENSIONS) {
            let content = match std::fs::read(&path) {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(err) => {
                    log::debug!("Skipping {}: {err}", path.display());
                    continue;
                }
            };
            if scan_source(&path, &content, needle.as_deref(), max_results, &mut hints) {
                break;
            }
        }
        Ok(hints)
    }
}

/// Appends hints found in `content`; returns true once `out` holds `max_results` hints.
///
/// `needle` must already be lowercase.
pub fn scan_source(
    path: &Path,
    content: &str,
    needle: Option<&str>,
    max_results: usize,
    out: &mut Vec<SymbolHint>,
) -> bool {
    if out.len() >= max_results {
        return true;
    }
    let path_str = path.to_string_lossy();

    for (idx, line) in content.lines().enumerate() {
        for rule in rules() {
            for caps in rule.pattern.captures_iter(line) {
                let Some(name) = caps.get(1).map(|m| m.as_str()) else {
                    continue;
                };
                if needle.is_some_and(|n| !name.to_lowercase().contains(n)) {
                    continue;
                }
                out.push(SymbolHint {
                    kind: rule.kind,
                    name: name.to_string(),
                    path: path_str.to_string(),
                    line: idx + 1,
                    preview: line.trim().to_string(),
                });
                if out.len() >= max_results {
                    return true;
                }
            }
        }
    }
    false
}
