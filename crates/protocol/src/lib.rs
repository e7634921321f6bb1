use anyhow::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SEARCH_MAX_RESULTS: usize = 200;
pub const DEFAULT_SYMBOL_MAX_RESULTS: usize = 100;

/// Number of lines shown on each side of a match.
pub const CONTEXT_RADIUS: usize = 2;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub text: String,
    pub is_regex: bool,
    pub case_sensitive: bool,
    pub globs: Vec<String>,
    pub max_results: usize,
}

impl SearchQuery {
    pub fn literal(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_regex: false,
            case_sensitive: false,
            globs: Vec::new(),
            max_results: DEFAULT_SEARCH_MAX_RESULTS,
        }
    }

    pub fn regex(text: impl Into<String>) -> Self {
        Self {
            is_regex: true,
            ..Self::literal(text)
        }
    }

    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn globs(mut self, globs: Vec<String>) -> Self {
        self.globs = globs;
        self
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatchContext {
    pub start_line: usize,
    pub end_line: usize,
    pub lines: Vec<String>,
}

impl MatchContext {
    /// Window of `CONTEXT_RADIUS` lines around `line` (1-based), clamped to the file.
    pub fn around<S: AsRef<str>>(lines: &[S], line: usize) -> Self {
        if lines.is_empty() || line == 0 {
            return Self {
                start_line: line,
                end_line: line,
                lines: Vec::new(),
            };
        }

        let idx = (line - 1).min(lines.len() - 1);
        let start = idx.saturating_sub(CONTEXT_RADIUS);
        let end = idx.saturating_add(CONTEXT_RADIUS).min(lines.len() - 1);
        Self {
            start_line: start + 1,
            end_line: end + 1,
            lines: lines[start..=end]
                .iter()
                .map(|l| l.as_ref().to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchMatch {
    /// Absolute path inside the workspace root.
    pub path: String,
    pub line: usize,
    pub column: usize,
    pub preview: String,
    pub context: MatchContext,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultSet {
    pub query: String,
    pub regex: bool,
    pub case_sensitive: bool,
    pub matches: Vec<SearchMatch>,
    pub truncated: bool,
}

impl SearchResultSet {
    pub fn empty(query: &SearchQuery) -> Self {
        Self {
            query: query.text.clone(),
            regex: query.is_regex,
            case_sensitive: query.case_sensitive,
            matches: Vec::new(),
            truncated: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    ClassOrInterface,
    Function,
    Endpoint,
}

impl SymbolKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ClassOrInterface => "class_or_interface",
            Self::Function => "function",
            Self::Endpoint => "endpoint",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct SymbolHint {
    pub kind: SymbolKind,
    pub name: String,
    pub path: String,
    pub line: usize,
    pub preview: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema)]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorEnvelope {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

pub fn serialize_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(Into::into)
}

pub fn serialize_json_pretty<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(Into::into)
}
