use crate::engine::{build_match, MatchCollector, SearchPlan, SearchStrategy};
use crate::error::StrategyError;
use crate::globs::effective_globs;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use scout_protocol::{MatchContext, SearchMatch, SearchResultSet};
use serde::Deserialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader, Take};
use tokio::process::Command;

/// Ceiling on the total JSON event stream read from the child.
pub const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Primary strategy: ripgrep's `--json` event stream.
#[derive(Debug, Clone)]
pub struct RipgrepStrategy {
    program: PathBuf,
}

impl RipgrepStrategy {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Full argument vector for one query.
    pub fn args(plan: &SearchPlan) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            "--json",
            "--sort",
            "path",
            "--hidden",
            "--no-ignore",
            "--no-config",
            "--no-messages",
        ]
        .into_iter()
        .map(OsString::from)
        .collect();

        args.push(if plan.query.case_sensitive { "-s" } else { "-i" }.into());
        if !plan.query.is_regex {
            args.push("-F".into());
        }
        // Later globs take precedence in ripgrep, so sandbox excludes go last.
        for glob in effective_globs(&plan.query.globs) {
            args.push("-g".into());
            args.push(glob.into());
        }
        for pattern in plan.sandbox.ignored_patterns() {
            args.push("-g".into());
            args.push(format!("!{pattern}").into());
        }
        args.push("-e".into());
        args.push(plan.query.text.as_str().into());
        args.push("--".into());
        args.push(plan.root.as_os_str().to_os_string());
        args
    }
}

#[async_trait]
impl SearchStrategy for RipgrepStrategy {
    fn name(&self) -> &'static str {
        "ripgrep"
    }

    async fn run(&self, plan: &SearchPlan) -> Result<SearchResultSet, StrategyError> {
        // ripgrep anchors `-g` globs at its working directory.
        let cwd = if plan.root.is_dir() {
            plan.root.as_path()
        } else {
            plan.root.parent().unwrap_or(plan.root.as_path())
        };
        let mut child = Command::new(&self.program)
            .args(Self::args(plan))
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                StrategyError::Unavailable(format!("{}: {err}", self.program.display()))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| StrategyError::Unavailable("child stdout not captured".to_string()))?;
        let mut lines = BoundedLines::new(stdout, MAX_OUTPUT_BYTES);

        let mut collector = MatchCollector::new(plan.query.max_results);
        let mut cache = FileCache::default();
        let mut stopped_early = false;

        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(err) => {
                    stop_child(&mut child).await;
                    return Err(err);
                }
            };

            let Some(event) = parse_match_event(&line) else {
                continue;
            };
            if !plan.sandbox.is_allowed(&event.path) {
                continue;
            }

            let found = cache.build(&event).await;
            if collector.push(found).is_break() {
                stopped_early = true;
                stop_child(&mut child).await;
                break;
            }
        }

        if stopped_early {
            return Ok(collector.finish(&plan.query));
        }

        let status = child
            .wait()
            .await
            .map_err(|err| StrategyError::Unavailable(format!("waiting for child: {err}")))?;
        match status.code() {
            Some(0) | Some(1) => Ok(collector.finish(&plan.query)),
            code => Err(StrategyError::Unavailable(format!(
                "exited with status {code:?}"
            ))),
        }
    }
}

/// Newline-delimited reader that never buffers more than `limit + 1` bytes of child output in
/// total, however long a single line is.
struct BoundedLines<R> {
    reader: BufReader<Take<R>>,
    limit: usize,
    consumed: usize,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> BoundedLines<R> {
    fn new(inner: R, limit: usize) -> Self {
        Self {
            reader: BufReader::new(inner.take(limit as u64 + 1)),
            limit,
            consumed: 0,
            buf: Vec::new(),
        }
    }

    async fn next_line(&mut self) -> Result<Option<String>, StrategyError> {
        self.buf.clear();
        let read = self
            .reader
            .read_until(b'\n', &mut self.buf)
            .await
            .map_err(|err| StrategyError::Unavailable(format!("reading output: {err}")))?;
        if read == 0 {
            return Ok(None);
        }
        self.consumed += read;
        if self.consumed > self.limit {
            return Err(StrategyError::Unavailable(
                "output exceeded buffer ceiling".to_string(),
            ));
        }
        let line = String::from_utf8_lossy(&self.buf);
        Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
    }
}

async fn stop_child(child: &mut tokio::process::Child) {
    if let Err(err) = child.kill().await {
        log::debug!("Failed to stop search process: {err}");
    }
}

#[derive(Debug, Deserialize)]
struct RgEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RgText {
    text: Option<String>,
    /// Base64, used by ripgrep when the payload is not valid UTF-8.
    bytes: Option<String>,
}

impl RgText {
    fn into_bytes(self) -> Option<Vec<u8>> {
        match (self.text, self.bytes) {
            (Some(text), _) => Some(text.into_bytes()),
            (None, Some(encoded)) => STANDARD.decode(encoded).ok(),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RgSubmatch {
    start: usize,
}

#[derive(Debug, Deserialize)]
struct RgMatchData {
    path: RgText,
    lines: RgText,
    line_number: Option<usize>,
    #[serde(default)]
    submatches: Vec<RgSubmatch>,
}

/// A `match` event reduced to what the engine needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchEvent {
    pub path: PathBuf,
    pub line: usize,
    /// 1-based character column of the first submatch.
    pub column: usize,
    pub text: String,
}

/// Parse one JSON line of ripgrep output. Non-match events and malformed lines yield `None`.
///
/// Lines that are not valid UTF-8 are decoded lossily, the same way the walk strategy reads
/// files, so both strategies report the same column.
pub fn parse_match_event(line: &str) -> Option<MatchEvent> {
    let event: RgEvent = serde_json::from_str(line).ok()?;
    if event.kind != "match" {
        return None;
    }
    let data: RgMatchData = serde_json::from_value(event.data).ok()?;
    let path = path_from_bytes(data.path.into_bytes()?);
    let raw = data.lines.into_bytes()?;
    let line = data.line_number?;
    let start = data
        .submatches
        .first()
        .map_or(0, |m| m.start)
        .min(raw.len());

    let column = String::from_utf8_lossy(&raw[..start]).chars().count() + 1;
    let text = String::from_utf8_lossy(&raw)
        .trim_end_matches(['\n', '\r'])
        .to_string();
    Some(MatchEvent {
        path,
        line,
        column,
        text,
    })
}

#[cfg(unix)]
fn path_from_bytes(bytes: Vec<u8>) -> PathBuf {
    use std::os::unix::ffi::OsStringExt;
    PathBuf::from(OsString::from_vec(bytes))
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: Vec<u8>) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(&bytes).into_owned())
}

/// Holds the lines of the most recently read file; ripgrep reports matches grouped by file.
#[derive(Default)]
struct FileCache {
    path: Option<PathBuf>,
    lines: Vec<String>,
}

impl FileCache {
    async fn build(&mut self, event: &MatchEvent) -> SearchMatch {
        let path = event.path.as_path();
        if self.path.as_deref() != Some(path) {
            self.path = Some(path.to_path_buf());
            self.lines = match tokio::fs::read(path).await {
                Ok(bytes) => String::from_utf8_lossy(&bytes)
                    .lines()
                    .map(str::to_string)
                    .collect(),
                Err(err) => {
                    log::debug!("Failed to re-read {} for context: {err}", path.display());
                    Vec::new()
                }
            };
        }

        if self.lines.len() >= event.line {
            return build_match(path, &self.lines, event.line, event.column);
        }

        // File changed or vanished since the match was reported.
        SearchMatch {
            path: path.to_string_lossy().into_owned(),
            line: event.line,
            column: event.column,
            preview: event.text.trim().to_string(),
            context: MatchContext {
                start_line: event.line,
                end_line: event.line,
                lines: vec![event.text.clone()],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::PathSandbox;
    use pretty_assertions::assert_eq;
    use scout_protocol::SearchQuery;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn parses_match_events() {
        let line = r#"{"type":"match","data":{"path":{"text":"/ws/a/b.txt"},"lines":{"text":"  let needle = 1;\n"},"line_number":4,"absolute_offset":10,"submatches":[{"match":{"text":"needle"},"start":6,"end":12}]}}"#;
        let event = parse_match_event(line).unwrap();
        assert_eq!(
            event,
            MatchEvent {
                path: PathBuf::from("/ws/a/b.txt"),
                line: 4,
                column: 7,
                text: "  let needle = 1;".to_string(),
            }
        );
    }

    #[test]
    fn ignores_other_events_and_malformed_lines() {
        let begin = r#"{"type":"begin","data":{"path":{"text":"/ws/a.txt"}}}"#;
        assert_eq!(parse_match_event(begin), None);

        let summary = r#"{"data":{"elapsed_total":{"human":"0.01s"}},"type":"summary"}"#;
        assert_eq!(parse_match_event(summary), None);

        let bad_base64 = r#"{"type":"match","data":{"path":{"text":"/ws/a"},"lines":{"bytes":"%%%"},"line_number":1,"submatches":[]}}"#;
        assert_eq!(parse_match_event(bad_base64), None);

        assert_eq!(parse_match_event("not json"), None);
    }

    #[test]
    fn non_utf8_lines_are_decoded_lossily() {
        // "caf\xe9 needle\n"
        let line = r#"{"type":"match","data":{"path":{"text":"/ws/latin1.txt"},"lines":{"bytes":"Y2Fm6SBuZWVkbGUK"},"line_number":1,"submatches":[{"match":{"text":"needle"},"start":5,"end":11}]}}"#;
        let event = parse_match_event(line).unwrap();
        assert_eq!(
            event,
            MatchEvent {
                path: PathBuf::from("/ws/latin1.txt"),
                line: 1,
                column: 6,
                text: "caf\u{FFFD} needle".to_string(),
            }
        );
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_paths_keep_their_raw_bytes() {
        use std::os::unix::ffi::OsStrExt;

        // "/ws/caf\xe9.txt"
        let line = r#"{"type":"match","data":{"path":{"bytes":"L3dzL2NhZukudHh0"},"lines":{"text":"needle\n"},"line_number":1,"submatches":[{"start":0,"end":6}]}}"#;
        let event = parse_match_event(line).unwrap();
        assert_eq!(event.path.as_os_str().as_bytes(), b"/ws/caf\xe9.txt");
        assert_eq!(event.column, 1);
    }

    #[tokio::test]
    async fn bounded_lines_split_and_trim() {
        let mut lines = BoundedLines::new(&b"one\r\ntwo\nthree"[..], 64);
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("one"));
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("two"));
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("three"));
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn one_oversized_line_trips_the_ceiling_without_buffering_it() {
        let huge = vec![b'x'; 4096];
        let mut lines = BoundedLines::new(&huge[..], 16);
        let err = lines.next_line().await.unwrap_err();
        assert!(matches!(err, StrategyError::Unavailable(_)));
        assert!(lines.buf.len() <= 17);
    }

    #[tokio::test]
    async fn output_exactly_at_the_ceiling_is_accepted() {
        let mut lines = BoundedLines::new(&b"abc\ndef\n"[..], 8);
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("abc"));
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("def"));
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[test]
    fn column_counts_multibyte_characters() {
        let line = r#"{"type":"match","data":{"path":{"text":"/ws/x"},"lines":{"text":"é needle\r\n"},"line_number":1,"submatches":[{"start":3,"end":9}]}}"#;
        let event = parse_match_event(line).unwrap();
        assert_eq!(event.column, 3);
        assert_eq!(event.text, "é needle");
    }

    #[test]
    fn args_place_sandbox_excludes_after_caller_globs() {
        let tmp = tempdir().unwrap();
        let sandbox = Arc::new(
            PathSandbox::new(tmp.path(), &["node_modules".to_string(), ".git".to_string()])
                .unwrap(),
        );
        let query = SearchQuery::literal("-needle").globs(vec!["*.ts".to_string()]);
        let plan = SearchPlan::new(&query, tmp.path(), sandbox).unwrap();

        let args: Vec<String> = RipgrepStrategy::args(&plan)
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        let tail: Vec<&str> = args[7..].iter().map(String::as_str).collect();
        assert_eq!(
            tail,
            vec![
                "-i",
                "-F",
                "-g",
                "*.ts",
                "-g",
                "!node_modules",
                "-g",
                "!.git",
                "-e",
                "-needle",
                "--",
                tmp.path().to_str().unwrap(),
            ]
        );
    }

    #[tokio::test]
    async fn missing_binary_is_unavailable() {
        let tmp = tempdir().unwrap();
        let sandbox = Arc::new(PathSandbox::new(tmp.path(), &[]).unwrap());
        let plan = SearchPlan::new(&SearchQuery::literal("x"), tmp.path(), sandbox).unwrap();

        let strategy = RipgrepStrategy::new(tmp.path().join("no-such-rg"));
        let err = strategy.run(&plan).await.unwrap_err();
        assert!(matches!(err, StrategyError::Unavailable(_)));
    }
}
