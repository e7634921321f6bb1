use scout_search::{normalize_path, PathSandbox, SandboxError};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const WORKSPACE_ROOT_ENV: &str = "WORKSPACE_ROOT";
pub const RG_PATH_ENV: &str = "RG_PATH";
pub const IGNORED_DIRS_ENV: &str = "IGNORED_DIRS";
pub const MODEL_API_KEY_ENV: &str = "MODEL_API_KEY";
pub const PORT_ENV: &str = "PORT";
pub const SERVER_PUBLIC_KEY_ENV: &str = "SERVER_PUBLIC_KEY";
pub const AUDIT_LOG_ENV: &str = "SCOUT_AUDIT_LOG";

pub const DEFAULT_IGNORED_DIRS: &str = "node_modules,.git,target,dist,build,bin,obj,out";
pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_AUDIT_LOG: &str = "data/audit.log";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Process configuration, fixed at startup.
#[derive(Clone)]
pub struct ScoutConfig {
    pub workspace_root: PathBuf,
    /// Native search tool override; `None` means `rg` from `PATH`.
    pub rg_path: Option<PathBuf>,
    pub ignored_dirs: Vec<String>,
    pub model_api_key: Option<String>,
    pub port: u16,
    /// Escaped PEM as stored in the env file.
    pub server_public_key: Option<String>,
    pub audit_log: PathBuf,
}

impl std::fmt::Debug for ScoutConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoutConfig")
            .field("workspace_root", &self.workspace_root)
            .field("rg_path", &self.rg_path)
            .field("ignored_dirs", &self.ignored_dirs)
            .field(
                "model_api_key",
                &self.model_api_key.as_ref().map(|_| "<set>"),
            )
            .field("port", &self.port)
            .field("server_public_key", &self.server_public_key.is_some())
            .field("audit_log", &self.audit_log)
            .finish()
    }
}

impl ScoutConfig {
    /// Load `.env` from the current directory (if any), then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(err) = dotenvy::dotenv() {
            if !err.not_found() {
                log::warn!("Failed to load .env: {err}");
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let workspace_root = non_empty(WORKSPACE_ROOT_ENV)
            .ok_or(ConfigError::Missing(WORKSPACE_ROOT_ENV))?;
        let workspace_root = normalize_path(Path::new(workspace_root.trim()));

        let ignored_dirs = parse_ignored_dirs(
            non_empty(IGNORED_DIRS_ENV)
                .as_deref()
                .unwrap_or(DEFAULT_IGNORED_DIRS),
        );

        let port = match non_empty(PORT_ENV) {
            None => DEFAULT_PORT,
            Some(raw) => raw.trim().parse().map_err(|err| ConfigError::Invalid {
                key: PORT_ENV,
                reason: format!("{raw:?}: {err}"),
            })?,
        };

        Ok(Self {
            workspace_root,
            rg_path: non_empty(RG_PATH_ENV).map(|p| PathBuf::from(p.trim())),
            ignored_dirs,
            model_api_key: non_empty(MODEL_API_KEY_ENV),
            port,
            server_public_key: non_empty(SERVER_PUBLIC_KEY_ENV),
            audit_log: non_empty(AUDIT_LOG_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_AUDIT_LOG)),
        })
    }

    /// Defaults around an explicit root.
    pub fn for_workspace(root: impl AsRef<Path>) -> Self {
        Self {
            workspace_root: normalize_path(root.as_ref()),
            rg_path: None,
            ignored_dirs: parse_ignored_dirs(DEFAULT_IGNORED_DIRS),
            model_api_key: None,
            port: DEFAULT_PORT,
            server_public_key: None,
            audit_log: PathBuf::from(DEFAULT_AUDIT_LOG),
        }
    }

    pub fn sandbox(&self) -> Result<PathSandbox, SandboxError> {
        PathSandbox::new(&self.workspace_root, &self.ignored_dirs)
    }
}

pub fn parse_ignored_dirs(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn workspace_root_is_required() {
        let err = ScoutConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(WORKSPACE_ROOT_ENV)));

        let err = ScoutConfig::from_lookup(lookup(&[(WORKSPACE_ROOT_ENV, "  ")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
    }

    #[test]
    fn defaults_apply() {
        let config = ScoutConfig::from_lookup(lookup(&[(WORKSPACE_ROOT_ENV, "/srv/ws/./app")]))
            .unwrap();
        assert_eq!(config.workspace_root, PathBuf::from("/srv/ws/app"));
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.rg_path, None);
        assert_eq!(
            config.ignored_dirs,
            vec!["node_modules", ".git", "target", "dist", "build", "bin", "obj", "out"]
        );
        assert_eq!(config.audit_log, PathBuf::from(DEFAULT_AUDIT_LOG));
    }

    #[test]
    fn explicit_values_are_parsed() {
        let config = ScoutConfig::from_lookup(lookup(&[
            (WORKSPACE_ROOT_ENV, "/srv/ws"),
            (IGNORED_DIRS_ENV, " vendor , ,.cache"),
            (PORT_ENV, "8080"),
            (RG_PATH_ENV, "/opt/rg"),
            (MODEL_API_KEY_ENV, "secret"),
        ]))
        .unwrap();
        assert_eq!(config.ignored_dirs, vec!["vendor", ".cache"]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.rg_path, Some(PathBuf::from("/opt/rg")));
        assert!(!format!("{config:?}").contains("secret"));
    }

    #[test]
    fn bad_port_is_invalid() {
        let err = ScoutConfig::from_lookup(lookup(&[
            (WORKSPACE_ROOT_ENV, "/srv/ws"),
            (PORT_ENV, "http"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: PORT_ENV, .. }));
    }
}
