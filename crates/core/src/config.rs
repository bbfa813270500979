//! TOML-based configuration for forcesync.
//!
//! Every section is optional; a missing section falls back to its defaults.
//! The target org can be given literally or through an `_env` field that names
//! an environment variable, resolved at runtime via
//! [`AppConfig::resolve_env_vars`].

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ConfigError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Workspace and logging settings.
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    /// Conflict detection / resolution settings.
    #[serde(default)]
    pub conflict: ConflictConfig,

    /// Anonymous code execution settings.
    #[serde(default)]
    pub execute: ExecuteConfig,
}

// ---------------------------------------------------------------------------
// Workspace
// ---------------------------------------------------------------------------

/// Project workspace configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Project root. Relative conflict roots are resolved against it.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Optional log file; logs go to stderr when unset.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}
fn default_log_level() -> String {
    "info".into()
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            log_level: default_log_level(),
            log_file: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Conflict
// ---------------------------------------------------------------------------

/// How two files present on both sides are compared.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonStrategy {
    /// Compare sizes first, then SHA-256 digests.
    #[default]
    Content,
    /// Compare sizes only.
    Size,
}

impl std::fmt::Display for ComparisonStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Content => write!(f, "content"),
            Self::Size => write!(f, "size"),
        }
    }
}

/// Conflict detection and resolution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictConfig {
    /// Local working copy root.
    #[serde(default = "default_local_root")]
    pub local_root: PathBuf,

    /// Directory holding the retrieved remote snapshot.
    #[serde(default = "default_remote_root")]
    pub remote_root: PathBuf,

    /// File comparison strategy.
    #[serde(default)]
    pub compare: ComparisonStrategy,

    /// Glob patterns (relative paths) excluded from detection.
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,

    /// Command run with the local file path appended before an accept-local
    /// copy, e.g. `["sfdx", "force:source:deploy", "-p"]`.
    #[serde(default)]
    pub sync_command: Option<Vec<String>>,
}

/// Path without `.` components, for comparing configured roots.
fn lexical(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

fn default_local_root() -> PathBuf {
    PathBuf::from("force-app")
}
fn default_remote_root() -> PathBuf {
    PathBuf::from(".sfdx/tools/conflicts/remote")
}
fn default_ignore_patterns() -> Vec<String> {
    vec!["**/.DS_Store".into(), "**/.git/**".into()]
}

impl Default for ConflictConfig {
    fn default() -> Self {
        Self {
            local_root: default_local_root(),
            remote_root: default_remote_root(),
            compare: ComparisonStrategy::default(),
            ignore_patterns: default_ignore_patterns(),
            sync_command: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Execute
// ---------------------------------------------------------------------------

/// Anonymous code execution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteConfig {
    /// CLI binary that performs the remote execution.
    #[serde(default = "default_program")]
    pub program: String,

    /// Arguments placed before the file flag.
    #[serde(default = "default_execute_args")]
    pub args: Vec<String>,

    /// Flag that introduces the code file path.
    #[serde(default = "default_file_flag")]
    pub file_flag: String,

    /// Flag that introduces the target org.
    #[serde(default = "default_target_org_flag")]
    pub target_org_flag: String,

    /// Target org alias or username.
    #[serde(default)]
    pub target_org: Option<String>,

    /// Environment variable holding the target org (overrides `target_org`).
    #[serde(default)]
    pub target_org_env: Option<String>,
}

fn default_program() -> String {
    "sfdx".into()
}
fn default_execute_args() -> Vec<String> {
    vec!["force:apex:execute".into()]
}
fn default_file_flag() -> String {
    "--apexcodefile".into()
}
fn default_target_org_flag() -> String {
    "--targetusername".into()
}

impl Default for ExecuteConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_execute_args(),
            file_flag: default_file_flag(),
            target_org_flag: default_target_org_flag(),
            target_org: None,
            target_org_env: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file at the given path.
    ///
    /// This does **not** resolve environment variables -- call
    /// [`resolve_env_vars`](Self::resolve_env_vars) afterwards.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Resolve `*_env` fields from environment variables.
    ///
    /// A missing variable logs a warning and keeps the literal value.
    pub fn resolve_env_vars(&mut self) -> Result<(), ConfigError> {
        if let Some(ref env_name) = self.execute.target_org_env {
            if let Some(org) = resolve_optional_env(env_name, "execute.target_org_env") {
                self.execute.target_org = Some(org);
            }
        }
        Ok(())
    }

    /// Validate that all required fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.conflict.local_root.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "conflict.local_root".into(),
                detail: "local root must not be empty".into(),
            });
        }
        if self.conflict.remote_root.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "conflict.remote_root".into(),
                detail: "remote root must not be empty".into(),
            });
        }
        let local = lexical(&self.local_root());
        let remote = lexical(&self.remote_root());
        if local == remote {
            return Err(ConfigError::InvalidValue {
                field: "conflict.remote_root".into(),
                detail: "remote root must differ from the local root".into(),
            });
        }
        if remote.starts_with(&local) || local.starts_with(&remote) {
            return Err(ConfigError::InvalidValue {
                field: "conflict.remote_root".into(),
                detail: "local and remote roots must not contain one another".into(),
            });
        }
        if let Some(ref cmd) = self.conflict.sync_command {
            if cmd.is_empty() || cmd[0].trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "conflict.sync_command".into(),
                    detail: "sync command must name a program".into(),
                });
            }
        }
        if self.execute.program.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "execute.program".into(),
                detail: "execute program must not be empty".into(),
            });
        }
        if self.execute.file_flag.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "execute.file_flag".into(),
                detail: "file flag must not be empty".into(),
            });
        }
        if tracing_level_is_unknown(&self.workspace.log_level) {
            return Err(ConfigError::InvalidValue {
                field: "workspace.log_level".into(),
                detail: format!("unknown log level '{}'", self.workspace.log_level),
            });
        }

        Ok(())
    }

    /// Convenience: load, resolve, and validate in one call.
    pub fn load_and_resolve<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.resolve_env_vars()?;
        config.validate()?;
        Ok(config)
    }

    /// Local root, resolved against the workspace root.
    pub fn local_root(&self) -> PathBuf {
        self.workspace.root.join(&self.conflict.local_root)
    }

    /// Remote snapshot root, resolved against the workspace root.
    pub fn remote_root(&self) -> PathBuf {
        self.workspace.root.join(&self.conflict.remote_root)
    }

    /// Template written by `forcesync init`.
    pub fn default_toml() -> &'static str {
        r#"# forcesync configuration

[workspace]
root = "."
log_level = "info"
# log_file = "forcesync.log"

[conflict]
local_root = "force-app"
remote_root = ".sfdx/tools/conflicts/remote"
compare = "content"
ignore_patterns = ["**/.DS_Store", "**/.git/**"]
# sync_command = ["sfdx", "force:source:deploy", "-p"]

[execute]
program = "sfdx"
args = ["force:apex:execute"]
file_flag = "--apexcodefile"
target_org_flag = "--targetusername"
# target_org = "my-scratch-org"
# target_org_env = "SFDX_TARGET_ORG"
"#
    }
}

fn tracing_level_is_unknown(level: &str) -> bool {
    // Directive strings such as "forcesync_core=debug" are left to EnvFilter.
    if level.contains('=') || level.contains(',') {
        return false;
    }
    !matches!(
        level.to_ascii_lowercase().as_str(),
        "trace" | "debug" | "info" | "warn" | "error" | "off"
    )
}

/// Try to read an environment variable by name. Returns `Some(value)` on
/// success; logs a warning and returns `None` if the variable is unset.
fn resolve_optional_env(env_name: &str, field: &str) -> Option<String> {
    match std::env::var(env_name) {
        Ok(val) if !val.is_empty() => {
            debug!(field, env_name, "resolved env var");
            Some(val)
        }
        Ok(_) => {
            warn!(field, env_name, "env var is set but empty");
            None
        }
        Err(_) => {
            warn!(field, env_name, "env var not set");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_toml() -> &'static str {
        r#"
[workspace]
root = "/work/project"
log_level = "debug"

[conflict]
local_root = "force-app/main/default"
remote_root = "/tmp/remote-snapshot"
compare = "size"
ignore_patterns = ["**/*.bak"]
sync_command = ["sfdx", "force:source:deploy", "-p"]

[execute]
program = "sf"
args = ["apex", "run"]
file_flag = "--file"
target_org_flag = "--target-org"
target_org = "dev-hub"
"#
    }

    #[test]
    fn test_parse_full_config() {
        let config: AppConfig = toml::from_str(sample_toml()).expect("failed to parse toml");
        assert_eq!(config.workspace.log_level, "debug");
        assert_eq!(config.conflict.compare, ComparisonStrategy::Size);
        assert_eq!(config.conflict.ignore_patterns, vec!["**/*.bak"]);
        assert_eq!(config.execute.program, "sf");
        assert_eq!(config.execute.target_org.as_deref(), Some("dev-hub"));
        assert_eq!(
            config.conflict.sync_command.as_deref(),
            Some(&["sfdx".to_string(), "force:source:deploy".into(), "-p".into()][..])
        );
    }

    #[test]
    fn test_roots_resolve_against_workspace() {
        let config: AppConfig = toml::from_str(sample_toml()).unwrap();
        assert_eq!(
            config.local_root(),
            PathBuf::from("/work/project/force-app/main/default")
        );
        // Absolute paths replace the workspace root.
        assert_eq!(config.remote_root(), PathBuf::from("/tmp/remote-snapshot"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forcesync.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(sample_toml().as_bytes()).unwrap();

        let config = AppConfig::load_from_file(&path).expect("load_from_file failed");
        assert_eq!(config.execute.file_flag, "--file");
    }

    #[test]
    fn test_file_not_found() {
        let result = AppConfig::load_from_file("/nonexistent/forcesync.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[conflict\nlocal_root = ").unwrap();
        let result = AppConfig::load_from_file(&path);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.workspace.root, PathBuf::from("."));
        assert_eq!(config.workspace.log_level, "info");
        assert_eq!(config.conflict.local_root, PathBuf::from("force-app"));
        assert_eq!(config.conflict.compare, ComparisonStrategy::Content);
        assert!(config.conflict.sync_command.is_none());
        assert_eq!(config.execute.program, "sfdx");
        assert_eq!(config.execute.args, vec!["force:apex:execute"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_template_parses_and_validates() {
        let config: AppConfig = toml::from_str(AppConfig::default_toml()).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_same_roots() {
        let mut config = AppConfig::default();
        config.conflict.remote_root = config.conflict.local_root.clone();
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "conflict.remote_root"
        ));
    }

    #[test]
    fn test_validate_rejects_nested_roots() {
        let mut config = AppConfig::default();
        config.conflict.local_root = PathBuf::from(".");
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, ref detail })
                if field == "conflict.remote_root" && detail.contains("contain")
        ));

        config.conflict.local_root = PathBuf::from("./project/force-app");
        config.conflict.remote_root = PathBuf::from("project");
        assert!(config.validate().is_err());

        config.conflict.remote_root = PathBuf::from("project/force-app-remote");
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_empty_sync_command() {
        let mut config = AppConfig::default();
        config.conflict.sync_command = Some(Vec::new());
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "conflict.sync_command"
        ));
    }

    #[test]
    fn test_validate_log_level() {
        let mut config = AppConfig::default();
        config.workspace.log_level = "verbose".into();
        assert!(config.validate().is_err());

        config.workspace.log_level = "forcesync_core=trace,info".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_resolve_env_vars() {
        std::env::set_var("FORCESYNC_TEST_TARGET_ORG", "scratch-42");

        let mut config: AppConfig = toml::from_str(
            r#"
[execute]
target_org = "fallback"
target_org_env = "FORCESYNC_TEST_TARGET_ORG"
"#,
        )
        .unwrap();
        config.resolve_env_vars().unwrap();
        assert_eq!(config.execute.target_org.as_deref(), Some("scratch-42"));

        std::env::remove_var("FORCESYNC_TEST_TARGET_ORG");
    }

    #[test]
    fn test_resolve_env_vars_keeps_literal_when_unset() {
        let mut config: AppConfig = toml::from_str(
            r#"
[execute]
target_org = "fallback"
target_org_env = "FORCESYNC_TEST_UNSET_VARIABLE"
"#,
        )
        .unwrap();
        config.resolve_env_vars().unwrap();
        assert_eq!(config.execute.target_org.as_deref(), Some("fallback"));
    }
}
