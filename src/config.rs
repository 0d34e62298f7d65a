//! Configuration resolution.
//!
//! Produces the one [`EffectiveConfig`] a client lives with, by merging four
//! sources field by field. Highest precedence wins:
//!
//! 1. Explicit overrides ([`ClientOverrides`], e.g. CLI `--url` / `--api-key`)
//! 2. Environment variables `OPENWEBUI_URL` / `OPENWEBUI_API_KEY`
//! 3. Project file `./.owui/config.yaml`
//! 4. User file `~/.owui/config.yaml`
//!
//! A source that only sets one field still contributes that field; the other
//! falls through to the next source.
//!
//! ```yaml
//! server:
//!   url: https://chat.example.com
//!   api_key: sk-...
//! client:
//!   timeout_secs: 30
//!   upload_concurrency: 8
//! ```
//!
//! Resolution is pure value merging: no network access happens here.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Environment variable holding the server URL.
pub const ENV_URL: &str = "OPENWEBUI_URL";
/// Environment variable holding the API key.
pub const ENV_API_KEY: &str = "OPENWEBUI_API_KEY";

const CONFIG_DIR: &str = ".owui";
const CONFIG_FILE: &str = "config.yaml";

/// Resolved server coordinates. Immutable for the lifetime of a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveConfig {
    /// Base URL without a trailing slash.
    pub server_url: String,
    /// Bearer token.
    pub api_key: String,
}

/// Values supplied directly by the caller. They beat every other source.
#[derive(Debug, Clone, Default)]
pub struct ClientOverrides {
    pub url: Option<String>,
    pub api_key: Option<String>,
}

/// Transport tuning that is not part of the credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    pub timeout_secs: u64,
    /// Maximum number of concurrent uploads/deletions in batch operations.
    pub upload_concurrency: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            upload_concurrency: default_upload_concurrency(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_upload_concurrency() -> usize {
    8
}

/// On-disk YAML document.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub client: ClientSection,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ServerSection {
    pub url: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ClientSection {
    pub timeout_secs: Option<u64>,
    pub upload_concurrency: Option<usize>,
}

/// Everything the resolver reads, gathered up front.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    pub user_file: Option<ConfigFile>,
    pub project_file: Option<ConfigFile>,
    pub env_url: Option<String>,
    pub env_api_key: Option<String>,
}

impl ConfigSources {
    /// Reads the user file under `$HOME`, the project file under the
    /// current directory, and the process environment.
    pub fn discover() -> Result<Self> {
        let user_path = home_dir().map(|home| config_path_in(&home));
        let project_path = config_path_in(Path::new("."));
        Self::from_paths(user_path.as_deref(), &project_path, |key| {
            std::env::var(key).ok()
        })
    }

    /// Builds sources from explicit file locations and an environment lookup.
    ///
    /// Missing files are skipped; unreadable or malformed files are errors.
    pub fn from_paths(
        user_path: Option<&Path>,
        project_path: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let user_file = match user_path {
            Some(path) => load_config_file(path)?,
            None => None,
        };
        let project_file = load_config_file(project_path)?;

        Ok(Self {
            user_file,
            project_file,
            env_url: env(ENV_URL),
            env_api_key: env(ENV_API_KEY),
        })
    }

    /// Merges all sources under `overrides` into an [`EffectiveConfig`].
    pub fn resolve(&self, overrides: &ClientOverrides) -> Result<EffectiveConfig> {
        let server_url = first_set(
            [
                overrides.url.as_deref(),
                self.env_url.as_deref(),
                self.project_file.as_ref().and_then(|f| f.server.url.as_deref()),
                self.user_file.as_ref().and_then(|f| f.server.url.as_deref()),
            ],
            |url| url.trim().trim_end_matches('/'),
        )
        .map(str::to_string)
        .ok_or_else(|| {
            Error::Configuration(format!(
                "server URL is not configured. Set {ENV_URL}, pass --url, or set \
                 'server.url' in ~/{CONFIG_DIR}/{CONFIG_FILE} or ./{CONFIG_DIR}/{CONFIG_FILE}"
            ))
        })?;

        let api_key = first_set(
            [
                overrides.api_key.as_deref(),
                self.env_api_key.as_deref(),
                self.project_file
                    .as_ref()
                    .and_then(|f| f.server.api_key.as_deref()),
                self.user_file
                    .as_ref()
                    .and_then(|f| f.server.api_key.as_deref()),
            ],
            str::trim,
        )
        .map(str::to_string)
        .ok_or_else(|| {
            Error::Configuration(format!(
                "API key is not configured. Set {ENV_API_KEY}, pass --api-key, or set \
                 'server.api_key' in ~/{CONFIG_DIR}/{CONFIG_FILE} or ./{CONFIG_DIR}/{CONFIG_FILE}"
            ))
        })?;

        Ok(EffectiveConfig {
            server_url,
            api_key,
        })
    }

    /// Client options from the project file, then the user file, then defaults.
    pub fn client_options(&self) -> ClientOptions {
        let files = [self.project_file.as_ref(), self.user_file.as_ref()];
        let timeout_secs = files
            .iter()
            .flatten()
            .find_map(|f| f.client.timeout_secs)
            .unwrap_or_else(default_timeout_secs);
        let upload_concurrency = files
            .iter()
            .flatten()
            .find_map(|f| f.client.upload_concurrency)
            .filter(|n| *n > 0)
            .unwrap_or_else(default_upload_concurrency);

        ClientOptions {
            timeout_secs,
            upload_concurrency,
        }
    }
}

/// First candidate that is still non-empty once `clean` has normalized it.
fn first_set<'a, const N: usize>(
    candidates: [Option<&'a str>; N],
    clean: impl Fn(&'a str) -> &'a str,
) -> Option<&'a str> {
    candidates
        .into_iter()
        .flatten()
        .map(clean)
        .find(|v| !v.is_empty())
}

/// Loads one YAML config file.
///
/// Returns `Ok(None)` when the file does not exist or its root is not a
/// mapping (an empty file, for example).
pub fn load_config_file(path: &Path) -> Result<Option<ConfigFile>> {
    if !path.is_file() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Configuration(format!("failed to read config file {}: {}", path.display(), e))
    })?;

    let value: serde_yaml_ng::Value = serde_yaml_ng::from_str(&content).map_err(|e| {
        Error::Configuration(format!(
            "failed to parse config file {}: {}",
            path.display(),
            e
        ))
    })?;

    if !value.is_mapping() {
        tracing::debug!(path = %path.display(), "config file root is not a mapping, ignoring");
        return Ok(None);
    }

    let file: ConfigFile = serde_yaml_ng::from_value(value).map_err(|e| {
        Error::Configuration(format!(
            "invalid config file {}: {}",
            path.display(),
            e
        ))
    })?;

    Ok(Some(file))
}

/// `<dir>/.owui/config.yaml`
pub fn config_path_in(dir: &Path) -> PathBuf {
    dir.join(CONFIG_DIR).join(CONFIG_FILE)
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn file(url: Option<&str>, key: Option<&str>) -> Option<ConfigFile> {
        Some(ConfigFile {
            server: ServerSection {
                url: url.map(str::to_string),
                api_key: key.map(str::to_string),
            },
            client: ClientSection::default(),
        })
    }

    #[test]
    fn test_override_beats_everything() {
        let sources = ConfigSources {
            user_file: file(Some("http://user"), Some("user-key")),
            project_file: file(Some("http://project"), Some("project-key")),
            env_url: Some("http://env".into()),
            env_api_key: Some("env-key".into()),
        };
        let overrides = ClientOverrides {
            url: Some("http://override/".into()),
            api_key: None,
        };
        let cfg = sources.resolve(&overrides).unwrap();
        assert_eq!(cfg.server_url, "http://override");
        assert_eq!(cfg.api_key, "env-key");
    }

    #[test]
    fn test_field_level_precedence_across_sources() {
        let sources = ConfigSources {
            user_file: None,
            project_file: file(None, Some("project-key")),
            env_url: Some("http://env".into()),
            env_api_key: None,
        };
        let cfg = sources.resolve(&ClientOverrides::default()).unwrap();
        assert_eq!(cfg.server_url, "http://env");
        assert_eq!(cfg.api_key, "project-key");
    }

    #[test]
    fn test_project_beats_user() {
        let sources = ConfigSources {
            user_file: file(Some("http://user"), Some("user-key")),
            project_file: file(Some("http://project"), None),
            ..Default::default()
        };
        let cfg = sources.resolve(&ClientOverrides::default()).unwrap();
        assert_eq!(cfg.server_url, "http://project");
        assert_eq!(cfg.api_key, "user-key");
    }

    #[test]
    fn test_trailing_slashes_stripped() {
        let sources = ConfigSources {
            env_url: Some("https://chat.example.com///".into()),
            env_api_key: Some("k".into()),
            ..Default::default()
        };
        let cfg = sources.resolve(&ClientOverrides::default()).unwrap();
        assert_eq!(cfg.server_url, "https://chat.example.com");
    }

    #[test]
    fn test_empty_values_fall_through() {
        let sources = ConfigSources {
            user_file: file(Some("http://user"), Some("user-key")),
            env_url: Some(String::new()),
            env_api_key: Some("  ".into()),
            ..Default::default()
        };
        let cfg = sources.resolve(&ClientOverrides::default()).unwrap();
        assert_eq!(cfg.server_url, "http://user");
        assert_eq!(cfg.api_key, "user-key");
    }

    #[test]
    fn test_slash_only_url_falls_through() {
        let sources = ConfigSources {
            project_file: file(Some(" / "), Some("project-key")),
            env_url: Some("http://env/".into()),
            env_api_key: None,
            ..Default::default()
        };
        let overrides = ClientOverrides {
            url: Some("/".into()),
            api_key: None,
        };
        let cfg = sources.resolve(&overrides).unwrap();
        assert_eq!(cfg.server_url, "http://env");

        let sources = ConfigSources {
            user_file: file(Some("http://user"), Some("user-key")),
            project_file: file(Some("//"), None),
            ..Default::default()
        };
        let cfg = sources.resolve(&ClientOverrides::default()).unwrap();
        assert_eq!(cfg.server_url, "http://user");
    }

    #[test]
    fn test_missing_url_fails() {
        let sources = ConfigSources {
            env_api_key: Some("k".into()),
            ..Default::default()
        };
        let err = sources.resolve(&ClientOverrides::default()).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains(ENV_URL));
    }

    #[test]
    fn test_missing_key_fails() {
        let sources = ConfigSources {
            env_url: Some("http://env".into()),
            ..Default::default()
        };
        let err = sources.resolve(&ClientOverrides::default()).unwrap_err();
        assert!(err.to_string().contains(ENV_API_KEY));
    }

    #[test]
    fn test_resolution_idempotent() {
        let sources = ConfigSources {
            project_file: file(Some("http://project/"), Some("k")),
            ..Default::default()
        };
        let a = sources.resolve(&ClientOverrides::default()).unwrap();
        let b = sources.resolve(&ClientOverrides::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_from_paths_reads_yaml_files() {
        let tmp = TempDir::new().unwrap();
        let home = tmp.path().join("home");
        let project = tmp.path().join("project");
        std::fs::create_dir_all(home.join(CONFIG_DIR)).unwrap();
        std::fs::create_dir_all(project.join(CONFIG_DIR)).unwrap();
        std::fs::write(
            config_path_in(&home),
            "server:\n  url: http://home.example\n  api_key: home-key\nclient:\n  timeout_secs: 5\n",
        )
        .unwrap();
        std::fs::write(
            config_path_in(&project),
            "server:\n  url: http://project.example/\nclient:\n  upload_concurrency: 2\n",
        )
        .unwrap();

        let env: HashMap<&str, &str> = HashMap::new();
        let sources = ConfigSources::from_paths(
            Some(&config_path_in(&home)),
            &config_path_in(&project),
            |k| env.get(k).map(|v| v.to_string()),
        )
        .unwrap();

        let cfg = sources.resolve(&ClientOverrides::default()).unwrap();
        assert_eq!(cfg.server_url, "http://project.example");
        assert_eq!(cfg.api_key, "home-key");

        let options = sources.client_options();
        assert_eq!(options.timeout_secs, 5);
        assert_eq!(options.upload_concurrency, 2);
    }

    #[test]
    fn test_non_mapping_file_is_ignored() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.yaml");
        std::fs::write(&path, "").unwrap();
        assert!(load_config_file(&path).unwrap().is_none());
        std::fs::write(&path, "- just\n- a list\n").unwrap();
        assert!(load_config_file(&path).unwrap().is_none());
    }

    #[test]
    fn test_malformed_file_is_configuration_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.yaml");
        std::fs::write(&path, "server: [unclosed\n").unwrap();
        let err = load_config_file(&path).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("config.yaml"));
    }

    #[test]
    fn test_default_client_options() {
        let options = ConfigSources::default().client_options();
        assert_eq!(options, ClientOptions::default());
        assert_eq!(options.timeout_secs, 30);
        assert_eq!(options.upload_concurrency, 8);
    }
}
