mod values;

use crate::locator::Selector;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use rust_embed::RustEmbed;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(RustEmbed)]
#[folder = "src/conf/"]
#[include = "*.toml"]
struct EmbeddedConfigFS;

const DEFAULT_CONFIG_FILE: &str = "default_config.toml";

/// Prefix for environment variables that override any setting, e.g.
/// `ACTIONS_MIRROR_MONITOR__POLL_INTERVAL=30s`.
const ENV_PREFIX: &str = "ACTIONS_MIRROR_";

/// Variables the deployment scripts already export. They take priority over everything else.
const DEPLOYMENT_VARS: [(&str, &str); 8] = [
    ("GITHUB_TOKEN", "github.token"),
    ("GITHUB_REPO", "github.repo"),
    ("GITLAB_TOKEN", "gitlab.token"),
    ("GITLAB_PROJECT_ID", "gitlab.project_id"),
    ("COMMIT_SHA", "selector.commit_sha"),
    ("BRANCH_NAME", "selector.branch"),
    ("POLL_INTERVAL", "monitor.poll_interval"),
    ("ENVIRONMENT", "general.environment"),
];

/// Represents the ways loading or validating configuration can fail. All of them are fatal.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("could not find configuration file '{0}'")]
    FileNotFound(String),

    #[error("could not parse configuration; {0}")]
    Parse(String),

    #[error("{env_var} ('{key}') is required")]
    Missing {
        key: &'static str,
        env_var: &'static str,
    },

    #[error("no selector set; one of BRANCH_NAME ('selector.branch') or COMMIT_SHA ('selector.commit_sha') is required")]
    MissingSelector,

    #[error("selector is ambiguous; set only one of 'selector.branch' or 'selector.commit_sha'")]
    AmbiguousSelector,

    #[error("invalid value for '{key}'; {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub general: General,
    pub monitor: Monitor,
    pub github: Github,
    pub gitlab: Gitlab,
    #[serde(default)]
    pub selector: SelectorConfig,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct General {
    /// Any tracing filter directive; `RUST_LOG` wins if it's set.
    pub log_level: String,

    /// Where the deployment log and the API response journal are written. Usually collected as a
    /// CI artifact.
    pub log_dir: PathBuf,

    /// Only used in log text and the commit status context.
    #[serde(deserialize_with = "values::string")]
    pub environment: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Monitor {
    #[serde(deserialize_with = "values::duration")]
    pub poll_interval: Duration,

    /// Ceiling on the whole monitoring session.
    #[serde(deserialize_with = "values::duration")]
    pub timeout: Duration,

    /// Ceiling on how long we wait for the workflow run to show up at all.
    #[serde(deserialize_with = "values::duration")]
    pub search_timeout: Duration,

    /// Applied to every HTTP request. Should be shorter than the poll interval.
    #[serde(deserialize_with = "values::duration")]
    pub request_timeout: Duration,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Github {
    pub api_url: String,
    #[serde(deserialize_with = "values::string")]
    pub token: String,

    /// In `owner/name` form.
    #[serde(deserialize_with = "values::string")]
    pub repo: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Gitlab {
    pub api_url: String,
    #[serde(deserialize_with = "values::string")]
    pub token: String,

    /// Either the numeric project id or the `group/project` path.
    #[serde(deserialize_with = "values::string")]
    pub project_id: String,

    /// Label for the commit status; the environment is appended in parentheses.
    pub context: String,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct SelectorConfig {
    #[serde(default, deserialize_with = "values::optional_string")]
    pub branch: Option<String>,
    #[serde(default, deserialize_with = "values::optional_string")]
    pub commit_sha: Option<String>,
}

/// Returns the default configuration paths that are searched in case user does not specify.
fn config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/actions-mirror/config.toml")];

    if let Some(home) = std::env::var_os("HOME") {
        paths.push(Path::new(&home).join(".config/actions-mirror.toml"));
    }

    paths
}

/// Layers the deployment script variables on top of `figment` as plain strings.
///
/// These are read directly rather than through `Env`, which parses values first and would turn a
/// branch named `2.0` into `2` or a short SHA like `0123456` into `123456`.
fn merge_deployment_vars(mut figment: Figment) -> Figment {
    for (var, key) in DEPLOYMENT_VARS {
        if let Ok(value) = std::env::var(var) {
            figment = figment.merge(Serialized::default(key, value));
        }
    }

    figment
}

impl Config {
    /// Returns a deserialized config from the embedded defaults, config files and environment.
    ///
    /// Sources are layered, later ones overriding earlier ones: embedded defaults, then either
    /// `path_override` or the default search paths, then `ACTIONS_MIRROR_*` variables, then the
    /// deployment script variables (`GITHUB_TOKEN`, `COMMIT_SHA`, ...).
    pub fn load(path_override: Option<&Path>) -> Result<Self, ConfigError> {
        let default_config = EmbeddedConfigFS::get(DEFAULT_CONFIG_FILE)
            .ok_or_else(|| ConfigError::FileNotFound(DEFAULT_CONFIG_FILE.into()))?;
        let default_config = std::str::from_utf8(&default_config.data)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;

        let mut figment = Figment::from(Toml::string(default_config));

        match path_override {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::FileNotFound(path.to_string_lossy().into()));
                }
                figment = figment.merge(Toml::file(path));
            }
            None => {
                for path in config_paths() {
                    figment = figment.merge(Toml::file(path));
                }
            }
        }

        let figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        merge_deployment_vars(figment)
            .extract::<Config>()
            .map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Checks only what talking to GitHub needs.
    pub fn validate_github(&self) -> Result<(), ConfigError> {
        if self.github.token.trim().is_empty() {
            return Err(ConfigError::Missing {
                key: "github.token",
                env_var: "GITHUB_TOKEN",
            });
        }
        if self.github.repo.trim().is_empty() {
            return Err(ConfigError::Missing {
                key: "github.repo",
                env_var: "GITHUB_REPO",
            });
        }
        if !self.github.repo.contains('/') {
            return Err(ConfigError::Invalid {
                key: "github.repo",
                reason: format!("expected 'owner/name', got '{}'", self.github.repo),
            });
        }
        if self.monitor.request_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                key: "monitor.request_timeout",
                reason: "must be greater than zero".into(),
            });
        }

        Ok(())
    }

    /// Checks everything the monitor needs before it enters the poll loop.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_github()?;

        if self.gitlab.token.trim().is_empty() {
            return Err(ConfigError::Missing {
                key: "gitlab.token",
                env_var: "GITLAB_TOKEN",
            });
        }
        if self.gitlab.project_id.trim().is_empty() {
            return Err(ConfigError::Missing {
                key: "gitlab.project_id",
                env_var: "GITLAB_PROJECT_ID",
            });
        }
        if self.monitor.poll_interval.is_zero() {
            return Err(ConfigError::Invalid {
                key: "monitor.poll_interval",
                reason: "must be greater than zero".into(),
            });
        }
        if self.monitor.timeout.is_zero() {
            return Err(ConfigError::Invalid {
                key: "monitor.timeout",
                reason: "must be greater than zero".into(),
            });
        }

        self.selector()?;

        Ok(())
    }

    /// The run selector, fixed for the lifetime of the process.
    pub fn selector(&self) -> Result<Selector, ConfigError> {
        match (&self.selector.branch, &self.selector.commit_sha) {
            (Some(branch), None) => Ok(Selector::Branch(branch.trim().to_string())),
            (None, Some(sha)) => Ok(Selector::Commit(sha.trim().to_string())),
            (Some(_), Some(_)) => Err(ConfigError::AmbiguousSelector),
            (None, None) => Err(ConfigError::MissingSelector),
        }
    }

    /// The label GitLab shows next to the commit status.
    pub fn status_context(&self) -> String {
        format!("{} ({})", self.gitlab.context, self.general.environment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use pretty_assertions::assert_eq;

    fn load_in_jail() -> figment::error::Result<Config> {
        Config::load(Some(Path::new("empty.toml"))).map_err(|e| e.to_string().into())
    }

    #[test]
    /// Test that the default config is properly parsed from the embedded file.
    fn parse_default_config() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file("empty.toml", "")?;
            let config = load_in_jail()?;

            let expected = Config {
                general: General {
                    log_level: "info".into(),
                    log_dir: PathBuf::from("gitlab-logs"),
                    environment: "unknown".into(),
                },
                monitor: Monitor {
                    poll_interval: Duration::from_secs(10),
                    timeout: Duration::from_secs(45 * 60),
                    search_timeout: Duration::from_secs(5 * 60),
                    request_timeout: Duration::from_secs(8),
                },
                github: Github {
                    api_url: "https://api.github.com".into(),
                    token: "".into(),
                    repo: "".into(),
                },
                gitlab: Gitlab {
                    api_url: "https://gitlab.com/api/v4".into(),
                    token: "".into(),
                    project_id: "".into(),
                    context: "GitHub Actions Deployment".into(),
                },
                selector: SelectorConfig::default(),
            };

            assert_eq!(config, expected);
            assert_eq!(
                config.validate(),
                Err(ConfigError::Missing {
                    key: "github.token",
                    env_var: "GITHUB_TOKEN"
                })
            );
            Ok(())
        });
    }

    #[test]
    /// Test that deployment script variables fill in a complete, valid config.
    fn parse_deployment_env_vars() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file("empty.toml", "")?;
            jail.set_env("GITHUB_TOKEN", "gh-token");
            jail.set_env("GITHUB_REPO", "acme/app");
            jail.set_env("GITLAB_TOKEN", "gl-token");
            jail.set_env("GITLAB_PROJECT_ID", "1234");
            jail.set_env("COMMIT_SHA", "0a1b2c3d4e");
            jail.set_env("POLL_INTERVAL", "30s");
            jail.set_env("ENVIRONMENT", "staging");

            let config = load_in_jail()?;
            assert_eq!(config.validate(), Ok(()));
            assert_eq!(config.gitlab.project_id, "1234");
            assert_eq!(config.monitor.poll_interval, Duration::from_secs(30));
            assert_eq!(
                config.selector(),
                Ok(Selector::Commit("0a1b2c3d4e".into()))
            );
            assert_eq!(
                config.status_context(),
                "GitHub Actions Deployment (staging)"
            );
            Ok(())
        });
    }

    #[test]
    /// Test that layered sources override in order: file, prefixed env, deployment env.
    fn layered_overrides() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(
                "custom.toml",
                r#"
                [monitor]
                poll_interval = 20
                timeout = "1h"

                [selector]
                branch = "release"
                "#,
            )?;
            jail.set_env("ACTIONS_MIRROR_MONITOR__TIMEOUT", "2h");
            jail.set_env("ACTIONS_MIRROR_GENERAL__ENVIRONMENT", "from-prefixed");
            jail.set_env("ENVIRONMENT", "from-deployment");

            let config = Config::load(Some(Path::new("custom.toml")))
                .map_err(|e| e.to_string())?;

            assert_eq!(config.monitor.poll_interval, Duration::from_secs(20));
            assert_eq!(config.monitor.timeout, Duration::from_secs(7200));
            assert_eq!(config.general.environment, "from-deployment");
            assert_eq!(config.selector(), Ok(Selector::Branch("release".into())));
            Ok(())
        });
    }

    #[test]
    fn selector_must_be_unambiguous() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file("empty.toml", "")?;
            jail.set_env("COMMIT_SHA", "abc");
            jail.set_env("BRANCH_NAME", "main");

            let config = load_in_jail()?;
            assert_eq!(config.selector(), Err(ConfigError::AmbiguousSelector));

            jail.set_env("BRANCH_NAME", "");
            let config = load_in_jail()?;
            assert_eq!(config.selector(), Ok(Selector::Commit("abc".into())));
            Ok(())
        });
    }

    #[test]
    /// Test that numeric-looking deployment values arrive exactly as they were exported.
    fn deployment_vars_are_kept_verbatim() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file("empty.toml", "")?;
            jail.set_env("BRANCH_NAME", "2.0");
            jail.set_env("GITLAB_PROJECT_ID", "007");
            jail.set_env("GITLAB_TOKEN", "1234e5");

            let config = load_in_jail()?;
            assert_eq!(config.selector(), Ok(Selector::Branch("2.0".into())));
            assert_eq!(config.gitlab.project_id, "007");
            assert_eq!(config.gitlab.token, "1234e5");

            jail.set_env("BRANCH_NAME", "");
            jail.set_env("COMMIT_SHA", "0123456");
            let config = load_in_jail()?;
            assert_eq!(config.selector(), Ok(Selector::Commit("0123456".into())));

            jail.set_env("COMMIT_SHA", "");
            jail.set_env("BRANCH_NAME", "1.10");
            let config = load_in_jail()?;
            assert_eq!(config.selector(), Ok(Selector::Branch("1.10".into())));
            Ok(())
        });
    }

    #[test]
    fn missing_override_file_is_an_error() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            let result = Config::load(Some(Path::new("nope.toml")));
            assert_eq!(result, Err(ConfigError::FileNotFound("nope.toml".into())));
            Ok(())
        });
    }

    #[test]
    fn repo_must_be_owner_and_name() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file("empty.toml", "")?;
            jail.set_env("GITHUB_TOKEN", "gh-token");
            jail.set_env("GITHUB_REPO", "app");

            let config = load_in_jail()?;
            assert!(matches!(
                config.validate_github(),
                Err(ConfigError::Invalid {
                    key: "github.repo",
                    ..
                })
            ));
            Ok(())
        });
    }
}
