//! Session configuration.
//!
//! Values come from an optional `replay.toml` and are then overridden by
//! `REPLAY_*` environment variables. Anything that fails to parse is a
//! [`ReplayError::Config`]; a missing file just means defaults.

use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use strum_macros::Display;
use strum_macros::EnumString;
use url::Url;

use crate::error::ReplayError;
use crate::error::Result;
use crate::transport::DEFAULT_LIVE_TIMEOUT;

/// Directory, under the configured fixture directory, that holds fixtures.
pub const FIXTURE_SUBDIR: &str = "__replays__";

/// File stem of the fixture shared by every test.
pub const SHARED_FIXTURE_FILENAME: &str = "shared";

pub const DEFAULT_CONFIG_FILENAME: &str = "replay.toml";

pub const ENV_ACTIVE: &str = "REPLAY_ACTIVE";
pub const ENV_MODE: &str = "REPLAY_MODE";
pub const ENV_FIXTURE_DIR: &str = "REPLAY_FIXTURE_DIR";
pub const ENV_FIXTURE_NAME: &str = "REPLAY_FIXTURE_NAME";
pub const ENV_SHARED_FIXTURE_DIR: &str = "REPLAY_SHARED_FIXTURE_DIR";
pub const ENV_GRAPHQL_ENDPOINTS: &str = "REPLAY_GRAPHQL_ENDPOINTS";
pub const ENV_LIVE_TIMEOUT_MS: &str = "REPLAY_LIVE_TIMEOUT_MS";

/// What happens when no stored response matches a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum Mode {
    /// Go live and record every delivered response.
    Capture,
    /// Go live, record nothing.
    ReplayOrLive,
    /// Fail the request.
    #[default]
    ReplayOrFail,
}

impl Mode {
    /// Accepts `replay-or-live`, `REPLAY_OR_LIVE`, `Replay_Or-Live`, ...
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = raw.trim().replace('_', "-");
        Self::from_str(&normalized).map_err(|_| {
            ReplayError::config(format!(
                "unknown mode `{raw}` (expected capture, replay-or-live or replay-or-fail)"
            ))
        })
    }

    pub fn should_record(self) -> bool {
        matches!(self, Self::Capture)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayConfig {
    pub is_active: bool,
    pub mode: Mode,
    pub fixture_directory: Option<PathBuf>,
    pub fixture_filename: Option<String>,
    pub shared_fixture_directory: Option<PathBuf>,
    /// Endpoints whose requests are identified by GraphQL signature.
    pub graphql_endpoints: Vec<Url>,
    pub live_timeout: Duration,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            is_active: false,
            mode: Mode::default(),
            fixture_directory: None,
            fixture_filename: None,
            shared_fixture_directory: None,
            graphql_endpoints: Vec::new(),
            live_timeout: DEFAULT_LIVE_TIMEOUT,
        }
    }
}

/// On-disk shape of `replay.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    is_active: Option<bool>,
    mode: Option<String>,
    fixture_directory: Option<PathBuf>,
    fixture_filename: Option<String>,
    shared_fixture_directory: Option<PathBuf>,
    #[serde(default)]
    graphql_endpoints: Vec<String>,
    live_timeout_ms: Option<u64>,
}

impl ReplayConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Read `path` if it exists, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path).map_err(|e| {
                ReplayError::config(format!("failed to read {}: {e}", path.display()))
            })?;
            Self::from_toml_str(&contents)?
        } else {
            tracing::debug!("{} not found, using defaults", path.display());
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents)
            .map_err(|e| ReplayError::config(format!("failed to parse config: {e}")))?;

        let mut config = Self::default();
        if let Some(is_active) = file.is_active {
            config.is_active = is_active;
        }
        if let Some(mode) = file.mode.as_deref() {
            config.mode = Mode::parse(mode)?;
        }
        config.fixture_directory = file.fixture_directory;
        config.fixture_filename = file.fixture_filename;
        config.shared_fixture_directory = file.shared_fixture_directory;
        config.graphql_endpoints = file
            .graphql_endpoints
            .iter()
            .map(String::as_str)
            .map(parse_endpoint)
            .collect::<Result<_>>()?;
        if let Some(ms) = file.live_timeout_ms {
            config.live_timeout = Duration::from_millis(ms);
        }
        Ok(config)
    }

    /// Overlay values from `lookup`, which maps an environment variable name
    /// to its value. Unset or empty variables leave the current value alone.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(raw) = get(ENV_ACTIVE) {
            self.is_active = parse_flag(ENV_ACTIVE, &raw)?;
        }
        if let Some(raw) = get(ENV_MODE) {
            self.mode = Mode::parse(&raw)?;
        }
        if let Some(raw) = get(ENV_FIXTURE_DIR) {
            self.fixture_directory = Some(PathBuf::from(raw));
        }
        if let Some(raw) = get(ENV_FIXTURE_NAME) {
            self.fixture_filename = Some(raw);
        }
        if let Some(raw) = get(ENV_SHARED_FIXTURE_DIR) {
            self.shared_fixture_directory = Some(PathBuf::from(raw));
        }
        if let Some(raw) = get(ENV_GRAPHQL_ENDPOINTS) {
            self.graphql_endpoints = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(parse_endpoint)
                .collect::<Result<_>>()?;
        }
        if let Some(raw) = get(ENV_LIVE_TIMEOUT_MS) {
            let ms: u64 = raw.trim().parse().map_err(|_| {
                ReplayError::config(format!(
                    "{ENV_LIVE_TIMEOUT_MS} must be an integer, got `{raw}`"
                ))
            })?;
            self.live_timeout = Duration::from_millis(ms);
        }
        Ok(())
    }

    /// `<fixture_directory>/__replays__/<fixture_filename>.json`
    pub fn fixture_path(&self) -> Result<PathBuf> {
        let directory = self
            .fixture_directory
            .as_ref()
            .ok_or(ReplayError::FixturePathNotFound {
                setting: "fixture_directory",
            })?;
        let filename = self
            .fixture_filename
            .as_deref()
            .filter(|name| !name.is_empty())
            .ok_or(ReplayError::FixturePathNotFound {
                setting: "fixture_filename",
            })?;
        Ok(fixture_file(directory, filename))
    }

    /// `<shared_fixture_directory>/__replays__/shared.json`, when configured.
    pub fn shared_fixture_path(&self) -> Option<PathBuf> {
        self.shared_fixture_directory
            .as_deref()
            .map(|directory| fixture_file(directory, SHARED_FIXTURE_FILENAME))
    }
}

fn fixture_file(directory: &Path, stem: &str) -> PathBuf {
    directory.join(FIXTURE_SUBDIR).join(format!("{stem}.json"))
}

/// Filesystem-safe fixture name for one test case, e.g. `Checkout_pays_twice`.
pub fn fixture_name(suite: &str, test: &str) -> String {
    format!("{suite}_{test}")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn parse_flag(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ReplayError::config(format!(
            "{key} must be a boolean flag, got `{raw}`"
        ))),
    }
}

fn parse_endpoint(raw: &str) -> Result<Url> {
    Url::parse(raw.trim())
        .map_err(|e| ReplayError::config(format!("invalid GraphQL endpoint `{raw}`: {e}")))
}
