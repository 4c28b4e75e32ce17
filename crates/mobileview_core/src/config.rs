use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_CONFIG_PATH: &str = ".mobileview/config.toml";
pub const DEFAULT_USER_AGENT: &str = "mobileview/0.2";
pub const DEFAULT_SCRIPT_PATH: &str = "/w/index.php";

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct WikiConfig {
    #[serde(default)]
    pub wiki: WikiSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct WikiSection {
    pub url: Option<String>,
    pub api_url: Option<String>,
    pub script_path: Option<String>,
    pub user_agent: Option<String>,
}

impl WikiConfig {
    /// Resolve the wiki API URL: env WIKI_API_URL > config > None.
    pub fn api_url(&self) -> Option<String> {
        self.api_url_with(&env_lookup)
    }

    /// Resolve the wiki base URL: env WIKI_URL > config > derived from api_url.
    pub fn wiki_url(&self) -> Option<String> {
        self.wiki_url_with(&env_lookup)
    }

    /// Resolve user agent: env WIKI_USER_AGENT > config > DEFAULT_USER_AGENT.
    pub fn user_agent(&self) -> String {
        self.user_agent_with(&env_lookup)
    }

    /// Resolve the index.php entry point used for history links:
    /// env WIKI_SCRIPT_PATH > config > `<wiki url>/index.php` > DEFAULT_SCRIPT_PATH.
    pub fn script_path(&self) -> String {
        self.script_path_with(&env_lookup)
    }

    fn api_url_with<F>(&self, lookup: &F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        resolve(lookup, "WIKI_API_URL", &self.wiki.api_url)
    }

    fn wiki_url_with<F>(&self, lookup: &F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        resolve(lookup, "WIKI_URL", &self.wiki.url)
            .or_else(|| self.api_url_with(lookup).and_then(|api| derive_wiki_url(&api)))
    }

    fn user_agent_with<F>(&self, lookup: &F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        resolve(lookup, "WIKI_USER_AGENT", &self.wiki.user_agent)
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string())
    }

    fn script_path_with<F>(&self, lookup: &F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = resolve(lookup, "WIKI_SCRIPT_PATH", &self.wiki.script_path) {
            return path;
        }
        self.wiki_url_with(lookup)
            .map(|url| format!("{}/index.php", url.trim_end_matches('/')))
            .unwrap_or_else(|| DEFAULT_SCRIPT_PATH.to_string())
    }
}

/// Read the `[wiki]` table from a TOML file. A missing file yields the defaults;
/// any other read failure or malformed content is an error naming the path.
pub fn load_config(config_path: &Path) -> Result<WikiConfig> {
    match fs::read_to_string(config_path) {
        Ok(content) => parse_config(&content)
            .with_context(|| format!("invalid config file {}", config_path.display())),
        Err(error) if error.kind() == ErrorKind::NotFound => {
            debug!(path = %config_path.display(), "config file not found; using defaults");
            Ok(WikiConfig::default())
        }
        Err(error) => {
            Err(error).with_context(|| format!("cannot read config file {}", config_path.display()))
        }
    }
}

pub fn parse_config(content: &str) -> Result<WikiConfig> {
    toml::from_str(content).context("config is not a valid [wiki] TOML document")
}

/// Derive wiki base URL from an API URL by stripping `/api.php`.
pub fn derive_wiki_url(api_url: &str) -> Option<String> {
    let trimmed = api_url.trim();
    let stripped = trimmed.strip_suffix("/api.php").unwrap_or(trimmed);
    non_empty(stripped.trim_end_matches('/'))
}

/// Env value first, then the config value. Blank values count as unset at both levels.
fn resolve<F>(lookup: &F, key: &str, configured: &Option<String>) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|value| non_empty(&value))
        .or_else(|| configured.as_deref().and_then(non_empty))
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn env_lookup(key: &str) -> Option<String> {
    env::var(key).ok()
}
