use std::env;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::sleep;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, bail};
use reqwest::blocking::Client;
use reqwest::header::USER_AGENT;
use reqwest::{StatusCode, Url};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::WikiConfig;
use crate::raw::{RawLanguageResponse, RawMobileViewResponse};

const MOBILEVIEW_PROPS: &str = "sections|text|lastmodified|lastmodifiedby|id";
const MOBILEVIEW_SECTION_PROPS: &str = "level|line|anchor|references";

/// Source of raw page payloads. Implementations must be shareable across threads
/// because one service instance serves every caller.
pub trait PageTransport: Send + Sync {
    fn mobile_view(&self, title: &str) -> Result<RawMobileViewResponse>;
    fn language_data(&self, title: &str) -> Result<RawLanguageResponse>;
}

#[derive(Debug, Clone)]
pub struct MediaWikiClientConfig {
    pub api_url: String,
    pub user_agent: String,
    pub timeout_ms: u64,
    pub rate_limit_read_ms: u64,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl MediaWikiClientConfig {
    pub fn from_config(config: &WikiConfig) -> Self {
        let api_default = config.wiki.api_url.as_deref().unwrap_or("");
        Self::from_env_with_defaults(api_default, &config.user_agent())
    }

    fn from_env_with_defaults(api_url_default: &str, user_agent_default: &str) -> Self {
        Self {
            api_url: env_value("WIKI_API_URL", api_url_default),
            user_agent: env_value("WIKI_USER_AGENT", user_agent_default),
            timeout_ms: env_value_u64("WIKI_HTTP_TIMEOUT_MS", 30_000),
            rate_limit_read_ms: env_value_u64("WIKI_RATE_LIMIT_READ", 300),
            max_retries: env_value_usize("WIKI_HTTP_RETRIES", 2),
            retry_delay_ms: env_value_u64("WIKI_HTTP_RETRY_DELAY_MS", 500),
        }
    }
}

pub struct MediaWikiClient {
    client: Client,
    config: MediaWikiClientConfig,
    last_request_at: Mutex<Option<Instant>>,
    request_count: AtomicUsize,
}

impl MediaWikiClient {
    pub fn new(config: MediaWikiClientConfig) -> Result<Self> {
        if config.api_url.trim().is_empty() {
            bail!("wiki API URL is not configured (set WIKI_API_URL or [wiki].api_url)");
        }
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .context("failed to build MediaWiki HTTP client")?;

        Ok(Self {
            client,
            config,
            last_request_at: Mutex::new(None),
            request_count: AtomicUsize::new(0),
        })
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    fn request_json_get(&self, params: &[(&str, String)]) -> Result<Value> {
        let url = self.request_url(params)?;
        let mut attempt = 0;
        loop {
            match self.attempt_get(&url, attempt)? {
                Attempt::Done(payload) => return api_payload(payload),
                Attempt::Retry(reason) => {
                    debug!(%url, attempt, %reason, "retrying MediaWiki request");
                    self.wait_before_retry(attempt);
                    attempt += 1;
                }
            }
        }
    }

    /// The API URL with `format=json&formatversion=2` and every non-empty parameter.
    fn request_url(&self, params: &[(&str, String)]) -> Result<Url> {
        let mut url = Url::parse(&self.config.api_url)
            .with_context(|| format!("invalid wiki API URL: {}", self.config.api_url))?;
        url.query_pairs_mut()
            .append_pair("format", "json")
            .append_pair("formatversion", "2")
            .extend_pairs(params.iter().filter(|(_, value)| !value.is_empty()));
        Ok(url)
    }

    fn attempt_get(&self, url: &Url, attempt: usize) -> Result<Attempt> {
        let retries_left = attempt < self.config.max_retries;
        self.apply_rate_limit();
        let response = match self
            .client
            .get(url.clone())
            .header(USER_AGENT, &self.config.user_agent)
            .send()
        {
            Ok(response) => response,
            Err(error) if retries_left && is_retryable_error(&error) => {
                return Ok(Attempt::Retry(error.to_string()));
            }
            Err(error) => return Err(error).context("MediaWiki API request failed"),
        };

        let status = response.status();
        if status.is_success() {
            let payload = response
                .json::<Value>()
                .context("MediaWiki API returned a non-JSON body")?;
            return Ok(Attempt::Done(payload));
        }
        if retries_left && is_retryable_status(status) {
            return Ok(Attempt::Retry(format!("HTTP {status}")));
        }
        bail!("MediaWiki API answered HTTP {status}")
    }

    fn apply_rate_limit(&self) {
        let delay = Duration::from_millis(self.config.rate_limit_read_ms);
        let mut last_request_at = self
            .last_request_at
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(last) = *last_request_at {
            let elapsed = last.elapsed();
            if elapsed < delay {
                sleep(delay - elapsed);
            }
        }
        *last_request_at = Some(Instant::now());
        self.request_count.fetch_add(1, Ordering::SeqCst);
    }

    fn wait_before_retry(&self, attempt: usize) {
        let exponent = u32::try_from(attempt).unwrap_or(16);
        let base = self
            .config
            .retry_delay_ms
            .saturating_mul(2u64.saturating_pow(exponent));
        let jitter = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|duration| u64::from(duration.subsec_millis() % 100))
            .unwrap_or(0);
        sleep(Duration::from_millis(base.saturating_add(jitter)));
    }
}

impl PageTransport for MediaWikiClient {
    fn mobile_view(&self, title: &str) -> Result<RawMobileViewResponse> {
        info!(title, "requesting mobileview");
        let response = self.request_json_get(&mobile_view_params(title))?;
        serde_json::from_value(response)
            .with_context(|| format!("failed to decode mobileview response for {title}"))
    }

    fn language_data(&self, title: &str) -> Result<RawLanguageResponse> {
        info!(title, "requesting language links");
        let response = self.request_json_get(&language_params(title))?;
        serde_json::from_value(response)
            .with_context(|| format!("failed to decode language response for {title}"))
    }
}

enum Attempt {
    Done(Value),
    Retry(String),
}

/// Surface an API-level `error` object as an error carrying its code.
fn api_payload(payload: Value) -> Result<Value> {
    let Some(error) = payload.get("error") else {
        return Ok(payload);
    };
    let field = |name: &str| error.get(name).and_then(Value::as_str).map(str::to_string);
    let code = field("code").unwrap_or_else(|| "unknown_error".to_string());
    let info = field("info").unwrap_or_default();
    bail!("MediaWiki API error [{code}]: {info}")
}

fn mobile_view_params(title: &str) -> Vec<(&'static str, String)> {
    vec![
        ("action", "mobileview".to_string()),
        ("page", title.to_string()),
        ("redirects", "yes".to_string()),
        ("prop", MOBILEVIEW_PROPS.to_string()),
        ("sectionprop", MOBILEVIEW_SECTION_PROPS.to_string()),
        ("sections", "all".to_string()),
        ("noheadings", "yes".to_string()),
    ]
}

fn language_params(title: &str) -> Vec<(&'static str, String)> {
    vec![
        ("action", "query".to_string()),
        ("titles", title.to_string()),
        ("prop", "langlinks".to_string()),
        ("llprop", "url".to_string()),
        ("lllimit", "max".to_string()),
        ("meta", "siteinfo".to_string()),
        ("siprop", "general|languages".to_string()),
    ]
}

fn env_value(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_value_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_value_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

fn is_retryable_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use serde_json::json;

    use super::{
        MediaWikiClient, MediaWikiClientConfig, api_payload, is_retryable_status,
        language_params, mobile_view_params,
    };

    fn config(api_url: &str) -> MediaWikiClientConfig {
        MediaWikiClientConfig {
            api_url: api_url.to_string(),
            user_agent: "test".to_string(),
            timeout_ms: 1_000,
            rate_limit_read_ms: 0,
            max_retries: 0,
            retry_delay_ms: 0,
        }
    }

    #[test]
    fn mobile_view_requests_all_sections_with_levels() {
        let params = mobile_view_params("San Francisco");
        assert!(params.contains(&("action", "mobileview".to_string())));
        assert!(params.contains(&("page", "San Francisco".to_string())));
        assert!(params.contains(&("sections", "all".to_string())));
        assert!(
            params
                .iter()
                .any(|(key, value)| *key == "sectionprop" && value.contains("level"))
        );
    }

    #[test]
    fn language_query_asks_for_urls_and_site_languages() {
        let params = language_params("Test");
        assert!(params.contains(&("llprop", "url".to_string())));
        assert!(params.contains(&("siprop", "general|languages".to_string())));
    }

    #[test]
    fn retryable_statuses_are_transient_only() {
        assert!(is_retryable_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(!is_retryable_status(StatusCode::NOT_FOUND));
    }

    #[test]
    fn client_requires_api_url() {
        assert!(MediaWikiClient::new(config("  ")).is_err());
        let client = MediaWikiClient::new(config("https://wiki.example.org/w/api.php"))
            .expect("client");
        assert_eq!(client.request_count(), 0);
    }

    #[test]
    fn request_url_adds_json_format_and_skips_empty_values() {
        let client = MediaWikiClient::new(config("https://wiki.example.org/w/api.php"))
            .expect("client");
        let url = client
            .request_url(&[
                ("action", "mobileview".to_string()),
                ("page", "AT&T Park".to_string()),
                ("variant", String::new()),
            ])
            .expect("url");
        assert_eq!(
            url.as_str(),
            "https://wiki.example.org/w/api.php?format=json&formatversion=2&action=mobileview&page=AT%26T+Park"
        );
        assert!(client.request_url(&[]).is_ok());
        assert!(
            MediaWikiClient::new(config("not a url"))
                .expect("client")
                .request_url(&[])
                .is_err()
        );
    }

    #[test]
    fn api_error_objects_become_errors() {
        let error = api_payload(json!({ "error": { "code": "missingtitle", "info": "The page you specified doesn't exist." } }))
            .expect_err("must fail");
        assert_eq!(
            error.to_string(),
            "MediaWiki API error [missingtitle]: The page you specified doesn't exist."
        );
        let payload = json!({ "mobileview": { "id": 1 } });
        assert_eq!(api_payload(payload.clone()).expect("payload"), payload);
    }
}
