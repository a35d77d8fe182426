//! Suite configuration from the environment
//!
//! Everything is environment-first (`CHATGAUGE_*`), so the suite runs the
//! same from a shell, CI, or the live harness binary; harness flags override
//! individual values on top.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chatgauge_core::{EmbeddingConfig, Language, WaiterConfig};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BrowserKind {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl BrowserKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrowserKind::Chromium => "chromium",
            BrowserKind::Firefox => "firefox",
            BrowserKind::Webkit => "webkit",
        }
    }
}

impl FromStr for BrowserKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chromium" => Ok(BrowserKind::Chromium),
            "firefox" => Ok(BrowserKind::Firefox),
            "webkit" => Ok(BrowserKind::Webkit),
            other => Err(format!("unknown browser '{other}'")),
        }
    }
}

/// Phone-sized viewport and UA used when mobile emulation is on.
const MOBILE_VIEWPORT: (u32, u32) = (390, 844);
const MOBILE_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 16_0 like Mac OS X) \
     AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.0 Mobile/15E148 Safari/604.1";
const DESKTOP_VIEWPORT: (u32, u32) = (1280, 800);

#[derive(Debug, Clone)]
pub struct SuiteConfig {
    /// Deployment under test.
    pub base_url: String,
    pub email: String,
    pub password: String,

    /// Language mode: selects locale, embedding profile, default thresholds.
    pub lang: Language,

    pub browser: BrowserKind,
    pub headless: bool,
    pub mobile: bool,

    pub embedding: EmbeddingConfig,
    pub waiter: WaiterConfig,

    pub dataset_path: PathBuf,
    pub reports_dir: PathBuf,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://govgpt.sandbox.dge.gov.ae/".to_string(),
            email: String::new(),
            password: String::new(),
            lang: Language::En,
            browser: BrowserKind::Chromium,
            headless: true,
            mobile: false,
            embedding: EmbeddingConfig::default(),
            waiter: WaiterConfig::default(),
            dataset_path: PathBuf::from("data/test-data.json"),
            reports_dir: PathBuf::from("reports"),
        }
    }
}

impl SuiteConfig {
    /// Build a config from `CHATGAUGE_*` environment variables, falling back
    /// to defaults for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let lang = match env_str("CHATGAUGE_LANG", defaults.lang.as_str()).as_str() {
            "ar" => Language::Ar,
            _ => Language::En,
        };
        let browser = env_str("CHATGAUGE_BROWSER", defaults.browser.as_str())
            .parse()
            .unwrap_or_default();

        let mut embedding = defaults.embedding.clone();
        embedding.base_url = env_str("CHATGAUGE_EMBED_URL", &embedding.base_url);

        let mut waiter = defaults.waiter.clone();
        if let Some(ms) = env_u64("CHATGAUGE_ANSWER_TIMEOUT_MS") {
            waiter.timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env_u64("CHATGAUGE_POLL_INTERVAL_MS") {
            waiter.poll_interval = Duration::from_millis(ms);
        }

        Self {
            base_url: env_str("CHATGAUGE_BASE_URL", &defaults.base_url),
            email: env_str("CHATGAUGE_EMAIL", ""),
            password: env_str("CHATGAUGE_PASSWORD", ""),
            lang,
            browser,
            headless: env_bool("CHATGAUGE_HEADLESS", defaults.headless),
            mobile: env_bool("CHATGAUGE_MOBILE", defaults.mobile),
            embedding,
            waiter,
            dataset_path: PathBuf::from(env_str(
                "CHATGAUGE_DATA",
                &defaults.dataset_path.to_string_lossy(),
            )),
            reports_dir: PathBuf::from(env_str(
                "CHATGAUGE_REPORTS",
                &defaults.reports_dir.to_string_lossy(),
            )),
        }
    }

    /// Browser locale matching the language mode.
    pub fn locale(&self) -> &'static str {
        match self.lang {
            Language::Ar => "ar-AE",
            Language::En => "en-US",
        }
    }

    pub fn viewport(&self) -> (u32, u32) {
        if self.mobile {
            MOBILE_VIEWPORT
        } else {
            DESKTOP_VIEWPORT
        }
    }

    pub fn user_agent(&self) -> Option<&'static str> {
        if self.mobile {
            Some(MOBILE_USER_AGENT)
        } else {
            None
        }
    }
}

fn env_str(name: &str, default: &str) -> String {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => value.trim().to_string(),
        _ => default.to_string(),
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok()?.trim().parse().ok()
}

fn env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(value) => parse_bool(&value, default),
        Err(_) => default,
    }
}

/// Accepts the usual truthy spellings: 1/true/yes/y/on (case-insensitive).
pub fn parse_bool(value: &str, default: bool) -> bool {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => true,
        "0" | "false" | "no" | "n" | "off" => false,
        _ => default,
    }
}
