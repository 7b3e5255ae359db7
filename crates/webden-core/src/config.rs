//! Configuration loading and validation.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Top-level webden configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser: Option<BrowserConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

/// Browser driver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Path to Chrome/Chromium binary (auto-detected if omitted).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chrome_path: Option<String>,

    /// Run in headless mode (default: true).
    #[serde(default = "default_true")]
    pub headless: bool,

    /// Maximum simultaneously open isolated contexts (default: 8).
    ///
    /// Context creation beyond this limit is rejected, not queued.
    #[serde(default = "default_max_contexts")]
    pub max_contexts: usize,

    /// Driver call timeout in ms (default: 30000).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_max_contexts() -> usize {
    8
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headless: true,
            max_contexts: default_max_contexts(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl BrowserConfig {
    /// Driver call timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level override (trace/debug/info/warn/error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Per-crate log level overrides (e.g. "webden_browser=debug").
    #[serde(default)]
    pub filters: Vec<String>,
}

/// Substitute `${ENV_VAR}` patterns in a string with their environment variable values.
fn substitute_env_vars(input: &str) -> String {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").unwrap();
    re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_default()
    })
    .into_owned()
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    ///
    /// A missing file yields the default config.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        let substituted = substitute_env_vars(&raw);

        let config: Config =
            json5::from_str(&substituted).map_err(|e| ConfigError::Parse(e.to_string()))?;

        Ok(config)
    }

    /// Effective browser config (defaults when the section is absent).
    pub fn browser(&self) -> BrowserConfig {
        self.browser.clone().unwrap_or_default()
    }

    /// Validate config, returning warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if let Some(browser) = &self.browser {
            if browser.max_contexts == 0 {
                warnings.push("browser.max_contexts is 0; no session can ever open".into());
            }
            if let Some(path) = &browser.chrome_path {
                if !Path::new(path).exists() {
                    warnings.push(format!("browser.chrome_path not found: {path}"));
                }
            }
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_substitution() {
        // SAFETY: test-only, single-threaded test runner
        unsafe { std::env::set_var("TEST_WD_PATH", "/opt/chrome") };
        let input = r#"{"chrome_path": "${TEST_WD_PATH}"}"#;
        let result = substitute_env_vars(input);
        assert!(result.contains("/opt/chrome"));
        unsafe { std::env::remove_var("TEST_WD_PATH") };
    }

    #[test]
    fn test_env_var_missing() {
        let input = r#"{"key": "${NONEXISTENT_VAR_WD_TEST}"}"#;
        let result = substitute_env_vars(input);
        assert!(result.contains(r#""""#)); // empty string
    }

    #[test]
    fn test_default_browser_config() {
        let config = Config::default();
        let browser = config.browser();
        assert!(browser.headless);
        assert_eq!(browser.max_contexts, 8);
        assert_eq!(browser.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_browser_config_json5() {
        let config: Config = json5::from_str(
            r#"{
                browser: {
                    headless: false,
                    max_contexts: 2,
                }
            }"#,
        )
        .unwrap();
        let browser = config.browser();
        assert!(!browser.headless);
        assert_eq!(browser.max_contexts, 2);
        assert_eq!(browser.timeout_ms, 30_000);
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let config = Config::load(Path::new("/nonexistent/webden.json")).unwrap();
        assert!(config.browser.is_none());
    }

    #[test]
    fn test_validate_zero_contexts_warns() {
        let config: Config = json5::from_str(r#"{ browser: { max_contexts: 0 } }"#).unwrap();
        let warnings = config.validate();
        assert!(warnings.iter().any(|w| w.contains("max_contexts")));
    }
}
