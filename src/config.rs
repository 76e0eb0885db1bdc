use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Tool configuration, loaded from `~/.edx-roster/config.toml` when present.
///
/// Every field has a default, so the tool runs with no config file at all;
/// a partial file overrides only the keys it names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where to sign in.
    pub login_url: String,
    /// How long a freshly navigated page gets to become ready.
    pub page_timeout_secs: u64,
    /// How long an individual element lookup or confirmation poll gets.
    pub gesture_timeout_ms: u64,
    /// Pause between operation batches on one course page.
    pub op_pacing_ms: u64,
    /// Output CSV for courses/addresses that could not be processed.
    pub remaining_csv: PathBuf,
    /// Output CSV for `--list` mode.
    pub staffing_csv: PathBuf,
    /// Gesture retry tuning.
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_ratio: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 4000,
            jitter_ratio: 0.20,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            login_url: "https://authn.edx.org/login".to_string(),
            page_timeout_secs: 10,
            gesture_timeout_ms: 2000,
            // The team page falls behind rapid-fire operations; without this
            // pause it used to drop entire address lists.
            op_pacing_ms: 2000,
            remaining_csv: PathBuf::from("remaining_courses.csv"),
            staffing_csv: PathBuf::from("course_staffing.csv"),
            retry: RetryConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from the default location.
    /// A missing file is not an error; defaults apply.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p,
            None => Self::default_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("could not read config {}", config_path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("could not parse config {}", config_path.display()))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn default_path() -> PathBuf {
        let home_dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home_dir.join(".edx-roster").join("config.toml")
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }

    pub fn gesture_timeout(&self) -> Duration {
        Duration::from_millis(self.gesture_timeout_ms)
    }

    pub fn op_pacing(&self) -> Duration {
        Duration::from_millis(self.op_pacing_ms)
    }
}
