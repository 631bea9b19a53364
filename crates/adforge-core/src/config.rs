//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from TOML and carries the
//! backend connection, per-stage polling cadence, and download settings.
//! Every section defaults sensibly so an empty file is valid.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::Result;
use crate::media::StageKind;
use crate::Error;

/// Longest accepted wait between two status queries.
pub const MAX_POLL_INTERVAL_SECS: u64 = 60 * 60;

/// Longest accepted per-stage poll budget.
pub const MAX_POLL_BUDGET: Duration = Duration::from_secs(24 * 60 * 60);

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub polling: PollingConfig,
    pub download: DownloadConfig,
}

impl Config {
    /// Deserialize a `Config` from a TOML string.
    ///
    /// String-based so the caller can read the file however it sees fit.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| Error::Config(format!("parse error: {e}")))
    }

    /// Check for problems that make the configuration unusable.
    pub fn validate(&self) -> Result<()> {
        if self.backend.url.trim().is_empty() {
            return Err(Error::Config("backend.url is empty".into()));
        }
        if !self.backend.url.starts_with("http://") && !self.backend.url.starts_with("https://") {
            return Err(Error::Config(format!(
                "backend.url '{}' must start with http:// or https://",
                self.backend.url
            )));
        }
        if self.backend.request_timeout_secs == 0 {
            return Err(Error::Config("backend.request_timeout_secs must be positive".into()));
        }

        for (name, cadence) in self.polling.sections() {
            if cadence.interval_secs == 0 {
                return Err(Error::Config(format!(
                    "polling.{name}.interval_secs must be positive"
                )));
            }
            if cadence.max_attempts == 0 {
                return Err(Error::Config(format!(
                    "polling.{name}.max_attempts must be positive"
                )));
            }
            if cadence.interval_secs > MAX_POLL_INTERVAL_SECS {
                return Err(Error::Config(format!(
                    "polling.{name}.interval_secs must be at most {MAX_POLL_INTERVAL_SECS}"
                )));
            }
            if cadence.budget() > MAX_POLL_BUDGET {
                return Err(Error::Config(format!(
                    "polling.{name} budget (interval_secs x max_attempts) must not exceed {} hours",
                    MAX_POLL_BUDGET.as_secs() / 3600
                )));
            }
            if cadence.placeholder_cap >= 100 {
                return Err(Error::Config(format!(
                    "polling.{name}.placeholder_cap must be below 100"
                )));
            }
        }

        if self.download.file_prefix.contains(['/', '\\']) {
            return Err(Error::Config(
                "download.file_prefix must not contain path separators".into(),
            ));
        }

        Ok(())
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.backend.api_key.as_deref().map_or(true, str::is_empty) {
            warnings.push("backend.api_key is not set; requests will be unauthenticated".into());
        }

        for (name, cadence) in self.polling.sections() {
            if cadence.placeholder_step == 0 {
                warnings.push(format!(
                    "polling.{name}.placeholder_step is 0; progress stays at 0 until the backend reports one"
                ));
            }
            let budget = cadence.budget();
            if budget > Duration::from_secs(60 * 60) {
                warnings.push(format!(
                    "polling.{name} waits up to {} minutes before timing out",
                    budget.as_secs() / 60
                ));
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Transformation backend connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub url: String,
    /// Sent as a bearer token when set.
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8700".into(),
            api_key: None,
            request_timeout_secs: 30,
            connect_timeout_secs: 5,
        }
    }
}

/// Poll cadence for one asynchronous stage kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollCadence {
    pub interval_secs: u64,
    pub max_attempts: u32,
    /// Synthesized progress added per attempt when the backend reports none.
    pub placeholder_step: u8,
    /// Synthesized progress never exceeds this.
    pub placeholder_cap: u8,
}

impl PollCadence {
    pub const fn new(interval_secs: u64, max_attempts: u32) -> Self {
        Self {
            interval_secs,
            max_attempts,
            placeholder_step: 3,
            placeholder_cap: 90,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Total wall-clock budget: attempts x interval, saturating.
    pub fn budget(&self) -> Duration {
        self.interval()
            .checked_mul(self.max_attempts)
            .unwrap_or(Duration::MAX)
    }
}

impl Default for PollCadence {
    fn default() -> Self {
        Self::new(3, 100)
    }
}

/// Per-stage poll cadence. Codec transcode is synchronous and has none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub concatenate: PollCadence,
    pub interpolate: PollCadence,
    pub upscale: PollCadence,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            concatenate: PollCadence::new(3, 100),
            interpolate: PollCadence::new(10, 120),
            upscale: PollCadence::new(3, 100),
        }
    }
}

impl PollingConfig {
    /// Cadence for the given stage kind.
    ///
    /// A synchronous stage that unexpectedly hands back a job id falls back to
    /// the default cadence.
    pub fn for_kind(&self, kind: StageKind) -> PollCadence {
        match kind {
            StageKind::Concatenate => self.concatenate,
            StageKind::FrameInterpolate => self.interpolate,
            StageKind::SuperResolutionUpscale => self.upscale,
            StageKind::CodecTranscode => PollCadence::default(),
        }
    }

    fn sections(&self) -> [(&'static str, &PollCadence); 3] {
        [
            ("concatenate", &self.concatenate),
            ("interpolate", &self.interpolate),
            ("upscale", &self.upscale),
        ]
    }
}

/// Where and how final artifacts are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub output_dir: PathBuf,
    pub file_prefix: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./renders"),
            file_prefix: "adforge".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn huge_interval_is_rejected_without_overflow() {
        let config = Config::from_toml(
            "[polling.upscale]\ninterval_secs = 9223372036854775807\nmax_attempts = 3\n",
        )
        .unwrap();

        assert_eq!(config.polling.upscale.budget(), Duration::MAX);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("polling.upscale.interval_secs"), "got: {err}");
        // Non-fatal checks still run on an invalid config.
        assert!(!config.warnings().is_empty());
    }

    #[test]
    fn budget_above_a_day_is_rejected() {
        let config = Config::from_toml(
            "[polling.interpolate]\ninterval_secs = 3600\nmax_attempts = 25\n",
        )
        .unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("polling.interpolate budget"), "got: {err}");

        let config = Config::from_toml(
            "[polling.interpolate]\ninterval_secs = 3600\nmax_attempts = 24\n",
        )
        .unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_toml_is_default() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn default_cadences_match_stage_table() {
        let polling = PollingConfig::default();
        let concat = polling.for_kind(StageKind::Concatenate);
        assert_eq!((concat.interval_secs, concat.max_attempts), (3, 100));
        let interp = polling.for_kind(StageKind::FrameInterpolate);
        assert_eq!((interp.interval_secs, interp.max_attempts), (10, 120));
        assert_eq!(interp.budget(), Duration::from_secs(20 * 60));
        let upscale = polling.for_kind(StageKind::SuperResolutionUpscale);
        assert_eq!(upscale.budget(), Duration::from_secs(5 * 60));
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config = Config::from_toml(
            r#"
            [backend]
            url = "https://render.example.com"
            api_key = "secret"

            [polling.upscale]
            max_attempts = 40
            "#,
        )
        .unwrap();

        assert_eq!(config.backend.url, "https://render.example.com");
        assert_eq!(config.backend.request_timeout_secs, 30);
        assert_eq!(config.polling.upscale.max_attempts, 40);
        assert_eq!(config.polling.upscale.interval_secs, 3);
        assert_eq!(config.polling.interpolate.interval_secs, 10);
        assert!(config.warnings().is_empty());
    }

    #[test]
    fn zero_budget_is_fatal() {
        let mut config = Config::default();
        config.polling.interpolate.max_attempts = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("polling.interpolate.max_attempts"));
    }

    #[test]
    fn placeholder_cap_must_stay_below_100() {
        let mut config = Config::default();
        config.polling.concatenate.placeholder_cap = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_http_url_is_fatal() {
        let mut config = Config::default();
        config.backend.url = "ftp://render".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_api_key_warns() {
        let warnings = Config::default().warnings();
        assert!(warnings.iter().any(|w| w.contains("api_key")));
    }

    #[test]
    fn malformed_toml_is_config_error() {
        let err = Config::from_toml("[backend\nurl=").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
