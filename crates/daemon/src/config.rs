//! Daemon configuration from `CFMID_*` environment variables

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use cfmid_api_http::{HttpServerConfig, MAX_BURST};
use cfmid_core::application::constants::DEFAULT_MAX_CONCURRENT_PREDICTIONS;
use cfmid_core::domain::{InputFormat, OutputMode, ProbabilityThreshold, ToolSettings};

const DEFAULT_RATE_LIMIT_BURST: u32 = 200;
const DEFAULT_RATE_LIMIT_RATE: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Everything the daemon reads at startup
#[derive(Debug, Clone)]
pub struct WrapperConfig {
    pub http: HttpServerConfig,
    pub tool: ToolSettings,
    pub output_mode: OutputMode,
    pub input_format: InputFormat,
    pub scratch_dir: Option<PathBuf>,
    pub max_concurrent: usize,
    pub rate_limit_burst: u32,
    pub rate_limit_rate: u32,
    pub log_format: LogFormat,
}

impl WrapperConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (tests pass a map)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let defaults = ToolSettings::default();
        let http_defaults = HttpServerConfig::default();

        let http = HttpServerConfig {
            host: get("CFMID_HOST").unwrap_or(http_defaults.host),
            port: parse_or(&get, "CFMID_PORT", http_defaults.port)?,
        };

        let default_prob_thresh = match get("CFMID_PROB_THRESH") {
            Some(raw) => ProbabilityThreshold::from_str(&raw)
                .with_context(|| format!("CFMID_PROB_THRESH={}", raw))?,
            None => defaults.default_prob_thresh,
        };

        let timeout = Duration::from_secs(parse_or(
            &get,
            "CFMID_TIMEOUT_SECS",
            defaults.timeout.as_secs(),
        )?);
        if timeout.is_zero() {
            anyhow::bail!("CFMID_TIMEOUT_SECS must be greater than 0");
        }

        let tool = ToolSettings {
            executable: get("CFMID_PREDICT_BIN")
                .map(PathBuf::from)
                .unwrap_or(defaults.executable),
            param_output: get("CFMID_PARAM_OUTPUT")
                .map(PathBuf::from)
                .unwrap_or(defaults.param_output),
            param_config: get("CFMID_PARAM_CONFIG")
                .map(PathBuf::from)
                .unwrap_or(defaults.param_config),
            default_prob_thresh,
            annotate_fragments: parse_bool(
                &get,
                "CFMID_ANNOTATE_FRAGMENTS",
                defaults.annotate_fragments,
            )?,
            postprocess: parse_bool(&get, "CFMID_POSTPROCESS", defaults.postprocess)?,
            suppress_exceptions: parse_bool(
                &get,
                "CFMID_SUPPRESS_EXCEPTIONS",
                defaults.suppress_exceptions,
            )?,
            timeout,
        };

        let output_mode = match get("CFMID_OUTPUT_MODE") {
            Some(raw) => OutputMode::from_str(&raw).context("CFMID_OUTPUT_MODE")?,
            None => OutputMode::default(),
        };

        let input_format = match get("CFMID_INPUT_ID") {
            Some(id) => InputFormat::identified(id).context("CFMID_INPUT_ID")?,
            None => InputFormat::Raw,
        };

        let log_format = match get("CFMID_LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            Some("pretty") | None => LogFormat::Pretty,
            Some(other) => anyhow::bail!(
                "CFMID_LOG_FORMAT: unknown format '{}' (expected 'pretty' or 'json')",
                other
            ),
        };

        let rate_limit_burst =
            parse_or(&get, "CFMID_RATE_LIMIT_BURST", DEFAULT_RATE_LIMIT_BURST)?;
        if rate_limit_burst > MAX_BURST {
            anyhow::bail!(
                "CFMID_RATE_LIMIT_BURST={} exceeds the maximum of {}",
                rate_limit_burst,
                MAX_BURST
            );
        }

        Ok(Self {
            http,
            tool,
            output_mode,
            input_format,
            scratch_dir: get("CFMID_SCRATCH_DIR").map(PathBuf::from),
            max_concurrent: parse_or(
                &get,
                "CFMID_MAX_CONCURRENT",
                DEFAULT_MAX_CONCURRENT_PREDICTIONS,
            )?,
            rate_limit_burst,
            rate_limit_rate: parse_or(&get, "CFMID_RATE_LIMIT_RATE", DEFAULT_RATE_LIMIT_RATE)?,
            log_format,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{}={}", key, raw)),
        None => Ok(default),
    }
}

fn parse_bool<G>(get: &G, key: &str, default: bool) -> Result<bool>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key).map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => anyhow::bail!("{}: expected a boolean, got '{}'", key, other),
    }
}
