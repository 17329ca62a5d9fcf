//! Configuration module
//!
//! The worker is configured from environment-style key/value pairs. [`WorkerConfig::from_env`]
//! reads the process environment; [`WorkerConfig::from_lookup`] takes any lookup function so
//! tests can build a configuration without touching global state. The configuration is built
//! once at startup and handed to each component's constructor.

use std::env;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

// Defaults
const AWS_REGION: &str = "us-east-1";
const SQS_QUEUE_NAME: &str = "upload-notifications";
const SQS_WAIT_TIME_SECS: i32 = 20;
const SQS_VISIBILITY_TIMEOUT_SECS: i32 = 300;
const SQS_MAX_MESSAGES: i32 = 10;
const EXPECTED_S3_EVENT_SOURCE: &str = "aws:s3";
const EXPECTED_S3_EVENT_PREFIX: &str = "ObjectCreated";
const S3_BUCKET: &str = "uploads";
const S3_PREFIX: &str = "uploads";
const DOWNLOAD_DIR: &str = "./temp_downloads";
const POLL_INTERVAL_SECS: u64 = 5;
const MAX_RUNTIME_HOURS: f64 = 0.0;
/// Upper bound for `MAX_RUNTIME_HOURS`: one year.
const MAX_RUNTIME_HOURS_LIMIT: f64 = 8760.0;
const STATUS_INTERVAL_CYCLES: u64 = 60;
const FFPROBE_PATH: &str = "ffprobe";
const PROBE_CHECK_TIMEOUT_SECS: u64 = 5;
const PROBE_TIMEOUT_SECS: u64 = 30;
const PLACEHOLDER_DELAY_MS: u64 = 0;
const DB_MAX_CONNECTIONS: u32 = 5;

// SQS service limits
const SQS_MAX_WAIT_TIME_SECS: i32 = 20;
const SQS_MAX_VISIBILITY_TIMEOUT_SECS: i32 = 43_200;
const SQS_MAX_BATCH: i32 = 10;

/// What to do with a message whose processing ended in failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AckPolicy {
    /// Delete the message whatever the outcome. A poisoned message is never redelivered;
    /// the failed attempt is tracked by `retry_count` on the processing record.
    #[default]
    Always,
    /// Delete only completed messages. Failed ones become visible again after the
    /// visibility timeout and are retried until the queue's max-receive threshold.
    SuccessOnly,
}

impl Display for AckPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            AckPolicy::Always => write!(f, "always"),
            AckPolicy::SuccessOnly => write!(f, "success_only"),
        }
    }
}

impl FromStr for AckPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "always" => Ok(AckPolicy::Always),
            "success_only" | "success-only" => Ok(AckPolicy::SuccessOnly),
            other => Err(format!("expected always or success_only, got {}", other)),
        }
    }
}

/// Layout of the scratch directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScratchNamespace {
    /// Files land directly in `DOWNLOAD_DIR`.
    #[default]
    None,
    /// Files land in `DOWNLOAD_DIR/{hostname}-{pid}` so instances sharing a
    /// directory cannot collide on filenames.
    Instance,
}

impl FromStr for ScratchNamespace {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "" => Ok(ScratchNamespace::None),
            "instance" => Ok(ScratchNamespace::Instance),
            other => Err(format!("expected none or instance, got {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("expected text or json, got {}", other)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct QueueConfig {
    pub queue_url: Option<String>,
    pub queue_name: Option<String>,
    pub wait_time_secs: i32,
    pub visibility_timeout_secs: i32,
    pub max_messages: i32,
}

/// Expected shape of an eligible creation event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventFilter {
    pub expected_source: String,
    pub expected_event_prefix: String,
    pub bucket: String,
    pub key_prefix: String,
}

#[derive(Clone, Debug)]
pub struct ScratchConfig {
    pub download_dir: PathBuf,
    pub namespace: ScratchNamespace,
    pub cleanup_after_processing: bool,
}

impl ScratchConfig {
    /// Directory downloads are written to, after applying the namespace.
    pub fn resolved_dir(&self) -> PathBuf {
        match self.namespace {
            ScratchNamespace::None => self.download_dir.clone(),
            ScratchNamespace::Instance => {
                let host = hostname::get()
                    .ok()
                    .and_then(|h| h.into_string().ok())
                    .unwrap_or_else(|| "localhost".to_string());
                self.download_dir
                    .join(format!("{}-{}", host, std::process::id()))
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct ScheduleConfig {
    pub poll_interval_secs: u64,
    /// 0 means unlimited.
    pub max_runtime_hours: f64,
    pub ack_policy: AckPolicy,
    /// Emit the status summary every N cycles. 0 = only at start and shutdown.
    pub status_interval_cycles: u64,
}

impl ScheduleConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn max_runtime(&self) -> Option<Duration> {
        if self.max_runtime_hours > 0.0 {
            Duration::try_from_secs_f64(self.max_runtime_hours * 3600.0).ok()
        } else {
            None
        }
    }
}

#[derive(Clone, Debug)]
pub struct ProbeConfig {
    pub ffprobe_path: String,
    pub check_timeout_secs: u64,
    pub timeout_secs: u64,
    pub placeholder_delay_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            ffprobe_path: FFPROBE_PATH.to_string(),
            check_timeout_secs: PROBE_CHECK_TIMEOUT_SECS,
            timeout_secs: PROBE_TIMEOUT_SECS,
            placeholder_delay_ms: PLACEHOLDER_DELAY_MS,
        }
    }
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    /// `None` selects the in-memory record store.
    pub url: Option<String>,
    pub max_connections: u32,
}

/// Complete worker configuration.
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    pub aws_region: String,
    pub s3_endpoint: Option<String>,
    pub queue: QueueConfig,
    pub filter: EventFilter,
    pub scratch: ScratchConfig,
    pub schedule: ScheduleConfig,
    pub probe: ProbeConfig,
    pub database: DatabaseConfig,
    pub log_format: LogFormat,
}

/// Load a `.env` file from the working directory if one exists.
///
/// Returns the path that was loaded. Variables already present in the environment win.
pub fn load_dotenv() -> Option<PathBuf> {
    dotenvy::dotenv().ok()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_or<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match non_empty(lookup(key)) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| ConfigError::invalid(key, raw.clone(), e.to_string())),
        None => Ok(default),
    }
}

fn parse_bool_or<F>(lookup: &F, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match non_empty(lookup(key)) {
        Some(raw) => match raw.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::invalid(key, raw, "expected a boolean")),
        },
        None => Ok(default),
    }
}

fn string_or<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    non_empty(lookup(key)).unwrap_or_else(|| default.to_string())
}

impl WorkerConfig {
    /// Build the configuration from the process environment and validate it.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup and validate it.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let queue_url = non_empty(lookup("SQS_QUEUE_URL"));
        // The name is only a fallback when no URL is given.
        let queue_name = non_empty(lookup("SQS_QUEUE_NAME")).or_else(|| {
            if queue_url.is_none() {
                Some(SQS_QUEUE_NAME.to_string())
            } else {
                None
            }
        });

        let config = WorkerConfig {
            aws_region: string_or(&lookup, "AWS_REGION", AWS_REGION),
            s3_endpoint: non_empty(lookup("S3_ENDPOINT")),
            queue: QueueConfig {
                queue_url,
                queue_name,
                wait_time_secs: parse_or(&lookup, "SQS_WAIT_TIME", SQS_WAIT_TIME_SECS)?,
                visibility_timeout_secs: parse_or(
                    &lookup,
                    "SQS_VISIBILITY_TIMEOUT",
                    SQS_VISIBILITY_TIMEOUT_SECS,
                )?,
                max_messages: parse_or(&lookup, "SQS_MAX_MESSAGES", SQS_MAX_MESSAGES)?,
            },
            filter: EventFilter {
                expected_source: string_or(
                    &lookup,
                    "EXPECTED_S3_EVENT_SOURCE",
                    EXPECTED_S3_EVENT_SOURCE,
                ),
                expected_event_prefix: string_or(
                    &lookup,
                    "EXPECTED_S3_EVENT_PREFIX",
                    EXPECTED_S3_EVENT_PREFIX,
                ),
                bucket: string_or(&lookup, "S3_BUCKET", S3_BUCKET),
                key_prefix: string_or(&lookup, "S3_PREFIX", S3_PREFIX)
                    .trim_matches('/')
                    .to_string(),
            },
            scratch: ScratchConfig {
                download_dir: PathBuf::from(string_or(&lookup, "DOWNLOAD_DIR", DOWNLOAD_DIR)),
                namespace: parse_or(&lookup, "SCRATCH_NAMESPACE", ScratchNamespace::None)?,
                cleanup_after_processing: parse_bool_or(
                    &lookup,
                    "CLEANUP_AFTER_PROCESSING",
                    true,
                )?,
            },
            schedule: ScheduleConfig {
                poll_interval_secs: parse_or(&lookup, "POLL_INTERVAL_SECONDS", POLL_INTERVAL_SECS)?,
                max_runtime_hours: parse_or(&lookup, "MAX_RUNTIME_HOURS", MAX_RUNTIME_HOURS)?,
                ack_policy: parse_or(&lookup, "ACK_POLICY", AckPolicy::Always)?,
                status_interval_cycles: parse_or(
                    &lookup,
                    "STATUS_INTERVAL_CYCLES",
                    STATUS_INTERVAL_CYCLES,
                )?,
            },
            probe: ProbeConfig {
                ffprobe_path: string_or(&lookup, "FFPROBE_PATH", FFPROBE_PATH),
                check_timeout_secs: parse_or(
                    &lookup,
                    "PROBE_CHECK_TIMEOUT_SECS",
                    PROBE_CHECK_TIMEOUT_SECS,
                )?,
                timeout_secs: parse_or(&lookup, "PROBE_TIMEOUT_SECS", PROBE_TIMEOUT_SECS)?,
                placeholder_delay_ms: parse_or(
                    &lookup,
                    "PLACEHOLDER_DELAY_MS",
                    PLACEHOLDER_DELAY_MS,
                )?,
            },
            database: DatabaseConfig {
                url: non_empty(lookup("DATABASE_URL")),
                max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", DB_MAX_CONNECTIONS)?,
            },
            log_format: parse_or(&lookup, "LOG_FORMAT", LogFormat::Text)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field and range constraints. Pure: touches no global state.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut missing = Vec::new();
        if self.queue.queue_url.is_none() && self.queue.queue_name.is_none() {
            missing.push("SQS_QUEUE_URL or SQS_QUEUE_NAME".to_string());
        }
        if self.filter.bucket.is_empty() {
            missing.push("S3_BUCKET".to_string());
        }
        if self.filter.key_prefix.is_empty() {
            missing.push("S3_PREFIX".to_string());
        }
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        if !(0..=SQS_MAX_WAIT_TIME_SECS).contains(&self.queue.wait_time_secs) {
            return Err(ConfigError::invalid(
                "SQS_WAIT_TIME",
                self.queue.wait_time_secs.to_string(),
                format!("must be between 0 and {}", SQS_MAX_WAIT_TIME_SECS),
            ));
        }
        if !(0..=SQS_MAX_VISIBILITY_TIMEOUT_SECS).contains(&self.queue.visibility_timeout_secs) {
            return Err(ConfigError::invalid(
                "SQS_VISIBILITY_TIMEOUT",
                self.queue.visibility_timeout_secs.to_string(),
                format!("must be between 0 and {}", SQS_MAX_VISIBILITY_TIMEOUT_SECS),
            ));
        }
        if !(1..=SQS_MAX_BATCH).contains(&self.queue.max_messages) {
            return Err(ConfigError::invalid(
                "SQS_MAX_MESSAGES",
                self.queue.max_messages.to_string(),
                format!("must be between 1 and {}", SQS_MAX_BATCH),
            ));
        }
        if !self.schedule.max_runtime_hours.is_finite() || self.schedule.max_runtime_hours < 0.0 {
            return Err(ConfigError::invalid(
                "MAX_RUNTIME_HOURS",
                self.schedule.max_runtime_hours.to_string(),
                "must be a non-negative number of hours",
            ));
        }
        if self.schedule.max_runtime_hours > MAX_RUNTIME_HOURS_LIMIT {
            return Err(ConfigError::invalid(
                "MAX_RUNTIME_HOURS",
                self.schedule.max_runtime_hours.to_string(),
                format!("must be at most {} hours (0 = unlimited)", MAX_RUNTIME_HOURS_LIMIT),
            ));
        }
        if self.probe.check_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "PROBE_CHECK_TIMEOUT_SECS",
                "0",
                "must be greater than zero",
            ));
        }
        if self.probe.timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "PROBE_TIMEOUT_SECS",
                "0",
                "must be greater than zero",
            ));
        }
        if let Some(url) = &self.database.url {
            if !(url.starts_with("postgres://") || url.starts_with("postgresql://")) {
                return Err(ConfigError::invalid(
                    "DATABASE_URL",
                    "<redacted>",
                    "must be a PostgreSQL connection string",
                ));
            }
        }

        Ok(())
    }

    pub fn download_dir(&self) -> &Path {
        &self.scratch.download_dir
    }

    /// Log a configuration summary. Secrets (the database URL) are never printed.
    pub fn log_summary(&self) {
        tracing::info!(
            aws_region = %self.aws_region,
            s3_endpoint = ?self.s3_endpoint,
            s3_bucket = %self.filter.bucket,
            s3_prefix = %self.filter.key_prefix,
            queue_url = ?self.queue.queue_url,
            queue_name = ?self.queue.queue_name,
            wait_time_secs = self.queue.wait_time_secs,
            visibility_timeout_secs = self.queue.visibility_timeout_secs,
            max_messages = self.queue.max_messages,
            download_dir = %self.scratch.download_dir.display(),
            cleanup_after_processing = self.scratch.cleanup_after_processing,
            poll_interval_secs = self.schedule.poll_interval_secs,
            max_runtime_hours = self.schedule.max_runtime_hours,
            ack_policy = %self.schedule.ack_policy,
            ffprobe_path = %self.probe.ffprobe_path,
            durable_records = self.database.url.is_some(),
            "Analysis service configuration"
        );
    }
}
