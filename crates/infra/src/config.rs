//! Runtime configuration.
//!
//! Values come from environment variables with documented defaults. Tests use
//! [`MailcampConfig::from_lookup`] with a map instead of touching the process
//! environment.

use tracing::warn;

use mailcamp_observability::LogFormat;

use crate::error::ConfigurationError;
use crate::jobs::JobQueueConfig;

pub const RENDER_QUEUE_VAR: &str = "MAILCAMP_RENDER_QUEUE";
pub const JOB_WORKERS_VAR: &str = "MAILCAMP_JOB_WORKERS";
pub const CERTIFIED_REQUEST_TYPE_VAR: &str = "MAILCAMP_CERTIFIED_REQUEST_TYPE";
pub const DEFAULT_ACCOUNT_VAR: &str = "MAILCAMP_DEFAULT_ACCOUNT";
pub const LOG_FORMAT_VAR: &str = "MAILCAMP_LOG_FORMAT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailcampConfig {
    /// Queue name render batch jobs are tagged with.
    pub render_queue: String,
    /// Worker threads of the local job queue.
    pub job_workers: usize,
    /// `params.type` of certified email requests.
    pub certified_request_type: String,
    /// Sending account for campaign drafts.
    pub default_account: String,
    pub log_format: LogFormat,
}

impl Default for MailcampConfig {
    fn default() -> Self {
        Self {
            render_queue: "poweremail".to_string(),
            job_workers: 4,
            certified_request_type: "open_document".to_string(),
            default_account: "noreply@localhost".to_string(),
            log_format: LogFormat::Json,
        }
    }
}

impl MailcampConfig {
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let job_workers = match get(JOB_WORKERS_VAR) {
            Some(raw) => parse_workers(&raw)?,
            None => defaults.job_workers,
        };

        let log_format = match get(LOG_FORMAT_VAR) {
            Some(raw) => raw.parse().map_err(|e: mailcamp_observability::UnknownLogFormat| {
                invalid(LOG_FORMAT_VAR, e.to_string())
            })?,
            None => defaults.log_format,
        };

        let default_account = get(DEFAULT_ACCOUNT_VAR).unwrap_or_else(|| {
            warn!(
                var = DEFAULT_ACCOUNT_VAR,
                "default sending account not set; using {}", defaults.default_account
            );
            defaults.default_account.clone()
        });

        Ok(Self {
            render_queue: get(RENDER_QUEUE_VAR).unwrap_or(defaults.render_queue),
            job_workers,
            certified_request_type: get(CERTIFIED_REQUEST_TYPE_VAR)
                .unwrap_or(defaults.certified_request_type),
            default_account,
            log_format,
        })
    }

    pub fn with_render_queue(mut self, queue: impl Into<String>) -> Self {
        self.render_queue = queue.into();
        self
    }

    pub fn with_job_workers(mut self, workers: usize) -> Self {
        self.job_workers = workers.max(1);
        self
    }

    pub fn with_default_account(mut self, account: impl Into<String>) -> Self {
        self.default_account = account.into();
        self
    }

    /// Install the process-wide subscriber in the configured format.
    pub fn init_logging(&self) {
        mailcamp_observability::init_with(self.log_format);
    }

    /// Worker pool settings for the local job queue.
    pub fn job_queue(&self) -> JobQueueConfig {
        JobQueueConfig::default()
            .with_name("mailcamp-jobs")
            .with_workers(self.job_workers)
    }
}

fn parse_workers(raw: &str) -> Result<usize, ConfigurationError> {
    let workers: usize = raw
        .parse()
        .map_err(|e: std::num::ParseIntError| invalid(JOB_WORKERS_VAR, e.to_string()))?;
    if workers == 0 {
        return Err(invalid(JOB_WORKERS_VAR, "must be at least 1"));
    }
    Ok(workers)
}

fn invalid(key: &str, reason: impl Into<String>) -> ConfigurationError {
    ConfigurationError::InvalidSetting {
        key: key.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = MailcampConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, MailcampConfig::default());
        assert_eq!(config.render_queue, "poweremail");
    }

    #[test]
    fn reads_overrides() {
        let config = MailcampConfig::from_lookup(lookup(&[
            (RENDER_QUEUE_VAR, "render"),
            (JOB_WORKERS_VAR, " 8 "),
            (CERTIFIED_REQUEST_TYPE_VAR, "delivery"),
            (DEFAULT_ACCOUNT_VAR, "campaigns@example.com"),
            (LOG_FORMAT_VAR, "pretty"),
        ]))
        .unwrap();

        assert_eq!(config.render_queue, "render");
        assert_eq!(config.job_workers, 8);
        assert_eq!(config.certified_request_type, "delivery");
        assert_eq!(config.default_account, "campaigns@example.com");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.job_queue().workers, 8);
    }

    #[test]
    fn rejects_bad_worker_counts() {
        for raw in ["zero", "0", "-1"] {
            let err = MailcampConfig::from_lookup(lookup(&[(JOB_WORKERS_VAR, raw)])).unwrap_err();
            assert!(matches!(
                err,
                ConfigurationError::InvalidSetting { ref key, .. } if key == JOB_WORKERS_VAR
            ));
        }
    }

    #[test]
    fn rejects_unknown_log_format() {
        let err = MailcampConfig::from_lookup(lookup(&[(LOG_FORMAT_VAR, "xml")])).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidSetting { .. }));
    }
}
