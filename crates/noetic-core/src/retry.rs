//! Retry Engine (C3)
//!
//! Classifies errors as transient, permanent, or unknown and retries
//! transient failures with exponential backoff, capped at `max_delay_ms`.
//! `Unknown` is deliberately *not* retried by default — an ambiguous
//! failure fails fast rather than burning retry budget on something that
//! might be permanent.

use crate::config::RetryConfig;
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

/// Result of classifying a failure for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Transient,
    Permanent,
    Unknown,
}

const TRANSIENT_HTTP_STATUS: [u16; 11] = [408, 429, 500, 502, 503, 504, 520, 521, 522, 523, 524];
const PERMANENT_HTTP_STATUS: [u16; 7] = [400, 401, 403, 404, 405, 410, 422];
const TRANSIENT_NET_CODES: [&str; 8] = [
    "ETIMEDOUT",
    "ECONNRESET",
    "ECONNREFUSED",
    "ENOTFOUND",
    "ENETUNREACH",
    "EHOSTUNREACH",
    "EPIPE",
    "EAI_AGAIN",
];

fn transient_message_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)timeout|timed out|temporarily unavailable|rate limit|too many requests|service unavailable|server error|network error|connection reset|SQLITE_BUSY|SQLITE_LOCKED")
            .expect("static retry regex is valid")
    })
}

fn permanent_message_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)unauthorized|authentication failed|invalid api key|invalid_api_key|forbidden|access denied|not found|does not exist|invalid request|malformed")
            .expect("static retry regex is valid")
    })
}

/// A minimal view of a failure, independent of its concrete error type, used
/// to drive classification.
#[derive(Debug, Clone, Default)]
pub struct FailureInfo {
    pub http_status: Option<u16>,
    pub network_code: Option<String>,
    pub message: String,
}

/// Classify a failure as transient, permanent, or unknown. Resolution order:
/// HTTP status, then network code, then permanent-message regex, then
/// transient-message regex, finally `Unknown`.
pub fn classify(info: &FailureInfo) -> Classification {
    if let Some(status) = info.http_status {
        if TRANSIENT_HTTP_STATUS.contains(&status) {
            return Classification::Transient;
        }
        if PERMANENT_HTTP_STATUS.contains(&status) {
            return Classification::Permanent;
        }
    }

    if let Some(code) = &info.network_code {
        if TRANSIENT_NET_CODES.contains(&code.as_str()) {
            return Classification::Transient;
        }
    }

    if permanent_message_re().is_match(&info.message) {
        return Classification::Permanent;
    }
    if transient_message_re().is_match(&info.message) {
        return Classification::Transient;
    }

    Classification::Unknown
}

/// A single retry attempt's outcome, kept for observability/debugging.
#[derive(Debug, Clone)]
pub struct AttemptLog {
    pub attempt: u32,
    pub classification: Classification,
    pub delay: Duration,
}

/// Error returned when retrying stops, wrapping the last underlying error
/// and the full attempt log.
#[derive(Debug, thiserror::Error)]
#[error("retry stopped after {attempts} attempt(s): {last_error}")]
pub struct RetryExhausted<E: std::fmt::Display> {
    pub attempts: u32,
    pub last_error: E,
    pub log: Vec<AttemptLog>,
    /// `true` if this stop was a fast-fail on a permanent or unknown
    /// classification rather than running out of retries.
    pub is_permanent: bool,
}

fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let raw = config.base_delay_ms as f64 * config.backoff_base.powi(attempt as i32);
    let capped = raw.min(config.max_delay_ms as f64);
    Duration::from_millis(capped as u64)
}

/// Execute `op`, retrying only `Transient` failures with exponential backoff
/// up to `config.max_retries` additional attempts. `Permanent` and `Unknown`
/// classifications fail immediately without sleeping. `classify_err` turns
/// the operation's error into a `FailureInfo`. `should_retry`, when
/// provided, can override the default classification-based decision.
/// `on_retry` is invoked before each sleep. `sleep` performs the actual
/// delay — injected so tests can skip real time.
pub fn retry_with_backoff<T, E, Op, Classify, ShouldRetry, OnRetry, Sleep>(
    config: &RetryConfig,
    mut op: Op,
    classify_err: Classify,
    mut should_retry: ShouldRetry,
    mut on_retry: OnRetry,
    mut sleep: Sleep,
) -> Result<T, RetryExhausted<E>>
where
    E: std::fmt::Display,
    Op: FnMut(u32) -> Result<T, E>,
    Classify: Fn(&E) -> FailureInfo,
    ShouldRetry: FnMut(&E, u32, Classification) -> bool,
    OnRetry: FnMut(u32, &E, Duration),
    Sleep: FnMut(Duration),
{
    let mut log = Vec::new();
    let mut attempt = 0u32;

    loop {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(err) => {
                let info = classify_err(&err);
                let classification = classify(&info);
                let retryable = classification == Classification::Transient
                    && should_retry(&err, attempt, classification);

                if !retryable || attempt >= config.max_retries {
                    log.push(AttemptLog {
                        attempt,
                        classification,
                        delay: Duration::ZERO,
                    });
                    let is_permanent = classification != Classification::Transient;
                    return Err(RetryExhausted {
                        attempts: attempt + 1,
                        last_error: err,
                        log,
                        is_permanent,
                    });
                }

                let delay = backoff_delay(config, attempt);
                log.push(AttemptLog {
                    attempt,
                    classification,
                    delay,
                });
                tracing::warn!(
                    attempt,
                    ?classification,
                    delay_ms = delay.as_millis() as u64,
                    "retrying after transient failure"
                );
                on_retry(attempt, &err, delay);
                sleep(delay);
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> RetryConfig {
        RetryConfig::default()
    }

    fn run<T, E, Op>(config: &RetryConfig, op: Op) -> Result<T, RetryExhausted<E>>
    where
        E: std::fmt::Display,
        Op: FnMut(u32) -> Result<T, E>,
    {
        retry_with_backoff(
            config,
            op,
            |_: &E| FailureInfo::default(),
            |_, _, _| true,
            |_, _, _| {},
            |_| {},
        )
    }

    #[test]
    fn classifies_transient_http_status() {
        let info = FailureInfo {
            http_status: Some(503),
            ..Default::default()
        };
        assert_eq!(classify(&info), Classification::Transient);
    }

    #[test]
    fn classifies_permanent_http_status() {
        let info = FailureInfo {
            http_status: Some(401),
            ..Default::default()
        };
        assert_eq!(classify(&info), Classification::Permanent);
    }

    #[test]
    fn classifies_transient_network_code() {
        let info = FailureInfo {
            network_code: Some("ECONNRESET".into()),
            ..Default::default()
        };
        assert_eq!(classify(&info), Classification::Transient);
    }

    #[test]
    fn classifies_by_message_case_insensitively() {
        let info = FailureInfo {
            message: "Rate limit exceeded, please slow down".into(),
            ..Default::default()
        };
        assert_eq!(classify(&info), Classification::Transient);
    }

    #[test]
    fn classifies_sqlite_busy_as_transient() {
        let info = FailureInfo {
            message: "database error: SQLITE_BUSY".into(),
            ..Default::default()
        };
        assert_eq!(classify(&info), Classification::Transient);
    }

    #[test]
    fn classifies_permanent_message() {
        let info = FailureInfo {
            message: "Invalid API key provided".into(),
            ..Default::default()
        };
        assert_eq!(classify(&info), Classification::Permanent);
    }

    #[test]
    fn unknown_when_nothing_matches() {
        let info = FailureInfo {
            message: "something weird happened".into(),
            ..Default::default()
        };
        assert_eq!(classify(&info), Classification::Unknown);
    }

    #[test]
    fn backoff_delay_is_capped() {
        let config = cfg();
        let d = backoff_delay(&config, 10);
        assert_eq!(d, Duration::from_millis(config.max_delay_ms));
    }

    #[test]
    fn retries_transient_until_success() {
        let config = cfg();
        let mut calls = 0u32;
        let result: Result<i32, RetryExhausted<String>> =
            retry_with_backoff(
                &config,
                |attempt| {
                    calls += 1;
                    if attempt < 2 {
                        Err("timeout occurred".to_string())
                    } else {
                        Ok(42)
                    }
                },
                |e: &String| FailureInfo {
                    message: e.clone(),
                    ..Default::default()
                },
                |_, _, _| true,
                |_, _, _| {},
                |_d| {},
            );
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls, 3);
    }

    #[test]
    fn stops_immediately_on_permanent_error() {
        let config = cfg();
        let mut calls = 0u32;
        let result: Result<(), RetryExhausted<String>> = run(&config, |_attempt| {
            calls += 1;
            Err("unauthorized".to_string())
        });
        let err = result.unwrap_err();
        assert!(err.is_permanent);
        assert_eq!(calls, 1);
    }

    #[test]
    fn unknown_classification_is_not_retried_by_default() {
        let config = cfg();
        let mut calls = 0u32;
        let result: Result<(), RetryExhausted<String>> = retry_with_backoff(
            &config,
            |_attempt| {
                calls += 1;
                Err("something weird happened".to_string())
            },
            |e: &String| FailureInfo {
                message: e.clone(),
                ..Default::default()
            },
            |_, _, _| true,
            |_, _, _| {},
            |_d| {},
        );
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn exhausts_after_max_retries() {
        let config = RetryConfig {
            max_retries: 2,
            ..cfg()
        };
        let mut calls = 0u32;
        let result: Result<(), RetryExhausted<String>> = run(&config, |_attempt| {
            calls += 1;
            Err("timeout".to_string())
        });
        let err = result.unwrap_err();
        assert_eq!(err.attempts, 3);
        assert_eq!(calls, 3);
        assert!(!err.is_permanent);
    }
}
