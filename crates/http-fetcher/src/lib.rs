//! Retrying, rate-limit-aware HTTP layer shared by all ingestors.
//!
//! Every request gets up to three attempts with jittered exponential backoff.
//! Rate-limit responses (403/429/503) honour `Retry-After`; other 4xx fail
//! fast. Outcomes surface as typed errors so ingestors can react to a rate
//! limit differently from a transient failure.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use thiserror::Error;

const MAX_RETRIES: u32 = 3;
const BACKOFF_BASE_DELAY_SECS: f64 = 2.0;
const BACKOFF_MAX_DELAY_SECS: f64 = 60.0;
const BACKOFF_MULTIPLIER: f64 = 2.0;
const JITTER_RANGE: f64 = 0.5;
const DEFAULT_TIMEOUT_SECS: u64 = 15;
const RATE_LIMIT_CODES: [u16; 3] = [403, 429, 503];
const USER_AGENT: &str = "MeridianBot/0.1";

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Rate limited ({status}) for {url}")]
    RateLimited {
        url: String,
        status: u16,
        retry_after: Option<f64>,
    },

    #[error("Transient failure after {attempts} attempts for {url}: {message}")]
    Transient {
        url: String,
        message: String,
        attempts: u32,
    },

    #[error("Request failed ({status}) for {url}")]
    Status { url: String, status: u16 },

    #[error("Invalid response from {url}: {message}")]
    Invalid { url: String, message: String },
}

impl FetchError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, FetchError::RateLimited { .. })
    }
}

/// Shared HTTP client with retry/backoff discipline.
#[derive(Clone)]
pub struct Fetcher {
    client: reqwest::Client,
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }

    /// GET a URL, returning the raw body bytes.
    pub async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.get_with_headers(url, &[]).await
    }

    /// GET with extra request headers.
    pub async fn get_with_headers(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<Vec<u8>, FetchError> {
        let build = || {
            let mut request = self.client.get(url);
            for (name, value) in headers {
                request = request.header(*name, *value);
            }
            request
        };
        self.execute(url, build).await
    }

    /// GET a URL and decode the body as text (invalid UTF-8 replaced).
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let body = self.get(url).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    pub async fn get_text_with_headers(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<String, FetchError> {
        let body = self.get_with_headers(url, headers).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// POST a JSON body and parse the JSON response.
    pub async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
        headers: &[(&str, &str)],
    ) -> Result<serde_json::Value, FetchError> {
        let build = || {
            let mut request = self.client.post(url).json(body);
            for (name, value) in headers {
                request = request.header(*name, *value);
            }
            request
        };
        let bytes = self.execute(url, build).await?;
        serde_json::from_slice(&bytes).map_err(|err| FetchError::Invalid {
            url: url.to_string(),
            message: err.to_string(),
        })
    }

    async fn execute<F>(&self, url: &str, build: F) -> Result<Vec<u8>, FetchError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut last_message = String::new();

        for attempt in 0..MAX_RETRIES {
            match build().send().await {
                Ok(response) => {
                    let status = response.status().as_u16();

                    if response.status().is_success() {
                        return response
                            .bytes()
                            .await
                            .map(|b| b.to_vec())
                            .map_err(|err| FetchError::Transient {
                                url: url.to_string(),
                                message: err.to_string(),
                                attempts: attempt + 1,
                            });
                    }

                    if RATE_LIMIT_CODES.contains(&status) {
                        let retry_after = response
                            .headers()
                            .get(reqwest::header::RETRY_AFTER)
                            .and_then(|v| v.to_str().ok())
                            .and_then(parse_retry_after);
                        if attempt < MAX_RETRIES - 1 {
                            let delay = backoff_delay(attempt, retry_after);
                            tracing::warn!(
                                url,
                                status,
                                delay_secs = delay.as_secs_f64(),
                                attempt = attempt + 1,
                                "rate limited, retrying"
                            );
                            tokio::time::sleep(delay).await;
                            continue;
                        }
                        return Err(FetchError::RateLimited {
                            url: url.to_string(),
                            status,
                            retry_after,
                        });
                    }

                    if status >= 500 {
                        last_message = format!("HTTP {status}");
                        if attempt < MAX_RETRIES - 1 {
                            let delay = backoff_delay(attempt, None);
                            tracing::warn!(
                                url,
                                status,
                                delay_secs = delay.as_secs_f64(),
                                attempt = attempt + 1,
                                "server error, retrying"
                            );
                            tokio::time::sleep(delay).await;
                            continue;
                        }
                        break;
                    }

                    // Other 4xx: not retryable.
                    return Err(FetchError::Status {
                        url: url.to_string(),
                        status,
                    });
                }
                Err(err) => {
                    last_message = err.to_string();
                    if attempt < MAX_RETRIES - 1 {
                        let delay = backoff_delay(attempt, None);
                        tracing::warn!(
                            url,
                            error = %err,
                            delay_secs = delay.as_secs_f64(),
                            attempt = attempt + 1,
                            "network error, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                }
            }
        }

        Err(FetchError::Transient {
            url: url.to_string(),
            message: last_message,
            attempts: MAX_RETRIES,
        })
    }
}

/// Backoff delay for an attempt with +/-50% uniform jitter. A server-provided
/// `Retry-After` overrides the exponential schedule but is still capped.
pub fn backoff_delay(attempt: u32, retry_after: Option<f64>) -> Duration {
    let base = match retry_after {
        Some(hint) if hint > 0.0 => hint.min(BACKOFF_MAX_DELAY_SECS),
        _ => (BACKOFF_BASE_DELAY_SECS * BACKOFF_MULTIPLIER.powi(attempt as i32))
            .min(BACKOFF_MAX_DELAY_SECS),
    };
    let jitter = base * JITTER_RANGE * (2.0 * rand::thread_rng().gen::<f64>() - 1.0);
    Duration::from_secs_f64((base + jitter).max(0.1))
}

/// Parse a `Retry-After` header value: seconds or an HTTP date.
pub fn parse_retry_after(header: &str) -> Option<f64> {
    let trimmed = header.trim();
    if let Ok(seconds) = trimmed.parse::<f64>() {
        return Some(seconds);
    }
    let parsed = DateTime::parse_from_rfc2822(trimmed).ok()?;
    let delta = parsed.with_timezone(&Utc) - Utc::now();
    Some(delta.num_milliseconds().max(0) as f64 / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_stays_within_jitter_bounds() {
        for attempt in 0..4 {
            let expected = (2.0_f64 * 2.0_f64.powi(attempt)).min(60.0);
            for _ in 0..20 {
                let delay = backoff_delay(attempt as u32, None).as_secs_f64();
                assert!(delay >= expected * 0.5 - 1e-9, "attempt {attempt}: {delay}");
                assert!(delay <= expected * 1.5 + 1e-9, "attempt {attempt}: {delay}");
            }
        }
    }

    #[test]
    fn retry_after_hint_overrides_schedule_but_is_capped() {
        for _ in 0..20 {
            let delay = backoff_delay(0, Some(10.0)).as_secs_f64();
            assert!((5.0..=15.0).contains(&delay));
        }
        for _ in 0..20 {
            let delay = backoff_delay(0, Some(600.0)).as_secs_f64();
            assert!(delay <= 90.0);
        }
    }

    #[test]
    fn retry_after_parses_seconds_and_http_dates() {
        assert_eq!(parse_retry_after("30"), Some(30.0));
        assert_eq!(parse_retry_after(" 1.5 "), Some(1.5));

        let future = (Utc::now() + chrono::Duration::seconds(120)).to_rfc2822();
        let parsed = parse_retry_after(&future).expect("date header");
        assert!(parsed > 100.0 && parsed <= 120.0);

        let past = (Utc::now() - chrono::Duration::seconds(60)).to_rfc2822();
        assert_eq!(parse_retry_after(&past), Some(0.0));

        assert_eq!(parse_retry_after("not-a-date"), None);
    }

    #[test]
    fn rate_limit_code_set_matches_contract() {
        for code in [403u16, 429, 503] {
            assert!(RATE_LIMIT_CODES.contains(&code));
        }
        assert!(!RATE_LIMIT_CODES.contains(&500));
        assert!(!RATE_LIMIT_CODES.contains(&404));
    }
}
