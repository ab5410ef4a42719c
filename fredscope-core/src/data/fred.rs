//! FRED (Federal Reserve Economic Data) client.
//!
//! Implements both collaborator traits over the FRED REST API:
//! - `series/observations` for [`SeriesProvider::fetch_series`]
//! - `category/series` and `category/children` for [`CategorySource`]
//!
//! Transport errors, 429 and 5xx responses are retried with exponential
//! backoff. The circuit breaker counts logical requests, not attempts: a
//! request that exhausts its retries is one failure, so a single bad series
//! or category cannot trip the breaker for its siblings. Error bodies
//! returned by the API (`error_code` / `error_message`) are mapped to typed
//! errors and are not retried.

use super::circuit_breaker::CircuitBreaker;
use super::provider::{CategorySource, DataError, SeriesProvider};
use crate::domain::{CategoryId, ObservationPoint, SeriesRecord};
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.stlouisfed.org/fred";

/// FRED caps `category/series` pages at 1000 records.
const PAGE_LIMIT: usize = 1000;

/// FRED encodes a missing observation as a single dot.
const MISSING_VALUE: &str = ".";

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    observations: Vec<RawObservation>,
}

#[derive(Debug, Deserialize)]
struct RawObservation {
    date: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct CategorySeriesResponse {
    #[serde(default)]
    count: Option<usize>,
    seriess: Vec<SeriesRecord>,
}

#[derive(Debug, Deserialize)]
struct CategoryChildrenResponse {
    categories: Vec<RawCategory>,
}

#[derive(Debug, Deserialize)]
struct RawCategory {
    id: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    error_code: Option<u16>,
    error_message: String,
}

/// Connection settings for [`FredClient`]. The API key is always explicit.
#[derive(Debug, Clone)]
pub struct FredConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl FredConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// Blocking FRED API client.
pub struct FredClient {
    client: reqwest::blocking::Client,
    config: FredConfig,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl FredClient {
    pub fn new(config: FredConfig, circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, DataError> {
        if config.api_key.trim().is_empty() {
            return Err(DataError::AuthenticationRequired(
                "FRED API key is empty".into(),
            ));
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("fredscope/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            circuit_breaker,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url.trim_end_matches('/'))
    }

    /// GET `path` with retry and circuit breaker logic, returning the body.
    ///
    /// `subject` names the series or category for error messages.
    fn get_with_retry(
        &self,
        path: &str,
        params: &[(&str, String)],
        subject: &str,
    ) -> Result<String, DataError> {
        let url = self.endpoint(path);
        let mut query: Vec<(&str, String)> = params.to_vec();
        query.push(("api_key", self.config.api_key.clone()));
        query.push(("file_type", "json".to_string()));

        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = self.config.base_delay * 2u32.pow(attempt - 1);
                tracing::debug!(path, subject, attempt, ?delay, "retrying");
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(last_error.unwrap_or(DataError::CircuitBreakerTripped));
            }

            let resp = match self.client.get(&url).query(&query).send() {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                    continue;
                }
                Err(e) => return Err(DataError::NetworkUnreachable(e.to_string())),
            };

            let status = resp.status();

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                let retry_after = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                last_error = Some(DataError::RateLimited {
                    retry_after_secs: retry_after,
                });
                continue;
            }

            if status.is_server_error() {
                last_error = Some(DataError::Other(format!("HTTP {status} for {subject}")));
                continue;
            }

            let body = resp.text().map_err(|e| {
                DataError::ResponseFormatChanged(format!("failed to read body for {subject}: {e}"))
            })?;

            if status == reqwest::StatusCode::FORBIDDEN {
                self.circuit_breaker.trip();
                return Err(DataError::AuthenticationRequired(format!(
                    "FRED refused the request for {subject}"
                )));
            }

            if !status.is_success() {
                return Err(map_error_body(status.as_u16(), &body, subject));
            }

            self.circuit_breaker.record_success();
            return Ok(body);
        }

        self.circuit_breaker.record_failure();
        tracing::warn!(path, subject, "retries exhausted");
        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }

    fn category_series_page(
        &self,
        category: CategoryId,
        offset: usize,
    ) -> Result<(Vec<SeriesRecord>, Option<usize>), DataError> {
        let body = self.get_with_retry(
            "category/series",
            &[
                ("category_id", category.to_string()),
                ("limit", PAGE_LIMIT.to_string()),
                ("offset", offset.to_string()),
            ],
            &format!("category {category}"),
        )?;
        parse_category_series(&body)
    }
}

impl SeriesProvider for FredClient {
    fn name(&self) -> &str {
        "fred"
    }

    fn fetch_series(
        &self,
        series_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ObservationPoint>, DataError> {
        if start > end {
            return Err(DataError::RequestRejected(format!(
                "observation_start {start} is after observation_end {end}"
            )));
        }
        self.get_with_retry(
            "series/observations",
            &[
                ("series_id", series_id.to_string()),
                ("observation_start", start.format("%Y-%m-%d").to_string()),
                ("observation_end", end.format("%Y-%m-%d").to_string()),
            ],
            series_id,
        )
        .and_then(|body| parse_observations(series_id, &body))
        .map_err(|e| match e {
            DataError::RequestRejected(msg) if mentions_missing_series(&msg) => {
                DataError::SeriesNotFound {
                    series_id: series_id.to_string(),
                }
            }
            other => other,
        })
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}

impl CategorySource for FredClient {
    fn list_series(&self, category: CategoryId) -> Result<Vec<SeriesRecord>, DataError> {
        let mut records = Vec::new();
        loop {
            let (page, count) = self.category_series_page(category, records.len())?;
            let page_len = page.len();
            records.extend(page);
            let total = count.unwrap_or(records.len());
            if page_len == 0 || page_len < PAGE_LIMIT || records.len() >= total {
                break;
            }
        }
        Ok(records)
    }

    fn list_children(&self, category: CategoryId) -> Result<Vec<CategoryId>, DataError> {
        let body = self.get_with_retry(
            "category/children",
            &[("category_id", category.to_string())],
            &format!("category {category}"),
        )?;
        parse_category_children(&body)
    }
}

// ── Response parsing ────────────────────────────────────────────────

fn mentions_missing_series(message: &str) -> bool {
    message.to_ascii_lowercase().contains("does not exist")
}

/// Map a non-success response body to a typed error.
fn map_error_body(status: u16, body: &str, subject: &str) -> DataError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.error_message)
        .unwrap_or_else(|_| format!("HTTP {status} for {subject}"));

    if status == 401 || message.contains("api_key") {
        DataError::AuthenticationRequired(message)
    } else {
        DataError::RequestRejected(message)
    }
}

/// Parse a `series/observations` body. The `"."` placeholder becomes a
/// missing value.
pub fn parse_observations(series_id: &str, body: &str) -> Result<Vec<ObservationPoint>, DataError> {
    if let Ok(err) = serde_json::from_str::<ErrorResponse>(body) {
        return Err(map_error_body(err.error_code.unwrap_or(400), body, series_id));
    }

    let resp: ObservationsResponse = serde_json::from_str(body).map_err(|e| {
        DataError::ResponseFormatChanged(format!("observations for {series_id}: {e}"))
    })?;

    resp.observations
        .into_iter()
        .map(|raw| {
            let date = NaiveDate::parse_from_str(&raw.date, "%Y-%m-%d").map_err(|e| {
                DataError::ResponseFormatChanged(format!(
                    "invalid observation date '{}' for {series_id}: {e}",
                    raw.date
                ))
            })?;
            let value = match raw.value.trim() {
                MISSING_VALUE | "" => None,
                v => Some(v.parse::<f64>().map_err(|e| {
                    DataError::ResponseFormatChanged(format!(
                        "invalid value '{v}' on {date} for {series_id}: {e}"
                    ))
                })?),
            };
            Ok(ObservationPoint { date, value })
        })
        .collect()
}

/// Parse one `category/series` page into records plus the reported total.
pub fn parse_category_series(body: &str) -> Result<(Vec<SeriesRecord>, Option<usize>), DataError> {
    let resp: CategorySeriesResponse = serde_json::from_str(body)
        .map_err(|e| DataError::ResponseFormatChanged(format!("category/series: {e}")))?;
    Ok((resp.seriess, resp.count))
}

/// Parse a `category/children` body into child ids.
pub fn parse_category_children(body: &str) -> Result<Vec<CategoryId>, DataError> {
    let resp: CategoryChildrenResponse = serde_json::from_str(body)
        .map_err(|e| DataError::ResponseFormatChanged(format!("category/children: {e}")))?;
    Ok(resp.categories.into_iter().map(|c| CategoryId(c.id)).collect())
}
