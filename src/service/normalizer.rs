//! Client for the external fiat rate normalization service.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum RateNormalizationError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Rate service answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed rate service response: {0}")]
    Malformed(String),
}

/// Signed wei amount at a point in time; refunds are negative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatedValue {
    pub value: i128,
    pub time: DateTime<Utc>,
}

#[async_trait]
pub trait RateNormalizer: Send + Sync {
    /// Fiat tally of `values`, formatted with two decimals.
    async fn tally_dollars(&self, values: &[DatedValue]) -> Result<String, RateNormalizationError>;
}

pub struct HttpRateNormalizer {
    http: Client,
    base_url: String,
    token: String,
}

impl HttpRateNormalizer {
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self, RateNormalizationError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }
}

/// `value@time` pairs, comma separated, as the rate service expects them.
pub fn format_values(values: &[DatedValue]) -> String {
    values
        .iter()
        .map(|v| format!("{}@{}", v.value, v.time.to_rfc3339_opts(SecondsFormat::Millis, true)))
        .collect::<Vec<_>>()
        .join(",")
}

/// Round to cents and render with two decimals.
pub fn format_dollars(tally: f64) -> String {
    format!("{:.2}", (tally * 100.0).round() / 100.0)
}

#[async_trait]
impl RateNormalizer for HttpRateNormalizer {
    async fn tally_dollars(&self, values: &[DatedValue]) -> Result<String, RateNormalizationError> {
        if values.is_empty() {
            return Ok(format_dollars(0.0));
        }

        let url = format!("{}/tallymax/wei/{}", self.base_url, format_values(values));
        let response = self.http.get(&url).bearer_auth(&self.token).send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(RateNormalizationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let tally: f64 = body
            .trim()
            .parse()
            .map_err(|_| RateNormalizationError::Malformed(body.clone()))?;
        debug!("Rate service tally for {} values: {}", values.len(), tally);

        Ok(format_dollars(tally))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_values() {
        let time = Utc.with_ymd_and_hms(2021, 3, 4, 5, 6, 7).unwrap();
        let values = vec![
            DatedValue { value: 100, time },
            DatedValue { value: -40, time },
        ];
        assert_eq!(
            format_values(&values),
            "100@2021-03-04T05:06:07.000Z,-40@2021-03-04T05:06:07.000Z"
        );
    }

    #[test]
    fn test_format_dollars() {
        assert_eq!(format_dollars(0.0), "0.00");
        assert_eq!(format_dollars(12.346), "12.35");
        assert_eq!(format_dollars(7.1), "7.10");
    }
}
