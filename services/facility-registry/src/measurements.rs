//! Annual facility emissions from the EASEY apportioned-emissions API.

use anyhow::{bail, Context, Result};
use reqwest::Url;
use serde_json::Value;
use std::time::Duration;
use verdant_models::FacilityMeasurements;

use crate::adapters::{build_url, HttpContext};

const SOURCE_NAME: &str = "EPA_EASEY";

/// EASEY mass fields are short tons; everything downstream is metric tonnes.
pub const SHORT_TON_TO_TONNE: f64 = 0.907185;

pub struct MeasurementsClient {
    base: String,
    api_key: Option<String>,
    http: HttpContext,
    timeout: Duration,
}

impl MeasurementsClient {
    pub fn new(base: &str, api_key: Option<String>, http: HttpContext, timeout: Duration) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            http,
            timeout,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn request_url(&self, facility_id: &str, year: i32) -> Result<Url> {
        let mut url = build_url(&self.base, &["apportioned", "annual"])?;
        url.query_pairs_mut()
            .append_pair("facilityId", facility_id)
            .append_pair("year", &year.to_string());
        Ok(url)
    }

    /// Summed annual totals, or `None` when no key is configured, the call fails,
    /// or the facility reported nothing for `year`.
    pub async fn annual(&self, facility_id: &str, year: i32) -> Option<FacilityMeasurements> {
        let api_key = self.api_key.as_deref()?;
        match self.fetch(api_key, facility_id, year).await {
            Ok(measurements) if measurements.has_any() => Some(measurements),
            Ok(_) => {
                tracing::debug!(facility_id, year, "No reference measurements reported");
                None
            }
            Err(err) => {
                tracing::warn!(facility_id, year, error = %err, "Reference measurement lookup failed");
                None
            }
        }
    }

    async fn fetch(&self, api_key: &str, facility_id: &str, year: i32) -> Result<FacilityMeasurements> {
        let url = self.request_url(facility_id, year)?;
        let label = url.to_string();
        let response = crate::retry::send_with_retry(&label, self.http.retry, || {
            self.http
                .client
                .get(url.clone())
                .header("x-api-key", api_key)
                .header("Accept", "application/json")
                .timeout(self.timeout)
        })
        .await?;

        if !response.status().is_success() {
            bail!("{} returned HTTP {}", label, response.status());
        }
        let body: Value = response.json().await.context("Failed to decode measurements")?;
        Ok(sum_annual_rows(&body, facility_id, year))
    }
}

/// Sums per-unit rows and converts to metric tonnes; a pollutant stays `None`
/// unless some row reports it.
pub fn sum_annual_rows(body: &Value, facility_id: &str, year: i32) -> FacilityMeasurements {
    let rows: &[Value] = match body {
        Value::Array(rows) => rows,
        Value::Object(map) => map.get("items").and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[]),
        _ => &[],
    };

    let total = |field: &str| -> Option<f64> {
        rows.iter()
            .filter_map(|row| row.get(field).and_then(Value::as_f64))
            .fold(None, |acc, v| Some(acc.unwrap_or(0.0) + v))
            .map(|short_tons| short_tons * SHORT_TON_TO_TONNE)
    };

    FacilityMeasurements {
        facility_id: facility_id.to_string(),
        year,
        co2_tons: total("co2Mass"),
        nox_tons: total("noxMass"),
        so2_tons: total("so2Mass"),
        source: SOURCE_NAME.to_string(),
    }
}
