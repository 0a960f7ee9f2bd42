//! Registry source adapters.
//!
//! Every adapter normalizes its own upstream schema into [`FacilityRecord`]s and
//! reports `None` for any failure or empty result, so the client can move on to
//! the next tier without inspecting errors.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use futures_util::future::{select_ok, BoxFuture, FutureExt};
use reqwest::{Client, Url};
use serde_json::{Map, Value};
use std::time::Duration;
use verdant_models::{FacilityRecord, SourceBatch, SourceTag};

use crate::retry::{send_with_retry, RetryPolicy};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacilityQuery {
    pub company: String,
    pub state: Option<String>,
    pub limit: usize,
}

impl FacilityQuery {
    pub fn new(company: &str, state: Option<&str>, limit: usize) -> Self {
        Self {
            company: company.trim().to_string(),
            state: state.map(|s| s.trim().to_uppercase()).filter(|s| !s.is_empty()),
            limit: limit.max(1),
        }
    }

    fn rows_segment(&self) -> String {
        format!("0:{}", self.limit.saturating_sub(1))
    }
}

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, query: &FacilityQuery) -> Option<SourceBatch>;
}

/// Shared HTTP client and retry budget.
#[derive(Clone)]
pub struct HttpContext {
    pub client: Client,
    pub retry: RetryPolicy,
}

impl HttpContext {
    pub fn new(user_agent: &str, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client, retry })
    }

    /// GET `url` and decode JSON; non-2xx responses are errors.
    pub async fn get_json(&self, url: Url, timeout: Duration) -> Result<Value> {
        let label = url.to_string();
        let response = send_with_retry(&label, self.retry, || {
            self.client
                .get(url.clone())
                .header("Accept", "application/json")
                .timeout(timeout)
        })
        .await?;

        let status = response.status();
        if !status.is_success() {
            bail!("{} returned HTTP {}", label, status);
        }
        response
            .json::<Value>()
            .await
            .with_context(|| format!("Failed to decode JSON from {}", label))
    }
}

/// Appends path segments to `base`, percent-encoding each one.
pub fn build_url(base: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(base).with_context(|| format!("invalid base url {}", base))?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("base url {} cannot carry a path", base))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Substring containment, or any shared company word longer than three characters.
pub fn filter_by_company(records: Vec<FacilityRecord>, company: &str) -> Vec<FacilityRecord> {
    let company_lower = company.trim().to_lowercase();
    if company_lower.is_empty() {
        return Vec::new();
    }
    let words: Vec<&str> = company_lower
        .split_whitespace()
        .filter(|w| w.chars().count() > 3)
        .collect();

    records
        .into_iter()
        .filter(|record| {
            let name = record.facility_name.to_lowercase();
            name.contains(&company_lower) || words.iter().any(|w| name.contains(w))
        })
        .collect()
}

fn text_field(row: &Map<String, Value>, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        row.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .and_then(|(_, value)| match value {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
    })
}

/// Normalizes one Envirofacts row; TRI and FRS tables use different column names.
pub fn normalize_envirofacts_row(row: &Map<String, Value>, source: &str) -> Option<FacilityRecord> {
    let facility_name = text_field(row, &["facility_name", "primary_name"])?;
    let state = text_field(row, &["state_abbr", "state_code", "state"]);
    let registry_id = text_field(row, &["tri_facility_id", "registry_id", "frs_facility_id", "facility_id"])
        .unwrap_or_else(|| derived_id(source, &facility_name, state.as_deref()));

    Some(FacilityRecord {
        registry_id,
        facility_name,
        state,
        county: text_field(row, &["county_name", "county"]),
        city: text_field(row, &["city_name", "city"]),
        zip_code: text_field(row, &["zip_code", "postal_code"]),
        source: source.to_string(),
        industry_type: None,
        confidence_note: None,
    })
}

/// Stable identifier for upstream rows that carry none.
fn derived_id(source: &str, name: &str, state: Option<&str>) -> String {
    let slug: String = name
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_uppercase)
        .collect();
    format!("{}-{}-{}", source, slug, state.unwrap_or("NA").to_uppercase())
}

fn rows_of(value: Value) -> Result<Vec<Map<String, Value>>> {
    match value {
        Value::Array(items) => Ok(items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect()),
        other => bail!("expected a JSON array, got {}", type_name(&other)),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointTier {
    Primary,
    Backup,
}

/// One Envirofacts-style endpoint, queried with several URL shapes at once.
pub struct EnvirofactsEndpoint {
    base: String,
    tier: EndpointTier,
    http: HttpContext,
    timeout: Duration,
}

impl EnvirofactsEndpoint {
    pub fn new(base: &str, tier: EndpointTier, http: HttpContext, timeout: Duration) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            tier,
            http,
            timeout,
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    fn tag(&self) -> SourceTag {
        match self.tier {
            EndpointTier::Primary => SourceTag::Primary { endpoint: self.base.clone() },
            EndpointTier::Backup => SourceTag::Backup { endpoint: self.base.clone() },
        }
    }

    /// The three URL shapes tried for a query, in priority order.
    pub fn url_shapes(&self, query: &FacilityQuery) -> Result<Vec<Url>> {
        let c = query.company.as_str();
        let shapes: Vec<Vec<&str>> = match query.state.as_deref() {
            Some(s) => vec![
                vec!["tri_facility", "STATE_ABBR", s, "PRIMARY_NAME", "CONTAINING", c, "JSON"],
                vec!["tri_facility", "PRIMARY_NAME", "CONTAINING", c, "JSON"],
                vec!["FRS_FACILITY_SITE", "PRIMARY_NAME", "CONTAINING", c, "JSON"],
            ],
            None => vec![
                vec!["tri_facility", "PRIMARY_NAME", "CONTAINING", c, "JSON"],
                vec!["tri_facility", "FACILITY_NAME", "CONTAINING", c, "JSON"],
                vec!["FRS_FACILITY_SITE", "PRIMARY_NAME", "CONTAINING", c, "JSON"],
            ],
        };
        shapes.iter().map(|segments| build_url(&self.base, segments)).collect()
    }

    async fn fetch_shape(&self, url: Url, query: &FacilityQuery) -> Result<Vec<FacilityRecord>> {
        let source = if url.path().contains("FRS_FACILITY_SITE") { "FRS" } else { "TRI" };
        let rows = rows_of(self.http.get_json(url.clone(), self.timeout).await?)?;
        let records: Vec<FacilityRecord> = rows
            .iter()
            .filter_map(|row| normalize_envirofacts_row(row, source))
            .collect();
        let mut filtered = filter_by_company(records, &query.company);
        if filtered.is_empty() {
            bail!("{} returned no facilities for {}", url, query.company);
        }
        filtered.truncate(query.limit);
        Ok(filtered)
    }
}

#[async_trait]
impl SourceAdapter for EnvirofactsEndpoint {
    fn name(&self) -> &str {
        &self.base
    }

    async fn fetch(&self, query: &FacilityQuery) -> Option<SourceBatch> {
        let urls = match self.url_shapes(query) {
            Ok(urls) => urls,
            Err(err) => {
                tracing::warn!(endpoint = %self.base, error = %err, "Cannot build endpoint URLs");
                return None;
            }
        };

        let attempts: Vec<BoxFuture<'_, Result<Vec<FacilityRecord>>>> = urls
            .into_iter()
            .map(|url| self.fetch_shape(url, query).boxed())
            .collect();

        match select_ok(attempts).await {
            Ok((records, _pending)) => {
                tracing::info!(
                    endpoint = %self.base,
                    tier = self.tag().tier(),
                    company = %query.company,
                    count = records.len(),
                    "Fetched facilities"
                );
                Some(SourceBatch::new(records, self.tag()))
            }
            Err(err) => {
                tracing::debug!(endpoint = %self.base, error = %err, "All URL shapes failed");
                None
            }
        }
    }
}

/// ECHO facility search (`Results.Facilities`).
pub struct EchoAdapter {
    urls: Vec<String>,
    http: HttpContext,
    timeout: Duration,
}

impl EchoAdapter {
    pub fn new(urls: Vec<String>, http: HttpContext, timeout: Duration) -> Self {
        Self { urls, http, timeout }
    }

    fn request_url(&self, base: &str, query: &FacilityQuery) -> Result<Url> {
        let mut url = Url::parse(base).with_context(|| format!("invalid ECHO url {}", base))?;
        {
            let mut params = url.query_pairs_mut();
            params
                .append_pair("output", "JSON")
                .append_pair("qcolumns", "1,2,3,4,5")
                .append_pair("p_fn", &query.company)
                .append_pair("rows", &query.limit.to_string());
            if let Some(state) = &query.state {
                params.append_pair("p_st", state);
            }
        }
        Ok(url)
    }

    async fn fetch_from(&self, base: &str, query: &FacilityQuery) -> Result<Vec<FacilityRecord>> {
        let body = self.http.get_json(self.request_url(base, query)?, self.timeout).await?;
        let facilities = body
            .get("Results")
            .and_then(|r| r.get("Facilities"))
            .and_then(Value::as_array)
            .ok_or_else(|| anyhow!("ECHO response missing Results.Facilities"))?;

        let records: Vec<FacilityRecord> = facilities
            .iter()
            .filter_map(Value::as_object)
            .filter_map(|row| {
                let facility_name = text_field(row, &["FacName"])?;
                let state = text_field(row, &["FacState"]);
                let registry_id = text_field(row, &["RegistryID", "RegistryId"])
                    .unwrap_or_else(|| derived_id("ECHO", &facility_name, state.as_deref()));
                Some(FacilityRecord {
                    registry_id,
                    facility_name,
                    state,
                    county: text_field(row, &["FacCounty"]),
                    city: text_field(row, &["FacCity"]),
                    zip_code: text_field(row, &["FacZip"]),
                    source: "ECHO".to_string(),
                    industry_type: None,
                    confidence_note: None,
                })
            })
            .collect();
        Ok(filter_by_company(records, &query.company))
    }
}

#[async_trait]
impl SourceAdapter for EchoAdapter {
    fn name(&self) -> &str {
        "ECHO"
    }

    async fn fetch(&self, query: &FacilityQuery) -> Option<SourceBatch> {
        for base in &self.urls {
            match self.fetch_from(base, query).await {
                Ok(records) if !records.is_empty() => {
                    let mut records = records;
                    records.truncate(query.limit);
                    return Some(SourceBatch::new(records, SourceTag::Alternative { service: "ECHO".to_string() }));
                }
                Ok(_) => tracing::debug!(url = %base, company = %query.company, "ECHO returned no matching facilities"),
                Err(err) => tracing::debug!(url = %base, error = %err, "ECHO request failed"),
            }
        }
        None
    }
}

/// Facility Registry Service sites by primary name.
pub struct FrsAdapter {
    base: String,
    http: HttpContext,
    timeout: Duration,
}

impl FrsAdapter {
    pub fn new(base: &str, http: HttpContext, timeout: Duration) -> Self {
        Self {
            base: base.to_string(),
            http,
            timeout,
        }
    }

    async fn try_fetch(&self, query: &FacilityQuery) -> Result<Vec<FacilityRecord>> {
        let rows_segment = query.rows_segment();
        let url = build_url(
            &self.base,
            &["PRIMARY_NAME", "CONTAINING", &query.company, "rows", &rows_segment, "JSON"],
        )?;
        let rows = rows_of(self.http.get_json(url, self.timeout).await?)?;
        let records = rows
            .iter()
            .filter_map(|row| normalize_envirofacts_row(row, "FRS"))
            .collect();
        let mut filtered = filter_by_company(records, &query.company);
        filtered.truncate(query.limit);
        Ok(filtered)
    }
}

#[async_trait]
impl SourceAdapter for FrsAdapter {
    fn name(&self) -> &str {
        "FRS"
    }

    async fn fetch(&self, query: &FacilityQuery) -> Option<SourceBatch> {
        match self.try_fetch(query).await {
            Ok(records) if !records.is_empty() => {
                Some(SourceBatch::new(records, SourceTag::Alternative { service: "FRS".to_string() }))
            }
            Ok(_) => None,
            Err(err) => {
                tracing::debug!(error = %err, "FRS request failed");
                None
            }
        }
    }
}

/// Toxics Release Inventory facilities, by state when given, else by name.
pub struct TriAdapter {
    base: String,
    http: HttpContext,
    timeout: Duration,
}

impl TriAdapter {
    pub fn new(base: &str, http: HttpContext, timeout: Duration) -> Self {
        Self {
            base: base.to_string(),
            http,
            timeout,
        }
    }

    async fn try_fetch(&self, query: &FacilityQuery) -> Result<Vec<FacilityRecord>> {
        let rows_segment = query.rows_segment();
        let url = match query.state.as_deref() {
            Some(state) => build_url(&self.base, &["STATE_ABBR", state, "rows", &rows_segment, "JSON"])?,
            None => build_url(
                &self.base,
                &["FACILITY_NAME", "CONTAINING", &query.company, "rows", &rows_segment, "JSON"],
            )?,
        };
        let rows = rows_of(self.http.get_json(url, self.timeout).await?)?;
        let records = rows
            .iter()
            .filter_map(|row| normalize_envirofacts_row(row, "TRI"))
            .collect();
        let mut filtered = filter_by_company(records, &query.company);
        filtered.truncate(query.limit);
        Ok(filtered)
    }
}

#[async_trait]
impl SourceAdapter for TriAdapter {
    fn name(&self) -> &str {
        "TRI"
    }

    async fn fetch(&self, query: &FacilityQuery) -> Option<SourceBatch> {
        match self.try_fetch(query).await {
            Ok(records) if !records.is_empty() => {
                Some(SourceBatch::new(records, SourceTag::Alternative { service: "TRI".to_string() }))
            }
            Ok(_) => None,
            Err(err) => {
                tracing::debug!(error = %err, "TRI request failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn endpoint() -> EnvirofactsEndpoint {
        let http = HttpContext::new("test", RetryPolicy::none()).unwrap();
        EnvirofactsEndpoint::new("https://data.epa.gov/efservice", EndpointTier::Primary, http, Duration::from_secs(1))
    }

    #[test]
    fn test_url_shapes_without_state() {
        let query = FacilityQuery::new("Acme Corp", None, 100);
        let urls = endpoint().url_shapes(&query).unwrap();
        assert_eq!(
            urls[0].as_str(),
            "https://data.epa.gov/efservice/tri_facility/PRIMARY_NAME/CONTAINING/Acme%20Corp/JSON"
        );
        assert!(urls[1].as_str().contains("/tri_facility/FACILITY_NAME/CONTAINING/"));
        assert!(urls[2].as_str().contains("/FRS_FACILITY_SITE/PRIMARY_NAME/CONTAINING/"));
    }

    #[test]
    fn test_url_shapes_with_state() {
        let query = FacilityQuery::new("Acme", Some("tx"), 100);
        let urls = endpoint().url_shapes(&query).unwrap();
        assert_eq!(
            urls[0].as_str(),
            "https://data.epa.gov/efservice/tri_facility/STATE_ABBR/TX/PRIMARY_NAME/CONTAINING/Acme/JSON"
        );
        assert_eq!(urls.len(), 3);
    }

    #[test]
    fn test_filter_by_company() {
        let records = vec![
            FacilityRecord::new("1", "ACME CORP PLANT 1", "TRI"),
            FacilityRecord::new("2", "Globex Industries", "TRI"),
            FacilityRecord::new("3", "Riverside Acme Works", "TRI"),
        ];
        let filtered = filter_by_company(records, "Acme Corp");
        let ids: Vec<&str> = filtered.iter().map(|r| r.registry_id.as_str()).collect();
        // "acme" is only four characters, so it qualifies as a shared word
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[test]
    fn test_normalize_tri_and_frs_rows() {
        let tri = json!({
            "TRI_FACILITY_ID": "77001ACMCR123MA",
            "FACILITY_NAME": "ACME CORP",
            "STATE_ABBR": "TX",
            "COUNTY_NAME": "HARRIS",
            "CITY_NAME": "HOUSTON",
            "ZIP_CODE": "77001"
        });
        let record = normalize_envirofacts_row(tri.as_object().unwrap(), "TRI").unwrap();
        assert_eq!(record.registry_id, "77001ACMCR123MA");
        assert_eq!(record.state.as_deref(), Some("TX"));
        assert_eq!(record.zip_code.as_deref(), Some("77001"));

        let frs = json!({"primary_name": "Acme Corp Site", "state_code": "OH", "postal_code": "44101"});
        let record = normalize_envirofacts_row(frs.as_object().unwrap(), "FRS").unwrap();
        assert_eq!(record.facility_name, "Acme Corp Site");
        assert_eq!(record.registry_id, "FRS-ACMECORPSITE-OH");

        let nameless = json!({"state_code": "OH"});
        assert!(normalize_envirofacts_row(nameless.as_object().unwrap(), "FRS").is_none());
    }
}
