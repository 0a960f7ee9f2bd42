//! Fallback-chain tests against mocked registry endpoints.

use serde_json::json;
use std::sync::Arc;
use verdant_facility_registry::{cache_key, CachedBatch, FacilityCache, MemoryCache, SourceClient};
use verdant_models::{FacilityRecord, SourceTag};
use verdant_utils::{CacheConfig, SourcesConfig};
use wiremock::matchers::{header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sources(primary: Vec<String>, backup: Vec<String>, alternate: &str) -> SourcesConfig {
    SourcesConfig {
        primary_endpoints: primary,
        backup_endpoints: backup,
        echo_urls: vec![format!("{}/echo/get_facilities", alternate)],
        frs_url: format!("{}/frs", alternate),
        tri_url: format!("{}/tri", alternate),
        measurements_url: format!("{}/easey", alternate),
        api_key: Some("test-key".to_string()),
        request_timeout_seconds: 2,
        alternate_timeout_seconds: 2,
        health_timeout_seconds: 2,
        max_retries: 1,
        backoff_base_ms: 1,
        backoff_max_ms: 2,
        fetch_limit: 10,
        ..SourcesConfig::default()
    }
}

fn client(config: &SourcesConfig, cache: Arc<MemoryCache>) -> SourceClient {
    SourceClient::from_config(config, &CacheConfig::default(), cache).expect("client builds")
}

fn tri_rows() -> serde_json::Value {
    json!([
        {
            "TRI_FACILITY_ID": "77001CMCRP1000M",
            "FACILITY_NAME": "ACME CORP HOUSTON PLANT",
            "STATE_ABBR": "TX",
            "COUNTY_NAME": "HARRIS",
            "CITY_NAME": "HOUSTON",
            "ZIP_CODE": "77001"
        },
        {
            "TRI_FACILITY_ID": "77002GLBXN2000M",
            "FACILITY_NAME": "GLOBEX REFINING",
            "STATE_ABBR": "TX"
        }
    ])
}

#[tokio::test]
async fn primary_endpoint_answers_first() {
    let primary = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/efservice/tri_facility/.*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tri_rows()))
        .mount(&primary)
        .await;

    let endpoint = format!("{}/efservice", primary.uri());
    let config = sources(vec![endpoint.clone()], vec![], &primary.uri());
    let batch = client(&config, Arc::new(MemoryCache::default())).fetch("Acme Corp", None, 10).await;

    assert_eq!(batch.source, SourceTag::Primary { endpoint });
    assert_eq!(batch.records.len(), 1);
    assert_eq!(batch.records[0].registry_id, "77001CMCRP1000M");
    assert_eq!(batch.records[0].city.as_deref(), Some("HOUSTON"));
}

#[tokio::test]
async fn failing_primary_is_retried_then_backup_is_used() {
    let primary = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&primary)
        .await;

    let backup = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/efservice/.*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tri_rows()))
        .mount(&backup)
        .await;

    let backup_endpoint = format!("{}/efservice", backup.uri());
    let config = sources(
        vec![format!("{}/efservice", primary.uri())],
        vec![backup_endpoint.clone()],
        &backup.uri(),
    );
    let batch = client(&config, Arc::new(MemoryCache::default())).fetch("Acme Corp", None, 10).await;

    assert_eq!(batch.source, SourceTag::Backup { endpoint: backup_endpoint });
    // three URL shapes, each sent once and retried once
    let requests = primary.received_requests().await.unwrap_or_default();
    assert_eq!(requests.len(), 6);
}

#[tokio::test]
async fn alternate_echo_service_normalizes_its_schema() {
    let down = MockServer::start().await;
    let alternate = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/echo/get_facilities"))
        .and(query_param("p_fn", "Acme Corp"))
        .and(query_param("p_st", "TX"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Results": {
                "Facilities": [
                    {"FacName": "ACME CORP PASADENA", "FacState": "TX", "FacCounty": "HARRIS", "FacCity": "PASADENA", "FacZip": "77506"}
                ]
            }
        })))
        .mount(&alternate)
        .await;

    let config = sources(vec![format!("{}/efservice", down.uri())], vec![], &alternate.uri());
    let batch = client(&config, Arc::new(MemoryCache::default())).fetch("Acme Corp", Some("tx"), 10).await;

    assert_eq!(batch.source, SourceTag::Alternative { service: "ECHO".to_string() });
    assert_eq!(batch.records[0].facility_name, "ACME CORP PASADENA");
    assert_eq!(batch.records[0].zip_code.as_deref(), Some("77506"));
    assert_eq!(batch.records[0].registry_id, "ECHO-ACMECORPPASADENA-TX");
}

#[tokio::test]
async fn unrelated_echo_and_frs_rows_fall_through_to_tri() {
    let down = MockServer::start().await;
    let alternate = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/echo/get_facilities"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Results": {"Facilities": [{"FacName": "GLOBEX REFINING", "FacState": "TX"}]}
        })))
        .mount(&alternate)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/frs/.*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"REGISTRY_ID": "110000000001", "PRIMARY_NAME": "INITECH SUPPLY", "STATE_CODE": "TX"}
        ])))
        .mount(&alternate)
        .await;
    Mock::given(method("GET"))
        .and(path("/tri/STATE_ABBR/TX/rows/0:9/JSON"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tri_rows()))
        .mount(&alternate)
        .await;

    let config = sources(vec![format!("{}/efservice", down.uri())], vec![], &alternate.uri());
    let batch = client(&config, Arc::new(MemoryCache::default())).fetch("Acme Corp", Some("TX"), 10).await;

    assert_eq!(batch.source, SourceTag::Alternative { service: "TRI".to_string() });
    assert!(batch.records.iter().all(|r| r.facility_name.contains("ACME")));
}

#[tokio::test]
async fn tri_by_state_is_filtered_by_company() {
    let down = MockServer::start().await;
    let alternate = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tri/STATE_ABBR/TX/rows/0:9/JSON"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tri_rows()))
        .mount(&alternate)
        .await;

    let config = sources(vec![format!("{}/efservice", down.uri())], vec![], &alternate.uri());
    let batch = client(&config, Arc::new(MemoryCache::default())).fetch("Acme Corp", Some("TX"), 10).await;

    assert_eq!(batch.source, SourceTag::Alternative { service: "TRI".to_string() });
    assert_eq!(batch.records.len(), 1);
    assert_eq!(batch.records[0].facility_name, "ACME CORP HOUSTON PLANT");
}

#[tokio::test]
async fn last_known_good_cache_then_sample() {
    let down = MockServer::start().await;
    let config = sources(vec![format!("{}/efservice", down.uri())], vec![], &down.uri());

    let cache = Arc::new(MemoryCache::new(86_400));
    let mut entry = CachedBatch::new(vec![FacilityRecord::new("42", "ACME CORP OLD SITE", "TRI")]);
    entry.stored_at = chrono::Utc::now() - chrono::Duration::hours(2);
    cache.put(&cache_key("Acme Corp", None), entry).await.unwrap();

    let source_client = client(&config, cache);
    let cached = source_client.fetch("Acme Corp", None, 10).await;
    assert_eq!(cached.source, SourceTag::Cached);
    assert_eq!(cached.records[0].registry_id, "42");

    let sample = source_client.fetch("Gulf Coast Power", None, 10).await;
    assert_eq!(sample.source, SourceTag::Sample);
    assert_eq!(sample.records[0].registry_id, "SAMPLE-ENERGY-1");
    assert_eq!(sample.records[0].state.as_deref(), Some("TX"));
}

#[tokio::test]
async fn annual_measurements_sum_units_in_tonnes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/easey/apportioned/annual"))
        .and(query_param("facilityId", "3"))
        .and(query_param("year", "2023"))
        .and(header("x-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"unitId": "1", "co2Mass": 600.0, "noxMass": 1.5},
            {"unitId": "2", "co2Mass": 400.0, "noxMass": 0.5}
        ])))
        .mount(&server)
        .await;

    let config = sources(vec![], vec![], &server.uri());
    let source_client = client(&config, Arc::new(MemoryCache::default()));

    let measurements = source_client.annual_measurements("3", 2023).await.expect("measurements present");
    // 1000 short tons
    assert!((measurements.co2_tons.unwrap() - 907.185).abs() < 1e-6);
    assert!((measurements.nox_tons.unwrap() - 1.81437).abs() < 1e-9);
    assert_eq!(measurements.so2_tons, None);

    assert!(source_client.annual_measurements("4", 2023).await.is_none());
}

#[tokio::test]
async fn endpoint_health_reports_each_endpoint() {
    let up = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/efservice/tri_facility/rows/0:1/JSON"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&up)
        .await;
    let down = MockServer::start().await;

    let up_endpoint = format!("{}/efservice", up.uri());
    let down_endpoint = format!("{}/efservice", down.uri());
    let config = sources(vec![up_endpoint.clone()], vec![down_endpoint.clone()], &up.uri());

    let health = client(&config, Arc::new(MemoryCache::default())).endpoint_health().await;
    assert_eq!(health.len(), 2);
    assert_eq!(health.get(&up_endpoint), Some(&true));
    assert_eq!(health.get(&down_endpoint), Some(&false));
}
