//! Tests for the vitals API
//!
//! - HTTP endpoints through axum-test
//! - Payload mapping properties through proptest

#[cfg(test)]
mod http_tests {
    //! HTTP endpoint integration tests using axum-test

    use axum_test::TestServer;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use vitals_core::metric::system_clock;
    use vitals_core::MonitorConfig;

    use crate::router;
    use crate::state::AppState;

    /// Create a test server backed by an in-memory store
    fn create_test_server() -> TestServer {
        let state = AppState::new(&MonitorConfig::default(), None).unwrap();
        TestServer::new(router(state)).unwrap()
    }

    fn payload(name: &str, value: f64, rating: &str, timestamp: u64) -> Value {
        json!({
            "name": name,
            "value": value,
            "rating": rating,
            "url": "https://example.dev/projects",
            "userAgent": "Mozilla/5.0",
            "timestamp": timestamp
        })
    }

    async fn post(server: &TestServer, body: Value) -> axum_test::TestResponse {
        server.post("/api/analytics/web-vitals").json(&body).await
    }

    const HOUR_MS: u64 = 60 * 60 * 1000;

    fn timestamps(listed: &Value) -> Vec<u64> {
        listed["metrics"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["timestamp"].as_u64().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_health_returns_200() {
        let server = create_test_server();
        let response = server.get("/health").await;
        response.assert_status_ok();

        let json = response.json::<Value>();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["service"], "vitals-api");
    }

    #[tokio::test]
    async fn test_ingest_accepts_reporter_payload() {
        let server = create_test_server();

        let response = post(&server, payload("LCP", 1834.5, "good", 1_700_000_000_000)).await;
        response.assert_status(axum::http::StatusCode::ACCEPTED);

        let json = response.json::<Value>();
        assert!(json["success"].as_bool().unwrap());
        assert_eq!(json["metric"]["name"], "LCP");
        assert_eq!(json["metric"]["url"], "https://example.dev/projects");

        let listed = server.get("/api/metrics").await.json::<Value>();
        assert_eq!(listed["count"], 1);
    }

    #[tokio::test]
    async fn test_ingest_rejects_unknown_rating() {
        let server = create_test_server();

        let response = post(&server, payload("LCP", 1834.5, "great", 1)).await;
        response.assert_status_bad_request();

        let json = response.json::<Value>();
        assert_eq!(json["success"], false);
        assert_eq!(json["code"], "INVALID_REQUEST");
    }

    #[tokio::test]
    async fn test_ingest_rejects_negative_value() {
        let server = create_test_server();

        let response = post(&server, payload("CLS", -0.2, "good", 1)).await;
        response.assert_status_bad_request();
        assert_eq!(response.json::<Value>()["code"], "INVALID_METRIC");
    }

    #[tokio::test]
    async fn test_ingest_rejects_malformed_json() {
        let server = create_test_server();

        let response = server
            .post("/api/analytics/web-vitals")
            .content_type("application/json")
            .text("{\"name\": \"LCP\"")
            .await;
        response.assert_status_bad_request();
    }

    #[tokio::test]
    async fn test_metrics_filter_by_name() {
        let server = create_test_server();
        post(&server, payload("LCP", 2000.0, "good", 1)).await;
        post(&server, payload("CLS", 0.02, "good", 2)).await;
        post(&server, payload("LCP", 2600.0, "needs-improvement", 3)).await;

        let json = server
            .get("/api/metrics")
            .add_query_param("name", "LCP")
            .await
            .json::<Value>();

        assert_eq!(json["count"], 2);
        assert_eq!(json["metrics"][1]["rating"], "needs-improvement");
    }

    #[tokio::test]
    async fn test_summary_reports_aggregates_and_score() {
        let server = create_test_server();
        post(&server, payload("LCP", 1800.0, "good", 1)).await;
        post(&server, payload("FID", 420.0, "poor", 2)).await;

        let response = server.get("/api/metrics/summary").await;
        response.assert_status_ok();

        let json = response.json::<Value>();
        assert_eq!(json["overall_score"], 63);
        assert_eq!(json["aggregates"]["LCP"]["count"], 1);
        assert_eq!(json["aggregates"]["FID"]["rating"], "poor");
        assert_eq!(json["aggregates"]["FID"]["trend"], "stable");
    }

    #[tokio::test]
    async fn test_skewed_sender_does_not_shift_other_timestamps() {
        let server = create_test_server();
        let now = system_clock();
        let skewed = now + 10 * 365 * 24 * HOUR_MS;

        post(&server, payload("LCP", 2000.0, "good", skewed)).await;
        for _ in 0..3 {
            post(&server, payload("LCP", 2100.0, "good", now)).await;
        }

        let listed = server.get("/api/metrics").await.json::<Value>();
        assert_eq!(timestamps(&listed), vec![skewed, now, now, now]);
    }

    #[tokio::test]
    async fn test_since_ms_limits_metrics_and_summary() {
        let server = create_test_server();
        let now = system_clock();

        post(&server, payload("LCP", 1500.0, "good", now - 2 * HOUR_MS)).await;
        post(&server, payload("FID", 40.0, "good", now - 2 * HOUR_MS)).await;
        post(&server, payload("LCP", 3000.0, "needs-improvement", now - 1000)).await;
        post(&server, payload("CLS", 0.3, "poor", now)).await;

        let recent = server
            .get("/api/metrics")
            .add_query_param("since_ms", HOUR_MS)
            .await
            .json::<Value>();
        assert_eq!(recent["count"], 2);
        assert_eq!(timestamps(&recent), vec![now - 1000, now]);

        let recent_lcp = server
            .get("/api/metrics")
            .add_query_param("name", "LCP")
            .add_query_param("since_ms", HOUR_MS)
            .await
            .json::<Value>();
        assert_eq!(recent_lcp["count"], 1);
        assert_eq!(recent_lcp["metrics"][0]["value"], 3000.0);

        let summary = server
            .get("/api/metrics/summary")
            .add_query_param("since_ms", HOUR_MS)
            .await
            .json::<Value>();
        assert_eq!(summary["aggregates"]["LCP"]["count"], 1);
        assert_eq!(summary["aggregates"]["LCP"]["average"], 3000.0);
        assert_eq!(summary["aggregates"].get("FID"), None);
        assert_eq!(summary["overall_score"], 50);

        let everything = server.get("/api/metrics/summary").await.json::<Value>();
        assert_eq!(everything["aggregates"]["LCP"]["count"], 2);
        assert_eq!(everything["overall_score"], 67);
    }

    #[tokio::test]
    async fn test_ingest_persists_to_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = MonitorConfig::default();
        let state = AppState::new(&config, Some(dir.path())).unwrap();
        let server = TestServer::new(router(state)).unwrap();

        post(&server, payload("LCP", 1800.0, "good", 1)).await;
        post(&server, payload("CLS", 0.01, "good", 2)).await;

        let raw = std::fs::read_to_string(dir.path().join("performance-metrics.json")).unwrap();
        let persisted: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(persisted.as_array().unwrap().len(), 2);

        // a restarted server picks the history back up
        let state = AppState::new(&config, Some(dir.path())).unwrap();
        let restarted = TestServer::new(router(state)).unwrap();
        let listed = restarted.get("/api/metrics").await.json::<Value>();
        assert_eq!(listed["count"], 2);
    }

    #[tokio::test]
    async fn test_summary_without_core_metrics_has_no_score() {
        let server = create_test_server();
        post(&server, payload("TTFB", 400.0, "good", 1)).await;

        let json = server.get("/api/metrics/summary").await.json::<Value>();
        assert_eq!(json["overall_score"], Value::Null);
    }

    #[tokio::test]
    async fn test_export_csv() {
        let server = create_test_server();
        post(&server, payload("INP", 180.0, "good", 1_700_000_000_000)).await;

        let response = server
            .get("/api/metrics/export")
            .add_query_param("format", "csv")
            .await;
        response.assert_status_ok();
        assert_eq!(
            response.header("content-type"),
            "text/csv; charset=utf-8"
        );

        let body = response.text();
        assert_eq!(
            body,
            "name,value,rating,timestamp,url\n\
             INP,180,good,1700000000000,https://example.dev/projects\n"
        );
    }

    #[tokio::test]
    async fn test_export_json_by_default() {
        let server = create_test_server();
        post(&server, payload("FCP", 900.0, "good", 5)).await;

        let response = server.get("/api/metrics/export").await;
        response.assert_status_ok();

        let json = response.json::<Value>();
        assert_eq!(json[0]["name"], "FCP");
        assert_eq!(json[0]["timestamp"], 5);
    }

    #[tokio::test]
    async fn test_export_rejects_unknown_format() {
        let server = create_test_server();
        let response = server
            .get("/api/metrics/export")
            .add_query_param("format", "xml")
            .await;
        response.assert_status_bad_request();
    }

    #[tokio::test]
    async fn test_clear_empties_store() {
        let server = create_test_server();
        post(&server, payload("LCP", 1800.0, "good", 1)).await;

        let response = server.delete("/api/metrics").await;
        response.assert_status(axum::http::StatusCode::NO_CONTENT);

        let json = server.get("/api/metrics").await.json::<Value>();
        assert_eq!(json["count"], 0);
    }

    #[tokio::test]
    async fn test_clear_removes_persisted_file() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(&MonitorConfig::default(), Some(dir.path())).unwrap();
        let server = TestServer::new(router(state)).unwrap();

        post(&server, payload("LCP", 1800.0, "good", 1)).await;
        let file = dir.path().join("performance-metrics.json");
        assert!(file.exists());

        server.delete("/api/metrics").await;
        assert!(!file.exists());
    }
}

#[cfg(test)]
mod property_tests {
    use proptest::prelude::*;
    use vitals_core::{AnalyticsPayload, Rating};

    use crate::api::observation_from_payload;

    fn rating() -> impl Strategy<Value = Rating> {
        prop_oneof![
            Just(Rating::Good),
            Just(Rating::NeedsImprovement),
            Just(Rating::Poor),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn payload_fields_carry_over(
            name in "[A-Za-z][A-Za-z-]{0,15}",
            value in 0.0f64..100_000.0,
            rating in rating(),
            timestamp in 0u64..4_000_000_000_000,
            delta in proptest::option::of(0.0f64..1000.0),
        ) {
            let payload = AnalyticsPayload {
                name: name.clone(),
                value,
                rating,
                delta,
                url: Some("/".to_string()),
                user_agent: None,
                timestamp,
            };

            let observation = observation_from_payload(payload);
            prop_assert_eq!(observation.name, name);
            prop_assert_eq!(observation.value, value);
            prop_assert_eq!(observation.rating, Some(rating));
            prop_assert_eq!(observation.timestamp, Some(timestamp));
            prop_assert_eq!(observation.delta, delta);
            prop_assert_eq!(observation.url.as_deref(), Some("/"));
        }

        #[test]
        fn negative_values_fail_validation(value in -100_000.0f64..-0.001) {
            let payload = AnalyticsPayload {
                name: "LCP".to_string(),
                value,
                rating: Rating::Good,
                delta: None,
                url: None,
                user_agent: None,
                timestamp: 1,
            };
            prop_assert!(observation_from_payload(payload).validate().is_err());
        }
    }
}
