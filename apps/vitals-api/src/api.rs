//! API handlers for the vitals service
//!
//! - Ingestion of analytics payloads posted by the browser reporter
//! - Metric queries, aggregates and exports for operators

use std::collections::BTreeMap;
use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use vitals_core::export;
use vitals_core::{Aggregate, Aggregator, AnalyticsPayload, Metric, Observation, PageContext};

use crate::error::ApiError;
use crate::state::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Handler: GET /health
pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "vitals-api",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
pub struct IngestResponse {
    pub success: bool,
    pub metric: Metric,
}

/// Map a reporter payload onto a collector observation
///
/// The sender's clock is kept as is; the page URL becomes the metric url.
pub fn observation_from_payload(payload: AnalyticsPayload) -> Observation {
    let mut observation = Observation::custom(payload.name, payload.value, payload.rating)
        .at(payload.timestamp);
    if let Some(delta) = payload.delta {
        observation = observation.with_delta(delta);
    }
    if let Some(url) = payload.url {
        observation = observation.with_url(url);
    }
    observation
}

/// Handler: POST /api/analytics/web-vitals
#[instrument(skip_all)]
pub async fn handle_ingest(
    State(state): State<AppState>,
    payload: Result<Json<AnalyticsPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<IngestResponse>), ApiError> {
    let Json(payload) = payload?;
    let page = PageContext {
        user_agent: payload.user_agent.clone(),
        ..Default::default()
    };

    let observation = observation_from_payload(payload);
    observation.validate()?;

    let (metric, pending) = {
        let mut collector = state.collector.lock().await;
        let metric = collector
            .ingest(observation, &page)
            .ok_or_else(|| ApiError::Internal("collector rejected metric".to_string()))?;
        let pending = state.persister.as_ref().and_then(|p| p.stage(&collector));
        (metric, pending)
    };
    if let Some(pending) = pending {
        pending.commit().await;
    }

    debug!("Accepted {} = {} ({})", metric.name, metric.value, metric.rating);

    Ok((
        StatusCode::ACCEPTED,
        Json(IngestResponse {
            success: true,
            metric,
        }),
    ))
}

/// Filters shared by the read endpoints
#[derive(Debug, Default, Deserialize)]
pub struct MetricsQuery {
    /// Exact metric name
    pub name: Option<String>,
    /// Trailing window in milliseconds
    pub since_ms: Option<u64>,
}

impl MetricsQuery {
    fn window(&self) -> Option<Duration> {
        self.since_ms.map(Duration::from_millis)
    }
}

#[derive(Serialize)]
pub struct MetricsResponse {
    pub success: bool,
    pub metrics: Vec<Metric>,
    pub count: usize,
}

/// Handler: GET /api/metrics
#[instrument(skip(state))]
pub async fn handle_list_metrics(
    State(state): State<AppState>,
    Query(query): Query<MetricsQuery>,
) -> Json<MetricsResponse> {
    let metrics = state
        .collector
        .lock()
        .await
        .store()
        .query(query.name.as_deref(), query.window());
    let count = metrics.len();

    Json(MetricsResponse {
        success: true,
        metrics,
        count,
    })
}

#[derive(Serialize)]
pub struct SummaryResponse {
    pub aggregates: BTreeMap<String, Aggregate>,
    pub overall_score: Option<u32>,
}

/// Handler: GET /api/metrics/summary
#[instrument(skip(state))]
pub async fn handle_summary(
    State(state): State<AppState>,
    Query(query): Query<MetricsQuery>,
) -> Json<SummaryResponse> {
    // one snapshot for both figures
    let metrics = state
        .collector
        .lock()
        .await
        .store()
        .query(None, query.window());

    Json(SummaryResponse {
        aggregates: Aggregator::summarize(&metrics),
        overall_score: Aggregator::score(&metrics),
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub format: ExportFormat,
}

/// Handler: GET /api/metrics/export
#[instrument(skip(state))]
pub async fn handle_export(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let metrics = state.collector.lock().await.store().snapshot();

    let response = match query.format {
        ExportFormat::Json => (
            [(header::CONTENT_TYPE, "application/json")],
            export::to_json(&metrics, true)?,
        )
            .into_response(),
        ExportFormat::Csv => (
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"web-vitals.csv\"",
                ),
            ],
            export::to_csv(&metrics),
        )
            .into_response(),
    };

    Ok(response)
}

/// Handler: DELETE /api/metrics
#[instrument(skip(state))]
pub async fn handle_clear(State(state): State<AppState>) -> StatusCode {
    let (cleared, pending) = {
        let mut collector = state.collector.lock().await;
        let cleared = collector.store().len();
        collector.store_mut().clear();
        (cleared, state.persister.as_ref().map(|p| p.stage_removal()))
    };
    if let Some(pending) = pending {
        pending.commit().await;
    }
    info!("Cleared {} metrics", cleared);
    StatusCode::NO_CONTENT
}
