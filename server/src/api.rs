//! REST boundary.
//!
//! Thin axum handlers over the job manager, the extractor and the outbox
//! counters. Scrape endpoints acquire a page from the shared session pool,
//! so API traffic and worker traffic compete for the same bounded slots.

use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use longline_core::{ProductId, SizeTable};
use longline_db::outbox;
use longline_scraper::{extract_reviews, ReviewData};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Build the API router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/scraper/jobs", post(create_job).get(list_jobs))
        .route("/api/v1/scraper/jobs/:id", get(get_job))
        .route("/api/v1/scraper/jobs/:id/products", get(get_job_products))
        .route("/api/v1/scraper/stats", get(get_stats))
        .route("/api/v1/scraper/size-chart", post(get_size_chart))
        .route("/api/v1/scraper/reviews", post(get_reviews))
        .route("/health", get(health))
        .with_state(state)
}

#[derive(Debug)]
struct ApiError(StatusCode, String);

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self(StatusCode::BAD_REQUEST, message.into())
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self(StatusCode::NOT_FOUND, message.into())
    }

    fn internal(err: impl std::fmt::Display) -> Self {
        tracing::error!(error = %err, "request failed");
        Self(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal error".to_string(),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.1 }));
        (self.0, body).into_response()
    }
}

#[derive(Deserialize)]
struct CreateJobRequest {
    search_query: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    max_pages: Option<i32>,
}

#[derive(Serialize)]
struct CreateJobResponse {
    job_id: Uuid,
    status: String,
    message: String,
}

async fn create_job(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateJobRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if request.search_query.trim().is_empty() {
        return Err(ApiError::bad_request("search_query is required"));
    }

    let job = state
        .manager
        .create_job(request.search_query, request.category, request.max_pages)
        .await
        .map_err(ApiError::internal)?;

    Ok((
        StatusCode::CREATED,
        Json(CreateJobResponse {
            job_id: job.id,
            status: job.status,
            message: "Job created successfully".to_string(),
        }),
    ))
}

async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let job = state
        .manager
        .get_job(id)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("job not found"))?;

    Ok(Json(job))
}

async fn list_jobs(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let jobs = state.manager.list_jobs().await.map_err(ApiError::internal)?;
    Ok(Json(jobs))
}

async fn get_job_products(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let products = state
        .manager
        .job_products(id)
        .await
        .map_err(ApiError::internal)?;
    Ok(Json(products))
}

async fn get_stats(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let stats = state.manager.stats().await.map_err(ApiError::internal)?;
    Ok(Json(stats))
}

#[derive(Deserialize)]
struct ScrapeTargetRequest {
    #[serde(default)]
    pid: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

impl ScrapeTargetRequest {
    fn parsed_pid(&self) -> Result<Option<ProductId>, ApiError> {
        match &self.pid {
            Some(pid) => ProductId::new(pid.clone())
                .map(Some)
                .map_err(|err| ApiError::bad_request(err.to_string())),
            None => Ok(None),
        }
    }
}

#[derive(Serialize)]
struct SizeChartResponse {
    size_chart_found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_table: Option<SizeTable>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn get_size_chart(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ScrapeTargetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if request.pid.is_none() && request.url.is_none() {
        return Err(ApiError::bad_request("either pid or url is required"));
    }
    let pid = request.parsed_pid()?;

    let session = state
        .sessions
        .acquire_page()
        .await
        .map_err(ApiError::internal)?;
    let result = state
        .extractor
        .extract_size_chart(session.page(), pid.as_ref(), request.url.as_deref())
        .await;
    state.sessions.release_page(session).await;

    let response = match result {
        Ok(Some(table)) => SizeChartResponse {
            size_chart_found: true,
            size_table: Some(table),
            error: None,
        },
        Ok(None) => SizeChartResponse {
            size_chart_found: false,
            size_table: None,
            error: None,
        },
        Err(err) => {
            tracing::error!(error = %err, "size chart extraction failed");
            SizeChartResponse {
                size_chart_found: false,
                size_table: None,
                error: Some(err.to_string()),
            }
        }
    };

    Ok(Json(response))
}

#[derive(Serialize)]
struct ReviewsResponse {
    #[serde(flatten)]
    data: ReviewData,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn get_reviews(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ScrapeTargetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if request.pid.is_none() && request.url.is_none() {
        return Err(ApiError::bad_request("either pid or url is required"));
    }
    let pid = request.parsed_pid()?;

    let session = state
        .sessions
        .acquire_page()
        .await
        .map_err(ApiError::internal)?;
    let result = extract_reviews(
        state.sessions.navigator(),
        session.page(),
        pid.as_ref(),
        request.url.as_deref(),
        &state.base_url,
        state.nav_retries,
    )
    .await;
    state.sessions.release_page(session).await;

    let response = match result {
        Ok(data) => ReviewsResponse { data, error: None },
        Err(err) => {
            tracing::error!(error = %err, "review extraction failed");
            ReviewsResponse {
                data: ReviewData::default(),
                error: Some(err.to_string()),
            }
        }
    };

    Ok(Json(response))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    outbox: OutboxHealth,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

#[derive(Serialize)]
struct OutboxHealth {
    pending: i64,
    dead_letter: i64,
}

/// Health verdict from the outbox counters: `warning` above 1000 pending
/// events, `error` (and HTTP 503) above 100 dead letters.
fn health_status(pending: i64, dead_letter: i64) -> (&'static str, StatusCode, Option<String>) {
    if dead_letter > 100 {
        (
            "error",
            StatusCode::SERVICE_UNAVAILABLE,
            Some(format!("{dead_letter} events in dead letter")),
        )
    } else if pending > 1000 {
        (
            "warning",
            StatusCode::OK,
            Some(format!("{pending} events pending delivery")),
        )
    } else {
        ("ok", StatusCode::OK, None)
    }
}

async fn health(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let pending = outbox::pending_count(state.db.pool())
        .await
        .map_err(ApiError::internal)?;
    let dead_letter = outbox::dead_letter_count(state.db.pool())
        .await
        .map_err(ApiError::internal)?;

    let (status, code, message) = health_status(pending, dead_letter);
    Ok((
        code,
        Json(HealthResponse {
            status,
            outbox: OutboxHealth {
                pending,
                dead_letter,
            },
            message,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_thresholds() {
        let (status, code, message) = health_status(0, 0);
        assert_eq!(status, "ok");
        assert_eq!(code, StatusCode::OK);
        assert!(message.is_none());

        let (status, code, _) = health_status(1000, 0);
        assert_eq!(status, "ok");
        assert_eq!(code, StatusCode::OK);

        let (status, code, message) = health_status(1001, 0);
        assert_eq!(status, "warning");
        assert_eq!(code, StatusCode::OK);
        assert!(message.expect("message").contains("pending"));

        let (status, code, _) = health_status(0, 101);
        assert_eq!(status, "error");
        assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);

        // Dead letter beats pending
        let (status, code, _) = health_status(5000, 500);
        assert_eq!(status, "error");
        assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_scrape_target_pid_validation() {
        let request = ScrapeTargetRequest {
            pid: Some("B0000000AA".to_string()),
            url: None,
        };
        assert!(request.parsed_pid().expect("valid").is_some());

        let request = ScrapeTargetRequest {
            pid: Some("short".to_string()),
            url: None,
        };
        assert!(request.parsed_pid().is_err());
    }

    #[test]
    fn test_create_job_request_defaults() {
        let request: CreateJobRequest =
            serde_json::from_str(r#"{"search_query": "t-shirt"}"#).expect("deserialize");
        assert_eq!(request.search_query, "t-shirt");
        assert!(request.category.is_none());
        assert!(request.max_pages.is_none());
    }
}
