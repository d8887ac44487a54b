//! HTTP front-end over a shared [`Pipeline`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/query` | Answer a question (`{query, marks?, temperature?, top_k?, min_score?}`) |
//! | `POST` | `/model` | Switch the embedding model (`{model, test_performance?}`) |
//! | `GET`  | `/stats` | System statistics |
//! | `GET`  | `/diagnose` | Run health checks and return the report |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "invalid query: query must not be empty" } }
//! ```
//!
//! A question that reaches the pipeline always yields `200` with a
//! `QueryResult`; failures inside the pipeline are reported through its
//! `success` and `error` fields. Only requests rejected up front get an
//! error body.

use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use marks_rag_core::error::RagError;
use marks_rag_core::models::QueryResult;

use crate::diagnose::{diagnose, DiagnosisReport};
use crate::pipeline::{Pipeline, QueryOptions, SystemStats};
use crate::retrieval::RetrievalOptions;

/// Serve `pipeline` on `bind` until the process is terminated.
pub async fn run_server(
    pipeline: Arc<Pipeline>,
    bind: &str,
    cors_origins: &[String],
) -> anyhow::Result<()> {
    let app = router(pipeline, cors_origins)?;

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(addr = %listener.local_addr()?, "server listening");
    println!("marks-rag server listening on http://{}", bind);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Build the application router. An empty origin list allows any origin.
pub fn router(pipeline: Arc<Pipeline>, cors_origins: &[String]) -> anyhow::Result<Router> {
    let origins = if cors_origins.is_empty() {
        AllowOrigin::any()
    } else {
        let values = cors_origins
            .iter()
            .map(|o| {
                o.parse::<HeaderValue>()
                    .map_err(|_| anyhow::anyhow!("Invalid CORS origin: {}", o))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        AllowOrigin::list(values)
    };

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any);

    Ok(Router::new()
        .route("/query", post(handle_query))
        .route("/model", post(handle_switch_model))
        .route("/stats", get(handle_stats))
        .route("/diagnose", get(handle_diagnose))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(pipeline))
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<&RagError> for AppError {
    fn from(err: &RagError) -> Self {
        let status = match err {
            RagError::Validation(_) => StatusCode::BAD_REQUEST,
            RagError::ModelLoad { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            RagError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            RagError::Retrieval { .. } | RagError::Generation(_) => StatusCode::BAD_GATEWAY,
        };
        AppError {
            status,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<RagError>() {
            Some(rag) => rag.into(),
            None => AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "internal".to_string(),
                message: err.to_string(),
            },
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /query ============

#[derive(Deserialize)]
struct QueryRequest {
    query: String,
    marks: Option<u32>,
    temperature: Option<f32>,
    top_k: Option<usize>,
    min_score: Option<f32>,
}

impl QueryRequest {
    /// Fill omitted retrieval knobs from the configured `[retrieval]` section.
    fn options(&self, retrieval: RetrievalOptions) -> QueryOptions {
        let defaults = QueryOptions::default();
        QueryOptions {
            marks: self.marks.unwrap_or(defaults.marks),
            temperature: self.temperature.unwrap_or(defaults.temperature),
            top_k: self.top_k.unwrap_or(retrieval.top_k),
            min_score: self.min_score.unwrap_or(retrieval.min_score),
        }
    }
}

async fn handle_query(
    State(pipeline): State<Arc<Pipeline>>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResult>, AppError> {
    if req.query.trim().is_empty() {
        return Err((&RagError::Validation("query must not be empty".to_string())).into());
    }
    let options = req.options(pipeline.retrieval_options());
    Ok(Json(pipeline.answer(&req.query, &options).await))
}

// ============ POST /model ============

#[derive(Deserialize)]
struct SwitchRequest {
    model: String,
    #[serde(default = "default_true")]
    test_performance: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Serialize)]
struct SwitchResponse {
    active_model: String,
    dimension: usize,
}

async fn handle_switch_model(
    State(pipeline): State<Arc<Pipeline>>,
    Json(req): Json<SwitchRequest>,
) -> Result<Json<SwitchResponse>, AppError> {
    let model = pipeline
        .switch_model(&req.model, req.test_performance)
        .await?;
    Ok(Json(SwitchResponse {
        active_model: model.identifier.to_string(),
        dimension: model.dimension,
    }))
}

// ============ GET /stats, GET /diagnose ============

async fn handle_stats(State(pipeline): State<Arc<Pipeline>>) -> Json<SystemStats> {
    Json(pipeline.system_stats())
}

async fn handle_diagnose(State(pipeline): State<Arc<Pipeline>>) -> Json<DiagnosisReport> {
    Json(diagnose(&pipeline).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let e: AppError = (&RagError::Validation("x".into())).into();
        assert_eq!(e.status, StatusCode::BAD_REQUEST);
        assert_eq!(e.code, "bad_request");

        let e: AppError = anyhow::Error::from(RagError::ModelLoad {
            model: "m".into(),
            reason: "r".into(),
        })
        .into();
        assert_eq!(e.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(e.code, "model_load");

        let e: AppError = anyhow::anyhow!("boom").into();
        assert_eq!(e.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(e.code, "internal");
    }

    #[test]
    fn test_query_request_defaults() {
        let req: QueryRequest = serde_json::from_str(r#"{"query": "What is SDLC?"}"#).unwrap();
        let options = req.options(RetrievalOptions {
            top_k: 2,
            min_score: 0.25,
            max_retries: 3,
        });
        assert_eq!(options.marks, 5);
        assert!((options.temperature - 0.3).abs() < f32::EPSILON);
        assert_eq!(options.top_k, 2);
        assert_eq!(options.min_score, 0.25);
    }

    #[test]
    fn test_query_request_overrides_retrieval_config() {
        let req: QueryRequest =
            serde_json::from_str(r#"{"query": "q", "marks": 8, "top_k": 7, "min_score": 0.0}"#).unwrap();
        let options = req.options(RetrievalOptions {
            top_k: 2,
            min_score: 0.25,
            max_retries: 3,
        });
        assert_eq!(options.marks, 8);
        assert_eq!(options.top_k, 7);
        assert_eq!(options.min_score, 0.0);
    }
}
