use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use bar_cut_optimizer::config::OptimizeConfig;
use bar_cut_optimizer::error::Error;
use bar_cut_optimizer::history::{
    HistoryError, HistoryStore, JsonFileHistoryStore, RunRecord, RunSummary,
};
use bar_cut_optimizer::solver::optimize;
use bar_cut_optimizer::types::{CuttingPlan, DemandRow};
use serde::{Deserialize, Serialize};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use uuid::Uuid;

#[derive(Clone)]
struct AppState {
    history: Arc<dyn HistoryStore>,
}

#[derive(Deserialize, Serialize)]
struct OptimizeRequest {
    demand: Vec<DemandRow>,
    #[serde(flatten)]
    config: OptimizeConfig,
}

#[derive(Serialize)]
struct OptimizeResponse {
    run_id: Uuid,
    #[serde(flatten)]
    plan: CuttingPlan,
    bar_count: usize,
}

type ApiError = (StatusCode, String);

fn optimize_error(err: Error) -> ApiError {
    let status = match err {
        Error::Validation { .. } | Error::Configuration(_) => StatusCode::BAD_REQUEST,
        Error::CapacityExceeded { .. } => StatusCode::UNPROCESSABLE_ENTITY,
    };
    (status, err.to_string())
}

fn history_error(err: HistoryError) -> ApiError {
    let status = match err {
        HistoryError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

/// Optimizes the request and records the run. A failed save is logged, not returned.
fn run_and_store(history: &dyn HistoryStore, req: OptimizeRequest) -> Result<RunRecord, Error> {
    let OptimizeRequest { demand, config } = req;
    let plan = optimize(&demand, &config)?;
    let record = RunRecord::new(demand, config, plan);
    if let Err(err) = history.save(&record) {
        tracing::error!(run_id = %record.id, error = %err, "failed to store run");
    }
    Ok(record)
}

async fn optimize_handler(
    State(state): State<AppState>,
    Json(req): Json<OptimizeRequest>,
) -> Result<Json<OptimizeResponse>, ApiError> {
    tracing::info!(
        body = serde_json::to_string(&req).unwrap_or_default(),
        "POST /optimize"
    );

    let history = Arc::clone(&state.history);
    let record = tokio::task::spawn_blocking(move || run_and_store(history.as_ref(), req))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(optimize_error)?;

    Ok(Json(OptimizeResponse {
        run_id: record.id,
        bar_count: record.plan.bar_count(),
        plan: record.plan,
    }))
}

async fn list_history(State(state): State<AppState>) -> Result<Json<Vec<RunSummary>>, ApiError> {
    state.history.list().map(Json).map_err(history_error)
}

async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RunRecord>, ApiError> {
    state.history.load(id).map(Json).map_err(history_error)
}

async fn delete_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .history
        .delete(id)
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(history_error)
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/up", get(|| async { "ok" }))
        .route("/optimize", post(optimize_handler))
        .route("/history", get(list_history))
        .route("/history/{id}", get(get_history).delete(delete_history))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

fn main() -> std::io::Result<()> {
    let _sentry = sentry::init(sentry::ClientOptions {
        dsn: std::env::var("SENTRY_DSN").ok().and_then(|dsn| dsn.parse().ok()),
        release: sentry::release_name!(),
        ..Default::default()
    });

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open("development.log")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_target(false)
        .with_ansi(false)
        .with_max_level(Level::INFO)
        .init();

    let history_dir = std::env::var("HISTORY_DIR").unwrap_or_else(|_| "history".to_string());
    let history = JsonFileHistoryStore::open(&history_dir).map_err(std::io::Error::other)?;
    let state = AppState {
        history: Arc::new(history),
    };

    let port = std::env::var("PORT").unwrap_or_else(|_| "3001".to_string());
    let addr = format!("0.0.0.0:{port}");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async move {
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            eprintln!("Listening on {addr}");
            axum::serve(listener, router(state)).await
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bar_cut_optimizer::history::MemoryHistoryStore;
    use bar_cut_optimizer::types::{GapPolicy, Objective};

    fn request(stock_lengths: Vec<f64>) -> OptimizeRequest {
        OptimizeRequest {
            demand: vec![DemandRow::new("A", 1000.0, 3)],
            config: OptimizeConfig::new(stock_lengths).with_gap(10.0),
        }
    }

    #[test]
    fn test_run_is_stored() {
        let history = MemoryHistoryStore::new();
        let record = run_and_store(&history, request(vec![6000.0])).unwrap();
        assert_eq!(record.plan.bar_count(), 1);
        assert_eq!(history.load(record.id).unwrap(), record);
    }

    #[test]
    fn test_failed_run_is_not_stored() {
        let history = MemoryHistoryStore::new();
        let err = run_and_store(&history, request(vec![])).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(history.list().unwrap().is_empty());
    }

    #[test]
    fn test_request_flattens_config() {
        let req: OptimizeRequest = serde_json::from_str(
            r#"{
                "demand": [{"profile_code": "A", "length": 1000, "quantity": 3}],
                "stock_lengths": [6000, 6500],
                "cutting_gap": 10,
                "objective": "min-bar-count",
                "gap_policy": "per-piece"
            }"#,
        )
        .unwrap();
        assert_eq!(req.demand.len(), 1);
        assert_eq!(req.config.stock_lengths, vec![6000.0, 6500.0]);
        assert_eq!(req.config.objective, Objective::MinBarCount);
        assert_eq!(req.config.gap_policy, GapPolicy::PerPiece);
        assert_eq!(req.config.exact.time_limit_ms, 30_000);
    }

    #[test]
    fn test_error_status_codes() {
        let (status, _) = optimize_error(Error::Configuration("no stock".to_string()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = optimize_error(Error::CapacityExceeded {
            profile_code: "A".to_string(),
            message: "too many".to_string(),
        });
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let (status, _) = history_error(HistoryError::NotFound(Uuid::nil()));
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
