use anyhow::Result;
use std::time::Duration;

use tracing::{error, info, warn};

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::metrics::{
    metrics_handler, record_orchestration_call, record_pipeline_trigger, record_reconcile_event,
};
use super::{log_requests, state::*, ApiError};
use crate::audit::{AuditFilter, StoredAuditRow};
use crate::jobs::{JobOutcome, JobRequest};
use crate::pipeline::{TriggerOutcome, TriggerRequest};
use crate::scheduling::{ChangeEvent, ReconcileError, ReconcileOutcome, RawChangeEvent};

const MAX_AUDIT_PAGE_SIZE: usize = 1000;

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub hash: String,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        hash: state.hash.clone(),
    };
    Json(stats)
}

fn parse_body<T: serde::de::DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("invalid JSON body: {}", e)))
}

async fn orchestrate(State(orchestrator): State<GuardedOrchestrator>, body: Bytes) -> Response {
    let request: JobRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(err) => {
            record_orchestration_call("unknown", err.kind());
            return err.into_response();
        }
    };
    let call_type = request.call_type.clone().unwrap_or_default();

    match orchestrator.handle_call(&request).await {
        Ok(outcome) => {
            let label = match &outcome {
                JobOutcome::Submitted(_) => "submitted",
                JobOutcome::Status(status) => status.as_str(),
            };
            record_orchestration_call(&call_type, label);
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                outcome.to_response_text(),
            )
                .into_response()
        }
        Err(err) => {
            warn!(
                "{} call for {}/{} failed: {}",
                call_type, request.workflow_name, request.job_name, err
            );
            record_orchestration_call(&call_type, err.kind());
            ApiError::from(err).into_response()
        }
    }
}

#[derive(Serialize, Debug, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
enum TriggerResponse {
    Started {
        execution_id: String,
        start_date: String,
        end_date: String,
    },
    Skipped,
}

async fn trigger_pipeline(
    State(trigger): State<OptionalPipelineTrigger>,
    body: Bytes,
) -> Result<Json<TriggerResponse>, ApiError> {
    let trigger = trigger.ok_or_else(|| ApiError::unavailable("pipeline trigger"))?;
    let request: TriggerRequest = parse_body(&body)?;
    let reference = request.reference_date(Utc::now())?;

    match trigger.trigger(&request, reference).await {
        Ok(TriggerOutcome::Started {
            execution_id,
            start_date,
            end_date,
        }) => {
            record_pipeline_trigger("started");
            Ok(Json(TriggerResponse::Started {
                execution_id,
                start_date,
                end_date,
            }))
        }
        Ok(TriggerOutcome::Skipped) => {
            record_pipeline_trigger("skipped");
            Ok(Json(TriggerResponse::Skipped))
        }
        Err(err) => {
            error!("Failed to trigger {}: {}", request.workflow_name, err);
            record_pipeline_trigger(err.kind());
            Err(err.into())
        }
    }
}

/// Change-feed entry point. Failures are logged here since the event source
/// only sees the status code; a non-2xx lets it redeliver.
async fn scheduling_event(
    State(reconciler): State<OptionalReconciler>,
    body: Bytes,
) -> Result<Json<ReconcileOutcome>, ApiError> {
    let reconciler = reconciler.ok_or_else(|| ApiError::unavailable("scheduling"))?;
    let raw: RawChangeEvent = serde_json::from_slice(&body).map_err(|e| {
        error!("Undecodable change event: {}", e);
        record_reconcile_event("unknown", "InvalidEventError");
        ReconcileError::InvalidEvent(e.to_string())
    })?;

    let event = match ChangeEvent::classify(&raw) {
        Ok(event) => event,
        Err(err) => {
            error!("Rejected change event: {}", err);
            record_reconcile_event("unknown", err.kind());
            return Err(err.into());
        }
    };

    match reconciler.apply(&event).await {
        Ok(outcome) => {
            record_reconcile_event(outcome.change.as_str(), "ok");
            Ok(Json(outcome))
        }
        Err(err) => {
            error!(
                "Failed to reconcile {} of {}: {}",
                event.kind(),
                event.workflow_name(),
                err
            );
            record_reconcile_event(event.kind().as_str(), err.kind());
            Err(err.into())
        }
    }
}

#[derive(Deserialize, Debug, Default)]
struct AuditQuery {
    pub workflow_name: Option<String>,
    pub execution_id: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

async fn list_audit_rows(
    State(store): State<GuardedAuditStore>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<StoredAuditRow>>, ApiError> {
    let defaults = AuditFilter::new();
    let filter = AuditFilter {
        workflow_name: query.workflow_name,
        execution_id: query.execution_id,
        limit: query.limit.unwrap_or(defaults.limit).min(MAX_AUDIT_PAGE_SIZE),
        offset: query.offset.unwrap_or(defaults.offset),
    };
    store.list(&filter).map(Json).map_err(|e| {
        error!("Failed to read control table: {:#}", e);
        ApiError::internal("failed to read control table")
    })
}

pub fn make_app(state: ServerState) -> Router {
    let v1_routes: Router = Router::new()
        .route("/orchestrate", post(orchestrate))
        .route("/pipelines/trigger", post(trigger_pipeline))
        .route("/scheduling/events", post(scheduling_event))
        .route("/audit", get(list_audit_rows))
        .with_state(state.clone());

    Router::new()
        .route("/", get(home))
        .with_state(state.clone())
        .nest("/v1", v1_routes)
        .layer(middleware::from_fn_with_state(state, log_requests))
}

pub fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}

pub async fn run_server(state: ServerState) -> Result<()> {
    let port = state.config.port;
    let metrics_port = state.config.metrics_port;
    let app = make_app(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    let metrics_listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", metrics_port)).await?;
    info!("Listening on port {}, metrics on port {}", port, metrics_port);

    tokio::try_join!(
        async { axum::serve(listener, app).await },
        async { axum::serve(metrics_listener, make_metrics_app()).await },
    )?;
    Ok(())
}
