// src/server/mod.rs

//! HTTP surface: the on-demand self-repair run, read endpoints for the log
//! and caches, and the three cron triggers. Every route authorizes before
//! doing any work, so an unauthorized caller never reaches a probe.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::cron::CallerIdentity;
use crate::health::{overall_headline, RunMode};
use crate::state::AppState;
use crate::store::event_log::LogEntry;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/selfrepair", post(run_selfrepair))
        .route("/api/selfrepair/logs", get(get_logs))
        .route("/api/selfrepair/alerts/last", get(get_last_alert))
        .route("/api/selfrepair/health-state", get(get_health_state))
        .route("/api/selfrepair/trend", get(get_trend))
        .route("/api/selfrepair/rollup", get(get_rollup))
        .route("/api/cron/hourly", get(cron_hourly))
        .route("/api/cron/daily", get(cron_daily))
        .route("/api/cron/weekly", get(cron_weekly))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Check the bearer token against the configured admin key and derive the
/// caller identity (proxy-reported address, credential fingerprint). An
/// empty configured key disables auth for local development.
fn authorize(state: &AppState, headers: &HeaderMap) -> ApiResult<CallerIdentity> {
    let source = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("");

    if !state.admin_access_key.is_empty() && presented != state.admin_access_key {
        return Err(ApiError::unauthorized("admin access key required"));
    }

    Ok(CallerIdentity::new(source, presented))
}

/// Treat a bare query flag (`?dryrun`) the same as an explicit true.
fn flag(value: &Option<String>) -> bool {
    matches!(value.as_deref(), Some("" | "1" | "true" | "yes"))
}

#[derive(Debug, Default, Deserialize)]
struct RunParams {
    dryrun: Option<String>,
    repair: Option<String>,
}

async fn run_selfrepair(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<RunParams>,
) -> ApiResult<Json<serde_json::Value>> {
    let caller = authorize(&state, &headers)?;

    let mode = if flag(&params.dryrun) {
        RunMode::DryRun
    } else if flag(&params.repair) {
        RunMode::Repair
    } else {
        RunMode::ReadOnly
    };
    info!("self-repair run requested ({} mode) from {}", mode, caller.source_address);

    let report = state.engine.run(mode).await;
    let fixes = match mode {
        RunMode::ReadOnly => None,
        RunMode::DryRun => Some(state.repair.apply(true)),
        RunMode::Repair => Some(state.repair.apply(false)),
    };

    let entry = LogEntry::from_report(&report, &caller.source_address, &caller.key_fingerprint);
    state.log.append(entry)?;

    let subject = overall_headline(report.overall);
    let alert = state
        .dispatcher
        .dispatch(
            report.overall,
            subject,
            &json!({
                "sdk": report.checks.sdk.message,
                "environment": report.checks.environment.message,
                "codebase": report.checks.codebase.message,
                "time": report.timestamp,
            }),
        )
        .await;

    Ok(Json(json!({
        "status": "ok",
        "report": report,
        "fixes": fixes,
        "alert": alert,
    })))
}

async fn get_logs(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<serde_json::Value>> {
    authorize(&state, &headers)?;

    let mut entries = state.log.read_all()?;
    entries.reverse(); // newest first

    Ok(Json(json!({
        "status": "ok",
        "total": entries.len(),
        "entries": entries,
    })))
}

async fn get_last_alert(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<serde_json::Value>> {
    authorize(&state, &headers)?;
    Ok(Json(json!({
        "status": "ok",
        "alert": state.dispatcher.last_alert(),
    })))
}

async fn get_health_state(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<serde_json::Value>> {
    authorize(&state, &headers)?;
    Ok(Json(json!({
        "status": "ok",
        "health": state.log.last_health(),
    })))
}

#[derive(Debug, Default, Deserialize)]
struct TrendParams {
    days: Option<u32>,
}

async fn get_trend(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<TrendParams>,
) -> ApiResult<Json<serde_json::Value>> {
    authorize(&state, &headers)?;

    let days = params.days.unwrap_or(7);
    if !(1..=90).contains(&days) {
        return Err(ApiError::bad_request("days must be between 1 and 90"));
    }
    let points = state.trend.daily_trend(days, Utc::now());

    Ok(Json(json!({
        "status": "ok",
        "days": days,
        "points": points,
    })))
}

async fn get_rollup(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<serde_json::Value>> {
    authorize(&state, &headers)?;
    Ok(Json(json!({
        "status": "ok",
        "rollup": state.trend.weekly_rollup(Utc::now()),
    })))
}

async fn cron_hourly(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<serde_json::Value>> {
    let caller = authorize(&state, &headers)?;
    let outcome = state.cron.run_hourly(&caller).await?;
    Ok(Json(json!({ "status": "ok", "hourly": outcome })))
}

async fn cron_daily(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<serde_json::Value>> {
    authorize(&state, &headers)?;
    let outcome = state.cron.run_daily(Utc::now()).await?;
    Ok(Json(json!({ "status": "ok", "daily": outcome })))
}

async fn cron_weekly(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<serde_json::Value>> {
    authorize(&state, &headers)?;
    let outcome = state.cron.run_weekly(Utc::now()).await?;
    Ok(Json(json!({ "status": "ok", "weekly": outcome })))
}
