//! 健康检查

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::build_info;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub staging_writable: bool,
    pub evaluator_program: String,
    pub evaluator_available: bool,
    pub timestamp: String,
}

/// 基本健康检查：暂存目录可写且评分程序可找到时为 healthy
pub async fn basic_health_check(State(app_state): State<AppState>) -> impl IntoResponse {
    let staging_writable = app_state
        .controller
        .staging()
        .storage()
        .health_check()
        .await
        .unwrap_or(false);
    let evaluator_available = app_state.controller.evaluator().is_available();
    let healthy = staging_writable && evaluator_available;

    let status = HealthStatus {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        version: build_info::summary(),
        staging_writable,
        evaluator_program: app_state.config.evaluator.program.clone(),
        evaluator_available,
        timestamp: Utc::now().to_rfc3339(),
    };

    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let mut resp = (code, Json(status)).into_response();
    resp.headers_mut().insert(
        axum::http::header::CACHE_CONTROL,
        axum::http::HeaderValue::from_static("no-store"),
    );
    resp
}
