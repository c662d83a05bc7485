//! 评分接口：表单页、HTML 报告与 JSON API

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use serde_json::json;
use tracing::{error, warn};

use super::form::{parse_upload_form, FormError};
use crate::util::report::HtmlReportGenerator;
use crate::util::{IntoJson, WebResult};
use crate::AppState;
use crate::model::report::{Banner, ReportView};

/// GET /
pub async fn form_page(State(app_state): State<AppState>) -> Html<String> {
    Html(HtmlReportGenerator::generate_upload_form(
        app_state.controller.allowed_extensions(),
    ))
}

/// POST /evaluate
pub async fn evaluate_html(State(app_state): State<AppState>, multipart: Multipart) -> Response {
    let allowed = app_state.controller.allowed_extensions();
    match run(&app_state, multipart).await {
        Ok(view) => Html(HtmlReportGenerator::generate_report(&view, allowed)).into_response(),
        Err(e) => {
            let status = e.status();
            (status, Html(HtmlReportGenerator::generate_error_page(&banner_of(&e), allowed)))
                .into_response()
        }
    }
}

/// POST /api/evaluate
pub async fn evaluate_api(State(app_state): State<AppState>, multipart: Multipart) -> Response {
    match run(&app_state, multipart).await {
        Ok(view) => WebResult::ok(view).into_json().into_response(),
        Err(e) => {
            let status = e.status();
            let banner = banner_of(&e);
            let body = WebResult::err_with_data(
                u32::from(status.as_u16()),
                e.to_string(),
                json!({ "banner": banner }),
            );
            (status, body.into_json()).into_response()
        }
    }
}

async fn run(app_state: &AppState, multipart: Multipart) -> Result<ReportView, FormError> {
    let form = parse_upload_form(multipart).await.map_err(|e| {
        warn!(target: "omr_server::api", status = e.status().as_u16(), error = %e, "上传表单无效");
        e
    })?;

    app_state.controller.handle(form).await.map_err(|e| {
        if e.is_client_error() {
            warn!(target: "omr_server::api", error = %e, "上传被拒绝");
        } else {
            error!(target: "omr_server::api", error = %e, "评分请求失败");
        }
        FormError::Report(e)
    })
}

fn banner_of(error: &FormError) -> Banner {
    match error {
        FormError::Report(e) => e.banner(),
        other if other.status() == StatusCode::INTERNAL_SERVER_ERROR => Banner::error(other),
        other => Banner::rejected(other),
    }
}
