mod evaluate;
pub mod form;
mod monitoring;

use crate::util::middleware;
use crate::AppState;
use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

/// 创建CORS配置（只作用于 /api）
fn create_cors_layer() -> CorsLayer {
    // 从环境变量读取允许的域名，默认为本地开发
    let allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:8501,http://127.0.0.1:8501".to_string());

    info!("CORS配置 - 允许的源: {}", allowed_origins);

    CorsLayer::new()
        .allow_origin(
            allowed_origins
                .split(',')
                .filter_map(|s| match s.trim().parse() {
                    Ok(origin) => Some(origin),
                    Err(e) => {
                        warn!("无效的CORS源: {} - {}", s, e);
                        None
                    }
                })
                .collect::<Vec<_>>(),
        )
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
        ])
}

pub fn routes(app_state: AppState) -> Router {
    let max_upload_bytes = app_state.config.upload.max_bytes;

    // 页面路由
    let page_routes = Router::new()
        .route("/", get(evaluate::form_page))
        .route("/evaluate", post(evaluate::evaluate_html));

    // JSON 接口
    let api_routes = Router::new()
        .route("/api/evaluate", post(evaluate::evaluate_api))
        .route("/api/health", get(monitoring::basic_health_check))
        .layer(create_cors_layer());

    Router::new()
        .merge(page_routes)
        .merge(api_routes)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(app_state)
        // 全局中间件
        .layer(from_fn(middleware::request_logging_middleware))
}
