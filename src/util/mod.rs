use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt::Display;

pub mod config;
pub mod log;
pub mod logging;
pub mod middleware;
pub mod report;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebResult {
    pub success: bool,
    #[serde(rename = "errorCode")]
    pub code: u32,
    #[serde(rename = "errorMsg")]
    pub msg: String,
    pub data: Value,
}

#[derive(Debug, Clone)]
pub enum ServerError {
    Server,
    Custom(String),
}

impl Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let str = match self {
            ServerError::Server => "Server internal error",
            ServerError::Custom(err) => err,
        };
        write!(f, "{}", str)
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, WebResult::err(self).into_json()).into_response()
    }
}

impl WebResult {
    pub fn ok(data: impl Serialize) -> Self {
        Self {
            success: true,
            code: 200,
            msg: "".to_string(),
            data: json!(data),
        }
    }

    pub fn err(err: ServerError) -> Self {
        Self {
            success: false,
            code: 500,
            msg: err.to_string(),
            data: Default::default(),
        }
    }

    pub fn err_with_code(code: u32, msg: impl ToString) -> Self {
        Self {
            success: false,
            code,
            msg: msg.to_string(),
            data: Default::default(),
        }
    }

    /// 失败但仍携带数据（例如错误横幅）
    pub fn err_with_data(code: u32, msg: impl ToString, data: impl Serialize) -> Self {
        Self {
            success: false,
            code,
            msg: msg.to_string(),
            data: json!(data),
        }
    }
}

pub trait IntoJson {
    fn into_json(self) -> Json<WebResult>;
}

impl IntoJson for anyhow::Result<WebResult> {
    fn into_json(self) -> Json<WebResult> {
        self.unwrap_or_else(|e| WebResult::err(ServerError::Custom(e.to_string())))
            .into_json()
    }
}

impl IntoJson for WebResult {
    fn into_json(self) -> Json<WebResult> {
        Json(self)
    }
}
