use std::sync::Arc;

pub mod api;
pub mod build_info;
pub mod controller;
pub mod evaluator;
pub mod model;
pub mod server;
pub mod storage;
pub mod util;

use controller::ReportController;
use util::config::Config;

/// 应用状态结构
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub controller: Arc<ReportController>,
}

impl AppState {
    pub fn new(config: Config, controller: ReportController) -> Self {
        Self {
            config: Arc::new(config),
            controller: Arc::new(controller),
        }
    }
}
