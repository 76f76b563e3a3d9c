use std::sync::Arc;

use crate::core::AppConfig;
use crate::ucp::UcpClient;

pub struct AppState {
    pub ucp: Arc<UcpClient>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(ucp: Arc<UcpClient>, config: AppConfig) -> Self {
        Self { ucp, config }
    }
}
