use std::sync::Arc;

use crate::config::CheckPolicy;
use crate::engine::LicenseEngine;

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: LicenseEngine,
    /// Bearer tokens accepted on admin routes. Empty = admin API disabled.
    pub admin_tokens: Arc<Vec<String>>,
    pub check_policy: Arc<CheckPolicy>,
}

impl AppState {
    pub fn new(engine: LicenseEngine, admin_tokens: Vec<String>, check_policy: CheckPolicy) -> Self {
        Self {
            engine,
            admin_tokens: Arc::new(admin_tokens),
            check_policy: Arc::new(check_policy),
        }
    }
}
