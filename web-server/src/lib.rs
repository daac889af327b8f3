// web-server/src/lib.rs
pub mod api;
pub mod middleware;
pub mod sweeper;

use actix_web::web;
use sneradar_common::{AuthConfig, AuthService, AuthStore, Clock};
use std::sync::Arc;

/// Shared state registered on every worker's `App`.
#[derive(Clone)]
pub struct AppState {
    pub service: web::Data<AuthService>,
    pub auth: web::Data<AuthConfig>,
}

impl AppState {
    pub fn new(config: &AuthConfig, store: Arc<dyn AuthStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            service: web::Data::new(AuthService::new(config, store, clock)),
            auth: web::Data::new(config.clone()),
        }
    }

    pub fn register(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(self.service.clone())
            .app_data(self.auth.clone());
    }
}
