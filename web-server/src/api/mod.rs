// web-server/src/api/mod.rs
pub mod auth;

use actix_web::{error::InternalError, web, HttpResponse};
use sneradar_common::ErrorBody;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        tracing::debug!("Rejected request body: {}", err);
        let body = ErrorBody::new("BAD_REQUEST", &err.to_string());
        InternalError::from_response(err, HttpResponse::BadRequest().json(body)).into()
    }))
    .service(
        web::scope("/api")
            .service(auth::api_index)
            .service(auth::nonce)
            .service(auth::siwe)
            .service(auth::desktop_code)
            .service(auth::redeem)
            .service(auth::logout)
            .service(auth::verify),
    );
}
