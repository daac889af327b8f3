// web-server/src/api/auth.rs
use actix_web::cookie::time::Duration as CookieDuration;
use actix_web::cookie::{Cookie, SameSite};
use actix_web::http::header;
use actix_web::{get, post, web, HttpRequest, HttpResponse, Responder};
use serde_json::json;
use sneradar_common::protocol::messages::{
    DesktopCodeRequest, DesktopCodeResponse, NonceRequest, RedeemRequest, RedeemResponse,
    SessionInfoResponse, SiweRequest, SiweResponse,
};
use sneradar_common::{AuthConfig, AuthError, AuthService, AuthSession};

/// Service identity plus what the sign-in page needs to build challenges
/// and desktop deep links.
#[get("/")]
pub async fn api_index(service: web::Data<AuthService>) -> impl Responder {
    let settings = service.settings();
    HttpResponse::Ok().json(json!({
        "name": "SNE Radar Auth API",
        "version": env!("CARGO_PKG_VERSION"),
        "domain": settings.domain,
        "chain_id": settings.chain_id,
        "deep_link_scheme": service.deep_link_scheme()
    }))
}

#[post("/auth/nonce")]
pub async fn nonce(
    service: web::Data<AuthService>,
    body: web::Json<NonceRequest>,
) -> Result<HttpResponse, AuthError> {
    let response = service.request_nonce(&body).await?;
    Ok(HttpResponse::Ok().json(response))
}

#[post("/auth/siwe")]
pub async fn siwe(
    service: web::Data<AuthService>,
    config: web::Data<AuthConfig>,
    body: web::Json<SiweRequest>,
) -> Result<HttpResponse, AuthError> {
    let outcome = service.sign_in(&body).await?;
    let response = outcome.response();

    let mut builder = HttpResponse::Ok();
    if let SiweResponse::Web { token, .. } = &response {
        builder.cookie(session_cookie(&config, token.clone()));
    }
    Ok(builder.json(response))
}

/// Hand an existing web session over to the desktop app.
#[post("/auth/desktop-code")]
pub async fn desktop_code(
    req: HttpRequest,
    service: web::Data<AuthService>,
    config: web::Data<AuthConfig>,
    body: web::Json<DesktopCodeRequest>,
) -> Result<HttpResponse, AuthError> {
    let session = require_session(&req, &service, &config).await?;
    let code = service.issue_desktop_code(&session, &body.state).await?;
    Ok(HttpResponse::Ok().json(DesktopCodeResponse {
        code: code.code,
        state: code.state.to_string(),
    }))
}

#[post("/auth/redeem")]
pub async fn redeem(
    service: web::Data<AuthService>,
    body: web::Json<RedeemRequest>,
) -> Result<HttpResponse, AuthError> {
    let issued = service.redeem_code(&body.code, body.state.as_deref()).await?;
    Ok(HttpResponse::Ok().json(RedeemResponse {
        token: issued.token,
        tier: issued.session.tier,
        address: issued.session.address,
        expires_at: issued.session.expires_at,
    }))
}

#[post("/auth/logout")]
pub async fn logout(
    req: HttpRequest,
    service: web::Data<AuthService>,
    config: web::Data<AuthConfig>,
) -> Result<HttpResponse, AuthError> {
    if let Some(token) = credential(&req, &config.cookie_name) {
        service.logout(&token).await?;
    }

    let cookie = Cookie::build(config.cookie_name.clone(), "")
        .path("/")
        .max_age(CookieDuration::ZERO)
        .finish();
    Ok(HttpResponse::NoContent().cookie(cookie).finish())
}

#[get("/auth/verify")]
pub async fn verify(
    req: HttpRequest,
    service: web::Data<AuthService>,
    config: web::Data<AuthConfig>,
) -> Result<HttpResponse, AuthError> {
    let session = require_session(&req, &service, &config).await?;
    Ok(HttpResponse::Ok().json(SessionInfoResponse {
        tier: session.tier,
        address: session.address,
    }))
}

fn session_cookie(config: &AuthConfig, token: String) -> Cookie<'static> {
    Cookie::build(config.cookie_name.clone(), token)
        .path("/")
        .secure(config.cookie_secure)
        .http_only(true)
        .same_site(SameSite::Strict)
        .max_age(CookieDuration::seconds(config.session_ttl_secs))
        .finish()
}

/// Bearer token first, then the session cookie.
fn credential(req: &HttpRequest, cookie_name: &str) -> Option<String> {
    let bearer = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());

    match bearer {
        Some(token) => Some(token.to_string()),
        None => req.cookie(cookie_name).map(|c| c.value().to_string()),
    }
}

async fn require_session(
    req: &HttpRequest,
    service: &AuthService,
    config: &AuthConfig,
) -> Result<AuthSession, AuthError> {
    let token = credential(req, &config.cookie_name).ok_or(AuthError::Unauthenticated)?;
    service.authenticate(&token).await
}
