//! API key verification (§4.6) and the admin session gate (§4.8): Axum
//! extractors so handlers declare what they need in their signature instead
//! of checking headers by hand.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::cookie::CookieJar;
use subtle::ConstantTimeEq;
use vlog_models::ids::WorkerId;

use crate::error::ApiError;
use crate::state::AppState;

pub const WORKER_API_KEY_HEADER: &str = "X-Worker-API-Key";
pub const ADMIN_SECRET_HEADER: &str = "X-Admin-Secret";
pub const ADMIN_SESSION_COOKIE: &str = "vlog_admin_session";

/// An authenticated Worker, resolved from `X-Worker-API-Key` via
/// [`vlog_catalog::ApiKeyRepository::verify`].
pub struct WorkerAuth {
    pub worker_id: WorkerId,
}

impl FromRequestParts<AppState> for WorkerAuth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let key = parts
            .headers
            .get(WORKER_API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::AuthRequired)?;

        let worker_id = state
            .api_keys
            .verify(key, chrono::Utc::now())
            .await
            .map_err(|_| ApiError::AuthRequired)?;

        Ok(WorkerAuth { worker_id })
    }
}

/// An authenticated admin session, either a valid cookie or the shared
/// `X-Admin-Secret`. Required on every mutating admin route.
pub struct AdminAuth;

impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(configured) = &state.config.admin_secret {
            if let Some(provided) = parts.headers.get(ADMIN_SECRET_HEADER).and_then(|v| v.to_str().ok()) {
                if provided.as_bytes().ct_eq(configured.as_bytes()).into() {
                    return Ok(AdminAuth);
                }
            }
        }

        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar.get(ADMIN_SESSION_COOKIE).map(|c| c.value().to_string()).ok_or(ApiError::AuthRequired)?;

        state.sessions.validate(&token, chrono::Utc::now()).await.map_err(|_| ApiError::AuthRequired)?;

        Ok(AdminAuth)
    }
}
