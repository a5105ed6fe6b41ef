use actix_web::dev::Payload;
use actix_web::http::StatusCode;
use actix_web::{web, FromRequest, HttpRequest, HttpResponse, ResponseError};
use std::future::{ready, Ready};
use subtle::ConstantTimeEq;

use crate::models::ErrorResponse;
use crate::routes::similarity::AppState;

/// Header carrying the shared service key
pub const API_KEY_HEADER: &str = "x-api-key";

/// Rejection returned when the API key is missing or wrong
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing x-api-key header")]
    MissingKey,

    #[error("Invalid API key")]
    InvalidKey,
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::Unauthorized().json(ErrorResponse {
            error: "Unauthorized".to_string(),
            message: self.to_string(),
            status_code: 401,
        })
    }
}

/// Proof that the request carried the configured API key
///
/// Put it first in a handler's arguments so the key is checked before the
/// body is parsed.
#[derive(Debug, Clone, Copy)]
pub struct ApiKey;

impl FromRequest for ApiKey {
    type Error = AuthError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authorize(req))
    }
}

fn authorize(req: &HttpRequest) -> Result<ApiKey, AuthError> {
    let provided = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingKey)?;

    let expected = req
        .app_data::<web::Data<AppState>>()
        .map(|state| state.api_key.clone())
        .ok_or(AuthError::InvalidKey)?;

    if keys_match(provided, &expected) {
        Ok(ApiKey)
    } else {
        tracing::warn!("Rejected request to {} with invalid API key", req.path());
        Err(AuthError::InvalidKey)
    }
}

/// Constant-time comparison; an empty configured key never matches
fn keys_match(provided: &str, expected: &str) -> bool {
    !expected.is_empty() && bool::from(provided.as_bytes().ct_eq(expected.as_bytes()))
}
