pub mod orders;
pub mod payments;

use actix_web::HttpRequest;
use uuid::Uuid;

use crate::errors::AppError;

/// Identity of the requesting customer, supplied by the session layer in
/// front of this service as the `X-User-Id` header.
pub(crate) fn require_user(req: &HttpRequest) -> Result<Uuid, AppError> {
    let raw = req
        .headers()
        .get("X-User-Id")
        .and_then(|value| value.to_str().ok())
        .ok_or(AppError::Unauthorized)?;
    raw.parse()
        .map_err(|_| AppError::InvalidInput(format!("malformed X-User-Id '{raw}'")))
}
