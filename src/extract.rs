//! Request extractors that report failures in the API's error format.

use crate::error::AppError;
use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
};
use serde::de::DeserializeOwned;

/// JSON body extractor for the owner endpoints.
///
/// Unlike `axum::Json` it does not insist on a `Content-Type` header. An
/// absent or blank body yields `T::default()`, so a missing field is reported
/// by the handler (`Email required`). Unparseable bodies become
/// `AppError::MalformedBody` and render as `{ "success": false, "message": ... }`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| AppError::MalformedBody(rejection.body_text()))?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(JsonBody(T::default()));
        }

        serde_json::from_slice(&bytes)
            .map(JsonBody)
            .map_err(|err| AppError::MalformedBody(err.to_string()))
    }
}
