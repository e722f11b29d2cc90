//! Extractors that reject malformed input with the standard error body.

use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
};
use serde::de::DeserializeOwned;

use crate::error::{AppError, Message};

/// `Json<T>` whose rejection is a bilingual 400.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| {
                AppError::BadRequest(Message::owned(
                    rejection.body_text(),
                    "Dữ liệu gửi lên không hợp lệ".to_owned(),
                ))
            })?;
        Ok(Self(value))
    }
}

/// `Query<T>` whose rejection is a bilingual 400.
pub struct QueryParams<T>(pub T);

impl<S, T> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| {
                AppError::BadRequest(Message::owned(
                    rejection.body_text(),
                    "Tham số truy vấn không hợp lệ".to_owned(),
                ))
            })?;
        Ok(Self(value))
    }
}
