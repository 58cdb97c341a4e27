//! Request extractors whose rejections use the `{ok:false}` error body.
//!
//! The plain axum extractors answer malformed input with a text body; these
//! wrappers route the rejection through [`ApiError`] instead.

use axum::extract::FromRequest;
use axum::extract::FromRequestParts;

use crate::api::error::ApiError;

/// JSON request body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Query string.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// Path parameters.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);
