//! `Json`, `Query` and `Path` with rejections folded into [`AppError`], so a
//! malformed request gets the same field-keyed body as any other validation
//! failure.

use axum::{
    async_trait,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRequest, FromRequestParts, Request,
    },
    http::request::Parts,
    response::{IntoResponse, Response},
};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::error::{AppError, FieldErrors};

pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// JSON request body; also usable as a JSON response.
#[derive(Debug, Clone, Copy, Default)]
pub struct Json<T>(pub T);

#[derive(Debug, Clone, Copy, Default)]
pub struct Query<T>(pub T);

/// Path parameters. A segment that does not parse is a 404.
#[derive(Debug, Clone, Copy)]
pub struct Path<T>(pub T);

/// Split `path: message` as produced by serde's path-aware errors into
/// (top-level field, message). Anything else lands in `non_field_errors`.
fn field_error(detail: &str) -> FieldErrors {
    lazy_static! {
        static ref POSITION: Regex = Regex::new(r" at line \d+ column \d+$").unwrap();
        static ref MISSING: Regex = Regex::new(r"^missing field `(\w+)`").unwrap();
        static ref PATH: Regex = Regex::new(r"^\w+(?:\[\d+\]|\.\w+)*$").unwrap();
    }
    let detail = POSITION.replace(detail.trim(), "");
    let mut errors = FieldErrors::new();

    if let Some(caps) = MISSING.captures(&detail) {
        errors.add(&caps[1], "This field is required.");
        return errors;
    }
    if let Some((path, message)) = detail.split_once(": ") {
        if PATH.is_match(path) {
            let field = path.split(['.', '[']).next().unwrap_or(path);
            let message = if field == path {
                message.to_string()
            } else {
                format!("{path}: {message}")
            };
            errors.add(field, message);
            return errors;
        }
    }
    errors.add(NON_FIELD_ERRORS, detail);
    errors
}

/// Drop axum's leading "Failed to ...: " sentence.
fn inner_detail(body_text: &str) -> &str {
    body_text
        .split_once(": ")
        .map_or(body_text, |(_, inner)| inner)
}

fn json_rejection(rejection: JsonRejection) -> AppError {
    debug!(error = %rejection.body_text(), "rejected JSON body");
    let errors = match &rejection {
        JsonRejection::JsonDataError(e) => field_error(inner_detail(&e.body_text())),
        JsonRejection::JsonSyntaxError(e) => {
            let mut errors = FieldErrors::new();
            let detail = e.body_text();
            errors.add(NON_FIELD_ERRORS, format!("Malformed JSON: {}", inner_detail(&detail)));
            errors
        }
        other => {
            let mut errors = FieldErrors::new();
            errors.add(NON_FIELD_ERRORS, other.body_text());
            errors
        }
    };
    AppError::Validation(errors)
}

fn query_rejection(rejection: QueryRejection) -> AppError {
    let text = rejection.body_text();
    debug!(error = %text, "rejected query string");
    AppError::Validation(field_error(inner_detail(&text)))
}

#[async_trait]
impl<T, S> FromRequest<S> for Json<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(Json(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

#[async_trait]
impl<T, S> FromRequestParts<S> for Query<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match axum::extract::Query::<T>::from_request_parts(parts, state).await {
            Ok(axum::extract::Query(value)) => Ok(Query(value)),
            Err(rejection) => Err(query_rejection(rejection)),
        }
    }
}

#[async_trait]
impl<T, S> FromRequestParts<S> for Path<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match axum::extract::Path::<T>::from_request_parts(parts, state).await {
            Ok(axum::extract::Path(value)) => Ok(Path(value)),
            Err(rejection) => {
                debug!(error = %rejection.body_text(), "rejected path parameters");
                Err(AppError::NotFound("Not found.".into()))
            }
        }
    }
}
