//! Extractors that turn malformed bodies into structured `AppError`s instead
//! of axum's plain-text rejections, plus small header helpers.

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{Map, Value};

use crate::error::AppError;

/// JSON extractor whose deserialization failures become `AppError::Validation`.
pub struct AppJson<T>(pub T);

impl<S, T> FromRequest<S> for AppJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => Err(map_json_rejection(rejection)),
        }
    }
}

pub fn map_json_rejection(rejection: JsonRejection) -> AppError {
    let body_text = rejection.body_text();
    let field = extract_field_from_serde_message(&body_text).unwrap_or_else(|| "body".to_string());
    AppError::Validation {
        message: format!("Invalid request body: {body_text}"),
        field: Some(field),
    }
}

/// Argument bag for `POST /tools/{name}`. An empty body means no arguments;
/// anything else must be a JSON object.
pub struct ToolArguments(pub Map<String, Value>);

impl<S> FromRequest<S> for ToolArguments
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let body = Bytes::from_request(req, state)
            .await
            .map_err(|err| AppError::Validation {
                message: format!("Could not read request body: {}", err.body_text()),
                field: Some("body".to_string()),
            })?;
        parse_arguments(&body).map(ToolArguments)
    }
}

fn parse_arguments(body: &[u8]) -> Result<Map<String, Value>, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Map::new()),
        Ok(_) => Err(AppError::Validation {
            message: "Tool arguments must be a JSON object".to_string(),
            field: Some("body".to_string()),
        }),
        Err(err) => Err(AppError::Validation {
            message: format!("Invalid JSON body: {err}"),
            field: Some("body".to_string()),
        }),
    }
}

fn extract_field_from_serde_message(msg: &str) -> Option<String> {
    ["missing field `", "unknown field `"]
        .iter()
        .find_map(|pattern| {
            let start = msg.find(pattern)? + pattern.len();
            let after = &msg[start..];
            after.find('`').map(|end| after[..end].to_string())
        })
}

pub fn header_value(headers: &HeaderMap, key: &str) -> Option<String> {
    headers
        .get(key)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToOwned::to_owned)
}

pub fn first_header_token(headers: &HeaderMap, key: &str) -> Option<String> {
    headers
        .get(key)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToOwned::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn extracts_missing_field_name() {
        let msg = "Failed to deserialize the JSON body: missing field `name` at line 1 column 2";
        assert_eq!(extract_field_from_serde_message(msg), Some("name".to_string()));
        assert_eq!(extract_field_from_serde_message("expected value"), None);
    }

    #[test]
    fn empty_and_null_bodies_are_empty_arguments() {
        assert!(parse_arguments(b"").unwrap().is_empty());
        assert!(parse_arguments(b"  \n").unwrap().is_empty());
        assert!(parse_arguments(b"null").unwrap().is_empty());
    }

    #[test]
    fn non_object_bodies_are_rejected() {
        assert!(matches!(
            parse_arguments(b"[1,2]"),
            Err(AppError::Validation { .. })
        ));
        assert!(matches!(
            parse_arguments(b"{not json"),
            Err(AppError::Validation { .. })
        ));
        let map = parse_arguments(br#"{"taskId":"abc"}"#).unwrap();
        assert_eq!(map["taskId"], "abc");
    }

    #[test]
    fn header_helpers_trim_and_split() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(" 1.2.3.4 , 5.6.7.8"));
        headers.insert("x-api-key", HeaderValue::from_static("   "));
        assert_eq!(
            first_header_token(&headers, "x-forwarded-for"),
            Some("1.2.3.4".to_string())
        );
        assert_eq!(header_value(&headers, "x-api-key"), None);
        assert_eq!(header_value(&headers, "missing"), None);
    }
}
