use std::any::Any;

use axum::Json;
use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use habitica_core::error::{ApiError, codes};
use habitica_mcp_runtime::ToolError;

/// Request-level failure rendered as an [`ApiError`] body.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Access denied: IP address {client_ip} is not allowed")]
    IpDenied { client_ip: String },
    #[error("Rate limit exceeded: {count} requests in the current window (limit {limit})")]
    RateLimited {
        reset_at: DateTime<Utc>,
        count: u32,
        limit: u32,
    },
    #[error("Invalid or missing API key")]
    Unauthorized { header: String },
    #[error("Missing Habitica credentials")]
    MissingCredentials {
        user_id_header: String,
        api_token_header: String,
    },
    #[error("{message}")]
    Validation {
        message: String,
        field: Option<String>,
    },
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::IpDenied { .. } => StatusCode::FORBIDDEN,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Unauthorized { .. } | AppError::MissingCredentials { .. } => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Tool(err) => match err {
                ToolError::UnknownTool { .. } => StatusCode::NOT_FOUND,
                ToolError::MissingArgument { .. } | ToolError::InvalidArgument { .. } => {
                    StatusCode::BAD_REQUEST
                }
                ToolError::Upstream { .. } | ToolError::Internal(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn to_api_error(&self) -> ApiError {
        match self {
            AppError::IpDenied { client_ip } => {
                let mut body = ApiError::new(codes::IP_FORBIDDEN, self.to_string())
                    .with_docs_hint("Ask the operator to add your address to ALLOWED_IPS.");
                body.client_ip = Some(client_ip.clone());
                body
            }
            AppError::RateLimited {
                reset_at,
                count,
                limit,
            } => {
                let mut body = ApiError::new(codes::RATE_LIMITED, self.to_string())
                    .with_docs_hint("Retry after resetTime.");
                body.reset_time = Some(*reset_at);
                body.current_count = Some(*count);
                body.limit = Some(*limit);
                body
            }
            AppError::Unauthorized { header } => {
                ApiError::new(codes::UNAUTHORIZED, self.to_string())
                    .with_field(header.clone())
                    .with_docs_hint(format!("Send the gateway secret in the '{header}' header."))
            }
            AppError::MissingCredentials {
                user_id_header,
                api_token_header,
            } => ApiError::new(codes::MISSING_CREDENTIALS, self.to_string()).with_docs_hint(
                format!(
                    "Send '{user_id_header}' and '{api_token_header}' headers, or configure \
                     HABITICA_USER_ID and HABITICA_API_TOKEN on the gateway."
                ),
            ),
            AppError::Validation { message, field } => {
                let body = ApiError::new(codes::VALIDATION_FAILED, message.clone());
                match field {
                    Some(field) => body.with_field(field.clone()),
                    None => body,
                }
            }
            AppError::Tool(err) => {
                let mut body = ApiError::new(err.code(), err.to_string());
                body.field = err.field().map(str::to_string);
                body.docs_hint = err.docs_hint();
                body
            }
            AppError::Internal(_) => {
                ApiError::new(codes::INTERNAL_ERROR, "An internal error occurred")
            }
        }
    }

    fn retry_after_secs(&self) -> Option<i64> {
        match self {
            AppError::RateLimited { reset_at, .. } => {
                let millis = (*reset_at - Utc::now()).num_milliseconds().max(0);
                Some((millis + 999) / 1000)
            }
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::Internal(message) => {
                tracing::error!(event = "request_failed", error = %message, "internal error");
            }
            AppError::Tool(err @ ToolError::Internal(_)) => {
                tracing::error!(event = "request_failed", error = %err, "tool internal error");
            }
            _ => {}
        }

        let body = self.to_api_error();
        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = self.retry_after_secs() {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
        }
        response
    }
}

/// Body for `CatchPanicLayer`: a panicking handler still answers with JSON.
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");
    AppError::Internal(format!("handler panicked: {detail}")).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use chrono::TimeDelta;
    use serde_json::Value;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn rate_limited_carries_reset_and_retry_after() {
        let response = AppError::RateLimited {
            reset_at: Utc::now() + TimeDelta::seconds(90),
            count: 101,
            limit: 100,
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let retry: i64 = response.headers()[RETRY_AFTER]
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!((89..=90).contains(&retry));
        let body = body_json(response).await;
        assert_eq!(body["error"], "rate_limited");
        assert_eq!(body["currentCount"], 101);
        assert!(body["resetTime"].is_string());
    }

    #[tokio::test]
    async fn ip_denial_exposes_client_ip() {
        let response = AppError::IpDenied {
            client_ip: "192.168.1.1".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = body_json(response).await;
        assert_eq!(body["clientIP"], "192.168.1.1");
    }

    #[test]
    fn tool_errors_map_to_http_statuses() {
        let unknown = AppError::from(ToolError::UnknownTool {
            name: "x".to_string(),
            suggestion: None,
        });
        assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::from(ToolError::missing("type")).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(ToolError::Upstream {
                status: Some(404),
                message: "Task not found.".to_string()
            })
            .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let response = AppError::Internal("db exploded".to_string()).into_response();
        let body = body_json(response).await;
        assert_eq!(body["error"], "internal_error");
        assert_eq!(body["message"], "An internal error occurred");
    }
}
