use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// JSON body shared by the passcode endpoints.
#[derive(Debug, Serialize)]
pub struct Reply {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Reply {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            code: None,
            message: Some(message.into()),
        }
    }

    /// A soft outcome that is not an error but still worth telling the client.
    pub fn notice(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            success: true,
            code: Some(code),
            message: Some(message.into()),
        }
    }

    pub fn failure(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            code: Some(code),
            message: Some(message.into()),
        }
    }

    pub fn with_status(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        self.with_status(StatusCode::OK)
    }
}

/// Whole seconds to wait, rounded up and never below one.
pub fn wait_seconds(wait: time::Duration) -> i64 {
    let seconds = wait.whole_seconds() + i64::from(wait.subsec_nanoseconds() > 0);
    seconds.max(1)
}

pub fn with_retry_after(mut response: Response, wait: time::Duration) -> Response {
    response
        .headers_mut()
        .insert(RETRY_AFTER, HeaderValue::from(wait_seconds(wait)));
    response
}
