use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use thiserror::Error;

/// Errors raised by the analyzer and visualizer adapters.
///
/// Every variant is terminal for the call that produced it; nothing in the
/// crate retries.
#[derive(Debug, Error)]
pub enum ShopVisionError {
    /// Transport, auth or status failure talking to the remote model.
    #[error("service error: {0}")]
    Service(String),

    /// The analyzer response did not match the declared product shape.
    #[error("parse error: {0}")]
    Parse(String),

    /// The visualizer response carried no usable image.
    #[error("render error: {0}")]
    Render(String),

    /// The input image was rejected before any request was built.
    #[error("invalid image: {0}")]
    InvalidImage(String),
}

impl ShopVisionError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Service(_) => "service_error",
            Self::Parse(_) => "parse_error",
            Self::Render(_) => "render_error",
            Self::InvalidImage(_) => "invalid_image",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::InvalidImage(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<reqwest::Error> for ShopVisionError {
    fn from(e: reqwest::Error) -> Self {
        Self::Service(e.to_string())
    }
}

impl IntoResponse for ShopVisionError {
    fn into_response(self) -> Response {
        let body = json!({ "error": self.kind(), "message": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ShopVisionError>;
