use std::{io, path::PathBuf, sync::Arc};

use axum::{
    body::Body,
    http::{HeaderMap, StatusCode, header::InvalidHeaderValue},
    response::{IntoResponse, Response},
};

/// Everything that stops the request pipeline before a normal body
///
/// `Redirect` and `NotModified` are not failures, they short-circuit the
/// pipeline the same way errors do.
#[derive(thiserror::Error, Debug)]
pub enum ServeError {
    #[error("malformed request target {0}")]
    MalformedRequest(String),
    #[error("path not found {0:?}")]
    NotFound(PathBuf),
    #[error("failed io {0}")]
    Io(#[from] io::Error),
    #[error("moved permanently to {0}")]
    Redirect(String),
    #[error("not modified")]
    NotModified,
    #[error("invalid header value {0}")]
    InvalidHeader(#[from] InvalidHeaderValue),
    #[error("internal server error {0}")]
    Internal(#[from] anyhow::Error),
}

impl ServeError {
    pub fn status(&self) -> StatusCode {
        use ServeError::*;

        match self {
            MalformedRequest(_) => StatusCode::BAD_REQUEST,
            NotFound(_) => StatusCode::NOT_FOUND,
            Redirect(_) => StatusCode::MOVED_PERMANENTLY,
            NotModified => StatusCode::NOT_MODIFIED,
            Io(_) | InvalidHeader(_) | Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Map a failed open or stat of `path` to 404 or 500
    ///
    /// A path running through a regular file (`/hello.txt/x`) is a 404 too.
    pub fn from_io(err: io::Error, path: impl Into<PathBuf>) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::NotADirectory => {
                ServeError::NotFound(path.into())
            }
            _ => ServeError::Io(err),
        }
    }
}

/// A terminal pipeline outcome with the headers collected before it fired
#[derive(Debug)]
pub struct Terminal {
    pub error: ServeError,
    pub headers: HeaderMap,
}

impl Terminal {
    pub fn status(&self) -> StatusCode {
        self.error.status()
    }
}

/// Replaces the default terminal response writer
pub type CompletionHandler = Arc<dyn Fn(Terminal) -> Response + Send + Sync>;

static BAD_REQUEST: &str = "Bad Request";
static NOT_FOUND: &str = "Not Found";
static INTERNAL_SERVER_ERROR: &str = "Internal Server Error";

impl IntoResponse for Terminal {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match status {
            StatusCode::BAD_REQUEST => Body::from(BAD_REQUEST),
            StatusCode::NOT_FOUND => Body::from(NOT_FOUND),
            StatusCode::INTERNAL_SERVER_ERROR => Body::from(INTERNAL_SERVER_ERROR),
            _ => Body::empty(),
        };
        (status, self.headers, body).into_response()
    }
}
