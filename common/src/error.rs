use actix_web::HttpResponse;
use thiserror::Error;

pub type Res<T> = std::result::Result<T, MonitorError>;

#[derive(Error, Debug)]
pub enum MonitorError {
    // === CONVERSION ERRORS ===
    #[error("Reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("JWT error: {0}")]
    JWT(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Invalid endpoint: {0}")]
    Url(#[from] url::ParseError),

    // === PIPELINE ERRORS ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Builder error: {0}")]
    Builder(String),

    // === APPLICATION ERRORS ===
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

impl MonitorError {
    pub fn to_http_response(&self) -> HttpResponse {
        let is_dev = cfg!(debug_assertions);

        let to_internal_json = |err_msg: &str| {
            if is_dev {
                serde_json::json!({ "error": err_msg })
            } else {
                serde_json::json!({ "error": "Internal server error" })
            }
        };

        match self {
            MonitorError::NotFound(_) => {
                HttpResponse::NotFound().json(serde_json::json!({ "error": self.to_string() }))
            }
            MonitorError::BadRequest(_) => {
                HttpResponse::BadRequest().json(serde_json::json!({ "error": self.to_string() }))
            }
            other => {
                log::error!("{}", other);
                HttpResponse::InternalServerError().json(to_internal_json(&other.to_string()))
            }
        }
    }
}

impl actix_web::ResponseError for MonitorError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        use actix_web::http::StatusCode;
        match self {
            MonitorError::NotFound(_) => StatusCode::NOT_FOUND,
            MonitorError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        self.to_http_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::ResponseError;
    use actix_web::http::StatusCode;

    #[test]
    fn application_errors_map_to_client_statuses() {
        assert_eq!(
            MonitorError::NotFound("order 7".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            MonitorError::BadRequest("bad id".into()).error_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            MonitorError::Builder("no snapshot".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
