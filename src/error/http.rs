//! Admin HTTP surface error type implementing
//! `actix_web::error::ResponseError`.

#[derive(Debug)]
pub enum AdminHttpError {
    InternalError,
    NotFound,
}

impl std::fmt::Display for AdminHttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InternalError => write!(f, "internal server error."),
            Self::NotFound => write!(f, "not found."),
        }
    }
}

impl actix_web::error::ResponseError for AdminHttpError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        match self {
            Self::InternalError => actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound => actix_web::http::StatusCode::NOT_FOUND,
        }
    }

    fn error_response(&self) -> actix_web::HttpResponse<actix_web::body::BoxBody> {
        actix_web::HttpResponse::build(self.status_code())
            .content_type(actix_web::http::header::ContentType::plaintext())
            .body(self.to_string())
    }
}

impl From<super::app::AppError> for AdminHttpError {
    fn from(value: super::app::AppError) -> Self {
        log::error!("admin request failed: {value}");
        Self::InternalError
    }
}

impl From<std::io::Error> for AdminHttpError {
    fn from(value: std::io::Error) -> Self {
        log::error!("admin request failed: {value}");
        Self::InternalError
    }
}
