use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use deadpool_redis::{redis::RedisError, CreatePoolError, PoolError};
use std::borrow::Cow;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Bad Request: {0}")]
    BadRequest(Cow<'static, str>),
    #[error("Not Found: {0}")]
    NotFound(Cow<'static, str>),
    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(Cow<'static, str>),
    #[error("Server Error: {0}")]
    ServerFailure(Cow<'static, str>),
    #[error("Internal Server Error")]
    InternalServer,
}

#[derive(serde::Serialize, serde::Deserialize, Debug)]
pub struct ErrorBody {
    pub message: Cow<'static, str>,
}

impl Error {
    pub fn bad_request(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn payload_too_large(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::PayloadTooLarge(msg.into())
    }

    pub fn internal_server_error() -> Self {
        Self::InternalServer
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match *self {
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Error::ServerFailure(_) | Error::InternalServer => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut res = HttpResponse::build(self.status_code());

        match self {
            // Has Message
            Error::BadRequest(msg)
            | Error::NotFound(msg)
            | Error::PayloadTooLarge(msg)
            | Error::ServerFailure(msg) => res.json(ErrorBody { message: msg.clone() }),
            // No Message
            Error::InternalServer => {
                res.json(ErrorBody { message: "Internal Server Error".into() })
            }
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SystemError {
    // sqlx errors
    #[error("Database Error : {0}")]
    DatabaseError(Cow<'static, str>),
    #[error("Migration Error")]
    MigrateError(#[from] sqlx::migrate::MigrateError),
    // serde errors
    #[error("JSON Serialization/Deserialization Error")]
    JsonError(#[from] serde_json::Error),
    // redis errors
    #[error(transparent)]
    PoolInit(#[from] CreatePoolError),
    #[error("Redis pool error: {0}")]
    PoolGet(#[from] PoolError),
    #[error("Redis error")]
    RedisError(#[from] RedisError),
    #[error("IO Error: {0}")]
    IoError(#[from] std::io::Error),
    // Upload errors
    #[error("Bad Request: {0}")]
    BadRequest(Cow<'static, str>),
    #[error("Not Found: {0}")]
    NotFound(Cow<'static, str>),
    #[error("Persistence Failure: {0}")]
    Persistence(Cow<'static, str>),
    #[error("Finalization Failure: {0}")]
    Finalization(Cow<'static, str>),
    #[error("Configuration Error: {0}")]
    Config(Cow<'static, str>),
    #[error("Internal System Error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

impl From<SystemError> for Error {
    fn from(value: SystemError) -> Self {
        match value {
            SystemError::BadRequest(msg) => Error::BadRequest(msg),
            SystemError::NotFound(msg) => Error::NotFound(msg),
            SystemError::Persistence(msg) => {
                log::error!("Chunk persistence failed: {}", msg);
                Error::ServerFailure("Failed to store upload chunk".into())
            }
            SystemError::Finalization(msg) => {
                log::error!("Upload finalization failed: {}", msg);
                Error::ServerFailure("File upload failed".into())
            }
            _ => {
                log::error!("Internal Server Error: {:?}", value);
                Error::InternalServer
            }
        }
    }
}

impl From<sqlx::Error> for SystemError {
    fn from(err: sqlx::Error) -> Self {
        log::error!("{:?}", err);
        match err {
            sqlx::Error::Database(db_err) => {
                log::error!("Unhandled DB error: {:?}", db_err);
                SystemError::DatabaseError(db_err.message().to_string().into())
            }
            sqlx::Error::RowNotFound => SystemError::NotFound("Resource not found".into()),
            other => SystemError::InternalError(Box::new(other)),
        }
    }
}

impl SystemError {
    pub fn bad_request(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn persistence(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::Persistence(msg.into())
    }

    pub fn finalization(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::Finalization(msg.into())
    }

    pub fn config(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::Config(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persistence_maps_to_server_failure() {
        let err: Error = SystemError::persistence("disk full").into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(matches!(err, Error::ServerFailure(_)));
    }

    #[test]
    fn test_bad_request_keeps_message() {
        let err: Error = SystemError::bad_request("Missing fileId").into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Bad Request: Missing fileId");
    }
}
