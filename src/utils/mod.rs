use actix_web::{web, FromRequest};
use futures_util::future::LocalBoxFuture;
use validator::{Validate, ValidationError};

use crate::api::error;

pub const MAX_FILE_ID_LEN: usize = 128;

/// File ids name chunk files on disk, so only a path-safe alphabet is allowed.
pub fn validate_file_id(file_id: &str) -> Result<(), ValidationError> {
    if file_id.is_empty() || file_id.len() > MAX_FILE_ID_LEN {
        return Err(ValidationError::new("file_id_length"));
    }
    if !file_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(ValidationError::new("file_id_charset"));
    }
    Ok(())
}

pub struct ValidatedJson<T>(pub T);

impl<T> FromRequest for ValidatedJson<T>
where
    T: Validate + serde::de::DeserializeOwned + 'static,
{
    type Error = error::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(
        req: &actix_web::HttpRequest,
        payload: &mut actix_web::dev::Payload,
    ) -> Self::Future {
        let fut = web::Json::<T>::from_request(req, payload);

        Box::pin(async move {
            let json = fut.await.map_err(|e| error::Error::BadRequest(e.to_string().into()))?;
            let model = json.into_inner();
            model.validate().map_err(|e| error::Error::BadRequest(e.to_string().into()))?;
            Ok(ValidatedJson(model))
        })
    }
}

pub struct ValidatedQuery<T>(pub T);

impl<T> FromRequest for ValidatedQuery<T>
where
    T: Validate + serde::de::DeserializeOwned + 'static,
{
    type Error = error::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(
        req: &actix_web::HttpRequest,
        payload: &mut actix_web::dev::Payload,
    ) -> Self::Future {
        let fut = web::Query::<T>::from_request(req, payload);

        Box::pin(async move {
            let query = fut.await.map_err(|e| error::Error::BadRequest(e.to_string().into()))?;
            query.validate().map_err(|e| error::Error::BadRequest(e.to_string().into()))?;
            Ok(ValidatedQuery(query.into_inner()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_id_accepts_uuid() {
        assert!(validate_file_id("0b6f6c2e-9a43-4a57-8a4e-6f0f2b1d7c11").is_ok());
    }

    #[test]
    fn test_file_id_rejects_path_traversal() {
        assert!(validate_file_id("../etc/passwd").is_err());
        assert!(validate_file_id("a/b").is_err());
    }

    #[test]
    fn test_file_id_rejects_empty_and_oversized() {
        assert!(validate_file_id("").is_err());
        assert!(validate_file_id(&"x".repeat(MAX_FILE_ID_LEN + 1)).is_err());
    }
}
