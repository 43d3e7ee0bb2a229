use actix_web::error::BlockingError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DigitError>;

/// Failures along the upload → preprocess → load → predict pipeline.
#[derive(Debug, Error)]
pub enum DigitError {
    /// Caller supplied something unusable: empty path, missing file, wrong vector length.
    #[error("{0}")]
    InvalidInput(String),

    #[error("could not decode image: {0}")]
    Decode(#[from] image::ImageError),

    /// Model file exists but could not be read or parsed as a model.
    #[error("error reading model file: {0}")]
    ModelRead(String),

    /// The configured model could not be loaded for a request; the client cannot fix this.
    #[error("model unavailable: {0}")]
    ModelUnavailable(#[source] Box<DigitError>),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("blocking worker failed to run the request")]
    Blocking(#[from] BlockingError),
}

impl DigitError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::Decode(_))
    }
}

/// JSON body returned for every failed request.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
}

impl ResponseError for DigitError {
    fn status_code(&self) -> StatusCode {
        if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            detail: self.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_and_decode_errors_are_client_errors() {
        assert!(DigitError::invalid("File is not provided.").is_client_error());
        let decode = image::load_from_memory(b"not an image").unwrap_err();
        let err = DigitError::from(decode);
        assert!(err.is_client_error());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn model_and_inference_errors_are_server_errors() {
        let read = DigitError::ModelRead("truncated protobuf".into());
        assert!(!read.is_client_error());
        assert_eq!(read.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            DigitError::Inference("no scores".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn unavailable_model_is_server_error_even_for_bad_path() {
        let err = DigitError::ModelUnavailable(Box::new(DigitError::invalid(
            "The file '/models/mnist.onnx' does not exist.",
        )));
        assert!(!err.is_client_error());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn error_response_carries_detail() {
        let resp = DigitError::invalid("Model is not provided.").error_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
