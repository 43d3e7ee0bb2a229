use std::path::Path;

use actix_multipart::form::{bytes::Bytes, MultipartForm, MultipartFormConfig};
use actix_multipart::MultipartError;
use actix_web::error::{InternalError, PayloadError};
use actix_web::http::header::ContentType;
use actix_web::http::StatusCode;
use actix_web::{get, post, web, HttpRequest, HttpResponse, ResponseError};
use log::{error, info, warn};
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::Settings;
use crate::error::{DigitError, ErrorBody, Result};
use crate::mnist_model::{load_model, predict_digit, Classifier, MnistInput, PIXEL_COUNT};

const DOCS_PAGE: &str = include_str!("../static/docs.html");

/// Multipart form accepted by `POST /predict`.
#[derive(Debug, MultipartForm)]
pub struct Upload {
    pub file: Option<Bytes>,
}

#[derive(Debug, Serialize)]
pub struct DigitResponse {
    pub digit: String,
}

/// Loads the model, preprocesses the image and predicts, in that order.
///
/// Any loader failure is reported as [`DigitError::ModelUnavailable`] since the
/// model path comes from the process, not the request.
pub fn classify_upload(model_path: &Path, image: Option<&[u8]>) -> Result<String> {
    let model =
        load_model(Some(model_path)).map_err(|e| DigitError::ModelUnavailable(Box::new(e)))?;
    let input = MnistInput::from_image_bytes(image)?;
    predict_digit(Some(&model as &dyn Classifier), input.pixels())
}

#[post("/predict")]
async fn predict_image_digit(
    settings: web::Data<Settings>,
    MultipartForm(upload): MultipartForm<Upload>,
) -> Result<HttpResponse> {
    let model_path = settings.model_path.clone();
    let image = upload.file.map(|file| file.data);
    let size = image.as_ref().map_or(0, |data| data.len());

    let res = web::block(move || classify_upload(&model_path, image.as_deref())).await?;
    match res {
        Ok(digit) => {
            info!("Predicted digit {} for {} byte upload", digit, size);
            Ok(HttpResponse::Ok().json(DigitResponse { digit }))
        }
        Err(e) => {
            if e.is_client_error() {
                warn!("Rejected prediction request: {}", e);
            } else {
                error!("Prediction failed: {}", e);
            }
            Err(e)
        }
    }
}

#[get("/docs")]
async fn docs() -> HttpResponse {
    HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(DOCS_PAGE)
}

#[get("/openapi.json")]
async fn openapi() -> HttpResponse {
    HttpResponse::Ok().json(openapi_document())
}

pub fn openapi_document() -> Value {
    let error = json!({
        "type": "object",
        "properties": { "detail": { "type": "string" } }
    });
    json!({
        "openapi": "3.0.3",
        "info": {
            "title": "digit-server",
            "version": env!("CARGO_PKG_VERSION"),
            "description": format!(
                "Classifies an uploaded image after resizing it to 28x28 grayscale ({PIXEL_COUNT} features)."
            )
        },
        "paths": {
            "/predict": {
                "post": {
                    "summary": "Predict the digit in an uploaded image",
                    "requestBody": {
                        "required": true,
                        "content": {
                            "multipart/form-data": {
                                "schema": {
                                    "type": "object",
                                    "required": ["file"],
                                    "properties": {
                                        "file": { "type": "string", "format": "binary" }
                                    }
                                }
                            }
                        }
                    },
                    "responses": {
                        "200": {
                            "description": "Predicted class index",
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "type": "object",
                                        "properties": { "digit": { "type": "string" } }
                                    }
                                }
                            }
                        },
                        "400": {
                            "description": "Missing, empty or undecodable upload",
                            "content": { "application/json": { "schema": error.clone() } }
                        },
                        "413": {
                            "description": "Upload larger than the configured limit",
                            "content": { "application/json": { "schema": error.clone() } }
                        },
                        "500": {
                            "description": "Model missing, unreadable or failed to run",
                            "content": { "application/json": { "schema": error } }
                        }
                    }
                }
            }
        }
    })
}

/// Status for a rejected multipart body; exceeding the upload limit is 413.
pub fn upload_error_status(err: &MultipartError) -> StatusCode {
    match err {
        MultipartError::Payload(PayloadError::Overflow) => StatusCode::PAYLOAD_TOO_LARGE,
        other => other.status_code(),
    }
}

fn upload_error(err: MultipartError, _req: &HttpRequest) -> actix_web::Error {
    let status = upload_error_status(&err);
    let detail = format!("invalid upload: {err}");
    warn!("{}", detail);
    InternalError::from_response(err, HttpResponse::build(status).json(ErrorBody { detail })).into()
}

/// Multipart limits; the whole upload is buffered in memory.
pub fn upload_config(max_upload_bytes: usize) -> MultipartFormConfig {
    MultipartFormConfig::default()
        .total_limit(max_upload_bytes)
        .memory_limit(max_upload_bytes)
        .error_handler(upload_error)
}

/// Registers shared state and every route on an app.
pub fn configure(settings: Settings) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        cfg.app_data(upload_config(settings.max_upload_bytes))
            .app_data(web::Data::new(settings))
            .service(predict_image_digit)
            .service(docs)
            .service(openapi);
    }
}
