//! Digit classification over HTTP: an uploaded image is squashed to a 28x28
//! grayscale vector and scored by an ONNX model loaded from disk per request.

pub mod config;
pub mod error;
pub mod mnist_model;
pub mod routes;

pub use config::{Opt, Settings};
pub use error::DigitError;
pub use mnist_model::{load_model, predict_digit, Classifier, MnistInput, MnistModel};
