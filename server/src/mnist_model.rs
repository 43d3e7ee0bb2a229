use std::path::Path;

use image::{self, imageops::FilterType};
use log::debug;
use tract_onnx::prelude::*;

use crate::error::{DigitError, Result};

/// Side length of the square image the model consumes.
pub const IMAGE_SIDE: u32 = 28;
/// Length of a flattened, normalized pixel vector.
pub const PIXEL_COUNT: usize = (IMAGE_SIDE * IMAGE_SIDE) as usize;

type OnnxPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Row-major 28x28 grayscale pixels scaled into `[0.0, 1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct MnistInput(Vec<f32>);

impl MnistInput {
    /// Decodes an uploaded image, squashes it to 28x28 regardless of aspect
    /// ratio and flattens its luminance.
    pub fn from_image_bytes(bytes: Option<&[u8]>) -> Result<Self> {
        const NORM_SCALE: f32 = 255.;
        let bytes = match bytes {
            Some(bytes) if !bytes.is_empty() => bytes,
            _ => return Err(DigitError::invalid("File is not provided.")),
        };
        let pixels = image::load_from_memory(bytes)?
            .resize_exact(IMAGE_SIDE, IMAGE_SIDE, FilterType::CatmullRom)
            .to_luma8()
            .into_raw()
            .into_iter()
            .map(|x| f32::from(x) / NORM_SCALE)
            .collect::<Vec<f32>>();
        Ok(Self(pixels))
    }

    pub fn pixels(&self) -> &[f32] {
        &self.0
    }

    pub fn into_pixels(self) -> Vec<f32> {
        self.0
    }
}

/// Reshapes a flat pixel slice into a `[1, 784]` batch, rejecting any other length.
fn batch_tensor(data_point: &[f32]) -> Result<Tensor> {
    if data_point.len() != PIXEL_COUNT {
        return Err(DigitError::invalid(format!(
            "Data point must be a list of {PIXEL_COUNT} elements, got {}.",
            data_point.len()
        )));
    }
    Tensor::from_shape(&[1, PIXEL_COUNT], data_point)
        .map_err(|e| DigitError::Inference(e.to_string()))
}

/// Anything that can score a single-sample `[1, 784]` batch.
pub trait Classifier {
    /// Returns one score per class, in class-index order.
    fn forward(&self, input: Tensor) -> Result<Vec<f32>>;
}

/// An ONNX graph planned for `[1, 784]` f32 input.
pub struct MnistModel {
    plan: OnnxPlan,
}

impl MnistModel {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let read_err = |e: TractError| DigitError::ModelRead(format!("{e:#}"));
        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .map_err(read_err)?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1i64, PIXEL_COUNT as i64)),
            )
            .map_err(read_err)?
            .into_optimized()
            .map_err(read_err)?
            .into_runnable()
            .map_err(read_err)?;
        Ok(Self { plan })
    }
}

impl Classifier for MnistModel {
    fn forward(&self, input: Tensor) -> Result<Vec<f32>> {
        let inference_err = |e: TractError| DigitError::Inference(format!("{e:#}"));
        let outputs = self.plan.run(tvec!(input.into())).map_err(inference_err)?;
        let scores = outputs
            .first()
            .ok_or_else(|| DigitError::Inference("model produced no outputs".into()))?;
        let scores = scores.to_array_view::<f32>().map_err(inference_err)?;
        Ok(scores.iter().copied().collect())
    }
}

/// Loads the model at `path`, reparsing the file on every call.
pub fn load_model(path: Option<&Path>) -> Result<MnistModel> {
    let path = match path {
        Some(path) if !path.as_os_str().is_empty() => path,
        _ => return Err(DigitError::invalid("The path cannot be empty.")),
    };
    if !path.exists() {
        return Err(DigitError::invalid(format!(
            "The file '{}' does not exist.",
            path.display()
        )));
    }
    if !path.is_file() {
        return Err(DigitError::invalid(format!(
            "'{}' is not a file.",
            path.display()
        )));
    }

    debug!("Loading model from {}", path.display());
    MnistModel::from_file(path)
}

/// Index of the highest score; ties go to the lowest index and NaNs never win
/// against a number.
pub fn argmax(scores: &[f32]) -> Option<usize> {
    scores
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, score)| match best {
            Some((_, top)) if score <= top || score.is_nan() => best,
            _ => Some((i, score)),
        })
        .map(|(i, _)| i)
}

/// Runs `data_point` through `model` and returns the winning class as a
/// decimal string.
pub fn predict_digit(model: Option<&dyn Classifier>, data_point: &[f32]) -> Result<String> {
    let model = model.ok_or_else(|| DigitError::invalid("Model is not provided."))?;
    let scores = model.forward(batch_tensor(data_point)?)?;
    argmax(&scores)
        .map(|digit| digit.to_string())
        .ok_or_else(|| DigitError::Inference("model returned an empty score vector".into()))
}
