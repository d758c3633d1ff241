/// Background removal with the U2-Net salient object model
///
/// The model predicts a per-pixel foreground probability at 320x320.
/// That prediction is normalized, scaled back to the source size and
/// used as the alpha channel of the source pixels.

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, Rgba, RgbImage, RgbaImage};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tract_onnx::prelude::*;

use crate::error::{Error, Result};

/// Side length of the square model input
pub const MODEL_INPUT_SIZE: u32 = 320;

/// ImageNet channel statistics the model was trained with
const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Anything that can cut the subject out of a photo.
///
/// Implementations return an image of the same size whose alpha channel
/// is opaque on the subject and transparent on the background.
pub trait BackgroundRemover {
    fn remove(&mut self, image: &RgbImage) -> Result<RgbaImage>;
}

type U2NetPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// U2-Net ONNX model executed with tract
pub struct U2NetRemover {
    plan: U2NetPlan,
    model_path: PathBuf,
}

impl U2NetRemover {
    /// Load and optimize the model at `model_path`
    pub fn load(model_path: &Path) -> Result<Self> {
        if !model_path.is_file() {
            return Err(Error::ModelNotFound(model_path.to_path_buf()));
        }

        let size = MODEL_INPUT_SIZE as usize;
        let plan = tract_onnx::onnx()
            .model_for_path(model_path)
            .and_then(|model| model.with_input_fact(0, f32::fact([1, 3, size, size]).into()))
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| Error::Model(format!("{}: {}", model_path.display(), e)))?;

        tracing::info!("🧠 Loaded background removal model: {}", model_path.display());

        Ok(U2NetRemover {
            plan,
            model_path: model_path.to_path_buf(),
        })
    }

    /// Run the model and return the raw 320x320 prediction
    fn predict(&self, image: &RgbImage) -> Result<Vec<f32>> {
        let input: Tensor = preprocess(image).into();

        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(|e| Error::Model(e.to_string()))?;

        let first = outputs
            .first()
            .ok_or_else(|| Error::Model("model produced no outputs".to_string()))?;
        let view = first
            .to_array_view::<f32>()
            .map_err(|e| Error::Model(e.to_string()))?;

        // Output is [1, 1, 320, 320]; channel 0 of batch 0 comes first in memory order
        let plane = (MODEL_INPUT_SIZE * MODEL_INPUT_SIZE) as usize;
        let prediction: Vec<f32> = view.iter().take(plane).copied().collect();
        if prediction.len() != plane {
            return Err(Error::Model(format!(
                "unexpected output size {} (expected {})",
                prediction.len(),
                plane
            )));
        }

        Ok(prediction)
    }
}

impl BackgroundRemover for U2NetRemover {
    fn remove(&mut self, image: &RgbImage) -> Result<RgbaImage> {
        let prediction = self.predict(image)?;
        let mask = prediction_to_mask(&prediction, MODEL_INPUT_SIZE, MODEL_INPUT_SIZE);
        let (width, height) = image.dimensions();
        let mask = imageops::resize(&mask, width, height, FilterType::Lanczos3);
        Ok(apply_mask(image, &mask))
    }
}

impl std::fmt::Debug for U2NetRemover {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("U2NetRemover")
            .field("model_path", &self.model_path)
            .finish()
    }
}

/// Default model location, matching where rembg keeps its weights:
/// `$U2NET_HOME/u2net.onnx`, else `~/.u2net/u2net.onnx`
pub fn default_model_path() -> PathBuf {
    model_path_from(std::env::var_os("U2NET_HOME"), dirs::home_dir())
}

/// Model location from the `U2NET_HOME` value and the user's home directory
pub fn model_path_from(u2net_home: Option<OsString>, user_home: Option<PathBuf>) -> PathBuf {
    let home = u2net_home
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .or_else(|| user_home.map(|home| home.join(".u2net")))
        .unwrap_or_else(|| PathBuf::from(".u2net"));
    home.join("u2net.onnx")
}

/// Resize to the model input and normalize into an NCHW tensor
pub fn preprocess(image: &RgbImage) -> tract_ndarray::Array4<f32> {
    let size = MODEL_INPUT_SIZE;
    let resized = imageops::resize(image, size, size, FilterType::Lanczos3);

    let max = resized
        .pixels()
        .flat_map(|p| p.0)
        .max()
        .map(|m| (m as f32).max(1e-6))
        .unwrap_or(1.0);

    let side = size as usize;
    tract_ndarray::Array4::from_shape_fn((1, 3, side, side), |(_, c, y, x)| {
        let value = resized.get_pixel(x as u32, y as u32)[c] as f32 / max;
        (value - MEAN[c]) / STD[c]
    })
}

/// Min-max normalize a prediction into an 8-bit mask.
/// A flat prediction carries no information and becomes fully transparent.
pub fn prediction_to_mask(prediction: &[f32], width: u32, height: u32) -> GrayImage {
    let (min, max) = prediction
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = max - min;

    GrayImage::from_fn(width, height, |x, y| {
        let index = (y * width + x) as usize;
        let value = match prediction.get(index) {
            Some(&v) if range > 0.0 => (v - min) / range,
            _ => 0.0,
        };
        Luma([(value * 255.0).clamp(0.0, 255.0) as u8])
    })
}

/// Attach `mask` as the alpha channel of `image`. Both must be the same size.
/// Color stays straight (not premultiplied), so soft edges keep the subject's color.
pub fn apply_mask(image: &RgbImage, mask: &GrayImage) -> RgbaImage {
    RgbaImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0;
        let alpha = mask.get_pixel_checked(x, y).map_or(0, |p| p[0]);
        Rgba([r, g, b, alpha])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_preprocess_shape_and_normalization() {
        let image = RgbImage::from_pixel(40, 20, Rgb([200, 100, 0]));
        let tensor = preprocess(&image);

        assert_eq!(tensor.shape(), &[1, 3, 320, 320]);
        // Red is the max channel, so it scales to 1.0 before normalization
        let red = tensor[[0, 0, 10, 10]];
        assert!((red - (1.0 - MEAN[0]) / STD[0]).abs() < 1e-3);
        let blue = tensor[[0, 2, 10, 10]];
        assert!((blue - (0.0 - MEAN[2]) / STD[2]).abs() < 1e-3);
    }

    #[test]
    fn test_prediction_to_mask_stretches_range() {
        let prediction = [0.2, 0.4, 0.6, 0.2];
        let mask = prediction_to_mask(&prediction, 2, 2);

        assert_eq!(mask.get_pixel(0, 0)[0], 0);
        assert_eq!(mask.get_pixel(0, 1)[0], 255);
        assert_eq!(mask.get_pixel(1, 1)[0], 0);
        assert!(mask.get_pixel(1, 0)[0] > 100 && mask.get_pixel(1, 0)[0] < 150);
    }

    #[test]
    fn test_flat_prediction_is_transparent() {
        let mask = prediction_to_mask(&[0.5; 4], 2, 2);
        assert!(mask.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn test_apply_mask_keeps_color() {
        let image = RgbImage::from_pixel(2, 1, Rgb([1, 2, 3]));
        let mut mask = GrayImage::new(2, 1);
        mask.put_pixel(1, 0, Luma([255]));

        let cut = apply_mask(&image, &mask);

        assert_eq!(cut.get_pixel(0, 0).0, [1, 2, 3, 0]);
        assert_eq!(cut.get_pixel(1, 0).0, [1, 2, 3, 255]);
    }

    #[test]
    fn test_load_missing_model() {
        let result = U2NetRemover::load(Path::new("/nonexistent/u2net.onnx"));
        assert!(matches!(result, Err(Error::ModelNotFound(_))));
    }

    #[test]
    fn test_u2net_home_wins() {
        let path = model_path_from(
            Some(OsString::from("/models")),
            Some(PathBuf::from("/home/user")),
        );
        assert_eq!(path, PathBuf::from("/models/u2net.onnx"));
    }

    #[test]
    fn test_falls_back_to_user_home() {
        let home = Some(PathBuf::from("/home/user"));
        assert_eq!(
            model_path_from(None, home.clone()),
            PathBuf::from("/home/user/.u2net/u2net.onnx")
        );
        assert_eq!(
            model_path_from(Some(OsString::new()), home),
            PathBuf::from("/home/user/.u2net/u2net.onnx")
        );
        assert_eq!(model_path_from(None, None), PathBuf::from(".u2net/u2net.onnx"));
    }
}
