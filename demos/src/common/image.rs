//! Image loading and depth map encoding.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use burn::tensor::{backend::Backend, DType, Tensor, TensorData};
use depthnet::InputShape;
use image::{imageops::FilterType, DynamicImage, GenericImageView, ImageBuffer, Luma};
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Image processing utilities
pub struct ImageUtils;

impl ImageUtils {
    /// Load an image, resize it to the model input and convert it to a tensor.
    ///
    /// # Returns
    /// Tensor of shape `[1, channels, height, width]` with values in `[0, 1]`,
    /// and the original `(width, height)` of the file.
    pub fn load_image<B: Backend, P: AsRef<Path>>(
        path: P,
        input: &InputShape,
        device: &B::Device,
    ) -> Result<(Tensor<B, 4>, (u32, u32))> {
        let img = image::open(&path)
            .with_context(|| format!("Failed to open image at {}", path.as_ref().display()))?;
        let original = img.dimensions();

        let resized = img.resize_exact(
            input.width as u32,
            input.height as u32,
            FilterType::Triangle,
        );
        let tensor = Self::dynamic_image_to_tensor(resized, input.channels, device)?;

        Ok((tensor, original))
    }

    /// Convert a `DynamicImage` to a `[1, channels, height, width]` tensor.
    ///
    /// One channel decodes as luminance, three as RGB.
    pub fn dynamic_image_to_tensor<B: Backend>(
        img: DynamicImage,
        channels: usize,
        device: &B::Device,
    ) -> Result<Tensor<B, 4>> {
        let (width, height) = img.dimensions();

        let buf = match channels {
            1 => img.to_luma32f().into_raw(),
            3 => img.into_rgb32f().into_raw(),
            _ => anyhow::bail!("Unsupported channel count {channels}, expected 1 or 3"),
        };

        let data = TensorData::new(buf, [height as usize, width as usize, channels])
            .convert::<B::FloatElem>();
        let tensor = Tensor::from_data(data, device);

        // Permute to [channels, height, width] and add batch dimension
        Ok(tensor.permute([2, 0, 1]).unsqueeze::<4>())
    }

    /// Encode a `[1, 1, height, width]` prediction as a 16-bit grayscale image,
    /// min-max normalized over the whole map.
    pub fn depth_to_image<B: Backend>(tensor: Tensor<B, 4>) -> Result<DynamicImage> {
        let [batch, channels, height, width] = tensor.dims();
        if batch != 1 || channels != 1 {
            anyhow::bail!("Expected a [1, 1, H, W] depth map, got {:?}", tensor.dims());
        }

        let values = tensor
            .into_data()
            .convert_dtype(DType::F32)
            .to_vec::<f32>()
            .map_err(|e| anyhow::anyhow!("Failed to convert tensor to f32: {:#?}", e))?;

        let buffer = ImageBuffer::<Luma<u16>, _>::from_raw(
            width as u32,
            height as u32,
            normalize_min_max(&values),
        )
        .context("Failed to create 16-bit grayscale image buffer")?;

        Ok(DynamicImage::ImageLuma16(buffer))
    }
}

/// Map `values` linearly onto the full `u16` range. A constant map becomes zeros.
pub fn normalize_min_max(values: &[f32]) -> Vec<u16> {
    let (min, max) = values
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });

    let range = max - min;
    if !range.is_finite() || range <= f32::EPSILON {
        return vec![0; values.len()];
    }

    values
        .iter()
        .map(|&v| (((v - min) / range) * f32::from(u16::MAX)).round() as u16)
        .collect()
}

/// A single image file, or every image below a directory in sorted order.
pub fn collect_images(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }

    let mut images = Vec::new();
    for entry in WalkDir::new(input).follow_links(true) {
        let entry = entry
            .with_context(|| format!("Failed to read directory: {}", input.display()))?;
        let path = entry.path();
        let is_image = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()));
        if entry.file_type().is_file() && is_image {
            images.push(path.to_path_buf());
        }
    }
    images.sort();

    Ok(images)
}
