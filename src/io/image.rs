//! Image loading, array conversion and label map export

use crate::io::error::{Result, TilingError, WithContext, invalid_parameter};
use crate::io::palette::ClassPalette;
use crate::reconstruction::label_map::ClassLabelMap;
use image::imageops::FilterType;
use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage};
use ndarray::{Array2, Array3, ArrayView2, ArrayView3};
use std::path::{Path, PathBuf};

/// Load a photograph as `(height, width, 3)` RGB intensities
///
/// Alpha, if present, is discarded by the conversion.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or decoded
pub fn load_rgb_image(path: &Path) -> Result<Array3<u8>> {
    let img = image::open(path).map_err(|e| TilingError::ImageLoad {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(rgb_image_to_array(&img.to_rgb8()))
}

/// Load an image keeping its alpha channel, `(height, width, 4)`
///
/// # Errors
///
/// Returns an error if the file cannot be opened or decoded
pub fn load_rgba_image(path: &Path) -> Result<Array3<u8>> {
    let img = image::open(path).map_err(|e| TilingError::ImageLoad {
        path: path.to_path_buf(),
        source: e,
    })?;
    let rgba = img.to_rgba8();
    let (width, height) = (rgba.width() as usize, rgba.height() as usize);
    Array3::from_shape_vec((height, width, 4), rgba.into_raw())
        .map_err(|e| invalid_parameter("image", &path.display(), &e))
}

/// Load a single-channel mask, `(height, width)`
///
/// # Errors
///
/// Returns an error if the file cannot be opened or decoded
pub fn load_mask(path: &Path) -> Result<Array2<u8>> {
    let img = image::open(path).map_err(|e| TilingError::ImageLoad {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(gray_image_to_array(&img.to_luma8()))
}

/// Convert an RGB buffer to an array
pub fn rgb_image_to_array(img: &RgbImage) -> Array3<u8> {
    let (width, height) = (img.width() as usize, img.height() as usize);
    let mut data = Array3::zeros((height, width, 3));
    for (x, y, pixel) in img.enumerate_pixels() {
        for (c, &value) in pixel.0.iter().enumerate() {
            if let Some(slot) = data.get_mut((y as usize, x as usize, c)) {
                *slot = value;
            }
        }
    }
    data
}

/// Convert a grayscale buffer to an array
pub fn gray_image_to_array(img: &GrayImage) -> Array2<u8> {
    let (width, height) = (img.width() as usize, img.height() as usize);
    let mut data = Array2::zeros((height, width));
    for (x, y, pixel) in img.enumerate_pixels() {
        if let Some(slot) = data.get_mut((y as usize, x as usize)) {
            *slot = pixel.0[0];
        }
    }
    data
}

/// Convert the first three channels of an array to an RGB buffer
pub fn array_to_rgb_image(data: ArrayView3<'_, u8>) -> RgbImage {
    let (height, width, _) = data.dim();
    ImageBuffer::from_fn(width as u32, height as u32, |x, y| {
        let channel = |c: usize| data.get((y as usize, x as usize, c)).copied().unwrap_or(0);
        Rgb([channel(0), channel(1), channel(2)])
    })
}

/// Convert a single-channel array to a grayscale buffer
pub fn array_to_gray_image(data: ArrayView2<'_, u8>) -> GrayImage {
    let (height, width) = data.dim();
    ImageBuffer::from_fn(width as u32, height as u32, |x, y| {
        Luma([data.get((y as usize, x as usize)).copied().unwrap_or(0)])
    })
}

/// Shrink an RGB array by an integer factor along both axes
///
/// A factor of one returns the input unchanged.
///
/// # Errors
///
/// Returns an error if the factor is zero or larger than either dimension
pub fn downscale(data: ArrayView3<'_, u8>, factor: u32) -> Result<Array3<u8>> {
    let (height, width, _) = data.dim();
    if factor == 0 || factor as usize > height.min(width) {
        return Err(invalid_parameter(
            "downscale",
            &factor,
            &format!("must be between 1 and the smallest image dimension of {height}x{width}"),
        ));
    }
    if factor == 1 {
        return Ok(data.to_owned());
    }
    let img = array_to_rgb_image(data);
    let resized = image::imageops::resize(
        &img,
        img.width() / factor,
        img.height() / factor,
        FilterType::Triangle,
    );
    Ok(rgb_image_to_array(&resized))
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_file_operation(parent, "create directory")?;
    }
    Ok(())
}

fn save_rgb_image(img: &RgbImage, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    img.save(path).map_err(|e| TilingError::ImageExport {
        path: path.to_path_buf(),
        source: e,
    })
}

fn save_gray_image(img: &GrayImage, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    img.save(path).map_err(|e| TilingError::ImageExport {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Save an RGB array, format chosen from the extension
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the image saved
pub fn save_rgb(data: ArrayView3<'_, u8>, path: &Path) -> Result<()> {
    save_rgb_image(&array_to_rgb_image(data), path)
}

/// Save a single-channel array, format chosen from the extension
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the image saved
pub fn save_gray(data: ArrayView2<'_, u8>, path: &Path) -> Result<()> {
    save_gray_image(&array_to_gray_image(data), path)
}

/// Render a label map with the palette's display colours
pub fn colorize_labels(labels: &ClassLabelMap, palette: &ClassPalette) -> RgbImage {
    let view = labels.labels();
    let (height, width) = view.dim();
    ImageBuffer::from_fn(width as u32, height as u32, |x, y| {
        let class_id = view.get((y as usize, x as usize)).copied().unwrap_or(0);
        Rgb(palette.color(class_id))
    })
}

/// Save a colourised label map
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the image saved
pub fn export_label_map(labels: &ClassLabelMap, palette: &ClassPalette, path: &Path) -> Result<()> {
    save_rgb_image(&colorize_labels(labels, palette), path)
}

/// Save one binary mask per palette class as `<stem>__<class>.png`
///
/// Returns `(class name, path)` pairs in class id order.
///
/// # Errors
///
/// Returns an error if a directory cannot be created or a mask saved
pub fn export_class_masks(
    labels: &ClassLabelMap,
    palette: &ClassPalette,
    output_dir: &Path,
    stem: &str,
) -> Result<Vec<(String, PathBuf)>> {
    let mut exported = Vec::with_capacity(palette.len());
    for (class_id, entry) in (0..=u8::MAX).zip(palette.entries()) {
        let path = output_dir.join(format!("{stem}__{}.png", entry.name));
        save_gray(labels.binary_mask(class_id).view(), &path)?;
        exported.push((entry.name.clone(), path));
    }
    Ok(exported)
}
