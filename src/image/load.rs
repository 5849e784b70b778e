//! Image loading utilities.

use std::path::Path;

use image::{DynamicImage, GenericImageView};

use crate::error::{Error, Result};

/// Load an image from disk.
///
/// Any format and channel layout the `image` crate can decode is accepted;
/// the pipeline converts to 8-bit RGB itself.
///
/// # Errors
///
/// Returns an error if the file cannot be read or decoded, or if the decoded
/// image has no pixels.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
    let path = path.as_ref();

    let img = image::open(path).map_err(|source| Error::ImageLoad {
        path: path.to_path_buf(),
        source,
    })?;

    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(Error::EmptyImage { width, height });
    }

    tracing::debug!("Loaded {} ({width}x{height}, {:?})", path.display(), img.color());
    Ok(img)
}
