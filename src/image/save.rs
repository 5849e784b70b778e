//! Image saving utilities.

use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbImage};

use crate::error::{Error, Result};

/// Save an RGB image, inferring the format from the path's extension.
///
/// The image is written to a temporary sibling file first and renamed into
/// place, so a failed save never leaves a partial file at `path`.
///
/// # Arguments
///
/// * `img` - Image to save
/// * `path` - Output file path
/// * `quality` - JPEG quality (1-100), ignored for other formats
///
/// # Errors
///
/// Returns an error if the extension is not a known image format or the
/// image cannot be encoded or written.
pub fn save_image<P: AsRef<Path>>(img: &RgbImage, path: P, quality: u8) -> Result<()> {
    stage_image(img, path, quality)?.commit()
}

/// Encode an image into a temporary sibling of `path` without touching
/// `path` itself.
///
/// The returned [`PendingSave`] moves the file into place on
/// [`PendingSave::commit`] and deletes it if dropped uncommitted.
///
/// # Errors
///
/// Returns an error if the extension is not a known image format or the
/// image cannot be encoded or written.
pub fn stage_image<P: AsRef<Path>>(img: &RgbImage, path: P, quality: u8) -> Result<PendingSave> {
    let path = path.as_ref();

    let format = ImageFormat::from_path(path).map_err(|source| Error::ImageSave {
        path: path.to_path_buf(),
        source,
    })?;

    let pending = PendingSave {
        temp_path: partial_path(path),
        path: path.to_path_buf(),
        committed: false,
    };
    write_encoded(img, &pending.temp_path, format, quality).map_err(|err| match err {
        Error::ImageSave { source, .. } => Error::ImageSave {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    })?;

    tracing::debug!("Encoded {} as {format:?}", path.display());
    Ok(pending)
}

/// An encoded image waiting in its temporary file.
#[derive(Debug)]
pub struct PendingSave {
    temp_path: PathBuf,
    path: PathBuf,
    committed: bool,
}

impl PendingSave {
    /// Final destination of the image.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically move the encoded image to its destination.
    ///
    /// # Errors
    ///
    /// Returns an error if the rename fails; the temporary file is removed.
    pub fn commit(mut self) -> Result<()> {
        fs::rename(&self.temp_path, &self.path)?;
        self.committed = true;
        tracing::debug!("Wrote {}", self.path.display());
        Ok(())
    }
}

impl Drop for PendingSave {
    fn drop(&mut self) {
        if !self.committed {
            // Best effort: the temporary file may not exist yet
            let _ = fs::remove_file(&self.temp_path);
        }
    }
}

fn write_encoded(img: &RgbImage, path: &Path, format: ImageFormat, quality: u8) -> Result<()> {
    let mut output = BufWriter::new(fs::File::create(path)?);

    let encoded = match format {
        ImageFormat::Jpeg => {
            let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut output, quality);
            img.write_with_encoder(encoder)
        }
        _ => img.write_to(&mut output, format),
    };
    encoded.map_err(|source| Error::ImageSave {
        path: path.to_path_buf(),
        source,
    })?;

    output
        .into_inner()
        .map_err(std::io::IntoInnerError::into_error)?
        .sync_all()?;
    Ok(())
}

/// `dir/name.ext` -> `dir/.name.ext.partial`
fn partial_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map_or_else(|| "output".into(), |n| n.to_string_lossy().into_owned());
    path.with_file_name(format!(".{name}.partial"))
}
