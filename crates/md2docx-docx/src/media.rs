//! Image loading for embedded media parts.

use std::io::{Cursor, ErrorKind};
use std::path::Path;

use image::{ImageFormat, ImageReader};

use crate::error::AssemblyError;

/// Image bytes ready to be stored as `word/media/imageN.ext`.
#[derive(Debug)]
pub(crate) struct LoadedImage {
    pub data: Vec<u8>,
    pub extension: &'static str,
    pub width: u32,
    pub height: u32,
}

/// Read an image file, mapping filesystem errors to image-specific variants.
pub(crate) fn read_image_file(path: &Path) -> Result<Vec<u8>, AssemblyError> {
    std::fs::read(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => AssemblyError::ImageNotFound(path.to_path_buf()),
        ErrorKind::PermissionDenied => AssemblyError::ImageAccessDenied(path.to_path_buf()),
        _ => AssemblyError::Io {
            path: path.to_path_buf(),
            source,
        },
    })
}

/// Detect the format, read natural dimensions, and re-encode formats Word
/// cannot display natively.
pub(crate) fn load_image(data: Vec<u8>, name: &str) -> Result<LoadedImage, AssemblyError> {
    let dimension_error = |message: String| AssemblyError::ImageDimensions {
        name: name.to_owned(),
        message,
    };

    let format = image::guess_format(&data).map_err(|e| dimension_error(e.to_string()))?;
    let (width, height) = ImageReader::with_format(Cursor::new(&data), format)
        .into_dimensions()
        .map_err(|e| dimension_error(e.to_string()))?;
    if width == 0 || height == 0 {
        return Err(dimension_error("image has zero size".to_owned()));
    }

    let extension = match format {
        ImageFormat::Png => "png",
        ImageFormat::Jpeg => "jpeg",
        ImageFormat::Gif => "gif",
        ImageFormat::Bmp => "bmp",
        other => {
            tracing::debug!(name, format = ?other, "Re-encoding image as PNG");
            let decoded = image::load_from_memory_with_format(&data, other)
                .map_err(|e| dimension_error(e.to_string()))?;
            let mut png = Vec::new();
            decoded
                .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
                .map_err(|e| dimension_error(e.to_string()))?;
            return Ok(LoadedImage {
                data: png,
                extension: "png",
                width,
                height,
            });
        }
    };

    Ok(LoadedImage {
        data,
        extension,
        width,
        height,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use image::{DynamicImage, RgbaImage};

    use super::*;

    /// Encode a blank RGBA image of the given size.
    pub(crate) fn encoded_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let mut image = DynamicImage::ImageRgba8(RgbaImage::new(width, height));
        if format == ImageFormat::Jpeg {
            image = DynamicImage::ImageRgb8(image.to_rgb8());
        }
        let mut data = Vec::new();
        image.write_to(&mut Cursor::new(&mut data), format).unwrap();
        data
    }

    #[test]
    fn test_load_png_keeps_bytes() {
        let data = encoded_image(30, 20, ImageFormat::Png);
        let loaded = load_image(data.clone(), "a.png").unwrap();
        assert_eq!(loaded.extension, "png");
        assert_eq!((loaded.width, loaded.height), (30, 20));
        assert_eq!(loaded.data, data);
    }

    #[test]
    fn test_load_webp_reencodes_png() {
        let data = encoded_image(8, 4, ImageFormat::WebP);
        let loaded = load_image(data, "a.webp").unwrap();
        assert_eq!(loaded.extension, "png");
        assert_eq!((loaded.width, loaded.height), (8, 4));
        assert_eq!(image::guess_format(&loaded.data).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn test_load_garbage_is_dimension_error() {
        let err = load_image(b"definitely not an image".to_vec(), "x.png").unwrap_err();
        assert!(matches!(err, AssemblyError::ImageDimensions { .. }));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let err = read_image_file(Path::new("/nonexistent/img.png")).unwrap_err();
        assert!(matches!(err, AssemblyError::ImageNotFound(_)));
    }
}
