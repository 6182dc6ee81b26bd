use std::io::Cursor;

use bytes::Bytes;
use image::{ImageFormat, ImageReader};
use uuid::Uuid;

use crate::error::ApiError;
use crate::storage::StorageClient;

/// Upload size cap for recipe images.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Accepted image formats.
const ALLOWED_FORMATS: &[ImageFormat] = &[
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::Gif,
    ImageFormat::WebP,
];

/// Check the payload decodes as an allowed image and return its format.
pub fn validate(data: &[u8]) -> Result<ImageFormat, ApiError> {
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| ApiError::validation(format!("failed to read image: {}", e)))?;

    let format = reader
        .format()
        .ok_or_else(|| ApiError::validation("could not detect image format"))?;

    if !ALLOWED_FORMATS.contains(&format) {
        return Err(ApiError::validation(format!(
            "unsupported image format: {:?}; allowed: JPEG, PNG, GIF, WebP",
            format
        )));
    }

    reader
        .decode()
        .map_err(|_| ApiError::validation("upload is not a decodable image"))?;

    Ok(format)
}

/// Storage key for a recipe image: a fresh uuid plus the extension of
/// the client's original filename. The client name itself never reaches
/// the store, so keys cannot collide or carry path segments.
pub fn image_path(id: Uuid, original_filename: Option<&str>, format: ImageFormat) -> String {
    let ext = original_filename
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .unwrap_or_else(|| {
            format
                .extensions_str()
                .first()
                .copied()
                .unwrap_or("img")
                .to_string()
        });
    format!("uploads/recipe/{}.{}", id, ext)
}

/// Validate and store an uploaded image, returning the generated key.
pub async fn store(
    storage: &dyn StorageClient,
    original_filename: Option<&str>,
    data: Bytes,
) -> Result<String, ApiError> {
    let format = validate(&data)?;
    let key = image_path(Uuid::new_v4(), original_filename, format);
    storage
        .put_object(&key, data, format.to_mime_type())
        .await
        .map_err(ApiError::Internal)?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::testing::MemoryStorage;

    fn png_bytes() -> Vec<u8> {
        let img = image::DynamicImage::ImageRgba8(image::RgbaImage::new(1, 1));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn validate_rejects_non_image_bytes() {
        let err = validate(b"not an image").unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn validate_accepts_encoded_png() {
        assert_eq!(validate(&png_bytes()).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn image_path_uses_uuid_and_original_extension() {
        let id = Uuid::parse_str("9f4ded0e-0fa1-4f3c-8a63-2a1c1f25b3d4").unwrap();
        assert_eq!(
            image_path(id, Some("myimage.jpg"), ImageFormat::Png),
            format!("uploads/recipe/{}.jpg", id)
        );
    }

    #[test]
    fn image_path_falls_back_to_format_extension() {
        let id = Uuid::parse_str("9f4ded0e-0fa1-4f3c-8a63-2a1c1f25b3d4").unwrap();
        assert_eq!(
            image_path(id, Some("noext"), ImageFormat::Png),
            format!("uploads/recipe/{}.png", id)
        );
        assert_eq!(
            image_path(id, None, ImageFormat::Jpeg),
            format!("uploads/recipe/{}.jpg", id)
        );
    }

    #[tokio::test]
    async fn store_writes_object_under_generated_key() {
        let storage = MemoryStorage::default();
        let key = store(&storage, Some("photo.png"), Bytes::from(png_bytes()))
            .await
            .unwrap();
        assert!(key.starts_with("uploads/recipe/"));
        assert!(key.ends_with(".png"));
        assert!(storage.contains(&key));
    }

    #[tokio::test]
    async fn store_rejects_garbage_without_touching_storage() {
        let storage = MemoryStorage::default();
        let err = store(&storage, Some("x.jpg"), Bytes::from_static(b"garbage"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert_eq!(storage.len(), 0);
    }
}
