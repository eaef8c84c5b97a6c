use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use uuid::Uuid;

use assigme_shared::clients::minio::MinioClient;
use assigme_shared::errors::{AppError, ErrorCode};

pub const MAX_IMAGES_PER_ANNONCE: i64 = 5;
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
pub const MIN_DIMENSION: u32 = 200;

const JPEG_QUALITY: u8 = 80;

/// Bounding boxes of the three stored representations. Images are
/// fitted inside, aspect ratio kept, never enlarged.
const THUMBNAIL_BOX: (u32, u32) = (150, 150);
const MEDIUM_BOX: (u32, u32) = (800, 600);
const LARGE_BOX: (u32, u32) = (1920, 1080);

/// Public URLs of the three stored representations of one upload.
#[derive(Debug, Clone)]
pub struct ImageVariants {
    pub thumbnail: String,
    pub medium: String,
    pub large: String,
}

/// JPEG-encoded bytes of the three representations, ready for storage.
#[derive(Debug)]
pub struct EncodedVariants {
    pub thumbnail: Vec<u8>,
    pub medium: Vec<u8>,
    pub large: Vec<u8>,
}

pub fn validate_upload(content_type: &str, size: usize) -> Result<(), AppError> {
    match content_type {
        "image/jpeg" | "image/jpg" | "image/png" | "image/webp" => {}
        _ => {
            return Err(AppError::new(
                ErrorCode::UnsupportedImageFormat,
                "format non supporté, acceptés: jpeg, png, webp",
            ));
        }
    }

    if size > MAX_IMAGE_BYTES {
        return Err(AppError::new(
            ErrorCode::ImageTooLarge,
            "image trop volumineuse (max 5MB)",
        ));
    }

    Ok(())
}

/// Decode an upload and derive the three variants. CPU-bound; callers
/// run it on a blocking task.
pub fn process_image(data: &[u8]) -> Result<EncodedVariants, AppError> {
    let img = image::load_from_memory(data).map_err(|_| {
        AppError::new(ErrorCode::UnsupportedImageFormat, "image illisible")
    })?;

    if img.width() < MIN_DIMENSION || img.height() < MIN_DIMENSION {
        return Err(AppError::new(
            ErrorCode::ValidationError,
            "dimensions minimales: 200x200px",
        ));
    }

    Ok(EncodedVariants {
        thumbnail: encode_resized(&img, THUMBNAIL_BOX)?,
        medium: encode_resized(&img, MEDIUM_BOX)?,
        large: encode_resized(&img, LARGE_BOX)?,
    })
}

fn encode_resized(img: &DynamicImage, (max_w, max_h): (u32, u32)) -> Result<Vec<u8>, AppError> {
    let resized = if img.width() <= max_w && img.height() <= max_h {
        img.clone()
    } else {
        img.resize(max_w, max_h, FilterType::Lanczos3)
    };

    // JPEG carries no alpha channel.
    let rgb = resized.to_rgb8();
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY)
        .encode_image(&rgb)
        .map_err(|e| AppError::internal(format!("image encoding failed: {e}")))?;
    Ok(buf)
}

/// Store the three variants and return their public URLs.
pub async fn store_variants(
    minio: &MinioClient,
    annonce_id: Uuid,
    encoded: &EncodedVariants,
) -> Result<ImageVariants, AppError> {
    let file_id = Uuid::new_v4();

    let stored = |variant: &'static str, bytes: &Vec<u8>| {
        let key = format!("annonces/{annonce_id}/{variant}_{file_id}.jpg");
        let bytes = bytes.clone();
        async move {
            minio
                .upload(&key, bytes, "image/jpeg")
                .await
                .map_err(AppError::internal)
        }
    };

    Ok(ImageVariants {
        thumbnail: stored("thumbnail", &encoded.thumbnail).await?,
        medium: stored("medium", &encoded.medium).await?,
        large: stored("large", &encoded.large).await?,
    })
}

/// Remove the stored variants of an image row. Storage failures are
/// logged, not surfaced: the row delete must still go through.
pub async fn delete_variants(minio: &MinioClient, urls: [&str; 3]) {
    for url in urls {
        if let Err(e) = minio.delete(url).await {
            tracing::warn!(url = %url, error = %e, "failed to delete stored image variant");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GenericImageView;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            width,
            height,
            image::Rgb([120u8, 40, 40]),
        ));
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn accepted_content_types() {
        assert!(validate_upload("image/jpeg", 1024).is_ok());
        assert!(validate_upload("image/png", 1024).is_ok());
        assert!(validate_upload("image/webp", 1024).is_ok());
        assert!(validate_upload("image/gif", 1024).is_err());
    }

    #[test]
    fn oversized_upload_is_rejected() {
        assert!(validate_upload("image/jpeg", MAX_IMAGE_BYTES + 1).is_err());
        assert!(validate_upload("image/jpeg", MAX_IMAGE_BYTES).is_ok());
    }

    #[test]
    fn variants_are_resized_into_their_boxes() {
        let encoded = process_image(&png_bytes(1000, 500)).unwrap();

        let thumb = image::load_from_memory(&encoded.thumbnail).unwrap();
        assert!(thumb.width() <= 150 && thumb.height() <= 150);
        // Aspect ratio survives the fit.
        assert_eq!(thumb.width(), 150);
        assert_eq!(thumb.height(), 75);

        let medium = image::load_from_memory(&encoded.medium).unwrap();
        assert!(medium.width() <= 800 && medium.height() <= 600);

        let large = image::load_from_memory(&encoded.large).unwrap();
        assert_eq!(large.dimensions(), (1000, 500));
    }

    #[test]
    fn small_source_is_never_enlarged() {
        let encoded = process_image(&png_bytes(300, 300)).unwrap();
        let medium = image::load_from_memory(&encoded.medium).unwrap();
        assert_eq!(medium.dimensions(), (300, 300));
    }

    #[test]
    fn undersized_image_is_rejected() {
        assert!(process_image(&png_bytes(100, 100)).is_err());
    }

    #[test]
    fn garbage_bytes_are_rejected() {
        assert!(process_image(b"not an image").is_err());
    }
}
