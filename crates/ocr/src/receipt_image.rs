use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;

/// Longest side we upload as-is. Larger photos are scaled down first.
pub const DEFAULT_MAX_SIDE: u32 = 2800;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to load image: {0}")]
    Load(#[from] image::ImageError),
    #[error("Failed to encode processed image: {0}")]
    Encode(String),
}

/// A decoded receipt photo: the bytes we send to the models plus the
/// dimensions the word boxes are estimated against.
#[derive(Debug, Clone)]
pub struct ReceiptImage {
    bytes: Vec<u8>,
    width: u32,
    height: u32,
    mime: &'static str,
}

impl ReceiptImage {
    /// Read and decode an image file.
    pub async fn load(path: &Path, max_side: u32) -> Result<Self, ImageError> {
        let data = tokio::fs::read(path).await?;
        Self::from_bytes(data, max_side)
    }

    /// Decode raw JPEG / PNG / WEBP / … bytes. Images with a side longer than
    /// `max_side` are resized to fit and re-encoded as PNG.
    pub fn from_bytes(data: Vec<u8>, max_side: u32) -> Result<Self, ImageError> {
        let format = image::guess_format(&data)?;
        let img = image::load_from_memory_with_format(&data, format)?;

        if img.width() > max_side || img.height() > max_side {
            let resized = img.resize(max_side, max_side, image::imageops::FilterType::Lanczos3);
            tracing::debug!(
                from_width = img.width(),
                from_height = img.height(),
                to_width = resized.width(),
                to_height = resized.height(),
                "Downscaled receipt image"
            );
            let (width, height) = (resized.width(), resized.height());
            return Ok(Self {
                bytes: encode_as_png(&resized)?,
                width,
                height,
                mime: ImageFormat::Png.to_mime_type(),
            });
        }

        Ok(Self {
            width: img.width(),
            height: img.height(),
            mime: format.to_mime_type(),
            bytes: data,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn mime(&self) -> &'static str {
        self.mime
    }

    /// Inline the image as a `data:` URI, the form the inference API accepts
    /// for file inputs.
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }
}

fn encode_as_png(img: &DynamicImage) -> Result<Vec<u8>, ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| ImageError::Encode(e.to_string()))?;
    Ok(buf)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{GrayImage, ImageBuffer, Luma};

    pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img: GrayImage = ImageBuffer::from_fn(width, height, |x, _| {
            Luma([(x * 255 / width.max(1)) as u8])
        });
        let mut buf = Vec::new();
        DynamicImage::ImageLuma8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn small_image_keeps_original_bytes() {
        let data = png_bytes(40, 20);
        let img = ReceiptImage::from_bytes(data.clone(), DEFAULT_MAX_SIDE).unwrap();
        assert_eq!(img.width(), 40);
        assert_eq!(img.height(), 20);
        assert_eq!(img.mime(), "image/png");
        assert_eq!(img.bytes(), data.as_slice());
    }

    #[test]
    fn large_image_is_resized_to_fit() {
        let img = ReceiptImage::from_bytes(png_bytes(300, 150), 100).unwrap();
        assert_eq!(img.width(), 100);
        assert_eq!(img.height(), 50);
        assert_eq!(&img.bytes()[..4], b"\x89PNG");
    }

    #[test]
    fn data_uri_has_mime_and_base64_payload() {
        let img = ReceiptImage::from_bytes(png_bytes(4, 4), DEFAULT_MAX_SIDE).unwrap();
        let uri = img.to_data_uri();
        let payload = uri.strip_prefix("data:image/png;base64,").unwrap();
        assert_eq!(STANDARD.decode(payload).unwrap(), img.bytes());
    }

    #[test]
    fn garbage_bytes_are_rejected() {
        let err = ReceiptImage::from_bytes(b"definitely not an image".to_vec(), 100).unwrap_err();
        assert!(matches!(err, ImageError::Load(_)));
    }

    #[tokio::test]
    async fn load_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("receipt.png");
        std::fs::write(&path, png_bytes(8, 16)).unwrap();

        let img = ReceiptImage::load(&path, DEFAULT_MAX_SIDE).await.unwrap();
        assert_eq!((img.width(), img.height()), (8, 16));
    }

    #[tokio::test]
    async fn load_missing_file_is_io_error() {
        let err = ReceiptImage::load(Path::new("/nonexistent/receipt.jpg"), 100)
            .await
            .unwrap_err();
        assert!(matches!(err, ImageError::Io(_)));
    }
}
