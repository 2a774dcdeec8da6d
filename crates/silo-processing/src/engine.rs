//! Transform engine.
//!
//! Decode, resize, and re-encode run inside `spawn_blocking` behind a
//! semaphore, keeping CPU-bound image work off the I/O request path and
//! bounding how many transforms run at once. A hard timeout wraps the whole
//! blocking stage.

use crate::formats::OutputFormat;
use crate::png_repair;
use crate::resize::ResizeDimensions;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("Failed to decode source image: {0}")]
    Decode(String),

    #[error("Failed to encode output image: {0}")]
    Encode(String),

    #[error("Source image has {pixels} pixels, limit is {max}")]
    SourceTooLarge { pixels: u64, max: u64 },

    #[error("Transform timed out")]
    Timeout,

    #[error("Transform worker failed: {0}")]
    Worker(String),
}

/// One transform to perform.
#[derive(Debug, Clone, Copy)]
pub struct TransformRequest {
    pub dimensions: ResizeDimensions,
    pub format: OutputFormat,
    /// 1-100; only meaningful for lossy formats.
    pub quality: u8,
}

#[derive(Debug, Clone)]
pub struct TransformEngineOptions {
    pub concurrency: usize,
    pub timeout: Duration,
    pub png_repair: bool,
    pub max_source_pixels: u64,
}

/// Bounded-concurrency image transform pipeline.
pub struct TransformEngine {
    permits: Arc<Semaphore>,
    timeout: Duration,
    png_repair: bool,
    max_source_pixels: u64,
}

impl TransformEngine {
    pub fn new(options: TransformEngineOptions) -> Self {
        TransformEngine {
            permits: Arc::new(Semaphore::new(options.concurrency.max(1))),
            timeout: options.timeout,
            png_repair: options.png_repair,
            max_source_pixels: options.max_source_pixels,
        }
    }

    /// Run the pipeline. Returns the encoded bytes and their MIME type.
    pub async fn transform(
        &self,
        source: Bytes,
        request: TransformRequest,
    ) -> Result<(Bytes, &'static str), TransformError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| TransformError::Worker("semaphore closed".to_string()))?;

        let png_repair = self.png_repair;
        let max_pixels = self.max_source_pixels;
        let start = std::time::Instant::now();

        // The permit travels with the blocking task: on timeout the task keeps
        // running to completion off-path, and its slot stays occupied until it
        // actually finishes, so the pool bound holds.
        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            render(&source, request, png_repair, max_pixels)
        });

        let result = match tokio::time::timeout(self.timeout, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => return Err(TransformError::Worker(join_err.to_string())),
            Err(_) => return Err(TransformError::Timeout),
        };

        if let Ok((ref bytes, content_type)) = result {
            tracing::debug!(
                output_bytes = bytes.len(),
                content_type = content_type,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Transform completed"
            );
        }
        result
    }
}

fn render(
    data: &[u8],
    request: TransformRequest,
    png_repair: bool,
    max_pixels: u64,
) -> Result<(Bytes, &'static str), TransformError> {
    let img = match decode(data, max_pixels) {
        Ok(img) => img,
        Err(TransformError::Decode(message))
            if png_repair && png_repair::looks_like_png(data) =>
        {
            let repaired =
                png_repair::repair_png(data).ok_or(TransformError::Decode(message))?;
            tracing::warn!("PNG decode failed; retrying after checksum repair");
            decode(&repaired, max_pixels)?
        }
        Err(err) => return Err(err),
    };

    let img = match request.dimensions.target_for(img.width(), img.height()) {
        Some((w, h)) => img.resize_exact(w, h, image::imageops::FilterType::Lanczos3),
        None => img,
    };

    let bytes = encode(&img, request.format, request.quality)?;
    Ok((bytes, request.format.to_mime_type()))
}

fn decode(data: &[u8], max_pixels: u64) -> Result<image::DynamicImage, TransformError> {
    // Check declared dimensions before committing to a full decode.
    let reader = image::ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| TransformError::Decode(e.to_string()))?;
    let (w, h) = reader
        .into_dimensions()
        .map_err(|e| TransformError::Decode(e.to_string()))?;
    let pixels = w as u64 * h as u64;
    if max_pixels != 0 && pixels > max_pixels {
        return Err(TransformError::SourceTooLarge {
            pixels,
            max: max_pixels,
        });
    }
    image::ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| TransformError::Decode(e.to_string()))?
        .decode()
        .map_err(|e| TransformError::Decode(e.to_string()))
}

fn encode(
    img: &image::DynamicImage,
    format: OutputFormat,
    quality: u8,
) -> Result<Bytes, TransformError> {
    let quality = quality.clamp(1, 100);
    match format {
        OutputFormat::Jpeg => {
            let mut buf = Vec::new();
            let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut buf), quality);
            img.to_rgb8()
                .write_with_encoder(encoder)
                .map_err(|e| TransformError::Encode(e.to_string()))?;
            Ok(Bytes::from(buf))
        }
        OutputFormat::Png => {
            let mut buf = Vec::new();
            img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
                .map_err(|e| TransformError::Encode(e.to_string()))?;
            Ok(Bytes::from(buf))
        }
        OutputFormat::WebP => {
            let rgba = img.to_rgba8();
            let encoder = webp::Encoder::from_rgba(&rgba, rgba.width(), rgba.height());
            let encoded = encoder.encode(quality as f32);
            Ok(Bytes::copy_from_slice(&encoded))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(png_repair: bool) -> TransformEngine {
        TransformEngine::new(TransformEngineOptions {
            concurrency: 2,
            timeout: Duration::from_secs(10),
            png_repair,
            max_source_pixels: 40_000_000,
        })
    }

    fn test_png(w: u32, h: u32) -> Bytes {
        let img = image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            w,
            h,
            image::Rgba([10, 20, 30, 255]),
        ));
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        Bytes::from(out)
    }

    fn request(w: Option<u32>, h: Option<u32>, format: OutputFormat) -> TransformRequest {
        TransformRequest {
            dimensions: ResizeDimensions { width: w, height: h },
            format,
            quality: 80,
        }
    }

    #[tokio::test]
    async fn test_resize_and_reencode_jpeg() {
        let (bytes, content_type) = engine(false)
            .transform(test_png(400, 200), request(Some(100), Some(100), OutputFormat::Jpeg))
            .await
            .unwrap();
        assert_eq!(content_type, "image/jpeg");
        let out = image::load_from_memory(&bytes).unwrap();
        assert_eq!((out.width(), out.height()), (100, 50));
    }

    #[tokio::test]
    async fn test_missing_dimension_derived() {
        let (bytes, _) = engine(false)
            .transform(test_png(400, 200), request(Some(100), None, OutputFormat::Png))
            .await
            .unwrap();
        let out = image::load_from_memory(&bytes).unwrap();
        assert_eq!((out.width(), out.height()), (100, 50));
    }

    #[tokio::test]
    async fn test_webp_output() {
        let (bytes, content_type) = engine(false)
            .transform(test_png(16, 16), request(Some(8), None, OutputFormat::WebP))
            .await
            .unwrap();
        assert_eq!(content_type, "image/webp");
        assert_eq!(&bytes[..4], b"RIFF");
    }

    #[tokio::test]
    async fn test_decode_failure() {
        let err = engine(false)
            .transform(
                Bytes::from_static(b"definitely not an image"),
                request(None, None, OutputFormat::Jpeg),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TransformError::Decode(_)));
    }

    #[tokio::test]
    async fn test_png_repair_retry() {
        let mut data = test_png(1, 1).to_vec();
        let crc_offset = 8 + 4 + 4 + 13; // IHDR CRC
        data[crc_offset] ^= 0xFF;
        let data = Bytes::from(data);

        let err = engine(false)
            .transform(data.clone(), request(None, None, OutputFormat::Png))
            .await
            .unwrap_err();
        assert!(matches!(err, TransformError::Decode(_)));

        let (bytes, _) = engine(true)
            .transform(data, request(None, None, OutputFormat::Png))
            .await
            .unwrap();
        assert!(image::load_from_memory(&bytes).is_ok());
    }

    #[tokio::test]
    async fn test_timeout_keeps_slot_occupied_until_worker_finishes() {
        let engine = TransformEngine::new(TransformEngineOptions {
            concurrency: 1,
            timeout: Duration::from_millis(1),
            png_repair: false,
            max_source_pixels: 0,
        });
        let err = engine
            .transform(test_png(1500, 1500), request(Some(50), None, OutputFormat::Png))
            .await
            .unwrap_err();
        assert!(matches!(err, TransformError::Timeout));

        // The abandoned worker keeps its permit while it runs down.
        assert_eq!(engine.permits.available_permits(), 0);

        // Once it finishes, the slot frees up again.
        let mut waited = Duration::ZERO;
        while engine.permits.available_permits() == 0 && waited < Duration::from_secs(30) {
            tokio::time::sleep(Duration::from_millis(20)).await;
            waited += Duration::from_millis(20);
        }
        assert_eq!(engine.permits.available_permits(), 1);
    }

    #[tokio::test]
    async fn test_source_pixel_limit() {
        let engine = TransformEngine::new(TransformEngineOptions {
            concurrency: 1,
            timeout: Duration::from_secs(10),
            png_repair: false,
            max_source_pixels: 100,
        });
        let err = engine
            .transform(test_png(20, 20), request(Some(10), None, OutputFormat::Png))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransformError::SourceTooLarge { pixels: 400, max: 100 }
        ));
    }
}
