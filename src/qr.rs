// qr.rs
// QR images: decoding an uploaded screenshot into its text payload (behind an
// injectable trait) and rendering an otpauth URI to PNG for export.

use std::{io::Cursor, sync::Arc, time::Duration};

use anyhow::Result;
use image::{DynamicImage, ImageFormat, Luma};
use qrcode::QrCode;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::debug;

/// Decodes that may run on the blocking pool at once.
pub const MAX_CONCURRENT_DECODES: usize = 4;

#[derive(Debug, Error)]
pub enum QrError {
    #[error("unreadable image: {0}")]
    Image(String),
    #[error("no QR code found in image")]
    NotFound,
    #[error("QR code could not be decoded: {0}")]
    Decode(String),
    #[error("QR decoding timed out after {0:?}")]
    Timeout(Duration),
    #[error("QR decoding task failed: {0}")]
    Join(String),
    #[error("QR decoder is shut down")]
    Closed,
}

/// Turns image bytes into the text stored in the first QR code found.
pub trait QrDecoder: Send + Sync {
    fn decode(&self, image: &[u8]) -> Result<String, QrError>;
}

/// Default decoder: `image` to load any supported format, `rqrr` to locate
/// and read the grid.
#[derive(Debug, Default, Clone, Copy)]
pub struct RqrrDecoder;

impl QrDecoder for RqrrDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<String, QrError> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| QrError::Image(e.to_string()))?
            .to_luma8();
        let (width, height) = img.dimensions();
        let mut prepared =
            rqrr::PreparedImage::prepare_from_greyscale(width as usize, height as usize, |x, y| {
                img.get_pixel(x as u32, y as u32).0[0]
            });
        let grids = prepared.detect_grids();
        debug!(grids = grids.len(), width, height, "qr grids detected");

        let grid = grids.first().ok_or(QrError::NotFound)?;
        let (_meta, content) = grid.decode().map_err(|e| QrError::Decode(e.to_string()))?;
        Ok(content)
    }
}

/// Runs `decoder` on the blocking pool once one of `permits` is free; gives
/// up after `timeout`, counting the wait for a permit.
///
/// A timed-out decode cannot be cancelled and keeps running. It keeps its
/// permit until it returns, so stuck decodes never exceed the permit count.
pub async fn decode_with_timeout(
    decoder: Arc<dyn QrDecoder>,
    permits: Arc<Semaphore>,
    bytes: Vec<u8>,
    timeout: Duration,
) -> Result<String, QrError> {
    let work = async move {
        let permit = permits.acquire_owned().await.map_err(|_| QrError::Closed)?;
        tokio::task::spawn_blocking(move || {
            let result = decoder.decode(&bytes);
            drop(permit);
            result
        })
        .await
        .map_err(|join| QrError::Join(join.to_string()))?
    };
    match tokio::time::timeout(timeout, work).await {
        Ok(result) => result,
        Err(_) => Err(QrError::Timeout(timeout)),
    }
}

/// Renders `payload` as a PNG QR code.
pub fn render_png(payload: &str) -> Result<Vec<u8>> {
    let code = QrCode::new(payload.as_bytes())?;
    let img = code.render::<Luma<u8>>().min_dimensions(200, 200).build();

    // image 0.25: write_to requires Write + Seek -> Cursor<Vec<u8>>
    let mut cursor = Cursor::new(Vec::<u8>::new());
    DynamicImage::ImageLuma8(img).write_to(&mut cursor, ImageFormat::Png)?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    const URI: &str = "otpauth://totp/Google%20Ads:foo%40bar.com?secret=JBSWY3DPEHPK3PXP&issuer=Google%20Ads";

    #[derive(Default)]
    struct SlowDecoder {
        started: AtomicUsize,
    }

    impl QrDecoder for SlowDecoder {
        fn decode(&self, _image: &[u8]) -> Result<String, QrError> {
            self.started.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(500));
            Ok(String::new())
        }
    }

    fn permits(n: usize) -> Arc<Semaphore> {
        Arc::new(Semaphore::new(n))
    }

    #[test]
    fn rendered_code_decodes_back() {
        let png = render_png(URI).unwrap();
        assert_eq!(&png[1..4], b"PNG");
        assert_eq!(RqrrDecoder.decode(&png).unwrap(), URI);
    }

    #[test]
    fn garbage_bytes_are_an_image_error() {
        assert!(matches!(
            RqrrDecoder.decode(b"definitely not an image"),
            Err(QrError::Image(_))
        ));
    }

    #[test]
    fn blank_image_has_no_code() {
        let blank = image::GrayImage::from_pixel(64, 64, Luma([255u8]));
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageLuma8(blank)
            .write_to(&mut cursor, ImageFormat::Png)
            .unwrap();
        assert!(matches!(
            RqrrDecoder.decode(&cursor.into_inner()),
            Err(QrError::NotFound)
        ));
    }

    #[tokio::test]
    async fn slow_decoder_times_out() {
        let result = decode_with_timeout(
            Arc::new(SlowDecoder::default()),
            permits(1),
            Vec::new(),
            Duration::from_millis(20),
        )
        .await;
        assert!(matches!(result, Err(QrError::Timeout(_))));
    }

    #[tokio::test]
    async fn timed_out_decode_keeps_its_permit() {
        let decoder = Arc::new(SlowDecoder::default());
        let permits = permits(1);
        for _ in 0..3 {
            let result = decode_with_timeout(
                decoder.clone(),
                permits.clone(),
                Vec::new(),
                Duration::from_millis(20),
            )
            .await;
            assert!(matches!(result, Err(QrError::Timeout(_))));
        }
        // the later calls waited for the first, still running decode
        assert_eq!(decoder.started.load(Ordering::SeqCst), 1);
        assert_eq!(permits.available_permits(), 0);
    }

    #[tokio::test]
    async fn closed_permits_are_reported() {
        let permits = permits(1);
        permits.close();
        let result = decode_with_timeout(
            Arc::new(RqrrDecoder),
            permits,
            Vec::new(),
            Duration::from_secs(1),
        )
        .await;
        assert!(matches!(result, Err(QrError::Closed)));
    }

    #[tokio::test]
    async fn decode_runs_off_the_executor() {
        let png = render_png(URI).unwrap();
        let text = decode_with_timeout(Arc::new(RqrrDecoder), permits(1), png, Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(text, URI);
    }
}
