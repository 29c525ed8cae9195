use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{imageops, DynamicImage, GenericImageView, ImageBuffer, Rgb, RgbImage, Rgba, RgbaImage};

use super::save::SaveStrategy;
use crate::api::PageClient;
use crate::domain::{ImageTask, TaskFailure, TaskOutcome};

pub const JPEG_QUALITY: u8 = 90;
/// Largest side a drawing surface may have.
pub const MAX_SURFACE_SIDE: u32 = 32_767;
/// Largest pixel count a drawing surface may have.
pub const MAX_SURFACE_AREA: u64 = 268_435_456;

/// Anything that can hand back the raw bytes of an image source.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn load(&self, source: &str) -> crate::api::Result<Bytes>;
}

#[async_trait]
impl ImageSource for PageClient {
    async fn load(&self, source: &str) -> crate::api::Result<Bytes> {
        self.fetch_image(source).await
    }
}

/// load -> rasterize -> encode -> save for a single image.
pub struct ImagePipeline {
    source: Arc<dyn ImageSource>,
    saver: SaveStrategy,
    quality: u8,
    load_timeout: Option<Duration>,
}

impl ImagePipeline {
    pub fn new(
        source: Arc<dyn ImageSource>,
        saver: SaveStrategy,
        quality: u8,
        load_timeout: Option<Duration>,
    ) -> Self {
        Self {
            source,
            saver,
            quality,
            load_timeout,
        }
    }

    /// Run one task to completion. Never fails: every error ends up in the
    /// returned outcome.
    pub async fn process(&self, task: ImageTask) -> TaskOutcome {
        match self.transfer(&task).await {
            Ok(()) => TaskOutcome::Done { index: task.index },
            Err(failure) => {
                tracing::warn!(
                    index = task.index,
                    source = %task.source,
                    error = %failure,
                    "image failed"
                );
                TaskOutcome::Failed {
                    index: task.index,
                    failure,
                }
            }
        }
    }

    async fn transfer(&self, task: &ImageTask) -> Result<(), TaskFailure> {
        let bytes = self.load(&task.source).await?;

        let quality = self.quality;
        let jpeg = tokio::task::spawn_blocking(move || {
            let image = decode(&bytes)?;
            let surface = rasterize(&image)?;
            encode_jpeg(&surface, quality)
        })
        .await
        .map_err(|e| TaskFailure::Encode(e.to_string()))??;

        // a failed save still counts as done
        match self.saver.persist(&jpeg, &task.filename).await {
            Ok(via) => tracing::debug!(index = task.index, ?via, "image saved"),
            Err(e) => tracing::warn!(
                index = task.index,
                filename = %task.filename,
                error = %e,
                "save reported an error"
            ),
        }
        Ok(())
    }

    async fn load(&self, source: &str) -> Result<Bytes, TaskFailure> {
        let load = self.source.load(source);
        let result = match self.load_timeout {
            Some(limit) => tokio::time::timeout(limit, load)
                .await
                .map_err(|_| TaskFailure::LoadTimeout(limit))?,
            None => load.await,
        };
        result.map_err(|e| TaskFailure::Load(e.to_string()))
    }
}

/// An undecodable body is a load failure, same as a broken link.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, TaskFailure> {
    image::load_from_memory(bytes).map_err(|e| TaskFailure::Load(e.to_string()))
}

pub fn check_surface(width: u32, height: u32) -> Result<(), TaskFailure> {
    if width > MAX_SURFACE_SIDE || height > MAX_SURFACE_SIDE {
        return Err(TaskFailure::Draw(format!(
            "{}x{} exceeds the {} pixel side limit",
            width, height, MAX_SURFACE_SIDE
        )));
    }
    if u64::from(width) * u64::from(height) > MAX_SURFACE_AREA {
        return Err(TaskFailure::Draw(format!(
            "{}x{} exceeds the surface area limit",
            width, height
        )));
    }
    Ok(())
}

/// Draw the image at the origin of a transparent surface of its natural size.
pub fn rasterize(image: &DynamicImage) -> Result<RgbaImage, TaskFailure> {
    let (width, height) = image.dimensions();
    check_surface(width, height)?;

    let mut surface = RgbaImage::new(width, height);
    imageops::overlay(&mut surface, &image.to_rgba8(), 0, 0);
    Ok(surface)
}

/// JPEG has no alpha; transparent pixels come out black.
pub fn encode_jpeg(surface: &RgbaImage, quality: u8) -> Result<Bytes, TaskFailure> {
    let (width, height) = surface.dimensions();
    if width == 0 || height == 0 {
        return Err(TaskFailure::Encode("surface has no pixels".to_string()));
    }

    let flattened: RgbImage = ImageBuffer::from_fn(width, height, |x, y| {
        let Rgba([r, g, b, a]) = *surface.get_pixel(x, y);
        let premultiply = |c: u8| ((u16::from(c) * u16::from(a) + 127) / 255) as u8;
        Rgb([premultiply(r), premultiply(g), premultiply(b)])
    });

    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode_image(&flattened)
        .map_err(|e| TaskFailure::Encode(e.to_string()))?;
    Ok(Bytes::from(buf))
}
