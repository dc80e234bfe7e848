//! Decode collaborators.
//!
//! The loader never decodes anything itself: workers call a
//! [`ThumbnailDecoder`] for every request, optionally preceded by a
//! [`UserImageProvider`] that can substitute an application-supplied image.
//! [`FileDecoder`] is a ready-made decoder for path keys built on the
//! `image` crate.

use std::path::Path;

use bytes::Bytes;
use image::{DynamicImage, ImageDecoder, ImageReader};

use crate::error::{DecodeError, DecodeResult};
use crate::request::{Size, ThumbnailMode, UserImageRequest};

/// Produces an image for a request. May block and may fail.
///
/// Never called concurrently for the same key, but called concurrently for
/// different keys from several worker threads.
pub trait ThumbnailDecoder<K, I>: Send + Sync {
    fn decode(
        &self,
        key: &K,
        size: Size,
        thumbnail_mode: ThumbnailMode,
        auto_rotate: bool,
    ) -> DecodeResult<I>;
}

impl<K, I, F> ThumbnailDecoder<K, I> for F
where
    F: Fn(&K, Size, ThumbnailMode, bool) -> DecodeResult<I> + Send + Sync,
{
    fn decode(
        &self,
        key: &K,
        size: Size,
        thumbnail_mode: ThumbnailMode,
        auto_rotate: bool,
    ) -> DecodeResult<I> {
        self(key, size, thumbnail_mode, auto_rotate)
    }
}

/// Optional override consulted before decoding. Returning `Some` skips the
/// decoder and delivers the returned image instead.
pub trait UserImageProvider<K, I>: Send + Sync {
    fn user_image(&self, request: UserImageRequest<'_, K>) -> Option<I>;
}

impl<K, I, F> UserImageProvider<K, I> for F
where
    F: Fn(UserImageRequest<'_, K>) -> Option<I> + Send + Sync,
{
    fn user_image(&self, request: UserImageRequest<'_, K>) -> Option<I> {
        self(request)
    }
}

/// Decoded thumbnail pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    /// Raw RGBA8 pixel data, row-major.
    pub data: Bytes,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Thumbnail {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data: Bytes::from(data),
            width,
            height,
        }
    }

    /// Size in bytes.
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }
}

/// Decodes image files addressed by path-like keys.
///
/// Embedded thumbnail extraction is not supported, so
/// [`ThumbnailMode::PreferEmbedded`] falls back to a full decode and
/// [`ThumbnailMode::Always`] fails with
/// [`DecodeError::EmbeddedThumbnailUnavailable`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FileDecoder;

impl<K: AsRef<Path>> ThumbnailDecoder<K, Thumbnail> for FileDecoder {
    fn decode(
        &self,
        key: &K,
        size: Size,
        thumbnail_mode: ThumbnailMode,
        auto_rotate: bool,
    ) -> DecodeResult<Thumbnail> {
        match thumbnail_mode {
            ThumbnailMode::Always => Err(DecodeError::EmbeddedThumbnailUnavailable),
            ThumbnailMode::Never | ThumbnailMode::PreferEmbedded => {
                decode_thumbnail(key.as_ref(), size, auto_rotate)
            }
        }
    }
}

/// Decode an image file and scale it to fit within `size`.
///
/// Aspect ratio is preserved and images are never upscaled. An empty `size`
/// returns the image at full resolution. With `auto_rotate`, the orientation
/// recorded in the file's metadata is applied before scaling.
pub fn decode_thumbnail(path: &Path, size: Size, auto_rotate: bool) -> DecodeResult<Thumbnail> {
    let reader = ImageReader::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => DecodeError::NotFound {
            path: path.to_path_buf(),
        },
        _ => DecodeError::Io(e),
    })?;

    let mut decoder = reader.with_guessed_format()?.into_decoder()?;
    let orientation = decoder.orientation()?;
    let mut image = DynamicImage::from_decoder(decoder)?;

    if auto_rotate {
        image.apply_orientation(orientation);
    }

    let fits = image.width() <= size.width && image.height() <= size.height;
    if !size.is_empty() && !fits {
        image = image.thumbnail(size.width, size.height);
    }

    let (width, height) = (image.width(), image.height());
    Ok(Thumbnail::new(image.into_rgba8().into_raw(), width, height))
}
