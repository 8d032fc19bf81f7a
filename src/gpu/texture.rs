//! Texture Images
//!
//! [`TextureImage`] holds decoded pixel data on the CPU side together with an
//! optional GPU handle. Decoding preserves the file's channel count and
//! detects HDR sources, which upload as 32-bit float storage instead of
//! 8-bit normalized. Upload happens at most once per image; the CPU copy can
//! be released afterwards to keep only the GPU side alive.
//!
//! Images are shared through [`crate::assets::TextureCache`], so GPU-state
//! mutation goes through interior mutability rather than `&mut` access.

use std::cell::{Cell, RefCell};

use glow::{HasContext, PixelUnpackData};
use image::{DynamicImage, ImageReader};

use crate::context::RenderContext;
use crate::errors::{NimbusError, Result};
use crate::gpu::gl_enum_i32;

/// Wrap and filter parameters applied at upload time.
///
/// A mipmap-selecting `min_filter` makes the upload generate the full mip
/// chain before the texture is first used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sampling {
    pub wrap: u32,
    pub min_filter: u32,
    pub mag_filter: u32,
}

impl Default for Sampling {
    fn default() -> Self {
        Self {
            wrap: glow::REPEAT,
            min_filter: glow::LINEAR,
            mag_filter: glow::LINEAR,
        }
    }
}

impl Sampling {
    /// Whether the minification filter samples mip levels.
    #[must_use]
    pub fn uses_mipmaps(&self) -> bool {
        matches!(
            self.min_filter,
            glow::NEAREST_MIPMAP_NEAREST
                | glow::LINEAR_MIPMAP_NEAREST
                | glow::NEAREST_MIPMAP_LINEAR
                | glow::LINEAR_MIPMAP_LINEAR
        )
    }
}

/// Decoded pixels in the layout they will be transferred in.
enum PixelData {
    Bytes(Vec<u8>),
    Floats(Vec<f32>),
}

/// Sized internal format and matching transfer format for a channel count.
///
/// HDR images store one 32-bit float per channel, everything else 8-bit
/// normalized. Channel counts outside 2..=4 fall back to single-channel red.
pub(crate) fn storage_format(channels: i32, hdr: bool) -> (i32, u32) {
    let internal = if hdr {
        match channels {
            4 => glow::RGBA32F,
            3 => glow::RGB32F,
            2 => glow::RG32F,
            _ => glow::R32F,
        }
    } else {
        match channels {
            4 => glow::RGBA8,
            3 => glow::RGB8,
            2 => glow::RG8,
            _ => glow::R8,
        }
    };
    let transfer = match channels {
        4 => glow::RGBA,
        3 => glow::RGB,
        2 => glow::RG,
        _ => glow::RED,
    };
    (gl_enum_i32(internal), transfer)
}

/// A decoded image and its at-most-one GPU texture.
pub struct TextureImage {
    width: i32,
    height: i32,
    channels: i32,
    hdr: bool,
    data: RefCell<Option<PixelData>>,
    handle: Cell<Option<glow::Texture>>,
}

impl TextureImage {
    /// Decode an image file, flipped vertically so row 0 is the bottom row.
    ///
    /// The source channel count is preserved; radiance HDR files decode to
    /// float data and are flagged as HDR.
    ///
    /// # Errors
    ///
    /// [`NimbusError::ImageDecodeError`] when the file cannot be opened or
    /// its content does not decode.
    #[expect(clippy::cast_possible_wrap)]
    pub fn from_file(path: &str) -> Result<Self> {
        let decode_err = |reason: String| NimbusError::ImageDecodeError {
            path: path.to_owned(),
            reason,
        };
        let reader = ImageReader::open(path)
            .map_err(|e| decode_err(e.to_string()))?
            .with_guessed_format()
            .map_err(|e| decode_err(e.to_string()))?;
        let decoded = reader.decode().map_err(|e| decode_err(e.to_string()))?.flipv();

        let width = decoded.width() as i32;
        let height = decoded.height() as i32;
        let (channels, data) = match decoded {
            DynamicImage::ImageLuma8(img) => (1, PixelData::Bytes(img.into_raw())),
            DynamicImage::ImageLumaA8(img) => (2, PixelData::Bytes(img.into_raw())),
            DynamicImage::ImageRgb8(img) => (3, PixelData::Bytes(img.into_raw())),
            DynamicImage::ImageRgba8(img) => (4, PixelData::Bytes(img.into_raw())),
            DynamicImage::ImageRgb32F(img) => (3, PixelData::Floats(img.into_raw())),
            DynamicImage::ImageRgba32F(img) => (4, PixelData::Floats(img.into_raw())),
            // Deeper-than-8-bit integer formats are narrowed, keeping the
            // channel count.
            other => match i32::from(other.color().channel_count()) {
                1 => (1, PixelData::Bytes(other.into_luma8().into_raw())),
                2 => (2, PixelData::Bytes(other.into_luma_alpha8().into_raw())),
                3 => (3, PixelData::Bytes(other.into_rgb8().into_raw())),
                _ => (4, PixelData::Bytes(other.into_rgba8().into_raw())),
            },
        };
        let hdr = matches!(data, PixelData::Floats(_));

        Ok(Self {
            width,
            height,
            channels,
            hdr,
            data: RefCell::new(Some(data)),
            handle: Cell::new(None),
        })
    }

    /// Wrap raw float pixels as an HDR image, `channels` values per pixel in
    /// row-major order.
    #[must_use]
    pub fn from_raw(data: Vec<f32>, width: i32, height: i32, channels: i32) -> Self {
        debug_assert_eq!(data.len(), (width * height * channels) as usize);
        Self {
            width,
            height,
            channels,
            hdr: true,
            data: RefCell::new(Some(PixelData::Floats(data))),
            handle: Cell::new(None),
        }
    }

    /// Upload the pixels as a 2D texture, once.
    ///
    /// The first call creates the texture with storage chosen from the
    /// channel count and HDR flag; later calls return the same handle without
    /// touching GL state. Rows are transferred tightly packed.
    ///
    /// # Errors
    ///
    /// [`NimbusError::ResourceAllocError`] when the driver refuses a texture
    /// object or the CPU pixels were already released.
    pub fn upload(&self, ctx: &RenderContext, sampling: Sampling) -> Result<glow::Texture> {
        if let Some(handle) = self.handle.get() {
            return Ok(handle);
        }
        let data = self.data.borrow();
        let Some(pixels) = data.as_ref() else {
            return Err(NimbusError::ResourceAllocError {
                what: "texture",
                reason: "pixel data already released".to_owned(),
            });
        };

        let gl = ctx.gl();
        let texture =
            unsafe { gl.create_texture() }.map_err(|reason| NimbusError::ResourceAllocError {
                what: "texture",
                reason,
            })?;
        let (internal, transfer) = storage_format(self.channels, self.hdr);
        unsafe {
            gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            apply_sampling(gl, glow::TEXTURE_2D, sampling);
            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            gl.pixel_store_i32(glow::UNPACK_ROW_LENGTH, 0);
            gl.pixel_store_i32(glow::UNPACK_SKIP_PIXELS, 0);
            gl.pixel_store_i32(glow::UNPACK_SKIP_ROWS, 0);
            let (ty, bytes): (u32, &[u8]) = match pixels {
                PixelData::Bytes(b) => (glow::UNSIGNED_BYTE, b),
                PixelData::Floats(f) => (glow::FLOAT, bytemuck::cast_slice(f)),
            };
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                internal,
                self.width,
                self.height,
                0,
                transfer,
                ty,
                PixelUnpackData::Slice(Some(bytes)),
            );
            if sampling.uses_mipmaps() {
                gl.generate_mipmap(glow::TEXTURE_2D);
            }
            gl.bind_texture(glow::TEXTURE_2D, None);
        }
        self.handle.set(Some(texture));
        Ok(texture)
    }

    /// Drop the CPU-side pixels, keeping any uploaded texture.
    pub fn release_data(&self) {
        *self.data.borrow_mut() = None;
    }

    /// Whether the CPU-side pixels are still held.
    #[must_use]
    pub fn has_data(&self) -> bool {
        self.data.borrow().is_some()
    }

    /// The uploaded texture, if [`upload`](Self::upload) has run.
    #[must_use]
    pub fn handle(&self) -> Option<glow::Texture> {
        self.handle.get()
    }

    #[must_use]
    pub fn width(&self) -> i32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> i32 {
        self.height
    }

    #[must_use]
    pub fn channels(&self) -> i32 {
        self.channels
    }

    #[must_use]
    pub fn is_hdr(&self) -> bool {
        self.hdr
    }

    /// Delete the GPU texture, if any. A later [`upload`](Self::upload) would
    /// need the CPU pixels to still be held.
    pub fn release(&self, ctx: &RenderContext) {
        if let Some(handle) = self.handle.take() {
            unsafe {
                ctx.gl().delete_texture(handle);
            }
        }
    }
}

impl std::fmt::Debug for TextureImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("channels", &self.channels)
            .field("hdr", &self.hdr)
            .field("uploaded", &self.handle.get().is_some())
            .finish_non_exhaustive()
    }
}

/// Upload raw float pixels as a 3D texture, `channels` values per texel.
///
/// Unlike [`TextureImage`], nothing is retained: the caller owns the returned
/// handle.
///
/// # Errors
///
/// [`NimbusError::ResourceAllocError`] when the driver refuses a texture
/// object.
pub fn upload_raw_3d(
    ctx: &RenderContext,
    data: &[f32],
    width: i32,
    height: i32,
    depth: i32,
    channels: i32,
    sampling: Sampling,
) -> Result<glow::Texture> {
    debug_assert_eq!(data.len(), (width * height * depth * channels) as usize);
    let gl = ctx.gl();
    let texture =
        unsafe { gl.create_texture() }.map_err(|reason| NimbusError::ResourceAllocError {
            what: "3d texture",
            reason,
        })?;
    let (internal, transfer) = storage_format(channels, true);
    unsafe {
        gl.bind_texture(glow::TEXTURE_3D, Some(texture));
        apply_sampling(gl, glow::TEXTURE_3D, sampling);
        gl.tex_parameter_i32(glow::TEXTURE_3D, glow::TEXTURE_WRAP_R, gl_enum_i32(sampling.wrap));
        gl.tex_image_3d(
            glow::TEXTURE_3D,
            0,
            internal,
            width,
            height,
            depth,
            0,
            transfer,
            glow::FLOAT,
            PixelUnpackData::Slice(Some(bytemuck::cast_slice(data))),
        );
        gl.bind_texture(glow::TEXTURE_3D, None);
    }
    Ok(texture)
}

unsafe fn apply_sampling(gl: &glow::Context, target: u32, sampling: Sampling) {
    unsafe {
        gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_S, gl_enum_i32(sampling.wrap));
        gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_T, gl_enum_i32(sampling.wrap));
        gl.tex_parameter_i32(target, glow::TEXTURE_MAG_FILTER, gl_enum_i32(sampling.mag_filter));
        gl.tex_parameter_i32(target, glow::TEXTURE_MIN_FILTER, gl_enum_i32(sampling.min_filter));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_format_ldr() {
        assert_eq!(storage_format(1, false), (gl_enum_i32(glow::R8), glow::RED));
        assert_eq!(storage_format(2, false), (gl_enum_i32(glow::RG8), glow::RG));
        assert_eq!(storage_format(3, false), (gl_enum_i32(glow::RGB8), glow::RGB));
        assert_eq!(storage_format(4, false), (gl_enum_i32(glow::RGBA8), glow::RGBA));
    }

    #[test]
    fn test_storage_format_hdr() {
        assert_eq!(storage_format(1, true), (gl_enum_i32(glow::R32F), glow::RED));
        assert_eq!(storage_format(2, true), (gl_enum_i32(glow::RG32F), glow::RG));
        assert_eq!(storage_format(3, true), (gl_enum_i32(glow::RGB32F), glow::RGB));
        assert_eq!(storage_format(4, true), (gl_enum_i32(glow::RGBA32F), glow::RGBA));
    }

    #[test]
    fn test_unusual_channel_counts_fall_back_to_red() {
        assert_eq!(storage_format(0, false), (gl_enum_i32(glow::R8), glow::RED));
        assert_eq!(storage_format(7, true), (gl_enum_i32(glow::R32F), glow::RED));
    }

    #[test]
    fn test_mipmap_filters() {
        let linear = Sampling::default();
        assert!(!linear.uses_mipmaps());

        let mipmapped = Sampling {
            min_filter: glow::LINEAR_MIPMAP_LINEAR,
            ..Sampling::default()
        };
        assert!(mipmapped.uses_mipmaps());

        let nearest_chain = Sampling {
            min_filter: glow::NEAREST_MIPMAP_NEAREST,
            ..Sampling::default()
        };
        assert!(nearest_chain.uses_mipmaps());
    }

    #[test]
    fn test_raw_images_are_hdr() {
        let img = TextureImage::from_raw(vec![0.0; 2 * 2 * 2], 2, 2, 2);
        assert!(img.is_hdr());
        assert_eq!(img.channels(), 2);
        assert!(img.has_data());
        assert!(img.handle().is_none());
    }

    #[test]
    fn test_release_data_drops_cpu_pixels() {
        let img = TextureImage::from_raw(vec![1.0; 4], 1, 1, 4);
        img.release_data();
        assert!(!img.has_data());
    }
}
