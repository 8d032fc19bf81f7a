//! Render Targets
//!
//! [`Framebuffer`] wraps an offscreen render target: an ordered set of color
//! attachments plus at most one depth attachment. Attachments are either
//! created (and then owned) by the framebuffer or supplied by the caller;
//! owned attachments follow the framebuffer through [`Framebuffer::resize`]
//! and are released when it is dropped, external ones are never touched.
//!
//! `bind()` saves the previously active draw target and viewport and
//! `unbind()` restores exactly that state, so a pass can render offscreen
//! without knowing what the surrounding code had bound. Only one level of
//! nesting is supported: a second `bind()` before `unbind()` overwrites the
//! saved state.

use std::num::NonZeroU32;

use glam::IVec2;
use glow::HasContext;

use crate::context::RenderContext;
use crate::errors::{NimbusError, Result};
use crate::gpu::gl_enum_i32;

/// Color-output enumerant for a slot index.
///
/// Slot `i` always maps to `COLOR_ATTACHMENT0 + i`; slots are assigned in
/// insertion order and never renumbered.
#[inline]
pub(crate) fn color_target(slot: usize) -> u32 {
    glow::COLOR_ATTACHMENT0 + slot as u32
}

/// One image or buffer bound to a framebuffer output.
#[derive(Debug, Clone, Copy)]
enum Attachment {
    /// A texture this framebuffer created; resized and released with it.
    OwnedTexture {
        texture: glow::Texture,
        internal_format: u32,
    },
    /// A caller-supplied texture; its storage is the caller's business.
    ExternalTexture { texture: glow::Texture },
    /// A renderbuffer; always created by, and owned by, the framebuffer.
    Renderbuffer {
        buffer: glow::Renderbuffer,
        internal_format: u32,
    },
}

impl Attachment {
    /// The texture handle, if this attachment is texture-backed.
    fn texture(&self) -> Option<glow::Texture> {
        match *self {
            Attachment::OwnedTexture { texture, .. } | Attachment::ExternalTexture { texture } => {
                Some(texture)
            }
            Attachment::Renderbuffer { .. } => None,
        }
    }

    /// Release whatever this attachment owns.
    fn release(&self, ctx: &RenderContext) {
        let gl = ctx.gl();
        match *self {
            Attachment::OwnedTexture { texture, .. } => unsafe {
                gl.delete_texture(texture);
            },
            Attachment::ExternalTexture { .. } => {}
            Attachment::Renderbuffer { buffer, .. } => unsafe {
                gl.delete_renderbuffer(buffer);
            },
        }
    }
}

/// Target and viewport state captured by `bind()`.
#[derive(Debug, Clone, Copy)]
struct SavedState {
    fbo: Option<glow::Framebuffer>,
    viewport: [i32; 4],
}

/// An offscreen render target with ordered color slots and an optional depth
/// attachment.
///
/// Dropping a `Framebuffer` releases the target object and every attachment
/// it still owns, exactly once; moving it transfers that responsibility.
pub struct Framebuffer {
    ctx: RenderContext,
    fbo: glow::Framebuffer,
    width: i32,
    height: i32,
    color: Vec<Attachment>,
    depth: Option<Attachment>,
    saved: Option<SavedState>,
}

impl Framebuffer {
    /// Create a framebuffer of the given size with no attachments.
    pub fn new(ctx: &RenderContext, width: i32, height: i32) -> Result<Self> {
        let fbo = unsafe { ctx.gl().create_framebuffer() }.map_err(|reason| {
            NimbusError::ResourceAllocError {
                what: "framebuffer",
                reason,
            }
        })?;
        Ok(Self {
            ctx: ctx.clone(),
            fbo,
            width,
            height,
            color: Vec::new(),
            depth: None,
            saved: None,
        })
    }

    /// Bind this framebuffer and declare its color outputs.
    ///
    /// Saves the currently active draw target and viewport for the matching
    /// [`unbind`](Self::unbind), then sets the viewport to this target's
    /// dimensions.
    pub fn bind(&mut self) {
        let gl = self.ctx.gl();
        let mut viewport = [0i32; 4];
        unsafe {
            gl.get_parameter_i32_slice(glow::VIEWPORT, &mut viewport);
            let previous = NonZeroU32::new(
                gl.get_parameter_i32(glow::DRAW_FRAMEBUFFER_BINDING) as u32,
            )
            .map(glow::NativeFramebuffer);
            self.saved = Some(SavedState {
                fbo: previous,
                viewport,
            });
            gl.viewport(0, 0, self.width, self.height);
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(self.fbo));
            let targets: Vec<u32> = (0..self.color.len()).map(color_target).collect();
            gl.draw_buffers(&targets);
        }
    }

    /// Restore the draw target and viewport captured by the most recent
    /// [`bind`](Self::bind).
    pub fn unbind(&self) {
        let Some(saved) = self.saved else {
            log::warn!("Framebuffer::unbind called without a prior bind");
            return;
        };
        let gl = self.ctx.gl();
        unsafe {
            gl.bind_framebuffer(glow::FRAMEBUFFER, saved.fbo);
            let [x, y, w, h] = saved.viewport;
            gl.viewport(x, y, w, h);
        }
    }

    /// Attach a texture to the next color slot without touching its storage.
    fn attach_color(&mut self, texture: glow::Texture) {
        let gl = self.ctx.gl();
        unsafe {
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(self.fbo));
            gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                color_target(self.color.len()),
                glow::TEXTURE_2D,
                Some(texture),
                0,
            );
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
        }
    }

    /// Attach a caller-owned texture as the next color slot.
    ///
    /// The texture is never resized or released by this framebuffer; its
    /// storage stays the caller's responsibility.
    pub fn add_color_texture(&mut self, texture: glow::Texture) {
        self.attach_color(texture);
        self.color.push(Attachment::ExternalTexture { texture });
    }

    /// Create a texture sized to this framebuffer and attach it as the next
    /// color slot.
    ///
    /// `internal_format` is remembered for reallocation on resize; `filter`
    /// is applied as both min and mag filter. No pixel data is uploaded.
    pub fn generate_color_texture(
        &mut self,
        internal_format: u32,
        data_type: u32,
        filter: u32,
    ) -> Result<()> {
        let gl = self.ctx.gl();
        let texture =
            unsafe { gl.create_texture() }.map_err(|reason| NimbusError::ResourceAllocError {
                what: "color texture",
                reason,
            })?;
        unsafe {
            gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                gl_enum_i32(internal_format),
                self.width,
                self.height,
                0,
                glow::RGBA,
                data_type,
                glow::PixelUnpackData::Slice(None),
            );
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, gl_enum_i32(filter));
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, gl_enum_i32(filter));
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_S,
                gl_enum_i32(glow::CLAMP_TO_EDGE),
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_T,
                gl_enum_i32(glow::CLAMP_TO_EDGE),
            );
        }
        self.attach_color(texture);
        self.color.push(Attachment::OwnedTexture {
            texture,
            internal_format,
        });
        Ok(())
    }

    /// Attach a caller-owned texture as the depth attachment, releasing any
    /// previously generated one.
    ///
    /// The texture is never resized by this framebuffer.
    pub fn set_depth_texture(&mut self, texture: glow::Texture) {
        if let Some(previous) = self.depth.take() {
            previous.release(&self.ctx);
        }
        let gl = self.ctx.gl();
        unsafe {
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(self.fbo));
            gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::DEPTH_ATTACHMENT,
                glow::TEXTURE_2D,
                Some(texture),
                0,
            );
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
        }
        self.depth = Some(Attachment::ExternalTexture { texture });
    }

    /// Create a depth texture sized to this framebuffer and attach it,
    /// releasing any previous depth attachment.
    pub fn generate_depth_texture(&mut self, internal_format: u32) -> Result<()> {
        if let Some(previous) = self.depth.take() {
            previous.release(&self.ctx);
        }
        let gl = self.ctx.gl();
        let texture =
            unsafe { gl.create_texture() }.map_err(|reason| NimbusError::ResourceAllocError {
                what: "depth texture",
                reason,
            })?;
        unsafe {
            gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                gl_enum_i32(internal_format),
                self.width,
                self.height,
                0,
                glow::DEPTH_COMPONENT,
                glow::FLOAT,
                glow::PixelUnpackData::Slice(None),
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MAG_FILTER,
                gl_enum_i32(glow::NEAREST),
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MIN_FILTER,
                gl_enum_i32(glow::NEAREST),
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_S,
                gl_enum_i32(glow::CLAMP_TO_EDGE),
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_T,
                gl_enum_i32(glow::CLAMP_TO_EDGE),
            );
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(self.fbo));
            gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::DEPTH_ATTACHMENT,
                glow::TEXTURE_2D,
                Some(texture),
                0,
            );
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
        }
        self.depth = Some(Attachment::OwnedTexture {
            texture,
            internal_format,
        });
        Ok(())
    }

    /// Create a depth renderbuffer sized to this framebuffer and attach it,
    /// releasing any previous depth attachment.
    pub fn generate_depth_buffer(&mut self, internal_format: u32) -> Result<()> {
        if let Some(previous) = self.depth.take() {
            previous.release(&self.ctx);
        }
        let gl = self.ctx.gl();
        let buffer = unsafe { gl.create_renderbuffer() }.map_err(|reason| {
            NimbusError::ResourceAllocError {
                what: "depth renderbuffer",
                reason,
            }
        })?;
        unsafe {
            gl.bind_renderbuffer(glow::RENDERBUFFER, Some(buffer));
            gl.renderbuffer_storage(glow::RENDERBUFFER, internal_format, self.width, self.height);
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(self.fbo));
            gl.framebuffer_renderbuffer(
                glow::FRAMEBUFFER,
                glow::DEPTH_ATTACHMENT,
                glow::RENDERBUFFER,
                Some(buffer),
            );
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
        }
        self.depth = Some(Attachment::Renderbuffer {
            buffer,
            internal_format,
        });
        Ok(())
    }

    /// Resize this framebuffer, reallocating the storage of every owned
    /// attachment in place. Caller-supplied attachments are untouched.
    ///
    /// Reallocation keeps each color attachment's internal format but always
    /// uses an RGBA/float transfer spec; an attachment created with another
    /// data type must be recreated instead of resized.
    pub fn resize(&mut self, width: i32, height: i32) {
        self.width = width;
        self.height = height;
        let gl = self.ctx.gl();
        for attachment in &self.color {
            if let Attachment::OwnedTexture {
                texture,
                internal_format,
            } = *attachment
            {
                unsafe {
                    gl.bind_texture(glow::TEXTURE_2D, Some(texture));
                    gl.tex_image_2d(
                        glow::TEXTURE_2D,
                        0,
                        gl_enum_i32(internal_format),
                        width,
                        height,
                        0,
                        glow::RGBA,
                        glow::FLOAT,
                        glow::PixelUnpackData::Slice(None),
                    );
                    gl.bind_texture(glow::TEXTURE_2D, None);
                }
            }
        }
        match self.depth {
            Some(Attachment::OwnedTexture {
                texture,
                internal_format,
            }) => unsafe {
                gl.bind_texture(glow::TEXTURE_2D, Some(texture));
                gl.tex_image_2d(
                    glow::TEXTURE_2D,
                    0,
                    gl_enum_i32(internal_format),
                    width,
                    height,
                    0,
                    glow::DEPTH_COMPONENT,
                    glow::FLOAT,
                    glow::PixelUnpackData::Slice(None),
                );
                gl.bind_texture(glow::TEXTURE_2D, None);
            },
            Some(Attachment::Renderbuffer {
                buffer,
                internal_format,
            }) => unsafe {
                gl.bind_renderbuffer(glow::RENDERBUFFER, Some(buffer));
                gl.renderbuffer_storage(glow::RENDERBUFFER, internal_format, width, height);
                gl.bind_renderbuffer(glow::RENDERBUFFER, None);
            },
            Some(Attachment::ExternalTexture { .. }) | None => {}
        }
    }

    /// Copy this framebuffer's color, depth and stencil content into
    /// `target` (`None` = the default framebuffer), scaling to
    /// `width` × `height` with nearest-neighbor sampling.
    pub fn blit(&self, target: Option<glow::Framebuffer>, width: i32, height: i32) {
        let gl = self.ctx.gl();
        unsafe {
            gl.bind_framebuffer(glow::DRAW_FRAMEBUFFER, target);
            gl.bind_framebuffer(glow::READ_FRAMEBUFFER, Some(self.fbo));
            gl.blit_framebuffer(
                0,
                0,
                self.width,
                self.height,
                0,
                0,
                width,
                height,
                glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT | glow::STENCIL_BUFFER_BIT,
                glow::NEAREST,
            );
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
        }
    }

    /// The texture attached at color slot `slot`, if that slot exists and is
    /// texture-backed.
    #[must_use]
    pub fn color_texture(&self, slot: usize) -> Option<glow::Texture> {
        self.color.get(slot).and_then(Attachment::texture)
    }

    /// The depth texture, if a texture-backed depth attachment exists.
    #[must_use]
    pub fn depth_texture(&self) -> Option<glow::Texture> {
        self.depth.as_ref().and_then(Attachment::texture)
    }

    /// Number of color attachments.
    #[must_use]
    pub fn color_count(&self) -> usize {
        self.color.len()
    }

    /// The underlying framebuffer handle, for blitting between wrappers.
    #[must_use]
    pub fn handle(&self) -> glow::Framebuffer {
        self.fbo
    }

    /// Current size of this framebuffer.
    #[must_use]
    pub fn size(&self) -> IVec2 {
        IVec2::new(self.width, self.height)
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.ctx.gl().delete_framebuffer(self.fbo);
        }
        for attachment in &self.color {
            attachment.release(&self.ctx);
        }
        if let Some(depth) = &self.depth {
            depth.release(&self.ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_targets_are_consecutive() {
        for slot in 0..8 {
            assert_eq!(color_target(slot), glow::COLOR_ATTACHMENT0 + slot as u32);
        }
    }

    #[test]
    fn test_attachment_texture_queries() {
        let tex = glow::NativeTexture(NonZeroU32::new(7).unwrap());
        let owned = Attachment::OwnedTexture {
            texture: tex,
            internal_format: glow::RGBA32F,
        };
        let external = Attachment::ExternalTexture { texture: tex };
        let buffer = Attachment::Renderbuffer {
            buffer: glow::NativeRenderbuffer(NonZeroU32::new(9).unwrap()),
            internal_format: glow::DEPTH_COMPONENT16,
        };

        assert_eq!(owned.texture(), Some(tex));
        assert_eq!(external.texture(), Some(tex));
        assert_eq!(buffer.texture(), None);
    }
}
