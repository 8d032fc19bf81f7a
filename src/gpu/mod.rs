//! Thin ownership wrappers over raw GL objects.
//!
//! Each wrapper pairs one GL object kind with the bookkeeping the raw API
//! leaves to the caller: attachment layouts and saved bind state for
//! framebuffers, buffer descriptors and draw-call selection for meshes,
//! uniform caches and unit counters for programs, and decode metadata for
//! textures. Everything here requires the wrapped context to be current on
//! the calling thread; see [`crate::context::RenderContext`].

pub mod framebuffer;
pub mod mesh;
pub mod program;
pub mod texture;

pub use framebuffer::Framebuffer;
pub use mesh::{MeshBinding, Primitive, VertexData};
pub use program::{ComputeProgram, ShaderProgram, ShaderStage, StageKind, UniformCache, UniformValue};
pub use texture::{Sampling, TextureImage};

/// GL enumerants are `u32` while parameter slots take `i32`; the values are
/// small enumerant constants, so the wrap can never happen.
#[expect(clippy::cast_possible_wrap)]
#[inline]
pub(crate) fn gl_enum_i32(value: u32) -> i32 {
    value as i32
}
