//! Mesh Bindings
//!
//! [`MeshBinding`] wraps a vertex-array object together with the vertex and
//! index buffers it references. Attribute indices are assigned in insertion
//! order, and the draw-call shape (plain, instanced, indexed, instanced
//! indexed) is selected from which buffers are present.
//!
//! The element-count and draw-shape bookkeeping lives in the GPU-free
//! [`MeshLayout`] so it can be reasoned about (and tested) without a GL
//! context; `MeshBinding` pairs it with the actual GL objects.

use glow::HasContext;

use crate::context::RenderContext;
use crate::errors::{NimbusError, Result};

/// Vertex data accepted by a buffer. Exactly these two element kinds exist;
/// anything else is unrepresentable.
#[derive(Debug, Clone, Copy)]
pub enum VertexData<'a> {
    Float(&'a [f32]),
    Int(&'a [i32]),
}

impl VertexData<'_> {
    /// Number of elements in the slice.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            VertexData::Float(data) => data.len(),
            VertexData::Int(data) => data.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The raw bytes to upload.
    fn bytes(&self) -> &[u8] {
        match self {
            VertexData::Float(data) => bytemuck::cast_slice(data),
            VertexData::Int(data) => bytemuck::cast_slice(data),
        }
    }
}

/// Primitive topology for [`MeshBinding::draw`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Points,
    Lines,
    LineStrip,
    Triangles,
    TriangleStrip,
    TriangleFan,
}

impl Primitive {
    fn gl(self) -> u32 {
        match self {
            Primitive::Points => glow::POINTS,
            Primitive::Lines => glow::LINES,
            Primitive::LineStrip => glow::LINE_STRIP,
            Primitive::Triangles => glow::TRIANGLES,
            Primitive::TriangleStrip => glow::TRIANGLE_STRIP,
            Primitive::TriangleFan => glow::TRIANGLE_FAN,
        }
    }
}

/// The four draw-call shapes a mesh binding can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawCall {
    Arrays,
    ArraysInstanced,
    Elements,
    ElementsInstanced,
}

impl DrawCall {
    /// Select the call shape from which buffers are configured.
    #[must_use]
    pub fn select(indexed: bool, instanced: bool) -> Self {
        match (indexed, instanced) {
            (false, false) => DrawCall::Arrays,
            (false, true) => DrawCall::ArraysInstanced,
            (true, false) => DrawCall::Elements,
            (true, true) => DrawCall::ElementsInstanced,
        }
    }
}

/// Fail unless `len` divides evenly into `components`-sized attributes.
fn check_layout(components: i32, len: usize) -> Result<()> {
    if components < 1 || len % components as usize != 0 {
        return Err(NimbusError::InvalidBufferLayout { len, components });
    }
    Ok(())
}

/// One vertex buffer as the binding sees it.
#[derive(Debug, Clone, Copy)]
struct BufferDescriptor {
    components: i32,
    instanced: bool,
}

/// GPU-free bookkeeping for a mesh binding.
///
/// Element count is derived from the first non-instanced vertex buffer's
/// length divided by its component count, unless an index buffer exists, in
/// which case it is the index count.
#[derive(Debug, Default)]
struct MeshLayout {
    descriptors: Vec<BufferDescriptor>,
    has_index_buffer: bool,
    instance_count: Option<i32>,
    element_count: i32,
}

impl MeshLayout {
    /// Record a buffer and return its attribute index. `len` must already be
    /// validated against `components`.
    fn push_buffer(&mut self, components: i32, len: usize, instanced: bool) -> u32 {
        let index = self.descriptors.len() as u32;
        self.descriptors.push(BufferDescriptor {
            components,
            instanced,
        });
        if instanced {
            if self.instance_count.is_none() {
                self.instance_count = Some(1);
            }
        } else if !self.has_index_buffer && self.count_defining_buffer() == Some(index as usize) {
            self.element_count = (len / components as usize) as i32;
        }
        index
    }

    /// Record an index buffer; index count overrides any derived count.
    fn set_index_count(&mut self, count: usize) {
        self.has_index_buffer = true;
        self.element_count = count as i32;
    }

    /// Re-derive the element count after a full rewrite of buffer `index`.
    fn update_buffer(&mut self, index: usize, len: usize) {
        if !self.has_index_buffer && self.count_defining_buffer() == Some(index) {
            self.element_count = (len / self.descriptors[index].components as usize) as i32;
        }
    }

    /// The buffer whose length defines the element count.
    fn count_defining_buffer(&self) -> Option<usize> {
        self.descriptors.iter().position(|d| !d.instanced)
    }

    fn draw_call(&self) -> DrawCall {
        DrawCall::select(self.has_index_buffer, self.instance_count.is_some())
    }
}

/// A vertex-array object plus the buffers it references.
///
/// Release is explicit through [`clean_up`](Self::clean_up) and never tied to
/// a destructor, so a binding can be handed around freely until the owner
/// decides its GL objects should go.
pub struct MeshBinding {
    ctx: RenderContext,
    vao: glow::VertexArray,
    buffers: Vec<glow::Buffer>,
    index_buffer: Option<glow::Buffer>,
    layout: MeshLayout,
}

impl MeshBinding {
    /// Create an empty binding.
    pub fn new(ctx: &RenderContext) -> Result<Self> {
        let vao = unsafe { ctx.gl().create_vertex_array() }.map_err(|reason| {
            NimbusError::ResourceAllocError {
                what: "vertex array",
                reason,
            }
        })?;
        Ok(Self {
            ctx: ctx.clone(),
            vao,
            buffers: Vec::new(),
            index_buffer: None,
            layout: MeshLayout::default(),
        })
    }

    fn create_buffer(&self, what: &'static str) -> Result<glow::Buffer> {
        unsafe { self.ctx.gl().create_buffer() }
            .map_err(|reason| NimbusError::ResourceAllocError { what, reason })
    }

    /// Upload a static vertex buffer and attach it at the next attribute
    /// index, which is returned.
    ///
    /// If no index buffer exists and this is the first non-instanced buffer,
    /// the element count becomes `data.len() / components`.
    pub fn add_vertex_buffer(&mut self, components: i32, data: VertexData<'_>) -> Result<u32> {
        check_layout(components, data.len())?;
        let buffer = self.create_buffer("vertex buffer")?;
        let index = self.layout.push_buffer(components, data.len(), false);
        self.attach_buffer(buffer, index, components, data, glow::STATIC_DRAW, None);
        self.buffers.push(buffer);
        Ok(index)
    }

    /// Upload a per-instance vertex buffer advancing every `divisor`
    /// instances, and attach it at the next attribute index, which is
    /// returned. Sets the instance count to 1 if none was set; never
    /// contributes to the element count.
    pub fn add_instanced_vertex_buffer(
        &mut self,
        components: i32,
        data: VertexData<'_>,
        divisor: u32,
    ) -> Result<u32> {
        check_layout(components, data.len())?;
        let buffer = self.create_buffer("instanced vertex buffer")?;
        let index = self.layout.push_buffer(components, data.len(), true);
        self.attach_buffer(
            buffer,
            index,
            components,
            data,
            glow::DYNAMIC_DRAW,
            Some(divisor),
        );
        self.buffers.push(buffer);
        Ok(index)
    }

    fn attach_buffer(
        &self,
        buffer: glow::Buffer,
        index: u32,
        components: i32,
        data: VertexData<'_>,
        usage: u32,
        divisor: Option<u32>,
    ) {
        let gl = self.ctx.gl();
        unsafe {
            gl.bind_vertex_array(Some(self.vao));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(buffer));
            gl.buffer_data_u8_slice(glow::ARRAY_BUFFER, data.bytes(), usage);
            gl.enable_vertex_attrib_array(index);
            match data {
                VertexData::Float(_) => {
                    gl.vertex_attrib_pointer_f32(index, components, glow::FLOAT, false, 0, 0);
                }
                VertexData::Int(_) => {
                    gl.vertex_attrib_pointer_i32(index, components, glow::INT, 0, 0);
                }
            }
            if let Some(divisor) = divisor {
                gl.vertex_attrib_divisor(index, divisor);
            }
            gl.bind_buffer(glow::ARRAY_BUFFER, None);
        }
    }

    /// Upload an index buffer. The element count becomes the index count.
    pub fn add_index_buffer(&mut self, indices: &[u32]) -> Result<()> {
        let buffer = self.create_buffer("index buffer")?;
        let gl = self.ctx.gl();
        unsafe {
            gl.bind_vertex_array(Some(self.vao));
            gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(buffer));
            gl.buffer_data_u8_slice(
                glow::ELEMENT_ARRAY_BUFFER,
                bytemuck::cast_slice(indices),
                glow::STATIC_DRAW,
            );
        }
        self.index_buffer = Some(buffer);
        self.layout.set_index_count(indices.len());
        Ok(())
    }

    /// Number of instances drawn by the instanced call shapes.
    pub fn set_instance_count(&mut self, count: i32) {
        self.layout.instance_count = Some(count);
    }

    /// Replace the full contents of buffer `index`.
    ///
    /// If no index buffer exists and `index` is the buffer the element count
    /// derives from, the count is recomputed from the new length.
    pub fn update_vbo(&mut self, index: usize, data: VertexData<'_>) {
        let Some(&buffer) = self.buffers.get(index) else {
            log::warn!("update_vbo: no buffer at index {index}");
            return;
        };
        let gl = self.ctx.gl();
        unsafe {
            gl.bind_vertex_array(Some(self.vao));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(buffer));
            gl.buffer_data_u8_slice(glow::ARRAY_BUFFER, data.bytes(), glow::DYNAMIC_DRAW);
            gl.bind_buffer(glow::ARRAY_BUFFER, None);
        }
        self.layout.update_buffer(index, data.len());
    }

    /// Overwrite part of buffer `index` starting at `byte_offset`. Never
    /// changes the element count.
    pub fn update_vbo_range(&mut self, index: usize, data: VertexData<'_>, byte_offset: i32) {
        let Some(&buffer) = self.buffers.get(index) else {
            log::warn!("update_vbo_range: no buffer at index {index}");
            return;
        };
        let gl = self.ctx.gl();
        unsafe {
            gl.bind_vertex_array(Some(self.vao));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(buffer));
            gl.buffer_sub_data_u8_slice(glow::ARRAY_BUFFER, byte_offset, data.bytes());
            gl.bind_buffer(glow::ARRAY_BUFFER, None);
        }
    }

    pub fn bind(&self) {
        unsafe {
            self.ctx.gl().bind_vertex_array(Some(self.vao));
        }
    }

    pub fn unbind(&self) {
        unsafe {
            self.ctx.gl().bind_vertex_array(None);
        }
    }

    /// The call shape [`draw`](Self::draw) will issue.
    #[must_use]
    pub fn draw_call(&self) -> DrawCall {
        self.layout.draw_call()
    }

    /// Current element count (vertices or indices per instance).
    #[must_use]
    pub fn element_count(&self) -> i32 {
        self.layout.element_count
    }

    /// Issue the draw call matching the configured buffers.
    pub fn draw(&self, primitive: Primitive) {
        let gl = self.ctx.gl();
        let mode = primitive.gl();
        let count = self.layout.element_count;
        let instances = self.layout.instance_count.unwrap_or(1);
        unsafe {
            match self.layout.draw_call() {
                DrawCall::Arrays => gl.draw_arrays(mode, 0, count),
                DrawCall::ArraysInstanced => gl.draw_arrays_instanced(mode, 0, count, instances),
                DrawCall::Elements => gl.draw_elements(mode, count, glow::UNSIGNED_INT, 0),
                DrawCall::ElementsInstanced => {
                    gl.draw_elements_instanced(mode, count, glow::UNSIGNED_INT, 0, instances);
                }
            }
        }
    }

    /// Release every buffer and the binding object. Consuming `self` makes
    /// "exactly once" a compile-time guarantee.
    pub fn clean_up(self) {
        let gl = self.ctx.gl();
        unsafe {
            for buffer in &self.buffers {
                gl.delete_buffer(*buffer);
            }
            if let Some(buffer) = self.index_buffer {
                gl.delete_buffer(buffer);
            }
            gl.delete_vertex_array(self.vao);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_call_selection() {
        assert_eq!(DrawCall::select(false, false), DrawCall::Arrays);
        assert_eq!(DrawCall::select(false, true), DrawCall::ArraysInstanced);
        assert_eq!(DrawCall::select(true, false), DrawCall::Elements);
        assert_eq!(DrawCall::select(true, true), DrawCall::ElementsInstanced);
    }

    #[test]
    fn test_layout_rejects_ragged_data() {
        assert!(check_layout(3, 24).is_ok());
        assert!(check_layout(3, 25).is_err());
        assert!(check_layout(0, 24).is_err());
    }

    #[test]
    fn test_element_count_from_first_non_instanced_buffer() {
        let mut layout = MeshLayout::default();
        assert_eq!(layout.push_buffer(4, 8, true), 0);
        assert_eq!(layout.element_count, 0);
        assert_eq!(layout.instance_count, Some(1));

        assert_eq!(layout.push_buffer(3, 24, false), 1);
        assert_eq!(layout.element_count, 8);

        // A later vertex buffer must not change the derived count.
        assert_eq!(layout.push_buffer(2, 12, false), 2);
        assert_eq!(layout.element_count, 8);
    }

    #[test]
    fn test_index_buffer_overrides_derived_count() {
        let mut layout = MeshLayout::default();
        layout.push_buffer(3, 24, false);
        assert_eq!(layout.element_count, 8);

        layout.set_index_count(36);
        assert_eq!(layout.element_count, 36);
        assert_eq!(layout.draw_call(), DrawCall::Elements);

        // Buffers added under an index buffer leave the count alone.
        layout.push_buffer(3, 6, false);
        assert_eq!(layout.element_count, 36);
    }

    #[test]
    fn test_update_recomputes_only_for_defining_buffer() {
        let mut layout = MeshLayout::default();
        layout.push_buffer(2, 4, true);
        layout.push_buffer(3, 24, false);
        layout.push_buffer(3, 9, false);
        assert_eq!(layout.element_count, 8);

        layout.update_buffer(2, 30);
        assert_eq!(layout.element_count, 8);

        layout.update_buffer(1, 30);
        assert_eq!(layout.element_count, 10);
    }
}
