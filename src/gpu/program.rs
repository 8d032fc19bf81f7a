//! Shader Programs
//!
//! [`ShaderProgram`] compiles and links a set of shader stages and exposes
//! uniform and texture binding on top of a name→location cache. Compile and
//! link failures are logged diagnostics, not fatal errors: a broken shader
//! keeps the render loop alive so the source can be fixed and reloaded.
//!
//! Uniform lookups go through [`UniformCache::resolve_or_cached`]: the first
//! load of a name queries the program once, and a name the linker discarded
//! is remembered as absent so every later load of it is a silent no-op.
//!
//! [`ComputeProgram`] is the compute specialization: it adds work-group
//! dispatch and image-unit binding, and its `stop()` waits on a full memory
//! barrier so compute writes are visible to subsequent reads.

use std::ops::{Deref, DerefMut};

use glam::{IVec2, IVec3, IVec4, Mat2, Mat3, Mat4, Vec2, Vec3, Vec4};
use glow::HasContext;
use rustc_hash::FxHashMap;

use crate::assets::source::inject_after_first_line;
use crate::context::RenderContext;
use crate::errors::{NimbusError, Result};

/// The shader stage kinds a program can be built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Vertex,
    Fragment,
    Compute,
}

impl StageKind {
    fn gl(self) -> u32 {
        match self {
            StageKind::Vertex => glow::VERTEX_SHADER,
            StageKind::Fragment => glow::FRAGMENT_SHADER,
            StageKind::Compute => glow::COMPUTE_SHADER,
        }
    }

    fn name(self) -> &'static str {
        match self {
            StageKind::Vertex => "vertex",
            StageKind::Fragment => "fragment",
            StageKind::Compute => "compute",
        }
    }
}

/// One stage of a program: ready-to-compile source text plus its kind.
#[derive(Debug, Clone, Copy)]
pub struct ShaderStage<'a> {
    pub source: &'a str,
    pub kind: StageKind,
}

impl<'a> ShaderStage<'a> {
    #[must_use]
    pub fn vertex(source: &'a str) -> Self {
        Self {
            source,
            kind: StageKind::Vertex,
        }
    }

    #[must_use]
    pub fn fragment(source: &'a str) -> Self {
        Self {
            source,
            kind: StageKind::Fragment,
        }
    }

    #[must_use]
    pub fn compute(source: &'a str) -> Self {
        Self {
            source,
            kind: StageKind::Compute,
        }
    }
}

/// Name→location cache with an explicit "resolved absent" state.
///
/// A name the program does not expose resolves to `None` exactly once and is
/// cached that way; later lookups hit the cache and keep returning `None`
/// without querying the program again.
#[derive(Debug, Default)]
pub struct UniformCache {
    locations: FxHashMap<String, Option<glow::UniformLocation>>,
}

impl UniformCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached location for `name`, resolving it through `lookup`
    /// on first use. `None` means the name is absent from the program.
    pub fn resolve_or_cached<F>(
        &mut self,
        name: &str,
        lookup: F,
    ) -> Option<&glow::UniformLocation>
    where
        F: FnOnce() -> Option<glow::UniformLocation>,
    {
        if !self.locations.contains_key(name) {
            let location = lookup();
            if location.is_none() {
                log::debug!("uniform \"{name}\" is inactive; loads of it will be ignored");
            }
            self.locations.insert(name.to_owned(), location);
        }
        self.locations.get(name).and_then(Option::as_ref)
    }
}

/// A value that can be written to a uniform location.
///
/// Implemented for the scalar, vector and matrix shapes the renderer uses;
/// every implementation issues exactly one typed uniform-set call.
pub trait UniformValue {
    fn apply(&self, gl: &glow::Context, location: &glow::UniformLocation);
}

impl UniformValue for f32 {
    fn apply(&self, gl: &glow::Context, location: &glow::UniformLocation) {
        unsafe { gl.uniform_1_f32(Some(location), *self) }
    }
}

impl UniformValue for i32 {
    fn apply(&self, gl: &glow::Context, location: &glow::UniformLocation) {
        unsafe { gl.uniform_1_i32(Some(location), *self) }
    }
}

impl UniformValue for Vec2 {
    fn apply(&self, gl: &glow::Context, location: &glow::UniformLocation) {
        unsafe { gl.uniform_2_f32(Some(location), self.x, self.y) }
    }
}

impl UniformValue for Vec3 {
    fn apply(&self, gl: &glow::Context, location: &glow::UniformLocation) {
        unsafe { gl.uniform_3_f32(Some(location), self.x, self.y, self.z) }
    }
}

impl UniformValue for Vec4 {
    fn apply(&self, gl: &glow::Context, location: &glow::UniformLocation) {
        unsafe { gl.uniform_4_f32(Some(location), self.x, self.y, self.z, self.w) }
    }
}

impl UniformValue for IVec2 {
    fn apply(&self, gl: &glow::Context, location: &glow::UniformLocation) {
        unsafe { gl.uniform_2_i32(Some(location), self.x, self.y) }
    }
}

impl UniformValue for IVec3 {
    fn apply(&self, gl: &glow::Context, location: &glow::UniformLocation) {
        unsafe { gl.uniform_3_i32(Some(location), self.x, self.y, self.z) }
    }
}

impl UniformValue for IVec4 {
    fn apply(&self, gl: &glow::Context, location: &glow::UniformLocation) {
        unsafe { gl.uniform_4_i32(Some(location), self.x, self.y, self.z, self.w) }
    }
}

impl UniformValue for Mat2 {
    fn apply(&self, gl: &glow::Context, location: &glow::UniformLocation) {
        unsafe { gl.uniform_matrix_2_f32_slice(Some(location), false, &self.to_cols_array()) }
    }
}

impl UniformValue for Mat3 {
    fn apply(&self, gl: &glow::Context, location: &glow::UniformLocation) {
        unsafe { gl.uniform_matrix_3_f32_slice(Some(location), false, &self.to_cols_array()) }
    }
}

impl UniformValue for Mat4 {
    fn apply(&self, gl: &glow::Context, location: &glow::UniformLocation) {
        unsafe { gl.uniform_matrix_4_f32_slice(Some(location), false, &self.to_cols_array()) }
    }
}

/// A compiled and linked shader program.
pub struct ShaderProgram {
    ctx: RenderContext,
    program: glow::Program,
    attribute_count: u32,
    uniforms: UniformCache,
    next_texture_unit: u32,
}

impl ShaderProgram {
    /// Compile `stages`, bind `attributes` to indices 0.. in order, and link.
    ///
    /// `defines` are injected as `#define` lines immediately after the first
    /// line of each stage's source (the `#version` line must stay first).
    /// Stage compile failures and link failures are logged and the build
    /// continues; activating such a program has undefined results. The only
    /// hard error is the driver refusing to create the program object.
    pub fn new(
        ctx: &RenderContext,
        stages: &[ShaderStage<'_>],
        attributes: &[&str],
        defines: &[&str],
    ) -> Result<Self> {
        let gl = ctx.gl();
        let program =
            unsafe { gl.create_program() }.map_err(|reason| NimbusError::ResourceAllocError {
                what: "shader program",
                reason,
            })?;

        let define_block: String = defines.iter().map(|d| format!("#define {d}\n")).collect();

        let mut compiled = Vec::with_capacity(stages.len());
        for stage in stages {
            match compile_stage(gl, stage, &define_block) {
                Ok(shader) => {
                    unsafe { gl.attach_shader(program, shader) };
                    compiled.push(shader);
                }
                Err(err) => log::error!("{err}"),
            }
        }

        for (index, name) in attributes.iter().enumerate() {
            unsafe { gl.bind_attrib_location(program, index as u32, name) };
        }

        unsafe {
            gl.link_program(program);
            for shader in compiled {
                gl.delete_shader(shader);
            }
            if !gl.get_program_link_status(program) {
                let err = NimbusError::ProgramLinkError(gl.get_program_info_log(program));
                log::error!("{err}");
            }
        }

        Ok(Self {
            ctx: ctx.clone(),
            program,
            attribute_count: attributes.len() as u32,
            uniforms: UniformCache::new(),
            next_texture_unit: 0,
        })
    }

    /// Convenience constructor for the common vertex + fragment pair.
    pub fn with_vertex_fragment(
        ctx: &RenderContext,
        vertex: &str,
        fragment: &str,
        attributes: &[&str],
    ) -> Result<Self> {
        Self::new(
            ctx,
            &[ShaderStage::vertex(vertex), ShaderStage::fragment(fragment)],
            attributes,
            &[],
        )
    }

    /// Bind the next free attribute index to `name`, in insertion order.
    ///
    /// Bindings only take effect at link time, so this is useful ahead of a
    /// relink; the constructor's `attributes` list covers the usual case.
    pub fn add_attribute(&mut self, name: &str) {
        unsafe {
            self.ctx
                .gl()
                .bind_attrib_location(self.program, self.attribute_count, name);
        }
        self.attribute_count += 1;
    }

    /// Activate this program and reset the automatic texture-unit counter.
    pub fn start(&mut self) {
        unsafe {
            self.ctx.gl().use_program(Some(self.program));
        }
        self.next_texture_unit = 0;
    }

    /// Deactivate whatever program is active.
    pub fn stop(&self) {
        unsafe {
            self.ctx.gl().use_program(None);
        }
    }

    /// Load a scalar, vector or matrix value into the named uniform.
    ///
    /// A name the program does not expose becomes a cached no-op.
    pub fn load<T: UniformValue>(&mut self, name: &str, value: T) {
        let gl = self.ctx.gl();
        let program = self.program;
        if let Some(location) = self
            .uniforms
            .resolve_or_cached(name, || unsafe { gl.get_uniform_location(program, name) })
        {
            value.apply(gl, location);
        }
    }

    /// Bind a 2D texture to a unit and point the named sampler uniform at it.
    ///
    /// With `unit = None` the next free unit is used; the counter advances
    /// either way, so explicit units should come before automatic ones.
    pub fn load_texture(&mut self, name: &str, texture: glow::Texture, unit: Option<u32>) {
        self.load_texture_target(name, texture, glow::TEXTURE_2D, unit);
    }

    /// [`load_texture`](Self::load_texture) for 3D textures.
    pub fn load_texture_3d(&mut self, name: &str, texture: glow::Texture, unit: Option<u32>) {
        self.load_texture_target(name, texture, glow::TEXTURE_3D, unit);
    }

    #[expect(clippy::cast_possible_wrap)]
    fn load_texture_target(
        &mut self,
        name: &str,
        texture: glow::Texture,
        target: u32,
        unit: Option<u32>,
    ) {
        let gl = self.ctx.gl();
        let program = self.program;
        let Some(location) = self
            .uniforms
            .resolve_or_cached(name, || unsafe { gl.get_uniform_location(program, name) })
            .cloned()
        else {
            return;
        };
        let unit = unit.unwrap_or(self.next_texture_unit);
        self.next_texture_unit += 1;
        unsafe {
            gl.active_texture(glow::TEXTURE0 + unit);
            gl.bind_texture(target, Some(texture));
            gl.uniform_1_i32(Some(&location), unit as i32);
        }
    }

    /// The underlying program handle.
    #[must_use]
    pub fn handle(&self) -> glow::Program {
        self.program
    }

    /// Delete the program object. Release is explicit, never destructor-tied.
    pub fn clean_up(self) {
        unsafe {
            self.ctx.gl().delete_program(self.program);
        }
    }
}

fn compile_stage(
    gl: &glow::Context,
    stage: &ShaderStage<'_>,
    define_block: &str,
) -> Result<glow::Shader> {
    let shader =
        unsafe { gl.create_shader(stage.kind.gl()) }.map_err(|reason| {
            NimbusError::ResourceAllocError {
                what: "shader stage",
                reason,
            }
        })?;
    let source = if define_block.is_empty() {
        stage.source.to_owned()
    } else {
        inject_after_first_line(stage.source, define_block)
    };
    unsafe {
        gl.shader_source(shader, &source);
        gl.compile_shader(shader);
        if !gl.get_shader_compile_status(shader) {
            let log = gl.get_shader_info_log(shader);
            gl.delete_shader(shader);
            return Err(NimbusError::ShaderCompileError {
                stage: stage.kind.name(),
                log,
            });
        }
    }
    Ok(shader)
}

/// A program with a single compute stage.
///
/// Derefs to [`ShaderProgram`] for uniform and texture loading; adds
/// work-group dispatch and image-unit binding on top.
pub struct ComputeProgram {
    program: ShaderProgram,
    next_image_unit: u32,
}

impl ComputeProgram {
    /// Compile and link a compute stage; same failure policy as
    /// [`ShaderProgram::new`].
    pub fn new(ctx: &RenderContext, source: &str, defines: &[&str]) -> Result<Self> {
        let program = ShaderProgram::new(ctx, &[ShaderStage::compute(source)], &[], defines)?;
        Ok(Self {
            program,
            next_image_unit: 0,
        })
    }

    /// Launch the compute stage over the given work-group counts and reset
    /// the automatic image-unit counter.
    pub fn dispatch(&mut self, groups_x: u32, groups_y: u32, groups_z: u32) {
        unsafe {
            self.program.ctx.gl().dispatch_compute(groups_x, groups_y, groups_z);
        }
        self.next_image_unit = 0;
    }

    /// Bind a texture level as an image unit for shader load/store access.
    ///
    /// With `unit = None` the next free unit is used; an explicit unit moves
    /// the counter past itself.
    pub fn bind_image(&mut self, texture: glow::Texture, access: u32, format: u32, unit: Option<u32>) {
        let unit = unit.unwrap_or(self.next_image_unit);
        self.next_image_unit = unit + 1;
        unsafe {
            self.program
                .ctx
                .gl()
                .bind_image_texture(unit, Some(texture), 0, false, 0, access, format);
        }
    }

    /// Block subsequent GL commands until all prior writes are visible.
    pub fn wait_for_barriers(&self) {
        unsafe {
            self.program.ctx.gl().memory_barrier(glow::ALL_BARRIER_BITS);
        }
    }

    /// Wait for outstanding writes, then deactivate the program.
    pub fn stop(&self) {
        self.wait_for_barriers();
        self.program.stop();
    }

    /// Release the underlying program object.
    pub fn clean_up(self) {
        self.program.clean_up();
    }
}

impl Deref for ComputeProgram {
    type Target = ShaderProgram;

    fn deref(&self) -> &Self::Target {
        &self.program
    }
}

impl DerefMut for ComputeProgram {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.program
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(value: u32) -> glow::UniformLocation {
        glow::NativeUniformLocation(value)
    }

    #[test]
    fn test_absent_uniform_is_resolved_once() {
        let mut cache = UniformCache::new();
        let mut lookups = 0;

        for _ in 0..4 {
            let resolved = cache.resolve_or_cached("missing", || {
                lookups += 1;
                None
            });
            assert!(resolved.is_none());
        }
        assert_eq!(lookups, 1);
    }

    #[test]
    fn test_present_uniform_hits_cache() {
        let mut cache = UniformCache::new();
        let mut lookups = 0;

        for _ in 0..3 {
            let resolved = cache
                .resolve_or_cached("view_proj", || {
                    lookups += 1;
                    Some(location(5))
                })
                .cloned();
            assert_eq!(resolved, Some(location(5)));
        }
        assert_eq!(lookups, 1);
    }

    #[test]
    fn test_names_are_cached_independently() {
        let mut cache = UniformCache::new();
        cache.resolve_or_cached("a", || Some(location(1)));
        cache.resolve_or_cached("b", || None);

        assert_eq!(cache.resolve_or_cached("a", || None), Some(&location(1)));
        assert!(cache.resolve_or_cached("b", || Some(location(2))).is_none());
    }
}
