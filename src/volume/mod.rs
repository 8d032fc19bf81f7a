//! The two-pass volumetric cloud pipeline.
//!
//! Per frame the bounding cuboid is drawn twice. The exit pass culls front
//! faces into an offscreen float target, so each pixel records the
//! local-space position where its view ray leaves the volume. The entry pass
//! culls back faces straight into the caller's target: each fragment is the
//! ray's entry point, the matching exit point is fetched from the first
//! pass's output at the same screen coordinate, and the fragment shader
//! marches that interval through the noise field at a fixed step size,
//! blending the result over the cleared background.
//!
//! The passes share one program, one mesh and one command stream, so the
//! entry pass reads the exit target without any explicit synchronization.

use std::path::PathBuf;

use glow::HasContext;

use crate::assets::source::load_source;
use crate::context::RenderContext;
use crate::errors::Result;
use crate::gpu::framebuffer::Framebuffer;
use crate::gpu::mesh::{MeshBinding, Primitive, VertexData};
use crate::gpu::program::ShaderProgram;
use crate::gpu::texture::{Sampling, TextureImage};
use crate::utils::Timer;

pub mod camera;
pub mod noise;

pub use camera::OrbitCamera;

/// Corners of the bounding cuboid: x and y span [-1, 1], z spans [-1, 2].
#[rustfmt::skip]
const CUBOID_VERTICES: [f32; 24] = [
    -1.0, -1.0, -1.0,
     1.0, -1.0, -1.0,
     1.0,  1.0, -1.0,
    -1.0,  1.0, -1.0,
    -1.0, -1.0,  2.0,
     1.0, -1.0,  2.0,
     1.0,  1.0,  2.0,
    -1.0,  1.0,  2.0,
];

/// Twelve triangles, wound counter-clockwise seen from outside.
#[rustfmt::skip]
const CUBOID_INDICES: [u32; 36] = [
    5, 4, 0,  1, 5, 0,
    6, 5, 1,  2, 6, 1,
    7, 6, 2,  3, 7, 2,
    4, 7, 3,  0, 4, 3,
    6, 7, 4,  5, 6, 4,
    1, 0, 3,  2, 1, 3,
];

const DISPLAY_CLEAR: [f32; 4] = [0.2, 0.2, 0.5, 1.0];
const DEFAULT_STEP_SIZE: f32 = 0.02;

/// GPU objects that exist from `init` to `cleanup`.
struct SceneResources {
    program: ShaderProgram,
    cuboid: MeshBinding,
    noise_tex: glow::Texture,
}

/// Owns everything one volumetric scene needs and drives a frame through the
/// two passes.
///
/// The host windowing system is expected to call [`init`](Self::init) once
/// after the GL context exists, [`resize`](Self::resize) whenever the surface
/// size changes and [`render`](Self::render) every frame tick; `render`
/// tolerates being called first and catches up on its own.
pub struct CloudRenderer {
    ctx: RenderContext,
    shader_dir: PathBuf,
    camera: OrbitCamera,
    step_size: f32,
    surface_size: (i32, i32),
    timer: Timer,
    scene: Option<SceneResources>,
    exit_target: Option<Framebuffer>,
}

impl CloudRenderer {
    /// A renderer loading its shaders from the `shaders` directory.
    #[must_use]
    pub fn new(ctx: &RenderContext) -> Self {
        Self::with_shader_dir(ctx, "shaders")
    }

    #[must_use]
    pub fn with_shader_dir(ctx: &RenderContext, shader_dir: impl Into<PathBuf>) -> Self {
        Self {
            ctx: ctx.clone(),
            shader_dir: shader_dir.into(),
            camera: OrbitCamera::new(),
            step_size: DEFAULT_STEP_SIZE,
            surface_size: (1, 1),
            timer: Timer::new(),
            scene: None,
            exit_target: None,
        }
    }

    /// One-time setup: compile the cloud program, build the cuboid mesh,
    /// precompute and upload the noise table, set the fixed raster state.
    ///
    /// Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// Shader source loading and GPU object allocation can fail; compile and
    /// link diagnostics are logged without failing, see
    /// [`ShaderProgram::new`].
    pub fn init(&mut self) -> Result<()> {
        if self.scene.is_some() {
            return Ok(());
        }

        let vertex = load_source(self.shader_dir.join("cloudbox.vert"))?;
        let fragment = load_source(self.shader_dir.join("cloudbox.frag"))?;
        let program =
            ShaderProgram::with_vertex_fragment(&self.ctx, &vertex, &fragment, &["position"])?;

        let mut cuboid = MeshBinding::new(&self.ctx)?;
        cuboid.add_vertex_buffer(3, VertexData::Float(&CUBOID_VERTICES))?;
        cuboid.add_index_buffer(&CUBOID_INDICES)?;

        let gl = self.ctx.gl();
        unsafe {
            gl.enable(glow::CULL_FACE);
            gl.enable(glow::DEPTH_TEST);
            gl.enable(glow::BLEND);
            gl.blend_func(glow::ONE, glow::ONE_MINUS_SRC_ALPHA);
        }

        let table = noise::build_noise_table();
        let noise_img = TextureImage::from_raw(
            table,
            noise::NOISE_TABLE_SIZE as i32,
            noise::NOISE_TABLE_SIZE as i32,
            noise::NOISE_TABLE_CHANNELS as i32,
        );
        let noise_tex = noise_img.upload(&self.ctx, Sampling::default())?;

        self.scene = Some(SceneResources {
            program,
            cuboid,
            noise_tex,
        });
        self.timer = Timer::new();
        log::info!("cloud renderer initialized");
        Ok(())
    }

    /// Track a new surface size: reallocate (or lazily create) the offscreen
    /// exit target and recompute the camera projection.
    ///
    /// # Errors
    ///
    /// Allocation of the exit target's attachments can fail.
    pub fn resize(&mut self, width: i32, height: i32) -> Result<()> {
        self.surface_size = (width, height);
        if self.scene.is_some() {
            if let Some(target) = self.exit_target.as_mut() {
                target.resize(width, height);
            } else {
                let mut target = Framebuffer::new(&self.ctx, width, height)?;
                target.generate_color_texture(glow::RGBA32F, glow::FLOAT, glow::NEAREST)?;
                target.generate_depth_buffer(glow::DEPTH_COMPONENT16)?;
                self.exit_target = Some(target);
                log::debug!("exit target created at {width}x{height}");
            }
        }
        self.camera.set_surface_size(width, height);
        Ok(())
    }

    /// Draw one frame into the currently bound target.
    ///
    /// Returns `true` on success. A `false` frame means setup failed; the
    /// cause has been logged and the next frame will retry.
    pub fn render(&mut self) -> bool {
        if self.scene.is_none() {
            log::debug!("render before init, initializing now");
            if let Err(err) = self.init() {
                log::error!("deferred init failed: {err}");
                return false;
            }
        }
        if self.exit_target.is_none() {
            let (width, height) = self.surface_size;
            if let Err(err) = self.resize(width, height) {
                log::error!("deferred resize failed: {err}");
                return false;
            }
        }
        self.timer.tick();

        // The Options were just filled in; bail out instead of unwrapping if
        // a failed retry left them empty.
        let Some(scene) = self.scene.as_mut() else {
            return false;
        };
        let Some(exit_target) = self.exit_target.as_mut() else {
            return false;
        };
        let Some(exit_positions) = exit_target.color_texture(0) else {
            log::error!("exit target has no color attachment");
            return false;
        };

        let gl = self.ctx.gl();
        unsafe {
            let [r, g, b, a] = DISPLAY_CLEAR;
            gl.clear_color(r, g, b, a);
            gl.clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);
        }

        scene.program.start();
        scene.cuboid.bind();
        scene.program.load("view_proj", self.camera.view_proj());
        scene.program.load("eye", self.camera.eye());

        // Exit pass: only back faces reach the offscreen target, recording
        // where each pixel's ray leaves the volume.
        exit_target.bind();
        unsafe {
            gl.clear_color(0.0, 0.0, 0.0, 0.0);
            gl.clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);
            gl.cull_face(glow::FRONT);
        }
        scene.program.load("backside", 1_i32);
        scene.cuboid.draw(Primitive::Triangles);
        exit_target.unbind();

        // Entry pass: front faces into the caller's target, marching from
        // each entry point to the captured exit point.
        unsafe {
            gl.cull_face(glow::BACK);
        }
        scene.program.load("backside", 0_i32);
        scene.program.load("step_size", self.step_size);
        scene.program.load("time", self.timer.elapsed_seconds());
        scene.program.load_texture("exit_tex", exit_positions, Some(0));
        scene.program.load_texture("noise_tex", scene.noise_tex, Some(1));
        scene.cuboid.draw(Primitive::Triangles);

        scene.cuboid.unbind();
        scene.program.stop();
        true
    }

    /// Release every GPU object this renderer created.
    pub fn cleanup(mut self) {
        if let Some(scene) = self.scene.take() {
            unsafe {
                self.ctx.gl().delete_texture(scene.noise_tex);
            }
            scene.cuboid.clean_up();
            scene.program.clean_up();
        }
        self.exit_target = None;
    }

    /// Elevation of the orbit eye, in degrees from the vertical axis.
    pub fn set_orbit_elevation(&mut self, degrees: f32) {
        self.camera.set_elevation_degrees(degrees);
    }

    /// Rotation of the orbit eye around the vertical axis, in degrees.
    pub fn set_orbit_azimuth(&mut self, degrees: f32) {
        self.camera.set_azimuth_degrees(degrees);
    }

    /// Scale on the fixed orbit radius; 1.0 is the default distance.
    pub fn set_radius_scale(&mut self, factor: f32) {
        self.camera.set_radius_scale(factor);
    }

    /// Raymarch step length in volume-local units.
    pub fn set_step_size(&mut self, value: f32) {
        self.step_size = value;
    }

    #[must_use]
    pub fn step_size(&self) -> f32 {
        self.step_size
    }

    #[must_use]
    pub fn camera(&self) -> &OrbitCamera {
        &self.camera
    }

    /// The offscreen exit target, once [`resize`](Self::resize) has created
    /// it. Its color output at slot 0 holds the last frame's exit positions.
    #[must_use]
    pub fn exit_target(&self) -> Option<&Framebuffer> {
        self.exit_target.as_ref()
    }
}
