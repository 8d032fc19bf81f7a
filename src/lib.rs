pub mod assets;
pub mod context;
pub mod errors;
pub mod gpu;
pub mod utils;
pub mod volume;

pub use assets::{TextureCache, load_source, load_source_with};
pub use context::RenderContext;
pub use errors::{NimbusError, Result};
pub use gpu::framebuffer::Framebuffer;
pub use gpu::mesh::{DrawCall, MeshBinding, Primitive, VertexData};
pub use gpu::program::{ComputeProgram, ShaderProgram, ShaderStage, StageKind, UniformValue};
pub use gpu::texture::{Sampling, TextureImage, upload_raw_3d};
pub use utils::Timer;
pub use volume::noise::simplex3;
pub use volume::{CloudRenderer, OrbitCamera};
