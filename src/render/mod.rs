pub mod context;
pub mod gl_context;
pub mod headless;
pub mod mesh;
pub mod shaders;
pub mod source;

pub use context::{GpuContext, ProgramHandle, ShaderStage};
pub use gl_context::GlContext;
pub use headless::HeadlessContext;
pub use mesh::MeshData;
pub use shaders::{ProgramState, ShaderError, ShaderProgram};
pub use source::{ParseError, ShaderSource};
