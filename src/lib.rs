pub mod config;
pub mod render;
pub mod scene;
pub mod utils;

// Re-export commonly used types
pub use config::core::EngineConfig;
pub use render::context::{GpuContext, ProgramHandle, ShaderStage};
pub use render::gl_context::GlContext;
pub use render::headless::HeadlessContext;
pub use render::shaders::{ProgramState, ShaderError, ShaderProgram};
pub use render::source::{ParseError, ShaderSource};
pub use scene::{LevelEditorScene, Scene};
pub use utils::error::EngineError;
