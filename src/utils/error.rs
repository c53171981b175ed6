use thiserror::Error;

use crate::render::shaders::ShaderError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Shader error: {0}")]
    Shader(#[from] ShaderError),

    #[error("Render error: {0}")]
    Render(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
