use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Combined `#type` shader file for the editor scene.
    pub shader_path: PathBuf,
    pub clear_color: [f32; 4],
    /// Requested OpenGL core profile version as `[major, minor]`.
    pub gl_version: [u8; 2],
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            shader_path: PathBuf::from("assets/shaders/default.glsl"),
            clear_color: [0.1, 0.1, 0.1, 1.0],
            gl_version: [3, 3],
        }
    }
}
