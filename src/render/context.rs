//! The GPU context boundary used by [`ShaderProgram`](super::shaders::ShaderProgram).
//!
//! Shader and program objects live inside a context, and so does the single
//! "active program" slot. Passing the context explicitly keeps that global
//! state visible at every call site.

use std::fmt;
use std::num::NonZeroU32;

/// One programmable pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub const ALL: [ShaderStage; 2] = [ShaderStage::Vertex, ShaderStage::Fragment];

    /// Name used after `#type` in combined source files.
    pub fn marker_name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        }
    }

    pub fn from_marker_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|stage| stage.marker_name() == name)
    }

    pub fn gl_enum(self) -> gl::types::GLenum {
        match self {
            ShaderStage::Vertex => gl::VERTEX_SHADER,
            ShaderStage::Fragment => gl::FRAGMENT_SHADER,
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker_name())
    }
}

/// Handle to a shader object. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderHandle(pub NonZeroU32);

/// Handle to a program object. Never zero, so it can't be confused with
/// "no program bound".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub NonZeroU32);

impl ProgramHandle {
    pub fn raw(self) -> u32 {
        self.0.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub u32);

/// Primitives a context must provide to build and bind shader programs.
///
/// Methods take `&self`: like the driver they front, implementations keep
/// their own state and are only ever touched from the thread that owns the
/// context.
pub trait GpuContext {
    fn create_shader(&self, stage: ShaderStage) -> Result<ShaderHandle, String>;
    fn shader_source(&self, shader: ShaderHandle, source: &str);
    fn compile_shader(&self, shader: ShaderHandle);
    fn shader_compile_status(&self, shader: ShaderHandle) -> bool;
    fn shader_info_log(&self, shader: ShaderHandle) -> String;
    fn delete_shader(&self, shader: ShaderHandle);

    fn create_program(&self) -> Result<ProgramHandle, String>;
    fn attach_shader(&self, program: ProgramHandle, shader: ShaderHandle);
    fn detach_shader(&self, program: ProgramHandle, shader: ShaderHandle);
    fn link_program(&self, program: ProgramHandle);
    fn program_link_status(&self, program: ProgramHandle) -> bool;
    fn program_info_log(&self, program: ProgramHandle) -> String;
    fn delete_program(&self, program: ProgramHandle);

    /// Binds `program`, or unbinds everything when `None`.
    fn use_program(&self, program: Option<ProgramHandle>);
    fn current_program(&self) -> Option<ProgramHandle>;

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation>;
    fn uniform_f32(&self, location: UniformLocation, value: f32);
    fn uniform_vec4(&self, location: UniformLocation, value: [f32; 4]);
    fn uniform_mat4(&self, location: UniformLocation, value: &[f32; 16]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_marker_names() {
        assert_eq!(ShaderStage::from_marker_name("vertex"), Some(ShaderStage::Vertex));
        assert_eq!(ShaderStage::from_marker_name("fragment"), Some(ShaderStage::Fragment));
        assert_eq!(ShaderStage::from_marker_name("Vertex"), None);
        assert_eq!(ShaderStage::from_marker_name("geometry"), None);
        assert_eq!(ShaderStage::Fragment.to_string(), "fragment");
    }

    #[test]
    fn test_stage_gl_enum() {
        assert_eq!(ShaderStage::Vertex.gl_enum(), gl::VERTEX_SHADER);
        assert_eq!(ShaderStage::Fragment.gl_enum(), gl::FRAGMENT_SHADER);
    }
}
