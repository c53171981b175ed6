use std::ffi::{c_void, CStr, CString};
use std::num::NonZeroU32;
use std::ptr;

use gl::types::*;

use super::context::{GpuContext, ProgramHandle, ShaderHandle, ShaderStage, UniformLocation};

/// OpenGL context whose function pointers were loaded through the `gl` crate.
///
/// The `gl` crate keeps its pointers in process globals, so this type is a
/// token proving they were loaded. It is deliberately `!Send`: GL calls must
/// stay on the thread that made the context current.
pub struct GlContext {
    _not_send: std::marker::PhantomData<*const ()>,
}

impl GlContext {
    /// Loads every GL entry point with `loader`.
    ///
    /// # Safety
    /// A GL context must be current on this thread and `loader` must return
    /// valid function pointers for it.
    pub unsafe fn load_with<F>(mut loader: F) -> Self
    where
        F: FnMut(&CStr) -> *const c_void,
    {
        gl::load_with(|symbol| match CString::new(symbol) {
            Ok(symbol) => loader(symbol.as_c_str()),
            Err(_) => ptr::null(),
        });
        Self {
            _not_send: std::marker::PhantomData,
        }
    }

    pub fn version(&self) -> String {
        unsafe {
            let raw = gl::GetString(gl::VERSION);
            if raw.is_null() {
                return String::from("unknown");
            }
            CStr::from_ptr(raw as *const GLchar)
                .to_string_lossy()
                .into_owned()
        }
    }
}

/// Reads an info log of `len` bytes through `fetch`.
fn read_info_log(len: GLint, fetch: impl FnOnce(GLsizei, *mut GLsizei, *mut GLchar)) -> String {
    let Ok(capacity) = usize::try_from(len) else {
        return String::new();
    };
    if capacity == 0 {
        return String::new();
    }
    let mut buffer = vec![0u8; capacity];
    let mut written: GLsizei = 0;
    fetch(len, &mut written as *mut GLsizei, buffer.as_mut_ptr() as *mut GLchar);
    buffer.truncate(usize::try_from(written).unwrap_or(0));
    String::from_utf8_lossy(&buffer).trim_end().to_string()
}

impl GpuContext for GlContext {
    fn create_shader(&self, stage: ShaderStage) -> Result<ShaderHandle, String> {
        let id = unsafe { gl::CreateShader(stage.gl_enum()) };
        NonZeroU32::new(id)
            .map(ShaderHandle)
            .ok_or_else(|| format!("glCreateShader failed for {stage} stage"))
    }

    fn shader_source(&self, shader: ShaderHandle, source: &str) {
        let text = source.as_ptr() as *const GLchar;
        let len = GLint::try_from(source.len()).unwrap_or(GLint::MAX);
        unsafe {
            gl::ShaderSource(shader.0.get(), 1, &text, &len);
        }
    }

    fn compile_shader(&self, shader: ShaderHandle) {
        unsafe { gl::CompileShader(shader.0.get()) };
    }

    fn shader_compile_status(&self, shader: ShaderHandle) -> bool {
        let mut success = 0;
        unsafe { gl::GetShaderiv(shader.0.get(), gl::COMPILE_STATUS, &mut success) };
        success != 0
    }

    fn shader_info_log(&self, shader: ShaderHandle) -> String {
        let mut len = 0;
        unsafe { gl::GetShaderiv(shader.0.get(), gl::INFO_LOG_LENGTH, &mut len) };
        read_info_log(len, |size, written, buffer| unsafe {
            gl::GetShaderInfoLog(shader.0.get(), size, written, buffer);
        })
    }

    fn delete_shader(&self, shader: ShaderHandle) {
        unsafe { gl::DeleteShader(shader.0.get()) };
    }

    fn create_program(&self) -> Result<ProgramHandle, String> {
        let id = unsafe { gl::CreateProgram() };
        NonZeroU32::new(id)
            .map(ProgramHandle)
            .ok_or_else(|| "glCreateProgram failed".to_string())
    }

    fn attach_shader(&self, program: ProgramHandle, shader: ShaderHandle) {
        unsafe { gl::AttachShader(program.raw(), shader.0.get()) };
    }

    fn detach_shader(&self, program: ProgramHandle, shader: ShaderHandle) {
        unsafe { gl::DetachShader(program.raw(), shader.0.get()) };
    }

    fn link_program(&self, program: ProgramHandle) {
        unsafe { gl::LinkProgram(program.raw()) };
    }

    fn program_link_status(&self, program: ProgramHandle) -> bool {
        let mut success = 0;
        unsafe { gl::GetProgramiv(program.raw(), gl::LINK_STATUS, &mut success) };
        success != 0
    }

    fn program_info_log(&self, program: ProgramHandle) -> String {
        let mut len = 0;
        unsafe { gl::GetProgramiv(program.raw(), gl::INFO_LOG_LENGTH, &mut len) };
        read_info_log(len, |size, written, buffer| unsafe {
            gl::GetProgramInfoLog(program.raw(), size, written, buffer);
        })
    }

    fn delete_program(&self, program: ProgramHandle) {
        unsafe { gl::DeleteProgram(program.raw()) };
    }

    fn use_program(&self, program: Option<ProgramHandle>) {
        unsafe { gl::UseProgram(program.map_or(0, ProgramHandle::raw)) };
    }

    fn current_program(&self) -> Option<ProgramHandle> {
        let mut current: GLint = 0;
        unsafe { gl::GetIntegerv(gl::CURRENT_PROGRAM, &mut current) };
        u32::try_from(current)
            .ok()
            .and_then(NonZeroU32::new)
            .map(ProgramHandle)
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        let name = CString::new(name).ok()?;
        let location = unsafe { gl::GetUniformLocation(program.raw(), name.as_ptr()) };
        u32::try_from(location).ok().map(UniformLocation)
    }

    fn uniform_f32(&self, location: UniformLocation, value: f32) {
        unsafe { gl::Uniform1f(location.0 as GLint, value) };
    }

    fn uniform_vec4(&self, location: UniformLocation, value: [f32; 4]) {
        unsafe { gl::Uniform4fv(location.0 as GLint, 1, value.as_ptr()) };
    }

    fn uniform_mat4(&self, location: UniformLocation, value: &[f32; 16]) {
        unsafe { gl::UniformMatrix4fv(location.0 as GLint, 1, gl::FALSE, value.as_ptr()) };
    }
}
