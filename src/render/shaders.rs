// shaders.rs - Shader program loading, compilation and binding

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use glam::{Mat4, Vec4};
use log::{debug, info, warn};
use thiserror::Error;

use super::context::{GpuContext, ProgramHandle, ShaderHandle, ShaderStage, UniformLocation};
use super::source::{ParseError, ShaderSource};

#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("could not read shader file {path:?}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not parse shader '{origin}': {source}")]
    Parse {
        origin: String,
        #[source]
        source: ParseError,
    },
    #[error("{stage} shader compilation failed:\n{log}")]
    Compile { stage: ShaderStage, log: String },
    #[error("shader program linking failed:\n{log}")]
    Link { log: String },
    #[error("shader program is not linked (state: {state:?})")]
    NotReady { state: ProgramState },
    #[error("GPU object creation failed: {0}")]
    Resource(String),
}

/// Lifecycle of a [`ShaderProgram`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramState {
    Unloaded,
    Parsed,
    Compiled,
    Linked,
}

/// A vertex + fragment program loaded from one `#type`-tagged source file.
///
/// Construction parses the file; [`compile`](Self::compile) builds the GPU
/// program. Binding goes through the context passed in, since the active
/// program is context-wide state. Call [`destroy`](Self::destroy) with the
/// same context to free the program.
pub struct ShaderProgram {
    origin: String,
    source: ShaderSource,
    state: ProgramState,
    program: Option<ProgramHandle>,
    uniforms: HashMap<String, Option<UniformLocation>>,
}

impl ShaderProgram {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ShaderError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ShaderError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_source(path.display().to_string(), &text)
    }

    /// Parses in-memory source. `origin` names it in errors and logs.
    pub fn from_source(origin: impl Into<String>, text: &str) -> Result<Self, ShaderError> {
        let origin = origin.into();
        let source = ShaderSource::parse(text).map_err(|source| ShaderError::Parse {
            origin: origin.clone(),
            source,
        })?;
        debug!("Parsed shader '{}'", origin);

        Ok(Self {
            origin,
            source,
            state: ProgramState::Parsed,
            program: None,
            uniforms: HashMap::new(),
        })
    }

    /// Compiles both stages and links them. A no-op once linked.
    ///
    /// On failure every object created by this call is deleted and the
    /// program stays parsed.
    pub fn compile<C: GpuContext + ?Sized>(&mut self, ctx: &C) -> Result<(), ShaderError> {
        if self.state == ProgramState::Linked {
            debug!("Shader '{}' already linked", self.origin);
            return Ok(());
        }

        let mut stages = Vec::with_capacity(ShaderStage::ALL.len());
        for stage in ShaderStage::ALL {
            match compile_stage(ctx, stage, self.source.stage(stage)) {
                Ok(shader) => stages.push(shader),
                Err(err) => {
                    for shader in stages {
                        ctx.delete_shader(shader);
                    }
                    return Err(err);
                }
            }
        }
        self.state = ProgramState::Compiled;

        let linked = link_stages(ctx, &stages);
        for shader in stages {
            ctx.delete_shader(shader);
        }

        match linked {
            Ok(program) => {
                info!("Linked shader '{}' as program {}", self.origin, program.raw());
                self.program = Some(program);
                self.state = ProgramState::Linked;
                Ok(())
            }
            Err(err) => {
                self.state = ProgramState::Parsed;
                Err(err)
            }
        }
    }

    /// Makes this the active program. Skips the bind if it already is.
    pub fn use_program<C: GpuContext + ?Sized>(&self, ctx: &C) -> Result<(), ShaderError> {
        let program = self.ready()?;
        if ctx.current_program() != Some(program) {
            ctx.use_program(Some(program));
        }
        Ok(())
    }

    /// Leaves the context with no active program.
    pub fn detach<C: GpuContext + ?Sized>(&self, ctx: &C) -> Result<(), ShaderError> {
        self.ready()?;
        if ctx.current_program().is_some() {
            ctx.use_program(None);
        }
        Ok(())
    }

    /// Frees the GPU program, unbinding it first if it is active.
    pub fn destroy<C: GpuContext + ?Sized>(mut self, ctx: &C) {
        if let Some(program) = self.program.take() {
            if ctx.current_program() == Some(program) {
                ctx.use_program(None);
            }
            ctx.delete_program(program);
            debug!("Deleted program {} ('{}')", program.raw(), self.origin);
        }
        self.state = ProgramState::Unloaded;
    }

    pub fn uniform_location<C: GpuContext + ?Sized>(
        &mut self,
        ctx: &C,
        name: &str,
    ) -> Result<Option<UniformLocation>, ShaderError> {
        let program = self.ready()?;
        if let Some(location) = self.uniforms.get(name) {
            return Ok(*location);
        }

        let location = ctx.uniform_location(program, name);
        if location.is_none() {
            warn!("Uniform '{}' not found in shader '{}'", name, self.origin);
        }
        self.uniforms.insert(name.to_string(), location);
        Ok(location)
    }

    // Uniform setters bind the program first; unknown names are skipped.

    pub fn set_f32<C: GpuContext + ?Sized>(
        &mut self,
        ctx: &C,
        name: &str,
        value: f32,
    ) -> Result<(), ShaderError> {
        self.use_program(ctx)?;
        if let Some(location) = self.uniform_location(ctx, name)? {
            ctx.uniform_f32(location, value);
        }
        Ok(())
    }

    pub fn set_vec4<C: GpuContext + ?Sized>(
        &mut self,
        ctx: &C,
        name: &str,
        value: Vec4,
    ) -> Result<(), ShaderError> {
        self.use_program(ctx)?;
        if let Some(location) = self.uniform_location(ctx, name)? {
            ctx.uniform_vec4(location, value.to_array());
        }
        Ok(())
    }

    pub fn set_mat4<C: GpuContext + ?Sized>(
        &mut self,
        ctx: &C,
        name: &str,
        value: &Mat4,
    ) -> Result<(), ShaderError> {
        self.use_program(ctx)?;
        if let Some(location) = self.uniform_location(ctx, name)? {
            ctx.uniform_mat4(location, &value.to_cols_array());
        }
        Ok(())
    }

    pub fn state(&self) -> ProgramState {
        self.state
    }

    /// The linked program, if any.
    pub fn handle(&self) -> Option<ProgramHandle> {
        self.program
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn source(&self) -> &ShaderSource {
        &self.source
    }

    fn ready(&self) -> Result<ProgramHandle, ShaderError> {
        match (self.state, self.program) {
            (ProgramState::Linked, Some(program)) => Ok(program),
            (state, _) => Err(ShaderError::NotReady { state }),
        }
    }
}

impl Drop for ShaderProgram {
    fn drop(&mut self) {
        if let Some(program) = self.program {
            warn!(
                "Shader '{}' dropped without destroy; program {} leaked",
                self.origin,
                program.raw()
            );
        }
    }
}

fn compile_stage<C: GpuContext + ?Sized>(
    ctx: &C,
    stage: ShaderStage,
    source: &str,
) -> Result<ShaderHandle, ShaderError> {
    let shader = ctx.create_shader(stage).map_err(ShaderError::Resource)?;
    ctx.shader_source(shader, source);
    ctx.compile_shader(shader);

    if !ctx.shader_compile_status(shader) {
        let log = ctx.shader_info_log(shader);
        ctx.delete_shader(shader);
        return Err(ShaderError::Compile { stage, log });
    }

    debug!("Compiled {} stage", stage);
    Ok(shader)
}

/// Links `stages` into a new program. The stages are detached afterwards
/// either way; deleting them is left to the caller.
fn link_stages<C: GpuContext + ?Sized>(
    ctx: &C,
    stages: &[ShaderHandle],
) -> Result<ProgramHandle, ShaderError> {
    let program = ctx.create_program().map_err(ShaderError::Resource)?;
    for &shader in stages {
        ctx.attach_shader(program, shader);
    }
    ctx.link_program(program);
    let linked = ctx.program_link_status(program);
    for &shader in stages {
        ctx.detach_shader(program, shader);
    }

    if !linked {
        let log = ctx.program_info_log(program);
        ctx.delete_program(program);
        return Err(ShaderError::Link { log });
    }
    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::headless::{HeadlessContext, UniformValue};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const QUAD: &str = "#type vertex\n\
        #version 330 core\n\
        layout (location=0) in vec3 aPos;\n\
        layout (location=1) in vec4 aColor;\n\
        out vec4 fColor;\n\
        uniform float uScale;\n\
        void main()\n\
        {\n\
            fColor = aColor;\n\
            gl_Position = vec4(aPos * uScale, 1.0);\n\
        }\n\
        #type fragment\n\
        #version 330 core\n\
        in vec4 fColor;\n\
        out vec4 color;\n\
        uniform vec4 uTint;\n\
        uniform mat4 uView;\n\
        void main() {\n\
            color = fColor * uTint;\n\
        }\n";

    fn linked(ctx: &HeadlessContext) -> ShaderProgram {
        let mut shader = ShaderProgram::from_source("quad", QUAD).unwrap();
        shader.compile(ctx).unwrap();
        shader
    }

    #[test]
    fn test_from_file_end_to_end() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(QUAD.as_bytes()).unwrap();

        let ctx = HeadlessContext::new();
        let mut shader = ShaderProgram::from_file(file.path()).unwrap();
        assert_eq!(shader.state(), ProgramState::Parsed);

        shader.compile(&ctx).unwrap();
        shader.use_program(&ctx).unwrap();

        let handle = shader.handle().unwrap();
        assert_ne!(handle.raw(), 0);
        assert_eq!(ctx.current_program(), Some(handle));
        assert_eq!(shader.state(), ProgramState::Linked);
        // stage objects are freed once linked
        assert_eq!(ctx.live_shaders(), 0);
        shader.destroy(&ctx);
    }

    #[test]
    fn test_missing_file_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ShaderProgram::from_file(dir.path().join("missing.glsl"))
            .err()
            .unwrap();
        assert!(matches!(err, ShaderError::Load { .. }));
    }

    #[test]
    fn test_bad_markers_are_parse_errors() {
        let err = ShaderProgram::from_source("one", "#type vertex\nvoid main() {}\n")
            .err()
            .unwrap();
        assert!(matches!(
            err,
            ShaderError::Parse {
                source: ParseError::WrongSectionCount { found: 1 },
                ..
            }
        ));

        let err = ShaderProgram::from_source("geom", "#type vertex\nA\n#type geometry\nB\n")
            .err()
            .unwrap();
        assert!(matches!(
            err,
            ShaderError::Parse {
                source: ParseError::UnknownStage { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_compile_error_keeps_log_and_cleans_up() {
        let ctx = HeadlessContext::new();
        let text = QUAD.replace("color = fColor * uTint;", "color = fColor * uTint;}");
        let mut shader = ShaderProgram::from_source("broken", &text).unwrap();

        match shader.compile(&ctx) {
            Err(ShaderError::Compile { stage, log }) => {
                assert_eq!(stage, ShaderStage::Fragment);
                assert!(!log.is_empty());
            }
            other => panic!("expected compile error, got {other:?}"),
        }
        assert_eq!(shader.state(), ProgramState::Parsed);
        assert_eq!(ctx.live_shaders(), 0);
        assert_eq!(ctx.live_programs(), 0);
    }

    #[test]
    fn test_link_error_on_interface_mismatch() {
        let ctx = HeadlessContext::new();
        let text = QUAD
            .replace("out vec4 fColor;\n", "")
            .replace("fColor = aColor;\n", "");
        let mut shader = ShaderProgram::from_source("mismatch", &text).unwrap();

        match shader.compile(&ctx) {
            Err(ShaderError::Link { log }) => assert!(log.contains("fColor"), "{log}"),
            other => panic!("expected link error, got {other:?}"),
        }
        assert!(shader.handle().is_none());
        assert_eq!(ctx.live_shaders(), 0);
        assert_eq!(ctx.live_programs(), 0);
    }

    #[test]
    fn test_use_and_detach_before_link_fail() {
        let ctx = HeadlessContext::new();
        let shader = ShaderProgram::from_source("quad", QUAD).unwrap();

        assert!(matches!(
            shader.use_program(&ctx),
            Err(ShaderError::NotReady {
                state: ProgramState::Parsed
            })
        ));
        assert!(matches!(
            shader.detach(&ctx),
            Err(ShaderError::NotReady { .. })
        ));
        assert_eq!(ctx.bind_calls(), 0);
    }

    #[test]
    fn test_use_and_detach_are_idempotent() {
        let ctx = HeadlessContext::new();
        let shader = linked(&ctx);

        shader.use_program(&ctx).unwrap();
        shader.use_program(&ctx).unwrap();
        assert_eq!(ctx.bind_calls(), 1);
        assert_eq!(ctx.current_program(), shader.handle());

        shader.detach(&ctx).unwrap();
        shader.detach(&ctx).unwrap();
        assert_eq!(ctx.bind_calls(), 2);
        assert_eq!(ctx.current_program(), None);
        shader.destroy(&ctx);
    }

    #[test]
    fn test_compile_twice_is_noop() {
        let ctx = HeadlessContext::new();
        let mut shader = linked(&ctx);
        let handle = shader.handle();

        shader.compile(&ctx).unwrap();
        assert_eq!(shader.handle(), handle);
        assert_eq!(ctx.live_programs(), 1);
        shader.destroy(&ctx);
    }

    #[test]
    fn test_contexts_do_not_share_binding() {
        let first = HeadlessContext::new();
        let second = HeadlessContext::new();
        let a = linked(&first);
        let b = linked(&second);

        a.use_program(&first).unwrap();
        assert_eq!(first.current_program(), a.handle());
        assert_eq!(second.current_program(), None);

        b.use_program(&second).unwrap();
        a.detach(&first).unwrap();
        assert_eq!(first.current_program(), None);
        assert_eq!(second.current_program(), b.handle());

        a.destroy(&first);
        b.destroy(&second);
    }

    #[test]
    fn test_rebinding_after_another_program() {
        let ctx = HeadlessContext::new();
        let a = linked(&ctx);
        let b = linked(&ctx);
        assert_ne!(a.handle(), b.handle());

        a.use_program(&ctx).unwrap();
        b.use_program(&ctx).unwrap();
        a.use_program(&ctx).unwrap();
        assert_eq!(ctx.current_program(), a.handle());
        assert_eq!(ctx.bind_calls(), 3);

        a.destroy(&ctx);
        b.destroy(&ctx);
    }

    #[test]
    fn test_destroy_unbinds_and_frees() {
        let ctx = HeadlessContext::new();
        let shader = linked(&ctx);
        shader.use_program(&ctx).unwrap();

        shader.destroy(&ctx);
        assert_eq!(ctx.current_program(), None);
        assert_eq!(ctx.live_programs(), 0);
    }

    #[test]
    fn test_uniform_uploads() {
        let ctx = HeadlessContext::new();
        let mut shader = linked(&ctx);

        shader.set_f32(&ctx, "uScale", 0.5).unwrap();
        shader.set_vec4(&ctx, "uTint", Vec4::new(1.0, 0.0, 0.0, 1.0)).unwrap();
        shader.set_mat4(&ctx, "uView", &Mat4::IDENTITY).unwrap();
        shader.set_f32(&ctx, "uMissing", 1.0).unwrap();

        let uploads = ctx.uniform_uploads();
        assert_eq!(uploads.len(), 3);
        assert_eq!(uploads[0], (UniformLocation(0), UniformValue::F32(0.5)));
        assert_eq!(
            uploads[1],
            (UniformLocation(1), UniformValue::Vec4([1.0, 0.0, 0.0, 1.0]))
        );
        assert_eq!(
            uploads[2],
            (
                UniformLocation(2),
                UniformValue::Mat4(Mat4::IDENTITY.to_cols_array())
            )
        );
        assert_eq!(ctx.current_program(), shader.handle());
        shader.destroy(&ctx);
    }

    #[test]
    fn test_uniform_location_is_cached() {
        let ctx = HeadlessContext::new();
        let mut shader = linked(&ctx);

        let first = shader.uniform_location(&ctx, "uTint").unwrap();
        let missing = shader.uniform_location(&ctx, "uNope").unwrap();
        assert_eq!(first, Some(UniformLocation(1)));
        assert_eq!(missing, None);
        assert_eq!(shader.uniforms.len(), 2);
        assert_eq!(shader.uniform_location(&ctx, "uTint").unwrap(), first);
        shader.destroy(&ctx);
    }

    #[test]
    fn test_uniforms_require_link() {
        let ctx = HeadlessContext::new();
        let mut shader = ShaderProgram::from_source("quad", QUAD).unwrap();
        assert!(matches!(
            shader.set_f32(&ctx, "uScale", 1.0),
            Err(ShaderError::NotReady { .. })
        ));
    }
}
