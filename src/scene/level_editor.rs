use std::path::PathBuf;
use std::ptr;

use gl::types::*;
use log::{debug, info};

use crate::render::mesh::{MeshData, COLOR_VERTEX_ATTRIBUTES, COLOR_VERTEX_STRIDE};
use crate::render::{GlContext, GpuContext, ShaderProgram};
use crate::utils::error::{EngineError, Result};

use super::{FpsCounter, Scene};

struct QuadBuffers {
    vao: GLuint,
    vbo: GLuint,
    ebo: GLuint,
}

/// Draws a colored quad with the configured shader.
pub struct LevelEditorScene {
    shader_path: PathBuf,
    mesh: MeshData,
    shader: Option<ShaderProgram>,
    buffers: Option<QuadBuffers>,
    fps: FpsCounter,
}

impl LevelEditorScene {
    pub fn new(shader_path: impl Into<PathBuf>) -> Self {
        Self {
            shader_path: shader_path.into(),
            mesh: MeshData::colored_quad(),
            shader: None,
            buffers: None,
            fps: FpsCounter::default(),
        }
    }

    /// Reads and links the scene's shader program.
    fn load_shader<C: GpuContext + ?Sized>(&mut self, ctx: &C) -> Result<()> {
        let mut shader = ShaderProgram::from_file(&self.shader_path)?;
        shader.compile(ctx)?;
        self.shader = Some(shader);
        Ok(())
    }

    /// Binds the shader around `draw` and unbinds it again afterwards.
    fn render<C, F>(&mut self, ctx: &C, dt: f32, draw: F) -> Result<()>
    where
        C: GpuContext + ?Sized,
        F: FnOnce(&QuadBuffers, GLsizei),
    {
        if let Some(fps) = self.fps.tick(dt) {
            debug!("FPS: {:.1}", fps);
        }

        let (Some(shader), Some(buffers)) = (&self.shader, &self.buffers) else {
            return Err(EngineError::Render(
                "level editor scene updated before init".to_string(),
            ));
        };

        shader.use_program(ctx)?;
        draw(buffers, self.mesh.index_count());
        shader.detach(ctx)?;
        Ok(())
    }
}

/// Uploads `mesh` into a new VAO with its vertex and element buffers.
///
/// # Safety
/// GL must be loaded and current on this thread.
unsafe fn upload(mesh: &MeshData) -> QuadBuffers {
    let (mut vao, mut vbo, mut ebo) = (0, 0, 0);

    gl::GenVertexArrays(1, &mut vao);
    gl::BindVertexArray(vao);

    let vertices = mesh.vertex_bytes();
    gl::GenBuffers(1, &mut vbo);
    gl::BindBuffer(gl::ARRAY_BUFFER, vbo);
    gl::BufferData(
        gl::ARRAY_BUFFER,
        vertices.len() as GLsizeiptr,
        vertices.as_ptr() as *const _,
        gl::STATIC_DRAW,
    );

    let indices = mesh.index_bytes();
    gl::GenBuffers(1, &mut ebo);
    gl::BindBuffer(gl::ELEMENT_ARRAY_BUFFER, ebo);
    gl::BufferData(
        gl::ELEMENT_ARRAY_BUFFER,
        indices.len() as GLsizeiptr,
        indices.as_ptr() as *const _,
        gl::STATIC_DRAW,
    );

    for attribute in COLOR_VERTEX_ATTRIBUTES {
        gl::VertexAttribPointer(
            attribute.location,
            attribute.components,
            gl::FLOAT,
            gl::FALSE,
            COLOR_VERTEX_STRIDE,
            attribute.offset as *const _,
        );
        gl::EnableVertexAttribArray(attribute.location);
    }

    // the element buffer binding stays recorded in the VAO
    gl::BindVertexArray(0);
    gl::BindBuffer(gl::ARRAY_BUFFER, 0);

    QuadBuffers { vao, vbo, ebo }
}

impl Scene for LevelEditorScene {
    fn init(&mut self, ctx: &GlContext) -> Result<()> {
        self.load_shader(ctx)?;

        let buffers = unsafe { upload(&self.mesh) };
        debug!(
            "Uploaded quad: vao {}, {} vertices, {} indices",
            buffers.vao,
            self.mesh.vertices.len(),
            self.mesh.indices.len()
        );
        self.buffers = Some(buffers);

        info!("Level editor scene ready");
        Ok(())
    }

    fn update(&mut self, ctx: &GlContext, dt: f32) -> Result<()> {
        self.render(ctx, dt, |buffers, count| unsafe {
            gl::BindVertexArray(buffers.vao);
            gl::DrawElements(gl::TRIANGLES, count, gl::UNSIGNED_INT, ptr::null());
            gl::BindVertexArray(0);
        })
    }

    fn destroy(&mut self, ctx: &GlContext) {
        if let Some(buffers) = self.buffers.take() {
            unsafe {
                gl::DeleteVertexArrays(1, &buffers.vao);
                gl::DeleteBuffers(1, &buffers.vbo);
                gl::DeleteBuffers(1, &buffers.ebo);
            }
        }
        if let Some(shader) = self.shader.take() {
            shader.destroy(ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{HeadlessContext, ShaderSource};

    #[test]
    fn test_new_scene_holds_quad() {
        let scene = LevelEditorScene::new("assets/shaders/default.glsl");
        assert_eq!(scene.mesh.index_count(), 6);
        assert!(scene.shader.is_none());
        assert!(scene.buffers.is_none());
    }

    const BUNDLED: &str = include_str!("../../assets/shaders/default.glsl");

    fn fake_buffers() -> QuadBuffers {
        QuadBuffers {
            vao: 1,
            vbo: 2,
            ebo: 3,
        }
    }

    fn loaded_scene(ctx: &HeadlessContext) -> (LevelEditorScene, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("default.glsl");
        std::fs::write(&path, BUNDLED).unwrap();

        let mut scene = LevelEditorScene::new(path.clone());
        scene.load_shader(ctx).unwrap();
        scene.buffers = Some(fake_buffers());
        (scene, dir)
    }

    #[test]
    fn test_update_before_init_is_render_error() {
        let ctx = HeadlessContext::new();
        let mut scene = LevelEditorScene::new("assets/shaders/default.glsl");
        let mut drawn = false;

        let result = scene.render(&ctx, 0.016, |_, _| drawn = true);
        assert!(matches!(result, Err(EngineError::Render(_))));
        assert!(!drawn);
        assert_eq!(ctx.bind_calls(), 0);
    }

    #[test]
    fn test_update_without_buffers_is_render_error() {
        let ctx = HeadlessContext::new();
        let (mut scene, _dir) = loaded_scene(&ctx);
        scene.buffers = None;

        let result = scene.render(&ctx, 0.016, |_, _| {});
        assert!(matches!(result, Err(EngineError::Render(_))));
        assert_eq!(ctx.current_program(), None);
    }

    #[test]
    fn test_load_shader_links_program_from_file() {
        let ctx = HeadlessContext::new();
        let (scene, _dir) = loaded_scene(&ctx);
        let shader = scene.shader.as_ref().unwrap();
        assert!(shader.handle().is_some());
        assert_eq!(ctx.live_programs(), 1);
        assert_eq!(ctx.live_shaders(), 0);
    }

    #[test]
    fn test_load_shader_missing_file_is_shader_error() {
        let ctx = HeadlessContext::new();
        let dir = tempfile::tempdir().unwrap();
        let mut scene = LevelEditorScene::new(dir.path().join("missing.glsl"));

        let result = scene.load_shader(&ctx);
        assert!(matches!(result, Err(EngineError::Shader(_))));
        assert!(scene.shader.is_none());
    }

    #[test]
    fn test_update_binds_only_while_drawing() {
        let ctx = HeadlessContext::new();
        let (mut scene, _dir) = loaded_scene(&ctx);
        let handle = scene.shader.as_ref().and_then(ShaderProgram::handle);

        for _ in 0..3 {
            let mut bound_during_draw = None;
            let mut drawn_count = 0;
            scene
                .render(&ctx, 0.016, |buffers, count| {
                    assert_eq!(buffers.vao, 1);
                    bound_during_draw = ctx.current_program();
                    drawn_count = count;
                })
                .unwrap();

            assert_eq!(bound_during_draw, handle);
            assert_eq!(drawn_count, 6);
            assert_eq!(ctx.current_program(), None);
        }

        if let Some(shader) = scene.shader.take() {
            shader.destroy(&ctx);
        }
        assert_eq!(ctx.live_programs(), 0);
    }

    #[test]
    fn test_bundled_shader_matches_quad_layout() {
        let source = ShaderSource::parse(BUNDLED).unwrap();
        assert!(source.vertex().contains("layout (location=0) in vec3 aPos;"));
        assert!(source.vertex().contains("layout (location=1) in vec4 aColor;"));
        assert!(source.fragment().contains("in vec4 fColor;"));

        let ctx = HeadlessContext::new();
        let mut shader = ShaderProgram::from_source("default.glsl", BUNDLED).unwrap();
        shader.compile(&ctx).unwrap();
        assert!(shader.handle().is_some());
        shader.destroy(&ctx);
    }
}
