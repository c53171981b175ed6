pub mod level_editor;

pub use level_editor::LevelEditorScene;

use crate::render::GlContext;
use crate::utils::error::Result;

/// A unit of content driven by the render loop.
pub trait Scene {
    /// Creates GPU resources. Called once with the context current.
    fn init(&mut self, ctx: &GlContext) -> Result<()>;

    /// Draws one frame; `dt` is the time since the previous frame in seconds.
    fn update(&mut self, ctx: &GlContext, dt: f32) -> Result<()>;

    fn destroy(&mut self, ctx: &GlContext);
}

/// Averages the frame rate over roughly one-second windows.
#[derive(Debug, Default)]
pub struct FpsCounter {
    frames: u32,
    elapsed: f32,
}

impl FpsCounter {
    const WINDOW: f32 = 1.0;

    /// Records a frame, returning the average rate once a window closes.
    pub fn tick(&mut self, dt: f32) -> Option<f32> {
        self.frames += 1;
        self.elapsed += dt.max(0.0);
        if self.elapsed < Self::WINDOW {
            return None;
        }

        let fps = self.frames as f32 / self.elapsed;
        self.frames = 0;
        self.elapsed = 0.0;
        Some(fps)
    }
}
