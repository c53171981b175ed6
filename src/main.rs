use anyhow::{anyhow, Context, Result};
use glutin::{
    config::{ConfigTemplateBuilder, GlConfig},
    context::{
        ContextApi, ContextAttributesBuilder, GlProfile, NotCurrentGlContext,
        PossiblyCurrentContext, Version,
    },
    display::{GetGlDisplay, GlDisplay},
    surface::{GlSurface, Surface, SwapInterval, WindowSurface},
};
use glutin_winit::{DisplayBuilder, GlWindow};
use log::{error, info, warn};
use raw_window_handle::HasRawWindowHandle;
use simple_logger::SimpleLogger;
use std::{num::NonZeroU32, path::PathBuf, time::Instant};
use winit::{
    dpi::LogicalSize,
    event::{Event, WindowEvent},
    event_loop::{EventLoop, EventLoopBuilder},
    window::{Window, WindowBuilder},
};

use jade::{
    config::{default_config_path, EngineConfig},
    render::GlContext,
    scene::{LevelEditorScene, Scene},
};

struct App {
    window: Window,
    gl_context: PossiblyCurrentContext,
    gl_surface: Surface<WindowSurface>,
    gl: GlContext,
    scene: Option<Box<dyn Scene>>,
    last_frame: Instant,
}

impl App {
    fn new(config: &EngineConfig) -> Result<(Self, EventLoop<()>)> {
        info!("Initializing application...");

        let event_loop = EventLoopBuilder::new().build()?;
        let window_builder = WindowBuilder::new()
            .with_title(&config.window.title)
            .with_inner_size(LogicalSize::new(config.window.width, config.window.height));

        let template = ConfigTemplateBuilder::new()
            .with_alpha_size(8)
            .with_depth_size(24);

        let display_builder = DisplayBuilder::new().with_window_builder(Some(window_builder));

        let (window, gl_config) = display_builder
            .build(&event_loop, template, |configs| {
                configs
                    .reduce(|accum, config| {
                        if config.num_samples() > accum.num_samples() {
                            config
                        } else {
                            accum
                        }
                    })
                    .expect("display offered no OpenGL configs")
            })
            .map_err(|e| anyhow!("Failed to create window: {e}"))?;

        let window = window.context("Display builder did not create a window")?;
        let raw_window_handle = window.raw_window_handle();

        let [major, minor] = config.render.gl_version;
        let context_attributes = ContextAttributesBuilder::new()
            .with_context_api(ContextApi::OpenGl(Some(Version::new(major, minor))))
            .with_profile(GlProfile::Core)
            .build(Some(raw_window_handle));

        let gl_display = gl_config.display();

        let gl_context = unsafe { gl_display.create_context(&gl_config, &context_attributes) }
            .context("Failed to create OpenGL context")?;

        let attrs = window.build_surface_attributes(<_>::default());
        let gl_surface = unsafe { gl_display.create_window_surface(&gl_config, &attrs) }
            .context("Failed to create GL surface")?;

        let gl_context = gl_context
            .make_current(&gl_surface)
            .context("Failed to make context current")?;

        if config.window.vsync {
            if let Err(e) =
                gl_surface.set_swap_interval(&gl_context, SwapInterval::Wait(NonZeroU32::MIN))
            {
                warn!("Could not enable vsync: {}", e);
            }
        }

        // Load OpenGL functions
        let gl = unsafe { GlContext::load_with(|symbol| gl_display.get_proc_address(symbol)) };
        info!("OpenGL {}", gl.version());

        let [r, g, b, a] = config.render.clear_color;
        unsafe {
            gl::ClearColor(r, g, b, a);
        }

        let mut scene: Box<dyn Scene> =
            Box::new(LevelEditorScene::new(&config.render.shader_path));
        scene
            .init(&gl)
            .context("Failed to initialize level editor scene")?;

        Ok((
            Self {
                window,
                gl_context,
                gl_surface,
                gl,
                scene: Some(scene),
                last_frame: Instant::now(),
            },
            event_loop,
        ))
    }

    fn resize(&mut self, width: u32, height: u32) {
        // zero while minimized
        let (Some(w), Some(h)) = (NonZeroU32::new(width), NonZeroU32::new(height)) else {
            return;
        };
        self.gl_surface.resize(&self.gl_context, w, h);
        unsafe {
            gl::Viewport(0, 0, width as i32, height as i32);
        }
    }

    fn redraw(&mut self) -> Result<()> {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        unsafe {
            gl::Clear(gl::COLOR_BUFFER_BIT);
        }
        if let Some(scene) = &mut self.scene {
            scene.update(&self.gl, dt)?;
        }

        self.gl_surface
            .swap_buffers(&self.gl_context)
            .context("Failed to swap buffers")?;
        Ok(())
    }

    fn cleanup(&mut self) {
        if let Some(mut scene) = self.scene.take() {
            scene.destroy(&self.gl);
            info!("Scene destroyed");
        }
    }
}

fn main() -> Result<()> {
    let config_path = match std::env::args_os().nth(1) {
        Some(path) => PathBuf::from(path),
        None => default_config_path()?,
    };
    let config = EngineConfig::load_or_create(&config_path)?;

    SimpleLogger::new()
        .with_level(config.log_level_filter())
        .init()?;
    info!("Using config {}", config_path.display());

    let (mut app, event_loop) = App::new(&config)?;

    event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { event, .. } => match event {
            WindowEvent::CloseRequested => {
                app.cleanup();
                elwt.exit();
            }
            WindowEvent::Resized(size) => app.resize(size.width, size.height),
            WindowEvent::RedrawRequested => {
                if let Err(e) = app.redraw() {
                    error!("Frame failed: {:#}", e);
                    app.cleanup();
                    elwt.exit();
                }
            }
            _ => (),
        },
        Event::AboutToWait => {
            app.window.request_redraw();
        }
        _ => (),
    })?;

    Ok(())
}
