mod platform;
mod stats;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use color_eyre::eyre::{Report, Result, WrapErr};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowId};
use crate::app::platform::WindowSurface;
use crate::app::stats::FrameStats;
use crate::renderer::core::config::RenderConfig;
use crate::renderer::core::error::{FrameOutcome, SkipReason};
use crate::renderer::resources::texture::{checkerboard, TextureData};
use crate::renderer::Renderer;

/// Size of the generated texture used when no image file is given
const FALLBACK_TEXTURE_SIZE: u32 = 256;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub texture_path: Option<PathBuf>,
    pub render: RenderConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        let render = RenderConfig::default();
        Self {
            title: "quadra".into(),
            width: render.default_extent.width,
            height: render.default_extent.height,
            texture_path: None,
            render,
        }
    }
}

/// Open a window and render until it is closed
pub fn run(config: AppConfig) -> Result<()> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

struct App {
    config: AppConfig,
    // Declared before the window so it is dropped first
    renderer: Option<Renderer>,
    window: Option<Arc<Window>>,

    // State
    stats: FrameStats,
    minimized: bool,
    error: Option<Report>,
}

impl App {
    fn new(config: AppConfig) -> Self {
        Self {
            config,
            renderer: None,
            window: None,
            stats: FrameStats::new(Instant::now()),
            minimized: false,
            error: None,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attributes = Window::default_attributes()
            .with_title(&self.config.title)
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height));
        let window = Arc::new(event_loop.create_window(attributes)?);

        let (pixels, width, height) = match &self.config.texture_path {
            Some(path) => load_texture(path)?,
            None => (
                checkerboard(FALLBACK_TEXTURE_SIZE, 8),
                FALLBACK_TEXTURE_SIZE,
                FALLBACK_TEXTURE_SIZE,
            ),
        };

        let provider = Arc::new(WindowSurface::new(window.clone()));
        let renderer = Renderer::new(
            provider,
            self.config.render.clone(),
            Some(TextureData {
                pixels: &pixels,
                width,
                height,
            }),
        )?;
        log::debug!("Renderer ready with {} frames in flight", renderer.flight_count());

        self.window = Some(window);
        self.renderer = Some(renderer);
        Ok(())
    }

    fn draw(&mut self) -> Result<()> {
        let Some(renderer) = self.renderer.as_mut() else {
            return Ok(());
        };

        match renderer.draw_frame()? {
            FrameOutcome::Presented => {
                if let Some(fps) = self.stats.frame_presented(Instant::now()) {
                    log::info!("{:.1} fps", fps);
                }
            }
            FrameOutcome::Skipped(SkipReason::SwapchainRecreated) => {
                log::debug!("Frame skipped: swapchain recreated");
            }
            FrameOutcome::Skipped(SkipReason::Minimized) => {
                self.minimized = true;
            }
        }
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: Report) {
        log::error!("{:?}", error);
        self.error = Some(error);
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.renderer.is_some() {
            return;
        }
        if let Err(e) = self.init(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.window.as_ref().is_none_or(|w| w.id() != window_id) {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                self.minimized = size.width == 0 || size.height == 0;
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.notify_resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.draw() {
                    self.fail(event_loop, e);
                }
            }
            WindowEvent::KeyboardInput {
                event:
                KeyEvent {
                    logical_key: Key::Named(NamedKey::Escape),
                    state: ElementState::Pressed,
                    ..
                },
                ..
            } => {
                event_loop.exit();
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        // A minimized window gets no redraws; the loop sleeps until the next resize
        if self.minimized {
            return;
        }
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        // GPU resources go before the window they present to
        self.renderer = None;
        self.window = None;
    }
}

fn load_texture(path: &Path) -> Result<(Vec<u8>, u32, u32)> {
    let image = image::open(path)
        .wrap_err_with(|| format!("Failed to load texture {}", path.display()))?
        .to_rgba8();
    let (width, height) = image.dimensions();
    log::info!("Loaded texture {} ({}x{})", path.display(), width, height);
    Ok((image.into_raw(), width, height))
}
