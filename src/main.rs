// =============================================================================
// GPU BOOTSTRAP - device selection and presentation chain demo
// =============================================================================
//
// Opens a window, picks a GPU, creates the logical device and the swapchain,
// and keeps the swapchain matched to the window until it is closed.
//
// OWNERSHIP:
// ┌─────────────────────────────────────────────────────────────────┐
// │  App                                                            │
// │    └── Presenter                                                │
// │          ├── PresentationChain (swapchain + image views)        │
// │          ├── SelectedDevice (logical device + queues)           │
// │          ├── WindowSurface                                      │
// │          ├── VulkanInstance (+ debug messenger)                 │
// │          └── Window                                             │
// └─────────────────────────────────────────────────────────────────┘
// Destroyed top to bottom.
//
// =============================================================================

use anyhow::{Context, Result};
use gpu_bootstrap::backend::{Presenter, VulkanInstance, WindowSurface};
use gpu_bootstrap::config::Config;
use raw_window_handle::HasRawDisplayHandle;
use std::sync::Arc;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowAttributes},
};

type WindowPresenter = Presenter<VulkanInstance, WindowSurface, Arc<Window>>;

// =============================================================================
// ENTRY POINT
// =============================================================================

fn main() -> Result<()> {
    // Load configuration from config.toml
    let (config, load_error) = Config::load();

    init_logging(&config);
    if let Some(e) = load_error {
        log::warn!("Failed to load config.toml: {:#}. Using defaults.", e);
    }
    log::debug!("Config: {:?}", config);
    log::info!("Starting GPU bootstrap");
    log::info!(
        "Window: {}x{} ({})",
        config.window.width,
        config.window.height,
        if config.window.resizable { "resizable" } else { "fixed" }
    );

    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    let mut app = App::new(config);
    event_loop
        .run_app(&mut app)
        .context("Event loop terminated with an error")?;

    match app.fatal_error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Initialize logging at the configured level; RUST_LOG still wins.
fn init_logging(config: &Config) {
    use env_logger::Builder;
    use log::LevelFilter;

    let level = config.log_level();

    let mut builder = Builder::new();
    builder.filter_level(level.unwrap_or(LevelFilter::Info));
    builder.parse_default_env();
    builder.init();

    if level.is_none() {
        log::warn!(
            "Unknown log level '{}', defaulting to info",
            config.debug.log_level
        );
    }
}

// =============================================================================
// APPLICATION STATE
// =============================================================================

struct App {
    config: Config,
    presenter: Option<WindowPresenter>,

    /// Set when the window size changed; the chain is rebuilt before the
    /// next wait for events
    needs_rebuild: bool,
    /// Set while the window has zero area - no chain exists
    is_minimized: bool,

    fatal_error: Option<anyhow::Error>,
}

impl App {
    fn new(config: Config) -> Self {
        Self {
            config,
            presenter: None,
            needs_rebuild: false,
            is_minimized: false,
            fatal_error: None,
        }
    }

    /// Instance -> surface -> device -> presentation chain.
    fn init_vulkan(&self, window: Arc<Window>) -> Result<WindowPresenter> {
        log::info!("Initializing Vulkan...");

        let instance = VulkanInstance::new(
            &self.config.window.title,
            self.config.validation_enabled(),
            window.raw_display_handle(),
        )
        .context("Failed to create Vulkan instance")?;

        let surface = WindowSurface::new(&instance, window.as_ref())
            .context("Failed to create window surface")?;

        let presenter = Presenter::new(window, instance, surface)
            .context("Failed to set up GPU and presentation chain")?;

        log::info!("Vulkan initialized successfully!");
        Ok(presenter)
    }

    /// Rebuild the chain after a resize. The presenter never does this on
    /// its own.
    fn rebuild_chain(&mut self) -> Result<()> {
        self.needs_rebuild = false;
        if self.is_minimized {
            return Ok(());
        }
        if let Some(presenter) = self.presenter.as_mut() {
            presenter
                .rebuild_chain()
                .context("Failed to rebuild presentation chain")?;
        }
        Ok(())
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        // Ordered teardown happens in Presenter::drop
        self.presenter = None;
        event_loop.exit();
    }
}

// =============================================================================
// EVENT HANDLING
// =============================================================================

impl ApplicationHandler for App {
    /// Called when the application is ready to create windows.
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.presenter.is_some() {
            return;
        }

        let window_attributes = WindowAttributes::default()
            .with_title(&self.config.window.title)
            .with_resizable(self.config.window.resizable)
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ));

        let window = match event_loop.create_window(window_attributes) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                log::error!("Failed to create window: {:?}", e);
                self.fatal_error = Some(e.into());
                event_loop.exit();
                return;
            }
        };

        match self.init_vulkan(window) {
            Ok(presenter) => self.presenter = Some(presenter),
            Err(e) => {
                log::error!("Failed to initialize Vulkan: {:?}", e);
                self.fatal_error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                self.shutdown(event_loop);
            }

            WindowEvent::Resized(size) => {
                log::debug!("Window resized to {}x{}", size.width, size.height);

                if size.width == 0 || size.height == 0 {
                    self.is_minimized = true;
                    if let Some(presenter) = self.presenter.as_mut() {
                        presenter.release_chain();
                    }
                } else {
                    self.is_minimized = false;
                    self.needs_rebuild = true;
                }
            }

            WindowEvent::KeyboardInput { event, .. } => {
                use winit::keyboard::{KeyCode, PhysicalKey};

                if event.state.is_pressed()
                    && event.physical_key == PhysicalKey::Code(KeyCode::Escape)
                {
                    log::info!("ESC pressed, exiting...");
                    self.shutdown(event_loop);
                }
            }

            _ => {}
        }
    }

    /// Called when the event loop is about to block waiting for events.
    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if !self.needs_rebuild {
            return;
        }
        if let Err(e) = self.rebuild_chain() {
            log::error!("{:?}", e);
            self.fatal_error = Some(e);
            self.shutdown(event_loop);
        }
    }
}
