//! Window shell shared by both binaries
//!
//! Owns the winit event loop and drives the pipeline at a fixed tick rate.
//! The two binaries differ only in the `AppOptions` they pass in.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowAttributes, WindowId};

use crate::app::{App, AppOptions};
use crate::detect::{self, Detector};

/// Pipeline tick interval. Matches the camera's practical frame cadence;
/// faster ticks only re-render the same frame.
const TICK_INTERVAL: Duration = Duration::from_millis(10);

/// Application state machine
enum ShellState {
    /// Initial state before window is created
    Uninitialized,
    /// Window and graphics context are ready
    Running { window: Arc<Window>, app: App },
}

/// Main application handler implementing winit's ApplicationHandler trait
struct Shell {
    options: AppOptions,
    detector: Option<Detector>,
    state: ShellState,
    next_tick_at: Instant,
}

impl Shell {
    fn new(options: AppOptions, detector: Detector) -> Self {
        Self {
            options,
            detector: Some(detector),
            state: ShellState::Uninitialized,
            next_tick_at: Instant::now(),
        }
    }
}

impl ApplicationHandler for Shell {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        // Only initialize if we haven't already
        if let ShellState::Uninitialized = &self.state {
            let Some(detector) = self.detector.take() else {
                return;
            };

            log::info!("Creating window...");

            let (width, height) = self.options.canvas;
            let window_attributes = WindowAttributes::default()
                .with_title(self.options.title)
                .with_inner_size(LogicalSize::new(width, height))
                .with_resizable(false);

            let window = Arc::new(
                event_loop
                    .create_window(window_attributes)
                    .expect("Failed to create window"),
            );

            log::info!(
                "Window created: {}x{}",
                window.inner_size().width,
                window.inner_size().height
            );

            log::info!("Initializing wgpu and egui...");
            let app = pollster::block_on(App::new(window.clone(), detector, self.options));

            log::info!("{} ready, press ESC to exit", self.options.title);

            self.state = ShellState::Running { window, app };
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let ShellState::Running { app, .. } = &mut self.state else {
            return;
        };

        // Let egui handle the event first
        let egui_consumed = app.handle_window_event(&event);

        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, exiting...");
                event_loop.exit();
            }

            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } if !egui_consumed => {
                log::info!("Escape pressed, exiting...");
                event_loop.exit();
            }

            WindowEvent::Resized(physical_size) => {
                app.resize(physical_size);
            }

            WindowEvent::RedrawRequested => {
                app.tick();

                match app.render() {
                    Ok(_) => {}
                    Err(wgpu::SurfaceError::Lost) => {
                        log::warn!("Surface lost, reconfiguring...");
                        app.resize(app.size());
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("Out of GPU memory!");
                        event_loop.exit();
                    }
                    Err(e) => {
                        log::warn!("Surface error: {:?}", e);
                    }
                }

                if app.take_exit_request() {
                    log::info!("Exit selected from menu");
                    event_loop.exit();
                }
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let ShellState::Running { window, .. } = &mut self.state else {
            event_loop.set_control_flow(ControlFlow::Wait);
            return;
        };

        // Drive ticks at the fixed interval
        let wake_early = Duration::from_micros(1000);
        let wake_at = self
            .next_tick_at
            .checked_sub(wake_early)
            .unwrap_or(self.next_tick_at);
        let now = Instant::now();

        if now >= wake_at {
            // Spin-wait for precise timing
            while Instant::now() < self.next_tick_at {
                std::hint::spin_loop();
            }

            window.request_redraw();
            self.next_tick_at += TICK_INTERVAL;

            // Reset if too far behind
            let max_behind = TICK_INTERVAL * 2;
            let now_after = Instant::now();
            if now_after > self.next_tick_at + max_behind {
                self.next_tick_at = now_after + TICK_INTERVAL;
            }
        }

        event_loop.set_control_flow(ControlFlow::WaitUntil(wake_at));
    }
}

/// Load the model, then run the event loop until exit. A missing or broken
/// model fails here, before any window appears.
pub fn run(options: AppOptions) -> anyhow::Result<()> {
    let model_path = detect::find_model()
        .with_context(|| format!("model file {} not found", detect::MODEL_FILE))?;
    log::info!("Loading model from {:?}", model_path);

    let detector = Detector::new(&model_path).context("failed to load detection model")?;

    let event_loop = EventLoop::new().context("failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut shell = Shell::new(options, detector);
    event_loop.run_app(&mut shell).context("event loop error")?;

    Ok(())
}
