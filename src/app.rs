//! Application state holding the wgpu graphics context and the UI shell
//!
//! Owns the surface, device and queue, the frame texture the composed canvas
//! is uploaded into each tick, the egui menu/dialog state, and the pipeline
//! pieces (camera, detector, toggle state, snapshot writer).

use std::sync::Arc;
use std::time::Instant;

use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::window::Window;

use crate::camera::CameraCapture;
use crate::detect::Detector;
use crate::pipeline::{Mirror, Pipeline, ToggleState};
use crate::snapshot::SnapshotWriter;

/// Per-variant options. The two binaries differ only in these.
#[derive(Clone, Copy, Debug)]
pub struct AppOptions {
    /// Window title
    pub title: &'static str,
    /// Fixed canvas size the camera frame is resized to
    pub canvas: (u32, u32),
    /// Mirror correction for incoming frames
    pub mirror: Mirror,
    /// Whether the menu bar, status line and snapshot command are present
    pub controls: bool,
}

impl AppOptions {
    /// The full variant: filters, detection toggles, snapshot, about dialog.
    pub fn full() -> Self {
        Self {
            title: "Object Detector",
            canvas: (800, 500),
            mirror: Mirror::Horizontal,
            controls: true,
        }
    }

    /// The minimal variant: camera, detection and annotation only.
    pub fn lite() -> Self {
        Self {
            title: "Object Detector (lite)",
            canvas: (900, 600),
            mirror: Mirror::Horizontal,
            controls: false,
        }
    }
}

/// Main application state
pub struct App {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: PhysicalSize<u32>,

    // Frame texture (composed canvas uploaded each tick)
    frame_texture: Option<wgpu::Texture>,
    frame_bind_group: Option<wgpu::BindGroup>,

    // Passthrough blit pipeline
    passthrough_pipeline: wgpu::RenderPipeline,
    passthrough_bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,

    // egui integration
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,

    // Pipeline pieces
    options: AppOptions,
    camera: CameraCapture,
    detector: Detector,
    pipeline: Pipeline,
    toggles: ToggleState,
    snapshot_writer: SnapshotWriter,

    // Dialog state
    about_open: bool,
    snapshot_message: Option<String>,
    exit_requested: bool,

    // Status line
    last_detection_count: usize,

    // Frame timing
    fps: f64,
    last_fps_update: Instant,
    frames_since_update: u64,
}

impl App {
    /// Create a new App with an initialized wgpu context. The detector is
    /// created by the caller so a missing model fails before any window
    /// machinery runs.
    pub async fn new(window: Arc<Window>, detector: Detector, options: AppOptions) -> Self {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .expect("Failed to create surface");

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .expect("Failed to find suitable GPU adapter");

        log::info!("Using GPU: {}", adapter.get_info().name);
        log::info!("Backend: {:?}", adapter.get_info().backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Camera Detect Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: adapter.limits(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .expect("Failed to create device");

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 1,
        };

        surface.configure(&device, &config);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Frame Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let passthrough_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Passthrough Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/passthrough.wgsl").into()),
        });

        let passthrough_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Passthrough Bind Group Layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            });

        let passthrough_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Passthrough Pipeline Layout"),
                bind_group_layouts: &[&passthrough_bind_group_layout],
                push_constant_ranges: &[],
            });

        let passthrough_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Passthrough Pipeline"),
            layout: Some(&passthrough_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &passthrough_shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &passthrough_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        // Initialize egui
        let egui_ctx = egui::Context::default();
        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );
        let egui_renderer = egui_wgpu::Renderer::new(&device, surface_format, None, 1, false);

        // The camera is opened once; if the device is unavailable the feed
        // simply stays empty (the capture thread logs the failure)
        let camera = CameraCapture::new(0).expect("Failed to start camera capture");

        let (canvas_width, canvas_height) = options.canvas;
        let pipeline = Pipeline::new(canvas_width, canvas_height, options.mirror);

        let now = Instant::now();

        Self {
            window,
            surface,
            device,
            queue,
            config,
            size,
            frame_texture: None,
            frame_bind_group: None,
            passthrough_pipeline,
            passthrough_bind_group_layout,
            sampler,
            egui_ctx,
            egui_state,
            egui_renderer,
            options,
            camera,
            detector,
            pipeline,
            toggles: ToggleState::default(),
            snapshot_writer: SnapshotWriter::new(),
            about_open: false,
            snapshot_message: None,
            exit_requested: false,
            last_detection_count: 0,
            fps: 0.0,
            last_fps_update: now,
            frames_since_update: 0,
        }
    }

    /// Handle a window event, returning true if egui consumed it.
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        let response = self.egui_state.on_window_event(&self.window, event);
        response.consumed
    }

    /// Reconfigure the surface (scale-factor changes; the window itself is
    /// fixed-size).
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    /// Current surface size.
    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    /// Whether the UI asked to exit.
    pub fn take_exit_request(&mut self) -> bool {
        std::mem::take(&mut self.exit_requested)
    }

    /// One pipeline tick: poll the camera, feed the detector, compose the
    /// displayed frame and upload it. A tick without a new camera frame
    /// changes nothing on screen.
    pub fn tick(&mut self) {
        let Some(frame) = self.camera.latest_frame() else {
            return;
        };

        if !self.pipeline.ingest(&frame) {
            return;
        }

        if self.toggles.detect_enabled {
            if let Some(raw) = self.pipeline.raw_frame() {
                self.detector.process_frame(raw, frame.frame_number);
            }
        }

        let detections = self.detector.latest();
        self.last_detection_count = self.pipeline.compose(&detections.detections, &self.toggles);

        self.upload_frame();
    }

    /// Upload the composed frame into the GPU texture, creating it on first
    /// use.
    fn upload_frame(&mut self) {
        let Some(composed) = self.pipeline.composed_frame() else {
            return;
        };
        let (width, height) = composed.dimensions();

        if self.frame_texture.is_none() {
            log::info!("Creating frame texture: {}x{}", width, height);

            let texture = self.device.create_texture(&wgpu::TextureDescriptor {
                label: Some("Frame Texture"),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            });

            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Frame Bind Group"),
                layout: &self.passthrough_bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                ],
            });

            self.frame_texture = Some(texture);
            self.frame_bind_group = Some(bind_group);
        }

        if let Some(texture) = &self.frame_texture {
            self.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                composed.as_raw(),
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(width * 4),
                    rows_per_image: Some(height),
                },
                wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
            );
        }
    }

    /// Render one frame: blit the frame texture and draw the egui shell on
    /// top.
    pub fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Frame Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if let Some(bind_group) = &self.frame_bind_group {
                render_pass.set_pipeline(&self.passthrough_pipeline);
                render_pass.set_bind_group(0, bind_group, &[]);
                render_pass.draw(0..3, 0..1);
            }
        }

        self.render_ui(&mut encoder, &view);

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        self.update_fps();

        Ok(())
    }

    fn render_ui(&mut self, encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView) {
        let raw_input = self.egui_state.take_egui_input(&self.window);

        // Copy UI state out so the closure doesn't borrow self
        let controls = self.options.controls;
        let mut toggles = self.toggles;
        let mut about_open = self.about_open;
        let mut snapshot_message = self.snapshot_message.clone();
        let fps = self.fps;
        let detection_count = self.last_detection_count;
        let camera_frames = self.camera.frame_count();

        let mut snapshot_clicked = false;
        let mut exit_clicked = false;

        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            if !controls {
                return;
            }

            egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
                egui::menu::bar(ui, |ui| {
                    ui.menu_button("Effects", |ui| {
                        for filter in crate::filters::Filter::ALL {
                            if ui
                                .radio_value(&mut toggles.filter, filter, filter.label())
                                .clicked()
                            {
                                ui.close_menu();
                            }
                        }
                    });

                    ui.menu_button("Detection", |ui| {
                        ui.checkbox(&mut toggles.detect_enabled, "Enable Detection");
                        ui.checkbox(&mut toggles.detect_person, "Detect Person");
                        ui.checkbox(&mut toggles.detect_object, "Detect Object");
                        ui.checkbox(&mut toggles.detect_obstacle, "Detect Obstacle");
                    });

                    ui.menu_button("Camera", |ui| {
                        if ui.button("Capture Frame").clicked() {
                            snapshot_clicked = true;
                            ui.close_menu();
                        }
                        if ui.button("Exit").clicked() {
                            exit_clicked = true;
                            ui.close_menu();
                        }
                    });

                    ui.menu_button("Help", |ui| {
                        if ui.button("About").clicked() {
                            about_open = true;
                            ui.close_menu();
                        }
                    });
                });
            });

            egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
                let status = if toggles.detect_enabled {
                    format!(
                        "Running detector | {:.1} FPS | {} detections | {} camera frames",
                        fps, detection_count, camera_frames
                    )
                } else {
                    format!("Detection off | {:.1} FPS | {} camera frames", fps, camera_frames)
                };
                ui.label(status);
            });

            if about_open {
                egui::Window::new("About")
                    .collapsible(false)
                    .resizable(false)
                    .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
                    .show(ctx, |ui| {
                        ui.label("Object detection viewer with image filters");
                        ui.label("Pretrained YOLOv8 model via ONNX Runtime");
                        ui.add_space(8.0);
                        if ui.button("OK").clicked() {
                            about_open = false;
                        }
                    });
            }

            if let Some(message) = snapshot_message.clone() {
                egui::Window::new("Capture")
                    .collapsible(false)
                    .resizable(false)
                    .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
                    .show(ctx, |ui| {
                        ui.label(message);
                        ui.add_space(8.0);
                        if ui.button("OK").clicked() {
                            snapshot_message = None;
                        }
                    });
            }
        });

        // Apply UI actions
        self.toggles = toggles;
        self.about_open = about_open;
        self.snapshot_message = snapshot_message;
        if exit_clicked {
            self.exit_requested = true;
        }
        if snapshot_clicked {
            self.take_snapshot();
        }

        self.egui_state
            .handle_platform_output(&self.window, full_output.platform_output);

        let paint_jobs = self
            .egui_ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);

        for (id, image_delta) in &full_output.textures_delta.set {
            self.egui_renderer
                .update_texture(&self.device, &self.queue, *id, image_delta);
        }

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point: self.window.scale_factor() as f32,
        };

        self.egui_renderer.update_buffers(
            &self.device,
            &self.queue,
            encoder,
            &paint_jobs,
            &screen_descriptor,
        );

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("egui Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            let render_pass_static: &mut wgpu::RenderPass<'static> =
                unsafe { std::mem::transmute(&mut render_pass) };

            self.egui_renderer
                .render(render_pass_static, &paint_jobs, &screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }
    }

    /// Write the current raw frame to disk and queue the confirmation
    /// dialog. Failures are reported in the dialog, never fatal.
    fn take_snapshot(&mut self) {
        let result = match self.pipeline.raw_frame() {
            Some(frame) => {
                let dir = std::env::current_dir().unwrap_or_else(|_| std::path::PathBuf::from("."));
                self.snapshot_writer.save(&dir, frame)
            }
            None => Err(crate::snapshot::SnapshotError::NoFrame),
        };

        self.snapshot_message = Some(match result {
            Ok(path) => format!("Saved as {}", path.display()),
            Err(e) => {
                log::warn!("Snapshot failed: {}", e);
                format!("Capture failed: {}", e)
            }
        });
    }

    fn update_fps(&mut self) {
        self.frames_since_update += 1;

        let now = Instant::now();
        let elapsed = now.duration_since(self.last_fps_update).as_secs_f64();
        if elapsed >= 1.0 {
            self.fps = self.frames_since_update as f64 / elapsed;
            self.frames_since_update = 0;
            self.last_fps_update = now;
        }
    }
}
