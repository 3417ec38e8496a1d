//! The presenter: a winit window with a wgpu surface that shows whatever
//! [`DisplayUpdate`] it last received. Runs on the main thread; updates
//! arrive one-way from the refresh task via the event-loop proxy.

mod label;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use wgpu::{self, SurfaceError, util::DeviceExt};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Fullscreen, Window, WindowAttributes, WindowId},
};

use crate::config::Configuration;
use crate::events::DisplayUpdate;
use label::LabelRenderer;

#[derive(Debug)]
enum ViewerEvent {
    Update(DisplayUpdate),
    Cancelled,
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct Vertex {
    pos: [f32; 2],
    uv: [f32; 2],
}

const QUAD: [Vertex; 4] = [
    //   NDC pos         UV
    Vertex {
        pos: [-1.0, -1.0],
        uv: [0.0, 1.0],
    }, // bottom-left
    Vertex {
        pos: [1.0, -1.0],
        uv: [1.0, 1.0],
    }, // bottom-right
    Vertex {
        pos: [-1.0, 1.0],
        uv: [0.0, 0.0],
    }, // top-left
    Vertex {
        pos: [1.0, 1.0],
        uv: [1.0, 0.0],
    }, // top-right
];

struct Tex {
    view: wgpu::TextureView,
    w: u32,
    h: u32,
}

struct Gpu {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,

    pipeline: wgpu::RenderPipeline,
    bind_layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
    vbuf: wgpu::Buffer,
    // uv scale uniform, 32 bytes to match the WGSL block
    params_buf: wgpu::Buffer,
    sampler: wgpu::Sampler,
    photo: Tex,

    label: LabelRenderer,
}

struct ViewerApp {
    cfg: Configuration,
    cancel: CancellationToken,
    window: Option<Arc<Window>>,
    gpu: Option<Gpu>,
    // update received before GPU init finished
    pending: Option<DisplayUpdate>,
}

impl ViewerApp {
    fn new(cfg: Configuration, cancel: CancellationToken) -> Self {
        Self {
            cfg,
            cancel,
            window: None,
            gpu: None,
            pending: None,
        }
    }

    fn ensure_window(&mut self, event_loop: &ActiveEventLoop) -> Option<Arc<Window>> {
        if let Some(window) = self.window.as_ref() {
            return Some(window.clone());
        }

        let attrs = WindowAttributes::default().with_title("Image Viewer");
        match event_loop.create_window(attrs) {
            Ok(window) => {
                let window = Arc::new(window);
                if self.cfg.fullscreen {
                    window.set_fullscreen(Some(Fullscreen::Borderless(window.current_monitor())));
                    window.set_cursor_visible(false);
                }
                self.window = Some(window.clone());
                Some(window)
            }
            Err(err) => {
                error!(error = %err, "failed to create viewer window");
                None
            }
        }
    }

    fn init_gpu(&mut self, window: Arc<Window>) -> Result<()> {
        let instance = wgpu::Instance::default();
        let surface = instance
            .create_surface(window.clone())
            .context("failed to create surface")?;
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("failed to acquire GPU adapter")?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|fmt| fmt.is_srgb())
            .unwrap_or(caps.formats[0]);

        let limits = adapter.limits();
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("viewer-device"),
            required_features: wgpu::Features::empty(),
            required_limits: limits,
            memory_hints: wgpu::MemoryHints::default(),
            trace: wgpu::Trace::default(),
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
        }))
        .context("failed to acquire GPU device")?;

        let size = window.inner_size();
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        info!(
            width = config.width,
            height = config.height,
            format = ?config.format,
            "viewer surface configured",
        );

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("photo-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        let params_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("photo-params"),
            size: 32,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let vbuf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("photo-quad"),
            contents: bytemuck::cast_slice(&QUAD),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("photo-shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/photo.wgsl").into()),
        });

        let bind_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("photo-bind-layout"),
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
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pip_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("photo-pipe-layout"),
            bind_group_layouts: &[&bind_layout],
            immediate_size: 0,
        });

        let vlayout = wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2],
        };

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("photo-pipeline"),
            layout: Some(&pip_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[vlayout],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                strip_index_format: None,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        // black placeholder until the first update arrives
        let photo = upload_texture(&device, &queue, &[0, 0, 0, 255], 1, 1);
        let bind_group = build_bind_group(&device, &bind_layout, &photo, &sampler, &params_buf);
        write_uv_scale(
            &queue,
            &params_buf,
            compute_uv_scale(config.width, config.height, photo.w, photo.h),
        );

        let mut label = LabelRenderer::new(&device, &queue, format);
        label.resize(size, window.scale_factor());

        self.gpu = Some(Gpu {
            surface,
            device,
            queue,
            config,
            pipeline,
            bind_layout,
            bind_group,
            vbuf,
            params_buf,
            sampler,
            photo,
            label,
        });

        if let Some(update) = self.pending.take() {
            self.apply_update(update);
        }

        Ok(())
    }

    fn apply_update(&mut self, update: DisplayUpdate) {
        let Some(gpu) = self.gpu.as_mut() else {
            self.pending = Some(update);
            return;
        };

        gpu.photo = match update.image.as_deref() {
            Some(image) => upload_texture(
                &gpu.device,
                &gpu.queue,
                &image.pixels,
                image.width,
                image.height,
            ),
            None => upload_texture(&gpu.device, &gpu.queue, &[0, 0, 0, 255], 1, 1),
        };
        write_uv_scale(
            &gpu.queue,
            &gpu.params_buf,
            compute_uv_scale(gpu.config.width, gpu.config.height, gpu.photo.w, gpu.photo.h),
        );
        gpu.bind_group = build_bind_group(
            &gpu.device,
            &gpu.bind_layout,
            &gpu.photo,
            &gpu.sampler,
            &gpu.params_buf,
        );
        gpu.label.set_text(&update.label);

        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }

    fn handle_resize(&mut self, new_size: PhysicalSize<u32>) {
        let Some(window) = self.window.as_ref() else {
            return;
        };
        let scale_factor = window.scale_factor();
        let Some(gpu) = self.gpu.as_mut() else {
            return;
        };

        gpu.config.width = new_size.width.max(1);
        gpu.config.height = new_size.height.max(1);
        gpu.surface.configure(&gpu.device, &gpu.config);
        write_uv_scale(
            &gpu.queue,
            &gpu.params_buf,
            compute_uv_scale(gpu.config.width, gpu.config.height, gpu.photo.w, gpu.photo.h),
        );
        gpu.label.resize(new_size, scale_factor);

        window.request_redraw();
    }

    fn draw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(window) = self.window.as_ref() else {
            return;
        };
        let inner_size = window.inner_size();
        let Some(gpu) = self.gpu.as_mut() else {
            return;
        };

        let frame = match gpu.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(SurfaceError::Outdated) | Err(SurfaceError::Lost) => {
                info!("viewer surface lost; reconfiguring");
                self.handle_resize(inner_size);
                return;
            }
            Err(SurfaceError::OutOfMemory) => {
                error!("viewer surface out of memory; exiting event loop");
                event_loop.exit();
                return;
            }
            Err(SurfaceError::Timeout) => {
                warn!("viewer surface acquisition timed out");
                return;
            }
            Err(SurfaceError::Other) => {
                warn!("viewer surface reported an unknown error; retrying");
                self.handle_resize(inner_size);
                return;
            }
        };

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("viewer-encoder"),
            });

        gpu.label.prepare();
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("viewer-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            rpass.set_pipeline(&gpu.pipeline);
            rpass.set_bind_group(0, &gpu.bind_group, &[]);
            rpass.set_vertex_buffer(0, gpu.vbuf.slice(..));
            rpass.draw(0..4, 0..1);

            gpu.label.draw(&mut rpass);
        }

        gpu.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        gpu.label.trim();
    }
}

impl ApplicationHandler<ViewerEvent> for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.cancel.is_cancelled() {
            event_loop.exit();
            return;
        }

        let Some(window) = self.ensure_window(event_loop) else {
            event_loop.exit();
            return;
        };

        if self.gpu.is_none() {
            if let Err(err) = self.init_gpu(window) {
                error!(error = ?err, "failed to initialize GPU state");
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(window) = self.window.as_ref() else {
            return;
        };
        if window.id() != window_id {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("viewer window close requested");
                event_loop.exit();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Released
                    && matches!(
                        event.physical_key,
                        PhysicalKey::Code(KeyCode::Escape | KeyCode::KeyQ)
                    )
                {
                    info!("quit key released; exiting event loop");
                    event_loop.exit();
                }
            }
            WindowEvent::Resized(new_size) => {
                self.handle_resize(new_size);
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                let size = window.inner_size();
                self.handle_resize(size);
            }
            WindowEvent::RedrawRequested => {
                self.draw(event_loop);
            }
            _ => {}
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: ViewerEvent) {
        match event {
            ViewerEvent::Update(update) => self.apply_update(update),
            ViewerEvent::Cancelled => {
                info!("viewer received cancellation event");
                event_loop.exit();
            }
        }
    }
}

/// Run the windowed presenter on the calling thread until the window closes
/// or `cancel` fires. Must be called from the main thread with a tokio
/// runtime entered (the update pump is spawned onto it).
pub fn run_windowed(
    mut updates: mpsc::Receiver<DisplayUpdate>,
    cancel: CancellationToken,
    cfg: Configuration,
) -> Result<()> {
    let event_loop = EventLoop::<ViewerEvent>::with_user_event()
        .build()
        .context("failed to build viewer event loop")?;
    let proxy = event_loop.create_proxy();

    let pump = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        let _ = proxy.send_event(ViewerEvent::Cancelled);
                        break;
                    }
                    update = updates.recv() => match update {
                        Some(update) => {
                            if proxy.send_event(ViewerEvent::Update(update)).is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
            }
        })
    };

    let mut app = ViewerApp::new(cfg, cancel);
    let run_result = event_loop.run_app(&mut app);
    pump.abort();

    run_result.context("viewer event loop failed")
}

fn upload_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    pixels: &[u8],
    w: u32,
    h: u32,
) -> Tex {
    let tex = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("photo"),
        size: wgpu::Extent3d {
            width: w,
            height: h,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        tex.as_image_copy(),
        pixels,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * w),
            rows_per_image: Some(h),
        },
        wgpu::Extent3d {
            width: w,
            height: h,
            depth_or_array_layers: 1,
        },
    );
    Tex {
        view: tex.create_view(&wgpu::TextureViewDescriptor::default()),
        w,
        h,
    }
}

fn build_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    photo: &Tex,
    sampler: &wgpu::Sampler,
    params_buf: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("photo-bind-group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&photo.view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: params_buf.as_entire_binding(),
            },
        ],
    })
}

fn write_uv_scale(queue: &wgpu::Queue, buf: &wgpu::Buffer, scale: [f32; 4]) {
    let mut block = [0f32; 8]; // 8 * 4 = 32 bytes
    block[0..4].copy_from_slice(&scale);
    queue.write_buffer(buf, 0, bytemuck::bytes_of(&block));
}

#[allow(clippy::cast_precision_loss)]
fn compute_uv_scale(win_w: u32, win_h: u32, img_w: u32, img_h: u32) -> [f32; 4] {
    let ww = win_w as f32;
    let wh = win_h as f32;
    let iw = img_w as f32;
    let ih = img_h as f32;

    if ww == 0.0 || wh == 0.0 || iw == 0.0 || ih == 0.0 {
        return [1.0, 1.0, 0.0, 0.0];
    }

    let win_ar = ww / wh;
    let img_ar = iw / ih;

    if img_ar > win_ar {
        // Image is wider than the window: stretch UV Y so the visible 0..1
        // band shrinks vertically
        [1.0, img_ar / win_ar, 0.0, 0.0]
    } else {
        // Image is taller than the window: stretch UV X instead
        [win_ar / img_ar, 1.0, 0.0, 0.0]
    }
}

#[cfg(test)]
mod tests {
    use super::compute_uv_scale;

    #[test]
    fn matching_aspect_keeps_unit_scale() {
        let scale = compute_uv_scale(800, 600, 400, 300);
        assert_eq!(scale, [1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn wide_image_letterboxes_vertically() {
        let scale = compute_uv_scale(100, 100, 200, 100);
        assert_eq!(scale[0], 1.0);
        assert!(scale[1] > 1.0);
    }

    #[test]
    fn tall_image_letterboxes_horizontally() {
        let scale = compute_uv_scale(100, 100, 100, 200);
        assert!(scale[0] > 1.0);
        assert_eq!(scale[1], 1.0);
    }

    #[test]
    fn degenerate_sizes_fall_back_to_unit_scale() {
        assert_eq!(compute_uv_scale(0, 100, 10, 10), [1.0, 1.0, 0.0, 0.0]);
        assert_eq!(compute_uv_scale(100, 100, 0, 10), [1.0, 1.0, 0.0, 0.0]);
    }
}
