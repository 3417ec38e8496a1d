//! Bottom-centred text label rendered with `glyphon`: the current image name,
//! or the diagnostic message when nothing could be loaded.

use glyphon::cosmic_text::Align;
use glyphon::{
    Attrs, Buffer, Cache, Color, FamilyOwned, FontSystem, Metrics, Resolution, Shaping, SwashCache,
    TextArea, TextAtlas, TextBounds, TextRenderer, Viewport, Wrap,
};
use tracing::warn;
use winit::dpi::PhysicalSize;

const LABEL_COLOR: Color = Color::rgb(0xF8, 0xFA, 0xFC);

pub struct LabelRenderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    #[allow(dead_code)] // owns the atlas/viewport backing store
    cache: Cache,
    viewport: Viewport,
    atlas: TextAtlas,
    text_renderer: TextRenderer,
    text_buffer: Buffer,
    font_system: FontSystem,
    swash_cache: SwashCache,
    font_family: FamilyOwned,
    text: String,
    size: PhysicalSize<u32>,
    scale_factor: f64,
    text_origin: (f32, f32),
}

impl LabelRenderer {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, format: wgpu::TextureFormat) -> Self {
        let mut font_system = FontSystem::new();
        let mut text_buffer = Buffer::new(&mut font_system, Metrics::new(24.0, 28.8));
        text_buffer.set_wrap(&mut font_system, Wrap::WordOrGlyph);

        let cache = Cache::new(device);
        let viewport = Viewport::new(device, &cache);
        let mut atlas = TextAtlas::new(device, queue, &cache, format);
        let text_renderer =
            TextRenderer::new(&mut atlas, device, wgpu::MultisampleState::default(), None);
        let swash_cache = SwashCache::new();

        Self {
            device: device.clone(),
            queue: queue.clone(),
            cache,
            viewport,
            atlas,
            text_renderer,
            text_buffer,
            font_system,
            swash_cache,
            font_family: FamilyOwned::SansSerif,
            text: String::new(),
            size: PhysicalSize::new(0, 0),
            scale_factor: 1.0,
            text_origin: (0.0, 0.0),
        }
    }

    pub fn set_text(&mut self, text: &str) {
        self.text = text.to_owned();
        self.update_layout();
    }

    pub fn resize(&mut self, size: PhysicalSize<u32>, scale_factor: f64) {
        self.size = size;
        self.scale_factor = scale_factor;
        self.update_layout();
    }

    fn update_layout(&mut self) {
        if self.size.width == 0 || self.size.height == 0 {
            return;
        }

        let font_size = label_font_size(self.size, self.scale_factor);
        let metrics = Metrics::new(font_size, font_size * 1.2);
        self.text_buffer.set_metrics_and_size(
            &mut self.font_system,
            metrics,
            Some(self.size.width as f32),
            Some(self.size.height as f32),
        );

        let attrs = Attrs::new().family(self.font_family.as_family());
        self.text_buffer
            .set_text(
                &mut self.font_system,
                &self.text,
                &attrs,
                Shaping::Advanced,
                None,
            );
        for line in &mut self.text_buffer.lines {
            line.set_align(Some(Align::Center));
        }
        self.text_buffer
            .shape_until_scroll(&mut self.font_system, false);

        // anchored a line above the bottom edge
        let bottom_margin = metrics.line_height * 0.5;
        let y = (self.size.height as f32) - metrics.line_height - bottom_margin;
        self.text_origin = (0.0, y.max(0.0));
    }

    /// Shape and upload glyphs for the current text; call once per frame
    /// before the render pass is opened.
    pub fn prepare(&mut self) {
        if self.size.width == 0 || self.size.height == 0 {
            return;
        }
        self.viewport.update(
            &self.queue,
            Resolution {
                width: self.size.width,
                height: self.size.height,
            },
        );

        if let Err(err) = self.text_renderer.prepare(
            &self.device,
            &self.queue,
            &mut self.font_system,
            &mut self.atlas,
            &self.viewport,
            [TextArea {
                buffer: &self.text_buffer,
                left: self.text_origin.0,
                top: self.text_origin.1,
                scale: 1.0,
                bounds: TextBounds {
                    left: 0,
                    top: 0,
                    right: self.size.width as i32,
                    bottom: self.size.height as i32,
                },
                default_color: LABEL_COLOR,
                custom_glyphs: &[],
            }],
            &mut self.swash_cache,
        ) {
            warn!(error = %err, "label_prepare_failed");
        }
    }

    pub fn draw(&mut self, pass: &mut wgpu::RenderPass<'_>) {
        if self.size.width == 0 || self.size.height == 0 {
            return;
        }
        if let Err(err) = self.text_renderer.render(&self.atlas, &self.viewport, pass) {
            warn!(error = %err, "label_draw_failed");
        }
    }

    pub fn trim(&mut self) {
        self.atlas.trim();
    }
}

fn label_font_size(size: PhysicalSize<u32>, scale_factor: f64) -> f32 {
    let base = (size.height as f32) * 0.035;
    base.clamp(16.0 * scale_factor as f32, 48.0 * scale_factor as f32)
}
