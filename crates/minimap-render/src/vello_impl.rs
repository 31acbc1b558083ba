//! Vello scene backend.

use crate::surface::Surface;
use kurbo::{Affine, Rect, Size, Stroke};
use peniko::{Color, Fill};
use vello::Scene;

#[cfg(not(target_arch = "wasm32"))]
use crate::raster::RasterImage;
#[cfg(not(target_arch = "wasm32"))]
use crate::surface::{RenderError, RenderResult};
#[cfg(not(target_arch = "wasm32"))]
use vello::{AaConfig, RenderParams, RendererOptions};

/// Surface that encodes draw calls into a Vello [`Scene`] for GPU rendering.
pub struct VelloSurface {
    scene: Scene,
    size: Size,
}

impl VelloSurface {
    pub fn new(size: Size) -> Self {
        Self {
            scene: Scene::new(),
            size,
        }
    }

    /// Get the built scene for rendering.
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Take ownership of the scene (resets internal scene).
    pub fn take_scene(&mut self) -> Scene {
        std::mem::take(&mut self.scene)
    }
}

impl Surface for VelloSurface {
    fn size(&self) -> Size {
        self.size
    }

    fn resize(&mut self, size: Size) {
        self.size = size;
        self.scene.reset();
    }

    fn clear(&mut self) {
        self.scene.reset();
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.scene.fill(Fill::NonZero, Affine::IDENTITY, color, None, &rect);
    }

    fn stroke_rect(&mut self, rect: Rect, color: Color, width: f64) {
        self.scene.stroke(&Stroke::new(width), Affine::IDENTITY, color, None, &rect);
    }
}

/// Offscreen GPU rasterizer for Vello scenes (native, blocking).
#[cfg(not(target_arch = "wasm32"))]
pub struct VelloRasterizer {
    render_cx: vello::util::RenderContext,
    device_id: usize,
    renderer: vello::Renderer,
}

#[cfg(not(target_arch = "wasm32"))]
impl VelloRasterizer {
    /// Acquire a GPU device and build a renderer for it.
    pub fn new() -> RenderResult<Self> {
        let mut render_cx = vello::util::RenderContext::new();
        let device_id = pollster::block_on(render_cx.device(None))
            .ok_or_else(|| RenderError::Surface("no compatible GPU adapter".to_string()))?;
        let renderer = vello::Renderer::new(&render_cx.devices[device_id].device, RendererOptions::default())
            .map_err(|e| RenderError::Surface(format!("Vello renderer: {:?}", e)))?;
        log::debug!("Created offscreen Vello renderer on device {}", device_id);

        Ok(Self {
            render_cx,
            device_id,
            renderer,
        })
    }

    /// Render `scene` into a `size` image and read the pixels back.
    ///
    /// Non-integral sizes round up, matching the software rasterizer. A zero
    /// dimension yields an empty image without touching the GPU.
    pub fn rasterize(&mut self, scene: &Scene, size: Size) -> RenderResult<RasterImage> {
        let dim = |v: f64| if v.is_finite() && v > 0.0 { v.ceil() as u32 } else { 0 };
        let (width, height) = (dim(size.width), dim(size.height));
        if width == 0 || height == 0 {
            return Ok(RasterImage {
                rgba_data: Vec::new(),
                width,
                height,
            });
        }

        let handle = &self.render_cx.devices[self.device_id];
        let (device, queue) = (&handle.device, &handle.queue);

        let texture = device.create_texture(&vello::wgpu::TextureDescriptor {
            label: Some("minimap snapshot texture"),
            size: vello::wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: vello::wgpu::TextureDimension::D2,
            format: vello::wgpu::TextureFormat::Rgba8Unorm,
            usage: vello::wgpu::TextureUsages::STORAGE_BINDING
                | vello::wgpu::TextureUsages::COPY_SRC
                | vello::wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let texture_view = texture.create_view(&vello::wgpu::TextureViewDescriptor::default());

        let params = RenderParams {
            base_color: Color::WHITE,
            width,
            height,
            antialiasing_method: AaConfig::Area,
        };
        self.renderer
            .render_to_texture(device, queue, scene, &texture_view, &params)
            .map_err(|e| RenderError::Surface(format!("Vello render: {:?}", e)))?;

        // wgpu requires 256-byte aligned rows for buffer copies.
        let bytes_per_row = (width * 4).next_multiple_of(256);
        let readback = device.create_buffer(&vello::wgpu::BufferDescriptor {
            label: Some("minimap readback buffer"),
            size: u64::from(bytes_per_row) * u64::from(height),
            usage: vello::wgpu::BufferUsages::COPY_DST | vello::wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&vello::wgpu::CommandEncoderDescriptor {
            label: Some("minimap copy encoder"),
        });
        encoder.copy_texture_to_buffer(
            vello::wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: vello::wgpu::Origin3d::ZERO,
                aspect: vello::wgpu::TextureAspect::All,
            },
            vello::wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: vello::wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            vello::wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        queue.submit(std::iter::once(encoder.finish()));

        let slice = readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(vello::wgpu::MapMode::Read, move |result| {
            tx.send(result).ok();
        });
        let _ = device.poll(vello::wgpu::PollType::wait());

        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(RenderError::Surface(format!("readback mapping: {}", e))),
            Err(_) => return Err(RenderError::Surface("readback mapping was dropped".to_string())),
        }

        let data = slice.get_mapped_range();
        let row_len = (width * 4) as usize;
        let mut rgba_data = Vec::with_capacity(row_len * height as usize);
        for row in 0..height as usize {
            let start = row * bytes_per_row as usize;
            rgba_data.extend_from_slice(&data[start..start + row_len]);
        }
        drop(data);
        readback.unmap();

        Ok(RasterImage {
            rgba_data,
            width,
            height,
        })
    }
}
