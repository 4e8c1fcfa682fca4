/// wgpu renderer for the desktop viewer
/// Draws a Scene as alpha-blended quads: discs for the point and trail
/// markers, a soft disc for the glow, thin bars for the boundary outline.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use thiserror::Error;
use winit::window::Window;

use crate::surface::{ElementKind, Scene};
use crate::viewport::{Rgb, Viewport};

#[derive(Debug, Error)]
pub enum GraphicsError {
    #[error("create surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),

    #[error("no suitable GPU adapter")]
    NoAdapter,

    #[error("request device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("surface reports no texture formats")]
    NoSurfaceFormat,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
    pub local: [f32; 2],
    pub color: [f32; 4],
    /// 0 = solid, 1 = disc, 2 = glow
    pub shape: f32,
}

impl Vertex {
    const ATTRIBS: [wgpu::VertexAttribute; 4] =
        wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2, 2 => Float32x4, 3 => Float32];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

const SHAPE_SOLID: f32 = 0.0;
const SHAPE_DISC: f32 = 1.0;
const SHAPE_GLOW: f32 = 2.0;

const SHADER: &str = r#"
struct VertexInput {
    @location(0) position: vec2<f32>,
    @location(1) local: vec2<f32>,
    @location(2) color: vec4<f32>,
    @location(3) shape: f32,
};

struct VertexOutput {
    @builtin(position) clip: vec4<f32>,
    @location(0) local: vec2<f32>,
    @location(1) color: vec4<f32>,
    @location(2) shape: f32,
};

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip = vec4<f32>(in.position, 0.0, 1.0);
    out.local = in.local;
    out.color = in.color;
    out.shape = in.shape;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    var alpha = in.color.a;
    if (in.shape > 0.5) {
        let d = length(in.local);
        if (d > 1.0) {
            discard;
        }
        if (in.shape > 1.5) {
            let t = 1.0 - d;
            alpha = alpha * t * t;
        }
    }
    return vec4<f32>(in.color.rgb, alpha);
}
"#;

/// Letterboxed mapping from viewport pixels to clip space.
#[derive(Debug, Clone, Copy)]
struct Letterbox {
    scale: f64,
    offset_x: f64,
    offset_y: f64,
    target_w: f64,
    target_h: f64,
}

impl Letterbox {
    fn new(viewport: &Viewport, target_w: f64, target_h: f64) -> Self {
        let scale = (target_w / viewport.width).min(target_h / viewport.height);
        Letterbox {
            scale,
            offset_x: (target_w - viewport.width * scale) / 2.0,
            offset_y: (target_h - viewport.height * scale) / 2.0,
            target_w,
            target_h,
        }
    }

    fn to_clip(&self, x: f64, y: f64) -> [f32; 2] {
        let px = self.offset_x + x * self.scale;
        let py = self.offset_y + y * self.scale;
        [
            (px / self.target_w * 2.0 - 1.0) as f32,
            (1.0 - py / self.target_h * 2.0) as f32,
        ]
    }
}

fn rgba(color: Rgb, alpha: f64) -> [f32; 4] {
    let [r, g, b] = color.to_f32();
    [r, g, b, alpha.clamp(0.0, 1.0) as f32]
}

fn push_quad(
    out: &mut Vec<Vertex>,
    lb: &Letterbox,
    (x0, y0, x1, y1): (f64, f64, f64, f64),
    color: [f32; 4],
    shape: f32,
) {
    let corners = [
        (x0, y0, [-1.0, -1.0]),
        (x1, y0, [1.0, -1.0]),
        (x1, y1, [1.0, 1.0]),
        (x0, y1, [-1.0, 1.0]),
    ];
    for i in [0usize, 1, 2, 0, 2, 3] {
        let (x, y, local) = corners[i];
        out.push(Vertex {
            position: lb.to_clip(x, y),
            local,
            color,
            shape,
        });
    }
}

/// Build the triangle list for `scene` on a `target_w` × `target_h` surface.
pub fn scene_vertices(scene: &Scene, viewport: &Viewport, target_w: f64, target_h: f64) -> Vec<Vertex> {
    let lb = Letterbox::new(viewport, target_w, target_h);
    let mut out = Vec::with_capacity(scene.elements().len() * 6);
    // One device pixel, expressed in viewport pixels
    let line = 1.0 / lb.scale.max(1e-6);

    for e in scene.elements() {
        match e.kind {
            ElementKind::Boundary => {
                let (w, h) = (viewport.width, viewport.height);
                let c = rgba(e.color, e.opacity);
                push_quad(&mut out, &lb, (0.0, 0.0, w, line), c, SHAPE_SOLID);
                push_quad(&mut out, &lb, (0.0, h - line, w, h), c, SHAPE_SOLID);
                push_quad(&mut out, &lb, (0.0, 0.0, line, h), c, SHAPE_SOLID);
                push_quad(&mut out, &lb, (w - line, 0.0, w, h), c, SHAPE_SOLID);
            }
            ElementKind::Point | ElementKind::Trail => {
                if let Some(glow) = e.glow {
                    let r = glow.radius;
                    let c = rgba(glow.color, glow.alpha * e.opacity);
                    push_quad(&mut out, &lb, (e.x - r, e.y - r, e.x + r, e.y + r), c, SHAPE_GLOW);
                }
                let r = e.kind.radius();
                let c = rgba(e.color, e.opacity);
                push_quad(&mut out, &lb, (e.x - r, e.y - r, e.x + r, e.y + r), c, SHAPE_DISC);
            }
        }
    }
    out
}

pub struct Graphics {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    pipeline: wgpu::RenderPipeline,
    vertex_buffer: wgpu::Buffer,
    vertex_capacity: usize,
    vertex_count: u32,
}

impl Graphics {
    pub async fn new(window: Arc<Window>) -> Result<Self, GraphicsError> {
        let size = window.inner_size();
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GraphicsError::NoAdapter)?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("lorenz device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_webgl2_defaults()
                        .using_resolution(adapter.limits()),
                },
                None,
            )
            .await?;

        let caps = surface.get_capabilities(&adapter);
        // Palette colors are plain sRGB bytes; a non-sRGB target shows them as-is
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or(GraphicsError::NoSurfaceFormat)?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("lorenz shader"),
            source: wgpu::ShaderSource::Wgsl(SHADER.into()),
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("lorenz pipeline layout"),
            bind_group_layouts: &[],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("lorenz pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[Vertex::layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        let vertex_capacity = 1024;
        let vertex_buffer = create_vertex_buffer(&device, vertex_capacity);

        Ok(Graphics {
            surface,
            device,
            queue,
            config,
            pipeline,
            vertex_buffer,
            vertex_capacity,
            vertex_count: 0,
        })
    }

    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    pub fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
    }

    pub fn update_vertices(&mut self, vertices: &[Vertex]) {
        if vertices.len() > self.vertex_capacity {
            self.vertex_capacity = vertices.len().next_power_of_two();
            self.vertex_buffer = create_vertex_buffer(&self.device, self.vertex_capacity);
            log::debug!("vertex buffer grown to {} vertices", self.vertex_capacity);
        }
        if !vertices.is_empty() {
            self.queue
                .write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(vertices));
        }
        self.vertex_count = vertices.len() as u32;
    }

    pub fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let frame = self.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("lorenz encoder"),
            });

        {
            let [r, g, b] = crate::raster::BACKGROUND.to_f32();
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("lorenz pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: r as f64,
                            g: g as f64,
                            b: b as f64,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            if self.vertex_count > 0 {
                pass.set_pipeline(&self.pipeline);
                pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
                pass.draw(0..self.vertex_count, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }
}

fn create_vertex_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("lorenz vertices"),
        size: (capacity * std::mem::size_of::<Vertex>()) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::RenderSurface;

    #[test]
    fn test_letterbox_centers_viewport() {
        let vp = Viewport::default();
        // 4:3 viewport in a wide window: bars left and right
        let lb = Letterbox::new(&vp, 800.0, 300.0);
        assert_eq!(lb.scale, 2.0);
        assert_eq!(lb.to_clip(0.0, 0.0), [-0.5, 1.0]);
        assert_eq!(lb.to_clip(200.0, 150.0), [0.5, -1.0]);
        assert_eq!(lb.to_clip(100.0, 75.0), [0.0, 0.0]);
    }

    #[test]
    fn test_vertex_counts_per_element() {
        let mut scene = Scene::new();
        scene.create(ElementKind::Boundary).unwrap();
        let point = scene.create(ElementKind::Point).unwrap();
        scene.set_glow(point, Rgb(0xFF, 0, 0), 0.5, 20.0);
        scene.create(ElementKind::Trail).unwrap();

        let verts = scene_vertices(&scene, &Viewport::default(), 400.0, 300.0);
        // boundary 4 bars, point glow + disc, trail disc
        assert_eq!(verts.len(), (4 + 2 + 1) * 6);
        assert!(verts.iter().any(|v| v.shape == SHAPE_GLOW));
    }

    #[test]
    fn test_opacity_carried_in_alpha() {
        let mut scene = Scene::new();
        let h = scene.create(ElementKind::Trail).unwrap();
        scene.set_opacity(h, 0.25);
        let verts = scene_vertices(&scene, &Viewport::default(), 200.0, 150.0);
        assert!(verts.iter().all(|v| v.color[3] == 0.25));
    }

    #[test]
    fn test_vertex_is_pod_sized() {
        assert_eq!(std::mem::size_of::<Vertex>(), 4 * 9);
    }
}
