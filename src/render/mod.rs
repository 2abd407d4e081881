mod camera;

pub use camera::{CameraController, CameraMovement, CameraSettings, SpeedSelector};

use crate::assets::MeshGeometry;
use crate::config::RenderConfig;
use crate::scene::{MeshUploader, Scene};
use glam::{Mat4, Vec3};
use std::collections::HashSet;
use std::sync::Arc;
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::Window;

const SHADER_SOURCE: &str = include_str!("shader.wgsl");
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const LIGHT_POSITION: Vec3 = Vec3::new(2000.0, 1000.0, 2000.0);
const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to create surface: {0}")]
    SurfaceCreateFailed(#[from] wgpu::CreateSurfaceError),
    #[error("no compatible GPU adapter found")]
    AdapterUnavailable,
    #[error("failed to create GPU device: {0}")]
    DeviceCreateFailed(#[from] wgpu::RequestDeviceError),
    #[error("surface reports no supported formats")]
    NoSurfaceFormat,
    #[error("shader or pipeline validation failed: {0}")]
    Shader(String),
    #[error("GPU is out of memory")]
    OutOfMemory,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct Uniforms {
    projection: [[f32; 4]; 4],
    view: [[f32; 4]; 4],
    model: [[f32; 4]; 4],
    light_pos: [f32; 4],
    solid_color: [f32; 4],
    wire_color: [f32; 4],
}

/// GPU buffers for one mesh: shared vertices, the triangle list and the
/// deduplicated edge list for adapters without line polygons.
pub struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    triangle_buffer: wgpu::Buffer,
    edge_buffer: wgpu::Buffer,
    triangle_index_count: u32,
    edge_index_count: u32,
}

impl Drop for GpuMesh {
    fn drop(&mut self) {
        self.vertex_buffer.destroy();
        self.triangle_buffer.destroy();
        self.edge_buffer.destroy();
    }
}

/// How the wireframe overlay is rasterized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WireMode {
    /// Triangles drawn as outlines, culled like the solid pass.
    PolygonLines,
    /// Deduplicated edge list, drawn for every face.
    EdgeList,
}

impl WireMode {
    fn for_features(features: wgpu::Features) -> Self {
        if features.contains(wgpu::Features::POLYGON_MODE_LINE) {
            Self::PolygonLines
        } else {
            Self::EdgeList
        }
    }

    fn required_features(self) -> wgpu::Features {
        match self {
            Self::PolygonLines => wgpu::Features::POLYGON_MODE_LINE,
            Self::EdgeList => wgpu::Features::empty(),
        }
    }

    fn primitive(self, cull_mode: Option<wgpu::Face>) -> wgpu::PrimitiveState {
        match self {
            Self::PolygonLines => wgpu::PrimitiveState {
                polygon_mode: wgpu::PolygonMode::Line,
                ..solid_primitive(cull_mode)
            },
            Self::EdgeList => wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::LineList,
                ..solid_primitive(None)
            },
        }
    }
}

fn solid_primitive(cull_mode: Option<wgpu::Face>) -> wgpu::PrimitiveState {
    wgpu::PrimitiveState {
        topology: wgpu::PrimitiveTopology::TriangleList,
        strip_index_format: None,
        front_face: wgpu::FrontFace::Ccw,
        cull_mode,
        unclipped_depth: false,
        polygon_mode: wgpu::PolygonMode::Fill,
        conservative: false,
    }
}

/// Each undirected triangle edge once, as pairs for a line list.
pub fn edge_indices(triangles: &[u32]) -> Vec<u32> {
    let mut seen = HashSet::with_capacity(triangles.len());
    let mut edges = Vec::with_capacity(triangles.len() * 2);
    for tri in triangles.chunks_exact(3) {
        for (a, b) in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
            if seen.insert((a.min(b), a.max(b))) {
                edges.extend_from_slice(&[a, b]);
            }
        }
    }
    edges
}

pub struct RenderContext {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_config: wgpu::SurfaceConfiguration,
    sample_count: u32,
    wire_mode: WireMode,
    solid_pipeline: wgpu::RenderPipeline,
    wire_pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    depth_view: wgpu::TextureView,
    msaa_view: Option<wgpu::TextureView>,
    clear_color: wgpu::Color,
    solid_color: [f32; 3],
    wire_color: [f32; 3],
}

impl RenderContext {
    pub fn new(window: Arc<Window>, config: &RenderConfig) -> Result<Self, RenderError> {
        let size = window.inner_size();
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let surface = instance.create_surface(window)?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .ok_or(RenderError::AdapterUnavailable)?;
        let info = adapter.get_info();
        log::info!("Using GPU adapter: {} ({:?})", info.name, info.backend);
        let wire_mode = WireMode::for_features(adapter.features());
        if wire_mode == WireMode::EdgeList {
            log::warn!("Line polygon mode unsupported, back-face edges stay visible");
        }

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Mesh Viewer Device"),
                required_features: wire_mode.required_features(),
                required_limits: wgpu::Limits::downlevel_defaults()
                    .using_resolution(adapter.limits()),
            },
            None,
        ))?;
        device.on_uncaptured_error(Box::new(|err| {
            log::error!("Uncaptured GPU error: {}", err);
        }));

        let caps = surface.get_capabilities(&adapter);
        // the shading constants are display values, so skip sRGB encoding
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|format| !format.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or(RenderError::NoSurfaceFormat)?;
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let sample_count = supported_sample_count(&adapter, format, config.msaa_samples);

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Mesh Shader"),
            source: wgpu::ShaderSource::Wgsl(SHADER_SOURCE.into()),
        });

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Uniform Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Mesh Pipeline Layout"),
            bind_group_layouts: &[&uniform_layout],
            push_constant_ranges: &[],
        });

        let pipelines = PipelineParams {
            device: &device,
            layout: &pipeline_layout,
            shader: &shader,
            format,
            sample_count,
        };
        let cull_mode = config.cull_back_faces.then_some(wgpu::Face::Back);
        // solid surfaces are pushed back so coplanar edges win the depth test
        let solid_pipeline = pipelines.create(
            "Solid Pipeline",
            "fs_solid",
            solid_primitive(cull_mode),
            wgpu::CompareFunction::Less,
            wgpu::DepthBiasState {
                constant: 1,
                slope_scale: 1.0,
                clamp: 0.0,
            },
        );
        let wire_pipeline = pipelines.create(
            "Wireframe Pipeline",
            "fs_wire",
            wire_mode.primitive(cull_mode),
            wgpu::CompareFunction::LessEqual,
            wgpu::DepthBiasState::default(),
        );
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(RenderError::Shader(err.to_string()));
        }

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Uniform Buffer"),
            size: std::mem::size_of::<Uniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Uniform Bind Group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let (depth_view, msaa_view) = create_targets(&device, &surface_config, sample_count);
        let [r, g, b, a] = config.clear_color;

        log::info!(
            "Renderer ready: {}x{} {:?}, {}x MSAA",
            surface_config.width,
            surface_config.height,
            format,
            sample_count
        );

        Ok(Self {
            surface,
            device,
            queue,
            surface_config,
            sample_count,
            wire_mode,
            solid_pipeline,
            wire_pipeline,
            uniform_buffer,
            uniform_bind_group,
            depth_view,
            msaa_view,
            clear_color: wgpu::Color { r, g, b, a },
            solid_color: config.solid_color,
            wire_color: config.wireframe_color,
        })
    }

    pub fn resize(&mut self, size: PhysicalSize<u32>) {
        if size.width == 0 || size.height == 0 {
            return;
        }
        self.surface_config.width = size.width;
        self.surface_config.height = size.height;
        self.reconfigure();
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.surface_config.width as f32 / self.surface_config.height as f32
    }

    fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.surface_config);
        let (depth_view, msaa_view) =
            create_targets(&self.device, &self.surface_config, self.sample_count);
        self.depth_view = depth_view;
        self.msaa_view = msaa_view;
    }

    /// Draws every mesh filled, then its edge overlay. A lost or outdated
    /// surface is reconfigured and the frame skipped.
    pub fn render(
        &mut self,
        scene: &Scene<GpuMesh>,
        view: Mat4,
        projection: Mat4,
    ) -> Result<(), RenderError> {
        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::warn!("Surface lost or outdated, reconfiguring");
                self.reconfigure();
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::debug!("Surface acquire timed out, skipping frame");
                return Ok(());
            }
            Err(wgpu::SurfaceError::OutOfMemory) => return Err(RenderError::OutOfMemory),
        };
        let frame_view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let uniforms = Uniforms {
            projection: projection.to_cols_array_2d(),
            view: view.to_cols_array_2d(),
            model: Mat4::IDENTITY.to_cols_array_2d(),
            light_pos: LIGHT_POSITION.extend(1.0).to_array(),
            solid_color: Vec3::from(self.solid_color).extend(1.0).to_array(),
            wire_color: Vec3::from(self.wire_color).extend(1.0).to_array(),
        };
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let (color_view, resolve_target) = match &self.msaa_view {
            Some(msaa_view) => (msaa_view, Some(&frame_view)),
            None => (&frame_view, None),
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Mesh Render Encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Mesh Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: color_view,
                    resolve_target,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_bind_group(0, &self.uniform_bind_group, &[]);

            for mesh in scene.meshes().iter().filter_map(|mesh| mesh.gpu()) {
                if mesh.triangle_index_count == 0 {
                    continue;
                }
                pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));

                pass.set_pipeline(&self.solid_pipeline);
                pass.set_index_buffer(mesh.triangle_buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..mesh.triangle_index_count, 0, 0..1);

                pass.set_pipeline(&self.wire_pipeline);
                match self.wire_mode {
                    WireMode::PolygonLines => {
                        pass.draw_indexed(0..mesh.triangle_index_count, 0, 0..1);
                    }
                    WireMode::EdgeList => {
                        pass.set_index_buffer(
                            mesh.edge_buffer.slice(..),
                            wgpu::IndexFormat::Uint32,
                        );
                        pass.draw_indexed(0..mesh.edge_index_count, 0, 0..1);
                    }
                }
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }
}

impl MeshUploader for RenderContext {
    type Handle = GpuMesh;

    fn upload(&mut self, label: &str, geometry: &MeshGeometry) -> GpuMesh {
        let edges = edge_indices(&geometry.indices);
        let vertex_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{} vertices", label)),
                contents: bytemuck::cast_slice(&geometry.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let triangle_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{} triangles", label)),
                contents: bytemuck::cast_slice(&geometry.indices),
                usage: wgpu::BufferUsages::INDEX,
            });
        let edge_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{} edges", label)),
                contents: bytemuck::cast_slice(&edges),
                usage: wgpu::BufferUsages::INDEX,
            });
        log::debug!(
            "Uploaded {}: {} vertices, {} triangles, {} edges",
            label,
            geometry.vertices.len(),
            geometry.triangle_count(),
            edges.len() / 2
        );

        GpuMesh {
            vertex_buffer,
            triangle_buffer,
            edge_buffer,
            triangle_index_count: geometry.indices.len() as u32,
            edge_index_count: edges.len() as u32,
        }
    }
}

struct PipelineParams<'a> {
    device: &'a wgpu::Device,
    layout: &'a wgpu::PipelineLayout,
    shader: &'a wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    sample_count: u32,
}

impl PipelineParams<'_> {
    fn create(
        &self,
        label: &str,
        fragment_entry: &str,
        primitive: wgpu::PrimitiveState,
        depth_compare: wgpu::CompareFunction,
        bias: wgpu::DepthBiasState,
    ) -> wgpu::RenderPipeline {
        self.device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(self.layout),
                vertex: wgpu::VertexState {
                    module: self.shader,
                    entry_point: "vs_main",
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &VERTEX_ATTRIBUTES,
                    }],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: self.shader,
                    entry_point: fragment_entry,
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive,
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare,
                    stencil: wgpu::StencilState::default(),
                    bias,
                }),
                multisample: wgpu::MultisampleState {
                    count: self.sample_count,
                    mask: !0,
                    alpha_to_coverage_enabled: false,
                },
                multiview: None,
            })
    }
}

fn supported_sample_count(adapter: &wgpu::Adapter, format: wgpu::TextureFormat, requested: u32) -> u32 {
    if requested <= 1 {
        return 1;
    }
    let flags = adapter.get_texture_format_features(format).flags;
    if flags.sample_count_supported(requested) {
        requested
    } else {
        log::warn!("{}x MSAA unsupported for {:?}, rendering without", requested, format);
        1
    }
}

fn create_targets(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
    sample_count: u32,
) -> (wgpu::TextureView, Option<wgpu::TextureView>) {
    let size = wgpu::Extent3d {
        width: config.width,
        height: config.height,
        depth_or_array_layers: 1,
    };
    let depth = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size,
        mip_level_count: 1,
        sample_count,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let msaa = (sample_count > 1).then(|| {
        device.create_texture(&wgpu::TextureDescriptor {
            label: Some("MSAA Color Texture"),
            size,
            mip_level_count: 1,
            sample_count,
            dimension: wgpu::TextureDimension::D2,
            format: config.format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        })
    });
    (
        depth.create_view(&wgpu::TextureViewDescriptor::default()),
        msaa.map(|texture| texture.create_view(&wgpu::TextureViewDescriptor::default())),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalized(edges: &[u32]) -> Vec<(u32, u32)> {
        let mut pairs: Vec<_> = edges
            .chunks_exact(2)
            .map(|pair| (pair[0].min(pair[1]), pair[0].max(pair[1])))
            .collect();
        pairs.sort_unstable();
        pairs
    }

    #[test]
    fn shared_edges_are_emitted_once() {
        // quad split into two triangles along 0-2
        let edges = edge_indices(&[0, 1, 2, 0, 2, 3]);
        assert_eq!(
            normalized(&edges),
            vec![(0, 1), (0, 2), (0, 3), (1, 2), (2, 3)]
        );
    }

    #[test]
    fn opposite_winding_shares_edges() {
        let edges = edge_indices(&[0, 1, 2, 2, 1, 0]);
        assert_eq!(edges.len(), 6);
    }

    #[test]
    fn trailing_partial_triangle_is_ignored() {
        assert!(edge_indices(&[0, 1]).is_empty());
        assert_eq!(edge_indices(&[0, 1, 2, 3]).len(), 6);
    }

    #[test]
    fn line_polygons_share_solid_culling() {
        let mode = WireMode::for_features(wgpu::Features::POLYGON_MODE_LINE);
        assert_eq!(mode, WireMode::PolygonLines);
        assert_eq!(mode.required_features(), wgpu::Features::POLYGON_MODE_LINE);

        let primitive = mode.primitive(Some(wgpu::Face::Back));
        assert_eq!(primitive.topology, wgpu::PrimitiveTopology::TriangleList);
        assert_eq!(primitive.polygon_mode, wgpu::PolygonMode::Line);
        assert_eq!(primitive.cull_mode, solid_primitive(Some(wgpu::Face::Back)).cull_mode);
    }

    #[test]
    fn edge_list_fallback_needs_no_features() {
        let mode = WireMode::for_features(wgpu::Features::empty());
        assert_eq!(mode, WireMode::EdgeList);
        assert!(mode.required_features().is_empty());

        let primitive = mode.primitive(Some(wgpu::Face::Back));
        assert_eq!(primitive.topology, wgpu::PrimitiveTopology::LineList);
        assert_eq!(primitive.polygon_mode, wgpu::PolygonMode::Fill);
        assert_eq!(primitive.cull_mode, None);
    }

    #[test]
    fn uniform_block_is_std140_sized() {
        assert_eq!(std::mem::size_of::<Uniforms>(), 240);
        assert_eq!(std::mem::size_of::<Uniforms>() % 16, 0);
    }
}
