use std::borrow::Cow;

use bytemuck::Zeroable;
use wgpu::util::DeviceExt;

use super::uniforms::ShaderUniforms;
use crate::compile::{Diagnostic, ShaderCompiler, ShaderStage};

/// Bind group and pipeline layouts shared by every program on a device.
pub struct ProgramLayout {
    uniform_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
}

impl ProgramLayout {
    pub fn new(device: &wgpu::Device) -> Self {
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("uniform layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(ShaderUniforms::SIZE),
                },
                count: None,
            }],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("shader pipeline layout"),
            bind_group_layouts: &[&uniform_layout],
            push_constant_ranges: &[],
        });
        Self {
            uniform_layout,
            pipeline_layout,
        }
    }
}

/// A linked pipeline with its own uniform buffer and bind group, created
/// together at link time.
pub struct CompiledProgram {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl CompiledProgram {
    pub fn write_uniforms(&self, queue: &wgpu::Queue, uniforms: &ShaderUniforms) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));
    }

    /// Full-screen quad: four vertices as a triangle strip.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.draw(0..4, 0..1);
    }
}

/// Compiles against a live device. Validation errors are captured through an
/// error scope so a bad shader never reaches the device's error handler.
pub struct GpuCompiler<'a> {
    device: &'a wgpu::Device,
    layout: &'a ProgramLayout,
    target_format: wgpu::TextureFormat,
}

impl<'a> GpuCompiler<'a> {
    pub fn new(
        device: &'a wgpu::Device,
        layout: &'a ProgramLayout,
        target_format: wgpu::TextureFormat,
    ) -> Self {
        Self {
            device,
            layout,
            target_format,
        }
    }

    fn scoped<T>(&self, build: impl FnOnce() -> T) -> Result<T, String> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = build();
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(err) => Err(err.to_string()),
            None => Ok(value),
        }
    }
}

impl ShaderCompiler for GpuCompiler<'_> {
    type Shader = wgpu::ShaderModule;
    type Program = CompiledProgram;

    fn compile(&self, stage: ShaderStage, source: &str) -> Result<wgpu::ShaderModule, Diagnostic> {
        let label = match stage {
            ShaderStage::Vertex => "toysaver vertex",
            ShaderStage::Fragment => "toysaver fragment",
        };
        self.scoped(|| {
            self.device
                .create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(label),
                    source: wgpu::ShaderSource::Glsl {
                        shader: Cow::Owned(source.to_string()),
                        stage: stage.to_naga(),
                        defines: &[],
                    },
                })
        })
        .map_err(Diagnostic::compile)
    }

    fn link(
        &self,
        vertex: &wgpu::ShaderModule,
        fragment: &wgpu::ShaderModule,
    ) -> Result<CompiledProgram, Diagnostic> {
        self.scoped(|| {
            let pipeline = self
                .device
                .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some("shader pipeline"),
                    layout: Some(&self.layout.pipeline_layout),
                    vertex: wgpu::VertexState {
                        module: vertex,
                        entry_point: Some("main"),
                        buffers: &[],
                        compilation_options: wgpu::PipelineCompilationOptions::default(),
                    },
                    primitive: wgpu::PrimitiveState {
                        topology: wgpu::PrimitiveTopology::TriangleStrip,
                        strip_index_format: None,
                        front_face: wgpu::FrontFace::Ccw,
                        cull_mode: None,
                        polygon_mode: wgpu::PolygonMode::Fill,
                        unclipped_depth: false,
                        conservative: false,
                    },
                    depth_stencil: None,
                    multisample: wgpu::MultisampleState::default(),
                    fragment: Some(wgpu::FragmentState {
                        module: fragment,
                        entry_point: Some("main"),
                        targets: &[Some(wgpu::ColorTargetState {
                            format: self.target_format,
                            blend: None,
                            write_mask: wgpu::ColorWrites::ALL,
                        })],
                        compilation_options: wgpu::PipelineCompilationOptions::default(),
                    }),
                    multiview: None,
                    cache: None,
                });
            let uniform_buffer =
                self.device
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some("uniform buffer"),
                        contents: bytemuck::bytes_of(&ShaderUniforms::zeroed()),
                        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    });
            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("uniform bind group"),
                layout: &self.layout.uniform_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                }],
            });
            CompiledProgram {
                pipeline,
                uniform_buffer,
                bind_group,
            }
        })
        .map_err(Diagnostic::link)
    }
}
