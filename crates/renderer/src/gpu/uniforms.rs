use bytemuck::{Pod, Zeroable};
use rotation::FrameUniforms;

/// CPU mirror of the `ToysaverUniforms` std140 block declared in the prelude.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ShaderUniforms {
    pub resolution: [f32; 3],
    pub time: f32,
    pub time_delta: f32,
    pub frame: f32,
    pub frame_rate: f32,
    pub hdr_supported: i32,
    pub mouse: [f32; 2],
    pub padding: [f32; 2],
}

impl ShaderUniforms {
    pub const SIZE: wgpu::BufferAddress = std::mem::size_of::<Self>() as wgpu::BufferAddress;
}

impl From<&FrameUniforms> for ShaderUniforms {
    fn from(frame: &FrameUniforms) -> Self {
        Self {
            resolution: frame.resolution,
            time: frame.time,
            time_delta: frame.time_delta,
            frame: frame.frame,
            frame_rate: frame.frame_rate,
            hdr_supported: i32::from(frame.hdr_supported),
            mouse: frame.mouse,
            padding: [0.0; 2],
        }
    }
}

#[cfg(test)]
mod tests {
    use std::mem::offset_of;

    use super::*;

    #[test]
    fn matches_std140_layout() {
        assert_eq!(ShaderUniforms::SIZE, 48);
        assert_eq!(offset_of!(ShaderUniforms, time), 12);
        assert_eq!(offset_of!(ShaderUniforms, frame_rate), 24);
        assert_eq!(offset_of!(ShaderUniforms, hdr_supported), 28);
        assert_eq!(offset_of!(ShaderUniforms, mouse), 32);
    }

    #[test]
    fn converts_frame_values() {
        let uniforms = ShaderUniforms::from(&FrameUniforms {
            resolution: [800.0, 600.0, 1.0],
            time: 1.5,
            time_delta: 0.05,
            frame: 30.0,
            frame_rate: 20.0,
            mouse: [0.0, 0.0],
            hdr_supported: true,
        });
        assert_eq!(uniforms.hdr_supported, 1);
        assert_eq!(uniforms.resolution, [800.0, 600.0, 1.0]);
        assert_eq!(bytemuck::bytes_of(&uniforms).len(), 48);
    }
}
