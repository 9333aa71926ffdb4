//! wgpu plumbing.
//!
//! - `context` owns the instance, adapter, device and the negotiated surface
//!   format shared by all displays.
//! - `compiler` implements [`ShaderCompiler`](crate::ShaderCompiler) against the
//!   device and produces [`CompiledProgram`]s.
//! - `uniforms` mirrors the prelude's uniform block.
//! - `display` owns one window surface and presents frames into it.

mod compiler;
mod context;
mod display;
mod uniforms;

pub use compiler::{CompiledProgram, GpuCompiler, ProgramLayout};
pub use context::{is_hdr_format, preferred_format, GpuContext};
pub use display::Display;
pub use uniforms::ShaderUniforms;
