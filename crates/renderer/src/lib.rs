//! Shader compilation, program management and the display loop for toysaver.
//!
//! ```text
//!   ShaderDocument ──▶ ShaderValidator ──▶ ProgramSet ──▶ RotationEngine
//!                        (prelude + body)   (+ fallback)    (display → program)
//!                                                               │
//!   Renderer::run ──▶ winit event loop ──▶ Display::render ◀─────┘
//! ```
//!
//! Compilation is abstracted behind [`ShaderCompiler`]. [`NagaCompiler`]
//! validates GLSL offline; [`gpu::GpuCompiler`] builds real pipelines on the
//! device owned by the event loop.

mod compile;
pub mod gpu;
mod offline;
mod programs;
pub mod resources;
mod validate;
mod window;

use anyhow::Result;
use rotation::RotationPolicy;
use shadertoy::ShaderDocument;

pub use compile::{
    sanitize_fragment, Diagnostic, DiagnosticKind, Prelude, ShaderCompiler, ShaderStage,
    PLACEHOLDER_MAIN_IMAGE,
};
pub use offline::{NagaCompiler, NagaProgram, NagaShader};
pub use programs::{LoadedProgram, ProgramSet, ProgramSetError, Rejection};
pub use validate::{ShaderValidator, ValidationOutcome};
pub use window::RendererHandle;

/// Where frames are presented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WindowMode {
    /// One borderless fullscreen window per monitor.
    #[default]
    Fullscreen,
    /// A single ordinary window, for previewing.
    Preview { width: u32, height: u32 },
}

/// Start-up configuration, read once.
#[derive(Debug, Clone, Default)]
pub struct RendererConfig {
    /// Documents to build the initial program set from, in rotation order.
    pub documents: Vec<ShaderDocument>,
    pub policy: RotationPolicy,
    pub mode: WindowMode,
    pub prelude: Prelude,
}

/// Entry point owning the event loop. Create it, hand out
/// [`RendererHandle`]s, then [`run`](Renderer::run) on the main thread.
pub struct Renderer {
    runtime: window::WindowRuntime,
}

impl Renderer {
    /// Opens the windows, initialises the GPU and builds the first program
    /// set. Fails only when no display can be rendered to at all.
    pub fn new(config: RendererConfig) -> Result<Self> {
        Ok(Self {
            runtime: window::WindowRuntime::new(config)?,
        })
    }

    pub fn handle(&self) -> RendererHandle {
        self.runtime.handle()
    }

    /// Blocks until the user closes a window or presses Escape.
    pub fn run(self) -> Result<()> {
        self.runtime.run()
    }
}
