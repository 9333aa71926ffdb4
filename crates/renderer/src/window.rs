use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use rotation::RotationEngine;
use shadertoy::ShaderDocument;
use tracing::{debug, error, info, warn};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop, EventLoopBuilder, EventLoopProxy};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Fullscreen, Window, WindowBuilder, WindowId};

use crate::compile::Prelude;
use crate::gpu::{CompiledProgram, Display, GpuCompiler, GpuContext, ProgramLayout, ShaderUniforms};
use crate::programs::{ProgramSet, ProgramSetError};
use crate::resources;
use crate::{RendererConfig, WindowMode};

const WINDOW_TITLE: &str = "toysaver";

#[derive(Debug)]
pub(crate) enum RendererEvent {
    ReplaceDocuments(Vec<ShaderDocument>),
    RefreshFailed(String),
}

/// Cloneable, `Send` handle for talking to a running renderer from other
/// threads. Events are handled on the event loop thread in arrival order.
#[derive(Clone)]
pub struct RendererHandle {
    proxy: EventLoopProxy<RendererEvent>,
}

impl RendererHandle {
    /// Builds a new program set from `documents` and swaps it in as a unit.
    pub fn replace_documents(&self, documents: Vec<ShaderDocument>) -> Result<()> {
        self.send(RendererEvent::ReplaceDocuments(documents))
    }

    pub fn report_refresh_failure(&self, message: impl Into<String>) -> Result<()> {
        self.send(RendererEvent::RefreshFailed(message.into()))
    }

    fn send(&self, event: RendererEvent) -> Result<()> {
        self.proxy
            .send_event(event)
            .map_err(|_| anyhow!("renderer event loop has already exited"))
    }
}

pub(crate) struct WindowRuntime {
    event_loop: EventLoop<RendererEvent>,
    state: RenderState,
}

impl WindowRuntime {
    pub(crate) fn new(config: RendererConfig) -> Result<Self> {
        let event_loop = EventLoopBuilder::<RendererEvent>::with_user_event()
            .build()
            .map_err(|err| anyhow!("failed to create event loop: {err}"))?;
        let state = RenderState::new(&event_loop, config)?;
        Ok(Self { event_loop, state })
    }

    pub(crate) fn handle(&self) -> RendererHandle {
        RendererHandle {
            proxy: self.event_loop.create_proxy(),
        }
    }

    pub(crate) fn run(self) -> Result<()> {
        let WindowRuntime {
            event_loop,
            mut state,
        } = self;

        let run_result = event_loop.run(move |event, elwt| match event {
            Event::UserEvent(command) => match command {
                RendererEvent::ReplaceDocuments(documents) => state.replace_documents(&documents),
                RendererEvent::RefreshFailed(message) => {
                    error!("shader refresh failed; keeping current shaders: {message}");
                }
            },
            Event::WindowEvent { window_id, event } => {
                let Some(index) = state.display_index(window_id) else {
                    return;
                };
                match event {
                    WindowEvent::CloseRequested | WindowEvent::Destroyed => elwt.exit(),
                    WindowEvent::KeyboardInput { event, .. } => {
                        if event.state == ElementState::Pressed
                            && matches!(event.logical_key, Key::Named(NamedKey::Escape))
                        {
                            elwt.exit();
                        }
                    }
                    WindowEvent::Resized(new_size) => state.resize(index, new_size),
                    WindowEvent::RedrawRequested => match state.render_display(index) {
                        Ok(()) => {}
                        Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                            state.reconfigure(index);
                        }
                        Err(wgpu::SurfaceError::OutOfMemory) => {
                            error!(display = index, "surface out of memory; exiting");
                            elwt.exit();
                        }
                        Err(wgpu::SurfaceError::Timeout) => {
                            debug!(display = index, "surface timeout; retrying next frame");
                        }
                        Err(other) => {
                            warn!(display = index, "surface error: {other:?}; retrying next frame");
                        }
                    },
                    _ => {}
                }
            }
            Event::AboutToWait => {
                let deadline = state.advance(Instant::now());
                elwt.set_control_flow(ControlFlow::WaitUntil(deadline));
            }
            _ => {}
        });

        run_result.map_err(|err| anyhow!("window event loop error: {err}"))
    }
}

/// Everything the event loop owns: GPU context, displays, the current program
/// set and the rotation engine choosing among it.
struct RenderState {
    gpu: GpuContext,
    layout: ProgramLayout,
    prelude: Prelude,
    fallback: ShaderDocument,
    displays: Vec<Display>,
    programs: ProgramSet<CompiledProgram>,
    engine: RotationEngine,
    frame_interval: Duration,
    next_frame: Instant,
    last_tick: Instant,
}

impl RenderState {
    fn new(event_loop: &EventLoop<RendererEvent>, config: RendererConfig) -> Result<Self> {
        let windows = create_windows(event_loop, config.mode)?;
        let instance = GpuContext::new_instance();
        let surfaces = windows
            .iter()
            .map(|window| Display::create_surface(&instance, window))
            .collect::<Result<Vec<_>>>()?;
        let first_surface = surfaces.first().context("no window surfaces were created")?;
        let gpu = GpuContext::new(instance, first_surface)?;

        let displays: Vec<Display> = windows
            .into_iter()
            .zip(surfaces)
            .filter_map(|(window, surface)| Display::configure(&gpu, window, surface))
            .collect();
        if displays.is_empty() {
            bail!("no display can present the negotiated surface format");
        }

        let layout = ProgramLayout::new(&gpu.device);
        let fallback = resources::fallback_document()
            .context("bundled fallback shader document is malformed")?;
        let programs = build_programs(&gpu, &layout, &config.prelude, &config.documents, &fallback)?;

        let mut engine = RotationEngine::new(config.policy);
        engine.set_hdr_supported(gpu.hdr_supported());
        let now = Instant::now();
        engine.attach_displays(displays.len(), programs.len(), now)?;

        Ok(Self {
            gpu,
            layout,
            prelude: config.prelude,
            fallback,
            displays,
            programs,
            engine,
            frame_interval: config.policy.frame_interval,
            next_frame: now,
            last_tick: now,
        })
    }

    fn display_index(&self, window_id: WindowId) -> Option<usize> {
        self.displays
            .iter()
            .position(|display| display.window().id() == window_id)
    }

    fn resize(&mut self, index: usize, new_size: PhysicalSize<u32>) {
        if let Some(display) = self.displays.get_mut(index) {
            display.resize(&self.gpu, new_size);
        }
    }

    fn reconfigure(&mut self, index: usize) {
        if let Some(display) = self.displays.get_mut(index) {
            display.reconfigure(&self.gpu);
        }
    }

    /// Runs one animation tick when due and returns the next deadline.
    fn advance(&mut self, now: Instant) -> Instant {
        if now < self.next_frame {
            return self.next_frame;
        }
        let elapsed = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;
        if self.engine.tick(now, elapsed) {
            debug!("display assignment reshuffled");
        }
        for display in &self.displays {
            display.window().request_redraw();
        }
        self.next_frame = now + self.frame_interval;
        self.next_frame
    }

    fn render_display(&mut self, index: usize) -> Result<(), wgpu::SurfaceError> {
        let Some(display) = self.displays.get(index) else {
            return Ok(());
        };
        let Some(plan) = self.engine.frame(index, display.size()) else {
            return Ok(());
        };
        let Some(program) = self.programs.get(plan.program) else {
            return Ok(());
        };
        display.render(
            &self.gpu,
            &program.program,
            &ShaderUniforms::from(&plan.uniforms),
        )
    }

    fn replace_documents(&mut self, documents: &[ShaderDocument]) {
        let programs = match build_programs(
            &self.gpu,
            &self.layout,
            &self.prelude,
            documents,
            &self.fallback,
        ) {
            Ok(programs) => programs,
            Err(err) => {
                error!("failed to build refreshed shaders; keeping current set: {err}");
                return;
            }
        };
        let count = programs.len();
        self.programs = programs;
        if let Err(err) = self.engine.set_program_count(count, Instant::now()) {
            error!("failed to reassign displays: {err}");
        }
        info!(programs = count, "swapped in refreshed shaders");
    }
}

fn build_programs(
    gpu: &GpuContext,
    layout: &ProgramLayout,
    prelude: &Prelude,
    documents: &[ShaderDocument],
    fallback: &ShaderDocument,
) -> Result<ProgramSet<CompiledProgram>, ProgramSetError> {
    let compiler = GpuCompiler::new(&gpu.device, layout, gpu.surface_format);
    ProgramSet::build(
        &compiler,
        prelude,
        documents,
        resources::vertex_shader(),
        fallback,
    )
}

fn create_windows(
    event_loop: &EventLoop<RendererEvent>,
    mode: WindowMode,
) -> Result<Vec<Arc<Window>>> {
    match mode {
        WindowMode::Preview { width, height } => {
            let window = WindowBuilder::new()
                .with_title(WINDOW_TITLE)
                .with_inner_size(PhysicalSize::new(width, height))
                .build(event_loop)
                .map_err(|err| anyhow!("failed to create preview window: {err}"))?;
            Ok(vec![Arc::new(window)])
        }
        WindowMode::Fullscreen => {
            let monitors: Vec<_> = event_loop.available_monitors().collect();
            if monitors.is_empty() {
                bail!("no monitors available");
            }
            monitors
                .into_iter()
                .enumerate()
                .map(|(index, monitor)| {
                    let name = monitor.name();
                    let window = WindowBuilder::new()
                        .with_title(WINDOW_TITLE)
                        .with_decorations(false)
                        .with_fullscreen(Some(Fullscreen::Borderless(Some(monitor))))
                        .build(event_loop)
                        .map_err(|err| anyhow!("failed to create fullscreen window: {err}"))?;
                    window.set_cursor_visible(false);
                    info!(display = index, monitor = ?name, "opened fullscreen window");
                    Ok(Arc::new(window))
                })
                .collect()
        }
    }
}
