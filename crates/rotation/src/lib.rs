//! Display to shader assignment and per-frame clock.
//!
//! The engine is GPU-free: it only decides which program index each display
//! draws and which uniform values go with it. Rendering code asks for a
//! [`FramePlan`] per display and binds whatever program sits at that index.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::prelude::*;
use tracing::{debug, info};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RotationError {
    #[error("at least one display is required")]
    NoDisplays,
    #[error("at least one program is required")]
    NoPrograms,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentMode {
    /// Every display gets its own program.
    Separate,
    /// All displays mirror one program.
    Unified,
}

impl AssignmentMode {
    pub fn from_separate_screens(separate: bool) -> Self {
        if separate {
            AssignmentMode::Separate
        } else {
            AssignmentMode::Unified
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationPolicy {
    pub mode: AssignmentMode,
    pub auto_rotate: bool,
    pub rotate_interval: Duration,
    pub frame_interval: Duration,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            mode: AssignmentMode::Unified,
            auto_rotate: false,
            rotate_interval: Duration::from_secs(300),
            frame_interval: Duration::from_millis(50),
        }
    }
}

/// Immutable shuffled program order. A reshuffle builds a new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayAssignment {
    mode: AssignmentMode,
    order: Arc<[usize]>,
}

impl DisplayAssignment {
    pub fn shuffled<R: Rng + ?Sized>(
        mode: AssignmentMode,
        program_count: usize,
        rng: &mut R,
    ) -> Result<Self, RotationError> {
        if program_count == 0 {
            return Err(RotationError::NoPrograms);
        }
        let order: Vec<usize> = match mode {
            AssignmentMode::Separate => {
                let mut order: Vec<usize> = (0..program_count).collect();
                order.shuffle(rng);
                order
            }
            AssignmentMode::Unified => vec![rng.gen_range(0..program_count)],
        };
        Ok(Self {
            mode,
            order: order.into(),
        })
    }

    pub fn mode(&self) -> AssignmentMode {
        self.mode
    }

    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Displays beyond the program count wrap around.
    pub fn program_for(&self, display_index: usize) -> usize {
        match self.mode {
            AssignmentMode::Separate => self.order[display_index % self.order.len()],
            AssignmentMode::Unified => self.order[0],
        }
    }
}

/// Frame counter and elapsed time of the currently assigned shaders.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RotationClock {
    frame: u64,
    elapsed: f64,
    last_delta: f64,
}

impl RotationClock {
    pub fn advance(&mut self, delta: Duration) {
        let delta = delta.as_secs_f64();
        self.frame += 1;
        self.elapsed += delta;
        self.last_delta = delta;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn last_delta(&self) -> f64 {
        self.last_delta
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameUniforms {
    pub resolution: [f32; 3],
    pub time: f32,
    pub time_delta: f32,
    pub frame: f32,
    pub frame_rate: f32,
    pub mouse: [f32; 2],
    pub hdr_supported: bool,
}

/// What one display draws this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramePlan {
    pub program: usize,
    pub uniforms: FrameUniforms,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running,
}

pub struct RotationEngine {
    policy: RotationPolicy,
    state: EngineState,
    display_count: usize,
    program_count: usize,
    assignment: Option<DisplayAssignment>,
    clock: RotationClock,
    last_shuffle: Option<Instant>,
    hdr_supported: bool,
    rng: StdRng,
}

impl RotationEngine {
    pub fn new(policy: RotationPolicy) -> Self {
        Self::with_rng(policy, StdRng::from_entropy())
    }

    pub fn with_seed(policy: RotationPolicy, seed: u64) -> Self {
        Self::with_rng(policy, StdRng::seed_from_u64(seed))
    }

    fn with_rng(policy: RotationPolicy, rng: StdRng) -> Self {
        Self {
            policy,
            state: EngineState::Idle,
            display_count: 0,
            program_count: 0,
            assignment: None,
            clock: RotationClock::default(),
            last_shuffle: None,
            hdr_supported: false,
            rng,
        }
    }

    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn clock(&self) -> &RotationClock {
        &self.clock
    }

    pub fn assignment(&self) -> Option<&DisplayAssignment> {
        self.assignment.as_ref()
    }

    pub fn display_count(&self) -> usize {
        self.display_count
    }

    pub fn set_hdr_supported(&mut self, supported: bool) {
        self.hdr_supported = supported;
    }

    /// Attaches the displays and starts animating with a fresh assignment.
    pub fn attach_displays(
        &mut self,
        display_count: usize,
        program_count: usize,
        now: Instant,
    ) -> Result<(), RotationError> {
        let mode = self.policy.mode;
        self.initialize_assignment(display_count, program_count, mode)?;
        self.last_shuffle = Some(now);
        self.state = EngineState::Running;
        info!(
            displays = display_count,
            programs = program_count,
            mode = ?self.policy.mode,
            "rotation engine running"
        );
        Ok(())
    }

    pub fn detach_displays(&mut self) {
        self.state = EngineState::Idle;
        self.display_count = 0;
        self.assignment = None;
        self.clock.reset();
        self.last_shuffle = None;
    }

    /// Builds a new random assignment and restarts the clock.
    pub fn initialize_assignment(
        &mut self,
        display_count: usize,
        program_count: usize,
        mode: AssignmentMode,
    ) -> Result<&DisplayAssignment, RotationError> {
        if display_count == 0 {
            return Err(RotationError::NoDisplays);
        }
        let assignment = DisplayAssignment::shuffled(mode, program_count, &mut self.rng)?;
        debug!(order = ?assignment.order(), "new display assignment");
        self.policy.mode = mode;
        self.display_count = display_count;
        self.program_count = program_count;
        self.clock.reset();
        Ok(self.assignment.insert(assignment))
    }

    /// Called after the program list is replaced.
    pub fn set_program_count(
        &mut self,
        program_count: usize,
        now: Instant,
    ) -> Result<(), RotationError> {
        if program_count == 0 {
            return Err(RotationError::NoPrograms);
        }
        self.program_count = program_count;
        if self.state == EngineState::Running {
            let (displays, mode) = (self.display_count, self.policy.mode);
            self.initialize_assignment(displays, program_count, mode)?;
            self.last_shuffle = Some(now);
        }
        Ok(())
    }

    /// Advances the clock by one step and reshuffles when the rotate interval
    /// has passed. Returns `true` when a reshuffle happened.
    pub fn tick(&mut self, now: Instant, elapsed: Duration) -> bool {
        if self.state != EngineState::Running {
            return false;
        }
        self.clock.advance(elapsed);
        if !self.policy.auto_rotate {
            return false;
        }
        let due = self
            .last_shuffle
            .map_or(true, |last| now.duration_since(last) >= self.policy.rotate_interval);
        if !due {
            return false;
        }
        let mode = self.policy.mode;
        if self
            .initialize_assignment(self.display_count, self.program_count, mode)
            .is_err()
        {
            return false;
        }
        self.last_shuffle = Some(now);
        info!(order = ?self.assignment.as_ref().map(|a| a.order()), "reshuffled shaders");
        true
    }

    /// Program index and uniforms for one display, or `None` while idle.
    pub fn frame(&self, display_index: usize, viewport: (u32, u32)) -> Option<FramePlan> {
        if self.state != EngineState::Running {
            return None;
        }
        let assignment = self.assignment.as_ref()?;
        let frame_rate = match self.policy.frame_interval.as_secs_f32() {
            secs if secs > 0.0 => 1.0 / secs,
            _ => 0.0,
        };
        Some(FramePlan {
            program: assignment.program_for(display_index),
            uniforms: FrameUniforms {
                resolution: [viewport.0 as f32, viewport.1 as f32, 1.0],
                time: self.clock.elapsed() as f32,
                time_delta: self.clock.last_delta() as f32,
                frame: self.clock.frame() as f32,
                frame_rate,
                mouse: [0.0, 0.0],
                hdr_supported: self.hdr_supported,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STEP: Duration = Duration::from_millis(50);

    fn policy(mode: AssignmentMode, auto_rotate: bool) -> RotationPolicy {
        RotationPolicy {
            mode,
            auto_rotate,
            ..RotationPolicy::default()
        }
    }

    #[test]
    fn separate_assignment_is_a_permutation() {
        let mut rng = StdRng::seed_from_u64(9);
        let assignment = DisplayAssignment::shuffled(AssignmentMode::Separate, 5, &mut rng).unwrap();
        let mut order = assignment.order().to_vec();
        order.sort_unstable();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn separate_mode_wraps_displays() {
        let mut engine = RotationEngine::with_seed(policy(AssignmentMode::Separate, false), 1);
        engine.attach_displays(3, 2, Instant::now()).unwrap();
        let order = engine.assignment().unwrap().order().to_vec();
        for display in 0..3 {
            let plan = engine.frame(display, (800, 600)).unwrap();
            assert_eq!(plan.program, order[display % order.len()]);
        }
        assert_eq!(
            engine.frame(2, (1, 1)).unwrap().program,
            engine.frame(0, (1, 1)).unwrap().program
        );
    }

    #[test]
    fn unified_displays_share_program_after_every_shuffle() {
        for seed in 0..16 {
            let mut engine = RotationEngine::with_seed(policy(AssignmentMode::Unified, true), seed);
            let start = Instant::now();
            engine.attach_displays(4, 7, start).unwrap();
            engine.tick(start + Duration::from_secs(301), STEP);
            let first = engine.frame(0, (10, 10)).unwrap().program;
            assert!(first < 7);
            for display in 1..4 {
                assert_eq!(engine.frame(display, (10, 10)).unwrap().program, first);
            }
        }
    }

    #[test]
    fn assignment_is_stable_between_shuffles() {
        let mut engine = RotationEngine::with_seed(policy(AssignmentMode::Separate, true), 4);
        let start = Instant::now();
        engine.attach_displays(2, 6, start).unwrap();
        let before = engine.assignment().cloned();
        for step in 1..100 {
            assert!(!engine.tick(start + STEP * step, STEP));
        }
        assert_eq!(engine.assignment().cloned(), before);
    }

    #[test]
    fn reshuffle_resets_clock() {
        let mut engine = RotationEngine::with_seed(policy(AssignmentMode::Separate, true), 2);
        let start = Instant::now();
        engine.attach_displays(1, 3, start).unwrap();
        engine.tick(start + STEP, STEP);
        engine.tick(start + STEP * 2, STEP);
        assert_eq!(engine.clock().frame(), 2);

        assert!(engine.tick(start + Duration::from_secs(300), STEP));
        assert_eq!(engine.clock().frame(), 0);
        assert_eq!(engine.clock().elapsed(), 0.0);

        let plan = engine.frame(0, (640, 480)).unwrap();
        assert_eq!(plan.uniforms.frame, 0.0);
        assert_eq!(plan.uniforms.time, 0.0);
    }

    #[test]
    fn auto_rotate_disabled_never_reshuffles() {
        let mut engine = RotationEngine::with_seed(policy(AssignmentMode::Separate, false), 3);
        let start = Instant::now();
        engine.attach_displays(1, 3, start).unwrap();
        assert!(!engine.tick(start + Duration::from_secs(3600), STEP));
        assert_eq!(engine.clock().frame(), 1);
    }

    #[test]
    fn idle_engine_draws_nothing() {
        let mut engine = RotationEngine::with_seed(RotationPolicy::default(), 0);
        assert_eq!(engine.state(), EngineState::Idle);
        assert!(engine.frame(0, (100, 100)).is_none());
        assert!(!engine.tick(Instant::now(), STEP));
        assert_eq!(engine.clock().frame(), 0);
    }

    #[test]
    fn rejects_empty_topologies() {
        let mut engine = RotationEngine::with_seed(RotationPolicy::default(), 0);
        let now = Instant::now();
        assert_eq!(engine.attach_displays(0, 1, now), Err(RotationError::NoDisplays));
        assert_eq!(engine.attach_displays(1, 0, now), Err(RotationError::NoPrograms));
        assert_eq!(engine.state(), EngineState::Idle);
    }

    #[test]
    fn program_count_change_restarts_rotation() {
        let mut engine = RotationEngine::with_seed(policy(AssignmentMode::Separate, false), 5);
        let start = Instant::now();
        engine.attach_displays(2, 1, start).unwrap();
        engine.tick(start + STEP, STEP);
        engine.set_program_count(4, start + STEP).unwrap();
        assert_eq!(engine.assignment().unwrap().order().len(), 4);
        assert_eq!(engine.clock().frame(), 0);
    }

    #[test]
    fn uniforms_follow_clock_and_viewport() {
        let mut engine = RotationEngine::with_seed(RotationPolicy::default(), 8);
        engine.set_hdr_supported(true);
        let start = Instant::now();
        engine.attach_displays(1, 1, start).unwrap();
        engine.tick(start + STEP, STEP);
        engine.tick(start + STEP * 2, STEP);
        let uniforms = engine.frame(0, (1920, 1080)).unwrap().uniforms;
        assert_eq!(uniforms.resolution, [1920.0, 1080.0, 1.0]);
        assert_eq!(uniforms.frame, 2.0);
        assert!((uniforms.time - 0.1).abs() < 1e-6);
        assert!((uniforms.time_delta - 0.05).abs() < 1e-6);
        assert!((uniforms.frame_rate - 20.0).abs() < 1e-3);
        assert_eq!(uniforms.mouse, [0.0, 0.0]);
        assert!(uniforms.hdr_supported);
    }
}
