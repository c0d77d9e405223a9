// ============================================================================
// controller.rs — Life GPU
// Simulation controller: decides each tick between (re)initialization and a
// regular generation step, feeds the shader uniforms and drives the
// ping-pong swap.
// ============================================================================

use std::time::Duration;

use crate::config::{InitialMode, ModelSize, SimulationSettings};
use crate::generation::{CellGrid, GenerationStore, CELL_FORMAT};
use crate::gpu::GpuError;
use crate::reference::CpuGrid;
use crate::rules::AutomatonRule;
use crate::shaders::{self, InitParams, StepParams};
use crate::surface::PlanarRenderer;
use crate::target::OffscreenTarget;

// ======================== Manual Edits ========================

/// Normalized grid coordinate of a manual edit; (0, 0) is the top-left
/// corner of the grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ActivityPos {
    s: f32,
    t: f32,
}

impl ActivityPos {
    /// `None` unless both coordinates lie in [0, 1].
    pub fn new(s: f32, t: f32) -> Option<Self> {
        let unit = 0.0..=1.0;
        (unit.contains(&s) && unit.contains(&t)).then_some(Self { s, t })
    }

    pub fn s(&self) -> f32 {
        self.s
    }

    pub fn t(&self) -> f32 {
        self.t
    }

    /// The cell a nearest-filtered sample at this position would hit.
    /// 1.0 belongs to the last cell.
    pub fn cell(&self, size: u32) -> (u32, u32) {
        let last = size.saturating_sub(1);
        let x = ((self.s * size as f32).floor() as u32).min(last);
        let y = ((self.t * size as f32).floor() as u32).min(last);
        (x, y)
    }
}

// ======================== State Machine ========================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    NeedsInit,
    Running,
}

/// What the next tick will draw.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TickPlan {
    Initialize(InitParams),
    Step(StepParams),
}

/// What a tick actually did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickKind {
    Initialized,
    Stepped,
    /// No grids allocated.
    Idle,
}

/// GPU-free part of the controller.
#[derive(Clone, Debug)]
pub struct ControlState {
    phase: Phase,
    rule: &'static AutomatonRule,
    mode: InitialMode,
    pending_activity: Option<ActivityPos>,
}

impl ControlState {
    pub fn new(rule: &'static AutomatonRule, mode: InitialMode) -> Self {
        Self {
            phase: Phase::NeedsInit,
            rule,
            mode,
            pending_activity: None,
        }
    }

    /// Decide the next tick and advance the phase. A pending edit is handed
    /// to the first regular step and then cleared.
    pub fn begin_tick(&mut self, seed: u32) -> TickPlan {
        match self.phase {
            Phase::NeedsInit => {
                self.phase = Phase::Running;
                TickPlan::Initialize(InitParams {
                    init_type: self.mode.shader_id(),
                    seed,
                    ..Default::default()
                })
            }
            Phase::Running => {
                let activity = self.pending_activity.take().filter(|_| self.mode == InitialMode::Empty);
                TickPlan::Step(StepParams::new(self.rule, activity))
            }
        }
    }

    pub fn set_rule(&mut self, rule: &'static AutomatonRule) {
        self.rule = rule;
        self.phase = Phase::NeedsInit;
    }

    /// Switch the initial state. Leaving Empty mode drops any queued edit.
    pub fn set_initial_mode(&mut self, mode: InitialMode) {
        self.mode = mode;
        self.phase = Phase::NeedsInit;
        if mode != InitialMode::Empty {
            self.pending_activity = None;
        }
    }

    pub fn request_reset(&mut self) {
        self.phase = Phase::NeedsInit;
    }

    /// Queue a manual edit. Only the Empty mode accepts them; returns whether
    /// the edit was queued.
    pub fn set_activity(&mut self, pos: ActivityPos) -> bool {
        if self.mode != InitialMode::Empty {
            return false;
        }
        self.pending_activity = Some(pos);
        true
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn rule(&self) -> &'static AutomatonRule {
        self.rule
    }

    pub fn initial_mode(&self) -> InitialMode {
        self.mode
    }

    pub fn pending_activity(&self) -> Option<ActivityPos> {
        self.pending_activity
    }
}

// ======================== LifeController ========================

pub struct LifeController {
    state: ControlState,
    store: GenerationStore,
    target: OffscreenTarget,
    step_renderer: PlanarRenderer,
    init_renderer: PlanarRenderer,
    seed_override: Option<u32>,
}

impl LifeController {
    /// Build renderers and allocate the first grid pair. Any failure here is
    /// a configuration error.
    pub fn new(device: &wgpu::Device, settings: &SimulationSettings) -> Result<Self, GpuError> {
        let step_renderer = PlanarRenderer::configure(device, &shaders::SIMULATION, CELL_FORMAT)?;
        let init_renderer = PlanarRenderer::configure(device, &shaders::INITIAL_STATE, CELL_FORMAT)?;

        let mut controller = Self {
            state: ControlState::new(settings.rule, settings.initial_mode),
            store: GenerationStore::new(settings.model_size),
            target: OffscreenTarget::new(),
            step_renderer,
            init_renderer,
            seed_override: None,
        };
        controller.set_model_size(device, settings.model_size)?;
        log::info!(
            "Simulation: {} grid, rule {} ({}), initial state {}",
            settings.model_size,
            settings.rule.name,
            settings.rule.descriptor,
            settings.initial_mode.label()
        );
        Ok(controller)
    }

    /// Record one tick into `encoder`: either the initial-state program or
    /// one generation step into `next`, followed by the swap. Several ticks
    /// may share one encoder.
    pub fn tick(
        &mut self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        elapsed: Duration,
    ) -> TickKind {
        if !self.store.is_allocated() {
            return TickKind::Idle;
        }

        let seconds = elapsed.as_secs_f32();
        let seed = self.seed_override.unwrap_or_else(|| seconds.to_bits());
        let (renderer, kind, label) = match self.state.begin_tick(seed) {
            TickPlan::Initialize(params) => {
                self.init_renderer.set_params(&params);
                (&mut self.init_renderer, TickKind::Initialized, "init_pass")
            }
            TickPlan::Step(params) => {
                if params.need_set_activity != 0 {
                    log::debug!("Manual edit at {:?}", params.activity_pos);
                }
                self.step_renderer.set_params(&params);
                (&mut self.step_renderer, TickKind::Stepped, "step_pass")
            }
        };
        renderer.set_time(seconds);
        renderer.upload(device, encoder);

        if let Some(mut pass) = self.target.begin_pass(encoder, label) {
            renderer.draw(device, &mut pass);
        }

        match kind {
            TickKind::Initialized => self.store.reset_generation(),
            _ => self.store.advance_generation(),
        }
        self.store.swap();
        self.repoint();
        kind
    }

    /// Point both simulation renderers at `current` and the target at `next`.
    fn repoint(&mut self) {
        let (Some(current), Some(next)) = (self.store.current(), self.store.next()) else {
            return;
        };
        self.step_renderer.set_texture(current);
        self.init_renderer.set_texture(current);
        self.target.attach(next);
    }

    // ======================== Configuration ========================

    /// Replace both grids with a new pair of `size`. On failure the previous
    /// grids stay in place and keep running.
    pub fn set_model_size(&mut self, device: &wgpu::Device, size: ModelSize) -> Result<(), GpuError> {
        if let Err(err) = self.store.allocate(device, size) {
            log::error!("Cannot switch to a {} grid: {}", size, err);
            return Err(err);
        }
        let texels = size.texels();
        for renderer in [&mut self.step_renderer, &mut self.init_renderer] {
            renderer.forget_textures();
            renderer.resize(texels, texels);
        }
        self.target.detach();
        self.repoint();
        self.state.request_reset();
        log::info!("Model size: {}", size);
        Ok(())
    }

    pub fn set_rule(&mut self, rule: &'static AutomatonRule) {
        self.state.set_rule(rule);
        log::info!("Rule: {} ({})", rule.name, rule.descriptor);
    }

    pub fn set_initial_mode(&mut self, mode: InitialMode) {
        self.state.set_initial_mode(mode);
        log::info!("Initial state: {}", mode.label());
    }

    pub fn request_reset(&mut self) {
        self.state.request_reset();
        log::info!("Reset requested");
    }

    /// Queue a manual edit for the next step. Ignored unless the initial
    /// mode is Empty.
    pub fn set_activity(&mut self, pos: ActivityPos) -> bool {
        self.state.set_activity(pos)
    }

    /// Fixed seed for the initial-state program instead of elapsed time.
    pub fn set_seed(&mut self, seed: Option<u32>) {
        self.seed_override = seed;
    }

    // ======================== Accessors ========================

    pub fn state(&self) -> &ControlState {
        &self.state
    }

    pub fn rule(&self) -> &'static AutomatonRule {
        self.state.rule()
    }

    pub fn initial_mode(&self) -> InitialMode {
        self.state.initial_mode()
    }

    pub fn model_size(&self) -> ModelSize {
        self.store.size()
    }

    pub fn generation(&self) -> u64 {
        self.store.generation()
    }

    /// The generation produced by the last tick.
    pub fn current_grid(&self) -> Option<&CellGrid> {
        self.store.current()
    }

    pub fn read_current(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> Result<CpuGrid, GpuError> {
        self.store.read_current(device, queue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::test_device;
    use crate::rules::{find_rule, DEFAULT_RULE, RULES};
    use rand::{Rng, SeedableRng};

    // ---- ControlState ----

    #[test]
    fn test_first_tick_initializes() {
        let mut state = ControlState::new(DEFAULT_RULE, InitialMode::UniformRandom);
        assert_eq!(state.phase(), Phase::NeedsInit);
        match state.begin_tick(42) {
            TickPlan::Initialize(p) => assert_eq!((p.init_type, p.seed), (1, 42)),
            other => panic!("expected init, got {other:?}"),
        }
        assert_eq!(state.phase(), Phase::Running);
        assert!(matches!(state.begin_tick(0), TickPlan::Step(_)));
    }

    #[test]
    fn test_setters_force_reinit() {
        let mut state = ControlState::new(DEFAULT_RULE, InitialMode::Empty);
        state.begin_tick(0);
        state.set_rule(find_rule("Maze").unwrap());
        assert_eq!(state.phase(), Phase::NeedsInit);
        state.begin_tick(0);
        state.set_initial_mode(InitialMode::RadialRandom);
        assert!(matches!(state.begin_tick(0), TickPlan::Initialize(p) if p.init_type == 2));
        state.request_reset();
        assert!(matches!(state.begin_tick(0), TickPlan::Initialize(_)));
    }

    #[test]
    fn test_activity_consumed_once() {
        let mut state = ControlState::new(DEFAULT_RULE, InitialMode::Empty);
        state.begin_tick(0);
        assert!(state.set_activity(ActivityPos::new(0.5, 0.5).unwrap()));
        match state.begin_tick(0) {
            TickPlan::Step(p) => {
                assert_eq!(p.need_set_activity, 1);
                assert_eq!(p.activity_pos, [0.5, 0.5]);
            }
            other => panic!("expected step, got {other:?}"),
        }
        assert!(matches!(state.begin_tick(0), TickPlan::Step(p) if p.need_set_activity == 0));
    }

    #[test]
    fn test_activity_waits_for_first_step() {
        let mut state = ControlState::new(DEFAULT_RULE, InitialMode::Empty);
        assert!(state.set_activity(ActivityPos::new(0.1, 0.9).unwrap()));
        assert!(matches!(state.begin_tick(0), TickPlan::Initialize(_)));
        assert!(matches!(state.begin_tick(0), TickPlan::Step(p) if p.need_set_activity == 1));
    }

    #[test]
    fn test_activity_ignored_outside_manual_mode() {
        let mut state = ControlState::new(DEFAULT_RULE, InitialMode::RadialRandom);
        state.begin_tick(0);
        assert!(!state.set_activity(ActivityPos::new(0.5, 0.5).unwrap()));
        assert!(state.pending_activity().is_none());
        assert!(matches!(state.begin_tick(0), TickPlan::Step(p) if p.need_set_activity == 0));
    }

    #[test]
    fn test_queued_activity_dropped_on_mode_change() {
        let mut state = ControlState::new(DEFAULT_RULE, InitialMode::Empty);
        state.begin_tick(0);
        assert!(state.set_activity(ActivityPos::new(0.5, 0.5).unwrap()));
        state.set_initial_mode(InitialMode::UniformRandom);
        assert!(state.pending_activity().is_none());
        assert!(matches!(state.begin_tick(0), TickPlan::Initialize(p) if p.init_type == 1));
        assert!(matches!(state.begin_tick(0), TickPlan::Step(p) if p.need_set_activity == 0));
    }

    #[test]
    fn test_activity_pos_bounds() {
        assert!(ActivityPos::new(-0.01, 0.5).is_none());
        assert!(ActivityPos::new(0.5, 1.01).is_none());
        assert!(ActivityPos::new(f32::NAN, 0.5).is_none());
        let corner = ActivityPos::new(1.0, 0.0).unwrap();
        assert_eq!(corner.cell(128), (127, 0));
        let mid = ActivityPos::new(0.5, 0.25).unwrap();
        assert_eq!(mid.cell(128), (64, 32));
        assert_eq!(ActivityPos::new(0.0039, 0.0).unwrap().cell(256), (0, 0));
    }

    // ---- GPU ----

    fn settings(size: ModelSize, rule: &'static AutomatonRule, mode: InitialMode) -> SimulationSettings {
        SimulationSettings {
            model_size: size,
            rule,
            initial_mode: mode,
        }
    }

    fn run_tick(ctrl: &mut LifeController, device: &wgpu::Device, queue: &wgpu::Queue) -> TickKind {
        let mut encoder = device.create_command_encoder(&Default::default());
        let kind = ctrl.tick(device, &mut encoder, Duration::from_millis(250));
        queue.submit(std::iter::once(encoder.finish()));
        kind
    }

    #[test]
    fn test_empty_grid_stays_empty() {
        let Some((device, queue)) = test_device() else {
            return;
        };
        for rule in RULES.iter() {
            let mut ctrl =
                LifeController::new(&device, &settings(ModelSize::S128, rule, InitialMode::Empty))
                    .unwrap();
            assert_eq!(run_tick(&mut ctrl, &device, &queue), TickKind::Initialized);
            for _ in 0..4 {
                assert_eq!(run_tick(&mut ctrl, &device, &queue), TickKind::Stepped);
            }
            assert_eq!(ctrl.generation(), 4);
            let grid = ctrl.read_current(&device, &queue).unwrap();
            assert_eq!(grid.population(), 0, "{}", rule.name);
        }
    }

    #[test]
    fn test_gpu_step_matches_cpu_model() {
        let Some((device, queue)) = test_device() else {
            return;
        };
        let mut rng = rand::rngs::StdRng::seed_from_u64(5);
        for rule in RULES.iter() {
            let mut ctrl =
                LifeController::new(&device, &settings(ModelSize::S128, rule, InitialMode::Empty))
                    .unwrap();
            run_tick(&mut ctrl, &device, &queue);

            let mut soup = CpuGrid::new(128);
            for y in 0..128 {
                for x in 0..128 {
                    soup.set(x, y, rng.gen_bool(0.35));
                }
            }
            ctrl.store.upload_current(&queue, &soup);
            run_tick(&mut ctrl, &device, &queue);
            let gpu = ctrl.read_current(&device, &queue).unwrap();
            assert_eq!(gpu, soup.step(rule), "{}", rule.name);
        }
    }

    #[test]
    fn test_uniform_init_matches_cpu_model() {
        let Some((device, queue)) = test_device() else {
            return;
        };
        let mut ctrl = LifeController::new(
            &device,
            &settings(ModelSize::S256, DEFAULT_RULE, InitialMode::UniformRandom),
        )
        .unwrap();
        ctrl.set_seed(Some(1234));
        assert_eq!(run_tick(&mut ctrl, &device, &queue), TickKind::Initialized);
        assert_eq!(ctrl.generation(), 0);
        let gpu = ctrl.read_current(&device, &queue).unwrap();
        assert_eq!(gpu, CpuGrid::seeded(256, InitialMode::UniformRandom, 1234));
    }

    #[test]
    fn test_radial_init_is_centred() {
        let Some((device, queue)) = test_device() else {
            return;
        };
        let mut ctrl = LifeController::new(
            &device,
            &settings(ModelSize::S128, DEFAULT_RULE, InitialMode::RadialRandom),
        )
        .unwrap();
        ctrl.set_seed(Some(9));
        run_tick(&mut ctrl, &device, &queue);
        let gpu = ctrl.read_current(&device, &queue).unwrap();
        let cpu = CpuGrid::seeded(128, InitialMode::RadialRandom, 9);
        // Float rounding at the falloff edge may flip a handful of cells.
        let differing = gpu.cells().iter().zip(cpu.cells()).filter(|(a, b)| a != b).count();
        assert!(differing < 16, "{differing} cells differ");
        assert!(!gpu.get(0, 0) && !gpu.get(127, 0));
    }

    #[test]
    fn test_manual_edit_overrides_rule_once() {
        let Some((device, queue)) = test_device() else {
            return;
        };
        let mut ctrl = LifeController::new(
            &device,
            &settings(ModelSize::S128, DEFAULT_RULE, InitialMode::Empty),
        )
        .unwrap();
        run_tick(&mut ctrl, &device, &queue);

        let pos = ActivityPos::new(10.5 / 128.0, 20.5 / 128.0).unwrap();
        assert!(ctrl.set_activity(pos));
        run_tick(&mut ctrl, &device, &queue);
        let grid = ctrl.read_current(&device, &queue).unwrap();
        assert_eq!(grid.population(), 1);
        assert!(grid.get(10, 20));

        // Isolated cell dies of underpopulation.
        run_tick(&mut ctrl, &device, &queue);
        assert_eq!(ctrl.read_current(&device, &queue).unwrap().population(), 0);
    }

    #[test]
    fn test_edit_discarded_when_leaving_manual_mode() {
        let Some((device, queue)) = test_device() else {
            return;
        };
        let mut ctrl = LifeController::new(
            &device,
            &settings(ModelSize::S128, DEFAULT_RULE, InitialMode::Empty),
        )
        .unwrap();
        ctrl.set_seed(Some(31));
        run_tick(&mut ctrl, &device, &queue);
        assert!(ctrl.set_activity(ActivityPos::new(0.5 / 128.0, 0.5 / 128.0).unwrap()));
        ctrl.set_initial_mode(InitialMode::UniformRandom);

        assert_eq!(run_tick(&mut ctrl, &device, &queue), TickKind::Initialized);
        let seeded = ctrl.read_current(&device, &queue).unwrap();
        assert_eq!(run_tick(&mut ctrl, &device, &queue), TickKind::Stepped);
        let stepped = ctrl.read_current(&device, &queue).unwrap();
        assert_eq!(stepped, seeded.step(DEFAULT_RULE));
    }

    #[test]
    fn test_ticks_batched_in_one_encoder() {
        let Some((device, queue)) = test_device() else {
            return;
        };
        let mut ctrl = LifeController::new(
            &device,
            &settings(ModelSize::S128, DEFAULT_RULE, InitialMode::Empty),
        )
        .unwrap();
        run_tick(&mut ctrl, &device, &queue);

        // Edit step then a plain step, submitted together. The block is a
        // still life, so only the edit can change it.
        let mut block = CpuGrid::new(128);
        for (x, y) in [(40, 40), (41, 40), (40, 41), (41, 41)] {
            block.set(x, y, true);
        }
        ctrl.store.upload_current(&queue, &block);
        assert!(ctrl.set_activity(ActivityPos::new(42.5 / 128.0, 40.5 / 128.0).unwrap()));
        let mut encoder = device.create_command_encoder(&Default::default());
        ctrl.tick(&device, &mut encoder, Duration::from_millis(100));
        ctrl.tick(&device, &mut encoder, Duration::from_millis(200));
        queue.submit(std::iter::once(encoder.finish()));

        let mut edited = block.step(DEFAULT_RULE);
        edited.set(42, 40, true);
        let expected = edited.step(DEFAULT_RULE);
        assert_ne!(expected, block);
        assert_eq!(ctrl.generation(), 2);
        assert_eq!(ctrl.read_current(&device, &queue).unwrap(), expected);
    }

    #[test]
    fn test_birth_with_three_neighbours() {
        let Some((device, queue)) = test_device() else {
            return;
        };
        let mut ctrl = LifeController::new(
            &device,
            &settings(ModelSize::S128, DEFAULT_RULE, InitialMode::Empty),
        )
        .unwrap();
        run_tick(&mut ctrl, &device, &queue);
        let mut cells = CpuGrid::new(128);
        // Three neighbours of (0, 0) across the wrapped corner.
        cells.set(127, 127, true);
        cells.set(0, 127, true);
        cells.set(127, 0, true);
        ctrl.store.upload_current(&queue, &cells);
        run_tick(&mut ctrl, &device, &queue);
        assert!(ctrl.read_current(&device, &queue).unwrap().get(0, 0));
    }

    #[test]
    fn test_rule_change_restarts_generation() {
        let Some((device, queue)) = test_device() else {
            return;
        };
        let mut ctrl = LifeController::new(
            &device,
            &settings(ModelSize::S128, DEFAULT_RULE, InitialMode::UniformRandom),
        )
        .unwrap();
        for _ in 0..5 {
            run_tick(&mut ctrl, &device, &queue);
        }
        assert_eq!(ctrl.generation(), 4);
        ctrl.set_rule(find_rule("High Life").unwrap());
        assert_eq!(run_tick(&mut ctrl, &device, &queue), TickKind::Initialized);
        assert_eq!(ctrl.generation(), 0);
        ctrl.set_initial_mode(InitialMode::Empty);
        assert_eq!(run_tick(&mut ctrl, &device, &queue), TickKind::Initialized);
        assert_eq!(ctrl.read_current(&device, &queue).unwrap().population(), 0);
    }

    #[test]
    fn test_model_size_change_discards_cells() {
        let Some((device, queue)) = test_device() else {
            return;
        };
        let mut ctrl = LifeController::new(
            &device,
            &settings(ModelSize::S128, DEFAULT_RULE, InitialMode::UniformRandom),
        )
        .unwrap();
        run_tick(&mut ctrl, &device, &queue);
        ctrl.set_initial_mode(InitialMode::Empty);
        ctrl.set_model_size(&device, ModelSize::S256).unwrap();
        assert_eq!(ctrl.model_size(), ModelSize::S256);
        assert_eq!(ctrl.state().phase(), Phase::NeedsInit);
        assert_eq!(run_tick(&mut ctrl, &device, &queue), TickKind::Initialized);
        let grid = ctrl.read_current(&device, &queue).unwrap();
        assert_eq!(grid.size(), 256);
        assert_eq!(grid.population(), 0);
    }
}
