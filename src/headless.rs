// ============================================================================
// headless.rs — Life GPU
// Off-screen batch runner: computes generations without a window, optionally
// checking each one against the CPU model, and saves the final grid.
// ============================================================================

use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::capture::{self, CaptureError};
use crate::config::SimulationSettings;
use crate::controller::LifeController;
use crate::gpu::{self, GpuError};

#[derive(Debug, thiserror::Error)]
pub enum HeadlessError {
    #[error(transparent)]
    Gpu(#[from] GpuError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("generation {generation}: GPU and CPU grids differ in {differing} cells")]
    Mismatch { generation: u64, differing: usize },
}

#[derive(Clone, Debug)]
pub struct HeadlessConfig {
    /// Generations to compute after the initial state.
    pub generations: u32,
    pub settings: SimulationSettings,
    pub seed: Option<u32>,
    pub output: Option<PathBuf>,
    pub verify: bool,
    pub progress_interval: u32,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            generations: 1000,
            settings: SimulationSettings::default(),
            seed: None,
            output: None,
            verify: false,
            progress_interval: 500,
        }
    }
}

#[derive(Clone, Debug)]
pub struct HeadlessReport {
    pub generations: u64,
    pub population: u64,
    pub elapsed: Duration,
    pub gens_per_sec: f64,
}

pub fn run_headless(config: &HeadlessConfig) -> Result<HeadlessReport, HeadlessError> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });
    let ctx = pollster::block_on(gpu::request_device(&instance, None))?;
    run_on_device(&ctx.device, &ctx.queue, config)
}

pub fn run_on_device(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    config: &HeadlessConfig,
) -> Result<HeadlessReport, HeadlessError> {
    let mut controller = LifeController::new(device, &config.settings)?;
    controller.set_seed(config.seed);

    log::info!(
        "Headless run started: {} generations on {}",
        config.generations,
        config.settings.model_size
    );

    let started = Instant::now();
    let mut last_report = Instant::now();
    let mut last_report_gen = 0u32;

    // Initial state.
    submit_tick(device, queue, &mut controller, started.elapsed());
    let mut expected = if config.verify {
        Some(controller.read_current(device, queue)?)
    } else {
        None
    };

    for step in 0..config.generations {
        submit_tick(device, queue, &mut controller, started.elapsed());

        if let Some(cpu) = expected.as_mut() {
            *cpu = cpu.step(controller.rule());
            let gpu = controller.read_current(device, queue)?;
            let differing = gpu
                .cells()
                .iter()
                .zip(cpu.cells())
                .filter(|(a, b)| a != b)
                .count();
            if differing > 0 {
                return Err(HeadlessError::Mismatch {
                    generation: controller.generation(),
                    differing,
                });
            }
        }

        if config.progress_interval > 0 && (step + 1) % config.progress_interval == 0 {
            let done = step + 1;
            let total_elapsed = started.elapsed().as_secs_f64().max(1e-6);
            let total_rate = done as f64 / total_elapsed;

            let window_elapsed = last_report.elapsed().as_secs_f64().max(1e-6);
            let window_rate = (done - last_report_gen) as f64 / window_elapsed;

            log::info!(
                "Headless progress: {}/{} | gens/sec={:.0} (window {:.0})",
                done,
                config.generations,
                total_rate,
                window_rate,
            );
            last_report = Instant::now();
            last_report_gen = done;
        }
    }

    let final_grid = controller.read_current(device, queue)?;
    let elapsed = started.elapsed();
    if let Some(path) = &config.output {
        capture::save_grid_png(path, &final_grid)?;
    }

    let report = HeadlessReport {
        generations: controller.generation(),
        population: final_grid.population(),
        elapsed,
        gens_per_sec: controller.generation() as f64 / elapsed.as_secs_f64().max(1e-6),
    };
    log::info!(
        "Headless run finished: {} generations in {:.2}s ({:.0} gens/sec), population {}",
        report.generations,
        report.elapsed.as_secs_f64(),
        report.gens_per_sec,
        report.population
    );
    Ok(report)
}

fn submit_tick(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    controller: &mut LifeController,
    elapsed: Duration,
) {
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("headless_sim_encoder"),
    });
    controller.tick(device, &mut encoder, elapsed);
    gpu::debug_scope(device, "headless tick", || {
        queue.submit(std::iter::once(encoder.finish()));
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InitialMode, ModelSize};
    use crate::gpu::test_device;
    use crate::rules::find_rule;

    fn config(mode: InitialMode, generations: u32) -> HeadlessConfig {
        HeadlessConfig {
            generations,
            settings: SimulationSettings {
                model_size: ModelSize::S128,
                rule: find_rule("Game of Life").unwrap(),
                initial_mode: mode,
            },
            seed: Some(77),
            output: None,
            verify: false,
            progress_interval: 0,
        }
    }

    #[test]
    fn test_empty_run_stays_empty() {
        let Some((device, queue)) = test_device() else {
            return;
        };
        let report = run_on_device(&device, &queue, &config(InitialMode::Empty, 25)).unwrap();
        assert_eq!(report.generations, 25);
        assert_eq!(report.population, 0);
    }

    #[test]
    fn test_verified_runs() {
        let Some((device, queue)) = test_device() else {
            return;
        };
        for (mode, rule) in [
            (InitialMode::UniformRandom, "Game of Life"),
            (InitialMode::RadialRandom, "High Life"),
            (InitialMode::UniformRandom, "Day and Night"),
        ] {
            let mut cfg = config(mode, 30);
            cfg.settings.rule = find_rule(rule).unwrap();
            cfg.verify = true;
            let report = run_on_device(&device, &queue, &cfg).unwrap();
            assert_eq!(report.generations, 30);
        }
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let Some((device, queue)) = test_device() else {
            return;
        };
        let a = run_on_device(&device, &queue, &config(InitialMode::UniformRandom, 10)).unwrap();
        let b = run_on_device(&device, &queue, &config(InitialMode::UniformRandom, 10)).unwrap();
        assert_eq!(a.population, b.population);
        assert!(a.population > 0);
    }

    #[test]
    fn test_output_png_written() {
        let Some((device, queue)) = test_device() else {
            return;
        };
        let dir = std::env::temp_dir().join(format!("life_gpu_headless_{}", std::process::id()));
        let mut cfg = config(InitialMode::RadialRandom, 5);
        cfg.output = Some(dir.join("final.png"));
        run_on_device(&device, &queue, &cfg).unwrap();
        let img = image::open(dir.join("final.png")).unwrap();
        assert_eq!((img.width(), img.height()), (128, 128));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
