// ============================================================================
// main.rs — Life GPU
// Entry point. Initializes logging, parses the command line and either runs
// the windowed simulator or a headless batch.
// ============================================================================

mod app;
mod capture;
mod config;
mod controller;
mod generation;
mod gpu;
mod headless;
mod input;
mod presentation;
mod reference;
mod rules;
mod shaders;
mod stats;
mod surface;
mod target;
mod ui;

use std::process::ExitCode;

use app::App;
use config::{parse_args, CliOptions, USAGE};
use headless::HeadlessConfig;
use winit::event_loop::{ControlFlow, EventLoop};

fn main() -> ExitCode {
    let default_filter = if cfg!(debug_assertions) {
        "warn,life_gpu=debug"
    } else {
        "warn,life_gpu=info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let opts = match parse_args(std::env::args().skip(1)) {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("error: {e}\n\n{USAGE}");
            return ExitCode::FAILURE;
        }
    };
    if opts.show_help {
        println!("{USAGE}");
        return ExitCode::SUCCESS;
    }

    let settings = match opts.config.simulation_settings() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    match opts.headless_generations {
        Some(generations) => run_headless(&opts, generations, settings),
        None => run_windowed(opts, settings),
    }
}

fn run_headless(opts: &CliOptions, generations: u32, settings: config::SimulationSettings) -> ExitCode {
    let config = HeadlessConfig {
        generations,
        settings,
        seed: opts.seed,
        output: opts.output.clone(),
        verify: opts.verify,
        ..Default::default()
    };
    match headless::run_headless(&config) {
        Ok(report) => {
            println!(
                "{} generations, population {}, {:.0} gens/sec",
                report.generations, report.population, report.gens_per_sec
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("Headless run failed: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_windowed(opts: CliOptions, settings: config::SimulationSettings) -> ExitCode {
    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            log::error!("Failed to create event loop: {e}");
            return ExitCode::FAILURE;
        }
    };
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(opts.config, settings);
    if let Err(e) = event_loop.run_app(&mut app) {
        log::error!("Event loop terminated: {e}");
        return ExitCode::FAILURE;
    }
    // Startup errors were already logged by the handler.
    match app.take_error() {
        Some(_) => ExitCode::FAILURE,
        None => ExitCode::SUCCESS,
    }
}
