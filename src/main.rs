mod config;
mod fields;
mod grid;
mod simulation;
mod visualisation;

use anyhow::Result;
use config::Config;
use fields::FieldState;
use grid::Grid;
use simulation::{Simulation, SimulationParams};
use visualisation::FieldVisualiser;

fn main() -> Result<()> {
    // Optional TOML config path; defaults reproduce the reference run.
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(&path)?,
        None => Config::builtin(),
    };
    config.print_summary();

    let grid = Grid::new(config.grid.n, config.grid.length);

    let seed = config.init.seed.unwrap_or_else(rand::random);
    println!("Using RNG seed: {}", seed);
    let state = FieldState::seeded(&grid, config.init.noise_amplitude, seed);

    let params = SimulationParams {
        dt: config.physics.dt,
        steps: config.physics.steps,
        gravity_strength: config.physics.gravity_strength,
        learning_rate: config.physics.learning_rate,
        decay_rate: config.physics.decay_rate,
        report_every: config.visualisation.report_every,
    };

    let visualiser = FieldVisualiser::new(
        &config.visualisation.output_dir,
        config.visualisation.image_width,
        config.visualisation.image_height,
    )?;

    let mut sim = Simulation::new(grid, state, params);
    sim.run_with_visualisation(&visualiser, config.visualisation.frame_every);

    if sim.state.has_non_finite() {
        eprintln!("Note: final fields contain non-finite values (the model does not guard against blow-up)");
    }

    // "ffmpeg -framerate 30 -pattern_type glob -i 'output/fields_*.png' -c:v libx264 -pix_fmt yuv420p breathing.mp4"
    Ok(())
}
