use ndarray::{Array2, Zip};

use crate::fields::{laplacian, laplacian_parallel, FieldSnapshot, FieldState, COUPLING_FLOOR};
use crate::grid::Grid;
use crate::visualisation::FieldVisualiser;

/// Cells where |matter * antimatter| exceeds this are damped by the
/// annihilation rule.
pub const ANNIHILATION_THRESHOLD: f64 = 1.0;

#[derive(Debug, Clone)]
pub struct SimulationParams {
    pub dt: f64,               // Time step
    pub steps: usize,          // Total number of time steps
    pub gravity_strength: f64, // Linear pullback on both breathing fields
    pub learning_rate: f64,    // Nonlinearity-field relaxation toward the energy density
    pub decay_rate: f64,       // Linear decay of the nonlinearity field
    pub report_every: usize,   // Progress print interval (steps)
}

impl SimulationParams {
    pub fn total_time(&self) -> f64 {
        self.steps as f64 * self.dt
    }
}

pub struct Simulation {
    pub grid: Grid,
    pub state: FieldState,
    pub params: SimulationParams,
    current_step: usize,
}

impl Simulation {
    pub fn new(grid: Grid, state: FieldState, params: SimulationParams) -> Self {
        let dim = (grid.n, grid.n);
        let shapes = [
            state.matter.dim(),
            state.matter_prev.dim(),
            state.antimatter.dim(),
            state.antimatter_prev.dim(),
            state.coupling.dim(),
        ];
        if shapes.iter().any(|&shape| shape != dim) {
            panic!(
                "field state shapes {:?} do not match grid {}x{}",
                shapes, grid.n, grid.n
            );
        }

        Self {
            grid,
            state,
            params,
            current_step: 0,
        }
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn current_time(&self) -> f64 {
        self.current_step as f64 * self.params.dt
    }

    pub fn is_finished(&self) -> bool {
        self.current_step >= self.params.steps
    }

    /// Advance the fields by one time step. One call is one atomic state
    /// transition; per-cell work inside the step runs in parallel.
    pub fn step(&mut self) {
        let (lap_m, lap_am) = rayon::join(
            || laplacian_parallel(&self.state.matter, &self.grid),
            || laplacian_parallel(&self.state.antimatter, &self.grid),
        );

        self.update_coupling(&lap_m, &lap_am);
        let (mut matter_new, mut antimatter_new) = self.integrate_fields(&lap_m, &lap_am);
        self.apply_annihilation(&mut matter_new, &mut antimatter_new);
        self.commit_history(matter_new, antimatter_new);
        self.current_step += 1;
    }

    /// Serial twin of [`step`](Self::step); numerically identical.
    pub fn step_serial(&mut self) {
        let lap_m = laplacian(&self.state.matter, &self.grid);
        let lap_am = laplacian(&self.state.antimatter, &self.grid);

        self.update_coupling_serial(&lap_m, &lap_am);
        let (mut matter_new, mut antimatter_new) = self.integrate_fields_serial(&lap_m, &lap_am);
        self.apply_annihilation(&mut matter_new, &mut antimatter_new);
        self.commit_history(matter_new, antimatter_new);
        self.current_step += 1;
    }

    // Relax the nonlinearity field toward the local breathing energy density
    //   E = 0.5 * (lap_m^2 + phi_m^2) + 0.5 * (lap_am^2 + phi_am^2)
    //   P += dt * (learning_rate * E - decay_rate * P)
    // then clamp P to its floor. The clamped value is what the field update
    // sees this step.
    fn update_coupling(&mut self, lap_m: &Array2<f64>, lap_am: &Array2<f64>) {
        let dt = self.params.dt;
        let learning_rate = self.params.learning_rate;
        let decay_rate = self.params.decay_rate;

        Zip::from(&mut self.state.coupling)
            .and(lap_m)
            .and(&self.state.matter)
            .and(lap_am)
            .and(&self.state.antimatter)
            .par_for_each(|p, &lm, &m, &lam, &am| {
                let energy = 0.5 * (lm * lm + m * m) + 0.5 * (lam * lam + am * am);
                *p += dt * (learning_rate * energy - decay_rate * *p);
                if *p < COUPLING_FLOOR {
                    *p = COUPLING_FLOOR;
                }
            });
    }

    fn update_coupling_serial(&mut self, lap_m: &Array2<f64>, lap_am: &Array2<f64>) {
        let dt = self.params.dt;
        let learning_rate = self.params.learning_rate;
        let decay_rate = self.params.decay_rate;

        Zip::from(&mut self.state.coupling)
            .and(lap_m)
            .and(&self.state.matter)
            .and(lap_am)
            .and(&self.state.antimatter)
            .for_each(|p, &lm, &m, &lam, &am| {
                let energy = 0.5 * (lm * lm + m * m) + 0.5 * (lam * lam + am * am);
                *p += dt * (learning_rate * energy - decay_rate * *p);
                if *p < COUPLING_FLOOR {
                    *p = COUPLING_FLOOR;
                }
            });
    }

    // Leapfrog update for both breathing fields:
    //   phi_m_new  = 2*phi_m  - phi_m_prev  + dt^2 * (lap_m  - g*phi_m  - P*phi_m^3)
    //   phi_am_new = 2*phi_am - phi_am_prev + dt^2 * (lap_am - g*phi_am + P*phi_am^3)
    // The opposite cubic sign is the matter/antimatter asymmetry.
    fn integrate_fields(
        &self,
        lap_m: &Array2<f64>,
        lap_am: &Array2<f64>,
    ) -> (Array2<f64>, Array2<f64>) {
        let dt2 = self.params.dt * self.params.dt;
        let g = self.params.gravity_strength;
        let dim = self.state.matter.raw_dim();

        let mut matter_new = Array2::zeros(dim);
        Zip::from(&mut matter_new)
            .and(&self.state.matter)
            .and(&self.state.matter_prev)
            .and(lap_m)
            .and(&self.state.coupling)
            .par_for_each(|out, &phi, &prev, &lap, &p| {
                *out = 2.0 * phi - prev + dt2 * (lap - g * phi - p * phi * phi * phi);
            });

        let mut antimatter_new = Array2::zeros(dim);
        Zip::from(&mut antimatter_new)
            .and(&self.state.antimatter)
            .and(&self.state.antimatter_prev)
            .and(lap_am)
            .and(&self.state.coupling)
            .par_for_each(|out, &phi, &prev, &lap, &p| {
                *out = 2.0 * phi - prev + dt2 * (lap - g * phi + p * phi * phi * phi);
            });

        (matter_new, antimatter_new)
    }

    fn integrate_fields_serial(
        &self,
        lap_m: &Array2<f64>,
        lap_am: &Array2<f64>,
    ) -> (Array2<f64>, Array2<f64>) {
        let dt2 = self.params.dt * self.params.dt;
        let g = self.params.gravity_strength;
        let dim = self.state.matter.raw_dim();

        let mut matter_new = Array2::zeros(dim);
        Zip::from(&mut matter_new)
            .and(&self.state.matter)
            .and(&self.state.matter_prev)
            .and(lap_m)
            .and(&self.state.coupling)
            .for_each(|out, &phi, &prev, &lap, &p| {
                *out = 2.0 * phi - prev + dt2 * (lap - g * phi - p * phi * phi * phi);
            });

        let mut antimatter_new = Array2::zeros(dim);
        Zip::from(&mut antimatter_new)
            .and(&self.state.antimatter)
            .and(&self.state.antimatter_prev)
            .and(lap_am)
            .and(&self.state.coupling)
            .for_each(|out, &phi, &prev, &lap, &p| {
                *out = 2.0 * phi - prev + dt2 * (lap - g * phi + p * phi * phi * phi);
            });

        (matter_new, antimatter_new)
    }

    // Where matter and antimatter coexist with enough combined amplitude,
    // damp both. Overlap is measured on the pre-update fields.
    fn apply_annihilation(&self, matter_new: &mut Array2<f64>, antimatter_new: &mut Array2<f64>) {
        Zip::from(matter_new)
            .and(antimatter_new)
            .and(&self.state.matter)
            .and(&self.state.antimatter)
            .for_each(|m_new, am_new, &m, &am| {
                if (m * am).abs() > ANNIHILATION_THRESHOLD {
                    *m_new *= 0.5;
                    *am_new *= 0.5;
                }
            });
    }

    // History shift: prev buffers take the pre-update values, then the
    // updated grids become current. Ordering here is what makes the leapfrog
    // scheme correct.
    fn commit_history(&mut self, matter_new: Array2<f64>, antimatter_new: Array2<f64>) {
        self.state.matter_prev = std::mem::replace(&mut self.state.matter, matter_new);
        self.state.antimatter_prev = std::mem::replace(&mut self.state.antimatter, antimatter_new);
    }

    /// Owned copy of the three displayed grids at the current step.
    pub fn snapshot(&self) -> FieldSnapshot {
        FieldSnapshot {
            matter: self.state.matter.clone(),
            antimatter: self.state.antimatter.clone(),
            coupling: self.state.coupling.clone(),
            step: self.current_step,
            time: self.current_time(),
        }
    }

    /// Iterator that advances the simulation one step per `next()` and yields
    /// the resulting snapshot, until the configured step count is reached.
    /// The rendering loop pulls frames at its own cadence.
    pub fn snapshots(&mut self) -> Snapshots<'_> {
        Snapshots { sim: self }
    }

    pub fn run(&mut self) {
        println!("Starting simulation...");
        println!(
            "Grid: {}x{} over length {} (dx={})",
            self.grid.n, self.grid.n, self.grid.length, self.grid.dx
        );
        println!("Time step: {:.6}", self.params.dt);
        println!("Total time: {:.3}", self.params.total_time());
        println!("Number of steps: {}", self.params.steps);

        let report_every = self.params.report_every.max(1);
        while !self.is_finished() {
            self.step();

            if self.current_step() % report_every == 0 {
                println!("Step {}/{}", self.current_step(), self.params.steps);
            }
        }

        println!("Simulation complete!");
    }

    pub fn run_with_visualisation(&mut self, visualiser: &FieldVisualiser, frame_every: usize) {
        println!("Starting simulation with visualisation...");
        println!(
            "Grid: {}x{} over length {} (dx={})",
            self.grid.n, self.grid.n, self.grid.length, self.grid.dx
        );
        println!("Time step: {:.6}", self.params.dt);
        println!("Total time: {:.3}", self.params.total_time());
        println!("Rendering a frame every {} steps", frame_every);

        // Render the initial state before stepping
        if let Err(e) = visualiser.plot_frame(&self.snapshot()) {
            eprintln!("Warning: failed to render frame: {}", e);
        }

        let steps = self.params.steps;
        let report_every = self.params.report_every.max(1);
        let frame_every = frame_every.max(1);

        for frame in self.snapshots() {
            if frame.step % frame_every == 0 {
                if let Err(e) = visualiser.plot_frame(&frame) {
                    eprintln!("Warning: failed to render frame: {}", e);
                }
            }

            if frame.step % report_every == 0 {
                println!("Step {}/{} (t={:.3})", frame.step, steps, frame.time);
            }
        }

        println!("Simulation complete!");
        println!("Frames saved to {}/", visualiser.output_dir());
    }
}

pub struct Snapshots<'a> {
    sim: &'a mut Simulation,
}

impl Iterator for Snapshots<'_> {
    type Item = FieldSnapshot;

    fn next(&mut self) -> Option<FieldSnapshot> {
        if self.sim.is_finished() {
            return None;
        }
        self.sim.step();
        Some(self.sim.snapshot())
    }
}
