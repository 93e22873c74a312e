use ndarray::{Array2, Zip};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use crate::grid::Grid;

/// Floor applied to the nonlinearity field after every update.
pub const COUPLING_FLOOR: f64 = 0.01;
/// Uniform starting value of the nonlinearity field.
pub const INITIAL_COUPLING: f64 = 5.0;
/// Amplitude injected at the four seed cells.
pub const BLOB_AMPLITUDE: f64 = 10.0;

/// The five grids advanced by the integrator: the matter and antimatter
/// breathing fields with their one-step histories, and the slowly-adapting
/// nonlinearity-strength field.
#[derive(Debug, Clone)]
pub struct FieldState {
    pub matter: Array2<f64>,
    pub matter_prev: Array2<f64>,
    pub antimatter: Array2<f64>,
    pub antimatter_prev: Array2<f64>,
    pub coupling: Array2<f64>,
}

impl FieldState {
    /// Seed the initial condition: zero-mean Gaussian noise on both breathing
    /// fields, a high-amplitude blob pair per field at the quarter and
    /// three-quarter positions, and a uniform nonlinearity field.
    ///
    /// The history grids are copied before the blobs are injected, so the
    /// blob cells start with a nonzero effective velocity.
    pub fn seeded(grid: &Grid, noise_amplitude: f64, seed: u64) -> Self {
        let n = grid.n;
        let mut rng = StdRng::seed_from_u64(seed);
        let noise = Normal::new(0.0, noise_amplitude).expect("noise amplitude must be finite");

        let mut matter = Array2::from_shape_fn((n, n), |_| noise.sample(&mut rng));
        let matter_prev = matter.clone();
        let mut antimatter = Array2::from_shape_fn((n, n), |_| noise.sample(&mut rng));
        let antimatter_prev = antimatter.clone();

        let quarter = n / 4;
        let three_quarters = 3 * n / 4;
        matter[[quarter, quarter]] += BLOB_AMPLITUDE;
        matter[[three_quarters, three_quarters]] += BLOB_AMPLITUDE;
        antimatter[[quarter, three_quarters]] -= BLOB_AMPLITUDE;
        antimatter[[three_quarters, quarter]] -= BLOB_AMPLITUDE;

        FieldState {
            matter,
            matter_prev,
            antimatter,
            antimatter_prev,
            coupling: Array2::from_elem((n, n), INITIAL_COUPLING),
        }
    }

    /// Diagnostic only: true if any grid holds a NaN or infinity. The
    /// stepping path never calls this; blow-up under aggressive parameters
    /// is accepted behaviour.
    pub fn has_non_finite(&self) -> bool {
        [
            &self.matter,
            &self.matter_prev,
            &self.antimatter,
            &self.antimatter_prev,
            &self.coupling,
        ]
        .iter()
        .any(|field| field.iter().any(|v| !v.is_finite()))
    }
}

/// One frame of output for the visualisation sink: owned copies of the three
/// displayed grids, never a live view of the stepping state.
#[derive(Debug, Clone)]
pub struct FieldSnapshot {
    pub matter: Array2<f64>,
    pub antimatter: Array2<f64>,
    pub coupling: Array2<f64>,
    pub step: usize,
    pub time: f64,
}

/// Five-point Laplacian on the periodic grid:
///
///   lap[i,j] = (phi[i+1,j] + phi[i-1,j] + phi[i,j+1] + phi[i,j-1] - 4*phi[i,j]) / dx^2
///
/// with both indices wrapping modulo n.
pub fn laplacian(phi: &Array2<f64>, grid: &Grid) -> Array2<f64> {
    let inv_dx2 = 1.0 / (grid.dx * grid.dx);
    let mut lap = Array2::zeros(phi.raw_dim());

    for i in 0..grid.n {
        let up = grid.prev(i);
        let down = grid.next(i);
        for j in 0..grid.n {
            let left = grid.prev(j);
            let right = grid.next(j);
            lap[[i, j]] = (phi[[down, j]] + phi[[up, j]] + phi[[i, right]] + phi[[i, left]]
                - 4.0 * phi[[i, j]])
                * inv_dx2;
        }
    }

    lap
}

/// Parallel twin of [`laplacian`]: same expression per cell, evaluated across
/// cells with rayon. Reads the frozen input grid, writes disjoint output
/// cells, so results are identical to the serial version.
pub fn laplacian_parallel(phi: &Array2<f64>, grid: &Grid) -> Array2<f64> {
    let inv_dx2 = 1.0 / (grid.dx * grid.dx);
    let mut lap = Array2::zeros(phi.raw_dim());

    Zip::indexed(&mut lap).par_for_each(|(i, j), out| {
        let up = grid.prev(i);
        let down = grid.next(i);
        let left = grid.prev(j);
        let right = grid.next(j);
        *out = (phi[[down, j]] + phi[[up, j]] + phi[[i, right]] + phi[[i, left]]
            - 4.0 * phi[[i, j]])
            * inv_dx2;
    });

    lap
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_laplacian_of_constant_field_is_zero() {
        // A spatially constant field has zero Laplacian everywhere; with the
        // periodic stencil this exercises wraparound at all edges and corners.
        let grid = Grid::new(6, 3.0);
        let phi = Array2::from_elem((6, 6), 2.75);
        let lap = laplacian(&phi, &grid);
        for &v in lap.iter() {
            assert_eq!(v, 0.0);
        }
    }

    #[test]
    fn test_laplacian_wraps_around_corner_spike() {
        // A unit spike at the corner spreads to the four wrapped neighbours.
        let grid = Grid::new(4, 4.0); // dx = 1, so no scaling
        let mut phi = Array2::zeros((4, 4));
        phi[[0, 0]] = 1.0;
        let lap = laplacian(&phi, &grid);

        assert_abs_diff_eq!(lap[[0, 0]], -4.0);
        assert_abs_diff_eq!(lap[[1, 0]], 1.0);
        assert_abs_diff_eq!(lap[[3, 0]], 1.0); // wrapped neighbour below
        assert_abs_diff_eq!(lap[[0, 1]], 1.0);
        assert_abs_diff_eq!(lap[[0, 3]], 1.0); // wrapped neighbour left
        assert_abs_diff_eq!(lap[[2, 2]], 0.0);
        assert_abs_diff_eq!(lap[[1, 1]], 0.0);
    }

    #[test]
    fn test_laplacian_parallel_matches_serial() {
        let grid = Grid::new(16, 8.0);
        let phi = Array2::from_shape_fn((16, 16), |(i, j)| {
            ((i * 7 + j * 13) as f64 * 0.1).sin()
        });
        assert_eq!(laplacian(&phi, &grid), laplacian_parallel(&phi, &grid));
    }

    #[test]
    fn test_seeding_is_deterministic() {
        let grid = Grid::new(16, 16.0);
        let a = FieldState::seeded(&grid, 0.05, 99);
        let b = FieldState::seeded(&grid, 0.05, 99);
        assert_eq!(a.matter, b.matter);
        assert_eq!(a.antimatter, b.antimatter);
        assert_eq!(a.coupling, b.coupling);
    }

    #[test]
    fn test_seeding_places_blobs_over_noise() {
        let grid = Grid::new(16, 16.0);
        let state = FieldState::seeded(&grid, 0.05, 7);
        let (q, tq) = (4, 12);

        // Blob cells carry the noise value plus the injected amplitude; the
        // history grids hold the pre-blob noise, so the difference at those
        // cells is exactly the blob.
        assert_abs_diff_eq!(
            state.matter[[q, q]] - state.matter_prev[[q, q]],
            BLOB_AMPLITUDE,
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(
            state.matter[[tq, tq]] - state.matter_prev[[tq, tq]],
            BLOB_AMPLITUDE,
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(
            state.antimatter[[q, tq]] - state.antimatter_prev[[q, tq]],
            -BLOB_AMPLITUDE,
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(
            state.antimatter[[tq, q]] - state.antimatter_prev[[tq, q]],
            -BLOB_AMPLITUDE,
            epsilon = 1e-12
        );

        // Every other cell is untouched noise, identical to its history.
        let mut mismatches = 0;
        for i in 0..16 {
            for j in 0..16 {
                if state.matter[[i, j]] != state.matter_prev[[i, j]] {
                    mismatches += 1;
                }
                if state.antimatter[[i, j]] != state.antimatter_prev[[i, j]] {
                    mismatches += 1;
                }
            }
        }
        assert_eq!(mismatches, 4);

        // Noise stays small away from the blobs.
        assert!(state.matter[[0, 0]].abs() < 1.0);
        assert!(state.coupling.iter().all(|&p| p == INITIAL_COUPLING));
    }

    #[test]
    fn test_non_finite_diagnostic() {
        let grid = Grid::new(8, 8.0);
        let mut state = FieldState::seeded(&grid, 0.05, 1);
        assert!(!state.has_non_finite());
        state.coupling[[3, 3]] = f64::NAN;
        assert!(state.has_non_finite());
    }
}
