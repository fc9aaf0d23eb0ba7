use super::Integrator;
use crate::fluid::Fluid;
use crate::grid::{uid, Grid, NUM_FIELDS};
use crate::hydro::euler::Primitive;
use crate::hydro::geometry::Direction;
use crate::hydro::limiter::SlopeLimiter;
use crate::hydro::riemann::RiemannSolver;

/**
 * Explicit Godunov hydrodynamics: piecewise-linear reconstruction with a
 * pluggable slope limiter, interface fluxes from a pluggable Riemann solver,
 * and a CFL-limited timestep. The two-pass predictor-corrector wrapper
 * around `integrate` lives in the composite stepper; each `integrate` call
 * refreshes the ghost layers, rebuilds the interface fluxes from the current
 * primitives, and writes the flux divergence into UDOT.
 */
pub struct Hydrodynamics {
    nd: usize,
    spatial_order: usize,
    courant: f64,
    riemann: RiemannSolver,
    limiter: SlopeLimiter,
    slopes: Vec<[[f64; NUM_FIELDS]; 3]>,
    fluxes: Vec<[[f64; NUM_FIELDS]; 3]>,
}




// ============================================================================
impl Hydrodynamics {

    pub fn new(nd: usize, spatial_order: usize, riemann: RiemannSolver, limiter: SlopeLimiter) -> Self {
        Self {
            nd,
            spatial_order,
            courant: 0.5 / nd as f64,
            riemann,
            limiter,
            slopes: Vec::new(),
            fluxes: Vec::new(),
        }
    }

    pub fn riemann_solver(&self) -> RiemannSolver {
        self.riemann
    }

    pub fn slope_limiter(&self) -> SlopeLimiter {
        self.limiter
    }

    fn ensure_buffers(&mut self, len: usize) {
        if self.slopes.len() != len {
            self.slopes = vec![[[0.0; NUM_FIELDS]; 3]; len];
            self.fluxes = vec![[[0.0; NUM_FIELDS]; 3]; len];
        }
    }

    /// Limited slopes for every cell with both neighbours along an axis.
    fn reconstruct(&mut self, grid: &Grid) {
        if self.spatial_order == 0 {
            return;
        }
        for id in 0..grid.num_cells() {
            for axis in 0..self.nd {
                if let (Some(l), Some(r)) = (grid.left(axis, id), grid.right(axis, id)) {
                    let ql = grid.cell(l).q;
                    let qc = grid.cell(id).q;
                    let qr = grid.cell(r).q;
                    for f in 0..NUM_FIELDS {
                        self.slopes[id][axis][f] =
                            self.limiter.limit(qc[f] - ql[f], qr[f] - qc[f]);
                    }
                }
            }
        }
    }

    /// Interface fluxes through the lower face of every cell that flanks a
    /// live cell.
    fn compute_fluxes(&mut self, grid: &Grid, gamma: f64) {
        for id in 0..grid.num_cells() {
            for axis in 0..self.nd {
                let l = match grid.left(axis, id) {
                    Some(l) => l,
                    None => continue,
                };
                if !grid.is_live(id) && !grid.is_live(l) {
                    continue;
                }
                let mut ql = grid.cell(l).q;
                let mut qr = grid.cell(id).q;
                for f in 0..NUM_FIELDS {
                    ql[f] += 0.5 * self.slopes[l][axis][f];
                    qr[f] -= 0.5 * self.slopes[id][axis][f];
                }
                let flux = self.riemann.solve(
                    &Primitive(ql),
                    &Primitive(qr),
                    Direction::from_axis(axis),
                    gamma,
                );
                self.fluxes[id][axis] = flux.0;
            }
        }
    }
}




// ============================================================================
impl Integrator for Hydrodynamics {

    fn component_name(&self) -> &'static str {
        "Hydrodynamics"
    }

    fn pre_time_step_calculations(&mut self, fluid: &mut Fluid) {
        fluid.grid.update_partition_ghosts();
    }

    /// Courant-limited dt over all cells and axes.
    fn calculate_time_step(&mut self, dt_max: f64, fluid: &Fluid) -> f64 {
        let mut dt = dt_max;
        for &id in fluid.grid.ordered("GridCells") {
            let cell = fluid.grid.cell(id);
            let cs = fluid.sound_speed(cell.heat_capacity_ratio, cell.q[uid::PRE], cell.q[uid::DEN]);
            for axis in 0..self.nd {
                let v = cell.q[uid::VEL0 + axis].abs();
                dt = dt.min(self.courant * fluid.grid.dx[axis] / (v + cs));
            }
        }
        dt
    }

    fn integrate(&mut self, _dt: f64, fluid: &mut Fluid) {
        fluid.grid.update_partition_ghosts();
        self.ensure_buffers(fluid.grid.num_cells());
        let gamma = fluid.heat_capacity_ratio;
        self.reconstruct(&fluid.grid);
        self.compute_fluxes(&fluid.grid, gamma);

        let dx = fluid.grid.dx;
        for id in fluid.grid.ordered("GridCells").to_vec() {
            for axis in 0..self.nd {
                let upper = fluid.grid.right(axis, id).expect("live cell lacks a neighbour");
                let fm = self.fluxes[id][axis];
                let fp = self.fluxes[upper][axis];
                let cell = fluid.grid.cell_mut(id);
                for f in 0..NUM_FIELDS {
                    cell.udot[f] -= (fp[f] - fm[f]) / dx[axis];
                }
            }
        }
    }

    /// External gravity, plus the stellar-wind sources inside the injection
    /// sphere.
    fn update_source_terms(&mut self, _dt: f64, fluid: &mut Fluid) {
        fluid.grid.for_each_live_mut(|cell| {
            let den = cell.q[uid::DEN];
            let mut work = 0.0;
            for a in 0..3 {
                cell.udot[uid::VEL0 + a] += den * cell.grav[a];
                work += cell.q[uid::VEL0 + a] * cell.grav[a];
            }
            cell.udot[uid::PRE] += den * work;
        });
        fluid.star.inject_wind(&mut fluid.grid);
    }
}
