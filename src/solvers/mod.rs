pub mod hydrodynamics;
pub mod radiation;
pub mod thermodynamics;

pub use hydrodynamics::Hydrodynamics;
pub use radiation::Radiation;
pub use thermodynamics::Thermodynamics;

use crate::fluid::Fluid;
use crate::grid::{rid, tid, uid, Grid};
use crate::partition::send_id;
use crate::star::Location;

/// The capability shared by the physics sub-integrators. The composite
/// stepper drives each one through the same four-phase protocol: derived
/// quantities, timestep request, source-term integration, and deferred
/// source-term folding. Integrators never own the fluid.
pub trait Integrator {
    /// Diagnostic label used in progress and error reports.
    fn component_name(&self) -> &'static str;

    /// Refresh fields derived from the current primitives. Idempotent.
    fn pre_time_step_calculations(&mut self, fluid: &mut Fluid);

    /// A stable timestep for this component, at most `dt_max` and strictly
    /// positive.
    fn calculate_time_step(&mut self, dt_max: f64, fluid: &Fluid) -> f64;

    /// Write this component's source terms (and transient fields).
    fn integrate(&mut self, dt: f64, fluid: &mut Fluid);

    /// Fold any deferred contributions into UDOT.
    fn update_source_terms(&mut self, dt: f64, fluid: &mut Fluid);
}

/// Which column density a ray-traced sweep accumulates. The thermodynamics
/// sweep integrates all hydrogen (dust extinction follows the total column);
/// the radiative-transfer sweep integrates only the neutral fraction that
/// can absorb ionising photons.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Column {
    TotalHydrogen,
    NeutralHydrogen,
}

impl Column {
    fn slots(&self) -> (usize, usize) {
        match self {
            Column::TotalHydrogen => (tid::COL_DEN, tid::DCOL_DEN),
            Column::NeutralHydrogen => (rid::TAU, rid::DTAU),
        }
    }

    fn tag(&self) -> u32 {
        match self {
            Column::TotalHydrogen => send_id::THERMO,
            Column::NeutralHydrogen => send_id::RADIATION,
        }
    }

    fn read(&self, grid: &Grid, id: usize) -> (f64, f64) {
        let (col, dcol) = self.slots();
        let cell = grid.cell(id);
        match self {
            Column::TotalHydrogen => (cell.t[col], cell.t[dcol]),
            Column::NeutralHydrogen => (cell.r[col], cell.r[dcol]),
        }
    }

    fn write(&self, grid: &mut Grid, id: usize, value: (f64, f64)) {
        let (col, dcol) = self.slots();
        let cell = grid.cell_mut(id);
        match self {
            Column::TotalHydrogen => {
                cell.t[col] = value.0;
                cell.t[dcol] = value.1;
            }
            Column::NeutralHydrogen => {
                cell.r[col] = value.0;
                cell.r[dcol] = value.1;
            }
        }
    }

    fn local_number_density(&self, fluid: &Fluid, id: usize) -> f64 {
        let cell = fluid.grid.cell(id);
        match self {
            Column::TotalHydrogen => cell.q[uid::DEN] / fluid.consts.hydrogen_mass,
            Column::NeutralHydrogen => {
                (1.0 - cell.q[uid::HII]) * fluid.mass_fraction_h * cell.q[uid::DEN]
                    / fluid.consts.hydrogen_mass
            }
        }
    }
}

/// Sweep column densities outward from the radiation source in causal
/// order. If the source lives on a neighbour rank, the upwind ghost ring is
/// received before the sweep; afterwards the downstream boundary columns are
/// sent onward so the sweep forms a total order across ranks.
pub fn ray_trace(fluid: &mut Fluid, column: Column) {
    let rank = fluid.grid.partition.rank();
    let nproc = fluid.grid.partition.n_processors();
    let location = fluid.star.location;
    let tag = column.tag();

    fluid.grid.partition.reset_buffer();

    let upwind = match location {
        Location::Left if rank > 0 => Some((rank - 1, "LeftPartitionCells")),
        Location::Right if rank + 1 < nproc => Some((rank + 1, "RightPartitionCells")),
        _ => None,
    };
    if let Some((source, ring)) = upwind {
        fluid.grid.partition.recv_data(source, tag);
        for id in fluid.grid.ordered(ring).to_vec() {
            let col = fluid.grid.partition.get_recv_item();
            let dcol = fluid.grid.partition.get_recv_item();
            column.write(&mut fluid.grid, id, (col, dcol));
        }
    }

    for ordering in ["CausalWind", "CausalNonWind"] {
        for id in fluid.grid.ordered(ordering).to_vec() {
            let cell = fluid.grid.cell(id);
            let dist2: f64 = (0..fluid.consts.nd)
                .map(|a| {
                    let d = cell.xc[a] - fluid.star.xc[a];
                    d * d
                })
                .sum();
            update_col_den(fluid, id, dist2, column);
        }
    }

    // Pass the boundary columns outward, away from the source.
    if !(rank == 0 || location == Location::Left) {
        for ghost in fluid.grid.ordered("LeftPartitionCells").to_vec() {
            let edge = fluid.grid.right(0, ghost).expect("missing live edge cell");
            let (col, dcol) = column.read(&fluid.grid, edge);
            fluid.grid.partition.add_send_item(col);
            fluid.grid.partition.add_send_item(dcol);
        }
        fluid.grid.partition.send_data(rank - 1, tag);
    }
    if !(rank == nproc - 1 || location == Location::Right) {
        for ghost in fluid.grid.ordered("RightPartitionCells").to_vec() {
            let edge = fluid.grid.left(0, ghost).expect("missing live edge cell");
            let (col, dcol) = column.read(&fluid.grid, edge);
            fluid.grid.partition.add_send_item(col);
            fluid.grid.partition.add_send_item(dcol);
        }
        fluid.grid.partition.send_data(rank + 1, tag);
    }
}

/// Interpolate the column density at one cell from its upwind neighbours.
/// The neighbour weights are divided by the neighbour columns and
/// renormalised, which biases the interpolation toward the least-obscured
/// path the way the original Raga scheme does. Cells inside the source
/// shell carry zero column.
fn update_col_den(fluid: &mut Fluid, id: usize, dist2: f64, column: Column) {
    let ds = fluid.grid.cell(id).ds;
    let n_local = column.local_number_density(fluid, id);
    let dcol = n_local * ds;

    if dist2 > 0.95 * 0.95 {
        let cell = fluid.grid.cell(id);
        let ids = cell.neighbour_ids;
        let weights = cell.neighbour_weights;

        let mut colden = [0.0; 4];
        let mut w = [0.0; 4];
        for i in 0..4 {
            if let Some(nid) = ids[i] {
                let (col, dcol) = column.read(&fluid.grid, nid);
                colden[i] = col + dcol;
            }
            w[i] = if colden[i] == 0.0 { 0.0 } else { weights[i] / colden[i] };
        }
        let sum_w: f64 = w.iter().sum();

        let mut newcolden = 0.0;
        if sum_w != 0.0 {
            for i in 0..4 {
                newcolden += w[i] / sum_w * colden[i];
            }
        }
        column.write(&mut fluid.grid, id, (newcolden, dcol));
    } else {
        column.write(&mut fluid.grid, id, (0.0, dcol));
    }
}




// ============================================================================
#[cfg(test)]
mod test {
    use super::{ray_trace, Column};
    use crate::fluid::Fluid;
    use crate::grid::{tid, uid, BoundaryCondition, Grid};
    use crate::message::channel::NullCommunicator;
    use crate::partition::PartitionExchange;
    use crate::star::Star;
    use crate::units::Constants;

    fn uniform_fluid_1d(n: usize, den: f64) -> Fluid {
        let grid = Grid::new(
            1,
            [n, 1, 1],
            n as f64,
            2,
            BoundaryCondition::Free,
            BoundaryCondition::Free,
            PartitionExchange::new(Box::new(NullCommunicator)),
        );
        let mut consts = Constants::new(1.0, 1.0, 1.0);
        consts.nd = 1;
        consts.hydrogen_mass = 1.0;
        let mut star = Star::default();
        star.on = true;
        star.xc = [0.0, 0.0, 0.0];
        let mut fluid = Fluid::new(grid, star, consts, 5.0 / 3.0, 1.0);
        let star = fluid.star.clone();
        fluid.grid.initialise_radiation_field(&star, 0.0);
        fluid.star.locate(&fluid.grid);
        fluid.grid.for_each_live_mut(|cell| cell.q[uid::DEN] = den);
        fluid
    }

    #[test]
    fn column_density_accumulates_along_the_ray() {
        let mut fluid = uniform_fluid_1d(8, 2.0);
        ray_trace(&mut fluid, Column::TotalHydrogen);

        // Each cell is one unit across with n = 2: the source cell carries
        // zero column, and each shell adds the upwind cell's local column.
        for &id in fluid.grid.ordered("CausalNonWind") {
            let cell = fluid.grid.cell(id);
            let i = cell.index[0];
            let expected = 2.0 * i as f64;
            assert!(
                (cell.t[tid::COL_DEN] - expected).abs() < 1e-12,
                "cell {} has column {}",
                i,
                cell.t[tid::COL_DEN]
            );
        }
    }

    #[test]
    fn sweep_is_deterministic() {
        let mut fluid = uniform_fluid_1d(16, 1.3);
        ray_trace(&mut fluid, Column::TotalHydrogen);
        let first: Vec<f64> = fluid
            .grid
            .ordered("CausalNonWind")
            .iter()
            .map(|&id| fluid.grid.cell(id).t[tid::COL_DEN])
            .collect();

        ray_trace(&mut fluid, Column::TotalHydrogen);
        let second: Vec<f64> = fluid
            .grid
            .ordered("CausalNonWind")
            .iter()
            .map(|&id| fluid.grid.cell(id).t[tid::COL_DEN])
            .collect();

        assert_eq!(first, second);
    }
}
