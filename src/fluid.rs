use crate::grid::{uid, Grid, NUM_FIELDS};
use crate::star::Star;
use crate::units::Constants;

/**
 * The fluid state: a grid of cells holding primitive variables Q,
 * conservative variables U, a start-of-step snapshot W, and the source-term
 * accumulator UDOT, together with the whole-grid conversions between them.
 * Integrators never own the fluid; it is passed to them per call.
 */
pub struct Fluid {
    pub grid: Grid,
    pub star: Star,
    pub consts: Constants,
    pub heat_capacity_ratio: f64,
    pub mass_fraction_h: f64,
}




// ============================================================================
impl Fluid {

    pub fn new(
        grid: Grid,
        star: Star,
        consts: Constants,
        heat_capacity_ratio: f64,
        mass_fraction_h: f64,
    ) -> Self {
        Self {
            grid,
            star,
            consts,
            heat_capacity_ratio,
            mass_fraction_h,
        }
    }

    /// Conservative from primitive for one cell.
    pub fn u_from_q(q: &[f64; NUM_FIELDS], gamma: f64) -> [f64; NUM_FIELDS] {
        let den = q[uid::DEN];
        let ke = 0.5
            * den
            * (q[uid::VEL0] * q[uid::VEL0]
                + q[uid::VEL1] * q[uid::VEL1]
                + q[uid::VEL2] * q[uid::VEL2]);
        let mut u = [0.0; NUM_FIELDS];
        u[uid::DEN] = den;
        u[uid::VEL0] = den * q[uid::VEL0];
        u[uid::VEL1] = den * q[uid::VEL1];
        u[uid::VEL2] = den * q[uid::VEL2];
        u[uid::PRE] = q[uid::PRE] / (gamma - 1.0) + ke;
        u[uid::HII] = q[uid::HII] * den;
        u[uid::ADV] = q[uid::ADV] * den;
        u
    }

    /// Primitive from conservative for one cell.
    pub fn q_from_u(u: &[f64; NUM_FIELDS], gamma: f64) -> [f64; NUM_FIELDS] {
        let den = u[uid::DEN];
        let ke = 0.5
            * (u[uid::VEL0] * u[uid::VEL0]
                + u[uid::VEL1] * u[uid::VEL1]
                + u[uid::VEL2] * u[uid::VEL2])
            / den;
        let mut q = [0.0; NUM_FIELDS];
        q[uid::DEN] = den;
        q[uid::VEL0] = u[uid::VEL0] / den;
        q[uid::VEL1] = u[uid::VEL1] / den;
        q[uid::VEL2] = u[uid::VEL2] / den;
        q[uid::PRE] = (u[uid::PRE] - ke) * (gamma - 1.0);
        q[uid::HII] = u[uid::HII] / den;
        q[uid::ADV] = u[uid::ADV] / den;
        q
    }

    pub fn global_q_from_u(&mut self) {
        self.grid
            .for_each_live_mut(|cell| cell.q = Self::q_from_u(&cell.u, cell.heat_capacity_ratio));
    }

    pub fn global_u_from_q(&mut self) {
        self.grid
            .for_each_live_mut(|cell| cell.u = Self::u_from_q(&cell.q, cell.heat_capacity_ratio));
    }

    pub fn global_w_from_u(&mut self) {
        self.grid.for_each_live_mut(|cell| cell.w = cell.u);
    }

    pub fn global_u_from_w(&mut self) {
        self.grid.for_each_live_mut(|cell| cell.u = cell.w);
    }

    /// Clamp one primitive vector to the configured floors. Density and
    /// pressure are floored, the ion fraction and the advected tracer are
    /// clamped to [0, 1], and a non-finite velocity component is zeroed.
    fn fix_q(
        q: &mut [f64; NUM_FIELDS],
        dfloor: f64,
        pfloor: f64,
        tfloor: f64,
        gas_constant: f64,
        mass_fraction_h: f64,
    ) {
        if q[uid::DEN] < dfloor || !q[uid::DEN].is_finite() {
            q[uid::DEN] = dfloor;
        }
        if q[uid::PRE] < pfloor || !q[uid::PRE].is_finite() {
            q[uid::PRE] = pfloor;
        }
        for a in 0..3 {
            if !q[uid::VEL0 + a].is_finite() {
                q[uid::VEL0 + a] = 0.0;
            }
        }
        q[uid::HII] = q[uid::HII].clamp(0.0, 1.0);
        q[uid::ADV] = q[uid::ADV].clamp(0.0, 1.0);

        if tfloor > 0.0 && q[uid::DEN] > 0.0 {
            let mu_inv = mass_fraction_h * (q[uid::HII] + 1.0) + (1.0 - mass_fraction_h) * 0.25;
            let p_floor = tfloor * mu_inv * gas_constant * q[uid::DEN];
            if q[uid::PRE] < p_floor {
                q[uid::PRE] = p_floor;
            }
        }
    }

    /// Floor the primitive variables in place, leaving U untouched.
    pub fn fix_primitives(&mut self) {
        let (dfloor, pfloor, tfloor) = (self.consts.dfloor, self.consts.pfloor, self.consts.tfloor);
        let (gas_constant, xh) = (self.consts.specific_gas_constant, self.mass_fraction_h);
        self.grid.for_each_live_mut(|cell| {
            Self::fix_q(&mut cell.q, dfloor, pfloor, tfloor, gas_constant, xh);
        });
    }

    /// Recover primitives from U, floor them, and write the floored state
    /// back to both Q and U.
    pub fn fix_solution(&mut self) {
        let (dfloor, pfloor, tfloor) = (self.consts.dfloor, self.consts.pfloor, self.consts.tfloor);
        let (gas_constant, xh) = (self.consts.specific_gas_constant, self.mass_fraction_h);
        self.grid.for_each_live_mut(|cell| {
            let gamma = cell.heat_capacity_ratio;
            let mut q = Self::q_from_u(&cell.u, gamma);
            Self::fix_q(&mut q, dfloor, pfloor, tfloor, gas_constant, xh);
            cell.q = q;
            cell.u = Self::u_from_q(&q, gamma);
        });
    }

    /// Apply the accumulated source terms: U += dt * UDOT, then clear UDOT.
    pub fn adv_solution(&mut self, dt: f64) {
        self.grid.for_each_live_mut(|cell| {
            for i in 0..NUM_FIELDS {
                cell.u[i] += dt * cell.udot[i];
                cell.udot[i] = 0.0;
            }
        });
    }

    /// Gas temperature from the ideal-gas law with the mean molecular weight
    /// of partially ionised hydrogen plus helium.
    pub fn calc_temperature(&self, hii: f64, pre: f64, den: f64) -> f64 {
        let mu_inv = self.mass_fraction_h * (hii + 1.0) + (1.0 - self.mass_fraction_h) * 0.25;
        pre / (mu_inv * self.consts.specific_gas_constant * den)
    }

    pub fn sound_speed(&self, gamma: f64, pre: f64, den: f64) -> f64 {
        (gamma * pre / den).sqrt()
    }
}




// ============================================================================
#[cfg(test)]
mod test {
    use super::Fluid;
    use crate::grid::{uid, BoundaryCondition, Grid, NUM_FIELDS};
    use crate::message::channel::NullCommunicator;
    use crate::partition::PartitionExchange;
    use crate::star::Star;
    use crate::units::Constants;

    fn fluid_1d(n: usize) -> Fluid {
        let grid = Grid::new(
            1,
            [n, 1, 1],
            1.0,
            2,
            BoundaryCondition::Free,
            BoundaryCondition::Free,
            PartitionExchange::new(Box::new(NullCommunicator)),
        );
        let mut consts = Constants::new(1.0, 1.0, 1.0);
        consts.nd = 1;
        Fluid::new(grid, Star::default(), consts, 5.0 / 3.0, 1.0)
    }

    #[test]
    fn conversions_round_trip() {
        let gamma = 5.0 / 3.0;
        let mut q = [0.0; NUM_FIELDS];
        q[uid::DEN] = 1.4;
        q[uid::PRE] = 2.3;
        q[uid::VEL0] = -0.7;
        q[uid::VEL1] = 0.1;
        q[uid::HII] = 0.25;
        q[uid::ADV] = 1.0;

        let u = Fluid::u_from_q(&q, gamma);
        let back = Fluid::q_from_u(&u, gamma);
        for i in 0..NUM_FIELDS {
            assert!((back[i] - q[i]).abs() < 1e-14);
        }
    }

    #[test]
    fn floors_are_enforced() {
        let mut fluid = fluid_1d(4);
        fluid.consts.dfloor = 1e-4;
        fluid.consts.pfloor = 1e-6;

        let id = fluid.grid.ordered("GridCells")[0];
        let cell = fluid.grid.cell_mut(id);
        cell.q[uid::DEN] = -1.0;
        cell.q[uid::PRE] = 0.0;
        cell.q[uid::VEL0] = f64::NAN;
        cell.q[uid::HII] = 1.7;
        fluid.fix_primitives();

        let cell = fluid.grid.cell(id);
        assert_eq!(cell.q[uid::DEN], 1e-4);
        assert!(cell.q[uid::PRE] >= 1e-6);
        assert_eq!(cell.q[uid::VEL0], 0.0);
        assert_eq!(cell.q[uid::HII], 1.0);
    }

    #[test]
    fn adv_solution_applies_and_clears_udot() {
        let mut fluid = fluid_1d(4);
        let id = fluid.grid.ordered("GridCells")[1];
        {
            let cell = fluid.grid.cell_mut(id);
            cell.u[uid::DEN] = 1.0;
            cell.udot[uid::DEN] = 2.0;
        }
        fluid.adv_solution(0.5);

        let cell = fluid.grid.cell(id);
        assert_eq!(cell.u[uid::DEN], 2.0);
        assert_eq!(cell.udot[uid::DEN], 0.0);
    }
}
