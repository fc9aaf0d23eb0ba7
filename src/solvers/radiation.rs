use super::{ray_trace, Column, Integrator};
use crate::fluid::Fluid;
use crate::grid::{hid, rid, uid};
use crate::units::Constants;

/// Change in ionisation fraction allowed per step, as a fraction of the
/// current (floored) fraction.
const MAX_FRACTIONAL_CHANGE: f64 = 0.25;
const MIN_FRACTION_FOR_DT: f64 = 0.05;

/**
 * Ray-traced transport of ionising photons from the star. The neutral
 * column densities accumulated by the causal sweep attenuate the photon
 * flux; each cell then advances its ionisation fraction through the balance
 * of photoionisations against case-B recombinations, and deposits the
 * excess photon energy as heat. The rate is photon-conserving across a
 * cell: the mean of the attenuation over the cell's own optical depth is
 * used rather than the upstream value.
 */
pub struct Radiation {
    nd: usize,
    pi: f64,
    hydrogen_mass: f64,
    mass_fraction_h: f64,
    photo_cross_section: f64,
    recombination_coefficient: f64,
    excess_energy: f64,
}




// ============================================================================
impl Radiation {

    pub fn new(consts: &Constants, mass_fraction_h: f64) -> Self {
        let converter = &consts.converter;
        Self {
            nd: consts.nd,
            pi: consts.pi,
            hydrogen_mass: consts.hydrogen_mass,
            mass_fraction_h,
            photo_cross_section: converter.to_code_units(6.3e-18, 0.0, 2.0, 0.0),
            recombination_coefficient: converter.to_code_units(2.59e-13, 0.0, 3.0, -1.0),
            excess_energy: converter.to_code_units(converter.ev_to_ergs(5.0), 1.0, 2.0, -2.0),
        }
    }

    /// Photoionisation rate per neutral hydrogen atom in one cell.
    fn photoionisation_rate(&self, fluid: &Fluid, id: usize) -> f64 {
        let star = &fluid.star;
        if !star.on || star.photon_rate <= 0.0 {
            return 0.0;
        }
        let cell = fluid.grid.cell(id);

        let mut r2 = 0.0;
        for a in 0..self.nd {
            let d = (cell.xc[a] - star.xc[a]) * fluid.grid.dx[a];
            r2 += d * d;
        }
        let r_min = 0.5 * fluid.grid.dx[0];
        let r2 = r2.max(r_min * r_min);

        let tau = self.photo_cross_section * cell.r[rid::TAU];
        let dtau = self.photo_cross_section * cell.r[rid::DTAU];
        let absorb = if dtau > 1.0e-8 {
            (1.0 - (-dtau).exp()) / dtau
        } else {
            1.0
        };
        let flux = star.photon_rate * (-tau).exp() * absorb / (4.0 * self.pi * r2);
        self.photo_cross_section * flux
    }

    /// Net rate of change of the ionisation fraction in one cell.
    fn ionisation_balance(&self, fluid: &Fluid, id: usize) -> f64 {
        let cell = fluid.grid.cell(id);
        let x = cell.q[uid::HII];
        let n_h = self.mass_fraction_h * cell.q[uid::DEN] / self.hydrogen_mass;
        (1.0 - x) * self.photoionisation_rate(fluid, id)
            - self.recombination_coefficient * x * x * n_h
    }

    /// Snapshot the photo-heating rate into the diagnostic array.
    pub fn fill_heating_arrays(&mut self, fluid: &mut Fluid) {
        if !fluid.star.on {
            return;
        }
        for id in fluid.grid.ordered("GridCells").to_vec() {
            let cell = fluid.grid.cell(id);
            let x = cell.q[uid::HII];
            let n_h = self.mass_fraction_h * cell.q[uid::DEN] / self.hydrogen_mass;
            let heat = self.excess_energy * self.photoionisation_rate(fluid, id) * (1.0 - x) * n_h;
            fluid.grid.cell_mut(id).h[hid::EUVH] = heat;
        }
    }
}




// ============================================================================
impl Integrator for Radiation {

    fn component_name(&self) -> &'static str {
        "Radiation"
    }

    fn pre_time_step_calculations(&mut self, fluid: &mut Fluid) {
        if fluid.star.on {
            ray_trace(fluid, Column::NeutralHydrogen);
        }
    }

    /// Limit the per-step change of the ionisation fraction.
    fn calculate_time_step(&mut self, dt_max: f64, fluid: &Fluid) -> f64 {
        if !fluid.star.on {
            return dt_max;
        }
        let mut dt = dt_max;
        for &id in fluid.grid.ordered("GridCells") {
            let rate = self.ionisation_balance(fluid, id);
            if rate != 0.0 {
                let x = fluid.grid.cell(id).q[uid::HII];
                let dti = MAX_FRACTIONAL_CHANGE * x.max(MIN_FRACTION_FOR_DT) / rate.abs();
                if dti < dt {
                    dt = dti;
                }
            }
        }
        dt
    }

    /// Relax each cell's ionisation fraction toward the local
    /// photoionisation-recombination equilibrium over its own relaxation
    /// time. Unconditionally stable, so cells already in equilibrium do not
    /// constrain the step.
    fn integrate(&mut self, dt: f64, fluid: &mut Fluid) {
        if !fluid.star.on || dt <= 0.0 {
            return;
        }
        for id in fluid.grid.ordered("GridCells").to_vec() {
            let cell = fluid.grid.cell(id);
            let x = cell.q[uid::HII];
            let adv = cell.q[uid::ADV];
            let den = cell.q[uid::DEN];
            let n_h = self.mass_fraction_h * den / self.hydrogen_mass;
            let ionise = self.photoionisation_rate(fluid, id);
            let recomb = self.recombination_coefficient * n_h;

            let x_eq = if recomb > 0.0 {
                (-ionise + (ionise * ionise + 4.0 * recomb * ionise).sqrt()) / (2.0 * recomb)
            } else if ionise > 0.0 {
                1.0
            } else {
                x
            };
            let relax = ionise + 2.0 * recomb * x_eq;
            let x_new = if relax > 0.0 {
                (x_eq + (x - x_eq) * (-dt * relax).exp()).clamp(0.0, 1.0)
            } else {
                x
            };

            let cell = fluid.grid.cell_mut(id);
            cell.udot[uid::HII] += (x_new - x) * den / dt;
            // The advected tracer ratchets up to the largest ionisation
            // fraction the cell has reached; thermodynamics keys off it.
            cell.udot[uid::ADV] += (x_new.max(adv) - adv) * den / dt;
        }
    }

    /// Photo-heating: the excess energy of each ionising photon above the
    /// hydrogen ionisation threshold is deposited in the gas.
    fn update_source_terms(&mut self, _dt: f64, fluid: &mut Fluid) {
        if !fluid.star.on {
            return;
        }
        for id in fluid.grid.ordered("GridCells").to_vec() {
            let cell = fluid.grid.cell(id);
            let x = cell.q[uid::HII];
            let n_h = self.mass_fraction_h * cell.q[uid::DEN] / self.hydrogen_mass;
            let heat = self.excess_energy * self.photoionisation_rate(fluid, id) * (1.0 - x) * n_h;
            fluid.grid.cell_mut(id).udot[uid::PRE] += heat;
        }
    }
}




// ============================================================================
#[cfg(test)]
mod test {
    use super::Radiation;
    use crate::fluid::Fluid;
    use crate::grid::{uid, BoundaryCondition, Grid};
    use crate::message::channel::NullCommunicator;
    use crate::partition::PartitionExchange;
    use crate::solvers::{ray_trace, Column, Integrator};
    use crate::star::Star;
    use crate::units::Constants;

    fn irradiated_fluid(n: usize) -> (Fluid, Radiation) {
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
        star.photon_rate = 1.0e3;
        let mut fluid = Fluid::new(grid, star, consts, 5.0 / 3.0, 1.0);
        let star = fluid.star.clone();
        fluid.grid.initialise_radiation_field(&star, 0.0);
        fluid.star.locate(&fluid.grid);
        fluid.grid.for_each_live_mut(|cell| {
            cell.q[uid::DEN] = 1.0;
            cell.q[uid::PRE] = 1.0;
        });
        fluid.global_u_from_q();
        let mut radiation = Radiation::new(&fluid.consts, 1.0);
        radiation.photo_cross_section = 1.0e-3;
        radiation.recombination_coefficient = 1.0e-3;
        (fluid, radiation)
    }

    #[test]
    fn ionisation_fraction_stays_bounded() {
        let (mut fluid, mut radiation) = irradiated_fluid(8);
        ray_trace(&mut fluid, Column::NeutralHydrogen);
        radiation.integrate(1.0e6, &mut fluid);
        fluid.adv_solution(1.0e6);
        fluid.fix_solution();

        for &id in fluid.grid.ordered("GridCells") {
            let x = fluid.grid.cell(id).q[uid::HII];
            assert!((0.0..=1.0).contains(&x));
        }
    }

    #[test]
    fn time_step_limits_the_fraction_change() {
        let (mut fluid, mut radiation) = irradiated_fluid(8);
        ray_trace(&mut fluid, Column::NeutralHydrogen);
        let dt = radiation.calculate_time_step(1.0e20, &fluid);
        assert!(dt > 0.0 && dt < 1.0e20);

        radiation.integrate(dt, &mut fluid);
        fluid.adv_solution(dt);
        fluid.fix_solution();
        for &id in fluid.grid.ordered("GridCells") {
            assert!(fluid.grid.cell(id).q[uid::HII] <= 0.3);
        }
    }

    #[test]
    fn dark_cells_see_no_photons() {
        let (mut fluid, radiation) = irradiated_fluid(8);
        fluid.star.on = false;
        assert_eq!(radiation.photoionisation_rate(&fluid, 0), 0.0);
    }
}
