use super::{ray_trace, Column, Integrator};
use crate::fluid::Fluid;
use crate::grid::{hid, tid, uid};
use crate::spline::{CubicSpline, LinearSpline};
use crate::units::{Constants, Converter};

const LN10: f64 = 2.302585093;

/**
 * Non-equilibrium heating and cooling of partially ionised hydrogen with
 * metal lines, following Henney et al. (2009). Cooling comes from
 * collisionally excited lines of ionised and neutral metals, free-free and
 * free-bound transitions of ionised hydrogen, collisionally excited lines
 * of neutral hydrogen, collisional-ionisation equilibrium and the CLOUDY
 * PDR models; heating from FUV and IR dust absorption and cosmic rays.
 * Tabulated rates are spline fits built once at start-up. The source term
 * can sub-cycle itself when the thermal time drops below the hydro step.
 */
pub struct Thermodynamics {
    nd: usize,
    pi: f64,
    hydrogen_mass: f64,
    boltzmann: f64,
    pfloor: f64,
    dust_extinction_cross_section: f64,

    is_subcycling: bool,
    thermo_hii_switch: f64,
    heating_amplification: f64,
    mass_fraction_h: f64,
    min_temp_initial_state: bool,

    z0: f64,
    t1: f64,
    t2: f64,
    t3: f64,
    t4: f64,
    imlc: f64,
    nmlc: f64,
    ciec_min_t: f64,
    ciec: f64,
    cxhi_damp: f64,
    n0: f64,
    nmc: f64,
    fuvh_a: f64,
    fuvh_b: f64,
    fuvh_c: f64,
    irh_a: f64,
    irh_b: f64,
    crh: f64,
    t_min: f64,

    collisional_excitation_hi_rates: CubicSpline,
    recombination_hii_rates: LinearSpline,

    max_substeps: usize,
}




// ============================================================================
impl Thermodynamics {

    pub fn new(
        consts: &Constants,
        is_subcycling: bool,
        thermo_hii_switch: f64,
        heating_amplification: f64,
        mass_fraction_h: f64,
        min_temp_initial_state: bool,
    ) -> Self {
        let converter = &consts.converter;

        Self {
            nd: consts.nd,
            pi: consts.pi,
            hydrogen_mass: consts.hydrogen_mass,
            boltzmann: consts.boltzmann,
            pfloor: consts.pfloor,
            dust_extinction_cross_section: consts.dust_extinction_cross_section,
            is_subcycling,
            thermo_hii_switch,
            heating_amplification,
            mass_fraction_h,
            min_temp_initial_state,
            z0: 5.0e-4,
            t1: 33610.0,
            t2: 2180.0,
            t3: 28390.0,
            t4: 1780.0,
            imlc: converter.to_code_units(2.905e-19, 1.0, 5.0, -3.0),
            nmlc: converter.to_code_units(4.477e-20, 1.0, 5.0, -3.0),
            ciec_min_t: 5.0e4,
            ciec: converter.to_code_units(3.485e-15, 1.0, 5.0, -3.0),
            cxhi_damp: 5.0e5,
            n0: converter.to_code_units(1.0e6, 0.0, -3.0, 0.0),
            nmc: converter.to_code_units(3.981e-27, 1.0, 3.8, -3.0),
            fuvh_a: converter.to_code_units(1.9e-26, 1.0, 4.0, -2.0),
            fuvh_b: converter.to_code_units(1.0, 0.0, 0.0, -1.0),
            fuvh_c: converter.to_code_units(6.4, 0.0, -1.0, 0.0),
            irh_a: converter.to_code_units(7.7e-32, 1.0, 4.0, -2.0),
            irh_b: converter.to_code_units(3.0e4, 0.0, -3.0, 0.0),
            crh: converter.to_code_units(5.0e-27, 1.0, 2.0, -3.0),
            t_min: 100.0,
            collisional_excitation_hi_rates: collisional_excitation_hi_table(converter),
            recombination_hii_rates: recombination_hii_table(converter),
            max_substeps: 0,
        }
    }

    /// Largest number of micro-steps any cell took in the last `integrate`.
    pub fn max_substeps(&self) -> usize {
        self.max_substeps
    }

    /// Fix the temperature floor of every cell, either from the initial
    /// state or from the constant floor.
    pub fn initialise_min_temp_field(&self, fluid: &mut Fluid) {
        if self.min_temp_initial_state {
            let ids = fluid.grid.ordered("GridCells").to_vec();
            for id in ids {
                let cell = fluid.grid.cell(id);
                let t_min =
                    fluid.calc_temperature(cell.q[uid::HII], cell.q[uid::PRE], cell.q[uid::DEN]);
                fluid.grid.cell_mut(id).t_min = t_min;
            }
        } else {
            let t_min = self.t_min;
            fluid.grid.for_each_live_mut(|cell| cell.t_min = t_min);
        }
    }

    fn flux_fuv(&self, q_fuv: f64, dist_sqrd: f64) -> f64 {
        if dist_sqrd != 0.0 {
            q_fuv / (1.2e7 * 4.0 * self.pi * dist_sqrd)
        } else {
            0.0
        }
    }

    // Ionised metal line cooling (Henney et al. 2009, eq. A9).
    fn ionised_metal_line_cooling(&self, ne: f64, t: f64) -> f64 {
        self.imlc * self.z0 * ne * ne * (-self.t1 / t - (self.t2 / t) * (self.t2 / t)).exp()
    }

    // Neutral metal line cooling (Henney et al. 2009, eq. A10).
    fn neutral_metal_line_cooling(&self, ne: f64, nn: f64, t: f64) -> f64 {
        self.nmlc * self.z0 * ne * nn * (-self.t3 / t - (self.t4 / t) * (self.t4 / t)).exp()
    }

    // Collisional ionisation equilibrium-cooling curve (Henney et al. 2009,
    // eq. A13), with a linear smoothing spread over 20000 K.
    fn collisional_ionisation_equilibrium_cooling(&self, ne: f64, t: f64) -> f64 {
        if t > self.ciec_min_t {
            let cie_rate = self.ciec
                * ne
                * ne
                * self.z0
                * (-0.63 * t.ln()).exp()
                * (1.0 - (-(1.0e-5 * t).powf(1.63)).exp());
            let smoothing = 1.0_f64.min((t - 5.0e4) / 2.0e4);
            cie_rate * smoothing
        } else {
            0.0
        }
    }

    // Neutral and molecular cooling from cloudy models (Henney et al. 2009,
    // eq. A14).
    fn neutral_molecular_line_cooling(&self, nh: f64, hiifrac: f64, t: f64) -> f64 {
        let t0 = 70.0 + 220.0 * (nh / self.n0).powf(0.2);
        self.nmc * (1.0 - hiifrac) * (1.0 - hiifrac) * nh.powf(1.6) * t.sqrt() * (-t0 / t).exp()
    }

    /// Cubic spline interpolation of the collisional excitation cooling rate
    /// of HI. The fit is in log-log space and the off-end slopes are also
    /// logarithmic, so the interpolated exponent is re-exponentiated here.
    fn collisional_excitation_hi(&self, nh: f64, hiifrac: f64, t: f64) -> f64 {
        let rate = self.collisional_excitation_hi_rates.interpolate(t.log10());
        hiifrac
            * (1.0 - hiifrac)
            * nh
            * nh
            * ((LN10 * rate) - (t / self.cxhi_damp) * (t / self.cxhi_damp)).exp()
    }

    /// Free-free and free-bound transitions of ionised hydrogen
    /// (Henney et al. 2009, eq. A11), interpolated from Hummer (1994).
    fn recombination_hii(&self, nh: f64, hiifrac: f64, t: f64) -> f64 {
        let rate = self.recombination_hii_rates.interpolate(t);
        hiifrac * hiifrac * nh * nh * self.boltzmann * t * rate
    }

    // FUV heating (Henney et al. 2009, eq. A3).
    fn far_ultra_violet_heating(&self, nh: f64, av_fuv: f64, f_fuv: f64) -> f64 {
        self.fuvh_a * nh * f_fuv * (-1.9 * av_fuv).exp()
            / (self.fuvh_b + self.fuvh_c * f_fuv * (-1.9 * av_fuv).exp() / nh)
    }

    // IR heating (Henney et al. 2009, eq. A6).
    fn infra_red_heating(&self, nh: f64, av_fuv: f64, f_fuv: f64) -> f64 {
        self.irh_a * nh * f_fuv * (-0.05 * av_fuv).exp()
            * (-2.0 * (1.0 + self.irh_b / nh).ln()).exp()
    }

    // Cosmic ray heating (Henney et al. 2009, eq. A7), increased 10x to
    // compensate for the missing X-ray heating.
    fn cosmic_ray_heating(&self, nh: f64) -> f64 {
        self.crh * nh
    }

    /// "Soft landing" to the equilibrium neutral gas temperature: net
    /// cooling fades out over the 200 K above the cell's temperature floor.
    fn soft_landing(&self, rate: f64, t: f64, t_min: f64) -> f64 {
        if rate < 0.0 {
            if t <= t_min {
                0.0
            } else if t <= t_min + 200.0 {
                rate * (t - t_min) / 200.0
            } else {
                rate
            }
        } else {
            rate
        }
    }

    fn total_cooling(&self, nh: f64, hiifrac: f64, ne: f64, nn: f64, t: f64) -> f64 {
        self.ionised_metal_line_cooling(ne, t)
            + self.neutral_metal_line_cooling(ne, nn, t)
            + self.collisional_excitation_hi(nh, hiifrac, t)
            + self.collisional_ionisation_equilibrium_cooling(ne, t)
            + self.neutral_molecular_line_cooling(nh, hiifrac, t)
    }

    /// FUV flux at a cell, with the geometric dilution from the star.
    fn fuv_field(&self, fluid: &Fluid, id: usize) -> f64 {
        if !fluid.star.on {
            return 0.0;
        }
        let cell = fluid.grid.cell(id);
        let mut rsqrd = 0.0;
        for a in 0..self.nd {
            let d = (cell.xc[a] - fluid.star.xc[a]) * fluid.grid.dx[a];
            rsqrd += d * d;
        }
        self.flux_fuv(0.5 * fluid.star.photon_rate, rsqrd)
    }

    /// Per-mechanism heating and cooling snapshot for the diagnostic
    /// output written at checkpoints.
    pub fn fill_heating_arrays(&mut self, fluid: &mut Fluid) {
        if fluid.star.on {
            ray_trace(fluid, Column::TotalHydrogen);
        }
        for id in fluid.grid.ordered("CausalNonWind").to_vec() {
            let cell = fluid.grid.cell(id);
            if cell.q[uid::ADV] < self.thermo_hii_switch {
                let cell = fluid.grid.cell_mut(id);
                for i in 0..hid::N {
                    cell.h[i] = 0.0;
                }
                continue;
            }
            let nh = self.mass_fraction_h * cell.q[uid::DEN] / self.hydrogen_mass;
            let hiifrac = cell.q[uid::HII];
            let ne = hiifrac * nh;
            let nn = (1.0 - hiifrac) * nh;
            let t = fluid.calc_temperature(cell.q[uid::HII], cell.q[uid::PRE], cell.q[uid::DEN]);
            let tau = cell.t[tid::COL_DEN];
            let av_fuv = 1.086 * self.dust_extinction_cross_section * tau;
            let f_fuv = self.fuv_field(fluid, id);

            let cell = fluid.grid.cell_mut(id);
            cell.h[hid::FUVH] = self.far_ultra_violet_heating(nh, av_fuv, f_fuv);
            cell.h[hid::IRH] = self.infra_red_heating(nh, av_fuv, f_fuv);
            cell.h[hid::CRH] = self.cosmic_ray_heating(nh);

            cell.h[hid::IMLC] = -self.ionised_metal_line_cooling(ne, t);
            cell.h[hid::NMLC] = -self.neutral_metal_line_cooling(ne, nn, t);
            cell.h[hid::CEHI] = -self.collisional_excitation_hi(nh, hiifrac, t);
            cell.h[hid::CIEC] = -self.collisional_ionisation_equilibrium_cooling(ne, t);
            cell.h[hid::NMC] = -self.neutral_molecular_line_cooling(nh, hiifrac, t);

            cell.h[hid::TOT] += cell.h[hid::RHII] + cell.h[hid::EUVH];
        }
    }
}




// ============================================================================
impl Integrator for Thermodynamics {

    fn component_name(&self) -> &'static str {
        "Thermodynamics"
    }

    /// Sweep the column densities, then tabulate the net heating rate of
    /// every cell whose ionisation switch is set.
    fn pre_time_step_calculations(&mut self, fluid: &mut Fluid) {
        if fluid.star.on {
            ray_trace(fluid, Column::TotalHydrogen);
        }
        for id in fluid.grid.ordered("CausalNonWind").to_vec() {
            let cell = fluid.grid.cell(id);
            if cell.q[uid::ADV] < self.thermo_hii_switch {
                fluid.grid.cell_mut(id).t[tid::RATE] = 0.0;
                continue;
            }
            let nh = self.mass_fraction_h * cell.q[uid::DEN] / self.hydrogen_mass;
            let hiifrac = cell.q[uid::HII];
            let ne = nh * hiifrac;
            let nn = nh * (1.0 - hiifrac);
            let t = fluid.calc_temperature(cell.q[uid::HII], cell.q[uid::PRE], cell.q[uid::DEN]);
            let tau = cell.t[tid::COL_DEN];
            let av_fuv = 1.086 * self.dust_extinction_cross_section * tau;
            let f_fuv = self.fuv_field(fluid, id);
            let t_min = cell.t_min;

            let mut rate = 0.0;
            rate += self.far_ultra_violet_heating(nh, av_fuv, f_fuv);
            rate += self.infra_red_heating(nh, av_fuv, f_fuv);
            rate += self.cosmic_ray_heating(nh);

            let heat = rate;
            rate -= self.total_cooling(nh, hiifrac, ne, nn, t);
            rate = self.soft_landing(rate, t, t_min);

            let cell = fluid.grid.cell_mut(id);
            cell.t[tid::HEAT] = heat;
            cell.t[tid::RATE] = self.heating_amplification * rate;
        }
    }

    /// Thermal timestep: a fraction of the time for the net rate to consume
    /// the cell's energy. Sub-cycling handles large rate swings itself, so
    /// it tolerates a full energy-scale step.
    fn calculate_time_step(&mut self, dt_max: f64, fluid: &Fluid) -> f64 {
        let frac = if self.is_subcycling { 1.0 } else { 0.1 };
        let mut dt = dt_max;
        for &id in fluid.grid.ordered("GridCells") {
            let cell = fluid.grid.cell(id);
            if cell.t[tid::RATE] != 0.0 {
                let dti = (frac * cell.u[uid::PRE] / cell.t[tid::RATE]).abs();
                if dti < dt {
                    dt = dti;
                }
            }
        }
        dt
    }

    /// Advance the pressure through the (possibly sub-cycled) cooling, and
    /// replace T[RATE] with the effective average rate over dt so that the
    /// ordinary UDOT application reproduces the final pressure.
    fn integrate(&mut self, dt: f64, fluid: &mut Fluid) {
        if !self.is_subcycling {
            return;
        }
        self.max_substeps = 0;
        for id in fluid.grid.ordered("CausalNonWind").to_vec() {
            let cell = fluid.grid.cell(id);
            if cell.q[uid::ADV] < self.thermo_hii_switch {
                let cell = fluid.grid.cell_mut(id);
                for i in 0..hid::N {
                    cell.h[i] = 0.0;
                }
                cell.t[tid::RATE] = 0.0;
                continue;
            }
            let nh = self.mass_fraction_h * cell.q[uid::DEN] / self.hydrogen_mass;
            let hiifrac = cell.q[uid::HII];
            let ne = nh * hiifrac;
            let nn = nh * (1.0 - hiifrac);
            let gamma = cell.heat_capacity_ratio;
            let t_min = cell.t_min;
            let heat = cell.t[tid::HEAT];
            let rate = cell.t[tid::RATE];
            let pre0 = cell.q[uid::PRE];
            let den = cell.q[uid::DEN];

            let dti = (0.10 * cell.u[uid::PRE] / rate).abs();

            // Pressure changes over the subcycle, therefore temperature
            // does, affecting the cooling rate.
            let mu_inv = self.mass_fraction_h * (hiifrac + 1.0)
                + (1.0 - self.mass_fraction_h) * 0.25;
            let pre2temp = 1.0 / (mu_inv * fluid.consts.specific_gas_constant * den);
            let temp2pre = mu_inv * fluid.consts.specific_gas_constant * den;

            let pfloor = self.pfloor;
            let clamp = move |pressure: &mut f64, subcycle_t: &mut f64| {
                if *pressure < pfloor || *subcycle_t < t_min {
                    let floored = (t_min * temp2pre).max(pfloor);
                    *subcycle_t = floored * pre2temp;
                    *pressure = floored;
                }
            };

            let mut pressure = pre0 + rate * dt.min(dti) * (gamma - 1.0);
            let mut subcycle_t = pressure * pre2temp;
            clamp(&mut pressure, &mut subcycle_t);

            if dt > dti {
                let dtdti = dt / dti;
                // Round the number of subcycle steps up unless dt divides
                // exactly.
                let nsteps = if dtdti - dtdti.floor() > 0.0 {
                    (dtdti + 1.0) as usize
                } else {
                    (dtdti + 0.5) as usize
                };
                let rate2dpre = dt / nsteps as f64 * (gamma - 1.0);
                self.max_substeps = self.max_substeps.max(nsteps - 1);

                for _ in 0..nsteps - 1 {
                    let mut subcycle_rate = heat - self.total_cooling(nh, hiifrac, ne, nn, subcycle_t);
                    subcycle_rate = self.heating_amplification
                        * self.soft_landing(subcycle_rate, subcycle_t, t_min);

                    pressure += subcycle_rate * rate2dpre;
                    subcycle_t = pressure * pre2temp;
                    clamp(&mut pressure, &mut subcycle_t);
                }
            }

            let effective_rate = (pressure - pre0) / ((gamma - 1.0) * dt);
            let cell = fluid.grid.cell_mut(id);
            cell.t[tid::RATE] = effective_rate;
            cell.h[hid::TOT] = effective_rate;
        }
    }

    fn update_source_terms(&mut self, _dt: f64, fluid: &mut Fluid) {
        for id in fluid.grid.ordered("CausalNonWind").to_vec() {
            let cell = fluid.grid.cell_mut(id);
            cell.udot[uid::PRE] += cell.t[tid::RATE];
            cell.t[tid::RATE] = 0.0;
            cell.t[tid::HEAT] = 0.0;
        }
    }
}




// ============================================================================
/// Collisional excitation cooling of HI, fit in log-log space.
fn collisional_excitation_hi_table(converter: &Converter) -> CubicSpline {
    let temperatures: [f64; 26] = [
        3162.2776602,
        3981.0717055,
        5011.8723363,
        6309.5734448,
        7943.2823472,
        10000.0000000,
        12589.2541179,
        15848.9319246,
        19952.6231497,
        25118.8643151,
        31622.7766017,
        39810.7170553,
        50118.7233627,
        63095.7344480,
        79432.8234724,
        100000.0000000,
        125892.5411794,
        158489.3192461,
        199526.2314969,
        251188.6431510,
        316227.7660168,
        398107.1705535,
        501187.2336273,
        630957.3444802,
        794328.2347243,
        1000000.0000000,
    ];
    let rates = [
        1.150800e-34,
        2.312065e-31,
        9.571941e-29,
        1.132400e-26,
        4.954502e-25,
        9.794900e-24,
        1.035142e-22,
        6.652732e-22,
        2.870781e-21,
        9.036495e-21,
        2.218196e-20,
        4.456562e-20,
        7.655966e-20,
        1.158777e-19,
        1.588547e-19,
        2.013724e-19,
        2.393316e-19,
        2.710192e-19,
        2.944422e-19,
        3.104560e-19,
        3.191538e-19,
        3.213661e-19,
        3.191538e-19,
        3.126079e-19,
        3.033891e-19,
        2.917427e-19,
    ];

    let points = temperatures
        .iter()
        .zip(rates.iter())
        .map(|(t, r)| {
            (
                t.log10(),
                converter.to_code_units(*r, 1.0, 5.0, -3.0).log10(),
            )
        })
        .collect();
    CubicSpline::new(points)
}

/// Hummer (1994) HII recombination cooling rate data, tabulated over
/// T = 10^(1 + 0.2 i).
fn recombination_hii_table(converter: &Converter) -> LinearSpline {
    let coolb = [
        8.287e-11, 7.821e-11, 7.356e-11, 6.892e-11, 6.430e-11, 5.971e-11, 5.515e-11, 5.062e-11,
        4.614e-11, 4.170e-11, 3.734e-11, 3.306e-11, 2.888e-11, 2.484e-11, 2.098e-11, 1.736e-11,
        1.402e-11, 1.103e-11, 8.442e-12, 6.279e-12, 4.539e-12, 3.192e-12, 2.185e-12, 1.458e-12,
        9.484e-13, 6.023e-13, 3.738e-13, 2.268e-13, 1.348e-13, 7.859e-14, 4.499e-14,
    ];

    let points = (0..26)
        .map(|i| {
            let t = (LN10 * (1.0 + 0.2 * i as f64)).exp();
            let r = converter.to_code_units(coolb[i] / t.sqrt(), 0.0, 3.0, -1.0);
            (t, r)
        })
        .collect();
    LinearSpline::new(points)
}
