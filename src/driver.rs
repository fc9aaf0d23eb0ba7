use std::error;
use std::fmt;
use std::path::PathBuf;

use log::{error, info, warn};

use crate::config::{ConfigError, Parameters};
use crate::fluid::Fluid;
use crate::grid::{uid, BoundaryCondition, Grid, NUM_FIELDS};
use crate::hydro::limiter::SlopeLimiter;
use crate::hydro::riemann::RiemannSolver;
use crate::io::progress::ProgressBar;
use crate::io::snapshot::{self, SnapshotError};
use crate::message::comm::Communicator;
use crate::partition::PartitionExchange;
use crate::solvers::{Hydrodynamics, Integrator, Radiation, Thermodynamics};
use crate::star::Star;
use crate::units::Constants;

/// Per-cell initial-condition hook supplied by the host application: maps
/// (cell centre, star position), both in physical units, to
/// (DEN, PRE, HII, VEL0, VEL1, VEL2, GRAV0, GRAV1, GRAV2), also physical.
pub type SetupFn = dyn Fn([f64; 3], [f64; 3]) -> [f64; 9];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComponentId {
    Hydro,
    Thermo,
    Rad,
}

#[derive(Debug)]
pub enum TorchError {
    Config(ConfigError),
    Snapshot(SnapshotError),
    Setup(String),
    Numerics { component: String, details: String },
}

impl fmt::Display for TorchError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            TorchError::Config(e) => e.fmt(fmt),
            TorchError::Snapshot(e) => e.fmt(fmt),
            TorchError::Setup(what) => write!(fmt, "{}", what),
            TorchError::Numerics { component, details } => {
                write!(fmt, "{} produced a non-finite solution\n{}", component, details)
            }
        }
    }
}

impl error::Error for TorchError {}

impl From<ConfigError> for TorchError {
    fn from(e: ConfigError) -> Self {
        TorchError::Config(e)
    }
}

impl From<SnapshotError> for TorchError {
    fn from(e: SnapshotError) -> Self {
        TorchError::Snapshot(e)
    }
}

/**
 * Schedules N evenly spaced output times over (0, tmax]. `update` reports
 * when the running time has crossed the next output time and shortens the
 * proposed step so a checkpoint is never overshot.
 */
pub struct Checkpointer {
    tmax: f64,
    n: usize,
    count: usize,
}

impl Checkpointer {
    pub fn new(tmax: f64, n: usize) -> Self {
        Self { tmax, n, count: 0 }
    }

    fn target(&self, k: usize) -> f64 {
        self.tmax * k as f64 / self.n as f64
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn update(&mut self, time: f64, dt_next: Option<&mut f64>) -> bool {
        let mut fired = false;
        while self.count < self.n && time >= self.target(self.count + 1) {
            self.count += 1;
            fired = true;
        }
        if let Some(dt) = dt_next {
            if self.count < self.n {
                *dt = dt.min(self.target(self.count + 1) - time);
            }
        }
        fired
    }
}

/// The palindromic splitting sequence for one outer step: a forward pass of
/// half-steps ending in one full step, then the mirrored half-steps. The
/// rotation index shifts which component anchors the pass, which restores
/// second-order accuracy on average over successive steps. Entries are
/// (slot in the active list, dt multiplier, skip-the-pre-step).
pub fn splitting_schedule(n: usize, step_counter: usize) -> Vec<(usize, f64, bool)> {
    let mut sequence = Vec::with_capacity(2 * n - 1);
    for i in 0..n {
        let h = if i == n - 1 { 1.0 } else { 0.5 };
        sequence.push(((i + step_counter) % n, h, i == 0));
    }
    for i in (0..n - 1).rev() {
        sequence.push(((i + step_counter) % n, 0.5, false));
    }
    sequence
}

fn format_suffix(i: usize) -> String {
    format!("{:06}", i)
}

/**
 * The composite stepper: owns the fluid and the three physics integrators,
 * advances them under a shared timestep with Strang-style symmetric
 * splitting, and runs the outer loop with checkpoint-driven output.
 */
pub struct Torch {
    pub fluid: Fluid,
    hydrodynamics: Hydrodynamics,
    radiation: Radiation,
    thermodynamics: Thermodynamics,
    active_components: Vec<ComponentId>,
    step_counter: usize,
    steps: u64,
    first_time: bool,
    is_quitting: bool,
    tmax: f64,
    dt_max: f64,
    ncheckpoints: usize,
    radiation_on: bool,
    cooling_on: bool,
    debug: bool,
    output_directory: PathBuf,
}




// ============================================================================
impl Torch {

    pub fn initialise(
        p: &Parameters,
        comm: Box<dyn Communicator>,
        setup: Option<&SetupFn>,
    ) -> Result<Self, TorchError> {
        let mut consts = Constants::new(p.dscale, p.pscale, p.tscale);
        let converter = consts.converter;

        // Grid geometry comes from the initial conditions file when one is
        // given, otherwise from the parameters.
        let mut nd = p.nd;
        let mut ncells = p.ncells;
        let mut side_length = converter.to_code_units(p.side_length, 0.0, 1.0, 0.0);
        let mut start_time = 0.0;
        if !p.initial_conditions.is_empty() {
            let datap = snapshot::read_data_parameters(p.initial_conditions.as_ref())?;
            nd = datap.nd;
            ncells = datap.ncells;
            side_length = converter.to_code_units(datap.side_length, 0.0, 1.0, 0.0);
            start_time = converter.to_code_units(datap.time, 0.0, 0.0, 1.0);
        }

        consts.nd = nd;
        consts.dfloor = p.dfloor;
        consts.pfloor = p.pfloor;
        consts.tfloor = p.tfloor;

        let left_bc = BoundaryCondition::from_name(&p.left_boundary).unwrap_or_else(|| {
            warn!("unknown boundary condition '{}', using FREE", p.left_boundary);
            BoundaryCondition::Free
        });
        let right_bc = BoundaryCondition::from_name(&p.right_boundary).unwrap_or_else(|| {
            warn!("unknown boundary condition '{}', using FREE", p.right_boundary);
            BoundaryCondition::Free
        });

        let partition = PartitionExchange::new(comm);
        let mut grid = Grid::new(
            nd,
            ncells,
            side_length,
            p.spatial_order + 1,
            left_bc,
            right_bc,
            partition,
        );
        grid.current_time = start_time;

        let mut star = Star {
            on: p.star_on,
            xc: p.star_position,
            mass_loss_rate: converter.to_code_units(p.mass_loss_rate, 1.0, 0.0, -1.0),
            wind_velocity: converter.to_code_units(p.wind_velocity, 0.0, 1.0, -1.0),
            photon_rate: converter.to_code_units(p.photon_rate, 0.0, 0.0, -1.0),
            wind_cell_radius: p.wind_cell_radius,
            ..Star::default()
        };
        grid.initialise_radiation_field(&star, p.wind_cell_radius);
        star.locate(&grid);

        let mut fluid = Fluid::new(grid, star, consts, p.heat_capacity_ratio, p.mass_fraction_h);

        let hydrodynamics = Hydrodynamics::new(
            nd,
            p.spatial_order,
            RiemannSolver::from_name_or_default(&p.riemann_solver),
            SlopeLimiter::from_name_or_default(&p.slope_limiter),
        );
        let radiation = Radiation::new(&consts, p.mass_fraction_h);
        let thermodynamics = Thermodynamics::new(
            &consts,
            p.thermo_subcycling,
            p.thermo_hii_switch,
            p.heating_amplification,
            p.mass_fraction_h,
            p.min_temp_initial_state,
        );

        // Initial state: restart file, host-supplied hook, or nothing.
        if !p.initial_conditions.is_empty() {
            snapshot::read_grid(p.initial_conditions.as_ref(), &mut fluid)?;
            info!("Torch::initialise: grid read from file: {}", p.initial_conditions);
            info!(
                "Torch::initialise: restarting from step {}",
                snapshot::step_id_from_filename(&p.initial_conditions)
            );
        } else if let Some(setup) = setup {
            apply_setup(&mut fluid, setup);
        } else if !p.setup_file.is_empty() {
            return Err(TorchError::Setup(format!(
                "Torch::initialise: could not open setup script: {} \
                 (user scripts are interpreted by the host application)",
                p.setup_file
            )));
        } else {
            return Err(TorchError::Setup(
                "Torch::initialise: no initial conditions file or setup hook given".into(),
            ));
        }

        if !p.patch_filename.is_empty() {
            snapshot::patch_grid(p.patch_filename.as_ref(), p.patch_offset, &mut fluid)?;
        }

        let gamma = fluid.heat_capacity_ratio;
        fluid.grid.for_each_live_mut(|cell| cell.heat_capacity_ratio = gamma);

        // Convert the freshly set state to code units, fix anything the
        // initial conditions broke, and derive the conservative variables.
        to_code_units(&mut fluid);
        thermodynamics.initialise_min_temp_field(&mut fluid);
        fluid.fix_primitives();
        fluid.global_u_from_q();

        fluid.star.check_reverse_shock(&fluid.grid, consts.pi);

        let mut active_components = vec![ComponentId::Hydro];
        if p.cooling_on {
            active_components.push(ComponentId::Thermo);
        }
        if p.radiation_on {
            active_components.push(ComponentId::Rad);
        }

        let output_directory = PathBuf::from(&p.output_directory);
        if fluid.grid.partition.rank() == 0 {
            if let Err(e) = std::fs::create_dir_all(&output_directory) {
                warn!("could not create output directory {}: {}", output_directory.display(), e);
            }
        }
        fluid.grid.partition.barrier();

        info!("Torch::initialise: initial setup complete.");

        Ok(Self {
            fluid,
            hydrodynamics,
            radiation,
            thermodynamics,
            active_components,
            step_counter: 0,
            steps: 0,
            first_time: true,
            is_quitting: false,
            tmax: converter.to_code_units(p.tmax, 0.0, 0.0, 1.0),
            dt_max: converter.to_code_units(p.dt_max, 0.0, 0.0, 1.0),
            ncheckpoints: p.ncheckpoints,
            radiation_on: p.radiation_on,
            cooling_on: p.cooling_on,
            debug: p.debug,
            output_directory,
        })
    }

    pub fn current_time(&self) -> f64 {
        self.fluid.grid.current_time
    }

    pub fn steps_taken(&self) -> u64 {
        self.steps
    }

    pub fn is_quitting(&self) -> bool {
        self.is_quitting
    }

    /// Ask the outer loop to stop before the next full step (e.g. from a
    /// signal handler installed by the host).
    pub fn request_quit(&mut self) {
        self.is_quitting = true;
    }

    /// March the solution to tmax, writing snapshots at the checkpoint
    /// times. A final snapshot is written on exit unless the last completed
    /// step was itself a scheduled checkpoint.
    pub fn run(&mut self) -> Result<(), TorchError> {
        let init_time = self.fluid.grid.current_time;

        self.fluid.global_q_from_u();
        self.fluid.fix_primitives();

        info!("Torch: marching solution...");
        let mut progress = ProgressBar::new(self.tmax - init_time, 1000);
        let mut checkpointer = Checkpointer::new(self.tmax, self.ncheckpoints);
        checkpointer.update(init_time, None);

        snapshot::write_snapshot(
            &self.output_directory,
            &format_suffix(checkpointer.count()),
            &self.fluid,
        )?;

        self.thermodynamics.fill_heating_arrays(&mut self.fluid);

        let mut is_final_print = false;

        while self.fluid.grid.current_time < self.tmax && !self.is_quitting {
            let mut dt_next = self.dt_max;
            let print_now = checkpointer.update(self.fluid.grid.current_time, Some(&mut dt_next));

            if print_now {
                self.thermodynamics.fill_heating_arrays(&mut self.fluid);
                if self.radiation_on {
                    self.radiation.fill_heating_arrays(&mut self.fluid);
                }
                let suffix = format_suffix(checkpointer.count());
                snapshot::write_heating(&self.output_directory, &suffix, &self.fluid)?;
                snapshot::write_snapshot(&self.output_directory, &suffix, &self.fluid)?;
                is_final_print = checkpointer.count() != self.ncheckpoints;
            }

            let dt = self.full_step(dt_next)?;
            self.fluid.grid.current_time += dt;
            self.steps += 1;

            if progress.time_to_update() {
                progress.update(self.fluid.grid.current_time - init_time);
                info!("{}", progress.status());
            }
        }

        if is_final_print {
            snapshot::write_snapshot(
                &self.output_directory,
                &format_suffix(self.ncheckpoints),
                &self.fluid,
            )?;
        }

        self.fluid.grid.partition.barrier();
        info!("Torch: {}", progress.final_status());
        Ok(())
    }

    /// The globally agreed timestep: the minimum over the active components
    /// and over all ranks, except that the very first call of a run returns
    /// a vanishing step so no integrator consumes uninitialised derived
    /// quantities.
    pub fn calculate_time_step(&mut self) -> f64 {
        let dt;
        if self.first_time {
            dt = self.dt_max * 1.0e-20;
            self.first_time = false;
        } else {
            let dt_hydro = self.hydrodynamics.calculate_time_step(self.dt_max, &self.fluid);
            let mut dt_rad = dt_hydro;
            let mut dt_thermo = dt_hydro;
            if self.radiation_on {
                dt_rad = self.radiation.calculate_time_step(self.dt_max, &self.fluid);
            }
            if self.cooling_on {
                dt_thermo = self.thermodynamics.calculate_time_step(self.dt_max, &self.fluid);
            }
            dt = dt_hydro.min(dt_rad).min(dt_thermo);

            if self.debug {
                let partition = &self.fluid.grid.partition;
                let t_hydro = partition.minimum(dt_hydro / self.tmax);
                let t_rad = partition.minimum(dt_rad / self.tmax);
                let t_thermo = partition.minimum(dt_thermo / self.tmax);

                if t_hydro <= 1.0e-6 || t_rad <= 1.0e-6 || t_thermo <= 1.0e-6 {
                    error!("Torch: integration deltas are too small.");
                    self.is_quitting = true;
                }
            }
        }
        let dt = self.fluid.grid.partition.minimum(dt);
        self.fluid.grid.deltatime = dt;
        dt
    }

    /// One outer step: derived quantities, global dt agreement, then either
    /// the plain predictor-corrector (hydro alone) or the rotating
    /// palindromic sweep over the active components.
    pub fn full_step(&mut self, dt_next_checkpoint: f64) -> Result<f64, TorchError> {
        self.fluid.global_q_from_u();
        self.fluid.fix_primitives();
        if self.cooling_on {
            self.thermodynamics.pre_time_step_calculations(&mut self.fluid);
        }
        if self.radiation_on {
            self.radiation.pre_time_step_calculations(&mut self.fluid);
        }

        let dt = dt_next_checkpoint.min(self.calculate_time_step());

        let ncomps = self.active_components.len();
        if ncomps == 1 {
            self.hydro_step(dt, true)?;
            return Ok(dt);
        }

        self.step_counter = (self.step_counter + 1) % ncomps;

        for (slot, h, has_heat_flux) in splitting_schedule(ncomps, self.step_counter) {
            let component = self.active_components[slot];
            self.sub_step(h * dt, has_heat_flux, component)?;
        }
        Ok(dt)
    }

    fn sub_step(
        &mut self,
        dt: f64,
        has_calculated_heat_flux: bool,
        component: ComponentId,
    ) -> Result<(), TorchError> {
        let Self { fluid, hydrodynamics, radiation, thermodynamics, .. } = self;
        let comp: &mut dyn Integrator = match component {
            ComponentId::Hydro => hydrodynamics,
            ComponentId::Thermo => thermodynamics,
            ComponentId::Rad => radiation,
        };

        check_values(fluid, &format!("{} before", comp.component_name()))?;
        if !has_calculated_heat_flux {
            fluid.global_q_from_u();
            fluid.fix_primitives();
            comp.pre_time_step_calculations(fluid);
        }
        comp.integrate(dt, fluid);
        comp.update_source_terms(dt, fluid);
        fluid.adv_solution(dt);
        fluid.fix_solution();
        check_values(fluid, &format!("{} after", comp.component_name()))?;
        Ok(())
    }

    /// Two-step predictor-corrector Godunov update: advance half a step from
    /// the W snapshot, recompute the fluxes from the half-step primitives,
    /// then advance the snapshot through the full step.
    fn hydro_step(&mut self, dt: f64, has_calculated_heat_flux: bool) -> Result<(), TorchError> {
        let Self { fluid, hydrodynamics, .. } = self;

        check_values(fluid, "hydro before")?;
        fluid.global_w_from_u();
        if !has_calculated_heat_flux {
            fluid.global_q_from_u();
            fluid.fix_primitives();
            hydrodynamics.pre_time_step_calculations(fluid);
        }
        hydrodynamics.integrate(dt, fluid);
        hydrodynamics.update_source_terms(dt, fluid);

        fluid.adv_solution(dt / 2.0);
        fluid.fix_solution();

        // Corrector.
        fluid.global_q_from_u();
        fluid.global_u_from_w();
        hydrodynamics.integrate(dt, fluid);
        hydrodynamics.update_source_terms(dt, fluid);
        fluid.adv_solution(dt);
        fluid.fix_solution();
        Ok(())
    }
}

/// Fail fatally when any cell holds a non-finite conserved value or a
/// vanished density or pressure, dumping the runaway cells.
fn check_values(fluid: &Fluid, component_name: &str) -> Result<(), TorchError> {
    let mut broken = false;
    for &id in fluid.grid.ordered("GridCells") {
        let cell = fluid.grid.cell(id);
        for i in 0..NUM_FIELDS {
            if !cell.u[i].is_finite() || cell.q[uid::DEN] == 0.0 || cell.q[uid::PRE] == 0.0 {
                broken = true;
                break;
            }
        }
        if broken {
            break;
        }
    }
    if !broken {
        return Ok(());
    }

    let mut details = String::new();
    for &id in fluid.grid.ordered("GridCells") {
        let cell = fluid.grid.cell(id);
        if cell.q[uid::VEL0].abs() > 1.0e50 || cell.q[uid::VEL1].abs() > 1.0e50 {
            details.push_str(&cell.info());
            details.push('\n');
        }
    }
    Err(TorchError::Numerics {
        component: component_name.to_string(),
        details,
    })
}

fn apply_setup(fluid: &mut Fluid, setup: &SetupFn) {
    let converter = fluid.consts.converter;
    let dx = fluid.grid.dx;
    let star_xc = fluid.star.xc;

    let mut star_phys = [0.0; 3];
    for a in 0..3 {
        star_phys[a] = converter.from_code_units(star_xc[a] * dx[a], 0.0, 1.0, 0.0);
    }

    fluid.grid.for_each_live_mut(|cell| {
        let mut xc_phys = [0.0; 3];
        for a in 0..3 {
            xc_phys[a] = converter.from_code_units(cell.xc[a] * dx[a], 0.0, 1.0, 0.0);
        }
        let values = setup(xc_phys, star_phys);
        cell.q[uid::DEN] = values[0];
        cell.q[uid::PRE] = values[1];
        cell.q[uid::HII] = values[2];
        cell.q[uid::VEL0] = values[3];
        cell.q[uid::VEL1] = values[4];
        cell.q[uid::VEL2] = values[5];
        cell.grav[0] = values[6];
        cell.grav[1] = values[7];
        cell.grav[2] = values[8];
    });
}

/// Scale a freshly initialised (physical-unit) grid state to code units.
fn to_code_units(fluid: &mut Fluid) {
    let converter = fluid.consts.converter;
    let nd = fluid.consts.nd;
    fluid.grid.for_each_live_mut(|cell| {
        cell.q[uid::DEN] = converter.to_code_units(cell.q[uid::DEN], 1.0, -3.0, 0.0);
        cell.q[uid::PRE] = converter.to_code_units(cell.q[uid::PRE], 1.0, -1.0, -2.0);
        for a in 0..nd {
            cell.q[uid::VEL0 + a] = converter.to_code_units(cell.q[uid::VEL0 + a], 0.0, 1.0, -1.0);
        }
        for a in 0..nd {
            cell.grav[a] = converter.to_code_units(cell.grav[a], 1.0, -2.0, -2.0);
        }
    });
}




// ============================================================================
#[cfg(test)]
mod test {
    use super::{check_values, splitting_schedule, Checkpointer};
    use crate::fluid::Fluid;
    use crate::grid::{uid, BoundaryCondition, Grid};
    use crate::message::channel::NullCommunicator;
    use crate::partition::PartitionExchange;
    use crate::star::Star;
    use crate::units::Constants;

    #[test]
    fn schedule_is_palindromic_in_step_sizes() {
        for n in 2..=3 {
            for counter in 0..n {
                let schedule = splitting_schedule(n, counter);
                assert_eq!(schedule.len(), 2 * n - 1);

                let factors: Vec<f64> = schedule.iter().map(|s| s.1).collect();
                let mut mirrored = factors.clone();
                mirrored.reverse();
                assert_eq!(factors, mirrored);
                assert_eq!(factors[n - 1], 1.0);
                assert!(factors.iter().take(n - 1).all(|&h| h == 0.5));
            }
        }
    }

    #[test]
    fn schedule_visits_every_component() {
        let schedule = splitting_schedule(3, 1);
        let mut visits = [0; 3];
        for (slot, _, _) in schedule {
            visits[slot] += 1;
        }
        // The anchor of the forward pass is visited once, the others twice.
        assert_eq!(visits.iter().sum::<i32>(), 5);
        assert!(visits.iter().all(|&v| v >= 1));
    }

    #[test]
    fn only_the_first_substep_skips_the_pre_step() {
        let schedule = splitting_schedule(3, 2);
        assert!(schedule[0].2);
        assert!(schedule.iter().skip(1).all(|s| !s.2));
    }

    #[test]
    fn check_values_catches_non_finite_cells() {
        let grid = Grid::new(
            1,
            [4, 1, 1],
            1.0,
            2,
            BoundaryCondition::Free,
            BoundaryCondition::Free,
            PartitionExchange::new(Box::new(NullCommunicator)),
        );
        let consts = Constants::new(1.0, 1.0, 1.0);
        let mut fluid = Fluid::new(grid, Star::default(), consts, 5.0 / 3.0, 1.0);
        fluid.grid.for_each_live_mut(|cell| {
            cell.q = [1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0];
            cell.u = [1.0, 1.5, 0.0, 0.0, 0.0, 0.0, 0.0];
        });
        assert!(check_values(&fluid, "test").is_ok());

        let id = fluid.grid.ordered("GridCells")[2];
        fluid.grid.cell_mut(id).u[uid::PRE] = f64::NAN;
        assert!(check_values(&fluid, "test").is_err());
    }

    #[test]
    fn checkpointer_caps_dt_and_fires_on_crossing() {
        let mut checkpointer = Checkpointer::new(1.0, 4);

        let mut dt = 1.0;
        assert!(!checkpointer.update(0.0, Some(&mut dt)));
        assert!((dt - 0.25).abs() < 1e-12);

        let mut dt = 1.0;
        assert!(checkpointer.update(0.25, Some(&mut dt)));
        assert_eq!(checkpointer.count(), 1);
        assert!((dt - 0.25).abs() < 1e-12);

        assert!(checkpointer.update(1.0, None));
        assert_eq!(checkpointer.count(), 4);
    }
}
