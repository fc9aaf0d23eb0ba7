use torch::fluid::Fluid;
use torch::grid::{tid, uid, BoundaryCondition, Grid};
use torch::message::channel::NullCommunicator;
use torch::partition::PartitionExchange;
use torch::solvers::{Integrator, Thermodynamics};
use torch::star::Star;
use torch::units::Constants;

const HYDROGEN_MASS: f64 = 1.6735575e-24;

fn cooling_fluid() -> Fluid {
    let grid = Grid::new(
        1,
        [8, 1, 1],
        1.0e22,
        2,
        BoundaryCondition::Free,
        BoundaryCondition::Free,
        PartitionExchange::new(Box::new(NullCommunicator)),
    );
    let mut consts = Constants::new(1.0, 1.0, 1.0);
    consts.nd = 1;
    let mut fluid = Fluid::new(grid, Star::default(), consts, 5.0 / 3.0, 1.0);
    let star = fluid.star.clone();
    fluid.grid.initialise_radiation_field(&star, 0.0);
    fluid.star.locate(&fluid.grid);

    let n_h = 100.0;
    let hii = 0.9;
    let temperature = 1.0e4;
    let gas_constant = fluid.consts.specific_gas_constant;
    fluid.grid.for_each_live_mut(|cell| {
        let den = n_h * HYDROGEN_MASS;
        cell.q[uid::DEN] = den;
        cell.q[uid::PRE] = temperature * (hii + 1.0) * gas_constant * den;
        cell.q[uid::HII] = hii;
        cell.q[uid::ADV] = 1.0;
    });
    fluid.global_u_from_q();
    fluid
}

fn thermo(fluid: &Fluid) -> Thermodynamics {
    Thermodynamics::new(&fluid.consts, true, 1.0e-2, 1.0, 1.0, false)
}

/// Ionised gas at 1e4 K cooling over a hundred thermal times: one
/// sub-cycled step must agree with one hundred resolved steps to within a
/// percent, and must actually have sub-cycled.
#[test]
fn subcycled_step_matches_resolved_integration() {
    // Sub-cycled path: a single step of one hundred thermal times.
    let mut coarse = cooling_fluid();
    let mut coarse_thermo = thermo(&coarse);
    coarse_thermo.initialise_min_temp_field(&mut coarse);
    coarse_thermo.pre_time_step_calculations(&mut coarse);

    let id = coarse.grid.ordered("GridCells")[0];
    let rate = coarse.grid.cell(id).t[tid::RATE];
    assert!(rate < 0.0, "ionised gas at 1e4 K should cool, rate = {}", rate);
    let dti = (0.1 * coarse.grid.cell(id).u[uid::PRE] / rate).abs();
    let dt = 100.0 * dti;

    coarse_thermo.integrate(dt, &mut coarse);
    assert!(
        coarse_thermo.max_substeps() >= 99,
        "only {} micro-steps",
        coarse_thermo.max_substeps()
    );
    coarse_thermo.update_source_terms(dt, &mut coarse);
    coarse.adv_solution(dt);
    coarse.fix_solution();
    let p_coarse = coarse.grid.cell(id).q[uid::PRE];

    // Reference path: the same interval in one hundred resolved steps.
    let mut fine = cooling_fluid();
    let mut fine_thermo = thermo(&fine);
    fine_thermo.initialise_min_temp_field(&mut fine);
    for _ in 0..100 {
        fine_thermo.pre_time_step_calculations(&mut fine);
        fine_thermo.integrate(dt / 100.0, &mut fine);
        fine_thermo.update_source_terms(dt / 100.0, &mut fine);
        fine.adv_solution(dt / 100.0);
        fine.fix_solution();
    }
    let p_fine = fine.grid.cell(id).q[uid::PRE];

    let p0 = cooling_fluid().grid.cell(id).q[uid::PRE];
    assert!(p_coarse < p0, "no cooling happened");
    assert!(
        (p_coarse - p_fine).abs() / p_fine < 1.0e-2,
        "sub-cycled pressure {} vs resolved pressure {}",
        p_coarse,
        p_fine
    );
}
