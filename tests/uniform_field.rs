use torch::config::Parameters;
use torch::driver::Torch;
use torch::grid::NUM_FIELDS;
use torch::message::channel::NullCommunicator;

/// A uniform field with no star, no cooling and no gravity must not move:
/// every interface sees identical left and right states, so the flux
/// divergence vanishes identically and the state is preserved to roundoff.
#[test]
fn uniform_field_is_a_fixed_point() {
    let mut p = Parameters::default();
    p.nd = 3;
    p.ncells = [16, 16, 16];
    p.side_length = 1.6e5;
    p.tmax = 1.0;
    p.dt_max = 1.0e-3;
    p.heat_capacity_ratio = 5.0 / 3.0;

    let density = 1.6735575e-22;
    let pressure = density * 8.254398e7 * 100.0;
    let setup = move |_xc: [f64; 3], _star: [f64; 3]| -> [f64; 9] {
        [density, pressure, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]
    };

    let mut torch = Torch::initialise(&p, Box::new(NullCommunicator), Some(&setup))
        .expect("initialise failed");

    let reference: Vec<[f64; NUM_FIELDS]> = torch
        .fluid
        .grid
        .ordered("GridCells")
        .iter()
        .map(|&id| torch.fluid.grid.cell(id).q)
        .collect();

    // The first step is the vanishing bootstrap step, so eleven steps
    // advance the clock by ten full dt_max.
    let first = torch.full_step(p.dt_max).expect("step failed");
    assert!((first - p.dt_max * 1.0e-20).abs() < 1.0e-35, "bootstrap dt is {}", first);
    torch.fluid.grid.current_time += first;

    for _ in 0..10 {
        let dt = torch.full_step(p.dt_max).expect("step failed");
        torch.fluid.grid.current_time += dt;
    }

    assert!(
        (torch.current_time() - 1.0e-2).abs() < 1.0e-12,
        "time is {}",
        torch.current_time()
    );

    let mut max_drift: f64 = 0.0;
    for (&id, q0) in torch.fluid.grid.ordered("GridCells").iter().zip(&reference) {
        let q = torch.fluid.grid.cell(id).q;
        for i in 0..NUM_FIELDS {
            let scale = q0[i].abs().max(1.0e-30);
            max_drift = max_drift.max((q[i] - q0[i]).abs() / scale);
        }
    }
    assert!(max_drift < 1.0e-12, "state drifted by {}", max_drift);
}
