use torch::config::Parameters;
use torch::driver::Torch;
use torch::grid::uid;
use torch::message::channel::NullCommunicator;

/// Mean density over the cells whose centres fall in [x0, x1).
fn mean_density(torch: &Torch, x0: f64, x1: f64) -> f64 {
    let grid = &torch.fluid.grid;
    let mut total = 0.0;
    let mut count = 0;
    for &id in grid.ordered("GridCells") {
        let x = grid.cell(id).xc[0] * grid.dx[0];
        if x >= x0 && x < x1 {
            total += grid.cell(id).q[uid::DEN];
            count += 1;
        }
    }
    assert!(count > 0, "no cells in [{}, {})", x0, x1);
    total / count as f64
}

/// The standard Sod problem with gamma = 7/5 on 200 cells. The plateau
/// densities between the rarefaction tail and the contact, and between the
/// contact and the shock, are checked against the exact solution at
/// t = 0.2.
#[test]
fn sod_shock_tube_hits_the_exact_plateaus() {
    let mut p = Parameters::default();
    p.nd = 1;
    p.ncells = [200, 1, 1];
    p.side_length = 1.0;
    p.tmax = 0.2;
    p.dt_max = 0.05;
    p.heat_capacity_ratio = 1.4;
    p.riemann_solver = "HLLC".into();
    p.slope_limiter = "MINMOD".into();
    p.dfloor = 1.0e-8;
    p.pfloor = 1.0e-10;

    let setup = |xc: [f64; 3], _star: [f64; 3]| -> [f64; 9] {
        if xc[0] < 0.5 {
            [1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]
        } else {
            [0.125, 0.1, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]
        }
    };

    let mut torch = Torch::initialise(&p, Box::new(NullCommunicator), Some(&setup))
        .expect("initialise failed");

    let mut guard = 0;
    while torch.current_time() < p.tmax - 1.0e-12 {
        let dt = torch
            .full_step(p.tmax - torch.current_time())
            .expect("step failed");
        torch.fluid.grid.current_time += dt;
        guard += 1;
        assert!(guard < 10_000, "run did not finish");
    }

    // Exact solution at t = 0.2: contact at x = 0.685, shock at x = 0.850,
    // rarefaction tail at x = 0.486.
    let left_plateau = mean_density(&torch, 0.52, 0.64);
    let right_plateau = mean_density(&torch, 0.72, 0.82);

    assert!(
        (left_plateau - 0.42632).abs() < 2.0e-2,
        "density between tail and contact is {}",
        left_plateau
    );
    assert!(
        (right_plateau - 0.26557).abs() < 2.0e-2,
        "density between contact and shock is {}",
        right_plateau
    );
}
