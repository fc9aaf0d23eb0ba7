use torch::config::Parameters;
use torch::driver::Torch;
use torch::grid::uid;
use torch::message::channel::NullCommunicator;

const HYDROGEN_MASS: f64 = 1.6735575e-24;
const GAS_CONSTANT: f64 = 8.254398e7;

/// An R-type ionisation front from a 1e49 photons/s star in uniform
/// hydrogen at 100 cm^-3. After ten kiloyears (several recombination
/// times) the front must sit at the Stroemgren radius
/// R_s = (3 S / (4 pi alpha_B n^2))^(1/3), with hydrodynamic expansion
/// still negligible.
#[test]
fn front_reaches_the_stroemgren_radius() {
    let n_h = 100.0;
    let photon_rate = 1.0e49;
    let alpha_b = 2.59e-13;
    let r_stroemgren = (3.0 * photon_rate
        / (4.0 * std::f64::consts::PI * alpha_b * n_h * n_h))
        .powf(1.0 / 3.0);

    let mut p = Parameters::default();
    p.nd = 1;
    p.ncells = [100, 1, 1];
    p.side_length = 1.25e19;
    p.tmax = 10.0e3 * 3.156e7;
    p.dt_max = 1.0e10;
    p.radiation_on = true;
    p.star_on = true;
    p.star_position = [0.0, 0.0, 0.0];
    p.photon_rate = photon_rate;
    p.dfloor = 1.0e-28;
    p.pfloor = 1.0e-18;

    let density = n_h * HYDROGEN_MASS;
    let pressure = density * GAS_CONSTANT * 100.0;
    let setup = move |_xc: [f64; 3], _star: [f64; 3]| -> [f64; 9] {
        [density, pressure, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]
    };

    let mut torch = Torch::initialise(&p, Box::new(NullCommunicator), Some(&setup))
        .expect("initialise failed");

    let mut guard = 0;
    while torch.current_time() < p.tmax - 1.0 {
        let dt = torch
            .full_step(p.tmax - torch.current_time())
            .expect("step failed");
        torch.fluid.grid.current_time += dt;
        guard += 1;
        assert!(guard < 200_000, "run did not finish");
    }

    let grid = &torch.fluid.grid;
    let mut front: f64 = 0.0;
    for &id in grid.ordered("GridCells") {
        let cell = grid.cell(id);
        if cell.q[uid::HII] > 0.5 {
            front = front.max(cell.xc[0] * grid.dx[0]);
        }
    }

    assert!(front > 0.0, "no ionised cells at all");
    let error = (front - r_stroemgren).abs() / r_stroemgren;
    assert!(
        error < 0.05,
        "front at {:.3e} cm, Stroemgren radius {:.3e} cm ({}% off)",
        front,
        r_stroemgren,
        (100.0 * error).round()
    );
}
