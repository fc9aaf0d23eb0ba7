use std::fs;
use std::path::PathBuf;

use torch::config::Parameters;
use torch::driver::Torch;
use torch::io::snapshot;
use torch::message::channel::NullCommunicator;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("torch-test-{}-{}", name, std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// Writing a snapshot, restarting from it, and writing again without
/// taking a step must reproduce the file byte for byte.
#[test]
fn restart_is_idempotent() {
    let dir = scratch_dir("restart");

    let mut p = Parameters::default();
    p.nd = 1;
    p.ncells = [32, 1, 1];
    p.side_length = 3.2e18;
    p.tmax = 1.0;
    p.dt_max = 1.0e-3;
    p.output_directory = dir.to_string_lossy().into_owned();

    let setup = |xc: [f64; 3], _star: [f64; 3]| -> [f64; 9] {
        let x = xc[0] / 3.2e18;
        [
            1.0e-22 * (1.0 + 0.5 * x),
            1.0e-12 * (1.0 + 0.1 * x * x),
            0.25 * x,
            1.0e4 * x,
            0.0,
            0.0,
            0.0,
            0.0,
            0.0,
        ]
    };

    let torch = Torch::initialise(&p, Box::new(NullCommunicator), Some(&setup))
        .expect("initialise failed");
    snapshot::write_snapshot(&dir, "000007", &torch.fluid).expect("write failed");
    let original = fs::read_to_string(dir.join("data2D_000007.txt")).unwrap();

    let mut p2 = p.clone();
    p2.initial_conditions = dir.join("data2D_000007.txt").to_string_lossy().into_owned();
    let restarted = Torch::initialise(&p2, Box::new(NullCommunicator), None)
        .expect("restart failed");
    snapshot::write_snapshot(&dir, "000008", &restarted.fluid).expect("rewrite failed");
    let rewritten = fs::read_to_string(dir.join("data2D_000008.txt")).unwrap();

    assert_eq!(original, rewritten);
    fs::remove_dir_all(&dir).ok();
}

/// The restart index comes out of the snapshot filename.
#[test]
fn restart_index_parses_from_the_checkpoint_name() {
    assert_eq!(snapshot::step_id_from_filename("data2D_000008.txt"), 8);
}
