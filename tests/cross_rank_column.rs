use std::thread;

use torch::fluid::Fluid;
use torch::grid::{tid, uid, BoundaryCondition, Grid};
use torch::message::channel::{channel_group, ChannelCommunicator};
use torch::partition::PartitionExchange;
use torch::solvers::{ray_trace, Column};
use torch::star::{Location, Star};
use torch::units::Constants;

fn rank_fluid(comm: ChannelCommunicator) -> Fluid {
    let grid = Grid::new(
        1,
        [16, 1, 1],
        16.0,
        2,
        BoundaryCondition::Free,
        BoundaryCondition::Free,
        PartitionExchange::new(Box::new(comm)),
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
    fluid.grid.for_each_live_mut(|cell| cell.q[uid::DEN] = 3.0);
    fluid
}

/// Two-rank decomposition with the star on rank zero: the sweep crosses
/// the partition, and the downstream rank's first live cell continues the
/// column of the upstream rank's last live cell exactly.
#[test]
fn column_density_is_continuous_across_the_partition() {
    let mut group = channel_group(2);
    let right_comm = group.pop().unwrap();
    let left_comm = group.pop().unwrap();

    let left = thread::spawn(move || {
        let mut fluid = rank_fluid(left_comm);
        assert_eq!(fluid.star.location, Location::Here);
        ray_trace(&mut fluid, Column::TotalHydrogen);

        // Rightmost live cell of rank 0.
        let &id = fluid.grid.ordered("GridCells").last().unwrap();
        let cell = fluid.grid.cell(id);
        cell.t[tid::COL_DEN] + cell.t[tid::DCOL_DEN]
    });

    let right = thread::spawn(move || {
        let mut fluid = rank_fluid(right_comm);
        assert_eq!(fluid.star.location, Location::Left);
        ray_trace(&mut fluid, Column::TotalHydrogen);

        // Leftmost live cell of rank 1.
        let &id = fluid.grid.ordered("GridCells").first().unwrap();
        fluid.grid.cell(id).t[tid::COL_DEN]
    });

    let upstream = left.join().unwrap();
    let downstream = right.join().unwrap();
    assert_eq!(
        downstream, upstream,
        "columns disagree across the partition boundary"
    );
}
