use crate::partition::{send_id, PartitionExchange};
use crate::star::Star;

pub const NUM_FIELDS: usize = 7;

/// Indices into the primitive / conservative / snapshot / source-term
/// vectors held by every cell.
pub mod uid {
    pub const DEN: usize = 0;
    pub const PRE: usize = 1;
    pub const VEL0: usize = 2;
    pub const VEL1: usize = 3;
    pub const VEL2: usize = 4;
    pub const HII: usize = 5;
    pub const ADV: usize = 6;
}

/// Indices into the thermodynamic scratch vector.
pub mod tid {
    pub const COL_DEN: usize = 0;
    pub const DCOL_DEN: usize = 1;
    pub const RATE: usize = 2;
    pub const HEAT: usize = 3;
    pub const N: usize = 4;
}

/// Indices into the radiative-transfer scratch vector.
pub mod rid {
    pub const TAU: usize = 0;
    pub const DTAU: usize = 1;
    pub const N: usize = 2;
}

/// Indices into the per-mechanism heating/cooling diagnostic vector.
pub mod hid {
    pub const FUVH: usize = 0;
    pub const IRH: usize = 1;
    pub const CRH: usize = 2;
    pub const IMLC: usize = 3;
    pub const NMLC: usize = 4;
    pub const CEHI: usize = 5;
    pub const CIEC: usize = 6;
    pub const NMC: usize = 7;
    pub const RHII: usize = 8;
    pub const EUVH: usize = 9;
    pub const TOT: usize = 10;
    pub const N: usize = 11;
}

/// External boundary handling on the non-partition faces of the domain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundaryCondition {
    Free,
    Reflecting,
}

impl BoundaryCondition {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "FREE" | "OUTFLOW" => Some(Self::Free),
            "REFLECTING" => Some(Self::Reflecting),
            _ => None,
        }
    }
}




/**
 * One finite-volume cell. Cells are stored in a flat arena and refer to each
 * other by integer index, never by pointer. The four `neighbour_ids` are the
 * upwind cells with respect to rays from the radiation source, with
 * interpolation weights that sum to one; both are precomputed once at
 * start-up so the per-step column-density sweep is a single linear scan.
 */
#[derive(Clone)]
pub struct GridCell {
    pub index: [i64; 3],
    pub xc: [f64; 3],
    pub ds: f64,
    pub q: [f64; NUM_FIELDS],
    pub u: [f64; NUM_FIELDS],
    pub w: [f64; NUM_FIELDS],
    pub udot: [f64; NUM_FIELDS],
    pub grav: [f64; 3],
    pub t: [f64; tid::N],
    pub r: [f64; rid::N],
    pub h: [f64; hid::N],
    pub neighbour_ids: [Option<usize>; 4],
    pub neighbour_weights: [f64; 4],
    pub t_min: f64,
    pub heat_capacity_ratio: f64,
}

impl GridCell {
    fn new(index: [i64; 3]) -> Self {
        Self {
            index,
            xc: [index[0] as f64, index[1] as f64, index[2] as f64],
            ds: 0.0,
            q: [0.0; NUM_FIELDS],
            u: [0.0; NUM_FIELDS],
            w: [0.0; NUM_FIELDS],
            udot: [0.0; NUM_FIELDS],
            grav: [0.0; 3],
            t: [0.0; tid::N],
            r: [0.0; rid::N],
            h: [0.0; hid::N],
            neighbour_ids: [None; 4],
            neighbour_weights: [0.0; 4],
            t_min: 0.0,
            heat_capacity_ratio: 5.0 / 3.0,
        }
    }

    pub fn info(&self) -> String {
        format!(
            "cell ({}, {}, {}): Q = {:?}, U = {:?}, UDOT = {:?}",
            self.index[0], self.index[1], self.index[2], self.q, self.u, self.udot
        )
    }
}




/**
 * Rectilinear cell container for one rank's slab of the global domain. The
 * grid is decomposed along axis 0; each rank owns a contiguous range of
 * columns plus ghost rings deep enough for the hydro stencil. Iteration is
 * by named ordering: plain index order for local updates, and causal
 * (source-outward) order for the ray-traced sweeps.
 */
pub struct Grid {
    pub nd: usize,
    pub ncells: [usize; 3],
    pub side_length: f64,
    pub dx: [f64; 3],
    pub current_time: f64,
    pub deltatime: f64,
    pub nghost: usize,
    pub left_bc: BoundaryCondition,
    pub right_bc: BoundaryCondition,
    pub partition: PartitionExchange,

    offset: i64,
    n_local: [usize; 3],
    ghosts: [usize; 3],
    extent: [usize; 3],
    cells: Vec<GridCell>,

    grid_cells: Vec<usize>,
    causal_wind: Vec<usize>,
    causal_non_wind: Vec<usize>,
    left_partition_cells: Vec<usize>,
    right_partition_cells: Vec<usize>,
}




// ============================================================================
impl Grid {

    pub fn new(
        nd: usize,
        ncells: [usize; 3],
        side_length: f64,
        nghost: usize,
        left_bc: BoundaryCondition,
        right_bc: BoundaryCondition,
        partition: PartitionExchange,
    ) -> Self {
        let rank = partition.rank() as i64;
        let nproc = partition.n_processors() as i64;
        let n0 = ncells[0] as i64;

        let start = rank * n0 / nproc;
        let end = (rank + 1) * n0 / nproc;

        let n_local = [(end - start) as usize, ncells[1], ncells[2]];
        let ghosts = [
            nghost,
            if ncells[1] > 1 { nghost } else { 0 },
            if ncells[2] > 1 { nghost } else { 0 },
        ];
        let extent = [
            n_local[0] + 2 * ghosts[0],
            n_local[1] + 2 * ghosts[1],
            n_local[2] + 2 * ghosts[2],
        ];

        let dx0 = side_length / ncells[0] as f64;

        let mut cells = Vec::with_capacity(extent[0] * extent[1] * extent[2]);
        for i in 0..extent[0] {
            for j in 0..extent[1] {
                for k in 0..extent[2] {
                    let index = [
                        i as i64 - ghosts[0] as i64 + start,
                        j as i64 - ghosts[1] as i64,
                        k as i64 - ghosts[2] as i64,
                    ];
                    cells.push(GridCell::new(index));
                }
            }
        }

        let mut grid = Self {
            nd,
            ncells,
            side_length,
            dx: [dx0; 3],
            current_time: 0.0,
            deltatime: 0.0,
            nghost,
            left_bc,
            right_bc,
            partition,
            offset: start,
            n_local,
            ghosts,
            extent,
            cells,
            grid_cells: Vec::new(),
            causal_wind: Vec::new(),
            causal_non_wind: Vec::new(),
            left_partition_cells: Vec::new(),
            right_partition_cells: Vec::new(),
        };
        grid.build_index_orderings();
        grid
    }

    fn linear(&self, local: [usize; 3]) -> usize {
        (local[0] * self.extent[1] + local[1]) * self.extent[2] + local[2]
    }

    fn local_coords(&self, id: usize) -> [usize; 3] {
        let k = id % self.extent[2];
        let j = (id / self.extent[2]) % self.extent[1];
        let i = id / (self.extent[1] * self.extent[2]);
        [i, j, k]
    }

    /// Map a global cell index to a local arena id, if it falls inside this
    /// rank's slab or its ghost rings.
    pub fn locate(&self, index: [i64; 3]) -> Option<usize> {
        let mut local = [0usize; 3];
        for a in 0..3 {
            let origin = if a == 0 { self.offset } else { 0 };
            let p = index[a] - origin + self.ghosts[a] as i64;
            if p < 0 || p >= self.extent[a] as i64 {
                return None;
            }
            local[a] = p as usize;
        }
        Some(self.linear(local))
    }

    pub fn cell(&self, id: usize) -> &GridCell {
        &self.cells[id]
    }

    pub fn cell_mut(&mut self, id: usize) -> &mut GridCell {
        &mut self.cells[id]
    }

    pub fn n_cells_local(&self) -> usize {
        self.grid_cells.len()
    }

    /// Total arena size, ghosts included.
    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn cell_volume(&self) -> f64 {
        self.dx[0] * self.dx[1] * self.dx[2]
    }

    pub fn is_live(&self, id: usize) -> bool {
        let local = self.local_coords(id);
        (0..3).all(|a| {
            local[a] >= self.ghosts[a] && local[a] < self.ghosts[a] + self.n_local[a]
        })
    }

    /// The id of the cell one step down the given axis, if it exists.
    pub fn left(&self, axis: usize, id: usize) -> Option<usize> {
        let local = self.local_coords(id);
        if local[axis] == 0 {
            return None;
        }
        let mut next = local;
        next[axis] -= 1;
        Some(self.linear(next))
    }

    /// The id of the cell one step up the given axis, if it exists.
    pub fn right(&self, axis: usize, id: usize) -> Option<usize> {
        let local = self.local_coords(id);
        if local[axis] + 1 >= self.extent[axis] {
            return None;
        }
        let mut next = local;
        next[axis] += 1;
        Some(self.linear(next))
    }

    /// Cell ids for one of the named iteration orders. The causal orders are
    /// only meaningful after `initialise_radiation_field` has run.
    pub fn ordered(&self, name: &str) -> &[usize] {
        match name {
            "GridCells" => &self.grid_cells,
            "CausalWind" => &self.causal_wind,
            "CausalNonWind" => &self.causal_non_wind,
            "LeftPartitionCells" => &self.left_partition_cells,
            "RightPartitionCells" => &self.right_partition_cells,
            _ => panic!("unknown cell ordering: {}", name),
        }
    }

    /// Visit every live cell mutably, in index order.
    pub fn for_each_live_mut(&mut self, mut f: impl FnMut(&mut GridCell)) {
        let Self { grid_cells, cells, .. } = self;
        for &id in grid_cells.iter() {
            f(&mut cells[id]);
        }
    }

    fn build_index_orderings(&mut self) {
        self.grid_cells = (0..self.cells.len())
            .filter(|id| self.is_live(*id))
            .collect();

        let g = self.ghosts;
        let n = self.n_local;
        let mut left = Vec::new();
        let mut right = Vec::new();
        for j in g[1]..g[1] + n[1] {
            for k in g[2]..g[2] + n[2] {
                left.push(self.linear([g[0] - 1, j, k]));
                right.push(self.linear([g[0] + n[0], j, k]));
            }
        }
        self.left_partition_cells = left;
        self.right_partition_cells = right;
    }

    /// Build the causal orderings and the upwind interpolation stencil for
    /// the given source. A cell is causally ordered by its Manhattan
    /// distance from the source cell, which places it after all four of its
    /// upwind neighbours; ties are broken by arena order so the sweep is
    /// deterministic.
    pub fn initialise_radiation_field(&mut self, star: &Star, wind_cell_radius: f64) {
        let source = star.cell_index();

        let mut wind = Vec::new();
        let mut non_wind = Vec::new();
        for &id in &self.grid_cells {
            let cell = &self.cells[id];
            let dist2: f64 = (0..self.nd)
                .map(|a| (cell.xc[a] - star.xc[a]) * (cell.xc[a] - star.xc[a]))
                .sum();
            if star.on && dist2.sqrt() <= wind_cell_radius {
                wind.push(id);
            } else {
                non_wind.push(id);
            }
        }
        let manhattan = |cells: &[GridCell], id: usize| -> i64 {
            let cell = &cells[id];
            (0..3).map(|a| (cell.index[a] - source[a]).abs()).sum()
        };
        wind.sort_by_key(|&id| (manhattan(&self.cells, id), id));
        non_wind.sort_by_key(|&id| (manhattan(&self.cells, id), id));
        self.causal_wind = wind;
        self.causal_non_wind = non_wind;

        for &id in &self.grid_cells.clone() {
            self.calculate_nearest_neighbours(id, star.xc);
        }
    }

    /// Upwind stencil of the short-characteristics ray trace. The ray from
    /// the source to this cell exits the previous cell layer (along the
    /// dominant axis) at a point whose bilinear interpolation footprint
    /// covers up to four cells; those are the neighbours, and the bilinear
    /// coefficients are the weights.
    fn calculate_nearest_neighbours(&mut self, id: usize, source: [f64; 3]) {
        let cell = &self.cells[id];
        let delta = [
            cell.xc[0] - source[0],
            cell.xc[1] - source[1],
            cell.xc[2] - source[2],
        ];

        let main = (0..3)
            .max_by(|&a, &b| delta[a].abs().partial_cmp(&delta[b].abs()).unwrap())
            .unwrap();

        if delta[main].abs() < 0.5 {
            // The source lies inside this cell.
            let ds = self.dx[0];
            let cell = &mut self.cells[id];
            cell.ds = ds;
            cell.neighbour_ids = [None; 4];
            cell.neighbour_weights = [0.0; 4];
            return;
        }

        let t1 = (main + 1) % 3;
        let t2 = (main + 2) % 3;
        let a1 = (delta[t1] / delta[main]).abs();
        let a2 = (delta[t2] / delta[main]).abs();

        let step = |axis: usize| -> i64 {
            if delta[axis] > 0.0 {
                -1
            } else {
                1
            }
        };

        let mut base = cell.index;
        base[main] += step(main);

        let offset = |b: [i64; 3], s1: bool, s2: bool| -> [i64; 3] {
            let mut n = b;
            if s1 {
                n[t1] += step(t1);
            }
            if s2 {
                n[t2] += step(t2);
            }
            n
        };

        let stencil = [
            (offset(base, false, false), (1.0 - a1) * (1.0 - a2)),
            (offset(base, true, false), a1 * (1.0 - a2)),
            (offset(base, false, true), (1.0 - a1) * a2),
            (offset(base, true, true), a1 * a2),
        ];

        let norm = (delta[0] * delta[0] + delta[1] * delta[1] + delta[2] * delta[2]).sqrt();
        let ds = self.dx[0] * norm / delta[main].abs();

        let mut ids = [None; 4];
        let mut weights = [0.0; 4];
        for (slot, (index, weight)) in stencil.iter().enumerate() {
            if *weight > 0.0 {
                ids[slot] = self.locate(*index);
                weights[slot] = *weight;
            }
        }

        let cell = &mut self.cells[id];
        cell.ds = ds;
        cell.neighbour_ids = ids;
        cell.neighbour_weights = weights;
    }

    /// Exchange the primitive variables of the cell layers flanking each
    /// partition boundary with the neighbour rank, then refresh the external
    /// ghost cells from the boundary conditions.
    pub fn update_partition_ghosts(&mut self) {
        let rank = self.partition.rank();
        let nproc = self.partition.n_processors();
        let g = self.ghosts;
        let n = self.n_local;

        let pack = |grid: &Self, i0: usize| -> Vec<(usize, [f64; NUM_FIELDS])> {
            let mut out = Vec::new();
            for i in i0..i0 + grid.nghost {
                for j in g[1]..g[1] + n[1] {
                    for k in g[2]..g[2] + n[2] {
                        let id = grid.linear([i, j, k]);
                        out.push((id, grid.cells[id].q));
                    }
                }
            }
            out
        };

        if rank > 0 {
            for (_, q) in pack(self, g[0]) {
                for value in q {
                    self.partition.add_send_item(value);
                }
            }
            self.partition.send_data(rank - 1, send_id::PARTITION);
        }
        if rank + 1 < nproc {
            for (_, q) in pack(self, g[0] + n[0] - self.nghost) {
                for value in q {
                    self.partition.add_send_item(value);
                }
            }
            self.partition.send_data(rank + 1, send_id::PARTITION);
        }
        if rank > 0 {
            self.partition.recv_data(rank - 1, send_id::PARTITION);
            let targets = pack(self, 0).iter().map(|(id, _)| *id).collect::<Vec<_>>();
            for id in targets {
                for f in 0..NUM_FIELDS {
                    self.cells[id].q[f] = self.partition.get_recv_item();
                }
            }
        }
        if rank + 1 < nproc {
            self.partition.recv_data(rank + 1, send_id::PARTITION);
            let targets = pack(self, g[0] + n[0]).iter().map(|(id, _)| *id).collect::<Vec<_>>();
            for id in targets {
                for f in 0..NUM_FIELDS {
                    self.cells[id].q[f] = self.partition.get_recv_item();
                }
            }
        }

        self.apply_external_boundaries();
    }

    /// Fill the ghost rings on the non-partition faces. Axis 0 is filled
    /// first over the live transverse range, higher axes over the full
    /// extended range, so that edge and corner ghosts end up populated.
    fn apply_external_boundaries(&mut self) {
        let rank = self.partition.rank();
        let nproc = self.partition.n_processors();
        let g = self.ghosts;
        let n = self.n_local;

        let fill = |grid: &mut Self, axis: usize, low: bool, bc: BoundaryCondition| {
            let extent = grid.extent;
            for p in 0..extent[(axis + 1) % 3] {
                for q in 0..extent[(axis + 2) % 3] {
                    for depth in 0..g[axis] {
                        let ghost_pos = if low { g[axis] - 1 - depth } else { g[axis] + n[axis] + depth };
                        let live_pos = match bc {
                            BoundaryCondition::Free => {
                                if low { g[axis] } else { g[axis] + n[axis] - 1 }
                            }
                            BoundaryCondition::Reflecting => {
                                if low { g[axis] + depth } else { g[axis] + n[axis] - 1 - depth }
                            }
                        };
                        let mut ghost = [0usize; 3];
                        let mut live = [0usize; 3];
                        ghost[axis] = ghost_pos;
                        live[axis] = live_pos;
                        ghost[(axis + 1) % 3] = p;
                        live[(axis + 1) % 3] = p;
                        ghost[(axis + 2) % 3] = q;
                        live[(axis + 2) % 3] = q;

                        let src = grid.linear(live);
                        let dst = grid.linear(ghost);
                        let mut q_vec = grid.cells[src].q;
                        if bc == BoundaryCondition::Reflecting {
                            q_vec[uid::VEL0 + axis] = -q_vec[uid::VEL0 + axis];
                        }
                        grid.cells[dst].q = q_vec;
                    }
                }
            }
        };

        let (left_bc, right_bc) = (self.left_bc, self.right_bc);
        if rank == 0 {
            fill(self, 0, true, left_bc);
        }
        if rank + 1 == nproc {
            fill(self, 0, false, right_bc);
        }
        for axis in 1..3 {
            if g[axis] > 0 {
                fill(self, axis, true, BoundaryCondition::Free);
                fill(self, axis, false, BoundaryCondition::Free);
            }
        }
    }
}




// ============================================================================
#[cfg(test)]
mod test {
    use super::{uid, BoundaryCondition, Grid};
    use crate::message::channel::NullCommunicator;
    use crate::partition::PartitionExchange;
    use crate::star::Star;

    fn grid_1d(n: usize) -> Grid {
        Grid::new(
            1,
            [n, 1, 1],
            n as f64,
            2,
            BoundaryCondition::Free,
            BoundaryCondition::Free,
            PartitionExchange::new(Box::new(NullCommunicator)),
        )
    }

    #[test]
    fn live_cells_exclude_ghosts() {
        let grid = grid_1d(8);
        assert_eq!(grid.ordered("GridCells").len(), 8);
        for &id in grid.ordered("GridCells") {
            assert!(grid.is_live(id));
        }
    }

    #[test]
    fn locate_round_trips_global_indices() {
        let grid = grid_1d(8);
        for &id in grid.ordered("GridCells") {
            let index = grid.cell(id).index;
            assert_eq!(grid.locate(index), Some(id));
        }
        assert_eq!(grid.locate([100, 0, 0]), None);
    }

    #[test]
    fn causal_order_is_outward_from_the_source() {
        let mut grid = grid_1d(8);
        let mut star = Star::default();
        star.on = true;
        star.xc = [0.0, 0.0, 0.0];
        grid.initialise_radiation_field(&star, 0.0);

        let order = grid.ordered("CausalNonWind");
        let distances: Vec<i64> = order
            .iter()
            .map(|&id| grid.cell(id).index[0].abs())
            .collect();
        let mut sorted = distances.clone();
        sorted.sort_unstable();
        assert_eq!(distances, sorted);
    }

    #[test]
    fn upwind_neighbour_weights_sum_to_one() {
        let mut grid = Grid::new(
            2,
            [8, 8, 1],
            8.0,
            2,
            BoundaryCondition::Free,
            BoundaryCondition::Free,
            PartitionExchange::new(Box::new(NullCommunicator)),
        );
        let mut star = Star::default();
        star.on = true;
        star.xc = [3.0, 3.0, 0.0];
        grid.initialise_radiation_field(&star, 0.0);

        for &id in grid.ordered("CausalNonWind") {
            let cell = grid.cell(id);
            let d0 = (cell.xc[0] - 3.0).abs();
            let d1 = (cell.xc[1] - 3.0).abs();
            if d0.max(d1) < 0.5 {
                continue;
            }
            let total: f64 = cell.neighbour_weights.iter().sum();
            assert!((total - 1.0).abs() < 1e-12, "weights sum to {}", total);
        }
    }

    #[test]
    fn free_boundary_copies_the_edge_cell() {
        let mut grid = grid_1d(4);
        for &id in &grid.ordered("GridCells").to_vec() {
            grid.cell_mut(id).q[uid::DEN] = 1.0 + grid.cell(id).index[0] as f64;
        }
        grid.update_partition_ghosts();

        let ghost = grid.ordered("LeftPartitionCells")[0];
        assert_eq!(grid.cell(ghost).q[uid::DEN], 1.0);
    }
}
