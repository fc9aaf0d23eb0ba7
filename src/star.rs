use log::warn;

use crate::grid::{uid, Grid};

/// Which side of this rank's slab the radiation source lives on. The
/// column-density sweep starts at the source rank and flows outward, so the
/// location decides whether this rank receives upwind ghost data before its
/// own sweep.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Location {
    Here,
    Left,
    Right,
    None,
}

/**
 * A point source of ionising photons and (optionally) a stellar wind. The
 * position is in grid coordinates; the rates are converted to code units at
 * start-up.
 */
#[derive(Clone, Debug)]
pub struct Star {
    pub on: bool,
    pub xc: [f64; 3],
    pub mass_loss_rate: f64,
    pub wind_velocity: f64,
    pub photon_rate: f64,
    pub wind_cell_radius: f64,
    pub location: Location,
    pub wind_volume: f64,
}

impl Default for Star {
    fn default() -> Self {
        Self {
            on: false,
            xc: [0.0; 3],
            mass_loss_rate: 0.0,
            wind_velocity: 0.0,
            photon_rate: 0.0,
            wind_cell_radius: 0.0,
            location: Location::None,
            wind_volume: 0.0,
        }
    }
}




// ============================================================================
impl Star {

    /// The global index of the cell containing the source.
    pub fn cell_index(&self) -> [i64; 3] {
        [
            self.xc[0].round() as i64,
            self.xc[1].round() as i64,
            self.xc[2].round() as i64,
        ]
    }

    /// Work out where the source sits relative to this rank's slab, and sum
    /// the wind-injection volume over all ranks. Collective; every rank must
    /// call this once after the grid is built.
    pub fn locate(&mut self, grid: &Grid) {
        if !self.on {
            self.location = Location::None;
            return;
        }
        let index = self.cell_index();

        let inside_transverse = (1..3).all(|a| index[a] >= 0 && index[a] < grid.ncells[a] as i64);
        self.location = if !inside_transverse {
            Location::None
        } else if grid.locate(index).map_or(false, |id| grid.is_live(id)) {
            Location::Here
        } else if index[0] < grid.cell(grid.ordered("GridCells")[0]).index[0] {
            Location::Left
        } else {
            Location::Right
        };

        let local_wind_cells = grid.ordered("CausalWind").len() as f64;
        self.wind_volume = grid.partition.sum(local_wind_cells) * grid.cell_volume();
    }

    /// Fold the free-wind mass, momentum and energy sources into UDOT over
    /// the wind-injection sphere. The wind is fully ionised.
    pub fn inject_wind(&self, grid: &mut Grid) {
        if !self.on || self.wind_cell_radius <= 0.0 || self.wind_volume <= 0.0 {
            return;
        }
        let mdot = self.mass_loss_rate / self.wind_volume;
        let edot = 0.5 * self.mass_loss_rate * self.wind_velocity * self.wind_velocity
            / self.wind_volume;
        let source = self.xc;
        let nd = grid.nd;
        let dx = grid.dx;

        for &id in &grid.ordered("CausalWind").to_vec() {
            let cell = grid.cell_mut(id);
            let mut radial = [0.0; 3];
            let mut r = 0.0;
            for a in 0..nd {
                radial[a] = (cell.xc[a] - source[a]) * dx[a];
                r += radial[a] * radial[a];
            }
            let r = r.sqrt();

            cell.udot[uid::DEN] += mdot;
            if r > 0.0 {
                for a in 0..nd {
                    cell.udot[uid::VEL0 + a] += mdot * self.wind_velocity * radial[a] / r;
                }
            }
            cell.udot[uid::PRE] += edot;
            cell.udot[uid::HII] += mdot;
            cell.udot[uid::ADV] += mdot;
        }
    }

    /// Warn when the estimated reverse-shock radius falls inside or close to
    /// the wind-injection region, which starves the free wind of resolution.
    pub fn check_reverse_shock(&self, grid: &Grid, pi: f64) {
        if !self.on || self.wind_cell_radius <= 0.0 || self.location != Location::Here {
            return;
        }
        let id = match grid.locate(self.cell_index()) {
            Some(id) => id,
            None => return,
        };
        let pre = grid.cell(id).q[uid::PRE];
        if pre <= 0.0 {
            return;
        }
        let edot = 0.5 * self.mass_loss_rate * self.wind_velocity * self.wind_velocity;
        let reverse2 = (2.0 * edot * self.mass_loss_rate).sqrt() / (4.0 * pi * pre);
        let reverse = reverse2.sqrt() / grid.dx[0];
        if reverse < 5.0 + self.wind_cell_radius {
            warn!(
                "reverse shock within or close to wind injection region: [rs = {}, wir = {}]",
                reverse, self.wind_cell_radius
            );
        }
    }
}
