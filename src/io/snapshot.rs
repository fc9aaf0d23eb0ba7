use std::error;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::fluid::Fluid;
use crate::grid::{hid, uid};

/**
 * Errors from snapshot and initial-conditions IO. Every variant carries the
 * path, because an unreadable file is a fatal that the user has to chase.
 */
#[derive(Debug)]
pub enum SnapshotError {
    Open(PathBuf, std::io::Error),
    Write(PathBuf, std::io::Error),
    Parse(PathBuf, String),
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            SnapshotError::Open(path, e) => write!(fmt, "could not open {}: {}", path.display(), e),
            SnapshotError::Write(path, e) => write!(fmt, "could not write {}: {}", path.display(), e),
            SnapshotError::Parse(path, what) => write!(fmt, "malformed data in {}: {}", path.display(), what),
        }
    }
}

impl error::Error for SnapshotError {}

/// Geometry and time read from the header of an initial-conditions file,
/// in physical units.
#[derive(Clone, Copy, Debug)]
pub struct DataParameters {
    pub nd: usize,
    pub ncells: [usize; 3],
    pub side_length: f64,
    pub time: f64,
}

/// The restart index is the digits after the last underscore of the file
/// stem, or -1 when there are none.
pub fn step_id_from_filename(filename: &str) -> i32 {
    let stem = filename.rsplit_once('.').map_or(filename, |(stem, _)| stem);
    stem.rsplit_once('_')
        .and_then(|(_, digits)| digits.parse().ok())
        .unwrap_or(-1)
}

fn parse<T: std::str::FromStr>(token: Option<&str>, path: &Path) -> Result<T, SnapshotError> {
    token
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| SnapshotError::Parse(path.to_path_buf(), "short or non-numeric row".into()))
}

/// Read the header of a snapshot / initial-conditions file.
pub fn read_data_parameters(path: &Path) -> Result<DataParameters, SnapshotError> {
    let file = File::open(path).map_err(|e| SnapshotError::Open(path.to_path_buf(), e))?;
    let mut line = String::new();
    BufReader::new(file)
        .read_line(&mut line)
        .map_err(|e| SnapshotError::Open(path.to_path_buf(), e))?;

    let mut tokens = line.split_whitespace();
    Ok(DataParameters {
        nd: parse(tokens.next(), path)?,
        ncells: [
            parse(tokens.next(), path)?,
            parse(tokens.next(), path)?,
            parse(tokens.next(), path)?,
        ],
        side_length: parse(tokens.next(), path)?,
        time: parse(tokens.next(), path)?,
    })
}

/// Read the cell rows belonging to this rank, in rank-serial order. The
/// values are left in physical units; the caller converts the whole grid at
/// once. Each rank skips `rank * (product of ncells) / nprocs` rows.
pub fn read_grid(path: &Path, fluid: &mut Fluid) -> Result<(), SnapshotError> {
    let nproc = fluid.grid.partition.n_processors();
    let rank = fluid.grid.partition.rank();
    let nd = fluid.grid.nd;
    let total: usize = fluid.grid.ncells.iter().product();

    let mut result = Ok(());
    for turn in 0..nproc {
        if turn == rank && result.is_ok() {
            result = read_grid_rows(path, fluid, rank * total / nproc, nd);
        }
        fluid.grid.partition.barrier();
    }
    result
}

fn read_grid_rows(
    path: &Path,
    fluid: &mut Fluid,
    skip: usize,
    nd: usize,
) -> Result<(), SnapshotError> {
    let file = File::open(path).map_err(|e| SnapshotError::Open(path.to_path_buf(), e))?;
    let mut lines = BufReader::new(file).lines().skip(1 + skip);

    for id in fluid.grid.ordered("GridCells").to_vec() {
        let line = match lines.next() {
            Some(Ok(line)) => line,
            _ => return Err(SnapshotError::Parse(path.to_path_buf(), "missing cell rows".into())),
        };
        let mut tokens = line.split_whitespace();
        for _ in 0..nd {
            let _: f64 = parse(tokens.next(), path)?;
        }
        let den = parse(tokens.next(), path)?;
        let pre = parse(tokens.next(), path)?;
        let hii = parse(tokens.next(), path)?;
        let mut vel = [0.0; 3];
        for v in vel.iter_mut().take(nd) {
            *v = parse(tokens.next(), path)?;
        }

        let cell = fluid.grid.cell_mut(id);
        cell.q[uid::DEN] = den;
        cell.q[uid::PRE] = pre;
        cell.q[uid::HII] = hii;
        for a in 0..nd {
            cell.q[uid::VEL0 + a] = vel[a];
        }
    }
    Ok(())
}

/// Overlay a (usually smaller) snapshot onto the grid, shifted along the
/// decomposition axis. Rows outside this rank's slab are skipped.
pub fn patch_grid(path: &Path, offset: i64, fluid: &mut Fluid) -> Result<(), SnapshotError> {
    let header = read_data_parameters(path)?;
    let nd = header.nd;

    let file = File::open(path).map_err(|e| SnapshotError::Open(path.to_path_buf(), e))?;
    let lines = BufReader::new(file).lines().skip(1);

    let mut indices = Vec::new();
    for i in 0..header.ncells[0] as i64 {
        for j in 0..header.ncells[1] as i64 {
            for k in 0..header.ncells[2] as i64 {
                indices.push([i + offset, j, k]);
            }
        }
    }

    for (index, line) in indices.into_iter().zip(lines) {
        let line = line.map_err(|e| SnapshotError::Open(path.to_path_buf(), e))?;
        let id = match fluid.grid.locate(index) {
            Some(id) if fluid.grid.is_live(id) => id,
            _ => continue,
        };
        let mut tokens = line.split_whitespace();
        for _ in 0..nd {
            let _: f64 = parse(tokens.next(), path)?;
        }
        let den = parse(tokens.next(), path)?;
        let pre = parse(tokens.next(), path)?;
        let hii = parse(tokens.next(), path)?;
        let mut vel = [0.0; 3];
        for v in vel.iter_mut().take(nd) {
            *v = parse(tokens.next(), path)?;
        }
        let cell = fluid.grid.cell_mut(id);
        cell.q[uid::DEN] = den;
        cell.q[uid::PRE] = pre;
        cell.q[uid::HII] = hii;
        for a in 0..nd {
            cell.q[uid::VEL0 + a] = vel[a];
        }
    }
    Ok(())
}

/// Write one snapshot, rank-serially: rank zero writes the header and its
/// slab, every other rank appends its own. The format round-trips through
/// `read_grid`.
pub fn write_snapshot(directory: &Path, suffix: &str, fluid: &Fluid) -> Result<(), SnapshotError> {
    let path = directory.join(format!("data2D_{}.txt", suffix));
    let nproc = fluid.grid.partition.n_processors();
    let rank = fluid.grid.partition.rank();

    let mut result = Ok(());
    for turn in 0..nproc {
        if turn == rank && result.is_ok() {
            result = write_snapshot_rows(&path, fluid, rank == 0);
        }
        fluid.grid.partition.barrier();
    }
    result
}

fn write_snapshot_rows(path: &Path, fluid: &Fluid, lead: bool) -> Result<(), SnapshotError> {
    let file = if lead {
        File::create(path)
    } else {
        OpenOptions::new().append(true).open(path)
    }
    .map_err(|e| SnapshotError::Open(path.to_path_buf(), e))?;
    let mut out = BufWriter::new(file);
    let converter = &fluid.consts.converter;
    let grid = &fluid.grid;
    let nd = grid.nd;

    let mut write = |line: String| -> Result<(), SnapshotError> {
        writeln!(out, "{}", line).map_err(|e| SnapshotError::Write(path.to_path_buf(), e))
    };

    if lead {
        write(format!(
            "{} {} {} {} {:e} {:e}",
            nd,
            grid.ncells[0],
            grid.ncells[1],
            grid.ncells[2],
            converter.from_code_units(grid.side_length, 0.0, 1.0, 0.0),
            converter.from_code_units(grid.current_time, 0.0, 0.0, 1.0),
        ))?;
    }

    for &id in grid.ordered("GridCells") {
        let cell = grid.cell(id);
        let mut row = String::new();
        for a in 0..nd {
            let x = converter.from_code_units(cell.xc[a] * grid.dx[a], 0.0, 1.0, 0.0);
            row.push_str(&format!("{:e} ", x));
        }
        row.push_str(&format!(
            "{:e} {:e} {:e}",
            converter.from_code_units(cell.q[uid::DEN], 1.0, -3.0, 0.0),
            converter.from_code_units(cell.q[uid::PRE], 1.0, -1.0, -2.0),
            cell.q[uid::HII],
        ));
        for a in 0..nd {
            let v = converter.from_code_units(cell.q[uid::VEL0 + a], 0.0, 1.0, -1.0);
            row.push_str(&format!(" {:e}", v));
        }
        write(row)?;
    }
    Ok(())
}

/// Per-mechanism heating diagnostics alongside a snapshot.
pub fn write_heating(directory: &Path, suffix: &str, fluid: &Fluid) -> Result<(), SnapshotError> {
    let path = directory.join(format!("heating2D_{}.txt", suffix));
    let nproc = fluid.grid.partition.n_processors();
    let rank = fluid.grid.partition.rank();

    let mut result = Ok(());
    for turn in 0..nproc {
        if turn == rank && result.is_ok() {
            result = write_heating_rows(&path, fluid, rank == 0);
        }
        fluid.grid.partition.barrier();
    }
    result
}

fn write_heating_rows(path: &Path, fluid: &Fluid, lead: bool) -> Result<(), SnapshotError> {
    let file = if lead {
        File::create(path)
    } else {
        OpenOptions::new().append(true).open(path)
    }
    .map_err(|e| SnapshotError::Open(path.to_path_buf(), e))?;
    let mut out = BufWriter::new(file);
    let converter = &fluid.consts.converter;
    let grid = &fluid.grid;

    for &id in grid.ordered("GridCells") {
        let cell = grid.cell(id);
        let mut row = String::new();
        for a in 0..grid.nd {
            let x = converter.from_code_units(cell.xc[a] * grid.dx[a], 0.0, 1.0, 0.0);
            row.push_str(&format!("{:e} ", x));
        }
        for i in 0..hid::N {
            let h = converter.from_code_units(cell.h[i], 1.0, -1.0, -3.0);
            row.push_str(&format!(" {:e}", h));
        }
        writeln!(out, "{}", row).map_err(|e| SnapshotError::Write(path.to_path_buf(), e))?;
    }
    Ok(())
}




// ============================================================================
#[cfg(test)]
mod test {
    use super::step_id_from_filename;

    #[test]
    fn restart_index_comes_from_the_filename() {
        assert_eq!(step_id_from_filename("data2D_000012.txt"), 12);
        assert_eq!(step_id_from_filename("run/data2D_7.txt"), 7);
        assert_eq!(step_id_from_filename("data2D.txt"), -1);
        assert_eq!(step_id_from_filename("data2D_xy.txt"), -1);
    }
}
