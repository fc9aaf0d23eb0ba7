use std::error;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/**
 * Run-time parameters, deserialized from a TOML parameters file. Every
 * field has a default so a file only needs to name what it changes.
 *
 * Unit conventions: `dscale` [g cm^-3], `pscale` [Ba] and `tscale` [s] fix
 * the code units; `side_length`, `tmax`, `dt_max` and the star parameters
 * are given in cgs and converted at start-up; the floors are already in
 * code units; positions are in grid coordinates (units of the cell width).
 */
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Parameters {
    pub dscale: f64,
    pub pscale: f64,
    pub tscale: f64,

    pub nd: usize,
    pub ncells: [usize; 3],
    pub side_length: f64,
    pub left_boundary: String,
    pub right_boundary: String,

    pub dfloor: f64,
    pub pfloor: f64,
    pub tfloor: f64,

    pub tmax: f64,
    pub dt_max: f64,
    pub ncheckpoints: usize,

    pub radiation_on: bool,
    pub cooling_on: bool,
    pub debug: bool,

    pub spatial_order: usize,
    pub temporal_order: usize,
    pub riemann_solver: String,
    pub slope_limiter: String,
    pub heat_capacity_ratio: f64,

    pub star_on: bool,
    pub star_position: [f64; 3],
    pub mass_loss_rate: f64,
    pub wind_velocity: f64,
    pub photon_rate: f64,
    pub wind_cell_radius: f64,

    pub thermo_subcycling: bool,
    pub thermo_hii_switch: f64,
    pub heating_amplification: f64,
    pub mass_fraction_h: f64,
    pub min_temp_initial_state: bool,

    pub initial_conditions: String,
    pub setup_file: String,
    pub patch_filename: String,
    pub patch_offset: i64,
    pub output_directory: String,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            dscale: 1.0,
            pscale: 1.0,
            tscale: 1.0,
            nd: 1,
            ncells: [1, 1, 1],
            side_length: 1.0,
            left_boundary: "FREE".into(),
            right_boundary: "FREE".into(),
            dfloor: 1.0e-30,
            pfloor: 1.0e-30,
            tfloor: 0.0,
            tmax: 0.0,
            dt_max: 0.0,
            ncheckpoints: 1,
            radiation_on: false,
            cooling_on: false,
            debug: false,
            spatial_order: 1,
            temporal_order: 2,
            riemann_solver: "HLLC".into(),
            slope_limiter: "MINMOD".into(),
            heat_capacity_ratio: 5.0 / 3.0,
            star_on: false,
            star_position: [0.0; 3],
            mass_loss_rate: 0.0,
            wind_velocity: 0.0,
            photon_rate: 0.0,
            wind_cell_radius: 0.0,
            thermo_subcycling: true,
            thermo_hii_switch: 1.0e-2,
            heating_amplification: 1.0,
            mass_fraction_h: 1.0,
            min_temp_initial_state: false,
            initial_conditions: String::new(),
            setup_file: String::new(),
            patch_filename: String::new(),
            patch_offset: 0,
            output_directory: ".".into(),
        }
    }
}




// ============================================================================
impl Parameters {

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)
            .map_err(|e| ConfigError::Open(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Open(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            ConfigError::Open(path, e) => {
                write!(fmt, "could not open parameters file {}: {}", path.display(), e)
            }
            ConfigError::Parse(path, e) => {
                write!(fmt, "could not parse parameters file {}: {}", path.display(), e)
            }
        }
    }
}

impl error::Error for ConfigError {}




// ============================================================================
#[cfg(test)]
mod test {
    use super::Parameters;

    #[test]
    fn empty_file_yields_the_defaults() {
        let p: Parameters = toml::from_str("").unwrap();
        assert_eq!(p.nd, 1);
        assert_eq!(p.riemann_solver, "HLLC");
        assert!(p.thermo_subcycling);
    }

    #[test]
    fn fields_override_individually() {
        let p: Parameters = toml::from_str(
            r#"
            nd = 3
            ncells = [64, 64, 64]
            riemann_solver = "HLLE"
            cooling_on = true
            "#,
        )
        .unwrap();
        assert_eq!(p.nd, 3);
        assert_eq!(p.ncells, [64, 64, 64]);
        assert_eq!(p.riemann_solver, "HLLE");
        assert!(p.cooling_on);
        assert_eq!(p.slope_limiter, "MINMOD");
    }
}
