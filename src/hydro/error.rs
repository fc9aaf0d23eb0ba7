use std::error;
use std::fmt;

/**
 * Failure to recover primitive variables from a conserved state. Momentum
 * and the passive tracers always invert cleanly; recovery only breaks when
 * the mass density is negative, or when the kinetic part exceeds the total
 * energy so the remaining thermal pressure comes out negative.
 */
#[derive(Clone, Copy, Debug)]
pub enum Error {
    UnphysicalDensity { density: f64 },
    UnphysicalPressure { pressure: f64, energy: f64 },
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Error::UnphysicalDensity { density } => {
                write!(fmt, "cannot recover primitives: mass density {} is negative", density)
            }
            Error::UnphysicalPressure { pressure, energy } => write!(
                fmt,
                "cannot recover primitives: gas pressure {} is negative (total energy {})",
                pressure, energy
            ),
        }
    }
}

impl error::Error for Error {}
