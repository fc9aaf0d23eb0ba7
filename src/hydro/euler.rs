use std::ops::{Add, Div, Mul, Sub};

use super::error::Error;
use super::geometry::Direction;
use crate::grid::{uid, NUM_FIELDS};




// ============================================================================
pub struct Conserved(pub [f64; NUM_FIELDS]);
pub struct Primitive(pub [f64; NUM_FIELDS]);




// ============================================================================
impl Conserved {

    pub fn from_slice(cons: &[f64]) -> Self {
        let mut data = [0.0; NUM_FIELDS];
        data.copy_from_slice(cons);
        Self(data)
    }

    pub fn write_to_slice(&self, cons: &mut [f64]) {
        cons.copy_from_slice(&self.0)
    }

    pub fn mass_density(&self) -> f64 {
        self.0[uid::DEN]
    }

    pub fn energy_density(&self) -> f64 {
        self.0[uid::PRE]
    }

    pub fn momentum(&self, direction: Direction) -> f64 {
        self.0[uid::VEL0 + direction.axis()]
    }

    pub fn momentum_squared(&self) -> f64 {
        (0..3).map(|a| self.0[uid::VEL0 + a] * self.0[uid::VEL0 + a]).sum()
    }

    pub fn to_primitive(&self, gamma_law_index: f64) -> Result<Primitive, Error> {
        let d = self.mass_density();
        let ek = 0.5 * self.momentum_squared() / d;
        let et = self.energy_density() - ek;
        let pg = et * (gamma_law_index - 1.0);

        if d < 0.0 {
            Err(Error::UnphysicalDensity { density: d })
        } else if pg < 0.0 {
            Err(Error::UnphysicalPressure { pressure: pg, energy: self.energy_density() })
        } else {
            let mut prim = [0.0; NUM_FIELDS];
            prim[uid::DEN] = d;
            prim[uid::PRE] = pg;
            for a in 0..3 {
                prim[uid::VEL0 + a] = self.0[uid::VEL0 + a] / d;
            }
            prim[uid::HII] = self.0[uid::HII] / d;
            prim[uid::ADV] = self.0[uid::ADV] / d;
            Ok(Primitive(prim))
        }
    }
}




// ============================================================================
impl Primitive {

    pub fn from_slice(prim: &[f64]) -> Self {
        let mut data = [0.0; NUM_FIELDS];
        data.copy_from_slice(prim);
        Self(data)
    }

    pub fn write_to_slice(&self, prim: &mut [f64]) {
        prim.copy_from_slice(&self.0)
    }

    pub fn mass_density(&self) -> f64 {
        self.0[uid::DEN]
    }

    pub fn gas_pressure(&self) -> f64 {
        self.0[uid::PRE]
    }

    pub fn ion_fraction(&self) -> f64 {
        self.0[uid::HII]
    }

    pub fn tracer(&self) -> f64 {
        self.0[uid::ADV]
    }

    pub fn velocity(&self, direction: Direction) -> f64 {
        self.0[uid::VEL0 + direction.axis()]
    }

    pub fn velocity_squared(&self) -> f64 {
        (0..3).map(|a| self.0[uid::VEL0 + a] * self.0[uid::VEL0 + a]).sum()
    }

    pub fn sound_speed_squared(&self, gamma_law_index: f64) -> f64 {
        gamma_law_index * self.gas_pressure() / self.mass_density()
    }

    pub fn specific_internal_energy(&self, gamma_law_index: f64) -> f64 {
        self.gas_pressure() / self.mass_density() / (gamma_law_index - 1.0)
    }

    pub fn mach_number(&self, gamma_law_index: f64) -> f64 {
        (self.velocity_squared() / self.sound_speed_squared(gamma_law_index)).sqrt()
    }

    pub fn outer_wavespeeds(&self, direction: Direction, gamma_law_index: f64) -> (f64, f64) {
        let cs = self.sound_speed_squared(gamma_law_index).sqrt();
        let vn = self.velocity(direction);
        (vn - cs, vn + cs)
    }

    pub fn max_signal_speed(&self, gamma_law_index: f64) -> f64 {
        f64::sqrt(self.velocity_squared()) + f64::sqrt(self.sound_speed_squared(gamma_law_index))
    }

    pub fn to_conserved(&self, gamma_law_index: f64) -> Conserved {
        let d = self.mass_density();
        let p = self.gas_pressure();
        let vsq = self.velocity_squared();

        let mut cons = [0.0; NUM_FIELDS];
        cons[uid::DEN] = d;
        cons[uid::PRE] = d * vsq * 0.5 + p / (gamma_law_index - 1.0);
        for a in 0..3 {
            cons[uid::VEL0 + a] = d * self.0[uid::VEL0 + a];
        }
        cons[uid::HII] = d * self.ion_fraction();
        cons[uid::ADV] = d * self.tracer();
        Conserved(cons)
    }

    pub fn flux_vector(&self, direction: Direction, gamma_law_index: f64) -> Conserved {
        let pg = self.gas_pressure();
        let vn = self.velocity(direction);
        let u = self.to_conserved(gamma_law_index);

        let mut flux = [0.0; NUM_FIELDS];
        flux[uid::DEN] = u.0[uid::DEN] * vn;
        flux[uid::PRE] = u.0[uid::PRE] * vn + pg * vn;
        for a in 0..3 {
            flux[uid::VEL0 + a] =
                u.0[uid::VEL0 + a] * vn + pg * direction.along(Direction::from_axis(a));
        }
        flux[uid::HII] = u.0[uid::HII] * vn;
        flux[uid::ADV] = u.0[uid::ADV] * vn;
        Conserved(flux)
    }

    pub fn reflect(&self, direction: Direction) -> Primitive {
        let mut prim = self.0;
        prim[uid::VEL0 + direction.axis()] = -prim[uid::VEL0 + direction.axis()];
        Primitive(prim)
    }
}




// ============================================================================
impl Add<Conserved> for Conserved {
    type Output = Conserved;
    fn add(self, u: Self) -> Conserved {
        let mut data = self.0;
        for (x, y) in data.iter_mut().zip(u.0.iter()) {
            *x += y;
        }
        Conserved(data)
    }
}

impl Sub<Conserved> for Conserved {
    type Output = Self;
    fn sub(self, u: Self) -> Self {
        let mut data = self.0;
        for (x, y) in data.iter_mut().zip(u.0.iter()) {
            *x -= y;
        }
        Conserved(data)
    }
}

impl Mul<f64> for Conserved {
    type Output = Self;
    fn mul(self, a: f64) -> Self {
        let mut data = self.0;
        for x in data.iter_mut() {
            *x *= a;
        }
        Conserved(data)
    }
}

impl Div<f64> for Conserved {
    type Output = Self;
    fn div(self, a: f64) -> Self {
        let mut data = self.0;
        for x in data.iter_mut() {
            *x /= a;
        }
        Conserved(data)
    }
}
